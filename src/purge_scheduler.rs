// src/purge_scheduler.rs - Periodic trash expiry
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, error, info};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{self, Duration};

use crate::{NoteError, Result, TrashManager};

#[derive(Debug, Clone, Default)]
pub struct PurgeSchedulerStatus {
    /// Whether the scheduler is running
    pub is_running: bool,
    /// When expired notes were last checked for
    pub last_run: Option<DateTime<Utc>>,
    /// How many notes the last check removed
    pub last_purged: usize,
}

#[derive(Debug)]
pub enum PurgeCommand {
    /// Purge expired notes immediately and report the count
    PurgeNow(oneshot::Sender<Result<usize>>),
    /// Stop the scheduler
    Stop,
}

/// Runs the trash expiry check on a fixed interval.
///
/// Purging on load stays the primary mechanism; this only shortens how long
/// an expired note can linger when nobody opens the trash.
pub struct PurgeScheduler {
    manager: Arc<TrashManager>,

    interval: Duration,

    /// Channel to send commands to the scheduler task
    command_tx: Option<mpsc::Sender<PurgeCommand>>,

    /// Handle to the scheduler task
    scheduler_task: Option<JoinHandle<()>>,

    status: Arc<Mutex<PurgeSchedulerStatus>>,
}

impl PurgeScheduler {
    pub fn new(manager: Arc<TrashManager>, interval: Duration) -> Self {
        info!("Initializing purge scheduler, interval {:?}", interval);
        Self {
            manager,
            interval,
            command_tx: None,
            scheduler_task: None,
            status: Arc::new(Mutex::new(PurgeSchedulerStatus::default())),
        }
    }

    /// Start the scheduler. A zero interval leaves it stopped.
    pub async fn start(&mut self) -> Result<()> {
        if self.scheduler_task.is_some() {
            debug!("Purge scheduler already running");
            return Ok(());
        }
        if self.interval.is_zero() {
            info!("Purge interval is zero, scheduler not started");
            return Ok(());
        }

        let (command_tx, mut command_rx) = mpsc::channel(10);
        self.command_tx = Some(command_tx);

        let manager = Arc::clone(&self.manager);
        let status = Arc::clone(&self.status);
        let period = self.interval;

        let task = tokio::spawn(async move {
            let mut interval = time::interval(period);
            interval.tick().await; // Initial tick

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        match run_purge(&manager, &status).await {
                            Ok(count) => debug!("Scheduled purge removed {} notes", count),
                            Err(e) => error!("Scheduled purge failed: {}", e),
                        }
                    }
                    cmd = command_rx.recv() => match cmd {
                        Some(PurgeCommand::PurgeNow(reply)) => {
                            let result = run_purge(&manager, &status).await;
                            if let Err(e) = &result {
                                error!("Manual purge failed: {}", e);
                            }
                            let _ = reply.send(result);
                        }
                        Some(PurgeCommand::Stop) | None => {
                            info!("Purge scheduler stopping...");
                            break;
                        }
                    }
                }
            }
        });

        self.scheduler_task = Some(task);
        self.status.lock().await.is_running = true;
        info!("Purge scheduler started");
        Ok(())
    }

    /// Stop the scheduler if it's running
    pub async fn stop(&mut self) -> Result<()> {
        if let Some(task) = self.scheduler_task.take() {
            if let Some(tx) = self.command_tx.take() {
                if let Err(e) = tx.send(PurgeCommand::Stop).await {
                    error!("Failed to send stop command to purge scheduler: {}", e);
                }
            }

            task.await.map_err(|e| NoteError::ApplicationError {
                message: format!("Failed to stop purge scheduler: {}", e),
            })?;

            self.status.lock().await.is_running = false;
            info!("Purge scheduler stopped");
        } else {
            debug!("Purge scheduler is not running");
        }

        Ok(())
    }

    /// Purge immediately through the running scheduler
    ///
    /// # Returns
    ///
    /// The number of notes removed
    pub async fn purge_now(&self) -> Result<usize> {
        let tx = self
            .command_tx
            .as_ref()
            .ok_or_else(|| NoteError::ApplicationError {
                message: "Purge scheduler is not running".to_string(),
            })?;

        let (reply_tx, reply_rx) = oneshot::channel();
        tx.send(PurgeCommand::PurgeNow(reply_tx))
            .await
            .map_err(|e| NoteError::ApplicationError {
                message: format!("Failed to send purge command: {}", e),
            })?;

        reply_rx.await.map_err(|e| NoteError::ApplicationError {
            message: format!("Purge scheduler dropped the request: {}", e),
        })?
    }

    pub async fn status(&self) -> PurgeSchedulerStatus {
        self.status.lock().await.clone()
    }
}

async fn run_purge(
    manager: &TrashManager,
    status: &Mutex<PurgeSchedulerStatus>,
) -> Result<usize> {
    let purged = manager.purge_expired().await?.len();
    let mut status = status.lock().await;
    status.last_run = Some(manager.now());
    status.last_purged = purged;
    Ok(purged)
}
