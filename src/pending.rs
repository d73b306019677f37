//! Persistence confirmation for optimistic callers.
//!
//! A caller updates its own view right away, starts the store operation as a
//! [`Persisting`] task, and then either awaits [`Persisting::confirmed`] or
//! says explicitly that it will not, with [`Persisting::fire_and_forget`].
use std::future::Future;

use log::{debug, error};
use tokio::task::JoinHandle;

use crate::{NoteError, Result};

/// A store operation running in the background
#[must_use = "await `confirmed()` or call `fire_and_forget()`"]
pub struct Persisting<T> {
    label: &'static str,
    handle: JoinHandle<Result<T>>,
}

impl<T: Send + 'static> Persisting<T> {
    /// Starts `operation` on the runtime
    pub fn spawn<F>(label: &'static str, operation: F) -> Self
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        debug!("Starting {}", label);
        Self {
            label,
            handle: tokio::spawn(operation),
        }
    }

    /// Waits for the operation and returns its result
    pub async fn confirmed(self) -> Result<T> {
        self.handle.await.map_err(|e| NoteError::ApplicationError {
            message: format!("{} did not complete: {}", self.label, e),
        })?
    }

    /// Lets the operation finish on its own. Failures are logged, not returned.
    ///
    /// For long-lived embedders that keep the runtime alive after the call,
    /// such as a UI layer over [`TrashView`](crate::TrashView). The CLI exits
    /// right after each command, so it always awaits [`confirmed`](Self::confirmed).
    pub fn fire_and_forget(self) {
        let label = self.label;
        tokio::spawn(async move {
            match self.confirmed().await {
                Ok(_) => debug!("{} persisted", label),
                Err(e) => error!("{} failed: {}", label, e),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn confirmed_returns_operation_result() {
        let ok = Persisting::spawn("ok", async { Ok(5) });
        assert_eq!(ok.confirmed().await.unwrap(), 5);

        let failing = Persisting::spawn("failing", async {
            Err::<(), _>(NoteError::NoteNotFound { id: "x".into() })
        });
        assert!(matches!(
            failing.confirmed().await,
            Err(NoteError::NoteNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn fire_and_forget_still_runs_operation() {
        let (tx, rx) = tokio::sync::oneshot::channel();
        Persisting::spawn("signal", async move {
            let _ = tx.send(());
            Ok(())
        })
        .fire_and_forget();

        rx.await.unwrap();
    }
}
