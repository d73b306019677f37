//! Trash view and retention enforcement.
//!
//! Expired notes are purged opportunistically: whenever the trash view is
//! loaded, whenever the retention window changes, and on each tick of the
//! optional [`PurgeScheduler`](crate::PurgeScheduler).
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::Serialize;

use crate::{Clock, Note, NoteStore, Result, RetentionPolicyStore};

/// Whole days a trashed note has left before it may be purged.
///
/// `retention_days - floor(elapsed days)`, clamped to `[0, retention_days]`.
/// A missing deletion time counts as deleted right now.
pub fn calculate_days_left(
    deleted_at: Option<DateTime<Utc>>,
    retention_days: u32,
    now: DateTime<Utc>,
) -> u32 {
    let Some(deleted_at) = deleted_at else {
        return retention_days;
    };

    let elapsed_days = (now - deleted_at).num_days().max(0);
    (i64::from(retention_days) - elapsed_days).max(0) as u32
}

/// A trashed note together with its remaining retention
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrashEntry {
    pub note: Note,
    pub days_left: u32,
}

/// Derives trash data and applies the retention window. Mutations go
/// through the [`NoteStore`].
pub struct TrashManager {
    store: Arc<NoteStore>,
    policy: Arc<RetentionPolicyStore>,
    clock: Arc<dyn Clock>,
}

impl TrashManager {
    pub fn new(
        store: Arc<NoteStore>,
        policy: Arc<RetentionPolicyStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            policy,
            clock,
        }
    }

    pub fn store(&self) -> &Arc<NoteStore> {
        &self.store
    }

    /// Current time on the manager's clock
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Current retention window in days
    pub fn retention_days(&self) -> u32 {
        self.policy.retention_days()
    }

    /// Days left for `note` under the current policy
    pub fn days_left(&self, note: &Note) -> u32 {
        calculate_days_left(note.deleted_at, self.retention_days(), self.clock.now())
    }

    /// Trashed notes with their days left, most recently deleted first.
    /// Nothing is purged.
    pub async fn trash_entries(&self) -> Vec<TrashEntry> {
        let retention_days = self.retention_days();
        let now = self.clock.now();

        let mut entries: Vec<TrashEntry> = self
            .store
            .get_trash_notes()
            .await
            .into_iter()
            .map(|note| TrashEntry {
                days_left: calculate_days_left(note.deleted_at, retention_days, now),
                note,
            })
            .collect();
        entries.sort_by(|a, b| b.note.deleted_at.cmp(&a.note.deleted_at));
        entries
    }

    /// Purges expired notes, then returns the remaining trash
    pub async fn load_trash_view(&self) -> Result<Vec<TrashEntry>> {
        self.purge_expired().await?;
        Ok(self.trash_entries().await)
    }

    /// Permanently removes every trashed note with no days left, in one write
    ///
    /// # Returns
    ///
    /// The ids of the purged notes
    pub async fn purge_expired(&self) -> Result<Vec<String>> {
        let retention_days = self.retention_days();
        let now = self.clock.now();

        let purged = self
            .store
            .purge_trashed_where(|note| {
                calculate_days_left(note.deleted_at, retention_days, now) == 0
            })
            .await?;

        if purged.is_empty() {
            debug!("No expired notes in trash");
        } else {
            info!(
                "Purged {} expired notes (retention {} days)",
                purged.len(),
                retention_days
            );
        }
        Ok(purged)
    }

    /// Changes the retention window and re-applies it to the whole trash.
    /// Values below one day fall back to the default.
    ///
    /// Only a failure to persist the policy is an error. Once the new window
    /// is stored, a failed purge is logged and retried by the next
    /// opportunistic purge.
    ///
    /// # Returns
    ///
    /// The retention value now in effect
    pub async fn update_trash_retention_days(&self, days: i64) -> Result<u32> {
        let days = self.policy.set_retention_days(days).await?;
        self.purge_after_policy_change(days).await;
        Ok(days)
    }

    /// Same as [`update_trash_retention_days`](Self::update_trash_retention_days)
    /// for text input; anything that is not an integer >= 1 becomes the default.
    pub async fn update_trash_retention_days_from_input(&self, input: &str) -> Result<u32> {
        let days = self.policy.set_retention_days_from_input(input).await?;
        self.purge_after_policy_change(days).await;
        Ok(days)
    }

    async fn purge_after_policy_change(&self, days: u32) {
        if let Err(e) = self.purge_expired().await {
            warn!(
                "Retention set to {} days, but purging expired notes failed: {}",
                days, e
            );
        }
    }

    pub async fn restore(&self, note_id: &str) -> Result<bool> {
        self.store.restore_from_trash(note_id).await
    }

    pub async fn delete_permanently(&self, note_id: &str) -> Result<bool> {
        self.store.permanently_delete_note(note_id).await
    }

    pub async fn empty_trash(&self) -> Result<usize> {
        self.store.empty_trash().await
    }
}

/// Caller-side copy of the trash list.
///
/// Local edits apply immediately and synchronously; persistence is started
/// separately (see [`Persisting`](crate::Persisting)). After a failed
/// operation, `refresh` brings the view back to the stored state.
#[derive(Debug, Default)]
pub struct TrashView {
    entries: Vec<TrashEntry>,
}

impl TrashView {
    /// Loads the view, purging expired notes first
    pub async fn load(manager: &TrashManager) -> Result<Self> {
        Ok(Self {
            entries: manager.load_trash_view().await?,
        })
    }

    /// Replaces the view with the stored trash, without purging
    pub async fn refresh(&mut self, manager: &TrashManager) {
        self.entries = manager.trash_entries().await;
    }

    pub fn entries(&self) -> &[TrashEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops one entry from the view only
    pub fn remove_local(&mut self, note_id: &str) -> Option<TrashEntry> {
        let index = self.entries.iter().position(|e| e.note.id == note_id)?;
        Some(self.entries.remove(index))
    }

    /// Empties the view only
    pub fn clear_local(&mut self) {
        self.entries.clear();
    }
}
