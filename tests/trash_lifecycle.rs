use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use notekeep::{
    Clock, FileDocument, ManualClock, MemoryDocument, NoteDraft, NoteError, NoteKind, NoteStore,
    Persisting, RetentionPolicyStore, TrashManager, TrashView, DEFAULT_RETENTION_DAYS,
};
use tempfile::{tempdir, TempDir};

fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 2, 10, 18, 0, 0).unwrap()
}

struct Harness {
    dir: TempDir,
    clock: ManualClock,
    store: Arc<NoteStore>,
    trash: Arc<TrashManager>,
}

impl Harness {
    async fn new() -> Self {
        let dir = tempdir().expect("create temp dir");
        let clock = ManualClock::new(epoch());
        let (store, trash) = open(&dir, &clock).await;
        Self {
            dir,
            clock,
            store,
            trash,
        }
    }

    /// Opens fresh instances over the same files, as an app restart would
    async fn restart(&mut self) {
        let (store, trash) = open(&self.dir, &self.clock).await;
        self.store = store;
        self.trash = trash;
    }
}

async fn open(dir: &TempDir, clock: &ManualClock) -> (Arc<NoteStore>, Arc<TrashManager>) {
    let clock: Arc<dyn Clock> = Arc::new(clock.clone());
    let notes = Arc::new(FileDocument::new(dir.path().join("notes.json")));
    let settings = Arc::new(FileDocument::new(dir.path().join("settings.json")));

    let store = Arc::new(
        NoteStore::open(notes, Arc::clone(&clock), 10)
            .await
            .expect("open store"),
    );
    let policy = Arc::new(
        RetentionPolicyStore::open(settings)
            .await
            .expect("open policy"),
    );
    let trash = Arc::new(TrashManager::new(Arc::clone(&store), policy, clock));
    (store, trash)
}

#[tokio::test]
async fn added_checklist_is_active() {
    let h = Harness::new().await;

    h.store
        .add_note(NoteDraft::checklist("Groceries", ["milk"]))
        .await
        .unwrap();

    let active = h.store.active_notes().await;
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].kind, NoteKind::Checklist);
    assert!(active[0].deleted_at.is_none());
}

#[tokio::test]
async fn soft_deleted_note_shows_full_window() {
    let h = Harness::new().await;
    let note = h
        .store
        .add_note(NoteDraft::checklist("Groceries", ["milk"]))
        .await
        .unwrap();

    h.store.delete_note(&note.id).await.unwrap();

    let trash = h.store.get_trash_notes().await;
    assert_eq!(trash.len(), 1);
    assert_eq!(trash[0].deleted_at, Some(epoch()));

    let entries = h.trash.trash_entries().await;
    assert_eq!(entries[0].days_left, DEFAULT_RETENTION_DAYS);
}

#[tokio::test]
async fn expired_note_is_purged_when_trash_loads() {
    let h = Harness::new().await;
    let note = h.store.add_note(NoteDraft::text("Groceries", "")).await.unwrap();
    h.store.delete_note(&note.id).await.unwrap();

    h.clock.advance(Duration::days(31));
    let stored = h.store.get_note(&note.id).await.unwrap();
    assert_eq!(h.trash.days_left(&stored), 0);

    let view = h.trash.load_trash_view().await.unwrap();
    assert!(view.is_empty());
    assert!(h.store.get_trash_notes().await.is_empty());
    assert!(h.store.get_note(&note.id).await.is_none());
}

#[tokio::test]
async fn longer_window_saves_note_at_day_31() {
    let h = Harness::new().await;
    let note = h.store.add_note(NoteDraft::text("Groceries", "")).await.unwrap();
    h.store.delete_note(&note.id).await.unwrap();

    h.clock.advance(Duration::days(5));
    assert_eq!(h.trash.update_trash_retention_days(60).await.unwrap(), 60);

    h.clock.advance(Duration::days(26));
    let view = h.trash.load_trash_view().await.unwrap();
    assert_eq!(view.len(), 1);
    assert_eq!(view[0].days_left, 29);
}

#[tokio::test]
async fn shrinking_window_is_retroactive_and_purges() {
    let h = Harness::new().await;
    let note = h.store.add_note(NoteDraft::text("Old", "")).await.unwrap();
    h.store.delete_note(&note.id).await.unwrap();
    h.clock.advance(Duration::days(10));

    let stored = h.store.get_note(&note.id).await.unwrap();
    assert_eq!(h.trash.days_left(&stored), 20);

    h.trash.update_trash_retention_days(7).await.unwrap();
    assert_eq!(h.trash.days_left(&stored), 0);
    // Changing the policy runs the expiry check
    assert!(h.store.get_note(&note.id).await.is_none());
}

#[tokio::test]
async fn empty_trash_keeps_exactly_the_active_notes() {
    let h = Harness::new().await;
    let mut ids = Vec::new();
    for title in ["a", "b", "c", "d", "e"] {
        ids.push(h.store.add_note(NoteDraft::text(title, "")).await.unwrap().id);
    }
    for id in &ids[..3] {
        h.store.delete_note(id).await.unwrap();
    }
    let active_before: Vec<_> = h
        .store
        .all_notes()
        .await
        .into_iter()
        .filter(|n| !n.is_trashed())
        .collect();

    assert_eq!(h.trash.empty_trash().await.unwrap(), 3);

    assert_eq!(h.store.all_notes().await, active_before);
    assert!(h.trash.trash_entries().await.is_empty());
}

#[tokio::test]
async fn notes_survive_restart() {
    let mut h = Harness::new().await;
    let added = h
        .store
        .add_note(NoteDraft::text("Journal", "Day one"))
        .await
        .unwrap();

    h.restart().await;

    let reloaded = h.store.get_note(&added.id).await.expect("note after restart");
    assert_eq!(reloaded.title, "Journal");
    assert_eq!(reloaded.content, "Day one");
    assert_eq!(reloaded.kind, NoteKind::Text);
    assert!(!reloaded.id.is_empty());
    assert_eq!(reloaded.created_at, epoch());
    assert_eq!(reloaded.updated_at, epoch());
}

#[tokio::test]
async fn retention_survives_restart() {
    let mut h = Harness::new().await;
    h.trash.update_trash_retention_days_from_input("12").await.unwrap();

    h.restart().await;
    assert_eq!(h.trash.retention_days(), 12);

    h.trash
        .update_trash_retention_days_from_input("twelve")
        .await
        .unwrap();
    h.restart().await;
    assert_eq!(h.trash.retention_days(), DEFAULT_RETENTION_DAYS);
}

#[tokio::test]
async fn trash_entries_are_newest_deleted_first() {
    let h = Harness::new().await;
    let first = h.store.add_note(NoteDraft::text("first", "")).await.unwrap();
    let second = h.store.add_note(NoteDraft::text("second", "")).await.unwrap();

    h.store.delete_note(&first.id).await.unwrap();
    h.clock.advance(Duration::hours(2));
    h.store.delete_note(&second.id).await.unwrap();

    let order: Vec<_> = h
        .trash
        .trash_entries()
        .await
        .into_iter()
        .map(|e| e.note.id)
        .collect();
    assert_eq!(order, vec![second.id, first.id]);
}

#[tokio::test]
async fn restore_and_purge_are_idempotent() {
    let h = Harness::new().await;
    let note = h.store.add_note(NoteDraft::text("t", "")).await.unwrap();
    h.store.delete_note(&note.id).await.unwrap();

    assert!(h.trash.restore(&note.id).await.unwrap());
    assert!(!h.trash.restore(&note.id).await.unwrap());
    assert_eq!(h.store.active_notes().await.len(), 1);

    assert!(!h.trash.delete_permanently("no-such-id").await.unwrap());
    assert!(matches!(
        h.trash.delete_permanently(&note.id).await,
        Err(NoteError::NoteNotInTrash { .. })
    ));
}

#[tokio::test]
async fn optimistic_view_recovers_after_failed_write() {
    let doc = Arc::new(MemoryDocument::new());
    let clock = ManualClock::new(epoch());
    let store = Arc::new(
        NoteStore::open(doc.clone(), Arc::new(clock.clone()), 10)
            .await
            .unwrap(),
    );
    let policy = Arc::new(
        RetentionPolicyStore::open(Arc::new(MemoryDocument::new()))
            .await
            .unwrap(),
    );
    let trash = Arc::new(TrashManager::new(
        Arc::clone(&store),
        policy,
        Arc::new(clock.clone()),
    ));

    let note = store.add_note(NoteDraft::text("keep me", "")).await.unwrap();
    store.delete_note(&note.id).await.unwrap();

    let mut view = TrashView::load(&trash).await.unwrap();
    assert!(view.remove_local(&note.id).is_some());
    assert!(view.is_empty());

    doc.set_fail_writes(true);
    let manager = Arc::clone(&trash);
    let id = note.id.clone();
    let result = Persisting::spawn("permanent delete", async move {
        manager.delete_permanently(&id).await
    })
    .confirmed()
    .await;
    assert!(matches!(result, Err(NoteError::StorageUnavailable { .. })));

    view.refresh(&trash).await;
    assert_eq!(view.entries().len(), 1);
    assert_eq!(view.entries()[0].note.id, note.id);
}

#[tokio::test]
async fn concurrent_adds_are_not_lost() {
    let h = Harness::new().await;

    let mut handles = Vec::new();
    for i in 0..20 {
        let store = Arc::clone(&h.store);
        handles.push(tokio::spawn(async move {
            store.add_note(NoteDraft::text(format!("note {}", i), "")).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(h.store.all_notes().await.len(), 20);

    let mut h = h;
    h.restart().await;
    assert_eq!(h.store.all_notes().await.len(), 20);
}

#[tokio::test]
async fn retention_change_stands_when_purge_write_fails() {
    let notes = Arc::new(MemoryDocument::new());
    let settings = Arc::new(MemoryDocument::new());
    let clock = ManualClock::new(epoch());
    let store = Arc::new(
        NoteStore::open(notes.clone(), Arc::new(clock.clone()), 10)
            .await
            .unwrap(),
    );
    let policy = Arc::new(RetentionPolicyStore::open(settings.clone()).await.unwrap());
    let trash = TrashManager::new(Arc::clone(&store), policy, Arc::new(clock.clone()));

    let note = store.add_note(NoteDraft::text("old", "")).await.unwrap();
    store.delete_note(&note.id).await.unwrap();
    clock.advance(Duration::days(10));

    notes.set_fail_writes(true);
    assert_eq!(trash.update_trash_retention_days(7).await.unwrap(), 7);
    assert_eq!(trash.retention_days(), 7);
    let reopened = RetentionPolicyStore::open(settings.clone()).await.unwrap();
    assert_eq!(reopened.retention_days(), 7);

    // The expired note is still there and goes on the next successful purge
    assert_eq!(store.get_trash_notes().await.len(), 1);
    notes.set_fail_writes(false);
    let view = trash.load_trash_view().await.unwrap();
    assert!(view.is_empty());
    assert!(store.get_note(&note.id).await.is_none());
}
