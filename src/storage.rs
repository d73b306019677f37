use std::{collections::HashSet, sync::Arc};

use chrono::{DateTime, Utc};
use log::{debug, error, info, trace, warn};
use tokio::sync::Mutex;

use crate::{Clock, DocumentStore, Note, NoteDraft, NoteError, NoteRevision, Result};

/// Outcome of a change applied to the working copy of the note list.
enum Mutation<T> {
    /// The list changed and must be persisted
    Changed(T),
    /// Nothing to persist
    Unchanged(T),
}

/// Owns the note collection and its persisted document.
///
/// Every state-changing operation runs under one async mutex: the current
/// list is copied, the change is applied to the copy, the whole copy is
/// written, and only then does the copy replace the authoritative list. A
/// failed write therefore leaves the store exactly as it was.
pub struct NoteStore {
    /// Document holding the JSON array of notes
    document: Arc<dyn DocumentStore>,

    /// Time source for ids and timestamps
    clock: Arc<dyn Clock>,

    /// Authoritative list, matching the last successful write
    notes: Mutex<Vec<Note>>,

    /// Maximum number of prior versions kept per note
    max_history: usize,
}

impl NoteStore {
    /// Opens the store, loading whatever the document currently holds.
    ///
    /// # Arguments
    ///
    /// * `document` - The document the note list is persisted to
    /// * `clock` - Time source used for ids and timestamps
    /// * `max_history` - How many prior versions to keep per note
    pub async fn open(
        document: Arc<dyn DocumentStore>,
        clock: Arc<dyn Clock>,
        max_history: usize,
    ) -> Result<Self> {
        let notes = load_notes(document.as_ref()).await?;
        info!("Note store opened with {} notes", notes.len());

        Ok(Self {
            document,
            clock,
            notes: Mutex::new(notes),
            max_history,
        })
    }

    /// Re-reads the document, discarding the in-memory list.
    ///
    /// Callers that updated their own view optimistically use this to get
    /// back to the authoritative state after a failed operation.
    ///
    /// # Returns
    ///
    /// The number of notes loaded in case of success or an error
    pub async fn reload(&self) -> Result<usize> {
        let mut notes = self.notes.lock().await;
        let loaded = load_notes(self.document.as_ref()).await?;
        *notes = loaded;
        info!("Reloaded {} notes", notes.len());
        Ok(notes.len())
    }

    /// Applies `change` to a copy of the list and persists the copy when it
    /// reports a change.
    async fn mutate<T, F>(&self, operation: &str, change: F) -> Result<T>
    where
        F: FnOnce(&mut Vec<Note>, DateTime<Utc>) -> Result<Mutation<T>>,
    {
        let mut notes = self.notes.lock().await;
        let mut working = notes.clone();
        let now = self.clock.now();

        match change(&mut working, now)? {
            Mutation::Unchanged(value) => {
                debug!("{}: nothing to persist", operation);
                Ok(value)
            }
            Mutation::Changed(value) => {
                self.persist(&working).await.map_err(|e| {
                    error!("{} failed, store left unchanged: {}", operation, e);
                    e
                })?;
                *notes = working;
                Ok(value)
            }
        }
    }

    /// Writes the full list as one document
    async fn persist(&self, notes: &[Note]) -> Result<()> {
        trace!("Serializing {} notes", notes.len());
        let json = serde_json::to_string_pretty(notes)?;
        self.document.write_document(&json).await
    }

    /// Creates a note from `draft`, assigning a fresh id and timestamps
    ///
    /// # Returns
    ///
    /// The stored note in case of success or an error
    pub async fn add_note(&self, draft: NoteDraft) -> Result<Note> {
        let note = self
            .mutate("add_note", |notes, now| {
                let id = unique_id(notes, now);
                let note = Note::from_draft(draft, id, now);
                notes.push(note.clone());
                Ok(Mutation::Changed(note))
            })
            .await?;

        info!("Note created: {}", note.id);
        Ok(note)
    }

    /// Updates an active note's content and flags.
    ///
    /// Identity, creation time, trash state and history are kept from the
    /// stored record; everything else is taken from `updated`. When the
    /// title, body or tasks change, the previous content is appended to the
    /// note's history.
    ///
    /// # Returns
    ///
    /// The stored note, or `NoteNotFound` / `NoteInTrash`
    pub async fn update_note(&self, updated: Note) -> Result<Note> {
        let max_history = self.max_history;
        let note = self
            .mutate("update_note", |notes, now| {
                let current = find_mut(notes, &updated.id)?;
                if current.is_trashed() {
                    return Err(NoteError::NoteInTrash {
                        id: updated.id.clone(),
                    });
                }

                if current.content_differs(&updated) {
                    let revision = current.revision(now);
                    push_history(&mut current.history, revision, max_history);
                }

                current.title = updated.title;
                current.content = updated.content;
                current.kind = updated.kind;
                current.tasks = updated.tasks;
                current.media_uri = updated.media_uri;
                current.color = updated.color;
                current.is_favorite = updated.is_favorite;
                current.is_hidden = updated.is_hidden;
                current.updated_at = now;

                Ok(Mutation::Changed(current.clone()))
            })
            .await?;

        info!("Note {} updated", note.id);
        Ok(note)
    }

    /// Moves a note to the trash by stamping `deleted_at`.
    ///
    /// # Returns
    ///
    /// `true` if the note was moved, `false` if it was already in the trash
    pub async fn delete_note(&self, note_id: &str) -> Result<bool> {
        let moved = self
            .mutate("delete_note", |notes, now| {
                let note = find_mut(notes, note_id)?;
                if note.is_trashed() {
                    return Ok(Mutation::Unchanged(false));
                }
                note.deleted_at = Some(now);
                Ok(Mutation::Changed(true))
            })
            .await?;

        if moved {
            info!("Note {} moved to trash", note_id);
        } else {
            debug!("Note {} is already in the trash", note_id);
        }
        Ok(moved)
    }

    /// Brings a trashed note back. Missing or active notes are left alone.
    ///
    /// # Returns
    ///
    /// `true` if a note was restored
    pub async fn restore_from_trash(&self, note_id: &str) -> Result<bool> {
        let restored = self
            .mutate("restore_from_trash", |notes, _| {
                match notes.iter_mut().find(|n| n.id == note_id) {
                    Some(note) if note.is_trashed() => {
                        note.deleted_at = None;
                        Ok(Mutation::Changed(true))
                    }
                    _ => Ok(Mutation::Unchanged(false)),
                }
            })
            .await?;

        if restored {
            info!("Note {} restored from trash", note_id);
        } else {
            debug!("Nothing to restore for note {}", note_id);
        }
        Ok(restored)
    }

    /// Removes a trashed note for good. A missing id is not an error; an
    /// active note must be moved to the trash first.
    ///
    /// # Returns
    ///
    /// `true` if a note was removed
    pub async fn permanently_delete_note(&self, note_id: &str) -> Result<bool> {
        let removed = self
            .mutate("permanently_delete_note", |notes, _| {
                let Some(index) = notes.iter().position(|n| n.id == note_id) else {
                    return Ok(Mutation::Unchanged(false));
                };
                if !notes[index].is_trashed() {
                    return Err(NoteError::NoteNotInTrash {
                        id: note_id.to_string(),
                    });
                }
                notes.remove(index);
                Ok(Mutation::Changed(true))
            })
            .await?;

        if removed {
            info!("Note {} permanently deleted", note_id);
        } else {
            debug!("Note {} already gone", note_id);
        }
        Ok(removed)
    }

    /// Removes every trashed note with a single write
    ///
    /// # Returns
    ///
    /// The number of notes removed
    pub async fn empty_trash(&self) -> Result<usize> {
        let removed = self.purge_trashed_where(|_| true).await?;
        info!("Trash emptied, {} notes removed", removed.len());
        Ok(removed.len())
    }

    /// Removes the trashed notes matching `predicate` with a single write.
    /// Active notes are never passed to the predicate.
    ///
    /// # Returns
    ///
    /// The ids of the removed notes
    pub async fn purge_trashed_where<P>(&self, predicate: P) -> Result<Vec<String>>
    where
        P: Fn(&Note) -> bool,
    {
        self.mutate("purge_trashed", |notes, _| {
            let mut removed = Vec::new();
            notes.retain(|note| {
                if note.is_trashed() && predicate(note) {
                    removed.push(note.id.clone());
                    false
                } else {
                    true
                }
            });

            if removed.is_empty() {
                Ok(Mutation::Unchanged(removed))
            } else {
                Ok(Mutation::Changed(removed))
            }
        })
        .await
    }

    /// Retrieves a note by its ID, trashed or not
    pub async fn get_note(&self, note_id: &str) -> Option<Note> {
        self.notes
            .lock()
            .await
            .iter()
            .find(|n| n.id == note_id)
            .cloned()
    }

    /// All trashed notes, in store order
    pub async fn get_trash_notes(&self) -> Vec<Note> {
        self.notes
            .lock()
            .await
            .iter()
            .filter(|n| n.is_trashed())
            .cloned()
            .collect()
    }

    /// Every note in store order, trashed ones included
    pub async fn all_notes(&self) -> Vec<Note> {
        self.notes.lock().await.clone()
    }

    /// Visible active notes, most recently updated first
    pub async fn active_notes(&self) -> Vec<Note> {
        self.active_where(|n| !n.is_hidden).await
    }

    /// Hidden active notes, most recently updated first
    pub async fn hidden_notes(&self) -> Vec<Note> {
        self.active_where(|n| n.is_hidden).await
    }

    /// Visible active favorites, most recently updated first
    pub async fn favorite_notes(&self) -> Vec<Note> {
        self.active_where(|n| n.is_favorite && !n.is_hidden).await
    }

    async fn active_where<P>(&self, predicate: P) -> Vec<Note>
    where
        P: Fn(&Note) -> bool,
    {
        let mut notes: Vec<Note> = self
            .notes
            .lock()
            .await
            .iter()
            .filter(|n| !n.is_trashed() && predicate(n))
            .cloned()
            .collect();
        notes.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        notes
    }

    /// Searches visible active notes by title and content using fuzzy matching
    /// Returns the matches sorted by relevance score
    pub async fn search_notes(&self, query: &str) -> Vec<Note> {
        use fuzzy_matcher::skim::SkimMatcherV2;
        use fuzzy_matcher::FuzzyMatcher;

        info!("Searching notes with query: '{}'", query);
        let matcher = SkimMatcherV2::default();

        let mut scored: Vec<(i64, Note)> = self
            .active_notes()
            .await
            .into_iter()
            .filter_map(|note| {
                // Title matches are weighted more heavily
                let title_score = matcher.fuzzy_match(&note.title, query).unwrap_or(0);
                let content_score = matcher.fuzzy_match(&note.content, query).unwrap_or(0);
                let score = title_score * 2 + content_score;
                (score > 0).then_some((score, note))
            })
            .collect();

        scored.sort_by(|a, b| b.0.cmp(&a.0));
        debug!("Search matched {} notes", scored.len());
        scored.into_iter().map(|(_, note)| note).collect()
    }

    /// Sets or clears the favorite flag of an active note
    pub async fn set_favorite(&self, note_id: &str, favorite: bool) -> Result<Note> {
        self.set_flag("set_favorite", note_id, |note| &mut note.is_favorite, favorite)
            .await
    }

    /// Sets or clears the hidden flag of an active note
    pub async fn set_hidden(&self, note_id: &str, hidden: bool) -> Result<Note> {
        self.set_flag("set_hidden", note_id, |note| &mut note.is_hidden, hidden)
            .await
    }

    async fn set_flag<F>(
        &self,
        operation: &str,
        note_id: &str,
        field: F,
        value: bool,
    ) -> Result<Note>
    where
        F: FnOnce(&mut Note) -> &mut bool,
    {
        self.mutate(operation, |notes, now| {
            let note = find_active_mut(notes, note_id)?;
            let flag = field(&mut *note);
            if *flag == value {
                return Ok(Mutation::Unchanged(note.clone()));
            }
            *flag = value;
            note.updated_at = now;
            Ok(Mutation::Changed(note.clone()))
        })
        .await
    }

    /// Flips the completion flag of one checklist task
    pub async fn toggle_task(&self, note_id: &str, index: usize) -> Result<Note> {
        self.mutate("toggle_task", |notes, now| {
            let note = find_active_mut(notes, note_id)?;
            let task = note
                .tasks
                .get_mut(index)
                .ok_or_else(|| NoteError::TaskNotFound {
                    id: note_id.to_string(),
                    index,
                })?;
            task.done = !task.done;
            note.updated_at = now;
            Ok(Mutation::Changed(note.clone()))
        })
        .await
    }

    /// Prior versions of a note, oldest first
    pub async fn note_history(&self, note_id: &str) -> Result<Vec<NoteRevision>> {
        self.notes
            .lock()
            .await
            .iter()
            .find(|n| n.id == note_id)
            .map(|n| n.history.clone())
            .ok_or_else(|| NoteError::NoteNotFound {
                id: note_id.to_string(),
            })
    }

    /// Replaces an active note's content with the history entry at `index`.
    /// The content being replaced is itself recorded in the history.
    pub async fn restore_version(&self, note_id: &str, index: usize) -> Result<Note> {
        let max_history = self.max_history;
        let note = self
            .mutate("restore_version", |notes, now| {
                let note = find_active_mut(notes, note_id)?;
                let revision =
                    note.history
                        .get(index)
                        .cloned()
                        .ok_or_else(|| NoteError::VersionNotFound {
                            id: note_id.to_string(),
                            index,
                        })?;

                let current = note.revision(now);
                push_history(&mut note.history, current, max_history);

                note.title = revision.title;
                note.content = revision.content;
                note.tasks = revision.tasks;
                note.updated_at = now;
                Ok(Mutation::Changed(note.clone()))
            })
            .await?;

        info!("Note {} restored to history entry {}", note_id, index);
        Ok(note)
    }
}

/// Reads and validates the notes document
async fn load_notes(document: &dyn DocumentStore) -> Result<Vec<Note>> {
    let Some(text) = document.read_document().await? else {
        debug!("Notes document absent, starting empty");
        return Ok(Vec::new());
    };
    if text.trim().is_empty() {
        warn!("Notes document is empty, starting empty");
        return Ok(Vec::new());
    }

    let notes: Vec<Note> = serde_json::from_str(&text)?;

    let mut seen = HashSet::with_capacity(notes.len());
    for note in &notes {
        if note.id.is_empty() {
            let message = "Note with an empty ID in notes document".to_string();
            error!("{}", message);
            return Err(NoteError::InvalidFormat { message });
        }
        if !seen.insert(note.id.as_str()) {
            let message = format!("Duplicate note ID in notes document: {}", note.id);
            error!("{}", message);
            return Err(NoteError::InvalidFormat { message });
        }
    }

    trace!("Loaded {} notes from document", notes.len());
    Ok(notes)
}

/// Generates a time-derived id that no note in `notes` uses yet
fn unique_id(notes: &[Note], now: DateTime<Utc>) -> String {
    let taken: HashSet<&str> = notes.iter().map(|n| n.id.as_str()).collect();
    let mut millis = now.timestamp_millis();
    loop {
        let id = millis.to_string();
        if !taken.contains(id.as_str()) {
            return id;
        }
        millis += 1;
    }
}

fn find_mut<'a>(notes: &'a mut [Note], note_id: &str) -> Result<&'a mut Note> {
    notes
        .iter_mut()
        .find(|n| n.id == note_id)
        .ok_or_else(|| NoteError::NoteNotFound {
            id: note_id.to_string(),
        })
}

fn find_active_mut<'a>(notes: &'a mut [Note], note_id: &str) -> Result<&'a mut Note> {
    let note = find_mut(notes, note_id)?;
    if note.is_trashed() {
        return Err(NoteError::NoteInTrash {
            id: note_id.to_string(),
        });
    }
    Ok(note)
}

fn push_history(history: &mut Vec<NoteRevision>, revision: NoteRevision, max_history: usize) {
    if max_history == 0 {
        history.clear();
        return;
    }
    history.push(revision);
    if history.len() > max_history {
        let excess = history.len() - max_history;
        history.drain(..excess);
    }
}
