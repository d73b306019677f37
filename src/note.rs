//! Core data structures for notekeep.
//!
//! This module contains the note record as it is persisted, along with the
//! draft used to create one and the history entries kept for restoring
//! earlier versions.
use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::NoteError;

/// Variant tag of a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteKind {
    /// Plain text note
    #[default]
    Text,
    /// Note with an ordered list of tasks
    Checklist,
    /// Note referencing a media item through `media_uri`
    Media,
}

/// Category label, drawn from a small closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteColor {
    #[default]
    Default,
    Red,
    Orange,
    Yellow,
    Green,
    Blue,
    Purple,
}

impl NoteColor {
    pub const ALL: [NoteColor; 7] = [
        NoteColor::Default,
        NoteColor::Red,
        NoteColor::Orange,
        NoteColor::Yellow,
        NoteColor::Green,
        NoteColor::Blue,
        NoteColor::Purple,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NoteColor::Default => "default",
            NoteColor::Red => "red",
            NoteColor::Orange => "orange",
            NoteColor::Yellow => "yellow",
            NoteColor::Green => "green",
            NoteColor::Blue => "blue",
            NoteColor::Purple => "purple",
        }
    }
}

impl fmt::Display for NoteColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NoteColor {
    type Err = NoteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        NoteColor::ALL
            .into_iter()
            .find(|color| color.as_str() == wanted)
            .ok_or_else(|| NoteError::ApplicationError {
                message: format!("Unknown color: {}", s),
            })
    }
}

/// A single checklist entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub text: String,
    #[serde(default)]
    pub done: bool,
}

impl Task {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            done: false,
        }
    }
}

/// A prior version of a note's content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteRevision {
    pub title: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tasks: Vec<Task>,
    /// When this version was replaced
    pub saved_at: DateTime<Utc>,
}

/// Represents a single note in the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    /// Unique identifier, assigned by the store
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(rename = "type", default)]
    pub kind: NoteKind,
    /// Ordered tasks of a checklist note
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tasks: Vec<Task>,
    /// Media reference of a media note
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_uri: Option<String>,
    #[serde(default)]
    pub color: NoteColor,
    #[serde(default)]
    pub is_favorite: bool,
    #[serde(default)]
    pub is_hidden: bool,
    /// When the note was created
    pub created_at: DateTime<Utc>,
    /// Last content modification time
    pub updated_at: DateTime<Utc>,
    /// Set while the note is in the trash
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
    /// Prior versions, oldest first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<NoteRevision>,
}

impl Note {
    /// Builds a note from a draft with the identity and timestamps the store assigned
    pub fn from_draft(draft: NoteDraft, id: String, now: DateTime<Utc>) -> Self {
        Note {
            id,
            title: draft.title,
            content: draft.content,
            kind: draft.kind,
            tasks: draft.tasks,
            media_uri: draft.media_uri,
            color: draft.color,
            is_favorite: draft.is_favorite,
            is_hidden: draft.is_hidden,
            created_at: now,
            updated_at: now,
            deleted_at: None,
            history: Vec::new(),
        }
    }

    /// Whether the note currently sits in the trash
    pub fn is_trashed(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Snapshot of the current content as a history entry
    pub fn revision(&self, saved_at: DateTime<Utc>) -> NoteRevision {
        NoteRevision {
            title: self.title.clone(),
            content: self.content.clone(),
            tasks: self.tasks.clone(),
            saved_at,
        }
    }

    /// True when title, body or tasks differ from `other`
    pub fn content_differs(&self, other: &Note) -> bool {
        self.title != other.title || self.content != other.content || self.tasks != other.tasks
    }
}

/// The caller-supplied part of a new note
#[derive(Debug, Clone, Default)]
pub struct NoteDraft {
    pub title: String,
    pub content: String,
    pub kind: NoteKind,
    pub tasks: Vec<Task>,
    pub media_uri: Option<String>,
    pub color: NoteColor,
    pub is_favorite: bool,
    pub is_hidden: bool,
}

impl NoteDraft {
    /// A plain text note
    pub fn text(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            ..Default::default()
        }
    }

    /// A checklist note with the given task texts, none completed
    pub fn checklist<I, S>(title: impl Into<String>, tasks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            title: title.into(),
            kind: NoteKind::Checklist,
            tasks: tasks.into_iter().map(Task::new).collect(),
            ..Default::default()
        }
    }

    /// A note pointing at a media item
    pub fn media(title: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            kind: NoteKind::Media,
            media_uri: Some(uri.into()),
            ..Default::default()
        }
    }

    pub fn with_color(mut self, color: NoteColor) -> Self {
        self.color = color;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persisted_keys_are_camel_case() {
        let now = Utc::now();
        let mut note = Note::from_draft(NoteDraft::checklist("Groceries", ["milk"]), "1".into(), now);
        note.deleted_at = Some(now);

        let value = serde_json::to_value(&note).unwrap();
        assert_eq!(value["type"], "checklist");
        assert_eq!(value["isFavorite"], false);
        assert!(value.get("deletedAt").is_some());
        assert!(value.get("createdAt").is_some());
        assert_eq!(value["tasks"][0]["text"], "milk");
    }

    #[test]
    fn missing_optional_fields_use_defaults() {
        let json = r#"{
            "id": "42",
            "title": "Old note",
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": "2024-01-01T00:00:00Z"
        }"#;
        let note: Note = serde_json::from_str(json).unwrap();
        assert_eq!(note.kind, NoteKind::Text);
        assert_eq!(note.color, NoteColor::Default);
        assert!(!note.is_trashed());
        assert!(note.history.is_empty());
    }

    #[test]
    fn color_parses_case_insensitively() {
        assert_eq!("Blue".parse::<NoteColor>().unwrap(), NoteColor::Blue);
        assert!("magenta".parse::<NoteColor>().is_err());
    }
}
