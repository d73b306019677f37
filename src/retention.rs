//! Trash retention window.
//!
//! A single process-wide value, `trashRetentionDays`, persisted in the
//! settings document. Invalid values never surface as errors; they are
//! replaced by the default.
use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};

use log::{debug, info, warn};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::{DocumentStore, NoteError, Result};

/// Retention applied when nothing valid has been configured
pub const DEFAULT_RETENTION_DAYS: u32 = 30;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct Settings {
    trash_retention_days: i64,
}

/// Checks a retention value, which must be an integer of at least one day
pub fn validate_retention_days(days: i64) -> Result<u32> {
    if days < 1 {
        return Err(NoteError::InvalidRetentionValue {
            input: days.to_string(),
        });
    }
    u32::try_from(days).map_err(|_| NoteError::InvalidRetentionValue {
        input: days.to_string(),
    })
}

/// Parses user text into a retention value
pub fn parse_retention_days(input: &str) -> Result<u32> {
    let days: i64 = input
        .trim()
        .parse()
        .map_err(|_| NoteError::InvalidRetentionValue {
            input: input.to_string(),
        })?;
    validate_retention_days(days).map_err(|_| NoteError::InvalidRetentionValue {
        input: input.to_string(),
    })
}

/// Like [`parse_retention_days`], but recovers from bad input with the default
pub fn retention_days_or_default(input: &str) -> u32 {
    parse_retention_days(input).unwrap_or_else(|e| {
        warn!("{}; using {} days", e, DEFAULT_RETENTION_DAYS);
        DEFAULT_RETENTION_DAYS
    })
}

/// Reads `trashRetentionDays` from a settings document. Integers and numeric
/// strings are accepted; anything else, including a document that is not
/// JSON, yields the default.
fn stored_retention_days(text: &str) -> u32 {
    let settings: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            warn!(
                "Unreadable settings document ({}); using {} days",
                e, DEFAULT_RETENTION_DAYS
            );
            return DEFAULT_RETENTION_DAYS;
        }
    };

    let days = match settings.get("trashRetentionDays") {
        None | Some(Value::Null) => return DEFAULT_RETENTION_DAYS,
        Some(Value::Number(n)) => n.as_i64().map(validate_retention_days),
        Some(Value::String(s)) => Some(parse_retention_days(s)),
        Some(_) => None,
    };

    match days {
        Some(Ok(days)) => days,
        Some(Err(e)) => {
            warn!("Stored {}; using {} days", e, DEFAULT_RETENTION_DAYS);
            DEFAULT_RETENTION_DAYS
        }
        None => {
            warn!(
                "Stored retention {} is not a whole number; using {} days",
                settings["trashRetentionDays"], DEFAULT_RETENTION_DAYS
            );
            DEFAULT_RETENTION_DAYS
        }
    }
}

/// Holds and persists the retention window
pub struct RetentionPolicyStore {
    document: Arc<dyn DocumentStore>,
    days: AtomicU32,
    write_lock: Mutex<()>,
}

impl RetentionPolicyStore {
    /// Loads the stored policy. An absent document or unusable content yields
    /// the default; only a failed read is an error.
    pub async fn open(document: Arc<dyn DocumentStore>) -> Result<Self> {
        let days = match document.read_document().await? {
            Some(text) if !text.trim().is_empty() => stored_retention_days(&text),
            _ => {
                debug!("No stored retention policy, using default");
                DEFAULT_RETENTION_DAYS
            }
        };

        info!("Trash retention window: {} days", days);
        Ok(Self {
            document,
            days: AtomicU32::new(days),
            write_lock: Mutex::new(()),
        })
    }

    /// Current retention window in days
    pub fn retention_days(&self) -> u32 {
        self.days.load(Ordering::SeqCst)
    }

    /// Sets the retention window. Values below one day fall back to the
    /// default. The new value is only visible once it has been persisted.
    pub async fn set_retention_days(&self, days: i64) -> Result<u32> {
        let days = validate_retention_days(days).unwrap_or_else(|e| {
            warn!("{}; using {} days", e, DEFAULT_RETENTION_DAYS);
            DEFAULT_RETENTION_DAYS
        });
        self.store(days).await
    }

    /// Sets the retention window from text input, e.g. a settings field
    pub async fn set_retention_days_from_input(&self, input: &str) -> Result<u32> {
        self.store(retention_days_or_default(input)).await
    }

    async fn store(&self, days: u32) -> Result<u32> {
        let _guard = self.write_lock.lock().await;

        let settings = Settings {
            trash_retention_days: days as i64,
        };
        let json = serde_json::to_string_pretty(&settings)?;
        self.document.write_document(&json).await?;

        self.days.store(days, Ordering::SeqCst);
        info!("Trash retention window set to {} days", days);
        Ok(days)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryDocument;

    #[test]
    fn parse_accepts_positive_integers() {
        assert_eq!(parse_retention_days(" 7 ").unwrap(), 7);
        assert_eq!(parse_retention_days("1").unwrap(), 1);
    }

    #[test]
    fn parse_rejects_bad_input() {
        for input in ["", "abc", "0", "-3", "2.5", "99999999999"] {
            assert!(
                matches!(
                    parse_retention_days(input),
                    Err(NoteError::InvalidRetentionValue { .. })
                ),
                "accepted {:?}",
                input
            );
        }
    }

    #[test]
    fn bad_input_recovers_to_default() {
        assert_eq!(retention_days_or_default("soon"), DEFAULT_RETENTION_DAYS);
        assert_eq!(retention_days_or_default("0"), DEFAULT_RETENTION_DAYS);
        assert_eq!(retention_days_or_default("14"), 14);
    }

    #[tokio::test]
    async fn opens_with_default_when_absent() {
        let policy = RetentionPolicyStore::open(Arc::new(MemoryDocument::new()))
            .await
            .unwrap();
        assert_eq!(policy.retention_days(), DEFAULT_RETENTION_DAYS);
    }

    #[tokio::test]
    async fn stored_invalid_value_loads_as_default() {
        let doc = MemoryDocument::with_text(r#"{ "trashRetentionDays": 0 }"#);
        let policy = RetentionPolicyStore::open(Arc::new(doc)).await.unwrap();
        assert_eq!(policy.retention_days(), DEFAULT_RETENTION_DAYS);
    }

    #[tokio::test]
    async fn unusual_stored_values_load_without_error() {
        let cases = [
            (r#"{ "trashRetentionDays": "7" }"#, 7),
            (r#"{ "trashRetentionDays": " 12 " }"#, 12),
            (r#"{ "trashRetentionDays": 2.5 }"#, DEFAULT_RETENTION_DAYS),
            (r#"{ "trashRetentionDays": "soon" }"#, DEFAULT_RETENTION_DAYS),
            (r#"{ "trashRetentionDays": [7] }"#, DEFAULT_RETENTION_DAYS),
            (r#"{ "trashRetentionDays": null }"#, DEFAULT_RETENTION_DAYS),
            (r#"{ "theme": "dark" }"#, DEFAULT_RETENTION_DAYS),
            ("{ not json", DEFAULT_RETENTION_DAYS),
        ];

        for (text, expected) in cases {
            let doc = MemoryDocument::with_text(text);
            let policy = RetentionPolicyStore::open(Arc::new(doc))
                .await
                .unwrap_or_else(|e| panic!("{:?} failed to open: {}", text, e));
            assert_eq!(policy.retention_days(), expected, "stored {:?}", text);
        }
    }

    #[tokio::test]
    async fn set_persists_and_reloads() {
        let doc = Arc::new(MemoryDocument::new());
        let policy = RetentionPolicyStore::open(doc.clone()).await.unwrap();

        assert_eq!(policy.set_retention_days(7).await.unwrap(), 7);
        assert_eq!(policy.retention_days(), 7);

        let reopened = RetentionPolicyStore::open(doc).await.unwrap();
        assert_eq!(reopened.retention_days(), 7);
    }

    #[tokio::test]
    async fn invalid_text_input_resets_to_default() {
        let doc = Arc::new(MemoryDocument::new());
        let policy = RetentionPolicyStore::open(doc).await.unwrap();
        policy.set_retention_days(5).await.unwrap();

        let days = policy.set_retention_days_from_input("never").await.unwrap();
        assert_eq!(days, DEFAULT_RETENTION_DAYS);
        assert_eq!(policy.retention_days(), DEFAULT_RETENTION_DAYS);
    }

    #[tokio::test]
    async fn failed_write_keeps_previous_value() {
        let doc = Arc::new(MemoryDocument::new());
        let policy = RetentionPolicyStore::open(doc.clone()).await.unwrap();
        doc.set_fail_writes(true);

        assert!(policy.set_retention_days(3).await.is_err());
        assert_eq!(policy.retention_days(), DEFAULT_RETENTION_DAYS);
    }
}
