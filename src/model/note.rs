//! Note descriptors.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::attachment::{empty_as_none, Attachment};
use super::notebook::UNTITLED;

/// A note entry. Its id is the archive entry name.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Note {
    #[serde(default)]
    pub title: String,

    /// Creation time in Unix seconds.
    #[serde(default)]
    pub ctime: Option<f64>,

    /// Modification time in Unix seconds.
    #[serde(default)]
    pub mtime: Option<f64>,

    #[serde(default, rename = "tag")]
    pub tags: Vec<String>,

    /// Rich-text body as HTML.
    #[serde(default)]
    pub content: String,

    /// Attachments keyed by their note-local id, in key order.
    #[serde(default, rename = "attachment")]
    pub attachments: BTreeMap<String, Attachment>,

    #[serde(default, deserialize_with = "empty_as_none")]
    pub parent_id: Option<String>,

    /// Set on password-protected notes, whose content is ciphertext.
    #[serde(default)]
    pub encrypt: bool,
}

impl Note {
    /// The note title, or `Untitled` when empty.
    pub fn display_title(&self) -> &str {
        if self.title.trim().is_empty() {
            UNTITLED
        } else {
            &self.title
        }
    }

    pub fn created(&self) -> Option<DateTime<Utc>> {
        self.ctime.and_then(unix_seconds)
    }

    pub fn modified(&self) -> Option<DateTime<Utc>> {
        self.mtime.and_then(unix_seconds)
    }
}

/// Cheaply extract the title from a note that failed to decode fully.
pub fn extract_title(json_bytes: &[u8]) -> Option<String> {
    #[derive(Deserialize)]
    struct Minimal {
        title: String,
    }
    serde_json::from_slice::<Minimal>(json_bytes)
        .ok()
        .map(|m| m.title)
        .filter(|t| !t.is_empty())
}

fn unix_seconds(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() || secs <= 0.0 {
        return None;
    }
    DateTime::from_timestamp(secs.trunc() as i64, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_note() {
        let json = r#"{
            "title": "Groceries",
            "ctime": 1500000000,
            "mtime": 1500000060.5,
            "tag": ["home", "todo"],
            "content": "<p>milk</p>",
            "attachment": {
                "b": {"md5": "m2", "name": "two.pdf"},
                "a": {"ref": "TOKEN", "md5": "m1", "name": "one.png"}
            },
            "parent_id": "nb1"
        }"#;
        let note: Note = serde_json::from_str(json).unwrap();
        assert_eq!(note.display_title(), "Groceries");
        assert_eq!(note.tags, vec!["home", "todo"]);
        assert_eq!(note.parent_id.as_deref(), Some("nb1"));
        assert_eq!(note.created().unwrap().timestamp(), 1_500_000_000);
        assert_eq!(note.modified().unwrap().timestamp(), 1_500_000_060);
        let keys: Vec<_> = note.attachments.keys().cloned().collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert!(!note.encrypt);
    }

    #[test]
    fn test_minimal_note_defaults() {
        let note: Note = serde_json::from_str("{}").unwrap();
        assert_eq!(note.display_title(), UNTITLED);
        assert!(note.created().is_none());
        assert!(note.parent_id.is_none());
        assert!(note.attachments.is_empty());
    }

    #[test]
    fn test_zero_timestamp_is_absent() {
        let note: Note = serde_json::from_str(r#"{"ctime":0}"#).unwrap();
        assert!(note.created().is_none());
    }

    #[test]
    fn test_extract_title_from_broken_note() {
        let bytes = br#"{"title":"Secret","content":12,"attachment":"bad"}"#;
        assert!(serde_json::from_slice::<Note>(bytes).is_err());
        assert_eq!(extract_title(bytes).as_deref(), Some("Secret"));
        assert_eq!(extract_title(b"\x00garbage"), None);
    }
}
