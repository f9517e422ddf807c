//! Attachment descriptors.
//!
//! The payload lives in a separate archive entry, `file_<md5>`, and is only
//! read when the attachment is materialized.

use serde::{Deserialize, Deserializer};

/// An attachment as described inside a note.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Attachment {
    /// Placeholder token embedded in the note content, if the attachment is inline.
    #[serde(default, deserialize_with = "empty_as_none")]
    pub r#ref: Option<String>,

    /// Content hash naming the payload entry.
    #[serde(default)]
    pub md5: String,

    /// Display name, usually the original file name.
    #[serde(default)]
    pub name: String,

    /// Original URL for attachments whose body was not exported.
    #[serde(
        default,
        rename = "source",
        alias = "source_url",
        deserialize_with = "empty_as_none"
    )]
    pub source_url: Option<String>,
}

impl Attachment {
    /// Archive entry holding the binary payload.
    pub fn payload_entry(&self) -> String {
        format!("file_{}", self.md5)
    }
}

pub(crate) fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_strings_are_absent() {
        let att: Attachment =
            serde_json::from_str(r#"{"ref":"","md5":"abc","name":"a.png","source":""}"#).unwrap();
        assert!(att.r#ref.is_none());
        assert!(att.source_url.is_none());
        assert_eq!(att.payload_entry(), "file_abc");
    }

    #[test]
    fn test_source_url_alias() {
        let att: Attachment =
            serde_json::from_str(r#"{"md5":"x","name":"clip","source_url":"https://example.com/a"}"#)
                .unwrap();
        assert_eq!(att.source_url.as_deref(), Some("https://example.com/a"));
    }
}
