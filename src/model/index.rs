//! The archive's `config.json` index.

use serde::Deserialize;

/// Name of the index entry inside every NSX archive.
pub const INDEX_ENTRY: &str = "config.json";

/// Enumerates the notebook and note entries of an archive.
///
/// Both lists hold entry names, which double as the object ids that notes
/// reference through `parent_id`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ArchiveIndex {
    pub notebook: Vec<String>,
    pub note: Vec<String>,
}

impl ArchiveIndex {
    /// Decode the index, reporting the first missing required key.
    pub fn from_json(bytes: &[u8]) -> std::result::Result<Self, String> {
        let value: serde_json::Value =
            serde_json::from_slice(bytes).map_err(|e| format!("invalid JSON: {e}"))?;
        for key in ["notebook", "note"] {
            if value.get(key).is_none() {
                return Err(format!("missing required key '{key}'"));
            }
        }
        serde_json::from_value(value).map_err(|e| e.to_string())
    }
}
