//! Notebook descriptors.

use serde::Deserialize;

/// Title given to notebooks and notes without one.
pub const UNTITLED: &str = "Untitled";

/// A notebook entry. Its id is the archive entry name, not a JSON field.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Notebook {
    #[serde(default)]
    pub title: Option<String>,
}

impl Notebook {
    /// The notebook title, or [`UNTITLED`] when empty.
    pub fn display_title(&self) -> &str {
        match self.title.as_deref() {
            Some(t) if !t.trim().is_empty() => t,
            _ => UNTITLED,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_title() {
        let nb: Notebook = serde_json::from_str(r#"{"title":"Ideas"}"#).unwrap();
        assert_eq!(nb.display_title(), "Ideas");
        let nb: Notebook = serde_json::from_str(r#"{"title":""}"#).unwrap();
        assert_eq!(nb.display_title(), UNTITLED);
        let nb: Notebook = serde_json::from_str("{}").unwrap();
        assert_eq!(nb.display_title(), UNTITLED);
    }
}
