//! Shared fixtures: in-memory NSX archives and a converter that needs no pandoc.
#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::Path;

use regex::Regex;
use serde_json::{json, Value};
use zip::write::SimpleFileOptions;

use nsx2md::config::Config;
use nsx2md::converter::TextConverter;
use nsx2md::error::{NsxError, Result};

/// Marker in note HTML that makes [`StripTags`] fail.
pub const FAIL_MARKER: &str = "FAIL_CONVERSION";

/// Turns `<img src="X">` into `![](X)` and drops every other tag.
pub struct StripTags {
    pub calls: usize,
}

impl StripTags {
    pub fn new() -> Self {
        Self { calls: 0 }
    }
}

impl TextConverter for StripTags {
    fn convert(&mut self, html: &str) -> Result<String> {
        self.calls += 1;
        if html.contains(FAIL_MARKER) {
            return Err(NsxError::ConverterTimeout { seconds: 5 });
        }
        let img = Regex::new(r#"<img src="([^"]*)">"#).unwrap();
        let with_images = img.replace_all(html, "![](${1})");
        let tags = Regex::new(r"<[^>]+>").unwrap();
        Ok(format!("{}\n", tags.replace_all(&with_images, "").trim()))
    }
}

/// Builds an `.nsx` archive entry by entry.
#[derive(Default)]
pub struct ArchiveBuilder {
    notebooks: Vec<String>,
    notes: Vec<String>,
    entries: Vec<(String, Vec<u8>)>,
    index: Option<Vec<u8>>,
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notebook(mut self, id: &str, title: &str) -> Self {
        self.notebooks.push(id.to_string());
        self.entries
            .push((id.to_string(), json!({ "title": title }).to_string().into_bytes()));
        self
    }

    pub fn note(mut self, id: &str, note: Value) -> Self {
        self.notes.push(id.to_string());
        self.entries.push((id.to_string(), note.to_string().into_bytes()));
        self
    }

    /// Listed in the index without an entry of its own.
    pub fn dangling_note(mut self, id: &str) -> Self {
        self.notes.push(id.to_string());
        self
    }

    pub fn raw_note(mut self, id: &str, bytes: &[u8]) -> Self {
        self.notes.push(id.to_string());
        self.entries.push((id.to_string(), bytes.to_vec()));
        self
    }

    pub fn payload(mut self, md5: &str, bytes: &[u8]) -> Self {
        self.entries.push((format!("file_{md5}"), bytes.to_vec()));
        self
    }

    /// Replace the generated `config.json`.
    pub fn index(mut self, raw: &[u8]) -> Self {
        self.index = Some(raw.to_vec());
        self
    }

    pub fn no_index(mut self) -> Self {
        self.index = Some(Vec::new());
        self
    }

    pub fn write(self, path: &Path) {
        let file = File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = SimpleFileOptions::default();

        let index = match self.index {
            Some(raw) => raw,
            None => json!({ "notebook": self.notebooks, "note": self.notes })
                .to_string()
                .into_bytes(),
        };
        if !index.is_empty() {
            zip.start_file("config.json", options).unwrap();
            zip.write_all(&index).unwrap();
        }
        for (name, body) in &self.entries {
            zip.start_file(name.as_str(), options).unwrap();
            zip.write_all(body).unwrap();
        }
        zip.finish().unwrap();
    }
}

/// A note JSON value under `parent`.
pub fn note(title: &str, parent: &str, content: &str) -> Value {
    json!({
        "title": title,
        "parent_id": parent,
        "content": content,
        "ctime": 1_500_000_000,
        "mtime": 1_600_000_000,
    })
}

/// Configuration without any header so bodies can be compared verbatim.
pub fn bare_config() -> Config {
    let mut config = Config::default();
    config.metadata.insert_title = false;
    config.metadata.utc_timestamps = true;
    config
}
