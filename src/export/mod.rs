//! Materialization of archives on disk: names, attachments, headers, notes.

pub mod archive;
pub mod attachment;
pub mod filename;
pub mod metadata;
