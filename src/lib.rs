//! `nsx2md` converts Synology Note Station exports to Markdown.
//!
//! An `.nsx` archive is a ZIP file with a JSON index, one JSON entry per
//! notebook and note, and one binary entry per attachment. This crate turns
//! each notebook into a directory of Markdown files with a media folder,
//! using pandoc for the HTML → Markdown step.

pub mod config;
pub mod converter;
pub mod error;
pub mod export;
pub mod model;
pub mod parser;
pub mod store;
