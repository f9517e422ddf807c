//! Read-only archive access.

pub mod reader;
