//! HTML → Markdown conversion.
//!
//! The conversion itself is delegated to an external tool; [`TextConverter`]
//! is the seam the archive pipeline talks to.

pub mod pandoc;

use crate::error::Result;

/// Marker pandoc leaves for tables it cannot express in the target dialect.
pub const UNCONVERTED_TABLE_MARKER: &str = "[TABLE]";

/// Converts one note body at a time.
pub trait TextConverter {
    /// Convert HTML to Markdown. Errors are scoped to the note being converted.
    fn convert(&mut self, html: &str) -> Result<String>;
}

impl<T: TextConverter + ?Sized> TextConverter for &mut T {
    fn convert(&mut self, html: &str) -> Result<String> {
        (**self).convert(html)
    }
}

impl<T: TextConverter + ?Sized> TextConverter for Box<T> {
    fn convert(&mut self, html: &str) -> Result<String> {
        (**self).convert(html)
    }
}

/// Whether the converter left content it could not represent.
pub fn has_unconverted_tables(markdown: &str) -> bool {
    markdown.contains(UNCONVERTED_TABLE_MARKER)
}
