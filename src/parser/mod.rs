//! Note content parsing: rewriting vendor HTML before conversion.

pub mod content;
