//! Data model for the JSON descriptors stored inside an NSX archive.

pub mod attachment;
pub mod index;
pub mod note;
pub mod notebook;
