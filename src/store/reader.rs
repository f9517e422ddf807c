//! NSX store: read-only access to the entries of an archive.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use tracing::debug;
use zip::result::ZipError;
use zip::ZipArchive;

use crate::error::{NsxError, Result};
use crate::model::attachment::Attachment;
use crate::model::index::{ArchiveIndex, INDEX_ENTRY};

/// An opened NSX archive.
///
/// The container is opened once and only ever read; entries are decoded on
/// demand so large attachment payloads are never held longer than needed.
pub struct NsxArchive {
    path: PathBuf,
    zip: ZipArchive<BufReader<File>>,
}

impl NsxArchive {
    /// Open an archive for reading.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.is_file() {
            return Err(NsxError::ArchiveNotFound(path));
        }
        let file = File::open(&path).map_err(|e| NsxError::io(&path, e))?;
        let zip = ZipArchive::new(BufReader::new(file)).map_err(|e| NsxError::InvalidArchive {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        debug!(path = %path.display(), entries = zip.len(), "Opened archive");
        Ok(Self { path, zip })
    }

    /// Load and validate the `config.json` index.
    pub fn index(&mut self) -> Result<ArchiveIndex> {
        let bytes = match self.read_entry(INDEX_ENTRY) {
            Ok(bytes) => bytes,
            Err(NsxError::MissingEntry(_)) => {
                return Err(NsxError::MissingIndex(self.path.clone()))
            }
            Err(e) => return Err(e),
        };
        ArchiveIndex::from_json(&bytes).map_err(|reason| NsxError::MalformedIndex {
            path: self.path.clone(),
            reason,
        })
    }

    /// Read the raw bytes of a named entry.
    pub fn read_entry(&mut self, name: &str) -> Result<Vec<u8>> {
        let mut entry = match self.zip.by_name(name) {
            Ok(entry) => entry,
            Err(ZipError::FileNotFound) => return Err(NsxError::MissingEntry(name.to_string())),
            Err(e) => {
                return Err(NsxError::EntryRead {
                    entry: name.to_string(),
                    reason: e.to_string(),
                })
            }
        };
        let mut buf = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut buf)
            .map_err(|e| NsxError::EntryRead {
                entry: name.to_string(),
                reason: e.to_string(),
            })?;
        Ok(buf)
    }

    /// Read and decode a JSON entry.
    pub fn read_json<T: DeserializeOwned>(&mut self, name: &str) -> Result<T> {
        let bytes = self.read_entry(name)?;
        serde_json::from_slice(&bytes).map_err(|source| NsxError::Json {
            entry: name.to_string(),
            source,
        })
    }

    /// Read the binary payload of an attachment.
    pub fn read_payload(&mut self, attachment: &Attachment) -> Result<Vec<u8>> {
        self.read_entry(&attachment.payload_entry())
    }
}
