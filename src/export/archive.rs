//! Convert a whole archive into notebook directories.
//!
//! One call to [`ArchiveConverter::convert`] walks an archive through
//! opening, notebook directory creation, note conversion and cleanup. Every
//! lookup table lives only for the duration of that call. Failures below the
//! archive level are collected in the [`ArchiveReport`] instead of aborting.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::converter::{has_unconverted_tables, TextConverter};
use crate::error::{NsxError, Result};
use crate::model::index::ArchiveIndex;
use crate::model::note::{extract_title, Note};
use crate::model::notebook::{Notebook, UNTITLED};
use crate::parser::content::rewrite_content;
use crate::store::reader::NsxArchive;

use super::attachment::{materialize_note_attachments, LinkContext, NoteAttachments};
use super::filename::unique_path;
use super::metadata::{format_time_with, render_note, NoteMeta};

/// Extension of Note Station export files.
pub const ARCHIVE_EXTENSION: &str = "nsx";

/// A note that was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnconvertedNote {
    pub id: String,
    /// Known when the note could at least be partially decoded.
    pub title: Option<String>,
    pub reason: String,
}

impl fmt::Display for UnconvertedNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.title {
            Some(title) => write!(f, "\"{}\" ({}): {}", title, self.id, self.reason),
            None => write!(f, "{}: {}", self.id, self.reason),
        }
    }
}

/// An output directory created for a notebook.
#[derive(Debug, Clone)]
pub struct NotebookSummary {
    pub title: String,
    pub dir: PathBuf,
    pub notes: usize,
    /// The recycle-bin directory for notes without a notebook.
    pub synthetic: bool,
}

/// Outcome of converting one archive.
#[derive(Debug, Clone, Default)]
pub struct ArchiveReport {
    pub archive: PathBuf,
    pub notebooks: Vec<NotebookSummary>,
    pub total_notes: usize,
    pub converted: usize,
    pub unconverted: Vec<UnconvertedNote>,
    pub attachments_written: usize,
    pub attachments_from_source: usize,
    pub attachments_missing: usize,
    pub bytes_written: u64,
}

impl ArchiveReport {
    /// Number of real notebooks (the recycle bin is not counted).
    pub fn notebook_count(&self) -> usize {
        self.notebooks.iter().filter(|n| !n.synthetic).count()
    }

    fn add_attachments(&mut self, atts: &NoteAttachments) {
        self.attachments_written += atts.written;
        self.attachments_from_source += atts.from_source;
        self.attachments_missing += atts.missing;
        self.bytes_written += atts.bytes_written;
    }
}

struct NotebookDir {
    title: String,
    dir: PathBuf,
    media: PathBuf,
    synthetic: bool,
    notes: usize,
}

/// Notebook id → output directory, scoped to one archive.
struct Notebooks {
    dirs: Vec<NotebookDir>,
    by_id: HashMap<String, usize>,
    recycle: Option<usize>,
}

impl Notebooks {
    /// The notebook a note belongs to, falling back to the recycle bin.
    fn resolve(&self, parent_id: Option<&str>) -> Option<usize> {
        parent_id
            .and_then(|id| self.by_id.get(id).copied())
            .or(self.recycle)
    }
}

struct NoteFailure {
    title: Option<String>,
    error: NsxError,
}

impl NoteFailure {
    fn new(title: Option<&str>, error: NsxError) -> Self {
        Self {
            title: title.map(str::to_string),
            error,
        }
    }
}

/// Drives the conversion of archives with one configuration and converter.
pub struct ArchiveConverter<'a, C> {
    config: &'a Config,
    converter: C,
    output_root: PathBuf,
}

impl<'a, C: TextConverter> ArchiveConverter<'a, C> {
    /// Notebook directories are created directly under `output_root`.
    pub fn new(config: &'a Config, converter: C, output_root: impl Into<PathBuf>) -> Self {
        Self {
            config,
            converter,
            output_root: output_root.into(),
        }
    }

    /// Convert archives one after another. An error only affects its own entry.
    pub fn convert_all(
        &mut self,
        archives: &[PathBuf],
        progress: Option<&dyn Fn(&Path, usize, usize)>,
    ) -> Vec<Result<ArchiveReport>> {
        archives
            .iter()
            .map(|path| {
                let per_note = |current: usize, total: usize| {
                    if let Some(cb) = progress {
                        cb(path, current, total);
                    }
                };
                let result = self.convert(path, Some(&per_note));
                if let Err(e) = &result {
                    warn!(archive = %path.display(), error = %e, "Archive not converted");
                }
                result
            })
            .collect()
    }

    /// Convert a single archive.
    ///
    /// Returns an error only when the archive as a whole is unusable
    /// (missing, not a ZIP, no or malformed index) or output directories
    /// cannot be created.
    pub fn convert(
        &mut self,
        archive_path: &Path,
        progress: Option<&dyn Fn(usize, usize)>,
    ) -> Result<ArchiveReport> {
        let mut archive = NsxArchive::open(archive_path)?;
        let index = archive.index()?;
        info!(
            archive = %archive_path.display(),
            notebooks = index.notebook.len(),
            notes = index.note.len(),
            "Converting archive"
        );

        let mut report = ArchiveReport {
            archive: archive_path.to_path_buf(),
            total_notes: index.note.len(),
            ..Default::default()
        };

        let mut notebooks = self.materialize_notebooks(&mut archive, &index)?;

        let total = index.note.len();
        for (i, note_id) in index.note.iter().enumerate() {
            if let Some(cb) = progress {
                cb(i, total);
            }
            match self.convert_note(&mut archive, &mut notebooks, note_id) {
                Ok(atts) => {
                    report.converted += 1;
                    report.add_attachments(&atts);
                }
                Err(failure) => {
                    warn!(
                        note_id = %note_id,
                        title = failure.title.as_deref().unwrap_or(""),
                        error = %failure.error,
                        "Note not converted"
                    );
                    report.unconverted.push(UnconvertedNote {
                        id: note_id.clone(),
                        title: failure.title,
                        reason: failure.error.to_string(),
                    });
                }
            }
        }
        if let Some(cb) = progress {
            cb(total, total);
        }

        cleanup(&notebooks);
        report.notebooks = notebooks
            .dirs
            .into_iter()
            .filter(|nb| !nb.synthetic || nb.notes > 0)
            .map(|nb| NotebookSummary {
                title: nb.title,
                dir: nb.dir,
                notes: nb.notes,
                synthetic: nb.synthetic,
            })
            .collect();

        Ok(report)
    }

    /// Create every notebook directory (and its media directory) up front.
    ///
    /// Only a missing output root is fatal. A notebook whose directory cannot
    /// be created is left unmapped so its notes fall back to the recycle bin.
    fn materialize_notebooks(
        &self,
        archive: &mut NsxArchive,
        index: &ArchiveIndex,
    ) -> Result<Notebooks> {
        std::fs::create_dir_all(&self.output_root)
            .map_err(|e| NsxError::io(&self.output_root, e))?;

        let mut notebooks = Notebooks {
            dirs: Vec::with_capacity(index.notebook.len() + 1),
            by_id: HashMap::new(),
            recycle: None,
        };

        for id in &index.notebook {
            let title = match archive.read_json::<Notebook>(id) {
                Ok(nb) => nb.display_title().to_string(),
                Err(e) => {
                    warn!(notebook_id = %id, error = %e, "Unreadable notebook, using default title");
                    UNTITLED.to_string()
                }
            };
            info!(notebook = %title, "Converting notebook");
            match self.create_notebook_dir(&title, false) {
                Ok(nb) => {
                    notebooks.by_id.insert(id.clone(), notebooks.dirs.len());
                    notebooks.dirs.push(nb);
                }
                Err(e) => warn!(
                    notebook = %title,
                    error = %e,
                    "Could not create notebook directory, its notes go to the recycle bin"
                ),
            }
        }

        let recycle_title = &self.config.general.recycle_bin_title;
        match self.create_notebook_dir(recycle_title, true) {
            Ok(nb) => {
                notebooks.recycle = Some(notebooks.dirs.len());
                notebooks.dirs.push(nb);
            }
            Err(e) => warn!(error = %e, "Could not create recycle bin directory"),
        }

        Ok(notebooks)
    }

    fn create_notebook_dir(&self, title: &str, synthetic: bool) -> Result<NotebookDir> {
        let files = &self.config.files;
        let dir = unique_path(
            &self.output_root,
            title,
            "",
            files.rules(),
            files.max_name_bytes,
        );
        let media = dir.join(&files.media_dir);
        std::fs::create_dir_all(&media).map_err(|e| NsxError::io(&media, e))?;
        debug!(dir = %dir.display(), synthetic, "Created notebook directory");
        Ok(NotebookDir {
            title: title.to_string(),
            dir,
            media,
            synthetic,
            notes: 0,
        })
    }

    /// Run the content → converter → attachment → header → file pipeline.
    fn convert_note(
        &mut self,
        archive: &mut NsxArchive,
        notebooks: &mut Notebooks,
        note_id: &str,
    ) -> std::result::Result<NoteAttachments, NoteFailure> {
        let bytes = archive
            .read_entry(note_id)
            .map_err(|e| NoteFailure::new(None, e))?;
        let note: Note = serde_json::from_slice(&bytes).map_err(|source| NoteFailure {
            title: extract_title(&bytes),
            error: NsxError::Json {
                entry: note_id.to_string(),
                source,
            },
        })?;
        let title = note.display_title().to_string();
        let fail = |error: NsxError| NoteFailure::new(Some(&title), error);

        if note.encrypt {
            return Err(fail(NsxError::LockedNote(note_id.to_string())));
        }

        let nb_index = notebooks
            .resolve(note.parent_id.as_deref())
            .ok_or_else(|| fail(NsxError::UnresolvedNotebook(note_id.to_string())))?;
        let notebook = &notebooks.dirs[nb_index];
        if notebook.synthetic {
            debug!(note_id = %note_id, parent = ?note.parent_id, "Note routed to recycle bin");
        }

        let html = rewrite_content(&note.content);
        let mut body = self.converter.convert(&html).map_err(fail)?;
        if has_unconverted_tables(&body) {
            warn!(
                note_id = %note_id,
                title = %title,
                "Note contains tables that could not be converted"
            );
        }

        let files = &self.config.files;
        let ctx = LinkContext {
            media_dir: &notebook.media,
            note_dir: &notebook.dir,
            links: &self.config.links,
            rules: files.rules(),
            max_name_bytes: files.max_name_bytes,
        };
        let attachments = materialize_note_attachments(archive, &note, &mut body, &ctx);

        let meta = NoteMeta {
            title: &title,
            created: note.created(),
            modified: note.modified(),
            tags: &note.tags,
            attachments: &attachments.list,
        };
        let content = render_note(&meta, &body, &self.config.metadata);

        let file_title = match note.created() {
            Some(created) if files.creation_date_in_filename => format!(
                "{} {}",
                format_time_with(created, "%Y-%m-%d", self.config.metadata.utc_timestamps),
                title
            ),
            _ => title.clone(),
        };
        let path = unique_path(
            &notebook.dir,
            &file_title,
            &files.extension,
            files.rules(),
            files.max_name_bytes,
        );
        if let Err(e) = std::fs::write(&path, content) {
            attachments.discard();
            return Err(fail(NsxError::io(&path, e)));
        }

        let saved_stem = path.file_stem().map(|s| s.to_string_lossy());
        if saved_stem.as_deref() != Some(file_title.as_str()) {
            info!(
                note = %file_title,
                path = %path.display(),
                "Note saved under a different name for filesystem compatibility"
            );
        }
        debug!(note_id = %note_id, path = %path.display(), "Converted note");

        notebooks.dirs[nb_index].notes += 1;
        Ok(attachments)
    }
}

/// Remove unused media directories and an empty recycle bin.
fn cleanup(notebooks: &Notebooks) {
    for nb in &notebooks.dirs {
        remove_if_empty(&nb.media);
        if nb.synthetic {
            remove_if_empty(&nb.dir);
        }
    }
}

fn remove_if_empty(dir: &Path) -> bool {
    let empty = match std::fs::read_dir(dir) {
        Ok(mut entries) => entries.next().is_none(),
        Err(_) => return false,
    };
    if !empty {
        return false;
    }
    match std::fs::remove_dir(dir) {
        Ok(()) => true,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "Could not remove empty directory");
            false
        }
    }
}

/// All `.nsx` files directly inside `dir`, sorted by name.
pub fn find_archives(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| NsxError::io(dir, e))?;
    let mut archives: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && is_archive(p))
        .collect();
    if archives.is_empty() {
        return Err(NsxError::NoArchives(dir.to_path_buf()));
    }
    archives.sort();
    Ok(archives)
}

/// Whether a path has the `.nsx` extension (case-insensitive).
pub fn is_archive(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ARCHIVE_EXTENSION))
}
