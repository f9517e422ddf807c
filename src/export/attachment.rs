//! Extract note attachments into the notebook's media directory.

use std::path::{Path, PathBuf};

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use tracing::{debug, warn};

use crate::config::LinksConfig;
use crate::model::attachment::Attachment;
use crate::model::note::Note;
use crate::store::reader::NsxArchive;

use super::filename::{sanitize, split_extension, unique_path, FilenameRules};

/// Characters escaped in local links when percent-encoding is enabled.
const LINK_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'(')
    .add(b')')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'#')
    .add(b'?');

/// Link text used when an attachment payload is missing.
pub const NOT_FOUND_LABEL: &str = "NOT FOUND";

/// Where attachments go and how links to them are spelled.
#[derive(Debug, Clone, Copy)]
pub struct LinkContext<'a> {
    pub media_dir: &'a Path,
    /// Directory of the note file links are relative to.
    pub note_dir: &'a Path,
    pub links: &'a LinksConfig,
    pub rules: FilenameRules,
    pub max_name_bytes: usize,
}

/// What happened to one attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentOutcome {
    /// Payload extracted to `path`.
    Written { path: PathBuf, bytes: u64 },
    /// Payload absent; the original URL is linked instead.
    SourceUrl,
    /// Payload absent and no URL to fall back to.
    Missing,
}

#[derive(Debug, Clone)]
pub struct MaterializedAttachment {
    /// Final file name (or the intended one, when missing).
    pub name: String,
    /// Link target substituted for the ref token.
    pub target: String,
    /// Markdown link for the attachment list.
    pub link: String,
    pub outcome: AttachmentOutcome,
}

/// Per-note attachment results.
#[derive(Debug, Default)]
pub struct NoteAttachments {
    /// Links not embedded inline, in attachment order.
    pub list: Vec<String>,
    pub written: usize,
    pub from_source: usize,
    pub missing: usize,
    pub bytes_written: u64,
    /// Payload files created for this note.
    pub files: Vec<PathBuf>,
}

impl NoteAttachments {
    /// Delete the payloads written for a note that could not be saved.
    pub fn discard(&self) {
        for path in &self.files {
            if let Err(e) = std::fs::remove_file(path) {
                warn!(path = %path.display(), error = %e, "Could not remove attachment");
            }
        }
    }
}

/// Extract a single attachment and compute its link.
///
/// Never fails: unreadable or unwritable payloads fall back to the source URL
/// or a `NOT FOUND` placeholder.
pub fn materialize(
    archive: &mut NsxArchive,
    attachment: &Attachment,
    ctx: &LinkContext<'_>,
) -> MaterializedAttachment {
    let display_name = if attachment.name.trim().is_empty() {
        attachment.payload_entry()
    } else {
        attachment.name.clone()
    };
    let sanitized = sanitize(&display_name, ctx.rules, ctx.max_name_bytes);
    let (stem, ext) = split_extension(&sanitized);
    let path = unique_path(ctx.media_dir, stem, ext, ctx.rules, ctx.max_name_bytes);
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| sanitized.clone());
    let target = link_target(&path, ctx);

    let failure = match archive.read_payload(attachment) {
        Ok(data) => match std::fs::write(&path, &data) {
            Ok(()) => {
                debug!(path = %path.display(), bytes = data.len(), "Wrote attachment");
                return MaterializedAttachment {
                    link: markdown_link(&name, &target),
                    name,
                    target,
                    outcome: AttachmentOutcome::Written {
                        path,
                        bytes: data.len() as u64,
                    },
                };
            }
            Err(e) => e.to_string(),
        },
        Err(e) => e.to_string(),
    };

    if let Some(url) = &attachment.source_url {
        debug!(name = %display_name, url = %url, "Attachment not embedded, linking source");
        return MaterializedAttachment {
            link: markdown_link(&name, url),
            name,
            target: url.clone(),
            outcome: AttachmentOutcome::SourceUrl,
        };
    }

    warn!(
        name = %display_name,
        md5 = %attachment.md5,
        error = %failure,
        "Can't find attachment"
    );
    MaterializedAttachment {
        link: markdown_link(NOT_FOUND_LABEL, &target),
        name,
        target,
        outcome: AttachmentOutcome::Missing,
    }
}

/// Replace the attachment's ref token in `body` with its link target.
///
/// Returns `false` when there is no token or it does not occur in the body.
pub fn embed(body: &mut String, attachment: &Attachment, target: &str) -> bool {
    match attachment.r#ref.as_deref() {
        Some(token) if body.contains(token) => {
            *body = body.replace(token, target);
            true
        }
        _ => false,
    }
}

/// Materialize every attachment of a note, rewriting `body` in place.
pub fn materialize_note_attachments(
    archive: &mut NsxArchive,
    note: &Note,
    body: &mut String,
    ctx: &LinkContext<'_>,
) -> NoteAttachments {
    let mut result = NoteAttachments::default();

    for attachment in note.attachments.values() {
        let m = materialize(archive, attachment, ctx);
        let inline = embed(body, attachment, &m.target);

        match &m.outcome {
            AttachmentOutcome::Written { path, bytes } => {
                result.written += 1;
                result.bytes_written += bytes;
                result.files.push(path.clone());
            }
            AttachmentOutcome::SourceUrl => result.from_source += 1,
            AttachmentOutcome::Missing => result.missing += 1,
        }

        // Missing payloads stay listed so the placeholder is visible
        if !inline || m.outcome == AttachmentOutcome::Missing {
            result.list.push(m.link);
        }
    }

    result
}

/// Build the link target for a file according to the link style.
pub fn link_target(file: &Path, ctx: &LinkContext<'_>) -> String {
    let path = if ctx.links.absolute {
        std::path::absolute(file).unwrap_or_else(|_| file.to_path_buf())
    } else {
        pathdiff::diff_paths(file, ctx.note_dir).unwrap_or_else(|| file.to_path_buf())
    };
    let path = path.to_string_lossy().replace('\\', "/");

    let encoded = if ctx.links.percent_encode {
        utf8_percent_encode(&path, LINK_ENCODE_SET).to_string()
    } else {
        path
    };
    format!("{}{}", ctx.links.prefix, encoded)
}

fn markdown_link(text: &str, target: &str) -> String {
    let text = text.replace('[', "\\[").replace(']', "\\]");
    format!("[{text}]({target})")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx<'a>(dir: &'a Path, media: &'a Path, links: &'a LinksConfig) -> LinkContext<'a> {
        LinkContext {
            media_dir: media,
            note_dir: dir,
            links,
            rules: FilenameRules::Windows,
            max_name_bytes: 255,
        }
    }

    #[test]
    fn test_relative_encoded_link() {
        let tmp = tempfile::tempdir().unwrap();
        let media = tmp.path().join("media");
        let links = LinksConfig::default();
        let c = ctx(tmp.path(), &media, &links);
        assert_eq!(
            link_target(&media.join("my photo (1).png"), &c),
            "media/my%20photo%20%281%29.png"
        );
    }

    #[test]
    fn test_relative_plain_link_with_prefix() {
        let tmp = tempfile::tempdir().unwrap();
        let media = tmp.path().join("media");
        let links = LinksConfig {
            absolute: false,
            percent_encode: false,
            prefix: "file://".into(),
        };
        let c = ctx(tmp.path(), &media, &links);
        assert_eq!(
            link_target(&media.join("my photo.png"), &c),
            "file://media/my photo.png"
        );
    }

    #[test]
    fn test_absolute_link() {
        let tmp = tempfile::tempdir().unwrap();
        let media = tmp.path().join("media");
        let links = LinksConfig {
            absolute: true,
            percent_encode: false,
            prefix: String::new(),
        };
        let c = ctx(tmp.path(), &media, &links);
        let target = link_target(&media.join("a.png"), &c);
        assert!(target.ends_with("/media/a.png"), "{target}");
        assert!(Path::new(&target).is_absolute() || target.contains(':'));
    }

    #[test]
    fn test_embed_only_when_token_present() {
        let att = Attachment {
            r#ref: Some("TOKEN".into()),
            ..Default::default()
        };
        let mut body = "![](TOKEN) and again ![](TOKEN)".to_string();
        assert!(embed(&mut body, &att, "media/a.png"));
        assert_eq!(body, "![](media/a.png) and again ![](media/a.png)");

        let mut other = "no reference here".to_string();
        assert!(!embed(&mut other, &att, "media/a.png"));

        let no_ref = Attachment::default();
        assert!(!embed(&mut body, &no_ref, "x"));
    }

    #[test]
    fn test_markdown_link_escapes_brackets() {
        assert_eq!(markdown_link("a [b]", "x"), "[a \\[b\\]](x)");
    }
}
