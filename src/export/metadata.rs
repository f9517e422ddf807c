//! Header block placed above a converted note body.

use std::fmt::Write;

use chrono::{DateTime, Local, Utc};
use unicode_width::UnicodeWidthStr;

use crate::config::{MetadataConfig, MetadataStyle};

const FRONT_MATTER_MARKER: &str = "---";

/// Everything that may go into a note header.
#[derive(Debug, Clone, Copy)]
pub struct NoteMeta<'a> {
    pub title: &'a str,
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
    pub tags: &'a [String],
    /// Markdown links of attachments not embedded in the body.
    pub attachments: &'a [String],
}

/// Prepend the configured header to `body`.
///
/// When nothing is enabled or present the body is returned unchanged.
pub fn render_note(meta: &NoteMeta<'_>, body: &str, cfg: &MetadataConfig) -> String {
    let created = meta.created.filter(|_| cfg.insert_created);
    let modified = meta.modified.filter(|_| cfg.insert_modified);

    let has_header = cfg.insert_title
        || created.is_some()
        || modified.is_some()
        || !meta.tags.is_empty()
        || !meta.attachments.is_empty();
    if !has_header {
        return body.to_string();
    }

    let mut out = String::with_capacity(body.len() + 256);
    match cfg.style {
        MetadataStyle::FrontMatter => {
            let has_block =
                cfg.insert_title || created.is_some() || modified.is_some() || !meta.tags.is_empty();
            if has_block {
                out.push_str(FRONT_MATTER_MARKER);
                out.push('\n');
                if cfg.insert_title {
                    let _ = writeln!(out, "title: {}", yaml_quote(meta.title));
                }
                if let Some(t) = created {
                    let _ = writeln!(out, "created: {}", yaml_quote(&format_time(t, cfg)));
                }
                if let Some(t) = modified {
                    let _ = writeln!(out, "modified: {}", yaml_quote(&format_time(t, cfg)));
                }
                if !meta.tags.is_empty() {
                    let tags: Vec<String> = meta
                        .tags
                        .iter()
                        .map(|t| yaml_quote(&clean_tag(t, cfg)))
                        .collect();
                    let _ = writeln!(out, "tags: [{}]", tags.join(", "));
                }
                out.push_str(FRONT_MATTER_MARKER);
                out.push('\n');
            }
            if !meta.attachments.is_empty() {
                let _ = writeln!(out, "Attachments: {}", meta.attachments.join(" "));
            }
        }
        MetadataStyle::Inline => {
            if cfg.insert_title {
                let width = UnicodeWidthStr::width(meta.title).max(1);
                let _ = writeln!(out, "{}\n{}", meta.title, "=".repeat(width));
            }
            if !meta.tags.is_empty() {
                let _ = writeln!(out, "Tags: {}  ", render_tags(meta.tags, cfg));
            }
            if !meta.attachments.is_empty() {
                let _ = writeln!(out, "Attachments: {}  ", meta.attachments.join(" "));
            }
            if let Some(t) = created {
                let _ = writeln!(out, "Created: {}  ", format_time(t, cfg));
            }
            if let Some(t) = modified {
                let _ = writeln!(out, "Modified: {}  ", format_time(t, cfg));
            }
        }
    }

    out.push('\n');
    out.push_str(body);
    out
}

/// Tags joined by the configured delimiter, each prefixed.
pub fn render_tags(tags: &[String], cfg: &MetadataConfig) -> String {
    tags.iter()
        .map(|t| format!("{}{}", cfg.tag_prefix, clean_tag(t, cfg)))
        .collect::<Vec<_>>()
        .join(&cfg.tag_delimiter)
}

fn clean_tag(tag: &str, cfg: &MetadataConfig) -> String {
    if cfg.strip_tag_spaces {
        tag.chars().filter(|c| !c.is_whitespace()).collect()
    } else {
        tag.to_string()
    }
}

/// Format a timestamp, falling back to RFC 3339 on a bad format string.
pub fn format_time(t: DateTime<Utc>, cfg: &MetadataConfig) -> String {
    format_time_with(t, &cfg.date_format, cfg.utc_timestamps)
}

pub fn format_time_with(t: DateTime<Utc>, format: &str, utc: bool) -> String {
    let mut s = String::new();
    let ok = if utc {
        write!(s, "{}", t.format(format))
    } else {
        write!(s, "{}", t.with_timezone(&Local).format(format))
    };
    match ok {
        Ok(()) => s,
        Err(_) => {
            tracing::warn!(format = %format, "Invalid date format");
            t.to_rfc3339()
        }
    }
}

fn yaml_quote(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}
