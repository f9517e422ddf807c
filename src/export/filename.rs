//! Filesystem-safe names and collision-free output paths.

use std::path::{Path, PathBuf};

use percent_encoding::percent_decode_str;
use sha2::{Digest, Sha256};

use crate::model::notebook::UNTITLED;

/// Numeric suffixes tried before falling back to a hash-derived name.
pub const MAX_SUFFIX_ATTEMPTS: u32 = 10_000;

/// Which characters must be avoided in path segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilenameRules {
    /// Only `/` is replaced.
    Posix,
    /// `/` and `:` are replaced (Finder shows `:` as `/`).
    MacOs,
    /// The full Windows-compatible set, portable everywhere.
    Windows,
}

impl FilenameRules {
    /// The least restrictive rules valid on the current host.
    pub fn host() -> Self {
        if cfg!(windows) {
            Self::Windows
        } else if cfg!(target_os = "macos") {
            Self::MacOs
        } else {
            Self::Posix
        }
    }
}

/// Turn an arbitrary title into a single safe path segment.
///
/// Percent-encoded sequences are decoded first, then separators become `-`
/// and, under [`FilenameRules::Windows`], `?`/`*` are dropped and `<`, `>`,
/// `"` become `(`, `)`, `'`. NUL is always dropped, other control characters
/// only under Windows rules. Output longer than `max_bytes` is cut on a
/// character boundary and right-trimmed. The result may be empty.
pub fn sanitize(input: &str, rules: FilenameRules, max_bytes: usize) -> String {
    let decoded = percent_decode_str(input).decode_utf8_lossy();
    let windows = rules == FilenameRules::Windows;

    let mut out = String::with_capacity(decoded.len());
    for c in decoded.chars() {
        match c {
            '/' => out.push('-'),
            '\0' => {}
            c if windows && c.is_control() => {}
            ':' if rules != FilenameRules::Posix => out.push('-'),
            '\\' | '|' if windows => out.push('-'),
            '?' | '*' if windows => {}
            '<' if windows => out.push('('),
            '>' if windows => out.push(')'),
            '"' if windows => out.push('\''),
            _ => out.push(c),
        }
    }

    if out.len() > max_bytes {
        truncate_at_char_boundary(&mut out, max_bytes);
        let trimmed = out.trim_end().len();
        out.truncate(trimmed);
    }
    out
}

/// Split a file name into stem and extension (`"a.tar.gz"` → `("a.tar", "gz")`).
pub fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(pos) if pos > 0 && pos + 1 < name.len() => (&name[..pos], &name[pos + 1..]),
        _ => (name, ""),
    }
}

/// Return a path in `dir` that does not exist yet.
///
/// Tries `base.ext`, then `base_1.ext`, `base_2.ext`, … and finally a name
/// derived from the SHA-256 of `base`. The suffix is taken out of the byte
/// budget before sanitizing, so no candidate exceeds `max_bytes`. An empty
/// `ext` yields names without extension (used for directories).
pub fn unique_path(
    dir: &Path,
    base: &str,
    ext: &str,
    rules: FilenameRules,
    max_bytes: usize,
) -> PathBuf {
    unique_path_bounded(dir, base, ext, rules, max_bytes, MAX_SUFFIX_ATTEMPTS)
}

fn unique_path_bounded(
    dir: &Path,
    base: &str,
    ext: &str,
    rules: FilenameRules,
    max_bytes: usize,
    max_attempts: u32,
) -> PathBuf {
    // An extension longer than half the budget is kept as part of the stem
    let (base, ext_part) = if ext.is_empty() {
        (base.to_string(), String::new())
    } else if ext.len() + 1 > max_bytes / 2 {
        (format!("{base}.{ext}"), String::new())
    } else {
        (base.to_string(), format!(".{ext}"))
    };
    let budget = max_bytes.saturating_sub(ext_part.len()).max(1);

    let name = or_untitled(sanitize(&base, rules, budget), budget);
    let candidate = dir.join(format!("{name}{ext_part}"));
    if !candidate.exists() {
        return candidate;
    }

    for i in 1..=max_attempts {
        let suffix = format!("_{i}");
        let stem_budget = budget.saturating_sub(suffix.len());
        let stem = or_untitled(sanitize(&base, rules, stem_budget), stem_budget);
        let candidate = dir.join(format!("{stem}{suffix}{ext_part}"));
        if !candidate.exists() {
            return candidate;
        }
    }

    tracing::warn!(
        dir = %dir.display(),
        base = %base,
        "Suffix attempts exhausted, using hashed name"
    );
    let mut round: u64 = 0;
    loop {
        let mut hash = if round == 0 {
            hex_digest(&base)
        } else {
            hex_digest(&format!("{base}\0{round}"))
        };
        truncate_at_char_boundary(&mut hash, budget);
        let candidate = dir.join(format!("{hash}{ext_part}"));
        if !candidate.exists() {
            return candidate;
        }
        round += 1;
    }
}

fn or_untitled(name: String, budget: usize) -> String {
    if !name.is_empty() {
        return name;
    }
    let mut fallback = UNTITLED.to_string();
    truncate_at_char_boundary(&mut fallback, budget.max(1));
    fallback
}

fn truncate_at_char_boundary(s: &mut String, max_bytes: usize) {
    if s.len() <= max_bytes {
        return;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s.truncate(end);
}

fn hex_digest(input: &str) -> String {
    use std::fmt::Write;

    let digest = Sha256::digest(input.as_bytes());
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest.iter() {
        let _ = write!(&mut hex, "{byte:02x}");
    }
    hex
}
