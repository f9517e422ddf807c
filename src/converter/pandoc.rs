//! pandoc as the HTML → Markdown converter.
//!
//! pandoc is located and version-checked once. Its command-line dialect
//! changed over the years, so the detected version selects an argument
//! profile from [`ARG_PROFILES`]. Each note is passed through scratch files
//! for input, output and stderr that are reused for the whole run.

use std::ffi::OsString;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use wait_timeout::ChildExt;

use super::TextConverter;
use crate::config::ConverterConfig;
use crate::error::{NsxError, Result};

/// Source and target formats shared by every profile.
const BASE_ARGS: &[&str] = &[
    "-f",
    "html",
    "-t",
    "markdown_strict+pipe_tables-raw_html",
];

/// Assumed when `pandoc -v` cannot be run or parsed.
pub const FALLBACK_VERSION: &[u32] = &[1, 19, 2, 1];

/// Bounded wait for `pandoc -v`.
const VERSION_TIMEOUT: Duration = Duration::from_secs(3);

/// Flags for a range of pandoc versions.
#[derive(Debug, PartialEq, Eq)]
pub struct ArgProfile {
    /// Exclusive upper bound; `None` for the newest range.
    pub below: Option<&'static [u32]>,
    pub flags: &'static [&'static str],
}

/// Ordered oldest first; the first profile whose bound exceeds the version wins.
pub const ARG_PROFILES: &[ArgProfile] = &[
    ArgProfile {
        below: Some(&[1, 16]),
        flags: &["--no-wrap"],
    },
    ArgProfile {
        below: Some(&[1, 19]),
        flags: &["--wrap=none"],
    },
    ArgProfile {
        below: Some(&[2, 11, 2]),
        flags: &["--wrap=none", "--atx-headers"],
    },
    ArgProfile {
        below: None,
        flags: &["--wrap=none", "--markdown-headings=atx"],
    },
];

/// A dotted numeric version, compared component-wise (`1.19 < 1.19.2`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ToolVersion(Vec<u32>);

impl ToolVersion {
    pub fn new(parts: &[u32]) -> Self {
        Self(parts.to_vec())
    }

    /// Parse the first line of `pandoc -v` (`"pandoc 3.1.11.1"`) or a bare version.
    pub fn parse(text: &str) -> Option<Self> {
        let first_line = text.lines().next()?;
        let token = first_line
            .split_whitespace()
            .find(|t| t.starts_with(|c: char| c.is_ascii_digit()))?;

        let mut parts = Vec::new();
        for piece in token.split('.') {
            let digits: String = piece.chars().take_while(|c| c.is_ascii_digit()).collect();
            if digits.is_empty() {
                break;
            }
            parts.push(digits.parse().ok()?);
            if digits.len() != piece.len() {
                break;
            }
        }
        (!parts.is_empty()).then_some(Self(parts))
    }

    pub fn parts(&self) -> &[u32] {
        &self.0
    }
}

impl fmt::Display for ToolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(u32::to_string).collect();
        write!(f, "{}", parts.join("."))
    }
}

/// Select the argument profile for a pandoc version.
pub fn profile_for(version: &ToolVersion) -> &'static ArgProfile {
    ARG_PROFILES
        .iter()
        .find(|p| p.below.is_none_or(|bound| version.parts() < bound))
        .unwrap_or(&ARG_PROFILES[ARG_PROFILES.len() - 1])
}

/// Find the pandoc binary: the configured program, then `PATH`, then the
/// working directory.
pub fn locate(configured: Option<&Path>) -> Result<PathBuf> {
    let program = configured.unwrap_or(Path::new("pandoc"));

    if program.components().count() > 1 {
        return if program.is_file() {
            Ok(program.to_path_buf())
        } else {
            Err(NsxError::ConverterNotFound)
        };
    }

    if let Some(found) = find_in_path(program) {
        return Ok(found);
    }

    std::env::current_dir()
        .ok()
        .and_then(|cwd| executable_candidates(&cwd.join(program)).find(|p| p.is_file()))
        .ok_or(NsxError::ConverterNotFound)
}

fn find_in_path(program: &Path) -> Option<PathBuf> {
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .flat_map(|dir| executable_candidates(&dir.join(program)).collect::<Vec<_>>())
        .find(|p| p.is_file())
}

fn executable_candidates(path: &Path) -> impl Iterator<Item = PathBuf> {
    let mut candidates = vec![path.to_path_buf()];
    if cfg!(windows) && path.extension().is_none() {
        candidates.push(path.with_extension("exe"));
    }
    candidates.into_iter()
}

/// Run `program -v` and parse its version line.
pub fn detect_version(program: &Path) -> Option<ToolVersion> {
    let mut child = Command::new(program)
        .arg("-v")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .ok()?;

    match child.wait_timeout(VERSION_TIMEOUT) {
        Ok(Some(status)) if status.success() => {}
        Ok(None) => {
            let _ = child.kill();
            let _ = child.wait();
            return None;
        }
        _ => return None,
    }

    let mut out = String::new();
    child.stdout.take()?.read_to_string(&mut out).ok()?;
    ToolVersion::parse(&out)
}

/// pandoc invoked once per note through reusable scratch files.
pub struct Pandoc {
    program: PathBuf,
    version: ToolVersion,
    profile: &'static ArgProfile,
    input: NamedTempFile,
    output: NamedTempFile,
    stderr: NamedTempFile,
    timeout: Duration,
}

impl Pandoc {
    /// Locate pandoc and detect its version. Fails fast if it is not installed.
    pub fn from_config(config: &ConverterConfig) -> Result<Self> {
        let program = locate(config.program.as_deref())?;
        let version = detect_version(&program).unwrap_or_else(|| {
            warn!(
                program = %program.display(),
                "Could not determine pandoc version, assuming {}",
                ToolVersion::new(FALLBACK_VERSION)
            );
            ToolVersion::new(FALLBACK_VERSION)
        });
        info!(program = %program.display(), version = %version, "Found pandoc");
        Self::new(program, version, Duration::from_secs(config.timeout_secs.max(1)))
    }

    /// Use a known program and version.
    pub fn new(program: PathBuf, version: ToolVersion, timeout: Duration) -> Result<Self> {
        let input = NamedTempFile::new().map_err(|e| NsxError::io(std::env::temp_dir(), e))?;
        let output = NamedTempFile::new().map_err(|e| NsxError::io(std::env::temp_dir(), e))?;
        let stderr = NamedTempFile::new().map_err(|e| NsxError::io(std::env::temp_dir(), e))?;
        let profile = profile_for(&version);
        debug!(version = %version, flags = ?profile.flags, "Selected pandoc profile");
        Ok(Self {
            program,
            version,
            profile,
            input,
            output,
            stderr,
            timeout,
        })
    }

    pub fn version(&self) -> &ToolVersion {
        &self.version
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Full argument list for one conversion.
    pub fn args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = BASE_ARGS.iter().map(OsString::from).collect();
        args.extend(self.profile.flags.iter().map(OsString::from));
        args.push("-o".into());
        args.push(self.output.path().into());
        args.push(self.input.path().into());
        args
    }
}

impl TextConverter for Pandoc {
    fn convert(&mut self, html: &str) -> Result<String> {
        let input = self.input.path();
        let output = self.output.path();
        let errors = self.stderr.path();
        std::fs::write(input, html).map_err(|e| NsxError::io(input, e))?;
        // Truncate so a failed run can never leave the previous note's output behind
        std::fs::write(output, b"").map_err(|e| NsxError::io(output, e))?;
        // stderr goes to a file so a chatty pandoc can't block on a full pipe
        let stderr_file = File::create(errors).map_err(|e| NsxError::io(errors, e))?;

        let mut child = Command::new(&self.program)
            .args(self.args())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::from(stderr_file))
            .spawn()
            .map_err(|e| NsxError::io(&self.program, e))?;

        match child
            .wait_timeout(self.timeout)
            .map_err(|e| NsxError::io(&self.program, e))?
        {
            Some(status) if status.success() => {}
            Some(status) => {
                let stderr = std::fs::read(errors).unwrap_or_default();
                return Err(NsxError::ConverterFailed {
                    status: status.to_string(),
                    stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
                });
            }
            None => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(NsxError::ConverterTimeout {
                    seconds: self.timeout.as_secs(),
                });
            }
        }

        let bytes = std::fs::read(output).map_err(|e| NsxError::io(output, e))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_version_output() {
        let out = "pandoc 3.1.11.1\nFeatures: +server +lua\nScripting engine: Lua 5.4\n";
        assert_eq!(ToolVersion::parse(out), Some(ToolVersion::new(&[3, 1, 11, 1])));
        assert_eq!(
            ToolVersion::parse("pandoc.exe 2.19.2"),
            Some(ToolVersion::new(&[2, 19, 2]))
        );
        assert_eq!(
            ToolVersion::parse("pandoc 3.2-nightly"),
            Some(ToolVersion::new(&[3, 2]))
        );
        assert_eq!(ToolVersion::parse("pandoc unknown"), None);
        assert_eq!(ToolVersion::parse(""), None);
    }

    #[test]
    fn test_version_ordering() {
        assert!(ToolVersion::new(&[1, 19]) < ToolVersion::new(&[1, 19, 2, 1]));
        assert!(ToolVersion::new(&[1, 9]) < ToolVersion::new(&[1, 16]));
        assert!(ToolVersion::new(&[2, 0]) > ToolVersion::new(&[1, 19, 2, 1]));
    }

    #[test]
    fn test_profile_table() {
        let flags = |v: &[u32]| profile_for(&ToolVersion::new(v)).flags;
        assert_eq!(flags(&[1, 15, 2]), ["--no-wrap"]);
        assert_eq!(flags(&[1, 16]), ["--wrap=none"]);
        assert_eq!(flags(&[1, 19, 2, 1]), ["--wrap=none", "--atx-headers"]);
        assert_eq!(flags(&[2, 11, 1]), ["--wrap=none", "--atx-headers"]);
        assert_eq!(flags(&[2, 11, 2]), ["--wrap=none", "--markdown-headings=atx"]);
        assert_eq!(flags(&[3, 1]), ["--wrap=none", "--markdown-headings=atx"]);
    }

    #[test]
    fn test_args_layout() {
        let pandoc = Pandoc::new(
            PathBuf::from("pandoc"),
            ToolVersion::new(&[1, 17]),
            Duration::from_secs(5),
        )
        .unwrap();
        let args = pandoc.args();
        assert_eq!(args[..4], ["-f", "html", "-t", "markdown_strict+pipe_tables-raw_html"]);
        assert_eq!(args[4], "--wrap=none");
        assert_eq!(args[5], "-o");
        assert_eq!(args.len(), 8);
    }

    #[test]
    fn test_locate_missing_explicit_program() {
        let err = locate(Some(Path::new("/definitely/not/here/pandoc"))).unwrap_err();
        assert!(matches!(err, NsxError::ConverterNotFound));
    }

    #[test]
    fn test_locate_explicit_file() {
        let tmp = tempfile::tempdir().unwrap();
        let fake = tmp.path().join("pandoc");
        std::fs::write(&fake, "").unwrap();
        assert_eq!(locate(Some(&fake)).unwrap(), fake);
    }

    #[test]
    fn test_spawn_failure_is_note_error() {
        let mut pandoc = Pandoc::new(
            PathBuf::from("/definitely/not/here/pandoc"),
            ToolVersion::new(FALLBACK_VERSION),
            Duration::from_secs(1),
        )
        .unwrap();
        let err = pandoc.convert("<p>x</p>").unwrap_err();
        assert!(matches!(err, NsxError::Io { .. }));
    }
}
