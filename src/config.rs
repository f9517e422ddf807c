//! Converter settings.
//!
//! Settings come from the first TOML file found at:
//! 1. `$NSX2MD_CONFIG` (environment variable)
//! 2. `~/.config/nsx2md/config.toml` (Linux/macOS)
//!    `%APPDATA%\nsx2md\config.toml` (Windows)
//! 3. Built-in defaults
//!
//! The converter never reads configuration by itself: a [`Config`] value is
//! handed to [`crate::export::archive::ArchiveConverter`] explicitly.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::export::filename::FilenameRules;

/// Every setting, grouped by concern.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    /// How attachment links are written into notes.
    pub links: LinksConfig,
    /// Header block inserted above each note body.
    pub metadata: MetadataConfig,
    /// Output file naming.
    pub files: FilesConfig,
    /// External converter settings.
    pub converter: ConverterConfig,
}

/// Run-wide settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Default tracing filter when `RUST_LOG` is unset.
    pub log_level: String,
    /// Where notebook directories are created (default: working directory).
    pub output_dir: Option<PathBuf>,
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
    /// Wait for Enter before exiting when run from a terminal.
    pub pause_on_exit: bool,
    /// Title of the synthetic notebook collecting notes without a parent.
    pub recycle_bin_title: String,
}

/// Attachment link style.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinksConfig {
    /// Absolute filesystem paths instead of paths relative to the note.
    pub absolute: bool,
    /// Percent-encode spaces, parentheses and other special characters.
    pub percent_encode: bool,
    /// Fixed prefix placed before every local link (e.g. `file://`).
    pub prefix: String,
}

/// Where note metadata goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MetadataStyle {
    /// `---` delimited block with quoted key/value lines.
    FrontMatter,
    /// Markdown lines above the body.
    Inline,
}

/// Header block settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    pub style: MetadataStyle,
    pub insert_title: bool,
    pub insert_created: bool,
    pub insert_modified: bool,
    /// `strftime` format for creation/modification timestamps.
    pub date_format: String,
    /// Render timestamps in UTC instead of local time.
    pub utc_timestamps: bool,
    /// Prepended to every tag (e.g. `#`).
    pub tag_prefix: String,
    pub tag_delimiter: String,
    /// Remove whitespace inside tags.
    pub strip_tag_spaces: bool,
}

/// Output naming settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilesConfig {
    /// Name of the per-notebook attachment directory.
    pub media_dir: String,
    /// Note file extension, without the dot.
    pub extension: String,
    /// Prefix note file names with `YYYY-MM-DD `.
    pub creation_date_in_filename: bool,
    /// Only apply the host's POSIX restrictions instead of Windows-safe ones.
    pub posix_filenames: bool,
    /// Maximum length of a single path segment in bytes.
    pub max_name_bytes: usize,
}

/// External converter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    /// Explicit pandoc binary; searched on `PATH` when unset.
    pub program: Option<PathBuf>,
    /// Seconds to wait for a single conversion.
    pub timeout_secs: u64,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            output_dir: None,
            cache_dir: None,
            pause_on_exit: true,
            recycle_bin_title: "Recycle bin".to_string(),
        }
    }
}

impl Default for LinksConfig {
    fn default() -> Self {
        Self {
            absolute: false,
            percent_encode: true,
            prefix: String::new(),
        }
    }
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            style: MetadataStyle::Inline,
            insert_title: true,
            insert_created: false,
            insert_modified: false,
            date_format: "%Y-%m-%d %H:%M".to_string(),
            utc_timestamps: false,
            tag_prefix: String::new(),
            tag_delimiter: ", ".to_string(),
            strip_tag_spaces: false,
        }
    }
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            media_dir: "media".to_string(),
            extension: "md".to_string(),
            creation_date_in_filename: false,
            posix_filenames: false,
            max_name_bytes: 255,
        }
    }
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            program: None,
            timeout_secs: 5,
        }
    }
}

impl FilesConfig {
    /// Filename restriction set selected by `posix_filenames`.
    pub fn rules(&self) -> FilenameRules {
        if self.posix_filenames {
            FilenameRules::host()
        } else {
            FilenameRules::Windows
        }
    }
}

/// Read the config file from its standard location.
///
/// A missing or unparsable file yields [`Config::default`].
pub fn load_config() -> Config {
    match config_file_path() {
        Some(path) if path.exists() => load_config_from(&path),
        _ => Config::default(),
    }
}

/// Load configuration from an explicit file, falling back to defaults.
pub fn load_config_from(path: &Path) -> Config {
    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str::<Config>(&contents) {
            Ok(cfg) => {
                tracing::info!(path = %path.display(), "Loaded config");
                cfg
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Invalid config file, falling back to defaults"
                );
                Config::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Config file unreadable, falling back to defaults"
            );
            Config::default()
        }
    }
}

/// Save configuration to `path`, or to the standard location when `None`.
pub fn save_config(config: &Config, path: Option<&Path>) -> anyhow::Result<PathBuf> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => config_file_path()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config file path"))?,
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(&path, contents)?;
    tracing::info!(path = %path.display(), "Saved config");
    Ok(path)
}

/// `$NSX2MD_CONFIG`, else `nsx2md/config.toml` under the platform config dir.
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("NSX2MD_CONFIG") {
        return Some(PathBuf::from(env_path));
    }

    dirs::config_dir().map(|d| d.join("nsx2md").join("config.toml"))
}

/// Directory holding `nsx2md.log`.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("nsx2md")
}
