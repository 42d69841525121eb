//! Settings: TOML file plus environment overrides.
//!
//! Precedence, lowest first:
//! 1. Built-in defaults ([`Settings::default`])
//! 2. An optional TOML file ([`Settings::from_toml_str`] / [`Settings::from_path`])
//! 3. Environment variables [`ENV_DATABASE_URL`] and [`ENV_MAX_WORKING_SET`]
//!
//! [`Settings::load`] applies all three and validates the result.
//!
//! ```toml
//! database_url = "sqlite://block_combine.db"
//!
//! [engine]
//! default_top_n = 3
//! max_working_set = 300
//!
//! [export]
//! dir = "export"
//! encoding = "gbk"
//! file_stem = "ZH"
//! extension = "blk"
//! block_prefix = "1"
//!
//! [import]
//! encoding = "gbk"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use shared_utils::env::{get_env_opt, get_env_parsed};

use crate::combine::GROUP_SIZE;
use crate::error::{Error, Result};
use crate::text::resolve_encoding;

/// Overrides [`Settings::database_url`].
pub const ENV_DATABASE_URL: &str = "BLOCK_COMBINE_DATABASE_URL";
/// Overrides [`EngineSettings::max_working_set`].
pub const ENV_MAX_WORKING_SET: &str = "BLOCK_COMBINE_MAX_WORKING_SET";

/// Everything the service and CLI are configured with.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// SQLite path or `sqlite://` URL.
    pub database_url: String,
    /// Combination engine limits.
    pub engine: EngineSettings,
    /// Artifact export.
    pub export: ExportSettings,
    /// Working-set file import.
    pub import: ImportSettings,
}

/// Engine limits.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineSettings {
    /// `top_n` used when the caller does not pass one.
    pub default_top_n: usize,
    /// Most codes a working set may hold. Enumeration is O(n³).
    pub max_working_set: usize,
}

/// Export artifact layout.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExportSettings {
    /// Default destination directory.
    pub dir: PathBuf,
    /// WHATWG encoding label for artifact text.
    pub encoding: String,
    /// File name stem; the rank is appended.
    pub file_stem: String,
    /// File extension without the dot.
    pub extension: String,
    /// Market marker written before every block code.
    pub block_prefix: String,
}

/// Working-set file import.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImportSettings {
    /// WHATWG encoding label of working-set files.
    pub encoding: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: "sqlite://block_combine.db".into(),
            engine: EngineSettings::default(),
            export: ExportSettings::default(),
            import: ImportSettings::default(),
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            default_top_n: 3,
            max_working_set: 300,
        }
    }
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("export"),
            encoding: "gbk".into(),
            file_stem: "ZH".into(),
            extension: "blk".into(),
            block_prefix: "1".into(),
        }
    }
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            encoding: "gbk".into(),
        }
    }
}

impl Settings {
    /// Parse settings from TOML. Missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| Error::Config(format!("invalid settings: {e}")))
    }

    /// Read and parse a settings file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Defaults, then `path` if given, then environment overrides; validated.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(p) => Self::from_path(p)?,
            None => Self::default(),
        };
        settings.apply_env()?;
        settings.validate()?;
        tracing::debug!(?settings, "settings loaded");
        Ok(settings)
    }

    /// Apply environment-variable overrides.
    pub fn apply_env(&mut self) -> Result<()> {
        if let Some(url) = get_env_opt(ENV_DATABASE_URL) {
            self.database_url = url;
        }
        if let Some(max) = get_env_parsed::<usize>(ENV_MAX_WORKING_SET)? {
            self.engine.max_working_set = max;
        }
        Ok(())
    }

    /// Reject values the engine or exporter cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.database_url.trim().is_empty() {
            return Err(Error::Config("database_url cannot be empty".into()));
        }
        if self.engine.default_top_n == 0 {
            return Err(Error::Config("engine.default_top_n must be at least 1".into()));
        }
        if self.engine.max_working_set < GROUP_SIZE {
            return Err(Error::Config(format!(
                "engine.max_working_set must be at least {GROUP_SIZE}"
            )));
        }
        if self.export.file_stem.trim().is_empty() || self.export.extension.trim().is_empty() {
            return Err(Error::Config(
                "export.file_stem and export.extension cannot be empty".into(),
            ));
        }
        resolve_encoding(&self.export.encoding)?;
        resolve_encoding(&self.import.encoding)?;
        Ok(())
    }
}
