//! Engine settings.
//!
//! Every field has a default, so a config file only needs the keys it changes.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Settings shared by every batch a [`crate::Watermarker`] processes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory watermarked images and bundles are written to.
    pub output_dir: PathBuf,

    /// Directory searched for `.ttf`/`.otf` fonts.
    pub fonts_dir: PathBuf,

    /// Font used when the requested one is not found.
    pub default_font: String,

    /// Text size in pixels when a request gives neither pixels nor a percentage.
    pub default_font_size: u32,

    /// Seconds generated artifacts are kept before deletion.
    pub retention_secs: u64,

    /// Abort the whole batch on the first failing image.
    pub fail_fast: bool,

    /// Quality (1-100) for JPEG outputs.
    pub jpeg_quality: u8,

    /// Deflate bundle entries instead of storing them.
    pub compress_bundle: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./output"),
            fonts_dir: PathBuf::from("./fonts"),
            default_font: "Roboto-Regular".to_string(),
            default_font_size: crate::text::DEFAULT_FONT_SIZE,
            retention_secs: 300,
            fail_fast: false,
            jpeg_quality: 95,
            compress_bundle: false,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Io`] if the file cannot be read and
    /// [`crate::Error::Config`] if it is not valid TOML for this struct.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// How long artifacts are retained.
    #[must_use]
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }
}
