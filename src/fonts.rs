//! Font resolution.
//!
//! Fonts live as `.ttf`/`.otf` files in a single directory and are addressed
//! by file stem, case-insensitively (`"roboto-regular"` finds
//! `Roboto-Regular.ttf`). Unknown names resolve to the catalog's default font.

use std::fmt;
use std::path::{Path, PathBuf};

use ab_glyph::FontArc;

use crate::error::{Error, Result};

const FONT_EXTENSIONS: [&str; 2] = ["ttf", "otf"];

/// A loaded font, cheap to clone.
#[derive(Clone)]
pub struct Font {
    name: String,
    inner: FontArc,
}

impl Font {
    /// Parse font data held in memory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Font`] if the data is not a valid TrueType/OpenType font.
    pub fn from_bytes(name: impl Into<String>, data: Vec<u8>) -> Result<Self> {
        let name = name.into();
        let inner = FontArc::try_from_vec(data).map_err(|e| Error::Font {
            name: name.clone(),
            reason: e.to_string(),
        })?;
        Ok(Self { name, inner })
    }

    /// Load a font file from disk, naming it after the file stem.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Font`] if the file cannot be read or parsed.
    pub fn from_path(path: &Path) -> Result<Self> {
        let name = path
            .file_stem()
            .map_or_else(|| path.display().to_string(), |s| s.to_string_lossy().into_owned());
        let data = std::fs::read(path).map_err(|e| Error::Font {
            name: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_bytes(name, data)
    }

    /// The font's name (file stem when loaded from disk).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn glyphs(&self) -> &FontArc {
        &self.inner
    }
}

impl fmt::Debug for Font {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Font").field("name", &self.name).finish()
    }
}

/// Directory of fonts with a default substituted for unknown names.
#[derive(Debug, Clone)]
pub struct FontCatalog {
    dir: PathBuf,
    default_name: String,
}

impl FontCatalog {
    /// Create a catalog over `dir` whose fallback is the font named `default_name`.
    pub fn new(dir: impl Into<PathBuf>, default_name: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            default_name: default_name.into(),
        }
    }

    /// Resolve `name` to a loaded font.
    ///
    /// Falls back to the default font when `name` is unknown or fails to load.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Font`] if the default font cannot be found or loaded either.
    pub fn resolve(&self, name: &str) -> Result<Font> {
        if let Some(path) = self.find(name) {
            match Font::from_path(&path) {
                Ok(font) => return Ok(font),
                Err(e) => tracing::warn!("{e}, using default font {}", self.default_name),
            }
        } else {
            tracing::debug!(
                "font {name:?} not found in {}, using default font {}",
                self.dir.display(),
                self.default_name
            );
        }

        let path = self.find(&self.default_name).ok_or_else(|| Error::Font {
            name: self.default_name.clone(),
            reason: format!("default font not found in {}", self.dir.display()),
        })?;
        Font::from_path(&path)
    }

    /// Path of the font file whose stem matches `name`, if any.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<PathBuf> {
        let wanted = name.trim();
        if wanted.is_empty() {
            return None;
        }
        std::fs::read_dir(&self.dir)
            .ok()?
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.path())
            .filter(|path| is_font_file(path))
            .find(|path| {
                path.file_stem()
                    .and_then(|s| s.to_str())
                    .is_some_and(|stem| stem.eq_ignore_ascii_case(wanted))
            })
    }
}

fn is_font_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| FONT_EXTENSIONS.iter().any(|f| f.eq_ignore_ascii_case(ext)))
}
