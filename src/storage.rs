//! Unique, filesystem-safe paths for outputs and bundles.
//!
//! Every path carries a fresh v4 UUID so that concurrent batches writing into
//! the same directory never collide.

use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::Result;

/// Hands out output and bundle paths inside one directory.
#[derive(Debug, Clone)]
pub struct StorageAllocator {
    root: PathBuf,
}

impl StorageAllocator {
    /// Allocate paths under `root`, creating it if necessary.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Io`] if the directory cannot be created.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Directory all paths are allocated in.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path for the watermarked version of `source_name`, with extension `ext`.
    ///
    /// Only the final component of `source_name` is kept, and any character
    /// outside `[A-Za-z0-9._-]` is replaced by `_`.
    #[must_use]
    pub fn output_path(&self, source_name: &str, ext: &str) -> PathBuf {
        let stem = Path::new(source_name)
            .file_stem()
            .map(|s| sanitize(&s.to_string_lossy()))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "image".to_string());
        self.root
            .join(format!("watermarked_{}_{stem}.{ext}", short_id()))
    }

    /// Path for a new bundle archive.
    #[must_use]
    pub fn bundle_path(&self) -> PathBuf {
        self.root
            .join(format!("watermarked_images_{}.zip", Uuid::new_v4().simple()))
    }
}

fn short_id() -> String {
    let id = Uuid::new_v4().simple().to_string();
    id[..12].to_string()
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_paths_are_unique_and_safe() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageAllocator::new(dir.path().join("nested/out")).unwrap();
        assert!(storage.root().is_dir());

        let a = storage.output_path("../../etc/My Photo (1).JPG", "jpg");
        let b = storage.output_path("../../etc/My Photo (1).JPG", "jpg");
        assert_ne!(a, b);
        assert_eq!(a.parent().unwrap(), storage.root());

        let name = a.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("watermarked_"));
        assert!(name.ends_with("_My_Photo__1_.jpg"), "{name}");
    }

    #[test]
    fn empty_names_get_a_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageAllocator::new(dir.path()).unwrap();
        let p = storage.output_path("", "png");
        assert!(p.to_str().unwrap().ends_with("_image.png"));
    }

    #[test]
    fn bundle_paths_are_unique() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageAllocator::new(dir.path()).unwrap();
        let a = storage.bundle_path();
        assert_ne!(a, storage.bundle_path());
        assert_eq!(a.extension().unwrap(), "zip");
    }
}
