//! Packaging of per-image outputs into a single zip archive.

use std::fs::File;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::Result;

/// Write `files` into a new zip at `archive`, each under its base name, in order.
///
/// Entries are stored uncompressed unless `compress` is set, in which case
/// they are deflated. An empty list produces a valid, empty archive.
///
/// # Errors
///
/// Returns an error if any input cannot be read or the archive cannot be written.
pub fn package(files: &[PathBuf], archive: &Path, compress: bool) -> Result<()> {
    let method = if compress {
        CompressionMethod::Deflated
    } else {
        CompressionMethod::Stored
    };
    let options = SimpleFileOptions::default().compression_method(method);

    let mut zip = ZipWriter::new(BufWriter::new(File::create(archive)?));
    for path in files {
        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        zip.start_file(name, options)?;
        io::copy(&mut File::open(path)?, &mut zip)?;
    }
    zip.finish()?;

    tracing::debug!(archive = %archive.display(), entries = files.len(), "wrote bundle");
    Ok(())
}
