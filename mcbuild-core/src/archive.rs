//! Archive packaging
//!
//! `.mcpack`, `.mcworld` and `.mctemplate` files are plain zip archives whose root
//! is the *contents* of the packed folder.

use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::fs_utils::path_to_string;

/// Errors that can occur while writing an archive
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("Failed to write archive: {0}")]
    IoError(#[from] io::Error),

    #[error("Zip error: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("Archive source not found: {0}")]
    SourceNotFound(String),
}

/// Compress the contents of `content` into the zip file `output`
///
/// Parent directories of `output` are created; an existing file is replaced.
pub fn compress(output: &Path, content: &Path) -> Result<PathBuf, ArchiveError> {
    if !content.is_dir() {
        return Err(ArchiveError::SourceNotFound(content.display().to_string()));
    }

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut zip = ZipWriter::new(BufWriter::new(File::create(output)?));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    add_dir(&mut zip, content, content, options)?;
    zip.finish()?;

    Ok(output.to_path_buf())
}

fn add_dir<W: io::Write + io::Seek>(
    zip: &mut ZipWriter<W>,
    root: &Path,
    dir: &Path,
    options: SimpleFileOptions,
) -> Result<(), ArchiveError> {
    let mut entries = fs::read_dir(dir)?.collect::<Result<Vec<_>, _>>()?;
    // Stable entry order keeps archives reproducible
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let path = entry.path();
        let name = match path.strip_prefix(root) {
            Ok(rel) => path_to_string(rel),
            Err(_) => continue,
        };

        if entry.file_type()?.is_dir() {
            zip.add_directory(format!("{}/", name), options)?;
            add_dir(zip, root, &path, options)?;
        } else {
            zip.start_file(name, options)?;
            let mut file = File::open(&path)?;
            io::copy(&mut file, zip)?;
        }
    }

    Ok(())
}
