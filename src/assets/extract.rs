use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while unpacking an archive
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Archive is not a readable zip
    #[error("invalid archive {}: {source}", path.display())]
    Zip {
        /// Archive path
        path: PathBuf,
        /// Underlying error
        source: zip::result::ZipError,
    },

    /// Filesystem failure reading the archive or writing an entry
    #[error("failed to extract {}: {source}", path.display())]
    Io {
        /// Path being read or written
        path: PathBuf,
        /// Underlying error
        source: io::Error,
    },
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> ExtractError + '_ {
    move |source| ExtractError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Unpack every entry of `archive` under `dest_root`, keeping the archive's layout.
///
/// Entries whose names escape `dest_root` and macOS metadata are skipped.
/// Returns the number of files written.
///
/// # Errors
/// Returns error if the archive is unreadable or an entry cannot be written
pub fn extract_zip(archive: &Path, dest_root: &Path) -> Result<usize, ExtractError> {
    tracing::info!(
        archive = %archive.display(),
        dest = %dest_root.display(),
        "extracting archive"
    );

    fs::create_dir_all(dest_root).map_err(io_error(dest_root))?;

    let file = File::open(archive).map_err(io_error(archive))?;
    let zip_error = |source| ExtractError::Zip {
        path: archive.to_path_buf(),
        source,
    };
    let mut zip = zip::ZipArchive::new(file).map_err(zip_error)?;

    let mut written = 0;
    for i in 0..zip.len() {
        let mut entry = zip.by_index(i).map_err(zip_error)?;

        let Some(relative) = entry.enclosed_name().map(|p| p.to_path_buf()) else {
            tracing::warn!(name = entry.name(), "skipping entry with unsafe path");
            continue;
        };

        if is_metadata(&relative) {
            continue;
        }

        let out_path = dest_root.join(&relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path).map_err(io_error(&out_path))?;
        } else {
            if let Some(parent) = out_path.parent() {
                fs::create_dir_all(parent).map_err(io_error(parent))?;
            }
            let mut out_file = File::create(&out_path).map_err(io_error(&out_path))?;
            io::copy(&mut entry, &mut out_file).map_err(io_error(&out_path))?;
            written += 1;
            tracing::debug!(path = %relative.display(), "extracted");
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode() {
                if let Err(e) = fs::set_permissions(&out_path, fs::Permissions::from_mode(mode)) {
                    tracing::warn!("failed to set permissions on {}: {}", out_path.display(), e);
                }
            }
        }
    }

    tracing::info!(files = written, "extraction complete");
    Ok(written)
}

fn is_metadata(path: &Path) -> bool {
    path.components().any(|c| {
        let name = c.as_os_str();
        name == "__MACOSX" || name == ".DS_Store"
    })
}
