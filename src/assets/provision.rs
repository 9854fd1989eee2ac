use super::extract::{extract_zip, ExtractError};
use super::fetch::{ArchiveFetcher, FetchError};
use crate::config::Config;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that stop provisioning
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// Expected artifacts are still absent after download and extraction
    #[error("expected artifacts missing after download: {}", join_paths(missing))]
    MissingAfterDownload {
        /// Paths that are still missing
        missing: Vec<PathBuf>,
    },

    /// Dataset statistics must be supplied by the user
    #[error(
        "missing dataset statistics: place Mean.npy and Std.npy under {} before running \
         inference. They ship with the HumanML3D dataset; follow the repository README \
         to obtain it.",
        dir.display()
    )]
    MissingDatasetStats {
        /// Directory expected to hold Mean.npy and Std.npy
        dir: PathBuf,
    },

    /// Staging directory could not be created
    #[error("failed to create {}: {source}", path.display())]
    Staging {
        /// Directory being created
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// Archive download failed
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Archive extraction failed
    #[error(transparent)]
    Extract(#[from] ExtractError),
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Outcome of [`download_if_missing`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provisioned {
    /// Every expected path existed; nothing was fetched
    AlreadyPresent,
    /// Archive was fetched and extracted
    Downloaded,
}

/// One downloadable artifact bundle
#[derive(Debug, Clone)]
pub struct ArchiveSource<'a> {
    /// Remote archive location
    pub url: &'a str,
    /// File name under the staging directory
    pub archive_name: &'a str,
    /// Paths that must exist once the archive is extracted
    pub expected_paths: Vec<PathBuf>,
}

fn missing_paths(paths: &[PathBuf]) -> Vec<PathBuf> {
    paths.iter().filter(|p| !p.exists()).cloned().collect()
}

/// Fetch and unpack `source` into `root` unless all of its expected paths exist.
///
/// At most one download-and-extract cycle is attempted.
///
/// # Errors
/// Returns error if the fetch or extraction fails, or if any expected path is
/// still missing afterwards
pub fn download_if_missing<F: ArchiveFetcher + ?Sized>(
    fetcher: &F,
    downloads_dir: &Path,
    root: &Path,
    source: &ArchiveSource<'_>,
) -> Result<Provisioned, ProvisionError> {
    if missing_paths(&source.expected_paths).is_empty() {
        tracing::info!(
            archive = source.archive_name,
            "artifacts already present, skipping download"
        );
        return Ok(Provisioned::AlreadyPresent);
    }

    fs::create_dir_all(downloads_dir).map_err(|e| ProvisionError::Staging {
        path: downloads_dir.to_path_buf(),
        source: e,
    })?;
    let archive_path = downloads_dir.join(source.archive_name);

    tracing::info!(
        url = source.url,
        path = %archive_path.display(),
        "artifacts missing, downloading"
    );

    fetcher.fetch(source.url, &archive_path)?;
    extract_zip(&archive_path, root)?;

    let missing = missing_paths(&source.expected_paths);
    if !missing.is_empty() {
        return Err(ProvisionError::MissingAfterDownload { missing });
    }

    Ok(Provisioned::Downloaded)
}

/// Fail unless Mean.npy and Std.npy are both present in `stats_dir`.
///
/// These come from a separately licensed dataset and are never downloaded.
///
/// # Errors
/// Returns [`ProvisionError::MissingDatasetStats`] if either file is absent
pub fn check_dataset_stats(stats_dir: &Path) -> Result<(), ProvisionError> {
    let mean = stats_dir.join("Mean.npy");
    let std = stats_dir.join("Std.npy");

    if mean.exists() && std.exists() {
        return Ok(());
    }

    tracing::error!(
        dir = %stats_dir.display(),
        mean = mean.exists(),
        std = std.exists(),
        "dataset statistics not found"
    );
    Err(ProvisionError::MissingDatasetStats {
        dir: stats_dir.to_path_buf(),
    })
}

/// Make sure every artifact inference needs is on disk.
///
/// Order: dependency archive, checkpoint archive, dataset statistics. Stops at
/// the first failure.
///
/// # Errors
/// Returns the first provisioning failure
pub fn ensure_assets<F: ArchiveFetcher + ?Sized>(
    config: &Config,
    fetcher: &F,
) -> Result<(), ProvisionError> {
    let downloads_dir = config.downloads_dir();

    let deps = ArchiveSource {
        url: &config.assets.deps_url,
        archive_name: &config.assets.deps_archive,
        expected_paths: vec![config.glove_dir(), config.t2m_dir()],
    };
    download_if_missing(fetcher, &downloads_dir, &config.repo_root, &deps)?;

    let checkpoint = ArchiveSource {
        url: &config.assets.ckpt_url,
        archive_name: &config.assets.ckpt_archive,
        expected_paths: vec![config.checkpoint_path()],
    };
    download_if_missing(fetcher, &downloads_dir, &config.repo_root, &checkpoint)?;

    check_dataset_stats(&config.stats_dir())?;

    tracing::info!("all artifacts present");
    Ok(())
}
