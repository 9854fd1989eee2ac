//! Light-T2M runner - provisions model artifacts and launches text-to-motion inference
//!
//! The motion model itself lives in an external script; this crate only makes
//! sure its inputs exist and then runs it once with a fixed scenario.

use thiserror::Error;

/// Artifact download, extraction and presence checks
pub mod assets;
/// Configuration management
pub mod config;
/// Execution device selection
pub mod device;
/// Inference command assembly and execution
pub mod inference;
/// Logging setup
pub mod telemetry;

use assets::{ensure_assets, ArchiveFetcher, ProvisionError};
use config::Config;
use device::DeviceProbe;
use inference::{run_inference, CommandRunner, InferenceError};

/// Failure of either stage
#[derive(Debug, Error)]
pub enum RunError {
    /// Artifacts could not be provisioned; inference was not attempted
    #[error("asset provisioning failed: {0}")]
    Provision(#[from] ProvisionError),

    /// Inference process could not run or failed
    #[error(transparent)]
    Inference(#[from] InferenceError),
}

/// Provision every artifact, then run inference once.
///
/// # Errors
/// Returns the first failure; inference never starts if provisioning fails
pub fn run<F, P, R>(config: &Config, fetcher: &F, probe: &P, runner: &R) -> Result<(), RunError>
where
    F: ArchiveFetcher + ?Sized,
    P: DeviceProbe + ?Sized,
    R: CommandRunner + ?Sized,
{
    ensure_assets(config, fetcher)?;
    run_inference(config, probe, runner)?;
    Ok(())
}
