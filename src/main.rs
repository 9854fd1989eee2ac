use anyhow::{Context, Result};
use light_t2m_runner::assets::HttpFetcher;
use light_t2m_runner::config::Config;
use light_t2m_runner::device::TorchCudaProbe;
use light_t2m_runner::inference::ProcessRunner;
use light_t2m_runner::{run, telemetry};

fn main() -> Result<()> {
    let repo_root = std::env::current_dir().context("failed to resolve repository root")?;

    let config = Config::load(&repo_root)?;

    telemetry::init(&config.telemetry)?;
    tracing::info!(root = %repo_root.display(), "light-t2m runner starting");

    let fetcher = HttpFetcher::new().context("failed to build HTTP client")?;

    let probe = TorchCudaProbe::new(&config.inference.interpreter, &config.repo_root);

    run(&config, &fetcher, &probe, &ProcessRunner)?;

    Ok(())
}
