use crate::config::Config;
use crate::device::{select_device, Device, DeviceProbe};
use std::fmt;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use thiserror::Error;

/// Errors from the inference child process
#[derive(Debug, Error)]
pub enum InferenceError {
    /// Child could not be started
    #[error("failed to launch {program}: {source}")]
    Spawn {
        /// Program that was executed
        program: String,
        /// Underlying error
        source: std::io::Error,
    },

    /// Child exited unsuccessfully
    #[error("inference process failed ({})", describe_exit(*code))]
    Failed {
        /// Exit code, `None` when terminated by a signal
        code: Option<i32>,
    },
}

fn describe_exit(code: Option<i32>) -> String {
    code.map_or_else(
        || "terminated by signal".to_owned(),
        |c| format!("exit code {c}"),
    )
}

/// Fully assembled inference command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferenceCommand {
    /// Interpreter to execute
    pub program: String,
    /// Script path followed by `key=value` overrides
    pub args: Vec<String>,
    /// Working directory of the child
    pub cwd: PathBuf,
}

impl InferenceCommand {
    /// Assemble the quick-start command for `device`
    #[must_use]
    pub fn build(config: &Config, device: Device) -> Self {
        let params = &config.inference;
        let args = vec![
            params.script.clone(),
            format!("ckpt_path={}", config.checkpoint_path().display()),
            format!("data_dir={}", config.stats_dir().display()),
            format!("save_path={}", params.save_path),
            format!("sample_name={}", params.sample_name),
            format!("text={}", params.text),
            format!("length={}", params.length),
            format!("repeats={}", params.repeats),
            format!("device={}", device.token()),
            format!("model.guidance_scale={}", params.guidance_scale),
            format!(
                "model.noise_scheduler.prediction_type={}",
                params.prediction_type
            ),
        ];

        Self {
            program: params.interpreter.clone(),
            args,
            cwd: config.repo_root.clone(),
        }
    }
}

impl fmt::Display for InferenceCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Executes an assembled command and waits for it
#[cfg_attr(test, mockall::automock)]
pub trait CommandRunner {
    /// Run `command` to completion, returning its exit code (`None` if killed by a signal)
    ///
    /// # Errors
    /// Returns error if the process cannot be spawned
    fn run(&self, command: &InferenceCommand) -> std::io::Result<Option<i32>>;
}

/// Spawns the command with inherited stdio so its output streams live
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    fn run(&self, command: &InferenceCommand) -> std::io::Result<Option<i32>> {
        let status = Command::new(&command.program)
            .args(&command.args)
            .current_dir(&command.cwd)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()?;
        Ok(status.code())
    }
}

/// Select the device, build the command and run it to completion
///
/// # Errors
/// Returns [`InferenceError::Spawn`] if the child cannot start, or
/// [`InferenceError::Failed`] if it exits non-zero
pub fn run_inference<P, R>(
    config: &Config,
    probe: &P,
    runner: &R,
) -> Result<(), InferenceError>
where
    P: DeviceProbe + ?Sized,
    R: CommandRunner + ?Sized,
{
    let device = select_device(probe);
    let command = InferenceCommand::build(config, device);

    tracing::info!(cwd = %command.cwd.display(), "running inference: {}", command);

    let code = runner.run(&command).map_err(|source| InferenceError::Spawn {
        program: command.program.clone(),
        source,
    })?;

    if code != Some(0) {
        tracing::error!(code = ?code, "inference process failed");
        return Err(InferenceError::Failed { code });
    }

    tracing::info!("inference finished");
    Ok(())
}
