use std::fmt;
use std::path::PathBuf;
use std::process::{Command, Stdio};

/// Hardware target handed to the inference process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    /// CUDA accelerator by ordinal
    Cuda(u32),
    /// Generic CPU execution
    Cpu,
}

impl Device {
    /// Value of the `device=` override
    #[must_use]
    pub fn token(&self) -> String {
        match self {
            Self::Cuda(index) => index.to_string(),
            Self::Cpu => "cpu".to_owned(),
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cuda(index) => write!(f, "cuda:{index}"),
            Self::Cpu => f.write_str("cpu"),
        }
    }
}

/// Reports whether an accelerated compute device can be used
#[cfg_attr(test, mockall::automock)]
pub trait DeviceProbe {
    /// True when at least one accelerator is usable
    fn accelerator_available(&self) -> bool;
}

const CUDA_CHECK: &str = "import torch; print(torch.cuda.is_available())";

/// Asks the inference interpreter's torch whether CUDA is usable
#[derive(Debug, Clone)]
pub struct TorchCudaProbe {
    interpreter: String,
    cwd: PathBuf,
}

impl TorchCudaProbe {
    /// Probe `interpreter`, run from `cwd` like the inference process itself
    #[must_use]
    pub fn new(interpreter: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            interpreter: interpreter.into(),
            cwd: cwd.into(),
        }
    }
}

impl DeviceProbe for TorchCudaProbe {
    fn accelerator_available(&self) -> bool {
        let output = match Command::new(&self.interpreter)
            .args(["-c", CUDA_CHECK])
            .current_dir(&self.cwd)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
        {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!(interpreter = %self.interpreter, "cuda check could not start: {}", e);
                return false;
            }
        };

        if !output.status.success() {
            tracing::warn!(
                interpreter = %self.interpreter,
                status = %output.status,
                "cuda check failed, is torch installed?"
            );
            return false;
        }

        is_true(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Last printed line must be exactly `True`
fn is_true(stdout: &str) -> bool {
    stdout.lines().last().is_some_and(|line| line.trim() == "True")
}

/// First accelerator when one is available, CPU otherwise
pub fn select_device<P: DeviceProbe + ?Sized>(probe: &P) -> Device {
    let device = if probe.accelerator_available() {
        Device::Cuda(0)
    } else {
        Device::Cpu
    };
    tracing::info!(%device, "selected execution device");
    device
}
