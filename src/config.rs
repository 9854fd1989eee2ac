use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Optional override file, looked up in the repository root
pub const CONFIG_FILE_NAME: &str = "light-t2m.toml";

const DEPS_URL: &str = "https://1drv.ms/u/s!ApyE_Lf3PFl2i4NcE8mgVUN3oX9nTQ?e=345HR5";
const CKPT_URL: &str = "https://1drv.ms/u/s!ApyE_Lf3PFl2i4Nb_QxAif-rcumPlg?e=O82IX1";

/// Runner configuration. Defaults reproduce the fixed quick-start scenario.
#[derive(Debug, Clone)]
pub struct Config {
    /// Repository root every relative path is resolved against
    pub repo_root: PathBuf,
    /// Artifact locations and their remote sources
    pub assets: AssetsConfig,
    /// Inference entry point and its fixed parameters
    pub inference: InferenceConfig,
    /// Logging
    pub telemetry: TelemetryConfig,
}

/// Shape of `light-t2m.toml`; every section is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    assets: AssetsConfig,
    inference: InferenceConfig,
    telemetry: TelemetryConfig,
}

/// `[assets]`: artifact locations and archive sources
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct AssetsConfig {
    pub downloads_dir: PathBuf,
    pub checkpoint: PathBuf,
    pub glove_dir: PathBuf,
    pub t2m_dir: PathBuf,
    pub stats_dir: PathBuf,
    pub deps_url: String,
    pub ckpt_url: String,
    pub deps_archive: String,
    pub ckpt_archive: String,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            downloads_dir: PathBuf::from("downloads"),
            checkpoint: PathBuf::from("checkpoints").join("hml3d.ckpt"),
            glove_dir: PathBuf::from("deps").join("glove"),
            t2m_dir: PathBuf::from("deps").join("t2m_guo"),
            stats_dir: PathBuf::from("data").join("HumanML3D"),
            deps_url: DEPS_URL.to_owned(),
            ckpt_url: CKPT_URL.to_owned(),
            deps_archive: "deps.zip".to_owned(),
            ckpt_archive: "checkpoints.zip".to_owned(),
        }
    }
}

/// `[inference]`: interpreter, script and scenario parameters
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct InferenceConfig {
    pub interpreter: String,
    pub script: String,
    pub save_path: String,
    pub sample_name: String,
    pub text: String,
    pub length: u32,
    pub repeats: u32,
    pub guidance_scale: u32,
    pub prediction_type: String,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            interpreter: "python3".to_owned(),
            script: "src/sample_motion.py".to_owned(),
            save_path: "./visual_datas".to_owned(),
            sample_name: "quick_start".to_owned(),
            text: "A person walks forward and waves their right hand.".to_owned(),
            length: 60,
            repeats: 1,
            guidance_scale: 4,
            prediction_type: "sample".to_owned(),
        }
    }
}

/// `[telemetry]`: log level and optional log file
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct TelemetryConfig {
    pub level: String,
    pub log_path: Option<String>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            log_path: None,
        }
    }
}

impl Config {
    /// Default configuration rooted at `repo_root`
    #[must_use]
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
            assets: AssetsConfig::default(),
            inference: InferenceConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }

    /// Load config for `repo_root`, applying `light-t2m.toml` when present
    ///
    /// # Errors
    /// Returns error if the override file exists but cannot be read or parsed
    pub fn load(repo_root: &Path) -> Result<Self> {
        let config_path = repo_root.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            return Ok(Self::new(repo_root));
        }

        let contents = fs::read_to_string(&config_path)
            .with_context(|| format!("failed to read {}", config_path.display()))?;

        Self::from_toml(repo_root, &contents)
            .with_context(|| format!("failed to parse {}", config_path.display()))
    }

    fn from_toml(repo_root: &Path, contents: &str) -> Result<Self> {
        let file: FileConfig = toml::from_str(contents)?;
        Ok(Self {
            repo_root: repo_root.to_path_buf(),
            assets: file.assets,
            inference: file.inference,
            telemetry: file.telemetry,
        })
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        self.repo_root.join(path)
    }

    /// Staging directory for downloaded archives
    #[must_use]
    pub fn downloads_dir(&self) -> PathBuf {
        self.resolve(&self.assets.downloads_dir)
    }

    /// Pretrained checkpoint file
    #[must_use]
    pub fn checkpoint_path(&self) -> PathBuf {
        self.resolve(&self.assets.checkpoint)
    }

    /// GloVe vocabulary directory from the dependency archive
    #[must_use]
    pub fn glove_dir(&self) -> PathBuf {
        self.resolve(&self.assets.glove_dir)
    }

    /// T2M evaluator directory from the dependency archive
    #[must_use]
    pub fn t2m_dir(&self) -> PathBuf {
        self.resolve(&self.assets.t2m_dir)
    }

    /// Directory holding the dataset normalization statistics
    #[must_use]
    pub fn stats_dir(&self) -> PathBuf {
        self.resolve(&self.assets.stats_dir)
    }

    /// Dataset mean statistics file
    #[must_use]
    pub fn mean_path(&self) -> PathBuf {
        self.stats_dir().join("Mean.npy")
    }

    /// Dataset standard deviation statistics file
    #[must_use]
    pub fn std_path(&self) -> PathBuf {
        self.stats_dir().join("Std.npy")
    }

    /// Expand ~ in paths to home directory
    ///
    /// # Errors
    /// Returns error if the path starts with `~/` and HOME is not set
    pub fn expand_path(path: &str) -> Result<PathBuf> {
        if let Some(stripped) = path.strip_prefix("~/") {
            let home = std::env::var("HOME").context("HOME environment variable not set")?;
            Ok(PathBuf::from(home).join(stripped))
        } else {
            Ok(PathBuf::from(path))
        }
    }
}
