use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::config::step_types::{ApkDownloadPolicy, BackupScope, StepKind};
use crate::constants::{DEFAULT_ADB_PATH, DEFAULT_OUTPUT_DIR, DISCOVERY_RETRY_DELAY_SECS};

/// Settings for sealing the finalized workspace
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct StorageConfig {
    /// RSA public key (PEM) used to seal the bundle. No key, no sealing.
    #[serde(default)]
    pub public_key: Option<PathBuf>,
    /// Delete the plaintext workspace once the sealed archive is written
    #[serde(default)]
    pub remove_plaintext: bool,
    /// Exit with success even if sealing was requested and failed
    #[serde(default)]
    pub allow_unsealed: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AcquisitionConfig {
    pub version: String,
    pub description: String,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_adb_path")]
    pub adb_path: PathBuf,
    #[serde(default)]
    pub device_serial: Option<String>,
    #[serde(default = "default_discovery_retry_secs")]
    pub discovery_retry_secs: u64,
    #[serde(default)]
    pub backup: BackupScope,
    #[serde(default)]
    pub applications: ApkDownloadPolicy,
    #[serde(default)]
    pub disabled_steps: Vec<StepKind>,
    #[serde(default)]
    pub storage: StorageConfig,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_DIR)
}

fn default_adb_path() -> PathBuf {
    PathBuf::from(DEFAULT_ADB_PATH)
}

fn default_discovery_retry_secs() -> u64 {
    DISCOVERY_RETRY_DELAY_SECS
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            version: "1.0".into(),
            description: "Default Android acquisition configuration".into(),
            output_dir: default_output_dir(),
            adb_path: default_adb_path(),
            device_serial: None,
            discovery_retry_secs: default_discovery_retry_secs(),
            backup: BackupScope::default(),
            applications: ApkDownloadPolicy::default(),
            disabled_steps: Vec::new(),
            storage: StorageConfig::default(),
        }
    }
}

impl AcquisitionConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        let config: AcquisitionConfig = serde_yaml::from_str(&content)
            .context("Failed to parse YAML config")?;

        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Save configuration to a YAML file
    pub fn save_to_yaml_file(&self, path: &Path) -> Result<()> {
        let yaml = serde_yaml::to_string(self)
            .context("Failed to serialize config to YAML")?;

        fs::write(path, yaml)
            .context(format!("Failed to write config to {}", path.display()))?;

        info!("Saved configuration to {}", path.display());
        Ok(())
    }

    /// Create a default configuration YAML file
    pub fn create_default_config_file(path: &Path) -> Result<()> {
        Self::default().save_to_yaml_file(path)
    }

    /// Whether a pipeline step should run
    pub fn is_step_enabled(&self, kind: StepKind) -> bool {
        !self.disabled_steps.contains(&kind)
    }

    /// Fixed delay between device discovery attempts
    pub fn discovery_retry_delay(&self) -> Duration {
        Duration::from_secs(self.discovery_retry_secs)
    }

    /// Whether the operator asked for the bundle to be sealed
    pub fn sealing_requested(&self) -> bool {
        self.storage.public_key.is_some()
    }

    /// Reject settings that would make the run meaningless
    pub fn validate(&self) -> Result<()> {
        if self.discovery_retry_secs == 0 {
            bail!("discovery_retry_secs must be at least 1 second");
        }

        if self.disabled_steps.len() == StepKind::ORDERED.len() {
            bail!("Every acquisition step is disabled, nothing would be collected");
        }

        if let Some(key) = &self.storage.public_key {
            if !key.is_file() {
                bail!("Public key file not found: {}", key.display());
            }
        }

        Ok(())
    }
}

/// Load a configuration file or create a default one.
///
/// - With a path that exists, the file is parsed.
/// - With a path that does not exist, the default configuration is written
///   there and returned.
/// - Without a path, the default configuration is used.
pub fn load_or_create_config(config_path: Option<&Path>) -> Result<AcquisitionConfig> {
    match config_path {
        Some(path) if path.exists() => AcquisitionConfig::from_yaml_file(path),
        Some(path) => {
            info!("Creating default config at {}", path.display());
            let default_config = AcquisitionConfig::default();
            default_config.save_to_yaml_file(path)?;
            Ok(default_config)
        }
        None => {
            info!("No config path provided, using default configuration");
            Ok(AcquisitionConfig::default())
        }
    }
}
