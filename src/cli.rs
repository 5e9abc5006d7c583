use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{AcquisitionConfig, ApkDownloadPolicy, BackupScope, StepKind};

/// Command-line arguments for the android_collector tool.
///
/// Every acquisition option can also be set in the YAML configuration; a
/// flag given on the command line wins over the configuration file.
#[derive(Parser, Debug)]
#[clap(name = "android_collector", about = "Forensic acquisition of Android devices over adb", version)]
pub struct Args {
    /// Directory receiving the acquisition workspaces (default: ./acquisitions)
    #[clap(short, long)]
    pub output: Option<PathBuf>,

    /// Path to configuration YAML file
    #[clap(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Path to the adb executable
    #[clap(long)]
    pub adb: Option<PathBuf>,

    /// Serial of the device to acquire when several are attached
    #[clap(short, long)]
    pub serial: Option<String>,

    /// RSA public key (PEM) used to seal the acquisition
    #[clap(short = 'k', long)]
    pub public_key: Option<PathBuf>,

    /// Delete the plaintext workspace once the acquisition is sealed
    #[clap(long)]
    pub remove_plaintext: bool,

    /// Exit with success even if sealing was requested and failed
    #[clap(long)]
    pub allow_unsealed: bool,

    /// What to back up
    #[clap(long, value_enum)]
    pub backup: Option<BackupScope>,

    /// Which APKs to download
    #[clap(long, value_enum)]
    pub apks: Option<ApkDownloadPolicy>,

    /// Steps to skip (comma-separated, e.g. "backup,file_listing")
    #[clap(long, value_delimiter = ',')]
    pub skip: Vec<StepKind>,

    /// Seconds between device discovery attempts
    #[clap(long)]
    pub retry_delay: Option<u64>,

    /// Verbose logging
    #[clap(short, long)]
    pub verbose: bool,

    /// Subcommands
    #[clap(subcommand)]
    pub command: Option<Commands>,
}

impl Args {
    /// Apply command-line overrides on top of the loaded configuration
    pub fn apply_to(&self, config: &mut AcquisitionConfig) {
        if let Some(output) = &self.output {
            config.output_dir = output.clone();
        }
        if let Some(adb) = &self.adb {
            config.adb_path = adb.clone();
        }
        if let Some(serial) = &self.serial {
            config.device_serial = Some(serial.clone());
        }
        if let Some(key) = &self.public_key {
            config.storage.public_key = Some(key.clone());
        }
        if self.remove_plaintext {
            config.storage.remove_plaintext = true;
        }
        if self.allow_unsealed {
            config.storage.allow_unsealed = true;
        }
        if let Some(backup) = self.backup {
            config.backup = backup;
        }
        if let Some(apks) = self.apks {
            config.applications = apks;
        }
        for step in &self.skip {
            if !config.disabled_steps.contains(step) {
                config.disabled_steps.push(*step);
            }
        }
        if let Some(delay) = self.retry_delay {
            config.discovery_retry_secs = delay;
        }
    }
}

/// Available subcommands for the collector.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a default configuration file
    InitConfig {
        /// Path to output configuration file
        #[clap(default_value = "config.yaml")]
        path: PathBuf,
    },

    /// Re-hash a finalized workspace and compare it with its manifest
    Verify {
        /// Workspace directory holding hashes.csv
        workspace: PathBuf,
    },

    /// Decrypt a sealed acquisition with the examiner's private key
    Open {
        /// Sealed archive (.zip.enc)
        sealed: PathBuf,

        /// RSA private key (PEM)
        #[clap(short = 'k', long)]
        private_key: PathBuf,

        /// Where to write the decrypted zip (default: sealed path without .enc)
        #[clap(short, long)]
        output: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_basic_args_parsing() {
        let args = Args::parse_from([
            "android_collector",
            "--output", "/cases/2024-001",
            "--serial", "28031FDH2001AB",
            "--verbose",
        ]);

        assert_eq!(args.output, Some(PathBuf::from("/cases/2024-001")));
        assert_eq!(args.serial.as_deref(), Some("28031FDH2001AB"));
        assert!(args.verbose);
        assert!(args.command.is_none());
    }

    #[test]
    fn test_default_values() {
        let args = Args::parse_from(["android_collector"]);

        assert!(args.output.is_none());
        assert!(args.public_key.is_none());
        assert!(args.skip.is_empty());
        assert!(!args.remove_plaintext);
        assert!(!args.allow_unsealed);
        assert!(!args.verbose);
    }

    #[test]
    fn test_skip_and_policies() {
        let args = Args::parse_from([
            "android_collector",
            "--skip", "backup,file-listing",
            "--backup", "everything",
            "--apks", "all",
        ]);

        assert_eq!(args.skip, vec![StepKind::Backup, StepKind::FileListing]);
        assert_eq!(args.backup, Some(BackupScope::Everything));
        assert_eq!(args.apks, Some(ApkDownloadPolicy::All));
    }

    #[test]
    fn test_unknown_step_is_rejected() {
        let result = Args::try_parse_from(["android_collector", "--skip", "screenshots"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_overrides_win_over_config() {
        let args = Args::parse_from([
            "android_collector",
            "--public-key", "examiner.pem",
            "--remove-plaintext",
            "--skip", "logcat",
            "--retry-delay", "2",
        ]);

        let mut config = AcquisitionConfig {
            disabled_steps: vec![StepKind::Logcat],
            ..AcquisitionConfig::default()
        };
        args.apply_to(&mut config);

        assert_eq!(config.storage.public_key, Some(PathBuf::from("examiner.pem")));
        assert!(config.storage.remove_plaintext);
        assert!(!config.storage.allow_unsealed);
        assert_eq!(config.disabled_steps, vec![StepKind::Logcat]);
        assert_eq!(config.discovery_retry_secs, 2);
        assert_eq!(config.backup, BackupScope::Sms);
    }

    #[test]
    fn test_init_config_subcommand() {
        let args = Args::parse_from(["android_collector", "init-config", "custom-config.yaml"]);

        match args.command {
            Some(Commands::InitConfig { path }) => assert_eq!(path, PathBuf::from("custom-config.yaml")),
            _ => panic!("Expected InitConfig command"),
        }
    }

    #[test]
    fn test_verify_and_open_subcommands() {
        let args = Args::parse_from(["android_collector", "verify", "acquisitions/5f0c6d1e"]);
        assert!(matches!(args.command, Some(Commands::Verify { .. })));

        let args = Args::parse_from([
            "android_collector",
            "open",
            "acquisitions/5f0c6d1e.zip.enc",
            "--private-key", "examiner.key",
        ]);
        match args.command {
            Some(Commands::Open { sealed, private_key, output }) => {
                assert_eq!(sealed, PathBuf::from("acquisitions/5f0c6d1e.zip.enc"));
                assert_eq!(private_key, PathBuf::from("examiner.key"));
                assert!(output.is_none());
            }
            _ => panic!("Expected Open command"),
        }
    }
}
