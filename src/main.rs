use std::fs::{self, OpenOptions};
use std::path::Path;
use std::process;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, warn, LevelFilter};
use simplelog::{ColorChoice, CombinedLogger, Config, SharedLogger, TermLogger, TerminalMode, WriteLogger};
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;

use android_collector::acquisition::{Acquisition, AcquisitionReport};
use android_collector::cli::{Args, Commands};
use android_collector::config::{load_or_create_config, AcquisitionConfig};
use android_collector::constants::{COMMAND_LOG_FILE_NAME, EXIT_RUN_FAILED};
use android_collector::device::AdbBridge;
use android_collector::storage::open_sealed_archive;
use android_collector::utils::manifest::Finalizer;

/// Exit code used when the operator aborts with a second Ctrl-C
const EXIT_INTERRUPTED: i32 = 130;

fn main() {
    let args = Args::parse();

    let code = match run(&args) {
        Ok(code) => code,
        Err(e) => {
            report_fatal(&e);
            EXIT_RUN_FAILED
        }
    };

    process::exit(code);
}

/// Print a fatal error, on stderr when no logger could be installed
fn report_fatal(e: &anyhow::Error) {
    if log::max_level() == LevelFilter::Off {
        eprintln!("Error: {:#}", e);
    } else {
        error!("{:#}", e);
    }
}

fn run(args: &Args) -> Result<i32> {
    if let Some(cmd) = &args.command {
        initialize_logging(args.verbose, None)?;
        return handle_subcommand(cmd);
    }

    let config = match load_config(args) {
        Ok(config) => config,
        Err(e) => {
            initialize_logging(args.verbose, None)?;
            return Err(e);
        }
    };

    initialize_logging(args.verbose, Some(&config.output_dir))?;
    info!("Starting Android acquisition ({})", config.description);

    let runtime = Runtime::new().context("Failed to create async runtime")?;
    runtime.block_on(acquire(config))
}

/// Initialize logging to the terminal and, during acquisitions, to the
/// command log beside the session workspaces. The terminal logger is
/// installed even when the command log cannot be opened.
fn initialize_logging(verbose: bool, output_dir: Option<&Path>) -> Result<()> {
    let log_level = if verbose { LevelFilter::Debug } else { LevelFilter::Info };

    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        log_level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )];

    let command_log = output_dir.map(open_command_log).transpose();
    let command_log = match command_log {
        Ok(file) => file,
        Err(e) => {
            CombinedLogger::init(loggers).context("Failed to initialize logger")?;
            return Err(e);
        }
    };

    if let Some(log_file) = command_log {
        loggers.push(WriteLogger::new(LevelFilter::Debug, Config::default(), log_file));
    }

    CombinedLogger::init(loggers).context("Failed to initialize logger")?;
    Ok(())
}

fn open_command_log(output_dir: &Path) -> Result<fs::File> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output directory {}", output_dir.display()))?;

    let log_path = output_dir.join(COMMAND_LOG_FILE_NAME);
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file {}", log_path.display()))
}

/// Load the configuration, apply command-line overrides and validate
fn load_config(args: &Args) -> Result<AcquisitionConfig> {
    let mut config = load_or_create_config(args.config.as_deref())?;
    args.apply_to(&mut config);
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Handle subcommands (init-config, verify and open)
fn handle_subcommand(cmd: &Commands) -> Result<i32> {
    match cmd {
        Commands::InitConfig { path } => {
            info!("Creating default configuration file at {}", path.display());
            AcquisitionConfig::create_default_config_file(path)?;
            info!("Configuration created successfully");
            Ok(0)
        }
        Commands::Verify { workspace } => {
            let problems = Finalizer::verify(workspace)?;
            if problems.is_empty() {
                info!("{} matches its manifest", workspace.display());
                return Ok(0);
            }

            for problem in &problems {
                warn!("{}", problem);
            }
            error!("{} difference(s) with the manifest of {}", problems.len(), workspace.display());
            Ok(EXIT_RUN_FAILED)
        }
        Commands::Open { sealed, private_key, output } => {
            let key = fs::read(private_key)
                .with_context(|| format!("Failed to read private key {}", private_key.display()))?;
            let destination = output.clone().unwrap_or_else(|| sealed.with_extension(""));

            open_sealed_archive(sealed, &key, &destination)?;
            info!("Decrypted {} into {}", sealed.display(), destination.display());
            Ok(0)
        }
    }
}

/// Run one acquisition and turn its outcome into an exit code
async fn acquire(config: AcquisitionConfig) -> Result<i32> {
    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    let allow_unsealed = config.storage.allow_unsealed;
    let bridge = Arc::new(AdbBridge::new(&config.adb_path));
    let acquisition = Acquisition::new(config, bridge);

    match acquisition.run(&cancel).await {
        Ok(report) => {
            log_report(&report);
            Ok(report.exit_code(allow_unsealed))
        }
        Err(e) => {
            error!("{}", e);
            Ok(e.exit_code())
        }
    }
}

/// The first Ctrl-C stops device discovery, a second one exits at once.
/// Running steps are never interrupted half-way otherwise.
fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        cancel.cancel();
        warn!("Interrupt received. Press Ctrl-C again to abort, the workspace is kept as it is");

        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Aborted by operator");
            process::exit(EXIT_INTERRUPTED);
        }
    });
}

fn log_report(report: &AcquisitionReport) {
    info!("Acquisition {} ended as {:?}", report.session_id, report.status);
    info!(
        "{} step(s) run, {} failed, {} file(s) in the manifest",
        report.steps.len(),
        report.failed_steps,
        report.manifest_entries
    );

    if let Some(workspace) = &report.workspace {
        info!("Workspace: {}", workspace.display());
    }
    if let Some(archive) = &report.sealed_archive {
        info!("Sealed archive: {} (sha256 {})", archive.path.display(), archive.sha256);
    }
    if let Some(reason) = &report.seal_error {
        error!("The acquisition is NOT sealed: {}", reason);
    }
}
