//! SurfaceMap - web application attack surface mapper
//!
//! `surfacemap scan <url>` drives the scan engine through one session and
//! leaves its artifacts in the output directory. `surfacemap consolidate`
//! deduplicates and annotates an existing form catalog.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use surfacemap_common::logging::{
    init_logging_with_config, DeferredLogFile, LogConfig, LogFormat,
};
use surfacemap_common::Config;
use surfacemap_core::artifact::SCAN_LOG_FILE;
use surfacemap_session::{PhaseOutcome, ScanSession};
use surfacemap_structure::Consolidator;
use surfacemap_transport::{ZapClient, ZapClientConfig};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const DEFAULT_CONFIG_PATH: &str = "surfacemap.toml";

/// SurfaceMap command-line scanner
#[derive(Parser, Debug)]
#[command(name = "surfacemap")]
#[command(author = "SurfaceMap Contributors")]
#[command(version)]
#[command(about = "Web application attack surface mapper", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log format (pretty, json, compact)
    #[arg(long, global = true)]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan a web application through the engine
    Scan {
        /// Target URL (http or https)
        target: String,

        /// Directory receiving the artifacts (overrides config)
        #[arg(short, long)]
        output_dir: Option<String>,

        /// Engine API base URL (overrides config)
        #[arg(long)]
        engine_url: Option<String>,

        /// Engine API key (overrides config)
        #[arg(long)]
        api_key: Option<String>,

        /// Give up on a remote job after this many status polls
        #[arg(long)]
        max_polls: Option<u32>,

        /// Fail subdomain enumeration on probe timeouts
        #[arg(long)]
        strict_probes: bool,

        /// Leave structure.json as extracted
        #[arg(long)]
        no_consolidate: bool,

        /// Back up structure.json before consolidating it
        #[arg(long)]
        backup: bool,
    },

    /// Deduplicate a form catalog and attach vulnerability descriptions
    Consolidate {
        /// Path to structure.json
        #[arg(long, default_value = "scan_results/structure.json")]
        structure: PathBuf,

        /// Path to endpoints.json
        #[arg(long, default_value = "scan_results/endpoints.json")]
        endpoints: PathBuf,

        /// Save a timestamped copy of structure.json before overwriting it
        #[arg(long)]
        backup: bool,
    },
}

fn load_config(path: Option<&str>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::from_file(path)?,
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => Config::from_file(DEFAULT_CONFIG_PATH)?,
        None => Config::default(),
    };
    Ok(config.merge_env())
}

fn init_logging(cli: &Cli, config: &Config, log_file: Option<DeferredLogFile>) -> Result<()> {
    let level = cli.log_level.as_deref().unwrap_or(&config.logging.level);
    let format = cli.log_format.as_deref().unwrap_or(&config.logging.format);

    let mut log_config = LogConfig::new()
        .level(level)
        .format(LogFormat::from_name(format));
    if let Some(file) = log_file {
        log_config = log_config.deferred_log_file(file);
    }
    init_logging_with_config(log_config)?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref())?;

    match &cli.command {
        Command::Scan {
            target,
            output_dir,
            engine_url,
            api_key,
            max_polls,
            strict_probes,
            no_consolidate,
            backup,
        } => {
            if let Some(dir) = output_dir {
                config.scan.output_dir = dir.clone();
            }
            if let Some(url) = engine_url {
                config.engine.base_url = url.clone();
            }
            if let Some(key) = api_key {
                config.engine.api_key = Some(key.clone());
            }
            if max_polls.is_some() {
                config.scan.max_polls = *max_polls;
            }
            config.subdomains.strict |= *strict_probes;
            config.structure.consolidate_after_scan &= !*no_consolidate;
            config.structure.backup |= *backup;
            config.validate()?;

            // Created by the session once the target validates
            let log_file = DeferredLogFile::new(
                config
                    .logging
                    .file
                    .as_ref()
                    .map(PathBuf::from)
                    .unwrap_or_else(|| Path::new(&config.scan.output_dir).join(SCAN_LOG_FILE)),
            );
            init_logging(&cli, &config, Some(log_file.clone()))?;

            run_scan(target, config, log_file).await
        }
        Command::Consolidate {
            structure,
            endpoints,
            backup,
        } => {
            init_logging(&cli, &config, None)?;
            run_consolidate(structure, endpoints, *backup)
        }
    }
}

async fn run_scan(target: &str, config: Config, log_file: DeferredLogFile) -> Result<()> {
    info!("SurfaceMap v{}", env!("CARGO_PKG_VERSION"));
    info!("Engine endpoint: {}", config.engine.base_url);
    info!("Output directory: {}", config.scan.output_dir);

    let engine = ZapClient::new(ZapClientConfig {
        api_base_url: config.engine.base_url.clone(),
        api_key: config.engine.api_key.clone(),
        request_timeout: config.engine.request_timeout(),
        ..Default::default()
    })?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Received shutdown signal, stopping after the current step");
            on_signal.cancel();
        }
    });

    let mut session = ScanSession::new(target, config, Arc::new(engine))
        .with_cancellation(cancel)
        .with_log_file(log_file);
    let report = session.run().await;

    if let Some(e) = &report.error {
        anyhow::bail!("Target validation failed: {}", e);
    }

    println!("Scan of {} {}", report.target, report.phase);
    for record in &report.phases {
        match &record.outcome {
            PhaseOutcome::Completed => println!("  {:<24} ok", record.phase.as_str()),
            PhaseOutcome::Skipped => println!("  {:<24} skipped", record.phase.as_str()),
            PhaseOutcome::Failed { code, message } => {
                println!("  {:<24} {} ({})", record.phase.as_str(), code, message)
            }
        }
    }
    println!("Endpoints:        {}", report.endpoints);
    println!("Forms:            {}", report.forms);
    println!("Attack surfaces:  {}", report.attack_surfaces);
    println!("Subdomains:       {}", report.subdomains);
    if let Some(consolidation) = &report.consolidation {
        println!(
            "Unique forms:     {} ({} annotated)",
            consolidation.unique, consolidation.annotated
        );
    }
    println!("Results saved in {}", session.store().dir().display());

    Ok(())
}

fn run_consolidate(structure: &Path, endpoints: &Path, backup: bool) -> Result<()> {
    debug!(
        "Consolidating {} with {}",
        structure.display(),
        endpoints.display()
    );

    let report = Consolidator::new(structure, endpoints)
        .with_backup(backup)
        .run()?;

    println!("Loaded {} forms from {}", report.loaded, structure.display());
    println!(
        "Removed {} duplicate forms; {} unique remain",
        report.duplicates, report.unique
    );
    if let Some(path) = &report.backup {
        println!("Backup saved to {}", path.display());
    }
    println!("Updated structure.json saved to {}", structure.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_scan() {
        let cli = Cli::try_parse_from([
            "surfacemap",
            "scan",
            "https://example.com",
            "--output-dir",
            "out",
            "--max-polls",
            "30",
            "--backup",
        ])
        .unwrap();

        match cli.command {
            Command::Scan {
                target,
                output_dir,
                max_polls,
                backup,
                no_consolidate,
                ..
            } => {
                assert_eq!(target, "https://example.com");
                assert_eq!(output_dir.as_deref(), Some("out"));
                assert_eq!(max_polls, Some(30));
                assert!(backup);
                assert!(!no_consolidate);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_consolidate_defaults() {
        let cli = Cli::try_parse_from(["surfacemap", "consolidate", "--backup"]).unwrap();
        match cli.command {
            Command::Consolidate {
                structure,
                endpoints,
                backup,
            } => {
                assert_eq!(structure, PathBuf::from("scan_results/structure.json"));
                assert_eq!(endpoints, PathBuf::from("scan_results/endpoints.json"));
                assert!(backup);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_consolidate_missing_input_is_an_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let err = run_consolidate(
            &tmp.path().join("structure.json"),
            &tmp.path().join("endpoints.json"),
            false,
        )
        .unwrap_err();
        assert!(err.to_string().contains("structure.json"));
    }
}
