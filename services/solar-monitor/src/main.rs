//! Solar monitor CLI

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use solar_monitor::auth::hash_password;
use solar_monitor::migrate::migrate_legacy_segments;
use solar_monitor::upload::build_uploader;
use solar_monitor::{load_config, Config, SolarError};
use tracing::Level;

#[derive(Parser)]
#[command(name = "solar-monitor")]
#[command(about = "Solar water heater temperature logger and dashboard")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Data directory (overrides config file)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Dashboard port (overrides config file)
    #[arg(long)]
    port: Option<u16>,

    /// Log level
    #[arg(short, long, default_value = "info", global = true)]
    log_level: Level,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Poll sensors and serve the dashboard (default)
    Run,
    /// Convert legacy .json segments to the .jsonl line format
    Migrate,
    /// Prompt for a password and print its argon2 hash
    HashPassword,
    /// List files at the configured upload destination
    ListUploads,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .init();

    tracing::debug!(
        "Parsed command line arguments: config={:?}, data_dir={:?}, port={:?}, log_level={:?}",
        args.config,
        args.data_dir,
        args.port,
        args.log_level
    );

    let mut config = if let Some(config_path) = &args.config {
        tracing::debug!("Loading configuration from {:?}", config_path);
        load_config(config_path)?
    } else {
        tracing::debug!("Using default configuration");
        Config::default()
    };

    if let Some(data_dir) = args.data_dir {
        config.storage.data_dir = data_dir;
    }
    if let Some(port) = args.port {
        config.dashboard.port = port;
    }
    config.validate()?;

    match args.command.unwrap_or(Command::Run) {
        Command::Run => {
            tracing::info!("Starting solar monitor");
            tracing::debug!(
                "Sensors: {}, data dir: {:?}, upload: {}",
                config.sensors.count,
                config.storage.data_dir,
                config.upload.target.type_name()
            );
            solar_monitor::run(config).await?;
        }
        Command::Migrate => {
            let report =
                migrate_legacy_segments(&config.storage.data_dir, &config.storage.file_prefix)
                    .await?;
            println!(
                "Migrated {} file(s), skipped {}, failed {}",
                report.migrated.len(),
                report.skipped.len(),
                report.failed.len()
            );
            if !report.migrated.is_empty() {
                println!("Originals backed up to {:?}", report.backup_dir);
            }
        }
        Command::HashPassword => {
            let password = rpassword::prompt_password("Password: ")?;
            let confirm = rpassword::prompt_password("Confirm password: ")?;
            if password != confirm {
                return Err(SolarError::Auth("passwords do not match".to_string()).into());
            }
            println!("{}", hash_password(&password)?);
        }
        Command::ListUploads => match build_uploader(&config.upload.target) {
            Some(uploader) => {
                for file in uploader.list().await? {
                    println!("{}\t{}", file.size, file.name);
                }
            }
            None => println!("Uploads are disabled"),
        },
    }

    Ok(())
}
