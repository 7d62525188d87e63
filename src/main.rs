use clap::Parser;
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use env_logger::Env;
use log::info;
use peerforge::config_loader::{self, ConfigOverrides};
use peerforge::{keys, orchestrator};
use std::fs;
use std::path::PathBuf;

/// Fill subnets, addresses, peer names and WireGuard keys for remote sites
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the provisioning configuration YAML file
    #[arg(short, long)]
    config: PathBuf,

    /// Record store to read (overrides storage.database_path)
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// Where to write the updated store (overrides storage.output_path)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Directory for peer profiles (overrides storage.profiles_dir)
    #[arg(long)]
    profiles_dir: Option<PathBuf>,

    /// Run every stage but write nothing
    #[arg(long)]
    dry_run: bool,

    /// Write a JSON run report to this path
    #[arg(long)]
    report: Option<PathBuf>,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            database_path: self.database.clone(),
            output_path: self.output.clone(),
            profiles_dir: self.profiles_dir.clone(),
        }
    }
}

fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    // Parse command-line arguments
    let args = Args::parse();

    // Initialize logging with default filter level of "info"
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    info!("Starting peerforge v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {:?}", args.config);

    let mut config = config_loader::load_config(&args.config)?;
    config_loader::apply_overrides(&mut config, &args.overrides())?;

    info!("Record store: {:?}", config.storage.database_path);
    info!("Profiles directory: {:?}", config.storage.profiles_dir);

    let generator = keys::from_config(&config.wireguard);
    info!("Key backend: {}", generator.name());

    let report = orchestrator::run(&config, generator.as_ref(), args.dry_run).wrap_err_with(|| {
        format!(
            "Provisioning run over '{}' failed; no files were changed",
            config.storage.database_path.display()
        )
    })?;

    report.log_summary();

    if let Some(path) = &args.report {
        let json = serde_json::to_string_pretty(&report).wrap_err("Failed to serialize run report")?;
        fs::write(path, json)
            .wrap_err_with(|| format!("Failed to write run report '{}'", path.display()))?;
        info!("Run report written to {:?}", path);
    }

    if !report.changed() {
        info!("Nothing to do: every record is already provisioned");
    }

    info!("Provisioning completed successfully");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let args = Args::parse_from(["peerforge", "--config", "peerforge.yaml"]);

        assert_eq!(args.config, PathBuf::from("peerforge.yaml"));
        assert_eq!(args.database, None);
        assert!(!args.dry_run);
        assert_eq!(args.report, None);
    }

    #[test]
    fn test_override_args() {
        let args = Args::parse_from([
            "peerforge",
            "-c",
            "peerforge.yaml",
            "--database",
            "sites.csv",
            "--output",
            "out/sites.csv",
            "--profiles-dir",
            "tunnels",
            "--dry-run",
            "--report",
            "report.json",
        ]);

        let overrides = args.overrides();
        assert_eq!(overrides.database_path, Some(PathBuf::from("sites.csv")));
        assert_eq!(overrides.output_path, Some(PathBuf::from("out/sites.csv")));
        assert_eq!(overrides.profiles_dir, Some(PathBuf::from("tunnels")));
        assert!(args.dry_run);
        assert_eq!(args.report, Some(PathBuf::from("report.json")));
    }

    #[test]
    fn test_config_is_required() {
        assert!(Args::try_parse_from(["peerforge"]).is_err());
    }
}
