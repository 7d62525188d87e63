use crate::config::Config;
use crate::error::EngineError;
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use log::info;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Load and parse configuration from a YAML file
pub fn load_config(config_path: &Path) -> Result<Config> {
    info!("Loading configuration from: {:?}", config_path);

    // Open the configuration file
    let file = File::open(config_path)
        .wrap_err_with(|| format!("Failed to open configuration '{}'", config_path.display()))?;

    // Parse the YAML content
    let config: Config = serde_yaml::from_reader(file)
        .wrap_err_with(|| format!("Failed to parse configuration '{}'", config_path.display()))?;

    // Validate the configuration
    config.validate().map_err(EngineError::from)?;

    Ok(config)
}

/// CLI arguments that can override YAML settings
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub database_path: Option<PathBuf>,
    pub output_path: Option<PathBuf>,
    pub profiles_dir: Option<PathBuf>,
}

/// Apply CLI overrides to a configuration
pub fn apply_overrides(config: &mut Config, overrides: &ConfigOverrides) -> Result<()> {
    if let Some(path) = &overrides.database_path {
        info!("Record store overridden on command line: {:?}", path);
        config.storage.database_path = path.clone();
    }

    if let Some(path) = &overrides.output_path {
        info!("Output store overridden on command line: {:?}", path);
        config.storage.output_path = Some(path.clone());
    }

    if let Some(path) = &overrides.profiles_dir {
        info!("Profiles directory overridden on command line: {:?}", path);
        config.storage.profiles_dir = path.clone();
    }

    // Re-validate after applying overrides
    config.validate().map_err(EngineError::from)?;

    Ok(())
}
