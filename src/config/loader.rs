use std::{fs, fs::File, io::Write, path::Path};

use anyhow::{Context, Result};
use config::{Config, Environment};
use log::info;

use super::WalletConfig;

pub const ENV_PREFIX: &str = "PIA";

pub fn get_default_config() -> &'static str {
    include_str!("../../config/config.toml")
}

/// Reads the TOML file at `path` (writing the default one first if missing),
/// layered under `PIA_*` environment variables.
pub fn load_configuration(path: &Path) -> Result<Config> {
    if !path.exists() {
        write_config_to(path, get_default_config()).context("Could not create default config")?;
        info!(path:% = path.display(); "Created new configuration file");
    }

    let filename = path.to_str().context("Invalid config file path")?;

    Config::builder()
        .add_source(config::File::with_name(filename))
        .add_source(Environment::with_prefix(ENV_PREFIX).prefix_separator("_").separator("__"))
        .build()
        .context("Could not build config")
}

/// Loads and deserializes the wallet configuration. Keys missing from the file fall back to defaults.
pub fn load_wallet_config(path: &Path) -> Result<WalletConfig> {
    let cfg = load_configuration(path)?;
    let defaults = Config::try_from(&WalletConfig::default()).context("Could not serialize default config")?;

    Config::builder()
        .add_source(defaults)
        .add_source(cfg)
        .build()
        .context("Could not merge config with defaults")?
        .try_deserialize()
        .context("Invalid wallet configuration")
}

pub fn write_config_to(path: &Path, source: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Failed to create parent directories")?;
    };

    let mut file = File::create(path).context("Failed to create config file")?;
    file.write_all(source.as_bytes())
        .context("Failed to write config content")?;
    file.write_all(b"\n").context("Failed to write newline")?;
    Ok(())
}
