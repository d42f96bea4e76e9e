use crate::config::AppConfig;
use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};

pub const DEFAULT_CONFIG_PATH: &str = "config/Config.toml";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads configuration from a TOML file merged with `HEDGER_` environment variables.
    ///
    /// A missing file is not an error; every section has defaults. Environment variables use
    /// `__` to separate nesting, e.g. `HEDGER_HEDGING__LOSS_THRESHOLD=-15`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be parsed or fails validation.
    pub fn load_from(path: &str) -> Result<AppConfig> {
        let config: AppConfig = Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("HEDGER_").split("__"))
            .extract()
            .with_context(|| format!("Failed to load configuration from {path}"))?;

        config.hedging.validate()?;
        tracing::debug!(path, mode = ?config.broker.mode, "Configuration loaded");
        Ok(config)
    }
}
