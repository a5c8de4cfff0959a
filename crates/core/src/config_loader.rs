use crate::config::AppConfig;
use anyhow::Result;
use figment::{
    providers::{Env, Format, Json, Serialized, Toml},
    Figment,
};

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads engine configuration by layering defaults, TOML, JSON and `AUTOTRADE_` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be parsed.
    pub fn load() -> Result<AppConfig> {
        Self::figment(None).extract().map_err(Into::into)
    }

    /// Loads configuration with a profile overlay from `config/Config.<profile>.toml`.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be parsed.
    pub fn load_with_profile(profile: &str) -> Result<AppConfig> {
        Self::figment(Some(profile)).extract().map_err(Into::into)
    }

    /// Loads configuration from an explicit TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be parsed.
    pub fn load_from(path: &str) -> Result<AppConfig> {
        let config: AppConfig = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("AUTOTRADE_").split("__"))
            .extract()?;

        Ok(config)
    }

    fn figment(profile: Option<&str>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file("config/Config.toml"));
        if let Some(profile) = profile {
            figment = figment.merge(Toml::file(format!("config/Config.{profile}.toml")));
        }
        figment
            .merge(Env::prefixed("AUTOTRADE_").split("__"))
            .join(Json::file("config/Config.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_files_fall_back_to_defaults() {
        let config = ConfigLoader::load_from("does/not/exist.toml").unwrap();
        assert_eq!(config.engine.candle_limit, 100);
        assert_eq!(config.engine.trade_history_limit, 50);
        assert!(config.database.url.starts_with("sqlite:"));
    }
}
