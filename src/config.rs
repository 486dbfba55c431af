use crate::error::{Error, Result};
use config::{builder::AsyncState, ConfigBuilder, Environment, File};
use jiff::SignedDuration;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub latitude: f64,
    pub longitude: f64,
    /// Endpoint of the sunrise/sunset API.
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// IANA time zone used to format sunrise and sunset times.
    #[serde(default = "default_time_zone")]
    pub time_zone: String,
    /// strftime-style pattern for sunrise and sunset times.
    #[serde(default = "default_time_format")]
    pub time_format: String,
    #[serde(default = "default_cache_ttl_seconds")]
    pub cache_ttl_seconds: u64,
    /// Persist the cache to this file. The cache is kept in memory if unset.
    #[serde(default)]
    pub cache_path: Option<PathBuf>,
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
    #[serde(default = "default_listen_address")]
    pub listen_address: String,
}

/// Keeps `now + ttl` well within the range of a timestamp.
const MAX_CACHE_TTL_SECONDS: u64 = 366 * 86_400;

fn default_api_url() -> String {
    "https://api.sunrise-sunset.org/json".into()
}

fn default_time_zone() -> String {
    "UTC".into()
}

fn default_time_format() -> String {
    "%H:%M".into()
}

fn default_cache_ttl_seconds() -> u64 {
    86_400
}

fn default_request_timeout_seconds() -> u64 {
    10
}

fn default_listen_address() -> String {
    "127.0.0.1:8080".into()
}

impl AppConfig {
    /// Loads the application configuration config files and environment variables.
    pub async fn load() -> Result<AppConfig> {
        let builder = ConfigBuilder::<AsyncState>::default()
            // Configuration from `config.toml`.
            .add_source(File::with_name("config").required(false))
            // Config from environment variables, e.g. `SOLAR_PHASE_LATITUDE`.
            .add_source(
                Environment::with_prefix("SOLAR_PHASE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        let config: AppConfig = builder.build().await?.try_deserialize()?;

        debug!(?config, "loaded configuration");

        config.validate()
    }

    fn validate(self) -> Result<AppConfig> {
        if !(1..=MAX_CACHE_TTL_SECONDS).contains(&self.cache_ttl_seconds) {
            return Err(Error::new(format!(
                "cache_ttl_seconds must be between 1 and {MAX_CACHE_TTL_SECONDS}, got {}",
                self.cache_ttl_seconds
            )));
        }

        Ok(self)
    }

    pub fn cache_ttl(&self) -> SignedDuration {
        SignedDuration::from_secs(i64::try_from(self.cache_ttl_seconds).unwrap_or(i64::MAX))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    async fn from_toml(toml: &str) -> Result<AppConfig> {
        let config: AppConfig = ConfigBuilder::<AsyncState>::default()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .await?
            .try_deserialize()?;
        config.validate()
    }

    #[tokio::test]
    async fn defaults() {
        let config = from_toml("latitude = 52.52\nlongitude = 13.405").await.unwrap();

        assert_eq!(config.latitude, 52.52);
        assert_eq!(config.longitude, 13.405);
        assert_eq!(config.api_url, "https://api.sunrise-sunset.org/json");
        assert_eq!(config.time_zone, "UTC");
        assert_eq!(config.time_format, "%H:%M");
        assert_eq!(config.cache_ttl(), SignedDuration::from_hours(24));
        assert_eq!(config.cache_path, None);
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.listen_address, "127.0.0.1:8080");
    }

    #[tokio::test]
    async fn overrides() {
        let config = from_toml(
            r#"
            latitude = -33.87
            longitude = 151.21
            time_zone = "Australia/Sydney"
            cache_ttl_seconds = 3600
            cache_path = "/var/cache/solar-phase.json"
            "#,
        )
        .await
        .unwrap();

        assert_eq!(config.time_zone, "Australia/Sydney");
        assert_eq!(config.cache_ttl(), SignedDuration::from_hours(1));
        assert_eq!(
            config.cache_path,
            Some(PathBuf::from("/var/cache/solar-phase.json"))
        );
    }

    #[tokio::test]
    async fn location_is_required() {
        assert!(from_toml("latitude = 52.52").await.is_err());
    }

    #[tokio::test]
    async fn cache_ttl_bounds() {
        let location = "latitude = 52.52\nlongitude = 13.405";

        for ttl in [0, MAX_CACHE_TTL_SECONDS + 1, u64::MAX] {
            let toml = format!("{location}\ncache_ttl_seconds = {ttl}");
            assert!(from_toml(&toml).await.is_err(), "{ttl}");
        }

        let toml = format!("{location}\ncache_ttl_seconds = {MAX_CACHE_TTL_SECONDS}");
        let config = from_toml(&toml).await.unwrap();
        let expires_at = jiff::Timestamp::now().checked_add(config.cache_ttl());
        assert!(expires_at.is_ok());
    }
}
