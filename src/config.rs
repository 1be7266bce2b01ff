//! Environment-driven settings for the server.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::aqi::DEFAULT_RADIUS_KM;

#[derive(Error, Debug)]
#[error("invalid value {value:?} for {key}")]
pub struct ConfigError {
    pub key: &'static str,
    pub value: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub font_path: PathBuf,
    pub fog_dir: PathBuf,
    pub sensor_api_url: String,
    pub sensor_radius_km: f64,
    pub geocoder_url: String,
    pub geocoder_api_key: Option<String>,
    pub upstream_timeout: Duration,
    pub max_upload_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            font_path: PathBuf::from("assets/Roboto-Light.ttf"),
            fog_dir: PathBuf::from("fogs"),
            sensor_api_url: "https://data.sensor.community/airrohr/v1".to_string(),
            sensor_radius_km: DEFAULT_RADIUS_KM,
            geocoder_url: "https://maps.googleapis.com/maps/api/geocode/json".to_string(),
            geocoder_api_key: None,
            upstream_timeout: Duration::from_secs(10),
            max_upload_bytes: 20 * 1024 * 1024,
        }
    }
}

impl Config {
    /// Reads the process environment (after an optional `.env`).
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Config::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Config {
            port: parse(&get, "PORT", defaults.port)?,
            font_path: get("FOGIFIER_FONT").map(PathBuf::from).unwrap_or(defaults.font_path),
            fog_dir: get("FOGIFIER_FOG_DIR").map(PathBuf::from).unwrap_or(defaults.fog_dir),
            sensor_api_url: get("SENSOR_API_URL").unwrap_or(defaults.sensor_api_url),
            sensor_radius_km: parse(&get, "SENSOR_RADIUS_KM", defaults.sensor_radius_km)?,
            geocoder_url: get("GEOCODER_URL").unwrap_or(defaults.geocoder_url),
            geocoder_api_key: get("GEOCODER_API_KEY"),
            upstream_timeout: Duration::from_secs(parse(
                &get,
                "UPSTREAM_TIMEOUT_SECS",
                defaults.upstream_timeout.as_secs(),
            )?),
            max_upload_bytes: parse(&get, "MAX_UPLOAD_BYTES", defaults.max_upload_bytes)?,
        })
    }
}

fn parse<T: FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match get(key) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| ConfigError { key, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.sensor_radius_km, 10.0);
        assert_eq!(config.upstream_timeout, Duration::from_secs(10));
        assert!(config.geocoder_api_key.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("PORT", "8080"),
            ("FOGIFIER_FOG_DIR", "/srv/fogs"),
            ("GEOCODER_API_KEY", "k"),
            ("SENSOR_RADIUS_KM", "2.5"),
            ("UPSTREAM_TIMEOUT_SECS", ""),
        ])
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.fog_dir, PathBuf::from("/srv/fogs"));
        assert_eq!(config.geocoder_api_key.as_deref(), Some("k"));
        assert_eq!(config.sensor_radius_km, 2.5);
        assert_eq!(config.upstream_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_bad_number() {
        let err = config(&[("PORT", "eighty")]).unwrap_err();
        assert_eq!(err.key, "PORT");
        assert!(err.to_string().contains("eighty"));
    }
}
