use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, path::PathBuf};

use crate::{location::LocationAuthorization, model::Coordinate};

pub const DEFAULT_WEATHER_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";
pub const DEFAULT_GEO_BASE_URL: &str = "https://api.openweathermap.org/geo/1.0";

/// Everything the HTTP client needs, injected at construction.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_key: String,
    pub weather_base_url: Url,
    pub geo_base_url: Url,
}

impl ClientConfig {
    /// Client config pointing at the public OpenWeather endpoints.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_base_urls(api_key, DEFAULT_WEATHER_BASE_URL, DEFAULT_GEO_BASE_URL)
    }

    pub fn with_base_urls(
        api_key: impl Into<String>,
        weather_base_url: &str,
        geo_base_url: &str,
    ) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(anyhow!("API key must not be empty"));
        }

        let weather_base_url = Url::parse(weather_base_url)
            .with_context(|| format!("Invalid weather endpoint URL: {weather_base_url}"))?;
        let geo_base_url = Url::parse(geo_base_url)
            .with_context(|| format!("Invalid geocoding endpoint URL: {geo_base_url}"))?;

        Ok(Self { api_key, weather_base_url, geo_base_url })
    }
}

/// Optional endpoint overrides, e.g. for a proxy or a local mock.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub weather_base_url: Option<String>,
    pub geo_base_url: Option<String>,
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// api_key = "..."
/// location_permission = "authorized"
///
/// [location]
/// latitude = 48.8566
/// longitude = 2.3522
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_key: Option<String>,

    /// Last permission decision made by the user, if any.
    pub location_permission: Option<LocationAuthorization>,

    // Tables last: TOML cannot place plain values after a table.
    pub endpoints: EndpointConfig,

    /// Fixed device position used by the command-line location platform.
    pub location: Option<Coordinate>,
}

impl Config {
    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, return empty.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "skysnapper", "skysnapper")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    pub fn set_api_key(&mut self, api_key: String) {
        self.api_key = Some(api_key);
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }

    /// Build the HTTP client config, applying any endpoint overrides.
    pub fn client_config(&self) -> Result<ClientConfig> {
        let api_key = self.api_key.as_deref().filter(|k| !k.trim().is_empty()).ok_or_else(|| {
            anyhow!(
                "No API key configured.\n\
                 Hint: run `skysnapper configure` and enter your OpenWeather API key."
            )
        })?;

        ClientConfig::with_base_urls(
            api_key,
            self.endpoints.weather_base_url.as_deref().unwrap_or(DEFAULT_WEATHER_BASE_URL),
            self.endpoints.geo_base_url.as_deref().unwrap_or(DEFAULT_GEO_BASE_URL),
        )
    }
}
