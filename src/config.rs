use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_API_VERSION: &str = "2.254";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub freeipa: FreeIpaConfig,
}

/// Connection settings for the FreeIPA server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FreeIpaConfig {
    /// Server host name, without scheme (e.g. `ipa.example.test`)
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Skip TLS certificate verification
    #[serde(default)]
    pub insecure: bool,
    /// PEM bundle to trust in addition to the system roots
    #[serde(default)]
    pub ca_certificate: Option<PathBuf>,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for FreeIpaConfig {
    fn default() -> Self {
        Self {
            host: None,
            username: None,
            password: None,
            insecure: false,
            ca_certificate: None,
            api_version: default_api_version(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl FreeIpaConfig {
    pub fn validate(&self) -> Result<()> {
        let missing: Vec<&str> = [
            ("host", &self.host),
            ("username", &self.username),
            ("password", &self.password),
        ]
        .iter()
        .filter(|(_, value)| value.as_deref().map_or(true, str::is_empty))
        .map(|(name, _)| *name)
        .collect();

        if !missing.is_empty() {
            anyhow::bail!(
                "FreeIPA connection settings missing: {}. Set them in the config file or via FREEIPA_* environment variables.",
                missing.join(", ")
            );
        }
        if self.timeout_secs == 0 {
            anyhow::bail!("FreeIPA timeout_secs must be greater than zero");
        }
        Ok(())
    }

    /// Environment variables take precedence over file values.
    fn apply_env_overrides(&mut self) {
        if let Ok(host) = env::var("FREEIPA_HOST") {
            self.host = Some(host);
        }
        if let Ok(username) = env::var("FREEIPA_USERNAME") {
            self.username = Some(username);
        }
        if let Ok(password) = env::var("FREEIPA_PASSWORD") {
            self.password = Some(password);
        }
        if let Ok(val) = env::var("FREEIPA_INSECURE") {
            self.insecure = val.to_lowercase() == "true";
        }
        if let Ok(path) = env::var("FREEIPA_CA_CERT") {
            self.ca_certificate = Some(PathBuf::from(path));
        }
    }
}

/// Location of the per-user config file, `~/.tfipa/config.json`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".tfipa").join("config.json"))
}

fn read_config_file(path: &Path) -> Result<Config> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config file {}", path.display()))
}

pub fn init_from_path(path: &str) -> Result<Config> {
    let mut config = read_config_file(Path::new(path))?;
    config.freeipa.apply_env_overrides();
    Ok(config)
}

pub fn init_default() -> Result<Config> {
    let mut config = match default_config_path() {
        Some(path) if path.exists() => read_config_file(&path)?,
        _ => Config::default(),
    };
    config.freeipa.apply_env_overrides();
    Ok(config)
}
