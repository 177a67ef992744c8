use crate::defaults;
use crate::error::{ProxyLibError, Result};
use crate::view::{KeyCase, ViewOptions};
use config::{Config as ConfigLoader, Environment, File};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LibConfig {
    pub enabled: bool,
    pub uppercase: bool,
    #[serde(deserialize_with = "deserialize_host_list")]
    pub no_proxy_defaults: Vec<String>,
}

impl Default for LibConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            uppercase: true,
            no_proxy_defaults: Vec::new(),
        }
    }
}

impl LibConfig {
    pub fn view_options(&self) -> ViewOptions {
        ViewOptions {
            enabled: self.enabled,
            case: KeyCase::from(self.uppercase),
            add_no_proxies: self.no_proxy_defaults.clone(),
        }
    }
}

/// Accept either a TOML array or a comma separated string
fn deserialize_host_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum HostList {
        Joined(String),
        List(Vec<String>),
    }

    let hosts = match HostList::deserialize(deserializer)? {
        HostList::Joined(joined) => joined.split(',').map(str::to_string).collect(),
        HostList::List(list) => list,
    };
    Ok(hosts
        .into_iter()
        .map(|host| host.trim().to_string())
        .filter(|host| !host.is_empty())
        .collect())
}

pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir().ok_or_else(|| {
        ProxyLibError::Config(config::ConfigError::Message(
            "Could not find config directory".to_string(),
        ))
    })?;
    Ok(config_dir.join(defaults::CONFIG_DIR_NAME))
}

pub fn default_config_file() -> Result<PathBuf> {
    Ok(get_config_dir()?.join("config.toml"))
}

/// Load the configuration from the default location
pub fn load_config() -> Result<LibConfig> {
    load_config_from(&default_config_file()?)
}

/// Load `path` if it exists, layered under `CHARM_PROXYLIB_*` variables
pub fn load_config_from(path: &Path) -> Result<LibConfig> {
    tracing::debug!(path = %path.display(), "loading configuration");

    let loader = ConfigLoader::builder()
        .add_source(File::from(path).required(false))
        // Env values stay strings: a numeric host must not become an integer.
        .add_source(Environment::with_prefix(defaults::CONFIG_ENV_PREFIX))
        .build()?;

    let config: LibConfig = loader.try_deserialize()?;
    Ok(config)
}

pub fn to_toml(config: &LibConfig) -> Result<String> {
    toml::to_string(config)
        .map_err(|err| ProxyLibError::Config(config::ConfigError::Foreign(Box::new(err))))
}
