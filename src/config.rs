use crate::cli::LabelMode;
use crate::filter::PortTable;
use crate::nodebook::DEFAULT_CACHE_CAPACITY;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshcapConfig {
    pub cache: CacheConfig,
    pub display: DisplayConfig,
    pub ports: PortsConfig,
}

impl MeshcapConfig {
    /// Built-in port names with the configured aliases merged over them
    pub fn port_table(&self) -> PortTable {
        PortTable::builtin().with_aliases(
            self.ports
                .aliases
                .iter()
                .map(|(alias, port)| (alias.as_str(), port.as_str())),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of node labels kept; 0 disables caching.
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub label_mode: LabelMode,
    pub verbose_payloads: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortsConfig {
    /// Extra short names, e.g. `range = "RANGE_TEST_APP"`
    pub aliases: BTreeMap<String, String>,
}

pub fn load_config(path: Option<&Path>) -> Result<MeshcapConfig, ConfigError> {
    if let Some(path) = path {
        load_config_from_path(path)
    } else {
        Ok(default_config().clone())
    }
}

pub fn load_config_from_path(path: &Path) -> Result<MeshcapConfig, ConfigError> {
    let path_display = path.display().to_string();
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path_display.clone(),
        source,
    })?;

    toml::from_str::<MeshcapConfig>(&raw).map_err(|source| ConfigError::Parse {
        path: path_display,
        source,
    })
}

pub fn default_config() -> &'static MeshcapConfig {
    static DEFAULT_CONFIG: LazyLock<MeshcapConfig> = LazyLock::new(MeshcapConfig::default);
    &DEFAULT_CONFIG
}
