use crate::cgi::QueryParams;
use anyhow::{Context, Result};
use ng_core::Request;
use ng_ipt::Family;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "/etc/netgraph/server.yaml";

/// Optional settings file. Every field may be left out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub table: Option<String>,
    pub chain: Option<String>,
    pub family: Option<Family>,
    pub save_binary: Option<PathBuf>,
    pub pretty: Option<bool>,
}

impl ServerConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml).context("Failed to parse config YAML")
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;
        Self::from_yaml(&content).with_context(|| format!("Invalid config in {:?}", path))
    }

    /// Load the explicit file if given, else the default file if it exists
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => {
                let default = Path::new(DEFAULT_CONFIG_PATH);
                if default.exists() {
                    Self::from_file(default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }
}

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub table: Option<String>,
    pub chain: Option<String>,
    pub ipv6: bool,
    pub save_binary: Option<PathBuf>,
    pub pretty: bool,
}

/// Everything one run needs, after layering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub request: Request,
    pub family: Family,
    pub save_binary: Option<PathBuf>,
}

impl Settings {
    /// Layer defaults, config file, command line and query string, in
    /// increasing precedence. The query string cannot pick the save tool.
    pub fn resolve(config: &ServerConfig, overrides: &Overrides, query: &QueryParams) -> Self {
        let defaults = Request::default();

        let table = query
            .table
            .clone()
            .or_else(|| overrides.table.clone())
            .or_else(|| config.table.clone())
            .unwrap_or(defaults.table);

        let chain = query
            .chain
            .clone()
            .or_else(|| overrides.chain.clone())
            .or_else(|| config.chain.clone());

        let pretty = query
            .pretty
            .unwrap_or(overrides.pretty || config.pretty.unwrap_or(defaults.pretty));

        let family = if overrides.ipv6 {
            Family::Ipv6
        } else {
            config.family.unwrap_or_default()
        };

        Self {
            request: Request {
                table,
                chain,
                pretty,
            },
            family,
            save_binary: overrides
                .save_binary
                .clone()
                .or_else(|| config.save_binary.clone()),
        }
    }
}
