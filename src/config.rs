use std::fmt;
use std::path::PathBuf;

use crate::model::CapacityScope;

/// Runtime settings, read from `COVERS_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub metrics_port: Option<u16>,
    pub compact_threshold: u64,
    pub capacity_scope: CapacityScope,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub var: &'static str,
    pub value: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid value for {}: {:?}", self.var, self.value)
    }
}

impl std::error::Error for ConfigError {}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: 8080,
            data_dir: PathBuf::from("./data"),
            metrics_port: None,
            compact_threshold: 1000,
            capacity_scope: CapacityScope::PerDate,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Unset variables take their defaults;
    /// set but unparsable ones are an error.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Config::default();
        Ok(Self {
            bind: lookup("COVERS_BIND").unwrap_or(defaults.bind),
            port: parse_var(&lookup, "COVERS_PORT")?.unwrap_or(defaults.port),
            data_dir: lookup("COVERS_DATA_DIR").map(PathBuf::from).unwrap_or(defaults.data_dir),
            metrics_port: parse_var(&lookup, "COVERS_METRICS_PORT")?,
            compact_threshold: parse_var(&lookup, "COVERS_COMPACT_THRESHOLD")?
                .unwrap_or(defaults.compact_threshold),
            capacity_scope: parse_var(&lookup, "COVERS_CAPACITY_SCOPE")?
                .unwrap_or(defaults.capacity_scope),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("covers.wal")
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError { var, value }),
    }
}
