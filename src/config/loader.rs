//! Configuration loading from disk and command-line overrides.

use std::fs;
use std::path::{Path, PathBuf};

use toml::{Table, Value};

use crate::config::schema::{GatewayConfig, UpstreamScheme};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Values supplied on the command line. Each `Some` replaces the file value.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub listen: Option<String>,
    pub tcp_listen: Option<String>,
    pub upstream: Option<String>,
    pub scheme: Option<UpstreamScheme>,
    pub insecure_skip_verify: Option<bool>,
    pub server_name: Option<String>,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
    pub forward_timeout_ms: Option<u64>,
    pub log_level: Option<String>,
}

impl ConfigOverrides {
    fn apply(&self, table: &mut Table) {
        let string = |v: &String| Value::String(v.clone());

        if let Some(v) = &self.listen {
            set(table, "listener", "bind_address", string(v));
        }
        if let Some(v) = &self.tcp_listen {
            set(table, "listener", "tcp_bind_address", string(v));
        }
        if let Some(v) = &self.upstream {
            set(table, "upstream", "address", string(v));
        }
        if let Some(v) = self.scheme {
            set(table, "upstream", "scheme", Value::String(v.as_str().to_string()));
        }
        if let Some(v) = self.insecure_skip_verify {
            set(table, "upstream", "insecure_skip_verify", Value::Boolean(v));
        }
        if let Some(v) = &self.server_name {
            set(table, "tls", "server_name", string(v));
        }
        if let Some(v) = &self.cert_path {
            set(table, "tls", "cert_path", string(v));
        }
        if let Some(v) = &self.key_path {
            set(table, "tls", "key_path", string(v));
        }
        if let Some(v) = self.forward_timeout_ms {
            let ms = i64::try_from(v).unwrap_or(i64::MAX);
            set(table, "timeouts", "forward_ms", Value::Integer(ms));
        }
        if let Some(v) = &self.log_level {
            set(table, "observability", "log_level", string(v));
        }
    }
}

fn set(table: &mut Table, section: &str, key: &str, value: Value) {
    let entry = table
        .entry(section.to_string())
        .or_insert_with(|| Value::Table(Table::new()));
    if !entry.is_table() {
        *entry = Value::Table(Table::new());
    }
    if let Value::Table(section) = entry {
        section.insert(key.to_string(), value);
    }
}

/// Load the optional config file, apply CLI overrides, then validate.
pub fn load_with_overrides(
    path: Option<&Path>,
    overrides: &ConfigOverrides,
) -> Result<GatewayConfig, ConfigError> {
    let mut table = match path {
        Some(path) => {
            let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            content.parse::<Table>()?
        }
        None => Table::new(),
    };

    overrides.apply(&mut table);

    let config: GatewayConfig = Value::Table(table).try_into()?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}
