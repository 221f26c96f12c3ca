use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::QcError;
use crate::transport::{ConnectionSettings, DEFAULT_TIMEOUT_SECS, normalize_server};

/// Optional `ampliqc.json` next to the working directory. Every key can also
/// be supplied (and is overridden) on the command line.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub accept_invalid_certs: Option<bool>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads an explicit `--config` path, or `ampliqc.json` when present.
    /// An absent default file is not an error; an unreadable explicit one is.
    pub fn resolve(path: Option<&str>) -> Result<Config, QcError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from("ampliqc.json"),
        };

        if path.is_none() && !config_path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| QcError::ConfigRead(config_path.clone()))?;
        serde_json::from_str(&content).map_err(|err| QcError::ConfigParse(err.to_string()))
    }
}

/// Connection values taken from the command line, before the config merge.
#[derive(Debug, Clone, Default)]
pub struct CliConnection {
    pub server: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub accept_invalid_certs: bool,
    pub timeout_secs: Option<u64>,
}

pub fn connection_settings(
    cli: CliConnection,
    config: Config,
) -> Result<ConnectionSettings, QcError> {
    let server = cli
        .server
        .or(config.server)
        .ok_or(QcError::MissingSetting("server"))?;
    let username = cli
        .username
        .or(config.username)
        .ok_or(QcError::MissingSetting("username"))?;
    let password = cli
        .password
        .or(config.password)
        .ok_or(QcError::MissingSetting("password"))?;
    let accept_invalid_certs =
        cli.accept_invalid_certs || config.accept_invalid_certs.unwrap_or(false);
    let timeout_secs = cli
        .timeout_secs
        .or(config.timeout_secs)
        .unwrap_or(DEFAULT_TIMEOUT_SECS);

    Ok(ConnectionSettings {
        server: normalize_server(&server)?,
        username,
        password,
        accept_invalid_certs,
        timeout: Duration::from_secs(timeout_secs),
    })
}
