use std::fmt;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::constants::network;
use crate::errors::StepError;
use crate::managers::executor::{ConnectionIdentity, ExecutorSettings};
use crate::services::arguments::ReportRequest;
use crate::services::validation::Validation;
use crate::utils::redact::PASSWORD_MASK;

/// SSH endpoint and credentials for the host running runrep. The password
/// and key passphrase can also arrive via `GENEVA_RUNNER_SSH_PASSWORD` /
/// `GENEVA_RUNNER_SSH_KEY_PASSPHRASE` so they stay out of config files.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    pub host: String,
    pub port: Option<u16>,
    pub username: String,
    pub password: Option<String>,
    pub private_key_path: Option<String>,
    pub private_key_passphrase: Option<String>,
}

impl ConnectionSettings {
    pub fn identity(&self) -> ConnectionIdentity {
        ConnectionIdentity {
            host: self.host.clone(),
            port: self.port.unwrap_or(network::SSH_DEFAULT_PORT),
            username: self.username.clone(),
            password: self.password.clone(),
            private_key_path: self.private_key_path.clone(),
            private_key_passphrase: self.private_key_passphrase.clone(),
        }
    }
}

impl fmt::Debug for ConnectionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| PASSWORD_MASK))
            .field("private_key_path", &self.private_key_path)
            .field(
                "private_key_passphrase",
                &self.private_key_passphrase.as_ref().map(|_| PASSWORD_MASK),
            )
            .finish()
    }
}

/// Optional overrides for the executor's timeouts and settle interval.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ExecutorTuning {
    pub connect_timeout_ms: Option<u64>,
    pub data_timeout_ms: Option<u64>,
    pub settle_ms: Option<u64>,
}

impl ExecutorTuning {
    pub fn settings(&self) -> ExecutorSettings {
        let mut settings = ExecutorSettings::default();
        if let Some(value) = self.connect_timeout_ms {
            settings.connect_timeout_ms = value;
        }
        if let Some(value) = self.data_timeout_ms {
            settings.data_timeout_ms = value;
        }
        if let Some(value) = self.settle_ms {
            settings.settle_ms = value;
        }
        settings
    }
}

/// One pipeline run: where to connect and which report to produce.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub connection: ConnectionSettings,
    pub request: ReportRequest,
    pub executor: ExecutorTuning,
}

impl RunConfig {
    pub fn load(path: &Path) -> Result<Self, StepError> {
        let raw = fs::read_to_string(path).map_err(|err| {
            StepError::invalid_params(format!(
                "Cannot read run configuration `{}`: {}",
                path.display(),
                err
            ))
        })?;
        let mut config = Self::from_json(&raw)?;
        config.apply_env_overrides();
        config.ensure_connection()?;
        Ok(config)
    }

    pub fn from_json(raw: &str) -> Result<Self, StepError> {
        serde_json::from_str(raw).map_err(|err| {
            StepError::invalid_params(format!("Malformed run configuration: {}", err))
        })
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(password) = std::env::var("GENEVA_RUNNER_SSH_PASSWORD") {
            self.connection.password = Some(password);
        }
        if let Ok(passphrase) = std::env::var("GENEVA_RUNNER_SSH_KEY_PASSPHRASE") {
            self.connection.private_key_passphrase = Some(passphrase);
        }
        if let Ok(password) = std::env::var("GENEVA_RUNNER_GENEVA_PASSWORD") {
            self.request.geneva_password = Some(password);
        }
    }

    fn ensure_connection(&self) -> Result<(), StepError> {
        let validation = Validation::new();
        validation.ensure_not_blank(Some(&self.connection.host), "connection.host")?;
        validation.ensure_not_blank(Some(&self.connection.username), "connection.username")?;
        Ok(())
    }
}
