//! Configuration loading via `ortho-config`.

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::client::RetryPolicy;
use crate::credentials::{Credentials, EndpointContext};
use crate::task::{DEFAULT_MAX_FAILED_POLLS, PollPolicy};

/// Session configuration derived from environment variables, configuration
/// files, and CLI flags.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(prefix = "ECLOUD")]
pub struct EcloudConfig {
    /// Base URI of the cloud API (for example
    /// `https://services.enterprisecloud.terremark.com`).
    pub endpoint: String,
    /// Public access key identifier.
    pub access_key: String,
    /// Secret key used as the HMAC signing key.
    pub secret_key: String,
    /// Protocol version sent on every request.
    #[ortho_config(default = "2013-06-01".to_owned())]
    pub api_version: String,
    /// Bound on each individual HTTP exchange, in seconds.
    #[ortho_config(default = 30)]
    pub http_timeout_secs: u64,
    /// Pause between task polls, in seconds.
    #[ortho_config(default = 5)]
    pub poll_interval_secs: u64,
    /// Default overall wait for a task, in seconds.
    #[ortho_config(default = 300)]
    pub task_timeout_secs: u64,
    /// Tolerance for a task in `Error` without a message, in seconds.
    #[ortho_config(default = 120)]
    pub error_grace_secs: u64,
    /// Pause between retries of transient server errors, in milliseconds.
    #[ortho_config(default = 1000)]
    pub retry_delay_millis: u64,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    const fn new(description: &'static str, env_var: &'static str, toml_key: &'static str) -> Self {
        Self {
            description,
            env_var,
            toml_key,
        }
    }
}

impl EcloudConfig {
    fn require_field(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::MissingField(format!(
                "missing {}: set {} or add {} to ecloud.toml",
                metadata.description, metadata.env_var, metadata.toml_key
            )));
        }
        Ok(())
    }

    /// Loads configuration using the `ortho-config` derive. Values merge
    /// defaults, configuration files, environment variables, and CLI flags in
    /// that order of precedence.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the loader fails to merge sources.
    pub fn load_from_sources() -> Result<Self, ConfigError> {
        Self::load().map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Loads configuration without attempting to parse CLI arguments. Values
    /// still merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("ecloud")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Performs semantic validation. Error messages name the environment
    /// variable and configuration key that supply each missing value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required field is empty
    /// and [`ConfigError::Invalid`] when a value is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Self::require_field(
            &self.endpoint,
            &FieldMetadata::new("API endpoint", "ECLOUD_ENDPOINT", "endpoint"),
        )?;
        Self::require_field(
            &self.access_key,
            &FieldMetadata::new("API access key", "ECLOUD_ACCESS_KEY", "access_key"),
        )?;
        Self::require_field(
            &self.secret_key,
            &FieldMetadata::new("API secret key", "ECLOUD_SECRET_KEY", "secret_key"),
        )?;
        Self::require_field(
            &self.api_version,
            &FieldMetadata::new("API version", "ECLOUD_API_VERSION", "api_version"),
        )?;

        let endpoint = self.endpoint.trim();
        if !(endpoint.starts_with("https://") || endpoint.starts_with("http://")) {
            return Err(ConfigError::Invalid(format!(
                "endpoint '{endpoint}' must start with http:// or https://"
            )));
        }
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid(String::from(
                "poll_interval_secs must be greater than zero",
            )));
        }
        if self.http_timeout_secs == 0 {
            return Err(ConfigError::Invalid(String::from(
                "http_timeout_secs must be greater than zero",
            )));
        }
        Ok(())
    }

    /// Signing credentials.
    #[must_use]
    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.access_key.trim(), self.secret_key.trim().as_bytes())
    }

    /// Endpoint context using the standard API prefix.
    #[must_use]
    pub fn endpoint_context(&self) -> EndpointContext {
        EndpointContext::new(&self.endpoint, &self.api_version)
    }

    /// Per-call HTTP timeout.
    #[must_use]
    pub const fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Default task wait policy.
    #[must_use]
    pub const fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_secs(self.poll_interval_secs),
            timeout: Duration::from_secs(self.task_timeout_secs),
            error_grace: Duration::from_secs(self.error_grace_secs),
            max_failed_polls: DEFAULT_MAX_FAILED_POLLS,
        }
    }

    /// Transient-error retry policy.
    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            delay: Duration::from_millis(self.retry_delay_millis),
            ..RetryPolicy::DEFAULT
        }
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Indicates a configuration value is present but unusable.
    #[error("invalid configuration: {0}")]
    Invalid(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}
