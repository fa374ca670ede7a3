//! Connection configuration for the SQS transport.
//!
//! Configuration can come from three places:
//!
//! - a DSN string such as `sqs:?key=AKIA...&secret=...&region=eu-west-1&lazy=0`
//! - structured options (the struct itself, usually deserialized with serde)
//! - layered loading via [`SqsConnectionConfig::load`]: an optional file, then
//!   environment variables prefixed `SQS__` (double-underscore separator),
//!   e.g. `SQS__REGION=eu-west-1`
//!
//! Every field carries a default, so an empty DSN (`sqs:`) or an empty
//! environment produces a usable configuration.

use crate::error::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use url::Url;

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

/// DSN scheme accepted by [`SqsConnectionConfig::from_dsn`]
pub const DSN_SCHEME: &str = "sqs";

/// SQS API version sent with every request
pub const DEFAULT_API_VERSION: &str = "2012-11-05";

/// Region used when neither configuration nor destination names one
pub const DEFAULT_REGION: &str = "us-east-1";

/// Environment variable prefix used by [`SqsConnectionConfig::load`]
pub const ENV_PREFIX: &str = "SQS";

/// Connection settings for an SQS transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqsConnectionConfig {
    /// AWS access key ID
    pub key: Option<String>,
    /// AWS secret access key
    pub secret: Option<String>,
    /// AWS session token for temporary credentials
    pub token: Option<String>,
    /// Default region
    pub region: Option<String>,
    /// Retry count handed to the transport layer; the producer never retries
    pub retries: u32,
    /// SQS API version
    pub version: String,
    /// Build the HTTP client on the first call instead of at construction
    pub lazy: bool,
    /// Custom endpoint (e.g. LocalStack) replacing the regional endpoint
    pub endpoint: Option<String>,
}

impl Default for SqsConnectionConfig {
    fn default() -> Self {
        Self {
            key: None,
            secret: None,
            token: None,
            region: None,
            retries: 3,
            version: DEFAULT_API_VERSION.to_string(),
            lazy: true,
            endpoint: None,
        }
    }
}

impl SqsConnectionConfig {
    /// Parse a `sqs:` DSN.
    ///
    /// Options are read from the query string; unknown options are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidDsn`] if the text is not a URL,
    /// [`ConfigurationError::UnsupportedScheme`] if the scheme is not `sqs`,
    /// and [`ConfigurationError::Invalid`] if an option has a malformed value.
    pub fn from_dsn(dsn: &str) -> Result<Self, ConfigurationError> {
        let url = Url::parse(dsn).map_err(|_| ConfigurationError::InvalidDsn)?;

        if url.scheme() != DSN_SCHEME {
            return Err(ConfigurationError::UnsupportedScheme {
                scheme: url.scheme().to_string(),
            });
        }

        let mut config = Self::default();
        for (name, value) in url.query_pairs() {
            let value = value.into_owned();
            match name.as_ref() {
                "key" => config.key = Some(value),
                "secret" => config.secret = Some(value),
                "token" => config.token = Some(value),
                "region" => config.region = Some(value),
                "endpoint" => config.endpoint = Some(value),
                "version" => config.version = value,
                "retries" => {
                    config.retries = value.parse().map_err(|_| ConfigurationError::Invalid {
                        message: format!("retries must be a non-negative integer, got '{}'", value),
                    })?;
                }
                "lazy" => config.lazy = parse_flag("lazy", &value)?,
                _ => {}
            }
        }

        Ok(config)
    }

    /// Load configuration from an optional file and the environment.
    ///
    /// Sources are applied in order, later ones override earlier ones:
    ///  1. built-in defaults
    ///  2. `config_file`, when given (format inferred from the extension)
    ///  3. environment variables prefixed `SQS__`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::Load`] if the file is missing or
    /// malformed, or a value cannot be coerced to the field type.
    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigurationError> {
        let mut builder = config::Config::builder();

        if let Some(path) = config_file {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let config = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Region for a call, preferring a per-call override
    pub fn region_for<'a>(&'a self, region_override: Option<&'a str>) -> &'a str {
        region_override
            .or(self.region.as_deref())
            .unwrap_or(DEFAULT_REGION)
    }

    /// Endpoint for a call in the given region
    pub fn endpoint_for(&self, region: &str) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://sqs.{}.amazonaws.com", region),
        }
    }

    /// Check if static credentials are configured
    pub fn has_credentials(&self) -> bool {
        self.key.is_some() && self.secret.is_some()
    }
}

impl FromStr for SqsConnectionConfig {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_dsn(s)
    }
}

fn parse_flag(name: &str, value: &str) -> Result<bool, ConfigurationError> {
    match value {
        "1" | "true" => Ok(true),
        "0" | "false" | "" => Ok(false),
        _ => Err(ConfigurationError::Invalid {
            message: format!("{} must be a boolean flag, got '{}'", name, value),
        }),
    }
}
