// Client configuration and its validation

use std::{env, fmt, str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ClientError;

pub const DEFAULT_BASE_URL: &str = "https://itwhip.com/api/v3";
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

pub const ENV_API_KEY: &str = "ITWHIP_API_KEY";
pub const ENV_HOTEL_ID: &str = "ITWHIP_HOTEL_ID";
pub const ENV_ENVIRONMENT: &str = "ITWHIP_ENVIRONMENT";
pub const ENV_BASE_URL: &str = "ITWHIP_BASE_URL";
pub const ENV_TIMEOUT_MS: &str = "ITWHIP_TIMEOUT_MS";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Production,
    Staging,
    Sandbox,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Production => "production",
            Environment::Staging => "staging",
            Environment::Sandbox => "sandbox",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Environment::Production),
            "staging" => Ok(Environment::Staging),
            "sandbox" => Ok(Environment::Sandbox),
            other => Err(ClientError::ConfigError(format!(
                "unknown environment '{other}'"
            ))),
        }
    }
}

// Immutable once handed to a client
#[derive(Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub credential: String,
    pub property_id: Option<String>,
    pub environment: Environment,
    pub base_url: String,
    pub timeout_ms: u64,
}

impl ClientConfig {
    pub fn new(credential: impl Into<String>) -> Self {
        Self {
            credential: credential.into(),
            property_id: None,
            environment: Environment::default(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    pub fn with_property_id(mut self, property_id: impl Into<String>) -> Self {
        self.property_id = Some(property_id.into());
        self
    }

    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Reads the configuration from `ITWHIP_*` environment variables.
    ///
    /// A missing API key is not reported here; it surfaces as
    /// [`ClientError::MissingCredential`] when the client is built.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, ClientError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::new(lookup(ENV_API_KEY).unwrap_or_default());
        config.property_id = lookup(ENV_HOTEL_ID);

        if let Some(environment) = lookup(ENV_ENVIRONMENT) {
            config.environment = environment.parse()?;
        }
        if let Some(base_url) = lookup(ENV_BASE_URL) {
            config.base_url = base_url;
        }
        if let Some(timeout) = lookup(ENV_TIMEOUT_MS) {
            config.timeout_ms = timeout.trim().parse().map_err(|_| {
                ClientError::ConfigError(format!("{ENV_TIMEOUT_MS} must be an integer, got '{timeout}'"))
            })?;
        }

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        if self.credential.trim().is_empty() {
            return Err(ClientError::MissingCredential);
        }

        if self.timeout_ms == 0 {
            return Err(ClientError::ConfigError(
                "timeout_ms must be greater than zero".to_string(),
            ));
        }

        match Url::parse(&self.base_url) {
            Ok(url) if !url.cannot_be_a_base() => Ok(()),
            _ => Err(ClientError::ConfigError(format!(
                "base_url '{}' is not an absolute URL",
                self.base_url
            ))),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("credential", &"<redacted>")
            .field("property_id", &self.property_id)
            .field("environment", &self.environment)
            .field("base_url", &self.base_url)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}
