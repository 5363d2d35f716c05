use openai_realtime::Endpoint;
use secrecy::SecretString;
use tracing_subscriber::EnvFilter;

pub const DEFAULT_DEPLOYMENT: &str = "gpt-4o-realtime-preview";

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Debug)]
pub struct Config {
    /// Azure resource endpoint, e.g. `https://my-resource.openai.azure.com`.
    pub endpoint: Option<String>,
    pub api_key: SecretString,
    /// Azure deployment name, or the model name for the OpenAI endpoint.
    pub deployment: String,
    /// `RUST_LOG` filter directives, e.g. `info` or `info,openai_realtime=debug`.
    pub log_filter: String,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let endpoint = std::env::var("REALTIME_ENDPOINT")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());

        let api_key = std::env::var("REALTIME_API_KEY")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(SecretString::from)
            .ok_or_else(|| ConfigError::MissingVar("REALTIME_API_KEY".to_string()))?;

        let deployment = std::env::var("REALTIME_DEPLOYMENT")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DEPLOYMENT.to_string());

        let log_filter = std::env::var("RUST_LOG")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| "info".to_string());
        EnvFilter::try_new(&log_filter).map_err(|e| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid filter: {}", log_filter, e),
            )
        })?;

        Ok(Self {
            endpoint,
            api_key,
            deployment,
            log_filter,
        })
    }

    /// The tracing filter built from `log_filter`.
    pub fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_new(&self.log_filter).unwrap_or_else(|_| EnvFilter::new("info"))
    }

    /// The service to connect to. Azure needs `REALTIME_ENDPOINT`; the
    /// OpenAI endpoint uses the deployment as the model name.
    pub fn endpoint(&self, azure: bool) -> Result<Endpoint, ConfigError> {
        if azure {
            let endpoint = self.endpoint.clone().ok_or_else(|| {
                ConfigError::MissingVar("REALTIME_ENDPOINT must be set for Azure".to_string())
            })?;
            Ok(Endpoint::Azure {
                endpoint,
                deployment: self.deployment.clone(),
            })
        } else {
            Ok(Endpoint::OpenAI {
                model: self.deployment.clone(),
            })
        }
    }
}
