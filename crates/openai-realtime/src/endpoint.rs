use anyhow::{Context, Result, bail};
use secrecy::{ExposeSecret, SecretString};
use tokio_tungstenite::tungstenite::{client::IntoClientRequest, handshake::client::Request};

/// API version requested from Azure OpenAI realtime deployments.
pub const AZURE_API_VERSION: &str = "2024-10-01-preview";
/// The public OpenAI realtime endpoint.
pub const OPENAI_REALTIME_URL: &str = "wss://api.openai.com/v1/realtime";

/// Where a realtime session is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// An Azure OpenAI resource, addressed by its base URL and deployment name.
    Azure { endpoint: String, deployment: String },
    /// The OpenAI service, addressed by model name.
    OpenAI { model: String },
}

impl Endpoint {
    /// The WebSocket URL for this endpoint.
    ///
    /// For Azure only the scheme and authority of the configured endpoint are
    /// kept; `http(s)` is mapped onto `ws(s)`.
    pub fn url(&self) -> Result<String> {
        match self {
            Endpoint::Azure {
                endpoint,
                deployment,
            } => {
                let (scheme, rest) = endpoint
                    .trim()
                    .split_once("://")
                    .with_context(|| format!("Endpoint '{}' has no scheme", endpoint))?;
                let ws_scheme = match scheme.to_ascii_lowercase().as_str() {
                    "https" | "wss" => "wss",
                    "http" | "ws" => "ws",
                    other => bail!("Unsupported endpoint scheme '{}'", other),
                };
                let authority = rest.split(['/', '?']).next().unwrap_or_default();
                if authority.is_empty() {
                    bail!("Endpoint '{}' has no host", endpoint);
                }
                if deployment.trim().is_empty() {
                    bail!("Azure deployment name is empty");
                }
                Ok(format!(
                    "{}://{}/openai/realtime?api-version={}&deployment={}",
                    ws_scheme,
                    authority,
                    AZURE_API_VERSION,
                    deployment.trim()
                ))
            }
            Endpoint::OpenAI { model } => {
                if model.trim().is_empty() {
                    bail!("Model name is empty");
                }
                Ok(format!("{}?model={}", OPENAI_REALTIME_URL, model.trim()))
            }
        }
    }

    /// Builds the authenticated WebSocket upgrade request.
    pub fn request(&self, api_key: &SecretString) -> Result<Request> {
        let mut request = self.url()?.into_client_request()?;
        let headers = request.headers_mut();
        match self {
            Endpoint::Azure { .. } => {
                headers.insert("api-key", api_key.expose_secret().parse()?);
            }
            Endpoint::OpenAI { .. } => {
                headers.insert(
                    "Authorization",
                    format!("Bearer {}", api_key.expose_secret()).parse()?,
                );
                headers.insert("OpenAI-Beta", "realtime=v1".parse()?);
            }
        }
        Ok(request)
    }

    pub fn is_azure(&self) -> bool {
        matches!(self, Endpoint::Azure { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> SecretString {
        SecretString::from("sk-test".to_string())
    }

    #[test]
    fn test_azure_url_keeps_only_authority() {
        let endpoint = Endpoint::Azure {
            endpoint: "https://contoso.openai.azure.com/some/path/".to_string(),
            deployment: "gpt-4o-realtime".to_string(),
        };
        assert_eq!(
            endpoint.url().unwrap(),
            "wss://contoso.openai.azure.com/openai/realtime?api-version=2024-10-01-preview&deployment=gpt-4o-realtime"
        );
    }

    #[test]
    fn test_azure_url_plain_http_maps_to_ws() {
        let endpoint = Endpoint::Azure {
            endpoint: "http://localhost:8080".to_string(),
            deployment: "dep".to_string(),
        };
        assert!(endpoint.url().unwrap().starts_with("ws://localhost:8080/openai/realtime?"));
    }

    #[test]
    fn test_azure_url_rejects_bad_input() {
        let no_scheme = Endpoint::Azure {
            endpoint: "contoso.openai.azure.com".to_string(),
            deployment: "dep".to_string(),
        };
        assert!(no_scheme.url().is_err());

        let ftp = Endpoint::Azure {
            endpoint: "ftp://contoso".to_string(),
            deployment: "dep".to_string(),
        };
        assert!(ftp.url().is_err());

        let no_deployment = Endpoint::Azure {
            endpoint: "https://contoso".to_string(),
            deployment: " ".to_string(),
        };
        assert!(no_deployment.url().is_err());
    }

    #[test]
    fn test_openai_url() {
        let endpoint = Endpoint::OpenAI {
            model: "gpt-4o-realtime-preview".to_string(),
        };
        assert_eq!(
            endpoint.url().unwrap(),
            "wss://api.openai.com/v1/realtime?model=gpt-4o-realtime-preview"
        );
        assert!(!endpoint.is_azure());
    }

    #[test]
    fn test_azure_request_uses_api_key_header() {
        let endpoint = Endpoint::Azure {
            endpoint: "https://contoso.openai.azure.com".to_string(),
            deployment: "dep".to_string(),
        };
        let request = endpoint.request(&key()).unwrap();
        assert_eq!(request.headers()["api-key"], "sk-test");
        assert!(request.headers().get("Authorization").is_none());
    }

    #[test]
    fn test_openai_request_uses_bearer_and_beta_headers() {
        let endpoint = Endpoint::OpenAI {
            model: "gpt-4o-realtime-preview".to_string(),
        };
        let request = endpoint.request(&key()).unwrap();
        assert_eq!(request.headers()["Authorization"], "Bearer sk-test");
        assert_eq!(request.headers()["OpenAI-Beta"], "realtime=v1");
    }
}
