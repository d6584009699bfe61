use super::ReadinessProbe;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::OnceLock;
use std::time::Duration;

/// Fixed local port the management node serves its API on.
pub const MGMT_API_PORT: u16 = 8080;

/// Per-request timeout; readiness loops retry, so individual probes are
/// kept short.
const PROBE_TIMEOUT: Duration = Duration::from_secs(1);

/// Shared HTTP client for readiness probes.
///
/// A single pooled client avoids re-establishing connections on every poll
/// iteration during a long startup wait.
static SHARED_HTTP_CLIENT: OnceLock<Client> = OnceLock::new();

fn shared_client() -> &'static Client {
    SHARED_HTTP_CLIENT.get_or_init(|| {
        Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to create shared HTTP client")
    })
}

/// What the liveness RPC told us.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiReadiness {
    /// The node answered that it is ready to serve requests.
    Serving,
    /// The node answered, but reported it is still booting.
    Booting,
    /// Nothing answered on the API port.
    Unreachable,
    /// The node answered something the probe could not interpret.
    Indeterminate,
}

/// Protocol-level liveness probe for the management node: POSTs the
/// readiness RPC to the local API port and inspects the reply.
pub struct ApiReadinessProbe {
    url: String,
}

impl ApiReadinessProbe {
    /// Probe the default local API endpoint.
    pub fn local() -> Self {
        Self {
            url: format!("http://127.0.0.1:{}/api", MGMT_API_PORT),
        }
    }

    /// Probe an explicit endpoint (used by tests against a stub server).
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is malformed or not http/https.
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        match url::Url::parse(&url) {
            Ok(parsed) if parsed.scheme() == "http" || parsed.scheme() == "https" => {
                Ok(Self { url })
            }
            Ok(parsed) => Err(Error::Config(format!(
                "invalid readiness URL '{}': scheme must be http or https, got '{}'",
                url,
                parsed.scheme()
            ))),
            Err(e) => Err(Error::Config(format!(
                "invalid readiness URL '{}': {}",
                url, e
            ))),
        }
    }

    /// Run the RPC once and classify the outcome.
    pub async fn probe(&self) -> ApiReadiness {
        let response = shared_client()
            .post(&self.url)
            .json(&serde_json::json!({ "readiness": {} }))
            .timeout(PROBE_TIMEOUT)
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            Err(_) => return ApiReadiness::Unreachable,
        };

        let Ok(body) = response.text().await else {
            return ApiReadiness::Indeterminate;
        };

        match serde_json::from_str::<serde_json::Value>(&body) {
            Ok(value) => match value.get("ready").and_then(|v| v.as_bool()) {
                Some(true) => ApiReadiness::Serving,
                Some(false) => ApiReadiness::Booting,
                None => ApiReadiness::Indeterminate,
            },
            Err(_) => ApiReadiness::Indeterminate,
        }
    }
}

#[async_trait]
impl ReadinessProbe for ApiReadinessProbe {
    async fn check(&self) -> Result<bool> {
        Ok(self.probe().await == ApiReadiness::Serving)
    }
}
