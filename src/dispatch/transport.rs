use super::{HostRequest, HostResponse, HttpMethod};
use crate::core::{ClusterOpsError, Result};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use std::net::Ipv6Addr;
use std::time::Duration;
use tracing::{Level, event};

/// Default port of the per-node management agent.
pub const DEFAULT_AGENT_PORT: u16 = 5554;

/// Delivers one request to one host's agent.
#[async_trait]
pub trait HostTransport: Send + Sync {
    /// Sends `request` to `host`.
    ///
    /// Returns the raw status and body for any response the agent produced;
    /// `Err` only when no response was received.
    async fn send(&self, host: &str, request: &HostRequest) -> Result<HostResponse>;
}

/// Agent endpoint configuration
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// URL scheme, `http` unless a TLS-terminating proxy is in front of the agent
    pub scheme: String,

    /// Agent port on every host
    pub port: u16,

    /// Path prefix of the agent API, with leading and trailing `/`
    pub api_prefix: String,

    /// Timeout of a single request
    pub request_timeout: Duration,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            scheme: "http".to_string(),
            port: DEFAULT_AGENT_PORT,
            api_prefix: "/v1/".to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl HttpTransportConfig {
    /// Set the URL scheme
    pub fn scheme(mut self, scheme: &str) -> Self {
        self.scheme = scheme.to_string();
        self
    }

    /// Set the agent port
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the API prefix
    pub fn api_prefix(mut self, prefix: &str) -> Self {
        let mut prefix = prefix.trim_matches('/').to_string();
        prefix = if prefix.is_empty() {
            "/".to_string()
        } else {
            format!("/{}/", prefix)
        };
        self.api_prefix = prefix;
        self
    }

    /// Set the per-request timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// `HostTransport` over HTTP using `reqwest`.
pub struct HttpTransport {
    client: reqwest::Client,
    config: HttpTransportConfig,
}

impl HttpTransport {
    pub fn new(config: HttpTransportConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ClusterOpsError::Transport(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &HttpTransportConfig {
        &self.config
    }

    /// Full URL of `path` on `host`. IPv6 literals are bracketed.
    pub fn endpoint(&self, host: &str, path: &str) -> String {
        let host = if host.parse::<Ipv6Addr>().is_ok() {
            format!("[{}]", host)
        } else {
            host.to_string()
        };
        format!(
            "{}://{}:{}{}{}",
            self.config.scheme,
            host,
            self.config.port,
            self.config.api_prefix,
            path.trim_start_matches('/')
        )
    }
}

fn to_reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Delete => reqwest::Method::DELETE,
    }
}

#[async_trait]
impl HostTransport for HttpTransport {
    async fn send(&self, host: &str, request: &HostRequest) -> Result<HostResponse> {
        let url = self.endpoint(host, &request.path);
        event!(Level::DEBUG, url = %url, method = %request.method, "sending agent request");

        let mut builder = self.client.request(to_reqwest_method(request.method), &url);
        if let Some(body) = &request.body {
            builder = builder
                .header(CONTENT_TYPE, "application/json")
                .body(body.clone());
        }

        let response = builder.send().await.map_err(|e| {
            event!(Level::WARN, error = %e, url = %url, "agent request failed");
            ClusterOpsError::Transport(format!("request to {} failed: {}", url, e))
        })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| {
            ClusterOpsError::Transport(format!("failed to read response from {}: {}", url, e))
        })?;
        Ok(HostResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_formatting() {
        let transport = HttpTransport::new(HttpTransportConfig::default()).unwrap();
        assert_eq!(
            transport.endpoint("10.0.0.1", "/health"),
            "http://10.0.0.1:5554/v1/health"
        );
        assert_eq!(
            transport.endpoint("fd00::1", "node-state"),
            "http://[fd00::1]:5554/v1/node-state"
        );
        assert_eq!(
            transport.endpoint("[fd00::1]", "health"),
            "http://[fd00::1]:5554/v1/health"
        );
        assert_eq!(
            transport.endpoint("db-node:1", "health"),
            "http://db-node:1:5554/v1/health"
        );
    }

    #[test]
    fn test_api_prefix_normalization() {
        let config = HttpTransportConfig::default().api_prefix("api/v2");
        assert_eq!(config.api_prefix, "/api/v2/");
        let config = HttpTransportConfig::default().api_prefix("/");
        assert_eq!(config.api_prefix, "/");
    }
}
