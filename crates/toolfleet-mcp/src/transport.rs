//! HTTP transport for MCP communication.
//!
//! Every server in the fleet sits behind a local proxy that accepts JSON-RPC
//! messages as HTTP POST bodies. The transport is stateless; the session
//! token is owned by [`ProtocolSession`](crate::session::ProtocolSession) and
//! passed in on each call.

use std::time::Duration;

use reqwest::header::{ACCEPT, CONTENT_TYPE};

use crate::error::{McpError, Result};
use crate::protocol::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};

/// Header carrying the session token issued during the handshake.
pub const SESSION_HEADER: &str = "mcp-session-id";

/// Configuration for HTTP transport.
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// Endpoint of the proxied server.
    pub url: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Number of retries for connection failures.
    pub retries: u32,
    /// Delay between retries.
    pub retry_delay: Duration,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            timeout: Duration::from_secs(10),
            retries: 3,
            retry_delay: Duration::from_millis(250),
        }
    }
}

impl HttpTransportConfig {
    /// Create a new HTTP transport config with the given URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the number of retries.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Set the delay between retries.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }
}

/// A response together with the session token the server returned, if any.
#[derive(Debug, Clone)]
pub struct HttpReply {
    /// The decoded JSON-RPC response.
    pub response: JsonRpcResponse,
    /// Value of the `mcp-session-id` response header.
    pub session_id: Option<String>,
}

/// JSON-RPC over HTTP POST.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    config: HttpTransportConfig,
}

impl HttpTransport {
    /// Create a new HTTP transport.
    pub fn new(config: HttpTransportConfig) -> Result<Self> {
        url::Url::parse(&config.url)
            .map_err(|e| McpError::transport(format!("invalid URL '{}': {}", config.url, e)))?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .pool_max_idle_per_host(2)
            .build()
            .map_err(|e| McpError::transport(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// The endpoint this transport posts to.
    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// The transport configuration.
    pub fn config(&self) -> &HttpTransportConfig {
        &self.config
    }

    /// Send a JSON-RPC request and wait for the response.
    pub async fn send_request(
        &self,
        request: &JsonRpcRequest,
        session_id: Option<&str>,
    ) -> Result<HttpReply> {
        let body = serde_json::to_string(request)?;

        tracing::trace!(url = %self.config.url, json = %body, "sending MCP HTTP request");

        let resp = self.post_with_retries(&body, session_id).await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(McpError::transport(format!("HTTP error {}: {}", status, text)));
        }

        let session_id = resp
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let text = resp
            .text()
            .await
            .map_err(|e| McpError::transport(format!("failed to read response body: {}", e)))?;

        tracing::trace!(json = %text, "received MCP HTTP response");

        let response = decode_response(&content_type, &text)?;
        Ok(HttpReply {
            response,
            session_id,
        })
    }

    /// Send a JSON-RPC notification. No response body is read.
    pub async fn send_notification(
        &self,
        notification: &JsonRpcNotification,
        session_id: Option<&str>,
    ) -> Result<()> {
        let body = serde_json::to_string(notification)?;
        let resp = self.post_with_retries(&body, session_id).await?;

        if !resp.status().is_success() {
            return Err(McpError::transport(format!(
                "notification '{}' rejected with HTTP {}",
                notification.method,
                resp.status()
            )));
        }
        Ok(())
    }

    async fn post_with_retries(
        &self,
        body: &str,
        session_id: Option<&str>,
    ) -> Result<reqwest::Response> {
        let mut retries = self.config.retries;
        loop {
            let mut req = self
                .client
                .post(&self.config.url)
                .header(CONTENT_TYPE, "application/json")
                .header(ACCEPT, "application/json")
                .body(body.to_string());

            if let Some(id) = session_id {
                req = req.header(SESSION_HEADER, id);
            }

            match req.send().await {
                Ok(resp) => return Ok(resp),
                Err(e) if e.is_timeout() => return Err(McpError::Timeout(self.config.timeout)),
                Err(e) if e.is_connect() && retries > 0 => {
                    retries -= 1;
                    tracing::debug!(
                        url = %self.config.url,
                        error = %e,
                        retries_remaining = retries,
                        "connection failed, retrying"
                    );
                    tokio::time::sleep(self.config.retry_delay).await;
                }
                Err(e) => {
                    return Err(McpError::transport(format!("HTTP request failed: {}", e)));
                }
            }
        }
    }
}

/// Decode a response body, accepting either plain JSON or an event stream.
fn decode_response(content_type: &str, text: &str) -> Result<JsonRpcResponse> {
    if content_type.starts_with("text/event-stream") {
        return text
            .lines()
            .filter_map(|line| line.strip_prefix("data:"))
            .filter_map(|data| serde_json::from_str::<JsonRpcResponse>(data.trim()).ok())
            .last()
            .ok_or_else(|| McpError::protocol("event stream carried no JSON-RPC response"));
    }

    if text.trim().is_empty() {
        return Err(McpError::protocol("empty response body"));
    }
    Ok(serde_json::from_str(text)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_transport_config() {
        let config = HttpTransportConfig::new("http://localhost:8080/mcp")
            .with_timeout(Duration::from_secs(60))
            .with_retries(5)
            .with_retry_delay(Duration::from_millis(10));

        assert_eq!(config.url, "http://localhost:8080/mcp");
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.retries, 5);
        assert_eq!(config.retry_delay, Duration::from_millis(10));
    }

    #[test]
    fn test_http_transport_config_default() {
        let config = HttpTransportConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.retries, 3);
        assert_eq!(config.retry_delay, Duration::from_millis(250));
    }

    #[test]
    fn test_http_transport_creation() {
        let transport = HttpTransport::new(HttpTransportConfig::new("http://localhost:8080/mcp"));
        assert!(transport.is_ok());
        assert_eq!(transport.unwrap().url(), "http://localhost:8080/mcp");
    }

    #[test]
    fn test_http_transport_invalid_url() {
        let result = HttpTransport::new(HttpTransportConfig::new("not a valid url"));
        match result {
            Err(McpError::Transport(msg)) => assert!(msg.contains("invalid URL")),
            _ => panic!("Expected Transport error"),
        }
    }

    #[test]
    fn test_decode_plain_json() {
        let resp = decode_response(
            "application/json",
            r#"{"jsonrpc":"2.0","id":1,"result":{"tools":[]}}"#,
        )
        .unwrap();
        assert!(resp.result.is_some());
    }

    #[test]
    fn test_decode_event_stream() {
        let body = "event: message\ndata: {\"jsonrpc\":\"2.0\",\"id\":0,\"result\":{}}\n\n";
        let resp = decode_response("text/event-stream", body).unwrap();
        assert!(!resp.is_error());
    }

    #[test]
    fn test_decode_empty_body() {
        let err = decode_response("application/json", "  ").unwrap_err();
        assert!(matches!(err, McpError::Protocol(_)));
    }

    #[tokio::test]
    async fn test_unreachable_server_exhausts_retries() {
        // Port 9 (discard) is closed on any sane test host.
        let config = HttpTransportConfig::new("http://127.0.0.1:9/mcp")
            .with_retries(2)
            .with_retry_delay(Duration::from_millis(5));
        let transport = HttpTransport::new(config).unwrap();
        let req = JsonRpcRequest::new(0, "initialize", None);
        let err = transport.send_request(&req, None).await.unwrap_err();
        assert!(matches!(err, McpError::Transport(_) | McpError::Timeout(_)));
    }
}
