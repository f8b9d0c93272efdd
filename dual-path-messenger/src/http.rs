//! HTTP fallback transport

use crate::transport::Transport;
use crate::types::{CommunicationPath, EndpointConfig, Message};
use crate::{Error, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

/// HTTP transport configuration
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// Sent as `X-Source-XApp` and `source_xapp`
    pub xapp_name: String,
    /// Message POST timeout
    pub send_timeout: Duration,
    /// Health GET timeout
    pub probe_timeout: Duration,
    /// Attempts per send on connection errors
    pub max_attempts: u32,
    /// Delay between attempts
    pub retry_delay: Duration,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            xapp_name: "dual-path-xapp".to_string(),
            send_timeout: Duration::from_secs(5),
            probe_timeout: Duration::from_secs(2),
            max_attempts: 2,
            retry_delay: Duration::from_millis(500),
        }
    }
}

/// Fallback path: request/response to a registered endpoint
pub struct HttpTransport {
    config: HttpTransportConfig,
    client: Mutex<Option<Client>>,
}

impl HttpTransport {
    /// Create transport with a pooled client
    pub fn new(config: HttpTransportConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let source = HeaderValue::from_str(&config.xapp_name)
            .map_err(|e| Error::Config(format!("Invalid xapp name for header: {}", e)))?;
        headers.insert("X-Source-XApp", source);

        let client = Client::builder().default_headers(headers).build()?;

        Ok(Self {
            config,
            client: Mutex::new(Some(client)),
        })
    }

    /// JSON body posted for `message`
    pub fn request_body(&self, message: &Message) -> Map<String, Value> {
        let mut body = message.payload.to_json_object();
        body.insert("message_type".to_string(), Value::from(message.type_id));
        body.insert(
            "source_xapp".to_string(),
            Value::String(self.config.xapp_name.clone()),
        );
        body
    }

    fn client(&self) -> Result<Client> {
        self.client.lock().clone().ok_or(Error::Closed)
    }

    fn map_error(error: reqwest::Error, timeout: Duration) -> Error {
        if error.is_timeout() {
            Error::Timeout(timeout.as_millis() as u64)
        } else {
            Error::Connection(error.to_string())
        }
    }

    async fn post_once(
        &self,
        client: &Client,
        url: &str,
        body: &Map<String, Value>,
    ) -> std::result::Result<StatusCode, reqwest::Error> {
        let response = client
            .post(url)
            .json(body)
            .timeout(self.config.send_timeout)
            .send()
            .await?;
        Ok(response.status())
    }
}

/// Only refused or unreachable connections are retried; a connect timeout
/// has already spent the send budget
fn is_retryable(error: &reqwest::Error) -> bool {
    error.is_connect() && !error.is_timeout()
}

/// Resolve the endpoint or explain why there is none
fn require_endpoint<'a>(
    message: &Message,
    endpoint: Option<&'a EndpointConfig>,
) -> Result<&'a EndpointConfig> {
    match (endpoint, &message.destination) {
        (Some(endpoint), _) => Ok(endpoint),
        (None, Some(name)) => Err(Error::UnregisteredDestination(name.clone())),
        (None, None) => Err(Error::MissingDestination),
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn path(&self) -> CommunicationPath {
        CommunicationPath::Fallback
    }

    fn is_ready(&self) -> bool {
        self.client.lock().is_some()
    }

    async fn deliver(&self, message: &Message, endpoint: Option<&EndpointConfig>) -> Result<()> {
        let endpoint = require_endpoint(message, endpoint)?;
        let client = self.client()?;
        let url = endpoint.message_url();
        let body = self.request_body(message);
        let max_attempts = self.config.max_attempts.max(1);

        let mut attempt = 0;
        loop {
            attempt += 1;

            match self.post_once(&client, &url, &body).await {
                Ok(StatusCode::OK) => {
                    debug!(
                        "Sent message type {} via fallback to {}",
                        message.type_id, endpoint.service_name
                    );
                    return Ok(());
                }
                Ok(status) => {
                    warn!("Fallback send to {} failed with status {}", url, status);
                    return Err(Error::Rejected(status.as_u16()));
                }
                Err(e) if is_retryable(&e) && attempt < max_attempts => {
                    warn!(
                        "Fallback connect to {} failed (attempt {}), retrying in {:?}: {}",
                        endpoint.service_name, attempt, self.config.retry_delay, e
                    );
                    tokio::time::sleep(self.config.retry_delay).await;
                }
                Err(e) => return Err(Self::map_error(e, self.config.send_timeout)),
            }
        }
    }

    async fn probe(&self, endpoint: Option<&EndpointConfig>) -> Result<()> {
        let endpoint = endpoint.ok_or(Error::MissingDestination)?;
        let client = self.client()?;

        let response = client
            .get(endpoint.health_url())
            .timeout(self.config.probe_timeout)
            .send()
            .await
            .map_err(|e| Self::map_error(e, self.config.probe_timeout))?;

        match response.status() {
            StatusCode::OK => Ok(()),
            status => Err(Error::Rejected(status.as_u16())),
        }
    }

    async fn close(&self) {
        if self.client.lock().take().is_some() {
            info!("Fallback HTTP connection pool released");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Instant;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Endpoint whose base URL resolves to the mock server
    fn endpoint_for(server: &MockServer) -> EndpointConfig {
        EndpointConfig::new("127.0")
            .with_namespace("0.1")
            .with_fallback_port(server.address().port())
    }

    fn transport_with(config: HttpTransportConfig) -> HttpTransport {
        HttpTransport::new(HttpTransportConfig {
            xapp_name: "rc-xapp".to_string(),
            ..config
        })
        .unwrap()
    }

    fn transport() -> HttpTransport {
        transport_with(HttpTransportConfig::default())
    }

    #[test]
    fn test_request_body_merges_fields() {
        let transport = transport();
        let message = Message::new(12050, json!({ "cell_id": "c7" })).with_destination("kpimon");

        let body = transport.request_body(&message);
        assert_eq!(body.get("cell_id"), Some(&json!("c7")));
        assert_eq!(body.get("message_type"), Some(&json!(12050)));
        assert_eq!(body.get("source_xapp"), Some(&json!("rc-xapp")));
    }

    #[test]
    fn test_request_body_wraps_plain_text() {
        let transport = transport();
        let body = transport.request_body(&Message::new(1, "hello"));
        assert_eq!(body.get("payload"), Some(&json!("hello")));
        assert_eq!(body.get("message_type"), Some(&json!(1)));
    }

    #[tokio::test]
    async fn test_unregistered_destination() {
        let transport = transport();
        let message = Message::new(1, "x").with_destination("ghost");

        let result = transport.deliver(&message, None).await;
        assert!(matches!(result, Err(Error::UnregisteredDestination(name)) if name == "ghost"));
    }

    #[tokio::test]
    async fn test_missing_destination() {
        let transport = transport();
        let result = transport.deliver(&Message::new(1, "x"), None).await;
        assert!(matches!(result, Err(Error::MissingDestination)));
    }

    #[tokio::test]
    async fn test_closed_transport_rejects() {
        let transport = transport();
        assert!(transport.is_ready());
        transport.close().await;
        assert!(!transport.is_ready());

        let endpoint = EndpointConfig::new("kpimon");
        let message = Message::new(1, "x").with_destination("kpimon");
        let result = transport.deliver(&message, Some(&endpoint)).await;
        assert!(matches!(result, Err(Error::Closed)));
        assert!(matches!(transport.probe(Some(&endpoint)).await, Err(Error::Closed)));
    }

    #[tokio::test]
    async fn test_deliver_posts_enriched_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/e2/indication"))
            .and(header("X-Source-XApp", "rc-xapp"))
            .and(body_json(json!({
                "cell_id": "c7",
                "message_type": 12050,
                "source_xapp": "rc-xapp"
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let transport = transport();
        let endpoint = endpoint_for(&server);
        let message = Message::new(12050, json!({ "cell_id": "c7" })).with_destination("kpimon");

        transport.deliver(&message, Some(&endpoint)).await.unwrap();
    }

    #[tokio::test]
    async fn test_non_ok_status_rejected_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let transport = transport_with(HttpTransportConfig {
            max_attempts: 3,
            ..Default::default()
        });
        let endpoint = endpoint_for(&server);
        let message = Message::new(1, "x").with_destination("kpimon");

        let result = transport.deliver(&message, Some(&endpoint)).await;
        assert!(matches!(result, Err(Error::Rejected(500))));
    }

    #[tokio::test]
    async fn test_created_is_not_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201))
            .mount(&server)
            .await;

        let transport = transport();
        let endpoint = endpoint_for(&server);
        let message = Message::new(1, "x").with_destination("kpimon");

        let result = transport.deliver(&message, Some(&endpoint)).await;
        assert!(matches!(result, Err(Error::Rejected(201))));
    }

    #[tokio::test]
    async fn test_timeout_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .expect(1)
            .mount(&server)
            .await;

        let transport = transport_with(HttpTransportConfig {
            send_timeout: Duration::from_millis(100),
            max_attempts: 3,
            retry_delay: Duration::from_millis(10),
            ..Default::default()
        });
        let endpoint = endpoint_for(&server);
        let message = Message::new(1, "x").with_destination("kpimon");

        let result = transport.deliver(&message, Some(&endpoint)).await;
        assert!(matches!(result, Err(Error::Timeout(100))));
    }

    #[tokio::test]
    async fn test_refused_connection_retried_with_delay() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let endpoint = EndpointConfig::new("127.0")
            .with_namespace("0.1")
            .with_fallback_port(port);

        let transport = transport_with(HttpTransportConfig {
            max_attempts: 3,
            retry_delay: Duration::from_millis(150),
            ..Default::default()
        });
        let message = Message::new(1, "x").with_destination("kpimon");

        let started = Instant::now();
        let result = transport.deliver(&message, Some(&endpoint)).await;
        assert!(matches!(result, Err(Error::Connection(_))));
        // Two delays between three attempts
        assert!(started.elapsed() >= Duration::from_millis(300));
    }

    #[tokio::test]
    async fn test_probe_gets_health_path() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ric/v1/health/alive"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/custom/ready"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let transport = transport();
        let endpoint = endpoint_for(&server);
        transport.probe(Some(&endpoint)).await.unwrap();

        let custom = endpoint_for(&server).with_health_check_path("/custom/ready");
        let result = transport.probe(Some(&custom)).await;
        assert!(matches!(result, Err(Error::Rejected(503))));
    }
}
