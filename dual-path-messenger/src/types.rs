//! Type definitions for the dual-path messenger

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Communication path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommunicationPath {
    /// Preferred low-latency message bus
    Primary,
    /// Request/response HTTP transport
    Fallback,
}

impl CommunicationPath {
    /// The other path
    pub fn other(self) -> Self {
        match self {
            CommunicationPath::Primary => CommunicationPath::Fallback,
            CommunicationPath::Fallback => CommunicationPath::Primary,
        }
    }

    /// Label used in logs, metrics and the health summary
    pub fn as_str(&self) -> &'static str {
        match self {
            CommunicationPath::Primary => "primary",
            CommunicationPath::Fallback => "fallback",
        }
    }
}

impl fmt::Display for CommunicationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Path health status (derived from the consecutive counters)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathStatus {
    /// Recovery threshold reached
    Healthy,
    /// Failing, but below the failover threshold
    Degraded,
    /// Failover threshold reached
    Down,
}

impl PathStatus {
    /// Label used in logs and the health summary
    pub fn as_str(&self) -> &'static str {
        match self {
            PathStatus::Healthy => "healthy",
            PathStatus::Degraded => "degraded",
            PathStatus::Down => "down",
        }
    }
}

impl fmt::Display for PathStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Message payload: raw bytes or a structured JSON value
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Opaque bytes
    Bytes(Bytes),
    /// Structured value
    Json(Value),
}

impl Payload {
    /// Wire bytes for the primary bus
    pub fn to_bytes(&self) -> crate::Result<Bytes> {
        match self {
            Payload::Bytes(bytes) => Ok(bytes.clone()),
            Payload::Json(value) => Ok(Bytes::from(serde_json::to_vec(value)?)),
        }
    }

    /// JSON object for the fallback transport.
    ///
    /// Objects are used as-is; anything else is wrapped as `{"payload": ...}`.
    pub fn to_json_object(&self) -> Map<String, Value> {
        let value = match self {
            Payload::Json(value) => value.clone(),
            Payload::Bytes(bytes) => serde_json::from_slice::<Value>(bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned())),
        };

        match value {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("payload".to_string(), other);
                map
            }
        }
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Payload::Json(value)
    }
}

impl From<Bytes> for Payload {
    fn from(bytes: Bytes) -> Self {
        Payload::Bytes(bytes)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::Bytes(Bytes::from(bytes))
    }
}

impl From<&'static [u8]> for Payload {
    fn from(bytes: &'static [u8]) -> Self {
        Payload::Bytes(Bytes::from_static(bytes))
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Bytes(Bytes::from(text))
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Bytes(Bytes::copy_from_slice(text.as_bytes()))
    }
}

/// Logical message handed to the messenger
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Bus message type
    pub type_id: i32,
    /// Payload
    pub payload: Payload,
    /// Logical destination name (required by the fallback path)
    pub destination: Option<String>,
}

impl Message {
    /// Create new message
    pub fn new(type_id: i32, payload: impl Into<Payload>) -> Self {
        Self {
            type_id,
            payload: payload.into(),
            destination: None,
        }
    }

    /// Set the logical destination
    pub fn with_destination(mut self, destination: impl Into<String>) -> Self {
        self.destination = Some(destination.into());
        self
    }

    /// Destination label for logs and metrics
    pub fn destination_label(&self) -> &str {
        self.destination.as_deref().unwrap_or("routed")
    }
}

fn default_namespace() -> String {
    "ricxapp".to_string()
}

fn default_fallback_port() -> u16 {
    8080
}

fn default_primary_port() -> u16 {
    4560
}

fn default_health_check_path() -> String {
    "/ric/v1/health/alive".to_string()
}

fn default_message_path() -> String {
    "/e2/indication".to_string()
}

/// Fallback connection details for a logical destination
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Logical name (registry key)
    pub service_name: String,

    /// Kubernetes namespace
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// HTTP port
    #[serde(default = "default_fallback_port")]
    pub fallback_port: u16,

    /// Bus port
    #[serde(default = "default_primary_port")]
    pub primary_port: u16,

    /// Health probe path
    #[serde(default = "default_health_check_path")]
    pub health_check_path: String,

    /// Message delivery path
    #[serde(default = "default_message_path")]
    pub message_path: String,
}

impl EndpointConfig {
    /// Create endpoint with default namespace, ports and paths
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            namespace: default_namespace(),
            fallback_port: default_fallback_port(),
            primary_port: default_primary_port(),
            health_check_path: default_health_check_path(),
            message_path: default_message_path(),
        }
    }

    /// Set namespace
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Set HTTP port
    pub fn with_fallback_port(mut self, port: u16) -> Self {
        self.fallback_port = port;
        self
    }

    /// Set bus port
    pub fn with_primary_port(mut self, port: u16) -> Self {
        self.primary_port = port;
        self
    }

    /// Set health probe path
    pub fn with_health_check_path(mut self, path: impl Into<String>) -> Self {
        self.health_check_path = path.into();
        self
    }

    /// Set message delivery path
    pub fn with_message_path(mut self, path: impl Into<String>) -> Self {
        self.message_path = path.into();
        self
    }

    /// `http://{service_name}.{namespace}:{fallback_port}`
    pub fn fallback_base_url(&self) -> String {
        format!(
            "http://{}.{}:{}",
            self.service_name, self.namespace, self.fallback_port
        )
    }

    /// Full URL messages are posted to
    pub fn message_url(&self) -> String {
        format!("{}{}", self.fallback_base_url(), self.message_path)
    }

    /// Full URL of the health probe
    pub fn health_url(&self) -> String {
        format!("{}{}", self.fallback_base_url(), self.health_check_path)
    }

    /// Bus address; informational only, routing belongs to the bus
    pub fn primary_address(&self) -> String {
        format!("{}.{}", self.service_name, self.namespace)
    }
}
