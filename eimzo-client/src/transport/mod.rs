// Agent RPC transport
//
// The local signing agent exposes its certificate and PKCS#7 operations
// over a WebSocket channel on the loopback interface. This module defines
// the wire envelope, the transport trait the rest of the bridge programs
// against, and the transport-level error type.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod ws;

pub use ws::WsTransport;

/// Plugin namespaces exposed by the agent.
///
/// `pfx` addresses software key files, `certkey` hardware token
/// containers, `pkcs7` the signature operations shared by both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Plugin {
    Pfx,
    Certkey,
    Pkcs7,
}

impl Plugin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Plugin::Pfx => "pfx",
            Plugin::Certkey => "certkey",
            Plugin::Pkcs7 => "pkcs7",
        }
    }
}

/// One RPC request to the agent.
///
/// The agent identifies functions by `{plugin, name}` and takes positional
/// string arguments. The handshake and version calls carry no plugin.
#[derive(Debug, Clone, Serialize)]
pub struct AgentRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plugin: Option<Plugin>,
    pub name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<String>,
}

impl AgentRequest {
    pub fn new(plugin: Plugin, name: impl Into<String>, arguments: Vec<String>) -> Self {
        Self {
            plugin: Some(plugin),
            name: name.into(),
            arguments,
        }
    }

    /// The one-time API key handshake. `keys` alternates domain names and
    /// their signed keys; pairing is positional.
    pub fn handshake(keys: Vec<String>) -> Self {
        Self {
            plugin: None,
            name: "apikey".to_string(),
            arguments: keys,
        }
    }

    pub fn version() -> Self {
        Self {
            plugin: None,
            name: "version".to_string(),
            arguments: Vec::new(),
        }
    }
}

/// A key container entry as enumerated by the agent.
///
/// The location fields are opaque and must be echoed back verbatim when
/// loading the key later.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCert {
    #[serde(default)]
    pub disk: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub alias: String,
    #[serde(default, rename = "serialNumber")]
    pub serial_number: Option<String>,
}

/// One RPC response from the agent.
///
/// `success: false` carries a free-text `reason`; the remaining fields are
/// populated per function.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgentResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default, rename = "keyId")]
    pub key_id: Option<String>,
    #[serde(default)]
    pub pkcs7_64: Option<String>,
    #[serde(default)]
    pub certificates: Option<Vec<RawCert>>,
    #[serde(default)]
    pub signer_serial_number: Option<String>,
    #[serde(default)]
    pub major: Option<String>,
    #[serde(default)]
    pub minor: Option<String>,
}

/// Installed agent version as reported by the `version` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentVersion {
    pub major: u32,
    pub minor: u32,
}

impl AgentVersion {
    /// Collapse to a single comparable number (major hundreds + minor).
    pub fn as_number(&self) -> u32 {
        self.major * 100 + self.minor
    }
}

/// Error type for transport operations.
///
/// Agent-reported failures are not transport errors; they travel inside a
/// successful [`AgentResponse`].
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    #[error("failed to connect to signing agent at {0}: {1}")]
    Connect(String, String),

    #[error("connection to signing agent closed")]
    ConnectionClosed,

    #[error("connection to signing agent is not established")]
    NotConnected,

    #[error("failed to send RPC frame: {0}")]
    Send(String),

    #[error("malformed agent frame: {0}")]
    InvalidFrame(String),
}

/// Channel to the local signing agent.
///
/// One logical call per invocation; concurrent calls are permitted and no
/// retries happen at this layer. An `Err` means the round trip itself
/// failed; an `Ok` response with `success: false` is an agent-level
/// failure the caller classifies.
#[async_trait]
pub trait AgentTransport: Send + Sync {
    async fn call(&self, request: AgentRequest) -> std::result::Result<AgentResponse, TransportError>;
}
