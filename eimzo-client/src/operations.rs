//! Key and signature operations
//!
//! Higher-level operations on top of the agent transport: loading a key
//! (which makes the agent pop its native password prompt and therefore may
//! suspend for as long as the user takes), creating PKCS#7 signatures,
//! appending to an existing signature, and optional timestamping through
//! an injected collaborator.

use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use eimzo_common::Logger;

use crate::certstore::{Cert, ContainerType};
use crate::error::{Result, SigningError};
use crate::session::KeySessionStore;
use crate::transport::{AgentRequest, AgentTransport, Plugin};

/// Whether the produced PKCS#7 embeds the payload or references it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pkcs7Mode {
    /// Payload embedded in the signature structure
    Attached,
    /// Signature over the payload only
    Detached,
}

impl Pkcs7Mode {
    /// Positional flag the agent expects ("yes" = detached).
    fn flag(&self) -> &'static str {
        match self {
            Pkcs7Mode::Attached => "no",
            Pkcs7Mode::Detached => "yes",
        }
    }
}

/// One signature operation over an unlocked key.
#[derive(Debug, Clone, Copy)]
pub enum SignOp<'a> {
    /// Create a fresh PKCS#7 over a Base64 payload
    Create {
        payload_b64: &'a str,
        mode: Pkcs7Mode,
    },
    /// Append this key's signature to an existing PKCS#7 structure
    Append { pkcs7_b64: &'a str },
}

/// Optional timestamp authority collaborator. Exchanges a PKCS#7 blob for
/// a timestamped one; absence means signatures are returned untimestamped.
#[async_trait]
pub trait Timestamper: Send + Sync {
    async fn timestamp(&self, pkcs7_b64: &str) -> Result<String>;
}

/// Base64 document payload encoding shared by the signing entry points.
pub fn encode_document(text: &str) -> String {
    STANDARD.encode(text.as_bytes())
}

/// Key loading and PKCS#7 creation over the agent transport.
pub struct KeyOperations {
    transport: Arc<dyn AgentTransport>,
    sessions: Arc<dyn KeySessionStore>,
    timestamper: Option<Arc<dyn Timestamper>>,
    logger: Logger,
}

impl KeyOperations {
    pub fn new(
        transport: Arc<dyn AgentTransport>,
        sessions: Arc<dyn KeySessionStore>,
        logger: Logger,
    ) -> Self {
        Self {
            transport,
            sessions,
            timestamper: None,
            logger,
        }
    }

    pub fn with_timestamper(mut self, timestamper: Arc<dyn Timestamper>) -> Self {
        self.timestamper = Some(timestamper);
        self
    }

    /// Unlock a key container. The agent prompts for the password natively,
    /// so this does not resolve until the user answers the dialog. The
    /// returned `keyId` is cached under the certificate serial.
    pub async fn load_key(&self, cert: &Cert) -> Result<String> {
        let arguments = match cert.container {
            ContainerType::Pfx => vec![
                cert.disk.clone(),
                cert.path.clone(),
                cert.name.clone(),
                cert.alias.clone(),
            ],
            ContainerType::Certkey => vec![
                cert.disk.clone(),
                cert.path.clone(),
                cert.name.clone(),
                cert.serial_number.clone(),
            ],
        };
        let request = AgentRequest::new(cert.container.plugin(), "load_key", arguments);
        let response = self.transport.call(request).await?;
        if !response.success {
            return Err(SigningError::from_agent_reason(
                response.reason.unwrap_or_default(),
            ));
        }
        let key_id = response
            .key_id
            .ok_or_else(|| SigningError::Unknown("load_key response carried no keyId".to_string()))?;
        self.sessions.set(&cert.serial_number, &key_id);
        self.logger
            .debug(format!("key loaded for serial {}", cert.serial_number));
        Ok(key_id)
    }

    /// Create a PKCS#7 signature over a Base64 payload.
    pub async fn create_pkcs7(
        &self,
        key_id: &str,
        payload_b64: &str,
        mode: Pkcs7Mode,
    ) -> Result<String> {
        let request = AgentRequest::new(
            Plugin::Pkcs7,
            "create_pkcs7",
            vec![
                payload_b64.to_string(),
                key_id.to_string(),
                mode.flag().to_string(),
            ],
        );
        self.pkcs7_call(request).await
    }

    /// Append this key's signature to an existing PKCS#7 structure.
    pub async fn append_attached(&self, key_id: &str, pkcs7_b64: &str) -> Result<String> {
        let request = AgentRequest::new(
            Plugin::Pkcs7,
            "append_pkcs7_attached",
            vec![pkcs7_b64.to_string(), key_id.to_string()],
        );
        self.pkcs7_call(request).await
    }

    async fn pkcs7_call(&self, request: AgentRequest) -> Result<String> {
        let response = self.transport.call(request).await?;
        if !response.success {
            return Err(SigningError::from_agent_reason(
                response.reason.unwrap_or_default(),
            ));
        }
        response
            .pkcs7_64
            .ok_or_else(|| SigningError::Unknown("agent response carried no pkcs7_64".to_string()))
    }

    /// Sign with a certificate, reusing a cached key session when one
    /// exists. A cached `keyId` may have been invalidated by the agent at
    /// any point, so one failure triggers exactly one fresh `load_key` and
    /// one retry; a second failure is surfaced. A failed attempt keeps no
    /// partial state.
    pub async fn sign_with_cert(
        &self,
        cert: &Cert,
        op: SignOp<'_>,
        timestamp: bool,
    ) -> Result<String> {
        let signature = match self.sessions.get(&cert.serial_number) {
            Some(cached) => match self.attempt(&cached, op).await {
                Ok(signature) => signature,
                Err(stale) => {
                    self.logger.debug(format!(
                        "cached key for serial {} rejected ({stale}), reloading",
                        cert.serial_number
                    ));
                    self.sessions.clear(&cert.serial_number);
                    let key_id = self.load_key(cert).await?;
                    self.attempt(&key_id, op).await?
                }
            },
            None => {
                let key_id = self.load_key(cert).await?;
                self.attempt(&key_id, op).await?
            }
        };

        if timestamp {
            if let Some(timestamper) = &self.timestamper {
                return timestamper.timestamp(&signature).await;
            }
        }
        Ok(signature)
    }

    async fn attempt(&self, key_id: &str, op: SignOp<'_>) -> Result<String> {
        match op {
            SignOp::Create { payload_b64, mode } => {
                self.create_pkcs7(key_id, payload_b64, mode).await
            }
            SignOp::Append { pkcs7_b64 } => self.append_attached(key_id, pkcs7_b64).await,
        }
    }
}
