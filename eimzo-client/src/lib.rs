//! E-IMZO signing bridge
//!
//! Client for the locally-running E-IMZO signing agent and the phone-based
//! fallback transport. The bridge enumerates installed key containers,
//! triggers key unlock and PKCS#7 creation over the agent's WebSocket RPC
//! channel, and routes the same logical signing request through a
//! QR/deep-link + polling protocol on mobile devices.
//!
//! The document-management application consumes exactly one boundary:
//! [`SigningBridge::sign_document`] (and its PDF variant) returning a
//! Base64 PKCS#7 blob. Everything else here exists to make that call
//! survive the realities of a third-party local agent: unavailability,
//! wrong passwords, expired certificates, and native prompts of unbounded
//! duration.

pub mod certstore;
pub mod config;
pub mod document_service;
pub mod error;
pub mod flow;
pub mod operations;
pub mod session;
pub mod transport;

use std::sync::Arc;

use eimzo_common::{Component, Logger};

use crate::document_service::{HttpDocumentService, HttpTimestamper};
use crate::flow::desktop::DesktopFlow;
use crate::flow::mobile::{MobileFlow, SystemDeepLink};
use crate::transport::ws::WsTransport;

pub use crate::certstore::{parse_alias, parse_valid_date, Cert, CertStore, ContainerType};
pub use crate::config::{default_api_keys, BridgeConfig, UnavailablePolicy};
pub use crate::document_service::{Challenge, DocumentService, MobileSession, MobileStatus};
pub use crate::error::{ErrorSide, Result, SigningError};
pub use crate::flow::mobile::{DeepLink, PollHandle};
pub use crate::flow::{
    AuthOutcome, DesktopAuth, DeviceDetector, MobileSignature, SignOutcome, UserAgentDetector,
};
pub use crate::operations::{encode_document, KeyOperations, Pkcs7Mode, SignOp, Timestamper};
pub use crate::session::{KeySessionStore, MemorySessionStore};
pub use crate::transport::{
    AgentRequest, AgentResponse, AgentTransport, AgentVersion, Plugin, RawCert, TransportError,
};

/// The signing bridge facade wiring transport, certificate store, key
/// operations and both flows together.
pub struct SigningBridge {
    transport: Arc<WsTransport>,
    desktop: DesktopFlow,
    mobile: MobileFlow,
    detector: Arc<dyn DeviceDetector>,
    config: BridgeConfig,
    logger: Logger,
}

impl SigningBridge {
    pub fn new(config: BridgeConfig) -> Self {
        let logger = Logger::new_root(Component::Bridge, "eimzo");
        let transport = Arc::new(WsTransport::new(
            &config.agent_url,
            config.on_unavailable,
            logger.with_component(Component::Transport),
        ));
        let agent: Arc<dyn AgentTransport> = transport.clone();

        let service: Arc<dyn DocumentService> = Arc::new(HttpDocumentService::new(
            &config.base_url,
            logger.with_component(Component::Http),
        ));
        let sessions: Arc<dyn KeySessionStore> = Arc::new(MemorySessionStore::new());
        let timestamper = Arc::new(HttpTimestamper::new(service.clone()));
        let ops = Arc::new(
            KeyOperations::new(
                agent.clone(),
                sessions,
                logger.with_component(Component::Signer),
            )
            .with_timestamper(timestamper),
        );
        let store = CertStore::new(agent, logger.with_component(Component::CertStore));
        let desktop = DesktopFlow::new(
            store,
            ops,
            service.clone(),
            logger.with_component(Component::Flow),
        );
        let deep_link = Arc::new(SystemDeepLink::new(logger.with_component(Component::Flow)));
        let mobile = MobileFlow::new(service, deep_link, logger.with_component(Component::Flow));
        let detector: Arc<dyn DeviceDetector> = Arc::new(UserAgentDetector::new(
            config.user_agent.clone().unwrap_or_default(),
        ));

        Self {
            transport,
            desktop,
            mobile,
            detector,
            config,
            logger,
        }
    }

    /// Replace the device detector (e.g. for a host that knows its form
    /// factor without a user agent string).
    pub fn with_detector(mut self, detector: Arc<dyn DeviceDetector>) -> Self {
        self.detector = detector;
        self
    }

    /// Install the configured API keys with the agent. Call once at
    /// startup; behavior on an unreachable agent follows the configured
    /// policy.
    pub async fn start(&self) -> Result<()> {
        self.logger.info("starting signing bridge");
        self.transport
            .apikey(&self.config.api_keys)
            .await
            .map_err(SigningError::from)
    }

    /// Whether the installed agent meets a minimum version.
    pub async fn check_version(&self, min_major: u32, min_minor: u32) -> Result<bool> {
        let version = self.transport.version().await.map_err(SigningError::from)?;
        Ok(version.as_number() >= min_major * 100 + min_minor)
    }

    /// All certificates known to the agent, usable ones first.
    pub async fn certificates(&self) -> Result<Vec<Cert>> {
        self.desktop.certificates().await
    }

    /// Sign free text, routed to the desktop or mobile flow by the device
    /// detector.
    pub async fn sign(
        &self,
        text: &str,
        cert: Option<&Cert>,
        identity: Option<&str>,
        timestamp: bool,
    ) -> Result<SignOutcome> {
        if self.detector.is_mobile() {
            let signature = self.mobile.sign(text).await?;
            Ok(SignOutcome::Mobile(signature))
        } else {
            let payload = encode_document(text);
            let pkcs7 = self
                .desktop
                .sign(&payload, Pkcs7Mode::Attached, cert, identity, timestamp)
                .await?;
            Ok(SignOutcome::Desktop(pkcs7))
        }
    }

    /// Challenge authentication, routed like [`SigningBridge::sign`].
    pub async fn auth(&self, cert: Option<&Cert>, identity: Option<&str>) -> Result<AuthOutcome> {
        if self.detector.is_mobile() {
            let signature = self.mobile.auth().await?;
            Ok(AuthOutcome::Mobile(signature))
        } else {
            let auth = self.desktop.auth(cert, identity).await?;
            Ok(AuthOutcome::Desktop(auth))
        }
    }

    /// Sign a document (string or serialized object) with the given
    /// certificate, returning the Base64 PKCS#7 blob.
    pub async fn sign_document(&self, cert: &Cert, document: &str) -> Result<String> {
        let payload = encode_document(document);
        self.desktop
            .sign(&payload, Pkcs7Mode::Attached, Some(cert), None, false)
            .await
    }

    /// Sign pre-encoded binary content (e.g. a PDF already in Base64).
    pub async fn sign_pdf_document(&self, cert: &Cert, pdf_b64: &str) -> Result<String> {
        self.desktop
            .sign(pdf_b64, Pkcs7Mode::Attached, Some(cert), None, false)
            .await
    }

    /// Append a signature to an existing PKCS#7 structure.
    pub async fn attach(
        &self,
        pkcs7_b64: &str,
        cert: Option<&Cert>,
        identity: Option<&str>,
    ) -> Result<String> {
        self.desktop.append(pkcs7_b64, cert, identity, true).await
    }

    /// Poll a mobile signing session until completion; see
    /// [`MobileFlow::poll_status`].
    pub fn poll_status<F>(&self, document_id: &str, on_success: F) -> PollHandle
    where
        F: FnOnce() + Send + 'static,
    {
        self.mobile.poll_status(document_id, on_success)
    }
}
