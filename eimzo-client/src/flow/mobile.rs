//! Mobile signing flow
//!
//! The phone-based transport: request a session from the document service,
//! derive the QR/deep-link payload locally, hand off to the companion app
//! through an OS deep link, then poll the status endpoint until the
//! signature lands. The deep link is fire-and-forget; nothing observes
//! whether it was handled.

use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

use sha2::{Digest, Sha256};
use tokio::task::JoinHandle;

use eimzo_common::Logger;

use crate::document_service::{DocumentService, MobileStatus};
use crate::error::{Result, SigningError};
use crate::flow::MobileSignature;

/// URL scheme handled by the companion app.
pub const DEEP_LINK_SCHEME: &str = "eimzo://sign?qc=";

/// Fixed polling cadence of the status endpoint.
pub const POLL_INTERVAL: Duration = Duration::from_millis(1000);

const MAX_DOCUMENT_ID_LEN: usize = 64;

/// QR payload derived from one mobile session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrCode {
    pub hash_code: String,
    pub qr_code: String,
}

/// Derive the QR payload for a mobile session. Deterministic: the same
/// `{site_id, document_id, text}` always yields the same code.
pub fn make_qr_code(site_id: &str, document_id: &str, text: &str) -> Result<QrCode> {
    if document_id.is_empty() || document_id.len() > MAX_DOCUMENT_ID_LEN {
        return Err(SigningError::MobileQrInvalidFormat(format!(
            "document id length {} outside 1..={MAX_DOCUMENT_ID_LEN}",
            document_id.len()
        )));
    }
    let mut hasher = Sha256::new();
    hasher.update(site_id.as_bytes());
    hasher.update(document_id.as_bytes());
    hasher.update(text.as_bytes());
    let hash_code = hex::encode_upper(hasher.finalize());
    let qr_code = format!("{site_id}{document_id}{hash_code}");
    Ok(QrCode { hash_code, qr_code })
}

/// Quarter a hash string for four-segment QR display.
pub fn split_hash(hash: &str) -> Vec<String> {
    let quarter = hash.len() / 4;
    (0..4)
        .map(|i| {
            let start = i * quarter;
            let end = if i == 3 { hash.len() } else { start + quarter };
            hash[start..end].to_string()
        })
        .collect()
}

/// Deep link URL for a derived QR code.
pub fn deep_link_url(qr_code: &str) -> String {
    format!("{DEEP_LINK_SCHEME}{qr_code}")
}

/// OS-level deep link launcher. Fire-and-forget: implementations cannot
/// report whether the link was handled.
pub trait DeepLink: Send + Sync {
    fn open(&self, url: &str);
}

/// Launcher shelling out to the platform URL opener.
pub struct SystemDeepLink {
    logger: Logger,
}

impl SystemDeepLink {
    pub fn new(logger: Logger) -> Self {
        Self { logger }
    }
}

impl DeepLink for SystemDeepLink {
    fn open(&self, url: &str) {
        let mut command = if cfg!(target_os = "windows") {
            let mut command = Command::new("cmd");
            command.args(["/C", "start", "", url]);
            command
        } else if cfg!(target_os = "macos") {
            let mut command = Command::new("open");
            command.arg(url);
            command
        } else {
            let mut command = Command::new("xdg-open");
            command.arg(url);
            command
        };
        match command.spawn() {
            Ok(_) => self.logger.debug(format!("deep link dispatched: {url}")),
            Err(err) => self
                .logger
                .warn(format!("failed to launch deep link handler: {err}")),
        }
    }
}

/// Cancellation handle for a running status poll.
pub struct PollHandle {
    handle: JoinHandle<()>,
}

impl PollHandle {
    /// Stop polling. Safe to call after the poll already finished.
    pub fn cancel(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the poll to terminate on its own.
    pub async fn wait(self) {
        let _ = self.handle.await;
    }
}

pub struct MobileFlow {
    service: Arc<dyn DocumentService>,
    deep_link: Arc<dyn DeepLink>,
    logger: Logger,
}

impl MobileFlow {
    pub fn new(
        service: Arc<dyn DocumentService>,
        deep_link: Arc<dyn DeepLink>,
        logger: Logger,
    ) -> Self {
        Self {
            service,
            deep_link,
            logger,
        }
    }

    /// Start a mobile authentication session and hand off to the
    /// companion app.
    pub async fn auth(&self) -> Result<MobileSignature> {
        let session = self
            .service
            .mobile_auth()
            .await
            .map_err(|err| SigningError::MobileAuthFailed(err.to_string()))?;
        self.hand_off(session.site_id, session.document_id, &session.challenge)
    }

    /// Start a mobile signing session over the given text and hand off to
    /// the companion app.
    pub async fn sign(&self, text: &str) -> Result<MobileSignature> {
        let session = self
            .service
            .mobile_sign()
            .await
            .map_err(|err| SigningError::MobileAuthFailed(err.to_string()))?;
        self.hand_off(session.site_id, session.document_id, text)
    }

    fn hand_off(
        &self,
        site_id: String,
        document_id: String,
        text: &str,
    ) -> Result<MobileSignature> {
        let qr = make_qr_code(&site_id, &document_id, text)?;
        self.deep_link.open(&deep_link_url(&qr.qr_code));
        Ok(MobileSignature {
            document_id,
            hash_code: qr.hash_code,
            qr_code: qr.qr_code,
        })
    }

    /// Poll the status endpoint every second until the signature lands or
    /// the session dies. Status 1 fires the callback and stops; status 2
    /// keeps polling; any other status or a request error stops quietly.
    /// The returned handle cancels the loop on teardown.
    pub fn poll_status<F>(&self, document_id: &str, on_success: F) -> PollHandle
    where
        F: FnOnce() + Send + 'static,
    {
        let service = self.service.clone();
        let logger = self.logger.clone();
        let document_id = document_id.to_string();
        let mut on_success = Some(on_success);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(POLL_INTERVAL);
            loop {
                ticker.tick().await;
                match service.mobile_status(&document_id).await {
                    Ok(MobileStatus::Success) => {
                        logger.debug(format!("mobile signature for {document_id} completed"));
                        if let Some(callback) = on_success.take() {
                            callback();
                        }
                        break;
                    }
                    Ok(MobileStatus::Pending) => {}
                    Ok(MobileStatus::Other(code)) => {
                        logger.debug(format!(
                            "mobile signing for {document_id} ended with status {code}"
                        ));
                        break;
                    }
                    Err(err) => {
                        logger.debug(format!("mobile status poll failed: {err}"));
                        break;
                    }
                }
            }
        });
        PollHandle { handle }
    }
}
