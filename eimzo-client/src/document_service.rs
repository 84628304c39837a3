//! Remote document service endpoints
//!
//! The mobile flow and timestamping talk to the document backend over
//! HTTP. The endpoints live behind the [`DocumentService`] trait so flows
//! can be exercised against a scripted implementation.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;

use eimzo_common::Logger;

use crate::error::{Result, SigningError};
use crate::operations::Timestamper;

/// Challenge issued for desktop authentication.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Challenge {
    #[serde(default)]
    pub challenge: String,
    #[serde(default)]
    pub guid: String,
    #[serde(default)]
    pub id_guid: String,
}

/// Short-lived correlation token for one mobile signing attempt.
///
/// The service misspells the challenge field on the wire; the rename keeps
/// the wire name without spreading it through the code.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MobileSession {
    #[serde(rename = "siteId")]
    pub site_id: String,
    #[serde(rename = "documentId")]
    pub document_id: String,
    #[serde(default, rename = "challange")]
    pub challenge: String,
}

/// Outcome of one status poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MobileStatus {
    Success,
    Pending,
    Other(i64),
}

impl MobileStatus {
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => MobileStatus::Success,
            2 => MobileStatus::Pending,
            other => MobileStatus::Other(other),
        }
    }
}

#[derive(Debug, Deserialize)]
struct StatusBody {
    #[serde(default)]
    status: i64,
}

#[derive(Debug, Deserialize)]
struct TimestampBody {
    #[serde(default)]
    pkcs7b64: String,
}

/// Document backend endpoints consumed by the signing flows.
#[async_trait]
pub trait DocumentService: Send + Sync {
    async fn challenge(&self) -> Result<Challenge>;
    async fn mobile_auth(&self) -> Result<MobileSession>;
    async fn mobile_sign(&self) -> Result<MobileSession>;
    async fn mobile_status(&self, document_id: &str) -> Result<MobileStatus>;
    async fn timestamp_pkcs7(&self, signature: &str) -> Result<String>;
}

/// HTTP implementation against the document backend.
pub struct HttpDocumentService {
    base_url: String,
    client: reqwest::Client,
    logger: Logger,
}

impl HttpDocumentService {
    pub fn new(base_url: impl Into<String>, logger: Logger) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
            logger,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

fn network_error(err: reqwest::Error) -> SigningError {
    SigningError::NetworkError(err.to_string())
}

#[async_trait]
impl DocumentService for HttpDocumentService {
    async fn challenge(&self) -> Result<Challenge> {
        let response = self
            .client
            .get(self.url("/frontend/challenge"))
            .send()
            .await
            .map_err(network_error)?
            .error_for_status()
            .map_err(network_error)?;
        response.json::<Challenge>().await.map_err(network_error)
    }

    async fn mobile_auth(&self) -> Result<MobileSession> {
        let response = self
            .client
            .post(self.url("/frontend/mobile/auth"))
            .send()
            .await
            .map_err(network_error)?
            .error_for_status()
            .map_err(network_error)?;
        response.json::<MobileSession>().await.map_err(network_error)
    }

    async fn mobile_sign(&self) -> Result<MobileSession> {
        let response = self
            .client
            .post(self.url("/frontend/mobile/sign"))
            .send()
            .await
            .map_err(network_error)?
            .error_for_status()
            .map_err(network_error)?;
        response.json::<MobileSession>().await.map_err(network_error)
    }

    async fn mobile_status(&self, document_id: &str) -> Result<MobileStatus> {
        let response = self
            .client
            .post(self.url("/frontend/mobile/status"))
            .form(&[("documentId", document_id)])
            .send()
            .await
            .map_err(network_error)?
            .error_for_status()
            .map_err(network_error)?;
        let body = response.json::<StatusBody>().await.map_err(network_error)?;
        Ok(MobileStatus::from_code(body.status))
    }

    async fn timestamp_pkcs7(&self, signature: &str) -> Result<String> {
        self.logger.debug("requesting signature timestamp");
        let response = self
            .client
            .post(self.url("/frontend/timestamp/pkcs7"))
            .header(CONTENT_TYPE, "text/plain")
            .body(signature.to_string())
            .send()
            .await
            .map_err(network_error)?
            .error_for_status()
            .map_err(network_error)?;
        let body = response
            .json::<TimestampBody>()
            .await
            .map_err(network_error)?;
        if body.pkcs7b64.is_empty() {
            return Err(SigningError::NetworkError(
                "timestamp response carried no pkcs7b64".to_string(),
            ));
        }
        Ok(body.pkcs7b64)
    }
}

/// Timestamper backed by the document service timestamp endpoint.
pub struct HttpTimestamper {
    service: Arc<dyn DocumentService>,
}

impl HttpTimestamper {
    pub fn new(service: Arc<dyn DocumentService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Timestamper for HttpTimestamper {
    async fn timestamp(&self, pkcs7_b64: &str) -> Result<String> {
        self.service.timestamp_pkcs7(pkcs7_b64).await
    }
}
