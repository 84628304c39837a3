//! Desktop signing flow
//!
//! Pure orchestration over the certificate store, the key operations and
//! the document service: resolve a certificate, load its key, create the
//! signature, optionally timestamp. Any step's failure aborts the flow;
//! no partial results are returned and a failed attempt restarts from
//! certificate selection.

use std::sync::Arc;

use chrono::NaiveDate;

use eimzo_common::Logger;

use crate::certstore::{Cert, CertStore};
use crate::document_service::DocumentService;
use crate::error::{Result, SigningError};
use crate::flow::DesktopAuth;
use crate::operations::{encode_document, KeyOperations, Pkcs7Mode, SignOp};

pub struct DesktopFlow {
    store: CertStore,
    ops: Arc<KeyOperations>,
    service: Arc<dyn DocumentService>,
    logger: Logger,
}

impl DesktopFlow {
    pub fn new(
        store: CertStore,
        ops: Arc<KeyOperations>,
        service: Arc<dyn DocumentService>,
        logger: Logger,
    ) -> Self {
        Self {
            store,
            ops,
            service,
            logger,
        }
    }

    /// All certificates known to the agent, usable ones first.
    pub async fn certificates(&self) -> Result<Vec<Cert>> {
        self.store.list_all().await
    }

    /// Resolve a certificate by identity filter and optional preferred
    /// serial. With several matches the one with the latest `validto`
    /// wins; a candidate set that is entirely expired is an error of its
    /// own so the user is told to renew rather than to retry.
    pub async fn resolve_certificate(
        &self,
        identity: Option<&str>,
        preferred_serial: Option<&str>,
    ) -> Result<Cert> {
        let certs = self.store.list_all().await?;
        let candidates: Vec<Cert> = match identity {
            Some(uid) => certs
                .into_iter()
                .filter(|cert| cert.matches_identity(uid))
                .collect(),
            None => certs,
        };

        if let Some(serial) = preferred_serial {
            return candidates
                .into_iter()
                .find(|cert| cert.serial_number == serial)
                .ok_or_else(|| {
                    SigningError::CertificateNotFound(format!(
                        "no certificate with serial {serial}"
                    ))
                });
        }

        if candidates.is_empty() {
            return Err(SigningError::CertificateNotFound(match identity {
                Some(uid) => format!("no certificate for identity {uid}"),
                None => "no certificates installed".to_string(),
            }));
        }
        if candidates.iter().all(|cert| cert.overdue) {
            return Err(SigningError::CertificateExpired(format!(
                "{} matching certificate(s), all expired",
                candidates.len()
            )));
        }
        if candidates.len() > 1 {
            self.logger.debug(format!(
                "{} matching certificates, picking the newest validity",
                candidates.len()
            ));
        }
        candidates
            .into_iter()
            .max_by_key(|cert| cert.valid_to().unwrap_or(NaiveDate::MIN))
            .ok_or_else(|| SigningError::Unknown("empty candidate set".to_string()))
    }

    /// Sign a Base64 payload. The certificate is taken from the caller or
    /// resolved by identity; with neither the flow cannot proceed.
    pub async fn sign(
        &self,
        payload_b64: &str,
        mode: Pkcs7Mode,
        cert: Option<&Cert>,
        identity: Option<&str>,
        timestamp: bool,
    ) -> Result<String> {
        let resolved;
        let cert = match cert {
            Some(cert) => cert,
            None => {
                if identity.is_none() {
                    return Err(SigningError::CertificateRequired);
                }
                resolved = self.resolve_certificate(identity, None).await?;
                &resolved
            }
        };
        self.ops
            .sign_with_cert(cert, SignOp::Create { payload_b64, mode }, timestamp)
            .await
    }

    /// Append a signature to an existing PKCS#7 structure.
    pub async fn append(
        &self,
        pkcs7_b64: &str,
        cert: Option<&Cert>,
        identity: Option<&str>,
        timestamp: bool,
    ) -> Result<String> {
        let resolved;
        let cert = match cert {
            Some(cert) => cert,
            None => {
                if identity.is_none() {
                    return Err(SigningError::CertificateRequired);
                }
                resolved = self.resolve_certificate(identity, None).await?;
                &resolved
            }
        };
        self.ops
            .sign_with_cert(cert, SignOp::Append { pkcs7_b64 }, timestamp)
            .await
    }

    /// Challenge authentication: fetch a challenge from the document
    /// service and sign it with the resolved certificate.
    pub async fn auth(&self, cert: Option<&Cert>, identity: Option<&str>) -> Result<DesktopAuth> {
        if cert.is_none() && identity.is_none() {
            return Err(SigningError::CertificateRequired);
        }
        let challenge = self.service.challenge().await?;
        if challenge.challenge.is_empty() {
            return Err(SigningError::NetworkError(
                "challenge response was empty".to_string(),
            ));
        }
        let payload_b64 = encode_document(&challenge.challenge);
        let pkcs7 = self
            .sign(&payload_b64, Pkcs7Mode::Attached, cert, identity, false)
            .await?;
        Ok(DesktopAuth { challenge, pkcs7 })
    }
}
