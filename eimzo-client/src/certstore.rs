//! Certificate store adapter
//!
//! Turns raw agent enumeration responses into typed [`Cert`] records: one
//! `list_all_certificates` RPC per container type, vendor alias parsing,
//! validity derivation. Certificates are rebuilt on every enumeration and
//! never mutated; "the same key" is identified by serial number.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use eimzo_common::Logger;

use crate::error::{Result, SigningError};
use crate::transport::{AgentRequest, AgentTransport, Plugin};

pub use crate::transport::RawCert;

/// Alias attribute key carrying the holder's national identity number
/// (PINFL/INN).
pub const IDENTITY_OID: &str = "1.2.860.3.16.1.2";

/// Days of grace past `validto` before a certificate counts as overdue.
const VALIDITY_GRACE_DAYS: i64 = 1;

/// Backing store of a key container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerType {
    Pfx,
    Certkey,
}

impl ContainerType {
    /// RPC plugin namespace for all operations on this container type.
    pub fn plugin(&self) -> Plugin {
        match self {
            ContainerType::Pfx => Plugin::Pfx,
            ContainerType::Certkey => Plugin::Certkey,
        }
    }
}

/// One signing key container with its parsed identity attributes.
#[derive(Debug, Clone)]
pub struct Cert {
    /// Opaque location fields, echoed back verbatim on `load_key`
    pub disk: String,
    pub path: String,
    pub name: String,
    pub alias: String,
    /// Agent serial, or the raw alias string when the agent provides none
    pub serial_number: String,
    /// Lower-cased attribute keys parsed out of `alias`
    pub parsed_alias: HashMap<String, String>,
    pub container: ContainerType,
    /// Holder identity number from the alias, empty when absent
    pub inn: String,
    /// True when the validity window (plus grace) has passed
    pub overdue: bool,
}

impl Cert {
    /// Build a certificate record from a raw enumeration entry.
    pub fn from_raw(raw: RawCert, container: ContainerType) -> Self {
        Self::from_raw_at(raw, container, Utc::now())
    }

    /// Same as [`Cert::from_raw`] with an explicit clock, so validity can
    /// be derived against a simulated current date.
    pub fn from_raw_at(raw: RawCert, container: ContainerType, now: DateTime<Utc>) -> Self {
        let parsed_alias = parse_alias(&raw.alias);
        // Falling back to the alias string keeps a stable (if ugly) cache
        // key for issuers that omit the serial.
        let serial_number = raw
            .serial_number
            .filter(|serial| !serial.is_empty())
            .unwrap_or_else(|| raw.alias.clone());
        let inn = parsed_alias
            .get(IDENTITY_OID)
            .or_else(|| parsed_alias.get("uid"))
            .cloned()
            .unwrap_or_default();
        let overdue = parsed_alias
            .get("validto")
            .and_then(|raw_date| parse_valid_date(raw_date))
            .map(|valid_to| now.date_naive() > valid_to + chrono::Duration::days(VALIDITY_GRACE_DAYS))
            .unwrap_or(false);

        Self {
            disk: raw.disk,
            path: raw.path,
            name: raw.name,
            alias: raw.alias,
            serial_number,
            parsed_alias,
            container,
            inn,
            overdue,
        }
    }

    /// Whether this certificate belongs to the given identity number.
    pub fn matches_identity(&self, uid: &str) -> bool {
        !uid.is_empty()
            && (self.inn == uid
                || self.parsed_alias.get(IDENTITY_OID).map(String::as_str) == Some(uid))
    }

    /// End of the validity window, if the alias carries a parseable date.
    pub fn valid_to(&self) -> Option<NaiveDate> {
        self.parsed_alias
            .get("validto")
            .and_then(|raw_date| parse_valid_date(raw_date))
    }
}

/// Parse a vendor alias string into a lower-cased-key attribute mapping.
///
/// The alias is comma-separated `KEY=value`. Entries without `=` are
/// skipped, values are kept verbatim, the last occurrence of a duplicate
/// key wins. Never fails: metadata quality varies by issuer, so malformed
/// input yields a partial or empty mapping.
pub fn parse_alias(alias: &str) -> HashMap<String, String> {
    let mut parsed = HashMap::new();
    for pair in alias.split(',') {
        if let Some(eq_index) = pair.find('=') {
            let key = pair[..eq_index].trim().to_lowercase();
            if key.is_empty() {
                continue;
            }
            let value = pair[eq_index + 1..].trim().to_string();
            parsed.insert(key, value);
        }
    }
    parsed
}

/// Parse the agent's `DD.MM.YYYY[ HH:MM:SS]` validity dates.
pub fn parse_valid_date(raw: &str) -> Option<NaiveDate> {
    let date_part = raw.split(' ').next()?;
    let mut numbers = date_part.split('.');
    let day: u32 = numbers.next()?.trim().parse().ok()?;
    let month: u32 = numbers.next()?.trim().parse().ok()?;
    let year: i32 = numbers.next()?.trim().parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Enumerates key containers through the agent.
pub struct CertStore {
    transport: Arc<dyn AgentTransport>,
    logger: Logger,
}

impl CertStore {
    pub fn new(transport: Arc<dyn AgentTransport>, logger: Logger) -> Self {
        Self { transport, logger }
    }

    /// List the containers of one backing store.
    pub async fn list(&self, container: ContainerType) -> Result<Vec<Cert>> {
        let request = AgentRequest::new(container.plugin(), "list_all_certificates", Vec::new());
        let response = self.transport.call(request).await?;
        if !response.success {
            return Err(SigningError::Unknown(format!(
                "certificate listing failed: {}",
                response.reason.unwrap_or_default()
            )));
        }
        let certs: Vec<Cert> = response
            .certificates
            .unwrap_or_default()
            .into_iter()
            .map(|raw| Cert::from_raw(raw, container))
            .collect();
        self.logger.debug(format!(
            "listed {} {} container(s)",
            certs.len(),
            container.plugin().as_str()
        ));
        Ok(certs)
    }

    /// List both backing stores merged, usable certificates first.
    pub async fn list_all(&self) -> Result<Vec<Cert>> {
        let mut certs = self.list(ContainerType::Pfx).await?;
        certs.extend(self.list(ContainerType::Certkey).await?);
        certs.sort_by_key(|cert| cert.overdue);
        Ok(certs)
    }
}
