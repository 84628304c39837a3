use thiserror::Error;

use crate::transport::TransportError;

/// Which side of the signing pipeline a failure originated from.
///
/// Remediation differs: a client-side failure points at this machine
/// (agent not installed, wrong password), a remote one at the document
/// service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSide {
    /// This subsystem or the local signing agent
    Client,
    /// The remote document service
    Remote,
}

/// Error types for the signing bridge
#[derive(Error, Debug)]
pub enum SigningError {
    #[error("signing agent unavailable: {0}")]
    AgentUnavailable(String),

    #[error("a certificate is required for desktop signing")]
    CertificateRequired,

    #[error("certificate not found: {0}")]
    CertificateNotFound(String),

    #[error("certificate expired: {0}")]
    CertificateExpired(String),

    #[error("wrong key password: {0}")]
    WrongPassword(String),

    #[error("signing failed: {0}")]
    SigningFailed(String),

    #[error("mobile authentication failed: {0}")]
    MobileAuthFailed(String),

    #[error("invalid QR code format: {0}")]
    MobileQrInvalidFormat(String),

    #[error("network error: {0}")]
    NetworkError(String),

    #[error("unknown error: {0}")]
    Unknown(String),
}

impl SigningError {
    /// Classify an agent-reported failure reason from `load_key` or a
    /// PKCS#7 call. The agent reports a bad PIN/password as a
    /// `BadPaddingException` somewhere in its free-text reason.
    pub fn from_agent_reason(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        if reason.contains("BadPaddingException") {
            SigningError::WrongPassword(reason)
        } else if reason.is_empty() {
            SigningError::SigningFailed("agent reported failure without a reason".to_string())
        } else {
            SigningError::SigningFailed(reason)
        }
    }

    /// Which side produced this failure.
    pub fn side(&self) -> ErrorSide {
        match self {
            SigningError::AgentUnavailable(_)
            | SigningError::CertificateRequired
            | SigningError::CertificateNotFound(_)
            | SigningError::CertificateExpired(_)
            | SigningError::WrongPassword(_)
            | SigningError::SigningFailed(_)
            | SigningError::MobileQrInvalidFormat(_)
            | SigningError::Unknown(_) => ErrorSide::Client,
            SigningError::MobileAuthFailed(_) | SigningError::NetworkError(_) => ErrorSide::Remote,
        }
    }
}

impl From<TransportError> for SigningError {
    fn from(err: TransportError) -> Self {
        SigningError::AgentUnavailable(err.to_string())
    }
}

/// Result type for signing bridge operations
pub type Result<T> = std::result::Result<T, SigningError>;
