// Signing flows
//
// One logical "sign this document" operation rides two entirely different
// transports: the desktop agent RPC path and the phone-based QR/deep-link
// path. This module holds the flow routing types and the device detection
// seam; the flows themselves live in the submodules.

pub mod desktop;
pub mod mobile;

use crate::document_service::Challenge;

/// User agent substrings treated as mobile devices. A heuristic, not a
/// guarantee; callers can replace the detector entirely.
pub const MOBILE_AGENT_TOKENS: &[&str] = &[
    "android",
    "webos",
    "iphone",
    "ipad",
    "ipod",
    "blackberry",
    "windows phone",
    "opera mini",
    "iemobile",
    "mobile",
];

/// Substring check against the known mobile user agent tokens.
pub fn is_mobile_user_agent(user_agent: &str) -> bool {
    let normalized = user_agent.to_lowercase();
    MOBILE_AGENT_TOKENS
        .iter()
        .any(|token| normalized.contains(token))
}

/// Chooses between the desktop and mobile signing flows.
pub trait DeviceDetector: Send + Sync {
    fn is_mobile(&self) -> bool;
}

/// Detector over a fixed user agent string.
pub struct UserAgentDetector {
    user_agent: String,
}

impl UserAgentDetector {
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
        }
    }
}

impl DeviceDetector for UserAgentDetector {
    fn is_mobile(&self) -> bool {
        is_mobile_user_agent(&self.user_agent)
    }
}

/// Hand-off data for a signature routed through the companion mobile app.
/// Completion is observed separately by polling.
#[derive(Debug, Clone)]
pub struct MobileSignature {
    pub document_id: String,
    pub hash_code: String,
    pub qr_code: String,
}

/// Result of desktop challenge authentication.
#[derive(Debug, Clone)]
pub struct DesktopAuth {
    pub challenge: Challenge,
    pub pkcs7: String,
}

/// Result of one routed signing request.
#[derive(Debug, Clone)]
pub enum SignOutcome {
    /// Base64 PKCS#7, ready for submission
    Desktop(String),
    /// Mobile hand-off; poll for completion
    Mobile(MobileSignature),
}

/// Result of one routed authentication request.
#[derive(Debug, Clone)]
pub enum AuthOutcome {
    Desktop(DesktopAuth),
    Mobile(MobileSignature),
}
