//! Bridge configuration

use crate::transport::ws::DEFAULT_AGENT_URL;

/// What to do when the local agent cannot be reached during the API key
/// handshake. The silent default keeps the application usable on machines
/// without the signing hardware; individual calls still fail on their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnavailablePolicy {
    #[default]
    Silent,
    Surface,
}

/// Configuration for the signing bridge.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// WebSocket endpoint of the local agent
    pub agent_url: String,
    /// Domain/key pairs for the handshake, positionally paired
    pub api_keys: Vec<String>,
    /// Base URL of the document service
    pub base_url: String,
    /// Handshake behavior when the agent is unreachable
    pub on_unavailable: UnavailablePolicy,
    /// User agent string used to route between desktop and mobile flows
    pub user_agent: Option<String>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            agent_url: DEFAULT_AGENT_URL.to_string(),
            api_keys: default_api_keys(),
            base_url: "https://eimzo.telecomsoft.uz".to_string(),
            on_unavailable: UnavailablePolicy::Silent,
            user_agent: None,
        }
    }
}

/// The vendor-published allow-list credentials for local origins. Deployed
/// domains append their own issued pair.
pub fn default_api_keys() -> Vec<String> {
    [
        "localhost",
        "96D0C1491615C82B9A54D9989779DF825B690748224C2B04F500F370D51827CE2644D8D4A82C18184D73AB8530BB8ED537269603F61DB0D03D2104ABF789970B",
        "127.0.0.1",
        "A7BCFA5D490B351BE0754130DF03A068F855DB4333D43921125B9CF2670EF6A40370C646B90401955E1F7BC9CDBF59CE0B2C5467D820BE189C845D0B79CFC96F",
        "null",
        "E0A205EC4E7B78BBB56AFF83A733A1BB9FD39D562E67978CC5E7D73B0951DB1954595A20672A63332535E13CC6EC1E1FC8857BB09E0855D7E76E411B6FA16E9D",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}
