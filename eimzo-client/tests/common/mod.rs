#![allow(dead_code)]

//! Shared test doubles: a scripted agent transport that records every
//! call, a scripted document service, and deep link recorders.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use eimzo_client::document_service::{Challenge, DocumentService, MobileSession, MobileStatus};
use eimzo_client::error::{Result, SigningError};
use eimzo_client::flow::mobile::DeepLink;
use eimzo_client::operations::Timestamper;
use eimzo_client::transport::{
    AgentRequest, AgentResponse, AgentTransport, RawCert, TransportError,
};
use eimzo_common::{Component, Logger};

pub fn test_logger() -> Logger {
    Logger::new_root(Component::Custom("Test"), "test")
}

pub fn ok_certs(certificates: Vec<RawCert>) -> AgentResponse {
    AgentResponse {
        success: true,
        certificates: Some(certificates),
        ..Default::default()
    }
}

pub fn ok_key(key_id: &str) -> AgentResponse {
    AgentResponse {
        success: true,
        key_id: Some(key_id.to_string()),
        ..Default::default()
    }
}

pub fn ok_pkcs7(pkcs7_b64: &str) -> AgentResponse {
    AgentResponse {
        success: true,
        pkcs7_64: Some(pkcs7_b64.to_string()),
        ..Default::default()
    }
}

pub fn agent_failure(reason: &str) -> AgentResponse {
    AgentResponse {
        success: false,
        reason: Some(reason.to_string()),
        ..Default::default()
    }
}

/// Agent transport answering from a prepared script and recording every
/// request in order.
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<std::result::Result<AgentResponse, TransportError>>>,
    calls: Mutex<Vec<AgentRequest>>,
}

impl ScriptedTransport {
    pub fn new(responses: Vec<std::result::Result<AgentResponse, TransportError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<AgentRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_names(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|call| call.name.clone())
            .collect()
    }
}

#[async_trait]
impl AgentTransport for ScriptedTransport {
    async fn call(
        &self,
        request: AgentRequest,
    ) -> std::result::Result<AgentResponse, TransportError> {
        self.calls.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(TransportError::ConnectionClosed))
    }
}

/// Document service answering from prepared data and counting status
/// polls.
pub struct ScriptedDocumentService {
    statuses: Mutex<VecDeque<i64>>,
    polls: AtomicUsize,
    session: Option<MobileSession>,
    challenge_value: String,
    fail_sessions: bool,
}

impl ScriptedDocumentService {
    pub fn new() -> Self {
        Self {
            statuses: Mutex::new(VecDeque::new()),
            polls: AtomicUsize::new(0),
            session: None,
            challenge_value: "challenge-1".to_string(),
            fail_sessions: false,
        }
    }

    pub fn with_statuses(self, codes: Vec<i64>) -> Self {
        *self.statuses.lock().unwrap() = codes.into();
        self
    }

    pub fn with_session(mut self, site_id: &str, document_id: &str, challenge: &str) -> Self {
        self.session = Some(MobileSession {
            site_id: site_id.to_string(),
            document_id: document_id.to_string(),
            challenge: challenge.to_string(),
        });
        self
    }

    pub fn with_challenge(mut self, challenge: &str) -> Self {
        self.challenge_value = challenge.to_string();
        self
    }

    pub fn failing_sessions(mut self) -> Self {
        self.fail_sessions = true;
        self
    }

    pub fn poll_count(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentService for ScriptedDocumentService {
    async fn challenge(&self) -> Result<Challenge> {
        Ok(Challenge {
            challenge: self.challenge_value.clone(),
            guid: String::new(),
            id_guid: String::new(),
        })
    }

    async fn mobile_auth(&self) -> Result<MobileSession> {
        if self.fail_sessions {
            return Err(SigningError::NetworkError("service unavailable".to_string()));
        }
        self.session
            .clone()
            .ok_or_else(|| SigningError::NetworkError("no session scripted".to_string()))
    }

    async fn mobile_sign(&self) -> Result<MobileSession> {
        self.mobile_auth().await
    }

    async fn mobile_status(&self, _document_id: &str) -> Result<MobileStatus> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        match self.statuses.lock().unwrap().pop_front() {
            Some(code) => Ok(MobileStatus::from_code(code)),
            None => Err(SigningError::NetworkError("status script exhausted".to_string())),
        }
    }

    async fn timestamp_pkcs7(&self, signature: &str) -> Result<String> {
        Ok(format!("TS.{signature}"))
    }
}

/// Timestamper stamping a recognizable prefix.
pub struct PrefixTimestamper;

#[async_trait]
impl Timestamper for PrefixTimestamper {
    async fn timestamp(&self, pkcs7_b64: &str) -> Result<String> {
        Ok(format!("TS.{pkcs7_b64}"))
    }
}

/// Deep link launcher recording every opened URL.
#[derive(Default)]
pub struct RecordingDeepLink {
    urls: Mutex<Vec<String>>,
}

impl RecordingDeepLink {
    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

impl DeepLink for RecordingDeepLink {
    fn open(&self, url: &str) {
        self.urls.lock().unwrap().push(url.to_string());
    }
}

/// Deep link launcher that does nothing.
pub struct NoopDeepLink;

impl DeepLink for NoopDeepLink {
    fn open(&self, _url: &str) {}
}
