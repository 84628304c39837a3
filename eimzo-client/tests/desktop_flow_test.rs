//! Desktop flow tests against a scripted agent: certificate resolution,
//! the end-to-end signing sequence, and challenge authentication.

mod common;

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use common::{
    agent_failure, ok_certs, ok_key, ok_pkcs7, test_logger, ScriptedDocumentService,
    ScriptedTransport,
};
use eimzo_client::document_service::DocumentService;
use eimzo_client::flow::desktop::DesktopFlow;
use eimzo_client::transport::AgentTransport;
use eimzo_client::{
    encode_document, CertStore, KeyOperations, MemorySessionStore, Pkcs7Mode, Plugin, RawCert,
    SigningError,
};

fn raw_cert(serial: &str, alias: &str) -> RawCert {
    RawCert {
        disk: "E".to_string(),
        path: "/media/DSKEYS".to_string(),
        name: "director.pfx".to_string(),
        alias: alias.to_string(),
        serial_number: Some(serial.to_string()),
    }
}

fn flow_with(transport: &Arc<ScriptedTransport>, service: Arc<ScriptedDocumentService>) -> DesktopFlow {
    let agent: Arc<dyn AgentTransport> = transport.clone();
    let store = CertStore::new(agent.clone(), test_logger());
    let ops = Arc::new(KeyOperations::new(
        agent,
        Arc::new(MemorySessionStore::new()),
        test_logger(),
    ));
    let service: Arc<dyn DocumentService> = service;
    DesktopFlow::new(store, ops, service, test_logger())
}

const DIRECTOR_ALIAS: &str = "cn=Director,1.2.860.3.16.1.2=31234567890123,validto=01.01.2099";

#[tokio::test]
async fn end_to_end_signing_records_the_expected_call_sequence() {
    let transport = Arc::new(ScriptedTransport::new(vec![
        Ok(ok_certs(vec![raw_cert("serial-7", DIRECTOR_ALIAS)])),
        Ok(ok_certs(vec![])),
        Ok(ok_key("key-1")),
        Ok(ok_pkcs7("c2lnbmVk")),
    ]));
    let flow = flow_with(&transport, Arc::new(ScriptedDocumentService::new()));

    let pkcs7 = flow
        .sign(
            &encode_document("hello"),
            Pkcs7Mode::Attached,
            None,
            Some("31234567890123"),
            false,
        )
        .await
        .unwrap();

    // A well-formed Base64 signature comes back.
    assert!(STANDARD.decode(&pkcs7).is_ok());

    let calls = transport.calls();
    assert_eq!(
        transport.call_names(),
        [
            "list_all_certificates",
            "list_all_certificates",
            "load_key",
            "create_pkcs7"
        ]
    );
    // The key is loaded with the container's location fields, in order.
    assert_eq!(calls[2].plugin, Some(Plugin::Pfx));
    assert_eq!(
        calls[2].arguments,
        vec!["E", "/media/DSKEYS", "director.pfx", DIRECTOR_ALIAS]
    );
    // The signature covers the caller's payload with the loaded key.
    assert_eq!(
        calls[3].arguments,
        vec![encode_document("hello"), "key-1".to_string(), "no".to_string()]
    );
}

#[tokio::test]
async fn several_matches_pick_the_latest_validity() {
    let transport = Arc::new(ScriptedTransport::new(vec![
        Ok(ok_certs(vec![
            raw_cert(
                "older",
                "cn=Director,1.2.860.3.16.1.2=31234567890123,validto=01.01.2030",
            ),
            raw_cert(
                "newer",
                "cn=Director,1.2.860.3.16.1.2=31234567890123,validto=01.01.2040",
            ),
        ])),
        Ok(ok_certs(vec![])),
    ]));
    let flow = flow_with(&transport, Arc::new(ScriptedDocumentService::new()));

    let cert = flow
        .resolve_certificate(Some("31234567890123"), None)
        .await
        .unwrap();
    assert_eq!(cert.serial_number, "newer");
}

#[tokio::test]
async fn no_matching_certificate_is_reported_as_not_found() {
    let transport = Arc::new(ScriptedTransport::new(vec![
        Ok(ok_certs(vec![raw_cert("serial-7", DIRECTOR_ALIAS)])),
        Ok(ok_certs(vec![])),
    ]));
    let flow = flow_with(&transport, Arc::new(ScriptedDocumentService::new()));

    let err = flow
        .resolve_certificate(Some("99999999999999"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, SigningError::CertificateNotFound(_)));
}

#[tokio::test]
async fn expired_only_matches_are_reported_as_expired() {
    let transport = Arc::new(ScriptedTransport::new(vec![
        Ok(ok_certs(vec![raw_cert(
            "old",
            "cn=Director,1.2.860.3.16.1.2=31234567890123,validto=01.01.2020",
        )])),
        Ok(ok_certs(vec![])),
    ]));
    let flow = flow_with(&transport, Arc::new(ScriptedDocumentService::new()));

    let err = flow
        .resolve_certificate(Some("31234567890123"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, SigningError::CertificateExpired(_)));
}

#[tokio::test]
async fn signing_without_cert_or_identity_requires_a_certificate() {
    let transport = Arc::new(ScriptedTransport::new(vec![]));
    let flow = flow_with(&transport, Arc::new(ScriptedDocumentService::new()));

    let err = flow
        .sign("aGVsbG8=", Pkcs7Mode::Attached, None, None, false)
        .await
        .unwrap_err();
    assert!(matches!(err, SigningError::CertificateRequired));
    // The agent was never bothered.
    assert!(transport.calls().is_empty());
}

#[tokio::test]
async fn listing_failure_propagates_instead_of_resolving() {
    let transport = Arc::new(ScriptedTransport::new(vec![Ok(agent_failure(
        "plugin disabled",
    ))]));
    let flow = flow_with(&transport, Arc::new(ScriptedDocumentService::new()));

    let err = flow
        .resolve_certificate(Some("31234567890123"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, SigningError::Unknown(_)));
}

#[tokio::test]
async fn challenge_auth_signs_the_issued_challenge() {
    let transport = Arc::new(ScriptedTransport::new(vec![
        Ok(ok_certs(vec![raw_cert("serial-7", DIRECTOR_ALIAS)])),
        Ok(ok_certs(vec![])),
        Ok(ok_key("key-1")),
        Ok(ok_pkcs7("c2lnbmVk")),
    ]));
    let service = Arc::new(ScriptedDocumentService::new().with_challenge("ch-42"));
    let flow = flow_with(&transport, service);

    let auth = flow.auth(None, Some("31234567890123")).await.unwrap();
    assert_eq!(auth.challenge.challenge, "ch-42");
    assert_eq!(auth.pkcs7, "c2lnbmVk");

    // The signed payload is the Base64 of the challenge itself.
    let calls = transport.calls();
    assert_eq!(calls[3].arguments[0], encode_document("ch-42"));
}
