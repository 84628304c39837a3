//! Minimal run against a locally installed agent: install the API keys,
//! check the agent version, then sign a sample document with the first
//! usable certificate.

use eimzo_client::{BridgeConfig, SigningBridge};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let bridge = SigningBridge::new(BridgeConfig::default());
    bridge.start().await?;

    if !bridge.check_version(3, 37).await? {
        eprintln!("installed agent is too old, please update it");
        return Ok(());
    }

    let certs = bridge.certificates().await?;
    let Some(cert) = certs.iter().find(|cert| !cert.overdue) else {
        eprintln!("no usable certificates installed");
        return Ok(());
    };
    println!(
        "signing with {} (serial {})",
        cert.parsed_alias
            .get("cn")
            .map(String::as_str)
            .unwrap_or("?"),
        cert.serial_number
    );

    let pkcs7 = bridge.sign_document(cert, "demo document").await?;
    println!("pkcs7: {} bytes of base64", pkcs7.len());
    Ok(())
}
