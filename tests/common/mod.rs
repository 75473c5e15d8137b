//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ed25519_dalek::{Signer, SigningKey};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use voidspace_gate::auth::signature::SignaturePayload;
use voidspace_gate::config::GateConfig;
use voidspace_gate::http::{AppState, HttpServer};
use voidspace_gate::lifecycle::Shutdown;

pub const BROWSER_UA: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0 Safari/537.36";
pub const DOMAIN: &str = "voidspace.io";
pub const CSRF_COOKIE: &str = "voidspace_csrf";
pub const SESSION_COOKIE: &str = "voidspace_session";
pub const CRON_SECRET: &str = "cron-secret-for-tests";

/// Defaults with a fixed secret and non-production cookies (plain HTTP).
pub fn test_config() -> GateConfig {
    let mut config = GateConfig::default();
    config.session.secret = "integration-test-session-secret-0123456789".to_string();
    config.site.production = false;
    config.cron.secret = Some(CRON_SECRET.to_string());
    config
}

pub fn test_state(config: GateConfig) -> AppState {
    AppState::new(config).expect("state should build")
}

/// A NEAR-style wallet holding one ed25519 key.
pub struct Wallet {
    key: SigningKey,
}

impl Wallet {
    pub fn new(seed: u8) -> Self {
        Self {
            key: SigningKey::from_bytes(&[seed; 32]),
        }
    }

    pub fn public_key(&self) -> String {
        format!(
            "ed25519:{}",
            bs58::encode(self.key.verifying_key().as_bytes()).into_string()
        )
    }

    pub fn sign(&self, message: &str, nonce: [u8; 32], recipient: &str) -> String {
        let payload = SignaturePayload::new(message, nonce, recipient);
        BASE64.encode(self.key.sign(&payload.digest()).to_bytes())
    }

    /// A sign-in body signed for `recipient`.
    pub fn sign_in_body(&self, account_id: &str, nonce: [u8; 32], recipient: &str) -> Value {
        let message = "Sign in to Voidspace";
        json!({
            "accountId": account_id,
            "message": message,
            "signature": self.sign(message, nonce, recipient),
            "publicKey": self.public_key(),
            "nonce": BASE64.encode(nonce),
            "recipient": recipient,
        })
    }
}

/// Start the gate on an ephemeral port.
pub async fn start_gate(config: GateConfig) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();

    let server = HttpServer::new(config).expect("server should build");
    tokio::spawn(server.run(listener, shutdown.clone()));
    tokio::time::sleep(Duration::from_millis(50)).await;

    (addr, shutdown)
}

/// Browser-like client with a cookie store.
pub fn browser_client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(BROWSER_UA)
        .cookie_store(true)
        .build()
        .unwrap()
}

/// First `Set-Cookie` value for `name`.
pub fn cookie_value(response: &reqwest::Response, name: &str) -> Option<String> {
    response
        .cookies()
        .find(|c| c.name() == name)
        .map(|c| c.value().to_string())
}
