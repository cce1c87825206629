//! End-to-end smoke test for vitaledger-node.
//!
//! Starts a real node process against a fresh data root, submits a
//! transaction and runs a wallet challenge/verify round trip over HTTP.
//!
//! Run with:
//!   cargo test -p vitaledger-node --test smoke

use std::net::TcpListener;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

struct NodeGuard {
    child: Child,
    data_root: PathBuf,
}

impl Drop for NodeGuard {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
        let _ = std::fs::remove_dir_all(&self.data_root);
    }
}

/// Find a free TCP port on loopback.
fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port()
}

async fn wait_for_health(client: &reqwest::Client, url: &str, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if let Ok(resp) = client.get(url).send().await {
            if resp.status().is_success() {
                return true;
            }
        }
        tokio::time::sleep(Duration::from_millis(150)).await;
    }
    false
}

#[tokio::test]
async fn smoke_submit_transaction_and_wallet_round_trip() {
    let data_root = std::env::temp_dir().join(format!("vitaledger_node_e2e_{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&data_root);
    std::fs::create_dir_all(&data_root).unwrap();

    let port = free_port();
    let base = format!("http://127.0.0.1:{port}/api");

    let node_bin = env!("CARGO_BIN_EXE_vitaledger-node");
    let child = Command::new(node_bin)
        .env("DATA_ROOT", &data_root)
        .env("PORT", port.to_string())
        .env("DEMO_EXTERNAL_SIGNER_ADDRESS", "0xDemoSigner")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("failed to spawn vitaledger-node");

    let _guard = NodeGuard { child, data_root };

    let http = reqwest::Client::new();
    assert!(
        wait_for_health(&http, &format!("{base}/health"), Duration::from_secs(10)).await,
        "vitaledger-node did not become ready within 10 seconds"
    );

    // ── Submit a transaction ─────────────────────────────────────────────
    let body = serde_json::json!({
        "type": "Emergency Record",
        "patientId": "patient-1",
        "provider": "Provider A",
        "priority": "Tier-1",
        "payload": {"chiefComplaint": "Cardiac Arrest, stat"},
    });
    let resp = http
        .post(format!("{base}/transactions"))
        .json(&body)
        .send()
        .await
        .expect("submit transaction");
    assert_eq!(resp.status(), reqwest::StatusCode::CREATED);
    let created: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(created["data"]["tier"], 1);

    // ── List it back ─────────────────────────────────────────────────────
    let listed: serde_json::Value = http
        .get(format!("{base}/transactions"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed["data"]["transactions"].as_array().unwrap().len(), 1);

    // ── Wallet challenge/verify (missing signature, expect a clean 400) ──
    let challenge: serde_json::Value = http
        .post(format!("{base}/wallet/challenge"))
        .json(&serde_json::json!({"address": "0xDemoSigner"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(challenge["data"]["nonce"].as_str().unwrap().starts_with("CAMTC-"));

    let verify = http
        .post(format!("{base}/wallet/verify"))
        .json(&serde_json::json!({"address": "0xDemoSigner", "signature": "not-a-real-signature"}))
        .send()
        .await
        .unwrap();
    assert_eq!(verify.status(), reqwest::StatusCode::BAD_REQUEST);

    // ── Audit trail now has both the submission and the failed verify ────
    let audit: serde_json::Value = http
        .get(format!("{base}/audit"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(audit["data"]["entries"].as_array().unwrap().len(), 2);
}
