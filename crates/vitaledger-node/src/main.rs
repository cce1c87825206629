//! vitaledger-node — the ledger core's HTTP server binary.
//!
//! Startup sequence:
//!   1. Open the storage backend and load the reference directory
//!   2. Rehydrate the mempool, audit log, and wallet auth from storage
//!   3. Optionally register a demo external-signer wallet
//!   4. Spawn background sweeps: nonce expiry, audit retention, audit
//!      rotation, TPS sampling
//!   5. Serve the HTTP router

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use tracing::{info, warn};

use vitaledger_audit::AuditLog;
use vitaledger_core::wallet::WalletFamily;
use vitaledger_mempool::Mempool;
use vitaledger_storage::{load_reference_directory, SledStorage, StorageBackend};
use vitaledger_wallet::{RegisterInput, WalletAuth};

#[derive(Parser, Debug)]
#[command(name = "vitaledger-node", version, about = "VitaLedger ledger core — HTTP server")]
struct Args {
    /// Connection string for a relational backend, if one is in use.
    /// Unused by the bundled sled/file-based backend but still recognized
    /// so deployments can carry it through config without an error.
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Directory for the persistent sled database and reference seed file.
    #[arg(long, env = "DATA_ROOT", default_value = "./data/vitaledger")]
    data_root: PathBuf,

    /// Logical network name surfaced on /health.
    #[arg(long, env = "NETWORK_ID", default_value = "vitaledger-local")]
    network_id: String,

    /// Prefix all HTTP routes are mounted under.
    #[arg(long, env = "API_PREFIX", default_value = "/api")]
    api_prefix: String,

    /// Audit retention window in days; 0 disables pruning.
    #[arg(long, env = "AUDIT_RETENTION_DAYS", default_value_t = 0)]
    audit_retention_days: u32,

    /// Audit log rotation threshold in bytes; 0 disables rotation.
    #[arg(long, env = "AUDIT_LOG_MAX_BYTES", default_value_t = 0)]
    audit_log_max_bytes: u64,

    /// Wallet nonce time-to-live in seconds.
    #[arg(long, env = "WALLET_NONCE_TTL_SECONDS", default_value_t = 300)]
    wallet_nonce_ttl_seconds: i64,

    /// TCP port to listen on.
    #[arg(long, env = "PORT", default_value_t = 8080)]
    port: u16,

    /// Optional address to pre-register as an external-signer wallet so a
    /// demo client has something to challenge against on a fresh database.
    #[arg(long, env = "DEMO_EXTERNAL_SIGNER_ADDRESS")]
    demo_external_signer_address: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,vitaledger=debug".parse().unwrap()),
        )
        .init();

    let args = Args::parse();
    info!("vitaledger-node starting");

    if let Some(url) = &args.database_url {
        info!(database_url = %url, "relational backend configured (unused by the sled backend)");
    }

    // ── Storage + reference directory ───────────────────────────────────
    std::fs::create_dir_all(&args.data_root)
        .with_context(|| format!("creating data root {}", args.data_root.display()))?;

    let storage: Arc<dyn StorageBackend> =
        Arc::new(SledStorage::open(&args.data_root).context("opening storage backend")?);
    let reference = load_reference_directory(&args.data_root).context("loading reference directory")?;

    // ── Subsystems ───────────────────────────────────────────────────────
    let mempool = Mempool::load(storage.clone()).context("rehydrating mempool")?;
    let audit = AuditLog::load(storage.clone()).context("rehydrating audit log")?;
    let wallet_auth = WalletAuth::new(storage.clone(), args.wallet_nonce_ttl_seconds);

    if let Some(address) = &args.demo_external_signer_address {
        let input = RegisterInput {
            address: address.clone(),
            family: WalletFamily::ExternalSigner,
            label: Some("demo bootstrap wallet".to_string()),
            metadata: Default::default(),
            public_key: None,
        };
        match wallet_auth.registry().register(input, Utc::now().timestamp()) {
            Ok(wallet) => info!(wallet_id = %wallet.id, %address, "demo external-signer wallet ready"),
            Err(e) => warn!(error = %e, %address, "failed to register demo wallet"),
        }
    }

    let state = Arc::new(vitaledger_api::AppStateInner::new(
        storage.clone(),
        mempool,
        audit,
        wallet_auth,
        reference,
        args.network_id.clone(),
        args.api_prefix.clone(),
        Utc::now(),
    ));

    // ── Background sweeps (spec §7 "best-effort: log and continue") ────
    match state.wallet_auth.sweep_expired_nonces(Utc::now().timestamp()) {
        Ok(n) if n > 0 => info!(swept = n, "startup nonce sweep removed expired records"),
        Ok(_) => {}
        Err(e) => warn!(error = %e, "startup nonce sweep failed"),
    }

    spawn_nonce_sweep(state.clone());
    spawn_retention_sweep(state.clone(), args.audit_retention_days);
    spawn_rotation_sweep(state.clone(), args.audit_log_max_bytes);
    spawn_tps_sampler(state.clone());

    // ── HTTP server ──────────────────────────────────────────────────────
    let router = vitaledger_api::router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    info!(%addr, prefix = %args.api_prefix, "node ready");
    axum::serve(listener, router).await.context("serving HTTP")?;

    Ok(())
}

const NONCE_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
const RETENTION_SWEEP_INTERVAL: Duration = Duration::from_secs(3600);
const ROTATION_SWEEP_INTERVAL: Duration = Duration::from_secs(300);
const TPS_SAMPLE_INTERVAL: Duration = Duration::from_secs(5);

fn spawn_nonce_sweep(state: vitaledger_api::AppState) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(NONCE_SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            match state.wallet_auth.sweep_expired_nonces(Utc::now().timestamp()) {
                Ok(n) if n > 0 => info!(swept = n, "nonce expiry sweep removed expired records"),
                Ok(_) => {}
                Err(e) => warn!(error = %e, "nonce expiry sweep failed"),
            }
        }
    });
}

fn spawn_retention_sweep(state: vitaledger_api::AppState, retention_days: u32) {
    if retention_days == 0 {
        return;
    }
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(RETENTION_SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            match state.audit.prune_retention(retention_days, Utc::now()) {
                Ok(pruned) if pruned > 0 => info!(pruned, "audit retention sweep pruned entries"),
                Ok(_) => {}
                Err(e) => warn!(error = %e, "audit retention sweep failed"),
            }
        }
    });
}

fn spawn_rotation_sweep(state: vitaledger_api::AppState, max_bytes: u64) {
    if max_bytes == 0 {
        return;
    }
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(ROTATION_SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            match state.audit.rotate_if_oversized(max_bytes, Utc::now().timestamp()) {
                Ok(Some(archive)) => info!(archive, "audit log rotated"),
                Ok(None) => {}
                Err(e) => warn!(error = %e, "audit rotation sweep failed"),
            }
        }
    });
}

fn spawn_tps_sampler(state: vitaledger_api::AppState) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(TPS_SAMPLE_INTERVAL);
        loop {
            ticker.tick().await;
            state.sample_tps(TPS_SAMPLE_INTERVAL.as_secs_f64());
        }
    });
}
