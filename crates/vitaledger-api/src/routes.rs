use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use vitaledger_core::audit::{AuditOutcome, AuditQuery, AuditQueryFilters, AuditRecordInput, QueryDirection};
use vitaledger_core::constants::{DEFAULT_QUERY_LIMIT, MAX_AUDIT_QUERY_LIMIT, MAX_QUERY_LIMIT};
use vitaledger_core::mempool::{MempoolSnapshot, MempoolStats};
use vitaledger_core::priority::PriorityBreakdown;
use vitaledger_core::reference::{Patient, Provider, Validator};
use vitaledger_core::transaction::Transaction;
use vitaledger_core::wallet::{IssueNonceOptions, IssuedChallenge, VerifiedSession};

use crate::dto::{
    parse_tier_label, AuditQueryParams, CreateTransactionRequest, DataEnvelope, TransactionsQuery,
    WalletChallengeRequest, WalletVerifyRequest,
};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    let prefix = state.api_prefix.clone();

    let api_routes = Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/reference/providers", get(list_providers))
        .route("/reference/patients", get(list_patients))
        .route("/reference/validators", get(list_validators))
        .route("/transactions", get(list_transactions).post(create_transaction))
        .route("/audit", get(list_audit))
        .route("/audit/export", get(export_audit_csv))
        .route("/wallet/challenge", post(wallet_challenge))
        .route("/wallet/verify", post(wallet_verify))
        .with_state(state);

    Router::new().nest(&prefix, api_routes).layer(tower_http::cors::CorsLayer::permissive())
}

// ── Health / Metrics ────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    uptime: i64,
    chain: ChainSnapshot,
    mempool: MempoolStats,
    wallet_count: u64,
    directory_counts: DirectoryCounts,
    version: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChainSnapshot {
    network_id: String,
    total_blocks: u64,
}

#[derive(Serialize)]
struct DirectoryCounts {
    providers: usize,
    patients: usize,
    validators: usize,
}

async fn health(State(state): State<AppState>) -> ApiResult<Json<DataEnvelope<HealthResponse>>> {
    let now = Utc::now();
    let wallet_count = state.storage.count_wallets()?;
    let stats = state.resource_stats();

    Ok(Json(DataEnvelope::new(HealthResponse {
        status: "ok",
        uptime: state.uptime_seconds(now),
        chain: ChainSnapshot { network_id: state.network_id.clone(), total_blocks: state.total_blocks() },
        mempool: state.mempool.stats(stats.validators_online, stats.validators_total),
        wallet_count,
        directory_counts: DirectoryCounts {
            providers: state.reference.providers.len(),
            patients: state.reference.patients.len(),
            validators: state.reference.validators.len(),
        },
        version: env!("CARGO_PKG_VERSION"),
    })))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MetricsPayload {
    validators_active: u64,
    current_tps: f64,
    network_latency: f64,
    total_blocks: u64,
    tps_trend: Vec<f64>,
    transaction_distribution: [u64; 3],
    validator_scores: Vec<ValidatorScore>,
}

#[derive(Serialize)]
struct ValidatorScore {
    id: String,
    score: f64,
}

async fn metrics(State(state): State<AppState>) -> Json<DataEnvelope<MetricsPayload>> {
    let stats = state.resource_stats();
    let mempool_stats = state.mempool.stats(stats.validators_online, stats.validators_total);

    Json(DataEnvelope::new(MetricsPayload {
        validators_active: state.validators_online(),
        current_tps: state.current_tps(),
        network_latency: state.average_validator_latency_ms(),
        total_blocks: state.total_blocks(),
        tps_trend: state.tps_trend(),
        transaction_distribution: [mempool_stats.tier1_size, mempool_stats.tier2_size, mempool_stats.tier3_size],
        validator_scores: state
            .top_validator_scores(5)
            .into_iter()
            .map(|(id, score)| ValidatorScore { id, score })
            .collect(),
    }))
}

// ── Reference directory ─────────────────────────────────────────────────

async fn list_providers(State(state): State<AppState>) -> Json<DataEnvelope<Vec<Provider>>> {
    Json(DataEnvelope::new(state.reference.providers.clone()))
}

async fn list_patients(State(state): State<AppState>) -> Json<DataEnvelope<Vec<Patient>>> {
    Json(DataEnvelope::new(state.reference.patients.clone()))
}

async fn list_validators(State(state): State<AppState>) -> Json<DataEnvelope<Vec<Validator>>> {
    Json(DataEnvelope::new(state.reference.validators.clone()))
}

// ── Transactions ─────────────────────────────────────────────────────────

#[derive(Serialize)]
struct TransactionsPayload {
    transactions: Vec<Transaction>,
    snapshot: MempoolSnapshot,
    stats: MempoolStats,
}

async fn list_transactions(
    State(state): State<AppState>,
    Query(query): Query<TransactionsQuery>,
) -> ApiResult<Json<DataEnvelope<TransactionsPayload>>> {
    let hint = query.priority.as_deref().map(parse_tier_label).transpose()?;
    let limit = query.limit.unwrap_or(DEFAULT_QUERY_LIMIT).min(MAX_QUERY_LIMIT);

    let mut transactions = state.storage.iter_transactions()?;
    transactions.retain(|tx| {
        query.patient_id.as_deref().map(|v| tx.patient_id.as_deref() == Some(v)).unwrap_or(true)
            && query.tx_type.as_deref().map(|v| tx.tx_type == v).unwrap_or(true)
            && query.status.as_deref().map(|v| tx.status.as_deref() == Some(v)).unwrap_or(true)
            && hint.map(|tier| tx.tier == tier).unwrap_or(true)
    });
    transactions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    transactions.truncate(limit);

    let stats = state.resource_stats();
    let mempool_stats = state.mempool.stats(stats.validators_online, stats.validators_total);

    Ok(Json(DataEnvelope::new(TransactionsPayload {
        transactions,
        snapshot: state.mempool.snapshot(),
        stats: mempool_stats,
    })))
}

#[derive(Serialize)]
struct AdmissionPayload {
    transaction: Transaction,
    breakdown: PriorityBreakdown,
    tier: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    evicted: Option<Transaction>,
}

#[derive(Serialize)]
struct CreateTransactionResponse {
    data: AdmissionPayload,
    stats: MempoolStats,
}

async fn create_transaction(
    State(state): State<AppState>,
    Json(request): Json<CreateTransactionRequest>,
) -> ApiResult<(StatusCode, Json<CreateTransactionResponse>)> {
    if request.tx_type.trim().is_empty() {
        return Err(ApiError::validation("type is required"));
    }
    if request.patient_id.trim().is_empty() {
        return Err(ApiError::validation("patientId is required"));
    }
    if request.provider.trim().is_empty() {
        return Err(ApiError::validation("provider is required"));
    }
    let hint = parse_tier_label(&request.priority)?;

    let now = Utc::now().timestamp();
    let transaction = Transaction {
        id: request.id.filter(|s| !s.is_empty()).unwrap_or_else(|| format!("tx-{}", Uuid::new_v4())),
        tx_type: request.tx_type,
        tier: 0,
        priority: 0.0,
        payload: request.payload,
        signature: request.signature,
        created_at: now,
        status: request.status,
        patient_id: Some(request.patient_id.clone()),
        provider: Some(request.provider),
        provider_id: request.provider_id,
        actor_id: request.actor_id.clone(),
        actor_type: request.actor_type.clone(),
        details: request.details,
        block_hash: None,
    };

    let resource_stats = state.resource_stats();
    let breakdown = vitaledger_context::calculate_priority(&transaction, Some(&resource_stats));

    let admission = state.mempool.add(transaction.clone(), breakdown, Some(hint), now)?;

    let mut stored = transaction.clone();
    stored.tier = admission.tier;
    stored.priority = breakdown.priority;
    state.storage.put_transaction(&stored)?;
    state.record_admission();

    let audit_input = AuditRecordInput {
        action: "submit-transaction".to_string(),
        actor_id: request.actor_id.unwrap_or_else(|| "anonymous".to_string()),
        actor_type: request.actor_type.unwrap_or_else(|| "system".to_string()),
        resource: "transaction".to_string(),
        outcome: AuditOutcome::Success,
        patient_id: Some(request.patient_id),
        details: Some(format!("admitted {} at tier {}", stored.id, admission.tier)),
        ..Default::default()
    };
    state.audit.record(audit_input, Utc::now())?;

    let stats = state.resource_stats();
    let response = CreateTransactionResponse {
        data: AdmissionPayload {
            transaction: stored,
            breakdown,
            tier: admission.tier,
            evicted: admission.evicted.map(|e| e.transaction),
        },
        stats: state.mempool.stats(stats.validators_online, stats.validators_total),
    };

    Ok((StatusCode::CREATED, Json(response)))
}

// ── Audit ────────────────────────────────────────────────────────────────

fn build_audit_query(params: &AuditQueryParams) -> ApiResult<AuditQuery> {
    let direction = match params.direction.as_deref() {
        None | Some("desc") => QueryDirection::Desc,
        Some("asc") => QueryDirection::Asc,
        Some(other) => return Err(ApiError::validation(format!("unknown direction: {other}"))),
    };

    let tags = params
        .tags
        .as_deref()
        .map(|csv| csv.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();

    Ok(AuditQuery {
        filters: AuditQueryFilters {
            actor_id: params.actor_id.clone(),
            actor_type: params.actor_type.clone(),
            patient_id: params.patient_id.clone(),
            resource: params.resource.clone(),
            action: params.action.clone(),
            outcome: params.outcome.clone(),
            from: params.from,
            to: params.to,
            tags,
            search: params.search.clone(),
        },
        limit: params.limit.unwrap_or(DEFAULT_QUERY_LIMIT).min(MAX_AUDIT_QUERY_LIMIT),
        cursor: params.cursor,
        direction,
    })
}

async fn list_audit(
    State(state): State<AppState>,
    Query(params): Query<AuditQueryParams>,
) -> ApiResult<Json<DataEnvelope<vitaledger_core::audit::AuditQueryResult>>> {
    let query = build_audit_query(&params)?;
    let result = state.audit.query(query)?;
    Ok(Json(DataEnvelope::new(result)))
}

async fn export_audit_csv(
    State(state): State<AppState>,
    Query(params): Query<AuditQueryParams>,
) -> ApiResult<([(&'static str, &'static str); 1], String)> {
    let query = build_audit_query(&params)?;
    let csv = state.audit.export_csv(&query.filters)?;
    Ok(([("content-type", "text/csv")], csv))
}

// ── Wallet ───────────────────────────────────────────────────────────────

async fn wallet_challenge(
    State(state): State<AppState>,
    Json(request): Json<WalletChallengeRequest>,
) -> ApiResult<(StatusCode, Json<DataEnvelope<IssuedChallenge>>)> {
    let family = request.parsed_family()?;
    let options = IssueNonceOptions {
        family,
        label: request.label.clone(),
        metadata: request.metadata.clone(),
        custom_public_key: request.custom_public_key.clone(),
    };
    let now = Utc::now().timestamp();
    let challenge = state.wallet_auth.issue_nonce(&request.address, options, now)?;
    Ok((StatusCode::OK, Json(DataEnvelope::new(challenge))))
}

async fn wallet_verify(
    State(state): State<AppState>,
    Json(request): Json<WalletVerifyRequest>,
) -> ApiResult<Json<DataEnvelope<VerifiedSession>>> {
    let now = Utc::now().timestamp();
    let result = state.wallet_auth.verify(&request.address, &request.signature, now);

    let outcome = if result.is_ok() { AuditOutcome::Success } else { AuditOutcome::Failed };
    let audit_input = AuditRecordInput {
        action: "wallet-verify".to_string(),
        actor_id: request.address.clone(),
        actor_type: "wallet".to_string(),
        resource: "wallet-auth".to_string(),
        outcome,
        details: result.as_ref().err().map(|e| e.to_string()),
        ..Default::default()
    };
    if let Err(e) = state.audit.record(audit_input, Utc::now()) {
        tracing::warn!(error = %e, "failed to audit wallet verify attempt");
    }

    let session = result?;
    Ok(Json(DataEnvelope::new(session)))
}
