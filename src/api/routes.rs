use axum::{
    extract::State,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::health::HealthSnapshot;
use crate::commands;
use crate::error::AppError;
use crate::fetcher::Fetcher;
use crate::notify::Notifier;
use crate::service::SharedService;
use crate::store::StateStore;
use crate::types::{AlertPolicy, AlertState, StatusView};

pub fn router<F, S, N>(service: SharedService<F, S, N>) -> Router
where
    F: Fetcher + 'static,
    S: StateStore + 'static,
    N: Notifier + 'static,
{
    Router::new()
        .route("/status", get(get_status::<F, S, N>))
        .route("/state", get(get_state::<F, S, N>))
        .route(
            "/contract",
            post(post_contract::<F, S, N>).delete(delete_contract::<F, S, N>),
        )
        .route("/threshold", put(put_threshold::<F, S, N>))
        .route("/interval", put(put_interval::<F, S, N>))
        .route("/command", post(post_command::<F, S, N>))
        .route("/health", get(get_health::<F, S, N>))
        .route("/stats/latency", get(get_stats_latency::<F, S, N>))
        .with_state(service)
}

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct ContractRequest {
    pub cycles: i64,
}

#[derive(Deserialize)]
pub struct ThresholdRequest {
    pub value: f64,
}

#[derive(Deserialize)]
pub struct IntervalRequest {
    pub minutes: i64,
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct ContractResponse {
    pub current_cycle: i64,
    pub end_cycle: i64,
    pub cycles: i64,
}

#[derive(Serialize)]
pub struct ClearResponse {
    pub had_contract: bool,
}

#[derive(Serialize)]
pub struct ThresholdResponse {
    pub threshold: f64,
}

#[derive(Serialize)]
pub struct IntervalResponse {
    pub minutes: u32,
    pub warning: Option<String>,
}

#[derive(Serialize)]
pub struct CommandResponse {
    pub reply: String,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub policy: AlertPolicy,
    #[serde(flatten)]
    pub health: HealthSnapshot,
}

#[derive(Serialize)]
pub struct LatencyResponse {
    pub samples: u64,
    pub p50_ms: Option<u64>,
    pub p95_ms: Option<u64>,
    pub p99_ms: Option<u64>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn get_status<F, S, N>(
    State(service): State<SharedService<F, S, N>>,
) -> Result<Json<StatusView>, AppError>
where
    F: Fetcher,
    S: StateStore,
    N: Notifier,
{
    Ok(Json(service.status().await?))
}

async fn get_state<F, S, N>(
    State(service): State<SharedService<F, S, N>>,
) -> Result<Json<AlertState>, AppError>
where
    F: Fetcher,
    S: StateStore,
    N: Notifier,
{
    Ok(Json(service.current_state().await?))
}

async fn post_contract<F, S, N>(
    State(service): State<SharedService<F, S, N>>,
    Json(body): Json<ContractRequest>,
) -> Result<Json<ContractResponse>, AppError>
where
    F: Fetcher,
    S: StateStore,
    N: Notifier,
{
    let receipt = service.register_contract(body.cycles).await?;
    Ok(Json(ContractResponse {
        current_cycle: receipt.current_cycle,
        end_cycle: receipt.end_cycle,
        cycles: receipt.cycles,
    }))
}

async fn delete_contract<F, S, N>(
    State(service): State<SharedService<F, S, N>>,
) -> Result<Json<ClearResponse>, AppError>
where
    F: Fetcher,
    S: StateStore,
    N: Notifier,
{
    let had_contract = service.clear_contract().await?;
    Ok(Json(ClearResponse { had_contract }))
}

async fn put_threshold<F, S, N>(
    State(service): State<SharedService<F, S, N>>,
    Json(body): Json<ThresholdRequest>,
) -> Result<Json<ThresholdResponse>, AppError>
where
    F: Fetcher,
    S: StateStore,
    N: Notifier,
{
    let threshold = service.set_threshold(body.value).await?;
    Ok(Json(ThresholdResponse { threshold }))
}

async fn put_interval<F, S, N>(
    State(service): State<SharedService<F, S, N>>,
    Json(body): Json<IntervalRequest>,
) -> Result<Json<IntervalResponse>, AppError>
where
    F: Fetcher,
    S: StateStore,
    N: Notifier,
{
    let change = service.set_interval(body.minutes).await?;
    let warning = change
        .long_interval
        .then(|| "intervals above 60 minutes may miss price changes".to_string());
    Ok(Json(IntervalResponse {
        minutes: change.minutes,
        warning,
    }))
}

/// Chat-style entry point: the body is the raw command text, e.g. `$contract 52`.
async fn post_command<F, S, N>(
    State(service): State<SharedService<F, S, N>>,
    body: String,
) -> Json<CommandResponse>
where
    F: Fetcher,
    S: StateStore,
    N: Notifier,
{
    let reply = commands::handle_text(&service, &body).await;
    Json(CommandResponse { reply })
}

async fn get_health<F, S, N>(
    State(service): State<SharedService<F, S, N>>,
) -> Json<HealthResponse>
where
    F: Fetcher,
    S: StateStore,
    N: Notifier,
{
    Json(HealthResponse {
        policy: service.engine().policy(),
        health: service.health().snapshot(),
    })
}

async fn get_stats_latency<F, S, N>(
    State(service): State<SharedService<F, S, N>>,
) -> Json<LatencyResponse>
where
    F: Fetcher,
    S: StateStore,
    N: Notifier,
{
    let latency = service.latency();
    let (p50_ms, p95_ms, p99_ms) = latency.percentiles();
    Json(LatencyResponse {
        samples: latency.len(),
        p50_ms,
        p95_ms,
        p99_ms,
    })
}
