//! API handlers for the server.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use eco_core::{AgentId, DeathCause, PopulationStats, ServerConfig, Species};
use eco_world::{AgentSnapshot, ExportPosition, RebalanceReport, Simulation, WorldExport};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Runtime time controls, adjustable while the world runs
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Clock {
    pub paused: bool,
    pub time_scale: f32,
}

impl From<&ServerConfig> for Clock {
    fn from(config: &ServerConfig) -> Self {
        Self {
            paused: config.start_paused,
            time_scale: config.time_scale,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub world: Arc<RwLock<Simulation>>,
    pub clock: Arc<RwLock<Clock>>,
}

impl AppState {
    pub fn new(world: Simulation, clock: Clock) -> Self {
        Self {
            world: Arc::new(RwLock::new(world)),
            clock: Arc::new(RwLock::new(clock)),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/agents", get(list_agents).post(spawn_agent))
        .route("/api/agents/:id", get(get_agent))
        .route("/api/agents/:id/heal", post(heal_agent))
        .route("/api/agents/:id/damage", post(damage_agent))
        .route("/api/agents/:id/kill", post(kill_agent))
        .route("/api/agents/:id/resurrect", post(resurrect_agent))
        .route("/api/agents/:id/mutate", post(mutate_agent))
        .route("/api/agents/:id/clone", post(clone_agent))
        .route("/api/rebalance", post(rebalance))
        .route("/api/stats", get(get_stats))
        .route("/api/export", get(export_world))
        .route("/api/control", get(get_control).post(set_control))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    version: String,
}

/// Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Snapshot of every agent in the world
pub async fn list_agents(State(state): State<AppState>) -> Json<Vec<AgentSnapshot>> {
    Json(state.world.read().snapshot())
}

pub async fn get_agent(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<AgentSnapshot>, ApiError> {
    Ok(Json(state.world.read().agent_snapshot(AgentId(id))?))
}

#[derive(Deserialize)]
pub struct SpawnRequest {
    species: Species,
    /// Random surface point when absent
    position: Option<ExportPosition>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SpawnResponse {
    pub id: AgentId,
}

pub async fn spawn_agent(
    State(state): State<AppState>,
    Json(req): Json<SpawnRequest>,
) -> Result<(StatusCode, Json<SpawnResponse>), ApiError> {
    let mut world = state.world.write();
    let id = match req.position {
        Some(position) => world.spawn(req.species, position.into())?,
        None => world.spawn_random(req.species)?,
    };

    info!(agent_id = %id, species = %req.species, "Agent spawned via API");
    Ok((StatusCode::CREATED, Json(SpawnResponse { id })))
}

#[derive(Deserialize)]
pub struct AmountRequest {
    amount: f32,
}

pub async fn heal_agent(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(req): Json<AmountRequest>,
) -> Result<Json<AgentSnapshot>, ApiError> {
    let mut world = state.world.write();
    world.heal(AgentId(id), req.amount)?;
    Ok(Json(world.agent_snapshot(AgentId(id))?))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DamageResponse {
    pub died: Option<DeathCause>,
    pub agent: AgentSnapshot,
}

pub async fn damage_agent(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(req): Json<AmountRequest>,
) -> Result<Json<DamageResponse>, ApiError> {
    let mut world = state.world.write();
    let died = world.damage(AgentId(id), req.amount)?;
    Ok(Json(DamageResponse {
        died,
        agent: world.agent_snapshot(AgentId(id))?,
    }))
}

pub async fn kill_agent(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<AgentSnapshot>, ApiError> {
    let mut world = state.world.write();
    world.kill(AgentId(id))?;
    Ok(Json(world.agent_snapshot(AgentId(id))?))
}

pub async fn resurrect_agent(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<AgentSnapshot>, ApiError> {
    let mut world = state.world.write();
    world.resurrect(AgentId(id))?;
    Ok(Json(world.agent_snapshot(AgentId(id))?))
}

#[derive(Deserialize)]
pub struct MutateRequest {
    #[serde(default = "one")]
    times: u32,
}

fn one() -> u32 {
    1
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MutateResponse {
    pub parameters_changed: usize,
}

pub async fn mutate_agent(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(req): Json<MutateRequest>,
) -> Result<Json<MutateResponse>, ApiError> {
    let parameters_changed = state.world.write().mutate_brain(AgentId(id), req.times)?;
    Ok(Json(MutateResponse { parameters_changed }))
}

pub async fn clone_agent(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<(StatusCode, Json<SpawnResponse>), ApiError> {
    let id = state.world.write().clone_agent(AgentId(id))?;
    Ok((StatusCode::CREATED, Json(SpawnResponse { id })))
}

/// Largest per-species target accepted over HTTP, whatever the world's cap
pub const MAX_REBALANCE_TARGET: usize = 10_000;

/// Target living counts per species
pub async fn rebalance(
    State(state): State<AppState>,
    Json(targets): Json<BTreeMap<Species, usize>>,
) -> Result<Json<RebalanceReport>, ApiError> {
    if let Some((species, target)) = targets.iter().find(|&(_, &t)| t > MAX_REBALANCE_TARGET) {
        return Err(ApiError::Invalid(format!(
            "target for {} must be at most {}, got {}",
            species, MAX_REBALANCE_TARGET, target
        )));
    }
    Ok(Json(state.world.write().rebalance(&targets)?))
}

pub async fn get_stats(State(state): State<AppState>) -> Json<PopulationStats> {
    Json(state.world.read().stats())
}

pub async fn export_world(State(state): State<AppState>) -> Json<WorldExport> {
    Json(state.world.read().export())
}

pub async fn get_control(State(state): State<AppState>) -> Json<Clock> {
    Json(*state.clock.read())
}

#[derive(Deserialize)]
pub struct ControlUpdate {
    paused: Option<bool>,
    time_scale: Option<f32>,
}

pub async fn set_control(
    State(state): State<AppState>,
    Json(update): Json<ControlUpdate>,
) -> Result<Json<Clock>, ApiError> {
    if let Some(scale) = update.time_scale {
        if !(scale.is_finite() && scale >= 0.0) {
            return Err(ApiError::Invalid(format!(
                "time scale must be a non-negative number, got {}",
                scale
            )));
        }
    }

    let mut clock = state.clock.write();
    if let Some(paused) = update.paused {
        clock.paused = paused;
    }
    if let Some(scale) = update.time_scale {
        clock.time_scale = scale;
    }

    info!(paused = clock.paused, time_scale = clock.time_scale, "Clock updated");
    Ok(Json(*clock))
}

// Error handling
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    Conflict(String),
    Invalid(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Invalid(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, message).into_response()
    }
}

impl From<eco_core::Error> for ApiError {
    fn from(err: eco_core::Error) -> Self {
        match err {
            eco_core::Error::NotFound(_) => ApiError::NotFound(err.to_string()),
            eco_core::Error::InvalidState(msg) => ApiError::Conflict(msg),
            eco_core::Error::Validation(msg) => ApiError::Invalid(msg),
            other => {
                error!("Core error: {}", other);
                ApiError::Internal(other.to_string())
            }
        }
    }
}
