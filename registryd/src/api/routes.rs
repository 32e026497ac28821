use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use shared::protocol;
use shared::types::{ServiceSnapshot, ServiceStatus};
use crate::api::dashboard;
use crate::registry::RegistryHandle;

#[derive(Clone)]
pub struct AppState {
    pub registry: RegistryHandle,
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "ip")]
    pub address: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Wire view of one service. The address travels as `ip`, the field name
/// registering clients have always sent.
#[derive(Debug, Serialize)]
pub struct ServiceView {
    pub id: i64,
    pub name: String,
    pub ip: String,
    pub status: ServiceStatus,
    pub last_heartbeat: String,
}

impl From<ServiceSnapshot> for ServiceView {
    fn from(snapshot: ServiceSnapshot) -> Self {
        Self {
            id: snapshot.id,
            name: snapshot.name,
            ip: snapshot.address,
            status: snapshot.status,
            last_heartbeat: snapshot
                .last_heartbeat
                .to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ServiceListResponse {
    pub services: Vec<ServiceView>,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub name: String,
    pub status: ServiceStatus,
    pub last_heartbeat: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn store_error(e: anyhow::Error) -> ApiError {
    tracing::error!("Registry store failure: {:#}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: "Registry store unavailable".to_string(),
        }),
    )
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(protocol::DASHBOARD_PATH, get(dashboard::dashboard))
        .route(protocol::REGISTER_PATH, post(register))
        .route(protocol::SERVICES_PATH, get(list_services))
        .route("/refresh/:name", post(refresh_service))
        .route(protocol::REFRESH_ALL_PATH, post(refresh_all))
        .with_state(state)
}

async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    if req.name.is_empty() || req.address.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "Missing service name or IP".to_string(),
            }),
        ));
    }

    state
        .registry
        .register(req.name.clone(), req.address)
        .await
        .map_err(store_error)?;

    Ok(Json(MessageResponse {
        message: format!("Service {} registered/updated", req.name),
    }))
}

async fn list_services(
    State(state): State<AppState>,
) -> Result<Json<ServiceListResponse>, ApiError> {
    let services = state.registry.list().await.map_err(store_error)?;

    Ok(Json(ServiceListResponse {
        services: services.into_iter().map(ServiceView::from).collect(),
    }))
}

async fn refresh_service(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<RefreshResponse>, ApiError> {
    let snapshot = state
        .registry
        .get(name)
        .await
        .map_err(store_error)?
        .ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse {
                    error: "Service not found".to_string(),
                }),
            )
        })?;

    Ok(Json(RefreshResponse {
        name: snapshot.name,
        status: snapshot.status,
        last_heartbeat: snapshot
            .last_heartbeat
            .to_rfc3339_opts(SecondsFormat::Secs, true),
    }))
}

async fn refresh_all(
    State(state): State<AppState>,
) -> Result<Json<ServiceListResponse>, ApiError> {
    list_services(State(state)).await
}
