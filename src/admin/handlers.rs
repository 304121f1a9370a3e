use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::admin::AdminState;
use crate::endpoint::Endpoint;
use crate::failover::{FailoverError, HealthStatus};
use crate::health::Probe;

#[derive(Serialize)]
pub struct EndpointStatus {
    pub index: usize,
    pub endpoint: Endpoint,
    pub active: bool,
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: String,
}

pub async fn get_status<P: Probe>(State(state): State<AdminState<P>>) -> Json<HealthStatus> {
    Json(state.coordinator.health_status())
}

pub async fn get_endpoints<P: Probe>(
    State(state): State<AdminState<P>>,
) -> Json<Vec<EndpointStatus>> {
    let active = state.coordinator.active_index();
    let statuses = state
        .coordinator
        .endpoints()
        .iter()
        .enumerate()
        .map(|(index, endpoint)| EndpointStatus {
            index,
            endpoint: endpoint.clone(),
            active: index == active,
        })
        .collect();
    Json(statuses)
}

pub async fn post_failback<P: Probe>(
    State(state): State<AdminState<P>>,
) -> Result<Json<HealthStatus>, (StatusCode, Json<ErrorBody>)> {
    match state.coordinator.failback_to_primary().await {
        Ok(()) => Ok(Json(state.coordinator.health_status())),
        Err(e @ FailoverError::PrimaryUnhealthy(_)) => Err((
            StatusCode::CONFLICT,
            Json(ErrorBody { error: e.to_string() }),
        )),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorBody { error: e.to_string() }),
        )),
    }
}
