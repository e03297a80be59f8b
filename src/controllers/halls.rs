use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use crate::error::CinemaError;
use crate::middleware::AdminUser;
use crate::models::SeatPosition;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/halls", post(create_hall).get(list_halls))
        .route("/halls/{id}", delete(delete_hall))
}

#[derive(Debug, Deserialize, Validate)]
struct CreateHallRequest {
    #[validate(length(min = 1, max = 2000))]
    seats: Vec<SeatPosition>,
}

// POST /api/halls
async fn create_hall(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Json(req): Json<CreateHallRequest>,
) -> Result<impl IntoResponse, CinemaError> {
    req.validate()?;
    let hall = state.catalog.create_hall(req.seats).await?;
    Ok((StatusCode::CREATED, Json(hall)))
}

// DELETE /api/halls/{id}
async fn delete_hall(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, CinemaError> {
    let screenings = state.catalog.delete_hall(id).await?;
    state.cache.invalidate_many(&screenings).await;
    Ok(StatusCode::NO_CONTENT)
}

// GET /api/halls
async fn list_halls(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> Result<impl IntoResponse, CinemaError> {
    Ok(Json(state.catalog.list_halls().await?))
}
