use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;
use validator::Validate;

use crate::cache::seats::SeatsLookup;
use crate::error::CinemaError;
use crate::middleware::AdminUser;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/screenings", post(create_screening).get(list_screenings))
        .route("/screenings/{id}", delete(delete_screening))
        .route("/screenings/{id}/seats", get(list_seats))
}

#[derive(Debug, Deserialize, Validate)]
struct CreateScreeningRequest {
    start_time: NaiveDateTime,
    #[validate(range(min = 1))]
    film_id: i64,
    #[validate(range(min = 1))]
    hall_id: i64,
}

#[derive(Debug, Deserialize)]
struct ListScreeningsQuery {
    date: Option<NaiveDate>,
}

// POST /api/screenings
async fn create_screening(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Json(req): Json<CreateScreeningRequest>,
) -> Result<impl IntoResponse, CinemaError> {
    req.validate()?;
    let screening = state
        .scheduler
        .create(req.start_time, req.film_id, req.hall_id)
        .await?;
    Ok((StatusCode::CREATED, Json(screening)))
}

// DELETE /api/screenings/{id}
async fn delete_screening(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, CinemaError> {
    state.scheduler.delete(id).await?;
    state.cache.invalidate_seats(id).await;
    Ok(StatusCode::NO_CONTENT)
}

// GET /api/screenings?date=YYYY-MM-DD
async fn list_screenings(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListScreeningsQuery>,
) -> Result<impl IntoResponse, CinemaError> {
    Ok(Json(state.scheduler.list(query.date).await?))
}

// GET /api/screenings/{id}/seats
async fn list_seats(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, CinemaError> {
    let generation = match state.cache.cached_seats(id).await {
        SeatsLookup::Hit(seats) => {
            debug!(screening_id = id, "seat map served from cache");
            return Ok(Json(seats));
        }
        SeatsLookup::Miss { generation } => generation,
    };
    let seats = state.scheduler.seats(id).await?;
    state.cache.cache_seats(id, generation, &seats).await;
    Ok(Json(seats))
}
