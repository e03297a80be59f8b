use axum::{
    extract::{Path, Query, State},
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
use crate::models::{FilmCategory, FilmFilter, NewFilm};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/films", post(create_film).get(list_films))
        .route("/films/{title}", delete(delete_film))
}

#[derive(Debug, Deserialize, Validate)]
struct CreateFilmRequest {
    #[validate(length(min = 1, max = 255))]
    title: String,
    category: FilmCategory,
    year: i32,
    #[validate(range(min = 1, max = 1440))]
    duration_in_minutes: i32,
}

// POST /api/films
async fn create_film(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Json(req): Json<CreateFilmRequest>,
) -> Result<impl IntoResponse, CinemaError> {
    req.validate()?;
    let film = state
        .catalog
        .create_film(NewFilm {
            title: req.title,
            category: req.category,
            year: req.year,
            duration_in_minutes: req.duration_in_minutes,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(film)))
}

// DELETE /api/films/{title}
async fn delete_film(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(title): Path<String>,
) -> Result<StatusCode, CinemaError> {
    let screenings = state.catalog.delete_film(&title).await?;
    state.cache.invalidate_many(&screenings).await;
    Ok(StatusCode::NO_CONTENT)
}

// GET /api/films?title=&category=
async fn list_films(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<FilmFilter>,
) -> Result<impl IntoResponse, CinemaError> {
    Ok(Json(state.catalog.list_films(&filter).await?))
}
