use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use crate::error::CinemaError;
use crate::middleware::AuthUser;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tickets", post(book_tickets))
        .route("/tickets/{id}/cancel", patch(cancel_ticket))
        .route("/tickets/my", get(my_tickets))
}

#[derive(Debug, Deserialize, Validate)]
struct BookTicketsRequest {
    #[validate(range(min = 1))]
    screening_id: i64,
    #[validate(length(max = 100))]
    seat_ids: Vec<i64>,
}

// POST /api/tickets
async fn book_tickets(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<BookTicketsRequest>,
) -> Result<impl IntoResponse, CinemaError> {
    req.validate()?;
    let tickets = state
        .tickets
        .book(req.screening_id, user.user_id, &req.seat_ids)
        .await?;
    state.cache.invalidate_seats(req.screening_id).await;
    Ok((StatusCode::CREATED, Json(tickets)))
}

// PATCH /api/tickets/{id}/cancel
async fn cancel_ticket(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, CinemaError> {
    let cancellation = state.tickets.cancel(id, user.user_id).await?;
    state.cache.invalidate_seats(cancellation.screening_id).await;
    Ok(Json(cancellation.ticket))
}

// GET /api/tickets/my
async fn my_tickets(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<impl IntoResponse, CinemaError> {
    Ok(Json(state.tickets.list(user.user_id).await?))
}
