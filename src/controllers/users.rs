use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::error::CinemaError;
use crate::models::UserRole;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users", post(register))
        .route("/users/password/reset", patch(reset_password))
        .route("/users/password/new", patch(new_password))
}

#[derive(Debug, Deserialize, Validate)]
struct RegisterRequest {
    #[validate(email)]
    mail: String,
    #[validate(length(min = 8, max = 72))]
    password: String,
}

// The password hash never leaves the service.
#[derive(Debug, Serialize)]
struct UserResponse {
    id: i64,
    mail: String,
    role: UserRole,
}

#[derive(Debug, Deserialize)]
struct ResetQuery {
    mail: String,
}

#[derive(Debug, Deserialize, Validate)]
struct NewPasswordRequest {
    token: Uuid,
    #[validate(length(min = 8, max = 72))]
    password: String,
}

// POST /api/users
async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, CinemaError> {
    req.validate()?;
    let user = state.users.create_user(&req.mail, &req.password).await?;
    Ok((
        StatusCode::CREATED,
        Json(UserResponse {
            id: user.id,
            mail: user.mail,
            role: user.role,
        }),
    ))
}

// PATCH /api/users/password/reset?mail=
async fn reset_password(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ResetQuery>,
) -> Result<StatusCode, CinemaError> {
    state.users.reset_password(&query.mail).await?;
    Ok(StatusCode::NO_CONTENT)
}

// PATCH /api/users/password/new
async fn new_password(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewPasswordRequest>,
) -> Result<StatusCode, CinemaError> {
    req.validate()?;
    state
        .users
        .set_new_password(req.token, &req.password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
