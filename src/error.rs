use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::models::LayoutError;
use crate::store::StoreError;

/// Every expected failure of the services, each with a stable reason code.
#[derive(Debug, Error)]
pub enum CinemaError {
    #[error("film not found")]
    FilmNotFound,
    #[error("hall not found")]
    HallNotFound,
    #[error("screening not found")]
    ScreeningNotFound,
    #[error("seat not found")]
    SeatNotFound,
    #[error("ticket not found")]
    TicketNotFound,
    #[error("user not found")]
    UserNotFound,

    #[error("screening date must be between 7 and 21 days from now")]
    DateOutOfRange,
    #[error("too late to book a ticket for this screening")]
    TicketBookTooLate,
    #[error("too late to cancel this ticket")]
    TicketCancelTooLate,

    #[error("screening collides with another screening in this hall")]
    SchedulingConflict,
    #[error("seat is already taken")]
    SeatAlreadyTaken,
    #[error("ticket is already cancelled")]
    TicketAlreadyCancelled,
    #[error("film title is already used")]
    FilmTitleTaken,
    #[error("mail is already registered")]
    MailTaken,

    #[error("no seats requested")]
    NoSeatsRequested,
    #[error("invalid hall layout: {0}")]
    InvalidHallLayout(#[from] LayoutError),
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("admin role required")]
    Forbidden,

    #[error("password hashing failed: {0}")]
    Hashing(#[from] bcrypt::BcryptError),
    #[error("blocking task failed: {0}")]
    Blocking(#[from] tokio::task::JoinError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type CinemaResult<T> = Result<T, CinemaError>;

impl CinemaError {
    pub fn code(&self) -> &'static str {
        match self {
            CinemaError::FilmNotFound => "FILM_NOT_FOUND",
            CinemaError::HallNotFound => "HALL_NOT_FOUND",
            CinemaError::ScreeningNotFound => "SCREENING_NOT_FOUND",
            CinemaError::SeatNotFound => "SEAT_NOT_FOUND",
            CinemaError::TicketNotFound => "TICKET_NOT_FOUND",
            CinemaError::UserNotFound => "USER_NOT_FOUND",
            CinemaError::DateOutOfRange => "SCREENING_DATE_OUT_OF_RANGE",
            CinemaError::TicketBookTooLate => "TICKET_BOOK_TOO_LATE",
            CinemaError::TicketCancelTooLate => "TICKET_CANCEL_TOO_LATE",
            CinemaError::SchedulingConflict => "SCREENING_COLLISION",
            CinemaError::SeatAlreadyTaken => "SEAT_ALREADY_TAKEN",
            CinemaError::TicketAlreadyCancelled => "TICKET_ALREADY_CANCELLED",
            CinemaError::FilmTitleTaken => "FILM_TITLE_NOT_UNIQUE",
            CinemaError::MailTaken => "USER_MAIL_NOT_UNIQUE",
            CinemaError::NoSeatsRequested => "NO_SEATS_REQUESTED",
            CinemaError::InvalidHallLayout(_) => "INVALID_HALL_LAYOUT",
            CinemaError::Validation(_) => "VALIDATION_ERROR",
            CinemaError::InvalidCredentials => "UNAUTHORIZED",
            CinemaError::Forbidden => "FORBIDDEN",
            CinemaError::Hashing(_) | CinemaError::Blocking(_) | CinemaError::Store(_) => {
                "INTERNAL_ERROR"
            }
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            CinemaError::FilmNotFound
            | CinemaError::HallNotFound
            | CinemaError::ScreeningNotFound
            | CinemaError::SeatNotFound
            | CinemaError::TicketNotFound
            | CinemaError::UserNotFound => StatusCode::NOT_FOUND,

            CinemaError::DateOutOfRange
            | CinemaError::TicketBookTooLate
            | CinemaError::TicketCancelTooLate
            | CinemaError::SchedulingConflict
            | CinemaError::SeatAlreadyTaken
            | CinemaError::TicketAlreadyCancelled
            | CinemaError::FilmTitleTaken
            | CinemaError::MailTaken => StatusCode::UNPROCESSABLE_ENTITY,

            CinemaError::NoSeatsRequested
            | CinemaError::InvalidHallLayout(_)
            | CinemaError::Validation(_) => StatusCode::BAD_REQUEST,

            CinemaError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            CinemaError::Forbidden => StatusCode::FORBIDDEN,

            CinemaError::Hashing(_) | CinemaError::Blocking(_) | CinemaError::Store(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<validator::ValidationErrors> for CinemaError {
    fn from(errors: validator::ValidationErrors) -> Self {
        CinemaError::Validation(errors.to_string())
    }
}

impl IntoResponse for CinemaError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "internal error");
            "An internal error occurred".to_string()
        } else {
            self.to_string()
        };

        let mut response = (
            status,
            Json(json!({
                "error": message,
                "code": self.code(),
            })),
        )
            .into_response();

        if status == StatusCode::UNAUTHORIZED {
            if let Ok(value) = "Basic realm=\"cinema\"".parse() {
                response
                    .headers_mut()
                    .insert(axum::http::header::WWW_AUTHENTICATE, value);
            }
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_and_conflict_errors_are_unprocessable() {
        for err in [
            CinemaError::DateOutOfRange,
            CinemaError::TicketBookTooLate,
            CinemaError::TicketCancelTooLate,
            CinemaError::SchedulingConflict,
            CinemaError::SeatAlreadyTaken,
        ] {
            assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY, "{err}");
        }
    }

    #[test]
    fn store_failures_hide_details() {
        let err = CinemaError::from(StoreError::Database(sqlx::Error::PoolTimedOut));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code(), "INTERNAL_ERROR");
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn unauthorized_carries_basic_challenge() {
        let response = CinemaError::InvalidCredentials.into_response();
        assert!(response
            .headers()
            .contains_key(axum::http::header::WWW_AUTHENTICATE));
    }
}
