pub mod films;
pub mod halls;
pub mod screenings;
pub mod tickets;
pub mod users;

use axum::Router;
use std::sync::Arc;

use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(films::routes())
        .merge(halls::routes())
        .merge(screenings::routes())
        .merge(tickets::routes())
        .merge(users::routes())
}
