pub mod cache;
pub mod clock;
pub mod config;
pub mod controllers;
pub mod database;
pub mod error;
pub mod middleware;
pub mod models;
pub mod redis_client;
pub mod services;
pub mod store;

use std::sync::Arc;

use clock::{Clock, SystemClock};
use services::{
    CatalogService, LogNotifier, ScreeningDatePolicy, ScreeningScheduler, TicketBookingPolicy,
    TicketCancellingPolicy, TicketLifecycle, UserService,
};
use store::PgStore;

// Shared state for the whole application
pub struct AppState {
    pub db: database::Database,
    pub cache: cache::CacheService,
    pub config: config::Config,
    pub scheduler: ScreeningScheduler<PgStore>,
    pub tickets: TicketLifecycle<PgStore>,
    pub catalog: CatalogService<PgStore>,
    pub users: UserService<PgStore>,
}

impl AppState {
    pub fn new(
        config: config::Config,
        db: database::Database,
        redis: redis_client::RedisClient,
    ) -> Arc<Self> {
        let store = Arc::new(PgStore::new(db.pool.clone()));
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let booking = &config.booking;

        let scheduler = ScreeningScheduler::new(
            store.clone(),
            clock.clone(),
            ScreeningDatePolicy::from(booking),
        );
        let tickets = TicketLifecycle::new(
            store.clone(),
            clock,
            TicketBookingPolicy::from(booking),
            TicketCancellingPolicy::from(booking),
        );
        let catalog = CatalogService::new(store.clone());
        let notifier = Arc::new(LogNotifier::new(format!(
            "http://{}:{}/api/users/password/new",
            config.app.host, config.app.port
        )));
        let users = UserService::new(store, notifier, config.security.bcrypt_cost);
        let cache = cache::CacheService::new(redis, config.redis.seats_ttl_seconds);

        Arc::new(Self {
            db,
            cache,
            config,
            scheduler,
            tickets,
            catalog,
            users,
        })
    }
}
