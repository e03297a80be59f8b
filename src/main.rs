use anyhow::Context;
use axum::{routing::get, Router};
use std::net::SocketAddr;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cinema::{
    config::Config, controllers, database::Database, redis_client::RedisClient, AppState,
};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env().context("invalid configuration")?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.app.rust_log))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(environment = %config.app.environment, "starting cinema API");

    let db = Database::connect(&config.database)
        .await
        .context("failed to connect to database")?;
    db.run_migrations()
        .await
        .context("failed to run migrations")?;

    let redis = RedisClient::connect(&config.redis.url)
        .await
        .context("failed to connect to Redis")?;

    let addr: SocketAddr = format!("{}:{}", config.app.host, config.app.port)
        .parse()
        .context("invalid HOST/PORT")?;
    let state = AppState::new(config, db, redis);

    let admin = &state.config.admin;
    if state
        .users
        .create_admin_if_missing(&admin.mail, &admin.password)
        .await
        .context("failed to create admin account")?
    {
        info!(mail = %admin.mail, "bootstrapped admin account");
    }

    let app = Router::new()
        .route("/", get(|| async { "Cinema API v1.0" }))
        .route("/health", get(|| async { "OK" }))
        .nest("/api", controllers::routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
