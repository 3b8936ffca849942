use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use booking_api::{
    config::Config,
    db::{self, PgCredentialStore},
    routes::{self, cors_layer},
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&pool).await?;
    info!("Database connected and migrations applied");

    let cors = cors_layer(&config.cors_origins);
    let addr = format!("{}:{}", config.host, config.port);
    let prefix = config.api_prefix.clone();

    let state = AppState::new(config, Arc::new(PgCredentialStore::new(pool)));

    let app = routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(DefaultBodyLimit::max(64 * 1024));

    info!("booking API listening on {} (prefix {:?})", addr, prefix);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
