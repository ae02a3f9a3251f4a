mod api;
mod config;
mod core;
mod infra;
mod models;

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::api::transactions::{
    get_transaction, get_transaction_aggregate, get_transaction_summary, list_transactions,
};
use crate::config::Settings;

pub mod state {
    use crate::core::BuilderConfig;

    pub struct AppState {
        pub db: sqlx::PgPool,
        pub builder: BuilderConfig,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = Settings::from_env()?;
    let db = infra::db::init_pool(&settings).await?;
    let state = Arc::new(state::AppState {
        db,
        builder: settings.builder_config(),
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // The aggregate route must be registered as a literal path; it would
    // otherwise be captured by {id}.
    let app = Router::new()
        .route("/", get(api::service_info))
        .route("/health", get(api::health))
        .route("/api/v1/transactions", get(list_transactions))
        .route("/api/v1/transactions/aggregate", get(get_transaction_aggregate))
        .route("/api/v1/transactions/summary/{year}", get(get_transaction_summary))
        .route("/api/v1/transactions/{id}", get(get_transaction))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    info!("transaction API listening on {}", settings.bind_addr);
    let listener = tokio::net::TcpListener::bind(&settings.bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
