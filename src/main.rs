use axum::routing::get;
use axum::Router;
use std::env;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod auth;
mod config;
mod enrollment;
mod error;
mod handlers;
mod mailer;
mod models;
mod payments;
mod state;
mod store;
#[cfg(test)]
mod tests;

use crate::config::AppConfig;
use crate::payments::PaymentGateway;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            env::var("RUST_LOG").unwrap_or_else(|_| "rustilearn_backend=info,axum=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;

    let db = store::memory();
    let gateway = Arc::new(PaymentGateway::from_credentials(config.payment.clone()));
    let mailer = mailer::from_config(config.smtp.as_ref())?;

    let state = AppState {
        db,
        gateway,
        mailer,
        jwt_secret: config.jwt_secret.into(),
        frontend_url: config.frontend_url.into(),
    };

    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .merge(handlers::router(state))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("listening on http://0.0.0.0:{}", config.port);

    axum::serve(listener, app).await?;
    Ok(())
}
