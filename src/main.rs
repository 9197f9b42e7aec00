mod config;
mod edge;
mod routes;
mod services;
mod state;
mod tenant;

use std::sync::Arc;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = match config::PortalConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };
    let port = config.port;

    let api = Arc::new(
        services::api::HttpApi::new(&config.api_base_url, config.api_timeouts).expect("http client build failed"),
    );
    tracing::info!(api = %config.api_base_url, "platform API client initialized");

    let state = state::AppState::new(config, api.clone(), api);
    tracing::info!(
        base_domain_labels = state.tenants.base_domain_labels(),
        logout_timeout_secs = state.config.logout_timeout_secs,
        "tenant resolution configured"
    );

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "portal listening");
    axum::serve(listener, app).await.expect("server failed");
}
