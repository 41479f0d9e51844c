use axum::{Router, routing::get, routing::post};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use librato_provider::AppState;
use librato_provider::config::ProviderConfig;
use librato_provider::handlers;
use librato_provider::provider::Provider;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("librato_provider=debug,tower_http=debug")
        }))
        .init();

    let config_path =
        std::env::var("LIBRATO_PROVIDER_CONFIG").unwrap_or_else(|_| "./librato.toml".to_string());
    let config = ProviderConfig::load(&config_path)?.with_env();

    let provider = Provider::from_config(&config)?;
    let state = AppState {
        provider: Arc::new(provider),
    };

    let app = Router::new()
        .route("/v1/{kind}", post(handlers::resources::create_resource))
        .route(
            "/v1/{kind}/{id}",
            get(handlers::resources::read_resource)
                .put(handlers::resources::update_resource)
                .delete(handlers::resources::delete_resource),
        )
        .route("/healthz", get(handlers::health::healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = config.listen_addr()?;
    tracing::info!("librato-provider listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
