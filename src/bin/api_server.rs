use anyhow::Context;
use school_backoffice::domain::auth::AccessLevel;
use school_backoffice::infra::backend::{Backend, MemoryBackend};
use school_backoffice::infra::config::{self, AppConfig, BackendKind};
use school_backoffice::transport;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = AppConfig::from_env();
    let backend = match config.backend.kind {
        BackendKind::Memory => memory_backend(&config.backend.bucket).await?,
        BackendKind::Hosted => Backend::from_config(&config.backend),
    };
    if let Err(e) = backend.ping().await {
        // Keep serving: list pages render the failure as an error notice.
        warn!(mode = backend.mode.as_str(), error = %e, "backend is not reachable yet");
    }

    let app_state = transport::http::AppState::new(backend, &config.app_url);
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let app = transport::http::create_router(app_state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", transport::http::ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, app_url = %config.app_url, "API server listening");
    info!("Swagger UI available at /swagger-ui");

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    Ok(())
}

async fn memory_backend(bucket: &str) -> anyhow::Result<Backend> {
    let memory = MemoryBackend::new(bucket);
    match config::seed_admin() {
        Some((email, password)) => {
            memory
                .add_account(&email, &password, AccessLevel::Admin)
                .await
                .context("failed to seed the admin account")?;
            info!(email = %email, "seeded admin account");
        }
        None => warn!("memory backend without SEED_ADMIN_EMAIL/SEED_ADMIN_PASSWORD: nobody can sign in"),
    }
    Ok(memory.backend())
}
