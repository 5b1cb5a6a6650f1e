use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use vigil::api::{api_router, ApiContext, PhwRegistry};
use vigil::bus::CaseEventBus;
use vigil::config::Config;
use vigil::db::{sqlite, CaseStore};
use vigil::engine::{DecisionEngine, MedicationEngine, ModelRegistry};
use vigil::handover::HandoverGenerator;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Arc::new(Config::from_env());
    tracing::info!(
        version = vigil::config::APP_VERSION,
        bind = %config.bind_addr,
        db = %config.database_path.display(),
        "starting {}",
        vigil::config::APP_NAME
    );

    let conn = sqlite::open_database(&config.database_path)?;
    let store = Arc::new(CaseStore::new(conn));

    // read-only caches, refreshed at process start
    let interactions = store.load_interaction_table()?;
    let model = ModelRegistry::load(&config.model_artifact_path);
    if !model.is_ready() {
        tracing::warn!("running without risk model; assessments will omit ml_result");
    }

    let engine = Arc::new(DecisionEngine::new(
        Arc::new(model),
        Arc::new(MedicationEngine::new(interactions)),
        &config,
    ));

    let mut phws = PhwRegistry::new();
    for seed in &config.phw_seed_tokens {
        let id = phws.register(&seed.token, &seed.full_name, &seed.facility);
        tracing::info!(phw = %id, name = %seed.full_name, "registered PHW credential");
    }
    if phws.is_empty() {
        let dev_token = vigil::token::mint(chrono::Duration::hours(24)).token;
        phws.register(&dev_token, "Dev PHW", "Dev Facility");
        tracing::warn!(token = %dev_token, "no PHW tokens configured; generated a dev token");
    }

    let handover = Arc::new(HandoverGenerator::new(
        config.handover_service_url.clone(),
        config.handover_timeout,
    ));

    let ctx = ApiContext::new(
        store,
        engine,
        Arc::new(CaseEventBus::new()),
        handover,
        phws,
        config.clone(),
    );
    let app = api_router(ctx);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install shutdown handler");
    }
    tracing::info!("shutdown signal received");
}
