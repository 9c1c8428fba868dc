//! Process entrypoint: loads configuration, wires every collaborator
//! together, and serves the request surface until `SIGINT`/`SIGTERM`.
//!
//! Grounded in the teacher's binary shape (config load -> client
//! construction -> router -> `axum::serve` with a graceful-shutdown
//! future) minus the collaborators this spec doesn't carry (no vector
//! store, no Prometheus registry).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use resonance_audio::{HttpSttClient, HttpTtsClient};
use resonance_config::{load_credentials, load_settings};
use resonance_core::Agent;
use resonance_engine::Engine;
use resonance_events::Orchestrator;
use resonance_llm::HttpLlmClient;
use resonance_server::{create_router, AppState, ConversationStore};
use resonance_worker::WorkerPool;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Arc::new(load_settings()?);
    let credentials = load_credentials();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&settings.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .json()
        .init();

    let artifacts_dir = PathBuf::from(&settings.artifacts_dir);
    tokio::fs::create_dir_all(&artifacts_dir).await?;

    let llm = Arc::new(HttpLlmClient::new(settings.llm_endpoint.clone(), credentials.openai_api_key.clone()));
    let tts = Arc::new(HttpTtsClient::new(settings.tts_endpoint.clone(), credentials.tts_api_key.clone()));
    let stt = Arc::new(HttpSttClient::new(
        settings.stt_endpoint.clone(),
        credentials.stt_api_key.clone(),
        settings.stt_model.clone(),
    ));

    let (orchestrator, results_tx) = Orchestrator::spawn(
        artifacts_dir.clone(),
        Duration::from_secs_f64(settings.events_workflow_timeout_s),
    );

    let worker_pool = Arc::new(WorkerPool::new(
        settings.waves_max_workers,
        settings.waves_queue_max_size,
        Duration::from_secs_f64(settings.waves_job_timeout_s),
        results_tx,
    ));

    let conversations = Arc::new(ConversationStore::new());
    let agents: Arc<[Agent]> = Agent::default_roster().into();

    let engine = Arc::new(Engine::new(
        llm,
        tts,
        worker_pool,
        orchestrator.clone(),
        conversations.clone(),
        settings.clone(),
        agents.clone(),
        artifacts_dir.clone(),
    ));

    let state = AppState {
        engine,
        orchestrator,
        conversations,
        stt,
        settings: settings.clone(),
        agents,
        artifacts_dir,
    };

    let router = create_router(state);

    let addr = format!("{}:{}", settings.host, settings.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "resonance-server listening");

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install sigterm handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
