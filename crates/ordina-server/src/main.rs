use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use ordina_core::{IntentClassifier, ResponseGenerator, SessionStore, TurnPipeline};
use ordina_fhir::{FhirClient, ToolExecutor};
use ordina_provider::OpenAiProvider;
use ordina_retrieval::{DocumentStore, OpenAiEmbeddingProvider, Retriever};
use ordina_schema::{AccessPolicyConfig, AppConfig};
use ordina_server::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;
    let file_appender = tracing_appender::rolling::daily(&log_dir, "ordina-server.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("ordina_server=info,ordina_core=info,tower_http=debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(non_blocking),
        )
        .init();

    let config_path =
        std::env::var("ORDINA_CONFIG").unwrap_or_else(|_| "config.yaml".to_string());
    let config = AppConfig::load(&config_path)
        .with_context(|| format!("loading configuration from {config_path}"))?;
    let policy = AccessPolicyConfig::load(&config.retrieval.access_policy)?;

    tracing::info!(
        chat_model = %config.llm.chat_model,
        router_model = %config.llm.router_model,
        document_db = %config.retrieval.document_db,
        "starting ordina-server"
    );

    let documents = DocumentStore::open(
        &config.retrieval.document_db,
        config.llm.embedding_dimensions,
    )?;
    let embedder = Arc::new(
        OpenAiEmbeddingProvider::new(
            config.llm.api_key.clone(),
            config.llm.embedding_model.clone(),
            config.llm.embedding_dimensions,
        )
        .with_base_url(config.llm.base_url.clone()),
    );
    let retriever = Retriever::new(documents.clone(), embedder);

    let provider = Arc::new(OpenAiProvider::new(
        config.llm.api_key.clone(),
        config.llm.base_url.clone(),
    ));
    let executor = ToolExecutor::new(FhirClient::new(&config.fhir));
    let sessions = Arc::new(SessionStore::new());

    let pipeline = TurnPipeline::new(
        sessions.clone(),
        IntentClassifier::new(
            provider.clone(),
            config.llm.router_model.clone(),
            config.history_window,
        ),
        retriever,
        ResponseGenerator::new(
            provider,
            executor,
            config.llm.chat_model.clone(),
            config.history_window,
        ),
        policy,
        config.retrieval.top_k,
        config.retrieval.min_score,
    );

    let state = AppState {
        pipeline: Arc::new(pipeline),
        sessions,
        documents,
    };

    ordina_server::serve(state, &config.bind).await
}
