//! Main Entrypoint for the Avatar Chat CLI
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Opening the realtime session.
//! 3. Wiring up retrieval when an index is configured.
//! 4. Running the conversation until end of input or Ctrl+C.

use anyhow::Context;
use async_openai::config::OpenAIConfig;
use avatar_chat::{
    config::{Config, RetrievalConfig},
    console::{StdinInput, TerminalRenderer},
    orchestrator::Orchestrator,
};
use avatar_core::{
    prompt::PromptComposer,
    reply::ReplyDecoder,
    retrieval::{
        RetrievalClient,
        pinecone::{OpenAIEmbedder, PINECONE_CONTROL_URL, PineconeStore},
    },
};
use openai_realtime::RealtimeClient;
use std::sync::Arc;
use tracing::{error, info};

/// Waits for `Ctrl+C`. If the handler cannot be installed, waits forever.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal. Shutting down gracefully...");
}

async fn build_retrieval(
    retrieval: &RetrievalConfig,
    openai_api_key: &str,
) -> anyhow::Result<RetrievalClient> {
    let openai_config = OpenAIConfig::new().with_api_key(openai_api_key);
    let embedder = Arc::new(OpenAIEmbedder::new(
        openai_config,
        retrieval.embedding_model.clone(),
    ));

    let host = match &retrieval.index_host {
        Some(host) => host.clone(),
        None => PineconeStore::describe_index_host(
            PINECONE_CONTROL_URL,
            &retrieval.pinecone_api_key,
            &retrieval.index_name,
        )
        .await
        .context("Failed to resolve the vector index host")?,
    };
    let store = PineconeStore::new(&host, retrieval.pinecone_api_key.clone(), embedder);
    info!(index = %retrieval.index_name, host = %store.host(), "Retrieval augmentation enabled.");

    Ok(RetrievalClient::new(Arc::new(store), retrieval.timeout))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    // Logs go to stderr; stdout carries the conversation.
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .init();
    info!("Configuration loaded. Connecting...");

    // --- 3. Open the Realtime Session ---
    let session = RealtimeClient::new(config.openai_api_key.clone())
        .with_url(config.realtime_url.clone())
        .with_model(config.realtime_model.clone())
        .with_connect_timeout(config.connect_timeout)
        .connect()
        .await
        .context("Failed to connect to the realtime endpoint")?;

    // --- 4. Assemble the Orchestrator ---
    let composer = PromptComposer::new(
        config.persona.clone(),
        config.temperature,
        config.contract_placement,
    );
    let mut orchestrator = Orchestrator::new(
        session,
        composer,
        StdinInput::new(),
        TerminalRenderer::stdout(config.render_format),
    )
    .with_greeting(config.greeting.clone())
    .with_decoder(ReplyDecoder::new(config.decode_policy));

    if let Some(retrieval) = &config.retrieval {
        let client = build_retrieval(retrieval, &config.openai_api_key).await?;
        orchestrator = orchestrator.with_retrieval(client);
    }

    // --- 5. Run Until End of Input or Interrupt ---
    tokio::select! {
        result = orchestrator.run() => {
            let summary = result.context("Conversation ended with an error")?;
            info!(
                completed = summary.turns_completed,
                failed = summary.turns_failed,
                failure_events = summary.failure_events,
                "Conversation finished."
            );
        }
        _ = shutdown_signal() => {
            orchestrator
                .shutdown()
                .await
                .context("Failed to close the realtime session")?;
        }
    }

    Ok(())
}
