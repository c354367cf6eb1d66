mod config;
mod conversation;
mod errors;
mod llm_client;
mod profile;
mod questions;
mod routes;
mod state;
mod storage;
mod validation;

use anyhow::Result;
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use std::sync::Arc;

use crate::config::Config;
use crate::conversation::machine::ConversationStateMachine;
use crate::conversation::store::SessionStore;
use crate::llm_client::LlmClient;
use crate::questions::generator::QuestionGenerator;
use crate::questions::scoring::{AnswerScorer, HeuristicScorer, LlmAnswerScorer};
use crate::routes::build_router;
use crate::state::AppState;
use crate::storage::JsonlProfileStore;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting TalentScout v{}", env!("CARGO_PKG_VERSION"));

    // Initialize LLM client
    let llm = Arc::new(LlmClient::new(
        config.llm_endpoint.clone(),
        config.llm_model.clone(),
        config.llm_api_key.clone(),
    ));
    if config.llm_api_key.is_none() {
        warn!("LLM_API_KEY is not set; all questions will come from the fallback bank");
    }
    info!("LLM client initialized (model: {})", llm.model());

    let generator = QuestionGenerator::new(
        llm.clone(),
        config.question_mix,
        config.generation_timeout,
    );
    info!(
        "Question mix per technology: {} easy, {} medium, {} hard (timeout {:?})",
        config.question_mix.easy,
        config.question_mix.medium,
        config.question_mix.hard,
        config.generation_timeout
    );

    // Answer scorer (HeuristicScorer by default; swap via ENABLE_LLM_SCORING)
    let scorer: Arc<dyn AnswerScorer> = if config.enable_llm_scoring {
        info!("Answer scoring: LLM with heuristic fallback");
        Arc::new(LlmAnswerScorer::new(llm.clone(), config.generation_timeout))
    } else {
        info!("Answer scoring: heuristic");
        Arc::new(HeuristicScorer)
    };

    let sink = Arc::new(JsonlProfileStore::new(config.data_file.clone()));
    info!("Completed profiles are appended to {}", sink.path().display());

    let machine = ConversationStateMachine::new(generator, scorer, sink, config.phone_rules);

    let state = AppState {
        machine: Arc::new(machine),
        sessions: SessionStore::default(),
        config: config.clone(),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
