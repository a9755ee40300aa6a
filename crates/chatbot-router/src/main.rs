use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use chatbot_router::classifier;
use chatbot_router::config::Settings;
use chatbot_router::conversation::ConversationStore;
use chatbot_router::intents::IntentStore;
use chatbot_router::llm::GeminiClient;
use chatbot_router::matching::LexicalMatcher;
use chatbot_router::router::MessageRouter;
use chatbot_router::routes::build_router;
use chatbot_router::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,chatbot_router=debug")),
        )
        .with_target(true)
        .with_thread_ids(true)
        .json()
        .init();

    info!("🚀 Starting chatbot router...");

    // Load configuration
    let settings = Settings::load()?;
    info!("✅ Configuration loaded");

    // Knowledge base is required at startup
    let intents_path = settings.intents_path();
    let intents = Arc::new(
        IntentStore::open(&intents_path)
            .await
            .with_context(|| format!("Failed to load intents from {}", intents_path.display()))?,
    );
    info!(
        "✅ Loaded {} intents from {}",
        intents.snapshot().intents.len(),
        intents_path.display()
    );

    let classifier = classifier::load_optional(settings.classifier_path().as_deref()).await;

    let system_prompt = settings.system_prompt()?;
    let generator = Arc::new(GeminiClient::new(&settings.llm, system_prompt));
    info!("✅ Generative fallback configured (model={})", settings.llm.model);

    let conversations = ConversationStore::new(settings.conversation.max_turns);

    let router = MessageRouter::new(
        intents,
        LexicalMatcher::new(settings.matcher.threshold),
        generator,
        conversations,
    )
    .with_classifier(classifier, settings.classifier.confidence_floor)
    .with_permissive_fallback(settings.matcher.permissive_fallback)
    .with_context_turns(settings.conversation.context_turns);

    let app = build_router(AppState::new(router));

    // Server address
    let addr = SocketAddr::from((
        settings.server.host.parse::<std::net::IpAddr>()?,
        settings.server.port,
    ));

    info!("🎯 Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
