use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use gallery_bot::bot::MessageHandler;
use gallery_bot::config::{AppConfig, SWEEP_INTERVAL_SECS};
use gallery_bot::localization::LocalizationManager;
use gallery_bot::publisher::GitHubPublisher;
use gallery_bot::store::{ConversationStore, InMemoryConversationStore};
use gallery_bot::web::{router, AppState};
use gallery_bot::whatsapp::WhatsAppClient;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    info!("Starting WhatsApp Gallery Bot");

    // Load environment variables from .env file
    dotenv::dotenv().ok();
    let config = AppConfig::from_env()?;

    info!(
        port = config.port,
        github_repo = %format!("{}/{}", config.github_owner, config.github_repo),
        conversation_ttl_secs = config.conversation_ttl_secs,
        "configuration loaded"
    );

    let store: Arc<dyn ConversationStore> = Arc::new(InMemoryConversationStore::new());
    let gateway = Arc::new(WhatsAppClient::new(
        config.whatsapp_token.clone(),
        config.phone_number_id.clone(),
    ));
    let publisher = Arc::new(GitHubPublisher::new(
        config.github_token.clone(),
        config.github_owner.clone(),
        config.github_repo.clone(),
        config.github_branch.clone(),
    ));
    let localizer = Arc::new(LocalizationManager::new()?);

    let handler = MessageHandler::new(Arc::clone(&store), gateway, publisher, localizer);

    // Abandoned conversations would otherwise accumulate forever; sweep
    // idle records on an interval.
    let ttl_secs = config.conversation_ttl_secs;
    let sweep_store = Arc::clone(&store);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(SWEEP_INTERVAL_SECS));
        loop {
            interval.tick().await;
            let evicted = sweep_store.evict_idle(ttl_secs).await;
            if evicted > 0 {
                info!(evicted, "evicted idle conversations");
            } else {
                debug!("eviction sweep found no idle conversations");
            }
        }
    });

    let state = Arc::new(AppState {
        handler,
        verify_token: config.verify_token.clone(),
    });

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "server listening");
    axum::serve(listener, router(state)).await?;

    Ok(())
}
