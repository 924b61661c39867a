use std::sync::Arc;

use tracing::{info, warn};

use paddock_gateway::discord::start_discord_bot;
use paddock_gateway::iracing::IracingClient;
use paddock_gateway::jobs::start_job_runner;
use paddock_gateway::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    // Load configuration (settings file + env secrets)
    let config = paddock_core::Config::load()?;
    info!("Configuration loaded");

    // Initialize database
    let db = paddock_db::DbPool::new().await?;

    // iRacing client is optional: without credentials the stats commands
    // keep serving the cache and the fill job stays idle.
    let iracing = match config.iracing_credentials() {
        Some((email, password)) => {
            info!("iRacing client configured for {}", email);
            Some(IracingClient::new(email, password))
        }
        None => {
            warn!("IRACING_EMAIL/IRACING_PASSWORD not set — running from cache only");
            None
        }
    };

    // Pending quote nominations survive restarts via their state file.
    let pending_quotes = paddock_core::PendingQuotes::load()?;

    let state = Arc::new(AppState::new(config, db, iracing, pending_quotes));

    let token = state.config.discord_bot_token().map(str::to_string);
    let mut client = start_discord_bot(token, Arc::clone(&state))
        .await?
        .ok_or("DISCORD_BOT_TOKEN is required")?;

    // Background jobs share the bot's HTTP handle for channel posts.
    let jobs = start_job_runner(Arc::clone(&state), Arc::clone(&client.http));

    let result = client.start().await;

    jobs.abort();
    result.map_err(Into::into)
}
