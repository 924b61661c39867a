//! Shared application state.
//!
//! One explicitly owned context object passed into every handler; the
//! pending-quote store is the only in-memory mutable structure and sits
//! behind a real mutex because serenity dispatches handlers concurrently.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::Mutex;
use tracing::warn;

use paddock_core::{Config, PendingQuotes};
use paddock_db::DbPool;

use crate::iracing::IracingClient;

pub struct AppState {
    pub config: Config,
    pub db: DbPool,
    /// Absent when no iRacing credentials are configured; stats commands
    /// still work off the cache, the fill job stays idle.
    pub iracing: Option<IracingClient>,
    /// Pending quote nominations, persisted on every mutation.
    pub pending_quotes: Mutex<PendingQuotes>,
    bot_user_id: AtomicU64,
}

impl AppState {
    pub fn new(
        config: Config,
        db: DbPool,
        iracing: Option<IracingClient>,
        pending_quotes: PendingQuotes,
    ) -> Self {
        Self {
            config,
            db,
            iracing,
            pending_quotes: Mutex::new(pending_quotes),
            bot_user_id: AtomicU64::new(0),
        }
    }

    pub fn pool(&self) -> &sqlx::SqlitePool {
        self.db.pool()
    }

    /// Record our own user id once the gateway session is ready.
    pub fn set_bot_user_id(&self, id: u64) {
        self.bot_user_id.store(id, Ordering::Relaxed);
    }

    pub fn bot_user_id(&self) -> Option<u64> {
        match self.bot_user_id.load(Ordering::Relaxed) {
            0 => None,
            id => Some(id),
        }
    }

    /// Write the pending-quote store to disk, logging instead of failing:
    /// an unsaved vote flag is recoverable, a dead handler is not.
    pub async fn persist_pending_quotes(&self) {
        let pending = self.pending_quotes.lock().await;
        if let Err(e) = pending.save() {
            warn!("Failed to persist pending quotes: {}", e);
        }
    }
}
