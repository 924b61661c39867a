pub mod discord;
pub mod iracing;
pub mod jobs;
pub mod reports;
pub mod state;

pub use iracing::{IracingClient, IracingError};
pub use state::AppState;
