//! paddock-core: domain logic for the paddock league bot.
//!
//! Pure statistics reductions over cached race results, the quote-vote
//! state machine, season parsing, and configuration. No chat or database
//! types leak in here; the gateway adapts both sides.

pub mod config;
pub mod pending_quotes;
pub mod quotes;
pub mod season;
pub mod stats;

pub use config::{Config, ConfigError, ReactionRole, Settings, load_dotenv};
pub use pending_quotes::{PendingQuoteError, PendingQuotes};
pub use quotes::{
    COMMAND_PREFIX, Nomination, NominationRejection, VoteUpdate, format_quote, validate_nomination,
};
pub use season::{FIRST_SEASON_YEAR, Season, SeasonError};
pub use stats::{
    CompassPoint, CpiCurve, CpiSample, DriverTotals, RaceSample, StatsError, best_n_total,
    compass_points, head_to_head, project_final, weekly_best_points,
};
