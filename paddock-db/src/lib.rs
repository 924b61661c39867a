//! paddock-db: SQLite persistence for the paddock league bot.
//!
//! This crate provides database operations for:
//! - League member records
//! - The cached subsession (race result) store
//! - Series metadata used by autocomplete and aggregation filters
//! - Committed quotes and special events

pub mod db;
pub mod error;
pub mod members;
pub mod quotes;
pub mod results;
pub mod series;
pub mod specials;

// Re-export commonly used types
pub use db::DbPool;
pub use error::{DbError, DbResult};
pub use members::{Member, MemberRepository};
pub use quotes::{NewQuote, Quote, QuoteRepository};
pub use results::{DriverRace, DriverResult, ResultRepository, Subsession};
pub use series::{SeriesInfo, SeriesRepository};
pub use specials::{SpecialEvent, SpecialEventRepository};

// Re-export test helpers when running tests or when test-helpers feature is enabled
#[cfg(any(test, feature = "test-helpers"))]
pub use db::test_helpers;
