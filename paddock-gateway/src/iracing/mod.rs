//! iRacing /data API integration.

mod client;
pub mod types;

pub use client::{IracingClient, IracingError};
pub use types::{
    MemberProfile, RaceGuideResponse, RaceGuideSession, RecentRace, RecentRacesResponse,
    SeriesData, SeriesSeason, SubsessionResultResponse,
};
