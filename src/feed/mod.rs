//! Input feeds: traffic counts and neighborhood rents.

mod neighborhoods;
mod traffic;
mod types;

pub use neighborhoods::parse_neighborhoods;
pub use traffic::{CountColumn, FeedSchema, TrafficFeed, read_traffic};
pub use types::{
    DayCounts, EnrichedObservation, NeighborhoodRegion, Observation, Period, PeriodCounts, SiteId,
};
