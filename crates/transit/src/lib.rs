//! # skylink-transit
//!
//! Trip position and shape-splitting engine for live transit tracking.
//!
//! ## Features
//!
//! - **Departure ranking**: bounded top-N upcoming departures per direction,
//!   merging scheduled trips with live-tracked ones
//! - **Spatial queries**: fast R-tree based stop lookup
//! - **Schedule resolution**: GTFS-style times past 24:00 and trips that
//!   cross midnight
//! - **Position estimation**: schedule-and-shape interpolation for vehicles
//!   without a live fix
//! - **Shape splitting**: partition a route polyline and stop list into
//!   traversed and upcoming halves around the vehicle
//!
//! ## Example
//!
//! ```
//! use skylink_transit::prelude::*;
//! use geo::{line_string, Point};
//!
//! let stop = Stop {
//!     id: StopId::new("central"),
//!     name: [("en".to_string(), "Central".to_string())].into(),
//!     location: Point::new(77.60, 13.02),
//!     zone: None,
//! };
//!
//! let route = Route {
//!     id: RouteId::new("10A"),
//!     short_name: "10A".into(),
//!     long_name: "Central - Terminal".into(),
//!     stop_ids: vec![StopId::new("central")],
//!     shape: line_string![(x: 77.60, y: 13.02), (x: 77.71, y: 13.20)],
//!     trips: vec![],
//! };
//!
//! let feed = TransitFeed::from_data(FeedId::new("bmtc"), vec![stop], vec![route], "v1");
//!
//! let rider = Point::new(77.601, 13.021);
//! let nearby = feed.stops_within(rider, 500.0);
//! assert_eq!(nearby.len(), 1);
//! ```

pub mod identifiers;
pub mod models;
pub mod position;
pub mod ranker;
pub mod schedule;
pub mod spatial;
pub mod split;
pub mod travel;

// Re-exports for convenience
pub mod prelude {
    pub use crate::identifiers::*;
    pub use crate::models::feed::{LiveTransitFeed, TransitFeed};
    pub use crate::models::types::*;
    pub use crate::position::{estimate_position, live_position, timed_stops, TimedStop};
    pub use crate::ranker::{
        rank_next_departures, Direction, LivePriorityPolicy, RankedDepartures, RankedTrip,
        RankerConfig,
    };
    pub use crate::schedule::{resolve_visit_times, ServiceTime};
    pub use crate::split::{split_trip, TripSplit};
    pub use crate::travel::{TravelMode, TravelRoute, TravelRouteProvider};
}

pub use prelude::*;
