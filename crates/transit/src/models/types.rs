//! Core data types for static and live transit data.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDateTime;
use geo::{LineString, Point};

use crate::identifiers::*;
use crate::schedule::ServiceTime;

// ============================================================================
// Static feed entities
// ============================================================================

/// A boarding location. Immutable once loaded; owned by the feed.
#[derive(Clone, Debug)]
pub struct Stop {
    pub id: StopId,
    /// Language key (e.g. "en") to display name.
    pub name: HashMap<String, String>,
    pub location: Point,
    pub zone: Option<Arc<str>>,
}

impl Stop {
    /// Display name for a language, falling back to any available name.
    pub fn name_for(&self, lang: &str) -> Option<&str> {
        self.name
            .get(lang)
            .or_else(|| self.name.values().next())
            .map(String::as_str)
    }
}

/// A one-direction visit schedule entry within a trip.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StopVisit {
    pub stop_id: StopId,
    /// Wall-clock time of day; hours may exceed 24 for overnight
    /// continuations of the same service day.
    pub time: ServiceTime,
}

/// A scheduled vehicle run: an ordered sequence of stop visits.
#[derive(Clone, Debug)]
pub struct Trip {
    pub id: TripId,
    pub route_id: RouteId,
    pub visits: Vec<StopVisit>,
}

/// A fixed line through an ordered set of stops, with the canonical
/// polyline both directions reference.
#[derive(Clone, Debug)]
pub struct Route {
    pub id: RouteId,
    pub short_name: Arc<str>,
    pub long_name: Arc<str>,
    /// Route-level stop order, not any specific trip's order.
    pub stop_ids: Vec<StopId>,
    pub shape: LineString,
    pub trips: Vec<Arc<Trip>>,
}

// ============================================================================
// Live feed entities
// ============================================================================

/// A stop visit whose time the live feed has already resolved to an
/// absolute timestamp ("today").
#[derive(Clone, Debug, PartialEq)]
pub struct LiveStopVisit {
    pub stop_id: StopId,
    pub time: NaiveDateTime,
}

/// A live-tracked run. Shares a trip id with the scheduled [`Trip`] it
/// corresponds to; when present it is authoritative for position and
/// stop-time corrections.
#[derive(Clone, Debug)]
pub struct LiveTrip {
    pub id: TripId,
    pub vehicle_id: VehicleId,
    pub route_id: RouteId,
    pub visits: Vec<LiveStopVisit>,
    pub timestamp: NaiveDateTime,
}

/// One GPS fix from a vehicle's reported history.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VehicleFix {
    pub location: Point,
    pub bearing: f64,
    pub timestamp: NaiveDateTime,
}

#[derive(Clone, Debug)]
pub struct Vehicle {
    pub id: VehicleId,
    pub registration: Arc<str>,
    pub trip_id: TripId,
    pub route_id: RouteId,
    pub location: Point,
    pub bearing: f64,
    pub speed: f64,
    pub next_stop_id: Option<StopId>,
    /// Bounded fix history, oldest first. The basis for live interpolation.
    pub previous_locations: Vec<VehicleFix>,
    pub timestamp: NaiveDateTime,
}

impl Vehicle {
    /// The most recent fix, falling back to the vehicle's current report.
    pub fn latest_fix(&self) -> VehicleFix {
        self.previous_locations
            .last()
            .copied()
            .unwrap_or(VehicleFix {
                location: self.location,
                bearing: self.bearing,
                timestamp: self.timestamp,
            })
    }
}

// ============================================================================
// Tagged scheduled/live union
// ============================================================================

/// A candidate run, tagged once at ingestion so downstream code never
/// sniffs for the presence of a vehicle id.
#[derive(Clone, Debug)]
pub enum ScheduledOrLive {
    Scheduled(Arc<Trip>),
    Live(Arc<LiveTrip>),
}

impl ScheduledOrLive {
    pub fn trip_id(&self) -> &TripId {
        match self {
            ScheduledOrLive::Scheduled(t) => &t.id,
            ScheduledOrLive::Live(t) => &t.id,
        }
    }

    pub fn route_id(&self) -> &RouteId {
        match self {
            ScheduledOrLive::Scheduled(t) => &t.route_id,
            ScheduledOrLive::Live(t) => &t.route_id,
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, ScheduledOrLive::Live(_))
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum TransitError {
    /// A route's shape is empty or missing; fatal to position and split
    /// computation for that trip only.
    #[error("route {0} has no shape geometry")]
    EmptyShape(RouteId),

    #[error("invalid stop time {0:?}")]
    InvalidTime(String),

    #[error("travel route lookup failed: {0}")]
    RouteLookup(String),

    #[error("invalid data: {0}")]
    InvalidData(String),
}

pub type Result<T> = std::result::Result<T, TransitError>;
