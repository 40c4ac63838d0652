//! Departure ranking: the bounded top-N list of upcoming trips per
//! direction for a rider location.
//!
//! The full pass runs on every trigger (rider moved, feed refreshed,
//! scheduled timeout). Each pass is pure in its inputs, so two calls with
//! identical snapshots produce identical output; callers resolve races
//! between overlapping passes by keeping only the latest result.
//!
//! ## Algorithm
//!
//! 1. Collect nearby stops (fixed radius, widening to the N nearest in
//!    sparse areas) and look up a walking route to each
//! 2. Collect candidate routes via those stops and classify each route's
//!    direction against a fixed landmark
//! 3. Merge each route's scheduled trips with the live overlay, live
//!    entries taking over their scheduled counterparts
//! 4. Drop trips the rider cannot reach, then keep each direction's
//!    working list sorted and bounded by binary-search insertion
//! 5. Truncate to the display cap under the configured live-priority
//!    policy

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, NaiveDateTime};
use geo::Point;

use crate::identifiers::*;
use crate::models::feed::{LiveTransitFeed, TransitFeed};
use crate::models::types::*;
use crate::schedule::resolve_visit_times;
use crate::spatial::geometry::haversine_distance;
use crate::travel::{TravelMode, TravelRoute, TravelRouteProvider};

// ============================================================================
// Configuration
// ============================================================================

/// Which way a route runs relative to the configured landmark.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    TowardLandmark,
    TowardCity,
}

/// How live-tracked trips are prioritized when truncating to the display
/// cap. Both policies keep each side time-ascending.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LivePriorityPolicy {
    /// Live trips first: with enough live trips the display is live-only,
    /// otherwise the earliest scheduled trips fill the remaining slots.
    #[default]
    LivePreferred,
    /// Pure time order, live or not.
    ByDeparture,
}

#[derive(Clone, Debug)]
pub struct RankerConfig {
    /// Fixed reference the two directions are classified against.
    pub landmark: Point,
    /// Radius of the nearby-stop search, meters.
    pub nearby_radius_m: f64,
    /// How many nearest stops to take when the radius catches at most one.
    pub nearby_fallback: usize,
    /// Safety margin between walking arrival and departure. A departure
    /// exactly at arrival plus margin is still reachable.
    pub reachability_margin: Duration,
    pub working_cap: usize,
    pub display_cap: usize,
    /// Bounds on the recomputation interval.
    pub min_refresh: StdDuration,
    pub max_refresh: StdDuration,
    pub policy: LivePriorityPolicy,
    pub travel_mode: TravelMode,
}

impl RankerConfig {
    pub fn new(landmark: Point) -> Self {
        Self {
            landmark,
            nearby_radius_m: 500.0,
            nearby_fallback: 5,
            reachability_margin: Duration::seconds(300),
            working_cap: 10,
            display_cap: 4,
            min_refresh: StdDuration::from_secs(10),
            max_refresh: StdDuration::from_secs(60),
            policy: LivePriorityPolicy::default(),
            travel_mode: TravelMode::Foot,
        }
    }
}

// ============================================================================
// Output
// ============================================================================

/// One ranked departure: the trip, where to board it, and when it leaves.
#[derive(Clone, Debug)]
pub struct RankedTrip {
    pub trip: ScheduledOrLive,
    pub route_id: RouteId,
    pub boarding_stop: StopId,
    pub departure: NaiveDateTime,
    /// Walking distance to the boarding stop, meters. Road-network when
    /// the provider answered, straight-line otherwise.
    pub walk_distance: f64,
    /// Walking duration in seconds, when the provider knew it.
    pub walk_duration: Option<f64>,
    pub direction: Direction,
}

impl RankedTrip {
    pub fn is_live(&self) -> bool {
        self.trip.is_live()
    }
}

/// The result of one full ranking pass.
#[derive(Clone, Debug, Default)]
pub struct RankedDepartures {
    /// Time-ascending per the live-priority policy; at most `display_cap`.
    pub toward_landmark: Vec<RankedTrip>,
    pub toward_city: Vec<RankedTrip>,
    /// When the caller should rerun the pass, bounded so imminent
    /// departures refresh quickly without churning on far-off ones.
    pub next_refresh: StdDuration,
}

impl RankedDepartures {
    pub fn direction(&self, direction: Direction) -> &[RankedTrip] {
        match direction {
            Direction::TowardLandmark => &self.toward_landmark,
            Direction::TowardCity => &self.toward_city,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.toward_landmark.is_empty() && self.toward_city.is_empty()
    }
}

// ============================================================================
// Ranking pass
// ============================================================================

struct Walk {
    distance: f64,
    duration: Option<f64>,
    arrival: NaiveDateTime,
}

/// Rank the upcoming departures around `rider`.
///
/// Degrades per trip, never fails the pass: a trip with a missing stop, a
/// route with no usable geometry, or a failed walking-route lookup is
/// skipped or approximated, and either returned list may be empty.
pub async fn rank_next_departures(
    rider: Point,
    feed: &TransitFeed,
    live: &LiveTransitFeed,
    provider: &dyn TravelRouteProvider,
    config: &RankerConfig,
    now: NaiveDateTime,
) -> RankedDepartures {
    let nearby = feed.nearby_stops(rider, config.nearby_radius_m, config.nearby_fallback);

    // Walking route per nearby stop, straight-line when the lookup fails
    let mut walks: HashMap<StopId, Walk> = HashMap::new();
    for (stop, _) in &nearby {
        let route = match provider.route(rider, stop.location, config.travel_mode).await {
            Ok(r) => r,
            Err(_) => TravelRoute::direct(rider, stop.location),
        };
        let arrival = match route.duration {
            Some(secs) => now + Duration::milliseconds((secs * 1000.0) as i64),
            None => now,
        };
        walks.insert(
            stop.id.clone(),
            Walk {
                distance: route.distance,
                duration: route.duration,
                arrival,
            },
        );
    }

    // Candidate routes in feed order, deduplicated
    let mut route_ids: Vec<RouteId> = Vec::new();
    for (stop, _) in &nearby {
        for route_id in feed.routes_via(&stop.id) {
            if !route_ids.contains(route_id) {
                route_ids.push(route_id.clone());
            }
        }
    }

    let mut toward_landmark: Vec<RankedTrip> = Vec::new();
    let mut toward_city: Vec<RankedTrip> = Vec::new();
    let mut seen_trips: HashSet<TripId> = HashSet::new();

    for route_id in &route_ids {
        let Some(route) = feed.route(route_id) else {
            continue;
        };
        let Some(direction) = classify_direction(route, feed, config.landmark) else {
            continue;
        };

        let mut consider = |candidate: ScheduledOrLive,
                            toward_landmark: &mut Vec<RankedTrip>,
                            toward_city: &mut Vec<RankedTrip>| {
            if !seen_trips.insert(candidate.trip_id().clone()) {
                return;
            }
            let Some(ranked) = rank_candidate(&candidate, route, &walks, config, now, direction)
            else {
                return;
            };
            let list = match direction {
                Direction::TowardLandmark => toward_landmark,
                Direction::TowardCity => toward_city,
            };
            insert_bounded(list, ranked, config.working_cap);
        };

        // Scheduled trips, each replaced by its live counterpart when the
        // overlay has one
        for trip in &route.trips {
            let candidate = match live.trip(&trip.id) {
                Some(live_trip) => ScheduledOrLive::Live(live_trip.clone()),
                None => ScheduledOrLive::Scheduled(trip.clone()),
            };
            consider(candidate, &mut toward_landmark, &mut toward_city);
        }

        // Live trips on the route with no scheduled counterpart
        for live_trip in live.trips_on_route(route_id) {
            consider(
                ScheduledOrLive::Live(live_trip.clone()),
                &mut toward_landmark,
                &mut toward_city,
            );
        }
    }

    let toward_landmark = apply_policy(toward_landmark, config.policy, config.display_cap);
    let toward_city = apply_policy(toward_city, config.policy, config.display_cap);

    let next_refresh = next_refresh_after(&toward_landmark, &toward_city, config, now);

    RankedDepartures {
        toward_landmark,
        toward_city,
        next_refresh,
    }
}

/// Which way the route runs: the shape endpoint closer to the landmark is
/// the route's destination side. Falls back to the route-level stop order
/// when the shape is degenerate; `None` when neither gives two endpoints.
fn classify_direction(route: &Route, feed: &TransitFeed, landmark: Point) -> Option<Direction> {
    let (first, last) = route_endpoints(route, feed)?;
    if haversine_distance(last, landmark) < haversine_distance(first, landmark) {
        Some(Direction::TowardLandmark)
    } else {
        Some(Direction::TowardCity)
    }
}

fn route_endpoints(route: &Route, feed: &TransitFeed) -> Option<(Point, Point)> {
    let shape = &route.shape.0;
    if shape.len() >= 2 {
        return Some((Point::from(shape[0]), Point::from(shape[shape.len() - 1])));
    }
    let first = feed.stop(route.stop_ids.first()?)?.location;
    let last = feed.stop(route.stop_ids.last()?)?.location;
    if route.stop_ids.len() >= 2 {
        Some((first, last))
    } else {
        None
    }
}

/// Resolve one candidate trip to a ranked entry, or `None` when the rider
/// cannot reach any of its nearby boarding stops in time.
fn rank_candidate(
    candidate: &ScheduledOrLive,
    route: &Arc<Route>,
    walks: &HashMap<StopId, Walk>,
    config: &RankerConfig,
    now: NaiveDateTime,
    direction: Direction,
) -> Option<RankedTrip> {
    // The boarding stop is the nearest-by-travel-distance nearby stop the
    // trip actually visits
    let visited: Vec<&StopId> = match candidate {
        ScheduledOrLive::Scheduled(t) => t.visits.iter().map(|v| &v.stop_id).collect(),
        ScheduledOrLive::Live(t) => t.visits.iter().map(|v| &v.stop_id).collect(),
    };
    let boarding = visited
        .iter()
        .filter_map(|id| walks.get(id).map(|w| (*id, w)))
        .min_by(|a, b| a.1.distance.total_cmp(&b.1.distance))?;
    let (stop_id, walk) = boarding;

    let departure = match candidate {
        ScheduledOrLive::Scheduled(trip) => {
            let resolved = resolve_visit_times(trip, now);
            resolved
                .iter()
                .filter(|(i, _)| &trip.visits[*i].stop_id == stop_id)
                .map(|&(_, t)| if t < now { t + Duration::days(1) } else { t })
                .min()?
        }
        ScheduledOrLive::Live(trip) => trip
            .visits
            .iter()
            .filter(|v| &v.stop_id == stop_id)
            .map(|v| v.time)
            .filter(|&t| t >= now)
            .min()?,
    };

    // Unreachable if it leaves before the walker plus the safety margin
    if departure < walk.arrival + config.reachability_margin {
        return None;
    }

    Some(RankedTrip {
        trip: candidate.clone(),
        route_id: route.id.clone(),
        boarding_stop: stop_id.clone(),
        departure,
        walk_distance: walk.distance,
        walk_duration: walk.duration,
        direction,
    })
}

/// Insert keeping the list time-ascending and bounded. Once the cap is
/// reached, entries later than the current worst are rejected without a
/// search.
fn insert_bounded(list: &mut Vec<RankedTrip>, entry: RankedTrip, cap: usize) {
    if cap == 0 {
        return;
    }
    if list.len() >= cap {
        match list.last() {
            Some(last) if entry.departure >= last.departure => return,
            _ => {}
        }
    }
    let idx = list.partition_point(|e| e.departure <= entry.departure);
    list.insert(idx, entry);
    list.truncate(cap);
}

fn apply_policy(
    working: Vec<RankedTrip>,
    policy: LivePriorityPolicy,
    cap: usize,
) -> Vec<RankedTrip> {
    match policy {
        LivePriorityPolicy::ByDeparture => working.into_iter().take(cap).collect(),
        LivePriorityPolicy::LivePreferred => {
            let (live, scheduled): (Vec<_>, Vec<_>) =
                working.into_iter().partition(RankedTrip::is_live);
            let mut out: Vec<RankedTrip> = live.into_iter().take(cap).collect();
            let remaining = cap.saturating_sub(out.len());
            out.extend(scheduled.into_iter().take(remaining));
            out
        }
    }
}

fn next_refresh_after(
    toward_landmark: &[RankedTrip],
    toward_city: &[RankedTrip],
    config: &RankerConfig,
    now: NaiveDateTime,
) -> StdDuration {
    let earliest = toward_landmark
        .iter()
        .chain(toward_city)
        .map(|t| t.departure)
        .min();
    let Some(earliest) = earliest else {
        return config.max_refresh;
    };
    let until = (earliest - now).to_std().unwrap_or(StdDuration::ZERO);
    until.clamp(config.min_refresh, config.max_refresh)
}
