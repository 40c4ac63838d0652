//! In-memory feed containers with lookup maps and spatial indices.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDateTime;
use geo::Point;
use rstar::RTree;

use crate::identifiers::*;
use crate::models::types::*;
use crate::spatial::geometry::{haversine_distance, meters_to_degrees_approx};
use crate::spatial::index::StopNode;

// ============================================================================
// Static Feed
// ============================================================================

/// The compiled static feed: stops, routes, trips, and the indices needed
/// to answer nearby-stop and lookup queries.
///
/// This type is cheap to clone since all data is stored in `Arc`s.
#[derive(Clone, Debug)]
pub struct TransitFeed {
    pub id: FeedId,
    pub version: Arc<str>,

    stops: Vec<Arc<Stop>>,
    routes: Vec<Arc<Route>>,

    // Lookup maps
    stop_map: HashMap<StopId, Arc<Stop>>,
    route_map: HashMap<RouteId, Arc<Route>>,
    trip_map: HashMap<TripId, Arc<Trip>>,
    routes_by_stop: HashMap<StopId, Vec<RouteId>>,

    // Spatial index
    stop_tree: RTree<StopNode>,
}

impl TransitFeed {
    /// Build a feed from raw data, constructing all lookup maps and the
    /// stop R-tree up front.
    pub fn from_data(
        id: FeedId,
        stops: Vec<Stop>,
        routes: Vec<Route>,
        version: impl Into<Arc<str>>,
    ) -> Self {
        let stops: Vec<Arc<Stop>> = stops.into_iter().map(Arc::new).collect();
        let routes: Vec<Arc<Route>> = routes.into_iter().map(Arc::new).collect();

        let stop_map: HashMap<_, _> = stops.iter().map(|s| (s.id.clone(), s.clone())).collect();
        let route_map: HashMap<_, _> = routes.iter().map(|r| (r.id.clone(), r.clone())).collect();

        let mut trip_map = HashMap::new();
        let mut routes_by_stop: HashMap<StopId, Vec<RouteId>> = HashMap::new();
        for route in &routes {
            for trip in &route.trips {
                trip_map.insert(trip.id.clone(), trip.clone());
            }
            for stop_id in &route.stop_ids {
                let entries = routes_by_stop.entry(stop_id.clone()).or_default();
                if !entries.contains(&route.id) {
                    entries.push(route.id.clone());
                }
            }
        }

        let stop_tree = RTree::bulk_load(stops.iter().map(|s| StopNode::new(s.clone())).collect());

        Self {
            id,
            version: version.into(),
            stops,
            routes,
            stop_map,
            route_map,
            trip_map,
            routes_by_stop,
            stop_tree,
        }
    }

    pub fn stop(&self, id: &StopId) -> Option<&Arc<Stop>> {
        self.stop_map.get(id)
    }

    pub fn route(&self, id: &RouteId) -> Option<&Arc<Route>> {
        self.route_map.get(id)
    }

    pub fn trip(&self, id: &TripId) -> Option<&Arc<Trip>> {
        self.trip_map.get(id)
    }

    pub fn stops(&self) -> &[Arc<Stop>] {
        &self.stops
    }

    pub fn routes(&self) -> &[Arc<Route>] {
        &self.routes
    }

    /// Route ids serving a stop, in feed order.
    pub fn routes_via(&self, stop_id: &StopId) -> &[RouteId] {
        self.routes_by_stop
            .get(stop_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Stops within `radius_m` meters of `point`, with their distances,
    /// nearest first.
    pub fn stops_within(&self, point: Point, radius_m: f64) -> Vec<(Arc<Stop>, f64)> {
        if radius_m <= 0.0 || !radius_m.is_finite() {
            return Vec::new();
        }

        // Coarse R-tree cut in squared degrees, exact Haversine after
        let radius_deg = meters_to_degrees_approx(radius_m) * 1.5;
        let mut found: Vec<(Arc<Stop>, f64)> = self
            .stop_tree
            .locate_within_distance([point.x(), point.y()], radius_deg * radius_deg)
            .filter_map(|node| {
                let dist = haversine_distance(point, node.location());
                (dist <= radius_m).then(|| (node.stop.clone(), dist))
            })
            .collect();
        found.sort_by(|a, b| a.1.total_cmp(&b.1));
        found
    }

    /// The `n` stops nearest to `point`, with their distances.
    pub fn nearest_stops(&self, point: Point, n: usize) -> Vec<(Arc<Stop>, f64)> {
        self.stop_tree
            .nearest_neighbor_iter(&[point.x(), point.y()])
            .take(n)
            .map(|node| {
                let dist = haversine_distance(point, node.location());
                (node.stop.clone(), dist)
            })
            .collect()
    }

    /// Stops to consider for departure ranking: everything within
    /// `radius_m`, widening to the `fallback_n` nearest when the radius
    /// catches one stop or none. Sparse areas always get candidates.
    pub fn nearby_stops(&self, point: Point, radius_m: f64, fallback_n: usize) -> Vec<(Arc<Stop>, f64)> {
        let within = self.stops_within(point, radius_m);
        if within.len() <= 1 {
            self.nearest_stops(point, fallback_n)
        } else {
            within
        }
    }
}

// ============================================================================
// Live Feed
// ============================================================================

/// A snapshot of the realtime overlay: live trips keyed by the scheduled
/// trip they correspond to, and the vehicles serving them.
#[derive(Clone, Debug, Default)]
pub struct LiveTransitFeed {
    trips: Vec<Arc<LiveTrip>>,
    trip_map: HashMap<TripId, Arc<LiveTrip>>,
    trips_by_route: HashMap<RouteId, Vec<Arc<LiveTrip>>>,
    vehicle_map: HashMap<VehicleId, Arc<Vehicle>>,
    pub timestamp: Option<NaiveDateTime>,
}

impl LiveTransitFeed {
    pub fn from_data(
        trips: Vec<LiveTrip>,
        vehicles: Vec<Vehicle>,
        timestamp: Option<NaiveDateTime>,
    ) -> Self {
        let trips: Vec<Arc<LiveTrip>> = trips.into_iter().map(Arc::new).collect();

        let trip_map: HashMap<_, _> = trips.iter().map(|t| (t.id.clone(), t.clone())).collect();

        let mut trips_by_route: HashMap<RouteId, Vec<Arc<LiveTrip>>> = HashMap::new();
        for trip in &trips {
            trips_by_route
                .entry(trip.route_id.clone())
                .or_default()
                .push(trip.clone());
        }

        let vehicle_map: HashMap<_, _> = vehicles
            .into_iter()
            .map(Arc::new)
            .map(|v| (v.id.clone(), v))
            .collect();

        Self {
            trips,
            trip_map,
            trips_by_route,
            vehicle_map,
            timestamp,
        }
    }

    pub fn trips(&self) -> &[Arc<LiveTrip>] {
        &self.trips
    }

    pub fn trip(&self, id: &TripId) -> Option<&Arc<LiveTrip>> {
        self.trip_map.get(id)
    }

    pub fn trips_on_route(&self, route_id: &RouteId) -> &[Arc<LiveTrip>] {
        self.trips_by_route
            .get(route_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn vehicle(&self, id: &VehicleId) -> Option<&Arc<Vehicle>> {
        self.vehicle_map.get(id)
    }

    /// The vehicle serving a live trip, if both sides of the join exist.
    pub fn vehicle_for_trip(&self, trip_id: &TripId) -> Option<&Arc<Vehicle>> {
        let trip = self.trip_map.get(trip_id)?;
        self.vehicle_map.get(&trip.vehicle_id)
    }
}
