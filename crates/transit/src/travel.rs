//! Pluggable walking-route lookup.
//!
//! External crates implement [`TravelRouteProvider`] to supply road-network
//! routes from the rider to a stop. The ranker degrades gracefully when a
//! lookup fails, so implementations should return errors rather than panic.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

use geo::{LineString, Point};

use crate::models::types::{Result, TransitError};
use crate::spatial::geometry::haversine_distance;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TravelMode {
    Foot,
    Bicycle,
    Car,
}

/// A resolved route from an origin to a destination.
#[derive(Clone, Debug)]
pub struct TravelRoute {
    /// Road-network distance in meters.
    pub distance: f64,
    /// Expected travel duration in seconds, when the provider knows it.
    pub duration: Option<f64>,
    pub geometry: Option<LineString>,
}

impl TravelRoute {
    /// A straight-line stand-in for when no road route is available.
    pub fn direct(from: Point, to: Point) -> Self {
        Self {
            distance: haversine_distance(from, to),
            duration: None,
            geometry: None,
        }
    }
}

/// Fetch a travel route between two points.
pub trait TravelRouteProvider: Send + Sync {
    fn route<'a>(
        &'a self,
        from: Point,
        to: Point,
        mode: TravelMode,
    ) -> Pin<Box<dyn Future<Output = Result<TravelRoute>> + Send + 'a>>;
}

/// Wraps a provider with a lookup cache keyed by endpoints and mode.
///
/// Repeated ranking passes ask for the same rider-to-stop routes; stop
/// locations are fixed and the rider moves in coarse steps, so exact-key
/// caching already removes most round trips.
pub struct CachedRouteProvider<P> {
    inner: P,
    cache: Mutex<HashMap<RouteKey, TravelRoute>>,
}

#[derive(Clone, PartialEq, Eq, Hash)]
struct RouteKey {
    from: (u64, u64),
    to: (u64, u64),
    mode: TravelMode,
}

impl RouteKey {
    fn new(from: Point, to: Point, mode: TravelMode) -> Self {
        Self {
            from: (from.x().to_bits(), from.y().to_bits()),
            to: (to.x().to_bits(), to.y().to_bits()),
            mode,
        }
    }
}

impl<P: TravelRouteProvider> CachedRouteProvider<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            cache: Mutex::new(HashMap::new()),
        }
    }
}

impl<P: TravelRouteProvider> TravelRouteProvider for CachedRouteProvider<P> {
    fn route<'a>(
        &'a self,
        from: Point,
        to: Point,
        mode: TravelMode,
    ) -> Pin<Box<dyn Future<Output = Result<TravelRoute>> + Send + 'a>> {
        Box::pin(async move {
            let key = RouteKey::new(from, to, mode);
            if let Ok(cache) = self.cache.lock() {
                if let Some(hit) = cache.get(&key) {
                    return Ok(hit.clone());
                }
            }
            let route = self.inner.route(from, to, mode).await?;
            if let Ok(mut cache) = self.cache.lock() {
                cache.insert(key, route.clone());
            }
            Ok(route)
        })
    }
}

/// Provider that always fails. Useful where ranking must run with no
/// routing backend configured; callers fall back to straight-line
/// distances.
pub struct NoRouteProvider;

impl TravelRouteProvider for NoRouteProvider {
    fn route<'a>(
        &'a self,
        _from: Point,
        _to: Point,
        _mode: TravelMode,
    ) -> Pin<Box<dyn Future<Output = Result<TravelRoute>> + Send + 'a>> {
        Box::pin(async { Err(TransitError::RouteLookup("no provider configured".into())) })
    }
}
