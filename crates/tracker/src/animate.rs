//! Marker interpolation between successive position estimates.
//!
//! [`Animator`] is pure state driven by explicit timestamps, so the tick
//! loop that owns it stays trivially testable: feed it fixes or estimates
//! plus an instant, ask where the marker is.

use std::time::Duration;

use geo::Point;
use tokio::time::Instant;

use skylink_transit::prelude::VehicleFix;
use skylink_transit::spatial::geometry::{bearing, haversine_distance, move_towards};

use crate::sink::VehicleMarker;

#[derive(Clone, Copy, Debug)]
pub struct AnimationConfig {
    /// Marker advance cadence.
    pub tick: Duration,
    /// Bounds on one interpolation's duration. Proportional-to-distance
    /// durations are clamped into this window so short hops still glide
    /// and long jumps do not crawl.
    pub min_interpolation: Duration,
    pub max_interpolation: Duration,
    /// Speed used to derive a duration from the hop distance.
    pub assumed_speed_mps: f64,
    /// How often a scheduled-only trip recomputes its estimate.
    pub estimate_cadence: Duration,
    /// How often the split shape and stop layers are redrawn. Re-splitting
    /// is much more expensive than moving the marker.
    pub redraw_cadence: Duration,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(100),
            min_interpolation: Duration::from_millis(400),
            max_interpolation: Duration::from_millis(3000),
            assumed_speed_mps: 10.0,
            estimate_cadence: Duration::from_millis(500),
            redraw_cadence: Duration::from_secs(4),
        }
    }
}

impl AnimationConfig {
    /// Duration for a hop of `meters`, clamped into the configured window.
    pub fn interpolation_duration(&self, meters: f64) -> Duration {
        let secs = meters.max(0.0) / self.assumed_speed_mps;
        Duration::from_secs_f64(secs).clamp(self.min_interpolation, self.max_interpolation)
    }
}

/// One glide of the marker from a previous position to a new one.
#[derive(Clone, Copy, Debug)]
pub struct Interpolation {
    from: Point,
    to: Point,
    started: Instant,
    duration: Duration,
    distance: f64,
}

impl Interpolation {
    pub fn between(from: Point, to: Point, started: Instant, config: &AnimationConfig) -> Self {
        let distance = haversine_distance(from, to);
        Self {
            from,
            to,
            started,
            duration: config.interpolation_duration(distance),
            distance,
        }
    }

    pub fn target(&self) -> Point {
        self.to
    }

    fn fraction(&self, at: Instant) -> f64 {
        if self.duration.is_zero() {
            return 1.0;
        }
        let elapsed = at.saturating_duration_since(self.started);
        (elapsed.as_secs_f64() / self.duration.as_secs_f64()).min(1.0)
    }

    /// Position along the great circle at `at`; frozen at the endpoint
    /// once the duration has fully elapsed.
    pub fn position_at(&self, at: Instant) -> Point {
        move_towards(self.from, self.to, self.fraction(at) * self.distance)
    }

    pub fn is_complete(&self, at: Instant) -> bool {
        self.fraction(at) >= 1.0
    }

    /// Facing of the marker while it glides.
    pub fn bearing(&self) -> f64 {
        bearing(self.from, self.to)
    }
}

/// Per-trip marker state: the interpolation in flight and the last fix
/// consumed.
pub struct Animator {
    config: AnimationConfig,
    current: Option<Interpolation>,
    last_fix_at: Option<chrono::NaiveDateTime>,
}

impl Animator {
    pub fn new(config: AnimationConfig) -> Self {
        Self {
            config,
            current: None,
            last_fix_at: None,
        }
    }

    /// Consume a live fix. Only a fix newer than the last consumed one
    /// begins a new glide; repeats of the same fix leave the marker on its
    /// current path.
    pub fn observe_fix(&mut self, fix: &VehicleFix, at: Instant) {
        let is_new = self.last_fix_at.map_or(true, |t| fix.timestamp > t);
        if !is_new {
            return;
        }
        self.last_fix_at = Some(fix.timestamp);
        self.glide_to(fix.location, at);
    }

    /// Consume a schedule-derived estimate. Starts a glide only when the
    /// target actually moved.
    pub fn observe_estimate(&mut self, estimate: Point, at: Instant) {
        if self.current.map(|i| i.target()) == Some(estimate) {
            return;
        }
        self.glide_to(estimate, at);
    }

    fn glide_to(&mut self, target: Point, at: Instant) {
        let from = match &self.current {
            Some(interp) => interp.position_at(at),
            None => target,
        };
        self.current = Some(Interpolation::between(from, target, at, &self.config));
    }

    /// The marker to display at `at`, once anything has been observed.
    pub fn marker(&self, at: Instant) -> Option<VehicleMarker> {
        self.current.as_ref().map(|interp| VehicleMarker {
            location: interp.position_at(at),
            bearing: interp.bearing(),
        })
    }
}
