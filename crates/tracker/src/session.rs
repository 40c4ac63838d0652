//! Tracking sessions: one cancellable animation task per displayed trip.
//!
//! All per-trip bookkeeping lives in the [`TrackingSession`]; dropping it
//! aborts the task, so holding at most one session in a slot guarantees no
//! two trips ever animate the same marker.

use std::sync::Arc;

use chrono::Local;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use skylink_transit::prelude::{
    estimate_position, live_position, split_trip, timed_stops, LiveTransitFeed, Route, RouteId,
    ScheduledOrLive, TransitError, TransitFeed, TripId,
};

use crate::animate::{AnimationConfig, Animator};
use crate::sink::{line_feature, stop_features, LineKind, PresentationSink};

#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("trip references route {0} missing from the feed")]
    UnknownRoute(RouteId),

    #[error(transparent)]
    Transit(#[from] TransitError),
}

/// A running animation task for one trip. Dropping the session cancels
/// the task.
pub struct TrackingSession {
    trip_id: TripId,
    handle: JoinHandle<()>,
}

impl TrackingSession {
    pub fn trip_id(&self) -> &TripId {
        &self.trip_id
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for TrackingSession {
    fn drop(&mut self) {
        info!(trip = %self.trip_id, "tracking stopped");
        self.handle.abort();
    }
}

/// Begin tracking a trip, spawning its tick loop.
///
/// Fails up front when the trip's route is missing or has no geometry;
/// everything after that degrades per tick instead of failing.
pub fn start_tracking(
    trip: ScheduledOrLive,
    feed: Arc<TransitFeed>,
    live: watch::Receiver<Arc<LiveTransitFeed>>,
    sink: Arc<dyn PresentationSink>,
    config: AnimationConfig,
) -> Result<TrackingSession, TrackerError> {
    let route = feed
        .route(trip.route_id())
        .cloned()
        .ok_or_else(|| TrackerError::UnknownRoute(trip.route_id().clone()))?;
    if route.shape.0.is_empty() {
        return Err(TransitError::EmptyShape(route.id.clone()).into());
    }

    let trip_id = trip.trip_id().clone();
    info!(trip = %trip_id, live = trip.is_live(), "tracking started");
    let handle = tokio::spawn(run(trip, route, feed, live, sink, config));
    Ok(TrackingSession { trip_id, handle })
}

async fn run(
    trip: ScheduledOrLive,
    route: Arc<Route>,
    feed: Arc<TransitFeed>,
    live: watch::Receiver<Arc<LiveTransitFeed>>,
    sink: Arc<dyn PresentationSink>,
    config: AnimationConfig,
) {
    let mut ticker = time::interval(config.tick);
    // A late tick runs once, it never bursts to catch up
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut animator = Animator::new(config);
    let mut last_estimate: Option<Instant> = None;
    let mut last_redraw: Option<Instant> = None;

    loop {
        ticker.tick().await;
        let at = Instant::now();
        let now = Local::now().naive_local();

        match &trip {
            ScheduledOrLive::Live(live_trip) => {
                let snapshot = live.borrow().clone();
                if let Some(vehicle) = snapshot.vehicle_for_trip(&live_trip.id) {
                    animator.observe_fix(&live_position(vehicle), at);
                }
            }
            ScheduledOrLive::Scheduled(_) => {
                let due = last_estimate.map_or(true, |t| at - t >= config.estimate_cadence);
                if due {
                    last_estimate = Some(at);
                    let stops = timed_stops(&trip, &feed, now);
                    match estimate_position(&route, &stops, now) {
                        Ok(estimate) => animator.observe_estimate(estimate, at),
                        Err(err) => {
                            debug!(trip = %trip.trip_id(), %err, "skipping estimate this tick")
                        }
                    }
                }
            }
        }

        let Some(marker) = animator.marker(at) else {
            continue;
        };
        sink.update_marker(marker);

        let due = last_redraw.map_or(true, |t| at - t >= config.redraw_cadence);
        if due {
            last_redraw = Some(at);
            let stops = timed_stops(&trip, &feed, now);
            match split_trip(&route, &stops, marker.location, now) {
                Ok(split) => {
                    sink.update_line(
                        LineKind::Traversed,
                        line_feature(LineKind::Traversed, &split.shape_before),
                    );
                    sink.update_line(
                        LineKind::Upcoming,
                        line_feature(LineKind::Upcoming, &split.shape_after),
                    );
                    sink.update_stops(
                        LineKind::Traversed,
                        stop_features(LineKind::Traversed, &split.stops_before),
                    );
                    sink.update_stops(
                        LineKind::Upcoming,
                        stop_features(LineKind::Upcoming, &split.stops_after),
                    );
                }
                Err(err) => warn!(trip = %trip.trip_id(), %err, "skipping redraw this tick"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::recording::RecordingSink;
    use skylink_transit::prelude::*;
    use chrono::Duration as ChronoDuration;
    use geo::{LineString, Point};
    use std::collections::HashMap;
    use std::time::Duration;

    fn fixtures() -> (Arc<TransitFeed>, Arc<LiveTrip>, Vehicle) {
        let now = Local::now().naive_local();
        let stops = vec![
            Stop {
                id: StopId::new("s1"),
                name: HashMap::new(),
                location: Point::new(77.60, 13.0),
                zone: None,
            },
            Stop {
                id: StopId::new("s2"),
                name: HashMap::new(),
                location: Point::new(77.62, 13.0),
                zone: None,
            },
        ];
        let route = Route {
            id: RouteId::new("10A"),
            short_name: "10A".into(),
            long_name: "Test".into(),
            stop_ids: vec![StopId::new("s1"), StopId::new("s2")],
            shape: LineString::from(vec![(77.60, 13.0), (77.61, 13.0), (77.62, 13.0)]),
            trips: vec![],
        };
        let feed = Arc::new(TransitFeed::from_data(
            FeedId::new("test"),
            stops,
            vec![route],
            "v1",
        ));
        let trip = Arc::new(LiveTrip {
            id: TripId::new("t1"),
            vehicle_id: VehicleId::new("v1"),
            route_id: RouteId::new("10A"),
            visits: vec![
                LiveStopVisit {
                    stop_id: StopId::new("s1"),
                    time: now - ChronoDuration::minutes(5),
                },
                LiveStopVisit {
                    stop_id: StopId::new("s2"),
                    time: now + ChronoDuration::minutes(5),
                },
            ],
            timestamp: now,
        });
        let vehicle = Vehicle {
            id: VehicleId::new("v1"),
            registration: "KA-01".into(),
            trip_id: TripId::new("t1"),
            route_id: RouteId::new("10A"),
            location: Point::new(77.61, 13.0),
            bearing: 90.0,
            speed: 8.0,
            next_stop_id: Some(StopId::new("s2")),
            previous_locations: vec![],
            timestamp: now,
        };
        (feed, trip, vehicle)
    }

    #[tokio::test]
    async fn test_unknown_route_is_rejected() {
        let (feed, _, _) = fixtures();
        let orphan = Arc::new(Trip {
            id: TripId::new("ghost"),
            route_id: RouteId::new("nope"),
            visits: vec![],
        });
        let (_, live_rx) = watch::channel(Arc::new(LiveTransitFeed::default()));
        let result = start_tracking(
            ScheduledOrLive::Scheduled(orphan),
            feed,
            live_rx,
            Arc::new(RecordingSink::default()),
            AnimationConfig::default(),
        );
        assert!(matches!(result, Err(TrackerError::UnknownRoute(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_live_trip_drives_marker_and_redraw() {
        let (feed, trip, vehicle) = fixtures();
        let live = Arc::new(LiveTransitFeed::from_data(
            vec![trip.as_ref().clone()],
            vec![vehicle],
            None,
        ));
        let (_live_tx, live_rx) = watch::channel(live);
        let sink = Arc::new(RecordingSink::default());

        let session = start_tracking(
            ScheduledOrLive::Live(trip),
            feed,
            live_rx,
            sink.clone(),
            AnimationConfig::default(),
        )
        .unwrap();
        assert_eq!(session.trip_id(), &TripId::new("t1"));

        time::sleep(Duration::from_millis(350)).await;

        assert!(!sink.markers.lock().unwrap().is_empty());
        // First redraw happened immediately: both halves of the line and
        // both stop sets were pushed
        assert_eq!(sink.lines.lock().unwrap().len(), 2);
        assert_eq!(sink.stops.lock().unwrap().len(), 2);

        drop(session);
        // The aborted task stops producing output
        time::sleep(Duration::from_millis(50)).await;
        let markers_after_drop = sink.markers.lock().unwrap().len();
        time::sleep(Duration::from_millis(500)).await;
        assert_eq!(sink.markers.lock().unwrap().len(), markers_after_drop);
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_replacement_cancels_previous() {
        let (feed, trip, vehicle) = fixtures();
        let live = Arc::new(LiveTransitFeed::from_data(
            vec![trip.as_ref().clone()],
            vec![vehicle],
            None,
        ));
        let (_live_tx, live_rx) = watch::channel(live);
        let sink = Arc::new(RecordingSink::default());

        let mut slot = Some(
            start_tracking(
                ScheduledOrLive::Live(trip.clone()),
                feed.clone(),
                live_rx.clone(),
                sink.clone(),
                AnimationConfig::default(),
            )
            .unwrap(),
        );
        time::sleep(Duration::from_millis(150)).await;
        assert!(!slot.as_ref().map(TrackingSession::is_finished).unwrap_or(true));

        // Take the old session out of the slot so its drop aborts the
        // task before the replacement spawns
        drop(slot.take());
        slot = Some(
            start_tracking(
                ScheduledOrLive::Live(trip),
                feed,
                live_rx,
                sink.clone(),
                AnimationConfig::default(),
            )
            .unwrap(),
        );
        time::sleep(Duration::from_millis(150)).await;
        assert!(!slot.as_ref().map(TrackingSession::is_finished).unwrap_or(true));
    }
}
