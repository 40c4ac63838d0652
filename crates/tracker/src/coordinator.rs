//! The single event loop tying ranking, selection, and animation together.
//!
//! All inputs funnel through one [`InputEvent`] channel; the coordinator
//! decides what to recompute and publishes results on watch channels.
//! Ranking passes run as spawned tasks tagged with a generation counter.
//! A completed pass older than the latest one started is discarded, which
//! makes overlapping passes resolve last-write-wins without cancellation.

use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use geo::Point;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, warn};

use skylink_transit::prelude::*;
use skylink_transit::spatial::geometry::haversine_distance;

use crate::animate::AnimationConfig;
use crate::events::InputEvent;
use crate::session::{start_tracking, TrackingSession};
use crate::sink::PresentationSink;

#[derive(Clone, Debug)]
pub struct CoordinatorConfig {
    pub ranker: RankerConfig,
    pub animation: AnimationConfig,
    /// Location changes rerank at most this often...
    pub min_rerank_interval: Duration,
    /// ...unless the rider moved at least this far, meters.
    pub min_rerank_distance_m: f64,
}

impl CoordinatorConfig {
    pub fn new(landmark: Point) -> Self {
        Self {
            ranker: RankerConfig::new(landmark),
            animation: AnimationConfig::default(),
            min_rerank_interval: Duration::from_secs(60),
            min_rerank_distance_m: 50.0,
        }
    }
}

pub struct Coordinator {
    config: CoordinatorConfig,
    provider: Arc<dyn TravelRouteProvider>,
    sink: Arc<dyn PresentationSink>,

    events_rx: mpsc::UnboundedReceiver<InputEvent>,
    /// Spawned tasks report back through the same channel.
    events_tx: mpsc::UnboundedSender<InputEvent>,

    feed: Option<Arc<TransitFeed>>,
    live_tx: watch::Sender<Arc<LiveTransitFeed>>,
    live_rx: watch::Receiver<Arc<LiveTransitFeed>>,
    ranked_tx: watch::Sender<RankedDepartures>,

    rider: Option<Point>,
    /// When and where the last ranking pass was started from.
    last_rank: Option<(Instant, Point)>,
    generation: u64,
    refresh: Option<JoinHandle<()>>,
    session: Option<TrackingSession>,
    direction: Direction,
    /// Index into the displayed direction's list while cycling.
    selected: Option<usize>,
}

impl Coordinator {
    /// Build a coordinator. Returns the event sender upstream code feeds
    /// and the watch the presentation layer reads ranked lists from.
    pub fn new(
        config: CoordinatorConfig,
        provider: Arc<dyn TravelRouteProvider>,
        sink: Arc<dyn PresentationSink>,
    ) -> (
        Self,
        mpsc::UnboundedSender<InputEvent>,
        watch::Receiver<RankedDepartures>,
    ) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (live_tx, live_rx) = watch::channel(Arc::new(LiveTransitFeed::default()));
        let (ranked_tx, ranked_rx) = watch::channel(RankedDepartures::default());

        let coordinator = Self {
            config,
            provider,
            sink,
            events_rx,
            events_tx: events_tx.clone(),
            feed: None,
            live_tx,
            live_rx,
            ranked_tx,
            rider: None,
            last_rank: None,
            generation: 0,
            refresh: None,
            session: None,
            direction: Direction::TowardLandmark,
            selected: None,
        };
        (coordinator, events_tx, ranked_rx)
    }

    /// Process events until every sender is gone.
    pub async fn run(mut self) {
        while let Some(event) = self.events_rx.recv().await {
            self.handle(event);
        }
    }

    fn handle(&mut self, event: InputEvent) {
        match event {
            InputEvent::LocationChanged(point) => {
                let should_rank = match self.last_rank {
                    None => true,
                    Some((at, from)) => {
                        at.elapsed() >= self.config.min_rerank_interval
                            || haversine_distance(from, point) >= self.config.min_rerank_distance_m
                    }
                };
                self.rider = Some(point);
                if should_rank {
                    self.spawn_rank();
                }
            }
            InputEvent::FeedUpdated(feed) => {
                self.feed = Some(feed);
                self.spawn_rank();
            }
            InputEvent::LiveFeedUpdated(live) => {
                // The tracking session sees this through its watch
                let _ = self.live_tx.send(live);
                self.spawn_rank();
            }
            InputEvent::TripSelected(trip_id) => {
                self.selected = None;
                self.select(trip_id);
            }
            InputEvent::SelectionCycled => self.cycle_selection(),
            InputEvent::DirectionToggled => {
                self.direction = match self.direction {
                    Direction::TowardLandmark => Direction::TowardCity,
                    Direction::TowardCity => Direction::TowardLandmark,
                };
                self.selected = None;
                self.session = None;
                self.sink.clear();
            }
            InputEvent::SelectionCleared => {
                self.selected = None;
                self.session = None;
                self.sink.clear();
            }
            InputEvent::RefreshDue => self.spawn_rank(),
            InputEvent::RankCompleted { generation, ranked } => {
                self.apply_rank(generation, ranked)
            }
        }
    }

    /// Start a ranking pass over the current snapshots. No-op until both
    /// a feed and a rider location have arrived.
    fn spawn_rank(&mut self) {
        let (Some(feed), Some(rider)) = (self.feed.clone(), self.rider) else {
            return;
        };
        self.generation += 1;
        let generation = self.generation;
        self.last_rank = Some((Instant::now(), rider));

        let live = self.live_rx.borrow().clone();
        let provider = self.provider.clone();
        let config = self.config.ranker.clone();
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let now = Local::now().naive_local();
            let ranked =
                rank_next_departures(rider, &feed, &live, provider.as_ref(), &config, now).await;
            let _ = events.send(InputEvent::RankCompleted { generation, ranked });
        });
    }

    fn apply_rank(&mut self, generation: u64, ranked: RankedDepartures) {
        if generation != self.generation {
            debug!(generation, latest = self.generation, "dropping stale ranking pass");
            return;
        }

        // Replace the pending refresh atomically so superseded timers
        // never fire
        if let Some(old) = self.refresh.take() {
            old.abort();
        }
        let delay = ranked.next_refresh;
        let events = self.events_tx.clone();
        self.refresh = Some(tokio::spawn(async move {
            time::sleep(delay).await;
            let _ = events.send(InputEvent::RefreshDue);
        }));

        let _ = self.ranked_tx.send(ranked);
    }

    /// Advance the tracked trip through the displayed direction's ranked
    /// list, wrapping at the end.
    fn cycle_selection(&mut self) {
        let ranked = self.ranked_tx.borrow().clone();
        let list = ranked.direction(self.direction);
        if list.is_empty() {
            debug!(direction = ?self.direction, "no ranked trips to cycle through");
            return;
        }
        let next = match self.selected {
            Some(current) => (current + 1) % list.len(),
            None => 0,
        };
        self.selected = Some(next);
        let trip_id = list[next].trip.trip_id().clone();
        self.select(trip_id);
    }

    fn select(&mut self, trip_id: TripId) {
        let Some(feed) = self.feed.clone() else {
            warn!(trip = %trip_id, "trip selected before any feed arrived");
            return;
        };

        // Live overlay is authoritative for the same trip id
        let live = self.live_rx.borrow().clone();
        let candidate = match live.trip(&trip_id) {
            Some(live_trip) => Some(ScheduledOrLive::Live(live_trip.clone())),
            None => feed.trip(&trip_id).cloned().map(ScheduledOrLive::Scheduled),
        };
        let Some(candidate) = candidate else {
            warn!(trip = %trip_id, "selected trip not in either feed");
            return;
        };

        // Tear the previous session down before the new one starts
        self.session = None;
        match start_tracking(
            candidate,
            feed,
            self.live_rx.clone(),
            self.sink.clone(),
            self.config.animation,
        ) {
            Ok(session) => self.session = Some(session),
            Err(err) => warn!(trip = %trip_id, %err, "could not start tracking"),
        }
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        if let Some(refresh) = self.refresh.take() {
            refresh.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::recording::RecordingSink;
    use chrono::Duration as ChronoDuration;
    use geo::LineString;
    use std::collections::HashMap;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const CITY: (f64, f64) = (77.60, 13.00);

    fn feed() -> Arc<TransitFeed> {
        let stop = Stop {
            id: StopId::new("s1"),
            name: HashMap::new(),
            location: Point::new(CITY.0, CITY.1),
            zone: None,
        };
        let route = Route {
            id: RouteId::new("10A"),
            short_name: "10A".into(),
            long_name: "Test".into(),
            stop_ids: vec![StopId::new("s1")],
            shape: LineString::from(vec![CITY, (77.71, 13.20)]),
            trips: vec![],
        };
        Arc::new(TransitFeed::from_data(
            FeedId::new("test"),
            vec![stop],
            vec![route],
            "v1",
        ))
    }

    fn live_trip(id: &str, minutes_out: i64) -> LiveTrip {
        let now = Local::now().naive_local();
        LiveTrip {
            id: TripId::new(id),
            vehicle_id: VehicleId::new(format!("v-{id}")),
            route_id: RouteId::new("10A"),
            visits: vec![LiveStopVisit {
                stop_id: StopId::new("s1"),
                time: now + ChronoDuration::minutes(minutes_out),
            }],
            timestamp: now,
        }
    }

    fn live_feed() -> Arc<LiveTransitFeed> {
        let now = Local::now().naive_local();
        Arc::new(LiveTransitFeed::from_data(
            vec![live_trip("t1", 30)],
            vec![],
            Some(now),
        ))
    }

    struct CountingWalk(Arc<AtomicUsize>);

    impl TravelRouteProvider for CountingWalk {
        fn route<'a>(
            &'a self,
            from: Point,
            to: Point,
            _mode: TravelMode,
        ) -> Pin<Box<dyn Future<Output = skylink_transit::models::types::Result<TravelRoute>> + Send + 'a>>
        {
            self.0.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                Ok(TravelRoute {
                    distance: haversine_distance(from, to),
                    duration: Some(0.0),
                    geometry: None,
                })
            })
        }
    }

    fn coordinator() -> (
        mpsc::UnboundedSender<InputEvent>,
        watch::Receiver<RankedDepartures>,
        Arc<RecordingSink>,
        Arc<AtomicUsize>,
    ) {
        let walks = Arc::new(AtomicUsize::new(0));
        let sink = Arc::new(RecordingSink::default());
        let (coordinator, events, ranked_rx) = Coordinator::new(
            CoordinatorConfig::new(Point::new(77.71, 13.20)),
            Arc::new(CountingWalk(walks.clone())),
            sink.clone(),
        );
        tokio::spawn(coordinator.run());
        (events, ranked_rx, sink, walks)
    }

    #[tokio::test(start_paused = true)]
    async fn test_feed_and_location_produce_a_ranking() {
        let (events, mut ranked_rx, _, _) = coordinator();

        events.send(InputEvent::FeedUpdated(feed())).unwrap();
        events.send(InputEvent::LiveFeedUpdated(live_feed())).unwrap();
        events
            .send(InputEvent::LocationChanged(Point::new(CITY.0, CITY.1)))
            .unwrap();

        time::timeout(Duration::from_secs(1), ranked_rx.changed())
            .await
            .unwrap()
            .unwrap();
        let ranked = ranked_rx.borrow_and_update().clone();
        assert_eq!(ranked.toward_landmark.len(), 1);
        assert!(ranked.toward_landmark[0].is_live());
    }

    #[tokio::test(start_paused = true)]
    async fn test_location_changes_are_throttled() {
        let (events, mut ranked_rx, _, walks) = coordinator();

        events.send(InputEvent::FeedUpdated(feed())).unwrap();
        events
            .send(InputEvent::LocationChanged(Point::new(CITY.0, CITY.1)))
            .unwrap();
        time::timeout(Duration::from_secs(1), ranked_rx.changed())
            .await
            .unwrap()
            .unwrap();
        let after_first = walks.load(Ordering::SeqCst);
        assert!(after_first > 0);

        // A few meters away, seconds later: throttled, no new lookups
        events
            .send(InputEvent::LocationChanged(Point::new(CITY.0 + 0.00005, CITY.1)))
            .unwrap();
        time::sleep(Duration::from_secs(2)).await;
        assert_eq!(walks.load(Ordering::SeqCst), after_first);

        // A real move reranks immediately
        events
            .send(InputEvent::LocationChanged(Point::new(CITY.0 + 0.01, CITY.1)))
            .unwrap();
        time::timeout(Duration::from_secs(1), ranked_rx.changed())
            .await
            .unwrap()
            .unwrap();
        assert!(walks.load(Ordering::SeqCst) > after_first);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_rank_completions_are_dropped() {
        let (events, mut ranked_rx, _, _) = coordinator();

        events.send(InputEvent::FeedUpdated(feed())).unwrap();
        events
            .send(InputEvent::LocationChanged(Point::new(CITY.0, CITY.1)))
            .unwrap();
        time::timeout(Duration::from_secs(1), ranked_rx.changed())
            .await
            .unwrap()
            .unwrap();
        ranked_rx.borrow_and_update();

        // A completion from a generation that was never started is stale
        // by definition and must not overwrite the published list
        events
            .send(InputEvent::RankCompleted {
                generation: 9999,
                ranked: RankedDepartures::default(),
            })
            .unwrap();
        time::sleep(Duration::from_millis(100)).await;
        assert!(!ranked_rx.has_changed().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_selection_lifecycle() {
        let (events, _, sink, _) = coordinator();

        events.send(InputEvent::FeedUpdated(feed())).unwrap();
        events.send(InputEvent::LiveFeedUpdated(live_feed())).unwrap();
        events.send(InputEvent::TripSelected(TripId::new("t1"))).unwrap();
        time::sleep(Duration::from_millis(300)).await;

        events.send(InputEvent::SelectionCleared).unwrap();
        time::sleep(Duration::from_millis(100)).await;
        assert_eq!(*sink.clears.lock().unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cycling_and_direction_toggle() {
        let (events, mut ranked_rx, sink, _) = coordinator();

        events.send(InputEvent::FeedUpdated(feed())).unwrap();
        let now = Local::now().naive_local();
        let pair = Arc::new(LiveTransitFeed::from_data(
            vec![live_trip("t1", 30), live_trip("t2", 40)],
            vec![],
            Some(now),
        ));
        events.send(InputEvent::LiveFeedUpdated(pair)).unwrap();
        events
            .send(InputEvent::LocationChanged(Point::new(CITY.0, CITY.1)))
            .unwrap();
        time::timeout(Duration::from_secs(1), ranked_rx.changed())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ranked_rx.borrow_and_update().toward_landmark.len(), 2);

        // Three cycles over two trips wraps back to the first
        for _ in 0..3 {
            events.send(InputEvent::SelectionCycled).unwrap();
            time::sleep(Duration::from_millis(50)).await;
        }

        events.send(InputEvent::DirectionToggled).unwrap();
        time::sleep(Duration::from_millis(50)).await;
        assert_eq!(*sink.clears.lock().unwrap(), 1);

        // The other direction has nothing ranked, so cycling is a no-op
        events.send(InputEvent::SelectionCycled).unwrap();
        time::sleep(Duration::from_millis(50)).await;
        assert_eq!(*sink.clears.lock().unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_due_triggers_another_pass() {
        let (events, mut ranked_rx, _, walks) = coordinator();

        events.send(InputEvent::FeedUpdated(feed())).unwrap();
        events.send(InputEvent::LiveFeedUpdated(live_feed())).unwrap();
        events
            .send(InputEvent::LocationChanged(Point::new(CITY.0, CITY.1)))
            .unwrap();
        time::timeout(Duration::from_secs(1), ranked_rx.changed())
            .await
            .unwrap()
            .unwrap();
        ranked_rx.borrow_and_update();
        let after_first = walks.load(Ordering::SeqCst);

        // The scheduled refresh (clamped to at most 60 s) reranks on its own
        time::sleep(Duration::from_secs(61)).await;
        assert!(walks.load(Ordering::SeqCst) > after_first);
    }
}
