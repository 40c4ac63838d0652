//! Typed input events for the coordinator.
//!
//! Every upstream change arrives as one of these on a single channel, so
//! ordering between location, feed, and selection changes is explicit
//! rather than an accident of subscription order.

use std::sync::Arc;

use geo::Point;

use skylink_transit::prelude::*;

#[derive(Clone, Debug)]
pub enum InputEvent {
    /// The rider moved. Subject to the rerank throttle.
    LocationChanged(Point),
    /// A new static feed snapshot replaced the old one wholesale.
    FeedUpdated(Arc<TransitFeed>),
    /// A new live overlay snapshot.
    LiveFeedUpdated(Arc<LiveTransitFeed>),
    /// The rider picked a trip to track.
    TripSelected(TripId),
    /// Advance the tracked trip through the ranked list, wrapping.
    SelectionCycled,
    /// Flip between the two ranked directions, dropping the selection.
    DirectionToggled,
    /// The rider dismissed the tracked trip.
    SelectionCleared,
    /// The previously scheduled ranking refresh came due.
    RefreshDue,
    /// A ranking pass finished. Stale generations are dropped so
    /// overlapping passes resolve to the latest one started.
    RankCompleted {
        generation: u64,
        ranked: RankedDepartures,
    },
}
