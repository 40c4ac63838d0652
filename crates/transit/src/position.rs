//! Vehicle position estimation.
//!
//! Live vehicles report their own position; scheduled-only trips get an
//! estimate by interpolating along the route shape between the last
//! passed stop and the next upcoming one, proportionally to elapsed
//! schedule time.

use chrono::NaiveDateTime;
use geo::{LineString, Point};

use crate::identifiers::*;
use crate::models::feed::TransitFeed;
use crate::models::types::*;
use crate::schedule::resolve_visit_times;
use crate::spatial::geometry::{cumulative_distances, move_towards, nearest_vertex_index};

/// Snap to a stop's matched vertex when the schedule puts the vehicle
/// at that stop within this window. Avoids jitter while dwelling.
const AT_STOP_TOLERANCE_SECS: i64 = 15;

/// A trip's stop-visit resolved for geometry work: where the stop is and
/// when this trip calls there, as an absolute timestamp.
#[derive(Clone, Debug)]
pub struct TimedStop {
    pub stop_id: StopId,
    pub location: Point,
    pub time: NaiveDateTime,
}

/// Resolve a candidate trip's visits against the feed, in visit order.
/// Visits whose stop is missing from the feed are skipped.
pub fn timed_stops(
    candidate: &ScheduledOrLive,
    feed: &TransitFeed,
    now: NaiveDateTime,
) -> Vec<TimedStop> {
    match candidate {
        ScheduledOrLive::Scheduled(trip) => resolve_visit_times(trip, now)
            .into_iter()
            .filter_map(|(i, time)| {
                let visit = &trip.visits[i];
                let stop = feed.stop(&visit.stop_id)?;
                Some(TimedStop {
                    stop_id: visit.stop_id.clone(),
                    location: stop.location,
                    time,
                })
            })
            .collect(),
        ScheduledOrLive::Live(trip) => trip
            .visits
            .iter()
            .filter_map(|visit| {
                let stop = feed.stop(&visit.stop_id)?;
                Some(TimedStop {
                    stop_id: visit.stop_id.clone(),
                    location: stop.location,
                    time: visit.time,
                })
            })
            .collect(),
    }
}

/// A live vehicle's position is its most recent fix, never an estimate.
pub fn live_position(vehicle: &Vehicle) -> VehicleFix {
    vehicle.latest_fix()
}

/// Estimate where a scheduled-only vehicle is along its route at `now`.
///
/// Before the first stop and after the last the estimate clamps to that
/// stop's matched vertex. In between, the elapsed fraction of schedule
/// time between the bracketing stops is converted to a distance along
/// the shape sub-segment joining them.
pub fn estimate_position(
    route: &Route,
    stops: &[TimedStop],
    now: NaiveDateTime,
) -> Result<Point> {
    let shape = &route.shape;
    if shape.0.is_empty() {
        return Err(TransitError::EmptyShape(route.id.clone()));
    }
    if stops.is_empty() {
        return Err(TransitError::InvalidData(format!(
            "trip on route {} has no resolvable stops",
            route.id
        )));
    }

    let vertex = |idx: usize| Point::from(shape.0[idx]);

    // Match each stop to its shape vertex, then order by time
    let mut matched: Vec<(usize, NaiveDateTime)> = stops
        .iter()
        .filter_map(|s| nearest_vertex_index(shape, s.location).map(|i| (i, s.time)))
        .collect();
    matched.sort_by_key(|&(_, t)| t);

    // Dwelling at a stop
    for &(idx, time) in &matched {
        if (time - now).num_seconds().abs() <= AT_STOP_TOLERANCE_SECS {
            return Ok(vertex(idx));
        }
    }

    let &(first_idx, first_time) = match matched.first() {
        Some(first) => first,
        None => return Err(TransitError::EmptyShape(route.id.clone())),
    };
    let &(last_idx, last_time) = match matched.last() {
        Some(last) => last,
        None => return Err(TransitError::EmptyShape(route.id.clone())),
    };
    if now < first_time {
        return Ok(vertex(first_idx));
    }
    if now > last_time {
        return Ok(vertex(last_idx));
    }

    // Bracketing pair: the last passed stop and the next upcoming one
    let next = matched.partition_point(|&(_, t)| t <= now);
    let (prev_idx, prev_time) = matched[next - 1];
    let (next_idx, next_time) = matched[next];

    if prev_idx == next_idx {
        return Ok(vertex(prev_idx));
    }

    // Sub-segment between the two matched vertices, reversed when
    // snapping noise put the indices out of geometric order
    let (lo, hi) = (prev_idx.min(next_idx), prev_idx.max(next_idx));
    let mut segment: Vec<_> = shape.0[lo..=hi].to_vec();
    if prev_idx > next_idx {
        segment.reverse();
    }
    let segment = LineString::new(segment);

    let cum = cumulative_distances(&segment);
    let total = match cum.last() {
        Some(&total) if total > 0.0 => total,
        _ => return Ok(vertex(prev_idx)),
    };

    let span = (next_time - prev_time).num_milliseconds() as f64;
    let elapsed = (now - prev_time).num_milliseconds() as f64;
    let fraction = if span > 0.0 {
        (elapsed / span).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let target = fraction * total;

    // Walk to the pair of vertices bracketing the target distance
    let after = cum.partition_point(|&d| d <= target);
    if after >= cum.len() {
        return Ok(Point::from(segment.0[segment.0.len() - 1]));
    }
    let base = after - 1;
    let from = Point::from(segment.0[base]);
    let to = Point::from(segment.0[after]);
    Ok(move_towards(from, to, target - cum[base]))
}
