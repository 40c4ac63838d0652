//! Shape splitting: partition a route's polyline and stop list around the
//! vehicle into a traversed half and an upcoming half.

use chrono::NaiveDateTime;
use geo::{LineString, Point};

use crate::models::types::{Result, Route, TransitError};
use crate::position::TimedStop;
use crate::spatial::geometry::nearest_vertex_index;

/// The two halves of a trip around the vehicle's position.
///
/// The split vertex appears in both halves so the drawn segments touch
/// with no gap. Stop order within each half matches the trip's order.
#[derive(Clone, Debug)]
pub struct TripSplit {
    pub shape_before: LineString,
    pub shape_after: LineString,
    pub stops_before: Vec<TimedStop>,
    pub stops_after: Vec<TimedStop>,
    /// Shape vertex index nearest the vehicle.
    pub split_index: usize,
}

/// Split a route's shape and a trip's stops around `vehicle`.
///
/// Stops are matched to shape vertices independently of the vehicle, so a
/// stop just behind the split vertex lands in the traversed half even if
/// the vehicle has not literally passed its platform.
///
/// A trip that has not started yet (no stop time at or before `now`) gets
/// an empty traversed half regardless of where the vehicle snapped, so no
/// traveled segment shows before departure.
pub fn split_trip(
    route: &Route,
    stops: &[TimedStop],
    vehicle: Point,
    now: NaiveDateTime,
) -> Result<TripSplit> {
    let shape = &route.shape;
    let split_index = nearest_vertex_index(shape, vehicle)
        .ok_or_else(|| TransitError::EmptyShape(route.id.clone()))?;

    let started = stops.iter().any(|s| s.time <= now);
    if !started {
        return Ok(TripSplit {
            shape_before: LineString::new(Vec::new()),
            shape_after: shape.clone(),
            stops_before: Vec::new(),
            stops_after: stops.to_vec(),
            split_index: 0,
        });
    }

    let shape_before = LineString::new(shape.0[..=split_index].to_vec());
    let shape_after = LineString::new(shape.0[split_index..].to_vec());

    let mut stops_before = Vec::new();
    let mut stops_after = Vec::new();
    for stop in stops {
        // A stop missing a vertex match can only mean an empty shape,
        // ruled out above
        let Some(idx) = nearest_vertex_index(shape, stop.location) else {
            continue;
        };
        if idx <= split_index {
            stops_before.push(stop.clone());
        } else {
            stops_after.push(stop.clone());
        }
    }

    Ok(TripSplit {
        shape_before,
        shape_after,
        stops_before,
        stops_after,
        split_index,
    })
}
