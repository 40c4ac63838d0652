//! R-tree node wrapping a stop for spatial queries.

use std::sync::Arc;

use geo::Point;
use rstar::{PointDistance, RTreeObject, AABB};

use crate::models::types::Stop;

#[derive(Clone, Debug)]
pub struct StopNode {
    pub stop: Arc<Stop>,
    point: [f64; 2],
}

impl StopNode {
    pub fn new(stop: Arc<Stop>) -> Self {
        let point = [stop.location.x(), stop.location.y()];
        Self { stop, point }
    }

    pub fn location(&self) -> Point {
        Point::new(self.point[0], self.point[1])
    }
}

impl RTreeObject for StopNode {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.point)
    }
}

impl PointDistance for StopNode {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.point[0] - point[0];
        let dy = self.point[1] - point[1];
        dx * dx + dy * dy
    }
}
