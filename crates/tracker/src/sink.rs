//! Write-only presentation interface and its GeoJSON payload builders.
//!
//! The core pushes computed geometry out through [`PresentationSink`] and
//! never reads anything back. Implementations are expected to be cheap;
//! anything slow should hand the payload off internally.

use geo::{LineString, Point};
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, Value};
use serde_json::json;

use skylink_transit::prelude::TimedStop;

/// Which half of the split a line or stop set belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LineKind {
    Traversed,
    Upcoming,
}

impl LineKind {
    fn as_str(self) -> &'static str {
        match self {
            LineKind::Traversed => "traversed",
            LineKind::Upcoming => "upcoming",
        }
    }
}

/// The displayed vehicle marker.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VehicleMarker {
    pub location: Point,
    /// Degrees [0, 360), the marker's facing.
    pub bearing: f64,
}

/// Outbound interface to the map layer. Fire and forget.
pub trait PresentationSink: Send + Sync {
    fn update_line(&self, kind: LineKind, line: Feature);
    fn update_stops(&self, kind: LineKind, stops: FeatureCollection);
    fn update_marker(&self, marker: VehicleMarker);
    fn clear(&self);
}

/// A polyline as a GeoJSON LineString feature tagged with its kind.
pub fn line_feature(kind: LineKind, line: &LineString) -> Feature {
    let coords: Vec<Vec<f64>> = line.points().map(|p| vec![p.x(), p.y()]).collect();
    let mut properties = JsonObject::new();
    properties.insert("kind".to_string(), json!(kind.as_str()));
    Feature {
        bbox: None,
        geometry: Some(Geometry::new(Value::LineString(coords))),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

/// Stop markers as a GeoJSON point collection, in stop order.
pub fn stop_features(kind: LineKind, stops: &[TimedStop]) -> FeatureCollection {
    let features = stops
        .iter()
        .map(|stop| {
            let mut properties = JsonObject::new();
            properties.insert("stop_id".to_string(), json!(stop.stop_id.as_str()));
            properties.insert("kind".to_string(), json!(kind.as_str()));
            properties.insert("time".to_string(), json!(stop.time.to_string()));
            Feature {
                bbox: None,
                geometry: Some(Geometry::new(Value::Point(vec![
                    stop.location.x(),
                    stop.location.y(),
                ]))),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();
    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

#[cfg(test)]
pub(crate) mod recording {
    use super::*;
    use std::sync::Mutex;

    /// Test double that records every call.
    #[derive(Default)]
    pub struct RecordingSink {
        pub lines: Mutex<Vec<(LineKind, Feature)>>,
        pub stops: Mutex<Vec<(LineKind, FeatureCollection)>>,
        pub markers: Mutex<Vec<VehicleMarker>>,
        pub clears: Mutex<usize>,
    }

    impl PresentationSink for RecordingSink {
        fn update_line(&self, kind: LineKind, line: Feature) {
            self.lines.lock().unwrap().push((kind, line));
        }

        fn update_stops(&self, kind: LineKind, stops: FeatureCollection) {
            self.stops.lock().unwrap().push((kind, stops));
        }

        fn update_marker(&self, marker: VehicleMarker) {
            self.markers.lock().unwrap().push(marker);
        }

        fn clear(&self) {
            *self.clears.lock().unwrap() += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;
    use skylink_transit::prelude::StopId;

    #[test]
    fn test_line_feature_preserves_coordinates() {
        let line = LineString::from(vec![(77.60, 13.0), (77.61, 13.1)]);
        let feature = line_feature(LineKind::Traversed, &line);

        match feature.geometry.as_ref().map(|g| &g.value) {
            Some(Value::LineString(coords)) => {
                assert_eq!(coords, &vec![vec![77.60, 13.0], vec![77.61, 13.1]]);
            }
            other => panic!("unexpected geometry: {other:?}"),
        }
        let props = feature.properties.unwrap();
        assert_eq!(props["kind"], json!("traversed"));
    }

    #[test]
    fn test_stop_features_in_order() {
        let stops = vec![
            TimedStop {
                stop_id: StopId::new("a"),
                location: Point::new(77.60, 13.0),
                time: NaiveDateTime::default(),
            },
            TimedStop {
                stop_id: StopId::new("b"),
                location: Point::new(77.61, 13.0),
                time: NaiveDateTime::default(),
            },
        ];
        let collection = stop_features(LineKind::Upcoming, &stops);
        assert_eq!(collection.features.len(), 2);
        let ids: Vec<_> = collection
            .features
            .iter()
            .map(|f| f.properties.as_ref().unwrap()["stop_id"].clone())
            .collect();
        assert_eq!(ids, vec![json!("a"), json!("b")]);
    }
}
