//! # skylink-tracker
//!
//! Event coordination and marker animation on top of `skylink-transit`.
//!
//! ## Features
//!
//! - **Coordinator**: a single event loop that turns location, feed, and
//!   selection changes into ranking passes, with throttling and
//!   last-write-wins reconciliation of overlapping passes
//! - **Tracking sessions**: one cancellable animation task per selected
//!   trip, torn down before the next trip's tracking begins
//! - **Animator**: fixed-tick interpolation of the displayed marker
//!   between successive position estimates or GPS fixes
//! - **Presentation sink**: GeoJSON line/stop payloads and marker updates
//!   pushed to a write-only collaborator

pub mod animate;
pub mod coordinator;
pub mod events;
pub mod session;
pub mod sink;

pub mod prelude {
    pub use crate::animate::{AnimationConfig, Animator, Interpolation};
    pub use crate::coordinator::{Coordinator, CoordinatorConfig};
    pub use crate::events::InputEvent;
    pub use crate::session::{start_tracking, TrackerError, TrackingSession};
    pub use crate::sink::{line_feature, stop_features, LineKind, PresentationSink, VehicleMarker};
}

pub use prelude::*;
