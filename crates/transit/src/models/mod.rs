//! Transit data model: static feed entities, live feed entities, and the
//! crate error type.

pub mod feed;
pub mod types;

pub use feed::{LiveTransitFeed, TransitFeed};
pub use types::*;
