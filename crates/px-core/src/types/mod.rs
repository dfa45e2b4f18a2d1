//! Core data types: tracked assets, currency pairs, feed frames, and REST
//! rate snapshots.

pub mod asset;
pub mod messages;
pub mod pair;
pub mod snapshot;

pub use asset::*;
pub use messages::*;
pub use pair::*;
pub use snapshot::*;
