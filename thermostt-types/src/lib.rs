//! # thermostt-types
//!
//! Wire types shared by the thermostt controller and anything that consumes
//! what it publishes: the symbolic load and health states it reasons about,
//! the liveness payloads on its LWT topic, and the JSON state snapshot on its
//! STATE topic.
//!
//! ## Features
//!
//! - `serde`: JSON (or any serde format) support for every type. Snapshots
//!   omit absent fields entirely when serialized.
//!
//! ## Example
//!
//! ```rust
//! use thermostt_types::{LoadState, Liveness, StateSnapshot};
//!
//! let snapshot = StateSnapshot::now()
//!     .sensor(20.1)
//!     .thresholds(20.0, 18.0)
//!     .load(LoadState::Off)
//!     .target(LoadState::On);
//!
//! assert_eq!(snapshot.load, Some(LoadState::Off));
//! assert_eq!(Liveness::from_health(true).as_str(), "Online");
//! ```

mod liveness;
mod snapshot;
mod state;

pub use liveness::*;
pub use snapshot::*;
pub use state::*;
