//! Topic-bound value holders.
//!
//! Each component owns one subscription topic and one compiled query, and
//! keeps the last value it successfully extracted:
//!
//! - [`ObservedSignal`]: a numeric reading (the sensor and both thresholds)
//! - [`LoadActuator`]: the controlled device, classified into a [`LoadState`]
//! - [`HealthMonitor`]: a liveness topic, classified into a [`HealthState`]
//!
//! ## Latching
//!
//! Values latch. A message that yields no value, or a value of the wrong
//! shape, leaves the previous reading in place; nothing ever expires. The
//! controller's health gate relies on this: a reading is either absent
//! (never seen) or the most recent good one.
//!
//! [`LoadState`]: thermostt_types::LoadState
//! [`HealthState`]: thermostt_types::HealthState

mod health;
mod load;
mod observed;

pub use health::HealthMonitor;
pub use load::{LoadActuator, StateBinding};
pub use observed::{ObservedSignal, SignalKind};

use std::fmt::Debug;

use crate::query::Document;

/// A component that consumes messages from one topic filter.
///
/// The controller routes every inbound message to each handler whose topic
/// filter matches, independently: one handler failing to extract a value
/// never stops another from processing the same message.
pub trait TopicHandler: Debug {
    /// The topic filter this handler subscribes to. May contain MQTT wildcards.
    fn topic(&self) -> &str;

    /// A short label used in logs.
    fn label(&self) -> String;

    /// Update from a decoded message. Failures are logged, never returned.
    fn on_message(&mut self, document: &Document);
}
