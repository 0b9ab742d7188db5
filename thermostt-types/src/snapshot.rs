//! StateSnapshot - the full controller state published after every message.

use chrono::{DateTime, Utc};

use crate::LoadState;

/// A point-in-time view of everything the controller knows.
///
/// Absent values are omitted from the serialized object rather than written
/// as `null`. `target` is only set when the last commanded state differs from
/// what the load currently reports, so its presence means "a command is in
/// flight or was ignored by the device".
///
/// # Example
///
/// ```rust
/// use thermostt_types::{LoadState, StateSnapshot};
///
/// let snapshot = StateSnapshot::now().sensor(19.5).load(LoadState::On);
/// assert!(snapshot.vmax.is_none());
/// assert!(snapshot.target.is_none());
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StateSnapshot {
    /// When the snapshot was taken (ISO-8601, UTC).
    pub time: DateTime<Utc>,

    /// Latest sensor reading, offset already applied.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub sensor: Option<f64>,

    /// Upper threshold: at or above it the load is switched on.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub vmax: Option<f64>,

    /// Lower threshold: at or below it the load is switched off.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub vmin: Option<f64>,

    /// The load's observed state.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub load: Option<LoadState>,

    /// The last commanded state, when it disagrees with `load`.
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub target: Option<LoadState>,
}

impl StateSnapshot {
    /// Create an empty snapshot stamped with a specific time.
    pub fn at(time: DateTime<Utc>) -> Self {
        Self {
            time,
            sensor: None,
            vmax: None,
            vmin: None,
            load: None,
            target: None,
        }
    }

    /// Create an empty snapshot stamped with the current time.
    pub fn now() -> Self {
        Self::at(Utc::now())
    }

    pub fn sensor(mut self, value: impl Into<Option<f64>>) -> Self {
        self.sensor = value.into();
        self
    }

    /// Set both thresholds at once.
    pub fn thresholds(
        mut self,
        vmax: impl Into<Option<f64>>,
        vmin: impl Into<Option<f64>>,
    ) -> Self {
        self.vmax = vmax.into();
        self.vmin = vmin.into();
        self
    }

    pub fn load(mut self, state: impl Into<Option<LoadState>>) -> Self {
        self.load = state.into();
        self
    }

    pub fn target(mut self, state: impl Into<Option<LoadState>>) -> Self {
        self.target = state.into();
        self
    }
}
