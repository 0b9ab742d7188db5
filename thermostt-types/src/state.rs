//! Symbolic states the controller reasons about.

use core::fmt;

/// Symbolic state of the controlled load.
///
/// Devices report arbitrary raw strings ("OFF", "0", "off"); the controller
/// maps those onto this closed set and never reasons about raw values
/// directly. When a raw value belongs to several states, the earlier
/// variant in [`LoadState::ALL`] wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LoadState {
    /// Q0: load switched off by the hysteresis rule.
    Off,
    /// Q1: load switched on by the hysteresis rule.
    On,
    /// Qe: the state commanded when inputs cannot be trusted.
    Emergency,
}

impl LoadState {
    /// Every state, in matching precedence order.
    pub const ALL: [LoadState; 3] = [LoadState::Off, LoadState::On, LoadState::Emergency];

    /// Returns the name used in logs and in published snapshots.
    pub fn name(&self) -> &'static str {
        match self {
            LoadState::Off => "Off",
            LoadState::On => "On",
            LoadState::Emergency => "Emergency",
        }
    }
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Classification of an upstream data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum HealthState {
    Healthy,
    Unhealthy,
}

impl HealthState {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthState::Healthy)
    }
}

impl fmt::Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthState::Healthy => f.write_str("Healthy"),
            HealthState::Unhealthy => f.write_str("Unhealthy"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence_order() {
        assert_eq!(LoadState::ALL[0], LoadState::Off);
        assert_eq!(LoadState::ALL[2], LoadState::Emergency);
        assert!(LoadState::Off < LoadState::On);
    }

    #[test]
    fn test_display_names() {
        assert_eq!(LoadState::Emergency.to_string(), "Emergency");
        assert_eq!(HealthState::Unhealthy.to_string(), "Unhealthy");
        assert!(HealthState::Healthy.is_healthy());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serializes_as_name() {
        assert_eq!(serde_json::to_string(&LoadState::On).unwrap(), "\"On\"");
    }
}
