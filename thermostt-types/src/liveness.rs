//! Liveness payloads published on the controller's LWT topic.

use core::fmt;

/// What the controller announces about itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Liveness {
    /// Connected and every input is trustworthy.
    Online,
    /// Connected, but the health gate is closed.
    Error,
    /// Registered as the session's last will; sent by the broker on disconnect.
    Offline,
}

impl Liveness {
    /// Map the aggregate health gate onto a connected liveness value.
    pub fn from_health(healthy: bool) -> Self {
        if healthy {
            Liveness::Online
        } else {
            Liveness::Error
        }
    }

    /// The raw payload string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Liveness::Online => "Online",
            Liveness::Error => "Error",
            Liveness::Offline => "Offline",
        }
    }
}

impl fmt::Display for Liveness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_health() {
        assert_eq!(Liveness::from_health(true), Liveness::Online);
        assert_eq!(Liveness::from_health(false), Liveness::Error);
        assert_eq!(Liveness::Offline.to_string(), "Offline");
    }
}
