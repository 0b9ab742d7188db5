//! Liveness of upstream data sources.

use thermostt_types::HealthState;
use tracing::{debug, error};

use super::TopicHandler;
use crate::error::Result;
use crate::query::{coerce_string, Document, Extractor};

/// Classifies a liveness topic (typically a device's LWT) as healthy or not.
///
/// Any extracted value is stringified and checked against a whitelist: in the
/// list means [`HealthState::Healthy`], anything else, including a missing
/// value, means [`HealthState::Unhealthy`]. The state stays absent until the
/// first message; absence does not count against the controller's health.
#[derive(Debug)]
pub struct HealthMonitor {
    name: String,
    topic: String,
    extractor: Extractor,
    healthy: Vec<String>,
    value: Option<HealthState>,
}

impl HealthMonitor {
    /// Watch `tele/<name>/LWT`, treating `Online` as healthy.
    pub fn new(name: &str) -> Result<Self> {
        Ok(Self {
            name: name.to_string(),
            topic: format!("tele/{name}/LWT"),
            extractor: Extractor::new("payload")?,
            healthy: vec!["Online".to_string()],
            value: None,
        })
    }

    /// Replace the subscription topic.
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }

    /// Replace the query expression.
    pub fn with_query(mut self, query: &str) -> Result<Self> {
        self.extractor = Extractor::new(query)?;
        Ok(self)
    }

    /// Replace the values that mean healthy.
    pub fn with_healthy(mut self, healthy: Vec<String>) -> Self {
        self.healthy = healthy;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn query(&self) -> &str {
        self.extractor.expression()
    }

    pub fn healthy_values(&self) -> &[String] {
        &self.healthy
    }

    pub fn value(&self) -> Option<HealthState> {
        self.value
    }

    pub fn is_unhealthy(&self) -> bool {
        self.value == Some(HealthState::Unhealthy)
    }
}

impl TopicHandler for HealthMonitor {
    fn topic(&self) -> &str {
        &self.topic
    }

    fn label(&self) -> String {
        format!("health {}", self.name)
    }

    fn on_message(&mut self, document: &Document) {
        let found = match self.extractor.search(document) {
            Ok(found) => found,
            Err(e) => {
                error!(health = %self.name, "{}", e);
                return;
            }
        };

        let raw = coerce_string(&found);
        let state = if self.healthy.contains(&raw) {
            HealthState::Healthy
        } else {
            HealthState::Unhealthy
        };
        if self.value != Some(state) {
            debug!(health = %self.name, value = %raw, "{} is {}", self.name, state);
        }
        self.value = Some(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deliver(monitor: &mut HealthMonitor, body: &str) {
        monitor.on_message(&Document::decode(body.as_bytes()).unwrap());
    }

    #[test]
    fn test_defaults() {
        let monitor = HealthMonitor::new("heater").unwrap();
        assert_eq!(monitor.topic(), "tele/heater/LWT");
        assert_eq!(monitor.query(), "payload");
        assert_eq!(monitor.healthy_values(), ["Online".to_string()]);
        assert_eq!(monitor.value(), None);
        assert!(!monitor.is_unhealthy());
    }

    #[test]
    fn test_classification() {
        let mut monitor = HealthMonitor::new("heater").unwrap();
        deliver(&mut monitor, "Online");
        assert_eq!(monitor.value(), Some(HealthState::Healthy));
        deliver(&mut monitor, "Offline");
        assert_eq!(monitor.value(), Some(HealthState::Unhealthy));
    }

    #[test]
    fn test_missing_value_is_unhealthy() {
        let mut monitor = HealthMonitor::new("bridge")
            .unwrap()
            .with_query("payload.status")
            .unwrap();
        deliver(&mut monitor, r#"{"status":"Online"}"#);
        deliver(&mut monitor, r#"{"uptime":12}"#);
        assert!(monitor.is_unhealthy());
    }

    #[test]
    fn test_custom_whitelist() {
        let mut monitor = HealthMonitor::new("bridge")
            .unwrap()
            .with_healthy(vec!["up".to_string(), "1".to_string()]);
        deliver(&mut monitor, "1");
        assert_eq!(monitor.value(), Some(HealthState::Healthy));
        deliver(&mut monitor, "Online");
        assert!(monitor.is_unhealthy());
    }

    #[test]
    fn test_evaluation_error_keeps_previous() {
        let mut monitor = HealthMonitor::new("bridge")
            .unwrap()
            .with_query("keys(payload)[0]")
            .unwrap();
        deliver(&mut monitor, r#"{"Offline":true}"#);
        assert_eq!(monitor.value(), Some(HealthState::Unhealthy));
        // keys() of a string fails to evaluate
        deliver(&mut monitor, "Online");
        assert_eq!(monitor.value(), Some(HealthState::Unhealthy));
    }
}
