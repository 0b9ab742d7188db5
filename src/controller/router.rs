//! Topic-to-handler routing.

use std::collections::BTreeMap;

use rumqttc::matches;

/// Identifies one of the controller's topic handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Route {
    Load,
    Sensor,
    ThresholdMax,
    ThresholdMin,
    /// A health monitor, by position.
    Health(usize),
}

/// Maps subscription filters to the handlers that consume them.
///
/// Several handlers may share a filter, and one inbound topic may match
/// several filters (`tele/+/SENSOR` and `tele/probe/SENSOR`); every match is
/// returned. Matching follows MQTT rules: `+` is one level, `#` the rest, and
/// `$`-prefixed system topics are never routed.
#[derive(Debug, Clone, Default)]
pub struct Router {
    routes: BTreeMap<String, Vec<Route>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under a topic filter.
    pub fn insert(&mut self, filter: impl Into<String>, route: Route) {
        let routes = self.routes.entry(filter.into()).or_default();
        if !routes.contains(&route) {
            routes.push(route);
        }
    }

    /// Every handler whose filter matches a concrete topic.
    pub fn resolve(&self, topic: &str) -> Vec<Route> {
        let mut matched: Vec<Route> = self
            .routes
            .iter()
            .filter(|(filter, _)| matches(topic, filter))
            .flat_map(|(_, routes)| routes.iter().copied())
            .collect();
        matched.sort();
        matched.dedup();
        matched
    }

    /// The distinct filters to subscribe to.
    pub fn filters(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }
}
