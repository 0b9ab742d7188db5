//! The controlled load.

use thermostt_types::LoadState;
use tracing::{error, warn};

use super::TopicHandler;
use crate::controller::Publication;
use crate::error::Result;
use crate::query::{coerce_string, Document, Extractor};

/// How one symbolic state maps onto the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateBinding {
    /// Raw reported values that mean "the load is in this state".
    pub values: Vec<String>,
    /// Where to publish to drive the load into this state.
    pub command_topic: String,
    /// What to publish to drive the load into this state.
    pub command_payload: String,
}

impl StateBinding {
    /// Bind a set of raw values, commanding with the first of them.
    pub fn new(values: Vec<String>, command_topic: impl Into<String>) -> Self {
        let command_payload = values.first().cloned().unwrap_or_default();
        Self {
            values,
            command_topic: command_topic.into(),
            command_payload,
        }
    }

    pub fn contains(&self, raw: &str) -> bool {
        self.values.iter().any(|v| v == raw)
    }
}

/// The device the controller switches, e.g. a Tasmota relay.
///
/// The actuator tracks the raw value the device last reported and answers
/// "is the load in state X?" by set membership rather than identity: a state
/// may be reported as several equivalent strings. Sets may overlap; the
/// default Emergency set is `["OFF"]`, the same as Off, so a load that is off
/// already satisfies an emergency. Where a single answer is needed,
/// [`LoadActuator::state`] resolves overlaps in Off > On > Emergency order.
///
/// # Example
///
/// ```
/// use thermostt::query::Document;
/// use thermostt::signal::{LoadActuator, TopicHandler};
/// use thermostt_types::LoadState;
///
/// let mut load = LoadActuator::new("heater").unwrap();
/// load.on_message(&Document::decode(br#"{"POWER":"OFF"}"#).unwrap());
///
/// assert!(load.is(LoadState::Off));
/// assert!(load.is(LoadState::Emergency));
/// assert_eq!(load.state(), Some(LoadState::Off));
/// ```
#[derive(Debug)]
pub struct LoadActuator {
    name: String,
    topic: String,
    extractor: Extractor,
    off: StateBinding,
    on: StateBinding,
    emergency: StateBinding,
    value: Option<String>,
}

impl LoadActuator {
    /// A Tasmota-style relay: state on `tele/<name>/STATE`, commands on
    /// `cmnd/<name>/POWER`.
    pub fn new(name: &str) -> Result<Self> {
        let command_topic = format!("cmnd/{name}/POWER");
        Ok(Self {
            name: name.to_string(),
            topic: format!("tele/{name}/STATE"),
            extractor: Extractor::new("payload.POWER")?,
            off: StateBinding::new(vec!["OFF".to_string()], &command_topic),
            on: StateBinding::new(vec!["ON".to_string()], &command_topic),
            emergency: StateBinding::new(vec!["OFF".to_string()], &command_topic),
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

    /// Replace the raw values that mean `state`.
    ///
    /// The command payload is left as is; use [`LoadActuator::with_command`]
    /// to change it.
    pub fn with_values(mut self, state: LoadState, values: Vec<String>) -> Self {
        self.binding_mut(state).values = values;
        self
    }

    /// Replace the command used to drive the load into `state`.
    pub fn with_command(
        mut self,
        state: LoadState,
        topic: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        let binding = self.binding_mut(state);
        binding.command_topic = topic.into();
        binding.command_payload = payload.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn query(&self) -> &str {
        self.extractor.expression()
    }

    pub fn binding(&self, state: LoadState) -> &StateBinding {
        match state {
            LoadState::Off => &self.off,
            LoadState::On => &self.on,
            LoadState::Emergency => &self.emergency,
        }
    }

    fn binding_mut(&mut self, state: LoadState) -> &mut StateBinding {
        match state {
            LoadState::Off => &mut self.off,
            LoadState::On => &mut self.on,
            LoadState::Emergency => &mut self.emergency,
        }
    }

    /// Whether `raw` is one of the values configured for `state`.
    pub fn matches(&self, raw: &str, state: LoadState) -> bool {
        self.binding(state).contains(raw)
    }

    /// Whether the last reported value belongs to `state`.
    ///
    /// False while nothing has been reported.
    pub fn is(&self, state: LoadState) -> bool {
        self.value
            .as_deref()
            .is_some_and(|raw| self.matches(raw, state))
    }

    /// The reported state, resolving overlaps by precedence.
    pub fn state(&self) -> Option<LoadState> {
        LoadState::ALL.into_iter().find(|state| self.is(*state))
    }

    /// The raw value last reported by the device.
    pub fn raw_value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// The publication that drives the load into `state`.
    pub fn command(&self, state: LoadState) -> Publication {
        let binding = self.binding(state);
        Publication::new(&binding.command_topic, &binding.command_payload)
    }
}

impl TopicHandler for LoadActuator {
    fn topic(&self) -> &str {
        &self.topic
    }

    fn label(&self) -> String {
        format!("load {}", self.name)
    }

    fn on_message(&mut self, document: &Document) {
        let found = match self.extractor.search(document) {
            Ok(found) => found,
            Err(e) => {
                error!(load = %self.name, "{}", e);
                return;
            }
        };

        let raw = coerce_string(&found);
        if LoadState::ALL
            .into_iter()
            .any(|state| self.matches(&raw, state))
        {
            self.value = Some(raw);
        } else {
            warn!(load = %self.name, "Unhandled value {}", raw);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deliver(load: &mut LoadActuator, body: &str) {
        load.on_message(&Document::decode(body.as_bytes()).unwrap());
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_defaults() {
        let load = LoadActuator::new("heater").unwrap();
        assert_eq!(load.topic(), "tele/heater/STATE");
        assert_eq!(load.query(), "payload.POWER");
        for state in LoadState::ALL {
            assert_eq!(load.binding(state).command_topic, "cmnd/heater/POWER");
        }
        assert_eq!(load.binding(LoadState::On).command_payload, "ON");
        assert_eq!(load.binding(LoadState::Emergency).values, strings(&["OFF"]));
        assert_eq!(load.state(), None);
    }

    #[test]
    fn test_membership_not_identity() {
        let mut load = LoadActuator::new("heater")
            .unwrap()
            .with_values(LoadState::Off, strings(&["OFF", "0"]))
            .with_values(LoadState::On, strings(&["ON", "1"]));

        deliver(&mut load, r#"{"POWER":"0"}"#);
        assert!(load.is(LoadState::Off));
        assert!(!load.is(LoadState::On));
        assert_eq!(load.raw_value(), Some("0"));

        deliver(&mut load, r#"{"POWER":1}"#);
        assert!(load.is(LoadState::On));
        assert_eq!(load.state(), Some(LoadState::On));
    }

    #[test]
    fn test_overlap_resolved_by_precedence() {
        let mut load = LoadActuator::new("heater")
            .unwrap()
            .with_values(LoadState::On, strings(&["ON", "OFF"]));
        deliver(&mut load, r#"{"POWER":"OFF"}"#);
        assert!(load.is(LoadState::On));
        assert_eq!(load.state(), Some(LoadState::Off));
    }

    #[test]
    fn test_unhandled_value_keeps_previous() {
        let mut load = LoadActuator::new("heater").unwrap();
        deliver(&mut load, r#"{"POWER":"ON"}"#);
        deliver(&mut load, r#"{"POWER":"0.5"}"#);
        assert_eq!(load.raw_value(), Some("ON"));
    }

    #[test]
    fn test_miss_keeps_previous() {
        let mut load = LoadActuator::new("heater").unwrap();
        deliver(&mut load, r#"{"POWER":"ON"}"#);
        deliver(&mut load, r#"{"Uptime":"1T00:00:00"}"#);
        assert_eq!(load.state(), Some(LoadState::On));
    }

    #[test]
    fn test_custom_command() {
        let load = LoadActuator::new("heater").unwrap().with_command(
            LoadState::Emergency,
            "cmnd/heater/Backlog",
            "POWER OFF; BUZZER 3",
        );
        let command = load.command(LoadState::Emergency);
        assert_eq!(command.topic, "cmnd/heater/Backlog");
        assert_eq!(command.payload, "POWER OFF; BUZZER 3");
        assert_eq!(load.command(LoadState::Off).payload, "OFF");
    }

    #[test]
    fn test_command_payload_follows_first_value() {
        let binding = StateBinding::new(strings(&["1", "ON"]), "cmnd/heater/POWER");
        assert_eq!(binding.command_payload, "1");
        assert!(binding.contains("ON"));
    }
}
