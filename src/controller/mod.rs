//! The hysteresis controller.
//!
//! [`Controller`] is the composition root: it owns the load, the sensor, both
//! thresholds and every health monitor, routes inbound messages to them, and
//! decides what (if anything) to command.
//!
//! ## Decision Pass
//!
//! Every inbound message triggers exactly one pass:
//!
//! ```text
//! route to handlers ──▶ health gate ──┬── closed ──▶ Emergency (unless load already is)
//!                                     │
//!                                     └── open ────▶ sensor >= vmax ──▶ On
//!                                                    sensor <= vmin ──▶ Off
//!                       ──▶ liveness (Online | Error) ──▶ state snapshot
//! ```
//!
//! Liveness and the snapshot are published after every pass, whether or not
//! anything was commanded. Nothing is timer driven: no messages, no passes.

mod publication;
mod router;

pub use publication::Publication;
pub use router::{Route, Router};

use serde::Deserialize;
use thermostt_types::{Liveness, LoadState, StateSnapshot};
use tracing::{debug, error, info, trace};

use crate::error::{Error, Result};
use crate::query::Document;
use crate::signal::{HealthMonitor, LoadActuator, ObservedSignal, TopicHandler};

/// When a repeated crossing is allowed to command the load again.
///
/// Both rules command the first time a threshold is crossed. They differ when
/// the device does not follow the command: `CommandedOrObserved` keeps
/// re-sending on every message while the load still reports the opposite
/// state, `CommandedOnly` sends once and waits for the other threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Suppression {
    /// Command On when the load reports Off or On was not the last command
    /// (and symmetrically for Off).
    #[default]
    CommandedOrObserved,
    /// Command On only when On was not the last command.
    CommandedOnly,
}

/// Readings that pass the health gate.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Readings {
    sensor: f64,
    vmax: f64,
    vmin: f64,
}

/// Drives one load from one sensor between two thresholds.
///
/// # Example
///
/// ```
/// use thermostt::controller::Controller;
/// use thermostt::signal::{HealthMonitor, LoadActuator, ObservedSignal};
///
/// let mut controller = Controller::new(
///     "thermostat",
///     LoadActuator::new("heater").unwrap(),
///     ObservedSignal::sensor("probe").unwrap(),
///     ObservedSignal::threshold_max("thermostat").unwrap(),
///     ObservedSignal::threshold_min("thermostat").unwrap(),
///     vec![HealthMonitor::new("heater").unwrap()],
/// );
///
/// controller.on_message("tele/heater/STATE", br#"{"POWER":"OFF"}"#);
/// controller.on_message("cmnd/thermostat/vmax", b"20");
/// controller.on_message("cmnd/thermostat/vmin", b"18");
/// controller.on_message("tele/bridge/SENSOR", br#"{"DS18B20":{"Id":"probe","Temperature":19.5}}"#);
///
/// let out = controller.on_message(
///     "tele/bridge/SENSOR",
///     br#"{"DS18B20":{"Id":"probe","Temperature":20.1}}"#,
/// );
/// assert_eq!(out[0].topic, "cmnd/heater/POWER");
/// assert_eq!(out[0].payload, "ON");
/// ```
#[derive(Debug)]
pub struct Controller {
    name: String,
    load: LoadActuator,
    sensor: ObservedSignal,
    vmax: ObservedSignal,
    vmin: ObservedSignal,
    health: Vec<HealthMonitor>,
    router: Router,
    suppression: Suppression,
    target: Option<LoadState>,
    lwt_topic: String,
    state_topic: String,
}

impl Controller {
    /// Assemble a controller from already constructed components.
    ///
    /// Liveness goes to `tele/<name>/LWT` and snapshots to
    /// `tele/<name>/STATE`, dots in `name` replaced by underscores.
    pub fn new(
        name: impl Into<String>,
        load: LoadActuator,
        sensor: ObservedSignal,
        vmax: ObservedSignal,
        vmin: ObservedSignal,
        health: Vec<HealthMonitor>,
    ) -> Self {
        let name = name.into();

        let mut router = Router::new();
        router.insert(load.topic(), Route::Load);
        router.insert(sensor.topic(), Route::Sensor);
        router.insert(vmax.topic(), Route::ThresholdMax);
        router.insert(vmin.topic(), Route::ThresholdMin);
        for (index, monitor) in health.iter().enumerate() {
            router.insert(monitor.topic(), Route::Health(index));
        }

        Self {
            lwt_topic: format!("tele/{name}/LWT").replace('.', "_"),
            state_topic: format!("tele/{name}/STATE").replace('.', "_"),
            name,
            load,
            sensor,
            vmax,
            vmin,
            health,
            router,
            suppression: Suppression::default(),
            target: None,
        }
    }

    pub fn with_lwt_topic(mut self, topic: impl Into<String>) -> Self {
        self.lwt_topic = topic.into();
        self
    }

    pub fn with_state_topic(mut self, topic: impl Into<String>) -> Self {
        self.state_topic = topic.into();
        self
    }

    pub fn with_suppression(mut self, suppression: Suppression) -> Self {
        self.suppression = suppression;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn load(&self) -> &LoadActuator {
        &self.load
    }

    pub fn sensor(&self) -> &ObservedSignal {
        &self.sensor
    }

    pub fn vmax(&self) -> &ObservedSignal {
        &self.vmax
    }

    pub fn vmin(&self) -> &ObservedSignal {
        &self.vmin
    }

    pub fn health(&self) -> &[HealthMonitor] {
        &self.health
    }

    pub fn lwt_topic(&self) -> &str {
        &self.lwt_topic
    }

    pub fn state_topic(&self) -> &str {
        &self.state_topic
    }

    /// The last state this controller commanded, if any.
    pub fn target(&self) -> Option<LoadState> {
        self.target
    }

    /// The distinct topic filters the session must subscribe to.
    pub fn subscriptions(&self) -> Vec<String> {
        self.router.filters().map(str::to_string).collect()
    }

    /// Check every configured topic before the controller goes live.
    ///
    /// Subscriptions must be valid MQTT filters; liveness, state and command
    /// topics must be concrete topics without wildcards.
    pub fn validate(&self) -> Result<()> {
        for filter in self.router.filters() {
            if !rumqttc::valid_filter(filter) {
                return Err(Error::Config(format!("invalid topic filter {filter:?}")));
            }
        }

        let commands = LoadState::ALL
            .into_iter()
            .map(|state| self.load.binding(state).command_topic.as_str());
        let reports = [self.lwt_topic.as_str(), self.state_topic.as_str()];
        for topic in reports.into_iter().chain(commands) {
            if !rumqttc::valid_topic(topic) {
                return Err(Error::Config(format!("invalid publish topic {topic:?}")));
            }
        }
        Ok(())
    }

    /// The aggregate health gate.
    ///
    /// Open when the load, the sensor and both thresholds have all reported
    /// and no health monitor reports unhealthy. Monitors that have not
    /// reported yet do not close the gate.
    pub fn is_healthy(&self) -> bool {
        self.readings().is_some()
    }

    fn readings(&self) -> Option<Readings> {
        self.load.raw_value()?;
        if self.health.iter().any(HealthMonitor::is_unhealthy) {
            return None;
        }
        Some(Readings {
            sensor: self.sensor.value()?,
            vmax: self.vmax.value()?,
            vmin: self.vmin.value()?,
        })
    }

    /// Process one inbound message.
    ///
    /// Returns the publications to emit, in order: any actuation commands,
    /// then liveness, then the state snapshot. A body that is not UTF-8 is
    /// dropped and yields nothing.
    pub fn on_message(&mut self, topic: &str, payload: &[u8]) -> Vec<Publication> {
        let document = match Document::decode(payload) {
            Ok(document) => document,
            Err(e) => {
                error!(topic, "{}", e);
                return Vec::new();
            }
        };
        trace!(topic, %document, "Received");

        let routes = self.router.resolve(topic);
        if routes.is_empty() {
            debug!(topic, "No handler for topic");
        }
        for route in routes {
            self.handler_mut(route).on_message(&document);
        }

        let mut publications = self.decide();
        publications.push(self.liveness());
        publications.extend(self.state());
        publications
    }

    fn handler_mut(&mut self, route: Route) -> &mut dyn TopicHandler {
        match route {
            Route::Load => &mut self.load,
            Route::Sensor => &mut self.sensor,
            Route::ThresholdMax => &mut self.vmax,
            Route::ThresholdMin => &mut self.vmin,
            Route::Health(index) => &mut self.health[index],
        }
    }

    /// Run the health gate and the hysteresis rule once.
    ///
    /// When `vmax <= vmin` both crossings can fire in one pass; the Off
    /// command is evaluated second and wins the target.
    fn decide(&mut self) -> Vec<Publication> {
        let mut commands = Vec::new();

        match self.readings() {
            Some(Readings { sensor, vmax, vmin }) => {
                if sensor >= vmax && self.should_command(LoadState::On, LoadState::Off) {
                    commands.push(self.command(LoadState::On));
                }
                if sensor <= vmin && self.should_command(LoadState::Off, LoadState::On) {
                    commands.push(self.command(LoadState::Off));
                }
            }
            None if !self.load.is(LoadState::Emergency) => {
                commands.push(self.command(LoadState::Emergency));
            }
            None => {}
        }

        commands
    }

    fn should_command(&self, wanted: LoadState, opposite: LoadState) -> bool {
        let commanded = self.target != Some(wanted);
        match self.suppression {
            Suppression::CommandedOrObserved => commanded || self.load.is(opposite),
            Suppression::CommandedOnly => commanded,
        }
    }

    fn command(&mut self, state: LoadState) -> Publication {
        self.target = Some(state);
        let publication = self.load.command(state);
        info!(
            "Switching to {} with {}: {}",
            state, publication.topic, publication.payload
        );
        publication
    }

    /// The liveness publication for the current health gate.
    pub fn liveness(&self) -> Publication {
        Publication::new(&self.lwt_topic, Liveness::from_health(self.is_healthy()).as_str())
    }

    /// The liveness publication to send as soon as a session connects.
    pub fn announce(&self) -> Publication {
        self.liveness()
    }

    /// The session's last will: `Offline` on the liveness topic.
    pub fn last_will(&self) -> Publication {
        Publication::new(&self.lwt_topic, Liveness::Offline.as_str())
    }

    /// Everything the controller currently knows.
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot::now()
            .sensor(self.sensor.value())
            .thresholds(self.vmax.value(), self.vmin.value())
            .load(self.load.state())
            .target(self.target.filter(|target| !self.load.is(*target)))
    }

    fn state(&self) -> Option<Publication> {
        match serde_json::to_string(&self.snapshot()) {
            Ok(json) => Some(Publication::new(&self.state_topic, json)),
            Err(e) => {
                error!("Error serializing state: {}", e);
                None
            }
        }
    }
}
