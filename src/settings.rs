//! Layered configuration.
//!
//! Settings are resolved from, in increasing priority:
//!
//! 1. built-in defaults
//! 2. an optional TOML file
//! 3. `THERMOSTT_*` environment variables
//! 4. command-line flags
//!
//! # Configuration
//!
//! ```toml
//! name = "thermostat"
//! server = "mqtt.local"
//!
//! [load]
//! name = "heater"
//!
//! [load.emergency]
//! values = ["OFF"]
//! topic = "cmnd/heater/Backlog"
//! payload = "POWER OFF"
//!
//! [sensor]
//! name = "28FF641E8216C3A1"
//! delta = -0.5
//!
//! [[health]]
//! name = "zigbee-bridge"
//! topic = "zigbee2mqtt/bridge/state"
//! query = "payload.state"
//! healthy = ["online"]
//! ```
//!
//! Nested keys in the environment are separated by `__` and lists by `,`,
//! e.g. `THERMOSTT_LOAD__NAME=heater` or `THERMOSTT_LOAD__ON__VALUES=ON,1`.

use std::path::Path;

use config::{Config, Environment, File};
use serde::{Deserialize, Deserializer};
use thermostt_types::LoadState;
use tracing::info;

use crate::controller::{Controller, Suppression};
use crate::error::{Error, Result};
use crate::signal::{HealthMonitor, LoadActuator, ObservedSignal, TopicHandler};

const ENV_PREFIX: &str = "THERMOSTT";

/// Everything needed to build a controller and connect it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Controller name; also the default threshold name and the basis of the
    /// liveness and state topics.
    pub name: String,
    /// MQTT broker host. Required.
    pub server: Option<String>,
    pub port: u16,
    /// Defaults to `name`.
    pub client_id: Option<String>,
    pub keep_alive_secs: u64,
    pub state_topic: Option<String>,
    pub lwt_topic: Option<String>,
    pub suppression: Suppression,
    pub load: LoadSettings,
    pub sensor: SignalSettings,
    pub vmax: SignalSettings,
    pub vmin: SignalSettings,
    pub sensor_health: HealthSettings,
    pub load_health: HealthSettings,
    /// Additional monitors, evaluated after the sensor and load monitors.
    pub health: Vec<HealthSettings>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            name: "thermostt".to_string(),
            server: None,
            port: 1883,
            client_id: None,
            keep_alive_secs: 60,
            state_topic: None,
            lwt_topic: None,
            suppression: Suppression::default(),
            load: LoadSettings::default(),
            sensor: SignalSettings::default(),
            vmax: SignalSettings::default(),
            vmin: SignalSettings::default(),
            sensor_health: HealthSettings::default(),
            load_health: HealthSettings::default(),
            health: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoadSettings {
    /// Device name. Required.
    pub name: Option<String>,
    pub topic: Option<String>,
    pub query: Option<String>,
    pub off: StateSettings,
    pub on: StateSettings,
    pub emergency: StateSettings,
}

/// Overrides for one load state.
///
/// When `values` is set and `payload` is not, the command payload becomes the
/// first of the new values.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct StateSettings {
    #[serde(deserialize_with = "comma_list")]
    pub values: Option<Vec<String>>,
    pub topic: Option<String>,
    pub payload: Option<String>,
}

/// Overrides for the sensor or a threshold.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SignalSettings {
    pub name: Option<String>,
    pub topic: Option<String>,
    pub query: Option<String>,
    pub delta: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct HealthSettings {
    pub name: Option<String>,
    pub topic: Option<String>,
    pub query: Option<String>,
    #[serde(deserialize_with = "comma_list")]
    pub healthy: Option<Vec<String>>,
}

/// Values given on the command line. `None` leaves lower layers in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CliOverrides {
    pub server: Option<String>,
    pub port: Option<u16>,
    pub name: Option<String>,
    pub load: Option<String>,
    pub sensor: Option<String>,
    pub sensor_delta: Option<f64>,
    pub state_topic: Option<String>,
    pub lwt_topic: Option<String>,
}

impl Settings {
    /// Resolve settings from every layer and check the required keys.
    pub fn load(path: Option<&Path>, cli: &CliOverrides) -> Result<Self> {
        Self::load_with(path, cli, environment())
    }

    fn load_with(path: Option<&Path>, cli: &CliOverrides, env: Environment) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }

        let settings: Settings = builder
            .add_source(env)
            .set_override_option("server", cli.server.clone())?
            .set_override_option("port", cli.port.map(i64::from))?
            .set_override_option("name", cli.name.clone())?
            .set_override_option("load.name", cli.load.clone())?
            .set_override_option("sensor.name", cli.sensor.clone())?
            .set_override_option("sensor.delta", cli.sensor_delta)?
            .set_override_option("state_topic", cli.state_topic.clone())?
            .set_override_option("lwt_topic", cli.lwt_topic.clone())?
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        required(&self.server, "server")?;
        required(&self.load.name, "load.name")?;
        required(&self.sensor.name, "sensor.name")?;
        for extra in &self.health {
            required(&extra.name, "health.name")?;
        }
        Ok(())
    }

    pub fn client_id(&self) -> &str {
        self.client_id.as_deref().unwrap_or(&self.name)
    }

    /// Construct the controller, compiling every query and checking every
    /// topic.
    pub fn build_controller(&self) -> Result<Controller> {
        let load_name = required(&self.load.name, "load.name")?;
        let sensor_name = required(&self.sensor.name, "sensor.name")?;

        let load = self.load.build(load_name)?;
        let sensor = self.sensor.apply(ObservedSignal::sensor(sensor_name)?)?;
        let vmax = self.vmax.apply(ObservedSignal::threshold_max(
            self.vmax.name.as_deref().unwrap_or(&self.name),
        )?)?;
        let vmin = self.vmin.apply(ObservedSignal::threshold_min(
            self.vmin.name.as_deref().unwrap_or(&self.name),
        )?)?;

        let mut health = vec![
            self.sensor_health
                .build(self.sensor_health.name.as_deref().unwrap_or(sensor_name))?,
            self.load_health
                .build(self.load_health.name.as_deref().unwrap_or(load_name))?,
        ];
        for extra in &self.health {
            health.push(extra.build(required(&extra.name, "health.name")?)?);
        }

        let mut controller = Controller::new(&self.name, load, sensor, vmax, vmin, health)
            .with_suppression(self.suppression);
        if let Some(topic) = &self.lwt_topic {
            controller = controller.with_lwt_topic(topic);
        }
        if let Some(topic) = &self.state_topic {
            controller = controller.with_state_topic(topic);
        }
        controller.validate()?;
        Ok(controller)
    }

    /// Log the resolved connection settings and the controller's wiring.
    pub fn log_summary(&self, controller: &Controller) {
        info!("  server: {}:{}", self.server.as_deref().unwrap_or_default(), self.port);
        info!("  client id: {}", self.client_id());
        info!("  name: {}", controller.name());
        info!("  suppression: {:?}", self.suppression);

        let load = controller.load();
        info!("  load: {} on {} ({})", load.name(), load.topic(), load.query());
        for state in LoadState::ALL {
            let binding = load.binding(state);
            info!(
                "    {}: {:?} via {}: {}",
                state, binding.values, binding.command_topic, binding.command_payload
            );
        }

        for signal in [controller.sensor(), controller.vmax(), controller.vmin()] {
            info!(
                "  {}: {} on {} ({}) delta {}",
                signal.kind(),
                signal.name(),
                signal.topic(),
                signal.query(),
                signal.delta()
            );
        }

        for monitor in controller.health() {
            info!(
                "  health: {} on {} ({}) healthy {:?}",
                monitor.name(),
                monitor.topic(),
                monitor.query(),
                monitor.healthy_values()
            );
        }

        info!("  lwt topic: {}", controller.lwt_topic());
        info!("  state topic: {}", controller.state_topic());
    }
}

impl LoadSettings {
    fn build(&self, name: &str) -> Result<LoadActuator> {
        let mut load = LoadActuator::new(name)?;
        if let Some(topic) = &self.topic {
            load = load.with_topic(topic);
        }
        if let Some(query) = &self.query {
            load = load.with_query(query)?;
        }

        for (state, overrides) in [
            (LoadState::Off, &self.off),
            (LoadState::On, &self.on),
            (LoadState::Emergency, &self.emergency),
        ] {
            let current = load.binding(state).clone();
            let payload = match (&overrides.payload, &overrides.values) {
                (Some(payload), _) => payload.clone(),
                (None, Some(values)) => values.first().cloned().unwrap_or_default(),
                (None, None) => current.command_payload,
            };
            let topic = overrides.topic.clone().unwrap_or(current.command_topic);
            if let Some(values) = &overrides.values {
                load = load.with_values(state, values.clone());
            }
            load = load.with_command(state, topic, payload);
        }
        Ok(load)
    }
}

impl SignalSettings {
    fn apply(&self, mut signal: ObservedSignal) -> Result<ObservedSignal> {
        if let Some(topic) = &self.topic {
            signal = signal.with_topic(topic);
        }
        if let Some(query) = &self.query {
            signal = signal.with_query(query)?;
        }
        Ok(signal.with_delta(self.delta))
    }
}

impl HealthSettings {
    fn build(&self, name: &str) -> Result<HealthMonitor> {
        let mut monitor = HealthMonitor::new(name)?;
        if let Some(topic) = &self.topic {
            monitor = monitor.with_topic(topic);
        }
        if let Some(query) = &self.query {
            monitor = monitor.with_query(query)?;
        }
        if let Some(healthy) = &self.healthy {
            monitor = monitor.with_healthy(healthy.clone());
        }
        Ok(monitor)
    }
}

/// Environment values are kept as strings; ids such as `0316279104` must
/// not lose their leading zero. Numeric settings parse during deserialization.
fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
}

/// A list given either as a sequence or as one comma separated string.
fn comma_list<'de, D>(deserializer: D) -> std::result::Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Values {
        List(Vec<String>),
        Joined(String),
    }

    let values = Option::<Values>::deserialize(deserializer)?;
    Ok(values.map(|values| match values {
        Values::List(list) => list,
        Values::Joined(joined) => joined.split(',').map(str::to_string).collect(),
    }))
}

fn required<'a>(value: &'a Option<String>, key: &str) -> Result<&'a str> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::Config(format!("missing required setting `{key}`")))
}
