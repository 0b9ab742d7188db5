//! # thermostt
//!
//! A reactive hysteresis thermostat driven entirely by MQTT telemetry.
//!
//! The controller listens to a temperature sensor, two threshold topics, the
//! controlled load's reported state and any number of liveness topics. After
//! every inbound message it re-evaluates a single rule: switch the load On
//! when the temperature reaches the upper threshold, Off when it reaches the
//! lower one, and into a safe Emergency state whenever any input is missing
//! or unhealthy.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                           session                            │
//! │  ┌────────┐  publish   ┌────────────┐  route   ┌───────────┐ │
//! │  │ broker │──────────▶│ controller │────────▶│  signal   │ │
//! │  │(rumqttc)│◀──────────│ (decision) │◀────────│ (values)  │ │
//! │  └────────┘  commands  └────────────┘  latch   └─────┬─────┘ │
//! │              liveness                                │       │
//! │              state                             ┌─────▼─────┐ │
//! │                                                │   query   │ │
//! │                                                │ (JMESPath)│ │
//! │                                                └───────────┘ │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **[`query`]**: payload decoding, compiled JMESPath [`Extractor`]s and the
//!   shared number/string coercions
//! - **[`signal`]**: the topic-bound components ([`ObservedSignal`],
//!   [`LoadActuator`], [`HealthMonitor`]) that latch the last good value
//! - **[`controller`]**: topic routing, the health gate and hysteresis rule,
//!   and the publications that result
//! - **[`session`]**: the rumqttc connection that feeds the controller
//! - **[`settings`]**: layered configuration and controller construction
//!
//! ## Usage
//!
//! ### As a CLI tool
//!
//! ```bash
//! thermostt --server mqtt.local --load heater --sensor 28FF641E8216C3A1
//!
//! # With a configuration file for the full per-component surface
//! thermostt --config thermostt.toml
//! ```
//!
//! ### As a library, without a broker
//!
//! ```
//! use thermostt::{Controller, HealthMonitor, LoadActuator, ObservedSignal};
//!
//! let mut controller = Controller::new(
//!     "thermostat",
//!     LoadActuator::new("heater")?,
//!     ObservedSignal::sensor("probe")?,
//!     ObservedSignal::threshold_max("thermostat")?,
//!     ObservedSignal::threshold_min("thermostat")?,
//!     vec![HealthMonitor::new("heater")?],
//! );
//!
//! for publication in controller.on_message("cmnd/thermostat/vmax", b"21.5") {
//!     println!("{publication}");
//! }
//! # Ok::<(), thermostt::Error>(())
//! ```
//!
//! ### Connected to a broker
//!
//! ```no_run
//! use thermostt::{CliOverrides, Session, SessionOptions, Settings};
//!
//! # tokio_test::block_on(async {
//! let overrides = CliOverrides {
//!     server: Some("mqtt.local".to_string()),
//!     load: Some("heater".to_string()),
//!     sensor: Some("probe".to_string()),
//!     ..Default::default()
//! };
//! let settings = Settings::load(None, &overrides)?;
//! let session = Session::new(settings.build_controller()?, &SessionOptions::from_settings(&settings)?);
//! session.run().await?;
//! # Ok::<(), anyhow::Error>(())
//! # });
//! ```

pub mod controller;
pub mod error;
pub mod query;
pub mod session;
pub mod settings;
pub mod signal;

// Re-export main types for convenience
pub use controller::{Controller, Publication, Suppression};
pub use error::{Error, Result};
pub use query::{Document, Extractor};
pub use session::{Session, SessionOptions, Transport};
pub use settings::{CliOverrides, Settings};
pub use signal::{HealthMonitor, LoadActuator, ObservedSignal, SignalKind, TopicHandler};
pub use thermostt_types::{HealthState, Liveness, LoadState, StateSnapshot};
