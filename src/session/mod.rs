//! MQTT session glue.
//!
//! A [`Session`] owns the broker connection and the [`Controller`]. One task
//! polls the rumqttc event loop and feeds every inbound publish through the
//! controller; the controller itself never touches the network.
//!
//! # Usage
//!
//! ```rust,no_run
//! use thermostt::session::{Session, SessionOptions};
//! use thermostt::settings::{CliOverrides, Settings};
//!
//! # tokio_test::block_on(async {
//! let settings = Settings::load(None, &CliOverrides::default())?;
//! let controller = settings.build_controller()?;
//! let options = SessionOptions::from_settings(&settings)?;
//!
//! Session::new(controller, &options).run().await?;
//! # Ok::<(), anyhow::Error>(())
//! # });
//! ```

use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, LastWill, MqttOptions, Outgoing, Packet, QoS};
use tracing::{debug, error, info, warn};

use crate::controller::{Controller, Publication};
use crate::error::{Error, Result};
use crate::settings::Settings;

/// Capacity of the client request queue.
const REQUEST_CAPACITY: usize = 64;

/// Pause after a connection error before the event loop is polled again.
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// How long shutdown waits for the disconnect to be flushed.
const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// The outbound half of a broker connection.
///
/// Both operations queue the request and return immediately; they never wait
/// on the connection.
pub trait Transport {
    fn subscribe_filter(&mut self, filter: &str) -> Result<()>;

    fn send(&mut self, publication: &Publication) -> Result<()>;
}

impl Transport for AsyncClient {
    fn subscribe_filter(&mut self, filter: &str) -> Result<()> {
        self.try_subscribe(filter, QoS::AtMostOnce)?;
        Ok(())
    }

    fn send(&mut self, publication: &Publication) -> Result<()> {
        self.try_publish(
            publication.topic.as_str(),
            QoS::AtMostOnce,
            false,
            publication.payload.as_bytes().to_vec(),
        )?;
        Ok(())
    }
}

/// Broker connection parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub keep_alive: Duration,
}

impl SessionOptions {
    /// Resolve connection parameters from loaded settings.
    ///
    /// Fails when no server is configured.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let host = settings
            .server
            .clone()
            .ok_or_else(|| Error::Config("no MQTT server configured".to_string()))?;
        Ok(Self {
            host,
            port: settings.port,
            client_id: settings.client_id().to_string(),
            keep_alive: Duration::from_secs(settings.keep_alive_secs),
        })
    }

    fn mqtt_options(&self, will: Publication) -> MqttOptions {
        let mut options = MqttOptions::new(&self.client_id, &self.host, self.port);
        options.set_keep_alive(self.keep_alive);
        options.set_last_will(LastWill::new(
            will.topic,
            will.payload,
            QoS::AtMostOnce,
            false,
        ));
        options
    }
}

/// A running connection between one broker and one controller.
pub struct Session {
    controller: Controller,
    client: AsyncClient,
    eventloop: EventLoop,
}

impl Session {
    /// Prepare a session. Nothing is sent until [`Session::run`] polls.
    pub fn new(controller: Controller, options: &SessionOptions) -> Self {
        let (client, eventloop) =
            AsyncClient::new(options.mqtt_options(controller.last_will()), REQUEST_CAPACITY);
        Self {
            controller,
            client,
            eventloop,
        }
    }

    /// Drive the connection until Ctrl-C.
    pub async fn run(mut self) -> anyhow::Result<()> {
        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                signal = &mut shutdown => {
                    if let Err(e) = signal {
                        error!("Unable to listen for shutdown signal: {}", e);
                    }
                    break;
                }
                event = self.eventloop.poll() => match event {
                    Ok(event) => {
                        let result = handle_event(&mut self.controller, &mut self.client, &event);
                        if let Err(e) = result {
                            error!("{}", e);
                        }
                    }
                    Err(e) => {
                        error!("Connection error: {}", e);
                        tokio::time::sleep(RECONNECT_DELAY).await;
                    }
                },
            }
        }

        self.disconnect().await
    }

    async fn disconnect(mut self) -> anyhow::Result<()> {
        info!("Disconnecting");
        self.client.send(&self.controller.last_will())?;
        self.client.try_disconnect().map_err(Error::from)?;

        let eventloop = &mut self.eventloop;
        let flushed = tokio::time::timeout(DISCONNECT_TIMEOUT, async move {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Disconnect)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        debug!("Connection closed during shutdown: {}", e);
                        break;
                    }
                }
            }
        })
        .await;

        if flushed.is_err() {
            warn!("Timed out waiting for disconnect");
        }
        Ok(())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("controller", &self.controller.name())
            .finish()
    }
}

/// React to one event-loop event.
///
/// On every connection acknowledgement (reconnects included) all filters are
/// subscribed again and liveness is announced. Inbound publishes go through
/// the controller and everything it returns is queued. A request the
/// transport refuses is logged and the remaining ones are still attempted.
pub fn handle_event<T: Transport>(
    controller: &mut Controller,
    transport: &mut T,
    event: &Event,
) -> Result<()> {
    match event {
        Event::Incoming(Packet::ConnAck(_)) => {
            info!("Connected");
            let mut results = Vec::new();
            for filter in controller.subscriptions() {
                info!("Subscribing to {}", filter);
                results.push(transport.subscribe_filter(&filter));
            }
            results.push(transport.send(&controller.announce()));
            settle(results)
        }
        Event::Incoming(Packet::Publish(publish)) => {
            let results = controller
                .on_message(&publish.topic, &publish.payload)
                .iter()
                .map(|publication| {
                    debug!("Publishing {}", publication);
                    transport.send(publication)
                })
                .collect();
            settle(results)
        }
        _ => Ok(()),
    }
}

fn settle(results: Vec<Result<()>>) -> Result<()> {
    let total = results.len();
    let failed = results
        .into_iter()
        .filter_map(Result::err)
        .inspect(|e| error!("{}", e))
        .count();
    if failed == 0 {
        Ok(())
    } else {
        Err(Error::Transport(format!("{failed} of {total} requests not queued")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::{HealthMonitor, LoadActuator, ObservedSignal};
    use rumqttc::{ConnAck, ConnectReturnCode, Publish};

    /// Records requests, refusing the first `refuse` of them.
    #[derive(Debug, Default)]
    struct Recorder {
        subscriptions: Vec<String>,
        sent: Vec<Publication>,
        refuse: usize,
    }

    impl Recorder {
        fn refused(&mut self) -> bool {
            if self.refuse == 0 {
                return false;
            }
            self.refuse -= 1;
            true
        }
    }

    impl Transport for Recorder {
        fn subscribe_filter(&mut self, filter: &str) -> Result<()> {
            if self.refused() {
                return Err(Error::Transport("request queue full".to_string()));
            }
            self.subscriptions.push(filter.to_string());
            Ok(())
        }

        fn send(&mut self, publication: &Publication) -> Result<()> {
            if self.refused() {
                return Err(Error::Transport("request queue full".to_string()));
            }
            self.sent.push(publication.clone());
            Ok(())
        }
    }

    fn controller() -> Controller {
        Controller::new(
            "thermostat",
            LoadActuator::new("heater").unwrap(),
            ObservedSignal::sensor("probe").unwrap(),
            ObservedSignal::threshold_max("thermostat").unwrap(),
            ObservedSignal::threshold_min("thermostat").unwrap(),
            vec![HealthMonitor::new("heater").unwrap()],
        )
    }

    fn connack() -> Event {
        Event::Incoming(Packet::ConnAck(ConnAck::new(ConnectReturnCode::Success, false)))
    }

    fn publish(topic: &str, payload: &str) -> Event {
        Event::Incoming(Packet::Publish(Publish::new(
            topic,
            QoS::AtMostOnce,
            payload.as_bytes().to_vec(),
        )))
    }

    #[test]
    fn test_connack_subscribes_and_announces() {
        let mut controller = controller();
        let mut transport = Recorder::default();

        handle_event(&mut controller, &mut transport, &connack()).unwrap();

        assert_eq!(transport.subscriptions, controller.subscriptions());
        assert_eq!(
            transport.sent,
            vec![Publication::new("tele/thermostat/LWT", "Error")]
        );
    }

    #[test]
    fn test_reconnect_subscribes_again() {
        let mut controller = controller();
        let mut transport = Recorder::default();

        handle_event(&mut controller, &mut transport, &connack()).unwrap();
        handle_event(&mut controller, &mut transport, &connack()).unwrap();

        assert_eq!(
            transport.subscriptions.len(),
            2 * controller.subscriptions().len()
        );
        assert_eq!(transport.sent.len(), 2);
    }

    #[test]
    fn test_publish_flows_through_controller() {
        let mut controller = controller();
        let mut transport = Recorder::default();

        for (topic, payload) in [
            ("tele/heater/STATE", r#"{"POWER":"OFF"}"#),
            ("cmnd/thermostat/vmax", "20"),
            ("cmnd/thermostat/vmin", "18"),
        ] {
            handle_event(&mut controller, &mut transport, &publish(topic, payload)).unwrap();
        }
        transport.sent.clear();

        let event = publish(
            "tele/bridge/SENSOR",
            r#"{"DS18B20":{"Id":"probe","Temperature":21.0}}"#,
        );
        handle_event(&mut controller, &mut transport, &event).unwrap();

        let topics: Vec<_> = transport.sent.iter().map(|p| p.topic.as_str()).collect();
        assert_eq!(
            topics,
            vec!["cmnd/heater/POWER", "tele/thermostat/LWT", "tele/thermostat/STATE"]
        );
        assert_eq!(transport.sent[0].payload, "ON");
    }

    #[test]
    fn test_other_events_are_ignored() {
        let mut controller = controller();
        let mut transport = Recorder::default();

        handle_event(&mut controller, &mut transport, &Event::Incoming(Packet::PingResp)).unwrap();
        handle_event(&mut controller, &mut transport, &Event::Outgoing(Outgoing::PingReq)).unwrap();

        assert!(transport.subscriptions.is_empty());
        assert!(transport.sent.is_empty());
    }

    #[test]
    fn test_full_queue_is_reported() {
        let mut controller = controller();
        let mut transport = Recorder {
            refuse: usize::MAX,
            ..Default::default()
        };

        let result = handle_event(&mut controller, &mut transport, &connack());
        assert!(matches!(result, Err(Error::Transport(_))));
    }

    #[test]
    fn test_refused_command_still_publishes_liveness_and_state() {
        let mut controller = controller();
        let mut transport = Recorder {
            refuse: 1,
            ..Default::default()
        };

        // Gate is closed, so the first publication is an Emergency command
        let event = publish("cmnd/thermostat/vmax", "20");
        let result = handle_event(&mut controller, &mut transport, &event);

        assert!(matches!(result, Err(Error::Transport(_))));
        let topics: Vec<_> = transport.sent.iter().map(|p| p.topic.as_str()).collect();
        assert_eq!(topics, vec!["tele/thermostat/LWT", "tele/thermostat/STATE"]);
        assert_eq!(transport.sent[0].payload, "Error");
    }

    #[test]
    fn test_refused_subscription_does_not_skip_the_rest() {
        let mut controller = controller();
        let mut transport = Recorder {
            refuse: 1,
            ..Default::default()
        };

        let result = handle_event(&mut controller, &mut transport, &connack());

        assert!(result.is_err());
        let expected = controller.subscriptions().len() - 1;
        assert_eq!(transport.subscriptions.len(), expected);
        assert_eq!(
            transport.sent,
            vec![Publication::new("tele/thermostat/LWT", "Error")]
        );
    }

    #[test]
    fn test_options_from_settings_require_server() {
        let settings = Settings::default();
        assert!(matches!(
            SessionOptions::from_settings(&settings),
            Err(Error::Config(_))
        ));

        let settings = Settings {
            server: Some("broker.local".to_string()),
            port: 1884,
            ..Settings::default()
        };
        let options = SessionOptions::from_settings(&settings).unwrap();
        assert_eq!(options.host, "broker.local");
        assert_eq!(options.port, 1884);
        assert_eq!(options.client_id, "thermostt");
        assert_eq!(options.keep_alive, Duration::from_secs(60));
    }
}
