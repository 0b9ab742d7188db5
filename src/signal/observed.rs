//! Numeric signals: the sensor and the two thresholds.

use std::fmt;

use tracing::{debug, error};

use super::TopicHandler;
use crate::error::Result;
use crate::query::{coerce_number, Document, Extractor};

/// What an [`ObservedSignal`] measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    /// A sensed value, read from telemetry.
    Sensor,
    /// The upper threshold, set externally by command.
    ThresholdMax,
    /// The lower threshold, set externally by command.
    ThresholdMin,
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalKind::Sensor => f.write_str("sensor"),
            SignalKind::ThresholdMax => f.write_str("vmax"),
            SignalKind::ThresholdMin => f.write_str("vmin"),
        }
    }
}

/// A named, topic-bound numeric reading.
///
/// The stored value is a latch, not a cache: it is set by a successful
/// extraction and coercion, overwritten by the next one, and otherwise left
/// alone. A query miss is not evidence that the previous reading is stale.
///
/// # Example
///
/// ```
/// use thermostt::query::Document;
/// use thermostt::signal::{ObservedSignal, TopicHandler};
///
/// let mut vmax = ObservedSignal::threshold_max("thermostat").unwrap();
/// assert_eq!(vmax.topic(), "cmnd/thermostat/vmax");
///
/// vmax.on_message(&Document::decode(b"21.5").unwrap());
/// assert_eq!(vmax.value(), Some(21.5));
///
/// // A payload that is not a number leaves the threshold where it was
/// vmax.on_message(&Document::decode(b"warmer").unwrap());
/// assert_eq!(vmax.value(), Some(21.5));
/// ```
#[derive(Debug)]
pub struct ObservedSignal {
    name: String,
    kind: SignalKind,
    topic: String,
    extractor: Extractor,
    delta: f64,
    value: Option<f64>,
}

impl ObservedSignal {
    /// Create a signal from fully resolved parts.
    pub fn new(
        name: impl Into<String>,
        kind: SignalKind,
        topic: impl Into<String>,
        extractor: Extractor,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            topic: topic.into(),
            extractor,
            delta: 0.0,
            value: None,
        }
    }

    /// A temperature sensor reporting through Tasmota-style `SENSOR` telemetry.
    ///
    /// Listens on every device (`tele/+/SENSOR`) and picks the reading whose
    /// `Id` equals `name`, so one probe can be followed regardless of which
    /// bridge reports it.
    pub fn sensor(name: &str) -> Result<Self> {
        let query = format!("values(payload)[?Id=='{name}']|[0].Temperature");
        Ok(Self::new(
            name,
            SignalKind::Sensor,
            "tele/+/SENSOR",
            Extractor::new(&query)?,
        ))
    }

    /// The upper threshold, commanded on `cmnd/<name>/vmax`.
    pub fn threshold_max(name: &str) -> Result<Self> {
        Self::threshold(name, SignalKind::ThresholdMax)
    }

    /// The lower threshold, commanded on `cmnd/<name>/vmin`.
    pub fn threshold_min(name: &str) -> Result<Self> {
        Self::threshold(name, SignalKind::ThresholdMin)
    }

    fn threshold(name: &str, kind: SignalKind) -> Result<Self> {
        let topic = format!("cmnd/{name}/{kind}").replace('.', "_");
        Ok(Self::new(name, kind, topic, Extractor::new("payload")?))
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

    /// Offset added to every extracted reading (sensor calibration).
    pub fn with_delta(mut self, delta: f64) -> Self {
        self.delta = delta;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> SignalKind {
        self.kind
    }

    pub fn query(&self) -> &str {
        self.extractor.expression()
    }

    pub fn delta(&self) -> f64 {
        self.delta
    }

    /// The last good reading, offset applied.
    pub fn value(&self) -> Option<f64> {
        self.value
    }
}

impl TopicHandler for ObservedSignal {
    fn topic(&self) -> &str {
        &self.topic
    }

    fn label(&self) -> String {
        format!("{} {}", self.kind, self.name)
    }

    fn on_message(&mut self, document: &Document) {
        let found = match self.extractor.search(document) {
            Ok(found) => found,
            Err(e) => {
                error!(signal = %self.label(), "{}", e);
                return;
            }
        };
        if found.is_null() {
            debug!(signal = %self.label(), "No value in message");
            return;
        }

        let reading = match coerce_number(&found) {
            Ok(reading) => reading,
            Err(e) => {
                error!(signal = %self.label(), "{}", e);
                return;
            }
        };

        let value = reading + self.delta;
        if value.is_finite() {
            self.value = Some(value);
        } else {
            error!(
                signal = %self.label(),
                "Reading {} with delta {} is out of range",
                reading,
                self.delta
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deliver(signal: &mut ObservedSignal, body: &str) {
        signal.on_message(&Document::decode(body.as_bytes()).unwrap());
    }

    #[test]
    fn test_sensor_defaults() {
        let sensor = ObservedSignal::sensor("01144A0CB2AA").unwrap();
        assert_eq!(sensor.topic(), "tele/+/SENSOR");
        assert_eq!(
            sensor.query(),
            "values(payload)[?Id=='01144A0CB2AA']|[0].Temperature"
        );
        assert_eq!(sensor.value(), None);
    }

    #[test]
    fn test_threshold_topic_replaces_dots() {
        let vmin = ObservedSignal::threshold_min("illallangi.thermostt").unwrap();
        assert_eq!(vmin.topic(), "cmnd/illallangi_thermostt/vmin");
        assert_eq!(vmin.query(), "payload");
    }

    #[test]
    fn test_sensor_reading_with_delta() {
        let mut sensor = ObservedSignal::sensor("01").unwrap().with_delta(-0.5);
        deliver(
            &mut sensor,
            r#"{"DS18B20":{"Id":"01","Temperature":20.5},"TempUnit":"C"}"#,
        );
        assert_eq!(sensor.value(), Some(20.0));
    }

    #[test]
    fn test_miss_keeps_previous_value() {
        let mut sensor = ObservedSignal::sensor("01").unwrap();
        deliver(&mut sensor, r#"{"DS18B20":{"Id":"01","Temperature":19.5}}"#);
        deliver(&mut sensor, r#"{"DS18B20":{"Id":"02","Temperature":30.0}}"#);
        assert_eq!(sensor.value(), Some(19.5));
    }

    #[test]
    fn test_evaluation_error_keeps_previous_value() {
        let mut sensor = ObservedSignal::sensor("01").unwrap();
        deliver(&mut sensor, r#"{"DS18B20":{"Id":"01","Temperature":19.5}}"#);
        // values() on a string fails at evaluation time
        deliver(&mut sensor, "Online");
        assert_eq!(sensor.value(), Some(19.5));
    }

    #[test]
    fn test_coercion_error_keeps_previous_value() {
        let mut vmax = ObservedSignal::threshold_max("thermostat").unwrap();
        deliver(&mut vmax, "20");
        deliver(&mut vmax, r#"{"value":21}"#);
        assert_eq!(vmax.value(), Some(20.0));
    }

    #[test]
    fn test_overflowing_delta_keeps_previous_value() {
        let mut sensor = ObservedSignal::sensor("01").unwrap().with_delta(1e308);
        deliver(&mut sensor, r#"{"DS18B20":{"Id":"01","Temperature":0.5}}"#);
        assert_eq!(sensor.value(), Some(1e308 + 0.5));

        deliver(&mut sensor, r#"{"DS18B20":{"Id":"01","Temperature":1e308}}"#);
        assert_eq!(sensor.value(), Some(1e308 + 0.5));
    }

    #[test]
    fn test_custom_topic_and_query() {
        let vmax = ObservedSignal::threshold_max("thermostat")
            .unwrap()
            .with_topic("home/lounge/setpoint")
            .with_query("payload.high")
            .unwrap();
        assert_eq!(vmax.topic(), "home/lounge/setpoint");
        assert_eq!(vmax.query(), "payload.high");
        let sensor = ObservedSignal::sensor("01").unwrap();
        assert!(sensor.with_query("[").is_err());
    }
}
