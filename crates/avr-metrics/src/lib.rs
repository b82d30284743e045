//! Metrics infrastructure for the AVR serial bridge.
//!
//! This crate declares every metric the bridge records as a structured [`Metric`]
//! constant and re-exports the `metrics` crate for convenience. Recording goes
//! through the `metrics` facade, so nothing is collected unless a recorder is
//! installed (see the `prometheus` feature).
//!
//! # Example
//!
//! ```rust,ignore
//! use avr_metrics::{describe_metrics, metric_defs, MetricLabels};
//!
//! describe_metrics();
//!
//! let labels = MetricLabels::new("living_room", "/dev/ttyUSB0");
//! metrics::counter!(metric_defs::SERIAL_RX_BYTES.name, &labels.to_labels()).increment(64);
//! ```

pub use metrics;

use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};

/// The kind of metric (counter, gauge, or histogram).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// A monotonically increasing counter.
    Counter,
    /// A gauge that can go up and down.
    Gauge,
    /// A histogram for recording distributions.
    Histogram,
}

/// A metric declaration with its metadata.
///
/// # Example
///
/// ```rust
/// use avr_metrics::{Metric, MetricKind};
/// use metrics::Unit;
///
/// const FRAMES: Metric = Metric::counter("avr.display.frames")
///     .with_description("Display frames parsed")
///     .with_unit(Unit::Count)
///     .with_labels(&["bridge"]);
///
/// assert_eq!(FRAMES.name, "avr.display.frames");
/// assert_eq!(FRAMES.kind, MetricKind::Counter);
/// ```
#[derive(Debug, Clone)]
pub struct Metric {
    /// The metric name (e.g., "avr.serial.rx_bytes").
    pub name: &'static str,
    /// The kind of metric (counter, gauge, histogram).
    pub kind: MetricKind,
    /// Human-readable description of the metric.
    pub description: &'static str,
    /// The unit of measurement (optional).
    pub unit: Option<Unit>,
    /// Expected label keys for this metric.
    pub labels: &'static [&'static str],
}

impl Metric {
    /// Creates a new counter metric with the given name.
    pub const fn counter(name: &'static str) -> Self {
        Self::of_kind(name, MetricKind::Counter)
    }

    /// Creates a new gauge metric with the given name.
    pub const fn gauge(name: &'static str) -> Self {
        Self::of_kind(name, MetricKind::Gauge)
    }

    /// Creates a new histogram metric with the given name.
    pub const fn histogram(name: &'static str) -> Self {
        Self::of_kind(name, MetricKind::Histogram)
    }

    const fn of_kind(name: &'static str, kind: MetricKind) -> Self {
        Self {
            name,
            kind,
            description: "",
            unit: None,
            labels: &[],
        }
    }

    /// Sets the description for the metric.
    pub const fn with_description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    /// Sets the unit for the metric.
    pub const fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = Some(unit);
        self
    }

    /// Sets the expected label keys for the metric.
    pub const fn with_labels(mut self, labels: &'static [&'static str]) -> Self {
        self.labels = labels;
        self
    }

    /// Registers this metric's description with the metrics recorder.
    ///
    /// This should be called once at startup for each metric.
    pub fn describe(&self) {
        match (self.kind, self.unit) {
            (MetricKind::Counter, Some(unit)) => {
                describe_counter!(self.name, unit, self.description);
            }
            (MetricKind::Counter, None) => {
                describe_counter!(self.name, self.description);
            }
            (MetricKind::Gauge, Some(unit)) => {
                describe_gauge!(self.name, unit, self.description);
            }
            (MetricKind::Gauge, None) => {
                describe_gauge!(self.name, self.description);
            }
            (MetricKind::Histogram, Some(unit)) => {
                describe_histogram!(self.name, unit, self.description);
            }
            (MetricKind::Histogram, None) => {
                describe_histogram!(self.name, self.description);
            }
        }
    }
}

/// All metric definitions for the bridge.
pub mod metric_defs {
    use super::{Metric, Unit};

    /// Labels present on every bridge metric.
    pub const STANDARD_LABELS: &[&str] = &["bridge", "device"];

    // ========================================================================
    // Serial Side
    // ========================================================================

    /// Bytes read from the serial device.
    pub const SERIAL_RX_BYTES: Metric = Metric::counter("avr.serial.rx_bytes")
        .with_description("Bytes read from the serial device")
        .with_unit(Unit::Bytes)
        .with_labels(STANDARD_LABELS);

    /// Display frames completed by the parser.
    pub const DISPLAY_FRAMES: Metric = Metric::counter("avr.display.frames")
        .with_description("Display frames parsed")
        .with_unit(Unit::Count)
        .with_labels(STANDARD_LABELS);

    /// Most recent volume reading in dB.
    pub const DISPLAY_VOLUME: Metric = Metric::gauge("avr.display.volume_db")
        .with_description("Most recent volume reading in dB")
        .with_labels(STANDARD_LABELS);

    /// Bytes overwritten in the ring buffer before every client saw them.
    pub const BUFFER_OVERWRITTEN: Metric = Metric::counter("avr.buffer.overwritten_bytes")
        .with_description("Bytes lost to ring buffer overwrite")
        .with_unit(Unit::Bytes)
        .with_labels(STANDARD_LABELS);

    /// Bytes currently retained between tail and head.
    pub const BUFFER_FILL: Metric = Metric::gauge("avr.buffer.fill_bytes")
        .with_description("Bytes retained in the ring buffer")
        .with_unit(Unit::Bytes)
        .with_labels(STANDARD_LABELS);

    // ========================================================================
    // Client Side
    // ========================================================================

    /// TCP clients accepted.
    pub const CLIENTS_ACCEPTED: Metric = Metric::counter("avr.clients.accepted")
        .with_description("TCP clients accepted")
        .with_unit(Unit::Count)
        .with_labels(STANDARD_LABELS);

    /// TCP clients removed after disconnecting.
    pub const CLIENTS_REMOVED: Metric = Metric::counter("avr.clients.removed")
        .with_description("TCP clients removed after disconnect")
        .with_unit(Unit::Count)
        .with_labels(STANDARD_LABELS);

    /// TCP clients currently connected.
    pub const CLIENTS_CONNECTED: Metric = Metric::gauge("avr.clients.connected")
        .with_description("TCP clients currently connected")
        .with_unit(Unit::Count)
        .with_labels(STANDARD_LABELS);

    /// Bytes mirrored to TCP clients.
    pub const FANOUT_TX_BYTES: Metric = Metric::counter("avr.fanout.tx_bytes")
        .with_description("Bytes mirrored to TCP clients")
        .with_unit(Unit::Bytes)
        .with_labels(STANDARD_LABELS);

    /// Times a lagging client's cursor was moved forward.
    pub const FANOUT_LAG_SKIPS: Metric = Metric::counter("avr.fanout.lag_skips")
        .with_description("Lagging client cursors force-advanced")
        .with_unit(Unit::Count)
        .with_labels(STANDARD_LABELS);

    /// Bytes skipped over by lagging clients.
    pub const FANOUT_SKIPPED_BYTES: Metric = Metric::counter("avr.fanout.skipped_bytes")
        .with_description("Bytes never delivered to lagging clients")
        .with_unit(Unit::Bytes)
        .with_labels(STANDARD_LABELS);

    // ========================================================================
    // Command Channel
    // ========================================================================

    /// Command frames written to the device.
    pub const COMMANDS_SENT: Metric = Metric::counter("avr.commands.sent")
        .with_description("Command frames written to the device")
        .with_unit(Unit::Count)
        .with_labels(&["bridge", "device", "source"]);

    /// Command scratch buffers discarded as garbage.
    pub const COMMANDS_DISCARDED: Metric = Metric::counter("avr.commands.discarded")
        .with_description("Command scratch buffers discarded as garbage")
        .with_unit(Unit::Count)
        .with_labels(STANDARD_LABELS);

    /// Tick duration.
    pub const TICK_DURATION: Metric = Metric::histogram("avr.tick.duration_us")
        .with_description("Duration of one bridge tick")
        .with_unit(Unit::Microseconds)
        .with_labels(STANDARD_LABELS);

    /// Every metric in this module.
    pub const ALL: &[Metric] = &[
        SERIAL_RX_BYTES,
        DISPLAY_FRAMES,
        DISPLAY_VOLUME,
        BUFFER_OVERWRITTEN,
        BUFFER_FILL,
        CLIENTS_ACCEPTED,
        CLIENTS_REMOVED,
        CLIENTS_CONNECTED,
        FANOUT_TX_BYTES,
        FANOUT_LAG_SKIPS,
        FANOUT_SKIPPED_BYTES,
        COMMANDS_SENT,
        COMMANDS_DISCARDED,
        TICK_DURATION,
    ];
}

/// Label values identifying one bridge instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricLabels {
    /// Bridge name (from configuration).
    pub bridge: String,
    /// Serial device path.
    pub device: String,
}

impl MetricLabels {
    /// Create labels for a bridge and its serial device.
    pub fn new(bridge: impl Into<String>, device: impl Into<String>) -> Self {
        MetricLabels {
            bridge: bridge.into(),
            device: device.into(),
        }
    }

    /// Returns the labels as key-value pairs for use with the metrics macros.
    pub fn to_labels(&self) -> Vec<(&'static str, String)> {
        vec![("bridge", self.bridge.clone()), ("device", self.device.clone())]
    }

    /// Returns labels with additional key-value pairs.
    ///
    /// ```rust
    /// use avr_metrics::MetricLabels;
    ///
    /// let labels = MetricLabels::new("den", "/dev/ttyS1");
    /// let extended = labels.with(&[("source", "tcp".to_string())]);
    ///
    /// assert!(extended.iter().any(|(k, v)| *k == "source" && v == "tcp"));
    /// ```
    pub fn with(&self, extra: &[(&'static str, String)]) -> Vec<(&'static str, String)> {
        let mut labels = self.to_labels();
        labels.extend_from_slice(extra);
        labels
    }
}

/// Describes all bridge metrics.
///
/// Call once at startup after installing a recorder.
pub fn describe_metrics() {
    for metric in metric_defs::ALL {
        metric.describe();
    }
}

/// Install a Prometheus exporter serving `/metrics` on the given address.
#[cfg(feature = "prometheus")]
pub fn install_prometheus(
    addr: std::net::SocketAddr,
) -> Result<(), metrics_exporter_prometheus::BuildError> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    describe_metrics();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_labels_new() {
        let labels = MetricLabels::new("den", "/dev/ttyUSB0");
        assert_eq!(labels.bridge, "den");
        assert_eq!(labels.device, "/dev/ttyUSB0");
    }

    #[test]
    fn test_to_labels() {
        let labels = MetricLabels::new("den", "/dev/ttyUSB0");
        let label_vec = labels.to_labels();

        assert_eq!(label_vec.len(), 2);
        assert!(label_vec.contains(&("bridge", "den".to_string())));
        assert!(label_vec.contains(&("device", "/dev/ttyUSB0".to_string())));
    }

    #[test]
    fn test_with_extra_labels() {
        let labels = MetricLabels::new("den", "/dev/ttyUSB0");
        let extended = labels.with(&[("source", "api".to_string())]);

        assert_eq!(extended.len(), 3);
        assert!(extended.contains(&("source", "api".to_string())));
    }

    #[test]
    fn test_metric_definitions() {
        assert_eq!(metric_defs::SERIAL_RX_BYTES.name, "avr.serial.rx_bytes");
        assert_eq!(metric_defs::SERIAL_RX_BYTES.kind, MetricKind::Counter);
        assert_eq!(metric_defs::SERIAL_RX_BYTES.unit, Some(Unit::Bytes));

        assert_eq!(metric_defs::CLIENTS_CONNECTED.kind, MetricKind::Gauge);
        assert_eq!(metric_defs::TICK_DURATION.kind, MetricKind::Histogram);
        assert_eq!(metric_defs::COMMANDS_SENT.labels, &["bridge", "device", "source"]);
    }

    #[test]
    fn test_all_metric_names_unique() {
        let mut names: Vec<_> = metric_defs::ALL.iter().map(|m| m.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), metric_defs::ALL.len());
        assert_eq!(metric_defs::ALL.len(), 14);
    }

    #[test]
    fn test_metric_minimal() {
        const MINIMAL: Metric = Metric::counter("minimal");

        assert_eq!(MINIMAL.name, "minimal");
        assert_eq!(MINIMAL.kind, MetricKind::Counter);
        assert_eq!(MINIMAL.description, "");
        assert_eq!(MINIMAL.unit, None);
        assert_eq!(MINIMAL.labels, &[] as &[&str]);
    }

    #[test]
    fn test_describe_without_recorder() {
        // Describing with no recorder installed is a no-op.
        describe_metrics();
    }
}
