//! The bridge tick driver.
//!
//! One [`Bridge::tick`] runs the whole pipeline once, in a fixed order:
//!
//! 1. accept at most one new client
//! 2. drain the serial device into the ring buffer and the frame parser
//! 3. fan the new bytes out to every client
//! 4. read client bytes and forward completed commands to the device
//! 5. remove clients that failed during this tick
//!
//! Nothing blocks. The caller decides how often to tick.

use crate::client::{ClientRegistry, FanOutStats};
use crate::command::{CommandChannel, CommandStats, ScratchScope};
use crate::error::{BridgeError, Result};
use crate::ring_buffer::RingBuffer;
use crate::sink::StateSink;
use crate::transport::{is_transient, ClientListener, SerialDevice};
use avr_metrics::{metric_defs, MetricLabels};
use avr_protocol::{CommandFrame, FrameEvent, FrameParser};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Sensor name for the upper display line.
pub const SENSOR_UPPER: &str = "upper";
/// Sensor name for the lower display line.
pub const SENSOR_LOWER: &str = "lower";
/// Sensor name for the volume reading in dB.
pub const SENSOR_VOLUME: &str = "volume";

/// Tuning knobs for a [`Bridge`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeOptions {
    /// Ring buffer capacity; must be a power of two.
    pub buffer_size: usize,
    /// Publish the volume parsed from the lower line.
    pub publish_volume: bool,
    /// Upper bound on device bytes consumed by one tick. At most half of
    /// `buffer_size`, so a client that keeps up is never skipped forward.
    pub max_device_bytes_per_tick: usize,
    /// Scoping of the command scratch buffer.
    pub scratch_scope: ScratchScope,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        BridgeOptions {
            buffer_size: 1024,
            publish_volume: true,
            max_device_bytes_per_tick: 512,
            scratch_scope: ScratchScope::PerClient,
        }
    }
}

/// What one tick did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    /// A new client was accepted.
    pub accepted: bool,
    /// Bytes read from the serial device.
    pub device_bytes: usize,
    /// Complete display frames decoded.
    pub frames: usize,
    /// Volume readings published.
    pub volume_readings: usize,
    /// Ring bytes lost to overwrite before every client saw them.
    pub overwritten: u64,
    /// Fan-out pass results.
    pub fan_out: FanOutStats,
    /// Command poll results.
    pub commands: CommandStats,
    /// Clients removed by cleanup.
    pub removed: usize,
}

impl TickReport {
    /// True when the tick observed no activity at all.
    pub fn is_idle(&self) -> bool {
        !self.accepted
            && self.device_bytes == 0
            && self.fan_out == FanOutStats::default()
            && self.commands == CommandStats::default()
            && self.removed == 0
    }
}

/// Reject a per-tick drain bound that could push an up-to-date client past the
/// lag limit before the fan-out that follows it.
pub(crate) fn check_drain_bound(max_device_bytes_per_tick: usize, buffer_size: usize) -> Result<()> {
    if max_device_bytes_per_tick == 0 {
        return Err(BridgeError::Config(
            "max_device_bytes_per_tick must be at least 1".to_string(),
        ));
    }
    if max_device_bytes_per_tick > buffer_size / 2 {
        return Err(BridgeError::Config(format!(
            "max_device_bytes_per_tick ({}) must not exceed half of buffer_size ({})",
            max_device_bytes_per_tick, buffer_size
        )));
    }
    Ok(())
}

/// Serial-to-TCP bridge.
///
/// Owns every piece of state; there is exactly one thread of execution, so no
/// locking is involved.
pub struct Bridge<D, L: ClientListener, S> {
    device: D,
    listener: L,
    sink: S,
    ring: RingBuffer,
    parser: FrameParser,
    clients: ClientRegistry<L::Stream>,
    commands: CommandChannel,
    options: BridgeOptions,
    metric_labels: MetricLabels,
    labels: Vec<(&'static str, String)>,
}

impl<D, L, S> Bridge<D, L, S>
where
    D: SerialDevice,
    L: ClientListener,
    S: StateSink,
{
    /// Create a bridge around an opened device and a bound listener.
    pub fn new(device: D, listener: L, sink: S, options: BridgeOptions) -> Result<Self> {
        let ring = RingBuffer::new(options.buffer_size)?;
        check_drain_bound(options.max_device_bytes_per_tick, options.buffer_size)?;
        let metric_labels = MetricLabels::new("avr-bridge", "");
        Ok(Bridge {
            device,
            listener,
            sink,
            ring,
            parser: FrameParser::new(),
            clients: ClientRegistry::new(),
            commands: CommandChannel::new(options.scratch_scope),
            options,
            labels: metric_labels.to_labels(),
            metric_labels,
        })
    }

    /// Attach labels to every metric this bridge records.
    pub fn with_metric_labels(mut self, labels: MetricLabels) -> Self {
        self.labels = labels.to_labels();
        self.metric_labels = labels;
        self
    }

    /// Run one pass of the pipeline.
    ///
    /// Client failures are absorbed. A failing serial device is returned as an
    /// error since the bridge cannot do anything useful without it.
    pub fn tick(&mut self) -> Result<TickReport> {
        let started = Instant::now();
        let mut report = TickReport {
            accepted: self.accept_one(),
            ..TickReport::default()
        };

        self.drain_device(&mut report)?;

        report.fan_out = self.clients.fan_out(&mut self.ring);
        report.commands = self.commands.poll_clients(&mut self.clients, &mut self.device)?;
        report.removed = self.clients.cleanup(&mut self.ring);

        self.record_metrics(&report);
        metrics::histogram!(metric_defs::TICK_DURATION.name, &self.labels)
            .record(started.elapsed().as_micros() as f64);

        Ok(report)
    }

    /// Write one command frame to the device on behalf of the host.
    pub fn send_command(&mut self, payload: [u8; 4]) -> Result<()> {
        let command = CommandFrame::new(payload);
        self.device.write_bytes(&command.encode())?;
        debug!(payload = %hex::encode_upper(payload), "PCSEND");
        metrics::counter!(
            metric_defs::COMMANDS_SENT.name,
            &self.metric_labels.with(&[("source", "host".to_string())])
        )
        .increment(1);
        Ok(())
    }

    /// Close every client connection.
    pub fn shutdown(&mut self) {
        info!(clients = self.clients.len(), "shutting down bridge");
        self.clients.shutdown_all();
    }

    /// Shared stream buffer.
    pub fn ring(&self) -> &RingBuffer {
        &self.ring
    }

    /// Connected clients.
    pub fn clients(&self) -> &ClientRegistry<L::Stream> {
        &self.clients
    }

    /// Display frame parser.
    pub fn parser(&self) -> &FrameParser {
        &self.parser
    }

    fn accept_one(&mut self) -> bool {
        match self.listener.accept() {
            Ok(Some((stream, identifier))) => {
                info!(client = %identifier, "client connected");
                self.clients.add(stream, identifier, self.ring.head());
                true
            }
            Ok(None) => false,
            Err(e) if is_transient(&e) => false,
            Err(e) => {
                warn!("accept failed: {}", e);
                false
            }
        }
    }

    fn drain_device(&mut self, report: &mut TickReport) -> Result<()> {
        let overwritten_before = self.ring.overwritten();
        let budget = self.options.max_device_bytes_per_tick;

        'drain: while report.device_bytes < budget {
            let available = self.device.available()?;
            if available == 0 {
                break;
            }
            for _ in 0..available.min(budget - report.device_bytes) {
                let Some(byte) = self.device.read_byte()? else {
                    break 'drain;
                };
                report.device_bytes += 1;
                self.ring.append(byte);
                if let Some(event) = self.parser.feed(byte) {
                    report.frames += 1;
                    if self.publish(&event) {
                        report.volume_readings += 1;
                    }
                }
            }
        }

        report.overwritten = self.ring.overwritten() - overwritten_before;
        if report.overwritten > 0 {
            debug!(bytes = report.overwritten, "ring buffer overwrote unread bytes");
        }
        Ok(())
    }

    /// Publish a decoded frame. Returns true if a volume was published.
    fn publish(&mut self, event: &FrameEvent) -> bool {
        self.sink.publish_text(SENSOR_UPPER, &event.upper);
        self.sink.publish_text(SENSOR_LOWER, &event.lower);

        if !self.options.publish_volume {
            return false;
        }
        match event.volume() {
            Some(db) => {
                self.sink.publish_numeric(SENSOR_VOLUME, f64::from(db));
                metrics::gauge!(metric_defs::DISPLAY_VOLUME.name, &self.labels).set(f64::from(db));
                true
            }
            None => false,
        }
    }

    fn record_metrics(&self, report: &TickReport) {
        let labels = &self.labels;
        if report.device_bytes > 0 {
            metrics::counter!(metric_defs::SERIAL_RX_BYTES.name, labels)
                .increment(report.device_bytes as u64);
        }
        if report.frames > 0 {
            metrics::counter!(metric_defs::DISPLAY_FRAMES.name, labels)
                .increment(report.frames as u64);
        }
        if report.overwritten > 0 {
            metrics::counter!(metric_defs::BUFFER_OVERWRITTEN.name, labels)
                .increment(report.overwritten);
        }
        if report.accepted {
            metrics::counter!(metric_defs::CLIENTS_ACCEPTED.name, labels).increment(1);
        }
        if report.removed > 0 {
            metrics::counter!(metric_defs::CLIENTS_REMOVED.name, labels)
                .increment(report.removed as u64);
        }
        if report.fan_out.bytes_sent > 0 {
            metrics::counter!(metric_defs::FANOUT_TX_BYTES.name, labels)
                .increment(report.fan_out.bytes_sent as u64);
        }
        if report.fan_out.lag_skips > 0 {
            metrics::counter!(metric_defs::FANOUT_LAG_SKIPS.name, labels)
                .increment(report.fan_out.lag_skips as u64);
            metrics::counter!(metric_defs::FANOUT_SKIPPED_BYTES.name, labels)
                .increment(report.fan_out.bytes_skipped);
        }
        if report.commands.sent > 0 {
            metrics::counter!(
                metric_defs::COMMANDS_SENT.name,
                &self.metric_labels.with(&[("source", "client".to_string())])
            )
            .increment(report.commands.sent as u64);
        }
        if report.commands.discarded > 0 {
            metrics::counter!(metric_defs::COMMANDS_DISCARDED.name, labels)
                .increment(report.commands.discarded as u64);
        }

        metrics::gauge!(metric_defs::BUFFER_FILL.name, labels).set(self.ring.len() as f64);
        metrics::gauge!(metric_defs::CLIENTS_CONNECTED.name, labels).set(self.clients.len() as f64);
    }
}
