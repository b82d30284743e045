//! Destinations for values decoded from the display stream.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Write;

/// Consumer of published display state.
pub trait StateSink {
    /// Publish a text value (e.g. a display line).
    fn publish_text(&mut self, name: &str, value: &str);

    /// Publish a numeric value (e.g. the volume in dB).
    fn publish_numeric(&mut self, name: &str, value: f64);
}

impl<T: StateSink + ?Sized> StateSink for Box<T> {
    fn publish_text(&mut self, name: &str, value: &str) {
        (**self).publish_text(name, value)
    }

    fn publish_numeric(&mut self, name: &str, value: f64) {
        (**self).publish_numeric(name, value)
    }
}

/// Sink that logs every publication at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl StateSink for LogSink {
    fn publish_text(&mut self, name: &str, value: &str) {
        tracing::info!(sensor = name, value, "text state");
    }

    fn publish_numeric(&mut self, name: &str, value: f64) {
        tracing::info!(sensor = name, value, "numeric state");
    }
}

/// Value carried by a [`Publication`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PublishedValue {
    /// Text state.
    Text(String),
    /// Numeric state.
    Numeric(f64),
}

/// One published value, as written by [`JsonLinesSink`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Publication {
    /// Wall-clock time of publication.
    pub timestamp: DateTime<Utc>,
    /// Sensor name.
    pub name: String,
    /// Published value.
    pub value: PublishedValue,
}

/// Sink writing one JSON object per line.
pub struct JsonLinesSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    /// Wrap a writer.
    pub fn new(writer: W) -> Self {
        JsonLinesSink { writer }
    }

    /// Recover the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn emit(&mut self, name: &str, value: PublishedValue) {
        let publication = Publication {
            timestamp: Utc::now(),
            name: name.to_string(),
            value,
        };
        let result = serde_json::to_writer(&mut self.writer, &publication)
            .map_err(std::io::Error::from)
            .and_then(|()| self.writer.write_all(b"\n"))
            .and_then(|()| self.writer.flush());
        if let Err(e) = result {
            tracing::warn!(sensor = name, "failed to write publication: {}", e);
        }
    }
}

impl<W: Write> StateSink for JsonLinesSink<W> {
    fn publish_text(&mut self, name: &str, value: &str) {
        self.emit(name, PublishedValue::Text(value.to_string()));
    }

    fn publish_numeric(&mut self, name: &str, value: f64) {
        self.emit(name, PublishedValue::Numeric(value));
    }
}

/// Sink forwarding to several sinks in order.
#[derive(Default)]
pub struct FanSink {
    sinks: Vec<Box<dyn StateSink>>,
}

impl FanSink {
    /// Create an empty fan-out sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink.
    pub fn with(mut self, sink: impl StateSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    /// Number of attached sinks.
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// True when no sinks are attached.
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl StateSink for FanSink {
    fn publish_text(&mut self, name: &str, value: &str) {
        for sink in &mut self.sinks {
            sink.publish_text(name, value);
        }
    }

    fn publish_numeric(&mut self, name: &str, value: f64) {
        for sink in &mut self.sinks {
            sink.publish_numeric(name, value);
        }
    }
}
