// SPDX-License-Identifier: Apache-2.0

//! Writes measurements to stdout, one per line.

use std::fmt::Write as _;
use std::io::{self, Write};

use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::receivers::logparser::accumulator::MeasurementReceiver;
use crate::receivers::logparser::measurement::{FieldValue, Measurement};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// InfluxDB line protocol
    #[default]
    LineProtocol,
    /// One JSON object per line
    Json,
}

pub struct StdoutExporter<W> {
    rx: MeasurementReceiver,
    // Lent to a blocking task for each write
    writer: Option<W>,
    format: OutputFormat,
    written: u64,
}

impl StdoutExporter<io::Stdout> {
    pub fn new(rx: MeasurementReceiver, format: OutputFormat) -> Self {
        Self::with_writer(rx, io::stdout(), format)
    }
}

impl<W: Write + Send + 'static> StdoutExporter<W> {
    pub fn with_writer(rx: MeasurementReceiver, writer: W, format: OutputFormat) -> Self {
        Self {
            rx,
            writer: Some(writer),
            format,
            written: 0,
        }
    }

    /// Write measurements until every accumulator is dropped, or until
    /// cancelled, after which anything already queued is still written.
    ///
    /// Measurements queued together are encoded into one buffer and written
    /// on the blocking pool, so a slow stdout never stalls a runtime worker.
    pub async fn start(&mut self, cancel_token: CancellationToken) {
        loop {
            let mut batch = Vec::new();
            let done = select! {
                m = self.rx.next() => match m {
                    Some(m) => {
                        batch.push(m);
                        batch.extend(self.rx.drain());
                        false
                    }
                    None => true,
                },
                _ = cancel_token.cancelled() => {
                    batch.extend(self.rx.drain());
                    true
                }
            };

            if !batch.is_empty() {
                self.write_batch(&batch).await;
            }
            if done {
                break;
            }
        }
        debug!(written = self.written, "exiting stdout exporter")
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    /// The underlying writer, or `None` if a write task panicked with it.
    pub fn into_writer(self) -> Option<W> {
        self.writer
    }

    async fn write_batch(&mut self, batch: &[Measurement]) {
        let mut buf = String::new();
        let mut count = 0;
        for m in batch {
            let encoded = match self.format {
                OutputFormat::LineProtocol => Ok(encode_line_protocol(m)),
                OutputFormat::Json => serde_json::to_string(m),
            };
            match encoded {
                Ok(line) => {
                    buf.push_str(&line);
                    buf.push('\n');
                    count += 1;
                }
                Err(e) => error!(error = %e, measurement = %m.name, "Failed to encode measurement"),
            }
        }
        if count == 0 {
            return;
        }

        let Some(mut writer) = self.writer.take() else {
            error!(dropped = count, "Output writer is gone, dropping measurements");
            return;
        };
        let res = tokio::task::spawn_blocking(move || {
            let res = writer
                .write_all(buf.as_bytes())
                .and_then(|_| writer.flush());
            (writer, res)
        })
        .await;

        match res {
            Ok((writer, Ok(()))) => {
                self.writer = Some(writer);
                self.written += count;
            }
            Ok((writer, Err(e))) => {
                self.writer = Some(writer);
                error!(error = %e, dropped = count, "Failed to write measurements");
            }
            Err(e) => error!(error = %e, dropped = count, "Output write task failed"),
        }
    }
}

/// Encode a measurement as one InfluxDB line-protocol line, without the
/// trailing newline.
pub fn encode_line_protocol(m: &Measurement) -> String {
    let mut out = String::with_capacity(64);
    escape_into(&mut out, &m.name, &[',', ' ']);

    for (k, v) in &m.tags {
        out.push(',');
        escape_into(&mut out, k, &[',', '=', ' ']);
        out.push('=');
        escape_into(&mut out, v, &[',', '=', ' ']);
    }

    for (i, (k, v)) in m.fields.iter().enumerate() {
        out.push(if i == 0 { ' ' } else { ',' });
        escape_into(&mut out, k, &[',', '=', ' ']);
        out.push('=');
        match v {
            FieldValue::Integer(n) => {
                let _ = write!(out, "{}i", n);
            }
            FieldValue::Float(f) if f.is_finite() => {
                let _ = write!(out, "{}", f);
            }
            // Line protocol has no literal for inf or NaN
            FieldValue::Float(f) => {
                let _ = write!(out, "\"{}\"", f);
            }
            FieldValue::String(s) => {
                out.push('"');
                escape_into(&mut out, s, &['"', '\\']);
                out.push('"');
            }
        }
    }

    let _ = write!(out, " {}", m.timestamp.timestamp_nanos_opt().unwrap_or_default());
    out
}

fn escape_into(out: &mut String, s: &str, special: &[char]) {
    for c in s.chars() {
        if special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
}
