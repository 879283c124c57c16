// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::bounded_channel::BoundedReceiver;
use crate::receivers::logparser::accumulator::Accumulator;
use crate::receivers::logparser::parser::LineParser;
use crate::receivers::logparser::tail::TailEvent;

/// Counters reported by a dispatcher when it exits.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchStats {
    pub lines: u64,
    pub measurements: u64,
    pub parse_errors: u64,
    pub read_errors: u64,
}

/// Feeds the lines of one tailed file through every parser.
pub struct Dispatcher {
    path: PathBuf,
    events: BoundedReceiver<TailEvent>,
    parsers: Arc<[Arc<dyn LineParser>]>,
    accumulator: Accumulator,
}

impl Dispatcher {
    pub fn new(
        path: PathBuf,
        events: BoundedReceiver<TailEvent>,
        parsers: Arc<[Arc<dyn LineParser>]>,
        accumulator: Accumulator,
    ) -> Self {
        Self {
            path,
            events,
            parsers,
            accumulator,
        }
    }

    /// Run until the session's stream closes or the accumulator goes away.
    pub async fn run(mut self) -> DispatchStats {
        let mut stats = DispatchStats::default();
        let file = self.path.display().to_string();

        while let Some(event) = self.events.next().await {
            let line = match event {
                TailEvent::Line(line) => line,
                TailEvent::Error(e) => {
                    stats.read_errors += 1;
                    error!(file = %file, error = %e, "Error tailing file");
                    continue;
                }
            };
            stats.lines += 1;

            for parser in self.parsers.iter() {
                let measurement = match parser.parse_line(&line) {
                    Ok(m) => m,
                    Err(e) => {
                        stats.parse_errors += 1;
                        warn!(
                            file = %file,
                            parser = parser.name(),
                            line = %line,
                            error = %e,
                            "Malformed log line"
                        );
                        continue;
                    }
                };

                if self.accumulator.add_measurement(measurement).await.is_err() {
                    error!(file = %file, "Accumulator closed, stopping dispatcher");
                    return stats;
                }
                stats.measurements += 1;
            }
        }

        debug!(
            file = %file,
            lines = stats.lines,
            measurements = stats.measurements,
            parse_errors = stats.parse_errors,
            "Dispatcher finished"
        );
        stats
    }
}
