// SPDX-License-Identifier: Apache-2.0

//! Start/stop lifecycle of the logparser receiver.
//!
//! The receiver moves through three states, each a distinct type:
//! [`LogParserReceiver`] (configured), [`RunningLogParser`] (files tailed and
//! dispatchers running) and [`StoppedLogParser`] (terminal). Transitions
//! consume the previous state, so a receiver cannot be started twice or
//! restarted after it stops.

use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::receivers::logparser::accumulator::Accumulator;
use crate::receivers::logparser::config::LogParserConfig;
use crate::receivers::logparser::dispatcher::{DispatchStats, Dispatcher};
use crate::receivers::logparser::error::{FileOpenErrors, StartError};
use crate::receivers::logparser::parser::LineParser;
use crate::receivers::logparser::tail::TailSession;
use crate::receivers::logparser::tail_manager::{TailManager, TailStart};

/// A configured, not yet started receiver.
pub struct LogParserReceiver {
    config: LogParserConfig,
}

impl LogParserReceiver {
    pub fn new(config: LogParserConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LogParserConfig {
        &self.config
    }

    /// Compile the parsers, open every matching file and start one dispatcher
    /// per file, forwarding measurements to `accumulator`.
    ///
    /// Fails without opening anything if no parser is configured or one does
    /// not compile. Files that cannot be opened do not fail the start; they
    /// are reported through [`RunningLogParser::open_errors`].
    pub async fn start(self, accumulator: Accumulator) -> Result<RunningLogParser, StartError> {
        let factories = self.config.parser_factories();
        if factories.is_empty() {
            return Err(StartError::NoParsers);
        }

        let mut compiled = Vec::with_capacity(factories.len());
        for factory in factories {
            let parser = factory.build().map_err(|source| StartError::Compile {
                parser: factory.name(),
                source,
            })?;
            compiled.push(parser);
        }
        let parsers: Arc<[Arc<dyn LineParser>]> = compiled.into();

        let manager = TailManager::new(self.config.tail_config());
        let TailStart {
            mut sessions,
            errors,
        } = manager.start(&self.config.files, self.config.from_beginning);

        let mut dispatchers = JoinSet::new();
        for session in sessions.iter_mut() {
            let Some(events) = session.take_events() else {
                continue;
            };
            let dispatcher = Dispatcher::new(
                session.path().to_path_buf(),
                events,
                parsers.clone(),
                accumulator.clone(),
            );
            dispatchers.spawn(dispatcher.run());
        }

        if let Some(e) = &errors {
            error!(failed = e.len(), error = %e, "Some files could not be tailed");
        }
        info!(
            files = sessions.len(),
            parsers = parsers.len(),
            from_beginning = self.config.from_beginning,
            "Started logparser receiver"
        );

        Ok(RunningLogParser {
            sessions,
            dispatchers,
            open_errors: errors,
            parsers,
        })
    }
}

/// A started receiver with its tail sessions and dispatcher tasks.
pub struct RunningLogParser {
    sessions: Vec<TailSession>,
    dispatchers: JoinSet<DispatchStats>,
    open_errors: Option<FileOpenErrors>,
    parsers: Arc<[Arc<dyn LineParser>]>,
}

impl RunningLogParser {
    /// Files that matched but could not be opened during start.
    pub fn open_errors(&self) -> Option<&FileOpenErrors> {
        self.open_errors.as_ref()
    }

    pub fn sessions(&self) -> &[TailSession] {
        &self.sessions
    }

    pub fn parser_count(&self) -> usize {
        self.parsers.len()
    }

    /// Stop every session and wait, without a deadline, for all dispatchers
    /// to drain and exit.
    pub async fn stop(self) -> StoppedLogParser {
        let RunningLogParser {
            sessions,
            mut dispatchers,
            ..
        } = self;

        for session in &sessions {
            session.stop();
        }

        // Joining the reader threads blocks.
        let sessions = match tokio::task::spawn_blocking(move || {
            let mut sessions = sessions;
            for session in sessions.iter_mut() {
                if let Err(e) = session.cleanup() {
                    warn!(path = %session.path().display(), error = %e, "Failed to clean up tail session");
                }
            }
            sessions
        })
        .await
        {
            Ok(sessions) => sessions,
            Err(e) => {
                error!(error = %e, "Tail session cleanup task failed");
                Vec::new()
            }
        };

        let mut stats = DispatchStats::default();
        let mut joined = 0;
        while let Some(res) = dispatchers.join_next().await {
            joined += 1;
            match res {
                Ok(s) => {
                    stats.lines += s.lines;
                    stats.measurements += s.measurements;
                    stats.parse_errors += s.parse_errors;
                    stats.read_errors += s.read_errors;
                }
                Err(e) => error!(error = %e, "Dispatcher task failed"),
            }
        }

        info!(
            files = sessions.len(),
            lines = stats.lines,
            measurements = stats.measurements,
            parse_errors = stats.parse_errors,
            "Stopped logparser receiver"
        );

        StoppedLogParser {
            sessions,
            dispatchers_joined: joined,
            stats,
        }
    }
}

/// A stopped receiver. Terminal: a new cycle needs a new [`LogParserReceiver`].
pub struct StoppedLogParser {
    sessions: Vec<TailSession>,
    dispatchers_joined: usize,
    stats: DispatchStats,
}

impl StoppedLogParser {
    pub fn sessions(&self) -> &[TailSession] {
        &self.sessions
    }

    pub fn dispatchers_joined(&self) -> usize {
        self.dispatchers_joined
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }
}
