// SPDX-License-Identifier: Apache-2.0

//! Logparser receiver: tail log files and turn each line into a measurement.
//!
//! Files are selected with glob patterns (`**` matches across directories),
//! followed through appends, rotation and truncation, and every new line is
//! offered to each configured parser. The grok parser matches the line with
//! a pattern grammar, routes the captures into tags and typed fields by key
//! filters, and the resulting [`Measurement`] is queued on an [`Accumulator`].

pub mod accumulator;
pub mod classifier;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod grok;
pub mod input;
pub mod measurement;
pub mod parser;
pub mod receiver;
pub mod tail;
pub mod tail_manager;

pub use accumulator::{Accumulator, MeasurementReceiver};
pub use classifier::{CLASSIFICATION_ORDER, FieldClassifier, FieldKind};
pub use config::{GrokParserConfig, LogParserConfig};
pub use error::{Error, FileOpenErrors, ParseError, Result, StartError, TailError};
pub use measurement::{FieldValue, Measurement};
pub use parser::{GrokParser, LineParser, ParserFactory};
pub use receiver::{LogParserReceiver, RunningLogParser, StoppedLogParser};
pub use tail::{StartAt, TailConfig, TailEvent, TailSession, WatchMode};
pub use tail_manager::{TailManager, TailStart};
