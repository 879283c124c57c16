// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use crate::receivers::logparser::error::{ParseError, Result};
use crate::receivers::logparser::measurement::Measurement;

/// Turns one raw log line into a measurement.
///
/// Implementations are compiled once and then shared read-only between all
/// dispatchers, so parsing must not need `&mut self`.
pub trait LineParser: Send + Sync {
    /// Short name used in logs, e.g. `"grok"`.
    fn name(&self) -> &'static str;

    fn parse_line(&self, line: &str) -> std::result::Result<Measurement, ParseError>;
}

/// Configuration that can be compiled into a [`LineParser`].
pub trait ParserFactory {
    fn name(&self) -> &'static str;

    fn build(&self) -> Result<Arc<dyn LineParser>>;
}
