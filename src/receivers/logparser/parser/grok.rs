// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::debug;

use super::traits::{LineParser, ParserFactory};
use crate::receivers::logparser::classifier::{FieldClassifier, FieldKind};
use crate::receivers::logparser::config::GrokParserConfig;
use crate::receivers::logparser::error::{ParseError, Result};
use crate::receivers::logparser::grok::{Grammar, PatternLibrary};
use crate::receivers::logparser::measurement::{
    DEFAULT_MEASUREMENT, FieldValue, Measurement,
};

/// Capture used as the measurement time instead of the wall clock.
#[derive(Debug, Clone)]
struct TimestampCapture {
    field: String,
    format: String,
}

impl TimestampCapture {
    /// Parse with the configured format, first as a zoned time and then as
    /// a naive time assumed to be UTC.
    fn parse(&self, value: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_str(value, &self.format) {
            return Some(dt.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(value, &self.format)
            .ok()
            .map(|dt| dt.and_utc())
    }
}

/// Parses lines with a grok grammar and classifies captures by key filters.
#[derive(Debug, Clone)]
pub struct GrokParser {
    grammar: Grammar,
    classifier: FieldClassifier,
    measurement: String,
    timestamp: Option<TimestampCapture>,
}

impl GrokParser {
    /// Compile a parser from its configuration.
    ///
    /// Custom definitions load on top of the base library: the pattern file
    /// first, then the inline text, so inline definitions win on a name
    /// collision.
    pub fn compile(config: &GrokParserConfig) -> Result<Self> {
        let mut library = PatternLibrary::base();
        if let Some(path) = &config.custom_pattern_file {
            library.add_from_path(path)?;
        }
        if !config.custom_patterns.is_empty() {
            library.add_from_text(&config.custom_patterns)?;
        }

        let grammar = Grammar::compile(&config.pattern, &library)?;
        let classifier = FieldClassifier::compile(
            &config.tag_keys,
            &config.field_keys_string,
            &config.field_keys_int,
            &config.field_keys_float,
        )?;

        let timestamp = match (&config.timestamp_field, &config.timestamp_format) {
            (Some(field), Some(format)) => Some(TimestampCapture {
                field: field.clone(),
                format: format.clone(),
            }),
            _ => None,
        };

        Ok(Self {
            grammar,
            classifier,
            measurement: config
                .measurement
                .clone()
                .unwrap_or_else(|| DEFAULT_MEASUREMENT.to_string()),
            timestamp,
        })
    }

    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    fn convert(&self, kind: FieldKind, key: &str, value: &str) -> FieldValue {
        match kind {
            FieldKind::IntField => value.parse::<i64>().map(FieldValue::Integer).unwrap_or_else(|e| {
                debug!(key, value, error = %e, "Keeping non-integer value as string");
                FieldValue::String(value.to_string())
            }),
            FieldKind::FloatField => match value.parse::<f64>() {
                Ok(f) if f.is_finite() => FieldValue::Float(f),
                Ok(_) => {
                    debug!(key, value, "Keeping non-finite float as string");
                    FieldValue::String(value.to_string())
                }
                Err(e) => {
                    debug!(key, value, error = %e, "Keeping non-float value as string");
                    FieldValue::String(value.to_string())
                }
            },
            FieldKind::Tag | FieldKind::StringField => FieldValue::String(value.to_string()),
        }
    }
}

impl LineParser for GrokParser {
    fn name(&self) -> &'static str {
        "grok"
    }

    fn parse_line(&self, line: &str) -> std::result::Result<Measurement, ParseError> {
        let captures = self
            .grammar
            .captures(line)
            .ok_or_else(|| ParseError::NoMatch {
                pattern: self.grammar.pattern().to_string(),
            })?;

        let mut timestamp = None;
        let mut m = Measurement::new(self.measurement.as_str(), Utc::now());

        for capture in captures {
            if capture.name.is_empty() || capture.value.is_empty() {
                continue;
            }

            if let Some(ts) = &self.timestamp {
                if capture.name == ts.field {
                    if let Some(parsed) = ts.parse(capture.value) {
                        timestamp = Some(parsed);
                        continue;
                    }
                    debug!(
                        field = capture.name,
                        value = capture.value,
                        "Timestamp did not match format, using current time"
                    );
                }
            }

            match self.classifier.classify(capture.name) {
                FieldKind::Tag => {
                    m.tags
                        .insert(capture.name.to_string(), capture.value.to_string());
                }
                kind => {
                    let value = self.convert(kind, capture.name, capture.value);
                    m.fields.insert(capture.name.to_string(), value);
                }
            }
        }

        if m.fields.is_empty() {
            return Err(ParseError::NoFields);
        }
        if let Some(ts) = timestamp {
            m.timestamp = ts;
        }
        Ok(m)
    }
}

impl ParserFactory for GrokParserConfig {
    fn name(&self) -> &'static str {
        "grok"
    }

    fn build(&self) -> Result<Arc<dyn LineParser>> {
        Ok(Arc::new(GrokParser::compile(self)?))
    }
}
