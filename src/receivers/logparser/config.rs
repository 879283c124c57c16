// SPDX-License-Identifier: Apache-2.0

//! Configuration for the logparser receiver.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::receivers::logparser::parser::ParserFactory;
use crate::receivers::logparser::tail::{StartAt, TailConfig, WatchMode};

/// Grok parser settings, the `[grok]` table of the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GrokParserConfig {
    /// Pattern matched against every line, e.g. `%{COMBINEDAPACHELOG}`
    pub pattern: String,
    /// Extra definitions, one `NAME fragment` per line
    pub custom_patterns: String,
    /// File (or directory of files) with extra definitions
    pub custom_pattern_file: Option<PathBuf>,
    /// Capture names stored as tags
    pub tag_keys: Vec<String>,
    /// Capture names stored as string fields
    pub field_keys_string: Vec<String>,
    /// Capture names stored as integer fields
    pub field_keys_int: Vec<String>,
    /// Capture names stored as float fields
    pub field_keys_float: Vec<String>,
    /// Measurement name, `grok` when unset
    pub measurement: Option<String>,
    /// Capture holding the event time
    pub timestamp_field: Option<String>,
    /// chrono format string for `timestamp_field`
    pub timestamp_format: Option<String>,
}

impl GrokParserConfig {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.pattern.trim().is_empty() {
            return Err("grok pattern must not be empty".to_string());
        }
        if self.timestamp_field.is_some() && self.timestamp_format.is_none() {
            return Err("timestamp_format must be set when timestamp_field is set".to_string());
        }
        Ok(())
    }
}

/// Configuration for the logparser receiver.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LogParserConfig {
    /// Glob patterns of files to tail; `**` matches any number of directories
    pub files: Vec<String>,
    /// Read existing content instead of starting at the end of each file
    pub from_beginning: bool,
    /// Grok parser, the only parser kind available
    pub grok: Option<GrokParserConfig>,
    /// Watch mode: auto, native, or poll
    pub watch_mode: WatchMode,
    /// How often to check files when no change notification arrives
    pub poll_interval_ms: u64,
    /// Longer lines are truncated to this many characters
    pub max_line_size: usize,
    /// Lines buffered per file between its reader and dispatcher
    pub channel_size: usize,
}

impl Default for LogParserConfig {
    fn default() -> Self {
        Self {
            files: Vec::new(),
            from_beginning: false,
            grok: None,
            watch_mode: WatchMode::Auto,
            poll_interval_ms: 250,
            max_line_size: 65536,
            channel_size: 1000,
        }
    }
}

impl LogParserConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.files.is_empty() {
            return Err("At least one file pattern must be specified".to_string());
        }
        if self.poll_interval_ms == 0 {
            return Err("poll_interval_ms must be greater than zero".to_string());
        }
        if self.max_line_size == 0 {
            return Err("max_line_size must be greater than zero".to_string());
        }
        if self.channel_size == 0 {
            return Err("channel_size must be greater than zero".to_string());
        }
        if let Some(grok) = &self.grok {
            grok.validate()?;
        }
        Ok(())
    }

    /// The configured parsers, in the order they are offered each line.
    pub fn parser_factories(&self) -> Vec<&dyn ParserFactory> {
        let mut factories: Vec<&dyn ParserFactory> = Vec::new();
        if let Some(grok) = &self.grok {
            factories.push(grok);
        }
        factories
    }

    pub fn tail_config(&self) -> TailConfig {
        TailConfig {
            start_at: if self.from_beginning {
                StartAt::Beginning
            } else {
                StartAt::End
            },
            watch_mode: self.watch_mode,
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            max_line_size: self.max_line_size,
            channel_size: self.channel_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Figment;
    use figment::providers::{Format, Toml};

    fn valid() -> LogParserConfig {
        LogParserConfig {
            files: vec!["/var/log/*.log".to_string()],
            grok: Some(GrokParserConfig::new("%{COMBINEDAPACHELOG}")),
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_empty_files_rejected() {
        let config = LogParserConfig {
            files: vec![],
            ..valid()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_pattern_rejected() {
        let config = LogParserConfig {
            grok: Some(GrokParserConfig::new("  ")),
            ..valid()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_timestamp_field_requires_format() {
        let mut grok = GrokParserConfig::new("%{HTTPDATE:ts}");
        grok.timestamp_field = Some("ts".to_string());
        let config = LogParserConfig {
            grok: Some(grok),
            ..valid()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parser_factories() {
        assert_eq!(valid().parser_factories().len(), 1);
        assert!(LogParserConfig::default().parser_factories().is_empty());
    }

    #[test]
    fn test_tail_config() {
        let mut config = valid();
        assert_eq!(config.tail_config().start_at, StartAt::End);

        config.from_beginning = true;
        config.poll_interval_ms = 50;
        let tail = config.tail_config();
        assert_eq!(tail.start_at, StartAt::Beginning);
        assert_eq!(tail.poll_interval, Duration::from_millis(50));
    }

    #[test]
    fn test_deserialize_toml_section() {
        let toml = r#"
            files = ["/var/log/apache/access.log", "/var/log/**.log"]
            from_beginning = true
            watch_mode = "poll"

            [grok]
            pattern = "%{COMBINEDAPACHELOG}"
            custom_patterns = '''
            DURATION %{NUMBER}[nuµm]?s
            '''
            tag_keys = ["clientip"]
            field_keys_int = ["response", "bytes"]
        "#;

        let config: LogParserConfig = Figment::new()
            .merge(Toml::string(toml))
            .extract()
            .unwrap();

        assert_eq!(config.files.len(), 2);
        assert!(config.from_beginning);
        assert_eq!(config.watch_mode, WatchMode::Poll);
        assert_eq!(config.poll_interval_ms, 250);

        let grok = config.grok.unwrap();
        assert_eq!(grok.pattern, "%{COMBINEDAPACHELOG}");
        assert!(grok.custom_patterns.contains("DURATION"));
        assert_eq!(grok.tag_keys, vec!["clientip"]);
        assert_eq!(grok.field_keys_int, vec!["response", "bytes"]);
    }
}
