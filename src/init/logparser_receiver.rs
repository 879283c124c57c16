// SPDX-License-Identifier: Apache-2.0

use clap::{Args, ValueEnum};
use std::path::PathBuf;

use crate::receivers::logparser::config::{GrokParserConfig, LogParserConfig};
use crate::receivers::logparser::tail::WatchMode;

/// Watch mode for file system monitoring
#[derive(Copy, Clone, Debug, Default, ValueEnum, PartialEq, Eq)]
pub enum WatchModeArg {
    /// Automatically select the best watching strategy (native first, poll fallback)
    #[default]
    Auto,
    /// Force native file system watching (inotify/kqueue/FSEvents)
    Native,
    /// Force polling mode (use for NFS or when native watching is unreliable)
    Poll,
}

impl From<WatchModeArg> for WatchMode {
    fn from(w: WatchModeArg) -> Self {
        match w {
            WatchModeArg::Auto => WatchMode::Auto,
            WatchModeArg::Native => WatchMode::Native,
            WatchModeArg::Poll => WatchMode::Poll,
        }
    }
}

#[derive(Debug, Args, Clone)]
pub struct LogParserArgs {
    /// Comma-separated glob patterns of files to tail (e.g., "/var/log/apache/*.log,/var/log/**.log")
    #[arg(long, env = "LOGPARSER_FILES", value_delimiter = ',')]
    pub files: Vec<String>,

    /// Read files from the beginning instead of only new lines
    #[arg(long, env = "LOGPARSER_FROM_BEGINNING", default_value = "false")]
    pub from_beginning: bool,

    /// Grok pattern applied to every line (e.g., "%{COMBINEDAPACHELOG}")
    #[arg(long, env = "LOGPARSER_GROK_PATTERN")]
    pub grok_pattern: Option<String>,

    /// Extra pattern definitions, one "NAME regex" per line
    #[arg(long, env = "LOGPARSER_GROK_CUSTOM_PATTERNS")]
    pub grok_custom_patterns: Option<String>,

    /// File or directory with extra pattern definitions
    #[arg(long, env = "LOGPARSER_GROK_CUSTOM_PATTERN_FILE")]
    pub grok_custom_pattern_file: Option<PathBuf>,

    /// Comma-separated globs of capture names stored as tags
    #[arg(long, env = "LOGPARSER_GROK_TAG_KEYS", value_delimiter = ',')]
    pub grok_tag_keys: Vec<String>,

    /// Comma-separated globs of capture names stored as string fields
    #[arg(long, env = "LOGPARSER_GROK_FIELD_KEYS_STRING", value_delimiter = ',')]
    pub grok_field_keys_string: Vec<String>,

    /// Comma-separated globs of capture names stored as integer fields
    #[arg(long, env = "LOGPARSER_GROK_FIELD_KEYS_INT", value_delimiter = ',')]
    pub grok_field_keys_int: Vec<String>,

    /// Comma-separated globs of capture names stored as float fields
    #[arg(long, env = "LOGPARSER_GROK_FIELD_KEYS_FLOAT", value_delimiter = ',')]
    pub grok_field_keys_float: Vec<String>,

    /// Measurement name (defaults to "grok")
    #[arg(long, env = "LOGPARSER_GROK_MEASUREMENT")]
    pub grok_measurement: Option<String>,

    /// Capture to use as the measurement timestamp
    #[arg(long, env = "LOGPARSER_GROK_TIMESTAMP_FIELD")]
    pub grok_timestamp_field: Option<String>,

    /// chrono format of the timestamp capture (e.g., "%d/%b/%Y:%H:%M:%S %z")
    #[arg(long, env = "LOGPARSER_GROK_TIMESTAMP_FORMAT")]
    pub grok_timestamp_format: Option<String>,

    /// Watch mode: auto (default), native (inotify/kqueue/FSEvents), poll (for NFS)
    #[arg(value_enum, long, env = "LOGPARSER_WATCH_MODE", default_value = "auto")]
    pub watch_mode: WatchModeArg,

    /// Poll interval in milliseconds for checking file changes
    #[arg(long, env = "LOGPARSER_POLL_INTERVAL_MS", default_value = "250")]
    pub poll_interval_ms: u64,

    /// Maximum line size in characters (longer lines are truncated)
    #[arg(long, env = "LOGPARSER_MAX_LINE_SIZE", default_value = "65536")]
    pub max_line_size: usize,
}

impl Default for LogParserArgs {
    fn default() -> Self {
        Self {
            files: Vec::new(),
            from_beginning: false,
            grok_pattern: None,
            grok_custom_patterns: None,
            grok_custom_pattern_file: None,
            grok_tag_keys: Vec::new(),
            grok_field_keys_string: Vec::new(),
            grok_field_keys_int: Vec::new(),
            grok_field_keys_float: Vec::new(),
            grok_measurement: None,
            grok_timestamp_field: None,
            grok_timestamp_format: None,
            watch_mode: WatchModeArg::Auto,
            poll_interval_ms: 250,
            max_line_size: 65536,
        }
    }
}

impl LogParserArgs {
    /// Build the receiver config from command line args
    pub fn build_config(&self) -> LogParserConfig {
        let grok = self.grok_pattern.as_ref().map(|pattern| GrokParserConfig {
            pattern: pattern.clone(),
            custom_patterns: self.grok_custom_patterns.clone().unwrap_or_default(),
            custom_pattern_file: self.grok_custom_pattern_file.clone(),
            tag_keys: self.grok_tag_keys.clone(),
            field_keys_string: self.grok_field_keys_string.clone(),
            field_keys_int: self.grok_field_keys_int.clone(),
            field_keys_float: self.grok_field_keys_float.clone(),
            measurement: self.grok_measurement.clone(),
            timestamp_field: self.grok_timestamp_field.clone(),
            timestamp_format: self.grok_timestamp_format.clone(),
        });

        LogParserConfig {
            files: self.files.clone(),
            from_beginning: self.from_beginning,
            grok,
            watch_mode: self.watch_mode.into(),
            poll_interval_ms: self.poll_interval_ms,
            max_line_size: self.max_line_size,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_config_without_pattern_has_no_parser() {
        let args = LogParserArgs {
            files: vec!["/var/log/*.log".into()],
            ..Default::default()
        };
        let config = args.build_config();
        assert!(config.grok.is_none());
        assert_eq!(config.files, vec!["/var/log/*.log"]);
    }

    #[test]
    fn test_build_config_with_grok() {
        let args = LogParserArgs {
            files: vec!["/var/log/*.log".into()],
            from_beginning: true,
            grok_pattern: Some("%{COMBINEDAPACHELOG}".into()),
            grok_tag_keys: vec!["clientip".into()],
            grok_field_keys_int: vec!["response".into(), "bytes".into()],
            watch_mode: WatchModeArg::Poll,
            ..Default::default()
        };
        let config = args.build_config();

        assert!(config.from_beginning);
        assert_eq!(config.watch_mode, WatchMode::Poll);
        let grok = config.grok.unwrap();
        assert_eq!(grok.pattern, "%{COMBINEDAPACHELOG}");
        assert_eq!(grok.tag_keys, vec!["clientip"]);
        assert_eq!(grok.field_keys_int, vec!["response", "bytes"]);
        assert!(grok.custom_patterns.is_empty());
    }
}
