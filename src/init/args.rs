// SPDX-License-Identifier: Apache-2.0

use crate::exporters::stdout::OutputFormat;
use crate::init::logparser_receiver::LogParserArgs;
use clap::{Args, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Args, Clone)]
pub struct AgentRun {
    /// TOML config file with the logparser settings; environment variables
    /// prefixed with LOGPARSER_ override its values
    #[arg(long, env = "LOGPARSER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format for parsed measurements
    #[arg(
        value_enum,
        long,
        env = "LOGPARSER_OUTPUT_FORMAT",
        default_value = "line-protocol"
    )]
    pub output_format: OutputFormatArg,

    /// Maximum number of measurements queued between the parsers and the output
    #[arg(long, env = "LOGPARSER_QUEUE_SIZE", default_value = "1000")]
    pub queue_size: usize,

    #[command(flatten)]
    pub logparser: LogParserArgs,
}

impl Default for AgentRun {
    fn default() -> Self {
        AgentRun {
            config: None,
            output_format: OutputFormatArg::LineProtocol,
            queue_size: 1000,
            logparser: LogParserArgs::default(),
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormatArg {
    /// InfluxDB line protocol
    #[default]
    LineProtocol,
    /// JSON, one object per line
    Json,
}

impl From<OutputFormatArg> for OutputFormat {
    fn from(f: OutputFormatArg) -> Self {
        match f {
            OutputFormatArg::LineProtocol => OutputFormat::LineProtocol,
            OutputFormatArg::Json => OutputFormat::Json,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Debug, Parser)]
    struct TestCli {
        #[command(flatten)]
        run: AgentRun,
    }

    #[test]
    fn test_parse_flags() {
        let cli = TestCli::try_parse_from([
            "logparser",
            "--files",
            "/var/log/a.log,/var/log/**.log",
            "--from-beginning",
            "--grok-pattern",
            "%{COMBINEDAPACHELOG}",
            "--grok-tag-keys",
            "clientip,verb",
            "--output-format",
            "json",
        ])
        .unwrap();

        assert_eq!(cli.run.output_format, OutputFormatArg::Json);
        assert_eq!(cli.run.queue_size, 1000);
        assert_eq!(cli.run.logparser.files.len(), 2);
        assert!(cli.run.logparser.from_beginning);
        assert_eq!(cli.run.logparser.grok_tag_keys, vec!["clientip", "verb"]);
    }
}
