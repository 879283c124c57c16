// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Setup-time errors raised while compiling patterns, filters or configuration.
#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to read pattern file {path:?}: {source}")]
    PatternFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed pattern definition on line {line}: {text:?}")]
    MalformedPattern { line: usize, text: String },

    #[error("unknown pattern %{{{0}}}")]
    UnknownPattern(String),

    #[error("pattern %{{{0}}} references itself")]
    RecursivePattern(String),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("Invalid glob pattern {pattern:?}: {source}")]
    InvalidGlob {
        pattern: String,
        source: glob::PatternError,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

/// A line that could not be turned into a measurement.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("line does not match pattern {pattern:?}")]
    NoMatch { pattern: String },

    #[error("line matched but produced no fields")]
    NoFields,
}

/// Fatal errors returned by `LogParserReceiver::start`.
#[derive(Error, Debug)]
pub enum StartError {
    #[error("logparser input plugin: no parsers defined")]
    NoParsers,

    #[error("failed to compile {parser} parser: {source}")]
    Compile {
        parser: &'static str,
        #[source]
        source: Error,
    },
}

/// Errors opening or following a single tailed file.
#[derive(Error, Debug)]
pub enum TailError {
    #[error("failed to open {path:?}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to seek {path:?}: {source}")]
    Seek {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to watch {path:?}: {source}")]
    Watch {
        path: PathBuf,
        source: notify::Error,
    },

    #[error("tail thread for {0:?} panicked")]
    ThreadPanicked(PathBuf),
}

/// Every file that could not be opened during start, in the order attempted.
///
/// The display form concatenates the individual messages, so a caller that
/// only logs the error still sees each failed path.
#[derive(Debug, Default)]
pub struct FileOpenErrors {
    failures: Vec<TailError>,
}

impl FileOpenErrors {
    pub fn push(&mut self, error: TailError) {
        self.failures.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TailError> {
        self.failures.iter()
    }

    /// Returns `None` when no file failed.
    pub fn into_option(self) -> Option<Self> {
        if self.is_empty() { None } else { Some(self) }
    }
}

impl fmt::Display for FileOpenErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, e) in self.failures.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}", e)?;
        }
        Ok(())
    }
}

impl std::error::Error for FileOpenErrors {}
