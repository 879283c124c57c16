// SPDX-License-Identifier: Apache-2.0

use tracing::{debug, warn};

use crate::receivers::logparser::error::FileOpenErrors;
use crate::receivers::logparser::input::FileFinder;
use crate::receivers::logparser::tail::{StartAt, TailConfig, TailSession};

/// Result of resolving the file patterns and opening every match.
pub struct TailStart {
    pub sessions: Vec<TailSession>,
    /// Files that matched but could not be followed. Does not affect `sessions`.
    pub errors: Option<FileOpenErrors>,
}

/// Expands file globs and opens one tail session per resolved file.
#[derive(Debug, Clone, Default)]
pub struct TailManager {
    config: TailConfig,
}

impl TailManager {
    pub fn new(config: TailConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TailConfig {
        &self.config
    }

    /// Open a session for every file matching `patterns`.
    ///
    /// A file that fails to open is recorded and skipped; the others are
    /// still opened. Files are not retried.
    pub fn start(&self, patterns: &[String], from_beginning: bool) -> TailStart {
        let config = TailConfig {
            start_at: if from_beginning {
                StartAt::Beginning
            } else {
                StartAt::End
            },
            ..self.config.clone()
        };

        let paths = FileFinder::new(patterns.to_vec()).find_files();
        if paths.is_empty() {
            warn!(patterns = ?patterns, "No files matched the configured patterns");
        }

        let mut sessions = Vec::with_capacity(paths.len());
        let mut errors = FileOpenErrors::default();
        for path in paths {
            match TailSession::open(&path, &config) {
                Ok(session) => sessions.push(session),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to open file for tailing");
                    errors.push(e);
                }
            }
        }

        debug!(
            opened = sessions.len(),
            failed = errors.len(),
            "Resolved files to tail"
        );

        TailStart {
            sessions,
            errors: errors.into_option(),
        }
    }
}
