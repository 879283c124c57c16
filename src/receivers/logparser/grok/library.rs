// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::patterns::BASE_PATTERNS;
use crate::receivers::logparser::error::{Error, Result};

/// A named set of pattern definitions that grammars are expanded against.
///
/// Definitions are stored unexpanded; references are only resolved when a
/// grammar is compiled, so a later definition can shadow a name that earlier
/// definitions already refer to.
#[derive(Debug, Clone, Default)]
pub struct PatternLibrary {
    patterns: HashMap<String, String>,
}

impl PatternLibrary {
    /// An empty library with no definitions.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in library.
    pub fn base() -> Self {
        let patterns = BASE_PATTERNS
            .iter()
            .map(|(name, fragment)| (name.to_string(), fragment.to_string()))
            .collect();
        Self { patterns }
    }

    /// Add or replace a single definition.
    pub fn insert(&mut self, name: impl Into<String>, fragment: impl Into<String>) {
        self.patterns.insert(name.into(), fragment.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.patterns.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.patterns.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Load definitions from pattern-file text.
    ///
    /// One `NAME fragment` per line. Blank lines and lines starting with `#`
    /// are skipped; the name ends at the first whitespace and the rest of the
    /// trimmed line is the fragment. Returns the number of definitions added.
    pub fn add_from_text(&mut self, text: &str) -> Result<usize> {
        let mut added = 0;
        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (name, fragment) = match line.split_once(char::is_whitespace) {
                Some((name, fragment)) => (name, fragment.trim_start()),
                None => (line, ""),
            };
            if fragment.is_empty() {
                return Err(Error::MalformedPattern {
                    line: idx + 1,
                    text: line.to_string(),
                });
            }

            self.insert(name, fragment);
            added += 1;
        }
        Ok(added)
    }

    /// Load definitions from a pattern file, or from every regular file in a
    /// directory (in file-name order).
    pub fn add_from_path(&mut self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let metadata = fs::metadata(path).map_err(|source| Error::PatternFile {
            path: path.to_path_buf(),
            source,
        })?;

        if !metadata.is_dir() {
            return self.add_from_file(path);
        }

        let entries = fs::read_dir(path).map_err(|source| Error::PatternFile {
            path: path.to_path_buf(),
            source,
        })?;
        let mut files: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .collect();
        files.sort();

        let mut added = 0;
        for file in files {
            added += self.add_from_file(&file)?;
        }
        Ok(added)
    }

    fn add_from_file(&mut self, path: &Path) -> Result<usize> {
        let text = fs::read_to_string(path).map_err(|source| Error::PatternFile {
            path: path.to_path_buf(),
            source,
        })?;
        let added = self.add_from_text(&text)?;
        debug!(path = %path.display(), patterns = added, "Loaded custom grok patterns");
        Ok(added)
    }
}
