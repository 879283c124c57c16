// SPDX-License-Identifier: Apache-2.0

use glob::glob;
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::warn;

/// FileFinder expands file glob patterns into concrete, de-duplicated paths
#[derive(Debug, Clone)]
pub struct FileFinder {
    patterns: Vec<String>,
}

impl FileFinder {
    pub fn new(patterns: Vec<String>) -> Self {
        Self { patterns }
    }

    /// Find all regular files matching any pattern, in pattern order.
    ///
    /// An invalid pattern is logged and skipped so the remaining patterns
    /// still resolve. A path matched by several patterns is returned once.
    pub fn find_files(&self) -> Vec<PathBuf> {
        let mut seen = HashSet::new();
        let mut paths = Vec::new();

        for pattern in &self.patterns {
            let mut expanded = Vec::new();
            for candidate in expand_pattern(pattern) {
                match glob(&candidate) {
                    Ok(m) => expanded.push(m),
                    Err(e) => {
                        warn!(pattern = %pattern, error = %e, "Skipping invalid file pattern");
                        expanded.clear();
                        break;
                    }
                }
            }

            for entry in expanded.into_iter().flatten() {
                let path = match entry {
                    Ok(p) => p,
                    Err(e) => {
                        warn!(pattern = %pattern, error = %e, "Unable to read path while expanding pattern");
                        continue;
                    }
                };

                // Skip directories
                if path.is_dir() {
                    continue;
                }

                if seen.insert(path.clone()) {
                    paths.push(path);
                }
            }
        }

        paths
    }
}

/// Rewrite every `**` into the component form the glob crate accepts, where
/// `**` matches any number of directories and always ends up followed by a
/// file component:
///
/// - `/var/log/**.log` becomes `/var/log/**/*.log`
/// - `/var/log/**` becomes `/var/log/**/*`
/// - `/var/log/app**` becomes both `/var/log/app*` and `/var/log/app*/**/*`
pub(crate) fn expand_pattern(pattern: &str) -> Vec<String> {
    let mut out = Vec::new();
    expand_from(String::new(), pattern, &mut out);
    out
}

fn expand_from(mut done: String, rest: &str, out: &mut Vec<String>) {
    let Some(idx) = rest.find("**") else {
        done.push_str(rest);
        out.push(done);
        return;
    };

    done.push_str(&rest[..idx]);
    let tail = rest[idx + 2..].trim_start_matches('*');
    let glued_before = !done.is_empty() && !done.ends_with(std::path::is_separator);

    if glued_before {
        // Same directory level: `app**` behaves like `app*`.
        expand_from(format!("{}*", done), tail, out);
        done.push_str("*/");
    }
    done.push_str("**");

    if !tail.starts_with(std::path::is_separator) {
        done.push_str("/*");
    }
    expand_from(done, tail, out);
}
