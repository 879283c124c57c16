// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use super::library::PatternLibrary;
use crate::receivers::logparser::error::{Error, Result};

static REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"%\{(?P<name>[A-Za-z0-9_]+)(?::(?P<capture>[^:{}]+))?\}").unwrap()
});

const SLOT_PREFIX: &str = "__grok_";

/// A single named capture extracted from a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capture<'g, 'l> {
    pub name: &'g str,
    pub value: &'l str,
}

/// A pattern expanded against a library and compiled to a regex.
///
/// Each `%{NAME:capture}` gets its own regex group, so a capture name may be
/// used more than once in a pattern. Only those groups (and named groups
/// written directly in the pattern) are reported; plain `( ... )` groups are
/// never part of the output.
#[derive(Debug, Clone)]
pub struct Grammar {
    pattern: String,
    regex: Regex,
    /// Regex group index paired with the capture name it reports as.
    slots: Vec<(usize, String)>,
    /// Distinct capture names in first-seen order.
    names: Vec<String>,
}

impl Grammar {
    pub fn compile(pattern: &str, library: &PatternLibrary) -> Result<Self> {
        let mut expander = Expander {
            library,
            slot_names: HashMap::new(),
            stack: Vec::new(),
        };
        let expanded = expander.expand(pattern)?;
        let regex = Regex::new(&expanded)?;

        let mut slots = Vec::new();
        let mut names: Vec<String> = Vec::new();
        for (idx, group) in regex.capture_names().enumerate() {
            let Some(group) = group else {
                continue;
            };
            let name = match expander.slot_names.get(group) {
                Some(semantic) => semantic.clone(),
                None => group.to_string(),
            };
            if !names.contains(&name) {
                names.push(name.clone());
            }
            slots.push((idx, name));
        }

        Ok(Self {
            pattern: pattern.to_string(),
            regex,
            slots,
            names,
        })
    }

    /// The pattern as written, before expansion.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// The fully expanded regular expression.
    pub fn expanded(&self) -> &str {
        self.regex.as_str()
    }

    pub fn capture_names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn is_match(&self, line: &str) -> bool {
        self.regex.is_match(line)
    }

    /// Match a line, returning one entry per distinct capture name.
    ///
    /// When a name is bound by several groups the first non-empty value is
    /// reported. Groups that did not participate report an empty value.
    pub fn captures<'l>(&self, line: &'l str) -> Option<Vec<Capture<'_, 'l>>> {
        let caps = self.regex.captures(line)?;

        let mut out: Vec<Capture<'_, 'l>> = Vec::with_capacity(self.names.len());
        for (idx, name) in &self.slots {
            let value = caps.get(*idx).map(|m| m.as_str()).unwrap_or("");
            match out.iter_mut().find(|c| c.name == name.as_str()) {
                Some(existing) => {
                    if existing.value.is_empty() {
                        existing.value = value;
                    }
                }
                None => out.push(Capture {
                    name: name.as_str(),
                    value,
                }),
            }
        }
        Some(out)
    }
}

struct Expander<'a> {
    library: &'a PatternLibrary,
    slot_names: HashMap<String, String>,
    stack: Vec<String>,
}

impl<'a> Expander<'a> {
    fn expand(&mut self, text: &str) -> Result<String> {
        let library = self.library;
        let mut out = String::with_capacity(text.len());
        let mut last = 0;

        for caps in REFERENCE.captures_iter(text) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            out.push_str(&text[last..whole.start()]);
            last = whole.end();

            let name = &caps["name"];
            let fragment = library
                .get(name)
                .ok_or_else(|| Error::UnknownPattern(name.to_string()))?;
            if self.stack.iter().any(|n| n == name) {
                return Err(Error::RecursivePattern(name.to_string()));
            }

            self.stack.push(name.to_string());
            let inner = self.expand(fragment)?;
            self.stack.pop();

            match caps.name("capture") {
                Some(capture) => {
                    let slot = format!("{}{}", SLOT_PREFIX, self.slot_names.len());
                    out.push_str(&format!("(?P<{}>{})", slot, inner));
                    self.slot_names.insert(slot, capture.as_str().to_string());
                }
                None => {
                    out.push_str("(?:");
                    out.push_str(&inner);
                    out.push(')');
                }
            }
        }

        out.push_str(&text[last..]);
        Ok(out)
    }
}
