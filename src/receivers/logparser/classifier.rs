// SPDX-License-Identifier: Apache-2.0

use glob::Pattern;

use crate::receivers::logparser::error::{Error, Result};

/// Where a capture ends up in the measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Tag,
    IntField,
    FloatField,
    StringField,
}

/// Order in which key filters are consulted. The first filter that matches
/// a key decides its kind; keys matching none become string fields.
pub const CLASSIFICATION_ORDER: [FieldKind; 4] = [
    FieldKind::Tag,
    FieldKind::IntField,
    FieldKind::FloatField,
    FieldKind::StringField,
];

/// A set of glob patterns matched against capture names.
#[derive(Debug, Clone)]
pub struct KeyFilter {
    patterns: Vec<Pattern>,
}

impl KeyFilter {
    /// Compile a filter. Returns `None` for an empty list.
    pub fn compile<S: AsRef<str>>(globs: &[S]) -> Result<Option<Self>> {
        if globs.is_empty() {
            return Ok(None);
        }

        let patterns = globs
            .iter()
            .map(|g| {
                let g = g.as_ref();
                Pattern::new(g).map_err(|source| Error::InvalidGlob {
                    pattern: g.to_string(),
                    source,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Some(Self { patterns }))
    }

    pub fn matches(&self, key: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(key))
    }
}

/// Routes capture names to tags or typed fields.
#[derive(Debug, Clone, Default)]
pub struct FieldClassifier {
    rules: Vec<(FieldKind, KeyFilter)>,
}

impl FieldClassifier {
    pub fn compile<S: AsRef<str>>(
        tag_keys: &[S],
        string_keys: &[S],
        int_keys: &[S],
        float_keys: &[S],
    ) -> Result<Self> {
        let mut rules = Vec::with_capacity(CLASSIFICATION_ORDER.len());
        for kind in CLASSIFICATION_ORDER {
            let globs = match kind {
                FieldKind::Tag => tag_keys,
                FieldKind::IntField => int_keys,
                FieldKind::FloatField => float_keys,
                FieldKind::StringField => string_keys,
            };
            if let Some(filter) = KeyFilter::compile(globs)? {
                rules.push((kind, filter));
            }
        }
        Ok(Self { rules })
    }

    pub fn classify(&self, key: &str) -> FieldKind {
        self.rules
            .iter()
            .find(|(_, filter)| filter.matches(key))
            .map(|(kind, _)| *kind)
            .unwrap_or(FieldKind::StringField)
    }
}
