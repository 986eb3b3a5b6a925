//! Theme field usage across the dependency graph.
//!
//! After each entry file is rendered, its own field usage and that of every
//! file it imported (directly or not) are summed and stored under the entry's
//! root-relative path. Two views are kept in step: by file and by field.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use thematic_render::FieldUsage;

/// Cross-indexed field usage tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UsageReport {
    /// Field name → file → count.
    pub by_field: BTreeMap<String, BTreeMap<String, usize>>,
    /// File → field name → count.
    pub by_file: BTreeMap<String, FieldUsage>,
    /// Files whose usage includes regex-fallback counts.
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub degraded: BTreeSet<String>,
}

impl UsageReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the usage recorded for `file`.
    ///
    /// Fields the file no longer uses disappear from its by-field entries;
    /// fields no file uses disappear entirely.
    pub fn record(&mut self, file: &str, usage: FieldUsage, degraded: bool) {
        if let Some(previous) = self.by_file.get(file) {
            for field in previous.keys() {
                if let Some(files) = self.by_field.get_mut(field) {
                    files.remove(file);
                    if files.is_empty() {
                        self.by_field.remove(field);
                    }
                }
            }
        }

        for (field, count) in &usage {
            self.by_field
                .entry(field.clone())
                .or_default()
                .insert(file.to_string(), *count);
        }
        self.by_file.insert(file.to_string(), usage);

        if degraded {
            self.degraded.insert(file.to_string());
        } else {
            self.degraded.remove(file);
        }
    }

    /// Usage recorded for a file.
    pub fn file(&self, file: &str) -> Option<&FieldUsage> {
        self.by_file.get(file)
    }

    /// Files using a field, with counts.
    pub fn field(&self, field: &str) -> Option<&BTreeMap<String, usize>> {
        self.by_field.get(field)
    }

    pub fn is_empty(&self) -> bool {
        self.by_file.is_empty()
    }

    /// The report as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
