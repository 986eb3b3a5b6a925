//! Parsed stylesheet resources.

use std::path::PathBuf;
use std::time::SystemTime;

use serde::Serialize;
use thematic_render::{FieldUsage, Imported};

/// How a resource's contents were produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseMode {
    /// Rewritten from a successfully scanned syntax tree.
    Parsed,
    /// Scanning failed; rewritten by the regex fallback.
    FallbackParsed,
}

/// A stylesheet file rewritten into field-literal form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    /// Absolute, normalized path of the source file.
    pub file: PathBuf,
    /// Rewritten contents, ready for the rendering engine.
    pub contents: String,
    /// When this record was created.
    pub timestamp: SystemTime,
    /// Theme field references in this file alone.
    pub usage: FieldUsage,
    pub mode: ParseMode,
}

impl Resource {
    pub fn new(file: PathBuf, contents: String, usage: FieldUsage, mode: ParseMode) -> Self {
        Self {
            file,
            contents,
            timestamp: SystemTime::now(),
            usage,
            mode,
        }
    }

    /// The resource as an engine import result.
    pub fn imported(&self) -> Imported {
        Imported {
            file: self.file.clone(),
            contents: self.contents.clone(),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.mode == ParseMode::FallbackParsed
    }
}
