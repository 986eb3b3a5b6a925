//! Error types for theme rewriting and stylesheet rendering.
//!
//! [`ParseError`] is produced by the scanner and the theme rewriter; it always
//! carries a 1-based line and column. [`EngineError`] is produced by a
//! [`StyleEngine`](crate::engine::StyleEngine) and additionally knows which
//! file failed and, when available, the buffer the engine was working on.

use std::path::PathBuf;

/// A recoverable failure while reading stylesheet source.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} (line {line}, column {column})")]
pub struct ParseError {
    /// Human-readable description of the problem.
    pub message: String,
    /// 1-based line of the failing position.
    pub line: usize,
    /// 1-based column of the failing position.
    pub column: usize,
}

impl ParseError {
    /// Creates a parse error at a byte offset of `source`.
    pub fn at(source: &str, offset: usize, message: impl Into<String>) -> Self {
        let (line, column) = line_column(source, offset);
        Self {
            message: message.into(),
            line,
            column,
        }
    }
}

/// Failure reported by a rendering engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct EngineError {
    /// Human-readable description of the problem.
    pub message: String,
    /// The file being rendered, if known. `None` means the entry data.
    pub file: Option<PathBuf>,
    /// 1-based line, if known.
    pub line: Option<usize>,
    /// 1-based column, if known.
    pub column: Option<usize>,
    /// The source buffer the engine was processing when it failed.
    pub buffer: Option<String>,
}

impl EngineError {
    /// Creates an engine error with no position information.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            file: None,
            line: None,
            column: None,
            buffer: None,
        }
    }

    /// Wraps a [`ParseError`] raised while the engine read `buffer`.
    pub fn from_parse(err: ParseError, file: Option<PathBuf>, buffer: &str) -> Self {
        Self {
            message: err.message,
            file,
            line: Some(err.line),
            column: Some(err.column),
            buffer: Some(buffer.to_string()),
        }
    }

    /// Attaches the failing position, computed from a byte offset of `buffer`.
    pub fn at(mut self, buffer: &str, offset: usize) -> Self {
        let (line, column) = line_column(buffer, offset);
        self.line = Some(line);
        self.column = Some(column);
        self.buffer = Some(buffer.to_string());
        self
    }

    /// Sets the file this error belongs to, unless one is already recorded.
    pub fn in_file(mut self, file: Option<PathBuf>) -> Self {
        if self.file.is_none() {
            self.file = file;
        }
        self
    }
}

/// Error returned by an [`Importer`](crate::engine::Importer).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ImportError {
    /// Description of why the import failed.
    pub message: String,
}

impl ImportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Converts a byte offset into a 1-based (line, column) pair.
///
/// Columns count characters, not bytes. Offsets past the end clamp to the end.
pub fn line_column(source: &str, offset: usize) -> (usize, usize) {
    let mut offset = offset.min(source.len());
    while !source.is_char_boundary(offset) {
        offset -= 1;
    }
    let before = &source[..offset];
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
    let column = before[line_start..].chars().count() + 1;
    (line, column)
}
