//! Host-facing errors and warnings.
//!
//! Every failure that reaches the host build goes through this module: it is
//! normalized into a [`Failure`], formatted into a [`Diagnostic`] that names
//! the file being processed, and either returned directly (from a transform)
//! or queued on the [`DiagnosticsQueue`] until the end of the build pass.
//!
//! Formatted errors look like:
//!
//! ```text
//! Theme Template
//! -> Error encountered in:
//! /app/src/main.scss
//! -> Undefined variable: $nope
//!   margin: $nope;
//!           ^
//! ```
//!
//! The two-line excerpt is only added when the failing file is a stylesheet
//! and its text is available, preferably as the buffer the failing component
//! read.

use std::fmt;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use thematic_render::{EngineError, ParseError};

use crate::error::{RenderJobError, ResolveError, WriteError};

/// First line of every diagnostic.
pub const DIAGNOSTIC_TAG: &str = "Theme Template";

static STYLESHEET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\.s?css").expect("valid stylesheet pattern"));

/// A failure in the shape the formatter understands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Failure {
    pub message: String,
    /// The failing file; `None` or `stdin` means the file being processed.
    pub file: Option<PathBuf>,
    pub line: Option<usize>,
    pub column: Option<usize>,
    /// The text the failing component was reading, for previews.
    pub buffer: Option<String>,
}

impl Failure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn with_buffer(mut self, buffer: impl Into<String>) -> Self {
        self.buffer = Some(buffer.into());
        self
    }
}

impl From<ParseError> for Failure {
    fn from(err: ParseError) -> Self {
        Self {
            message: err.message,
            file: None,
            line: Some(err.line),
            column: Some(err.column),
            buffer: None,
        }
    }
}

impl From<EngineError> for Failure {
    fn from(err: EngineError) -> Self {
        Self {
            message: err.message,
            file: err.file,
            line: err.line,
            column: err.column,
            buffer: err.buffer,
        }
    }
}

impl From<&ResolveError> for Failure {
    fn from(err: &ResolveError) -> Self {
        let file = match err {
            ResolveError::Io { path, .. } => Some(path.clone()),
            ResolveError::PathLookup { .. } => None,
        };
        Self {
            message: err.to_string(),
            file,
            ..Self::default()
        }
    }
}

impl From<WriteError> for Failure {
    fn from(err: WriteError) -> Self {
        Self {
            message: err.to_string(),
            file: Some(err.path),
            ..Self::default()
        }
    }
}

impl From<RenderJobError> for Failure {
    fn from(err: RenderJobError) -> Self {
        Self::new(err.to_string())
    }
}

impl From<std::io::Error> for Failure {
    fn from(err: std::io::Error) -> Self {
        Self::new(err.to_string())
    }
}

/// A formatted, host-reportable error or warning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{message}")]
pub struct Diagnostic {
    /// Full multi-line text.
    pub message: String,
    /// The file the failure was attributed to.
    pub file: Option<PathBuf>,
    pub line: Option<usize>,
    pub column: Option<usize>,
    /// The host should not print a stack or backtrace for this diagnostic.
    pub hide_stack: bool,
}

/// Formats a failure raised while processing `file_context`.
///
/// `message` replaces the default `Error encountered in` heading.
pub fn format_error(failure: &Failure, file_context: &Path, message: Option<&str>) -> Diagnostic {
    let file = match &failure.file {
        Some(file) if file.as_os_str() != "stdin" => file.clone(),
        _ => file_context.to_path_buf(),
    };

    let mut parts = vec![
        DIAGNOSTIC_TAG.to_string(),
        format!(
            "-> {}:\n{}",
            message.unwrap_or("Error encountered in"),
            file_context.display()
        ),
    ];
    if !failure.message.is_empty() {
        parts.push(format!("-> {}", failure.message));
    }
    let buffer = failure.buffer.as_deref();
    if let Some(excerpt) = excerpt(&file, buffer, failure.line, failure.column) {
        parts.push(excerpt);
    }

    Diagnostic {
        message: parts.join("\n"),
        file: Some(file),
        line: failure.line,
        column: failure.column,
        hide_stack: true,
    }
}

/// Formats a non-fatal problem found while processing `file_context`.
///
/// `message` replaces the default `Problem encountered` heading. A preview
/// of the failing line is added when the failure carries its buffer.
pub fn format_warning(
    failure: &Failure,
    file_context: &Path,
    message: Option<&str>,
) -> Diagnostic {
    let mut parts = vec![
        DIAGNOSTIC_TAG.to_string(),
        format!(
            "-> {} in:\n{}",
            message.unwrap_or("Problem encountered"),
            file_context.display()
        ),
        format!("-> {}", failure.message),
    ];
    let preview = failure
        .buffer
        .as_deref()
        .zip(failure.line)
        .and_then(|(buffer, line)| buffer.lines().nth(line.checked_sub(1)?));
    if let Some(preview) = preview {
        parts.push(format!(">>>>> {}", preview));
    }

    Diagnostic {
        message: parts.join("\n"),
        file: Some(file_context.to_path_buf()),
        line: failure.line,
        column: failure.column,
        hide_stack: true,
    }
}

/// The failing line and a caret under the failing column.
///
/// Positions refer to the text the failing component read, which differs
/// from the file on disk once theme references are rewritten, so `buffer`
/// wins over re-reading `file`.
fn excerpt(
    file: &Path,
    buffer: Option<&str>,
    line: Option<usize>,
    column: Option<usize>,
) -> Option<String> {
    if !STYLESHEET.is_match(&file.to_string_lossy()) {
        return None;
    }
    let line = line?.checked_sub(1)?;
    let source = match buffer {
        Some(buffer) => buffer.to_string(),
        None => std::fs::read_to_string(file).ok()?,
    };
    let text = source.lines().nth(line)?;
    let indent = column.unwrap_or(1).saturating_sub(1);
    Some(format!("{}\n{}^", text, " ".repeat(indent)))
}

/// Errors and warnings collected during one build pass.
#[derive(Debug, Default, Clone)]
pub struct DiagnosticsQueue {
    errors: Vec<Diagnostic>,
    warnings: Vec<Diagnostic>,
}

impl DiagnosticsQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Formats and queues a fatal problem.
    pub fn add_error(&mut self, failure: &Failure, file_context: &Path, message: Option<&str>) {
        let diagnostic = format_error(failure, file_context, message);
        tracing::error!(file = %file_context.display(), "{}", failure.message);
        self.errors.push(diagnostic);
    }

    /// Formats and queues a non-fatal problem.
    pub fn add_warning(&mut self, failure: &Failure, file_context: &Path, message: Option<&str>) {
        let diagnostic = format_warning(failure, file_context, message);
        tracing::warn!(file = %file_context.display(), "{}", failure.message);
        self.warnings.push(diagnostic);
    }

    pub fn errors(&self) -> &[Diagnostic] {
        &self.errors
    }

    pub fn warnings(&self) -> &[Diagnostic] {
        &self.warnings
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }

    pub fn clear(&mut self) {
        self.errors.clear();
        self.warnings.clear();
    }

    /// Takes every queued diagnostic as `(errors, warnings)`, leaving the
    /// queue empty.
    pub fn drain(&mut self) -> (Vec<Diagnostic>, Vec<Diagnostic>) {
        (
            std::mem::take(&mut self.errors),
            std::mem::take(&mut self.warnings),
        )
    }
}

impl fmt::Display for DiagnosticsQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} error(s), {} warning(s)",
            self.errors.len(),
            self.warnings.len()
        )
    }
}
