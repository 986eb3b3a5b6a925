//! Stylesheet rendering engine abstraction.
//!
//! This module defines the [`StyleEngine`] trait, the contract between the
//! theme pipeline and whatever compiles stylesheet source into CSS, and the
//! [`Importer`] hook an engine calls back into whenever the source imports
//! another file. The default implementation is [`FlatEngine`], which inlines
//! imports and substitutes plain variables but does not implement nesting,
//! mixins or functions.
//!
//! Engines are called from blocking contexts. An engine must not assume it
//! runs on an async executor thread.

mod flat;

use std::path::PathBuf;

use crate::error::{EngineError, ImportError};

pub use flat::FlatEngine;

/// How the rendered CSS is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputStyle {
    /// Readable output, one declaration per line as written.
    #[default]
    Expanded,
    /// Whitespace and comments removed.
    Compressed,
}

impl OutputStyle {
    /// The style a build asks for through its `minimize` flag.
    pub fn from_minimize(minimize: bool) -> Self {
        if minimize {
            OutputStyle::Compressed
        } else {
            OutputStyle::Expanded
        }
    }
}

/// Input for a single render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    /// The file the data came from, used for error reporting.
    pub file: PathBuf,
    /// The (already rewritten) source to render.
    pub data: String,
    pub output_style: OutputStyle,
}

/// A successfully resolved import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Imported {
    /// Absolute path of the resolved file.
    pub file: PathBuf,
    /// Source to render in place of the import.
    pub contents: String,
}

/// Result of a render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub css: String,
    /// Source map JSON, for engines that produce one.
    pub source_map: Option<String>,
    /// Every file inlined during the render, in first-import order.
    pub included_files: Vec<PathBuf>,
}

/// Resolves `@import` references on behalf of an engine.
pub trait Importer {
    /// Resolves `url` as imported from `prev`.
    ///
    /// `prev` is the path of the importing file, or `"stdin"` when the
    /// import appears in the entry data.
    fn import(&mut self, url: &str, prev: &str) -> Result<Imported, ImportError>;
}

impl<F> Importer for F
where
    F: FnMut(&str, &str) -> Result<Imported, ImportError>,
{
    fn import(&mut self, url: &str, prev: &str) -> Result<Imported, ImportError> {
        self(url, prev)
    }
}

/// Compiles stylesheet source into CSS.
pub trait StyleEngine: Send + Sync {
    /// Renders `options.data`, resolving imports through `importer`.
    fn render(
        &self,
        options: &RenderOptions,
        importer: &mut dyn Importer,
    ) -> Result<Rendered, EngineError>;
}
