//! # Thematic Render - Theme Field Rewriting for Stylesheets
//!
//! `thematic-render` turns ordinary stylesheet sources into theme templates.
//! Authors write plain variables (`$brand-color`); the rewriter tracks which
//! of them are *theme fields* and carries them through compilation as inert
//! field literals, so the same compiled CSS can be emitted either with the
//! concrete values filled in or as a server-side template with placeholders.
//!
//! This crate is the rewriting foundation for the `thematic` build plugin, but
//! it has no I/O or build-system knowledge of its own.
//!
//! ## Core Concepts
//!
//! - [`ThemeFields`]: the named theme fields and their concrete values
//! - [`ThemeRewriter`]: converts between variable, literal, value and template forms
//! - [`SyntaxTree`]: token-level scan of a stylesheet, used for structure-aware rewriting
//! - [`StyleEngine`]: the contract for anything that compiles stylesheet source to CSS
//! - [`FlatEngine`]: a small built-in engine (imports and plain variables only)
//!
//! ## Quick Start
//!
//! ```rust
//! use std::path::PathBuf;
//! use thematic_render::{
//!     FlatEngine, Imported, ImportError, OutputStyle, RenderOptions, RewriterOptions,
//!     StyleEngine, ThemeFields, ThemeRewriter,
//! };
//!
//! let rewriter = ThemeRewriter::new(
//!     ThemeFields::new().with("brand-color", "#ff0000"),
//!     RewriterOptions::default(),
//! );
//!
//! let source = "$gap: 4px;\n.btn { color: $brand-color; margin: $gap; }\n";
//! let literals = rewriter.load_source(source).unwrap().to_field_literals();
//!
//! let rendered = FlatEngine::new()
//!     .render(
//!         &RenderOptions {
//!             file: PathBuf::from("/src/main.scss"),
//!             data: literals.contents,
//!             output_style: OutputStyle::Expanded,
//!         },
//!         &mut |url: &str, _prev: &str| -> Result<Imported, ImportError> {
//!             Err(ImportError::new(format!("no import {}", url)))
//!         },
//!     )
//!     .unwrap();
//!
//! assert_eq!(
//!     rewriter.field_literals_to_interpolations(&rendered.css),
//!     ".btn { color: <%= brand_color %>; margin: 4px; }\n"
//! );
//! assert_eq!(
//!     rewriter.field_literals_to_values(&rendered.css),
//!     ".btn { color: #ff0000; margin: 4px; }\n"
//! );
//! ```
//!
//! ## Failure Model
//!
//! Scanning failures are [`ParseError`]s with a line and column. Callers are
//! expected to recover from them with the regex fallback
//! ([`ThemeRewriter::vars_to_field_literals`]) rather than abort. Engine
//! failures are [`EngineError`]s and name the file that failed.

pub mod engine;
mod error;
pub mod rewriter;
pub mod theme;

pub use error::{line_column, EngineError, ImportError, ParseError};

pub use theme::{FieldsError, ThemeFields};

pub use rewriter::{
    field_literal, FieldRewrite, FieldUsage, RewriterOptions, SyntaxTree, ThemeRewriter,
    ThemeSource, Token, TokenKind, FIELD_DELIMITER,
};

pub use engine::{
    FlatEngine, Imported, Importer, OutputStyle, RenderOptions, Rendered, StyleEngine,
};
