//! # Thematic - Theme Template Build Plugin
//!
//! `thematic` lets one set of stylesheet sources produce two artifacts per
//! entry: flat CSS with the theme's values filled in, and a server-side
//! template where every use of a theme field is an interpolation
//! placeholder. Apps ship the CSS for the default theme and render the
//! template per tenant, user or brand.
//!
//! ## Pieces
//!
//! - [`PluginOptions`] / [`PluginConfig`]: configuration, from YAML or JSON
//! - [`BuildSession`]: owns the single [`ThemeTemplatePlugin`] of a build
//! - [`ThemeTemplatePlugin`]: import resolution, resource cache, usage tables
//! - [`ThemeTemplateLoader`]: the per-file transform (sync and async)
//! - [`emit`]: the end-of-pass step producing CSS and template assets
//! - [`Diagnostic`]: formatted errors and warnings for the host
//!
//! ## A Build Pass
//!
//! ```rust,no_run
//! use std::collections::HashMap;
//! use std::path::Path;
//! use thematic::{emit, BuildSession, Compilation, PluginOptions, ThemeTemplateLoader};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let session = BuildSession::new();
//! let plugin = session.install(PluginOptions::from_file("thematic.yml")?)?;
//! let loader = ThemeTemplateLoader::from_session(&session)?;
//!
//! plugin.before_compilation(&HashMap::new());
//!
//! let source = std::fs::read_to_string("src/main.scss")?;
//! let output = loader.transform(&source, Path::new("src/main.scss"), false).await?;
//!
//! let mut compilation = Compilation::new().with_output_path("dist");
//! compilation.add_asset("main.css", output.css);
//! emit(&plugin, &mut compilation).await;
//!
//! // `main.css` now holds values, `main.css.erb` the template.
//! # Ok(())
//! # }
//! ```
//!
//! ## Logging
//!
//! The crate emits [`tracing`] events only: `debug` for cache hits,
//! evictions and emit progress, `trace` for import candidates, and `warn` /
//! `error` mirrors of queued diagnostics. Install a subscriber to see them.

mod cache;
pub mod config;
pub mod diagnostics;
pub mod emit;
mod error;
mod loader;
pub mod lookup;
mod plugin;
mod queue;
mod resource;
mod session;
pub mod usage;

pub use cache::ResourceCache;
pub use config::{OutputSetting, OutputTarget, PluginConfig, PluginOptions, Wrapping};
pub use diagnostics::{format_error, format_warning, Diagnostic, DiagnosticsQueue, Failure};
pub use emit::{emit, Asset, Compilation};
pub use error::{ConfigError, RenderJobError, ResolveError, WriteError};
pub use loader::{ThemeTemplateLoader, TransformOutput};
pub use lookup::{PathResolver, DEFAULT_EXTENSIONS};
pub use plugin::ThemeTemplatePlugin;
pub use queue::RenderQueue;
pub use resource::{ParseMode, Resource};
pub use session::BuildSession;
pub use usage::UsageReport;

/// Rewriting and rendering primitives.
pub use thematic_render as render;
