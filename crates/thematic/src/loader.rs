//! The file-transform entry point.
//!
//! The host hands every entry stylesheet to the loader. The loader rewrites
//! it through the plugin, renders it with the plugin's engine (resolving
//! imports through the plugin's cache), records field usage for the entry
//! and its imports, and returns CSS that still contains field literals. The
//! emit phase turns those into values and placeholders later.
//!
//! Two flavours share the same semantics:
//!
//! - [`ThemeTemplateLoader::transform_sync`] renders on the calling thread
//!   and resolves imports with blocking reads.
//! - [`ThemeTemplateLoader::transform`] renders on the blocking pool behind
//!   the plugin's [`RenderQueue`](crate::RenderQueue) and resolves imports
//!   through the async resolver.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thematic_render::{
    EngineError, ImportError, Imported, OutputStyle, RenderOptions, Rendered,
};
use tokio::runtime::Handle;

use crate::diagnostics::{format_error, Diagnostic, Failure};
use crate::error::{ConfigError, ResolveError};
use crate::plugin::ThemeTemplatePlugin;
use crate::resource::Resource;
use crate::session::BuildSession;

/// Result of transforming one entry file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformOutput {
    /// Rendered CSS, theme fields still in field-literal form.
    pub css: String,
    /// Source map JSON, when the engine produced one.
    pub source_map: Option<String>,
    /// Absolute paths of every file imported during the render.
    pub dependencies: Vec<PathBuf>,
}

/// Transforms entry stylesheets for the installed plugin.
#[derive(Debug, Clone)]
pub struct ThemeTemplateLoader {
    plugin: Arc<ThemeTemplatePlugin>,
}

impl ThemeTemplateLoader {
    pub fn new(plugin: Arc<ThemeTemplatePlugin>) -> Self {
        Self { plugin }
    }

    /// A loader bound to the session's plugin.
    ///
    /// Fails with [`ConfigError::NotInstalled`] when no plugin is installed.
    pub fn from_session(session: &BuildSession) -> Result<Self, ConfigError> {
        Ok(Self::new(session.plugin()?))
    }

    pub fn plugin(&self) -> &Arc<ThemeTemplatePlugin> {
        &self.plugin
    }

    /// Transforms `content` of `resource_path`, blocking the calling thread.
    pub fn transform_sync(
        &self,
        content: &str,
        resource_path: &Path,
        minimize: bool,
    ) -> Result<TransformOutput, Diagnostic> {
        let plugin = &self.plugin;
        let resource = plugin.parse_resource(resource_path, content);
        let rendered = render(plugin, &resource, minimize, |url, context| {
            plugin.resolve_sync(url, context)
        });
        finish(plugin, resource_path, &resource, rendered)
    }

    /// Transforms `content` of `resource_path` on the blocking pool.
    ///
    /// Must be called from within a tokio runtime. Renders wait for a slot
    /// in the plugin's render queue.
    pub async fn transform(
        &self,
        content: &str,
        resource_path: &Path,
        minimize: bool,
    ) -> Result<TransformOutput, Diagnostic> {
        let plugin = Arc::clone(&self.plugin);
        let resource = plugin.parse_resource(resource_path, content);

        let handle = Handle::current();
        let job_plugin = Arc::clone(&plugin);
        let job_resource = Arc::clone(&resource);
        let job = move || {
            render(&job_plugin, &job_resource, minimize, |url, context| {
                handle.block_on(job_plugin.resolve(url, context))
            })
        };

        match plugin.render_queue().run(job).await {
            Ok(rendered) => finish(&plugin, resource_path, &resource, rendered),
            Err(err) => Err(format_error(&Failure::from(err), &resource.file, None)),
        }
    }
}

/// Maps the engine's `stdin` context to the entry file's directory.
fn importer_context(prev: &str, entry: &Path) -> String {
    if prev == "stdin" {
        entry
            .parent()
            .map(|dir| dir.to_string_lossy().into_owned())
            .unwrap_or_default()
    } else {
        prev.to_string()
    }
}

fn add_dependency(dependencies: &mut Vec<PathBuf>, file: &Path) {
    if file.is_absolute() && !dependencies.iter().any(|d| d == file) {
        dependencies.push(file.to_path_buf());
    }
}

/// Renders a parsed entry, resolving imports with `resolve`.
fn render<R>(
    plugin: &ThemeTemplatePlugin,
    resource: &Resource,
    minimize: bool,
    mut resolve: R,
) -> Result<(Rendered, Vec<PathBuf>), EngineError>
where
    R: FnMut(&str, &str) -> Result<Arc<Resource>, ResolveError>,
{
    let mut dependencies = Vec::new();
    let options = RenderOptions {
        file: resource.file.clone(),
        data: resource.contents.clone(),
        output_style: OutputStyle::from_minimize(minimize),
    };

    let rendered = {
        let mut importer = |url: &str, prev: &str| -> Result<Imported, ImportError> {
            let context = importer_context(prev, &resource.file);
            let found = resolve(url, &context).map_err(|e| ImportError::new(e.to_string()))?;
            add_dependency(&mut dependencies, &found.file);
            Ok(found.imported())
        };
        plugin.engine().render(&options, &mut importer)?
    };
    Ok((rendered, dependencies))
}

fn finish(
    plugin: &ThemeTemplatePlugin,
    resource_path: &Path,
    resource: &Resource,
    rendered: Result<(Rendered, Vec<PathBuf>), EngineError>,
) -> Result<TransformOutput, Diagnostic> {
    match rendered {
        Ok((rendered, dependencies)) => {
            plugin.report_field_usage(resource_path, &dependencies);
            tracing::debug!(
                file = %resource.file.display(),
                dependencies = dependencies.len(),
                "transformed stylesheet"
            );
            Ok(TransformOutput {
                css: rendered.css,
                source_map: rendered.source_map,
                dependencies,
            })
        }
        Err(err) => Err(format_error(&Failure::from(err), &resource.file, None)),
    }
}
