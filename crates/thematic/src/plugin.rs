//! The theme template plugin: resolver, cache and shared build state.
//!
//! [`ThemeTemplatePlugin`] is the object both halves of the build share. The
//! loader calls into it to parse entry files and resolve imports; the host
//! calls [`before_compilation`](ThemeTemplatePlugin::before_compilation) at
//! the start of every pass and [`emit`](crate::emit::emit) at the end.
//!
//! # Resource parsing
//!
//! Every file that enters the build is rewritten into field-literal form in
//! two stages:
//!
//! 1. Scan the source and rewrite theme field references. The result is
//!    cached immediately. If scanning fails, the regex fallback is used
//!    instead and one warning is recorded.
//! 2. Remove root-level declarations of theme fields, so the rendered CSS
//!    does not bake in their default values. On success this replaces the
//!    stage 1 entry. A failure is recorded as an error and the stage 1
//!    resource is kept.
//!
//! # Locking
//!
//! Cache, usage tables, diagnostics and the dirty flag live behind one
//! mutex. It is never held across an `.await`.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::Mutex;
use thematic_render::{FieldUsage, FlatEngine, StyleEngine, ThemeRewriter};

use crate::cache::ResourceCache;
use crate::config::PluginConfig;
use crate::diagnostics::{Diagnostic, DiagnosticsQueue, Failure};
use crate::error::ResolveError;
use crate::lookup::PathResolver;
use crate::queue::RenderQueue;
use crate::resource::{ParseMode, Resource};
use crate::usage::UsageReport;

const FALLBACK_WARNING: &str = "Failed to parse syntax tree, using regex fallback";
const REMOVAL_ERROR: &str = "Failed to remove theme variable declarations";

#[derive(Debug)]
struct PluginState {
    cache: ResourceCache,
    usage: UsageReport,
    diagnostics: DiagnosticsQueue,
    dirty: bool,
}

/// Shared plugin state for one build session.
pub struct ThemeTemplatePlugin {
    config: PluginConfig,
    resolver: PathResolver,
    rewriter: ThemeRewriter,
    engine: Arc<dyn StyleEngine>,
    render_queue: RenderQueue,
    state: Mutex<PluginState>,
}

impl std::fmt::Debug for ThemeTemplatePlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThemeTemplatePlugin")
            .field("config", &self.config)
            .field("render_queue", &self.render_queue)
            .finish_non_exhaustive()
    }
}

impl ThemeTemplatePlugin {
    /// Creates a plugin rendering with the built-in [`FlatEngine`].
    pub fn new(config: PluginConfig) -> Self {
        Self::with_engine(config, Arc::new(FlatEngine::new()))
    }

    /// Creates a plugin rendering with a custom engine.
    pub fn with_engine(config: PluginConfig, engine: Arc<dyn StyleEngine>) -> Self {
        let resolver = PathResolver::new(
            config.cwd.clone(),
            config.include_exts.clone(),
            config.include_paths.clone(),
        );
        let rewriter = ThemeRewriter::new(config.fields.clone(), config.rewriter.clone());
        let render_queue = RenderQueue::new(config.thread_pool_size);
        Self {
            config,
            resolver,
            rewriter,
            engine,
            render_queue,
            state: Mutex::new(PluginState {
                cache: ResourceCache::new(),
                usage: UsageReport::new(),
                diagnostics: DiagnosticsQueue::new(),
                dirty: true,
            }),
        }
    }

    pub fn config(&self) -> &PluginConfig {
        &self.config
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    pub fn rewriter(&self) -> &ThemeRewriter {
        &self.rewriter
    }

    pub fn engine(&self) -> &dyn StyleEngine {
        self.engine.as_ref()
    }

    pub fn render_queue(&self) -> &RenderQueue {
        &self.render_queue
    }

    /// Ordered candidate files for an import.
    pub fn lookup_paths(&self, uri: &str, prev: &str) -> Vec<PathBuf> {
        self.resolver.lookup_paths(uri, prev)
    }

    /// Resolves an import, reading candidates without blocking the executor.
    ///
    /// Cached resources win over the filesystem. A missing candidate moves on
    /// to the next one; any other read error aborts the resolution.
    pub async fn resolve(&self, uri: &str, prev: &str) -> Result<Arc<Resource>, ResolveError> {
        let paths = self.lookup_paths(uri, prev);
        for path in &paths {
            if let Some(cached) = self.cached(path) {
                tokio::task::yield_now().await;
                tracing::debug!(path = %path.display(), "import served from cache");
                return Ok(cached);
            }
            match tokio::fs::read_to_string(path).await {
                Ok(data) => return Ok(self.parse_resource(path, &data)),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                    tracing::trace!(path = %path.display(), "import candidate not found");
                }
                Err(source) => {
                    return Err(ResolveError::Io {
                        path: path.clone(),
                        source,
                    })
                }
            }
        }
        Err(lookup_error(uri, prev, paths))
    }

    /// Blocking counterpart of [`resolve`](Self::resolve).
    pub fn resolve_sync(&self, uri: &str, prev: &str) -> Result<Arc<Resource>, ResolveError> {
        let paths = self.lookup_paths(uri, prev);
        for path in &paths {
            if let Some(cached) = self.cached(path) {
                tracing::debug!(path = %path.display(), "import served from cache");
                return Ok(cached);
            }
            match std::fs::read_to_string(path) {
                Ok(data) => return Ok(self.parse_resource(path, &data)),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                    tracing::trace!(path = %path.display(), "import candidate not found");
                }
                Err(source) => {
                    return Err(ResolveError::Io {
                        path: path.clone(),
                        source,
                    })
                }
            }
        }
        Err(lookup_error(uri, prev, paths))
    }

    /// Rewrites a file into field-literal form and caches the result.
    ///
    /// Never fails: scanning problems fall back to the regex rewrite and are
    /// reported through the diagnostics queue.
    pub fn parse_resource(&self, file: &Path, data: &str) -> Arc<Resource> {
        let file = self.resolver.absolute(file);

        let source = match self.rewriter.load_source(data) {
            Ok(source) => source,
            Err(err) => {
                let fallback = self.rewriter.vars_to_field_literals(data);
                let resource = Arc::new(Resource::new(
                    file.clone(),
                    fallback.contents,
                    fallback.usage,
                    ParseMode::FallbackParsed,
                ));
                let mut state = self.state.lock();
                state.diagnostics.add_warning(
                    &Failure::from(err).with_buffer(data),
                    &file,
                    Some(FALLBACK_WARNING),
                );
                state.cache.insert(Arc::clone(&resource));
                return resource;
            }
        };

        let literals = source.to_field_literals();
        let parsed = Arc::new(Resource::new(
            file.clone(),
            literals.contents,
            literals.usage,
            ParseMode::Parsed,
        ));
        self.state.lock().cache.insert(Arc::clone(&parsed));

        match source.without_theme_declarations() {
            Ok(stripped) => {
                let resource = Arc::new(Resource::new(
                    file,
                    stripped.contents,
                    stripped.usage,
                    ParseMode::Parsed,
                ));
                self.state.lock().cache.insert(Arc::clone(&resource));
                tracing::debug!(path = %resource.file.display(), "parsed resource");
                resource
            }
            Err(err) => {
                self.state.lock().diagnostics.add_error(
                    &Failure::from(err).with_buffer(data),
                    &file,
                    Some(REMOVAL_ERROR),
                );
                parsed
            }
        }
    }

    /// Start-of-pass hook: evicts resources the host reports as modified
    /// since they were parsed, and starts a fresh diagnostics queue.
    pub fn before_compilation(&self, changed: &HashMap<PathBuf, SystemTime>) {
        let changed: HashMap<PathBuf, SystemTime> = changed
            .iter()
            .map(|(path, time)| (self.resolver.absolute(path), *time))
            .collect();

        let mut state = self.state.lock();
        state.diagnostics.clear();
        let evicted = state.cache.invalidate(&changed);
        if evicted > 0 {
            state.dirty = true;
        }
        tracing::debug!(evicted, dirty = state.dirty, "compilation started");
    }

    /// Records the field usage of `file` and its transitive dependencies.
    ///
    /// Each path counts once. Files that are not cached contribute nothing.
    pub fn report_field_usage(&self, file: &Path, dependencies: &[PathBuf]) {
        let key = self.resolver.relative(file);
        let mut totals = FieldUsage::new();
        let mut degraded = false;
        let mut seen = HashSet::new();

        let mut state = self.state.lock();
        for path in std::iter::once(file).chain(dependencies.iter().map(PathBuf::as_path)) {
            let path = self.resolver.absolute(path);
            if !seen.insert(path.clone()) {
                continue;
            }
            if let Some(resource) = state.cache.get(&path) {
                degraded |= resource.is_degraded();
                for (field, count) in &resource.usage {
                    *totals.entry(field.clone()).or_insert(0) += count;
                }
            }
        }
        tracing::debug!(file = %key, fields = totals.len(), "recorded field usage");
        state.usage.record(&key, totals, degraded);
    }

    /// A copy of the current usage tables.
    pub fn usage_report(&self) -> UsageReport {
        self.state.lock().usage.clone()
    }

    /// The cached resource for an absolute path.
    pub fn cached(&self, path: &Path) -> Option<Arc<Resource>> {
        self.state.lock().cache.get(path)
    }

    /// Whether cached state changed since templates were last written.
    pub fn is_dirty(&self) -> bool {
        self.state.lock().dirty
    }

    /// Errors queued in the current pass.
    pub fn errors(&self) -> Vec<Diagnostic> {
        self.state.lock().diagnostics.errors().to_vec()
    }

    /// Warnings queued in the current pass.
    pub fn warnings(&self) -> Vec<Diagnostic> {
        self.state.lock().diagnostics.warnings().to_vec()
    }

    pub(crate) fn add_error(&self, failure: &Failure, file_context: &Path, message: Option<&str>) {
        self.state
            .lock()
            .diagnostics
            .add_error(failure, file_context, message);
    }

    /// Ends a pass: takes the queued diagnostics and clears the dirty flag.
    pub(crate) fn finish_pass(&self) -> (Vec<Diagnostic>, Vec<Diagnostic>) {
        let mut state = self.state.lock();
        state.dirty = false;
        state.diagnostics.drain()
    }
}

fn lookup_error(uri: &str, prev: &str, searched: Vec<PathBuf>) -> ResolveError {
    ResolveError::PathLookup {
        uri: uri.to_string(),
        context: prev.to_string(),
        searched,
    }
}
