//! The emit phase: turns rendered CSS into shipped CSS and templates.
//!
//! At the end of a build pass every CSS asset still holds field literals.
//! [`emit`] walks those assets once and, for each:
//!
//! 1. derives the template text (field literals → placeholders), wrapped in
//!    the configured header and footer, and adds it as a new asset named by
//!    the `filename` pattern;
//! 2. writes the template to the output directory when writes are enabled
//!    and cached state changed since the last pass;
//! 3. replaces the CSS asset's contents with the literal-value form.
//!
//! Writes run as spawned tasks. The pass completes only after every write
//! has finished, then the pass's diagnostics are moved into the compilation.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use tokio::sync::Notify;

use crate::diagnostics::{Diagnostic, Failure};
use crate::error::WriteError;
use crate::plugin::ThemeTemplatePlugin;

static CSS_ASSET: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(.+)\.css$").expect("valid asset pattern"));

static SOURCE_MAP_COMMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"/\*#\s*sourceMappingURL=[^*]*\*/\s*$").expect("valid source map pattern")
});

/// A build output file held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    source: String,
}

impl Asset {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn set_source(&mut self, source: impl Into<String>) {
        self.source = source.into();
    }

    /// Length in bytes.
    pub fn size(&self) -> usize {
        self.source.len()
    }
}

/// The host's view of one build pass.
#[derive(Debug, Clone, Default)]
pub struct Compilation {
    /// Assets by output name.
    pub assets: BTreeMap<String, Asset>,
    /// The host's output directory, if it has one.
    pub output_path: Option<PathBuf>,
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
}

impl Compilation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = Some(path.into());
        self
    }

    pub fn add_asset(&mut self, name: impl Into<String>, source: impl Into<String>) {
        self.assets.insert(name.into(), Asset::new(source));
    }

    pub fn asset(&self, name: &str) -> Option<&Asset> {
        self.assets.get(name)
    }
}

/// Counts scheduled and finished tasks; completes when they are equal.
///
/// Starts with one pending task standing for the synchronous part of the
/// pass, so it cannot complete before every write has been scheduled.
#[derive(Debug)]
struct Rendezvous {
    counts: Mutex<(usize, usize)>,
    notify: Notify,
}

impl Rendezvous {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            counts: Mutex::new((1, 0)),
            notify: Notify::new(),
        })
    }

    fn schedule(&self) {
        self.counts.lock().0 += 1;
    }

    fn complete(&self) {
        let mut counts = self.counts.lock();
        counts.1 += 1;
        if counts.0 == counts.1 {
            self.notify.notify_one();
        }
    }

    fn is_complete(&self) -> bool {
        let counts = self.counts.lock();
        counts.0 == counts.1
    }

    async fn wait(&self) {
        loop {
            let notified = self.notify.notified();
            if self.is_complete() {
                return;
            }
            notified.await;
        }
    }
}

/// Marks one task complete when dropped, even if the task panics.
struct Completion(Arc<Rendezvous>);

impl Drop for Completion {
    fn drop(&mut self) {
        self.0.complete();
    }
}

/// Wraps template text in a header and footer.
///
/// The footer goes before a trailing source map comment. Neither is added
/// twice.
pub fn wrap_template(text: &str, header: Option<&str>, footer: Option<&str>) -> String {
    let (body, map_comment) = match SOURCE_MAP_COMMENT.find(text) {
        Some(m) => (&text[..m.start()], &text[m.start()..]),
        None => (text, ""),
    };

    let mut out = String::with_capacity(text.len());
    if let Some(header) = header.filter(|h| !body.starts_with(*h)) {
        out.push_str(header);
        if !header.ends_with('\n') {
            out.push('\n');
        }
    }
    out.push_str(body);
    if let Some(footer) = footer.filter(|f| !body.trim_end().ends_with(f.trim_end())) {
        if !out.is_empty() && !out.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(footer);
        if !map_comment.is_empty() && !footer.ends_with('\n') {
            out.push('\n');
        }
    }
    out.push_str(map_comment);
    out
}

async fn write_template(path: &Path, text: &str) -> Result<(), WriteError> {
    let error = |source| WriteError {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(error)?;
    }
    tokio::fs::write(path, text).await.map_err(error)
}

/// Runs the emit phase over `compilation`.
pub async fn emit(plugin: &Arc<ThemeTemplatePlugin>, compilation: &mut Compilation) {
    let config = plugin.config();
    let rewriter = plugin.rewriter();

    let css_assets: Vec<(String, String)> = compilation
        .assets
        .keys()
        .filter_map(|name| {
            CSS_ASSET
                .captures(name)
                .map(|caps| (name.clone(), caps[1].to_string()))
        })
        .collect();

    let output_dir = config
        .output_dir(compilation.output_path.as_deref())
        .filter(|_| plugin.is_dirty());
    tracing::debug!(
        assets = css_assets.len(),
        writes = output_dir.is_some(),
        "emitting theme templates"
    );

    let rendezvous = Rendezvous::new();
    for (name, logical) in css_assets {
        let Some(asset) = compilation.assets.get_mut(&name) else {
            continue;
        };
        let source = asset.source().to_string();
        let template = wrap_template(
            &rewriter.field_literals_to_interpolations(&source),
            config.header_for(&logical),
            config.footer_for(&logical),
        );
        let template_name = config.template_name(&logical);

        if let Some(dir) = &output_dir {
            let path = dir.join(&template_name);
            let text = template.clone();
            let task_plugin = Arc::clone(plugin);
            let completion = Completion(Arc::clone(&rendezvous));
            rendezvous.schedule();
            tokio::spawn(async move {
                let _completion = completion;
                match write_template(&path, &text).await {
                    Ok(()) => tracing::debug!(path = %path.display(), "wrote template"),
                    Err(err) => task_plugin.add_error(
                        &Failure::from(err),
                        &path,
                        Some("Template could not be written"),
                    ),
                }
            });
        }

        asset.set_source(rewriter.field_literals_to_values(&source));
        if template_name == name {
            tracing::warn!(asset = %name, "template name collides with its CSS asset; the template replaces it");
        }
        compilation.add_asset(template_name, template);
    }

    if let Some(report_name) = &config.usage_report {
        match plugin.usage_report().to_json() {
            Ok(json) => compilation.add_asset(report_name.clone(), json),
            Err(err) => plugin.add_error(
                &Failure::new(err.to_string()),
                Path::new(report_name),
                Some("Usage report could not be serialized"),
            ),
        }
    }

    rendezvous.complete();
    rendezvous.wait().await;

    let (errors, warnings) = plugin.finish_pass();
    compilation.errors.extend(errors);
    compilation.warnings.extend(warnings);
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // Wrapping
    // =========================================================================

    #[test]
    fn test_wrap_header_and_footer() {
        assert_eq!(
            wrap_template(".a{}\n", Some("<% a %>"), Some("<% b %>")),
            "<% a %>\n.a{}\n<% b %>"
        );
    }

    #[test]
    fn test_wrap_footer_before_source_map() {
        let wrapped = wrap_template(
            ".a{}\n/*# sourceMappingURL=main.css.map */",
            None,
            Some("<% end %>"),
        );
        assert_eq!(
            wrapped,
            ".a{}\n<% end %>\n/*# sourceMappingURL=main.css.map */"
        );
    }

    #[test]
    fn test_wrap_never_duplicates() {
        let once = wrap_template(".a{}", Some("H"), Some("F"));
        assert_eq!(wrap_template(&once, Some("H"), Some("F")), once);
    }

    #[test]
    fn test_wrap_nothing() {
        assert_eq!(wrap_template(".a{}", None, None), ".a{}");
    }

    // =========================================================================
    // Rendezvous
    // =========================================================================

    #[tokio::test]
    async fn test_rendezvous_waits_for_every_task() {
        let rendezvous = Rendezvous::new();
        let done = Arc::new(Mutex::new(0usize));

        for i in 0..5u64 {
            rendezvous.schedule();
            let completion = Completion(Arc::clone(&rendezvous));
            let done = Arc::clone(&done);
            tokio::spawn(async move {
                let _completion = completion;
                tokio::time::sleep(std::time::Duration::from_millis(5 * i)).await;
                *done.lock() += 1;
            });
        }
        assert!(!rendezvous.is_complete());

        rendezvous.complete();
        rendezvous.wait().await;
        assert_eq!(*done.lock(), 5);
    }

    #[tokio::test]
    async fn test_rendezvous_with_no_tasks() {
        let rendezvous = Rendezvous::new();
        rendezvous.complete();
        rendezvous.wait().await;
        assert!(rendezvous.is_complete());
    }

    #[test]
    fn test_asset_size_is_bytes() {
        let mut asset = Asset::new("é");
        assert_eq!(asset.size(), 2);
        asset.set_source("ab");
        assert_eq!(asset.source(), "ab");
    }
}
