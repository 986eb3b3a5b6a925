//! Build session: owns the one plugin of a build.

use std::sync::Arc;

use parking_lot::Mutex;
use thematic_render::StyleEngine;

use crate::config::{PluginConfig, PluginOptions};
use crate::error::ConfigError;
use crate::plugin::ThemeTemplatePlugin;

/// Holds at most one installed [`ThemeTemplatePlugin`].
///
/// Installing a second plugin before [`teardown`](Self::teardown) is a
/// configuration error.
#[derive(Debug, Default)]
pub struct BuildSession {
    plugin: Mutex<Option<Arc<ThemeTemplatePlugin>>>,
}

impl BuildSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates `options` and installs a plugin using the built-in engine.
    pub fn install(&self, options: PluginOptions) -> Result<Arc<ThemeTemplatePlugin>, ConfigError> {
        self.install_config(options.validate()?)
    }

    /// Installs a plugin for an already validated configuration.
    pub fn install_config(
        &self,
        config: PluginConfig,
    ) -> Result<Arc<ThemeTemplatePlugin>, ConfigError> {
        self.install_plugin(|| ThemeTemplatePlugin::new(config))
    }

    /// Installs a plugin rendering with `engine`.
    pub fn install_with_engine(
        &self,
        config: PluginConfig,
        engine: Arc<dyn StyleEngine>,
    ) -> Result<Arc<ThemeTemplatePlugin>, ConfigError> {
        self.install_plugin(|| ThemeTemplatePlugin::with_engine(config, engine))
    }

    fn install_plugin(
        &self,
        build: impl FnOnce() -> ThemeTemplatePlugin,
    ) -> Result<Arc<ThemeTemplatePlugin>, ConfigError> {
        let mut slot = self.plugin.lock();
        if slot.is_some() {
            return Err(ConfigError::AlreadyInstalled);
        }
        let plugin = Arc::new(build());
        *slot = Some(Arc::clone(&plugin));
        tracing::debug!(cwd = %plugin.config().cwd.display(), "installed theme template plugin");
        Ok(plugin)
    }

    /// The installed plugin.
    pub fn plugin(&self) -> Result<Arc<ThemeTemplatePlugin>, ConfigError> {
        self.plugin.lock().clone().ok_or(ConfigError::NotInstalled)
    }

    pub fn is_installed(&self) -> bool {
        self.plugin.lock().is_some()
    }

    /// Removes the installed plugin, allowing a new one to be installed.
    pub fn teardown(&self) -> Option<Arc<ThemeTemplatePlugin>> {
        self.plugin.lock().take()
    }
}
