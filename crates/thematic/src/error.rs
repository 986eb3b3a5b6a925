//! Error types for the plugin core.
//!
//! These cover configuration, import resolution, template writes and the
//! render queue. Failures that reach the host build are converted to
//! [`Diagnostic`](crate::Diagnostic)s by the formatter instead.

use std::io;
use std::path::PathBuf;

use thematic_render::FieldsError;

/// Errors raised while loading or validating plugin configuration, or while
/// installing the plugin into a build session.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An option has an unusable value.
    #[error("Invalid option `{option}`: {reason}")]
    Invalid {
        option: &'static str,
        reason: String,
    },

    /// The configured vars file could not be loaded.
    #[error("Failed to load theme fields: {0}")]
    Fields(#[from] FieldsError),

    /// The configuration file could not be read.
    #[error("Failed to read configuration {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The configuration file is not valid YAML or JSON for the options.
    #[error("Failed to parse configuration {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    /// The process working directory is unavailable.
    #[error("Failed to determine the working directory: {0}")]
    CurrentDir(#[source] io::Error),

    /// A plugin is already installed in this build session.
    #[error("ThemeTemplatePlugin was already installed in this build session.")]
    AlreadyInstalled,

    /// The loader was used without an installed plugin.
    #[error("The theme template loader must be used with an installed ThemeTemplatePlugin.")]
    NotInstalled,
}

impl ConfigError {
    /// Create an invalid-option error.
    pub fn invalid(option: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            option,
            reason: reason.into(),
        }
    }
}

/// Errors raised while resolving an import to a file.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// No candidate path exists.
    #[error(
        "Import error in:\n{context}\nThe import \"{uri}\" could not be resolved. Searched paths:\n{}",
        .searched.iter().map(|p| format!(" - {}", p.display())).collect::<Vec<_>>().join("\n")
    )]
    PathLookup {
        uri: String,
        context: String,
        searched: Vec<PathBuf>,
    },

    /// A candidate exists but could not be read.
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A template could not be persisted to the output directory.
#[derive(Debug, thiserror::Error)]
#[error("Failed to write {}: {source}", path.display())]
pub struct WriteError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// A render job could not run to completion.
#[derive(Debug, thiserror::Error)]
pub enum RenderJobError {
    #[error("render queue is closed")]
    Closed,

    #[error("render task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_lookup_lists_every_path() {
        let err = ResolveError::PathLookup {
            uri: "theme".into(),
            context: "/app/src/main.scss".into(),
            searched: vec![
                PathBuf::from("/app/src/_theme.scss"),
                PathBuf::from("/app/src/theme.scss"),
            ],
        };
        assert_eq!(
            err.to_string(),
            "Import error in:\n/app/src/main.scss\nThe import \"theme\" could not be resolved. Searched paths:\n - /app/src/_theme.scss\n - /app/src/theme.scss"
        );
    }

    #[test]
    fn test_invalid_option_message() {
        let err = ConfigError::invalid("filename", "must contain [name]");
        assert_eq!(
            err.to_string(),
            "Invalid option `filename`: must contain [name]"
        );
    }
}
