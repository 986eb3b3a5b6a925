//! Plugin configuration.
//!
//! [`PluginOptions`] is the user-facing shape: every key optional, loadable
//! from YAML or JSON. [`PluginOptions::validate`] resolves paths, loads the
//! theme fields and checks every value, producing the [`PluginConfig`] the
//! plugin runs with.
//!
//! ```yaml
//! include_paths: [styles/theme]
//! vars_file: styles/theme/_vars.scss
//! filename: "[name].css.erb"
//! output: app/views/themes
//! template_open: "<%= "
//! template_close: " %>"
//! file_header:
//!   main: "<% cache theme do %>"
//! file_footer:
//!   main: "<% end %>"
//! usage_report: theme-usage.json
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thematic_render::{RewriterOptions, ThemeFields};

use crate::error::ConfigError;
use crate::lookup::DEFAULT_EXTENSIONS;

/// Placeholder replaced by an asset's logical name in `filename`.
pub const NAME_PLACEHOLDER: &str = "[name]";

/// Default template asset name pattern.
pub const DEFAULT_FILENAME: &str = "[name].css.erb";

/// Default render thread pool size.
pub const DEFAULT_THREAD_POOL_SIZE: usize = 4;

/// Environment variable overriding the render thread pool size.
pub const THREAD_POOL_ENV: &str = "THEMATIC_THREADPOOL_SIZE";

/// `output` option: `false` disables writes, `true` uses the host's output
/// directory, a string names a directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutputSetting {
    Enabled(bool),
    Path(PathBuf),
}

/// Text wrapped around templates: one text for every asset, or per logical
/// asset name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Wrapping {
    Text(String),
    PerName(BTreeMap<String, String>),
}

impl Wrapping {
    /// The text for a logical asset name, if any.
    pub fn for_name(&self, name: &str) -> Option<&str> {
        match self {
            Wrapping::Text(text) => Some(text),
            Wrapping::PerName(map) => map.get(name).map(String::as_str),
        }
    }
}

/// User-facing plugin options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PluginOptions {
    /// Working root. Relative paths below resolve against it.
    pub cwd: Option<PathBuf>,
    /// Template asset name pattern; must contain `[name]`.
    pub filename: Option<String>,
    /// Default import extensions, in priority order.
    pub include_exts: Option<Vec<String>>,
    /// Extra import search directories.
    pub include_paths: Vec<PathBuf>,
    pub output: Option<OutputSetting>,
    /// Stylesheet (or YAML map) declaring the theme fields.
    pub vars_file: Option<PathBuf>,
    /// Inline theme fields; override the vars file.
    pub fields: ThemeFields,
    pub template_open: Option<String>,
    pub template_close: Option<String>,
    pub template_snake_case: Option<bool>,
    pub file_header: Option<Wrapping>,
    pub file_footer: Option<Wrapping>,
    /// Asset name for the JSON field usage report.
    pub usage_report: Option<String>,
    pub thread_pool_size: Option<usize>,
}

/// Where templates are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    Disabled,
    HostDefault,
    Directory(PathBuf),
}

/// Validated plugin configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginConfig {
    pub cwd: PathBuf,
    pub filename: String,
    pub include_exts: Vec<String>,
    pub include_paths: Vec<PathBuf>,
    pub output: OutputTarget,
    pub fields: ThemeFields,
    pub rewriter: RewriterOptions,
    pub file_header: Option<Wrapping>,
    pub file_footer: Option<Wrapping>,
    pub usage_report: Option<String>,
    pub thread_pool_size: usize,
}

impl PluginOptions {
    /// Parses options from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Parses options from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Loads options from a `.json`, `.yaml` or `.yml` file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let parse_error = |reason: String| ConfigError::Parse {
            path: path.to_path_buf(),
            reason,
        };

        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&content).map_err(|e| parse_error(e.to_string())),
            Some("yaml") | Some("yml") => {
                Self::from_yaml(&content).map_err(|e| parse_error(e.to_string()))
            }
            other => Err(parse_error(format!(
                "unsupported configuration format {:?}",
                other.unwrap_or("")
            ))),
        }
    }

    /// Resolves and checks every option.
    ///
    /// Relative paths resolve against `cwd` (itself resolved against the
    /// process working directory). The vars file is loaded here, so a
    /// missing or malformed one fails validation.
    pub fn validate(self) -> Result<PluginConfig, ConfigError> {
        let process_cwd = std::env::current_dir().map_err(ConfigError::CurrentDir)?;
        let cwd = crate::lookup::normalize(&match self.cwd {
            Some(cwd) => process_cwd.join(cwd),
            None => process_cwd,
        });

        let filename = self
            .filename
            .unwrap_or_else(|| DEFAULT_FILENAME.to_string());
        if !filename.contains(NAME_PLACEHOLDER) {
            return Err(ConfigError::invalid(
                "filename",
                format!("{:?} must contain {}", filename, NAME_PLACEHOLDER),
            ));
        }

        let include_exts = self
            .include_exts
            .unwrap_or_else(|| DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect());
        if let Some(bad) = include_exts.iter().find(|e| !e.starts_with('.') || e.len() < 2) {
            return Err(ConfigError::invalid(
                "include_exts",
                format!("{:?} must start with '.'", bad),
            ));
        }

        let include_paths = self
            .include_paths
            .iter()
            .map(|p| crate::lookup::normalize(&cwd.join(p)))
            .collect();

        let output = match self.output {
            Some(OutputSetting::Enabled(false)) => OutputTarget::Disabled,
            Some(OutputSetting::Enabled(true)) | None => OutputTarget::HostDefault,
            Some(OutputSetting::Path(dir)) => {
                OutputTarget::Directory(crate::lookup::normalize(&cwd.join(dir)))
            }
        };

        let mut fields = match &self.vars_file {
            Some(vars_file) => ThemeFields::from_file(cwd.join(vars_file))?,
            None => ThemeFields::new(),
        };
        fields.merge(&self.fields);

        let defaults = RewriterOptions::default();
        let rewriter = RewriterOptions {
            template_open: self.template_open.unwrap_or(defaults.template_open),
            template_close: self.template_close.unwrap_or(defaults.template_close),
            snake_case: self.template_snake_case.unwrap_or(defaults.snake_case),
        };

        let thread_pool_size = match self.thread_pool_size {
            Some(size) => size,
            None => thread_pool_size_from_env()?,
        };
        if thread_pool_size < 2 {
            return Err(ConfigError::invalid(
                "thread_pool_size",
                format!(
                    "{} leaves no thread for import reads; use at least 2",
                    thread_pool_size
                ),
            ));
        }

        Ok(PluginConfig {
            cwd,
            filename,
            include_exts,
            include_paths,
            output,
            fields,
            rewriter,
            file_header: self.file_header,
            file_footer: self.file_footer,
            usage_report: self.usage_report,
            thread_pool_size,
        })
    }
}

fn thread_pool_size_from_env() -> Result<usize, ConfigError> {
    match std::env::var(THREAD_POOL_ENV) {
        Ok(value) => value.trim().parse().map_err(|_| {
            ConfigError::invalid(
                "thread_pool_size",
                format!("{}={:?} is not a number", THREAD_POOL_ENV, value),
            )
        }),
        Err(_) => Ok(DEFAULT_THREAD_POOL_SIZE),
    }
}

impl PluginConfig {
    /// The template asset name for a logical asset name.
    pub fn template_name(&self, logical: &str) -> String {
        self.filename.replace(NAME_PLACEHOLDER, logical)
    }

    /// The directory templates are written to, given the host's output
    /// directory.
    pub fn output_dir(&self, host_output: Option<&Path>) -> Option<PathBuf> {
        match &self.output {
            OutputTarget::Disabled => None,
            OutputTarget::HostDefault => host_output.map(|dir| self.cwd.join(dir)),
            OutputTarget::Directory(dir) => Some(dir.clone()),
        }
    }

    pub fn header_for(&self, logical: &str) -> Option<&str> {
        self.file_header.as_ref().and_then(|w| w.for_name(logical))
    }

    pub fn footer_for(&self, logical: &str) -> Option<&str> {
        self.file_footer.as_ref().and_then(|w| w.for_name(logical))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn options(yaml: &str) -> PluginOptions {
        PluginOptions::from_yaml(yaml).unwrap()
    }

    // =========================================================================
    // Parsing
    // =========================================================================

    #[test]
    fn test_yaml_keys() {
        let opts = options(
            "cwd: /app\nfilename: \"[name].liquid\"\ninclude_paths: [lib]\noutput: false\nfields:\n  brand-color: \"#f00\"\nfile_header: \"{% raw %}\"\nfile_footer:\n  main: \"<% end %>\"\n",
        );
        assert_eq!(opts.cwd, Some(PathBuf::from("/app")));
        assert_eq!(opts.output, Some(OutputSetting::Enabled(false)));
        assert_eq!(opts.file_header, Some(Wrapping::Text("{% raw %}".into())));
        assert_eq!(
            opts.file_footer.as_ref().and_then(|w| w.for_name("main")),
            Some("<% end %>")
        );
        assert_eq!(opts.fields.get("brand-color"), Some("#f00"));
    }

    #[test]
    fn test_json_output_path() {
        let opts = PluginOptions::from_json(r#"{"output": "public/themes"}"#).unwrap();
        assert_eq!(
            opts.output,
            Some(OutputSetting::Path(PathBuf::from("public/themes")))
        );
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        assert!(PluginOptions::from_yaml("write_path: x\n").is_err());
    }

    #[test]
    fn test_from_file_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = dir.path().join("thematic.yml");
        let toml = dir.path().join("thematic.toml");
        std::fs::write(&yaml, "usage_report: usage.json\n").unwrap();
        std::fs::write(&toml, "").unwrap();

        let opts = PluginOptions::from_file(&yaml).unwrap();
        assert_eq!(opts.usage_report.as_deref(), Some("usage.json"));
        assert!(matches!(
            PluginOptions::from_file(&toml),
            Err(ConfigError::Parse { .. })
        ));
    }

    // =========================================================================
    // Validation
    // =========================================================================

    #[test]
    #[serial]
    fn test_defaults() {
        std::env::remove_var(THREAD_POOL_ENV);
        let config = options("cwd: /app\n").validate().unwrap();
        assert_eq!(config.cwd, PathBuf::from("/app"));
        assert_eq!(config.filename, DEFAULT_FILENAME);
        assert_eq!(config.include_exts, vec![".scss", ".sass"]);
        assert_eq!(config.output, OutputTarget::HostDefault);
        assert_eq!(config.rewriter, RewriterOptions::default());
        assert_eq!(config.thread_pool_size, DEFAULT_THREAD_POOL_SIZE);
        assert!(config.fields.is_empty());
    }

    #[test]
    fn test_paths_resolve_against_cwd() {
        let config = options(
            "cwd: /app\ninclude_paths: [lib, /abs]\noutput: out/../public\nthread_pool_size: 2\n",
        )
        .validate()
        .unwrap();
        assert_eq!(
            config.include_paths,
            vec![PathBuf::from("/app/lib"), PathBuf::from("/abs")]
        );
        assert_eq!(
            config.output,
            OutputTarget::Directory(PathBuf::from("/app/public"))
        );
    }

    #[test]
    fn test_filename_requires_placeholder() {
        let err = options("filename: theme.erb\nthread_pool_size: 4\n")
            .validate()
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { option: "filename", .. }));
    }

    #[test]
    fn test_extensions_require_dot() {
        let err = options("include_exts: [scss]\nthread_pool_size: 4\n")
            .validate()
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { option: "include_exts", .. }));
    }

    #[test]
    fn test_thread_pool_needs_two() {
        let err = options("thread_pool_size: 1\n").validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { option: "thread_pool_size", .. }));
    }

    #[test]
    #[serial]
    fn test_thread_pool_from_env() {
        std::env::set_var(THREAD_POOL_ENV, "8");
        let config = options("cwd: /app\n").validate();
        std::env::set_var(THREAD_POOL_ENV, "lots");
        let bad = options("cwd: /app\n").validate();
        std::env::remove_var(THREAD_POOL_ENV);

        assert_eq!(config.unwrap().thread_pool_size, 8);
        assert!(bad.is_err());
    }

    #[test]
    fn test_vars_file_and_inline_fields() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("_vars.scss"),
            "$brand-color: #ff0000;\n$link-color: $brand-color;\n",
        )
        .unwrap();

        let mut opts = options("vars_file: _vars.scss\nthread_pool_size: 4\nfields:\n  link-color: blue\n");
        opts.cwd = Some(dir.path().to_path_buf());
        let config = opts.validate().unwrap();

        assert_eq!(config.fields.get("brand-color"), Some("#ff0000"));
        assert_eq!(config.fields.get("link-color"), Some("blue"));
    }

    #[test]
    fn test_missing_vars_file_fails() {
        let err = options("cwd: /nonexistent\nvars_file: nope.scss\nthread_pool_size: 4\n")
            .validate()
            .unwrap_err();
        assert!(matches!(err, ConfigError::Fields(_)));
    }

    // =========================================================================
    // Derived values
    // =========================================================================

    #[test]
    fn test_template_name_and_output_dir() {
        let config = options("cwd: /app\nfilename: \"themes/[name].css.erb\"\nthread_pool_size: 4\n")
            .validate()
            .unwrap();
        assert_eq!(config.template_name("main"), "themes/main.css.erb");
        assert_eq!(
            config.output_dir(Some(Path::new("dist"))),
            Some(PathBuf::from("/app/dist"))
        );
        assert_eq!(config.output_dir(None), None);
    }

    #[test]
    fn test_disabled_output_ignores_host() {
        let config = options("output: false\nthread_pool_size: 4\n").validate().unwrap();
        assert_eq!(config.output_dir(Some(Path::new("/dist"))), None);
    }

    #[test]
    fn test_wrapping_per_name() {
        let config = options("file_header:\n  main: HEAD\nthread_pool_size: 4\n")
            .validate()
            .unwrap();
        assert_eq!(config.header_for("main"), Some("HEAD"));
        assert_eq!(config.header_for("other"), None);
        assert_eq!(config.footer_for("main"), None);
    }
}
