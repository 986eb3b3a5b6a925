//! Command-line build driver for Thematic.
//!
//! `thematic build` plays the part of a bundler: it installs the plugin from
//! a configuration file, transforms every entry stylesheet, runs the emit
//! phase and writes the resulting assets to an output directory.
//!
//! ```text
//! thematic build --config thematic.yml --out dist src/main.scss src/admin.scss
//! thematic fields --config thematic.yml
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use thematic::{
    emit, BuildSession, Compilation, Diagnostic, PluginConfig, PluginOptions, ThemeTemplateLoader,
};
use tokio::task::JoinSet;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "thematic", version, about = "Compile themed stylesheets into CSS and templates")]
pub struct Cli {
    /// Log more (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Transform entry stylesheets and emit CSS plus templates
    Build(BuildArgs),
    /// Print the configured theme fields as JSON
    Fields(ConfigArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Plugin configuration (.yml, .yaml or .json)
    #[arg(short, long, default_value = "thematic.yml")]
    pub config: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct BuildArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Directory assets are written to
    #[arg(short, long, default_value = "dist")]
    pub out: PathBuf,

    /// Emit compressed CSS
    #[arg(long)]
    pub minimize: bool,

    /// Entry stylesheets
    #[arg(required = true)]
    pub entries: Vec<PathBuf>,
}

/// What a build produced.
#[derive(Debug, Default)]
pub struct BuildSummary {
    /// Written asset paths, in name order.
    pub written: Vec<PathBuf>,
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
}

impl BuildSummary {
    pub fn failed(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Installs the global subscriber. `RUST_LOG` wins over `verbose`.
pub fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "thematic=info,thematic_cli=info",
        1 => "thematic=debug,thematic_render=debug,thematic_cli=debug",
        _ => "thematic=trace,thematic_render=trace,thematic_cli=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Loads and validates a configuration file.
///
/// Without an explicit `cwd`, relative paths in the file resolve against
/// the file's own directory.
pub fn load_config(path: &Path) -> Result<PluginConfig> {
    let mut options = PluginOptions::from_file(path)
        .with_context(|| format!("loading {}", path.display()))?;
    if options.cwd.is_none() {
        options.cwd = path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(Path::to_path_buf);
    }
    options
        .validate()
        .with_context(|| format!("invalid configuration in {}", path.display()))
}

/// Runs one full build pass for `args` with an already loaded `config`.
pub async fn build(config: PluginConfig, args: &BuildArgs) -> Result<BuildSummary> {
    let process_cwd = std::env::current_dir().context("reading the working directory")?;
    let out = process_cwd.join(&args.out);

    let session = BuildSession::new();
    let plugin = session.install_config(config)?;
    let loader = ThemeTemplateLoader::from_session(&session)?;
    plugin.before_compilation(&HashMap::new());

    let mut jobs = JoinSet::new();
    for (index, entry) in args.entries.iter().enumerate() {
        let entry = process_cwd.join(entry);
        let loader = loader.clone();
        let minimize = args.minimize;
        jobs.spawn(async move {
            let source = tokio::fs::read_to_string(&entry)
                .await
                .with_context(|| format!("reading {}", entry.display()))?;
            let output = loader.transform(&source, &entry, minimize).await;
            anyhow::Ok((index, entry, output))
        });
    }

    let mut results = Vec::with_capacity(args.entries.len());
    while let Some(joined) = jobs.join_next().await {
        results.push(joined.context("transform task failed")??);
    }
    results.sort_by_key(|(index, _, _)| *index);

    let mut compilation = Compilation::new().with_output_path(&out);
    for (_, entry, output) in results {
        let name = asset_name(&entry)?;
        match output {
            Ok(output) => {
                if let Some(map) = output.source_map {
                    compilation.add_asset(format!("{}.map", name), map);
                }
                compilation.add_asset(name, output.css);
            }
            Err(diagnostic) => compilation.errors.push(diagnostic),
        }
    }

    emit(&plugin, &mut compilation).await;

    let mut written = Vec::with_capacity(compilation.assets.len());
    for (name, asset) in &compilation.assets {
        let path = out.join(name);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        tokio::fs::write(&path, asset.source())
            .await
            .with_context(|| format!("writing {}", path.display()))?;
        tracing::debug!(path = %path.display(), bytes = asset.size(), "wrote asset");
        written.push(path);
    }

    session.teardown();
    Ok(BuildSummary {
        written,
        errors: compilation.errors,
        warnings: compilation.warnings,
    })
}

/// `src/main.scss` → `main.css`.
pub fn asset_name(entry: &Path) -> Result<String> {
    let stem = entry
        .file_stem()
        .and_then(|stem| stem.to_str())
        .with_context(|| format!("{} has no usable file name", entry.display()))?;
    Ok(format!("{}.css", stem))
}

/// The configured theme fields as pretty JSON.
pub fn fields_json(config: &PluginConfig) -> Result<String> {
    Ok(serde_json::to_string_pretty(&config.fields)?)
}
