//! Import path resolution.
//!
//! [`PathResolver`] turns an `@import` reference and the path of the importing
//! file into the ordered list of files that could satisfy it. The first
//! candidate that exists wins.
//!
//! # Candidate Order
//!
//! Search directories, in order:
//!
//! 1. If the importer has an extension (it is a file): its directory.
//!    Otherwise (it is a directory context): the importer itself, then its parent.
//! 2. Every configured include path, in configuration order.
//!
//! File names, in order: the reference's own extension if it has one,
//! otherwise each configured default extension in priority order
//! ([`DEFAULT_EXTENSIONS`]). For each extension the partial `_name.ext`
//! comes before `name.ext`.
//!
//! Candidates are directory-major: every name is tried in the first directory
//! before any name in the second. A directory part in the reference
//! (`lib/colors`) is kept between the search directory and the name.
//!
//! ```rust
//! use std::path::PathBuf;
//! use thematic::PathResolver;
//!
//! let resolver = PathResolver::new("/app", vec![".scss".into()], vec![PathBuf::from("/app/vendor")]);
//! let paths = resolver.lookup_paths("colors", "/app/src/main.scss");
//! assert_eq!(paths, vec![
//!     PathBuf::from("/app/src/_colors.scss"),
//!     PathBuf::from("/app/src/colors.scss"),
//!     PathBuf::from("/app/vendor/_colors.scss"),
//!     PathBuf::from("/app/vendor/colors.scss"),
//! ]);
//! ```

use std::path::{Component, Path, PathBuf};

/// Default import extensions in priority order.
pub const DEFAULT_EXTENSIONS: &[&str] = &[".scss", ".sass"];

/// Computes import candidates for one build configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathResolver {
    cwd: PathBuf,
    include_exts: Vec<String>,
    include_paths: Vec<PathBuf>,
}

impl PathResolver {
    /// Creates a resolver. Relative include paths and contexts are resolved
    /// against `cwd`.
    pub fn new(
        cwd: impl Into<PathBuf>,
        include_exts: Vec<String>,
        include_paths: Vec<PathBuf>,
    ) -> Self {
        let cwd = normalize(&cwd.into());
        let include_paths = include_paths
            .iter()
            .map(|p| normalize(&cwd.join(p)))
            .collect();
        Self {
            cwd,
            include_exts,
            include_paths,
        }
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub fn include_paths(&self) -> &[PathBuf] {
        &self.include_paths
    }

    /// Resolves `path` against the working root and normalizes it.
    pub fn absolute(&self, path: &Path) -> PathBuf {
        normalize(&self.cwd.join(path))
    }

    /// Path of `path` relative to the working root, with `/` separators.
    pub fn relative(&self, path: &Path) -> String {
        relative_to(&self.absolute(path), &self.cwd)
    }

    /// Ordered candidate files for importing `uri` from `prev`.
    pub fn lookup_paths(&self, uri: &str, prev: &str) -> Vec<PathBuf> {
        let prev_path = Path::new(prev);
        let parent = prev_path.parent().unwrap_or_else(|| Path::new(""));

        let mut dirs: Vec<&Path> = Vec::with_capacity(self.include_paths.len() + 2);
        if prev_path.extension().is_none() {
            dirs.push(prev_path);
        }
        dirs.push(parent);
        dirs.extend(self.include_paths.iter().map(PathBuf::as_path));

        let file = Path::new(uri);
        let file_dir = file.parent().unwrap_or_else(|| Path::new(""));
        let stem = file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let name = stem.strip_prefix('_').unwrap_or(&stem);

        let names: Vec<String> = match file.extension() {
            Some(ext) => partial_pair(name, &format!(".{}", ext.to_string_lossy())).to_vec(),
            None => self
                .include_exts
                .iter()
                .flat_map(|ext| partial_pair(name, ext))
                .collect(),
        };

        let mut lookups = Vec::with_capacity(dirs.len() * names.len());
        for dir in dirs {
            let base = self.cwd.join(dir).join(file_dir);
            for candidate in &names {
                lookups.push(normalize(&base.join(candidate)));
            }
        }
        lookups
    }
}

fn partial_pair(name: &str, ext: &str) -> [String; 2] {
    [format!("_{}{}", name, ext), format!("{}{}", name, ext)]
}

/// Lexically normalizes a path: removes `.` and resolves `..` against the
/// preceding component. Does not touch the filesystem.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = matches!(out.components().next_back(), Some(Component::Normal(_)))
                    && out.pop();
                if !popped && !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Path of `path` relative to `root`, both normalized and absolute, joined
/// with `/`. Walks up with `..` when `path` is outside `root`.
pub fn relative_to(path: &Path, root: &Path) -> String {
    let path: Vec<_> = path.components().collect();
    let root: Vec<_> = root.components().collect();
    let common = path
        .iter()
        .zip(root.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<String> = Vec::new();
    parts.extend(root[common..].iter().map(|_| "..".to_string()));
    parts.extend(
        path[common..]
            .iter()
            .map(|c| c.as_os_str().to_string_lossy().into_owned()),
    );
    parts.join("/")
}
