//! Property-based tests for import candidate ordering.

use std::path::PathBuf;

use proptest::prelude::*;
use thematic::PathResolver;

// ============================================================================
// Test helpers
// ============================================================================

fn ext_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("\\.[a-z]{1,4}", 1..4)
}

fn include_strategy() -> impl Strategy<Value = Vec<PathBuf>> {
    prop::collection::vec("/inc/[a-z]{1,6}", 0..4)
        .prop_map(|dirs| dirs.into_iter().map(PathBuf::from).collect())
}

fn file_name(path: &std::path::Path) -> String {
    path.file_name().unwrap().to_string_lossy().into_owned()
}

// ============================================================================
// Property tests
// ============================================================================

proptest! {
    /// A file importer searches its own directory, then each include path.
    #[test]
    fn file_importer_dirs(
        name in "[a-z]{1,8}",
        exts in ext_strategy(),
        includes in include_strategy(),
    ) {
        let resolver = PathResolver::new("/root", exts.clone(), includes.clone());
        let paths = resolver.lookup_paths(&name, "/src/dir/main.scss");

        let per_dir = exts.len() * 2;
        prop_assert_eq!(paths.len(), per_dir * (1 + includes.len()));

        let mut expected_dirs = vec![PathBuf::from("/src/dir")];
        expected_dirs.extend(includes.iter().cloned());
        for (chunk, dir) in paths.chunks(per_dir).zip(&expected_dirs) {
            prop_assert!(chunk.iter().all(|p| p.parent() == Some(dir.as_path())));
        }
    }

    /// Without an extension, names go `_name.ext, name.ext` per extension in order.
    #[test]
    fn extensionless_name_order(
        name in "_?[a-z]{1,8}",
        exts in ext_strategy(),
    ) {
        let resolver = PathResolver::new("/root", exts.clone(), vec![]);
        let paths = resolver.lookup_paths(&name, "/src/main.scss");
        let bare = name.trim_start_matches('_');

        let expected: Vec<String> = exts
            .iter()
            .flat_map(|ext| [format!("_{}{}", bare, ext), format!("{}{}", bare, ext)])
            .collect();
        let names: Vec<String> = paths.iter().map(|p| file_name(p)).collect();
        prop_assert_eq!(names, expected);
    }

    /// An explicit extension overrides the configured ones.
    #[test]
    fn explicit_extension_wins(
        name in "[a-z]{1,8}",
        exts in ext_strategy(),
    ) {
        let resolver = PathResolver::new("/root", exts, vec![]);
        let paths = resolver.lookup_paths(&format!("{}.css", name), "/src/main.scss");
        let names: Vec<String> = paths.iter().map(|p| file_name(p)).collect();
        prop_assert_eq!(names, vec![format!("_{}.css", name), format!("{}.css", name)]);
    }

    /// A directory context is searched before its parent.
    #[test]
    fn directory_context_dirs(name in "[a-z]{1,8}") {
        let resolver = PathResolver::new("/root", vec![".scss".to_string()], vec![]);
        let paths = resolver.lookup_paths(&name, "/src/dir");
        prop_assert_eq!(paths.len(), 4);
        prop_assert_eq!(paths[0].parent(), Some(std::path::Path::new("/src/dir")));
        prop_assert_eq!(paths[2].parent(), Some(std::path::Path::new("/src")));
    }

    /// Candidate lists are deterministic.
    #[test]
    fn lookup_is_deterministic(
        name in "[a-z/]{1,12}",
        exts in ext_strategy(),
        includes in include_strategy(),
    ) {
        let resolver = PathResolver::new("/root", exts, includes);
        prop_assert_eq!(
            resolver.lookup_paths(&name, "/a/b.scss"),
            resolver.lookup_paths(&name, "/a/b.scss")
        );
    }
}
