use std::path::{Path, PathBuf};

use tempfile::TempDir;
use thematic_cli::{build, fields_json, load_config, BuildArgs, ConfigArgs};

fn project() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let write = |rel: &str, contents: &str| {
        let path = dir.path().join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    };
    write(
        "thematic.yml",
        "include_paths: [theme]\nvars_file: theme/_vars.scss\nthread_pool_size: 3\nusage_report: usage.json\n",
    );
    write("theme/_vars.scss", "$brand-color: #ff0000;\n$gap: 4px;\n");
    write(
        "src/main.scss",
        "@import 'vars';\n.color-primary { color: $brand-color; }\n",
    );
    write("src/admin.scss", "@import 'vars';\n.admin { margin: $gap; }\n");
    dir
}

fn args(dir: &Path, entries: &[&str]) -> BuildArgs {
    BuildArgs {
        config: ConfigArgs {
            config: dir.join("thematic.yml"),
        },
        out: dir.join("dist"),
        minimize: false,
        entries: entries.iter().map(|e| dir.join(e)).collect(),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_build_writes_css_templates_and_report() {
    let dir = project();
    let args = args(dir.path(), &["src/main.scss", "src/admin.scss"]);
    let config = load_config(&args.config.config).unwrap();

    let summary = build(config, &args).await.unwrap();
    assert!(!summary.failed(), "{:?}", summary.errors);

    let dist = dir.path().join("dist");
    let mut written: Vec<PathBuf> = summary
        .written
        .iter()
        .map(|p| p.strip_prefix(&dist).unwrap().to_path_buf())
        .collect();
    written.sort();
    assert_eq!(
        written,
        ["admin.css", "admin.css.erb", "main.css", "main.css.erb", "usage.json"]
            .iter()
            .map(PathBuf::from)
            .collect::<Vec<_>>()
    );

    let read = |name: &str| std::fs::read_to_string(dist.join(name)).unwrap();
    assert_eq!(read("main.css"), ".color-primary { color: #ff0000; }\n");
    assert_eq!(read("main.css.erb"), ".color-primary { color: <%= brand_color %>; }\n");
    assert_eq!(read("admin.css.erb"), ".admin { margin: <%= gap %>; }\n");

    let report: serde_json::Value = serde_json::from_str(&read("usage.json")).unwrap();
    assert_eq!(report["by_field"]["brand-color"]["src/main.scss"], 1);
    assert_eq!(report["by_field"]["gap"]["src/admin.scss"], 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_build_reports_transform_errors() {
    let dir = project();
    std::fs::write(dir.path().join("src/bad.scss"), "@import 'missing';\n").unwrap();
    let args = args(dir.path(), &["src/main.scss", "src/bad.scss"]);
    let config = load_config(&args.config.config).unwrap();

    let summary = build(config, &args).await.unwrap();

    assert!(summary.failed());
    assert_eq!(summary.errors.len(), 1);
    assert!(summary.errors[0]
        .message
        .contains("The import \"missing\" could not be resolved"));
    assert!(dir.path().join("dist/main.css").exists());
    assert!(!dir.path().join("dist/bad.css").exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_missing_entry_is_fatal() {
    let dir = project();
    let args = args(dir.path(), &["src/nope.scss"]);
    let config = load_config(&args.config.config).unwrap();

    let err = build(config, &args).await.unwrap_err();
    assert!(format!("{:#}", err).contains("nope.scss"));
}

#[test]
fn test_config_paths_resolve_against_config_dir() {
    let dir = project();
    let config = load_config(&dir.path().join("thematic.yml")).unwrap();

    assert_eq!(config.cwd, dir.path());
    assert_eq!(config.include_paths, vec![dir.path().join("theme")]);
    assert_eq!(config.thread_pool_size, 3);

    let json: serde_json::Value = serde_json::from_str(&fields_json(&config).unwrap()).unwrap();
    assert_eq!(json["brand-color"], "#ff0000");
    assert_eq!(json["gap"], "4px");
}

#[test]
fn test_invalid_config_names_the_file() {
    let dir = project();
    let path = dir.path().join("bad.yml");
    std::fs::write(&path, "thread_pool_size: 1\n").unwrap();

    let err = load_config(&path).unwrap_err();
    assert!(format!("{:#}", err).contains("bad.yml"));
    assert!(format!("{:#}", err).contains("thread_pool_size"));
}
