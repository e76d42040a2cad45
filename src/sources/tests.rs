use super::*;
use std::fs;
use tempfile::TempDir;

fn touch(root: &Path, relative: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("should create parent dirs");
    }
    fs::write(path, "content").expect("should write file");
}

#[test]
fn finds_matching_files_sorted() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let root = temp_dir.path();
    touch(root, "modules/managers/EnemyManager.js");
    touch(root, "main.js");
    touch(root, "modules/controls/PlayerController.js");
    touch(root, "styles.css");
    touch(root, "README.md");

    let files = discover_sources(root, &["js"]).expect("discovery succeeds");
    let relative: Vec<PathBuf> = files
        .iter()
        .map(|p| p.strip_prefix(root).expect("under root").to_path_buf())
        .collect();

    assert_eq!(
        relative,
        vec![
            PathBuf::from("main.js"),
            PathBuf::from("modules/controls/PlayerController.js"),
            PathBuf::from("modules/managers/EnemyManager.js"),
        ]
    );
}

#[test]
fn skips_hidden_and_dependency_dirs() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let root = temp_dir.path();
    touch(root, "game.js");
    touch(root, "node_modules/phaser/phaser.js");
    touch(root, ".cache/bundle.js");

    let files = discover_sources(root, &["js"]).expect("discovery succeeds");
    assert_eq!(files, vec![root.join("game.js")]);
}

#[test]
fn multiple_extensions() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let root = temp_dir.path();
    touch(root, "a.js");
    touch(root, "b.ts");
    touch(root, "c.JS");

    let files = discover_sources(root, &["js".to_string(), "ts".to_string()])
        .expect("discovery succeeds");
    assert_eq!(files, vec![root.join("a.js"), root.join("b.ts")]);
}

#[test]
fn empty_tree_is_not_an_error() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let files = discover_sources(temp_dir.path(), &["js"]).expect("discovery succeeds");
    assert!(files.is_empty());
}

#[test]
fn missing_root_is_an_error() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let result = discover_sources(&temp_dir.path().join("missing"), &["js"]);
    assert!(matches!(result, Err(MemoryError::Config(_))));
}
