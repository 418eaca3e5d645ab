use std::fs;
use std::path::Path;

use assert_cmd::Command;
use tempfile::tempdir;

fn touch(path: &Path) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, b"x").unwrap();
}

fn readerview(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("readerview").unwrap();
    cmd.env("HOME", home)
        .env("XDG_DATA_HOME", home.join("data"))
        .env("XDG_CONFIG_HOME", home.join("config"))
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn choose_print_lists_documents_grouped_by_directory() {
    let home = tempdir().unwrap();
    let library = tempdir().unwrap();
    let root = library.path().canonicalize().unwrap();
    touch(&root.join("b.pdf"));
    touch(&root.join("a.EPUB"));
    touch(&root.join("skip.txt"));
    touch(&root.join("comics/c.cbz"));

    let output = readerview(home.path())
        .args(["choose", "--print"])
        .arg(&root)
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let expected = format!(
        "{}/\n    a.EPUB\n    b.pdf\n{}/\n    c.cbz\n",
        root.display(),
        root.join("comics").display()
    );
    assert_eq!(stdout, expected);
}

#[test]
fn choose_print_key_files() {
    let home = tempdir().unwrap();
    let library = tempdir().unwrap();
    touch(&library.path().join("id.pfx"));
    touch(&library.path().join("doc.pdf"));

    let output = readerview(home.path())
        .args(["choose", "--print", "--purpose", "key-file"])
        .arg(library.path())
        .output()
        .unwrap();
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("    id.pfx\n"));
    assert!(!stdout.contains("doc.pdf"));
}

#[test]
fn missing_root_fails() {
    let home = tempdir().unwrap();
    readerview(home.path())
        .args(["choose", "--print", "/definitely/not/here"])
        .assert()
        .failure();
}

#[test]
fn bad_config_is_reported() {
    let home = tempdir().unwrap();
    let config = home.path().join("bad.toml");
    fs::write(&config, "min_scale = -1.0\n").unwrap();
    readerview(home.path())
        .args(["--config"])
        .arg(&config)
        .args(["choose", "--print", "."])
        .assert()
        .failure();
}
