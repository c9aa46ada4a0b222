use assert_cmd::Command;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn toolchest(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("toolchest").unwrap();
    cmd.env("TOOLCHEST_HOME", dir.join("home"))
        .env("TOOLCHEST_BIN_DIR", dir.join("bin"))
        .env("TOOLCHEST_CACHE_DIR", dir.join("cache"));
    cmd
}

#[test]
fn test_init_creates_the_layout() {
    let dir = tempdir().unwrap();
    toolchest(dir.path()).arg("init").assert().success();

    assert!(dir.path().join("home").join("tools").is_dir());
    assert!(dir.path().join("cache").is_dir());
    assert!(dir.path().join("bin").is_dir());
    assert!(dir.path().join("home").join("config.toml").is_file());
    assert!(dir.path().join("home").join("installations.json").is_file());
}

#[test]
fn test_init_twice_keeps_existing_files() {
    let dir = tempdir().unwrap();
    toolchest(dir.path()).arg("init").assert().success();
    let registry = dir.path().join("home").join("installations.json");
    let before = fs::read_to_string(&registry).unwrap();

    let output = toolchest(dir.path())
        .arg("init")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    assert!(String::from_utf8_lossy(&output).contains("already exists"));
    assert_eq!(fs::read_to_string(&registry).unwrap(), before);
}

#[test]
fn test_list_reports_an_empty_registry() {
    let dir = tempdir().unwrap();
    toolchest(dir.path()).arg("init").assert().success();

    let output = toolchest(dir.path())
        .arg("list")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    assert!(String::from_utf8_lossy(&output).contains("No tools installed"));
}

#[test]
fn test_use_rejects_an_uninstalled_version() {
    let dir = tempdir().unwrap();
    toolchest(dir.path()).arg("init").assert().success();

    let output = toolchest(dir.path())
        .args(["use", "terraform@v1.6.0"])
        .assert()
        .failure()
        .get_output()
        .stderr
        .clone();
    assert!(String::from_utf8_lossy(&output).contains("not installed"));
}

#[test]
fn test_install_rejects_an_unknown_tool() {
    let dir = tempdir().unwrap();
    toolchest(dir.path()).arg("init").assert().success();

    let output = toolchest(dir.path())
        .args(["install", "sometool@v1.0.0"])
        .assert()
        .failure()
        .get_output()
        .stderr
        .clone();
    assert!(String::from_utf8_lossy(&output).contains("not supported"));
}

#[test]
fn test_install_rejects_a_malformed_spec() {
    let dir = tempdir().unwrap();
    let output = toolchest(dir.path())
        .args(["install", "terraform"])
        .assert()
        .failure()
        .get_output()
        .stderr
        .clone();
    assert!(String::from_utf8_lossy(&output).contains("<tool>@<version>"));
}

#[test]
fn test_install_rejects_a_malformed_version() {
    let dir = tempdir().unwrap();
    toolchest(dir.path())
        .args(["install", "terraform@not-a-version"])
        .assert()
        .failure();
}

#[test]
fn test_uninstall_of_missing_version_fails() {
    let dir = tempdir().unwrap();
    toolchest(dir.path()).arg("init").assert().success();
    toolchest(dir.path())
        .args(["uninstall", "terraform@v1.6.0", "--force"])
        .assert()
        .failure();
}

#[test]
fn test_info_requires_an_installed_tool() {
    let dir = tempdir().unwrap();
    toolchest(dir.path()).arg("init").assert().success();

    let output = toolchest(dir.path())
        .args(["info", "terraform"])
        .assert()
        .failure()
        .get_output()
        .stderr
        .clone();
    assert!(String::from_utf8_lossy(&output).contains("no versions"));
}

#[test]
fn test_damaged_registry_is_a_hard_error() {
    let dir = tempdir().unwrap();
    toolchest(dir.path()).arg("init").assert().success();
    fs::write(dir.path().join("home").join("installations.json"), "{ nope").unwrap();

    let output = toolchest(dir.path())
        .arg("list")
        .assert()
        .failure()
        .get_output()
        .stderr
        .clone();
    assert!(String::from_utf8_lossy(&output).contains("failed to parse registry"));
}
