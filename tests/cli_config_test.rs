use std::process::Command;
use tempfile::TempDir;

fn treewatch() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_treewatch"));
    command.env_remove("RUST_LOG");
    command
}

#[test]
fn test_dump_config_from_file() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("custom.toml");
    std::fs::write(
        &config_path,
        r#"
[watch]
directory = "/srv/incoming"
events = ["moved_to"]

[exec]
format = "%p%f"
"#,
    )
    .unwrap();

    let output = treewatch()
        .current_dir(temp_dir.path())
        .arg("--config")
        .arg(&config_path)
        .args(["-r", "--dump-config"])
        .output()
        .expect("Failed to run treewatch");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("directory = \"/srv/incoming\""));
    assert!(stdout.contains("recursive = true"));
    assert!(stdout.contains("moved_to"));
    assert!(stdout.contains("format = \"%p%f\""));
}

#[test]
fn test_workspace_config_and_env_override() {
    let temp_dir = TempDir::new().unwrap();
    let config_dir = temp_dir.path().join(".treewatch");
    std::fs::create_dir_all(&config_dir).unwrap();
    std::fs::write(
        config_dir.join("settings.toml"),
        "[exec]\nshell = \"/bin/bash\"\n",
    )
    .unwrap();

    let nested = temp_dir.path().join("deep/inside");
    std::fs::create_dir_all(&nested).unwrap();

    let output = treewatch()
        .current_dir(&nested)
        .env("TREEWATCH_WATCH__FOLLOW_SYMLINKS", "false")
        .arg("--dump-config")
        .output()
        .expect("Failed to run treewatch");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("shell = \"/bin/bash\""));
    assert!(stdout.contains("follow_symlinks = false"));
}

#[test]
fn test_missing_output_mode_fails() {
    let temp_dir = TempDir::new().unwrap();

    let output = treewatch()
        .current_dir(temp_dir.path())
        .arg("-d")
        .arg(temp_dir.path())
        .output()
        .expect("Failed to run treewatch");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("-c COMMAND or -F FORMAT"));
}

#[test]
fn test_unknown_event_fails() {
    let temp_dir = TempDir::new().unwrap();

    let output = treewatch()
        .current_dir(temp_dir.path())
        .arg("-d")
        .arg(temp_dir.path())
        .args(["-F", "%f", "-e", "create,explode"])
        .output()
        .expect("Failed to run treewatch");

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("explode"));
}

#[test]
fn test_missing_directory_fails() {
    let temp_dir = TempDir::new().unwrap();

    let output = treewatch()
        .current_dir(temp_dir.path())
        .arg("-d")
        .arg(temp_dir.path().join("absent"))
        .args(["-c", "true"])
        .output()
        .expect("Failed to run treewatch");

    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_command_and_format_are_exclusive() {
    let output = treewatch()
        .args(["-c", "true", "-F", "%f", "-d", "/"])
        .output()
        .expect("Failed to run treewatch");

    assert!(!output.status.success());
}

#[test]
fn test_version() {
    let output = treewatch()
        .arg("-V")
        .output()
        .expect("Failed to run treewatch");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
}
