//! CLI contract tests.

use std::path::Path;

use assert_cmd::Command;

fn write(dir: &Path, name: &str, contents: &str) {
    let written = std::fs::write(dir.join(name), contents);
    assert!(written.is_ok(), "should write {name}");
}

/// A config directory with three candidates, one gated by a property.
fn fixture() -> tempfile::TempDir {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    write(tmp.path(), "imports.list", "cli.Web\ncli.Core\ncli.Gated\n");
    write(
        tmp.path(),
        "index.properties",
        "cli.Web.After=cli.Core\ncli.Core.Priority=-5\ncli.Gated.ConditionalOnProperty=cli.gate\n",
    );
    write(
        tmp.path(),
        "autoactivate.toml",
        r#"
[logging]
level = "warn"

[metadata]
path = "index.properties"
required = true

[registry]
imports = ["imports.list"]

[[site]]
name = "main"
"#,
    );
    tmp
}

fn cli(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("autoactivate").expect("binary should build");
    cmd.current_dir(dir).env_remove("RUST_LOG");
    cmd
}

fn stdout_of(cmd: &mut Command) -> String {
    let output = cmd.assert().success().get_output().stdout.clone();
    String::from_utf8(output).expect("utf-8 output")
}

#[test]
fn resolve_prints_activation_order() {
    let tmp = fixture();
    let stdout = stdout_of(cli(tmp.path()).arg("resolve"));
    assert_eq!(stdout, "main\tcli.Core\nmain\tcli.Web\n");
}

#[test]
fn property_override_enables_gated_module() {
    let tmp = fixture();
    let stdout = stdout_of(cli(tmp.path()).args(["-D", "cli.gate=on", "resolve"]));
    assert!(stdout.contains("main\tcli.Gated"));
}

#[test]
fn resolve_json_includes_site_reports() {
    let tmp = fixture();
    let stdout = stdout_of(cli(tmp.path()).args(["resolve", "--json"]));
    let value: serde_json::Value = serde_json::from_str(&stdout).expect("valid json");
    assert_eq!(value["imports"][0]["id"], "cli.Core");
    assert_eq!(value["sites"][0]["rejected"][0]["id"], "cli.Gated");
}

#[test]
fn check_summarises_counts() {
    let tmp = fixture();
    let stdout = stdout_of(cli(tmp.path()).arg("check"));
    assert_eq!(
        stdout.trim(),
        "ok: 1 sites, 2 modules activated, 1 filtered, 0 excluded"
    );
}

#[test]
fn explain_shows_metadata() {
    let tmp = fixture();
    let stdout = stdout_of(cli(tmp.path()).args(["explain", "cli.Web"]));
    assert!(stdout.contains("candidate:   true"));
    assert!(stdout.contains("after:       cli.Core"));
    assert!(stdout.contains("filtered:    false"));
}

#[test]
fn invalid_exclusion_fails() {
    let tmp = fixture();
    write(
        tmp.path(),
        "strict.toml",
        r#"
[metadata]
path = "index.properties"

[registry]
imports = ["imports.list"]
available = ["cli.Other"]

[[site]]
name = "main"
exclude = ["cli.Other"]
"#,
    );
    let assert = cli(tmp.path())
        .args(["--config", "strict.toml", "resolve"])
        .assert()
        .failure();
    let stderr = String::from_utf8_lossy(&assert.get_output().stderr).into_owned();
    assert!(stderr.contains("cli.Other"));
}

#[test]
fn missing_explicit_config_fails() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    cli(tmp.path())
        .args(["--config", "absent.toml", "check"])
        .assert()
        .failure();
}

#[test]
fn malformed_property_is_rejected() {
    let tmp = fixture();
    cli(tmp.path())
        .args(["-D", "no-equals", "resolve"])
        .assert()
        .failure();
}

#[test]
fn check_counts_environment_exclusion_once() {
    let tmp = fixture();
    write(
        tmp.path(),
        "two-sites.toml",
        r#"
[metadata]
path = "index.properties"

[registry]
imports = ["imports.list"]

[[site]]
name = "main"

[[site]]
name = "admin"
"#,
    );
    let stdout = stdout_of(cli(tmp.path()).args([
        "--config",
        "two-sites.toml",
        "-D",
        "autoactivate.exclude=cli.Gated",
        "check",
    ]));
    assert_eq!(
        stdout.trim(),
        "ok: 2 sites, 2 modules activated, 0 filtered, 1 excluded"
    );
}
