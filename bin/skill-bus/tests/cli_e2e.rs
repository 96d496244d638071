use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::TempDir;

fn cli(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("skill-bus").unwrap();
    cmd.arg("--project")
        .arg(dir.path())
        .env("SKILL_BUS_CONFIG", dir.path().join("global-config.json"));
    cmd
}

fn project_config(dir: &TempDir) -> Value {
    let path = dir.path().join(".claude").join("skill-bus.json");
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn set_writes_and_reloads_the_same_value() {
    let dir = tempfile::tempdir().unwrap();

    cli(&dir)
        .args(["set", "completionHooks", "true", "--scope", "project"])
        .assert()
        .success();
    cli(&dir)
        .args(["set", "maxMatchesPerSkill", "5", "--scope", "project"])
        .assert()
        .success();

    let root = project_config(&dir);
    assert_eq!(root["settings"]["completionHooks"], Value::Bool(true));
    assert_eq!(root["settings"]["maxMatchesPerSkill"], 5);

    // Reloading through the merge shows the written values in effect.
    cli(&dir)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("completionHooks       true"))
        .stdout(predicate::str::contains("maxMatchesPerSkill    5"));
}

#[test]
fn set_rejects_unknown_setting_and_bad_value() {
    let dir = tempfile::tempdir().unwrap();

    cli(&dir)
        .args(["set", "volume", "11", "--scope", "project"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown setting 'volume'"));

    cli(&dir)
        .args(["set", "telemetry", "maybe", "--scope", "project"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("expected 'true' or 'false'"));

    cli(&dir)
        .args(["set", "maxMatchesPerSkill", "0", "--scope", "project"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("at least 1"));
}

#[test]
fn writes_refuse_a_malformed_file() {
    let dir = tempfile::tempdir().unwrap();
    let claude = dir.path().join(".claude");
    std::fs::create_dir_all(&claude).unwrap();
    std::fs::write(claude.join("skill-bus.json"), "{broken").unwrap();

    cli(&dir)
        .args(["set", "telemetry", "true", "--scope", "project"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("fix JSON syntax first"));

    // The malformed file is left untouched.
    let content = std::fs::read_to_string(claude.join("skill-bus.json")).unwrap();
    assert_eq!(content, "{broken");
}

#[test]
fn add_insert_then_simulate_reports_fire() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("docs")).unwrap();

    cli(&dir)
        .args([
            "add-insert",
            "--name",
            "checklist",
            "--text",
            "Run the release checklist first.",
            "--conditions",
            r#"[{"type": "path-exists", "path": "docs/"}]"#,
            "--on",
            "release:*",
            "--when",
            "pre",
            "--scope",
            "project",
        ])
        .assert()
        .success();

    let root = project_config(&dir);
    assert_eq!(
        root["inserts"]["checklist"]["text"],
        "Run the release checklist first."
    );
    assert_eq!(root["subscriptions"][0]["on"], "release:*");

    cli(&dir)
        .args(["simulate", "release:cut"])
        .assert()
        .success()
        .stdout(predicate::str::contains("checklist"))
        .stdout(predicate::str::contains("FIRE"));

    // Re-adding with the same identity tuple replaces instead of duplicating.
    cli(&dir)
        .args([
            "add-insert", "--name", "checklist", "--text", "v2", "--on", "release:*",
            "--when", "pre", "--scope", "project",
        ])
        .assert()
        .success();
    let root = project_config(&dir);
    assert_eq!(root["subscriptions"].as_array().unwrap().len(), 1);
    assert_eq!(root["inserts"]["checklist"]["text"], "v2");
}

#[test]
fn add_insert_validates_timing_and_conditions() {
    let dir = tempfile::tempdir().unwrap();

    cli(&dir)
        .args([
            "add-insert", "--name", "x", "--text", "t", "--on", "*", "--when", "during",
            "--scope", "project",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown timing 'during'"));

    cli(&dir)
        .args([
            "add-insert", "--name", "x", "--text", "t", "--conditions", "{\"not\": \"a list\"}",
            "--on", "*", "--when", "pre", "--scope", "project",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("JSON array"));
}

#[test]
fn simulate_shows_condition_skip() {
    let dir = tempfile::tempdir().unwrap();
    let claude = dir.path().join(".claude");
    std::fs::create_dir_all(&claude).unwrap();
    std::fs::write(
        claude.join("skill-bus.json"),
        r#"{
            "inserts": {"X": {"text": "T",
                "conditions": [{"type": "path-exists", "path": "missing/"}]}},
            "subscriptions": [{"insert": "X", "on": "tests:*", "timing": "pre"}]
        }"#,
    )
    .unwrap();

    cli(&dir)
        .args(["simulate", "tests:run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("SKIP (insert condition #1)"));
}

#[test]
fn list_annotates_dangling_and_gated_subscriptions() {
    let dir = tempfile::tempdir().unwrap();
    let claude = dir.path().join(".claude");
    std::fs::create_dir_all(&claude).unwrap();
    std::fs::write(
        claude.join("skill-bus.json"),
        r#"{
            "inserts": {"Y": {"text": "T"}},
            "subscriptions": [
                {"insert": "GHOST", "on": "*", "timing": "pre"},
                {"insert": "Y", "on": "plan:*", "timing": "complete"}
            ]
        }"#,
    )
    .unwrap();

    cli(&dir)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("dangling insert"))
        .stdout(predicate::str::contains("gated off"));
}

#[test]
fn stats_aggregates_the_telemetry_log() {
    let dir = tempfile::tempdir().unwrap();
    let claude = dir.path().join(".claude");
    std::fs::create_dir_all(&claude).unwrap();
    std::fs::write(claude.join("skill-bus.json"), r#"{"settings": {}}"#).unwrap();
    std::fs::write(
        claude.join("skill-bus-telemetry.jsonl"),
        [
            r#"{"ts":"2026-08-01T10:00:00+00:00","session":1,"event":"match","skill":"tests:run","insert":"X","timing":"pre","source":"tool"}"#,
            r#"{"ts":"2026-08-01T10:00:01+00:00","session":1,"event":"match","skill":"tests:run","insert":"X","timing":"pre","source":"tool"}"#,
            r#"{"ts":"2026-08-01T10:00:02+00:00","session":2,"event":"condition_skip","skill":"a:b","insert":"Y","pattern":"a:*","list":"insert","index":0}"#,
            "this line is torn and must be skipp",
        ]
        .join("\n"),
    )
    .unwrap();

    cli(&dir)
        .arg("stats")
        .assert()
        .success()
        .stdout(predicate::str::contains("3 event(s)"))
        .stdout(predicate::str::contains("tests:run"))
        .stdout(predicate::str::contains("Condition skips by insert"));

    cli(&dir)
        .args(["stats", "--session", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 event(s)"));
}

#[test]
fn stats_with_no_log_reports_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    cli(&dir)
        .arg("stats")
        .assert()
        .success()
        .stdout(predicate::str::contains("No telemetry events"));
}
