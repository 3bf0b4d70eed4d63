use std::path::Path;
use std::process::Command;

fn mutorch_bin() -> std::path::PathBuf {
    let mut path = std::env::current_exe().unwrap();
    // test binary is in target/debug/deps/, mutorch binary is in target/debug/
    path.pop();
    if path.ends_with("deps") {
        path.pop();
    }
    path.push("mutorch");
    path
}

fn create_rust_sources(dir: &Path) {
    std::fs::create_dir_all(dir.join("src")).unwrap();
    std::fs::write(
        dir.join("src/lib.rs"),
        r#"pub const LIMIT: u32 = 10 * 2;

pub fn clamp(x: u32) -> u32 {
    if x > LIMIT {
        return LIMIT;
    }
    x
}

pub fn greet(name: &str) -> String {
    format!("hello {}", name)
}

#[cfg(test)]
mod tests {
    #[test]
    fn clamps() {
        assert_eq!(super::clamp(50), 20);
    }
}
"#,
    )
    .unwrap();
    std::fs::write(
        dir.join("src/util.rs"),
        "pub fn both(a: bool, b: bool) -> bool {\n    a && b\n}\n",
    )
    .unwrap();
}

fn run(dir: &Path, args: &[&str]) -> std::process::Output {
    Command::new(mutorch_bin())
        .args(args)
        .current_dir(dir)
        .output()
        .expect("failed to run mutorch")
}

#[test]
fn e2e_mutate_json_output() {
    let dir = tempfile::TempDir::new().unwrap();
    create_rust_sources(dir.path());

    let output = run(dir.path(), &["mutate", "src/lib.rs", "src/util.rs", "--out", "mutated", "--json"]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8_lossy(&output.stdout);
    let result: serde_json::Value = serde_json::from_str(stdout.trim())
        .unwrap_or_else(|e| panic!("Invalid JSON: {e}\nstdout: {stdout}"));
    let files = result["files"].as_array().unwrap();
    assert_eq!(files.len(), 2);

    let lib_mutants = files[0]["mutants"].as_array().unwrap();
    let util_mutants = files[1]["mutants"].as_array().unwrap();
    assert!(!lib_mutants.is_empty());
    // Identifiers continue from one file to the next.
    let last_lib = lib_mutants.last().unwrap()["id"].as_u64().unwrap();
    assert_eq!(util_mutants[0]["id"].as_u64().unwrap(), last_lib + 1);
    assert_eq!(lib_mutants[0]["context"]["in_static_scope"], serde_json::Value::Bool(true));
}

#[test]
fn e2e_mutate_writes_schema_and_control_module() {
    let dir = tempfile::TempDir::new().unwrap();
    create_rust_sources(dir.path());
    let original = std::fs::read_to_string(dir.path().join("src/lib.rs")).unwrap();

    let output = run(dir.path(), &["mutate", "src/lib.rs", "--out", "mutated", "--quiet"]);
    assert!(output.status.success());
    assert!(output.stdout.is_empty());

    let mutated = std::fs::read_to_string(dir.path().join("mutated/src/lib.rs")).unwrap();
    assert!(mutated.contains("cfg!(mutorch_mutant = \"0\")"));
    assert!(mutated.contains("crate::__mutorch_control::hit("));
    assert!(mutated.contains("assert_eq!(super::clamp(50), 20);"));
    assert!(dir.path().join("mutated/__mutorch_control.rs").exists());
    assert!(dir.path().join("mutated/mutants.json").exists());

    // The source tree itself is never touched.
    assert_eq!(std::fs::read_to_string(dir.path().join("src/lib.rs")).unwrap(), original);
    assert!(dir.path().join(".mutorch-state.json").exists());
}

#[test]
fn e2e_optimization_mode_off_uses_plain_switch() {
    let dir = tempfile::TempDir::new().unwrap();
    create_rust_sources(dir.path());

    let output = run(
        dir.path(),
        &["mutate", "src/util.rs", "--out", "mutated", "--optimization-mode", "off", "--quiet"],
    );
    assert!(output.status.success());
    let mutated = std::fs::read_to_string(dir.path().join("mutated/src/util.rs")).unwrap();
    assert!(mutated.contains("crate::__mutorch_control::is_active(0)"));
    assert!(!mutated.contains("hit("));
}

#[test]
fn e2e_invalid_optimization_mode() {
    let dir = tempfile::TempDir::new().unwrap();
    create_rust_sources(dir.path());

    let output = run(dir.path(), &["mutate", "src/lib.rs", "--optimization-mode", "bogus"]);
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("bogus"), "stderr: {stderr}");
    assert!(!dir.path().join(".mutorch-state.json").exists());
}

#[test]
fn e2e_invalid_excluded_mutation() {
    let dir = tempfile::TempDir::new().unwrap();
    create_rust_sources(dir.path());

    let output = run(dir.path(), &["list", "src/lib.rs", "--exclude-mutation", "nonsense"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn e2e_config_file_is_read() {
    let dir = tempfile::TempDir::new().unwrap();
    create_rust_sources(dir.path());
    std::fs::write(
        dir.path().join("mutorch-config.json"),
        r#"{ "excluded-mutations": ["logical"] }"#,
    )
    .unwrap();

    let output = run(dir.path(), &["list", "src/util.rs", "--json"]);
    assert!(output.status.success());
    let result: serde_json::Value = serde_json::from_str(String::from_utf8_lossy(&output.stdout).trim()).unwrap();
    assert!(result[0]["mutants"].as_array().unwrap().is_empty());
}

#[test]
fn e2e_syntax_error_aborts() {
    let dir = tempfile::TempDir::new().unwrap();
    create_rust_sources(dir.path());
    std::fs::write(dir.path().join("src/broken.rs"), "fn broken( {\n").unwrap();

    let output = run(dir.path(), &["mutate", "src/lib.rs", "src/broken.rs", "--out", "mutated"]);
    assert_eq!(output.status.code(), Some(3));
    assert!(!dir.path().join("mutated").exists());
    assert!(!dir.path().join(".mutorch-state.json").exists());
}

#[test]
fn e2e_missing_source_file() {
    let dir = tempfile::TempDir::new().unwrap();
    let output = run(dir.path(), &["mutate", "nonexistent.rs"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn e2e_unsupported_file_type() {
    let dir = tempfile::TempDir::new().unwrap();
    std::fs::write(dir.path().join("app.py"), "x = 1\n").unwrap();
    let output = run(dir.path(), &["list", "app.py"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn e2e_show_and_status_after_mutate() {
    let dir = tempfile::TempDir::new().unwrap();
    create_rust_sources(dir.path());
    let output = run(dir.path(), &["mutate", "src/util.rs", "--out", "mutated", "--quiet"]);
    assert!(output.status.success());

    let show = run(dir.path(), &["show", "0", "--json"]);
    assert!(show.status.success());
    let mutant: serde_json::Value = serde_json::from_str(String::from_utf8_lossy(&show.stdout).trim()).unwrap();
    assert_eq!(mutant["original"], "a && b");
    assert_eq!(mutant["replacement"], "a || b");

    let missing = run(dir.path(), &["show", "#99"]);
    assert_eq!(missing.status.code(), Some(2));

    let status = run(dir.path(), &["status", "--json"]);
    assert!(status.status.success());
    let state: serde_json::Value = serde_json::from_str(String::from_utf8_lossy(&status.stdout).trim()).unwrap();
    assert_eq!(state["optimization_mode"], "perTest");
}

#[test]
fn e2e_status_without_run() {
    let dir = tempfile::TempDir::new().unwrap();
    let output = run(dir.path(), &["status"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn e2e_coverage_marks_unreached_mutants() {
    let dir = tempfile::TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("src")).unwrap();
    std::fs::write(
        dir.path().join("src/lib.rs"),
        "pub fn t() -> bool { true }\npub fn f() -> bool { false }\n",
    )
    .unwrap();
    let output = run(dir.path(), &["mutate", "src/lib.rs", "--out", "mutated", "--quiet"]);
    assert!(output.status.success());

    std::fs::write(dir.path().join("hits.log"), "tests::t\t0\n").unwrap();
    let coverage = run(dir.path(), &["coverage", "hits.log", "--json"]);
    assert!(coverage.status.success(), "stderr: {}", String::from_utf8_lossy(&coverage.stderr));
    let selections: serde_json::Value =
        serde_json::from_str(String::from_utf8_lossy(&coverage.stdout).trim()).unwrap();
    assert_eq!(selections[0]["tests"][0], "tests::t");
    assert_eq!(selections[1]["status"], "no_coverage");

    let state: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join(".mutorch-state.json")).unwrap()).unwrap();
    assert_eq!(state["files"][0]["mutants"][1]["status"], "no_coverage");
}

#[test]
fn e2e_mutators_listing() {
    let dir = tempfile::TempDir::new().unwrap();
    let output = run(dir.path(), &["mutators", "--exclude-mutation", "string"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("arithmetic"));
    assert!(stdout.contains("block"));
}

#[test]
fn e2e_init_writes_config_used_by_later_runs() {
    let dir = tempfile::TempDir::new().unwrap();
    create_rust_sources(dir.path());

    let output = run(
        dir.path(),
        &["init", "--optimization-mode", "off", "--exclude-mutation", "logical", "--concurrency", "3"],
    );
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let config: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("mutorch-config.json")).unwrap()).unwrap();
    assert_eq!(config["optimization-mode"], "off");
    assert_eq!(config["excluded-mutations"], serde_json::json!(["logical"]));
    assert_eq!(config["concurrency"], 3);

    let list = run(dir.path(), &["list", "src/util.rs", "--json"]);
    assert!(list.status.success());
    let batches: serde_json::Value = serde_json::from_str(String::from_utf8_lossy(&list.stdout).trim()).unwrap();
    assert!(batches[0]["mutants"].as_array().unwrap().is_empty());
}

#[test]
fn e2e_init_custom_path_and_invalid_option() {
    let dir = tempfile::TempDir::new().unwrap();
    let output = run(dir.path(), &["init", "conf/custom.json"]);
    // Parent directory does not exist.
    assert_eq!(output.status.code(), Some(3));

    std::fs::create_dir_all(dir.path().join("conf")).unwrap();
    let output = run(dir.path(), &["init", "conf/custom.json"]);
    assert!(output.status.success());
    let config: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("conf/custom.json")).unwrap()).unwrap();
    assert_eq!(config["optimization-mode"], "perTest");

    let bad = run(dir.path(), &["init", "--optimization-mode", "bogus"]);
    assert_eq!(bad.status.code(), Some(2));
    assert!(!dir.path().join("mutorch-config.json").exists());
}
