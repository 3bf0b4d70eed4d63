use mutorch::options::OptimizationMode;
use mutorch::state::{self, FileBatch, RunState};
use mutorch::{Mutant, MutantId, MutantStatus, OrchestrationEngine, ValidatedOptions};
use tempfile::TempDir;

fn sample_state() -> RunState {
    let mut engine = OrchestrationEngine::new(&ValidatedOptions::default());
    let mut files = Vec::new();
    for (name, source) in [
        ("a.rs", "fn a(x: i32) -> i32 { x + 1 }"),
        ("b.rs", "fn b() -> bool { true }"),
    ] {
        engine.orchestrate_source(name, source).unwrap();
        files.push(FileBatch {
            file: name.to_string(),
            mutated_file: Some(format!("out/{name}")),
            mutants: engine.get_latest_batch(),
        });
    }
    RunState {
        optimization_mode: OptimizationMode::PerTest,
        concurrency: 2,
        output_dir: Some("out".into()),
        files,
    }
}

#[test]
fn run_state_serializes_to_json() {
    let json = serde_json::to_string(&sample_state()).unwrap();
    assert!(json.contains("\"optimization_mode\":\"perTest\""));
    assert!(json.contains("\"mutator\":\"arithmetic\""));
    assert!(json.contains("\"status\":\"not_run\""));
    assert!(!json.contains("status_reason"));
}

#[test]
fn run_state_roundtrips_through_json() {
    let run_state = sample_state();
    let json = serde_json::to_string(&run_state).unwrap();
    let back: RunState = serde_json::from_str(&json).unwrap();
    assert_eq!(back, run_state);
}

#[test]
fn lookup_across_files() {
    let run_state = sample_state();
    assert_eq!(run_state.total(), 2);
    assert_eq!(run_state.find(MutantId(1)).unwrap().location.file, "b.rs");
    assert!(run_state.find(MutantId(5)).is_none());
}

#[test]
fn save_and_load_state() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(".mutorch-state.json");

    let mut run_state = sample_state();
    for m in run_state.mutants_mut() {
        m.set_status(MutantStatus::Survived, Some("tests passed".into()));
    }
    state::save_to_path(&run_state, &path).unwrap();
    let loaded = state::load_from_path(&path).unwrap();
    assert_eq!(loaded, run_state);
    assert!(loaded.mutants().all(|m| m.status == MutantStatus::Survived));
}

#[test]
fn load_missing_state_returns_none() {
    let dir = TempDir::new().unwrap();
    assert!(state::load_from_path(&dir.path().join("nope.json")).is_none());
}

#[test]
fn mutant_applies_to_original_source() {
    let source = "fn a(x: i32) -> i32 { x + 1 }";
    let run_state = sample_state();
    let m: &Mutant = run_state.find(MutantId(0)).unwrap();
    assert_eq!(m.apply_to(source).unwrap(), "fn a(x: i32) -> i32 { x - 1 }");
    assert!(m.apply_to("short").is_none());
}

#[test]
fn fingerprint_ignores_sequential_id() {
    let run_state = sample_state();
    let mut m = run_state.find(MutantId(0)).unwrap().clone();
    let before = m.fingerprint();
    assert_eq!(before.len(), 16);
    m.id = MutantId(42);
    assert_eq!(m.fingerprint(), before);
    m.replacement = "x * 1".into();
    assert_ne!(m.fingerprint(), before);
}
