use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::mutants::{Mutant, MutantId};
use crate::options::OptimizationMode;

/// The mutant batch drained for one source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileBatch {
    pub file: String,
    pub mutated_file: Option<String>,
    pub mutants: Vec<Mutant>,
}

/// Everything the last `mutate` run produced, kept for `show`, `status` and
/// `coverage`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    pub optimization_mode: OptimizationMode,
    pub concurrency: usize,
    pub output_dir: Option<String>,
    pub files: Vec<FileBatch>,
}

impl RunState {
    pub fn total(&self) -> usize {
        self.files.iter().map(|f| f.mutants.len()).sum()
    }

    pub fn mutants(&self) -> impl Iterator<Item = &Mutant> {
        self.files.iter().flat_map(|f| f.mutants.iter())
    }

    pub fn mutants_mut(&mut self) -> impl Iterator<Item = &mut Mutant> {
        self.files.iter_mut().flat_map(|f| f.mutants.iter_mut())
    }

    pub fn find(&self, id: MutantId) -> Option<&Mutant> {
        self.mutants().find(|m| m.id == id)
    }
}

pub const STATE_FILE: &str = ".mutorch-state.json";

fn state_path() -> PathBuf {
    let dir = dirs_or_cwd();
    dir.join(STATE_FILE)
}

fn dirs_or_cwd() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

pub fn save_last_run(state: &RunState) -> std::io::Result<()> {
    save_to_path(state, &state_path())
}

pub fn load_last_run() -> Option<RunState> {
    load_from_path(&state_path())
}

pub fn save_to_path(state: &RunState, path: &Path) -> std::io::Result<()> {
    let json = serde_json::to_string_pretty(state).map_err(std::io::Error::other)?;
    std::fs::write(path, json)
}

pub fn load_from_path(path: &Path) -> Option<RunState> {
    let data = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&data).ok()
}
