use std::fmt;

use serde::{Deserialize, Serialize};

use crate::context::MutationContext;
use crate::mutators::MutatorKind;
use crate::syntax::Span;

/// Sequential mutant identifier, unique within one engine instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MutantId(pub u32);

impl fmt::Display for MutantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub file: String,
    pub line: usize,
    pub column: usize,
    pub start_byte: usize,
    pub end_byte: usize,
}

impl Location {
    pub fn new(file: &str, span: Span) -> Self {
        Location {
            file: file.to_string(),
            line: span.line,
            column: span.column,
            start_byte: span.start_byte,
            end_byte: span.end_byte,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutantStatus {
    #[default]
    NotRun,
    Killed,
    Survived,
    Timeout,
    NoCoverage,
    CompileError,
}

impl fmt::Display for MutantStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MutantStatus::NotRun => "not run",
            MutantStatus::Killed => "killed",
            MutantStatus::Survived => "survived",
            MutantStatus::Timeout => "timeout",
            MutantStatus::NoCoverage => "no coverage",
            MutantStatus::CompileError => "compile error",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mutant {
    pub id: MutantId,
    pub location: Location,
    pub mutator: MutatorKind,
    pub description: String,
    pub original: String,
    pub replacement: String,
    pub context: MutationContext,
    #[serde(default)]
    pub status: MutantStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_reason: Option<String>,
}

impl Mutant {
    /// Mutants in const-evaluated scopes are switched at compile time and can
    /// never report runtime coverage.
    pub fn is_static(&self) -> bool {
        self.context.in_static_scope()
    }

    pub fn set_status(&mut self, status: MutantStatus, reason: Option<String>) {
        self.status = status;
        self.status_reason = reason;
    }

    /// Identity that survives separate invocations as long as the mutated
    /// code is unchanged (sequential ids do not once files are added or reordered).
    pub fn fingerprint(&self) -> String {
        let key = format!(
            "{}\u{1f}{}\u{1f}{}\u{1f}{}\u{1f}{}\u{1f}{}",
            self.location.file,
            self.mutator.name(),
            self.location.start_byte,
            self.location.end_byte,
            self.original,
            self.replacement,
        );
        format!("{:016x}", stable_hash(&key))
    }

    /// `source` with only this mutant applied, as plain text.
    pub fn apply_to(&self, source: &str) -> Option<String> {
        let before = source.get(..self.location.start_byte)?;
        let after = source.get(self.location.end_byte..)?;
        let mut result = String::with_capacity(source.len());
        result.push_str(before);
        result.push_str(&self.replacement);
        result.push_str(after);
        Some(result)
    }
}

fn stable_hash(input: &str) -> u64 {
    // FNV-1a 64-bit.
    const OFFSET_BASIS: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;

    let mut hash = OFFSET_BASIS;
    for b in input.as_bytes() {
        hash ^= *b as u64;
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

/// Mutants discovered since the last drain, in creation order.
#[derive(Debug, Default)]
pub struct MutantRegistry {
    mutants: Vec<Mutant>,
}

impl MutantRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, mutants: impl IntoIterator<Item = Mutant>) {
        self.mutants.extend(mutants);
    }

    /// Hand over everything collected so far and start empty.
    pub fn drain(&mut self) -> Vec<Mutant> {
        std::mem::take(&mut self.mutants)
    }

    pub fn len(&self) -> usize {
        self.mutants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mutants.is_empty()
    }
}
