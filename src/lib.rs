pub mod context;
pub mod coverage;
pub mod engine;
pub mod mutants;
pub mod mutators;
pub mod node_orchestrators;
pub mod options;
pub mod output;
pub mod placer;
pub mod state;
pub mod syntax;

pub use context::MutationContext;
pub use engine::{DispatchTable, OrchestrationEngine, OrchestrationError};
pub use mutants::{Mutant, MutantId, MutantRegistry, MutantStatus};
pub use options::{OptimizationMode, OptimizationPolicy, Options, ValidatedOptions};
pub use syntax::{SyntaxNode, SyntaxTree};

/// Source dialects the engine can orchestrate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Rust,
}

pub fn detect_language(path: &std::path::Path) -> Option<Language> {
    match path.extension()?.to_str()? {
        "rs" => Some(Language::Rust),
        _ => None,
    }
}
