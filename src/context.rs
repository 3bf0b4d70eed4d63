//! Traversal state threaded through the recursive descent.

use serde::{Deserialize, Serialize};

use crate::mutants::MutantId;

/// Immutable per-scope traversal state.
///
/// Derivations return a new value and never touch the receiver, so a child
/// scope ends simply by dropping the derived context when the recursive call
/// that received it returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MutationContext {
    in_static_scope: bool,
    coverage_injection_enabled: bool,
    enclosing_mutant_id: Option<MutantId>,
    mutations_forbidden: bool,
}

impl MutationContext {
    /// Context at the top of a source tree.
    pub fn root(coverage_injection_enabled: bool) -> Self {
        MutationContext {
            coverage_injection_enabled,
            ..Self::default()
        }
    }

    /// Inside a `static`/`const` initializer or another const-evaluated scope.
    pub fn enter_static(self) -> Self {
        MutationContext {
            in_static_scope: true,
            ..self
        }
    }

    /// Inside the original branch of mutant `id`.
    pub fn within_mutant(self, id: MutantId) -> Self {
        MutationContext {
            enclosing_mutant_id: Some(id),
            ..self
        }
    }

    /// Inside syntax where no mutant may be placed (patterns, types, attributes...).
    pub fn forbid_mutations(self) -> Self {
        MutationContext {
            mutations_forbidden: true,
            ..self
        }
    }

    pub fn in_static_scope(&self) -> bool {
        self.in_static_scope
    }

    pub fn coverage_injection_enabled(&self) -> bool {
        self.coverage_injection_enabled
    }

    pub fn enclosing_mutant_id(&self) -> Option<MutantId> {
        self.enclosing_mutant_id
    }

    pub fn mutations_forbidden(&self) -> bool {
        self.mutations_forbidden
    }
}
