//! The orchestration engine: dispatch table, traversal and mutant bookkeeping.

use std::collections::HashMap;

use thiserror::Error;

use crate::context::MutationContext;
use crate::mutants::{Location, Mutant, MutantId, MutantRegistry, MutantStatus};
use crate::mutators::{MutatorError, MutatorKind, MutatorRegistry};
use crate::node_orchestrators::{
    ArrayRepeatOrchestrator, ConstFunctionOrchestrator, ExpressionOrchestrator,
    IfStatementOrchestrator, MatchPatternOrchestrator, NodeKinds, NodeOrchestrator,
    NonMutableOrchestrator, PassThroughOrchestrator, PatternBindingOrchestrator, Specificity,
    StaticItemOrchestrator, TestCodeOrchestrator,
};
use crate::options::{OptimizationPolicy, ValidatedOptions};
use crate::placer::{self, PlannedMutant};
use crate::syntax::{SyntaxError, SyntaxNode, SyntaxTree};

#[derive(Debug, Error)]
pub enum OrchestrationError {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    /// An operator could not process a node it claimed. Fatal: continuing
    /// would shift every identifier after it.
    #[error("mutator `{mutator}` failed on `{node_kind}` at {file}:{line}:{column}: {source}")]
    Mutator {
        file: String,
        line: usize,
        column: usize,
        node_kind: &'static str,
        mutator: MutatorKind,
        #[source]
        source: MutatorError,
    },
}

/// Maps node kinds to the orchestrators that may claim them.
pub struct DispatchTable {
    orchestrators: Vec<Box<dyn NodeOrchestrator>>,
    by_kind: HashMap<&'static str, Vec<usize>>,
    families: Vec<usize>,
    fallback: PassThroughOrchestrator,
}

impl DispatchTable {
    /// No orchestrators: every node passes through.
    pub fn empty() -> Self {
        DispatchTable {
            orchestrators: Vec::new(),
            by_kind: HashMap::new(),
            families: Vec::new(),
            fallback: PassThroughOrchestrator,
        }
    }

    pub fn standard() -> Self {
        let mut table = Self::empty();
        // Test code wins over `const fn` when both match.
        table.register(Box::new(TestCodeOrchestrator));
        table.register(Box::new(ConstFunctionOrchestrator));
        table.register(Box::new(StaticItemOrchestrator));
        table.register(Box::new(ArrayRepeatOrchestrator));
        table.register(Box::new(MatchPatternOrchestrator));
        table.register(Box::new(PatternBindingOrchestrator));
        table.register(Box::new(IfStatementOrchestrator));
        table.register(Box::new(ExpressionOrchestrator));
        table.register(Box::new(NonMutableOrchestrator));
        table
    }

    pub fn register(&mut self, orchestrator: Box<dyn NodeOrchestrator>) {
        let index = self.orchestrators.len();
        match orchestrator.kinds() {
            NodeKinds::Exact(kinds) => {
                for kind in kinds {
                    self.by_kind.entry(kind).or_default().push(index);
                }
            }
            NodeKinds::Family => self.families.push(index),
        }
        self.orchestrators.push(orchestrator);
    }

    /// The single orchestrator responsible for `node`: the most specific one
    /// that accepts it, else the pass-through fallback.
    pub fn resolve(&self, node: &SyntaxNode) -> &dyn NodeOrchestrator {
        let exact = self.by_kind.get(node.kind()).into_iter().flatten();
        let mut best: Option<(Specificity, usize)> = None;
        for &index in exact.chain(self.families.iter()) {
            let orchestrator = &self.orchestrators[index];
            if !orchestrator.can_handle(node) {
                continue;
            }
            let specificity = orchestrator.specificity();
            let better = match best {
                None => true,
                Some((s, i)) => specificity > s || (specificity == s && index < i),
            };
            if better {
                best = Some((specificity, index));
            }
        }
        match best {
            Some((_, index)) => self.orchestrators[index].as_ref(),
            None => &self.fallback,
        }
    }
}

/// State of one traversal. Mutants and identifiers are only committed to the
/// engine once the whole tree has been walked successfully.
pub struct Walker<'a> {
    dispatch: &'a DispatchTable,
    mutators: &'a MutatorRegistry,
    file: &'a str,
    next_id: u32,
    pending: Vec<Mutant>,
    visited: usize,
}

impl<'a> Walker<'a> {
    fn new(
        dispatch: &'a DispatchTable,
        mutators: &'a MutatorRegistry,
        file: &'a str,
        next_id: u32,
    ) -> Self {
        Walker {
            dispatch,
            mutators,
            file,
            next_id,
            pending: Vec::new(),
            visited: 0,
        }
    }

    pub fn orchestrate(
        &mut self,
        node: SyntaxNode,
        context: &MutationContext,
    ) -> Result<SyntaxNode, OrchestrationError> {
        self.visited += 1;
        let dispatch = self.dispatch;
        let orchestrator = dispatch.resolve(&node);
        log::trace!(
            "{}:{}:{} {} -> {}",
            self.file,
            node.span().line,
            node.span().column,
            node.kind(),
            orchestrator.name()
        );
        orchestrator.orchestrate(node, context, self)
    }

    /// Run every enabled operator on `node`, recording one mutant per
    /// candidate with the next identifier.
    pub fn generate_mutants(
        &mut self,
        node: &SyntaxNode,
        context: &MutationContext,
    ) -> Result<Vec<PlannedMutant>, OrchestrationError> {
        if context.mutations_forbidden() {
            return Ok(Vec::new());
        }
        let mutators = self.mutators;
        let span = node.span();
        let mut planned = Vec::new();
        for mutator in mutators.applicable(node) {
            let candidates =
                mutator
                    .mutate(node, context)
                    .map_err(|source| OrchestrationError::Mutator {
                        file: self.file.to_string(),
                        line: span.line,
                        column: span.column,
                        node_kind: node.kind(),
                        mutator: mutator.kind(),
                        source,
                    })?;
            if candidates.is_empty() {
                continue;
            }
            let original = node.text();
            for candidate in candidates {
                let id = MutantId(self.next_id);
                self.next_id += 1;
                self.pending.push(Mutant {
                    id,
                    location: Location::new(self.file, span),
                    mutator: mutator.kind(),
                    description: candidate.description,
                    original: original.clone(),
                    replacement: candidate.replacement.text(),
                    context: *context,
                    status: MutantStatus::NotRun,
                    status_reason: None,
                });
                planned.push(PlannedMutant {
                    id,
                    replacement: candidate.replacement,
                });
            }
        }
        Ok(planned)
    }
}

/// Walks source trees, records mutants and rewrites each tree into a mutant
/// schema. One instance may process many files in sequence; identifiers keep
/// increasing across them.
pub struct OrchestrationEngine {
    dispatch: DispatchTable,
    mutators: MutatorRegistry,
    policy: OptimizationPolicy,
    registry: MutantRegistry,
    next_id: u32,
    last_visit_count: usize,
}

impl OrchestrationEngine {
    pub fn new(options: &ValidatedOptions) -> Self {
        Self::with_parts(
            DispatchTable::standard(),
            MutatorRegistry::from_excluded(&options.excluded),
            options.policy,
        )
    }

    pub fn with_parts(
        dispatch: DispatchTable,
        mutators: MutatorRegistry,
        policy: OptimizationPolicy,
    ) -> Self {
        OrchestrationEngine {
            dispatch,
            mutators,
            policy,
            registry: MutantRegistry::new(),
            next_id: 0,
            last_visit_count: 0,
        }
    }

    pub fn policy(&self) -> OptimizationPolicy {
        self.policy
    }

    pub fn must_inject_coverage_logic(&self) -> bool {
        self.policy.must_inject_coverage_logic()
    }

    /// One pre-order traversal of `tree`. On error nothing from this tree is
    /// kept and no identifier is consumed.
    pub fn orchestrate(&mut self, tree: SyntaxTree) -> Result<SyntaxTree, OrchestrationError> {
        let (path, root) = tree.into_parts();
        let context = MutationContext::root(self.must_inject_coverage_logic());

        let mut walker = Walker::new(&self.dispatch, &self.mutators, &path, self.next_id);
        let root = walker.orchestrate(root, &context)?;
        let Walker {
            next_id,
            pending,
            visited,
            ..
        } = walker;

        log::debug!(
            "{}: visited {} nodes, {} mutants (ids {}..{})",
            path,
            visited,
            pending.len(),
            self.next_id,
            next_id
        );
        self.next_id = next_id;
        self.last_visit_count = visited;
        self.registry.extend(pending);
        log::trace!("{} mutants awaiting drain", self.registry.len());
        Ok(SyntaxTree::from_root(path, root))
    }

    /// Parse, orchestrate and render one file. A file that received mutants
    /// gets the schema lint allowance prepended; others come back unchanged.
    pub fn orchestrate_source(
        &mut self,
        path: &str,
        source: &str,
    ) -> Result<String, OrchestrationError> {
        let tree = SyntaxTree::parse(path, source)?;
        let first_id = self.next_id;
        let rendered = self.orchestrate(tree)?.render();
        if self.next_id == first_id {
            Ok(rendered)
        } else {
            Ok(placer::with_lint_allowance(&rendered))
        }
    }

    /// Mutants found since the previous call; the registry is left empty.
    pub fn get_latest_batch(&mut self) -> Vec<Mutant> {
        self.registry.drain()
    }

    /// Identifiers handed out so far.
    pub fn mutant_count(&self) -> u32 {
        self.next_id
    }

    pub fn last_visit_count(&self) -> usize {
        self.last_visit_count
    }
}
