//! Per-node-kind orchestrators.
//!
//! The engine resolves exactly one orchestrator per node (see
//! [`crate::engine::DispatchTable`]); the orchestrator decides which mutants
//! the node itself gets, which context each child is walked with, and how the
//! mutants are woven back into the tree.

use crate::context::MutationContext;
use crate::engine::{OrchestrationError, Walker};
use crate::placer::{self, PlannedMutant};
use crate::syntax::SyntaxNode;

/// Ranking used when several orchestrators accept the same node; higher wins,
/// ties go to the one registered first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Specificity {
    Fallback,
    /// Claims a family of kinds through `can_handle` alone.
    Family,
    /// Claims exact node kinds.
    Kind,
    /// Claims exact node kinds carrying a particular shape (a modifier, an attribute...).
    Refined,
}

/// Node kinds an orchestrator is indexed under in the dispatch table.
#[derive(Debug, Clone, Copy)]
pub enum NodeKinds {
    Exact(&'static [&'static str]),
    Family,
}

pub trait NodeOrchestrator: Send + Sync {
    fn name(&self) -> &'static str;

    fn kinds(&self) -> NodeKinds;

    fn specificity(&self) -> Specificity {
        match self.kinds() {
            NodeKinds::Exact(_) => Specificity::Kind,
            NodeKinds::Family => Specificity::Family,
        }
    }

    fn can_handle(&self, _node: &SyntaxNode) -> bool {
        true
    }

    /// Mutants for the node itself, recorded through the walker.
    fn apply_mutations(
        &self,
        _node: &SyntaxNode,
        _context: &MutationContext,
        _walker: &mut Walker<'_>,
    ) -> Result<Vec<PlannedMutant>, OrchestrationError> {
        Ok(Vec::new())
    }

    /// Context a given child is walked with.
    fn child_context(&self, _child: &SyntaxNode, context: &MutationContext) -> MutationContext {
        *context
    }

    fn recurse_into_children(
        &self,
        node: SyntaxNode,
        context: &MutationContext,
        walker: &mut Walker<'_>,
    ) -> Result<SyntaxNode, OrchestrationError> {
        node.try_map_children(|child| {
            let child_context = self.child_context(&child, context);
            walker.orchestrate(child, &child_context)
        })
    }

    fn place_mutations(
        &self,
        node: SyntaxNode,
        mutants: Vec<PlannedMutant>,
        context: &MutationContext,
    ) -> SyntaxNode {
        placer::place(node, mutants, context, true)
    }

    /// Mutate the node, walk its children (inside the original branch of the
    /// node's first mutant, if any), then weave the mutants in.
    fn orchestrate(
        &self,
        node: SyntaxNode,
        context: &MutationContext,
        walker: &mut Walker<'_>,
    ) -> Result<SyntaxNode, OrchestrationError> {
        let mutants = self.apply_mutations(&node, context, walker)?;
        let inner = match mutants.first() {
            Some(first) => context.within_mutant(first.id),
            None => *context,
        };
        let node = self.recurse_into_children(node, &inner, walker)?;
        Ok(self.place_mutations(node, mutants, context))
    }
}

/// Used for every node no registered orchestrator claims: no mutants, plain recursion.
pub struct PassThroughOrchestrator;

impl NodeOrchestrator for PassThroughOrchestrator {
    fn name(&self) -> &'static str {
        "pass-through"
    }

    fn kinds(&self) -> NodeKinds {
        NodeKinds::Family
    }

    fn specificity(&self) -> Specificity {
        Specificity::Fallback
    }
}

/// Expressions the operators rewrite in place.
pub struct ExpressionOrchestrator;

impl NodeOrchestrator for ExpressionOrchestrator {
    fn name(&self) -> &'static str {
        "expression"
    }

    fn kinds(&self) -> NodeKinds {
        NodeKinds::Exact(&[
            "binary_expression",
            "unary_expression",
            "boolean_literal",
            "string_literal",
            "compound_assignment_expr",
        ])
    }

    fn apply_mutations(
        &self,
        node: &SyntaxNode,
        context: &MutationContext,
        walker: &mut Walker<'_>,
    ) -> Result<Vec<PlannedMutant>, OrchestrationError> {
        walker.generate_mutants(node, context)
    }
}

/// `if` used as a statement. The switch around it stays block-like, so it is
/// never parenthesised.
pub struct IfStatementOrchestrator;

impl NodeOrchestrator for IfStatementOrchestrator {
    fn name(&self) -> &'static str {
        "if-statement"
    }

    fn kinds(&self) -> NodeKinds {
        NodeKinds::Exact(&["if_expression"])
    }

    fn apply_mutations(
        &self,
        node: &SyntaxNode,
        context: &MutationContext,
        walker: &mut Walker<'_>,
    ) -> Result<Vec<PlannedMutant>, OrchestrationError> {
        walker.generate_mutants(node, context)
    }

    fn place_mutations(
        &self,
        node: SyntaxNode,
        mutants: Vec<PlannedMutant>,
        context: &MutationContext,
    ) -> SyntaxNode {
        placer::place(node, mutants, context, false)
    }
}

/// `static` and `const` items, `const { .. }` blocks and enum discriminants:
/// everything below is evaluated at compile time.
pub struct StaticItemOrchestrator;

impl NodeOrchestrator for StaticItemOrchestrator {
    fn name(&self) -> &'static str {
        "static-item"
    }

    fn kinds(&self) -> NodeKinds {
        NodeKinds::Exact(&["static_item", "const_item", "const_block", "enum_variant"])
    }

    fn recurse_into_children(
        &self,
        node: SyntaxNode,
        context: &MutationContext,
        walker: &mut Walker<'_>,
    ) -> Result<SyntaxNode, OrchestrationError> {
        let static_context = context.enter_static();
        node.try_map_children(|child| walker.orchestrate(child, &static_context))
    }
}

/// `const fn`: the body may be evaluated at compile time.
pub struct ConstFunctionOrchestrator;

impl NodeOrchestrator for ConstFunctionOrchestrator {
    fn name(&self) -> &'static str {
        "const-fn"
    }

    fn kinds(&self) -> NodeKinds {
        NodeKinds::Exact(&["function_item"])
    }

    fn specificity(&self) -> Specificity {
        Specificity::Refined
    }

    fn can_handle(&self, node: &SyntaxNode) -> bool {
        node.children()
            .iter()
            .filter(|c| c.kind() == "function_modifiers")
            .any(|m| m.children().iter().any(|t| t.kind() == "const"))
    }

    fn child_context(&self, _child: &SyntaxNode, context: &MutationContext) -> MutationContext {
        context.enter_static()
    }
}

/// `[value; length]`: the length is a const expression, the value is not.
pub struct ArrayRepeatOrchestrator;

impl NodeOrchestrator for ArrayRepeatOrchestrator {
    fn name(&self) -> &'static str {
        "array-repeat"
    }

    fn kinds(&self) -> NodeKinds {
        NodeKinds::Exact(&["array_expression"])
    }

    fn specificity(&self) -> Specificity {
        Specificity::Refined
    }

    fn can_handle(&self, node: &SyntaxNode) -> bool {
        node.child_by_field("length").is_some()
    }

    fn child_context(&self, child: &SyntaxNode, context: &MutationContext) -> MutationContext {
        if child.field() == Some("length") {
            context.enter_static()
        } else {
            *context
        }
    }
}

/// Match arm patterns: only the `if` guard may be mutated.
pub struct MatchPatternOrchestrator;

impl NodeOrchestrator for MatchPatternOrchestrator {
    fn name(&self) -> &'static str {
        "match-pattern"
    }

    fn kinds(&self) -> NodeKinds {
        NodeKinds::Exact(&["match_pattern"])
    }

    fn child_context(&self, child: &SyntaxNode, context: &MutationContext) -> MutationContext {
        if child.field() == Some("condition") {
            *context
        } else {
            context.forbid_mutations()
        }
    }
}

/// `let`, `if let` and `for`: the bound pattern and its type are left alone.
pub struct PatternBindingOrchestrator;

impl NodeOrchestrator for PatternBindingOrchestrator {
    fn name(&self) -> &'static str {
        "pattern-binding"
    }

    fn kinds(&self) -> NodeKinds {
        NodeKinds::Exact(&["let_declaration", "let_condition", "for_expression"])
    }

    fn child_context(&self, child: &SyntaxNode, context: &MutationContext) -> MutationContext {
        match child.field() {
            Some("pattern") | Some("type") => context.forbid_mutations(),
            _ => *context,
        }
    }
}

const NON_MUTABLE_KINDS: &[&str] = &[
    "attribute_item",
    "inner_attribute_item",
    "macro_invocation",
    "macro_definition",
    "use_declaration",
    "extern_crate_declaration",
    "type_arguments",
    "type_parameters",
    "trait_bounds",
    "where_clause",
    "parameters",
    "closure_parameters",
    "visibility_modifier",
    "function_modifiers",
    "extern_modifier",
];

/// Syntax where a guard cannot appear: patterns, types, attributes, macro
/// token trees and signatures. Children are still walked.
pub struct NonMutableOrchestrator;

impl NodeOrchestrator for NonMutableOrchestrator {
    fn name(&self) -> &'static str {
        "non-mutable"
    }

    fn kinds(&self) -> NodeKinds {
        NodeKinds::Family
    }

    fn can_handle(&self, node: &SyntaxNode) -> bool {
        let kind = node.kind();
        kind.ends_with("_pattern") || kind.ends_with("_type") || NON_MUTABLE_KINDS.contains(&kind)
    }

    fn child_context(&self, _child: &SyntaxNode, context: &MutationContext) -> MutationContext {
        context.forbid_mutations()
    }
}

/// `#[test]` functions and `#[cfg(test)]` modules and impls.
pub struct TestCodeOrchestrator;

impl TestCodeOrchestrator {
    fn is_test_attribute(attribute: &str) -> bool {
        let compact: String = attribute.chars().filter(|c| !c.is_whitespace()).collect();
        if compact == "#[test]" || compact.ends_with("::test]") {
            return true;
        }
        let Some(body) = compact
            .strip_prefix("#[cfg(")
            .and_then(|rest| rest.strip_suffix(")]"))
        else {
            return false;
        };
        let tokens = cfg_tokens(body);
        let mut pos = 0;
        let requires_test = cfg_mentions_test(&tokens, &mut pos);
        requires_test && pos == tokens.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum CfgToken {
    Ident(String),
    Str,
    Open,
    Close,
    Comma,
    Eq,
}

fn cfg_tokens(body: &str) -> Vec<CfgToken> {
    let mut tokens = Vec::new();
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '(' => tokens.push(CfgToken::Open),
            ')' => tokens.push(CfgToken::Close),
            ',' => tokens.push(CfgToken::Comma),
            '=' => tokens.push(CfgToken::Eq),
            '"' => {
                let mut escaped = false;
                for c in chars.by_ref() {
                    match c {
                        '\\' if !escaped => escaped = true,
                        '"' if !escaped => break,
                        _ => escaped = false,
                    }
                }
                tokens.push(CfgToken::Str);
            }
            c if c.is_alphanumeric() || c == '_' => {
                let mut ident = String::from(c);
                while let Some(&next) = chars.peek() {
                    if next.is_alphanumeric() || next == '_' {
                        ident.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(CfgToken::Ident(ident));
            }
            _ => {}
        }
    }
    tokens
}

/// Parse one cfg predicate starting at `pos` and report whether a bare `test`
/// occurs in it outside `not(..)`.
fn cfg_mentions_test(tokens: &[CfgToken], pos: &mut usize) -> bool {
    let Some(CfgToken::Ident(name)) = tokens.get(*pos) else {
        return false;
    };
    *pos += 1;
    match tokens.get(*pos) {
        Some(CfgToken::Eq) => {
            *pos += 1;
            if tokens.get(*pos) == Some(&CfgToken::Str) {
                *pos += 1;
            }
            false
        }
        Some(CfgToken::Open) => {
            *pos += 1;
            let mut found = false;
            while *pos < tokens.len() && tokens[*pos] != CfgToken::Close {
                found |= cfg_mentions_test(tokens, pos);
                match tokens.get(*pos) {
                    Some(CfgToken::Comma) => *pos += 1,
                    Some(CfgToken::Close) => {}
                    _ => return false,
                }
            }
            if tokens.get(*pos) == Some(&CfgToken::Close) {
                *pos += 1;
            }
            found && name != "not"
        }
        _ => name == "test",
    }
}

impl NodeOrchestrator for TestCodeOrchestrator {
    fn name(&self) -> &'static str {
        "test-code"
    }

    fn kinds(&self) -> NodeKinds {
        NodeKinds::Exact(&["function_item", "mod_item", "impl_item"])
    }

    fn specificity(&self) -> Specificity {
        Specificity::Refined
    }

    fn can_handle(&self, node: &SyntaxNode) -> bool {
        node.attributes().iter().any(|a| Self::is_test_attribute(a))
    }

    fn child_context(&self, _child: &SyntaxNode, context: &MutationContext) -> MutationContext {
        context.forbid_mutations()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognises_test_attributes() {
        assert!(TestCodeOrchestrator::is_test_attribute("#[test]"));
        assert!(TestCodeOrchestrator::is_test_attribute("#[tokio::test]"));
        assert!(TestCodeOrchestrator::is_test_attribute("#[cfg( test )]"));
        assert!(TestCodeOrchestrator::is_test_attribute("#[cfg(all(test, unix))]"));
        assert!(!TestCodeOrchestrator::is_test_attribute("#[inline]"));
        assert!(!TestCodeOrchestrator::is_test_attribute("#[cfg(feature = \"testing\")]"));
        assert!(TestCodeOrchestrator::is_test_attribute("#[cfg(any(test, feature = \"x\"))]"));
        assert!(TestCodeOrchestrator::is_test_attribute("#[cfg(all(unix, any(test, doc)))]"));
        assert!(!TestCodeOrchestrator::is_test_attribute("#[cfg(not(test))]"));
        assert!(!TestCodeOrchestrator::is_test_attribute("#[cfg(all(unix, not(test)))]"));
        assert!(!TestCodeOrchestrator::is_test_attribute("#[cfg(feature = \"test\")]"));
        assert!(!TestCodeOrchestrator::is_test_attribute("#[cfg(testing)]"));
        assert!(!TestCodeOrchestrator::is_test_attribute("#[cfg_attr(test, derive(Debug))]"));
    }
}
