//! Mutation operators.
//!
//! Each operator is a pluggable [`Mutator`]: it says which nodes it applies to
//! and produces zero or more replacement nodes for one of them. Operators
//! never assign identifiers or place guards; the engine does both.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::context::MutationContext;
use crate::syntax::SyntaxNode;

/// Known operator families. Exclusions are validated against this list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutatorKind {
    Arithmetic,
    Equality,
    Logical,
    Bitwise,
    Assignment,
    Unary,
    Boolean,
    String,
    Block,
}

impl MutatorKind {
    pub const ALL: [MutatorKind; 9] = [
        MutatorKind::Arithmetic,
        MutatorKind::Equality,
        MutatorKind::Logical,
        MutatorKind::Bitwise,
        MutatorKind::Assignment,
        MutatorKind::Unary,
        MutatorKind::Boolean,
        MutatorKind::String,
        MutatorKind::Block,
    ];

    pub fn name(self) -> &'static str {
        match self {
            MutatorKind::Arithmetic => "arithmetic",
            MutatorKind::Equality => "equality",
            MutatorKind::Logical => "logical",
            MutatorKind::Bitwise => "bitwise",
            MutatorKind::Assignment => "assignment",
            MutatorKind::Unary => "unary",
            MutatorKind::Boolean => "boolean",
            MutatorKind::String => "string",
            MutatorKind::Block => "block",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            MutatorKind::Arithmetic => "Arithmetic operators",
            MutatorKind::Equality => "Equality and comparison operators",
            MutatorKind::Logical => "Logical operators",
            MutatorKind::Bitwise => "Bitwise and shift operators",
            MutatorKind::Assignment => "Compound assignment operators",
            MutatorKind::Unary => "Unary negation removal",
            MutatorKind::Boolean => "Boolean literals",
            MutatorKind::String => "String literals",
            MutatorKind::Block => "Conditional block removal",
        }
    }

    /// Resolve a user-supplied operator name: exact name first, then the first
    /// kind whose description contains it, both case-insensitive.
    pub fn lookup(input: &str) -> Option<MutatorKind> {
        let wanted = input.trim().to_lowercase();
        if wanted.is_empty() {
            return None;
        }
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.name() == wanted)
            .or_else(|| {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|k| k.description().to_lowercase().contains(&wanted))
            })
    }
}

impl fmt::Display for MutatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error)]
pub enum MutatorError {
    #[error("malformed `{kind}` node: {reason}")]
    MalformedNode { kind: &'static str, reason: String },
}

/// One way to rewrite a node.
#[derive(Debug, Clone)]
pub struct MutationCandidate {
    pub replacement: SyntaxNode,
    pub description: String,
}

pub trait Mutator: Send + Sync {
    fn kind(&self) -> MutatorKind;

    fn applies_to(&self, node: &SyntaxNode) -> bool;

    fn mutate(
        &self,
        node: &SyntaxNode,
        context: &MutationContext,
    ) -> Result<Vec<MutationCandidate>, MutatorError>;
}

fn operator_child(node: &SyntaxNode) -> Result<(usize, String), MutatorError> {
    node.children()
        .iter()
        .position(|c| c.field() == Some("operator"))
        .map(|i| (i, node.children()[i].text()))
        .ok_or_else(|| MutatorError::MalformedNode {
            kind: node.kind(),
            reason: "no operator token".to_string(),
        })
}

fn swap_operator(
    kind: MutatorKind,
    node: &SyntaxNode,
    table: fn(&str) -> &'static [&'static str],
) -> Result<Vec<MutationCandidate>, MutatorError> {
    let (index, op) = operator_child(node)?;
    let op_span = node.children()[index].span();
    Ok(table(&op)
        .iter()
        .map(|replacement| MutationCandidate {
            replacement: node
                .clone()
                .with_child(index, SyntaxNode::leaf("operator", *replacement, op_span)),
            description: format!("{}: `{}` -> `{}`", kind.description(), op, replacement),
        })
        .collect())
}

fn arithmetic_table(op: &str) -> &'static [&'static str] {
    match op {
        "+" => &["-"],
        "-" => &["+"],
        "*" => &["/"],
        "/" => &["*"],
        "%" => &["*"],
        _ => &[],
    }
}

fn equality_table(op: &str) -> &'static [&'static str] {
    match op {
        ">" => &[">=", "<="],
        ">=" => &[">", "<"],
        "<" => &["<=", ">="],
        "<=" => &["<", ">"],
        "==" => &["!="],
        "!=" => &["=="],
        _ => &[],
    }
}

fn logical_table(op: &str) -> &'static [&'static str] {
    match op {
        "&&" => &["||"],
        "||" => &["&&"],
        _ => &[],
    }
}

fn bitwise_table(op: &str) -> &'static [&'static str] {
    match op {
        "&" => &["|"],
        "|" => &["&"],
        "^" => &["&"],
        "<<" => &[">>"],
        ">>" => &["<<"],
        _ => &[],
    }
}

fn assignment_table(op: &str) -> &'static [&'static str] {
    match op {
        "+=" => &["-="],
        "-=" => &["+="],
        "*=" => &["/="],
        "/=" => &["*="],
        "%=" => &["*="],
        "&=" => &["|="],
        "|=" => &["&="],
        "^=" => &["&="],
        "<<=" => &[">>="],
        ">>=" => &["<<="],
        _ => &[],
    }
}

/// Swaps the operator token of a binary or compound assignment expression.
pub struct OperatorSwapMutator {
    kind: MutatorKind,
    node_kind: &'static str,
    table: fn(&str) -> &'static [&'static str],
}

impl OperatorSwapMutator {
    pub fn arithmetic() -> Self {
        Self::binary(MutatorKind::Arithmetic, arithmetic_table)
    }

    pub fn equality() -> Self {
        Self::binary(MutatorKind::Equality, equality_table)
    }

    pub fn logical() -> Self {
        Self::binary(MutatorKind::Logical, logical_table)
    }

    pub fn bitwise() -> Self {
        Self::binary(MutatorKind::Bitwise, bitwise_table)
    }

    pub fn assignment() -> Self {
        OperatorSwapMutator {
            kind: MutatorKind::Assignment,
            node_kind: "compound_assignment_expr",
            table: assignment_table,
        }
    }

    fn binary(kind: MutatorKind, table: fn(&str) -> &'static [&'static str]) -> Self {
        OperatorSwapMutator {
            kind,
            node_kind: "binary_expression",
            table,
        }
    }
}

impl Mutator for OperatorSwapMutator {
    fn kind(&self) -> MutatorKind {
        self.kind
    }

    fn applies_to(&self, node: &SyntaxNode) -> bool {
        node.kind() == self.node_kind
    }

    fn mutate(
        &self,
        node: &SyntaxNode,
        _context: &MutationContext,
    ) -> Result<Vec<MutationCandidate>, MutatorError> {
        swap_operator(self.kind, node, self.table)
    }
}

/// `!x` -> `x`, `-x` -> `x`.
pub struct UnaryMutator;

impl Mutator for UnaryMutator {
    fn kind(&self) -> MutatorKind {
        MutatorKind::Unary
    }

    fn applies_to(&self, node: &SyntaxNode) -> bool {
        node.kind() == "unary_expression"
    }

    fn mutate(
        &self,
        node: &SyntaxNode,
        _context: &MutationContext,
    ) -> Result<Vec<MutationCandidate>, MutatorError> {
        let (op, operand) = match node.children() {
            [op, operand] => (op, operand),
            _ => {
                return Err(MutatorError::MalformedNode {
                    kind: node.kind(),
                    reason: format!("expected operator and operand, got {} children", node.children().len()),
                });
            }
        };
        let op_text = op.text();
        if op_text != "!" && op_text != "-" {
            return Ok(vec![]);
        }
        Ok(vec![MutationCandidate {
            replacement: operand.clone().in_slot_of(node),
            description: format!("{}: remove `{}`", MutatorKind::Unary.description(), op_text),
        }])
    }
}

/// `true` <-> `false`.
pub struct BooleanMutator;

impl Mutator for BooleanMutator {
    fn kind(&self) -> MutatorKind {
        MutatorKind::Boolean
    }

    fn applies_to(&self, node: &SyntaxNode) -> bool {
        node.kind() == "boolean_literal"
    }

    fn mutate(
        &self,
        node: &SyntaxNode,
        _context: &MutationContext,
    ) -> Result<Vec<MutationCandidate>, MutatorError> {
        let text = node.text();
        let replacement = match text.as_str() {
            "true" => "false",
            "false" => "true",
            other => {
                return Err(MutatorError::MalformedNode {
                    kind: node.kind(),
                    reason: format!("unexpected literal `{other}`"),
                });
            }
        };
        Ok(vec![MutationCandidate {
            replacement: SyntaxNode::leaf("boolean_literal", replacement, node.span()).in_slot_of(node),
            description: format!("{}: `{}` -> `{}`", MutatorKind::Boolean.description(), text, replacement),
        }])
    }
}

pub const STRING_FILLER: &str = "\"mutorch_xx\"";

/// Non-empty string literals become `""`, empty ones a filler.
pub struct StringMutator;

impl Mutator for StringMutator {
    fn kind(&self) -> MutatorKind {
        MutatorKind::String
    }

    fn applies_to(&self, node: &SyntaxNode) -> bool {
        // Byte strings and C strings carry a prefix; their types differ.
        node.kind() == "string_literal" && node.text().starts_with('"')
    }

    fn mutate(
        &self,
        node: &SyntaxNode,
        _context: &MutationContext,
    ) -> Result<Vec<MutationCandidate>, MutatorError> {
        let text = node.text();
        let replacement = if text == "\"\"" { STRING_FILLER } else { "\"\"" };
        Ok(vec![MutationCandidate {
            replacement: SyntaxNode::leaf("string_literal", replacement, node.span()).in_slot_of(node),
            description: format!("{}: `{}` -> `{}`", MutatorKind::String.description(), text, replacement),
        }])
    }
}

/// Empties the body of an `if` that has no `else`.
pub struct BlockMutator;

impl Mutator for BlockMutator {
    fn kind(&self) -> MutatorKind {
        MutatorKind::Block
    }

    fn applies_to(&self, node: &SyntaxNode) -> bool {
        node.kind() == "if_expression" && node.child_by_field("alternative").is_none()
    }

    fn mutate(
        &self,
        node: &SyntaxNode,
        _context: &MutationContext,
    ) -> Result<Vec<MutationCandidate>, MutatorError> {
        let index = node
            .children()
            .iter()
            .position(|c| c.field() == Some("consequence"))
            .ok_or_else(|| MutatorError::MalformedNode {
                kind: node.kind(),
                reason: "no consequence block".to_string(),
            })?;
        let consequence = &node.children()[index];
        let body: String = consequence.text().chars().filter(|c| !c.is_whitespace()).collect();
        if body == "{}" {
            return Ok(vec![]);
        }
        Ok(vec![MutationCandidate {
            replacement: node
                .clone()
                .with_child(index, SyntaxNode::leaf("block", "{}", consequence.span())),
            description: MutatorKind::Block.description().to_string(),
        }])
    }
}

/// Enabled operators, in the order they are tried on each node.
pub struct MutatorRegistry {
    mutators: Vec<Box<dyn Mutator>>,
}

impl MutatorRegistry {
    /// Every built-in operator except the excluded kinds.
    pub fn from_excluded(excluded: &BTreeSet<MutatorKind>) -> Self {
        let mut registry = MutatorRegistry { mutators: Vec::new() };
        for kind in MutatorKind::ALL {
            if excluded.contains(&kind) {
                continue;
            }
            let mutator: Box<dyn Mutator> = match kind {
                MutatorKind::Arithmetic => Box::new(OperatorSwapMutator::arithmetic()),
                MutatorKind::Equality => Box::new(OperatorSwapMutator::equality()),
                MutatorKind::Logical => Box::new(OperatorSwapMutator::logical()),
                MutatorKind::Bitwise => Box::new(OperatorSwapMutator::bitwise()),
                MutatorKind::Assignment => Box::new(OperatorSwapMutator::assignment()),
                MutatorKind::Unary => Box::new(UnaryMutator),
                MutatorKind::Boolean => Box::new(BooleanMutator),
                MutatorKind::String => Box::new(StringMutator),
                MutatorKind::Block => Box::new(BlockMutator),
            };
            registry.mutators.push(mutator);
        }
        registry
    }

    pub fn all() -> Self {
        Self::from_excluded(&BTreeSet::new())
    }

    pub fn empty() -> Self {
        MutatorRegistry { mutators: Vec::new() }
    }

    pub fn with_mutator(mut self, mutator: Box<dyn Mutator>) -> Self {
        self.mutators.push(mutator);
        self
    }

    pub fn applicable<'a>(&'a self, node: &'a SyntaxNode) -> impl Iterator<Item = &'a dyn Mutator> + 'a {
        self.mutators
            .iter()
            .map(|m| m.as_ref())
            .filter(move |m| m.applies_to(node))
    }

    pub fn kinds(&self) -> Vec<MutatorKind> {
        self.mutators.iter().map(|m| m.kind()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.mutators.is_empty()
    }
}
