//! Owned, lossless syntax tree built from a tree-sitter parse.
//!
//! Every node keeps the source text between its children ("gaps"), so an
//! unmodified tree renders back to exactly the text it was parsed from.
//! Leaves have no children and a single gap holding their text.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tree_sitter::{Node, Parser};

#[derive(Debug, Error)]
pub enum SyntaxError {
    #[error("failed to load the Rust grammar: {0}")]
    Grammar(String),
    #[error("could not parse {path}")]
    Unparseable { path: String },
    #[error("{path}:{line}:{column}: source contains a syntax error")]
    Invalid {
        path: String,
        line: usize,
        column: usize,
    },
}

/// Byte range plus 1-based line/column of its start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Span {
    pub start_byte: usize,
    pub end_byte: usize,
    pub line: usize,
    pub column: usize,
}

impl Span {
    fn of(node: &Node) -> Self {
        Span {
            start_byte: node.start_byte(),
            end_byte: node.end_byte(),
            line: node.start_position().row + 1,
            column: node.start_position().column + 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxNode {
    kind: &'static str,
    field: Option<&'static str>,
    span: Span,
    attributes: Vec<String>,
    children: Vec<SyntaxNode>,
    gaps: Vec<String>,
}

impl SyntaxNode {
    /// A childless node rendering as `text`.
    pub fn leaf(kind: &'static str, text: impl Into<String>, span: Span) -> Self {
        SyntaxNode {
            kind,
            field: None,
            span,
            attributes: Vec::new(),
            children: Vec::new(),
            gaps: vec![text.into()],
        }
    }

    /// A node interleaving `gaps` and `children`; `gaps` must hold exactly one
    /// more entry than `children`.
    pub fn composite(
        kind: &'static str,
        span: Span,
        children: Vec<SyntaxNode>,
        gaps: Vec<String>,
    ) -> Self {
        debug_assert_eq!(gaps.len(), children.len() + 1);
        SyntaxNode {
            kind,
            field: None,
            span,
            attributes: Vec::new(),
            children,
            gaps,
        }
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Field name this node occupies in its parent (`left`, `value`, ...).
    pub fn field(&self) -> Option<&'static str> {
        self.field
    }

    pub fn span(&self) -> Span {
        self.span
    }

    /// Outer attributes (`#[...]`) written directly before this node.
    pub fn attributes(&self) -> &[String] {
        &self.attributes
    }

    pub fn children(&self) -> &[SyntaxNode] {
        &self.children
    }

    pub fn child_by_field(&self, field: &str) -> Option<&SyntaxNode> {
        self.children.iter().find(|c| c.field == Some(field))
    }

    /// Keep this node's field slot when it replaces `other` in a parent.
    pub fn in_slot_of(mut self, other: &SyntaxNode) -> Self {
        self.field = other.field;
        self
    }

    /// Replace the child at `index`, keeping its field slot.
    pub fn with_child(mut self, index: usize, child: SyntaxNode) -> Self {
        if let Some(slot) = self.children.get_mut(index) {
            let child = child.in_slot_of(slot);
            *slot = child;
        }
        self
    }

    /// Rebuild this node by transforming each child in order.
    pub fn try_map_children<E>(
        mut self,
        mut f: impl FnMut(SyntaxNode) -> Result<SyntaxNode, E>,
    ) -> Result<SyntaxNode, E> {
        let children = std::mem::take(&mut self.children);
        let mut mapped = Vec::with_capacity(children.len());
        for child in children {
            mapped.push(f(child)?);
        }
        self.children = mapped;
        Ok(self)
    }

    /// Source text of this node.
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.render_into(&mut out);
        out
    }

    pub fn render_into(&self, out: &mut String) {
        for (i, gap) in self.gaps.iter().enumerate() {
            out.push_str(gap);
            if let Some(child) = self.children.get(i) {
                child.render_into(out);
            }
        }
    }

    /// Number of nodes in this subtree, this node included.
    pub fn descendant_count(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(SyntaxNode::descendant_count)
            .sum::<usize>()
    }

    /// First node of `kind` in pre-order.
    pub fn find_first(&self, kind: &str) -> Option<&SyntaxNode> {
        if self.kind == kind {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find_first(kind))
    }

    /// Kinds of all nodes in pre-order.
    pub fn preorder_kinds(&self) -> Vec<&'static str> {
        let mut kinds = Vec::new();
        self.collect_kinds(&mut kinds);
        kinds
    }

    fn collect_kinds(&self, kinds: &mut Vec<&'static str>) {
        kinds.push(self.kind);
        for child in &self.children {
            child.collect_kinds(kinds);
        }
    }
}

/// A parsed source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxTree {
    path: String,
    root: SyntaxNode,
}

impl SyntaxTree {
    pub fn parse(path: impl Into<String>, source: &str) -> Result<Self, SyntaxError> {
        let path = path.into();
        let mut parser = Parser::new();
        let language = tree_sitter_rust::LANGUAGE;
        parser
            .set_language(&language.into())
            .map_err(|e| SyntaxError::Grammar(e.to_string()))?;

        let tree = parser
            .parse(source, None)
            .ok_or_else(|| SyntaxError::Unparseable { path: path.clone() })?;
        let root = tree.root_node();
        if root.has_error() {
            let (line, column) = first_error(root)
                .map(|n| (n.start_position().row + 1, n.start_position().column + 1))
                .unwrap_or((1, 1));
            return Err(SyntaxError::Invalid { path, line, column });
        }

        // The root always covers the whole file, leading and trailing trivia included.
        let root = convert(root, None, source, 0, source.len());
        Ok(SyntaxTree { path, root })
    }

    pub fn from_root(path: impl Into<String>, root: SyntaxNode) -> Self {
        SyntaxTree {
            path: path.into(),
            root,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn root(&self) -> &SyntaxNode {
        &self.root
    }

    pub fn into_parts(self) -> (String, SyntaxNode) {
        (self.path, self.root)
    }

    pub fn render(&self) -> String {
        self.root.text()
    }
}

fn first_error(node: Node) -> Option<Node> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    let mut cursor = node.walk();
    let found = node
        .children(&mut cursor)
        .filter(|c| c.has_error() || c.is_missing())
        .find_map(first_error);
    found
}

fn convert(
    node: Node,
    field: Option<&'static str>,
    source: &str,
    start: usize,
    end: usize,
) -> SyntaxNode {
    let mut span = Span::of(&node);
    span.start_byte = start;
    span.end_byte = end;

    let mut children = Vec::new();
    let mut gaps = Vec::new();
    let mut cursor = node.walk();
    let mut offset = start;
    if cursor.goto_first_child() {
        loop {
            let child = cursor.node();
            gaps.push(source[offset..child.start_byte()].to_string());
            children.push(convert(
                child,
                cursor.field_name(),
                source,
                child.start_byte(),
                child.end_byte(),
            ));
            offset = child.end_byte();
            if !cursor.goto_next_sibling() {
                break;
            }
        }
    }
    gaps.push(source[offset..end].to_string());
    attach_outer_attributes(&mut children);

    SyntaxNode {
        kind: node.kind(),
        field,
        span,
        attributes: Vec::new(),
        children,
        gaps,
    }
}

/// tree-sitter keeps outer attributes as siblings of the item they annotate;
/// copy their text onto that item so predicates can see them.
fn attach_outer_attributes(children: &mut [SyntaxNode]) {
    let mut pending: Vec<String> = Vec::new();
    for child in children.iter_mut() {
        match child.kind {
            "attribute_item" => pending.push(child.text()),
            "line_comment" | "block_comment" => {}
            _ => child.attributes = std::mem::take(&mut pending),
        }
    }
}
