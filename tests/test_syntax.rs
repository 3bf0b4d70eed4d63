use mutorch::syntax::{SyntaxError, SyntaxTree};

const SOURCE: &str = r#"// leading comment
fn add(a: i32, b: i32) -> i32 {
    a + b   // trailing
}

#[cfg(test)]
mod tests {
    #[test]
    fn it_adds() { assert_eq!(super::add(1, 2), 3); }
}
"#;

#[test]
fn render_reproduces_source_exactly() {
    let tree = SyntaxTree::parse("lib.rs", SOURCE).unwrap();
    assert_eq!(tree.render(), SOURCE);
    assert_eq!(tree.path(), "lib.rs");
}

#[test]
fn invalid_source_is_rejected_with_location() {
    let err = SyntaxTree::parse("broken.rs", "fn f( {\n").unwrap_err();
    match err {
        SyntaxError::Invalid { path, line, column } => {
            assert_eq!(path, "broken.rs");
            assert!(line >= 1 && column >= 1);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn empty_source_parses() {
    let tree = SyntaxTree::parse("empty.rs", "").unwrap();
    assert_eq!(tree.render(), "");
    assert_eq!(tree.root().kind(), "source_file");
}

#[test]
fn binary_expression_carries_fields() {
    let tree = SyntaxTree::parse("lib.rs", SOURCE).unwrap();
    let binary = tree.root().find_first("binary_expression").unwrap();
    assert_eq!(binary.child_by_field("left").unwrap().text(), "a");
    assert_eq!(binary.child_by_field("operator").unwrap().text(), "+");
    assert_eq!(binary.child_by_field("right").unwrap().text(), "b");
}

#[test]
fn spans_are_one_based() {
    let tree = SyntaxTree::parse("lib.rs", SOURCE).unwrap();
    let binary = tree.root().find_first("binary_expression").unwrap();
    assert_eq!(binary.span().line, 3);
    assert_eq!(binary.span().column, 5);
    assert_eq!(&SOURCE[binary.span().start_byte..binary.span().end_byte], "a + b");
}

#[test]
fn attributes_attach_to_annotated_item() {
    let tree = SyntaxTree::parse("lib.rs", SOURCE).unwrap();
    let module = tree.root().find_first("mod_item").unwrap();
    assert_eq!(module.attributes(), ["#[cfg(test)]".to_string()]);

    let add = tree.root().find_first("function_item").unwrap();
    assert!(add.attributes().is_empty());
}

#[test]
fn preorder_starts_at_root_and_visits_every_node() {
    let tree = SyntaxTree::parse("lib.rs", "fn f() { 1 + 2; }").unwrap();
    let kinds = tree.root().preorder_kinds();
    assert_eq!(kinds[0], "source_file");
    assert_eq!(kinds[1], "function_item");
    assert_eq!(kinds.len(), tree.root().descendant_count());
    assert!(kinds.contains(&"binary_expression"));
}
