use mutorch::{MutantId, MutationContext};

#[test]
fn root_context_is_clean() {
    let ctx = MutationContext::root(true);
    assert!(ctx.coverage_injection_enabled());
    assert!(!ctx.in_static_scope());
    assert!(!ctx.mutations_forbidden());
    assert_eq!(ctx.enclosing_mutant_id(), None);

    assert!(!MutationContext::root(false).coverage_injection_enabled());
}

#[test]
fn enter_static_leaves_receiver_untouched() {
    let outer = MutationContext::root(true);
    let inner = outer.enter_static();
    assert!(inner.in_static_scope());
    assert!(inner.coverage_injection_enabled());
    assert!(!outer.in_static_scope());
}

#[test]
fn within_mutant_replaces_enclosing_id() {
    let ctx = MutationContext::root(false).within_mutant(MutantId(3));
    assert_eq!(ctx.enclosing_mutant_id(), Some(MutantId(3)));
    let nested = ctx.within_mutant(MutantId(7));
    assert_eq!(nested.enclosing_mutant_id(), Some(MutantId(7)));
    assert_eq!(ctx.enclosing_mutant_id(), Some(MutantId(3)));
}

#[test]
fn derivations_compose() {
    let ctx = MutationContext::root(true)
        .enter_static()
        .forbid_mutations()
        .within_mutant(MutantId(1));
    assert!(ctx.in_static_scope());
    assert!(ctx.mutations_forbidden());
    assert!(ctx.coverage_injection_enabled());
    assert_eq!(ctx.enclosing_mutant_id(), Some(MutantId(1)));
}
