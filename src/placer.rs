//! Places mutants into the tree behind guards.
//!
//! Runtime guards call into the control module returned by
//! [`control_module_source`]; const-evaluated scopes get a `cfg!` switch
//! instead. With no mutant selected every guard is false and only the
//! original branch runs.

use crate::context::MutationContext;
use crate::mutants::MutantId;
use crate::syntax::SyntaxNode;

/// Module the runtime guards call into; must be declared at the crate root.
pub const CONTROL_MODULE: &str = "__mutorch_control";
/// File name the control module is written under.
pub const CONTROL_MODULE_FILE: &str = "__mutorch_control.rs";
/// `--cfg` key selecting a mutant in const-evaluated scopes.
pub const STATIC_CFG_KEY: &str = "mutorch_mutant";
/// Lints a dormant mutant can trip at compile time (a `128` literal once the
/// `-` of `-128i8` is removed, `200u8 * 2` after swapping `/`). Every file that
/// received mutants starts with this allowance so the schema keeps compiling.
pub const SCHEMA_LINT_ALLOWANCE: &str = "#![allow(overflowing_literals, arithmetic_overflow, unconditional_panic, unused_parens, unused_braces, unreachable_code, unexpected_cfgs)]\n";
pub const ACTIVE_MUTANT_ENV: &str = "MUTORCH_ACTIVE_MUTANT";
pub const COVERAGE_FILE_ENV: &str = "MUTORCH_COVERAGE_FILE";

/// A recorded mutant waiting to be woven into its parent.
#[derive(Debug, Clone)]
pub struct PlannedMutant {
    pub id: MutantId,
    pub replacement: SyntaxNode,
}

pub fn guard(id: MutantId, context: &MutationContext) -> String {
    if context.in_static_scope() {
        format!("cfg!({STATIC_CFG_KEY} = \"{id}\")")
    } else if context.coverage_injection_enabled() {
        format!("crate::{CONTROL_MODULE}::hit({id})")
    } else {
        format!("crate::{CONTROL_MODULE}::is_active({id})")
    }
}

/// Nest `if guard { mutant } else { ... }` around `original`, first mutant
/// outermost. Non block-like expressions get parentheses so the result is
/// valid in any expression position.
pub fn place(
    original: SyntaxNode,
    mutants: Vec<PlannedMutant>,
    context: &MutationContext,
    parenthesize: bool,
) -> SyntaxNode {
    if mutants.is_empty() {
        return original;
    }
    let slot = original.clone();
    let span = original.span();
    let mut placed = original;
    for mutant in mutants.into_iter().rev() {
        let guard = SyntaxNode::leaf("mutant_guard", guard(mutant.id, context), span);
        placed = SyntaxNode::composite(
            "mutant_switch",
            span,
            vec![guard, mutant.replacement, placed],
            vec![
                "if ".to_string(),
                " { ".to_string(),
                " } else { ".to_string(),
                " }".to_string(),
            ],
        );
    }
    if parenthesize {
        placed = SyntaxNode::composite(
            "parenthesized_expression",
            span,
            vec![placed],
            vec!["(".to_string(), ")".to_string()],
        );
    }
    placed.in_slot_of(&slot)
}

/// `schema` with [`SCHEMA_LINT_ALLOWANCE`] in front, after a shebang line if
/// there is one.
pub fn with_lint_allowance(schema: &str) -> String {
    let split = if schema.starts_with("#!") && !schema.starts_with("#![") {
        schema.find('\n').map(|i| i + 1).unwrap_or(schema.len())
    } else {
        0
    };
    let (shebang, rest) = schema.split_at(split);
    let mut out = String::with_capacity(schema.len() + SCHEMA_LINT_ALLOWANCE.len() + 1);
    out.push_str(shebang);
    if !shebang.is_empty() && !shebang.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(SCHEMA_LINT_ALLOWANCE);
    out.push_str(rest);
    out
}

/// Source of the runtime control module the guards call.
pub fn control_module_source() -> String {
    format!(
        r#"//! Mutant switches. Generated by mutorch; do not edit.
#![allow(dead_code)]

use std::collections::HashSet;
use std::io::Write;
use std::sync::{{Mutex, OnceLock}};

static ACTIVE: OnceLock<Option<u32>> = OnceLock::new();
static SEEN: OnceLock<Mutex<HashSet<(String, u32)>>> = OnceLock::new();

fn active() -> Option<u32> {{
    *ACTIVE.get_or_init(|| {{
        std::env::var("{ACTIVE_MUTANT_ENV}")
            .ok()
            .and_then(|v| v.trim().parse().ok())
    }})
}}

/// Whether mutant `id` is selected for this process.
pub fn is_active(id: u32) -> bool {{
    active() == Some(id)
}}

/// Record that the running test reached mutant `id`, then switch on it.
pub fn hit(id: u32) -> bool {{
    record(id);
    is_active(id)
}}

fn record(id: u32) {{
    let Ok(path) = std::env::var("{COVERAGE_FILE_ENV}") else {{
        return;
    }};
    let test = std::thread::current()
        .name()
        .unwrap_or("main")
        .to_string();
    let seen = SEEN.get_or_init(|| Mutex::new(HashSet::new()));
    let Ok(mut seen) = seen.lock() else {{
        return;
    }};
    if !seen.insert((test.clone(), id)) {{
        return;
    }}
    if let Ok(mut file) = std::fs::OpenOptions::new().create(true).append(true).open(path) {{
        let _ = writeln!(file, "{{}}\t{{}}", test, id);
    }}
}}
"#
    )
}
