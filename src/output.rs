use console::Style;
use crate::coverage::TestSelection;
use crate::mutants::{Mutant, MutantStatus};
use crate::mutators::MutatorKind;
use crate::state::RunState;

pub fn print_error(msg: &str) {
    let style = Style::new().red().bold();
    eprintln!("{} {}", style.apply_to("✗"), msg);
}

pub fn print_success(msg: &str) {
    let style = Style::new().green().bold();
    println!("{} {}", style.apply_to("✓"), msg);
}

fn status_style(status: MutantStatus) -> Style {
    match status {
        MutantStatus::Killed => Style::new().green(),
        MutantStatus::Survived => Style::new().red().bold(),
        MutantStatus::NoCoverage => Style::new().yellow(),
        MutantStatus::Timeout | MutantStatus::CompileError => Style::new().dim(),
        MutantStatus::NotRun => Style::new(),
    }
}

pub fn print_batch(file: &str, mutants: &[Mutant]) {
    if mutants.is_empty() {
        let dim = Style::new().dim();
        println!("{} {}: no mutants", dim.apply_to("·"), file);
        return;
    }

    let style = Style::new().bold();
    let statics = mutants.iter().filter(|m| m.is_static()).count();
    println!(
        "{} {}: {} mutants ({} static)",
        style.apply_to("•"),
        file,
        mutants.len(),
        statics,
    );
    for m in mutants {
        print_mutant_line(m);
    }
}

fn print_mutant_line(m: &Mutant) {
    let id_style = Style::new().cyan().bold();
    let loc_style = Style::new().dim();
    let op_style = Style::new().magenta();

    println!(
        "  {} {}:{} {} {} → {} {}",
        id_style.apply_to(format!("#{}", m.id)),
        m.location.line,
        m.location.column,
        loc_style.apply_to(format!("[{}]", m.mutator)),
        op_style.apply_to(one_line(&m.original)),
        op_style.apply_to(one_line(&m.replacement)),
        status_style(m.status).apply_to(format!("({})", m.status)),
    );
}

fn one_line(text: &str) -> String {
    let flat: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() > 40 {
        let cut: String = flat.chars().take(37).collect();
        format!("{cut}...")
    } else {
        flat
    }
}

pub fn print_mutant_detail(m: &Mutant, diff: Option<&str>) {
    let id_style = Style::new().cyan().bold();
    let dim = Style::new().dim();

    println!(
        "{} {} [{}] {}",
        id_style.apply_to(format!("#{}", m.id)),
        m.location,
        m.mutator,
        status_style(m.status).apply_to(m.status.to_string()),
    );
    println!("  {}", m.description);
    if m.is_static() {
        println!("  {}", dim.apply_to("static scope: selected at compile time, runs against all tests"));
    }
    if let Some(enclosing) = m.context.enclosing_mutant_id() {
        println!("  {}", dim.apply_to(format!("nested inside #{enclosing}")));
    }
    if let Some(reason) = &m.status_reason {
        println!("  {}", dim.apply_to(reason));
    }
    println!();

    match diff {
        Some(diff) => {
            for line in diff.lines() {
                if line.starts_with('-') {
                    let del_style = Style::new().red();
                    println!("  {}", del_style.apply_to(line));
                } else if line.starts_with('+') {
                    let add_style = Style::new().green();
                    println!("  {}", add_style.apply_to(line));
                }
            }
        }
        None => {
            println!("  - {}", m.original);
            println!("  + {}", m.replacement);
        }
    }
}

pub fn print_status(state: &RunState) {
    let count = |status: MutantStatus| state.mutants().filter(|m| m.status == status).count();

    println!(
        "Last run: {} mutants in {} files (optimization mode {})",
        state.total(),
        state.files.len(),
        state.optimization_mode,
    );
    println!(
        "  {} not run, {} killed, {} survived, {} timeout, {} no coverage, {} compile error",
        count(MutantStatus::NotRun),
        count(MutantStatus::Killed),
        count(MutantStatus::Survived),
        count(MutantStatus::Timeout),
        count(MutantStatus::NoCoverage),
        count(MutantStatus::CompileError),
    );
    if let Some(dir) = &state.output_dir {
        println!("  mutated sources in {dir}");
    }
    println!();
    println!("Use `mutorch show <id>` for details on a specific mutant.");
}

pub fn print_selection(m: &Mutant, selection: &TestSelection) {
    let id_style = Style::new().cyan().bold();
    let text = match selection {
        TestSelection::AllTests => "all tests".to_string(),
        TestSelection::NoTests => "no covering test".to_string(),
        TestSelection::Covering(tests) => format!("{} covering: {}", tests.len(), tests.join(", ")),
    };
    println!("  {} {}", id_style.apply_to(format!("#{}", m.id)), text);
}

pub fn print_mutators(enabled: &[MutatorKind]) {
    for kind in MutatorKind::ALL {
        let marker = if enabled.contains(&kind) {
            Style::new().green().apply_to("✓")
        } else {
            Style::new().dim().apply_to("·")
        };
        println!("{} {:<11} {}", marker, kind.name(), kind.description());
    }
}

/// Line diff between the original source and one mutant applied to it.
pub fn generate_diff(original: &str, mutated: &str) -> String {
    use similar::TextDiff;
    let diff = TextDiff::from_lines(original, mutated);
    let mut output = String::new();
    for change in diff.iter_all_changes() {
        match change.tag() {
            similar::ChangeTag::Delete => {
                output.push_str(&format!("- {}", change));
            }
            similar::ChangeTag::Insert => {
                output.push_str(&format!("+ {}", change));
            }
            _ => {}
        }
    }
    output
}
