use mutorch::coverage::CoverageMap;
use mutorch::options::{ConfigError, OptimizationPolicy, Options, ValidatedOptions, DEFAULT_CONFIG_FILE};
use mutorch::output;
use mutorch::placer;
use mutorch::state::{self, FileBatch, RunState};
use mutorch::{MutantId, OrchestrationEngine};

use std::path::{Path, PathBuf};
use std::process;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "mutorch", version, about = "Mutant schemata and coverage guards for Rust sources")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ConfigArgs {
    /// Config file (default: mutorch-config.json when present)
    #[arg(long, env = "MUTORCH_CONFIG")]
    config: Option<PathBuf>,
    /// off, all, perTest (default) or perTestInIsolation
    #[arg(long)]
    optimization_mode: Option<String>,
    /// Mutator to exclude (repeatable), e.g. string, block
    #[arg(long = "exclude-mutation", value_name = "NAME")]
    exclude_mutation: Vec<String>,
    /// Parallelism hint for the test runner
    #[arg(long)]
    concurrency: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Rewrite source files into mutant schemata
    Mutate {
        /// Rust source files to mutate
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Output directory (default: .mutorch/<session>)
        #[arg(short, long)]
        out: Option<PathBuf>,
        #[command(flatten)]
        config: ConfigArgs,
        /// Output JSON instead of human-readable text
        #[arg(long)]
        json: bool,
        /// Exit code only, no output
        #[arg(short, long)]
        quiet: bool,
    },
    /// List the mutants of source files without writing anything
    List {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[command(flatten)]
        config: ConfigArgs,
        #[arg(long)]
        json: bool,
    },
    /// Show one mutant from the last run
    Show {
        /// Mutant id (e.g. 3 or #3)
        id: String,
        #[arg(long)]
        json: bool,
    },
    /// Summary of the last run
    Status {
        #[arg(long)]
        json: bool,
    },
    /// Apply a coverage log to the last run
    Coverage {
        /// File written through MUTORCH_COVERAGE_FILE
        log: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// List mutators and whether the configuration enables them
    Mutators {
        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Write a config file from the selected options and their defaults
    Init {
        /// Where to write it (default: mutorch-config.json)
        path: Option<PathBuf>,
        #[command(flatten)]
        config: ConfigArgs,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let exit_code = match cli.command {
        Commands::Mutate {
            files,
            out,
            config,
            json,
            quiet,
        } => cmd_mutate(files, out, config, json, quiet),
        Commands::List { files, config, json } => cmd_list(files, config, json),
        Commands::Show { id, json } => cmd_show(id, json),
        Commands::Status { json } => cmd_status(json),
        Commands::Coverage { log, json } => cmd_coverage(log, json),
        Commands::Mutators { config } => cmd_mutators(config),
        Commands::Init { path, config } => cmd_init(path, config),
    };

    process::exit(exit_code);
}

fn generate_session_id() -> String {
    format!("{:08x}", fastrand::u32(..))
}

fn resolve_options(args: &ConfigArgs) -> Result<ValidatedOptions, ConfigError> {
    let file = Options::discover(args.config.as_deref())?;
    let cli = Options {
        optimization_mode: args.optimization_mode.clone(),
        excluded_mutations: args.exclude_mutation.clone(),
        concurrency: args.concurrency,
    };
    file.merge(cli).validate()
}

struct Orchestrated {
    file: PathBuf,
    mutated: String,
    batch: FileBatch,
}

/// Validate options, read every file, then orchestrate them in order with one
/// engine. Any failure aborts before anything is written.
fn orchestrate_files(files: &[PathBuf], args: &ConfigArgs) -> Result<(ValidatedOptions, Vec<Orchestrated>), i32> {
    let options = resolve_options(args).map_err(|e| {
        output::print_error(&e.to_string());
        2
    })?;

    let mut sources = Vec::with_capacity(files.len());
    for file in files {
        if mutorch::detect_language(file).is_none() {
            output::print_error(&format!(
                "Unsupported file type: {}. Only .rs sources are supported.",
                file.display()
            ));
            return Err(2);
        }
        match std::fs::read_to_string(file) {
            Ok(source) => sources.push(source),
            Err(e) => {
                output::print_error(&format!("Failed to read {}: {}", file.display(), e));
                return Err(2);
            }
        }
    }

    let mut engine = OrchestrationEngine::new(&options);
    let mut results = Vec::with_capacity(files.len());
    for (file, source) in files.iter().zip(&sources) {
        let display = file.display().to_string();
        let mutated = engine.orchestrate_source(&display, source).map_err(|e| {
            output::print_error(&e.to_string());
            3
        })?;
        results.push(Orchestrated {
            file: file.clone(),
            mutated,
            batch: FileBatch {
                file: display,
                mutated_file: None,
                mutants: engine.get_latest_batch(),
            },
        });
    }
    Ok((options, results))
}

fn output_path(out_dir: &Path, file: &Path) -> PathBuf {
    let escapes = file
        .components()
        .any(|c| matches!(c, std::path::Component::ParentDir));
    if file.is_relative() && !escapes {
        out_dir.join(file)
    } else {
        out_dir.join(file.file_name().unwrap_or_default())
    }
}

fn write_outputs(out_dir: &Path, results: &mut [Orchestrated]) -> std::io::Result<()> {
    std::fs::create_dir_all(out_dir)?;
    for result in results.iter_mut() {
        let target = output_path(out_dir, &result.file);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&target, &result.mutated)?;
        result.batch.mutated_file = Some(target.display().to_string());
    }
    std::fs::write(
        out_dir.join(placer::CONTROL_MODULE_FILE),
        placer::control_module_source(),
    )?;
    let batches: Vec<&FileBatch> = results.iter().map(|r| &r.batch).collect();
    let json = serde_json::to_string_pretty(&batches).map_err(std::io::Error::other)?;
    std::fs::write(out_dir.join("mutants.json"), json)
}

fn cmd_mutate(files: Vec<PathBuf>, out: Option<PathBuf>, config: ConfigArgs, json_mode: bool, quiet: bool) -> i32 {
    let (options, mut results) = match orchestrate_files(&files, &config) {
        Ok(r) => r,
        Err(code) => return code,
    };

    let out_dir = out.unwrap_or_else(|| PathBuf::from(".mutorch").join(generate_session_id()));
    if let Err(e) = write_outputs(&out_dir, &mut results) {
        output::print_error(&format!("Failed to write {}: {}", out_dir.display(), e));
        return 3;
    }

    let run_state = RunState {
        optimization_mode: options.policy.mode(),
        concurrency: options.concurrency,
        output_dir: Some(out_dir.display().to_string()),
        files: results.into_iter().map(|r| r.batch).collect(),
    };
    if let Err(e) = state::save_last_run(&run_state) {
        output::print_error(&format!("Failed to save run state: {}", e));
        return 3;
    }

    if quiet {
        return 0;
    }
    if json_mode {
        match serde_json::to_string(&run_state) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                output::print_error(&e.to_string());
                return 3;
            }
        }
    } else {
        for batch in &run_state.files {
            output::print_batch(&batch.file, &batch.mutants);
        }
        output::print_success(&format!(
            "{} mutants written to {}",
            run_state.total(),
            out_dir.display()
        ));
        if !options.policy.must_inject_coverage_logic() {
            let dim = console::Style::new().dim();
            println!("  {}", dim.apply_to("coverage guards not injected for this optimization mode"));
        }
    }
    0
}

fn cmd_list(files: Vec<PathBuf>, config: ConfigArgs, json_mode: bool) -> i32 {
    let (_, results) = match orchestrate_files(&files, &config) {
        Ok(r) => r,
        Err(code) => return code,
    };
    if json_mode {
        let batches: Vec<&FileBatch> = results.iter().map(|r| &r.batch).collect();
        match serde_json::to_string(&batches) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                output::print_error(&e.to_string());
                return 3;
            }
        }
    } else {
        for result in &results {
            output::print_batch(&result.batch.file, &result.batch.mutants);
        }
    }
    0
}

fn load_state_or_report() -> Option<RunState> {
    let loaded = state::load_last_run();
    if loaded.is_none() {
        output::print_error("No previous run found. Run `mutorch mutate` first.");
    }
    loaded
}

fn cmd_show(id: String, json_mode: bool) -> i32 {
    let Ok(id) = id.trim_start_matches('#').parse::<u32>() else {
        output::print_error(&format!("Invalid mutant id: {id}"));
        return 2;
    };

    let Some(last_run) = load_state_or_report() else {
        return 2;
    };

    match last_run.find(MutantId(id)) {
        Some(m) => {
            if json_mode {
                match serde_json::to_string(m) {
                    Ok(json) => println!("{json}"),
                    Err(e) => {
                        output::print_error(&e.to_string());
                        return 3;
                    }
                }
            } else {
                let diff = std::fs::read_to_string(&m.location.file)
                    .ok()
                    .and_then(|source| {
                        m.apply_to(&source)
                            .map(|mutated| output::generate_diff(&source, &mutated))
                    });
                output::print_mutant_detail(m, diff.as_deref());
            }
            0
        }
        None => {
            output::print_error(&format!(
                "Mutant #{} not found. The last run has ids 0..{}",
                id,
                last_run.total()
            ));
            2
        }
    }
}

fn cmd_status(json_mode: bool) -> i32 {
    let Some(result) = load_state_or_report() else {
        return 2;
    };
    if json_mode {
        match serde_json::to_string(&result) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                output::print_error(&e.to_string());
                return 3;
            }
        }
    } else {
        output::print_status(&result);
    }
    0
}

fn cmd_coverage(log: PathBuf, json_mode: bool) -> i32 {
    let Some(mut run_state) = load_state_or_report() else {
        return 2;
    };
    let policy = OptimizationPolicy::new(run_state.optimization_mode);
    let text = match std::fs::read_to_string(&log) {
        Ok(t) => t,
        Err(e) => {
            output::print_error(&format!("Failed to read {}: {}", log.display(), e));
            return 2;
        }
    };
    let coverage = match CoverageMap::parse(&text) {
        Ok(c) => c,
        Err(e) => {
            output::print_error(&format!("{}: {}", log.display(), e));
            return 2;
        }
    };

    let mut marked = 0;
    for batch in run_state.files.iter_mut() {
        marked += coverage.mark_uncovered(&policy, &mut batch.mutants);
    }
    if let Err(e) = state::save_last_run(&run_state) {
        output::print_error(&format!("Failed to save run state: {}", e));
        return 3;
    }

    if json_mode {
        let selections: Vec<serde_json::Value> = run_state
            .mutants()
            .map(|m| {
                let tests = match coverage.select_tests(&policy, m) {
                    mutorch::coverage::TestSelection::AllTests => serde_json::Value::String("all".into()),
                    mutorch::coverage::TestSelection::NoTests => serde_json::Value::Array(vec![]),
                    mutorch::coverage::TestSelection::Covering(tests) => serde_json::json!(tests),
                };
                serde_json::json!({ "id": m.id, "status": m.status, "tests": tests })
            })
            .collect();
        println!("{}", serde_json::Value::Array(selections));
    } else {
        for m in run_state.mutants() {
            output::print_selection(m, &coverage.select_tests(&policy, m));
        }
        output::print_success(&format!(
            "{} tests seen, {} mutants without coverage",
            coverage.tests().count(),
            marked
        ));
    }
    0
}

fn cmd_mutators(config: ConfigArgs) -> i32 {
    let options = match resolve_options(&config) {
        Ok(o) => o,
        Err(e) => {
            output::print_error(&e.to_string());
            return 2;
        }
    };
    let enabled = mutorch::mutators::MutatorRegistry::from_excluded(&options.excluded).kinds();
    output::print_mutators(&enabled);
    0
}

fn cmd_init(path: Option<PathBuf>, config: ConfigArgs) -> i32 {
    let options = match resolve_options(&config) {
        Ok(o) => o,
        Err(e) => {
            output::print_error(&e.to_string());
            return 2;
        }
    };
    let path = path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    if let Err(e) = Options::from(&options).save(&path) {
        output::print_error(&e.to_string());
        return 3;
    }
    output::print_success(&format!("Wrote {}", path.display()));
    0
}
