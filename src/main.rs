use exeval::backfill;
use exeval::battery::Battery;
use exeval::config::{EvalConfig, Mutator};
use exeval::coverage;
use exeval::error::EvalError;
use exeval::executor::{ExecutionController, ProcessRunner};
use exeval::minimize::{self, Algorithm};
use exeval::output;
use exeval::registry;
use exeval::stage::Checkout;
use exeval::state;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process;
use std::str::FromStr;
use std::time::{Duration, Instant};

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "exeval", version, about = "Mutation-based evaluation of generated inline tests")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct CommonArgs {
    /// Root of the evaluation data layout
    #[arg(long, default_value = "exeval-data", env = "EXEVAL_DATA_DIR")]
    data_dir: PathBuf,
    /// Mutant generation tool whose registry to evaluate
    #[arg(long, default_value = "universalmutator")]
    mutator: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply each mutant and run test batteries against it
    RunMutants {
        #[command(flatten)]
        common: CommonArgs,
        /// Project name
        #[arg(short, long)]
        project: String,
        /// Commit sha of the checkout
        #[arg(short, long)]
        sha: String,
        /// Batteries to run (default: all, inline first)
        #[arg(short, long)]
        battery: Vec<String>,
        /// Wall-clock budget per mutant attempt, in seconds
        #[arg(long, default_value = "600")]
        timeout: u64,
        /// Command that resets the checkout to its pristine revision
        #[arg(long)]
        reset_cmd: Option<String>,
    },
    /// Build the killed-mutants index from inline battery reports
    KilledMutants {
        #[command(flatten)]
        common: CommonArgs,
        #[arg(short, long)]
        project: String,
        #[arg(short, long)]
        sha: String,
    },
    /// Back-fill baseline killers and minimize the merged test set
    Minimize {
        #[command(flatten)]
        common: CommonArgs,
        #[arg(short, long)]
        project: String,
        #[arg(short, long)]
        sha: String,
        /// Run a single algorithm instead of all of them
        #[arg(short, long)]
        algorithm: Option<String>,
    },
    /// Produce the final selected suite (aggregate, back-fill, minimize)
    R2 {
        #[command(flatten)]
        common: CommonArgs,
        #[arg(short, long)]
        project: String,
        #[arg(short, long)]
        sha: String,
        #[arg(short, long, default_value = "greedy")]
        algorithm: String,
    },
    /// Run the mutant pipeline across every project in the list file
    Batch {
        #[command(flatten)]
        common: CommonArgs,
        /// Restrict to one project
        #[arg(long)]
        project: Option<String>,
        #[arg(short, long)]
        battery: Vec<String>,
        #[arg(long, default_value = "600")]
        timeout: u64,
        #[arg(long)]
        reset_cmd: Option<String>,
    },
    /// Summary of last run
    Status {
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let exit_code = match cli.command {
        Commands::RunMutants {
            common,
            project,
            sha,
            battery,
            timeout,
            reset_cmd,
        } => cmd_run_mutants(common, &project, &sha, &battery, timeout, reset_cmd),
        Commands::KilledMutants {
            common,
            project,
            sha,
        } => cmd_killed_mutants(common, &project, &sha),
        Commands::Minimize {
            common,
            project,
            sha,
            algorithm,
        } => cmd_minimize(common, &project, &sha, algorithm.as_deref()),
        Commands::R2 {
            common,
            project,
            sha,
            algorithm,
        } => cmd_r2(common, &project, &sha, &algorithm),
        Commands::Batch {
            common,
            project,
            battery,
            timeout,
            reset_cmd,
        } => cmd_batch(common, project.as_deref(), &battery, timeout, reset_cmd),
        Commands::Status { json } => cmd_status(json),
    };

    process::exit(exit_code);
}

fn build_config(common: &CommonArgs, timeout: Option<u64>) -> Result<EvalConfig, i32> {
    let mutator = match Mutator::from_str(&common.mutator) {
        Ok(m) => m,
        Err(e) => {
            output::print_error(&e.to_string());
            return Err(2);
        }
    };
    let mut config = EvalConfig::new(&common.data_dir).with_mutator(mutator);
    if let Some(secs) = timeout {
        config = config.with_timeout(Duration::from_secs(secs));
    }
    Ok(config)
}

fn parse_batteries(args: &[String]) -> Result<Vec<Battery>, i32> {
    if args.is_empty() {
        // Inline batteries run first so compilation failures are
        // established before any unit battery looks at the registry.
        return Ok(Battery::ALL.to_vec());
    }
    let mut batteries = Vec::new();
    for arg in args {
        match Battery::from_str(arg) {
            Ok(battery) => batteries.push(battery),
            Err(e) => {
                output::print_error(&e.to_string());
                return Err(2);
            }
        }
    }
    Ok(batteries)
}

fn cmd_run_mutants(
    common: CommonArgs,
    project: &str,
    sha: &str,
    battery_args: &[String],
    timeout: u64,
    reset_cmd: Option<String>,
) -> i32 {
    let config = match build_config(&common, Some(timeout)) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let batteries = match parse_batteries(battery_args) {
        Ok(b) => b,
        Err(code) => return code,
    };

    match run_mutants(&config, project, sha, &batteries, reset_cmd) {
        Ok(()) => 0,
        Err(EvalError::MissingRegistry { project }) => {
            output::print_error(&format!("no mutants for {project}"));
            2
        }
        Err(e) => {
            output::print_error(&e.to_string());
            3
        }
    }
}

fn run_mutants(
    config: &EvalConfig,
    project: &str,
    sha: &str,
    batteries: &[Battery],
    reset_cmd: Option<String>,
) -> Result<(), EvalError> {
    let mut mutants = registry::load_mutants(config, project, sha)?;
    if mutants.is_empty() {
        output::print_skip(&format!("no mutants for {project}"));
        return Ok(());
    }

    let checkout = Checkout::new(config.checkout_dir(project), reset_cmd);
    let runner = ProcessRunner::new(config);
    let controller = ExecutionController::new(config, &runner);

    let mut battery_runs = Vec::new();
    for &battery in batteries {
        let summary = controller.run_battery(project, sha, battery, &mut mutants, &checkout)?;
        if Battery::INLINE.contains(&battery) {
            // Persist compilation_failure flags: the exclusion is
            // permanent for the whole project run.
            registry::save_mutants(config, project, sha, &mutants)?;
        }
        output::print_battery_summary(project, battery, &summary);
        battery_runs.push(state::BatteryRun::from_summary(battery, &summary));
    }

    state::save_last_run(&state::RunState {
        project: project.to_string(),
        sha: sha.to_string(),
        mutator: config.mutator.to_string(),
        batteries: battery_runs,
    });
    Ok(())
}

fn cmd_killed_mutants(common: CommonArgs, project: &str, sha: &str) -> i32 {
    let config = match build_config(&common, None) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let mutants = match registry::load_mutants(&config, project, sha) {
        Ok(m) => m,
        Err(EvalError::MissingRegistry { .. }) => {
            output::print_error(&format!("no mutants for {project}"));
            return 2;
        }
        Err(e) => {
            output::print_error(&e.to_string());
            return 3;
        }
    };

    for battery in Battery::INLINE {
        match coverage::build_killed_index(&config, project, sha, battery, &mutants) {
            Ok(entries) => output::print_success(&format!(
                "{project} {battery}: {} killed-mutant entries",
                entries.len()
            )),
            Err(e) => {
                output::print_error(&e.to_string());
                return 3;
            }
        }
    }
    0
}

fn cmd_minimize(common: CommonArgs, project: &str, sha: &str, algorithm: Option<&str>) -> i32 {
    let config = match build_config(&common, None) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let algorithms = match algorithm {
        None => Algorithm::ALL.to_vec(),
        Some(name) => match Algorithm::from_str(name) {
            Ok(algo) => vec![algo],
            Err(e) => {
                output::print_error(&e.to_string());
                return 2;
            }
        },
    };

    let merged = match backfill::merge_with_baseline_killers(&config, project, sha) {
        Ok(merged) => merged,
        Err(e) => {
            output::print_error(&e.to_string());
            return 3;
        }
    };

    for algo in algorithms {
        let selected = minimize::minimize(&merged, algo, &BTreeMap::new());
        let lines = minimize::selection_to_lines(&merged, &selected);
        let path = config.minimized_file(project, sha, algo.name());
        if let Err(e) = registry::write_lines(&path, &lines) {
            output::print_error(&e.to_string());
            return 3;
        }
        output::print_success(&format!(
            "{project} {algo}: {} of {} tests keep full kill coverage",
            selected.len(),
            merged.len()
        ));
    }
    0
}

fn cmd_r2(common: CommonArgs, project: &str, sha: &str, algorithm: &str) -> i32 {
    let config = match build_config(&common, None) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let algo = match Algorithm::from_str(algorithm) {
        Ok(a) => a,
        Err(e) => {
            output::print_error(&e.to_string());
            return 2;
        }
    };

    match produce_final_suite(&config, project, sha, algo) {
        Ok(suite) => {
            output::print_success(&format!(
                "{project}: {} tests in final selected suite",
                suite.len()
            ));
            0
        }
        Err(EvalError::MissingRegistry { .. }) => {
            output::print_error(&format!("no mutants for {project}"));
            2
        }
        Err(e) => {
            output::print_error(&e.to_string());
            3
        }
    }
}

fn produce_final_suite(
    config: &EvalConfig,
    project: &str,
    sha: &str,
    algo: Algorithm,
) -> Result<Vec<String>, EvalError> {
    let mutants = registry::load_mutants(config, project, sha)?;
    for battery in Battery::INLINE {
        coverage::build_killed_index(config, project, sha, battery, &mutants)?;
    }
    let merged = backfill::merge_with_baseline_killers(config, project, sha)?;
    let selected = minimize::minimize(&merged, algo, &BTreeMap::new());
    let lines = minimize::selection_to_lines(&merged, &selected);
    registry::write_lines(&config.minimized_file(project, sha, algo.name()), &lines)?;
    backfill::collect_final_suite(config, project, sha, algo.name())
}

fn cmd_batch(
    common: CommonArgs,
    only_project: Option<&str>,
    battery_args: &[String],
    timeout: u64,
    reset_cmd: Option<String>,
) -> i32 {
    let config = match build_config(&common, Some(timeout)) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let batteries = match parse_batteries(battery_args) {
        Ok(b) => b,
        Err(code) => return code,
    };

    let projects = match registry::load_project_list(&config) {
        Ok(p) => p,
        Err(e) => {
            output::print_error(&format!(
                "cannot read project list {}: {e}",
                config.projects_file.display()
            ));
            return 2;
        }
    };

    // A resumed batch skips finished projects; their earlier wall times
    // are carried over instead of being dropped.
    let mut times = registry::load_batch_times(&config);
    for (project, sha) in projects {
        if let Some(only) = only_project {
            if project != only {
                continue;
            }
        }
        // Resumable at project granularity: a project whose output
        // files already exist is skipped.
        if batteries
            .iter()
            .all(|&b| config.eval_results_file(&project, &sha, b).exists())
        {
            output::print_skip(&format!("{project}: results exist, skipping"));
            continue;
        }

        let started = Instant::now();
        match run_mutants(&config, &project, &sha, &batteries, reset_cmd.clone()) {
            Ok(()) => {}
            Err(e) => {
                // Project-level failures skip the project; the batch
                // proceeds.
                output::print_error(&format!("{project}: {e}"));
            }
        }
        times.insert(format!("{project}-time"), started.elapsed().as_secs_f64());
    }

    if let Err(e) = registry::save_batch_times(&config, &times) {
        output::print_error(&format!(
            "cannot write {}: {e}",
            config.batch_times_file().display()
        ));
        return 3;
    }
    0
}

fn cmd_status(json_mode: bool) -> i32 {
    match state::load_last_run() {
        Some(result) => {
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
        None => {
            output::print_error("No previous run found. Run `exeval run-mutants` first.");
            2
        }
    }
}
