use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use crate::battery::{Battery, BatteryKind};
use crate::config::EvalConfig;
use crate::error::EvalError;
use crate::patch::{self, PatchResult};
use crate::registry::{self, Mutant, MutantRecord};
use crate::report;
use crate::stage::{self, Checkout, StagedArtifact};

/// Terminal classification of one (mutant, battery) attempt. All
/// states are final; there is no retry.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    Killed,
    Survived,
    /// The mutated tree does not compile. Not an error: a permanent
    /// classification, persisted into the registry when the mutation
    /// alone is at fault.
    CompilationFailure,
    Timeout { elapsed_secs: f64 },
    RuntimeError { message: String },
    /// Content matching failed to locate the original statement in the
    /// battery's artifact. The pair is skipped; nothing executes.
    PatchNotFound,
}

/// Result of one external process run.
#[derive(Debug, Clone, PartialEq)]
pub enum RunStatus {
    Exited { code: i32, compile_failed: bool },
    TimedOut,
}

#[derive(Debug)]
pub struct ProcessRun {
    pub status: RunStatus,
    pub stdout: String,
    pub stderr: String,
}

/// Spawn a command and poll it against a hard deadline. On expiry the
/// child is forcibly killed and reaped before returning, so a hung test
/// run cannot accumulate across thousands of mutants. The boundary is
/// inclusive: finishing exactly at the deadline still counts as timeout.
pub fn run_with_deadline(cmd: &mut Command, deadline: Instant) -> io::Result<ProcessRun> {
    let mut child = cmd.stdout(Stdio::piped()).stderr(Stdio::piped()).spawn()?;
    loop {
        match child.try_wait()? {
            Some(exit_status) => {
                // Inclusive boundary: an exit first observed at or past
                // the deadline is a timeout, not a result.
                if Instant::now() >= deadline {
                    return Ok(ProcessRun {
                        status: RunStatus::TimedOut,
                        stdout: String::new(),
                        stderr: String::new(),
                    });
                }
                let stdout = read_pipe(child.stdout.take());
                let stderr = read_pipe(child.stderr.take());
                let compile_failed = is_compile_failure(&stdout) || is_compile_failure(&stderr);
                return Ok(ProcessRun {
                    status: RunStatus::Exited {
                        code: exit_status.code().unwrap_or(-1),
                        compile_failed,
                    },
                    stdout,
                    stderr,
                });
            }
            None => {
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Ok(ProcessRun {
                        status: RunStatus::TimedOut,
                        stdout: String::new(),
                        stderr: String::new(),
                    });
                }
                std::thread::sleep(Duration::from_millis(10));
            }
        }
    }
}

fn read_pipe<R: io::Read>(pipe: Option<R>) -> String {
    pipe.and_then(|mut p| {
        let mut buf = String::new();
        io::Read::read_to_string(&mut p, &mut buf).ok()?;
        Some(buf)
    })
    .unwrap_or_default()
}

fn is_compile_failure(output: &str) -> bool {
    output.contains("compilation failure")
        || output.contains("COMPILATION ERROR")
        || output.contains("cannot find symbol")
}

/// Request to run one inline-test file against a patched tree.
pub struct InlineRequest<'a> {
    pub project: &'a str,
    pub sha: &'a str,
    pub battery: Battery,
    /// The staged, already-patched generated test artifact.
    pub staged_test: &'a Path,
    /// Where the structured report must land.
    pub report_file: &'a Path,
}

/// Seam to the external build/test tools. The harness only observes
/// exit status, compile failure and report output; tool invocation
/// details stay behind this trait.
pub trait BatteryRunner {
    fn run_inline(&self, req: &InlineRequest<'_>, deadline: Instant) -> io::Result<RunStatus>;

    /// Compile the mutated source tree without any inline test, to
    /// decide whether the mutation itself breaks compilation.
    fn compile_mutated_source(
        &self,
        project: &str,
        sha: &str,
        deadline: Instant,
    ) -> io::Result<RunStatus>;

    fn run_unit(
        &self,
        project: &str,
        sha: &str,
        battery: Battery,
        log_file: &Path,
        deadline: Instant,
    ) -> io::Result<RunStatus>;
}

/// Default runner: shells out using the configured command templates.
pub struct ProcessRunner<'a> {
    config: &'a EvalConfig,
}

impl<'a> ProcessRunner<'a> {
    pub fn new(config: &'a EvalConfig) -> Self {
        ProcessRunner { config }
    }

    fn command(&self, template: &str, project: &str, test: &Path, log: &Path) -> Command {
        let rendered = template
            .replace("{project}", project)
            .replace("{test}", &test.to_string_lossy())
            .replace("{log}", &log.to_string_lossy());
        let (program, args) = stage::split_command(&rendered);
        let mut cmd = Command::new(program);
        cmd.args(args);
        cmd.current_dir(self.config.checkout_dir(project));
        cmd
    }
}

impl BatteryRunner for ProcessRunner<'_> {
    fn run_inline(&self, req: &InlineRequest<'_>, deadline: Instant) -> io::Result<RunStatus> {
        let mut cmd = self.command(
            &self.config.commands.inline_run,
            req.project,
            req.staged_test,
            req.report_file,
        );
        Ok(run_with_deadline(&mut cmd, deadline)?.status)
    }

    fn compile_mutated_source(
        &self,
        project: &str,
        _sha: &str,
        deadline: Instant,
    ) -> io::Result<RunStatus> {
        let mut cmd = self.command(
            &self.config.commands.source_compile,
            project,
            Path::new(""),
            Path::new(""),
        );
        Ok(run_with_deadline(&mut cmd, deadline)?.status)
    }

    fn run_unit(
        &self,
        project: &str,
        _sha: &str,
        battery: Battery,
        log_file: &Path,
        deadline: Instant,
    ) -> io::Result<RunStatus> {
        let mut cmd = self.command(
            self.config.commands.unit_command(battery),
            project,
            Path::new(""),
            log_file,
        );
        Ok(run_with_deadline(&mut cmd, deadline)?.status)
    }
}

/// Counters for one battery run over a project's mutants.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct BatterySummary {
    pub total: usize,
    pub killed: usize,
    pub survived: usize,
    pub timeouts: usize,
    pub runtime_errors: usize,
    pub patch_not_found: usize,
    pub compile_failures: usize,
    /// Mutants skipped for the permanence rule or a missing artifact.
    pub skipped: usize,
    pub duration_ms: u64,
}

/// Runs one test battery across a project's mutants, one mutant at a
/// time against the shared checkout, and records exactly one outcome
/// per (mutant, battery) pair.
pub struct ExecutionController<'a> {
    config: &'a EvalConfig,
    runner: &'a dyn BatteryRunner,
}

impl<'a> ExecutionController<'a> {
    pub fn new(config: &'a EvalConfig, runner: &'a dyn BatteryRunner) -> Self {
        ExecutionController { config, runner }
    }

    /// Run `battery` against every eligible mutant. Mutants whose
    /// mutation alone fails to compile get `compilation_failure = true`
    /// set in place; the caller persists the registry afterwards.
    pub fn run_battery(
        &self,
        project: &str,
        sha: &str,
        battery: Battery,
        mutants: &mut [Mutant],
        checkout: &Checkout,
    ) -> Result<BatterySummary, EvalError> {
        std::fs::create_dir_all(self.config.eval_log_dir())?;
        // Recomputation replaces the battery's result log wholesale;
        // the contract is one record per mutant id.
        let _ = std::fs::remove_file(self.config.eval_results_file(project, sha, battery));
        let started = Instant::now();
        let mut summary = BatterySummary::default();

        // Unit batteries need the pre-mutation failed-test count,
        // captured once per (project, battery), not per mutant.
        let baseline_failures = match battery.kind() {
            BatteryKind::Unit => Some(self.capture_unit_baseline(project, sha, battery, checkout)?),
            BatteryKind::Inline => None,
        };

        for index in 0..mutants.len() {
            if mutants[index].is_compile_failed() {
                summary.skipped += 1;
                continue;
            }
            summary.total += 1;

            let attempt = match battery.kind() {
                BatteryKind::Inline => {
                    self.run_inline_attempt(project, sha, battery, &mut mutants[index], checkout)
                }
                BatteryKind::Unit => self.run_unit_attempt(
                    project,
                    sha,
                    battery,
                    &mutants[index],
                    checkout,
                    baseline_failures.unwrap_or(0),
                ),
            };

            let Some((outcome, elapsed_secs)) = attempt else {
                // Missing artifact: logged and skipped, never fatal.
                summary.skipped += 1;
                summary.total -= 1;
                continue;
            };

            match &outcome {
                ExecutionOutcome::Killed => summary.killed += 1,
                ExecutionOutcome::Survived => summary.survived += 1,
                ExecutionOutcome::Timeout { .. } => summary.timeouts += 1,
                ExecutionOutcome::RuntimeError { .. } => summary.runtime_errors += 1,
                ExecutionOutcome::PatchNotFound => summary.patch_not_found += 1,
                ExecutionOutcome::CompilationFailure => summary.compile_failures += 1,
            }

            if let Some(record) =
                MutantRecord::from_outcome(mutants[index].id, battery, &outcome, elapsed_secs)
            {
                registry::append_result(self.config, project, sha, &record)?;
            }
        }

        // Leave the checkout pristine for the next battery.
        checkout.reset().map_err(EvalError::Io)?;
        summary.duration_ms = started.elapsed().as_millis() as u64;
        Ok(summary)
    }

    fn capture_unit_baseline(
        &self,
        project: &str,
        sha: &str,
        battery: Battery,
        checkout: &Checkout,
    ) -> Result<u32, EvalError> {
        let log_file = self.config.unit_log_file(project, sha, battery);
        let _ = std::fs::remove_file(&log_file);
        checkout.reset().map_err(EvalError::Io)?;
        let deadline = Instant::now() + self.config.timeout;
        self.runner
            .run_unit(project, sha, battery, &log_file, deadline)?;
        Ok(report::count_failed_tests_in_file(&log_file))
    }

    /// Inline attempt. `None` means the generated artifact is missing
    /// and the pair produced no outcome at all.
    fn run_inline_attempt(
        &self,
        project: &str,
        sha: &str,
        battery: Battery,
        mutant: &mut Mutant,
        checkout: &Checkout,
    ) -> Option<(ExecutionOutcome, f64)> {
        let start = Instant::now();
        let deadline = start + self.config.timeout;
        let budget_secs = self.config.timeout.as_secs_f64();

        let artifact = match self.locate_inline_artifact(project, sha, battery, mutant) {
            Ok(path) => path,
            Err(message) => {
                self.log_skip(&message);
                return None;
            }
        };

        // Patched -> staged private copy, cleaned up on every exit path.
        let rel_path = artifact
            .strip_prefix(self.config.generated_tests_dir(battery, project, sha))
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| PathBuf::from(mutant.inline_test_file_name()));
        let staged = match StagedArtifact::create(&artifact, &rel_path, &stage::generate_session_id())
        {
            Ok(staged) => staged,
            Err(e) => {
                return Some((
                    ExecutionOutcome::RuntimeError {
                        message: format!("staging failed: {e}"),
                    },
                    start.elapsed().as_secs_f64(),
                ));
            }
        };

        let content = match staged.read() {
            Ok(content) => content,
            Err(e) => {
                return Some((
                    ExecutionOutcome::RuntimeError {
                        message: format!("read failed: {e}"),
                    },
                    start.elapsed().as_secs_f64(),
                ));
            }
        };
        let patched = match patch::patch_by_content(&content, mutant) {
            PatchResult::Patched(patched) => patched,
            PatchResult::NotFound => {
                self.log_skip(&format!(
                    "cannot find {} in {}",
                    mutant.original_code.trim(),
                    artifact.display()
                ));
                return Some((ExecutionOutcome::PatchNotFound, start.elapsed().as_secs_f64()));
            }
        };
        if let Err(e) = staged.write(&patched) {
            return Some((
                ExecutionOutcome::RuntimeError {
                    message: format!("write failed: {e}"),
                },
                start.elapsed().as_secs_f64(),
            ));
        }

        if Instant::now() >= deadline {
            return Some((
                ExecutionOutcome::Timeout {
                    elapsed_secs: budget_secs,
                },
                budget_secs,
            ));
        }

        let report_file = self.config.inline_report_file(
            project,
            sha,
            battery,
            &mutant.inline_test_file_name(),
            mutant.id,
        );
        let _ = std::fs::remove_file(&report_file);
        // Audit trail of what actually changed in the staged artifact.
        let _ = std::fs::write(
            report_file.with_extension("diff"),
            patch::render_diff(&content, &patched),
        );

        let request = InlineRequest {
            project,
            sha,
            battery,
            staged_test: staged.path(),
            report_file: &report_file,
        };
        let status = match self.runner.run_inline(&request, deadline) {
            Ok(status) => status,
            Err(e) => {
                return Some((
                    ExecutionOutcome::RuntimeError {
                        message: e.to_string(),
                    },
                    start.elapsed().as_secs_f64(),
                ));
            }
        };
        // The budget covers patch application through completion; a run
        // finishing at or past it is a timeout regardless of its exit.
        if start.elapsed() >= self.config.timeout {
            return Some((
                ExecutionOutcome::Timeout {
                    elapsed_secs: budget_secs,
                },
                budget_secs,
            ));
        }

        let outcome = match status {
            RunStatus::TimedOut => {
                return Some((
                    ExecutionOutcome::Timeout {
                        elapsed_secs: budget_secs,
                    },
                    budget_secs,
                ));
            }
            RunStatus::Exited {
                compile_failed: true,
                ..
            } => {
                // Distinguish a test that fails to compile from a
                // mutation that fails to compile: patch the mutation
                // into the checkout source and compile it without the
                // inline test.
                match self.mutation_alone_compiles(project, sha, mutant, checkout, deadline) {
                    Ok(Some(false)) => {
                        mutant.compilation_failure = Some(true);
                    }
                    Ok(_) => {}
                    Err(message) => {
                        return Some((
                            ExecutionOutcome::RuntimeError { message },
                            start.elapsed().as_secs_f64(),
                        ));
                    }
                }
                ExecutionOutcome::CompilationFailure
            }
            // Inline kill is decided by process exit status.
            RunStatus::Exited { code: 0, .. } => {
                mutant.compilation_failure = Some(false);
                ExecutionOutcome::Survived
            }
            RunStatus::Exited { .. } => {
                mutant.compilation_failure = Some(false);
                ExecutionOutcome::Killed
            }
        };
        Some((outcome, start.elapsed().as_secs_f64()))
    }

    fn run_unit_attempt(
        &self,
        project: &str,
        sha: &str,
        battery: Battery,
        mutant: &Mutant,
        checkout: &Checkout,
        baseline_failures: u32,
    ) -> Option<(ExecutionOutcome, f64)> {
        let start = Instant::now();
        let deadline = start + self.config.timeout;
        let budget_secs = self.config.timeout.as_secs_f64();

        if let Err(e) = checkout.reset() {
            return Some((
                ExecutionOutcome::RuntimeError {
                    message: format!("checkout reset failed: {e}"),
                },
                start.elapsed().as_secs_f64(),
            ));
        }

        let source_path = if mutant.file_path.is_absolute() {
            mutant.file_path.clone()
        } else {
            checkout.source_file(&mutant.file_path)
        };
        let content = match std::fs::read_to_string(&source_path) {
            Ok(content) => content,
            Err(e) => {
                return Some((
                    ExecutionOutcome::RuntimeError {
                        message: format!("read {} failed: {e}", source_path.display()),
                    },
                    start.elapsed().as_secs_f64(),
                ));
            }
        };
        let patched = match patch::patch_source_line(&content, mutant) {
            PatchResult::Patched(patched) => patched,
            PatchResult::NotFound => {
                self.log_skip(&format!(
                    "line {} out of range in {}",
                    mutant.line_number,
                    source_path.display()
                ));
                return Some((ExecutionOutcome::PatchNotFound, start.elapsed().as_secs_f64()));
            }
        };
        if let Err(e) = std::fs::write(&source_path, &patched) {
            return Some((
                ExecutionOutcome::RuntimeError {
                    message: format!("write {} failed: {e}", source_path.display()),
                },
                start.elapsed().as_secs_f64(),
            ));
        }

        if Instant::now() >= deadline {
            return Some((
                ExecutionOutcome::Timeout {
                    elapsed_secs: budget_secs,
                },
                budget_secs,
            ));
        }

        // Unit batteries share one log file across mutants; wipe the
        // previous attempt's copy before running.
        let log_file = self.config.unit_log_file(project, sha, battery);
        let _ = std::fs::remove_file(&log_file);

        let status = match self
            .runner
            .run_unit(project, sha, battery, &log_file, deadline)
        {
            Ok(status) => status,
            Err(e) => {
                return Some((
                    ExecutionOutcome::RuntimeError {
                        message: e.to_string(),
                    },
                    start.elapsed().as_secs_f64(),
                ));
            }
        };
        if start.elapsed() >= self.config.timeout {
            return Some((
                ExecutionOutcome::Timeout {
                    elapsed_secs: budget_secs,
                },
                budget_secs,
            ));
        }

        let outcome = match status {
            RunStatus::TimedOut => {
                return Some((
                    ExecutionOutcome::Timeout {
                        elapsed_secs: budget_secs,
                    },
                    budget_secs,
                ));
            }
            RunStatus::Exited { .. } => {
                // Unit kill is decided by an increase in failed tests,
                // not by exit status.
                let failures_after = report::count_failed_tests_in_file(&log_file);
                if failures_after > baseline_failures {
                    ExecutionOutcome::Killed
                } else {
                    ExecutionOutcome::Survived
                }
            }
        };
        Some((outcome, start.elapsed().as_secs_f64()))
    }

    /// Compile the checkout with only the mutation applied, to attribute
    /// an inline compile failure. `Some(false)` means the mutation alone
    /// breaks the build; `None` means the source line could not be
    /// patched and attribution stays unknown. The checkout is reset on
    /// the way out either way.
    fn mutation_alone_compiles(
        &self,
        project: &str,
        sha: &str,
        mutant: &Mutant,
        checkout: &Checkout,
        deadline: Instant,
    ) -> Result<Option<bool>, String> {
        checkout
            .reset()
            .map_err(|e| format!("checkout reset failed: {e}"))?;
        let source_path = if mutant.file_path.is_absolute() {
            mutant.file_path.clone()
        } else {
            checkout.source_file(&mutant.file_path)
        };
        let content = std::fs::read_to_string(&source_path)
            .map_err(|e| format!("read {} failed: {e}", source_path.display()))?;
        let patched = match patch::patch_source_line(&content, mutant) {
            PatchResult::Patched(patched) => patched,
            PatchResult::NotFound => {
                self.log_skip(&format!(
                    "line {} out of range in {}",
                    mutant.line_number,
                    source_path.display()
                ));
                return Ok(None);
            }
        };
        std::fs::write(&source_path, &patched)
            .map_err(|e| format!("write {} failed: {e}", source_path.display()))?;

        let status = self
            .runner
            .compile_mutated_source(project, sha, deadline)
            .map_err(|e| e.to_string());
        // Leave the checkout pristine for the next attempt.
        let _ = checkout.reset();

        let compiles = match status? {
            RunStatus::Exited {
                compile_failed: true,
                ..
            }
            | RunStatus::Exited { code: 1.., .. } => false,
            _ => true,
        };
        Ok(Some(compiles))
    }

    fn locate_inline_artifact(
        &self,
        project: &str,
        sha: &str,
        battery: Battery,
        mutant: &Mutant,
    ) -> Result<PathBuf, String> {
        let checkout_source = {
            let path = &mutant.file_path;
            if path.is_absolute() {
                path.clone()
            } else {
                self.config.checkout_dir(project).join(path)
            }
        };
        let rel = stage::package_relative_path(&checkout_source)
            .map_err(|e| format!("cannot resolve package for {}: {e}", checkout_source.display()))?;
        let artifact = self
            .config
            .generated_tests_dir(battery, project, sha)
            .join(rel);
        if !artifact.exists() {
            return Err(format!("file not exist: {}", artifact.display()));
        }
        Ok(artifact)
    }

    fn log_skip(&self, message: &str) {
        let log = self.config.log_dir.join("run-tests-with-mutants.log");
        if let Some(parent) = log.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        if let Ok(mut file) = std::fs::OpenOptions::new().create(true).append(true).open(&log) {
            use std::io::Write;
            let _ = writeln!(file, "{message}");
        }
    }
}
