use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::battery::Battery;
use crate::error::EvalError;

/// External tool that generated the mutants. Mutant generation itself is
/// out of scope; the name only selects which registry file to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutator {
    UniversalMutator,
    Major,
}

impl Mutator {
    pub fn name(self) -> &'static str {
        match self {
            Mutator::UniversalMutator => "universalmutator",
            Mutator::Major => "major",
        }
    }
}

impl fmt::Display for Mutator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Mutator {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "universalmutator" => Ok(Mutator::UniversalMutator),
            "major" => Ok(Mutator::Major),
            other => Err(EvalError::UnknownMutator(other.to_string())),
        }
    }
}

/// Command templates for the external tools the harness drives. Each
/// template is split on whitespace; the placeholders `{project}`,
/// `{test}` and `{log}` are substituted per invocation.
#[derive(Debug, Clone)]
pub struct RunCommands {
    /// Compiles and runs one inline-test file against the patched tree.
    pub inline_run: String,
    /// Compiles the patched source tree without any inline test.
    pub source_compile: String,
    /// Runs the developer-written unit suite.
    pub developer_unit: String,
    pub randoop: String,
    pub evosuite: String,
}

impl RunCommands {
    pub fn unit_command(&self, battery: Battery) -> &str {
        match battery {
            Battery::DeveloperUnit => &self.developer_unit,
            Battery::RandoopGenerated => &self.randoop,
            Battery::EvosuiteGenerated => &self.evosuite,
            Battery::InlineBaseline | Battery::InlineCandidate => &self.inline_run,
        }
    }
}

impl Default for RunCommands {
    fn default() -> Self {
        RunCommands {
            inline_run: "bash tools/run-inline.sh {project} {test} {log}".to_string(),
            source_compile: "bash tools/compile-source.sh {project} {log}".to_string(),
            developer_unit: "bash tools/run-dev-tests.sh {project} {log}".to_string(),
            randoop: "bash tools/run-randoop.sh {project} {log}".to_string(),
            evosuite: "bash tools/run-evosuite.sh {project} {log}".to_string(),
        }
    }
}

/// All directory roots and knobs, passed explicitly to each component.
/// There is no process-wide mutable state; two configs can coexist.
#[derive(Debug, Clone)]
pub struct EvalConfig {
    /// Per-project mutant registry files: `<project>-<sha>-<mutator>.json`.
    pub mutants_dir: PathBuf,
    /// Project checkouts, one directory per project.
    pub checkouts_dir: PathBuf,
    /// Generated inline-test trees for the baseline battery.
    pub baseline_tests_dir: PathBuf,
    /// Generated inline-test trees for the candidate battery.
    pub candidate_tests_dir: PathBuf,
    /// Unit-test artifacts (generated suites, deps).
    pub unit_tests_dir: PathBuf,
    /// Per-attempt execution logs and reports.
    pub log_dir: PathBuf,
    /// Durable results (eval records, killed indexes, minimized suites).
    pub results_dir: PathBuf,
    /// Project list file, one `<project> <sha>` per line.
    pub projects_file: PathBuf,
    pub mutator: Mutator,
    /// Wall-clock budget per (mutant, battery) attempt, patch included.
    pub timeout: Duration,
    pub seed: u64,
    pub commands: RunCommands,
}

pub const DEFAULT_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_SEED: u64 = 42;

impl EvalConfig {
    /// Lay out every root under a single data directory.
    pub fn new(root: &Path) -> Self {
        EvalConfig {
            mutants_dir: root.join("mutants"),
            checkouts_dir: root.join("downloads"),
            baseline_tests_dir: root.join("inline-baseline-tests"),
            candidate_tests_dir: root.join("inline-candidate-tests"),
            unit_tests_dir: root.join("unit-tests"),
            log_dir: root.join("log"),
            results_dir: root.join("results"),
            projects_file: root.join("projects.txt"),
            mutator: Mutator::UniversalMutator,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            seed: DEFAULT_SEED,
            commands: RunCommands::default(),
        }
    }

    pub fn with_mutator(mut self, mutator: Mutator) -> Self {
        self.mutator = mutator;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn mutants_file(&self, project: &str, sha: &str) -> PathBuf {
        self.mutants_dir
            .join(format!("{}-{}-{}.json", project, sha, self.mutator))
    }

    pub fn checkout_dir(&self, project: &str) -> PathBuf {
        self.checkouts_dir.join(project)
    }

    pub fn generated_tests_dir(&self, battery: Battery, project: &str, sha: &str) -> PathBuf {
        let root = match battery {
            Battery::InlineBaseline => &self.baseline_tests_dir,
            Battery::InlineCandidate => &self.candidate_tests_dir,
            _ => &self.unit_tests_dir,
        };
        root.join(format!("{}-{}", project, sha))
    }

    pub fn eval_log_dir(&self) -> PathBuf {
        self.log_dir.join("eval")
    }

    /// Per-(mutant, inline battery) structured report path.
    pub fn inline_report_file(
        &self,
        project: &str,
        sha: &str,
        battery: Battery,
        test_file_name: &str,
        mutant_id: u32,
    ) -> PathBuf {
        self.eval_log_dir().join(format!(
            "{}-{}-{}-{}-{}-{}.log",
            project, sha, battery, test_file_name, mutant_id, self.mutator
        ))
    }

    /// Unit batteries share one log file across mutants; it is removed
    /// before every run.
    pub fn unit_log_file(&self, project: &str, sha: &str, battery: Battery) -> PathBuf {
        self.eval_log_dir()
            .join(format!("{}-{}-{}-{}.log", project, sha, battery, self.mutator))
    }

    pub fn eval_results_file(&self, project: &str, sha: &str, battery: Battery) -> PathBuf {
        self.results_dir
            .join("mutants-eval-results")
            .join(format!("{}-{}-{}-{}.json", project, sha, self.mutator, battery))
    }

    pub fn killed_index_file(&self, project: &str, sha: &str, battery: Battery) -> PathBuf {
        self.results_dir
            .join("killed-mutants")
            .join(format!("{}-{}-{}-{}.json", project, sha, self.mutator, battery))
    }

    pub fn addback_file(&self, project: &str, sha: &str) -> PathBuf {
        self.results_dir
            .join("killed-mutants")
            .join("add-back-tests-to-killed-mutants")
            .join(format!("{}-{}-{}.txt", project, sha, self.mutator))
    }

    pub fn merged_relation_file(&self, project: &str, sha: &str) -> PathBuf {
        self.results_dir
            .join("killed-mutants")
            .join("merged-tests-to-killed-mutants")
            .join(format!("{}-{}-{}.txt", project, sha, self.mutator))
    }

    pub fn minimized_file(&self, project: &str, sha: &str, algorithm: &str) -> PathBuf {
        self.results_dir
            .join("minimized")
            .join(format!("{}-{}-{}-{}.txt", project, sha, self.mutator, algorithm))
    }

    pub fn itests_without_mutants_file(&self, project: &str, sha: &str) -> PathBuf {
        self.results_dir
            .join("itests-without-mutants")
            .join(format!("{}-{}-{}.txt", project, sha, self.mutator))
    }

    pub fn r2_file(&self, project: &str, sha: &str, algorithm: &str) -> PathBuf {
        self.results_dir
            .join("r2")
            .join(format!("{}-{}-{}-{}.txt", project, sha, self.mutator, algorithm))
    }

    /// Inline tests that pass on the unmutated tree, one
    /// `<project>;<class>;<target-line>;<itest-line>` per line.
    pub fn passed_tests_file(&self, battery: Battery) -> PathBuf {
        self.results_dir
            .join(format!("{}-passed-tests.txt", battery))
    }

    pub fn batch_times_file(&self) -> PathBuf {
        self.results_dir
            .join("time")
            .join(format!("batch-run-tests-with-mutants-{}.json", self.mutator))
    }
}
