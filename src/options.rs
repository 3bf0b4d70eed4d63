//! Run configuration and the coverage optimization policy.

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::mutators::MutatorKind;

pub const DEFAULT_CONFIG_FILE: &str = "mutorch-config.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("incorrect optimization mode ({0}); expected off, all, perTest or perTestInIsolation")]
    UnknownOptimizationMode(String),
    #[error("invalid excluded mutator ({0}); run `mutorch mutators` for the list")]
    UnknownMutator(String),
    #[error("concurrency must be at least 1")]
    InvalidConcurrency,
    #[error("cannot access config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// How coverage is used to narrow the tests run against each mutant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OptimizationMode {
    /// No coverage capture; every mutant runs the full suite.
    #[serde(rename = "off")]
    Off,
    /// Capture coverage in one instrumented pass; mutants share a test session.
    #[serde(rename = "all")]
    All,
    /// Like `all`, using the fastest capture strategy.
    #[default]
    #[serde(rename = "perTest")]
    PerTest,
    /// Each test runs alone in its own process.
    #[serde(rename = "perTestInIsolation")]
    PerTestInIsolation,
}

impl OptimizationMode {
    pub fn as_str(self) -> &'static str {
        match self {
            OptimizationMode::Off => "off",
            OptimizationMode::All => "all",
            OptimizationMode::PerTest => "perTest",
            OptimizationMode::PerTestInIsolation => "perTestInIsolation",
        }
    }
}

impl FromStr for OptimizationMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "off" => Ok(OptimizationMode::Off),
            "all" => Ok(OptimizationMode::All),
            "pertest" => Ok(OptimizationMode::PerTest),
            "pertestinisolation" => Ok(OptimizationMode::PerTestInIsolation),
            _ => Err(ConfigError::UnknownOptimizationMode(s.to_string())),
        }
    }
}

impl fmt::Display for OptimizationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The valid combinations of the coverage flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverageStrategy {
    Disabled,
    SharedSession,
    IsolatedTests,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OptimizationPolicy {
    mode: OptimizationMode,
}

impl OptimizationPolicy {
    pub fn new(mode: OptimizationMode) -> Self {
        OptimizationPolicy { mode }
    }

    pub fn mode(&self) -> OptimizationMode {
        self.mode
    }

    pub fn strategy(&self) -> CoverageStrategy {
        match self.mode {
            OptimizationMode::Off => CoverageStrategy::Disabled,
            OptimizationMode::All | OptimizationMode::PerTest => CoverageStrategy::SharedSession,
            OptimizationMode::PerTestInIsolation => CoverageStrategy::IsolatedTests,
        }
    }

    pub fn coverage_based_test(&self) -> bool {
        self.strategy() != CoverageStrategy::Disabled
    }

    pub fn capture_coverage_per_test(&self) -> bool {
        self.strategy() == CoverageStrategy::IsolatedTests
    }

    /// Guards record hits only when tests share a session; isolated tests
    /// already run alone.
    pub fn must_inject_coverage_logic(&self) -> bool {
        self.coverage_based_test() && !self.capture_coverage_per_test()
    }
}

/// Raw options as read from the config file and the command line.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Options {
    pub optimization_mode: Option<String>,
    pub excluded_mutations: Vec<String>,
    pub concurrency: Option<usize>,
}

impl Options {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&data).map_err(|source| ConfigError::Json {
            path: path.display().to_string(),
            source,
        })
    }

    /// Load `path` if given, else the default config file when it exists.
    pub fn discover(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.exists() {
                    Self::load(default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Values set in `other` win; exclusions accumulate.
    pub fn merge(mut self, other: Options) -> Self {
        if other.optimization_mode.is_some() {
            self.optimization_mode = other.optimization_mode;
        }
        if other.concurrency.is_some() {
            self.concurrency = other.concurrency;
        }
        self.excluded_mutations.extend(other.excluded_mutations);
        self
    }

    /// Write these options as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Json {
            path: path.display().to_string(),
            source,
        })?;
        std::fs::write(path, json + "\n").map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn with_optimization_mode(mut self, mode: impl Into<String>) -> Self {
        self.optimization_mode = Some(mode.into());
        self
    }

    pub fn with_excluded_mutation(mut self, name: impl Into<String>) -> Self {
        self.excluded_mutations.push(name.into());
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = Some(concurrency);
        self
    }

    pub fn validate(&self) -> Result<ValidatedOptions, ConfigError> {
        let mode = match &self.optimization_mode {
            Some(mode) => mode.parse()?,
            None => OptimizationMode::default(),
        };

        let mut excluded = BTreeSet::new();
        for name in &self.excluded_mutations {
            let kind = MutatorKind::lookup(name)
                .ok_or_else(|| ConfigError::UnknownMutator(name.clone()))?;
            excluded.insert(kind);
        }

        let concurrency = match self.concurrency {
            Some(0) => return Err(ConfigError::InvalidConcurrency),
            Some(n) => n,
            None => default_concurrency(),
        };

        Ok(ValidatedOptions {
            policy: OptimizationPolicy::new(mode),
            excluded,
            concurrency,
        })
    }
}

fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| (n.get() / 2).max(1))
        .unwrap_or(1)
}

/// Options that passed validation; the only way to build an engine from configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedOptions {
    pub policy: OptimizationPolicy,
    pub excluded: BTreeSet<MutatorKind>,
    /// Hint for the test execution side; the engine itself is single-threaded.
    pub concurrency: usize,
}

/// Every setting spelled out, as `mutorch init` writes it.
impl From<&ValidatedOptions> for Options {
    fn from(validated: &ValidatedOptions) -> Self {
        Options {
            optimization_mode: Some(validated.policy.mode().to_string()),
            excluded_mutations: validated.excluded.iter().map(|k| k.name().to_string()).collect(),
            concurrency: Some(validated.concurrency),
        }
    }
}

impl Default for ValidatedOptions {
    fn default() -> Self {
        ValidatedOptions {
            policy: OptimizationPolicy::default(),
            excluded: BTreeSet::new(),
            concurrency: default_concurrency(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_prefers_later_values_and_accumulates_exclusions() {
        let file = Options::default()
            .with_optimization_mode("all")
            .with_excluded_mutation("string")
            .with_concurrency(2);
        let cli = Options::default()
            .with_optimization_mode("off")
            .with_excluded_mutation("block");

        let merged = file.merge(cli);
        assert_eq!(merged.optimization_mode.as_deref(), Some("off"));
        assert_eq!(merged.excluded_mutations, vec!["string", "block"]);
        assert_eq!(merged.concurrency, Some(2));
    }
}
