//! Per-test coverage captured by the `hit` guards, and the test selection it
//! allows for each mutant.

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;

use crate::mutants::{Mutant, MutantId, MutantStatus};
use crate::options::OptimizationPolicy;

#[derive(Debug, Error)]
pub enum CoverageError {
    #[error("line {line}: expected `<test>\\t<mutant id>`, got {content:?}")]
    MalformedLine { line: usize, content: String },
}

/// Mutants reached by each test.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoverageMap {
    per_test: BTreeMap<String, BTreeSet<MutantId>>,
}

/// Which tests a mutant has to be run against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestSelection {
    AllTests,
    Covering(Vec<String>),
    NoTests,
}

impl CoverageMap {
    /// Parse the hit log written by the control module: one `test<TAB>id`
    /// pair per line. Blank lines are ignored.
    pub fn parse(log: &str) -> Result<Self, CoverageError> {
        let mut map = CoverageMap::default();
        for (index, raw) in log.lines().enumerate() {
            let line = raw.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }
            let malformed = || CoverageError::MalformedLine {
                line: index + 1,
                content: line.to_string(),
            };
            let (test, id) = line.rsplit_once('\t').ok_or_else(malformed)?;
            let id: u32 = id.trim().parse().map_err(|_| malformed())?;
            if test.is_empty() {
                return Err(malformed());
            }
            map.record(test, MutantId(id));
        }
        Ok(map)
    }

    pub fn record(&mut self, test: &str, id: MutantId) {
        self.per_test.entry(test.to_string()).or_default().insert(id);
    }

    pub fn tests(&self) -> impl Iterator<Item = &str> {
        self.per_test.keys().map(String::as_str)
    }

    pub fn covered_mutants(&self) -> BTreeSet<MutantId> {
        self.per_test.values().flatten().copied().collect()
    }

    pub fn tests_covering(&self, id: MutantId) -> Vec<String> {
        self.per_test
            .iter()
            .filter(|(_, ids)| ids.contains(&id))
            .map(|(test, _)| test.clone())
            .collect()
    }

    /// Narrowing needs a hit log, which only `hit` guards write; without
    /// them (coverage off, or tests isolated per process) every test runs.
    pub fn select_tests(&self, policy: &OptimizationPolicy, mutant: &Mutant) -> TestSelection {
        // Static mutants are switched at compile time and never report hits.
        if !policy.must_inject_coverage_logic() || mutant.is_static() {
            return TestSelection::AllTests;
        }
        let tests = self.tests_covering(mutant.id);
        if tests.is_empty() {
            TestSelection::NoTests
        } else {
            TestSelection::Covering(tests)
        }
    }

    /// Mark non-static, not yet run mutants that no test reached as
    /// `NoCoverage`. Returns how many were marked; always 0 when `policy`
    /// does not inject hit guards.
    pub fn mark_uncovered(&self, policy: &OptimizationPolicy, mutants: &mut [Mutant]) -> usize {
        if !policy.must_inject_coverage_logic() {
            return 0;
        }
        let covered = self.covered_mutants();
        let mut marked = 0;
        for mutant in mutants.iter_mut() {
            if mutant.is_static() || mutant.status != MutantStatus::NotRun {
                continue;
            }
            if !covered.contains(&mutant.id) {
                mutant.set_status(
                    MutantStatus::NoCoverage,
                    Some("no test reached this mutant".to_string()),
                );
                marked += 1;
            }
        }
        marked
    }
}
