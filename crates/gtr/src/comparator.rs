//! Comparing a stage's results against the expectation tree.
//!
//! Which fixtures to check comes from a reference directory rather than from the result directory: if the code
//! generator stopped producing assembly for a fixture, the run stage has no input for it, and the reference (the
//! generated assembly) is what tells us whether a run result ought to exist.  A fixture then passes iff:
//!
//! - neither a result nor an expectation exists, or
//! - both exist and are byte-identical once noise is stripped.
//!
//! Everything else fails.  Outcomes travel from the shard workers to the caller over a rendezvous channel, and the caller
//! receives exactly one outcome per reference fixture.  Workers therefore send exactly one message per fixture, whatever
//! happens, including when reading a file fails.
use std::path::{Path, PathBuf};

use crossbeam::channel as chan;
use itertools::Itertools;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::executor::RunSettings;
use crate::fixtures::{self, FixtureFile};
use crate::noise::NoiseFilter;
use crate::shard::Spawned;

/// Whether one fixture passed one stage.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ComparisonOutcome {
    pub fixture: String,
    pub passed: bool,
}

/// What to compare: `result_dir/<name><result_ext>` against `expect_dir/<name><expect_ext>` for every fixture in
/// `reference_dir`.
#[derive(Clone, Debug)]
pub struct Comparison {
    pub label: String,
    pub result_dir: PathBuf,
    pub result_ext: String,
    pub expect_dir: PathBuf,
    pub expect_ext: String,
    pub reference_dir: PathBuf,
}

impl Comparison {
    pub fn result_file(&self, fixture: &str) -> PathBuf {
        self.result_dir.join(format!("{fixture}{}", self.result_ext))
    }

    pub fn expect_file(&self, fixture: &str) -> PathBuf {
        self.expect_dir.join(format!("{fixture}{}", self.expect_ext))
    }
}

/// Outcome of comparing a whole stage.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct StageReport {
    pub label: String,
    pub passed: usize,
    pub total: usize,

    /// Sorted.
    pub failed: Vec<String>,
}

impl StageReport {
    pub fn all_passed(&self) -> bool {
        self.passed == self.total
    }
}

fn read_if_exists(path: &Path) -> Result<Option<Vec<u8>>> {
    match std::fs::read(path) {
        Ok(b) => Ok(Some(b)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::io(path, e)),
    }
}

/// Compare one result file against one expectation file.
pub fn compare_files(result: &Path, expect: &Path, noise: &NoiseFilter) -> Result<bool> {
    let result = read_if_exists(result)?;
    let expect = read_if_exists(expect)?;

    Ok(match (result, expect) {
        (None, None) => true,
        (Some(r), Some(e)) => noise.strip(&r) == noise.strip(&e),
        _ => false,
    })
}

fn compare_fixture(
    cmp: &Comparison,
    fixture: &FixtureFile,
    noise: &NoiseFilter,
) -> Result<ComparisonOutcome> {
    let result = cmp.result_file(&fixture.name);
    let expect = cmp.expect_file(&fixture.name);

    let passed = compare_files(&result, &expect, noise)?;
    if !passed {
        log::debug!(
            "{}: {} differs ({} vs {})",
            cmp.label,
            fixture.name,
            result.display(),
            expect.display()
        );
    }

    Ok(ComparisonOutcome {
        fixture: fixture.name.clone(),
        passed,
    })
}

/// Tally outcomes into a report.
fn tally(label: &str, outcomes: impl IntoIterator<Item = ComparisonOutcome>) -> StageReport {
    let mut passed = 0;
    let mut total = 0;
    let mut failed = vec![];

    for o in outcomes {
        total += 1;
        if o.passed {
            passed += 1;
        } else {
            failed.push(o.fixture);
        }
    }

    StageReport {
        label: label.to_string(),
        passed,
        total,
        failed: failed.into_iter().sorted().collect(),
    }
}

/// Compare every fixture of the reference directory.
///
/// Failing to list the reference directory or to read a file that exists is fatal, and the first such error is
/// returned once every outcome has been received.
pub fn compare_stage(settings: &RunSettings, cmp: &Comparison) -> Result<StageReport> {
    let references = fixtures::enumerate(&cmp.reference_dir, None, &settings.filter)?;

    // Zero capacity: each send waits for the receive below.
    let (tx, rx) = chan::bounded::<Result<ComparisonOutcome>>(0);

    let worker = |_index: usize, shard: &[FixtureFile]| {
        for fixture in shard {
            let outcome = compare_fixture(cmp, fixture, &settings.noise);
            tx.send(outcome)
                .expect("The receiver drains every outcome before it is dropped");
        }
    };

    let received = crossbeam::scope(|s| {
        let Spawned {
            handles,
            items: spawned_items,
            error: spawn_error,
        } = crate::shard::spawn_shards(s, &references, settings.concurrency, &worker);

        // Only the shards that started will send anything.
        let mut outcomes = Vec::with_capacity(spawned_items);
        let mut first_error = spawn_error;
        for _ in 0..spawned_items {
            match rx.recv().expect("Senders outlive the drain") {
                Ok(o) => outcomes.push(o),
                Err(e) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    } else {
                        log::error!("{}: further comparison error: {e}", cmp.label);
                    }
                }
            }
        }

        for h in handles {
            h.join().unwrap_or_else(|p| std::panic::resume_unwind(p));
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(outcomes),
        }
    })
    .unwrap_or_else(|p| std::panic::resume_unwind(p))?;

    let report = tally(&cmp.label, received);
    log::info!(
        "{}: {}/{} passed",
        report.label,
        report.passed,
        report.total
    );
    Ok(report)
}
