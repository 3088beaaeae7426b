//! Infrastructure to report the results of a run.
//!
//! This is called from [crate::commands] once a pipeline is done; nothing is printed while stages are running.
use std::fmt::{Result, Write};

use indenter::indented;

use crate::comparator::StageReport;
use crate::pipeline::{PipelineReport, RunSummary};

// Formatting here is to strings and so cannot fail, but unwrap is annoying so we put that behind a function and unwrap
// once at the top.  Output strings don't end in a newline; we strip at the top so that writeln can be used everywhere.

fn finish(dest: String) -> String {
    match dest.strip_suffix('\n') {
        Some(s) => s.to_string(),
        None => dest,
    }
}

/// Report one stage: `passed: [ 2 / 3 ]` then the failing fixtures, one per line.
pub fn report_stage(stage: &StageReport) -> String {
    let mut dest = String::new();
    report_stage_fallible(&mut dest, stage)
        .expect("This is formatting to strings and should never fail");
    finish(dest)
}

fn report_stage_fallible(mut dest: &mut dyn Write, stage: &StageReport) -> Result {
    writeln!(dest, "{}: passed: [ {} / {} ]", stage.label, stage.passed, stage.total)?;

    if stage.failed.is_empty() {
        return Ok(());
    }

    writeln!(dest, "failed:")?;
    let mut ind = indented(&mut dest).with_str("  ");
    for name in stage.failed.iter() {
        writeln!(ind, "{name}")?;
    }
    Ok(())
}

pub fn report_pipeline(pipeline: &PipelineReport) -> String {
    let mut dest = String::new();
    report_pipeline_fallible(&mut dest, pipeline)
        .expect("This is formatting to strings and should never fail");
    finish(dest)
}

fn report_pipeline_fallible(mut dest: &mut dyn Write, pipeline: &PipelineReport) -> Result {
    writeln!(dest, "{}...", pipeline.pipeline.title())?;
    for stage in pipeline.stages.iter() {
        writeln!(indented(&mut dest).with_str("  "), "{}", report_stage(stage))?;
    }
    Ok(())
}

/// One line for the end of a run.
pub fn report_totals(summary: &RunSummary) -> String {
    let (passed, total) = summary
        .pipelines
        .iter()
        .flat_map(|p| p.stages.iter())
        .fold((0, 0), |(p, t), s| (p + s.passed, t + s.total));
    let failing_stages = summary
        .pipelines
        .iter()
        .flat_map(|p| p.stages.iter())
        .filter(|s| !s.all_passed())
        .count();

    if failing_stages == 0 {
        format!("all {total} comparisons passed")
    } else {
        format!("{passed} of {total} comparisons passed; {failing_stages} stages have failures")
    }
}
