use std::process::ExitCode;

use anyhow::{Context, Result};

use crate::cli_args::{CliArgs, TestArgs};
use crate::config::HarnessConfig;
use crate::environment::Environment;
use crate::executor::RunSettings;
use crate::pipeline::{run_pipeline, Pipeline, RunSummary};
use crate::test_filtering::FixtureFilter;

/// What a `gtr test` invocation asked for, after `--invert` has been applied.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Selection {
    /// In [Pipeline::ALL] order.
    pub pipelines: Vec<Pipeline>,
    pub reoptimize: bool,
    pub clean: bool,
}

impl Selection {
    pub fn from_args(args: &TestArgs) -> Selection {
        let flip = |x: bool| x != args.invert;

        let pipelines = Pipeline::ALL
            .into_iter()
            .filter(|p| {
                flip(match p {
                    Pipeline::CodeGen => args.codegen,
                    Pipeline::Optimize => args.optimize,
                    Pipeline::Compile => args.compile,
                    Pipeline::OptimizeStandalone => args.optimize_standalone,
                })
            })
            .collect();

        Selection {
            pipelines,
            reoptimize: flip(args.reoptimize),
            clean: flip(args.clean),
        }
    }
}

/// Command line overrides go into the config, so that everything downstream only looks in one place.
fn apply_overrides(config: &mut HarnessConfig, args: &TestArgs) {
    if let Some(t) = args.threads {
        config.threads = Some(t);
    }

    match args.timeout {
        Some(0) => config.timeout_secs = None,
        Some(s) => config.timeout_secs = Some(s),
        None => {}
    }
}

/// Run the selected pipelines, printing each pipeline's report as it finishes, then write the summary file.
pub fn run_selected(
    config: &HarnessConfig,
    env: &Environment,
    selection: &Selection,
    pattern: Option<&str>,
) -> Result<RunSummary> {
    let filter = FixtureFilter::new(config.ignore_markers.clone(), pattern)
        .with_context(|| format!("While compiling the fixture pattern {pattern:?}"))?;
    let settings = RunSettings::from_config(config, filter);
    let tools = config.toolchain();

    if selection.clean {
        print!("CLEANING...");
        let removed = env
            .clean_results(&config.ignore_markers)
            .context("While cleaning the result tree")?;
        println!(" done ({removed} files removed)");
    }

    for dir in env.result.all_dirs() {
        std::fs::create_dir_all(&dir).with_context(|| format!("While creating {}", dir.display()))?;
    }

    if selection.pipelines.is_empty() {
        log::warn!("No pipelines selected; pass --codegen, --optimize, --compile or --optimize-standalone");
    }

    let mut summary = RunSummary::default();
    for &pipeline in selection.pipelines.iter() {
        let report = run_pipeline(env, &tools, &settings, pipeline, selection.reoptimize)
            .with_context(|| format!("While running the {pipeline} pipeline"))?;
        println!("{}", crate::reporter::report_pipeline(&report));
        summary.pipelines.push(report);
    }

    let summary_file = env.summary_file();
    summary
        .write(&summary_file)
        .with_context(|| format!("While writing {}", summary_file.display()))?;

    println!("{}", crate::reporter::report_totals(&summary));
    Ok(summary)
}

pub fn test(top_args: &CliArgs, test_args: &TestArgs) -> Result<ExitCode> {
    let (mut config, env) = super::load(top_args)?;
    apply_overrides(&mut config, test_args);

    crate::process_coordination::log_handler::install_log_handler(
        &env.logs_dir(),
        log::Level::Warn,
    )?;

    let selection = Selection::from_args(test_args);
    log::info!("Selected {selection:?}");

    let summary = run_selected(&config, &env, &selection, test_args.pattern.as_deref())?;
    Ok(if summary.all_passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    fn args(argv: &[&str]) -> TestArgs {
        use clap::Parser;

        let mut full = vec!["gtr", "test"];
        full.extend_from_slice(argv);
        match CliArgs::parse_from(full).command {
            crate::cli_args::Command::Test(t) => t,
            c => panic!("Parsed as {c:?}"),
        }
    }

    #[test]
    fn flags_are_additive() {
        assert_eq!(
            Selection::from_args(&args(&["--compile", "--codegen", "--reoptimize"])),
            Selection {
                pipelines: vec![Pipeline::CodeGen, Pipeline::Compile],
                reoptimize: true,
                clean: false,
            }
        );
    }

    #[test]
    fn invert_makes_flags_subtractive() {
        assert_eq!(
            Selection::from_args(&args(&["--invert", "--optimize-standalone", "--clean"])),
            Selection {
                pipelines: vec![Pipeline::CodeGen, Pipeline::Optimize, Pipeline::Compile],
                reoptimize: true,
                clean: false,
            }
        );
    }

    #[test]
    fn overrides() {
        let mut config = HarnessConfig::default();
        apply_overrides(&mut config, &args(&["--threads", "3", "--timeout", "0"]));
        assert_eq!(config.threads, Some(3));
        assert_eq!(config.timeout_secs, None);

        let mut config = HarnessConfig::default();
        apply_overrides(&mut config, &args(&[]));
        assert_eq!(config.timeout_secs, Some(60));
        assert_eq!(config.threads, None);
    }
}
