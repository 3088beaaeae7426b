mod accept;
mod create;
mod init;
mod list;
pub mod test;
mod view;

use std::process::ExitCode;

use anyhow::{Context, Result};

use crate::cli_args;
use crate::config::HarnessConfig;
use crate::environment::Environment;

/// Figure out what command to run, then run it.
///
/// An `Err` is an environment problem (a missing directory, a tool which can't be written to, a bad config file).
/// Failing comparisons are reported through the exit code instead.
pub fn dispatch_command(args: cli_args::CliArgs) -> Result<ExitCode> {
    match &args.command {
        cli_args::Command::Test(t) => test::test(&args, t),
        cli_args::Command::Init => init::init(&args),
        cli_args::Command::List(l) => list::list(&args, l),
        cli_args::Command::Create(c) => create::create(&args, c),
        cli_args::Command::Accept(a) => accept::accept(&args, a),
        cli_args::Command::View(v) => view::view(&args, v),
    }
}

fn load(top_args: &cli_args::CliArgs) -> Result<(HarnessConfig, Environment)> {
    let config =
        HarnessConfig::load(top_args.config.as_deref()).context("While loading configuration")?;
    let env = Environment::from_config(&config);
    Ok((config, env))
}
