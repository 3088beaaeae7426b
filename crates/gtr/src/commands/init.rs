use std::process::ExitCode;

use anyhow::{Context, Result};

use crate::cli_args::CliArgs;

pub fn init(top_args: &CliArgs) -> Result<ExitCode> {
    let (_, env) = super::load(top_args)?;
    env.create_dirs().context("While creating the directory layout")?;
    println!(
        "Initialized {} and {}",
        env.result.root().display(),
        env.expect.root().display()
    );
    Ok(ExitCode::SUCCESS)
}
