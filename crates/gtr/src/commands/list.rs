use std::process::ExitCode;

use anyhow::Result;

use crate::cli_args::{CliArgs, ListArgs};
use crate::fixtures::{self, FixtureKind};
use crate::test_filtering::FixtureFilter;

pub fn list(top_args: &CliArgs, list_args: &ListArgs) -> Result<ExitCode> {
    let (config, env) = super::load(top_args)?;
    let kind = if list_args.asm {
        FixtureKind::Assembly
    } else {
        FixtureKind::Language
    };

    let filter = FixtureFilter::new(config.ignore_markers, list_args.pattern.as_deref())?;
    for f in fixtures::enumerate(env.fixtures_dir(kind), Some(kind.extension()), &filter)? {
        println!("{}", f.name);
    }
    Ok(ExitCode::SUCCESS)
}
