use std::process::ExitCode;

use anyhow::{Context, Result};

use crate::cli_args::{CliArgs, CreateArgs};
use crate::fixtures::FixtureKind;

pub fn create(top_args: &CliArgs, create_args: &CreateArgs) -> Result<ExitCode> {
    let (_, env) = super::load(top_args)?;
    let kind = if create_args.asm {
        FixtureKind::Assembly
    } else {
        FixtureKind::Language
    };

    let dir = env.fixtures_dir(kind);
    let path = dir.join(format!("{}{}", create_args.name, kind.extension()));
    if path.exists() {
        println!("{} already exists", path.display());
        return Ok(ExitCode::SUCCESS);
    }

    std::fs::create_dir_all(dir).with_context(|| format!("While creating {}", dir.display()))?;
    std::fs::write(&path, kind.template())
        .with_context(|| format!("While writing {}", path.display()))?;
    println!("Created {}", path.display());
    Ok(ExitCode::SUCCESS)
}
