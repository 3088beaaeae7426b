use std::process::ExitCode;

use anyhow::{Context, Result};

use crate::cli_args::{AcceptArgs, CliArgs};
use crate::fixtures::FixtureKind;
use crate::test_filtering::FixtureFilter;

pub fn accept(top_args: &CliArgs, cmd_args: &AcceptArgs) -> Result<ExitCode> {
    let (config, env) = super::load(top_args)?;

    if cmd_args.all {
        let filter = FixtureFilter::new(config.ignore_markers, None)?;
        let moved =
            crate::accept::accept_all(&env, &filter).context("While accepting all results")?;
        println!(
            "Accepted {moved} files; old expectations are in {}",
            env.backup_dir.display()
        );
        return Ok(ExitCode::SUCCESS);
    }

    let name = cmd_args
        .name
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("No fixture was specified to accept"))?;
    let kind = if cmd_args.asm {
        FixtureKind::Assembly
    } else {
        FixtureKind::Language
    };

    let source = env
        .fixtures_dir(kind)
        .join(format!("{name}{}", kind.extension()));
    if !source.is_file() {
        anyhow::bail!("{} does not exist", source.display());
    }

    let moved = crate::accept::accept_fixture(&env, kind, name)
        .with_context(|| format!("While accepting {name}"))?;
    println!("Accepted {moved} files for {name}");
    Ok(ExitCode::SUCCESS)
}
