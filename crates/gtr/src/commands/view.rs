use std::io::Write;
use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};

use crate::cli_args::*;
use crate::environment::{Environment, Phase, ToolRole, ASMO_EXT, TXT_EXT};
use crate::noise::NoiseFilter;

fn extension(phase: Phase, role: ToolRole) -> &'static str {
    match phase {
        Phase::Build | Phase::Run | Phase::ReoptimizedBuild => TXT_EXT,
        Phase::GeneratedAsm => role.asm_extension(),
        Phase::RebuiltAsm => ASMO_EXT,
    }
}

fn print_file(heading: &str, path: &Path) -> Result<()> {
    let contents =
        std::fs::read(path).with_context(|| format!("While reading {}", path.display()))?;
    println!("{heading}...");
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&contents)?;
    stdout.flush()?;
    Ok(())
}

fn view_phase(
    env: &Environment,
    noise: &NoiseFilter,
    phase: Phase,
    role: ToolRole,
    name: &str,
) -> Result<()> {
    let ext = extension(phase, role);
    let result = env.result.file(phase, role, name, ext);
    let expect = env.expect.file(phase, role, name, ext);

    if !result.is_file() {
        anyhow::bail!("There is no result for {name}: {} does not exist", result.display());
    }
    if !expect.is_file() {
        anyhow::bail!("There is no expectation for {name}: {} does not exist", expect.display());
    }

    println!("{}...", phase.to_string().to_uppercase());
    print_file("expect", &expect)?;
    print_file("result", &result)?;

    let same = crate::comparator::compare_files(&result, &expect, noise)?;
    println!("({})", if same { "passes" } else { "differs" });
    Ok(())
}

pub fn view(top_args: &CliArgs, cmd_args: &ViewArgs) -> Result<ExitCode> {
    let (config, env) = super::load(top_args)?;

    let role = ToolRole::from_dir_name(&cmd_args.test_set).ok_or_else(|| {
        anyhow::anyhow!(
            "--test-set={} is invalid; expected one of codegenerator, compiler, optimizer, optimizer-standalone",
            cmd_args.test_set
        )
    })?;

    let selected = [
        (cmd_args.build, Phase::Build),
        (cmd_args.run, Phase::Run),
        (cmd_args.asm, Phase::GeneratedAsm),
        (cmd_args.asmo, Phase::RebuiltAsm),
        (cmd_args.buildo, Phase::ReoptimizedBuild),
    ]
    .into_iter()
    .filter_map(|(on, phase)| on.then_some(phase))
    .collect::<Vec<_>>();

    if selected.is_empty() && !cmd_args.test {
        anyhow::bail!("Nothing to view; pass at least one of --test, --build, --run, --asm, --asmo or --buildo");
    }

    let reoptimized = selected
        .iter()
        .any(|p| matches!(p, Phase::RebuiltAsm | Phase::ReoptimizedBuild));
    if role == ToolRole::CodeGenerator && reoptimized {
        anyhow::bail!("There is no reoptimize phase for the code generator");
    }

    if cmd_args.test {
        let kind = role.fixture_kind();
        let source = env
            .fixtures_dir(kind)
            .join(format!("{}{}", cmd_args.name, kind.extension()));
        print_file("TEST", &source)?;
    }

    let noise = NoiseFilter::new(&config.noise_markers);
    for phase in selected {
        view_phase(&env, &noise, phase, role, &cmd_args.name)?;
    }

    Ok(ExitCode::SUCCESS)
}
