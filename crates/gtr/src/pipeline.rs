//! The pipelines: which stages run in what order, reading from and writing to where.
//!
//! Every pipeline is a build step followed by a run step, each of which is executed then compared:
//!
//! | pipeline             | build input                 | build tool     | run input                      |
//! |----------------------|-----------------------------|----------------|--------------------------------|
//! | `codegen`            | source fixtures             | code generator | `asm/codegenerator/*.asm`      |
//! | `optimize`           | `asm/codegenerator/*.asm`   | optimizer      | `asm/optimizer/*.asmo`         |
//! | `compile`            | source fixtures             | compiler       | `asm/compiler/*.asm`           |
//! | `optimize-standalone`| assembly fixtures           | optimizer      | `asm/optimizer-standalone/*.asmo` |
//!
//! Build steps write their log to `build/<role>` and their assembly to `asm/<role>`; run steps run that assembly in
//! the emulator and write to `run/<role>`.  `optimize` reads the code generator's assembly from the result tree, so it
//! should run after `codegen` (the CLI orders them that way).
//!
//! All but `codegen` can also reoptimize: the assembly from `asm/<role>` goes through the optimizer again, landing in
//! `asmo/<role>` with its log in `buildo/<role>`.  The optimizer should be idempotent, so the reoptimized assembly is
//! compared against the assembly it was made from, not against the expectation tree.
use std::path::Path;

use serde::Serialize;

use crate::comparator::{compare_stage, Comparison, StageReport};
use crate::config::{ToolConfig, ToolchainConfig};
use crate::environment::{Environment, Phase, ToolRole, ASMO_EXT, TXT_EXT};
use crate::error::{IoResultExt, Result};
use crate::executor::{execute_stage, RunSettings, StageRun, StageRunBuilder};

#[derive(Copy, Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, derive_more::Display)]
#[serde(rename_all = "kebab-case")]
pub enum Pipeline {
    /// Generate assembly without optimizing, then run it.
    #[display(fmt = "codegen")]
    #[serde(rename = "codegen")]
    CodeGen,

    /// Optimize the code generator's assembly, then run it.
    #[display(fmt = "optimize")]
    Optimize,

    /// Generate optimized assembly in one go, then run it.
    #[display(fmt = "compile")]
    Compile,

    /// Optimize hand-written assembly, then run it.
    #[display(fmt = "optimize-standalone")]
    OptimizeStandalone,
}

impl Pipeline {
    /// In the order they should run.
    pub const ALL: [Pipeline; 4] = [
        Pipeline::CodeGen,
        Pipeline::Optimize,
        Pipeline::Compile,
        Pipeline::OptimizeStandalone,
    ];

    pub fn role(&self) -> ToolRole {
        match self {
            Pipeline::CodeGen => ToolRole::CodeGenerator,
            Pipeline::Optimize => ToolRole::Optimizer,
            Pipeline::Compile => ToolRole::Compiler,
            Pipeline::OptimizeStandalone => ToolRole::StandaloneOptimizer,
        }
    }

    /// The code generator doesn't optimize, so there's nothing to check for idempotence.
    pub fn can_reoptimize(&self) -> bool {
        !matches!(self, Pipeline::CodeGen)
    }

    pub fn title(&self) -> &'static str {
        match self {
            Pipeline::CodeGen => "GENERATING CODE",
            Pipeline::Optimize => "OPTIMIZING",
            Pipeline::Compile => "COMPILING",
            Pipeline::OptimizeStandalone => "OPTIMIZING STANDALONE ASM",
        }
    }

    fn build_tool<'a>(&self, tools: &'a ToolchainConfig) -> &'a ToolConfig {
        match self {
            Pipeline::CodeGen => &tools.code_generator,
            Pipeline::Compile => &tools.compiler,
            Pipeline::Optimize | Pipeline::OptimizeStandalone => &tools.optimizer,
        }
    }

    /// Where the build step reads from, and with what extension.
    fn build_input<'a>(&self, env: &'a Environment) -> (std::borrow::Cow<'a, Path>, &'static str) {
        use std::borrow::Cow;

        match self {
            Pipeline::CodeGen | Pipeline::Compile | Pipeline::OptimizeStandalone => {
                let kind = self.role().fixture_kind();
                (Cow::Borrowed(env.fixtures_dir(kind)), kind.extension())
            }
            Pipeline::Optimize => {
                let upstream = ToolRole::CodeGenerator;
                (
                    Cow::Owned(env.result.dir(Phase::GeneratedAsm, upstream)),
                    upstream.asm_extension(),
                )
            }
        }
    }
}

/// One stage: what to execute, and what to compare afterward.
#[derive(Clone, Debug)]
pub struct Step {
    pub run: StageRun,
    pub comparison: Comparison,
}

fn label(phase: Phase, role: ToolRole) -> String {
    format!("{phase}/{role}")
}

/// Compare `phase/role` in the result tree against the same place in the expectation tree.
fn golden_comparison(
    env: &Environment,
    phase: Phase,
    role: ToolRole,
    reference: &Path,
) -> Comparison {
    Comparison {
        label: label(phase, role),
        result_dir: env.result.dir(phase, role),
        result_ext: TXT_EXT.to_string(),
        expect_dir: env.expect.dir(phase, role),
        expect_ext: TXT_EXT.to_string(),
        reference_dir: reference.to_path_buf(),
    }
}

pub fn build_step(env: &Environment, tools: &ToolchainConfig, pipeline: Pipeline) -> Result<Step> {
    let role = pipeline.role();
    let (input_dir, input_ext) = pipeline.build_input(env);

    let run = StageRunBuilder::default()
        .label(label(Phase::Build, role))
        .input_dir(input_dir.as_ref())
        .input_ext(input_ext)
        .output_dir(env.result.dir(Phase::Build, role))
        .output_ext(TXT_EXT)
        .carry_forward_dir(env.result.dir(Phase::GeneratedAsm, role))
        .carry_forward_ext(role.asm_extension())
        .tool(pipeline.build_tool(tools).clone())
        .build()?;

    Ok(Step {
        comparison: golden_comparison(env, Phase::Build, role, &input_dir),
        run,
    })
}

pub fn run_step(env: &Environment, tools: &ToolchainConfig, pipeline: Pipeline) -> Result<Step> {
    let role = pipeline.role();
    let asm_dir = env.result.dir(Phase::GeneratedAsm, role);

    let run = StageRunBuilder::default()
        .label(label(Phase::Run, role))
        .input_dir(&asm_dir)
        .input_ext(role.asm_extension())
        .output_dir(env.result.dir(Phase::Run, role))
        .output_ext(TXT_EXT)
        .tool(tools.emulator.clone())
        .build()?;

    Ok(Step {
        comparison: golden_comparison(env, Phase::Run, role, &asm_dir),
        run,
    })
}

/// Feed the pipeline's generated assembly back through the optimizer, then check the output didn't change.
pub fn reoptimize_step(
    env: &Environment,
    tools: &ToolchainConfig,
    pipeline: Pipeline,
) -> Result<Step> {
    let role = pipeline.role();
    let asm_dir = env.result.dir(Phase::GeneratedAsm, role);
    let rebuilt_dir = env.result.dir(Phase::RebuiltAsm, role);

    let run = StageRunBuilder::default()
        .label(label(Phase::ReoptimizedBuild, role))
        .input_dir(&asm_dir)
        .input_ext(role.asm_extension())
        .output_dir(env.result.dir(Phase::ReoptimizedBuild, role))
        .output_ext(TXT_EXT)
        .carry_forward_dir(&rebuilt_dir)
        .carry_forward_ext(ASMO_EXT)
        .tool(tools.optimizer.clone())
        .build()?;

    let comparison = Comparison {
        label: label(Phase::RebuiltAsm, role),
        result_dir: rebuilt_dir,
        result_ext: ASMO_EXT.to_string(),
        expect_dir: asm_dir.clone(),
        expect_ext: role.asm_extension().to_string(),
        reference_dir: asm_dir,
    };

    Ok(Step { run, comparison })
}

/// The steps of a pipeline, in order.
pub fn steps(
    env: &Environment,
    tools: &ToolchainConfig,
    pipeline: Pipeline,
    reoptimize: bool,
) -> Result<Vec<Step>> {
    let mut ret = vec![build_step(env, tools, pipeline)?, run_step(env, tools, pipeline)?];
    if reoptimize && pipeline.can_reoptimize() {
        ret.push(reoptimize_step(env, tools, pipeline)?);
    }
    Ok(ret)
}

#[derive(Clone, Debug, Serialize)]
pub struct PipelineReport {
    pub pipeline: Pipeline,
    pub stages: Vec<StageReport>,
}

impl PipelineReport {
    pub fn all_passed(&self) -> bool {
        self.stages.iter().all(|s| s.all_passed())
    }
}

/// Run every step of a pipeline: execute it, then compare it.
///
/// Stops at the first environment error.  Test failures don't stop anything; they're in the report.
pub fn run_pipeline(
    env: &Environment,
    tools: &ToolchainConfig,
    settings: &RunSettings,
    pipeline: Pipeline,
    reoptimize: bool,
) -> Result<PipelineReport> {
    log::info!("Starting pipeline {pipeline} (reoptimize={reoptimize})");

    let mut stages = vec![];
    for step in steps(env, tools, pipeline, reoptimize)? {
        execute_stage(settings, &step.run)?;
        stages.push(compare_stage(settings, &step.comparison)?);
    }

    Ok(PipelineReport { pipeline, stages })
}

/// Everything a `gtr test` run found, as written to the summary file.
#[derive(Clone, Debug, Default, Serialize)]
pub struct RunSummary {
    pub pipelines: Vec<PipelineReport>,
}

impl RunSummary {
    pub fn all_passed(&self) -> bool {
        self.pipelines.iter().all(|p| p.all_passed())
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).with_path(path)?;
        Ok(())
    }
}
