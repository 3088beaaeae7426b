//! Definition of the Clap command line.
//!
//! This is big; we opt to pull it out.
use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "gtr", about = "Golden-file regression tests for the Pika toolchain")]
pub struct CliArgs {
    /// Configuration file.  Defaults to `gtr.yaml` in the working directory, if present.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the selected pipelines and compare against the expectations.
    Test(TestArgs),

    /// Create the directory layout.
    Init,

    /// List fixtures.
    List(ListArgs),

    /// Create a new fixture from a template.
    Create(CreateArgs),

    /// Promote results into the expectation tree.
    Accept(AcceptArgs),

    /// Print the expectation and the result for one fixture.
    View(ViewArgs),
}

#[derive(Debug, Parser)]
pub struct TestArgs {
    /// Generate assembly but don't optimize it.
    #[arg(long)]
    pub codegen: bool,

    /// Generate assembly and optimize it in one go.
    #[arg(long)]
    pub compile: bool,

    /// Optimize the assembly from `--codegen`, read back from disk.
    #[arg(long)]
    pub optimize: bool,

    /// Optimize the hand-written assembly fixtures.
    #[arg(long)]
    pub optimize_standalone: bool,

    /// Run generated assembly through the optimizer again and check it didn't change.
    #[arg(long)]
    pub reoptimize: bool,

    /// Empty the result tree first.
    #[arg(long)]
    pub clean: bool,

    /// Invert all of the above flags, making them subtractive instead of additive.
    #[arg(long)]
    pub invert: bool,

    /// How many toolchain processes may run at once.  Defaults to the number of CPUs plus one.
    #[arg(long)]
    pub threads: Option<usize>,

    /// Seconds before a tool invocation is killed.  0 waits forever.
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Only run fixtures whose name matches this glob.
    #[arg(long)]
    pub pattern: Option<String>,
}

#[derive(Debug, Parser)]
pub struct ListArgs {
    /// List assembly fixtures rather than source fixtures.
    #[arg(long)]
    pub asm: bool,

    /// If specified, filter fixtures with this glob pattern.
    pub pattern: Option<String>,
}

#[derive(Debug, Parser)]
pub struct CreateArgs {
    /// Create an assembly fixture rather than a source fixture.
    #[arg(long)]
    pub asm: bool,

    pub name: String,
}

#[derive(Debug, Parser)]
pub struct AcceptArgs {
    /// The fixture is an assembly fixture.
    #[arg(long)]
    pub asm: bool,

    /// Accept every result.  The old expectations are copied to the backup directory first, replacing any older
    /// backup.
    #[arg(long, conflicts_with = "name")]
    pub all: bool,

    #[arg(required_unless_present = "all")]
    pub name: Option<String>,
}

#[derive(Debug, Parser)]
pub struct ViewArgs {
    /// Which role's directories to look in.
    #[arg(long, default_value = "compiler")]
    pub test_set: String,

    #[arg(long)]
    pub build: bool,

    #[arg(long)]
    pub run: bool,

    #[arg(long)]
    pub asm: bool,

    #[arg(long)]
    pub asmo: bool,

    #[arg(long)]
    pub buildo: bool,

    /// Print the fixture's source.
    #[arg(long)]
    pub test: bool,

    pub name: String,
}
