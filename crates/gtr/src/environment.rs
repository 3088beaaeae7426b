//! The directory layout the harness works in.
//!
//! There are two isomorphic trees, one for results and one for expectations, each laid out as
//! `<root>/<phase>/<role>/<fixture><ext>`.  The result tree is rewritten on every run.  The expectation tree is the
//! golden baseline and only changes through `gtr accept`.  On top of those we have the two fixture source directories,
//! the directory holding the toolchain binaries, and a backup directory used by `accept --all`.
//!
//! An [Environment] is built once from the [HarnessConfig] at startup and then only ever borrowed.
use std::path::{Path, PathBuf};

use crate::config::HarnessConfig;
use crate::error::{IoResultExt, Result};
use crate::fixtures::FixtureKind;

/// A pipeline milestone.  Each gets its own directory in both trees.
#[derive(Copy, Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, derive_more::Display)]
pub enum Phase {
    /// Log of building: whatever the code generator, compiler or optimizer printed.
    #[display(fmt = "build")]
    Build,

    /// Output of running the built assembly in the emulator.
    #[display(fmt = "run")]
    Run,

    /// Assembly written by the build step, consumed by the run step.
    #[display(fmt = "asm")]
    GeneratedAsm,

    /// Assembly written by feeding [Phase::GeneratedAsm] back through the optimizer.
    #[display(fmt = "asmo")]
    RebuiltAsm,

    /// Log of the re-optimization.
    #[display(fmt = "buildo")]
    ReoptimizedBuild,
}

impl Phase {
    pub const ALL: [Phase; 5] = [
        Phase::Build,
        Phase::Run,
        Phase::GeneratedAsm,
        Phase::RebuiltAsm,
        Phase::ReoptimizedBuild,
    ];
}

/// Which tool produced the artifacts in a directory.
#[derive(Copy, Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, derive_more::Display)]
pub enum ToolRole {
    #[display(fmt = "codegenerator")]
    CodeGenerator,

    /// Code generator and optimizer in one process.
    #[display(fmt = "compiler")]
    Compiler,

    /// The optimizer, reading the code generator's assembly back from disk.
    #[display(fmt = "optimizer")]
    Optimizer,

    /// The optimizer, fed hand-written assembly fixtures.
    #[display(fmt = "optimizer-standalone")]
    StandaloneOptimizer,
}

impl ToolRole {
    pub const ALL: [ToolRole; 4] = [
        ToolRole::CodeGenerator,
        ToolRole::Compiler,
        ToolRole::Optimizer,
        ToolRole::StandaloneOptimizer,
    ];

    /// Parse the on-disk name, e.g. `optimizer-standalone`.
    pub fn from_dir_name(name: &str) -> Option<ToolRole> {
        Self::ALL.into_iter().find(|r| r.to_string() == name)
    }

    /// Extension of the assembly this role writes into [Phase::GeneratedAsm].
    pub fn asm_extension(&self) -> &'static str {
        match self {
            ToolRole::CodeGenerator | ToolRole::Compiler => ASM_EXT,
            ToolRole::Optimizer | ToolRole::StandaloneOptimizer => ASMO_EXT,
        }
    }

    /// Which fixtures feed this role.
    pub fn fixture_kind(&self) -> FixtureKind {
        match self {
            ToolRole::StandaloneOptimizer => FixtureKind::Assembly,
            _ => FixtureKind::Language,
        }
    }
}

/// Extension of build and run logs.
pub const TXT_EXT: &str = ".txt";

/// Extension of unoptimized assembly, and of hand-written assembly fixtures.
pub const ASM_EXT: &str = ".asm";

/// Extension of optimized assembly.
pub const ASMO_EXT: &str = ".asmo";

/// Extension of source-language fixtures.
pub const LANGUAGE_EXT: &str = ".pika";

/// Where each artifact of a phase and role goes in the tree rooted at `root`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DirTree {
    root: PathBuf,
}

impl DirTree {
    pub fn new(root: impl Into<PathBuf>) -> DirTree {
        DirTree { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn dir(&self, phase: Phase, role: ToolRole) -> PathBuf {
        self.root.join(phase.to_string()).join(role.to_string())
    }

    /// The file for `fixture` with extension `ext` in the given phase and role.
    pub fn file(&self, phase: Phase, role: ToolRole, fixture: &str, ext: &str) -> PathBuf {
        self.dir(phase, role).join(format!("{fixture}{ext}"))
    }

    /// Every `(phase, role)` directory of this tree.
    pub fn all_dirs(&self) -> impl Iterator<Item = PathBuf> + '_ {
        Phase::ALL.into_iter().flat_map(move |p| {
            ToolRole::ALL
                .into_iter()
                .map(move |r| self.dir(p, r))
        })
    }
}

#[derive(Clone, Debug)]
pub struct Environment {
    pub bin_dir: PathBuf,
    pub language_fixtures_dir: PathBuf,
    pub assembly_fixtures_dir: PathBuf,
    pub result: DirTree,
    pub expect: DirTree,
    pub backup_dir: PathBuf,
}

/// Written into the result root after a `gtr test` run.
pub const SUMMARY_FILE: &str = "summary.json";

/// Logs for a run go into this directory under the result root.
pub const LOGS_DIR: &str = "logs";

impl Environment {
    pub fn from_config(config: &HarnessConfig) -> Environment {
        Environment {
            bin_dir: config.bin_dir.clone(),
            language_fixtures_dir: config.language_fixtures_dir.clone(),
            assembly_fixtures_dir: config.assembly_fixtures_dir.clone(),
            result: DirTree::new(&config.result_dir),
            expect: DirTree::new(&config.expect_dir),
            backup_dir: config.backup_dir.clone(),
        }
    }

    pub fn fixtures_dir(&self, kind: FixtureKind) -> &Path {
        match kind {
            FixtureKind::Language => &self.language_fixtures_dir,
            FixtureKind::Assembly => &self.assembly_fixtures_dir,
        }
    }

    pub fn summary_file(&self) -> PathBuf {
        self.result.root().join(SUMMARY_FILE)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.result.root().join(LOGS_DIR)
    }

    /// Create every directory the harness expects to exist.  Existing directories are left alone.
    pub fn create_dirs(&self) -> Result<()> {
        let fixed = [
            self.bin_dir.clone(),
            self.language_fixtures_dir.clone(),
            self.assembly_fixtures_dir.clone(),
        ];

        for dir in fixed
            .into_iter()
            .chain(self.expect.all_dirs())
            .chain(self.result.all_dirs())
        {
            std::fs::create_dir_all(&dir).with_path(&dir)?;
            log::debug!("Ensured directory {}", dir.display());
        }

        Ok(())
    }

    /// Delete every regular file in the result tree, save those matching one of `ignore_markers`.
    ///
    /// Directories which don't exist yet are skipped.  Returns how many files were removed.
    pub fn clean_results(&self, ignore_markers: &[String]) -> Result<usize> {
        let mut removed = 0;

        for dir in self.result.all_dirs() {
            let entries = match std::fs::read_dir(&dir) {
                Ok(e) => e,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(crate::Error::unreadable_directory(&dir, e)),
            };

            for entry in entries {
                let entry = entry.with_path(&dir)?;
                let name = entry.file_name().to_string_lossy().into_owned();
                if ignore_markers.iter().any(|m| name.contains(m.as_str())) {
                    continue;
                }

                let path = entry.path();
                if entry.file_type().with_path(&path)?.is_file() {
                    std::fs::remove_file(&path).with_path(&path)?;
                    removed += 1;
                }
            }
        }

        log::info!("Removed {removed} files from {}", self.result.root().display());
        Ok(removed)
    }
}
