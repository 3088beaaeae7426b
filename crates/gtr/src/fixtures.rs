//! Finding fixtures on disk.
//!
//! A fixture is identified by its name: the file name up to the first `.`.  The same name follows the fixture through
//! every phase, so `loops.pika` becomes `build/compiler/loops.txt`, `asm/compiler/loops.asm`, and so on.
use std::path::{Path, PathBuf};

use crate::environment::{ASM_EXT, LANGUAGE_EXT};
use crate::error::{Error, IoResultExt, Result};
use crate::test_filtering::FixtureFilter;

/// Where a fixture comes from.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq, derive_more::Display, derive_more::IsVariant)]
pub enum FixtureKind {
    /// A program in the source language.
    #[display(fmt = "source")]
    Language,

    /// Hand-written assembly, used only by the standalone optimizer pipeline.
    #[display(fmt = "assembly")]
    Assembly,
}

impl FixtureKind {
    pub fn extension(&self) -> &'static str {
        match self {
            FixtureKind::Language => LANGUAGE_EXT,
            FixtureKind::Assembly => ASM_EXT,
        }
    }

    /// What `gtr create` writes into a new fixture.
    pub fn template(&self) -> &'static str {
        match self {
            FixtureKind::Language => "exec {\n\n}\n",
            FixtureKind::Assembly => "Halt\n",
        }
    }
}

/// One file found by [enumerate].
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct FixtureFile {
    /// The name without any extension.
    pub name: String,
    pub path: PathBuf,
}

/// Strip everything from the first `.` onward.
///
/// Not [Path::file_stem]: `x.asm.txt` must map to `x`, not `x.asm`.
pub fn fixture_name(file_name: &str) -> &str {
    file_name
        .split_once('.')
        .map(|(prefix, _)| prefix)
        .unwrap_or(file_name)
}

/// List the fixtures in `dir`, sorted by file name.
///
/// If `extension` is given only files ending in it are returned, so `.asm` does not pick up `.asmo`.  Subdirectories
/// and anything rejected by `filter` are skipped.  The directory must exist; failing to read it is fatal.
pub fn enumerate(
    dir: &Path,
    extension: Option<&str>,
    filter: &FixtureFilter,
) -> Result<Vec<FixtureFile>> {
    let entries = std::fs::read_dir(dir).map_err(|e| Error::unreadable_directory(dir, e))?;

    let mut ret = vec![];
    for entry in entries {
        let entry = entry.map_err(|e| Error::unreadable_directory(dir, e))?;
        let path = entry.path();

        if entry.file_type().with_path(&path)?.is_dir() {
            continue;
        }

        // Non-UTF-8 names can't be matched against extensions; the toolchain doesn't produce them either.
        let Some(file_name) = entry.file_name().to_str().map(str::to_string) else {
            log::warn!("Skipping non-UTF-8 file name {}", path.display());
            continue;
        };

        if filter.is_ignored(&file_name) {
            continue;
        }

        if let Some(ext) = extension {
            if !file_name.ends_with(ext) {
                continue;
            }
        }

        let name = fixture_name(&file_name);
        if !filter.matches_name(name) {
            continue;
        }

        ret.push(FixtureFile {
            name: name.to_string(),
            path,
        });
    }

    ret.sort_unstable_by(|a, b| a.path.file_name().cmp(&b.path.file_name()));
    log::debug!(
        "Found {} fixtures in {} (extension {:?})",
        ret.len(),
        dir.display(),
        extension
    );
    Ok(ret)
}
