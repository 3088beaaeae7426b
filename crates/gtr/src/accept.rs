//! Promoting results into the expectation tree.
//!
//! Accepting a fixture moves every artifact it has in the result tree to the same place in the expectation tree.  A
//! source fixture goes through the code generator, optimizer and compiler pipelines; an assembly fixture only through
//! the standalone optimizer.  Artifacts which don't exist are skipped, so accepting after running only some pipelines
//! only touches those.
use std::path::Path;

use crate::environment::{Environment, Phase, ToolRole, ASMO_EXT, TXT_EXT};
use crate::error::{IoResultExt, Result};
use crate::fixtures::{self, FixtureKind};
use crate::test_filtering::FixtureFilter;

/// Roles whose artifacts a fixture of `kind` produces.
pub fn roles_for(kind: FixtureKind) -> Vec<ToolRole> {
    ToolRole::ALL
        .into_iter()
        .filter(|r| r.fixture_kind() == kind)
        .collect()
}

/// The phases a role writes to, with the extension used in each.
fn artifacts(role: ToolRole) -> Vec<(Phase, &'static str)> {
    let mut ret = vec![
        (Phase::Build, TXT_EXT),
        (Phase::Run, TXT_EXT),
        (Phase::GeneratedAsm, role.asm_extension()),
    ];
    if role != ToolRole::CodeGenerator {
        ret.push((Phase::ReoptimizedBuild, TXT_EXT));
        ret.push((Phase::RebuiltAsm, ASMO_EXT));
    }
    ret
}

fn move_if_exists(from: &Path, to: &Path) -> Result<bool> {
    if !from.is_file() {
        return Ok(false);
    }

    if let Some(parent) = to.parent() {
        std::fs::create_dir_all(parent).with_path(parent)?;
    }
    std::fs::rename(from, to).with_path(from)?;
    log::debug!("Accepted {} as {}", from.display(), to.display());
    Ok(true)
}

/// Accept one fixture.  Returns how many files were moved.
pub fn accept_fixture(env: &Environment, kind: FixtureKind, name: &str) -> Result<usize> {
    let mut moved = 0;

    for role in roles_for(kind) {
        for (phase, ext) in artifacts(role) {
            let from = env.result.file(phase, role, name, ext);
            let to = env.expect.file(phase, role, name, ext);
            if move_if_exists(&from, &to)? {
                moved += 1;
            }
        }
    }

    log::info!("Accepted {moved} files for {kind} fixture {name}");
    Ok(moved)
}

/// Replace the backup directory with a copy of the expectation tree.
pub fn backup_expectations(env: &Environment) -> Result<()> {
    let backup = &env.backup_dir;
    match std::fs::remove_dir_all(backup) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(crate::Error::io(backup, e)),
    }

    let expect = env.expect.root();
    if !expect.exists() {
        log::warn!(
            "Nothing to back up: {} does not exist",
            expect.display()
        );
        return Ok(());
    }

    let mut copied = 0;
    for entry in walkdir::WalkDir::new(expect) {
        let entry = entry?;
        let src = entry.path();
        let Ok(rel) = src.strip_prefix(expect) else {
            continue;
        };
        let dest = backup.join(rel);

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&dest).with_path(&dest)?;
        } else {
            std::fs::copy(src, &dest).with_path(src)?;
            copied += 1;
        }
    }

    log::info!(
        "Backed up {copied} files from {} to {}",
        expect.display(),
        backup.display()
    );
    Ok(())
}

/// Back up the expectations, then accept every fixture of both kinds.  Returns how many files were moved.
pub fn accept_all(env: &Environment, filter: &FixtureFilter) -> Result<usize> {
    backup_expectations(env)?;

    let mut moved = 0;
    for kind in [FixtureKind::Language, FixtureKind::Assembly] {
        let found = fixtures::enumerate(env.fixtures_dir(kind), Some(kind.extension()), filter)?;
        for fixture in found {
            moved += accept_fixture(env, kind, &fixture.name)?;
        }
    }
    Ok(moved)
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    use crate::config::HarnessConfig;

    fn env(root: &Path) -> Environment {
        let config = HarnessConfig {
            language_fixtures_dir: root.join("tests/pika"),
            assembly_fixtures_dir: root.join("tests/asm"),
            result_dir: root.join("result"),
            expect_dir: root.join("expect"),
            backup_dir: root.join(".backup"),
            bin_dir: root.join("bin"),
            ..Default::default()
        };
        let env = Environment::from_config(&config);
        env.create_dirs().unwrap();
        env
    }

    #[test]
    fn roles_per_kind() {
        assert_eq!(
            roles_for(FixtureKind::Language),
            vec![
                ToolRole::CodeGenerator,
                ToolRole::Compiler,
                ToolRole::Optimizer
            ]
        );
        assert_eq!(
            roles_for(FixtureKind::Assembly),
            vec![ToolRole::StandaloneOptimizer]
        );
    }

    #[test]
    fn moves_existing_artifacts_only() {
        let tmp = tempfile::tempdir().unwrap();
        let env = env(tmp.path());

        let written = [
            (Phase::Build, ToolRole::CodeGenerator, ".txt"),
            (Phase::GeneratedAsm, ToolRole::CodeGenerator, ".asm"),
            (Phase::Run, ToolRole::Compiler, ".txt"),
            (Phase::RebuiltAsm, ToolRole::Optimizer, ".asmo"),
        ];
        for (phase, role, ext) in written {
            std::fs::write(env.result.file(phase, role, "fact", ext), "out").unwrap();
        }
        // Another fixture's result is left alone.
        let other = env.result.file(Phase::Build, ToolRole::Compiler, "other", ".txt");
        std::fs::write(&other, "x").unwrap();

        assert_eq!(accept_fixture(&env, FixtureKind::Language, "fact").unwrap(), 4);
        for (phase, role, ext) in written {
            assert!(!env.result.file(phase, role, "fact", ext).exists());
            assert_eq!(
                std::fs::read_to_string(env.expect.file(phase, role, "fact", ext)).unwrap(),
                "out"
            );
        }
        assert!(other.exists());
    }

    #[test]
    fn assembly_fixtures_only_touch_the_standalone_optimizer() {
        let tmp = tempfile::tempdir().unwrap();
        let env = env(tmp.path());

        let standalone = env
            .result
            .file(Phase::GeneratedAsm, ToolRole::StandaloneOptimizer, "loop", ".asmo");
        let compiler = env.result.file(Phase::Build, ToolRole::Compiler, "loop", ".txt");
        std::fs::write(&standalone, "a").unwrap();
        std::fs::write(&compiler, "b").unwrap();

        assert_eq!(accept_fixture(&env, FixtureKind::Assembly, "loop").unwrap(), 1);
        assert!(!standalone.exists());
        assert!(compiler.exists());
    }

    #[test]
    fn accept_all_backs_up_first() {
        let tmp = tempfile::tempdir().unwrap();
        let env = env(tmp.path());

        std::fs::write(env.language_fixtures_dir.join("a.pika"), "").unwrap();
        std::fs::write(env.assembly_fixtures_dir.join("b.asm"), "").unwrap();

        let expect_a = env.expect.file(Phase::Run, ToolRole::Compiler, "a", ".txt");
        std::fs::write(&expect_a, "old").unwrap();
        std::fs::write(env.result.file(Phase::Run, ToolRole::Compiler, "a", ".txt"), "new").unwrap();
        std::fs::write(
            env.result.file(Phase::Run, ToolRole::StandaloneOptimizer, "b", ".txt"),
            "new b",
        )
        .unwrap();

        // A stale backup is replaced, not merged.
        std::fs::create_dir_all(&env.backup_dir).unwrap();
        std::fs::write(env.backup_dir.join("stale"), "").unwrap();

        assert_eq!(accept_all(&env, &FixtureFilter::default()).unwrap(), 2);

        assert_eq!(std::fs::read_to_string(&expect_a).unwrap(), "new");
        let backed_up = env.backup_dir.join("run/compiler/a.txt");
        assert_eq!(std::fs::read_to_string(backed_up).unwrap(), "old");
        assert!(!env.backup_dir.join("stale").exists());
        assert_eq!(
            std::fs::read_to_string(env.expect.file(
                Phase::Run,
                ToolRole::StandaloneOptimizer,
                "b",
                ".txt"
            ))
            .unwrap(),
            "new b"
        );
    }

    #[test]
    fn backup_copies_the_whole_tree() {
        let tmp = tempfile::tempdir().unwrap();
        let env = env(tmp.path());

        let expect = env.expect.root();
        std::fs::create_dir_all(expect.join("deep/er/still")).unwrap();
        std::fs::create_dir_all(expect.join("empty")).unwrap();
        std::fs::write(expect.join("top.txt"), "top").unwrap();
        std::fs::write(expect.join("deep/er/still/leaf.asm"), "leaf").unwrap();

        backup_expectations(&env).unwrap();

        let backup = &env.backup_dir;
        assert_eq!(std::fs::read_to_string(backup.join("top.txt")).unwrap(), "top");
        assert_eq!(
            std::fs::read_to_string(backup.join("deep/er/still/leaf.asm")).unwrap(),
            "leaf"
        );
        assert!(backup.join("empty").is_dir());
        // The expectation tree is copied, not moved.
        assert!(expect.join("top.txt").exists());
    }

    #[test]
    fn backup_of_missing_tree_is_a_no_op() {
        let tmp = tempfile::tempdir().unwrap();
        let env = env(tmp.path());
        std::fs::remove_dir_all(env.expect.root()).unwrap();

        backup_expectations(&env).unwrap();
        assert!(!env.backup_dir.exists());
    }
}
