//! Running one stage of a pipeline over every fixture.
//!
//! The fixture list is sharded and each shard gets a thread, which runs the stage's tool on its fixtures one after the
//! other.  Each fixture's output goes to its own file, so shards never write to the same place and nothing needs
//! locking.  The only failures that stop a stage are failures to write those files, or to clear out what an earlier run
//! carried forward.
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::config::{HarnessConfig, ToolConfig};
use crate::error::{Error, IoResultExt, Result};
use crate::fixtures::{self, FixtureFile};
use crate::noise::NoiseFilter;
use crate::process_coordination::invoke;
use crate::test_filtering::FixtureFilter;

/// Settings shared by every stage of a run.
#[derive(Clone, Debug)]
pub struct RunSettings {
    /// Number of shards, and so the number of toolchain processes which may be alive at once.
    pub concurrency: NonZeroUsize,

    pub timeout: Option<Duration>,
    pub noise: NoiseFilter,
    pub filter: FixtureFilter,
}

/// Available parallelism plus one, so that a process starting up overlaps with one finishing.
pub fn default_concurrency() -> NonZeroUsize {
    let cores = std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1);
    NonZeroUsize::new(cores + 1).expect("Always at least 2")
}

impl RunSettings {
    pub fn from_config(config: &HarnessConfig, filter: FixtureFilter) -> RunSettings {
        RunSettings {
            concurrency: config
                .threads
                .and_then(NonZeroUsize::new)
                .unwrap_or_else(default_concurrency),
            timeout: config.timeout(),
            noise: NoiseFilter::new(&config.noise_markers),
            filter,
        }
    }
}

/// One invocation of a tool over a directory of inputs.
#[derive(Clone, Debug, derive_builder::Builder)]
#[builder(pattern = "owned")]
pub struct StageRun {
    /// Used in logs, e.g. `build/optimizer`.
    #[builder(setter(into))]
    pub label: String,

    #[builder(setter(into))]
    pub input_dir: PathBuf,

    /// Only inputs ending in this are run.
    #[builder(setter(into))]
    pub input_ext: String,

    #[builder(setter(into))]
    pub output_dir: PathBuf,

    #[builder(setter(into))]
    pub output_ext: String,

    /// If set, passed to the tool after the fixture path.  The tool writes artifacts for the next stage there.
    #[builder(default, setter(into, strip_option))]
    pub carry_forward_dir: Option<PathBuf>,

    /// Extension of the artifact the tool leaves in `carry_forward_dir`.  A fixture's artifact from an earlier run is
    /// deleted before the tool runs on it, so a tool which stops producing one leaves nothing behind.
    #[builder(default, setter(into, strip_option))]
    pub carry_forward_ext: Option<String>,

    pub tool: ToolConfig,
}

impl StageRun {
    pub fn output_file(&self, fixture: &str) -> PathBuf {
        self.output_dir
            .join(format!("{fixture}{}", self.output_ext))
    }

    pub fn carry_forward_file(&self, fixture: &str) -> Option<PathBuf> {
        let dir = self.carry_forward_dir.as_deref()?;
        let ext = self.carry_forward_ext.as_deref()?;
        Some(dir.join(format!("{fixture}{ext}")))
    }
}

fn remove_stale(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            log::debug!("Removed stale {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::io(path, e)),
    }
}

fn run_fixture(settings: &RunSettings, stage: &StageRun, fixture: &FixtureFile) -> Result<()> {
    if let Some(stale) = stage.carry_forward_file(&fixture.name) {
        remove_stale(&stale)?;
    }

    let output = invoke(
        &stage.tool,
        &fixture.path,
        stage.carry_forward_dir.as_deref(),
        settings.timeout,
        &settings.noise,
    );

    let dest = stage.output_file(&fixture.name);
    std::fs::write(&dest, &output).with_path(&dest)
}

/// Run `stage` over every input, writing one output file per input.  Returns the number of fixtures run.
///
/// Blocks until every shard is done.  If writing any output or removing a stale artifact fails, the other shards stop at
/// their next fixture and the first such error is returned.
pub fn execute_stage(settings: &RunSettings, stage: &StageRun) -> Result<usize> {
    let inputs = fixtures::enumerate(&stage.input_dir, Some(&stage.input_ext), &settings.filter)?;

    std::fs::create_dir_all(&stage.output_dir).with_path(&stage.output_dir)?;
    if let Some(carry) = stage.carry_forward_dir.as_deref() {
        std::fs::create_dir_all(carry).with_path(carry)?;
    }

    log::info!(
        "{}: running {} on {} fixtures with {} shards",
        stage.label,
        stage.tool.program,
        inputs.len(),
        settings.concurrency
    );

    let aborted = AtomicBool::new(false);

    let per_shard = crate::shard::run_sharded(&inputs, settings.concurrency, |index, shard| {
        let mut done = 0usize;

        for fixture in shard {
            if aborted.load(Ordering::Relaxed) {
                log::debug!("{}: shard {index} stopping early", stage.label);
                break;
            }

            if let Err(e) = run_fixture(settings, stage, fixture) {
                aborted.store(true, Ordering::Relaxed);
                return Err(e);
            }
            done += 1;
        }

        Ok(done)
    })?;

    let mut total = 0;
    for r in per_shard {
        total += r?;
    }

    log::info!("{}: wrote {total} results", stage.label);
    Ok(total)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    use crate::config::StderrPolicy;

    fn settings(concurrency: usize) -> RunSettings {
        RunSettings {
            concurrency: NonZeroUsize::new(concurrency).unwrap(),
            timeout: Some(Duration::from_secs(30)),
            noise: NoiseFilter::new(&[crate::config::DEFAULT_NOISE_MARKER]),
            filter: FixtureFilter::new(vec![".gitignore".into()], None).unwrap(),
        }
    }

    fn cat_tool() -> ToolConfig {
        ToolConfig {
            program: "sh".into(),
            args: vec!["-c".into(), "cat \"$1\"".into(), "cat".into()],
            stderr: StderrPolicy::Capture,
        }
    }

    fn stage(root: &std::path::Path, tool: ToolConfig) -> StageRun {
        StageRunBuilder::default()
            .label("build/test")
            .input_dir(root.join("in"))
            .input_ext(".src")
            .output_dir(root.join("out"))
            .output_ext(".txt")
            .tool(tool)
            .build()
            .unwrap()
    }

    #[test]
    fn one_output_per_fixture_regardless_of_concurrency() {
        for concurrency in [1, 3, 7, 20] {
            let tmp = tempfile::tempdir().unwrap();
            let input = tmp.path().join("in");
            std::fs::create_dir(&input).unwrap();
            for i in 0..7 {
                std::fs::write(input.join(format!("f{i}.src")), format!("fixture {i}\n")).unwrap();
            }
            std::fs::write(input.join("ignored.other"), "x").unwrap();
            std::fs::write(input.join(".gitignore"), "x").unwrap();

            let stage = stage(tmp.path(), cat_tool());
            assert_eq!(execute_stage(&settings(concurrency), &stage).unwrap(), 7);

            let mut written = std::fs::read_dir(tmp.path().join("out"))
                .unwrap()
                .map(|e| e.unwrap().file_name().into_string().unwrap())
                .collect::<Vec<_>>();
            written.sort();
            assert_eq!(
                written,
                (0..7).map(|i| format!("f{i}.txt")).collect::<Vec<_>>()
            );
            assert_eq!(
                std::fs::read_to_string(stage.output_file("f4")).unwrap(),
                "fixture 4\n"
            );
        }
    }

    #[test]
    fn carry_forward_dir_is_passed_and_created() {
        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("in");
        std::fs::create_dir(&input).unwrap();
        std::fs::write(input.join("prog.src"), "body\n").unwrap();

        let tool = ToolConfig {
            program: "sh".into(),
            args: vec![
                "-c".into(),
                "cp \"$1\" \"$2/$(basename \"$1\" .src).asm\"; echo built".into(),
                "codegen".into(),
            ],
            stderr: StderrPolicy::Capture,
        };
        let mut stage = stage(tmp.path(), tool);
        stage.carry_forward_dir = Some(tmp.path().join("asm"));

        execute_stage(&settings(2), &stage).unwrap();
        assert_eq!(
            std::fs::read_to_string(tmp.path().join("asm/prog.asm")).unwrap(),
            "body\n"
        );
        assert_eq!(
            std::fs::read_to_string(stage.output_file("prog")).unwrap(),
            "built\n"
        );
    }

    #[test]
    fn stale_carry_forward_is_removed_when_the_tool_stops_producing_it() {
        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("in");
        std::fs::create_dir(&input).unwrap();
        std::fs::write(input.join("keep.src"), "body\n").unwrap();
        std::fs::write(input.join("drop.src"), "NOASM\n").unwrap();

        let asm = tmp.path().join("asm");
        std::fs::create_dir(&asm).unwrap();
        for name in ["keep", "drop", "other"] {
            std::fs::write(asm.join(format!("{name}.asm")), "stale\n").unwrap();
        }
        std::fs::write(asm.join("drop.asmo"), "not ours\n").unwrap();

        let tool = ToolConfig {
            program: "sh".into(),
            args: vec![
                "-c".into(),
                "grep -q NOASM \"$1\" || cp \"$1\" \"$2/$(basename \"$1\" .src).asm\"".into(),
                "codegen".into(),
            ],
            stderr: StderrPolicy::Capture,
        };
        let mut stage = stage(tmp.path(), tool);
        stage.carry_forward_dir = Some(asm.clone());
        stage.carry_forward_ext = Some(".asm".into());

        assert_eq!(execute_stage(&settings(2), &stage).unwrap(), 2);
        assert_eq!(std::fs::read_to_string(asm.join("keep.asm")).unwrap(), "body\n");
        assert!(!asm.join("drop.asm").exists());
        // Only the fixtures being run are touched.
        assert!(asm.join("other.asm").exists());
        assert!(asm.join("drop.asmo").exists());
    }

    #[test]
    fn unwritable_output_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("in");
        std::fs::create_dir(&input).unwrap();
        std::fs::write(input.join("a.src"), "a").unwrap();
        // A file where the output directory should be.
        std::fs::write(tmp.path().join("out"), "").unwrap();

        let err = execute_stage(&settings(2), &stage(tmp.path(), cat_tool())).unwrap_err();
        assert!(err.is_io());
    }

    #[test]
    fn missing_input_dir_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let err = execute_stage(&settings(2), &stage(tmp.path(), cat_tool())).unwrap_err();
        assert!(err.is_unreadable_directory());
    }
}
