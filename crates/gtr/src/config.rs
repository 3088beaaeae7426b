//! Harness configuration.
//!
//! Everything here has a default matching the layout the toolchain repository has always used, so most checkouts need
//! no config file at all.  If a `gtr.yaml` is present in the working directory (or one is passed with `--config`) any
//! field set there overrides the default.  The configuration is read once at startup and never mutated afterward; the
//! directory layout derived from it lives in [crate::environment].
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{IoResultExt, Result};

/// Name of the config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "gtr.yaml";

/// Lines of toolchain output containing this are dropped before anything is written or compared.
///
/// The toolchain's logger stamps these with the time, so they would never match a golden file.
pub const DEFAULT_NOISE_MARKER: &str = "logging.PikaLogger log";

/// What to do with a tool's stderr.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize, derive_more::IsVariant)]
#[serde(rename_all = "snake_case")]
pub enum StderrPolicy {
    /// Append stderr after stdout in the captured output.
    #[default]
    Capture,

    /// Throw stderr away.
    ///
    /// Used for the emulator, which runs under wine and writes wine's own chatter to stderr.  Emulator failures are
    /// visible as short or empty stdout instead.
    Discard,
}

/// How to launch one external tool.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ToolConfig {
    pub program: String,

    /// Fixed arguments, placed before the fixture path.
    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default)]
    pub stderr: StderrPolicy,
}

impl ToolConfig {
    fn jar(bin_dir: &Path, jar: &str) -> ToolConfig {
        ToolConfig {
            program: "java".to_string(),
            args: vec![
                "-ea".to_string(),
                "-jar".to_string(),
                bin_dir.join(jar).display().to_string(),
            ],
            stderr: StderrPolicy::Capture,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ToolchainConfig {
    pub code_generator: ToolConfig,
    pub compiler: ToolConfig,
    pub optimizer: ToolConfig,
    pub emulator: ToolConfig,
}

impl ToolchainConfig {
    fn for_bin_dir(bin_dir: &Path) -> ToolchainConfig {
        ToolchainConfig {
            code_generator: ToolConfig::jar(bin_dir, "pika-codegen.jar"),
            compiler: ToolConfig::jar(bin_dir, "pika-compiler.jar"),
            optimizer: ToolConfig::jar(bin_dir, "pika-optimizer.jar"),
            emulator: ToolConfig {
                program: "wine".to_string(),
                args: vec![bin_dir.join("ASMEmu.exe").display().to_string()],
                stderr: StderrPolicy::Discard,
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Where the toolchain binaries live.  Created by `gtr init`.
    pub bin_dir: PathBuf,

    /// Source-language fixtures.
    pub language_fixtures_dir: PathBuf,

    /// Hand-written assembly fixtures, fed straight to the optimizer.
    pub assembly_fixtures_dir: PathBuf,

    pub result_dir: PathBuf,
    pub expect_dir: PathBuf,

    /// `accept --all` copies the expectation tree here before overwriting it.
    pub backup_dir: PathBuf,

    pub noise_markers: Vec<String>,

    /// Directory entries containing any of these are never treated as fixtures.
    pub ignore_markers: Vec<String>,

    /// Per-invocation limit.  `None` waits forever.
    pub timeout_secs: Option<u64>,

    /// Overrides the thread count.  Defaults to available parallelism plus one.
    pub threads: Option<usize>,

    /// If unset, derived from `bin_dir`.
    pub toolchain: Option<ToolchainConfig>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        HarnessConfig {
            bin_dir: PathBuf::from("bin"),
            language_fixtures_dir: PathBuf::from("tests/pika"),
            assembly_fixtures_dir: PathBuf::from("tests/asm"),
            result_dir: PathBuf::from("result"),
            expect_dir: PathBuf::from("expect"),
            backup_dir: PathBuf::from(".backup"),
            noise_markers: vec![DEFAULT_NOISE_MARKER.to_string()],
            ignore_markers: vec![".gitignore".to_string(), ".directory".to_string()],
            timeout_secs: Some(60),
            threads: None,
            toolchain: None,
        }
    }
}

impl HarnessConfig {
    /// Load configuration.
    ///
    /// With an explicit path the file must exist.  Without one, [DEFAULT_CONFIG_FILE] is used if present and the
    /// defaults otherwise.
    pub fn load(explicit: Option<&Path>) -> Result<HarnessConfig> {
        let path = match explicit {
            Some(p) => p.to_path_buf(),
            None => {
                let p = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !p.exists() {
                    log::debug!("No {DEFAULT_CONFIG_FILE}; using the default configuration");
                    return Ok(HarnessConfig::default());
                }
                p
            }
        };

        let text = std::fs::read_to_string(&path).with_path(&path)?;
        let config = Self::from_yaml(&text)?;
        log::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_yaml(text: &str) -> Result<HarnessConfig> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn toolchain(&self) -> ToolchainConfig {
        self.toolchain
            .clone()
            .unwrap_or_else(|| ToolchainConfig::for_bin_dir(&self.bin_dir))
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_match_toolchain_layout() {
        let config = HarnessConfig::default();
        let tools = config.toolchain();

        assert_eq!(tools.code_generator.program, "java");
        assert_eq!(
            tools.code_generator.args,
            vec!["-ea", "-jar", "bin/pika-codegen.jar"]
        );
        assert_eq!(tools.emulator.program, "wine");
        assert!(tools.emulator.stderr.is_discard());
        assert!(tools.optimizer.stderr.is_capture());
        assert_eq!(config.noise_markers, vec![DEFAULT_NOISE_MARKER]);
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config = HarnessConfig::from_yaml(
            r#"
result_dir: out/result
timeout_secs: null
toolchain:
  code_generator: { program: ./codegen }
  compiler: { program: ./compiler, args: [--fast] }
  optimizer: { program: ./opt }
  emulator: { program: ./emu, stderr: discard }
"#,
        )
        .unwrap();

        assert_eq!(config.result_dir, PathBuf::from("out/result"));
        assert_eq!(config.expect_dir, PathBuf::from("expect"));
        assert_eq!(config.timeout(), None);

        let tools = config.toolchain();
        assert_eq!(tools.compiler.args, vec!["--fast"]);
        assert!(tools.code_generator.args.is_empty());
        assert!(tools.emulator.stderr.is_discard());
    }

    #[test]
    fn bad_yaml_is_a_config_error() {
        assert!(HarnessConfig::from_yaml("noise_markers: 5").is_err());
    }
}
