//! A log handler which will create a set of files `logs/level.txt` where each file contains all logs of that level or
//! more severe.
//!
//! Warnings and errors also go to stderr, since those are usually a broken toolchain setup (a tool that can't be
//! launched, a tool that hangs) and the user wants to know now rather than by digging through the result tree.
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::Instant;

use anyhow::{Context, Result};
use log::Level;

// We log relative to the start of the run, which is set when the log handler is installed by being sure to touch this
// static.
lazy_static::lazy_static! {
    static ref EPOCH: Instant = Instant::now();
}

struct LogHandlerState {
    /// Sorted from Error to Trace.
    files: Vec<(Level, File)>,
}

struct LogHandler {
    state: Mutex<LogHandlerState>,

    /// Records at this level or more severe are echoed to stderr.
    echo_level: Level,
}

/// Redirects all logs to `dir/level.txt`.
pub fn install_log_handler(dir: &Path, echo_level: Level) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("While creating the log directory {}", dir.display()))?;

    let files = [
        (Level::Error, "error.txt"),
        (Level::Warn, "warn.txt"),
        (Level::Info, "info.txt"),
        (Level::Debug, "debug.txt"),
        (Level::Trace, "trace.txt"),
    ]
    .into_iter()
    .map(|(l, subpath)| {
        let fullpath = dir.join(subpath);
        let file = File::create(&fullpath)
            .with_context(|| format!("While opening log file {}", fullpath.display()))?;
        Ok((l, file))
    })
    .collect::<Result<Vec<_>>>()?;

    let handler = LogHandler {
        state: Mutex::new(LogHandlerState { files }),
        echo_level,
    };

    log::set_max_level(log::LevelFilter::Trace);
    log::set_boxed_logger(Box::new(handler)).context("Unable to install logger")?;
    // Logging this makes sure that the epoch is set.
    log::trace!("Logger installed");
    Ok(())
}

impl log::Log for LogHandler {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn flush(&self) {
        let mut state = self.state.lock().unwrap();
        for (_, file) in state.files.iter_mut() {
            let _ = file.flush();
        }
    }

    fn log(&self, record: &log::Record) {
        let since_epoch = Instant::now() - *EPOCH;
        let since_epoch =
            chrono::TimeDelta::from_std(since_epoch).unwrap_or_else(|_| chrono::TimeDelta::zero());

        let message = format!(
            "{since_epoch}: {}: {} (at target {} line {})",
            record.level(),
            record.args(),
            record.target(),
            record.line().unwrap_or(0)
        );

        if record.level() <= self.echo_level {
            eprintln!("{}: {}", record.level(), record.args());
        }

        let mut state = self.state.lock().unwrap();

        for (level, file) in state.files.iter_mut() {
            if record.level() > *level {
                continue;
            }

            // Nowhere to report a failure to log; the record still reached stderr if it mattered.
            let _ = writeln!(file, "{message}");
        }
    }
}
