use std::io::Read;
use std::path::Path;
use std::process as proc;
use std::time::{Duration, Instant};

use crossbeam::channel as chan;

use crate::config::{StderrPolicy, ToolConfig};
use crate::noise::NoiseFilter;

/// How often a process with a deadline is polled for exit.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// After killing a process which timed out, wait at most this long for its pipes to close.
///
/// Pipes can outlive the process we killed if it left children behind (wine does), and we'd rather lose their output
/// than hang.
const PIPE_GRACE: Duration = Duration::from_secs(1);

/// Everything captured from one run of a tool.
#[derive(Debug, Default)]
pub struct Capture {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,

    /// `None` if the process couldn't be launched or waited on.
    pub status: Option<proc::ExitStatus>,

    /// The process was killed for running past its deadline.
    pub timed_out: bool,
}

impl Capture {
    /// Stdout followed by stderr.
    pub fn combined(mut self) -> Vec<u8> {
        self.stdout.append(&mut self.stderr);
        self.stdout
    }

    /// Exited zero before the deadline.
    pub fn succeeded(&self) -> bool {
        !self.timed_out && self.status.map(|s| s.success()).unwrap_or(false)
    }
}

/// Read a pipe to the end on a background thread.  The receiver yields the bytes once the pipe closes.
fn drain_pipe<R: Read + Send + 'static>(pipe: Option<R>) -> Option<chan::Receiver<Vec<u8>>> {
    let mut pipe = pipe?;
    let (tx, rx) = chan::bounded(1);

    std::thread::spawn(move || {
        let mut buf = vec![];
        if let Err(e) = pipe.read_to_end(&mut buf) {
            log::debug!("Error reading from child pipe after {} bytes: {e}", buf.len());
        }
        // The receiver may have given up on us.
        let _ = tx.send(buf);
    });

    Some(rx)
}

fn collect_pipe(rx: Option<chan::Receiver<Vec<u8>>>, timed_out: bool) -> Vec<u8> {
    let Some(rx) = rx else {
        return vec![];
    };

    let got = if timed_out {
        rx.recv_timeout(PIPE_GRACE).ok()
    } else {
        rx.recv().ok()
    };
    got.unwrap_or_default()
}

/// Wait for the child, killing it if it's still running at the deadline.  Returns the exit status and whether it
/// timed out.
fn wait_with_deadline(
    child: &mut proc::Child,
    timeout: Option<Duration>,
) -> std::io::Result<(proc::ExitStatus, bool)> {
    let Some(timeout) = timeout else {
        return Ok((child.wait()?, false));
    };

    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok((status, false));
        }

        if Instant::now() >= deadline {
            // The process may exit on its own between try_wait and kill, in which case kill fails and wait still
            // reaps it.
            let _ = child.kill();
            return Ok((child.wait()?, true));
        }

        std::thread::sleep(POLL_INTERVAL);
    }
}

/// Run `tool` on one fixture: `program args... fixture [target_dir]`.
///
/// Nothing here is an error.  A tool that can't be launched, crashes, exits non-zero or times out is exactly what the
/// harness exists to catch, so all of those produce a [Capture] holding whatever output there was, and the problem
/// shows up as a mismatch against the expectation.
pub fn exec_subprocess(
    tool: &ToolConfig,
    fixture: &Path,
    target_dir: Option<&Path>,
    timeout: Option<Duration>,
) -> Capture {
    let mut command = proc::Command::new(&tool.program);
    command.args(&tool.args).arg(fixture);
    if let Some(t) = target_dir {
        command.arg(t);
    }

    let stderr = match tool.stderr {
        StderrPolicy::Capture => proc::Stdio::piped(),
        StderrPolicy::Discard => proc::Stdio::null(),
    };
    command
        .stdin(proc::Stdio::null())
        .stdout(proc::Stdio::piped())
        .stderr(stderr);

    log::trace!("Running {command:?}");

    let mut child = match command.spawn() {
        Ok(c) => c,
        Err(e) => {
            log::warn!(
                "Unable to launch {} for {}: {e}",
                tool.program,
                fixture.display()
            );
            return Capture::default();
        }
    };

    let stdout_rx = drain_pipe(child.stdout.take());
    let stderr_rx = drain_pipe(child.stderr.take());

    let (status, timed_out) = match wait_with_deadline(&mut child, timeout) {
        Ok((s, t)) => (Some(s), t),
        Err(e) => {
            log::warn!("Failed waiting on {} for {}: {e}", tool.program, fixture.display());
            (None, false)
        }
    };

    if timed_out {
        log::warn!(
            "{} timed out on {} after {:?} and was killed",
            tool.program,
            fixture.display(),
            timeout.unwrap_or_default()
        );
    } else if let Some(s) = status.filter(|s| !s.success()) {
        log::debug!("{} exited with {s} on {}", tool.program, fixture.display());
    }

    Capture {
        stdout: collect_pipe(stdout_rx, timed_out),
        stderr: collect_pipe(stderr_rx, timed_out),
        status,
        timed_out,
    }
}

/// Run a tool on a fixture and return the output as it should be persisted: stdout then stderr, noise stripped.
pub fn invoke(
    tool: &ToolConfig,
    fixture: &Path,
    target_dir: Option<&Path>,
    timeout: Option<Duration>,
    noise: &NoiseFilter,
) -> Vec<u8> {
    let capture = exec_subprocess(tool, fixture, target_dir, timeout);
    if !capture.succeeded() {
        log::debug!(
            "{} on {} did not succeed (status {:?}, timed out: {})",
            tool.program,
            fixture.display(),
            capture.status,
            capture.timed_out
        );
    }
    noise.strip(&capture.combined())
}
