//! Energy Sampler Supervision
//!
//! Wraps the external energy-sampling tool (EnergiBridge-compatible) for the
//! duration of one measurement window. The tool wraps an idle command and
//! records power/energy readings into a CSV file; it never self-terminates,
//! so the caller stops it explicitly and reads the destination back.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, warn};

use joulecast_telemetry::RawTable;

use crate::ErrorKind;

/// Accepted sampler binary names probed on the search path.
pub const SAMPLER_BINARY_CANDIDATES: &[&str] = &["energibridge", "energy-bridge"];

/// Environment variable overriding the sampler binary path.
pub const SAMPLER_PATH_ENV: &str = "JOULECAST_SAMPLER";

/// How the external sampler is located and driven.
#[derive(Debug, Clone)]
pub struct SamplerSettings {
    /// Explicit binary path; wins over the environment and the search path.
    pub path_override: Option<PathBuf>,
    /// Sampling interval passed to the tool.
    pub interval: Duration,
    /// How long after spawn the process must still be alive for startup to
    /// count as successful.
    pub startup_grace: Duration,
    /// How long to wait after the stop signal before force-killing.
    pub stop_timeout: Duration,
    /// Wrap the invocation in `sudo -n` on Linux, where energy counters
    /// usually require elevated privileges.
    pub elevate: bool,
}

impl Default for SamplerSettings {
    fn default() -> Self {
        Self {
            path_override: None,
            interval: Duration::from_millis(500),
            startup_grace: Duration::from_millis(500),
            stop_timeout: Duration::from_secs(10),
            elevate: false,
        }
    }
}

/// Sampler failure classification.
#[derive(Debug, Error)]
pub enum SamplerError {
    /// No sampler binary could be located.
    #[error(
        "energy sampler binary not found; install energibridge, set sampler.path, \
         or export {SAMPLER_PATH_ENV}"
    )]
    NotFound,

    /// The process could not be spawned at all.
    #[error("failed to spawn energy sampler: {0}")]
    SpawnFailed(#[from] std::io::Error),

    /// The process exited within the startup grace window.
    #[error("energy sampler failed to start: {0}")]
    StartFailed(String),

    /// The output destination could not be read back after a clean stop.
    #[error("could not read sampler output {path}: {source}")]
    OutputUnreadable {
        /// Destination file that failed to read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

impl SamplerError {
    /// The persisted failure classification for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SamplerError::NotFound => ErrorKind::SamplerNotFound,
            _ => ErrorKind::SamplerCrashed,
        }
    }
}

/// Parsed sampler output plus crash information.
///
/// An early exit still yields whatever partial rows made it to disk: partial
/// data is preferred over no data.
#[derive(Debug)]
pub struct SamplerOutput {
    /// Parsed telemetry table (possibly empty).
    pub table: RawTable,
    /// Set when the process exited before it was told to stop.
    pub crash: Option<String>,
}

/// The energy sampler as configured for a run. The no-op variant backs
/// dry-run mode: it starts nothing and yields an empty table.
#[derive(Debug)]
pub enum EnergySampler {
    /// Drive the real external tool.
    External(SamplerSettings),
    /// Record nothing (dry-run).
    Noop,
}

impl EnergySampler {
    /// Resolve the sampler binary: override path, then the
    /// [`SAMPLER_PATH_ENV`] environment variable, then accepted names on the
    /// search path.
    pub fn resolve_binary(&self) -> Result<PathBuf, SamplerError> {
        let settings = match self {
            EnergySampler::External(settings) => settings,
            EnergySampler::Noop => return Err(SamplerError::NotFound),
        };
        if let Some(path) = &settings.path_override {
            if path.is_file() {
                return Ok(path.clone());
            }
            return Err(SamplerError::NotFound);
        }
        if let Ok(path) = std::env::var(SAMPLER_PATH_ENV) {
            let path = PathBuf::from(path);
            if path.is_file() {
                return Ok(path);
            }
            return Err(SamplerError::NotFound);
        }
        for candidate in SAMPLER_BINARY_CANDIDATES {
            if let Ok(path) = which::which(candidate) {
                return Ok(path);
            }
        }
        Err(SamplerError::NotFound)
    }

    /// Start sampling into `output`, overwriting any previous file there.
    ///
    /// The spawned tool runs until [`RunningSampler::stop`] (or
    /// [`RunningSampler::discard`]) terminates it.
    pub fn start(&self, output: &Path) -> Result<RunningSampler, SamplerError> {
        let settings = match self {
            EnergySampler::External(settings) => settings,
            EnergySampler::Noop => {
                debug!("dry-run: energy sampler skipped");
                return Ok(RunningSampler::Noop);
            }
        };

        let binary = self.resolve_binary()?;
        let mut command = sampler_command(&binary, settings, output);
        debug!(binary = %binary.display(), output = %output.display(), "starting energy sampler");

        let mut child = command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;

        // The tool needs a moment to initialise its backend; an exit inside
        // the grace window means it never started sampling.
        std::thread::sleep(settings.startup_grace);
        if let Some(status) = child.try_wait()? {
            let stderr = drain_stderr(&mut child);
            return Err(SamplerError::StartFailed(format!(
                "exited with {status} during startup: {stderr}"
            )));
        }

        Ok(RunningSampler::External {
            child,
            output: output.to_path_buf(),
            stop_timeout: settings.stop_timeout,
        })
    }
}

/// Build the sampler command line: `<bin> --output <dest> --interval <ms>
/// -- <idle command>`, optionally wrapped in `sudo -n` on Linux.
fn sampler_command(binary: &Path, settings: &SamplerSettings, output: &Path) -> Command {
    let mut args: Vec<String> = vec![
        "--output".to_string(),
        output.display().to_string(),
        "--interval".to_string(),
        settings.interval.as_millis().to_string(),
        "--".to_string(),
    ];
    args.extend(idle_command().iter().map(|s| s.to_string()));

    if settings.elevate && cfg!(target_os = "linux") {
        let mut command = Command::new("sudo");
        command.arg("-n").arg(binary).args(&args);
        command
    } else {
        let mut command = Command::new(binary);
        command.args(&args);
        command
    }
}

/// A long-running benign command for the sampler to wrap; the sampler
/// records until the caller terminates it, so the command just has to stay
/// alive.
fn idle_command() -> &'static [&'static str] {
    if cfg!(windows) {
        &["ping", "-n", "99999", "127.0.0.1"]
    } else {
        &["sleep", "99999"]
    }
}

fn drain_stderr(child: &mut Child) -> String {
    use std::io::Read;
    let mut stderr = String::new();
    if let Some(pipe) = child.stderr.as_mut() {
        let _ = pipe.read_to_string(&mut stderr);
    }
    stderr.trim().to_string()
}

/// Ask a process to stop gracefully. SIGINT makes the sampler flush and
/// close its output file before exiting.
#[cfg(unix)]
fn send_stop_signal(pid: u32) -> Result<(), std::io::Error> {
    let ret = unsafe { libc::kill(pid as libc::pid_t, libc::SIGINT) };
    if ret == -1 {
        Err(std::io::Error::last_os_error())
    } else {
        Ok(())
    }
}

#[cfg(not(unix))]
fn send_stop_signal(_pid: u32) -> Result<(), std::io::Error> {
    // No graceful signal available; the bounded wait below falls through to
    // a hard kill.
    Ok(())
}

/// A sampler in flight for the current trial. The output destination is
/// exclusively owned by this trial.
#[derive(Debug)]
pub enum RunningSampler {
    /// Live external process.
    External {
        /// The spawned sampler (or sudo wrapper) process.
        child: Child,
        /// Destination file the tool writes to.
        output: PathBuf,
        /// Grace period between stop signal and hard kill.
        stop_timeout: Duration,
    },
    /// Dry-run stand-in.
    Noop,
}

impl RunningSampler {
    /// Stop the sampler and read its output back.
    ///
    /// An early abnormal exit is reported through [`SamplerOutput::crash`]
    /// while still returning any partial rows that reached the destination.
    pub fn stop(self) -> Result<SamplerOutput, SamplerError> {
        let (mut child, output, stop_timeout) = match self {
            RunningSampler::Noop => {
                return Ok(SamplerOutput {
                    table: RawTable::empty(),
                    crash: None,
                });
            }
            RunningSampler::External {
                child,
                output,
                stop_timeout,
            } => (child, output, stop_timeout),
        };

        let crash = match child.try_wait() {
            Ok(Some(status)) => Some(format!("sampler exited early with {status}")),
            _ => None,
        };

        if crash.is_none() {
            if let Err(e) = send_stop_signal(child.id()) {
                warn!("could not signal energy sampler: {e}");
            }
            if !wait_with_deadline(&mut child, stop_timeout) {
                warn!("energy sampler did not stop in time; killing");
                let _ = child.kill();
                let _ = child.wait();
            }
        }

        match std::fs::read_to_string(&output) {
            Ok(text) => Ok(SamplerOutput {
                table: RawTable::parse(&text),
                crash,
            }),
            Err(source) => match crash {
                // A crashed sampler may never have created the file; the
                // crash itself is the signal.
                Some(crash) => Ok(SamplerOutput {
                    table: RawTable::empty(),
                    crash: Some(crash),
                }),
                None => Err(SamplerError::OutputUnreadable { path: output, source }),
            },
        }
    }

    /// Terminate the sampler and delete its partial output. Used when the
    /// trial is abandoned before any usable measurement existed (playback
    /// never confirmed).
    pub fn discard(self) {
        if let RunningSampler::External {
            mut child, output, ..
        } = self
        {
            let _ = child.kill();
            let _ = child.wait();
            if let Err(e) = std::fs::remove_file(&output) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %output.display(), "could not remove discarded sampler output: {e}");
                }
            }
        }
    }
}

/// Wait for exit up to `deadline`, polling in short slices. Returns `true`
/// once the process has exited.
fn wait_with_deadline(child: &mut Child, deadline: Duration) -> bool {
    let until = Instant::now() + deadline;
    loop {
        match child.try_wait() {
            Ok(Some(_)) => return true,
            Ok(None) => {}
            Err(_) => return false,
        }
        if Instant::now() >= until {
            return false;
        }
        std::thread::sleep(Duration::from_millis(100));
    }
}
