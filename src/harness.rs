//! Runs the target program against one case under a deadline.
//!
//! The map is staged in a temporary file under the work directory and the
//! target is started in its own process group. Pipes are drained on helper
//! threads while the calling thread polls for exit, the deadline, or
//! cancellation. Whatever happens, the process group is killed and reaped and
//! the map file is removed before [`Harness::execute`] returns.
//!
//! A call takes at most `timeout + kill_grace` plus polling slack. Output
//! that is still arriving after that, from a descendant that left the process
//! group while holding the pipes, is abandoned and the pipes are closed.

use std::fmt;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tempfile::TempPath;
use tracing::{debug, warn};

use crate::config::FuzzConfig;
use crate::generate::{ActionSequence, MapSpec};

/// How often the wait loop checks the child, the deadline and the cancel flag.
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Bytes a reader may still take from a pipe after being told to stop.
const PIPE_TAIL: usize = 64 * 1024;

/// How the action script reaches the target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionDelivery {
    /// Appended as the last command-line argument.
    #[default]
    Argument,
    /// Written to the child's stdin, followed by a newline and EOF.
    Stdin,
}

/// How a finished target ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitKind {
    /// Exited with a status code.
    Code(i32),
    /// Killed by a signal.
    Signal(i32),
}

impl ExitKind {
    fn from_status(status: ExitStatus) -> Option<Self> {
        if let Some(code) = status.code() {
            return Some(Self::Code(code));
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return Some(Self::Signal(signal));
            }
        }
        None
    }
}

impl fmt::Display for ExitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitKind::Code(code) => write!(f, "exit code {code}"),
            ExitKind::Signal(signal) => write!(f, "signal {signal}"),
        }
    }
}

/// Everything observed about one execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionResult {
    /// How the target ended. `None` if it was force-killed or never started.
    pub exit: Option<ExitKind>,
    /// Captured standard output, possibly partial.
    pub stdout: String,
    /// Captured standard error, possibly partial.
    pub stderr: String,
    /// Wall-clock time from staging until exit or the deadline.
    pub duration: Duration,
    /// The deadline passed before the target exited.
    pub timed_out: bool,
    /// The run was cancelled before the target exited.
    pub interrupted: bool,
    /// Why the target could not be started.
    pub spawn_error: Option<String>,
}

impl ExecutionResult {
    /// A result for a target that exited with `code` and printed nothing.
    #[must_use]
    pub fn exited(code: i32) -> Self {
        Self {
            exit: Some(ExitKind::Code(code)),
            ..Self::default()
        }
    }

    /// A result for a target that never started.
    #[must_use]
    pub fn spawn_failed(message: impl Into<String>, duration: Duration) -> Self {
        Self {
            spawn_error: Some(message.into()),
            duration,
            ..Self::default()
        }
    }

    /// Exit code, if the target exited normally.
    #[must_use]
    pub fn exit_code(&self) -> Option<i32> {
        match self.exit {
            Some(ExitKind::Code(code)) => Some(code),
            _ => None,
        }
    }

    /// Stdout followed by stderr.
    #[must_use]
    pub fn combined_output(&self) -> String {
        let mut out = String::with_capacity(self.stdout.len() + self.stderr.len());
        out.push_str(&self.stdout);
        out.push_str(&self.stderr);
        out
    }
}

/// Cooperative cancellation flag shared with the interrupt handler.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create an unset token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Check whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Something that can run a case and report what happened.
///
/// [`Harness`] runs the real target. Closures implement it too, which is how
/// the fuzz loop is tested without spawning processes.
pub trait Executor {
    /// Run one case to completion.
    fn execute(&mut self, map: &MapSpec, actions: &ActionSequence) -> ExecutionResult;
}

impl<F> Executor for F
where
    F: FnMut(&MapSpec, &ActionSequence) -> ExecutionResult,
{
    fn execute(&mut self, map: &MapSpec, actions: &ActionSequence) -> ExecutionResult {
        self(map, actions)
    }
}

/// Subprocess runner for the target program.
#[derive(Debug, Clone)]
pub struct Harness {
    program: PathBuf,
    args: Vec<String>,
    work_dir: PathBuf,
    delivery: ActionDelivery,
    timeout: Duration,
    kill_grace: Duration,
    cancel: CancelToken,
}

impl Harness {
    /// Create a harness that runs `program` and stages maps under `work_dir`.
    ///
    /// Defaults: no extra arguments, actions as an argument, a 5 second
    /// timeout and a 500 ms kill grace period.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            work_dir: work_dir.into(),
            delivery: ActionDelivery::Argument,
            timeout: Duration::from_secs(5),
            kill_grace: Duration::from_millis(500),
            cancel: CancelToken::new(),
        }
    }

    /// Harness for the configured target.
    #[must_use]
    pub fn from_config(config: &FuzzConfig, cancel: CancelToken) -> Self {
        Self::new(&config.target_path, &config.output_path)
            .with_args(config.target_args.clone())
            .with_delivery(config.action_delivery)
            .with_timeout(config.timeout())
            .with_kill_grace(config.kill_grace())
            .with_cancel_token(cancel)
    }

    /// Builder: arguments placed before the map file path.
    #[must_use]
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Builder: action delivery mode.
    #[must_use]
    pub fn with_delivery(mut self, delivery: ActionDelivery) -> Self {
        self.delivery = delivery;
        self
    }

    /// Builder: per-execution timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builder: time between the polite and the forced kill.
    #[must_use]
    pub fn with_kill_grace(mut self, grace: Duration) -> Self {
        self.kill_grace = grace;
        self
    }

    /// Builder: cancellation token polled while waiting.
    #[must_use]
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run the target on one case.
    ///
    /// Never fails: staging and spawn problems are reported through
    /// [`ExecutionResult::spawn_error`].
    pub fn execute(&self, map: &MapSpec, actions: &ActionSequence) -> ExecutionResult {
        let start = Instant::now();

        let map_file = match self.stage_map(map) {
            Ok(path) => path,
            Err(err) => {
                return ExecutionResult::spawn_failed(
                    format!("failed to stage map file in {}: {err}", self.work_dir.display()),
                    start.elapsed(),
                );
            }
        };

        let script = actions.render();
        let mut command = self.command(&map_file, &script);
        let child = match command.spawn() {
            Ok(child) => child,
            Err(err) => {
                return ExecutionResult::spawn_failed(
                    format!("failed to spawn {}: {err}", self.program.display()),
                    start.elapsed(),
                );
            }
        };
        debug!(pid = child.id(), program = %self.program.display(), "spawned target");

        let mut guard = ChildGuard::new(child);
        let pipes = Pipes::attach(&mut guard.child, format!("{script}\n").into_bytes());

        let wait = self.wait(&mut guard.child, start);
        let duration = start.elapsed();

        let mut result = ExecutionResult {
            duration,
            ..ExecutionResult::default()
        };
        match wait {
            Wait::Exited(status) => {
                guard.reap();
                result.exit = ExitKind::from_status(status);
            }
            Wait::TimedOut => {
                debug!(?duration, "target timed out");
                guard.terminate(self.kill_grace);
                result.timed_out = true;
            }
            Wait::Cancelled => {
                guard.terminate(self.kill_grace);
                result.interrupted = true;
            }
            Wait::Failed(err) => {
                warn!(error = %err, "failed to wait for target");
                guard.terminate(self.kill_grace);
                result.spawn_error = Some(format!("failed to wait for target: {err}"));
            }
        }

        let (stdout, stderr) = pipes.finish(self.drain_deadline(start), &self.cancel);
        result.stdout = stdout;
        result.stderr = stderr;
        drop(map_file);
        result
    }

    /// Last moment to wait for the pipes to close once the child is reaped:
    /// one grace period, and never past `timeout + kill_grace` from `start`.
    fn drain_deadline(&self, start: Instant) -> Instant {
        let now = Instant::now();
        let after_exit = now.checked_add(self.kill_grace).unwrap_or(now);
        start
            .checked_add(self.timeout)
            .and_then(|deadline| deadline.checked_add(self.kill_grace))
            .map_or(after_exit, |limit| after_exit.min(limit))
    }

    fn stage_map(&self, map: &MapSpec) -> io::Result<TempPath> {
        fs::create_dir_all(&self.work_dir)?;
        let mut file = tempfile::Builder::new()
            .prefix("case-")
            .suffix(".map")
            .tempfile_in(&self.work_dir)?;
        file.write_all(map.render().as_bytes())?;
        file.flush()?;
        Ok(file.into_temp_path())
    }

    fn command(&self, map_file: &Path, script: &str) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args).arg(map_file);
        match self.delivery {
            ActionDelivery::Argument => {
                command.arg(script).stdin(Stdio::null());
            }
            ActionDelivery::Stdin => {
                command.stdin(Stdio::piped());
            }
        }
        command.stdout(Stdio::piped()).stderr(Stdio::piped());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }
        command
    }

    fn wait(&self, child: &mut Child, start: Instant) -> Wait {
        let deadline = start.checked_add(self.timeout);
        loop {
            match child.try_wait() {
                Ok(Some(status)) => return Wait::Exited(status),
                Ok(None) => {}
                Err(err) => return Wait::Failed(err),
            }
            if self.cancel.is_cancelled() {
                return Wait::Cancelled;
            }
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                return Wait::TimedOut;
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

impl Executor for Harness {
    fn execute(&mut self, map: &MapSpec, actions: &ActionSequence) -> ExecutionResult {
        Harness::execute(self, map, actions)
    }
}

enum Wait {
    Exited(ExitStatus),
    TimedOut,
    Cancelled,
    Failed(io::Error),
}

/// Owns a spawned target and makes sure its process group is gone on drop.
struct ChildGuard {
    child: Child,
    reaped: bool,
}

impl ChildGuard {
    fn new(child: Child) -> Self {
        Self {
            child,
            reaped: false,
        }
    }

    /// Ask the group to stop, then kill whatever is left after `grace`.
    fn terminate(&mut self, grace: Duration) {
        signal_group(&self.child, Signal::Terminate);
        let until = Instant::now() + grace;
        while Instant::now() < until {
            if matches!(self.child.try_wait(), Ok(Some(_))) {
                break;
            }
            thread::sleep(POLL_INTERVAL);
        }
        self.reap();
    }

    /// Kill stragglers in the group and collect the child's status.
    fn reap(&mut self) {
        signal_group(&self.child, Signal::Kill);
        let _ = self.child.kill();
        let _ = self.child.wait();
        self.reaped = true;
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if !self.reaped {
            self.reap();
        }
    }
}

#[derive(Clone, Copy)]
enum Signal {
    Terminate,
    Kill,
}

#[cfg(unix)]
fn signal_group(child: &Child, signal: Signal) {
    let Ok(pgid) = libc::pid_t::try_from(child.id()) else {
        return;
    };
    let signal = match signal {
        Signal::Terminate => libc::SIGTERM,
        Signal::Kill => libc::SIGKILL,
    };
    // SAFETY: kill(2) takes plain integers. The child leads its own group
    // (process_group(0) at spawn), so -pgid addresses only the target's tree.
    unsafe {
        libc::kill(-pgid, signal);
    }
}

#[cfg(not(unix))]
fn signal_group(_child: &Child, _signal: Signal) {}

#[derive(Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

/// Helper threads moving bytes between the harness and the child's pipes.
struct Pipes {
    stop: Arc<AtomicBool>,
    chunks: Receiver<(Stream, Vec<u8>)>,
    helpers: Vec<JoinHandle<()>>,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

impl Pipes {
    /// Take the child's pipes and start feeding `input` to stdin, if piped,
    /// and reading stdout and stderr.
    fn attach(child: &mut Child, input: Vec<u8>) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let (sender, chunks) = mpsc::channel();
        let mut helpers = Vec::new();

        if let Some(pipe) = child.stdin.take() {
            set_nonblocking(&pipe);
            let stop = Arc::clone(&stop);
            helpers.push(thread::spawn(move || feed(pipe, &input, &stop)));
        }
        if let Some(pipe) = child.stdout.take() {
            set_nonblocking(&pipe);
            helpers.push(spawn_reader(pipe, Stream::Stdout, sender.clone(), Arc::clone(&stop)));
        }
        if let Some(pipe) = child.stderr.take() {
            set_nonblocking(&pipe);
            helpers.push(spawn_reader(pipe, Stream::Stderr, sender, Arc::clone(&stop)));
        }

        Self {
            stop,
            chunks,
            helpers,
            stdout: Vec::new(),
            stderr: Vec::new(),
        }
    }

    /// Collect output until both pipes close, `until` passes, or `cancel`
    /// fires, then stop the helpers and return what arrived.
    fn finish(mut self, until: Instant, cancel: &CancelToken) -> (String, String) {
        loop {
            let remaining = until.saturating_duration_since(Instant::now());
            if remaining.is_zero() || cancel.is_cancelled() {
                debug!("abandoning output from pipes that are still open");
                break;
            }
            match self.chunks.recv_timeout(remaining.min(POLL_INTERVAL)) {
                Ok(chunk) => self.push(chunk),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        self.stop.store(true, Ordering::SeqCst);
        for helper in std::mem::take(&mut self.helpers) {
            // Unix helpers poll non-blocking pipes and see the stop flag.
            // Elsewhere a blocked read may outlive the call, so it is detached.
            if cfg!(unix) {
                let _ = helper.join();
            }
        }
        while let Ok(chunk) = self.chunks.try_recv() {
            self.push(chunk);
        }

        (
            String::from_utf8_lossy(&self.stdout).into_owned(),
            String::from_utf8_lossy(&self.stderr).into_owned(),
        )
    }

    fn push(&mut self, (stream, bytes): (Stream, Vec<u8>)) {
        match stream {
            Stream::Stdout => self.stdout.extend(bytes),
            Stream::Stderr => self.stderr.extend(bytes),
        }
    }
}

/// Write `input` and close the pipe, giving up once `stop` is set.
fn feed<W: Write>(mut pipe: W, input: &[u8], stop: &AtomicBool) {
    let mut rest = input;
    while !rest.is_empty() && !stop.load(Ordering::SeqCst) {
        match pipe.write(rest) {
            Ok(0) => break,
            Ok(n) => rest = &rest[n..],
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => thread::sleep(POLL_INTERVAL),
            // the target may exit without reading its input
            Err(_) => break,
        }
    }
}

fn spawn_reader<R>(
    mut pipe: R,
    stream: Stream,
    chunks: Sender<(Stream, Vec<u8>)>,
    stop: Arc<AtomicBool>,
) -> JoinHandle<()>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut buf = [0u8; 8192];
        let mut after_stop = 0usize;
        loop {
            match pipe.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if chunks.send((stream, buf[..n].to_vec())).is_err() {
                        break;
                    }
                    if stop.load(Ordering::SeqCst) {
                        after_stop += n;
                        if after_stop >= PIPE_TAIL {
                            break;
                        }
                    }
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                    if stop.load(Ordering::SeqCst) {
                        break;
                    }
                    thread::sleep(POLL_INTERVAL);
                }
                // keep what arrived before a read error
                Err(_) => break,
            }
        }
    })
}

#[cfg(unix)]
fn set_nonblocking(pipe: &impl std::os::fd::AsRawFd) {
    let fd = pipe.as_raw_fd();
    // SAFETY: fcntl(2) on a descriptor owned by `pipe`, which outlives the
    // call. Only O_NONBLOCK is added to the existing status flags.
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFL);
        if flags >= 0 {
            libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK);
        }
    }
}

#[cfg(not(unix))]
fn set_nonblocking<T>(_pipe: &T) {}
