//! Spec subprocess runner
//!
//! Launches one spec as a child process and supervises it until it exits,
//! times out or floods its output buffer. Every outcome, including a failed
//! launch, becomes a [`RunResult`]; nothing escapes as an error.
//!
//! On unix each spec runs in its own process group, and the whole group is
//! killed once the spec is done, so background helpers it leaves behind
//! neither hold the run open nor outlive it.

use futures::future::{self, BoxFuture, FutureExt};
use std::io;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tracing::{debug, info, warn};

use super::buffer::{OutputBuffer, DEFAULT_MAX_OUTPUT_BYTES};
use crate::models::{RunOutcome, RunResult, SpecFile};
use crate::utils::timer::Timer;

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// How long to keep reading output after the spec itself has exited
const DRAIN_GRACE: Duration = Duration::from_millis(250);

/// Default process timeout
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// A spec run that has been launched and resolves once it is finished
pub type PendingRun = BoxFuture<'static, RunResult>;

/// Errors while supervising a launched child
#[derive(Error, Debug)]
pub enum RunError {
    #[error("Failed to read output: {0}")]
    Capture(#[source] io::Error),

    #[error("Failed to wait for process: {0}")]
    Wait(#[source] io::Error),
}

/// How a spec file is turned into a command line
#[derive(Clone, Debug, Default)]
pub struct Invocation {
    /// Program that executes the spec (e.g. mocha); the spec itself is
    /// executed when unset
    pub launcher: Option<String>,
    /// Per-test timeout forwarded as `--timeout=<ms>`
    pub test_timeout_ms: Option<u64>,
    /// Forward the fail-fast flag `-b`
    pub bail: bool,
    pub extra_args: Vec<String>,
    pub working_dir: Option<PathBuf>,
}

impl Invocation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_launcher(mut self, launcher: impl Into<String>) -> Self {
        self.launcher = Some(launcher.into());
        self
    }

    pub fn with_test_timeout_ms(mut self, ms: u64) -> Self {
        self.test_timeout_ms = Some(ms);
        self
    }

    pub fn bail(mut self, bail: bool) -> Self {
        self.bail = bail;
        self
    }

    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.extra_args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Arguments following the spec path
    pub fn spec_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(ms) = self.test_timeout_ms {
            args.push(format!("--timeout={ms}"));
        }
        if self.bail {
            args.push("-b".to_string());
        }
        args.extend(self.extra_args.iter().cloned());
        args
    }
}

/// Runs spec files as isolated child processes
#[derive(Clone, Debug)]
pub struct SpecRunner {
    invocation: Invocation,
    timeout: Duration,
    max_output_bytes: usize,
}

impl SpecRunner {
    pub fn new(invocation: Invocation) -> Self {
        Self {
            invocation,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_output(mut self, bytes: usize) -> Self {
        self.max_output_bytes = bytes;
        self
    }

    /// Build the command line for a spec
    pub fn command(&self, spec: &SpecFile) -> Command {
        let mut command = match &self.invocation.launcher {
            Some(launcher) => {
                let mut command = Command::new(launcher);
                command.arg(&spec.path);
                command
            }
            None => Command::new(&spec.path),
        };

        command
            .args(self.invocation.spec_args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(unix)]
        command.process_group(0);

        if let Some(dir) = &self.invocation.working_dir {
            command.current_dir(dir);
        }

        command
    }

    /// Launch a spec
    ///
    /// The process is spawned before this returns, so specs launch in call
    /// order. The returned future resolves once the process has been reaped.
    pub fn start(&self, spec: &SpecFile) -> PendingRun {
        let timer = Timer::start(&spec.name);
        info!("Spec started: {}", spec);

        match self.command(spec).spawn() {
            Ok(child) => {
                debug!("Spawned {} (pid {:?})", spec.name, child.id());
                supervise(
                    spec.name.clone(),
                    child,
                    self.timeout,
                    self.max_output_bytes,
                    timer,
                )
                .boxed()
            }
            Err(e) => {
                warn!("Failed to launch {}: {}", spec.name, e);
                let result = RunResult::launch_failed(&spec.name, e.to_string())
                    .with_duration_ms(timer.stop().as_millis() as u64);
                future::ready(result).boxed()
            }
        }
    }
}

impl Default for SpecRunner {
    fn default() -> Self {
        Self::new(Invocation::default())
    }
}

enum Exit {
    Exited(ExitStatus),
    Overflowed,
}

async fn supervise(
    name: String,
    mut child: Child,
    timeout: Duration,
    max_output_bytes: usize,
    timer: Timer,
) -> RunResult {
    let group = child.id();
    let mut pipes = Pipes::take(&mut child);
    let mut buffer = OutputBuffer::with_limit(max_output_bytes);

    let driven = tokio::time::timeout(timeout, drive(&mut child, &mut pipes, &mut buffer)).await;

    // Whatever happened, nothing the spec started may outlive it.
    kill_group(&name, group).await;

    let outcome = match driven {
        Ok(Ok(Exit::Exited(status))) => {
            if pipes.drain(&mut buffer).await {
                exit_outcome(status)
            } else {
                warn!(
                    "{} exceeded the {} byte output limit",
                    name, max_output_bytes
                );
                RunOutcome::OutputLimitExceeded {
                    limit_bytes: max_output_bytes,
                }
            }
        }
        Ok(Ok(Exit::Overflowed)) => {
            warn!(
                "{} exceeded the {} byte output limit, killing it",
                name, max_output_bytes
            );
            terminate(&name, &mut child).await;
            RunOutcome::OutputLimitExceeded {
                limit_bytes: max_output_bytes,
            }
        }
        Ok(Err(e)) => {
            warn!("{}: {}", name, e);
            terminate(&name, &mut child).await;
            RunOutcome::Failed { exit_code: None }
        }
        Err(_) => {
            warn!(
                "{} timed out after {}ms, killing it",
                name,
                timeout.as_millis()
            );
            terminate(&name, &mut child).await;
            RunOutcome::TimedOut {
                after_ms: timeout.as_millis() as u64,
            }
        }
    };

    let duration_ms = timer.stop().as_millis() as u64;
    RunResult::new(name, outcome, buffer.into_string()).with_duration_ms(duration_ms)
}

fn exit_outcome(status: ExitStatus) -> RunOutcome {
    if status.success() {
        RunOutcome::Passed
    } else {
        RunOutcome::Failed {
            exit_code: status.code(),
        }
    }
}

/// Capture output until the child itself exits
///
/// The exit is what counts; pipes may stay open past it when the spec left
/// background processes behind.
async fn drive(
    child: &mut Child,
    pipes: &mut Pipes,
    buffer: &mut OutputBuffer,
) -> Result<Exit, RunError> {
    loop {
        tokio::select! {
            status = child.wait() => {
                return Ok(Exit::Exited(status.map_err(RunError::Wait)?));
            }
            pumped = pipes.pump(buffer), if pipes.is_open() => {
                if !pumped.map_err(RunError::Capture)? {
                    return Ok(Exit::Overflowed);
                }
            }
        }
    }
}

/// The child's output pipes
struct Pipes {
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
}

impl Pipes {
    fn take(child: &mut Child) -> Self {
        Self {
            stdout: child.stdout.take(),
            stderr: child.stderr.take(),
        }
    }

    fn is_open(&self) -> bool {
        self.stdout.is_some() || self.stderr.is_some()
    }

    /// Move the next chunk from whichever pipe is ready into the buffer
    ///
    /// Returns `false` once the buffer has overflowed. Closed pipes are
    /// dropped.
    async fn pump(&mut self, buffer: &mut OutputBuffer) -> io::Result<bool> {
        let mut out_chunk = [0u8; READ_CHUNK_SIZE];
        let mut err_chunk = [0u8; READ_CHUNK_SIZE];

        tokio::select! {
            read = read_chunk(&mut self.stdout, &mut out_chunk), if self.stdout.is_some() => {
                match read? {
                    0 => self.stdout = None,
                    n => {
                        buffer.push(&out_chunk[..n]);
                    }
                }
            }
            read = read_chunk(&mut self.stderr, &mut err_chunk), if self.stderr.is_some() => {
                match read? {
                    0 => self.stderr = None,
                    n => {
                        buffer.push(&err_chunk[..n]);
                    }
                }
            }
            else => {}
        }

        Ok(!buffer.is_overflowed())
    }

    /// Read what is left after the child exited, for at most [`DRAIN_GRACE`]
    ///
    /// Returns `false` if the buffer overflowed meanwhile.
    async fn drain(&mut self, buffer: &mut OutputBuffer) -> bool {
        let drained = tokio::time::timeout(DRAIN_GRACE, async {
            while self.is_open() {
                if !self.pump(buffer).await? {
                    return Ok(false);
                }
            }
            Ok::<_, io::Error>(true)
        })
        .await;

        match drained {
            Ok(Ok(fits)) => fits,
            Ok(Err(e)) => {
                warn!("Failed to read remaining output: {}", e);
                true
            }
            Err(_) => {
                debug!("Output pipes still open {}ms after exit", DRAIN_GRACE.as_millis());
                true
            }
        }
    }
}

async fn read_chunk<R>(reader: &mut Option<R>, chunk: &mut [u8]) -> io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    match reader {
        Some(reader) => reader.read(chunk).await,
        None => Ok(0),
    }
}

/// Kill and reap a child that is still running
async fn terminate(name: &str, child: &mut Child) {
    match child.try_wait() {
        Ok(Some(_)) => {}
        _ => {
            if let Err(e) = child.kill().await {
                warn!("Failed to kill {}: {}", name, e);
            }
        }
    }
}

/// SIGKILL every process left in the spec's process group
#[cfg(unix)]
async fn kill_group(name: &str, group: Option<u32>) {
    let Some(pgid) = group else { return };

    let killed = Command::new("kill")
        .arg("-KILL")
        .arg("--")
        .arg(format!("-{pgid}"))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;

    match killed {
        Ok(status) if status.success() => debug!("Killed process group of {}", name),
        // Group already empty
        Ok(_) => {}
        Err(e) => warn!("Failed to kill process group of {}: {}", name, e),
    }
}

#[cfg(not(unix))]
async fn kill_group(_name: &str, _group: Option<u32>) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_args() {
        let invocation = Invocation::new()
            .with_test_timeout_ms(35000)
            .bail(true)
            .with_args(["--reporter", "spec"]);

        assert_eq!(
            invocation.spec_args(),
            vec!["--timeout=35000", "-b", "--reporter", "spec"]
        );
        assert!(Invocation::new().spec_args().is_empty());
    }

    #[test]
    fn test_command_with_launcher() {
        let runner = SpecRunner::new(
            Invocation::new()
                .with_launcher("./node_modules/mocha/bin/mocha")
                .with_test_timeout_ms(35000)
                .bail(true),
        );
        let spec = SpecFile::new("spec.generic.js", "/repo/clicktests/spec.generic.js");

        let command = runner.command(&spec);
        let std_command = command.as_std();
        assert_eq!(
            std_command.get_program().to_str(),
            Some("./node_modules/mocha/bin/mocha")
        );

        let args: Vec<_> = std_command
            .get_args()
            .filter_map(|arg| arg.to_str())
            .collect();
        assert_eq!(
            args,
            vec!["/repo/clicktests/spec.generic.js", "--timeout=35000", "-b"]
        );
    }

    #[test]
    fn test_command_without_launcher() {
        let runner = SpecRunner::default();
        let spec = SpecFile::new("spec.branch.sh", "/repo/clicktests/spec.branch.sh");

        let command = runner.command(&spec);
        assert_eq!(
            command.as_std().get_program().to_str(),
            Some("/repo/clicktests/spec.branch.sh")
        );
        assert_eq!(command.as_std().get_args().count(), 0);
    }

    #[test]
    fn test_runner_builder() {
        let runner = SpecRunner::default()
            .with_timeout(Duration::from_secs(60))
            .with_max_output(1024);
        assert_eq!(runner.timeout, Duration::from_secs(60));
        assert_eq!(runner.max_output_bytes, 1024);
    }

    #[cfg(unix)]
    mod process {
        use super::*;
        use std::fs;
        use std::path::Path;
        use tempfile::{tempdir, TempDir};

        fn sh_runner() -> SpecRunner {
            SpecRunner::new(Invocation::new().with_launcher("sh"))
        }

        fn write_spec(dir: &TempDir, name: &str, body: &str) -> SpecFile {
            let path = dir.path().join(name);
            fs::write(&path, body).unwrap();
            SpecFile::new(name, path)
        }

        #[tokio::test]
        async fn test_passing_spec_captures_both_streams() {
            let dir = tempdir().unwrap();
            let spec = write_spec(&dir, "spec.ok.sh", "echo to-stdout\necho to-stderr >&2\n");

            let result = sh_runner().start(&spec).await;

            assert!(result.success);
            assert_eq!(result.outcome, RunOutcome::Passed);
            assert_eq!(result.name, "spec.ok.sh");
            assert!(result.output.contains("to-stdout"));
            assert!(result.output.contains("to-stderr"));
        }

        #[tokio::test]
        async fn test_stream_order_is_preserved() {
            let dir = tempdir().unwrap();
            let spec = write_spec(
                &dir,
                "spec.order.sh",
                "for i in 1 2 3 4 5; do echo line-$i; done\n",
            );

            let result = sh_runner().start(&spec).await;

            assert_eq!(result.output, "line-1\nline-2\nline-3\nline-4\nline-5\n");
        }

        #[tokio::test]
        async fn test_failing_spec_reports_exit_code() {
            let dir = tempdir().unwrap();
            let spec = write_spec(&dir, "spec.fail.sh", "echo 'assertion failed'\nexit 3\n");

            let result = sh_runner().start(&spec).await;

            assert!(!result.success);
            assert_eq!(result.outcome, RunOutcome::Failed { exit_code: Some(3) });
            assert!(result.output.contains("assertion failed"));
        }

        #[tokio::test]
        async fn test_missing_launcher_is_launch_failure() {
            let dir = tempdir().unwrap();
            let spec = write_spec(&dir, "spec.any.sh", "exit 0\n");
            let runner =
                SpecRunner::new(Invocation::new().with_launcher("clickrun-no-such-launcher"));

            let result = runner.start(&spec).await;

            assert!(!result.success);
            assert!(matches!(result.outcome, RunOutcome::LaunchFailed { .. }));
            assert!(result.output.is_empty());
        }

        #[tokio::test]
        async fn test_missing_spec_executable_is_launch_failure() {
            let spec = SpecFile::new("spec.gone.sh", "/nonexistent/clickrun/spec.gone.sh");

            let result = SpecRunner::default().start(&spec).await;

            assert!(matches!(result.outcome, RunOutcome::LaunchFailed { .. }));
        }

        #[tokio::test]
        async fn test_timeout_kills_process() {
            let dir = tempdir().unwrap();
            let pid_file = dir.path().join("pid");
            let spec = write_spec(
                &dir,
                "spec.hang.sh",
                &format!("echo $$ > {}\necho started\nexec sleep 30\n", pid_file.display()),
            );
            let runner = sh_runner().with_timeout(Duration::from_millis(500));

            let result = runner.start(&spec).await;

            assert!(!result.success);
            assert_eq!(result.outcome, RunOutcome::TimedOut { after_ms: 500 });
            assert!(result.output.contains("started"));
            assert!(result.duration_ms < 30_000);
            assert!(!process_alive(&pid_file));
        }

        #[tokio::test]
        async fn test_exit_counts_even_when_background_job_holds_pipes() {
            let dir = tempdir().unwrap();
            let bg_pid = dir.path().join("bgpid");
            let spec = write_spec(
                &dir,
                "spec.background.sh",
                &format!(
                    "sleep 20 &\necho $! > {}\necho done\nexit 0\n",
                    bg_pid.display()
                ),
            );
            let runner = sh_runner().with_timeout(Duration::from_secs(5));

            let result = runner.start(&spec).await;

            assert_eq!(result.outcome, RunOutcome::Passed);
            assert!(result.success);
            assert!(result.output.contains("done"));
            assert!(result.duration_ms < 5_000);
            assert!(gone_within(&bg_pid, Duration::from_secs(2)));
        }

        #[tokio::test]
        async fn test_nonzero_exit_with_background_job() {
            let dir = tempdir().unwrap();
            let spec = write_spec(&dir, "spec.bgfail.sh", "sleep 20 &\necho broke\nexit 4\n");
            let runner = sh_runner().with_timeout(Duration::from_secs(5));

            let result = runner.start(&spec).await;

            assert_eq!(result.outcome, RunOutcome::Failed { exit_code: Some(4) });
            assert!(result.output.contains("broke"));
        }

        #[tokio::test]
        async fn test_output_limit_kills_process() {
            let dir = tempdir().unwrap();
            let spec = write_spec(&dir, "spec.flood.sh", "exec yes clickrun\n");
            let runner = sh_runner()
                .with_max_output(4096)
                .with_timeout(Duration::from_secs(30));

            let result = runner.start(&spec).await;

            assert!(!result.success);
            assert_eq!(
                result.outcome,
                RunOutcome::OutputLimitExceeded { limit_bytes: 4096 }
            );
            assert_eq!(result.output.len(), 4096);
        }

        #[tokio::test]
        async fn test_flags_are_forwarded() {
            let dir = tempdir().unwrap();
            let spec = write_spec(&dir, "spec.args.sh", "echo \"args: $*\"\n");
            let runner = SpecRunner::new(
                Invocation::new()
                    .with_launcher("sh")
                    .with_test_timeout_ms(35000)
                    .bail(true),
            );

            let result = runner.start(&spec).await;

            assert!(result.success);
            assert!(result.output.contains("args: --timeout=35000 -b"));
        }

        #[tokio::test]
        async fn test_working_dir() {
            let dir = tempdir().unwrap();
            let spec = write_spec(&dir, "spec.pwd.sh", "cat marker.txt\n");
            fs::write(dir.path().join("marker.txt"), "in-working-dir").unwrap();
            let runner = SpecRunner::new(
                Invocation::new()
                    .with_launcher("sh")
                    .with_working_dir(dir.path()),
            );

            let result = runner.start(&spec).await;

            assert!(result.success);
            assert!(result.output.contains("in-working-dir"));
        }

        fn process_alive(pid_file: &Path) -> bool {
            let pid = fs::read_to_string(pid_file).unwrap();
            let pid = pid.trim();

            // A killed process may linger as a zombie until it is reparented
            // and reaped; that counts as gone.
            if let Ok(stat) = fs::read_to_string(format!("/proc/{pid}/stat")) {
                let state = stat.rsplit(')').next().unwrap_or("").trim_start();
                return !state.starts_with('Z');
            }

            std::process::Command::new("kill")
                .arg("-0")
                .arg(pid)
                .stderr(Stdio::null())
                .status()
                .map(|s| s.success())
                .unwrap_or(false)
        }

        fn gone_within(pid_file: &Path, wait: Duration) -> bool {
            let deadline = std::time::Instant::now() + wait;
            while process_alive(pid_file) {
                if std::time::Instant::now() > deadline {
                    return false;
                }
                std::thread::sleep(Duration::from_millis(50));
            }
            true
        }
    }
}
