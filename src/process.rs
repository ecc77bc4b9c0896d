//! Subprocess execution with per-invocation lifecycle tracking.
//!
//! A [`ProcessManager`] is created for one command invocation and owns the
//! bookkeeping of every process it spawns: each in-flight process is
//! registered under a fresh [`Uuid`] together with a kill channel, so it can
//! be cancelled individually or all at once. Dropping the manager cancels
//! whatever is still running.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};

use dashmap::DashMap;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::oneshot;
use tracing::debug;
use uuid::Uuid;

use crate::error::{IoResultExt, NewIconError, Result};

/// Lines of streamed output retained for error reports.
const MAX_TAIL_LINES: usize = 200;

/// A command to run: program, arguments, working directory and environment
/// overrides layered on top of the current environment.
#[derive(Debug, Clone, Default)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub current_dir: Option<PathBuf>,
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Human-readable command line, used in logs and errors.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// How the child's standard streams are wired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Forward both streams line by line to our stderr as they arrive,
    /// keeping a bounded tail.
    Stream,
    /// Collect output silently.
    Capture,
    /// Hand the terminal to the child (stdin included).
    Inherit,
}

/// Exit status and collected output of a finished process.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Combined output for error reports.
    pub fn combined(&self) -> String {
        match (self.stdout.trim().is_empty(), self.stderr.trim().is_empty()) {
            (true, _) => self.stderr.clone(),
            (false, true) => self.stdout.clone(),
            (false, false) => format!("{}\n{}", self.stdout, self.stderr),
        }
    }
}

struct Tracked {
    command: String,
    kill: oneshot::Sender<()>,
}

/// Tracks the processes spawned during one command invocation.
#[derive(Default)]
pub struct ProcessManager {
    in_flight: DashMap<Uuid, Tracked>,
}

impl ProcessManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `spec` to completion with the given stream wiring.
    ///
    /// A non-zero exit is not an error here; callers decide what it means.
    pub async fn run(&self, spec: &CommandSpec, mode: OutputMode) -> Result<ProcessOutput> {
        let command_line = spec.display();
        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .kill_on_drop(true);
        if let Some(dir) = &spec.current_dir {
            command.current_dir(dir);
        }
        match mode {
            OutputMode::Inherit => {
                command
                    .stdin(Stdio::inherit())
                    .stdout(Stdio::inherit())
                    .stderr(Stdio::inherit());
            }
            OutputMode::Stream | OutputMode::Capture => {
                command
                    .stdin(Stdio::null())
                    .stdout(Stdio::piped())
                    .stderr(Stdio::piped());
            }
        }

        let mut child = command
            .spawn()
            .io_context(|| format!("failed to start `{command_line}`"))?;

        let id = Uuid::new_v4();
        let (kill_tx, kill_rx) = oneshot::channel();
        self.in_flight.insert(
            id,
            Tracked {
                command: command_line.clone(),
                kill: kill_tx,
            },
        );
        let _untrack = Untrack {
            map: &self.in_flight,
            id,
        };
        debug!(%id, command = %command_line, "spawned process");

        let echo = mode == OutputMode::Stream;
        let stdout_task = child
            .stdout
            .take()
            .map(|out| tokio::spawn(collect_lines(out, echo)));
        let stderr_task = child
            .stderr
            .take()
            .map(|err| tokio::spawn(collect_lines(err, echo)));

        let status = tokio::select! {
            status = child.wait() => status.io_context(|| format!("failed to wait for `{command_line}`"))?,
            _ = kill_rx => {
                let _ = child.kill().await;
                return Err(NewIconError::Build {
                    command: command_line,
                    status: "cancelled".into(),
                    output: String::new(),
                });
            }
        };

        let stdout = match stdout_task {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };
        let stderr = match stderr_task {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };
        debug!(%id, %status, "process exited");

        Ok(ProcessOutput {
            status,
            stdout,
            stderr,
        })
    }

    /// Kills one in-flight process. Returns false if it already finished.
    pub fn cancel(&self, id: Uuid) -> bool {
        match self.in_flight.remove(&id) {
            Some((_, tracked)) => {
                debug!(%id, command = %tracked.command, "cancelling process");
                tracked.kill.send(()).is_ok()
            }
            None => false,
        }
    }

    /// Kills every in-flight process.
    pub fn cancel_all(&self) {
        let ids: Vec<Uuid> = self.in_flight.iter().map(|e| *e.key()).collect();
        for id in ids {
            self.cancel(id);
        }
    }

    /// Ids and command lines of the processes still running.
    pub fn in_flight(&self) -> Vec<(Uuid, String)> {
        self.in_flight
            .iter()
            .map(|e| (*e.key(), e.value().command.clone()))
            .collect()
    }
}

impl Drop for ProcessManager {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

struct Untrack<'a> {
    map: &'a DashMap<Uuid, Tracked>,
    id: Uuid,
}

impl Drop for Untrack<'_> {
    fn drop(&mut self) {
        self.map.remove(&self.id);
    }
}

/// Reads `reader` line by line. When echoing, each line is forwarded to
/// stderr immediately and only the last [`MAX_TAIL_LINES`] are kept;
/// otherwise everything is kept.
async fn collect_lines<R>(reader: R, echo: bool) -> String
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut lines = BufReader::new(reader).lines();
    let mut kept: VecDeque<String> = VecDeque::new();
    let mut stderr = tokio::io::stderr();

    while let Ok(Some(line)) = lines.next_line().await {
        if echo {
            let _ = stderr.write_all(format!("{line}\n").as_bytes()).await;
            if kept.len() == MAX_TAIL_LINES {
                kept.pop_front();
            }
        }
        kept.push_back(line);
    }

    kept.into_iter().collect::<Vec<_>>().join("\n")
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn captures_output_and_status() {
        let manager = ProcessManager::new();
        let spec = CommandSpec::new("sh").args(["-c", "echo out; echo err 1>&2; exit 3"]);
        let output = manager.run(&spec, OutputMode::Capture).await.unwrap();

        assert!(!output.success());
        assert_eq!(output.status.code(), Some(3));
        assert_eq!(output.stdout, "out");
        assert_eq!(output.stderr, "err");
        assert!(manager.in_flight().is_empty());
    }

    #[tokio::test]
    async fn streaming_keeps_a_bounded_tail() {
        let manager = ProcessManager::new();
        let spec = CommandSpec::new("sh").args(["-c", "i=0; while [ $i -lt 250 ]; do echo line$i; i=$((i+1)); done"]);
        let output = manager.run(&spec, OutputMode::Stream).await.unwrap();

        let lines: Vec<&str> = output.stdout.lines().collect();
        assert_eq!(lines.len(), MAX_TAIL_LINES);
        assert_eq!(lines.first(), Some(&"line50"));
        assert_eq!(lines.last(), Some(&"line249"));
    }

    #[tokio::test]
    async fn env_and_directory_are_applied() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ProcessManager::new();
        let spec = CommandSpec::new("sh")
            .args(["-c", "printf '%s:%s' \"$GREETING\" \"$(pwd)\""])
            .envs([("GREETING", "hi")])
            .current_dir(dir.path());
        let output = manager.run(&spec, OutputMode::Capture).await.unwrap();

        let canonical = dir.path().canonicalize().unwrap();
        assert_eq!(output.stdout, format!("hi:{}", canonical.display()));
    }

    #[tokio::test]
    async fn cancel_kills_running_process() {
        let manager = Arc::new(ProcessManager::new());
        let runner = {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move {
                let spec = CommandSpec::new("sh").args(["-c", "sleep 30"]);
                manager.run(&spec, OutputMode::Capture).await
            })
        };

        let mut id = None;
        for _ in 0..100 {
            if let Some((found, _)) = manager.in_flight().into_iter().next() {
                id = Some(found);
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(manager.cancel(id.expect("process should be tracked")));

        let result = runner.await.unwrap();
        assert!(matches!(result, Err(NewIconError::Build { ref status, .. }) if status == "cancelled"));
        assert!(manager.in_flight().is_empty());
    }

    #[tokio::test]
    async fn missing_program_is_io_error() {
        let manager = ProcessManager::new();
        let spec = CommandSpec::new("new-icon-no-such-program");
        let err = manager.run(&spec, OutputMode::Capture).await.unwrap_err();
        assert!(matches!(err, NewIconError::Io { .. }));
    }

    #[test]
    fn display_joins_arguments() {
        let spec = CommandSpec::new("cargo").args(["build", "--release"]);
        assert_eq!(spec.display(), "cargo build --release");
    }
}
