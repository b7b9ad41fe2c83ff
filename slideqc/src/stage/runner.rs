//! External stage process execution.
//!
//! One stage is one interpreter invocation:
//! `<interpreter> <script> --slide_folder <slides_in> --output_dir <run_dir>`
//! plus stage-specific flags. Both output streams are drained concurrently
//! into log events; standard error additionally feeds a bounded tail carried
//! on the result for diagnostics.

use crate::cancellation::CancellationToken;
use crate::core::{PipelineEvent, StageOutcome, StageResult, StreamKind};
use crate::events::EventBus;
use crate::runtime::RuntimeEnvironment;
use crate::stage::StageSpec;
use crate::workspace::WorkspacePaths;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

/// Lines of standard error retained on the stage result.
pub const STDERR_TAIL_LINES: usize = 40;

/// Grace period between the termination request and the forceful kill.
pub const DEFAULT_KILL_GRACE: Duration = Duration::from_secs(10);

/// Runs one external stage process and reports a structured result.
///
/// The runner never retries; retry policy is the controller's decision.
#[derive(Debug)]
pub struct StageRunner {
    bus: Arc<EventBus>,
    kill_grace: Duration,
}

impl StageRunner {
    /// Creates a runner publishing log events to `bus`.
    #[must_use]
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self {
            bus,
            kill_grace: DEFAULT_KILL_GRACE,
        }
    }

    /// Overrides the graceful-termination grace period.
    #[must_use]
    pub fn with_kill_grace(mut self, grace: Duration) -> Self {
        self.kill_grace = grace;
        self
    }

    /// Executes the stage to completion, timeout, or cancellation.
    ///
    /// Outcomes: `Succeeded` on exit 0, `Failed` on any other exit or on a
    /// launch failure, `TimedOut` when the per-stage timeout expires, and
    /// `Cancelled` when the token fires while the process is in flight. On
    /// timeout and cancellation the process receives a graceful termination
    /// request, then a forceful kill after the grace period.
    pub async fn run(
        &self,
        spec: &StageSpec,
        workspace: &WorkspacePaths,
        env: &RuntimeEnvironment,
        cancel: &CancellationToken,
    ) -> StageResult {
        let started_at = Utc::now();
        let script = env.scripts_dir.join(&spec.script);

        let mut command = Command::new(&env.interpreter);
        command
            .arg(&script)
            .arg("--slide_folder")
            .arg(&workspace.slides_in)
            .arg("--output_dir")
            .arg(&workspace.run_dir)
            .args(&spec.extra_args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(stage = %spec.name, script = %script.display(), "launching stage process");

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(err) => {
                warn!(stage = %spec.name, error = %err, "stage process failed to launch");
                return StageResult {
                    stage: spec.name.clone(),
                    outcome: StageOutcome::Failed,
                    exit_code: None,
                    started_at,
                    finished_at: Utc::now(),
                    stderr_tail: vec![format!("failed to launch {}: {err}", spec.script)],
                };
            }
        };

        let tail = Arc::new(Mutex::new(VecDeque::with_capacity(STDERR_TAIL_LINES)));

        let stdout_task = child.stdout.take().map(|stream| {
            tokio::spawn(drain_stream(
                stream,
                spec.name.clone(),
                StreamKind::Stdout,
                self.bus.clone(),
                None,
            ))
        });
        let stderr_task = child.stderr.take().map(|stream| {
            tokio::spawn(drain_stream(
                stream,
                spec.name.clone(),
                StreamKind::Stderr,
                self.bus.clone(),
                Some(tail.clone()),
            ))
        });

        let stage_timeout = async {
            match spec.timeout {
                Some(timeout) => tokio::time::sleep(timeout).await,
                None => std::future::pending().await,
            }
        };

        let (outcome, exit_code) = tokio::select! {
            status = child.wait() => match status {
                Ok(status) if status.success() => (StageOutcome::Succeeded, status.code()),
                Ok(status) => (StageOutcome::Failed, status.code()),
                Err(err) => {
                    tail.lock().push_back(format!("wait failed: {err}"));
                    (StageOutcome::Failed, None)
                }
            },
            () = cancel.cancelled() => {
                self.terminate(&mut child, &spec.name).await;
                (StageOutcome::Cancelled, None)
            }
            () = stage_timeout => {
                warn!(stage = %spec.name, "stage timed out");
                self.terminate(&mut child, &spec.name).await;
                (StageOutcome::TimedOut, None)
            }
        };

        // Readers finish at EOF once the process is gone.
        if let Some(task) = stdout_task {
            let _ = task.await;
        }
        if let Some(task) = stderr_task {
            let _ = task.await;
        }

        let stderr_tail = tail.lock().iter().cloned().collect();
        StageResult {
            stage: spec.name.clone(),
            outcome,
            exit_code,
            started_at,
            finished_at: Utc::now(),
            stderr_tail,
        }
    }

    /// Graceful-then-forceful termination.
    async fn terminate(&self, child: &mut Child, stage: &str) {
        request_termination(child);
        if tokio::time::timeout(self.kill_grace, child.wait())
            .await
            .is_err()
        {
            warn!(stage, "grace period expired, killing stage process");
            let _ = child.kill().await;
        }
    }
}

/// Asks the process to exit. SIGTERM on unix; a hard kill elsewhere.
#[cfg(unix)]
fn request_termination(child: &Child) {
    if let Some(pid) = child.id() {
        if let Ok(pid) = i32::try_from(pid) {
            let _ = nix::sys::signal::kill(
                nix::unistd::Pid::from_raw(pid),
                nix::sys::signal::Signal::SIGTERM,
            );
        }
    }
}

#[cfg(not(unix))]
fn request_termination(child: &mut Child) {
    let _ = child.start_kill();
}

/// Drains one output stream line-by-line into log events, timestamping each
/// line at the point it is read.
async fn drain_stream<R>(
    stream: R,
    stage: String,
    kind: StreamKind,
    bus: Arc<EventBus>,
    tail: Option<Arc<Mutex<VecDeque<String>>>>,
) where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(stream).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if let Some(tail) = &tail {
            let mut tail = tail.lock();
            if tail.len() >= STDERR_TAIL_LINES {
                tail.pop_front();
            }
            tail.push_back(line.clone());
        }
        bus.publish(PipelineEvent::log(&stage, kind, line)).await;
    }
}
