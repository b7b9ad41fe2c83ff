//! The pipeline state machine.
//!
//! The controller owns the run record and is the only component that mutates
//! it. Stages execute strictly sequentially; every transition publishes a
//! status event to the bus.

use crate::cancellation::CancellationToken;
use crate::config::RunOptions;
use crate::core::{PipelineEvent, RunPhase, RunStatus, StageOutcome, StageResult};
use crate::errors::PipelineError;
use crate::events::EventBus;
use crate::pipeline::PipelineRun;
use crate::runtime::{EnvResolver, RuntimeEnvironment};
use crate::stage::{build_stage_plan, StageRunner, StageSpec};
use crate::workspace::WorkspaceManager;
use std::sync::Arc;
use tracing::{info, warn};

/// Handle to a run executing on its own task.
pub struct RunHandle {
    token: Arc<CancellationToken>,
    task: tokio::task::JoinHandle<Result<PipelineRun, PipelineError>>,
}

impl RunHandle {
    /// Requests cancellation of the run.
    pub fn cancel(&self, reason: impl Into<String>) {
        self.token.cancel(reason);
    }

    /// The run's cancellation token.
    #[must_use]
    pub fn token(&self) -> Arc<CancellationToken> {
        self.token.clone()
    }

    /// Waits for the run to reach a terminal state.
    ///
    /// # Errors
    ///
    /// Propagates the run's error, or `PipelineError::Internal` if the run
    /// task panicked.
    pub async fn wait(self) -> Result<PipelineRun, PipelineError> {
        match self.task.await {
            Ok(result) => result,
            Err(err) => Err(PipelineError::Internal(format!("run task failed: {err}"))),
        }
    }
}

/// Drives one pipeline run to a terminal state.
#[derive(Debug)]
pub struct PipelineController {
    options: RunOptions,
    stages: Vec<StageSpec>,
    bus: Arc<EventBus>,
    resolver: Arc<EnvResolver>,
    environment: Option<RuntimeEnvironment>,
    manager: WorkspaceManager,
    runner: StageRunner,
    cancel: Arc<CancellationToken>,
}

impl PipelineController {
    /// Creates a controller for a validated run request.
    ///
    /// # Errors
    ///
    /// Returns a usage error before any side effect when the request is
    /// malformed.
    pub fn new(options: RunOptions, bus: Arc<EventBus>) -> Result<Self, PipelineError> {
        options.validate()?;
        let stages = build_stage_plan(&options);
        let manager = WorkspaceManager::new(options.output_root.clone());
        let runner = StageRunner::new(bus.clone());
        Ok(Self {
            options,
            stages,
            bus,
            resolver: EnvResolver::shared(),
            environment: None,
            manager,
            runner,
            cancel: Arc::new(CancellationToken::new()),
        })
    }

    /// Replaces the environment resolver.
    #[must_use]
    pub fn with_resolver(mut self, resolver: Arc<EnvResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Uses an already-resolved environment, bypassing discovery.
    #[must_use]
    pub fn with_environment(mut self, environment: RuntimeEnvironment) -> Self {
        self.environment = Some(environment);
        self
    }

    /// Replaces the stage plan. The default plan comes from the run options.
    #[must_use]
    pub fn with_stages(mut self, stages: Vec<StageSpec>) -> Self {
        self.stages = stages;
        self
    }

    /// Replaces the stage runner.
    #[must_use]
    pub fn with_runner(mut self, runner: StageRunner) -> Self {
        self.runner = runner;
        self
    }

    /// The run's cancellation token.
    #[must_use]
    pub fn cancellation_token(&self) -> Arc<CancellationToken> {
        self.cancel.clone()
    }

    /// Spawns the run on its own task and returns a handle.
    #[must_use]
    pub fn spawn(self) -> RunHandle {
        let token = self.cancellation_token();
        let task = tokio::spawn(self.run());
        RunHandle { token, task }
    }

    /// Executes the run to a terminal state.
    ///
    /// Environment resolution and workspace preparation happen before any
    /// stage; either failing means no stage is invoked. Stage failures are
    /// not errors at this level - they are recorded on the returned run.
    ///
    /// # Errors
    ///
    /// Returns environment or workspace errors for pre-stage failures.
    pub async fn run(self) -> Result<PipelineRun, PipelineError> {
        let slide_name = self
            .options
            .slide
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.publish_status(None, RunPhase::RunStarted, format!("run accepted for {slide_name}"))
            .await;

        let environment = match self.resolve_environment() {
            Ok(environment) => environment,
            Err(err) => {
                self.bus
                    .publish(PipelineEvent::terminal(format!("run failed: {err}"), None))
                    .await;
                return Err(err);
            }
        };

        let run_id = self.manager.next_run_id();
        let workspace = match self.manager.prepare(&run_id, &self.options.slide).await {
            Ok(workspace) => workspace,
            Err(err) => {
                warn!(run_id = %run_id, error = %err, "workspace preparation failed");
                self.bus
                    .publish(PipelineEvent::terminal(format!("run failed: {err}"), None))
                    .await;
                return Err(err.into());
            }
        };

        info!(run_id = %run_id, output_dir = %workspace.run_dir.display(), "run started");
        let mut run = PipelineRun::new(&run_id, &self.options.slide, &workspace.run_dir);
        run.status = RunStatus::Running;

        let mut warnings = false;
        let mut failed = false;
        let mut cancelled = false;

        for spec in &self.stages {
            if failed || cancelled || self.cancel.is_cancelled() {
                if !failed && self.cancel.is_cancelled() {
                    cancelled = true;
                }
                run.stage_results.push(StageResult::skipped(&spec.name));
                self.publish_status(
                    Some(&spec.name),
                    RunPhase::StageFinished,
                    format!("stage {} skipped", spec.name),
                )
                .await;
                continue;
            }

            self.publish_status(
                Some(&spec.name),
                RunPhase::StageStarted,
                format!("stage {} started", spec.name),
            )
            .await;

            let result = self
                .runner
                .run(spec, &workspace, &environment, &self.cancel)
                .await;

            self.publish_status(
                Some(&spec.name),
                RunPhase::StageFinished,
                format!("stage {} {}", spec.name, result.outcome),
            )
            .await;

            match result.outcome {
                StageOutcome::Succeeded => {}
                StageOutcome::Cancelled => cancelled = true,
                StageOutcome::Failed | StageOutcome::TimedOut => {
                    if spec.required {
                        warn!(stage = %spec.name, "required stage failed, aborting run");
                        failed = true;
                    } else {
                        warn!(stage = %spec.name, "optional stage failed, continuing");
                        warnings = true;
                    }
                }
                StageOutcome::Skipped => {}
            }
            run.stage_results.push(result);
        }

        run.status = if cancelled {
            RunStatus::Cancelled
        } else if failed {
            RunStatus::Failed
        } else if warnings {
            RunStatus::CompletedWithWarnings
        } else {
            RunStatus::Completed
        };

        let output_dir = run.status.is_success().then(|| run.output_dir.clone());
        self.bus
            .publish(PipelineEvent::terminal(
                format!("run {}", run.status),
                output_dir,
            ))
            .await;
        info!(run_id = %run.run_id, status = %run.status, "run finished");

        Ok(run)
    }

    fn resolve_environment(&self) -> Result<RuntimeEnvironment, PipelineError> {
        if let Some(environment) = &self.environment {
            return Ok(environment.clone());
        }
        Ok(self.resolver.resolve()?.clone())
    }

    async fn publish_status(&self, stage: Option<&str>, phase: RunPhase, message: String) {
        self.bus
            .publish(PipelineEvent::status(stage, phase, message))
            .await;
    }
}
