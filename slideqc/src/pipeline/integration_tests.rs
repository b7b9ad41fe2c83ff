//! End-to-end controller tests against fake stage executables.
//!
//! The fake toolchain uses /bin/sh as the interpreter and small shell scripts
//! as stages. Each script appends its stage name to `order.log` in the run
//! directory, which lets the tests assert strict sequential invocation and
//! that skipped stages are never launched.

#![cfg(unix)]

mod tests {
    use crate::config::RunOptions;
    use crate::core::{RunPhase, RunStatus, StageOutcome};
    use crate::errors::PipelineError;
    use crate::events::{CollectingEventSink, EventBus};
    use crate::pipeline::PipelineController;
    use crate::runtime::{EnvResolver, RuntimeEnvironment};
    use crate::stage::{StageRunner, StageSpec};
    use pretty_assertions::assert_eq;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use std::time::Duration;

    struct Fixture {
        _dir: tempfile::TempDir,
        scripts: PathBuf,
        slide: PathBuf,
        output_root: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let scripts = dir.path().join("scripts");
            std::fs::create_dir_all(&scripts).unwrap();

            let slide = dir.path().join("sample.svs");
            std::fs::write(&slide, b"fake slide bytes").unwrap();

            Self {
                scripts: scripts.clone(),
                slide,
                output_root: dir.path().join("out"),
                _dir: dir,
            }
        }

        /// A stage script that logs its invocation, then exits with `code`.
        fn script(&self, name: &str, stage: &str, code: i32) {
            let body = format!("echo {stage} >> \"$4/order.log\"\nexit {code}\n");
            std::fs::write(self.scripts.join(name), body).unwrap();
        }

        fn slow_script(&self, name: &str, stage: &str) {
            let body = format!("echo {stage} >> \"$4/order.log\"\nsleep 30\n");
            std::fs::write(self.scripts.join(name), body).unwrap();
        }

        fn environment(&self) -> RuntimeEnvironment {
            RuntimeEnvironment {
                root: self.scripts.clone(),
                interpreter: PathBuf::from("/bin/sh"),
                scripts_dir: self.scripts.clone(),
                validated: true,
            }
        }

        fn options(&self) -> RunOptions {
            RunOptions::new(&self.slide).with_output_root(&self.output_root)
        }
    }

    fn invocation_order(run_dir: &Path) -> Vec<String> {
        std::fs::read_to_string(run_dir.join("order.log"))
            .unwrap_or_default()
            .lines()
            .map(String::from)
            .collect()
    }

    #[tokio::test]
    async fn test_optional_failure_downgrades_to_warnings() {
        let fx = Fixture::new();
        fx.script("detect.sh", "detect", 0);
        fx.script("qc.sh", "qc", 0);
        fx.script("report.sh", "report", 1);
        fx.script("overlay.sh", "overlay", 0);

        let bus = Arc::new(EventBus::new());
        let controller = PipelineController::new(fx.options(), bus)
            .unwrap()
            .with_environment(fx.environment())
            .with_stages(vec![
                StageSpec::new("detect", "detect.sh"),
                StageSpec::new("qc", "qc.sh"),
                StageSpec::new("report", "report.sh").optional(),
                StageSpec::new("overlay", "overlay.sh").optional(),
            ]);

        let run = controller.run().await.unwrap();

        assert_eq!(run.status, RunStatus::CompletedWithWarnings);
        assert_eq!(
            run.outcomes(),
            vec![
                StageOutcome::Succeeded,
                StageOutcome::Succeeded,
                StageOutcome::Failed,
                StageOutcome::Succeeded,
            ]
        );
        // Strictly sequential, in plan order, all four launched
        assert_eq!(
            invocation_order(&run.output_dir),
            vec!["detect", "qc", "report", "overlay"]
        );
        // The staged slide is in place
        assert!(run.output_dir.join("slides_in/sample.svs").exists());
    }

    #[tokio::test]
    async fn test_required_failure_skips_rest() {
        let fx = Fixture::new();
        fx.script("detect.sh", "detect", 0);
        fx.script("qc.sh", "qc", 1);
        fx.script("report.sh", "report", 0);
        fx.script("overlay.sh", "overlay", 0);

        let bus = Arc::new(EventBus::new());
        let controller = PipelineController::new(fx.options(), bus)
            .unwrap()
            .with_environment(fx.environment())
            .with_stages(vec![
                StageSpec::new("detect", "detect.sh"),
                StageSpec::new("qc", "qc.sh"),
                StageSpec::new("report", "report.sh").optional(),
                StageSpec::new("overlay", "overlay.sh").optional(),
            ]);

        let run = controller.run().await.unwrap();

        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(
            run.outcomes(),
            vec![
                StageOutcome::Succeeded,
                StageOutcome::Failed,
                StageOutcome::Skipped,
                StageOutcome::Skipped,
            ]
        );
        // report and overlay were never launched
        assert_eq!(invocation_order(&run.output_dir), vec!["detect", "qc"]);
    }

    #[tokio::test]
    async fn test_cancellation_terminates_current_and_skips_rest() {
        let fx = Fixture::new();
        fx.slow_script("slow.sh", "detect");
        fx.script("qc.sh", "qc", 0);

        let bus = Arc::new(EventBus::new());
        let controller = PipelineController::new(fx.options(), bus.clone())
            .unwrap()
            .with_environment(fx.environment())
            .with_runner(StageRunner::new(bus).with_kill_grace(Duration::from_millis(500)))
            .with_stages(vec![
                StageSpec::new("detect", "slow.sh"),
                StageSpec::new("qc", "qc.sh"),
            ]);

        let handle = controller.spawn();
        tokio::time::sleep(Duration::from_millis(300)).await;
        handle.cancel("operator abort");

        let run = tokio::time::timeout(Duration::from_secs(10), handle.wait())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(run.status, RunStatus::Cancelled);
        assert_eq!(
            run.outcomes(),
            vec![StageOutcome::Cancelled, StageOutcome::Skipped]
        );
        // qc was never launched
        assert_eq!(invocation_order(&run.output_dir), vec!["detect"]);
    }

    #[tokio::test]
    async fn test_environment_failure_runs_no_stage() {
        let fx = Fixture::new();
        let empty = fx.scripts.join("no_toolchain_here");

        let bus = Arc::new(EventBus::new());
        let controller = PipelineController::new(fx.options(), bus)
            .unwrap()
            .with_resolver(Arc::new(EnvResolver::with_candidates(vec![empty.clone()])));

        let err = controller.run().await.unwrap_err();
        assert!(matches!(err, PipelineError::Environment(_)));
        assert!(err.to_string().contains("no_toolchain_here"));
        // No workspace was created
        assert!(!fx.output_root.exists());
    }

    #[tokio::test]
    async fn test_usage_error_rejected_before_side_effects() {
        let fx = Fixture::new();
        let options = RunOptions::new(fx.slide.with_file_name("ghost.svs"))
            .with_output_root(&fx.output_root);

        let err = PipelineController::new(options, Arc::new(EventBus::new())).unwrap_err();
        assert!(matches!(err, PipelineError::Usage(_)));
        assert!(!fx.output_root.exists());
    }

    #[tokio::test]
    async fn test_status_events_bracket_the_run() {
        let fx = Fixture::new();
        fx.script("detect.sh", "detect", 0);
        fx.script("qc.sh", "qc", 0);

        let bus = Arc::new(EventBus::new());
        let sink = Arc::new(CollectingEventSink::new());
        let forwarder = bus.attach(sink.clone());

        let controller = PipelineController::new(fx.options(), bus.clone())
            .unwrap()
            .with_environment(fx.environment())
            .with_stages(vec![
                StageSpec::new("detect", "detect.sh"),
                StageSpec::new("qc", "qc.sh"),
            ]);

        let run = controller.run().await.unwrap();
        bus.close();
        forwarder.await.unwrap();

        let statuses = sink.statuses();
        assert_eq!(statuses.first().unwrap().phase, RunPhase::RunStarted);
        assert_eq!(statuses.last().unwrap().phase, RunPhase::RunFinished);
        // Terminal event of a successful run carries the output directory
        assert_eq!(
            statuses.last().unwrap().output_dir.as_deref(),
            Some(run.output_dir.as_path())
        );

        let phases: Vec<(Option<&str>, RunPhase)> = statuses
            .iter()
            .map(|s| (s.stage.as_deref(), s.phase))
            .collect();
        assert_eq!(
            phases,
            vec![
                (None, RunPhase::RunStarted),
                (Some("detect"), RunPhase::StageStarted),
                (Some("detect"), RunPhase::StageFinished),
                (Some("qc"), RunPhase::StageStarted),
                (Some("qc"), RunPhase::StageFinished),
                (None, RunPhase::RunFinished),
            ]
        );
    }
}
