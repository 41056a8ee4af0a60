use std::sync::Arc;
use std::time::Duration;

use tracing::Instrument;

use crate::agent_engine::archive::TaskArchive;
use crate::agent_engine::confirmation::{Confirmation, ConfirmationGate};
use crate::agent_engine::decision::DecisionClient;
use crate::agent_engine::loop_control::{AbortHandle, LoopController};
use crate::agent_engine::session::Session;
use crate::agent_engine::state::{Decision, LoopState, RunOutcome, RunStatus};
use crate::config::AppConfig;
use crate::errors::GridPilotResult;
use crate::executor::dispatcher::{ActionExecutor, ExecutionOutcome};
use crate::executor::input::InputDriver;
use crate::executor::safety::SafetyGuard;
use crate::llm::provider::LlmProvider;
use crate::llm::types::CallConfig;
use crate::perception::click_corrector::ClickCorrector;
use crate::perception::encoder::ImageEncoder;
use crate::perception::screenshot::ScreenSource;
use crate::perception::types::EncodedFrame;

/// Platform and service handles the engine drives.
pub struct EngineDeps {
    pub screen: Box<dyn ScreenSource>,
    pub driver: Box<dyn InputDriver>,
    pub provider: Arc<dyn LlmProvider>,
    pub call: CallConfig,
    pub gate: Box<dyn ConfirmationGate>,
}

/// The perception-decision-action loop for one task.
pub struct AgentEngine {
    state: LoopState,
    session: Session,
    screen: Box<dyn ScreenSource>,
    encoder: ImageEncoder,
    decider: DecisionClient,
    executor: ActionExecutor,
    gate: Box<dyn ConfirmationGate>,
    archive: Option<TaskArchive>,
    loop_ctrl: LoopController,
    step_pause: Duration,

    // ── Current iteration ────────────────────────────────────────────────
    frame: Option<EncodedFrame>,
    decision: Option<Decision>,
}

impl AgentEngine {
    pub fn new(task: &str, config: &AppConfig, deps: EngineDeps, abort: AbortHandle) -> Self {
        let archive = if config.archive.enabled {
            match TaskArchive::create(&config.archive.root, task) {
                Ok(a) => Some(a),
                Err(e) => {
                    tracing::warn!(error = %e, root = %config.archive.root.display(), "screenshot archive disabled");
                    None
                }
            }
        } else {
            None
        };

        let executor = ActionExecutor::new(
            deps.driver,
            ClickCorrector::new(&config.click),
            SafetyGuard::new(&config.safety),
            config.input.clone(),
        );

        Self {
            state: LoopState::Capturing,
            session: Session::new(task),
            screen: deps.screen,
            encoder: ImageEncoder::new(config.encoder.clone()),
            decider: DecisionClient::new(deps.provider, deps.call, config.run.history_window),
            executor,
            gate: deps.gate,
            archive,
            loop_ctrl: LoopController::new(&config.run, abort),
            step_pause: Duration::from_millis(config.run.step_pause_ms),
            frame: None,
            decision: None,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Run until the model reports completion or the run is stopped.
    pub async fn run(&mut self) -> RunOutcome {
        let run_id = uuid::Uuid::new_v4().to_string();
        let span = tracing::info_span!("run", run_id = %run_id);
        let status = self.run_loop().instrument(span).await;
        RunOutcome {
            run_id,
            status,
            steps: self.session.step,
        }
    }

    async fn run_loop(&mut self) -> RunStatus {
        tracing::info!(task = %self.session.task, "task started");
        let status = loop {
            if self.loop_ctrl.is_aborted() {
                tracing::warn!("run interrupted");
                break RunStatus::Interrupted;
            }

            match self.state {
                // ── Capturing: screenshot + encode ─────────────────────────
                LoopState::Capturing => {
                    if let Some(reason) = self.loop_ctrl.limit_reached(self.session.step) {
                        tracing::warn!(reason = %reason, "loop limit reached");
                        break RunStatus::LimitReached(reason);
                    }
                    self.session.step += 1;
                    tracing::info!(step = self.session.step, "Capturing");
                    match self.capture_and_encode() {
                        Ok(frame) => {
                            self.session.apply_frame(&frame);
                            self.frame = Some(frame);
                            self.state = LoopState::Deciding;
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "screen capture failed");
                            break RunStatus::Failed(e.to_string());
                        }
                    }
                }

                // ── Deciding: ask the model, archive the frame ─────────────
                LoopState::Deciding => {
                    let Some(frame) = self.frame.as_ref() else {
                        self.state = LoopState::Capturing;
                        continue;
                    };
                    let decision = self.decider.decide(&mut self.session, frame).await;
                    if let Some(archive) = self.archive.as_mut() {
                        if let Err(e) = archive.save_step(&frame.annotated, &decision.action) {
                            tracing::warn!(error = %e, "could not archive screenshot");
                        }
                    }
                    self.decision = Some(decision);
                    self.state = LoopState::AwaitingConfirmation;
                }

                // ── AwaitingConfirmation: human in the loop ────────────────
                LoopState::AwaitingConfirmation => {
                    let Some(decision) = self.decision.as_ref() else {
                        self.state = LoopState::Capturing;
                        continue;
                    };
                    match self.gate.confirm(&decision.action).await {
                        Ok(Confirmation::Proceed) => self.state = LoopState::Executing,
                        Ok(Confirmation::Abort) => {
                            tracing::warn!("operator aborted the task");
                            self.loop_ctrl.abort_handle().abort();
                            break RunStatus::Aborted;
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "confirmation failed");
                            break RunStatus::Failed(e.to_string());
                        }
                    }
                }

                // ── Executing: inject, then check completion ───────────────
                LoopState::Executing => {
                    let Some(decision) = self.decision.take() else {
                        self.state = LoopState::Capturing;
                        continue;
                    };
                    match self
                        .executor
                        .execute(&decision.action, &mut self.session, self.screen.as_mut())
                        .await
                    {
                        Ok(ExecutionOutcome::Failed(msg)) => {
                            tracing::warn!(error = %msg, "action failed, continuing");
                        }
                        Ok(outcome) => tracing::debug!(?outcome, "action done"),
                        Err(e) => {
                            tracing::error!(error = %e, "run stopped");
                            break RunStatus::Failed(e.to_string());
                        }
                    }
                    if decision.completed {
                        tracing::info!(steps = self.session.step, "task completed");
                        break RunStatus::Completed;
                    }
                    self.state = LoopState::Settling;
                }

                // ── Settling: let the UI catch up ──────────────────────────
                LoopState::Settling => {
                    tokio::time::sleep(self.step_pause).await;
                    self.frame = None;
                    self.state = LoopState::Capturing;
                }
            }
        };
        tracing::info!(status = ?status, steps = self.session.step, "agent loop ended");
        status
    }

    fn capture_and_encode(&mut self) -> GridPilotResult<EncodedFrame> {
        let capture = self.screen.capture()?;
        tracing::debug!(captured_at = %capture.captured_at, "screen captured");
        self.encoder.encode(&capture)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent_engine::state::Action;
    use crate::test_support::{CannedProvider, DriverCall, MockScreen, RecordingDriver, ScriptedGate};
    use std::sync::Mutex;

    fn config(max_steps: Option<u32>) -> AppConfig {
        let mut cfg = AppConfig::default();
        cfg.run.step_pause_ms = 0;
        cfg.input.refocus_delay_ms = 0;
        cfg.run.max_steps = max_steps;
        cfg.archive.enabled = false;
        // Keep the first encode attempt so scales are predictable.
        cfg.encoder.max_payload_bytes = 4 * 1024 * 1024;
        cfg
    }

    struct Harness {
        engine: AgentEngine,
        calls: Arc<Mutex<Vec<DriverCall>>>,
        shown: Arc<Mutex<Vec<Action>>>,
        abort: AbortHandle,
    }

    fn harness(cfg: &AppConfig, screen: MockScreen, driver: RecordingDriver, replies: &[&str], gate: ScriptedGate) -> Harness {
        let calls = driver.calls();
        let shown = Arc::clone(&gate.shown);
        let abort = AbortHandle::new();
        let deps = EngineDeps {
            screen: Box::new(screen),
            driver: Box::new(driver),
            provider: Arc::new(CannedProvider::replies(replies.iter().copied())),
            call: CannedProvider::call(),
            gate: Box::new(gate),
        };
        Harness {
            engine: AgentEngine::new("open the search page", cfg, deps, abort.clone()),
            calls,
            shown,
            abort,
        }
    }

    #[tokio::test]
    async fn prose_wrapped_reply_runs_to_completion() {
        let mut h = harness(
            &config(None),
            MockScreen::dark(1000, 800),
            RecordingDriver::new((1000, 800)),
            &[r#"Sure! {"infer":"submit","action":{"type":"press","key":"enter"},"completed":true} Done."#],
            ScriptedGate::always_proceed(),
        );
        let outcome = h.engine.run().await;
        assert!(outcome.is_success());
        assert_eq!(outcome.steps, 1);
        assert_eq!(h.calls.lock().unwrap().as_slice(), [DriverCall::Press("enter".into())]);
        assert_eq!(h.engine.session().history.len(), 1);
    }

    #[tokio::test]
    async fn reply_without_completed_executes_nothing() {
        let mut h = harness(
            &config(Some(1)),
            MockScreen::dark(1000, 800),
            RecordingDriver::new((1000, 800)),
            &[r#"{"infer":"x","action":{"type":"click","x":10,"y":10}}"#],
            ScriptedGate::always_proceed(),
        );
        let outcome = h.engine.run().await;
        assert!(matches!(outcome.status, RunStatus::LimitReached(_)));
        assert!(h.calls.lock().unwrap().is_empty());
        assert_eq!(h.shown.lock().unwrap().as_slice(), [Action::None]);
        assert!(h.engine.session().history.is_empty());
    }

    #[tokio::test]
    async fn malformed_action_never_completes_the_task() {
        let mut h = harness(
            &config(Some(1)),
            MockScreen::dark(800, 600),
            RecordingDriver::new((800, 600)),
            &[r#"{"action":{"type":"click","x":400},"completed":true}"#],
            ScriptedGate::always_proceed(),
        );
        let outcome = h.engine.run().await;
        assert!(!outcome.is_success());
        assert!(matches!(outcome.status, RunStatus::LimitReached(_)));
        assert!(h.calls.lock().unwrap().is_empty());
        assert_eq!(h.shown.lock().unwrap().as_slice(), [Action::None]);
        assert!(h.engine.session().history.is_empty());
    }

    #[tokio::test]
    async fn run_ends_in_completed_only_after_executing() {
        let mut h = harness(
            &config(None),
            MockScreen::dark(800, 600),
            RecordingDriver::new((800, 600)),
            &[
                r#"{"action":{"type":"none"},"completed":false}"#,
                r#"{"action":{"type":"press","key":"tab"},"completed":true}"#,
            ],
            ScriptedGate::always_proceed(),
        );
        let outcome = h.engine.run().await;
        assert_eq!(outcome.status, RunStatus::Completed);
        assert_eq!(outcome.steps, 2);
        assert_eq!(h.calls.lock().unwrap().as_slice(), [DriverCall::Press("tab".into())]);
        assert_eq!(h.shown.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn click_then_type_across_iterations() {
        let mut h = harness(
            &config(None),
            MockScreen::dark(1920, 1080),
            RecordingDriver::new((1920, 1080)),
            &[
                r#"{"infer":"address bar","action":{"type":"click","x":400,"y":60},"completed":false}"#,
                r#"{"infer":"url","action":{"type":"type","text":"example.com"},"completed":false}"#,
                r#"{"infer":"go","action":{"type":"press","key":"enter"},"completed":true}"#,
            ],
            ScriptedGate::always_proceed(),
        );
        let outcome = h.engine.run().await;
        assert!(outcome.is_success());
        assert_eq!(outcome.steps, 3);
        // 1920x1080 encodes at scale 0.5.
        assert_eq!(
            h.calls.lock().unwrap().as_slice(),
            [
                DriverCall::Click(200, 30),
                DriverCall::Click(200, 30),
                DriverCall::Type("example.com".into()),
                DriverCall::Press("enter".into()),
            ]
        );
        assert!(!h.engine.session().input_mode.is_active());
    }

    #[tokio::test]
    async fn abort_at_gate_stops_without_injecting() {
        let mut h = harness(
            &config(None),
            MockScreen::dark(800, 600),
            RecordingDriver::new((800, 600)),
            &[r#"{"action":{"type":"click","x":10,"y":10},"completed":false}"#],
            ScriptedGate::answers([Confirmation::Abort]),
        );
        let outcome = h.engine.run().await;
        assert_eq!(outcome.status, RunStatus::Aborted);
        assert!(!outcome.is_success());
        assert!(h.calls.lock().unwrap().is_empty());
        assert!(h.abort.is_aborted());
    }

    #[tokio::test]
    async fn external_interrupt_stops_before_capturing() {
        let mut h = harness(
            &config(None),
            MockScreen::dark(800, 600),
            RecordingDriver::new((800, 600)),
            &[],
            ScriptedGate::always_proceed(),
        );
        h.abort.abort();
        let outcome = h.engine.run().await;
        assert_eq!(outcome.status, RunStatus::Interrupted);
        assert_eq!(outcome.steps, 0);
    }

    #[tokio::test]
    async fn safety_trip_fails_the_run() {
        let mut driver = RecordingDriver::new((800, 600));
        driver.park_pointer(0, 0);
        let mut h = harness(
            &config(None),
            MockScreen::dark(800, 600),
            driver,
            &[r#"{"action":{"type":"scroll","amount":100},"completed":false}"#],
            ScriptedGate::always_proceed(),
        );
        let outcome = h.engine.run().await;
        assert!(matches!(outcome.status, RunStatus::Failed(ref m) if m.contains("Safety trip")));
        assert!(h.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn capture_failure_fails_the_run() {
        let mut h = harness(
            &config(None),
            MockScreen::failing(),
            RecordingDriver::new((800, 600)),
            &[],
            ScriptedGate::always_proceed(),
        );
        let outcome = h.engine.run().await;
        assert!(matches!(outcome.status, RunStatus::Failed(_)));
    }

    #[tokio::test]
    async fn steps_are_archived() {
        let root = tempfile::tempdir().unwrap();
        let mut cfg = config(None);
        cfg.archive.enabled = true;
        cfg.archive.root = root.path().to_path_buf();
        let mut h = harness(
            &cfg,
            MockScreen::dark(800, 600),
            RecordingDriver::new((800, 600)),
            &[
                r#"{"action":{"type":"move","x":100,"y":100},"completed":false}"#,
                r#"{"action":{"type":"none"},"completed":true}"#,
            ],
            ScriptedGate::always_proceed(),
        );
        assert!(h.engine.run().await.is_success());

        let run_dir = std::fs::read_dir(root.path()).unwrap().next().unwrap().unwrap().path();
        let mut names: Vec<String> = std::fs::read_dir(&run_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, ["step_001_move_at_100_100.jpg", "step_002_none.jpg"]);
    }
}
