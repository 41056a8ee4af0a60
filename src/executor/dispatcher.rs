// Action executor: turns a validated action into pointer and keyboard effects.
use std::time::{Duration, Instant};

use crate::agent_engine::session::Session;
use crate::agent_engine::state::Action;
use crate::config::InputConfig;
use crate::errors::GridPilotResult;
use crate::executor::input::InputDriver;
use crate::executor::input_mode::TypeGate;
use crate::executor::safety::SafetyGuard;
use crate::perception::click_corrector::ClickCorrector;
use crate::perception::screenshot::ScreenSource;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    Executed,
    /// `none` action.
    NoOp,
    /// Refused without side effects, e.g. typing outside input mode.
    Skipped(String),
    /// Injection failed; input mode was reset.
    Failed(String),
}

pub struct ActionExecutor {
    driver: Box<dyn InputDriver>,
    corrector: ClickCorrector,
    safety: SafetyGuard,
    input: InputConfig,
}

impl ActionExecutor {
    pub fn new(
        driver: Box<dyn InputDriver>,
        corrector: ClickCorrector,
        safety: SafetyGuard,
        input: InputConfig,
    ) -> Self {
        Self {
            driver,
            corrector,
            safety,
            input,
        }
    }

    /// Execute one action against the session.
    ///
    /// Only a safety trip is returned as `Err`;
    /// everything else is logged and reported as [`ExecutionOutcome::Failed`].
    /// Input mode is reset on any error.
    pub async fn execute(
        &mut self,
        action: &Action,
        session: &mut Session,
        screen: &mut dyn ScreenSource,
    ) -> GridPilotResult<ExecutionOutcome> {
        match self.dispatch(action, session, screen).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                session.input_mode.reset();
                tracing::error!(action = %action.summary(), error = %e, "action failed");
                if e.is_fatal() {
                    Err(e)
                } else {
                    Ok(ExecutionOutcome::Failed(e.to_string()))
                }
            }
        }
    }

    async fn dispatch(
        &mut self,
        action: &Action,
        session: &mut Session,
        screen: &mut dyn ScreenSource,
    ) -> GridPilotResult<ExecutionOutcome> {
        match action {
            Action::Move { x, y } => {
                let (tx, ty) = self.resolve_target(*x, *y, session, screen)?;
                self.check_safety()?;
                self.driver.move_to(tx, ty)?;
                tracing::info!(x = tx, y = ty, "pointer moved");
                Ok(ExecutionOutcome::Executed)
            }
            Action::Click { x, y } => {
                let (tx, ty) = self.resolve_target(*x, *y, session, screen)?;
                self.check_safety()?;
                self.driver.click(tx, ty)?;
                session.input_mode.on_click(tx, ty, Instant::now());
                tracing::info!(x = tx, y = ty, "clicked, input mode active");
                Ok(ExecutionOutcome::Executed)
            }
            Action::Type { text } => self.type_text(text, session).await,
            Action::Press { key } => {
                self.check_safety()?;
                self.driver.press_key(key)?;
                session.input_mode.on_press(key);
                tracing::info!(key = %key, "key pressed");
                Ok(ExecutionOutcome::Executed)
            }
            Action::Scroll { amount } => {
                let notches = scroll_notches(*amount, self.input.scroll_unit);
                self.check_safety()?;
                self.driver.scroll(notches)?;
                tracing::info!(amount, notches, "scrolled");
                Ok(ExecutionOutcome::Executed)
            }
            Action::None => {
                tracing::info!("no action this step");
                Ok(ExecutionOutcome::NoOp)
            }
        }
    }

    async fn type_text(&mut self, text: &str, session: &mut Session) -> GridPilotResult<ExecutionOutcome> {
        let stale_after = Duration::from_secs(self.input.focus_stale_secs);
        let (x, y) = match session.input_mode.gate_type(Instant::now(), stale_after) {
            TypeGate::Rejected => {
                tracing::warn!(text = %text, "type refused: not in input mode, click a text field first");
                return Ok(ExecutionOutcome::Skipped("not in input mode".into()));
            }
            TypeGate::Refocus { x, y } => {
                tracing::info!(x, y, "focus stale, clicking field again");
                (x, y)
            }
            TypeGate::Direct { x, y } => {
                tracing::debug!(x, y, "restoring field focus");
                (x, y)
            }
        };
        // The operator's terminal may hold focus after confirmation.
        self.check_safety()?;
        self.driver.click(x, y)?;
        tokio::time::sleep(Duration::from_millis(self.input.refocus_delay_ms)).await;
        self.check_safety()?;
        self.driver.type_text(text)?;
        session.input_mode.on_click(x, y, Instant::now());
        tracing::info!(chars = text.chars().count(), "text typed");
        Ok(ExecutionOutcome::Executed)
    }

    /// Clamp to the physical screen, map into pointer space, then nudge off
    /// background using a live sample.
    fn resolve_target(
        &mut self,
        x: i32,
        y: i32,
        session: &Session,
        screen: &mut dyn ScreenSource,
    ) -> GridPilotResult<(i32, i32)> {
        let (w, h) = match session.physical {
            Some((w, h)) => (w as i32, h as i32),
            None => self.driver.screen_size()?,
        };
        let (cx, cy) = clamp_to_screen(x, y, w, h);
        if (cx, cy) != (x, y) {
            tracing::warn!(x, y, clamped_x = cx, clamped_y = cy, "coordinates outside screen, clamped");
        }

        let (mx, my) = session.mapper().map(cx, cy);

        let live = screen.capture()?;
        Ok(self.corrector.correct(&live, mx, my))
    }

    fn check_safety(&mut self) -> GridPilotResult<()> {
        let pointer = self.driver.pointer_position()?;
        let screen = self.driver.screen_size()?;
        self.safety.check(pointer, screen)
    }
}

pub fn clamp_to_screen(x: i32, y: i32, w: i32, h: i32) -> (i32, i32) {
    (x.clamp(0, (w - 1).max(0)), y.clamp(0, (h - 1).max(0)))
}

/// Wheel notches for a signed scroll amount, rounding away from zero.
/// Saturates at the `i32` range.
pub fn scroll_notches(amount: i32, unit: i32) -> i32 {
    if amount == 0 || unit <= 0 {
        return 0;
    }
    let unit = i64::from(unit);
    let n = (i64::from(amount).abs() + unit - 1) / unit;
    (n * i64::from(amount.signum())).clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}
