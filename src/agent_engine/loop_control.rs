// Run limits and cooperative cancellation.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::RunConfig;

/// Shared stop flag, set by Ctrl-C or an abort at the confirmation gate.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct LoopController {
    max_steps: Option<u32>,
    max_duration: Option<Duration>,
    start_time: Instant,
    abort: AbortHandle,
}

impl LoopController {
    pub fn new(config: &RunConfig, abort: AbortHandle) -> Self {
        Self {
            max_steps: config.max_steps,
            max_duration: config
                .max_duration_minutes
                .map(|m| Duration::from_secs(u64::from(m) * 60)),
            start_time: Instant::now(),
            abort,
        }
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    pub fn is_aborted(&self) -> bool {
        self.abort.is_aborted()
    }

    /// Reason to stop before starting step `steps_done + 1`, if any.
    pub fn limit_reached(&self, steps_done: u32) -> Option<String> {
        if let Some(max) = self.max_steps {
            if steps_done >= max {
                return Some(format!("step limit of {max} reached"));
            }
        }
        if let Some(max) = self.max_duration {
            if self.start_time.elapsed() >= max {
                return Some(format!("time limit of {} min reached", max.as_secs() / 60));
            }
        }
        None
    }
}
