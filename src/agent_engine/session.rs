use crate::agent_engine::history::ActionHistory;
use crate::executor::coordinator::CoordinateMapper;
use crate::executor::input_mode::InputMode;
use crate::perception::types::EncodedFrame;

/// Everything that survives from one iteration to the next within a run.
#[derive(Debug)]
pub struct Session {
    pub task: String,
    pub input_mode: InputMode,
    pub history: ActionHistory,
    /// Scale declared by the most recent encoded frame.
    pub scale: f64,
    /// Physical size of the most recent capture.
    pub physical: Option<(u32, u32)>,
    pub step: u32,
}

impl Session {
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            input_mode: InputMode::Inactive,
            history: ActionHistory::new(),
            scale: 1.0,
            physical: None,
            step: 0,
        }
    }

    pub fn apply_frame(&mut self, frame: &EncodedFrame) {
        self.scale = frame.scale;
        self.physical = Some((frame.physical_width, frame.physical_height));
    }

    pub fn mapper(&self) -> CoordinateMapper {
        CoordinateMapper::new(self.scale, self.physical)
    }
}
