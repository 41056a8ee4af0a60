use xcap::Monitor;

use crate::errors::{GridPilotError, GridPilotResult};
use crate::perception::types::ScreenCapture;

/// Anything that can produce a snapshot of the single capture surface.
pub trait ScreenSource {
    fn capture(&mut self) -> GridPilotResult<ScreenCapture>;
}

/// Captures the first monitor reported by the OS.
#[derive(Debug, Default)]
pub struct PrimaryMonitor;

impl PrimaryMonitor {
    pub fn new() -> Self {
        Self
    }
}

impl ScreenSource for PrimaryMonitor {
    fn capture(&mut self) -> GridPilotResult<ScreenCapture> {
        let monitors = Monitor::all()
            .map_err(|e| GridPilotError::Perception(format!("list monitors: {e}")))?;
        let monitor = monitors
            .into_iter()
            .next()
            .ok_or_else(|| GridPilotError::Perception("no monitor found".into()))?;
        let image = monitor
            .capture_image()
            .map_err(|e| GridPilotError::Perception(format!("screen capture: {e}")))?;
        tracing::debug!(width = image.width(), height = image.height(), "screen captured");
        Ok(ScreenCapture::new(image))
    }
}
