// Pointer fail-safe.
use crate::config::SafetyConfig;
use crate::errors::{GridPilotError, GridPilotResult};

/// Aborts injection when the operator parks the pointer on a screen corner.
#[derive(Debug, Clone)]
pub struct SafetyGuard {
    enabled: bool,
    tolerance: i32,
}

impl SafetyGuard {
    pub fn new(config: &SafetyConfig) -> Self {
        Self {
            enabled: config.failsafe,
            tolerance: config.corner_tolerance as i32,
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            tolerance: 0,
        }
    }

    pub fn in_corner(&self, (x, y): (i32, i32), (w, h): (i32, i32)) -> bool {
        let t = self.tolerance;
        let near_left = x <= t;
        let near_right = x >= w - 1 - t;
        let near_top = y <= t;
        let near_bottom = y >= h - 1 - t;
        (near_left || near_right) && (near_top || near_bottom)
    }

    pub fn check(&self, pointer: (i32, i32), screen: (i32, i32)) -> GridPilotResult<()> {
        if self.enabled && self.in_corner(pointer, screen) {
            tracing::error!(x = pointer.0, y = pointer.1, "pointer on fail-safe corner");
            return Err(GridPilotError::SafetyTrip(format!(
                "pointer at ({}, {}) is on a screen corner",
                pointer.0, pointer.1
            )));
        }
        Ok(())
    }
}
