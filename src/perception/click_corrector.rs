/// Nudges clicks that land on empty background onto the nearest visible pixel.
///
/// Model coordinates often hit the padding around a control instead of its
/// glyph or border. When the target pixel is background, the square of
/// `radius` around it is searched in increasing Manhattan distance.
use crate::config::ClickConfig;
use crate::perception::types::ScreenCapture;

#[derive(Debug, Clone)]
pub struct ClickCorrector {
    threshold: u8,
    radius: i32,
}

impl ClickCorrector {
    pub fn new(config: &ClickConfig) -> Self {
        Self {
            threshold: config.background_threshold,
            radius: config.search_radius as i32,
        }
    }

    /// Every channel brighter than the threshold.
    pub fn is_background(&self, rgb: [u8; 3]) -> bool {
        rgb.iter().all(|&c| c > self.threshold)
    }

    /// Nearest non-background point within the search square, the point itself
    /// when it is already non-background, or `None` for an empty neighborhood.
    pub fn find_nearest_clickable(&self, screen: &ScreenCapture, x: i32, y: i32) -> Option<(i32, i32)> {
        let r = self.radius;
        for dist in 0..=(2 * r) {
            let span = dist.min(r);
            for dx in -span..=span {
                let rest = dist - dx.abs();
                if rest > r {
                    continue;
                }
                let dys: &[i32] = if rest == 0 { &[0] } else { &[-rest, rest] };
                for &dy in dys {
                    let (px, py) = (x + dx, y + dy);
                    match screen.rgb_at(px, py) {
                        Some(rgb) if !self.is_background(rgb) => return Some((px, py)),
                        _ => {}
                    }
                }
            }
        }
        None
    }

    /// Corrected target for a click at `(x, y)`; unchanged when no better point exists.
    pub fn correct(&self, screen: &ScreenCapture, x: i32, y: i32) -> (i32, i32) {
        match screen.rgb_at(x, y) {
            Some(rgb) if self.is_background(rgb) => {
                match self.find_nearest_clickable(screen, x, y) {
                    Some((nx, ny)) => {
                        tracing::info!(from_x = x, from_y = y, x = nx, y = ny, "click nudged off background");
                        (nx, ny)
                    }
                    None => {
                        tracing::debug!(x, y, radius = self.radius, "no clickable pixel nearby");
                        (x, y)
                    }
                }
            }
            _ => (x, y),
        }
    }
}
