// Grid-frame → physical coordinate mapping.

/// Maps points the model read off the grid into the physical pointer space.
///
/// The grid labels are drawn in original pixel space, and the mapping applies
/// the scale factor declared by the frame the model was shown. Results are
/// clamped to `[0, dim × scale − 1]` per axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateMapper {
    scale: f64,
    physical: Option<(u32, u32)>,
}

impl CoordinateMapper {
    pub fn new(scale: f64, physical: Option<(u32, u32)>) -> Self {
        Self { scale, physical }
    }

    pub fn identity() -> Self {
        Self::new(1.0, None)
    }

    pub fn map(&self, x: i32, y: i32) -> (i32, i32) {
        let Some((w, h)) = self.physical else {
            return (x, y);
        };
        if self.scale == 1.0 {
            return (x, y);
        }

        let max_x = ((w as f64 * self.scale) as i32).max(1);
        let max_y = ((h as f64 * self.scale) as i32).max(1);
        let sx = ((x as f64 * self.scale) as i32).clamp(0, max_x - 1);
        let sy = ((y as f64 * self.scale) as i32).clamp(0, max_y - 1);

        tracing::info!(from_x = x, from_y = y, x = sx, y = sy, scale = self.scale, "coordinates mapped");
        (sx, sy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_scale_is_identity() {
        let m = CoordinateMapper::new(1.0, Some((1920, 1080)));
        for (x, y) in [(0, 0), (17, 903), (1919, 1079), (5000, -3)] {
            assert_eq!(m.map(x, y), (x, y));
        }
    }

    #[test]
    fn no_capture_yet_is_identity() {
        let m = CoordinateMapper::new(0.5, None);
        assert_eq!(m.map(640, 480), (640, 480));
        assert_eq!(CoordinateMapper::identity().map(3, 4), (3, 4));
    }

    #[test]
    fn half_scale_maps_grid_point() {
        let m = CoordinateMapper::new(0.5, Some((1000, 1000)));
        assert_eq!(m.map(50, 50), (25, 25));
        assert_eq!(m.map(999, 0), (499, 0));
    }

    #[test]
    fn output_always_within_scaled_bounds() {
        let (w, h) = (1366u32, 768u32);
        for scale in [0.35, 0.5, 0.625, 0.9] {
            let m = CoordinateMapper::new(scale, Some((w, h)));
            let max_x = (w as f64 * scale) as i32 - 1;
            let max_y = (h as f64 * scale) as i32 - 1;
            for x in (-2000..4000).step_by(137) {
                for y in (-2000..4000).step_by(211) {
                    let (mx, my) = m.map(x, y);
                    assert!((0..=max_x).contains(&mx), "x {x} -> {mx} at scale {scale}");
                    assert!((0..=max_y).contains(&my), "y {y} -> {my} at scale {scale}");
                }
            }
        }
    }
}
