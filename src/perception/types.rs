use chrono::{DateTime, Utc};
use image::{RgbImage, RgbaImage};

/// One raw screen snapshot in physical pixels.
#[derive(Debug, Clone)]
pub struct ScreenCapture {
    pub image: RgbaImage,
    pub captured_at: DateTime<Utc>,
}

impl ScreenCapture {
    pub fn new(image: RgbaImage) -> Self {
        Self {
            image,
            captured_at: Utc::now(),
        }
    }

    /// RGB channels at a physical point, `None` when out of bounds.
    pub fn rgb_at(&self, x: i32, y: i32) -> Option<[u8; 3]> {
        if x < 0 || y < 0 {
            return None;
        }
        self.image
            .get_pixel_checked(x as u32, y as u32)
            .map(|p| [p[0], p[1], p[2]])
    }
}

/// Grid-annotated, compressed representation of a capture.
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    /// Full-size annotated image, kept for archival.
    pub annotated: RgbImage,
    /// Base64 grayscale JPEG sent to the model.
    pub payload_base64: String,
    pub payload_bytes: usize,
    /// Ratio of encoded to physical dimensions.
    pub scale: f64,
    pub quality: u8,
    pub encoded_width: u32,
    pub encoded_height: u32,
    pub physical_width: u32,
    pub physical_height: u32,
}

impl EncodedFrame {
    pub fn within_budget(&self, budget: usize) -> bool {
        self.payload_bytes <= budget
    }
}
