/// Adaptive screenshot encoder.
///
/// Annotates the capture with the coordinate grid, then searches over
/// (scale, JPEG quality) until the grayscale payload fits the byte budget or
/// the encoded image would shrink below the minimum dimension. Large
/// overshoots are corrected by cutting resolution, small ones by cutting
/// quality.
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::RgbImage;

use crate::config::EncoderConfig;
use crate::errors::{GridPilotError, GridPilotResult};
use crate::perception::grid::draw_coordinate_grid;
use crate::perception::types::{EncodedFrame, ScreenCapture};

/// Upper bound on search iterations regardless of configuration.
const MAX_ATTEMPTS: usize = 64;

/// Below this scale a payload at minimum quality is accepted as-is.
const LAST_RESORT_SCALE: f64 = 0.2;

struct Candidate {
    bytes: Vec<u8>,
    scale: f64,
    quality: u8,
    width: u32,
    height: u32,
}

pub struct ImageEncoder {
    config: EncoderConfig,
}

impl ImageEncoder {
    pub fn new(config: EncoderConfig) -> Self {
        Self { config }
    }

    pub fn encode(&self, capture: &ScreenCapture) -> GridPilotResult<EncodedFrame> {
        let (w, h) = capture.image.dimensions();
        if w == 0 || h == 0 {
            return Err(GridPilotError::Perception("empty capture".into()));
        }
        let annotated = draw_coordinate_grid(&capture.image, self.config.grid_pitch);
        let best = self.search(&annotated)?;

        tracing::info!(
            width = best.width,
            height = best.height,
            quality = best.quality,
            scale = best.scale,
            kb = format!("{:.2}", best.bytes.len() as f64 / 1024.0),
            "screenshot encoded"
        );

        Ok(EncodedFrame {
            payload_bytes: best.bytes.len(),
            payload_base64: base64::engine::general_purpose::STANDARD.encode(&best.bytes),
            scale: best.scale,
            quality: best.quality,
            encoded_width: best.width,
            encoded_height: best.height,
            physical_width: w,
            physical_height: h,
            annotated,
        })
    }

    fn search(&self, annotated: &RgbImage) -> GridPilotResult<Candidate> {
        let cfg = &self.config;
        let (w, h) = annotated.dimensions();
        let budget = cfg.max_payload_bytes;

        let mut scale = cfg.initial_scale;
        if below_floor(w, h, scale, cfg.min_dimension) {
            // Start at the smallest scale that respects the floor.
            let shortest = w.min(h) as f64;
            scale = (cfg.min_dimension as f64 / shortest).min(1.0);
        }
        let mut quality = cfg.initial_quality;
        let mut last: Option<Candidate> = None;

        for attempt in 0..MAX_ATTEMPTS {
            let (nw, nh) = scaled_dims(w, h, scale);
            if let Some(prev) = last.take() {
                if nw < cfg.min_dimension || nh < cfg.min_dimension {
                    tracing::warn!(
                        width = nw,
                        height = nh,
                        bytes = prev.bytes.len(),
                        budget,
                        "encoded size floor reached, sending last payload over budget"
                    );
                    return Ok(prev);
                }
            }

            let bytes = encode_grayscale_jpeg(annotated, nw, nh, quality)?;
            let size = bytes.len();
            tracing::debug!(attempt, width = nw, height = nh, quality, size, "encode attempt");

            let candidate = Candidate {
                bytes,
                scale,
                quality,
                width: nw,
                height: nh,
            };
            if size <= budget || (quality <= cfg.min_quality && scale < LAST_RESORT_SCALE) {
                return Ok(candidate);
            }

            if size > budget * 2 || quality <= cfg.min_quality {
                scale *= cfg.scale_shrink;
            } else {
                quality = quality.saturating_sub(cfg.quality_step).max(cfg.min_quality);
            }
            last = Some(candidate);
        }

        last.ok_or_else(|| GridPilotError::Perception("encoder produced no payload".into()))
    }
}

fn scaled_dims(w: u32, h: u32, scale: f64) -> (u32, u32) {
    // Epsilon keeps e.g. 480/1080 * 1080 from truncating to 479.
    let sw = ((w as f64 * scale) + 1e-6).floor() as u32;
    let sh = ((h as f64 * scale) + 1e-6).floor() as u32;
    (sw.max(1), sh.max(1))
}

fn below_floor(w: u32, h: u32, scale: f64, min_dimension: u32) -> bool {
    let (nw, nh) = scaled_dims(w, h, scale);
    nw < min_dimension || nh < min_dimension
}

fn encode_grayscale_jpeg(src: &RgbImage, width: u32, height: u32, quality: u8) -> GridPilotResult<Vec<u8>> {
    let resized = image::imageops::resize(src, width, height, FilterType::Lanczos3);
    let gray = image::imageops::grayscale(&resized);
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality).encode_image(&gray)?;
    Ok(out)
}
