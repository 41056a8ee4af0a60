// Per-run screenshot archive.
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::{DateTime, Local};
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use regex::Regex;

use crate::agent_engine::state::Action;
use crate::errors::GridPilotResult;

const ARCHIVE_JPEG_QUALITY: u8 = 75;

fn unsafe_filename_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"[:/\\*?"<>|]"#).expect("static regex"))
}

pub fn sanitize_filename(name: &str) -> String {
    unsafe_filename_chars().replace_all(name, "_").into_owned()
}

/// First 30 characters of the task, keeping letters, digits, spaces and underscores.
pub fn task_dir_name(task: &str, started: DateTime<Local>) -> String {
    let prefix: String = task
        .chars()
        .take(30)
        .filter(|c| c.is_alphanumeric() || *c == ' ' || *c == '_')
        .collect();
    format!("{}_{}", started.format("%Y%m%d_%H%M%S"), prefix.trim())
}

/// Writes the grid-annotated frame of every step under one directory per run.
#[derive(Debug)]
pub struct TaskArchive {
    dir: PathBuf,
    step: u32,
}

impl TaskArchive {
    pub fn create(root: &Path, task: &str) -> GridPilotResult<Self> {
        let dir = root.join(task_dir_name(task, Local::now()));
        std::fs::create_dir_all(&dir)?;
        tracing::info!(dir = %dir.display(), "screenshot archive created");
        Ok(Self { dir, step: 0 })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Save the next step's frame as `step_<NNN>_<label>.jpg`.
    pub fn save_step(&mut self, frame: &RgbImage, action: &Action) -> GridPilotResult<PathBuf> {
        self.step += 1;
        let name = format!(
            "step_{:03}_{}.jpg",
            self.step,
            sanitize_filename(&action.archive_label())
        );
        let path = self.dir.join(name);
        let writer = BufWriter::new(File::create(&path)?);
        JpegEncoder::new_with_quality(writer, ARCHIVE_JPEG_QUALITY).encode_image(frame)?;
        tracing::info!(path = %path.display(), "screenshot saved");
        Ok(path)
    }
}
