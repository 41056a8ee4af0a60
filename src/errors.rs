use thiserror::Error;

#[derive(Debug, Error)]
pub enum GridPilotError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("LLM provider error: {0}")]
    LlmProvider(String),

    #[error("SSE parsing error: {0}")]
    SseParsing(String),

    #[error("Perception error: {0}")]
    Perception(String),

    #[error("Executor error: {0}")]
    Executor(String),

    /// The pointer was parked on a fail-safe corner. Aborts the whole run.
    #[error("Safety trip: {0}")]
    SafetyTrip(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("TOML deserialize error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("Agent error: {0}")]
    Agent(String),
}

impl GridPilotError {
    /// Errors that must end the run instead of degrading the current action.
    pub fn is_fatal(&self) -> bool {
        matches!(self, GridPilotError::SafetyTrip(_))
    }
}

pub type GridPilotResult<T> = Result<T, GridPilotError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safety_trip_is_fatal() {
        assert!(GridPilotError::SafetyTrip("corner".into()).is_fatal());
        assert!(!GridPilotError::Executor("boom".into()).is_fatal());
        assert!(!GridPilotError::Validation("missing x".into()).is_fatal());
    }
}
