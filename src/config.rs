use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{GridPilotError, GridPilotResult};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub encoder: EncoderConfig,
    #[serde(default)]
    pub click: ClickConfig,
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub safety: SafetyConfig,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub archive: ArchiveConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub active_provider: String,
    pub providers: HashMap<String, ProviderEntry>,
    /// Role-to-model mapping. If a role is absent, falls back to active_provider defaults.
    #[serde(default)]
    pub roles: RolesConfig,
}

impl Default for LlmConfig {
    fn default() -> Self {
        let mut providers = HashMap::new();
        providers.insert(
            "anthropic".to_string(),
            ProviderEntry {
                display_name: "Anthropic Claude".to_string(),
                api_base: "https://api.anthropic.com/v1/messages".to_string(),
                model: "claude-3-5-sonnet-20241022".to_string(),
                temperature: default_temperature(),
                adapter: Some("anthropic".to_string()),
                api_key: None,
                max_tokens: default_max_tokens(),
                proxy: None,
                request_timeout_secs: None,
            },
        );
        Self {
            active_provider: "anthropic".to_string(),
            providers,
            roles: RolesConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEntry {
    pub display_name: String,
    pub api_base: String,
    /// Default model for this provider (used as fallback when no role config exists).
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// "anthropic" for the Messages API, None for OpenAI-compatible
    pub adapter: Option<String>,
    /// Optional API key stored in config.toml (env var GRIDPILOT_<ID>_API_KEY wins).
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// e.g. "http://localhost:7890"
    #[serde(default)]
    pub proxy: Option<String>,
    /// Unset means the transport default (no timeout).
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RolesConfig {
    /// Vision model that reads the annotated screenshot and decides the next action.
    pub vision: Option<RoleEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleEntry {
    /// Must match a key under [llm.providers.*].
    pub provider: String,
    /// Model name sent to the API.
    pub model: String,
    /// Use SSE streaming (OpenAI-compatible adapter only).
    #[serde(default)]
    pub stream: bool,
    /// Overrides the provider-level temperature for this role.
    pub temperature: Option<f64>,
}

fn default_temperature() -> f64 {
    0.1
}

fn default_max_tokens() -> u32 {
    1000
}

/// Screenshot annotation and compression search.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    pub grid_pitch: u32,
    pub max_payload_bytes: usize,
    pub min_dimension: u32,
    pub initial_quality: u8,
    pub min_quality: u8,
    pub quality_step: u8,
    pub initial_scale: f64,
    pub scale_shrink: f64,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            grid_pitch: 100,
            max_payload_bytes: 30 * 1024,
            min_dimension: 480,
            initial_quality: 50,
            min_quality: 5,
            quality_step: 10,
            initial_scale: 0.5,
            scale_shrink: 0.7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClickConfig {
    /// A pixel is background when every RGB channel is above this.
    pub background_threshold: u8,
    pub search_radius: u32,
}

impl Default for ClickConfig {
    fn default() -> Self {
        Self {
            background_threshold: 240,
            search_radius: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Focus older than this is refreshed by re-clicking before typing.
    pub focus_stale_secs: u64,
    pub refocus_delay_ms: u64,
    /// Scroll amount that equals one wheel notch.
    pub scroll_unit: i32,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            focus_stale_secs: 5,
            refocus_delay_ms: 500,
            scroll_unit: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    /// Abort the run when the pointer sits on a screen corner.
    pub failsafe: bool,
    pub corner_tolerance: u32,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            failsafe: true,
            corner_tolerance: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Pause after each iteration so the UI can settle.
    pub step_pause_ms: u64,
    /// Number of recent actions quoted back to the model.
    pub history_window: usize,
    pub max_steps: Option<u32>,
    pub max_duration_minutes: Option<u32>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            step_pause_ms: 1000,
            history_window: 3,
            max_steps: None,
            max_duration_minutes: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    pub enabled: bool,
    pub root: PathBuf,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            root: PathBuf::from("screenshots"),
        }
    }
}

fn resolve_config_path(explicit: Option<&Path>) -> GridPilotResult<Option<PathBuf>> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(Some(path.to_path_buf()));
        }
        return Err(GridPilotError::Config(format!(
            "config file {} does not exist",
            path.display()
        )));
    }

    if let Ok(exe) = std::env::current_exe() {
        if let Some(parent) = exe.parent() {
            let candidate = parent.join("config.toml");
            if candidate.exists() {
                tracing::debug!(path = %candidate.display(), "config found next to executable");
                return Ok(Some(candidate));
            }
        }
    }

    let cwd = std::env::current_dir()?;
    let candidate = cwd.join("config.toml");
    if candidate.exists() {
        tracing::debug!(path = %candidate.display(), "config found in working directory");
        return Ok(Some(candidate));
    }

    if let Some(dir) = dirs::config_dir() {
        let candidate = dir.join("gridpilot").join("config.toml");
        if candidate.exists() {
            tracing::debug!(path = %candidate.display(), "config found in user config dir");
            return Ok(Some(candidate));
        }
    }

    Ok(None)
}

/// Load `config.toml`, falling back to built-in defaults when no file exists.
pub fn load_config(explicit: Option<&Path>) -> GridPilotResult<AppConfig> {
    let Some(path) = resolve_config_path(explicit)? else {
        tracing::info!("no config.toml found, using built-in defaults");
        return Ok(AppConfig::default());
    };
    let content = std::fs::read_to_string(&path)?;
    let config = parse_config(&content)?;
    tracing::info!(path = %path.display(), provider = %config.llm.active_provider, "config loaded");
    Ok(config)
}

pub fn parse_config(content: &str) -> GridPilotResult<AppConfig> {
    let config: AppConfig = toml::from_str(content)?;
    config.validate()?;
    Ok(config)
}

pub fn render_config(config: &AppConfig) -> GridPilotResult<String> {
    Ok(toml::to_string_pretty(config)?)
}

impl AppConfig {
    fn validate(&self) -> GridPilotResult<()> {
        let enc = &self.encoder;
        if enc.grid_pitch == 0 {
            return Err(GridPilotError::Config("encoder.grid_pitch must be > 0".into()));
        }
        if !(enc.initial_scale > 0.0 && enc.initial_scale <= 1.0) {
            return Err(GridPilotError::Config(
                "encoder.initial_scale must be in (0, 1]".into(),
            ));
        }
        if !(enc.scale_shrink > 0.0 && enc.scale_shrink < 1.0) {
            return Err(GridPilotError::Config(
                "encoder.scale_shrink must be in (0, 1)".into(),
            ));
        }
        if enc.min_quality == 0 || enc.min_quality > enc.initial_quality || enc.initial_quality > 100 {
            return Err(GridPilotError::Config(
                "encoder qualities must satisfy 1 <= min_quality <= initial_quality <= 100".into(),
            ));
        }
        if self.input.scroll_unit <= 0 {
            return Err(GridPilotError::Config("input.scroll_unit must be > 0".into()));
        }
        if enc.quality_step == 0 {
            return Err(GridPilotError::Config("encoder.quality_step must be > 0".into()));
        }
        if !self.llm.providers.contains_key(&self.llm.active_provider) {
            return Err(GridPilotError::Config(format!(
                "active provider '{}' has no [llm.providers] entry",
                self.llm.active_provider
            )));
        }
        Ok(())
    }
}
