// Test doubles for the screen, input backend, model and operator.
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use image::{Rgba, RgbaImage, RgbImage};

use crate::agent_engine::confirmation::{Confirmation, ConfirmationGate};
use crate::agent_engine::state::Action;
use crate::errors::{GridPilotError, GridPilotResult};
use crate::executor::input::InputDriver;
use crate::llm::provider::LlmProvider;
use crate::llm::types::{CallConfig, ChatMessage, LlmResponse};
use crate::perception::screenshot::ScreenSource;
use crate::perception::types::{EncodedFrame, ScreenCapture};

pub fn frame_for(w: u32, h: u32, scale: f64) -> EncodedFrame {
    EncodedFrame {
        annotated: RgbImage::new(w.min(8), h.min(8)),
        payload_base64: "QUJD".into(),
        payload_bytes: 3,
        scale,
        quality: 50,
        encoded_width: (w as f64 * scale) as u32,
        encoded_height: (h as f64 * scale) as u32,
        physical_width: w,
        physical_height: h,
    }
}

pub struct MockScreen {
    image: RgbaImage,
    fail: bool,
    pub captures: usize,
}

impl MockScreen {
    pub fn dark(w: u32, h: u32) -> Self {
        Self {
            image: RgbaImage::from_pixel(w, h, Rgba([30, 30, 30, 255])),
            fail: false,
            captures: 0,
        }
    }

    pub fn white_with_dark(w: u32, h: u32, dark: &[(u32, u32)]) -> Self {
        let mut image = RgbaImage::from_pixel(w, h, Rgba([255, 255, 255, 255]));
        for &(x, y) in dark {
            image.put_pixel(x, y, Rgba([30, 30, 30, 255]));
        }
        Self {
            image,
            fail: false,
            captures: 0,
        }
    }

    pub fn failing() -> Self {
        Self {
            image: RgbaImage::new(1, 1),
            fail: true,
            captures: 0,
        }
    }
}

impl ScreenSource for MockScreen {
    fn capture(&mut self) -> GridPilotResult<ScreenCapture> {
        self.captures += 1;
        if self.fail {
            return Err(GridPilotError::Perception("display unavailable".into()));
        }
        Ok(ScreenCapture::new(self.image.clone()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverCall {
    Move(i32, i32),
    Click(i32, i32),
    Type(String),
    Press(String),
    Scroll(i32),
}

pub struct RecordingDriver {
    calls: Arc<Mutex<Vec<DriverCall>>>,
    screen: (i32, i32),
    pointer: (i32, i32),
    fail_next: bool,
}

impl RecordingDriver {
    pub fn new(screen: (i32, i32)) -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            screen,
            pointer: (screen.0 / 2, screen.1 / 2),
            fail_next: false,
        }
    }

    pub fn calls(&self) -> Arc<Mutex<Vec<DriverCall>>> {
        Arc::clone(&self.calls)
    }

    pub fn fail_next_injection(&mut self) {
        self.fail_next = true;
    }

    pub fn park_pointer(&mut self, x: i32, y: i32) {
        self.pointer = (x, y);
    }

    fn record(&mut self, call: DriverCall) -> GridPilotResult<()> {
        if std::mem::take(&mut self.fail_next) {
            return Err(GridPilotError::Executor("injected failure".into()));
        }
        self.calls.lock().unwrap().push(call);
        Ok(())
    }
}

impl InputDriver for RecordingDriver {
    fn pointer_position(&mut self) -> GridPilotResult<(i32, i32)> {
        Ok(self.pointer)
    }

    fn screen_size(&mut self) -> GridPilotResult<(i32, i32)> {
        Ok(self.screen)
    }

    fn move_to(&mut self, x: i32, y: i32) -> GridPilotResult<()> {
        self.record(DriverCall::Move(x, y))
    }

    fn click(&mut self, x: i32, y: i32) -> GridPilotResult<()> {
        self.record(DriverCall::Click(x, y))
    }

    fn type_text(&mut self, text: &str) -> GridPilotResult<()> {
        self.record(DriverCall::Type(text.to_string()))
    }

    fn press_key(&mut self, key: &str) -> GridPilotResult<()> {
        self.record(DriverCall::Press(key.to_string()))
    }

    fn scroll(&mut self, notches: i32) -> GridPilotResult<()> {
        self.record(DriverCall::Scroll(notches))
    }
}

/// Replays fixed reply texts in order; errors once they run out.
pub struct CannedProvider {
    replies: Mutex<VecDeque<String>>,
    fail: bool,
    pub requests: Arc<Mutex<Vec<Vec<ChatMessage>>>>,
}

impl CannedProvider {
    pub fn replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            fail: false,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::replies(Vec::<String>::new())
        }
    }

    pub fn call() -> CallConfig {
        CallConfig {
            model: "test-model".into(),
            stream: false,
            temperature: 0.1,
            max_tokens: 1000,
        }
    }
}

#[async_trait]
impl LlmProvider for CannedProvider {
    fn name(&self) -> &str {
        "canned"
    }

    async fn chat(&self, messages: Vec<ChatMessage>, _cfg: &CallConfig) -> GridPilotResult<LlmResponse> {
        self.requests.lock().unwrap().push(messages);
        if self.fail {
            return Err(GridPilotError::LlmProvider("503 Service Unavailable".into()));
        }
        let content = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| GridPilotError::LlmProvider("no more canned replies".into()))?;
        Ok(LlmResponse {
            content,
            reasoning: String::new(),
        })
    }
}

/// Answers from a script, proceeding once it runs out; records what it was shown.
pub struct ScriptedGate {
    answers: VecDeque<Confirmation>,
    pub shown: Arc<Mutex<Vec<Action>>>,
}

impl ScriptedGate {
    pub fn always_proceed() -> Self {
        Self::answers(Vec::new())
    }

    pub fn answers<I: IntoIterator<Item = Confirmation>>(answers: I) -> Self {
        Self {
            answers: answers.into_iter().collect(),
            shown: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl ConfirmationGate for ScriptedGate {
    async fn confirm(&mut self, action: &Action) -> GridPilotResult<Confirmation> {
        self.shown.lock().unwrap().push(action.clone());
        Ok(self.answers.pop_front().unwrap_or(Confirmation::Proceed))
    }
}
