/// Request text sent alongside the annotated screenshot.
use crate::agent_engine::session::Session;
use crate::llm::types::{ChatMessage, ContentPart};
use crate::perception::types::EncodedFrame;

const REPLY_SCHEMA: &str = r#"{
    "infer": "what you see and why you chose this action",
    "action": {
        "type": "click",   // one of: move / click / type / press / scroll / none
        "x": 100,          // required for move and click
        "y": 200,          // required for move and click
        "text": "...",     // required for type
        "key": "enter",    // required for press, e.g. "enter", "tab", "ctrl+l"
        "amount": -100     // required for scroll, positive scrolls up
    },
    "completed": false     // true once the task is done after this action
}"#;

const RULES: &str = "\
1. To enter text: first click the text field, wait for input mode, then type.
2. The type action is only allowed in input mode. Click a field to enter it.
   Enter, Escape and Tab leave input mode.
3. Read positions off the red grid labels; they are in screen pixels.
4. Aim for the center of the target element and avoid its edges.
5. Reply with the JSON object only.";

pub fn build_prompt_text(session: &Session, frame: &EncodedFrame, now: std::time::Instant, history_window: usize) -> String {
    let (w, h) = (frame.physical_width, frame.physical_height);
    let history = session.history.recent(history_window);
    let history_text = if history.is_empty() {
        "No actions yet.".to_string()
    } else {
        history
            .iter()
            .map(|a| format!("- {a}"))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "Task: {task}\n\n\
         Coordinate bounds:\n\
         - Screen resolution: {w}x{h}\n\
         - x must be in [0, {max_x}], y must be in [0, {max_y}]\n\n\
         Reply strictly in this JSON format:\n{REPLY_SCHEMA}\n\n\
         Input state:\n{input}\n\n\
         Screen: {w}x{h}\n\n\
         Recent actions:\n{history_text}\n\n\
         Rules:\n{RULES}",
        task = session.task,
        max_x = w.saturating_sub(1),
        max_y = h.saturating_sub(1),
        input = session.input_mode.describe(now),
    )
}

/// One user message: the screenshot followed by the instructions.
pub fn build_request(session: &Session, frame: &EncodedFrame, history_window: usize) -> Vec<ChatMessage> {
    vec![ChatMessage::user(vec![
        ContentPart::Image {
            media_type: "image/jpeg".into(),
            data: frame.payload_base64.clone(),
        },
        ContentPart::Text {
            text: build_prompt_text(session, frame, std::time::Instant::now(), history_window),
        },
    ])]
}
