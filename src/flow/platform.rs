//! Mapping of generic rich messages onto what each platform can render.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Rendering capability of a platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum PlatformKind {
    /// renders text, images, buttons and quick replies natively
    Rich,
    /// renders inline and reply keyboards
    Keyboard,
    /// plain text only
    TextOnly,
}

impl PlatformKind {
    pub fn of(platform: &str) -> Self {
        match platform.to_ascii_lowercase().as_str() {
            "facebook" | "messenger" | "instagram" | "whatsapp" => PlatformKind::Rich,
            "telegram" => PlatformKind::Keyboard,
            _ => PlatformKind::TextOnly,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum QuickReplyRepr {
    Title(String),
    Full { title: String, payload: Option<String> },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(from = "QuickReplyRepr")]
pub struct QuickReply {
    pub title: String,
    pub payload: Option<String>,
}

impl From<QuickReplyRepr> for QuickReply {
    fn from(repr: QuickReplyRepr) -> Self {
        match repr {
            QuickReplyRepr::Title(title) => Self {
                title,
                payload: None,
            },
            QuickReplyRepr::Full {
                title,
                payload,
            } => Self {
                title,
                payload,
            },
        }
    }
}

impl QuickReply {
    /// Payload, falling back to the title.
    pub fn payload(&self) -> &str {
        self.payload.as_deref().unwrap_or(&self.title)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
}

impl Button {
    fn callback(&self) -> &str {
        self.payload.as_deref().unwrap_or(&self.title)
    }

    fn as_option(&self) -> QuickReply {
        QuickReply {
            title: self.title.clone(),
            payload: Some(self.url.clone().unwrap_or_else(|| self.callback().to_string())),
        }
    }
}

/// Platform independent message description.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RichMessage {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub quick_replies: Vec<QuickReply>,
    #[serde(default)]
    pub buttons: Vec<Button>,
}

impl RichMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    /// Choices a text-only reply can pick from: buttons, else quick replies.
    pub fn options(&self) -> Vec<QuickReply> {
        if !self.buttons.is_empty() {
            self.buttons.iter().map(Button::as_option).collect()
        } else {
            self.quick_replies.clone()
        }
    }
}

/// Platform shaped message handed to the gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct AdaptedMessage {
    pub text: String,
    pub attachments: Option<Value>,
}

pub fn adapt(
    msg: &RichMessage,
    platform: &str,
) -> AdaptedMessage {
    let text = msg.text.clone().unwrap_or_default();
    match PlatformKind::of(platform) {
        PlatformKind::Rich => adapt_rich(msg, text),
        PlatformKind::Keyboard => adapt_keyboard(msg, text),
        PlatformKind::TextOnly => adapt_text(msg, text),
    }
}

fn adapt_rich(
    msg: &RichMessage,
    text: String,
) -> AdaptedMessage {
    let mut attachments = Map::new();
    if let Some(url) = &msg.image_url {
        attachments.insert("image".into(), json!({ "url": url }));
    }
    if !msg.buttons.is_empty() {
        attachments.insert("buttons".into(), json!(msg.buttons));
    }
    if !msg.quick_replies.is_empty() {
        let replies: Vec<Value> = msg.quick_replies.iter().map(|q| json!({ "title": q.title, "payload": q.payload() })).collect();
        attachments.insert("quickReplies".into(), Value::Array(replies));
    }

    AdaptedMessage {
        text,
        attachments: (!attachments.is_empty()).then_some(Value::Object(attachments)),
    }
}

fn adapt_keyboard(
    msg: &RichMessage,
    text: String,
) -> AdaptedMessage {
    let mut attachments = Map::new();
    if let Some(url) = &msg.image_url {
        attachments.insert("photo".into(), json!(url));
    }

    if !msg.buttons.is_empty() {
        let rows: Vec<Value> = msg
            .buttons
            .iter()
            .map(|b| match &b.url {
                Some(url) => json!([{ "text": b.title, "url": url }]),
                None => json!([{ "text": b.title, "callback_data": b.callback() }]),
            })
            .collect();
        attachments.insert("reply_markup".into(), json!({ "inline_keyboard": rows }));
    } else if !msg.quick_replies.is_empty() {
        let rows: Vec<Value> = msg.quick_replies.iter().map(|q| json!([{ "text": q.title }])).collect();
        attachments.insert(
            "reply_markup".into(),
            json!({ "keyboard": rows, "one_time_keyboard": true, "resize_keyboard": true }),
        );
    }

    AdaptedMessage {
        text,
        attachments: (!attachments.is_empty()).then_some(Value::Object(attachments)),
    }
}

fn adapt_text(
    msg: &RichMessage,
    mut text: String,
) -> AdaptedMessage {
    let mut lines = Vec::new();
    if let Some(url) = &msg.image_url {
        lines.push(url.clone());
    }
    for (i, option) in msg.options().iter().enumerate() {
        lines.push(format!("{}. {}", i + 1, option.title));
    }

    if !lines.is_empty() {
        if !text.is_empty() {
            text.push_str("\n\n");
        }
        text.push_str(&lines.join("\n"));
    }

    AdaptedMessage {
        text,
        attachments: None,
    }
}

/// Map a bare `"1"`, `"2"`.. reply onto the payload of that quick reply.
pub fn parse_numeric_reply(
    text: &str,
    quick_replies: &[QuickReply],
) -> Option<String> {
    let n = text.trim().parse::<usize>().ok()?;
    let reply = quick_replies.get(n.checked_sub(1)?)?;
    Some(reply.payload().to_string())
}
