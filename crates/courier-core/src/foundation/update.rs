//! Update model for the Courier toolkit.
//!
//! An [`Update`] is one inbound event from the chat platform. Its
//! [`UpdateKind`] is the Telegram update name (`message`, `poll_answer`, ...)
//! and is what update-filtered listeners match against.
//!
//! ```rust,ignore
//! use courier_core::{Update, UpdateKind};
//!
//! let update = Update::message(1, 42, 7, 100, "ping");
//! assert!(update.is(&[UpdateKind::Message]));
//! assert_eq!(update.text(), Some("ping"));
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

// ============================================================================
// Update Kind Classification
// ============================================================================

/// The Telegram update name of an [`Update`].
///
/// Names the enum does not know are kept verbatim in [`UpdateKind::Other`],
/// so filters on newer update types still work.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UpdateKind {
    Message,
    EditedMessage,
    ChannelPost,
    EditedChannelPost,
    InlineQuery,
    ChosenInlineResult,
    CallbackQuery,
    ShippingQuery,
    PreCheckoutQuery,
    Poll,
    PollAnswer,
    MyChatMember,
    ChatMember,
    ChatJoinRequest,
    /// Any other update name.
    Other(String),
}

impl UpdateKind {
    /// Returns the snake_case wire name of this kind.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Message => "message",
            Self::EditedMessage => "edited_message",
            Self::ChannelPost => "channel_post",
            Self::EditedChannelPost => "edited_channel_post",
            Self::InlineQuery => "inline_query",
            Self::ChosenInlineResult => "chosen_inline_result",
            Self::CallbackQuery => "callback_query",
            Self::ShippingQuery => "shipping_query",
            Self::PreCheckoutQuery => "pre_checkout_query",
            Self::Poll => "poll",
            Self::PollAnswer => "poll_answer",
            Self::MyChatMember => "my_chat_member",
            Self::ChatMember => "chat_member",
            Self::ChatJoinRequest => "chat_join_request",
            Self::Other(name) => name,
        }
    }
}

impl FromStr for UpdateKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "message" => Self::Message,
            "edited_message" => Self::EditedMessage,
            "channel_post" => Self::ChannelPost,
            "edited_channel_post" => Self::EditedChannelPost,
            "inline_query" => Self::InlineQuery,
            "chosen_inline_result" => Self::ChosenInlineResult,
            "callback_query" => Self::CallbackQuery,
            "shipping_query" => Self::ShippingQuery,
            "pre_checkout_query" => Self::PreCheckoutQuery,
            "poll" => Self::Poll,
            "poll_answer" => Self::PollAnswer,
            "my_chat_member" => Self::MyChatMember,
            "chat_member" => Self::ChatMember,
            "chat_join_request" => Self::ChatJoinRequest,
            other => Self::Other(other.to_string()),
        })
    }
}

impl From<&str> for UpdateKind {
    fn from(s: &str) -> Self {
        match s.parse() {
            Ok(kind) => kind,
            Err(never) => match never {},
        }
    }
}

impl fmt::Display for UpdateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for UpdateKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for UpdateKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Self::from(name.as_str()))
    }
}

// ============================================================================
// Update
// ============================================================================

/// One inbound event from the chat platform.
///
/// Only the fields the toolkit itself needs are lifted out of the payload;
/// the full object stays available through [`raw`](Self::raw).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub kind: UpdateKind,
    #[serde(default)]
    pub chat_id: Option<i64>,
    #[serde(default)]
    pub sender_id: Option<i64>,
    #[serde(default)]
    pub message_id: Option<i64>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub raw: Value,
}

impl Update {
    /// Creates a bare update of the given kind.
    pub fn new(update_id: i64, kind: impl Into<UpdateKind>) -> Self {
        Self {
            update_id,
            kind: kind.into(),
            chat_id: None,
            sender_id: None,
            message_id: None,
            text: None,
            raw: Value::Null,
        }
    }

    /// Creates a plain text message update.
    pub fn message(
        update_id: i64,
        chat_id: i64,
        sender_id: i64,
        message_id: i64,
        text: impl Into<String>,
    ) -> Self {
        Self {
            chat_id: Some(chat_id),
            sender_id: Some(sender_id),
            message_id: Some(message_id),
            text: Some(text.into()),
            ..Self::new(update_id, UpdateKind::Message)
        }
    }

    /// Sets the chat this update belongs to.
    pub fn with_chat(mut self, chat_id: i64) -> Self {
        self.chat_id = Some(chat_id);
        self
    }

    /// Sets the user who caused this update.
    pub fn with_sender(mut self, sender_id: i64) -> Self {
        self.sender_id = Some(sender_id);
        self
    }

    /// Attaches the raw platform payload.
    pub fn with_raw(mut self, raw: Value) -> Self {
        self.raw = raw;
        self
    }

    /// Returns `true` if this update's kind is any of `kinds`.
    pub fn is(&self, kinds: &[UpdateKind]) -> bool {
        kinds.contains(&self.kind)
    }

    /// Returns `true` for plain `message` updates.
    pub fn is_message(&self) -> bool {
        self.kind == UpdateKind::Message
    }

    /// Returns the message text, if any.
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// Returns the raw payload.
    pub fn raw(&self) -> &Value {
        &self.raw
    }
}
