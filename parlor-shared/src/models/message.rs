use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use super::{ConversationId, UserFragment, UserId};
use crate::dates::parse_optional_date;

/// Kind of message content.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Text only.
    #[default]
    Text,
    /// Image only.
    Image,
    /// Text with an image.
    Mixed,
}

impl MessageKind {
    /// Type code used on the wire.
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::Image => "IMAGE",
            Self::Mixed => "MIXED",
        }
    }

    /// Maps a wire type code; unknown or missing codes are text.
    #[must_use]
    pub fn from_code(code: Option<&str>) -> Self {
        code.and_then(|code| code.parse().ok()).unwrap_or_default()
    }

    /// Kind of an outgoing message carrying `content` and/or an image.
    #[must_use]
    pub fn for_payload(content: Option<&str>, has_image: bool) -> Self {
        let has_text = content.is_some_and(|text| !text.trim().is_empty());
        match (has_text, has_image) {
            (true, true) => Self::Mixed,
            (false, true) => Self::Image,
            _ => Self::Text,
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for MessageKind {
    type Err = &'static str;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "TEXT" => Ok(Self::Text),
            "IMAGE" => Ok(Self::Image),
            "MIXED" => Ok(Self::Mixed),
            _ => Err("unknown message type"),
        }
    }
}

/// Reference to the owning conversation nested in a message record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationRef {
    /// Server id of the conversation.
    pub id: i64,
}

/// Message as returned by the message listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    /// Server id.
    #[serde(default)]
    pub id: Option<i64>,
    /// Owning conversation id, flat form.
    #[serde(default)]
    pub conversation_id: Option<i64>,
    /// Owning conversation id, nested form.
    #[serde(default)]
    pub conversation: Option<ConversationRef>,
    /// Author id.
    #[serde(default)]
    pub created_by: Option<UserId>,
    /// Text content.
    #[serde(default)]
    pub content: Option<String>,
    /// Image URL.
    #[serde(default)]
    pub img_url: Option<String>,
    /// `TEXT`, `IMAGE` or `MIXED`.
    #[serde(default)]
    pub type_message_code: Option<String>,
    /// Raw creation timestamp.
    #[serde(default)]
    pub created_at: Option<String>,
    /// Author details.
    #[serde(default)]
    pub info_creator: Option<UserFragment>,
    /// Soft-deletion flag.
    #[serde(default, alias = "isDeleted")]
    pub hidden: Option<bool>,
}

impl MessageRecord {
    /// Owning conversation id from whichever form the record carries.
    #[must_use]
    pub fn owning_conversation(&self) -> Option<i64> {
        self.conversation_id
            .or_else(|| self.conversation.map(|conversation| conversation.id))
    }

    /// Maps the record into a cached message.
    ///
    /// `fallback` is used when the record does not name its conversation.
    #[must_use]
    pub fn to_message(&self, fallback: ConversationId) -> Message {
        Message {
            id: self.id,
            conversation_id: self
                .owning_conversation()
                .map_or(fallback, ConversationId::Server),
            sender_id: self.created_by,
            content: self
                .content
                .clone()
                .filter(|content| !content.is_empty()),
            image_url: self.img_url.clone().filter(|url| !url.trim().is_empty()),
            kind: MessageKind::from_code(self.type_message_code.as_deref()),
            created_at: parse_optional_date(self.created_at.as_deref()),
            hidden: self.hidden.unwrap_or(false),
        }
    }
}

/// A message as held by the client cache.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    /// Server id; `None` for a message only recorded locally.
    pub id: Option<i64>,
    /// Owning conversation.
    pub conversation_id: ConversationId,
    /// Author id.
    pub sender_id: Option<UserId>,
    /// Text content.
    pub content: Option<String>,
    /// Image URL.
    pub image_url: Option<String>,
    /// Content kind.
    pub kind: MessageKind,
    /// Creation time, when known.
    pub created_at: Option<NaiveDateTime>,
    /// Soft-deleted messages are never rendered.
    pub hidden: bool,
}

impl Message {
    /// A message recorded locally before the server acknowledged it.
    #[must_use]
    pub fn pending(
        conversation_id: ConversationId,
        sender_id: UserId,
        content: Option<String>,
        image_url: Option<String>,
        created_at: NaiveDateTime,
    ) -> Self {
        let kind = MessageKind::for_payload(content.as_deref(), image_url.is_some());
        Self {
            id: None,
            conversation_id,
            sender_id: Some(sender_id),
            content,
            image_url,
            kind,
            created_at: Some(created_at),
            hidden: false,
        }
    }

    /// Whether the server has not acknowledged this message yet.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.id.is_none()
    }

    /// Text used as a conversation preview.
    #[must_use]
    pub fn preview(&self) -> String {
        match (&self.content, &self.image_url) {
            (Some(content), _) if !content.trim().is_empty() => content.clone(),
            (_, Some(_)) => "Image".to_string(),
            _ => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_kind_codes() {
        assert_eq!(MessageKind::from_code(Some("IMAGE")), MessageKind::Image);
        assert_eq!(MessageKind::from_code(Some("mixed")), MessageKind::Mixed);
        assert_eq!(MessageKind::from_code(Some("VIDEO")), MessageKind::Text);
        assert_eq!(MessageKind::from_code(None), MessageKind::Text);
        assert_eq!(MessageKind::Mixed.to_string(), "MIXED");
    }

    #[test]
    fn test_kind_for_payload() {
        assert_eq!(MessageKind::for_payload(Some("hi"), false), MessageKind::Text);
        assert_eq!(MessageKind::for_payload(Some("hi"), true), MessageKind::Mixed);
        assert_eq!(MessageKind::for_payload(None, true), MessageKind::Image);
        assert_eq!(MessageKind::for_payload(Some("  "), true), MessageKind::Image);
    }

    #[test]
    fn test_record_with_nested_conversation_and_deleted_alias() {
        let record: MessageRecord = serde_json::from_str(
            r#"{
                "id": 31,
                "conversation": {"id": 4},
                "createdBy": 2,
                "content": "bonjour",
                "typeMessageCode": "TEXT",
                "createdAt": "2026-01-13 22:07:50.0",
                "infoCreator": {"nom": "Smith", "prenoms": "Alice", "login": "asmith"},
                "isDeleted": true
            }"#,
        )
        .unwrap();

        assert_eq!(record.owning_conversation(), Some(4));
        let message = record.to_message(ConversationId::Server(99));
        assert_eq!(message.conversation_id, ConversationId::Server(4));
        assert_eq!(message.sender_id, Some(2));
        assert!(message.hidden);
        assert_eq!(
            message.created_at,
            NaiveDate::from_ymd_opt(2026, 1, 13)
                .unwrap()
                .and_hms_opt(22, 7, 50)
        );
        assert_eq!(
            record.info_creator.and_then(|info| info.first_names),
            Some("Alice".to_string())
        );
    }

    #[test]
    fn test_record_falls_back_to_requested_conversation() {
        let record: MessageRecord =
            serde_json::from_str(r#"{"id": 1, "content": "", "imgUrl": "http://img/x.png", "typeMessageCode": "IMAGE", "hidden": false}"#)
                .unwrap();

        let message = record.to_message(ConversationId::Server(8));
        assert_eq!(message.conversation_id, ConversationId::Server(8));
        assert_eq!(message.content, None);
        assert_eq!(message.kind, MessageKind::Image);
        assert_eq!(message.created_at, None);
        assert!(!message.hidden);
        assert_eq!(message.preview(), "Image");
    }

    #[test]
    fn test_pending_message() {
        let now = NaiveDate::from_ymd_opt(2026, 10, 19)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let message = Message::pending(
            ConversationId::new_provisional(),
            5,
            Some("hi".into()),
            None,
            now,
        );
        assert!(message.is_pending());
        assert_eq!(message.kind, MessageKind::Text);
        assert_eq!(message.preview(), "hi");
    }
}
