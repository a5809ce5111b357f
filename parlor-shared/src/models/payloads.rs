//! Request payloads carried in the `data`/`datas` slot of an
//! [`ApiRequest`](super::ApiRequest), and the small receipts some commands
//! return.

use serde::{Deserialize, Serialize};

use super::{MessageKind, UserId};

/// Criteria selecting the conversations of a user.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConversationCriteria {
    /// Owning user.
    pub user_id: UserId,
}

/// Criteria selecting the messages or members of a conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConversationScope {
    /// Conversation id.
    pub conversation_id: i64,
}

/// Empty criteria object, used by the user directory listing.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmptyCriteria {}

/// Reference to a conversation by id.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationKey {
    /// Conversation id.
    pub id: i64,
}

/// New group command.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroupPayload {
    /// Group title.
    #[serde(rename = "titre")]
    pub title: String,
    /// Invited members.
    pub participant_ids: Vec<UserId>,
}

/// Private message command. The backend creates the conversation on first send.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SendPrivatePayload {
    /// Recipient id.
    pub receiver_id: UserId,
    /// `TEXT`, `IMAGE` or `MIXED`.
    pub type_message_code: String,
    /// Text content.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Uploaded image URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub img_url: Option<String>,
}

impl SendPrivatePayload {
    /// Builds the payload, deriving the message kind.
    #[must_use]
    pub fn new(receiver_id: UserId, content: Option<String>, img_url: Option<String>) -> Self {
        let kind = MessageKind::for_payload(content.as_deref(), img_url.is_some());
        Self {
            receiver_id,
            type_message_code: kind.code().to_string(),
            content,
            img_url,
        }
    }
}

/// Group message command.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SendGroupPayload {
    /// Target group.
    pub conversation_id: i64,
    /// `TEXT`, `IMAGE` or `MIXED`.
    pub type_message_code: String,
    /// Text content.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Uploaded image URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub img_url: Option<String>,
}

impl SendGroupPayload {
    /// Builds the payload, deriving the message kind.
    #[must_use]
    pub fn new(conversation_id: i64, content: Option<String>, img_url: Option<String>) -> Self {
        let kind = MessageKind::for_payload(content.as_deref(), img_url.is_some());
        Self {
            conversation_id,
            type_message_code: kind.code().to_string(),
            content,
            img_url,
        }
    }
}

/// Message deletion command.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeleteMessagePayload {
    /// Message id.
    pub message_id: i64,
}

/// Membership command targeting one user of a group.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MemberPayload {
    /// Group id.
    pub conversation_id: i64,
    /// Target user.
    pub user_id: UserId,
}

/// Login command.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoginPayload {
    /// Login name.
    pub login: String,
}

/// Registration command.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegisterPayload {
    /// Family name.
    #[serde(rename = "nom")]
    pub last_name: String,
    /// Given names.
    #[serde(rename = "prenoms")]
    pub first_names: String,
    /// Login name.
    pub login: String,
}

/// Item returned by the send endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SendReceipt {
    /// Conversation the message landed in; assigned on first private send.
    #[serde(default)]
    pub conversation_id: Option<i64>,
    /// Server id of the stored message.
    #[serde(default)]
    pub id: Option<i64>,
}

/// Item returned by the image upload endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadReceipt {
    /// Public URL of the stored image.
    #[serde(default)]
    pub url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ApiRequest;
    use serde_json::json;

    #[test]
    fn test_private_send_omits_absent_fields() {
        let payload = SendPrivatePayload::new(9, Some("hi".into()), None);
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({"receiverId": 9, "typeMessageCode": "TEXT", "content": "hi"})
        );
    }

    #[test]
    fn test_group_send_with_image_is_mixed() {
        let payload = SendGroupPayload::new(4, Some("look".into()), Some("http://img/a.png".into()));
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({
                "conversationId": 4,
                "typeMessageCode": "MIXED",
                "content": "look",
                "imgUrl": "http://img/a.png"
            })
        );
    }

    #[test]
    fn test_create_group_envelope() {
        let request = ApiRequest::new(Some(5)).with_datas(vec![CreateGroupPayload {
            title: "Team".into(),
            participant_ids: vec![2, 3],
        }]);
        let encoded = serde_json::to_value(&request).unwrap();
        assert_eq!(encoded["datas"], json!([{"titre": "Team", "participantIds": [2, 3]}]));
    }

    #[test]
    fn test_register_wire_names() {
        let payload = RegisterPayload {
            last_name: "Wilson".into(),
            first_names: "Emma".into(),
            login: "ewilson".into(),
        };
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({"nom": "Wilson", "prenoms": "Emma", "login": "ewilson"})
        );
    }

    #[test]
    fn test_empty_criteria_is_an_empty_object() {
        assert_eq!(serde_json::to_value(EmptyCriteria {}).unwrap(), json!({}));
    }

    #[test]
    fn test_receipts_tolerate_missing_fields() {
        let receipt: SendReceipt = serde_json::from_str(r#"{"conversationId": 42}"#).unwrap();
        assert_eq!(receipt.conversation_id, Some(42));
        let upload: UploadReceipt = serde_json::from_str("{}").unwrap();
        assert_eq!(upload.url, None);
    }
}
