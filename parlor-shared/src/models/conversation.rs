use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, str::FromStr};
use uuid::Uuid;

use super::{FormerMember, UserId, null_as_default};
use crate::dates::parse_optional_date;

/// Raw title the backend stores for every private conversation.
pub const PRIVATE_TITLE_SENTINEL: &str = "PRIVATE";

/// Title shown for a private conversation whose counterpart is not known yet.
pub const PRIVATE_TITLE_PLACEHOLDER: &str = "Private conversation";

/// Prefix of locally generated conversation ids.
pub const PROVISIONAL_ID_PREFIX: &str = "temp-";

/// Whether `title` means "not resolved yet" for a private conversation.
#[must_use]
pub fn is_unresolved_title(title: &str) -> bool {
    let title = title.trim();
    title.is_empty() || title == PRIVATE_TITLE_SENTINEL || title == PRIVATE_TITLE_PLACEHOLDER
}

/// Identifier of a conversation.
///
/// Persisted conversations carry the server id. Conversations that only exist
/// on this client carry a random id rendered as `temp-<uuid>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConversationId {
    /// Server-assigned id.
    Server(i64),
    /// Client-generated id of a conversation not persisted yet.
    Provisional(Uuid),
}

impl ConversationId {
    /// A fresh provisional id.
    #[must_use]
    pub fn new_provisional() -> Self {
        Self::Provisional(Uuid::new_v4())
    }

    /// Whether this id was generated locally.
    #[must_use]
    pub fn is_provisional(self) -> bool {
        matches!(self, Self::Provisional(_))
    }

    /// The server id, if persisted.
    #[must_use]
    pub fn server_id(self) -> Option<i64> {
        match self {
            Self::Server(id) => Some(id),
            Self::Provisional(_) => None,
        }
    }
}

impl From<i64> for ConversationId {
    fn from(id: i64) -> Self {
        Self::Server(id)
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Server(id) => write!(f, "{id}"),
            Self::Provisional(uuid) => write!(f, "{PROVISIONAL_ID_PREFIX}{uuid}"),
        }
    }
}

/// Error returned when a conversation id cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid conversation id '{0}'")]
pub struct ParseConversationIdError(pub String);

impl FromStr for ConversationId {
    type Err = ParseConversationIdError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        let invalid = || ParseConversationIdError(value.to_string());
        match value.strip_prefix(PROVISIONAL_ID_PREFIX) {
            Some(uuid) => Uuid::parse_str(uuid)
                .map(Self::Provisional)
                .map_err(|_| invalid()),
            None => value.parse().map(Self::Server).map_err(|_| invalid()),
        }
    }
}

impl Serialize for ConversationId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Server(id) => serializer.serialize_i64(*id),
            Self::Provisional(_) => serializer.collect_str(self),
        }
    }
}

impl<'de> Deserialize<'de> for ConversationId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(i64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(id) => Ok(Self::Server(id)),
            Raw::Text(text) => text.parse().map_err(serde::de::Error::custom),
        }
    }
}

/// Kind of conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ConversationKind {
    /// Two-party conversation.
    Private,
    /// Titled conversation with administrators.
    Group,
}

impl ConversationKind {
    /// Type code used on the wire.
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::Private => "PRIVATE",
            Self::Group => "GROUP",
        }
    }

    /// Maps a wire type code. Anything other than `GROUP` is private.
    #[must_use]
    pub fn from_code(code: Option<&str>) -> Self {
        match code.map(str::trim) {
            Some(code) if code.eq_ignore_ascii_case("GROUP") => Self::Group,
            _ => Self::Private,
        }
    }
}

impl fmt::Display for ConversationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Private => "private",
            Self::Group => "group",
        })
    }
}

/// Last message embedded in a conversation summary.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LastMessageSummary {
    /// Text of the message.
    #[serde(default)]
    pub content: Option<String>,
    /// Raw creation timestamp.
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Conversation summary as returned by the conversation listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    /// Server id.
    pub id: i64,
    /// Raw title; `PRIVATE` for private conversations.
    #[serde(rename = "titre", default, deserialize_with = "null_as_default")]
    pub title: String,
    /// `PRIVATE` or `GROUP`.
    #[serde(default)]
    pub type_conversation_code: Option<String>,
    /// Active participants, when the endpoint includes them.
    #[serde(default)]
    pub participant_ids: Option<Vec<UserId>>,
    /// Latest message, when any.
    #[serde(default)]
    pub last_message: Option<LastMessageSummary>,
    /// Raw creation timestamp.
    #[serde(default)]
    pub created_at: Option<String>,
    /// Creator id.
    #[serde(default)]
    pub created_by: Option<UserId>,
    /// Whether the requesting user has left.
    #[serde(default)]
    pub has_left: Option<bool>,
}

/// A conversation as held by the client cache.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Conversation {
    /// Server id, or a provisional id before the first send.
    pub id: ConversationId,

    /// Private or group.
    pub kind: ConversationKind,

    /// Display title. For private conversations this is derived from the
    /// counterpart and may be unresolved, see [`is_unresolved_title`].
    pub title: String,

    /// Active participants.
    pub participant_ids: Vec<UserId>,

    /// Active administrators (groups only).
    pub admin_ids: Vec<UserId>,

    /// Members who have left.
    pub former_members: Vec<FormerMember>,

    /// Text of the latest visible message.
    pub last_message_preview: Option<String>,

    /// Time of the latest visible message.
    pub last_message_at: Option<NaiveDateTime>,

    /// Creation time.
    pub created_at: Option<NaiveDateTime>,

    /// Creator id.
    pub created_by: Option<UserId>,

    /// Whether the current user left this group.
    pub current_user_has_left: Option<bool>,

    /// Intended recipient of a provisional private conversation.
    pub provisional_recipient: Option<UserId>,
}

impl Conversation {
    /// Maps a summary from the listing endpoint.
    ///
    /// Private titles equal to the sentinel become the placeholder.
    #[must_use]
    pub fn from_summary(summary: &ConversationSummary) -> Self {
        let kind = ConversationKind::from_code(summary.type_conversation_code.as_deref());
        let title = if kind == ConversationKind::Private && is_unresolved_title(&summary.title) {
            PRIVATE_TITLE_PLACEHOLDER.to_string()
        } else {
            summary.title.clone()
        };

        let (last_message_preview, last_message_at) = summary
            .last_message
            .as_ref()
            .map(|last| {
                (
                    last.content.clone(),
                    parse_optional_date(last.created_at.as_deref()),
                )
            })
            .unwrap_or_default();

        Self {
            id: ConversationId::Server(summary.id),
            kind,
            title,
            participant_ids: summary.participant_ids.clone().unwrap_or_default(),
            admin_ids: Vec::new(),
            former_members: Vec::new(),
            last_message_preview,
            last_message_at,
            created_at: parse_optional_date(summary.created_at.as_deref()),
            created_by: summary.created_by,
            current_user_has_left: summary.has_left,
            provisional_recipient: None,
        }
    }

    /// Creates a provisional private conversation with `recipient`.
    #[must_use]
    pub fn provisional_private(
        current_user: UserId,
        recipient: UserId,
        title: String,
        now: NaiveDateTime,
    ) -> Self {
        Self {
            id: ConversationId::new_provisional(),
            kind: ConversationKind::Private,
            title,
            participant_ids: vec![current_user, recipient],
            admin_ids: Vec::new(),
            former_members: Vec::new(),
            last_message_preview: None,
            last_message_at: Some(now),
            created_at: Some(now),
            created_by: Some(current_user),
            current_user_has_left: None,
            provisional_recipient: Some(recipient),
        }
    }

    /// Whether the conversation only exists on this client.
    #[must_use]
    pub fn is_provisional(&self) -> bool {
        self.id.is_provisional()
    }

    /// Whether this is a group conversation.
    #[must_use]
    pub fn is_group(&self) -> bool {
        self.kind == ConversationKind::Group
    }

    /// Whether the display title still needs resolving.
    #[must_use]
    pub fn has_unresolved_title(&self) -> bool {
        self.kind == ConversationKind::Private && is_unresolved_title(&self.title)
    }

    /// Whether `user` is an active administrator.
    #[must_use]
    pub fn is_admin(&self, user: UserId) -> bool {
        self.admin_ids.contains(&user)
    }

    /// The other participants, relative to `current_user`.
    #[must_use]
    pub fn counterparts(&self, current_user: UserId) -> Vec<UserId> {
        self.participant_ids
            .iter()
            .copied()
            .filter(|id| *id != current_user)
            .collect()
    }

    /// The single other participant of a private conversation.
    ///
    /// `None` when the participants are unknown or there is more than one
    /// counterpart.
    #[must_use]
    pub fn counterpart(&self, current_user: UserId) -> Option<UserId> {
        match self.counterparts(current_user).as_slice() {
            [single] => Some(*single),
            _ => None,
        }
    }
}
