use serde::{Deserialize, Deserializer};

pub mod conversation;
pub mod envelope;
pub mod membership;
pub mod message;
pub mod payloads;
pub mod user;

pub use conversation::{
    Conversation, ConversationId, ConversationKind, ConversationSummary, LastMessageSummary,
    PRIVATE_TITLE_PLACEHOLDER, PRIVATE_TITLE_SENTINEL, ParseConversationIdError,
    is_unresolved_title,
};
pub use envelope::{ApiRequest, ApiResponse, ApiStatus};
pub use membership::{FormerMember, MemberRecord, MembershipEntry};
pub use message::{ConversationRef, Message, MessageKind, MessageRecord};
pub use payloads::{
    ConversationCriteria, ConversationKey, ConversationScope, CreateGroupPayload,
    DeleteMessagePayload, EmptyCriteria, LoginPayload, MemberPayload, RegisterPayload,
    SendGroupPayload, SendPrivatePayload, SendReceipt, UploadReceipt,
};
pub use user::{User, UserFragment};

/// Server-assigned user identifier.
pub type UserId = i64;

/// Deserialize `null` as the type's default value.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}
