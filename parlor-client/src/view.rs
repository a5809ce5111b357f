//! View-models handed to the rendering surface.

use chrono::NaiveDateTime;
use shared::{
    dates::list_time_label,
    models::{Conversation, ConversationId, ConversationKind, UserId},
};

/// One row of the conversation list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationView {
    pub id: ConversationId,
    pub kind: ConversationKind,
    pub title: String,
    pub preview: String,
    pub time_label: String,
    pub is_provisional: bool,
    pub is_admin: bool,
    pub has_left: bool,
    pub member_count: usize,
}

impl ConversationView {
    /// Builds the list row for `conversation` as seen by `current_user`.
    #[must_use]
    pub fn new(conversation: &Conversation, current_user: UserId, now: NaiveDateTime) -> Self {
        Self {
            id: conversation.id,
            kind: conversation.kind,
            title: conversation.title.clone(),
            preview: conversation.last_message_preview.clone().unwrap_or_default(),
            time_label: list_time_label(conversation.last_message_at, now),
            is_provisional: conversation.is_provisional(),
            is_admin: conversation.is_admin(current_user),
            has_left: conversation.current_user_has_left.unwrap_or(false),
            member_count: conversation.participant_ids.len(),
        }
    }
}
