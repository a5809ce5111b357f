//! Lifecycle of provisional private conversations: creation, promotion to a
//! server id on the first successful send, and discard when abandoned.

use chrono::NaiveDateTime;
use shared::models::{Conversation, ConversationId, ConversationKind, PRIVATE_TITLE_PLACEHOLDER, UserId};
use tracing::{debug, info};

use crate::cache::{CacheState, ChatEvent};

/// Result of starting a private conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrivateStart {
    /// A conversation with the recipient already exists.
    Existing(ConversationId),
    /// A provisional conversation was created.
    Created(ConversationId),
}

impl PrivateStart {
    /// The conversation to select.
    #[must_use]
    pub fn id(self) -> ConversationId {
        match self {
            Self::Existing(id) | Self::Created(id) => id,
        }
    }
}

/// Finds a cached private conversation between `current_user` and `other`.
#[must_use]
pub fn find_private_with(state: &CacheState, current_user: UserId, other: UserId) -> Option<ConversationId> {
    state
        .conversations
        .iter()
        .find(|conversation| {
            conversation.kind == ConversationKind::Private
                && (conversation.provisional_recipient == Some(other)
                    || (conversation.participant_ids.contains(&current_user)
                        && conversation.participant_ids.contains(&other)))
        })
        .map(|conversation| conversation.id)
}

/// Reuses the private conversation with `recipient`, or creates a
/// provisional one at the top of the list with an empty message list.
pub fn start_private(
    state: &mut CacheState,
    current_user: UserId,
    recipient: UserId,
    now: NaiveDateTime,
) -> (PrivateStart, Vec<ChatEvent>) {
    if let Some(existing) = find_private_with(state, current_user, recipient) {
        return (PrivateStart::Existing(existing), Vec::new());
    }

    let title = state
        .users
        .display_name(recipient)
        .unwrap_or_else(|| PRIVATE_TITLE_PLACEHOLDER.to_string());
    let conversation = Conversation::provisional_private(current_user, recipient, title, now);
    let id = conversation.id;
    state.titles.remember(id, &conversation.title);
    state.messages.insert(id, Vec::new());
    state.conversations.insert(0, conversation);

    debug!(conversation = %id, recipient, "provisional conversation created");
    (PrivateStart::Created(id), vec![ChatEvent::ConversationsReplaced])
}

/// Replaces a provisional id with the server id everywhere it is used.
///
/// A no-op when `from` is already persisted or not cached. When the server
/// id is already cached (a refresh got there first), the provisional entry
/// is dropped and its local messages are folded into the persisted one.
pub fn promote(state: &mut CacheState, from: ConversationId, server_id: i64) -> Vec<ChatEvent> {
    let to = ConversationId::Server(server_id);
    if !from.is_provisional() || state.conversation(from).is_none() {
        return Vec::new();
    }

    let mut messages = state.messages.remove(&from).unwrap_or_default();
    for message in &mut messages {
        message.conversation_id = to;
    }

    if state.conversation(to).is_some() {
        state.conversations.retain(|conversation| conversation.id != from);
        state.titles.forget(from);
        state.messages.entry(to).or_default().extend(messages);
        info!(from = %from, to = %to, "provisional conversation merged into existing one");
        return vec![
            ChatEvent::ConversationRemoved(from),
            ChatEvent::ConversationPromoted { from, to },
        ];
    }

    if let Some(conversation) = state.conversation_mut(from) {
        conversation.id = to;
        conversation.provisional_recipient = None;
    }
    state.messages.insert(to, messages);
    state.titles.rekey(from, to);

    info!(from = %from, to = %to, "provisional conversation promoted");
    vec![ChatEvent::ConversationPromoted { from, to }]
}

/// Drops a provisional conversation that holds no message.
///
/// Returns the removal event, or nothing when the conversation is persisted,
/// absent or not empty.
pub fn discard_if_empty(state: &mut CacheState, id: ConversationId) -> Vec<ChatEvent> {
    if !id.is_provisional() || state.message_count(id) > 0 {
        return Vec::new();
    }
    if state.remove_conversation(id) {
        debug!(conversation = %id, "empty provisional conversation discarded");
        vec![ChatEvent::ConversationRemoved(id)]
    } else {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::reconcile_conversations;
    use chrono::NaiveDate;
    use shared::models::{ConversationSummary, Message, User};

    const ME: UserId = 5;
    const BOB: UserId = 9;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 19)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn with_bob() -> CacheState {
        let mut state = CacheState::default();
        state.users.merge_user(&User {
            id: BOB,
            login: "bmartin".into(),
            last_name: "Martin".into(),
            first_names: "Bob".into(),
        });
        state
    }

    fn private_summary(id: i64, participants: Vec<UserId>) -> ConversationSummary {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "titre": "PRIVATE",
            "typeConversationCode": "PRIVATE",
            "participantIds": participants,
        }))
        .unwrap()
    }

    fn record_pending(state: &mut CacheState, id: ConversationId, text: &str) {
        state
            .messages
            .entry(id)
            .or_default()
            .push(Message::pending(id, ME, Some(text.into()), None, now()));
    }

    #[test]
    fn test_start_private_creates_provisional_first() {
        let mut state = with_bob();
        reconcile_conversations(&mut state, &[private_summary(1, vec![ME, 2])], ME);

        let (start, events) = start_private(&mut state, ME, BOB, now());

        let PrivateStart::Created(id) = start else {
            panic!("expected a new conversation, got {start:?}");
        };
        assert!(id.is_provisional());
        assert_eq!(state.conversations[0].id, id);
        assert_eq!(state.conversations[0].title, "Bob Martin");
        assert_eq!(state.conversations[0].provisional_recipient, Some(BOB));
        assert_eq!(state.messages.get(&id), Some(&Vec::new()));
        assert_eq!(events, vec![ChatEvent::ConversationsReplaced]);
    }

    #[test]
    fn test_start_private_reuses_existing() {
        let mut state = with_bob();
        reconcile_conversations(&mut state, &[private_summary(4, vec![ME, BOB])], ME);

        let (start, events) = start_private(&mut state, ME, BOB, now());

        assert_eq!(start, PrivateStart::Existing(ConversationId::Server(4)));
        assert!(events.is_empty());
        assert_eq!(state.conversations.len(), 1);

        let (first, _) = start_private(&mut state, ME, 77, now());
        let (second, _) = start_private(&mut state, ME, 77, now());
        assert_eq!(second, PrivateStart::Existing(first.id()));
    }

    #[test]
    fn test_promotion_rekeys_everything() {
        let mut state = with_bob();
        let (start, _) = start_private(&mut state, ME, BOB, now());
        let temp = start.id();
        record_pending(&mut state, temp, "hello");

        let events = promote(&mut state, temp, 42);

        let persisted = ConversationId::Server(42);
        assert_eq!(
            events,
            vec![ChatEvent::ConversationPromoted {
                from: temp,
                to: persisted
            }]
        );
        assert!(state.conversation(temp).is_none());
        let conversation = state.conversation(persisted).unwrap();
        assert!(!conversation.is_provisional());
        assert_eq!(conversation.provisional_recipient, None);
        assert!(!state.messages.contains_key(&temp));
        assert!(
            state.messages[&persisted]
                .iter()
                .all(|message| message.conversation_id == persisted)
        );
        assert_eq!(state.titles.get(persisted), Some("Bob Martin"));
        assert_eq!(state.titles.get(temp), None);
    }

    #[test]
    fn test_promotion_is_idempotent() {
        let mut state = with_bob();
        let temp = start_private(&mut state, ME, BOB, now()).0.id();
        record_pending(&mut state, temp, "hello");
        promote(&mut state, temp, 42);
        let snapshot = state.conversations.clone();

        assert!(promote(&mut state, temp, 42).is_empty());
        assert!(promote(&mut state, ConversationId::Server(42), 43).is_empty());
        assert_eq!(state.conversations, snapshot);
    }

    #[test]
    fn test_promotion_onto_cached_server_id_merges() {
        let mut state = with_bob();
        let temp = start_private(&mut state, ME, BOB, now()).0.id();
        record_pending(&mut state, temp, "hello");
        reconcile_conversations(&mut state, &[private_summary(42, vec![ME, BOB])], ME);
        assert_eq!(state.conversations.len(), 2);

        let events = promote(&mut state, temp, 42);

        assert_eq!(state.conversations.len(), 1);
        assert_eq!(state.message_count(ConversationId::Server(42)), 1);
        assert!(events.contains(&ChatEvent::ConversationRemoved(temp)));
    }

    #[test]
    fn test_discard_only_empty_provisional() {
        let mut state = with_bob();
        reconcile_conversations(&mut state, &[private_summary(1, vec![ME, 2])], ME);
        let empty = start_private(&mut state, ME, BOB, now()).0.id();
        let busy = start_private(&mut state, ME, 77, now()).0.id();
        record_pending(&mut state, busy, "hi");

        assert_eq!(discard_if_empty(&mut state, empty), vec![ChatEvent::ConversationRemoved(empty)]);
        assert!(discard_if_empty(&mut state, busy).is_empty());
        assert!(discard_if_empty(&mut state, ConversationId::Server(1)).is_empty());
        assert!(state.conversation(empty).is_none());
        assert!(state.conversation(busy).is_some());
        assert!(state.conversation(ConversationId::Server(1)).is_some());
    }

    #[test]
    fn test_reconcile_drops_abandoned_provisional() {
        let mut state = with_bob();
        let temp = start_private(&mut state, ME, BOB, now()).0.id();

        let events = reconcile_conversations(&mut state, &[private_summary(1, vec![ME, 2])], ME);

        assert!(state.conversation(temp).is_none());
        assert!(events.contains(&ChatEvent::ConversationRemoved(temp)));
    }
}
