//! Merging of freshly fetched conversation summaries into the cache.
//!
//! These functions are synchronous and operate on an already locked
//! [`CacheState`]; network access lives in the session shell.

use shared::models::{
    Conversation, ConversationId, ConversationKind, ConversationSummary, Message,
    PRIVATE_TITLE_PLACEHOLDER, UserId, is_unresolved_title,
};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

use crate::{
    cache::{CacheState, ChatEvent},
    directory::UserDirectory,
};

/// Resolved private-conversation titles, keyed by conversation id.
///
/// Only resolved titles are stored; placeholders are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TitleCache {
    titles: HashMap<ConversationId, String>,
}

impl TitleCache {
    /// The resolved title of `id`, if any.
    #[must_use]
    pub fn get(&self, id: ConversationId) -> Option<&str> {
        self.titles.get(&id).map(String::as_str)
    }

    /// Stores a resolved title. Unresolved titles are ignored.
    pub fn remember(&mut self, id: ConversationId, title: &str) -> bool {
        if is_unresolved_title(title) {
            return false;
        }
        self.titles.insert(id, title.to_string());
        true
    }

    /// Drops the title of `id`.
    pub fn forget(&mut self, id: ConversationId) {
        self.titles.remove(&id);
    }

    /// Moves the title of `from` to `to`.
    pub fn rekey(&mut self, from: ConversationId, to: ConversationId) {
        if let Some(title) = self.titles.remove(&from) {
            self.titles.entry(to).or_insert(title);
        }
    }
}

/// Rebuilds the conversation list from a fresh fetch.
///
/// Carries over what the fetch does not know (resolved titles, membership,
/// creation data), applies the list filter, keeps provisional conversations
/// that already hold a message, drops the empty ones, and sorts by recency.
/// Returns the events to broadcast.
pub fn reconcile_conversations(
    state: &mut CacheState,
    summaries: &[ConversationSummary],
    current_user: UserId,
) -> Vec<ChatEvent> {
    let previous = std::mem::take(&mut state.conversations);
    let mut seen = HashSet::with_capacity(summaries.len());
    let mut fresh = Vec::with_capacity(summaries.len());

    for summary in summaries {
        let mut conversation = Conversation::from_summary(summary);
        if !seen.insert(conversation.id) {
            debug!(conversation = %conversation.id, "duplicate conversation in fetch ignored");
            continue;
        }

        let existing = previous.iter().find(|entry| entry.id == conversation.id);
        merge_with_existing(&mut conversation, existing, &mut state.titles);
        resolve_private_title(&mut conversation, &state.users, &mut state.titles, current_user);

        if state.filter.admits(conversation.kind) {
            fresh.push(conversation);
        }
    }

    let mut events = Vec::new();
    for provisional in previous.into_iter().filter(Conversation::is_provisional) {
        if seen.contains(&provisional.id) {
            continue;
        }
        if state.message_count(provisional.id) > 0 {
            fresh.push(provisional);
        } else {
            debug!(conversation = %provisional.id, "dropping empty provisional conversation");
            state.messages.remove(&provisional.id);
            state.titles.forget(provisional.id);
            events.push(ChatEvent::ConversationRemoved(provisional.id));
        }
    }

    sort_by_recency(&mut fresh);
    state.conversations = fresh;
    events.push(ChatEvent::ConversationsReplaced);
    events
}

fn merge_with_existing(
    fresh: &mut Conversation,
    existing: Option<&Conversation>,
    titles: &mut TitleCache,
) {
    if fresh.kind == ConversationKind::Private {
        if let Some(title) = titles.get(fresh.id) {
            fresh.title = title.to_string();
        } else if let Some(existing) = existing.filter(|entry| !is_unresolved_title(&entry.title)) {
            fresh.title.clone_from(&existing.title);
            titles.remember(fresh.id, &existing.title);
        } else if is_unresolved_title(&fresh.title) {
            fresh.title = PRIVATE_TITLE_PLACEHOLDER.to_string();
        }
    }

    let Some(existing) = existing else {
        return;
    };

    if fresh.participant_ids.is_empty() {
        fresh.participant_ids.clone_from(&existing.participant_ids);
    }
    if fresh.admin_ids.is_empty() {
        fresh.admin_ids.clone_from(&existing.admin_ids);
    }
    if fresh.former_members.is_empty() {
        fresh.former_members.clone_from(&existing.former_members);
    }
    fresh.current_user_has_left = fresh
        .current_user_has_left
        .or(existing.current_user_has_left);
    fresh.created_at = fresh.created_at.or(existing.created_at);
    fresh.created_by = fresh.created_by.or(existing.created_by);

    if fresh.last_message_at.is_none() && fresh.last_message_preview.is_none() {
        fresh.last_message_at = existing.last_message_at;
        fresh.last_message_preview.clone_from(&existing.last_message_preview);
    }
}

/// Resolves the title of a private conversation from known users.
///
/// Applies only when the title is unresolved, so a resolved title is never
/// replaced by this path. Returns whether the title changed.
pub fn resolve_private_title(
    conversation: &mut Conversation,
    users: &UserDirectory,
    titles: &mut TitleCache,
    current_user: UserId,
) -> bool {
    conversation.has_unresolved_title()
        && recompute_private_title(conversation, users, titles, current_user)
}

/// Recomputes the title of a private conversation from its single
/// counterpart's current display name, resolved or not, and records it in
/// the title cache. Returns whether the title changed.
pub fn recompute_private_title(
    conversation: &mut Conversation,
    users: &UserDirectory,
    titles: &mut TitleCache,
    current_user: UserId,
) -> bool {
    if conversation.is_group() {
        return false;
    }

    match conversation.counterparts(current_user).as_slice() {
        [counterpart] => match users.display_name(*counterpart) {
            Some(name) => {
                titles.remember(conversation.id, &name);
                if conversation.title == name {
                    return false;
                }
                conversation.title = name;
                true
            }
            None => false,
        },
        [] => false,
        many => {
            warn!(
                conversation = %conversation.id,
                counterparts = many.len(),
                "private conversation with more than one counterpart left unresolved"
            );
            false
        }
    }
}

/// Resolves every unresolved private title the directory can answer.
///
/// Returns the ids whose title changed.
pub fn resolve_titles_from_directory(
    state: &mut CacheState,
    current_user: UserId,
) -> Vec<ConversationId> {
    let CacheState {
        conversations,
        users,
        titles,
        ..
    } = state;

    conversations
        .iter_mut()
        .filter_map(|conversation| {
            resolve_private_title(conversation, users, titles, current_user)
                .then_some(conversation.id)
        })
        .collect()
}

/// Counterparts of unresolved private conversations that the directory
/// cannot name yet.
#[must_use]
pub fn unknown_counterparts(state: &CacheState, current_user: UserId) -> Vec<UserId> {
    let mut unknown: Vec<UserId> = state
        .conversations
        .iter()
        .filter(|conversation| conversation.has_unresolved_title())
        .filter_map(|conversation| conversation.counterpart(current_user))
        .filter(|id| state.users.display_name(*id).is_none())
        .collect();
    unknown.sort_unstable();
    unknown.dedup();
    unknown
}

/// Persisted private conversations whose title is unresolved and whose
/// participants are unknown; only a membership fetch can name them.
#[must_use]
pub fn conversations_missing_participants(state: &CacheState) -> Vec<ConversationId> {
    state
        .conversations
        .iter()
        .filter(|conversation| {
            !conversation.is_provisional()
                && conversation.has_unresolved_title()
                && conversation.participant_ids.is_empty()
        })
        .map(|conversation| conversation.id)
        .collect()
}

/// Sets the preview of a conversation from its latest visible message.
///
/// Returns whether the conversation changed. Messages without a timestamp
/// only win when no timestamped message is visible.
pub fn apply_latest_message(state: &mut CacheState, id: ConversationId, messages: &[Message]) -> bool {
    let Some(latest) = messages
        .iter()
        .filter(|message| !message.hidden)
        .max_by_key(|message| message.created_at)
    else {
        return false;
    };
    let Some(conversation) = state.conversation_mut(id) else {
        return false;
    };

    let preview = Some(latest.preview());
    let at = latest.created_at.or(conversation.last_message_at);
    if conversation.last_message_preview == preview && conversation.last_message_at == at {
        return false;
    }
    conversation.last_message_preview = preview;
    conversation.last_message_at = at;
    true
}

/// Sorts conversations by latest activity, newest first. Conversations
/// without activity go last; ties keep their order.
pub fn sort_by_recency(conversations: &mut [Conversation]) {
    conversations.sort_by(|a, b| b.last_message_at.cmp(&a.last_message_at));
}
