//! The in-memory chat cache and its change notifications.
//!
//! All state lives behind one `std::sync::Mutex`. Writers go through
//! [`ChatCache::mutate`], which applies a closure under the lock and then
//! broadcasts the resulting events once the guard is released. The guard is
//! never held across an `.await`.

use shared::models::{Conversation, ConversationId, ConversationKind, Message, User, UserId};
use std::{
    collections::HashMap,
    fmt,
    sync::{Mutex, MutexGuard, PoisonError},
};
use tokio::sync::broadcast;

use crate::{directory::UserDirectory, notice::Notice, reconcile::TitleCache};

const EVENT_CAPACITY: usize = 256;

/// Which conversations the list shows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConversationFilter {
    /// Private and group conversations.
    #[default]
    All,
    /// Group conversations only.
    GroupsOnly,
}

impl ConversationFilter {
    /// Whether a conversation of `kind` passes the filter.
    #[must_use]
    pub fn admits(self, kind: ConversationKind) -> bool {
        match self {
            Self::All => true,
            Self::GroupsOnly => kind == ConversationKind::Group,
        }
    }
}

/// Change notification emitted by the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// The conversation list was rebuilt.
    ConversationsReplaced,
    /// One conversation changed in place.
    ConversationUpdated(ConversationId),
    /// A conversation left the cache.
    ConversationRemoved(ConversationId),
    /// A provisional conversation received its server id.
    ConversationPromoted {
        /// Provisional id.
        from: ConversationId,
        /// Server id.
        to: ConversationId,
    },
    /// The message list of a conversation was replaced.
    TimelineReplaced(ConversationId),
    /// The user directory changed.
    UsersChanged,
    /// Banner for the rendering surface.
    Notice(Notice),
}

/// Everything the client knows, guarded by [`ChatCache`].
#[derive(Debug, Default)]
pub struct CacheState {
    /// Ordered, filtered conversation list.
    pub conversations: Vec<Conversation>,
    /// Messages per conversation, as last fetched or recorded locally.
    pub messages: HashMap<ConversationId, Vec<Message>>,
    /// Known users.
    pub users: UserDirectory,
    /// Resolved private titles, keyed by conversation id.
    pub titles: TitleCache,
    /// Current list filter.
    pub filter: ConversationFilter,
}

impl CacheState {
    /// Looks up a conversation.
    #[must_use]
    pub fn conversation(&self, id: ConversationId) -> Option<&Conversation> {
        self.conversations.iter().find(|conversation| conversation.id == id)
    }

    /// Looks up a conversation for modification.
    pub fn conversation_mut(&mut self, id: ConversationId) -> Option<&mut Conversation> {
        self.conversations
            .iter_mut()
            .find(|conversation| conversation.id == id)
    }

    /// Number of messages recorded for a conversation.
    #[must_use]
    pub fn message_count(&self, id: ConversationId) -> usize {
        self.messages.get(&id).map_or(0, Vec::len)
    }

    /// Removes a conversation and everything keyed by its id.
    ///
    /// Returns whether it was present.
    pub fn remove_conversation(&mut self, id: ConversationId) -> bool {
        let before = self.conversations.len();
        self.conversations.retain(|conversation| conversation.id != id);
        self.messages.remove(&id);
        self.titles.forget(id);
        self.conversations.len() != before
    }
}

/// Process-wide cache service shared by the session shell and its views.
pub struct ChatCache {
    state: Mutex<CacheState>,
    events: broadcast::Sender<ChatEvent>,
}

impl fmt::Debug for ChatCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("ChatCache")
            .field("conversations", &state.conversations.len())
            .field("users", &state.users.len())
            .field("subscribers", &self.events.receiver_count())
            .finish()
    }
}

impl Default for ChatCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: Mutex::new(CacheState::default()),
            events,
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Subscribes to change notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.events.subscribe()
    }

    /// Broadcasts an event. Dropped silently when nobody listens.
    pub fn emit(&self, event: ChatEvent) {
        let _ = self.events.send(event);
    }

    /// Reads the state under the lock.
    pub fn read<R>(&self, f: impl FnOnce(&CacheState) -> R) -> R {
        f(&self.lock())
    }

    /// Applies a change under the lock, then broadcasts the events it produced.
    pub fn mutate<R>(&self, f: impl FnOnce(&mut CacheState) -> (R, Vec<ChatEvent>)) -> R {
        let (result, events) = {
            let mut state = self.lock();
            f(&mut state)
        };
        for event in events {
            self.emit(event);
        }
        result
    }

    /// Snapshot of the ordered conversation list.
    #[must_use]
    pub fn conversations(&self) -> Vec<Conversation> {
        self.read(|state| state.conversations.clone())
    }

    /// Snapshot of one conversation.
    #[must_use]
    pub fn conversation(&self, id: ConversationId) -> Option<Conversation> {
        self.read(|state| state.conversation(id).cloned())
    }

    /// Snapshot of the messages recorded for a conversation.
    #[must_use]
    pub fn messages(&self, id: ConversationId) -> Vec<Message> {
        self.read(|state| state.messages.get(&id).cloned().unwrap_or_default())
    }

    /// Snapshot of one user.
    #[must_use]
    pub fn user(&self, id: UserId) -> Option<User> {
        self.read(|state| state.users.get(id).cloned())
    }

    /// Snapshot of every known user, ordered by name.
    #[must_use]
    pub fn users(&self) -> Vec<User> {
        self.read(|state| state.users.sorted())
    }

    /// Current list filter.
    #[must_use]
    pub fn filter(&self) -> ConversationFilter {
        self.read(|state| state.filter)
    }

    /// Changes the list filter. Takes effect on the next refresh.
    pub fn set_filter(&self, filter: ConversationFilter) {
        self.mutate(|state| {
            state.filter = filter;
            ((), Vec::new())
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn private(id: i64) -> Conversation {
        let now = NaiveDate::from_ymd_opt(2026, 10, 19)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let mut conversation = Conversation::provisional_private(5, 2, "Alice".into(), now);
        conversation.id = ConversationId::Server(id);
        conversation.provisional_recipient = None;
        conversation
    }

    #[test]
    fn test_filter_admits_kinds() {
        assert!(ConversationFilter::All.admits(ConversationKind::Private));
        assert!(!ConversationFilter::GroupsOnly.admits(ConversationKind::Private));
        assert!(ConversationFilter::GroupsOnly.admits(ConversationKind::Group));
    }

    #[test]
    fn test_mutate_broadcasts_after_applying() {
        let cache = ChatCache::new();
        let mut events = cache.subscribe();

        let count = cache.mutate(|state| {
            state.conversations.push(private(1));
            (state.conversations.len(), vec![ChatEvent::ConversationsReplaced])
        });

        assert_eq!(count, 1);
        assert_eq!(events.try_recv().unwrap(), ChatEvent::ConversationsReplaced);
        assert!(cache.conversation(ConversationId::Server(1)).is_some());
    }

    #[test]
    fn test_emit_without_subscribers_is_harmless() {
        let cache = ChatCache::new();
        cache.emit(ChatEvent::UsersChanged);
        assert!(cache.conversations().is_empty());
    }

    #[test]
    fn test_remove_conversation_clears_keyed_state() {
        let cache = ChatCache::new();
        let id = ConversationId::Server(1);
        cache.mutate(|state| {
            state.conversations.push(private(1));
            state.messages.insert(id, Vec::new());
            state.titles.remember(id, "Alice Smith");
            ((), Vec::new())
        });

        let removed = cache.mutate(|state| (state.remove_conversation(id), Vec::new()));

        assert!(removed);
        cache.read(|state| {
            assert!(state.conversation(id).is_none());
            assert!(!state.messages.contains_key(&id));
            assert_eq!(state.titles.get(id), None);
        });
    }

    #[test]
    fn test_set_filter() {
        let cache = ChatCache::new();
        assert_eq!(cache.filter(), ConversationFilter::All);
        cache.set_filter(ConversationFilter::GroupsOnly);
        assert_eq!(cache.filter(), ConversationFilter::GroupsOnly);
    }
}
