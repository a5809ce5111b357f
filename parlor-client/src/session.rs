//! The chat session shell: sequences repository calls, feeds the results to
//! the reconciliation functions and reports outcomes as notices.

use chrono::{Local, NaiveDateTime};
use futures::future::join_all;
use shared::models::{
    Conversation, ConversationId, Message, MessageRecord, SendGroupPayload, SendPrivatePayload,
    User, UserId,
};
use std::{
    fmt,
    path::Path,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
};
use tracing::{debug, info, instrument, warn};

use crate::{
    cache::{CacheState, ChatCache, ChatEvent},
    error::{ChatError, ChatResult},
    membership::{MembershipOutcome, apply_membership, check_demotion, check_removal},
    notice::Notice,
    provisional::{PrivateStart, discard_if_empty, promote, start_private},
    reconcile::{
        apply_latest_message, conversations_missing_participants, reconcile_conversations,
        resolve_titles_from_directory, sort_by_recency, unknown_counterparts,
    },
    repository::{ChatRepository, ExportKind},
    timeline::{TimelineEntry, TimelineOptions, build_timeline},
    view::ConversationView,
};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "bmp"];

/// Whether a conversation-list refresh ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The list was fetched and reconciled.
    Applied,
    /// Another refresh was in flight; this one was dropped.
    Skipped,
}

/// Image attached to an outgoing message.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageUpload {
    /// Original file name; its extension must name an image format.
    pub file_name: String,
    /// File content.
    pub bytes: Vec<u8>,
}

impl fmt::Debug for ImageUpload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageUpload")
            .field("file_name", &self.file_name)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

impl ImageUpload {
    fn has_image_extension(&self) -> bool {
        Path::new(&self.file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
    }
}

/// Message composed by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutgoingMessage {
    /// Text content.
    pub text: Option<String>,
    /// Attached image.
    pub image: Option<ImageUpload>,
}

impl OutgoingMessage {
    /// A text-only message.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            image: None,
        }
    }
}

/// A downloaded export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFile {
    /// Name generated by the backend.
    pub file_name: String,
    /// File content.
    pub bytes: Vec<u8>,
}

/// Clears the refresh flag when the refresh ends, however it ends.
struct RefreshGuard<'a>(&'a AtomicBool);

impl<'a> RefreshGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Folds fetched message records into the cache and returns them as
/// messages. Author fragments enrich the user directory.
fn absorb_records(
    state: &mut CacheState,
    id: ConversationId,
    records: &[MessageRecord],
    events: &mut Vec<ChatEvent>,
) -> Vec<Message> {
    let mut users_changed = false;
    for record in records {
        if let (Some(author), Some(fragment)) = (record.created_by, record.info_creator.as_ref()) {
            users_changed |= state.users.merge_fragment(author, fragment);
        }
    }
    if users_changed {
        events.push(ChatEvent::UsersChanged);
    }
    records.iter().map(|record| record.to_message(id)).collect()
}

/// Session shell for one signed-in user.
///
/// Owns the chat cache; every change goes through the reconciliation
/// functions and is announced on the cache's event channel.
pub struct ChatSession {
    repository: Arc<dyn ChatRepository>,
    cache: Arc<ChatCache>,
    user: User,
    selected: Mutex<Option<ConversationId>>,
    refreshing: AtomicBool,
}

impl fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatSession")
            .field("user", &self.user.id)
            .field("selected", &self.selected())
            .field("refreshing", &self.refreshing.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl ChatSession {
    /// Creates a session for `user`.
    pub fn new(repository: Arc<dyn ChatRepository>, cache: Arc<ChatCache>, user: User) -> Self {
        cache.mutate(|state| {
            let changed = state.users.merge_user(&user);
            ((), if changed { vec![ChatEvent::UsersChanged] } else { Vec::new() })
        });
        Self {
            repository,
            cache,
            user,
            selected: Mutex::new(None),
            refreshing: AtomicBool::new(false),
        }
    }

    /// The signed-in user.
    #[must_use]
    pub fn user(&self) -> &User {
        &self.user
    }

    /// The cache this session feeds.
    #[must_use]
    pub fn cache(&self) -> &Arc<ChatCache> {
        &self.cache
    }

    /// The selected conversation.
    #[must_use]
    pub fn selected(&self) -> Option<ConversationId> {
        *self.selected.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, notice: Notice) {
        self.cache.emit(ChatEvent::Notice(notice));
    }

    /// Announces a failure and hands it back.
    fn reject<T>(&self, err: ChatError) -> ChatResult<T> {
        self.notify(Notice::from(&err));
        Err(err)
    }

    /// Announces the outcome of a user action.
    fn report<T>(&self, result: ChatResult<T>, success: &str) -> ChatResult<T> {
        match result {
            Ok(value) => {
                self.notify(Notice::success(success));
                Ok(value)
            }
            Err(err) => self.reject(err),
        }
    }

    /// Announces a failure only.
    fn report_failure<T>(&self, result: ChatResult<T>) -> ChatResult<T> {
        result.or_else(|err| self.reject(err))
    }

    fn persisted_id(&self, id: ConversationId, action: &str) -> ChatResult<i64> {
        match id.server_id() {
            Some(server_id) => Ok(server_id),
            None => self.reject(ChatError::validation(format!(
                "Send a first message before you {action}"
            ))),
        }
    }

    fn cached_group(&self, id: ConversationId) -> ChatResult<(i64, Conversation)> {
        let Some(conversation) = self.cache.conversation(id) else {
            return self.reject(ChatError::validation("Unknown conversation"));
        };
        if !conversation.is_group() {
            return self.reject(ChatError::validation("This is not a group conversation"));
        }
        let server_id = self.persisted_id(id, "manage this group")?;
        Ok((server_id, conversation))
    }

    /// Fetches the conversation list and reconciles it into the cache, then
    /// resolves private titles and refreshes previews.
    ///
    /// A refresh requested while one is running is dropped.
    ///
    /// # Errors
    /// Fails when the list cannot be fetched; the cache is left as it was.
    #[instrument(name = "session.refresh_conversations", skip(self), err)]
    pub async fn refresh_conversations(&self) -> ChatResult<RefreshOutcome> {
        let Some(_guard) = RefreshGuard::acquire(&self.refreshing) else {
            debug!("conversation refresh already running, request dropped");
            return Ok(RefreshOutcome::Skipped);
        };

        let summaries = self.report_failure(self.repository.fetch_conversations(self.user.id).await)?;
        let me = self.user.id;
        self.cache
            .mutate(|state| ((), reconcile_conversations(state, &summaries, me)));
        info!(conversations = summaries.len(), "conversation list reconciled");

        self.resolve_private_titles().await;
        self.enrich_conversations().await;
        Ok(RefreshOutcome::Applied)
    }

    /// Sets each persisted conversation's preview from its latest visible
    /// message. Failures are logged per conversation and do not affect the
    /// others. Returns how many conversations changed.
    pub async fn enrich_conversations(&self) -> usize {
        let ids: Vec<(ConversationId, i64)> = self.cache.read(|state| {
            state
                .conversations
                .iter()
                .filter_map(|conversation| conversation.id.server_id().map(|server_id| (conversation.id, server_id)))
                .collect()
        });

        let fetches = ids.into_iter().map(|(id, server_id)| async move {
            (id, self.repository.fetch_messages(server_id).await)
        });
        let results = join_all(fetches).await;

        self.cache.mutate(|state| {
            let mut events = Vec::new();
            let mut updated = 0;
            for (id, result) in results {
                match result {
                    Ok(records) => {
                        let messages = absorb_records(state, id, &records, &mut events);
                        if apply_latest_message(state, id, &messages) {
                            updated += 1;
                            events.push(ChatEvent::ConversationUpdated(id));
                        }
                    }
                    Err(err) => warn!(conversation = %id, error = %err, "failed to load latest message"),
                }
            }
            if updated > 0 {
                sort_by_recency(&mut state.conversations);
                events.push(ChatEvent::ConversationsReplaced);
            }
            (updated, events)
        })
    }

    /// Names unresolved private conversations: first from known users, then
    /// from one directory fetch, then from membership for conversations
    /// whose participants are unknown.
    pub async fn resolve_private_titles(&self) {
        let me = self.user.id;
        self.resolve_from_directory();

        let unknown = self.cache.read(|state| unknown_counterparts(state, me));
        if !unknown.is_empty() {
            debug!(unknown = unknown.len(), "fetching user directory for private titles");
            match self.repository.fetch_users().await {
                Ok(users) => {
                    self.cache.mutate(|state| {
                        let changed = state.users.merge_all(&users);
                        ((), if changed { vec![ChatEvent::UsersChanged] } else { Vec::new() })
                    });
                    self.resolve_from_directory();
                }
                Err(err) => warn!(error = %err, "failed to fetch user directory"),
            }
        }

        let missing = self.cache.read(conversations_missing_participants);
        let resolutions = missing.iter().map(|id| self.resolve_members(*id));
        for (id, result) in missing.iter().zip(join_all(resolutions).await) {
            if let Err(err) = result {
                warn!(conversation = %id, error = %err, "failed to resolve participants");
            }
        }
    }

    fn resolve_from_directory(&self) {
        let me = self.user.id;
        self.cache.mutate(|state| {
            let resolved = resolve_titles_from_directory(state, me);
            ((), resolved.into_iter().map(ChatEvent::ConversationUpdated).collect())
        });
    }

    /// Fetches the membership of a conversation and applies it to the cache.
    ///
    /// # Errors
    /// Provisional ids are rejected locally with no network call; fetch
    /// failures leave the cache untouched.
    #[instrument(name = "session.resolve_members", skip(self), err)]
    pub async fn resolve_members(&self, id: ConversationId) -> ChatResult<MembershipOutcome> {
        let Some(server_id) = id.server_id() else {
            return Err(ChatError::validation("Provisional conversations have no members yet"));
        };
        let records = self.repository.fetch_members(server_id).await?;
        let me = self.user.id;
        Ok(self
            .cache
            .mutate(|state| apply_membership(state, id, &records, me)))
    }

    /// [`Self::resolve_members`], then `on_done` exactly once with the
    /// result, whichever way it went.
    ///
    /// # Errors
    /// Same as [`Self::resolve_members`].
    pub async fn resolve_members_then<F>(&self, id: ConversationId, on_done: F) -> ChatResult<MembershipOutcome>
    where
        F: FnOnce(&ChatResult<MembershipOutcome>) + Send,
    {
        let result = self.resolve_members(id).await;
        on_done(&result);
        result
    }

    /// Selects a conversation and loads its timeline. The previously
    /// selected conversation is discarded if it is provisional and empty.
    ///
    /// # Errors
    /// Fails when the timeline cannot be fetched.
    #[instrument(name = "session.select_conversation", skip(self), err)]
    pub async fn select_conversation(&self, id: ConversationId) -> ChatResult<Vec<Message>> {
        let previous = self
            .selected
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(id);
        if let Some(previous) = previous.filter(|previous| *previous != id) {
            self.cache.mutate(|state| ((), discard_if_empty(state, previous)));
        }
        self.load_timeline(id).await
    }

    fn replace_selection(&self, from: ConversationId, to: Option<ConversationId>) {
        let mut selected = self.selected.lock().unwrap_or_else(PoisonError::into_inner);
        if *selected == Some(from) {
            *selected = to;
        }
    }

    /// Clears the selection, discarding an empty provisional conversation.
    pub fn deselect(&self) {
        let previous = self.selected.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(previous) = previous {
            self.cache.mutate(|state| ((), discard_if_empty(state, previous)));
        }
    }

    /// Fetches the messages of a conversation and replaces its cached list.
    /// Provisional conversations render from the local list with no network
    /// call.
    ///
    /// # Errors
    /// Fails when the messages cannot be fetched; the cached list is kept.
    #[instrument(name = "session.load_timeline", skip(self), err)]
    pub async fn load_timeline(&self, id: ConversationId) -> ChatResult<Vec<Message>> {
        let Some(server_id) = id.server_id() else {
            return Ok(self.cache.mutate(|state| {
                let messages = state.messages.entry(id).or_default().clone();
                (messages, vec![ChatEvent::TimelineReplaced(id)])
            }));
        };

        let records = self.report_failure(self.repository.fetch_messages(server_id).await)?;
        Ok(self.cache.mutate(|state| {
            let mut events = Vec::new();
            let messages = absorb_records(state, id, &records, &mut events);
            if apply_latest_message(state, id, &messages) {
                events.push(ChatEvent::ConversationUpdated(id));
            }
            state.messages.insert(id, messages.clone());
            events.push(ChatEvent::TimelineReplaced(id));
            (messages, events)
        }))
    }

    /// Day-segmented timeline of a conversation from the cached messages.
    #[must_use]
    pub fn timeline_view(&self, id: ConversationId, day_separators: bool, now: NaiveDateTime) -> Vec<TimelineEntry> {
        let me = self.user.id;
        self.cache.read(|state| {
            let show_senders = state.conversation(id).is_some_and(Conversation::is_group);
            let messages = state.messages.get(&id).map_or(&[][..], Vec::as_slice);
            build_timeline(
                messages,
                &state.users,
                me,
                TimelineOptions {
                    day_separators,
                    show_senders,
                },
                now,
            )
        })
    }

    /// Rows of the conversation list, in cache order.
    #[must_use]
    pub fn conversation_views(&self, now: NaiveDateTime) -> Vec<ConversationView> {
        let me = self.user.id;
        self.cache.read(|state| {
            state
                .conversations
                .iter()
                .map(|conversation| ConversationView::new(conversation, me, now))
                .collect()
        })
    }

    /// Fetches the user directory into the cache and returns it sorted.
    ///
    /// # Errors
    /// Fails when the directory cannot be fetched.
    #[instrument(name = "session.load_users", skip(self), err)]
    pub async fn load_users(&self) -> ChatResult<Vec<User>> {
        let users = self.report_failure(self.repository.fetch_users().await)?;
        Ok(self.cache.mutate(|state| {
            let changed = state.users.merge_all(&users);
            (
                state.users.sorted(),
                if changed { vec![ChatEvent::UsersChanged] } else { Vec::new() },
            )
        }))
    }

    /// Opens a private conversation with `recipient`: the existing one when
    /// there is one, otherwise a provisional one placed first.
    ///
    /// # Errors
    /// Rejects the current user as recipient.
    #[instrument(name = "session.start_private_conversation", skip(self), err)]
    pub async fn start_private_conversation(&self, recipient: UserId) -> ChatResult<PrivateStart> {
        if recipient == self.user.id {
            return self.reject(ChatError::validation("You cannot start a conversation with yourself"));
        }

        if !self.cache.read(|state| state.users.contains(recipient)) {
            if let Err(err) = self.load_users().await {
                warn!(recipient, error = %err, "recipient unknown, continuing without a name");
            }
        }

        let me = self.user.id;
        let start = self
            .cache
            .mutate(|state| start_private(state, me, recipient, now()));
        self.select_conversation(start.id()).await?;
        Ok(start)
    }

    /// Creates a group with the selected members and selects it.
    ///
    /// # Errors
    /// Rejects a blank title or an empty member list locally; fails when the
    /// backend refuses or returns nothing.
    #[instrument(name = "session.create_group", skip(self), err)]
    pub async fn create_group(&self, title: &str, participant_ids: &[UserId]) -> ChatResult<ConversationId> {
        let title = title.trim();
        let mut members: Vec<UserId> = participant_ids
            .iter()
            .copied()
            .filter(|id| *id != self.user.id)
            .collect();
        members.sort_unstable();
        members.dedup();
        if title.is_empty() || members.is_empty() {
            return self.reject(ChatError::validation(
                "Enter a group name and select at least one member",
            ));
        }

        let created = self.repository.create_group(title, &members).await;
        let summary = match created {
            Ok(Some(summary)) => summary,
            Ok(None) => return self.reject(ChatError::application("No conversation was created")),
            Err(err) => return self.reject(err),
        };

        let conversation = Conversation::from_summary(&summary);
        let id = conversation.id;
        self.cache.mutate(|state| {
            if state.conversation(id).is_none() {
                state.conversations.insert(0, conversation);
            }
            state.messages.entry(id).or_default();
            ((), vec![ChatEvent::ConversationsReplaced])
        });
        self.notify(Notice::success(format!("Group \"{title}\" created")));

        if let Err(err) = self.refresh_conversations().await {
            warn!(error = %err, "refresh after group creation failed");
        }
        self.select_conversation(id).await?;
        if let Err(err) = self.resolve_members(id).await {
            warn!(conversation = %id, error = %err, "failed to load members of new group");
        }
        Ok(id)
    }

    /// Sends a message. The image, if any, is uploaded first. Once the send
    /// succeeds, a provisional conversation records the message locally and
    /// is promoted to the server id. Returns the conversation id the
    /// message ended up in.
    ///
    /// # Errors
    /// Empty messages, non-image attachments, provisional groups and groups
    /// the user left are rejected locally; upload and send failures are
    /// reported and leave the cache as it was.
    #[instrument(name = "session.send_message", skip(self, message), err)]
    pub async fn send_message(&self, id: ConversationId, message: OutgoingMessage) -> ChatResult<ConversationId> {
        let text = message
            .text
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(str::to_string);
        if text.is_none() && message.image.is_none() {
            return self.reject(ChatError::validation("Message cannot be empty"));
        }
        if let Some(image) = &message.image
            && !image.has_image_extension()
        {
            return self.reject(ChatError::validation("Please select an image"));
        }

        let Some(conversation) = self.cache.conversation(id) else {
            return self.reject(ChatError::validation("Select a conversation"));
        };
        if conversation.is_group() && conversation.is_provisional() {
            return self.reject(ChatError::validation("Create the group first"));
        }
        if conversation.is_group() && conversation.current_user_has_left == Some(true) {
            return self.reject(ChatError::validation("You left this group"));
        }

        let recipient = if conversation.is_group() {
            None
        } else {
            Some(self.recipient_of(&conversation).await?)
        };

        let image_url = match message.image {
            Some(image) => {
                let upload = self.repository.upload_image(image.file_name, image.bytes).await;
                Some(self.report_failure(upload)?)
            }
            None => None,
        };

        let sent = match (recipient, id.server_id()) {
            (Some(recipient), _) => {
                self.repository
                    .send_private_message(SendPrivatePayload::new(recipient, text.clone(), image_url.clone()))
                    .await
            }
            (None, Some(server_id)) => {
                self.repository
                    .send_group_message(SendGroupPayload::new(server_id, text.clone(), image_url.clone()))
                    .await
            }
            (None, None) => Err(ChatError::validation("Create the group first")),
        };
        let receipt = self.report(sent, "Message sent")?;

        // Only accepted messages are echoed, so a failed send leaves a
        // provisional conversation empty and discardable.
        if conversation.is_provisional() {
            let pending = Message::pending(id, self.user.id, text, image_url, now());
            self.cache.mutate(|state| {
                state.messages.entry(id).or_default().push(pending);
                if let Some(entry) = state.conversation_mut(id) {
                    entry.last_message_at = Some(now());
                }
                ((), vec![ChatEvent::TimelineReplaced(id)])
            });
        }

        let target = match (id.is_provisional(), receipt.conversation_id) {
            (true, Some(server_id)) => {
                self.cache.mutate(|state| ((), promote(state, id, server_id)));
                let promoted = ConversationId::Server(server_id);
                self.replace_selection(id, Some(promoted));
                if let Err(err) = self.resolve_members(promoted).await {
                    warn!(conversation = %promoted, error = %err, "failed to resolve members after promotion");
                }
                promoted
            }
            (true, None) => {
                warn!(conversation = %id, "send receipt carried no conversation id");
                id
            }
            (false, _) => id,
        };

        if let Err(err) = self.load_timeline(target).await {
            warn!(conversation = %target, error = %err, "failed to reload timeline after send");
        }
        if let Err(err) = self.refresh_conversations().await {
            warn!(error = %err, "refresh after send failed");
        }
        Ok(target)
    }

    /// Recipient of a private message: the intended recipient of a
    /// provisional conversation, otherwise the single counterpart, resolving
    /// membership once if the participants are unknown.
    async fn recipient_of(&self, conversation: &Conversation) -> ChatResult<UserId> {
        let me = self.user.id;
        if let Some(recipient) = conversation
            .provisional_recipient
            .or_else(|| conversation.counterpart(me))
        {
            return Ok(recipient);
        }
        if let Err(err) = self.resolve_members(conversation.id).await {
            warn!(conversation = %conversation.id, error = %err, "failed to resolve recipient");
        }
        match self
            .cache
            .conversation(conversation.id)
            .and_then(|conversation| conversation.counterpart(me))
        {
            Some(recipient) => Ok(recipient),
            None => self.reject(ChatError::validation("Unable to find the recipient")),
        }
    }

    /// Deletes a message for the current user and reloads the timeline.
    ///
    /// # Errors
    /// Fails when the backend refuses.
    #[instrument(name = "session.delete_message", skip(self), err)]
    pub async fn delete_message(&self, id: ConversationId, message_id: i64) -> ChatResult<()> {
        let deleted = self.repository.delete_message(message_id).await;
        self.report(deleted, "Message deleted")?;
        if let Err(err) = self.load_timeline(id).await {
            warn!(conversation = %id, error = %err, "failed to reload timeline after delete");
        }
        Ok(())
    }

    /// Adds a member to a group and reloads its membership.
    ///
    /// # Errors
    /// Rejects non-groups, provisional ids and existing members locally.
    #[instrument(name = "session.add_member", skip(self), err)]
    pub async fn add_member(&self, id: ConversationId, user_id: UserId) -> ChatResult<()> {
        let (server_id, group) = self.cached_group(id)?;
        if group.participant_ids.contains(&user_id) {
            return self.reject(ChatError::validation("This user is already a member"));
        }
        let added = self.repository.add_member(server_id, user_id).await;
        self.report(added, "Member added to the group")?;
        self.reload_members(id).await;
        Ok(())
    }

    /// Removes a member from a group and reloads its membership.
    ///
    /// # Errors
    /// Rejects removing the last admin locally.
    #[instrument(name = "session.remove_member", skip(self), err)]
    pub async fn remove_member(&self, id: ConversationId, user_id: UserId) -> ChatResult<()> {
        let (server_id, group) = self.cached_group(id)?;
        if let Err(err) = check_removal(&group, user_id) {
            return self.reject(err);
        }
        let removed = self.repository.remove_member(server_id, user_id).await;
        self.report(removed, "Member removed from the group")?;
        self.reload_members(id).await;
        Ok(())
    }

    /// Grants admin rights and reloads the membership.
    ///
    /// # Errors
    /// Rejects members who are already admins locally.
    #[instrument(name = "session.promote_member", skip(self), err)]
    pub async fn promote_member(&self, id: ConversationId, user_id: UserId) -> ChatResult<()> {
        let (server_id, group) = self.cached_group(id)?;
        if group.is_admin(user_id) {
            return self.reject(ChatError::validation("This member is already an admin"));
        }
        let promoted = self.repository.promote_admin(server_id, user_id).await;
        self.report(promoted, "Member promoted to admin")?;
        self.reload_members(id).await;
        Ok(())
    }

    /// Revokes admin rights and reloads the membership.
    ///
    /// # Errors
    /// Rejects demoting a non-admin or the last admin locally.
    #[instrument(name = "session.demote_member", skip(self), err)]
    pub async fn demote_member(&self, id: ConversationId, user_id: UserId) -> ChatResult<()> {
        let (server_id, group) = self.cached_group(id)?;
        if let Err(err) = check_demotion(&group, user_id) {
            return self.reject(err);
        }
        let demoted = self.repository.demote_admin(server_id, user_id).await;
        self.report(demoted, "Admin rights removed")?;
        self.reload_members(id).await;
        Ok(())
    }

    async fn reload_members(&self, id: ConversationId) {
        if let Err(err) = self.resolve_members(id).await {
            warn!(conversation = %id, error = %err, "failed to reload members");
        }
    }

    /// Leaves a group and drops it from the cache.
    ///
    /// # Errors
    /// Fails when the backend refuses.
    #[instrument(name = "session.leave_group", skip(self), err)]
    pub async fn leave_group(&self, id: ConversationId) -> ChatResult<()> {
        let (server_id, _) = self.cached_group(id)?;
        let left = self.repository.leave_group(server_id).await;
        self.report(left, "You left the group")?;
        self.forget_conversation(id).await;
        Ok(())
    }

    /// Deletes a conversation for the current user and drops it from the
    /// cache. A provisional conversation is dropped locally.
    ///
    /// # Errors
    /// Fails when the backend refuses.
    #[instrument(name = "session.delete_conversation", skip(self), err)]
    pub async fn delete_conversation(&self, id: ConversationId) -> ChatResult<()> {
        if let Some(server_id) = id.server_id() {
            let deleted = self.repository.delete_conversation(server_id).await;
            self.report(deleted, "Conversation deleted")?;
        }
        self.forget_conversation(id).await;
        Ok(())
    }

    async fn forget_conversation(&self, id: ConversationId) {
        self.cache.mutate(|state| {
            let removed = state.remove_conversation(id);
            ((), if removed { vec![ChatEvent::ConversationRemoved(id)] } else { Vec::new() })
        });
        self.replace_selection(id, None);
        if let Err(err) = self.refresh_conversations().await {
            warn!(error = %err, "refresh after removal failed");
        }
    }

    /// Exports one conversation as plain text and downloads it.
    ///
    /// # Errors
    /// Rejects provisional ids locally; fails when no file is generated or
    /// the download fails.
    #[instrument(name = "session.export_conversation", skip(self), err)]
    pub async fn export_conversation(&self, id: ConversationId) -> ChatResult<ExportFile> {
        let server_id = self.persisted_id(id, "export this conversation")?;
        let exported = self.repository.export_conversation(server_id).await;
        self.download(exported, ExportKind::Plain).await
    }

    /// Exports every conversation as a zip archive and downloads it.
    ///
    /// # Errors
    /// Fails when no file is generated or the download fails.
    #[instrument(name = "session.export_all_conversations", skip(self), err)]
    pub async fn export_all_conversations(&self) -> ChatResult<ExportFile> {
        let exported = self.repository.export_all_conversations().await;
        self.download(exported, ExportKind::Zip).await
    }

    async fn download(&self, exported: ChatResult<String>, kind: ExportKind) -> ChatResult<ExportFile> {
        let file_name = self.report_failure(exported)?;
        if file_name.trim().is_empty() {
            return self.reject(ChatError::application("No file was generated"));
        }
        let bytes = self.repository.download_export(kind, &file_name).await;
        let bytes = self.report(bytes, &format!("Export {file_name} downloaded"))?;
        Ok(ExportFile { file_name, bytes })
    }
}
