//! Application of fetched membership lists to cached conversations.

use shared::models::{
    Conversation, ConversationId, FormerMember, MemberRecord, MembershipEntry, UserId,
};
use tracing::debug;

use crate::{
    cache::{CacheState, ChatEvent},
    error::{ChatError, ChatResult},
    reconcile::recompute_private_title,
};

/// What applying a membership list did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipOutcome {
    /// The conversation was updated.
    Applied {
        /// Whether a private title was resolved on the way.
        title_resolved: bool,
    },
    /// The list was empty; the cached entry was left as is.
    Unchanged,
    /// The conversation is not cached.
    NotCached,
}

/// Applies a membership list to a cached conversation.
///
/// Active members become participants, active admins become admins, and
/// members who left become former members. Name fragments enrich the user
/// directory, and a private conversation's title is recomputed from its
/// single counterpart's current name. Returns the outcome and the events to broadcast.
pub fn apply_membership(
    state: &mut CacheState,
    id: ConversationId,
    records: &[MemberRecord],
    current_user: UserId,
) -> (MembershipOutcome, Vec<ChatEvent>) {
    if state.conversation(id).is_none() {
        debug!(conversation = %id, "membership for uncached conversation ignored");
        return (MembershipOutcome::NotCached, Vec::new());
    }

    let entries: Vec<MembershipEntry> = records.iter().filter_map(MemberRecord::to_entry).collect();
    if entries.is_empty() {
        debug!(conversation = %id, "empty membership list, keeping cached members");
        return (MembershipOutcome::Unchanged, Vec::new());
    }

    let mut events = Vec::new();
    let users_changed = entries.iter().fold(false, |changed, entry| {
        state.users.merge_fragment(entry.user_id, &entry.fragment) || changed
    });
    if users_changed {
        events.push(ChatEvent::UsersChanged);
    }

    let CacheState {
        conversations,
        users,
        titles,
        ..
    } = state;
    let Some(conversation) = conversations.iter_mut().find(|entry| entry.id == id) else {
        return (MembershipOutcome::NotCached, events);
    };

    let (active, former): (Vec<&MembershipEntry>, Vec<&MembershipEntry>) =
        entries.iter().partition(|entry| !entry.has_left);

    conversation.participant_ids = active.iter().map(|entry| entry.user_id).collect();
    conversation.admin_ids = active
        .iter()
        .filter(|entry| entry.is_admin)
        .map(|entry| entry.user_id)
        .collect();
    conversation.former_members = former
        .iter()
        .map(|entry| FormerMember {
            user_id: entry.user_id,
            left_at: entry.left_at,
        })
        .collect();
    if let Some(own) = entries.iter().find(|entry| entry.user_id == current_user) {
        conversation.current_user_has_left = Some(own.has_left);
    }

    let title_resolved = recompute_private_title(conversation, users, titles, current_user);
    debug!(
        conversation = %id,
        participants = conversation.participant_ids.len(),
        admins = conversation.admin_ids.len(),
        former = conversation.former_members.len(),
        title_resolved,
        "membership applied"
    );

    events.push(ChatEvent::ConversationUpdated(id));
    (MembershipOutcome::Applied { title_resolved }, events)
}

/// Rejects a demotion that would leave the group without an admin.
///
/// # Errors
/// Returns [`ChatError::Validation`] when `target` is not an admin or is the
/// last one.
pub fn check_demotion(conversation: &Conversation, target: UserId) -> ChatResult<()> {
    if !conversation.is_admin(target) {
        return Err(ChatError::validation("This member is not an admin"));
    }
    if conversation.admin_ids.len() <= 1 {
        return Err(ChatError::validation("A group must keep at least one admin"));
    }
    Ok(())
}

/// Rejects a removal that would leave the group without an admin.
///
/// # Errors
/// Returns [`ChatError::Validation`] when `target` is the last admin.
pub fn check_removal(conversation: &Conversation, target: UserId) -> ChatResult<()> {
    if conversation.is_admin(target) && conversation.admin_ids.len() <= 1 {
        return Err(ChatError::validation("The last admin cannot be removed"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::reconcile_conversations;
    use shared::models::{ConversationSummary, PRIVATE_TITLE_PLACEHOLDER};

    const ME: UserId = 5;

    fn summary(id: i64, title: &str, code: &str) -> ConversationSummary {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "titre": title,
            "typeConversationCode": code,
        }))
        .unwrap()
    }

    fn member(user_id: UserId, admin: bool, has_left: bool) -> MemberRecord {
        MemberRecord {
            user_id: Some(user_id),
            role: Some(admin),
            has_left: Some(has_left),
            ..MemberRecord::default()
        }
    }

    fn named(user_id: UserId, first: &str, last: &str) -> MemberRecord {
        MemberRecord {
            user_prenoms: Some(first.into()),
            user_nom: Some(last.into()),
            ..member(user_id, false, false)
        }
    }

    fn cached(summaries: &[ConversationSummary]) -> CacheState {
        let mut state = CacheState::default();
        reconcile_conversations(&mut state, summaries, ME);
        state
    }

    #[test]
    fn test_group_membership_is_partitioned() {
        let mut state = cached(&[summary(2, "Team", "GROUP")]);
        let id = ConversationId::Server(2);
        let records = [
            member(ME, true, false),
            member(3, false, false),
            MemberRecord {
                left_at: Some("14/01/2026 09:30:00".into()),
                ..member(4, true, true)
            },
        ];

        let (outcome, events) = apply_membership(&mut state, id, &records, ME);

        assert_eq!(
            outcome,
            MembershipOutcome::Applied {
                title_resolved: false
            }
        );
        let group = state.conversation(id).unwrap();
        assert_eq!(group.participant_ids, vec![ME, 3]);
        assert_eq!(group.admin_ids, vec![ME]);
        assert_eq!(group.former_members.len(), 1);
        assert_eq!(group.former_members[0].user_id, 4);
        assert!(group.former_members[0].left_at.is_some());
        assert_eq!(group.current_user_has_left, Some(false));
        assert!(events.contains(&ChatEvent::ConversationUpdated(id)));
    }

    #[test]
    fn test_private_membership_resolves_title_from_fragments() {
        let mut state = cached(&[summary(1, "PRIVATE", "PRIVATE")]);
        let id = ConversationId::Server(1);

        let (outcome, events) = apply_membership(
            &mut state,
            id,
            &[named(ME, "Emma", "Wilson"), named(2, "Alice", "Smith")],
            ME,
        );

        assert_eq!(
            outcome,
            MembershipOutcome::Applied {
                title_resolved: true
            }
        );
        assert_eq!(state.conversation(id).unwrap().title, "Alice Smith");
        assert_eq!(state.titles.get(id), Some("Alice Smith"));
        assert_eq!(
            events,
            vec![ChatEvent::UsersChanged, ChatEvent::ConversationUpdated(id)]
        );
    }

    #[test]
    fn test_fuller_membership_name_replaces_partial_title() {
        let mut state = cached(&[summary(1, "PRIVATE", "PRIVATE")]);
        let id = ConversationId::Server(1);
        let first_names_only = MemberRecord {
            user_prenoms: Some("Carol".into()),
            ..member(3, false, false)
        };

        apply_membership(&mut state, id, &[member(ME, false, false), first_names_only], ME);
        assert_eq!(state.conversation(id).unwrap().title, "Carol");

        let (outcome, _) = apply_membership(
            &mut state,
            id,
            &[member(ME, false, false), named(3, "Carol", "Jones")],
            ME,
        );

        assert_eq!(
            outcome,
            MembershipOutcome::Applied {
                title_resolved: true
            }
        );
        assert_eq!(state.conversation(id).unwrap().title, "Carol Jones");
        assert_eq!(state.titles.get(id), Some("Carol Jones"));
    }

    #[test]
    fn test_applying_twice_is_idempotent() {
        let mut state = cached(&[summary(1, "PRIVATE", "PRIVATE")]);
        let id = ConversationId::Server(1);
        let records = [named(ME, "Emma", "Wilson"), named(2, "Alice", "Smith")];

        apply_membership(&mut state, id, &records, ME);
        let first = state.conversation(id).cloned();
        let (outcome, events) = apply_membership(&mut state, id, &records, ME);

        assert_eq!(state.conversation(id).cloned(), first);
        assert_eq!(
            outcome,
            MembershipOutcome::Applied {
                title_resolved: false
            }
        );
        assert_eq!(events, vec![ChatEvent::ConversationUpdated(id)]);
    }

    #[test]
    fn test_unknown_counterpart_keeps_placeholder() {
        let mut state = cached(&[summary(1, "PRIVATE", "PRIVATE")]);
        let id = ConversationId::Server(1);

        apply_membership(&mut state, id, &[member(ME, false, false), member(2, false, false)], ME);

        let conversation = state.conversation(id).unwrap();
        assert_eq!(conversation.title, PRIVATE_TITLE_PLACEHOLDER);
        assert_eq!(conversation.participant_ids, vec![ME, 2]);
    }

    #[test]
    fn test_extra_counterparts_are_unsupported() {
        let mut state = cached(&[summary(1, "PRIVATE", "PRIVATE")]);
        let id = ConversationId::Server(1);

        let (outcome, _) = apply_membership(
            &mut state,
            id,
            &[named(ME, "Emma", "Wilson"), named(2, "Alice", "Smith"), named(3, "Bob", "Martin")],
            ME,
        );

        assert_eq!(
            outcome,
            MembershipOutcome::Applied {
                title_resolved: false
            }
        );
        assert_eq!(state.conversation(id).unwrap().title, PRIVATE_TITLE_PLACEHOLDER);
    }

    #[test]
    fn test_empty_list_leaves_entry_unchanged() {
        let mut state = cached(&[summary(2, "Team", "GROUP")]);
        let id = ConversationId::Server(2);
        apply_membership(&mut state, id, &[member(ME, true, false)], ME);

        let (outcome, events) = apply_membership(&mut state, id, &[], ME);

        assert_eq!(outcome, MembershipOutcome::Unchanged);
        assert!(events.is_empty());
        assert_eq!(state.conversation(id).unwrap().admin_ids, vec![ME]);
    }

    #[test]
    fn test_uncached_conversation_is_a_no_op() {
        let mut state = CacheState::default();
        let (outcome, events) = apply_membership(
            &mut state,
            ConversationId::Server(8),
            &[named(2, "Alice", "Smith")],
            ME,
        );
        assert_eq!(outcome, MembershipOutcome::NotCached);
        assert!(events.is_empty());
        assert!(state.users.is_empty());
    }

    #[test]
    fn test_current_user_left_flag() {
        let mut state = cached(&[summary(2, "Team", "GROUP")]);
        let id = ConversationId::Server(2);
        apply_membership(&mut state, id, &[member(3, true, false), member(ME, false, true)], ME);

        let group = state.conversation(id).unwrap();
        assert_eq!(group.current_user_has_left, Some(true));
        assert_eq!(group.participant_ids, vec![3]);
    }

    #[test]
    fn test_admin_invariant_checks() {
        let mut state = cached(&[summary(2, "Team", "GROUP")]);
        let id = ConversationId::Server(2);
        apply_membership(
            &mut state,
            id,
            &[member(ME, true, false), member(3, false, false)],
            ME,
        );
        let group = state.conversation(id).unwrap().clone();

        assert!(matches!(check_demotion(&group, ME), Err(ChatError::Validation(_))));
        assert!(matches!(check_demotion(&group, 3), Err(ChatError::Validation(_))));
        assert!(matches!(check_removal(&group, ME), Err(ChatError::Validation(_))));
        assert!(check_removal(&group, 3).is_ok());

        let mut two_admins = group;
        two_admins.admin_ids.push(3);
        assert!(check_demotion(&two_admins, ME).is_ok());
        assert!(check_removal(&two_admins, ME).is_ok());
    }
}
