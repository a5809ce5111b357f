//! Day-segmented message timelines.

use chrono::{NaiveDate, NaiveDateTime};
use shared::{
    dates::{UNKNOWN_DATE_LABEL, day_label, message_time_label},
    models::{Message, MessageKind, UserId},
};

use crate::directory::UserDirectory;

/// Name shown for a group message whose author is unknown.
const UNKNOWN_SENDER: &str = "User";

/// How a timeline is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimelineOptions {
    /// Insert day separators. Without them each message carries its day in
    /// its time label.
    pub day_separators: bool,
    /// Label each message with its author (group conversations).
    pub show_senders: bool,
}

impl Default for TimelineOptions {
    fn default() -> Self {
        Self {
            day_separators: true,
            show_senders: false,
        }
    }
}

/// A message ready for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageView {
    /// Server id; `None` while pending.
    pub id: Option<i64>,
    /// Author id.
    pub sender_id: Option<UserId>,
    /// Author label, for group conversations.
    pub sender_name: Option<String>,
    /// Text content.
    pub content: Option<String>,
    /// Image URL.
    pub image_url: Option<String>,
    /// Content kind.
    pub kind: MessageKind,
    /// Sent by the current user.
    pub is_own: bool,
    /// Not acknowledged by the server yet.
    pub pending: bool,
    /// Time shown under the message.
    pub time_label: String,
}

/// One row of a rendered timeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimelineEntry {
    /// Marker opening a calendar day.
    DaySeparator {
        /// `Today`, `Yesterday`, a weekday, a date, or `Unknown date`.
        label: String,
    },
    /// A message.
    Message(MessageView),
}

/// Visible messages in display order: hidden ones dropped, then a stable
/// ascending sort on creation time with unknown times first.
#[must_use]
pub fn visible_in_order(messages: &[Message]) -> Vec<&Message> {
    let mut visible: Vec<&Message> = messages.iter().filter(|message| !message.hidden).collect();
    visible.sort_by_key(|message| message.created_at);
    visible
}

/// Builds the render sequence for a conversation.
///
/// Deterministic for a fixed message list, directory and `now`.
#[must_use]
pub fn build_timeline(
    messages: &[Message],
    users: &UserDirectory,
    current_user: UserId,
    options: TimelineOptions,
    now: NaiveDateTime,
) -> Vec<TimelineEntry> {
    let today = now.date();
    let mut entries = Vec::with_capacity(messages.len() * 2);
    let mut previous_day: Option<Option<NaiveDate>> = None;

    for message in visible_in_order(messages) {
        let day = message.created_at.map(|at| at.date());
        if options.day_separators && previous_day != Some(day) {
            let label = day.map_or_else(|| UNKNOWN_DATE_LABEL.to_string(), |day| day_label(day, today));
            entries.push(TimelineEntry::DaySeparator { label });
        }
        previous_day = Some(day);

        let is_own = message.sender_id == Some(current_user);
        let sender_name = (options.show_senders && !is_own).then(|| sender_label(message.sender_id, users));

        entries.push(TimelineEntry::Message(MessageView {
            id: message.id,
            sender_id: message.sender_id,
            sender_name,
            content: message.content.clone(),
            image_url: message.image_url.clone(),
            kind: message.kind,
            is_own,
            pending: message.is_pending(),
            time_label: message_time_label(message.created_at, options.day_separators, now),
        }));
    }

    entries
}

fn sender_label(sender: Option<UserId>, users: &UserDirectory) -> String {
    sender
        .and_then(|id| users.get(id))
        .and_then(|user| user.short_name().map(str::to_string))
        .unwrap_or_else(|| UNKNOWN_SENDER.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::{ConversationId, User};

    const ME: UserId = 5;

    fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, day)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn now() -> NaiveDateTime {
        at(19, 18, 0)
    }

    fn message(id: i64, sender: UserId, text: &str, created_at: Option<NaiveDateTime>) -> Message {
        Message {
            id: Some(id),
            conversation_id: ConversationId::Server(1),
            sender_id: Some(sender),
            content: Some(text.to_string()),
            image_url: None,
            kind: MessageKind::Text,
            created_at,
            hidden: false,
        }
    }

    fn labels(entries: &[TimelineEntry]) -> Vec<String> {
        entries
            .iter()
            .map(|entry| match entry {
                TimelineEntry::DaySeparator { label } => format!("[{label}]"),
                TimelineEntry::Message(view) => {
                    format!("{} {}", view.content.clone().unwrap_or_default(), view.time_label)
                }
            })
            .collect()
    }

    #[test]
    fn test_separators_between_calendar_days() {
        let messages = vec![
            message(3, 2, "today", Some(at(19, 9, 15))),
            message(1, 2, "old", Some(at(1, 8, 0))),
            message(2, ME, "yesterday", Some(at(18, 23, 59))),
            message(4, ME, "later today", Some(at(19, 10, 0))),
            message(5, 2, "friday", Some(at(16, 12, 30))),
        ];

        let entries = build_timeline(
            &messages,
            &UserDirectory::default(),
            ME,
            TimelineOptions::default(),
            now(),
        );

        assert_eq!(
            labels(&entries),
            vec![
                "[01/10/2026]",
                "old 08:00",
                "[Friday]",
                "friday 12:30",
                "[Yesterday]",
                "yesterday 23:59",
                "[Today]",
                "today 09:15",
                "later today 10:00",
            ]
        );
    }

    #[test]
    fn test_hidden_messages_never_render() {
        let mut first = message(1, 2, "secret", Some(at(17, 9, 0)));
        first.hidden = true;
        let mut last = message(3, 2, "also secret", Some(at(19, 9, 0)));
        last.hidden = true;
        let messages = vec![first, message(2, 2, "visible", Some(at(19, 8, 0))), last];

        let entries = build_timeline(
            &messages,
            &UserDirectory::default(),
            ME,
            TimelineOptions::default(),
            now(),
        );

        assert_eq!(labels(&entries), vec!["[Today]", "visible 08:00"]);
    }

    #[test]
    fn test_missing_timestamps_share_an_unknown_bucket_first() {
        let messages = vec![
            message(1, 2, "dated", Some(at(19, 8, 0))),
            message(2, 2, "undated a", None),
            message(3, 2, "undated b", None),
        ];

        let entries = build_timeline(
            &messages,
            &UserDirectory::default(),
            ME,
            TimelineOptions::default(),
            now(),
        );

        assert_eq!(
            labels(&entries),
            vec![
                "[Unknown date]",
                "undated a ",
                "undated b ",
                "[Today]",
                "dated 08:00",
            ]
        );
    }

    #[test]
    fn test_rebuilding_is_deterministic() {
        let messages = vec![
            message(2, 2, "b", Some(at(18, 9, 0))),
            message(1, 2, "a", Some(at(18, 9, 0))),
            message(3, ME, "c", None),
        ];
        let users = UserDirectory::default();

        let first = build_timeline(&messages, &users, ME, TimelineOptions::default(), now());
        let second = build_timeline(&messages, &users, ME, TimelineOptions::default(), now());

        assert_eq!(first, second);
        // Equal timestamps keep their fetch order.
        assert_eq!(labels(&first)[3], "b 09:00");
        assert_eq!(labels(&first)[4], "a 09:00");
    }

    #[test]
    fn test_without_separators_labels_carry_the_day() {
        let messages = vec![
            message(1, 2, "old", Some(at(17, 9, 5))),
            message(2, 2, "now", Some(at(19, 9, 5))),
        ];

        let entries = build_timeline(
            &messages,
            &UserDirectory::default(),
            ME,
            TimelineOptions {
                day_separators: false,
                show_senders: false,
            },
            now(),
        );

        assert_eq!(labels(&entries), vec!["old Saturday 09:05", "now 09:05"]);
    }

    #[test]
    fn test_group_sender_names_and_ownership() {
        let mut users = UserDirectory::default();
        users.merge_user(&User {
            id: 2,
            login: "asmith".into(),
            last_name: "Smith".into(),
            first_names: "Alice".into(),
        });
        let mut pending = message(0, ME, "sending", Some(at(19, 9, 2)));
        pending.id = None;
        let messages = vec![
            message(1, 2, "hi", Some(at(19, 9, 0))),
            message(2, 7, "who am i", Some(at(19, 9, 1))),
            pending,
        ];

        let entries = build_timeline(
            &messages,
            &users,
            ME,
            TimelineOptions {
                day_separators: true,
                show_senders: true,
            },
            now(),
        );

        let views: Vec<&MessageView> = entries
            .iter()
            .filter_map(|entry| match entry {
                TimelineEntry::Message(view) => Some(view),
                TimelineEntry::DaySeparator { .. } => None,
            })
            .collect();
        assert_eq!(views[0].sender_name.as_deref(), Some("Alice"));
        assert_eq!(views[1].sender_name.as_deref(), Some("User"));
        assert_eq!(views[2].sender_name, None);
        assert!(views[2].is_own);
        assert!(views[2].pending);
        assert!(!views[0].pending);
    }
}
