use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::{UserFragment, UserId};
use crate::dates::parse_optional_date;

/// Membership entry as returned by the member listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MemberRecord {
    /// Member id.
    #[serde(default)]
    pub user_id: Option<UserId>,
    /// `true` for administrators.
    #[serde(default)]
    pub role: Option<bool>,
    /// Whether the member has left.
    #[serde(default)]
    pub has_left: Option<bool>,
    /// Raw departure timestamp.
    #[serde(default)]
    pub left_at: Option<String>,
    /// Family name.
    #[serde(default)]
    pub user_nom: Option<String>,
    /// Given names.
    #[serde(default)]
    pub user_prenoms: Option<String>,
    /// Login name.
    #[serde(default)]
    pub user_login: Option<String>,
}

impl MemberRecord {
    /// Maps the record into a membership entry. Records without a user id
    /// are skipped.
    #[must_use]
    pub fn to_entry(&self) -> Option<MembershipEntry> {
        let user_id = self.user_id?;
        Some(MembershipEntry {
            user_id,
            is_admin: self.role.unwrap_or(false),
            has_left: self.has_left.unwrap_or(false),
            left_at: parse_optional_date(self.left_at.as_deref()),
            fragment: UserFragment {
                login: self.user_login.clone(),
                last_name: self.user_nom.clone(),
                first_names: self.user_prenoms.clone(),
            },
        })
    }
}

/// Membership of one user in one conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipEntry {
    /// Member id.
    pub user_id: UserId,
    /// Administrator flag.
    pub is_admin: bool,
    /// Whether the member has left.
    pub has_left: bool,
    /// When the member left.
    pub left_at: Option<NaiveDateTime>,
    /// Name and login carried alongside the entry.
    pub fragment: UserFragment,
}

/// A member who has left a group, kept for display.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FormerMember {
    /// Member id.
    pub user_id: UserId,
    /// When the member left.
    pub left_at: Option<NaiveDateTime>,
}
