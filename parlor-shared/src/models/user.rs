use serde::{Deserialize, Serialize};

use super::{UserId, null_as_default};

/// Represents a user known to the client.
///
/// Only `id` is authoritative. The other fields are enriched from message
/// authorship, membership listings and the directory listing, see
/// [`User::merge`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    /// Server-assigned identifier.
    pub id: UserId,

    /// Login name.
    #[serde(default, deserialize_with = "null_as_default")]
    pub login: String,

    /// Family name.
    #[serde(rename = "nom", default, deserialize_with = "null_as_default")]
    pub last_name: String,

    /// Given names.
    #[serde(rename = "prenoms", default, deserialize_with = "null_as_default")]
    pub first_names: String,
}

impl User {
    /// Creates a user with every descriptive field empty.
    #[must_use]
    pub fn bare(id: UserId) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    /// Builds a user from a fragment, leaving missing fields empty.
    #[must_use]
    pub fn from_fragment(id: UserId, fragment: &UserFragment) -> Self {
        let mut user = Self::bare(id);
        user.merge(fragment);
        user
    }

    /// `"{first names} {last name}"`, trimmed. Empty when neither is known.
    #[must_use]
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_names.trim(), self.last_name.trim())
            .trim()
            .to_string()
    }

    /// Name shown above a group message: the first names, else the login.
    #[must_use]
    pub fn short_name(&self) -> Option<&str> {
        [self.first_names.trim(), self.login.trim()]
            .into_iter()
            .find(|candidate| !candidate.is_empty())
    }

    /// Merge a fragment into this user.
    ///
    /// Non-empty fragment values overwrite; empty or missing values never
    /// clear a known field. Returns whether anything changed.
    pub fn merge(&mut self, fragment: &UserFragment) -> bool {
        let mut changed = false;
        for (slot, value) in [
            (&mut self.login, fragment.login.as_deref()),
            (&mut self.last_name, fragment.last_name.as_deref()),
            (&mut self.first_names, fragment.first_names.as_deref()),
        ] {
            if let Some(value) = value.map(str::trim).filter(|value| !value.is_empty())
                && slot.as_str() != value
            {
                *slot = value.to_string();
                changed = true;
            }
        }
        changed
    }

    /// The descriptive fields of this user as a fragment.
    #[must_use]
    pub fn to_fragment(&self) -> UserFragment {
        UserFragment {
            login: Some(self.login.clone()),
            last_name: Some(self.last_name.clone()),
            first_names: Some(self.first_names.clone()),
        }
    }
}

/// Partial user information carried by a non-directory response.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserFragment {
    /// Login name, if carried.
    #[serde(default)]
    pub login: Option<String>,

    /// Family name, if carried.
    #[serde(rename = "nom", default)]
    pub last_name: Option<String>,

    /// Given names, if carried.
    #[serde(rename = "prenoms", default)]
    pub first_names: Option<String>,
}

impl UserFragment {
    /// Whether the fragment carries at least one non-empty value.
    #[must_use]
    pub fn is_informative(&self) -> bool {
        [&self.login, &self.last_name, &self.first_names]
            .into_iter()
            .any(|value| value.as_deref().is_some_and(|value| !value.trim().is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment(login: &str, last: &str, first: &str) -> UserFragment {
        UserFragment {
            login: Some(login.to_string()),
            last_name: Some(last.to_string()),
            first_names: Some(first.to_string()),
        }
    }

    #[test]
    fn test_user_wire_names() {
        let user: User =
            serde_json::from_str(r#"{"id": 2, "login": "asmith", "nom": "Smith", "prenoms": "Alice"}"#)
                .unwrap();
        assert_eq!(user.id, 2);
        assert_eq!(user.login, "asmith");
        assert_eq!(user.last_name, "Smith");
        assert_eq!(user.first_names, "Alice");
        assert_eq!(user.display_name(), "Alice Smith");
    }

    #[test]
    fn test_user_tolerates_null_fields() {
        let user: User = serde_json::from_str(r#"{"id": 7, "login": null, "nom": null}"#).unwrap();
        assert_eq!(user, User::bare(7));
        assert_eq!(user.display_name(), "");
        assert_eq!(user.short_name(), None);
    }

    #[test]
    fn test_display_name_trims_missing_parts() {
        let mut user = User::bare(1);
        user.last_name = "Smith".into();
        assert_eq!(user.display_name(), "Smith");

        user.first_names = "  Alice ".into();
        assert_eq!(user.display_name(), "Alice Smith");
        assert_eq!(user.short_name(), Some("Alice"));
    }

    #[test]
    fn test_merge_never_clears_known_values() {
        let mut user = User::from_fragment(2, &fragment("asmith", "Smith", "Alice"));

        let changed = user.merge(&fragment("", "", "   "));
        assert!(!changed);
        assert_eq!(user.display_name(), "Alice Smith");
        assert_eq!(user.login, "asmith");

        let changed = user.merge(&UserFragment::default());
        assert!(!changed);
        assert_eq!(user.login, "asmith");
    }

    #[test]
    fn test_merge_overwrites_with_fresher_values() {
        let mut user = User::from_fragment(2, &fragment("asmith", "Smith", "Alice"));

        let changed = user.merge(&UserFragment {
            last_name: Some("Jones".into()),
            ..UserFragment::default()
        });

        assert!(changed);
        assert_eq!(user.display_name(), "Alice Jones");
        assert_eq!(user.login, "asmith");
        let same = user.to_fragment();
        assert!(!user.merge(&same));
    }

    #[test]
    fn test_fragment_informative() {
        assert!(!UserFragment::default().is_informative());
        assert!(!fragment("", " ", "").is_informative());
        assert!(fragment("", "Smith", "").is_informative());
    }
}
