use shared::models::{User, UserFragment, UserId};
use std::collections::HashMap;

/// Users known to the client, enriched monotonically from every response
/// that carries user details.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserDirectory {
    users: HashMap<UserId, User>,
}

impl UserDirectory {
    /// Looks up a user.
    #[must_use]
    pub fn get(&self, id: UserId) -> Option<&User> {
        self.users.get(&id)
    }

    /// Whether `id` is known.
    #[must_use]
    pub fn contains(&self, id: UserId) -> bool {
        self.users.contains_key(&id)
    }

    /// Non-empty display name of `id`, if known.
    #[must_use]
    pub fn display_name(&self, id: UserId) -> Option<String> {
        self.get(id)
            .map(User::display_name)
            .filter(|name| !name.is_empty())
    }

    /// Merges a fragment for `id`, creating the user if needed.
    ///
    /// Returns whether the directory changed.
    pub fn merge_fragment(&mut self, id: UserId, fragment: &UserFragment) -> bool {
        match self.users.get_mut(&id) {
            Some(user) => user.merge(fragment),
            None => {
                self.users.insert(id, User::from_fragment(id, fragment));
                true
            }
        }
    }

    /// Merges a full user record. Empty fields never clear known values.
    pub fn merge_user(&mut self, user: &User) -> bool {
        self.merge_fragment(user.id, &user.to_fragment())
    }

    /// Merges a directory listing. Returns whether anything changed.
    pub fn merge_all<'a>(&mut self, users: impl IntoIterator<Item = &'a User>) -> bool {
        users
            .into_iter()
            .fold(false, |changed, user| self.merge_user(user) || changed)
    }

    /// Every known user, ordered by display name then id.
    #[must_use]
    pub fn sorted(&self) -> Vec<User> {
        let mut users: Vec<User> = self.users.values().cloned().collect();
        users.sort_by(|a, b| {
            a.display_name()
                .to_lowercase()
                .cmp(&b.display_name().to_lowercase())
                .then(a.id.cmp(&b.id))
        });
        users
    }

    /// Number of known users.
    #[must_use]
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Whether no user is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}
