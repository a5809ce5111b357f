//! Login, registration and the persisted session boundary.

use directories::BaseDirs;
use shared::models::{RegisterPayload, User};
use std::{
    fmt, fs,
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
};
use tracing::{info, instrument, warn};

use crate::{
    error::{ChatError, ChatResult},
    repository::ChatRepository,
};

/// Key-value store holding the signed-in user between runs.
pub trait SessionStore: Send + Sync {
    /// The persisted user, if any.
    ///
    /// # Errors
    /// Returns [`ChatError::Session`] when the store exists but cannot be read.
    fn load(&self) -> ChatResult<Option<User>>;

    /// Persists `user` as the current user.
    ///
    /// # Errors
    /// Returns [`ChatError::Session`] when the store cannot be written.
    fn save(&self, user: &User) -> ChatResult<()>;

    /// Forgets the current user. Returns whether one was stored.
    ///
    /// # Errors
    /// Returns [`ChatError::Session`] when the store cannot be removed.
    fn clear(&self) -> ChatResult<bool>;
}

/// JSON file under the platform config directory.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    /// Store backed by `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<config dir>/parlor/session.json`, or `./session.json` when the
    /// platform has no config directory.
    #[must_use]
    pub fn default_path() -> PathBuf {
        BaseDirs::new().map_or_else(
            || PathBuf::from("./session.json"),
            |dirs| dirs.config_dir().join("parlor").join("session.json"),
        )
    }

    /// Location of the session file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileSessionStore {
    fn default() -> Self {
        Self::new(Self::default_path())
    }
}

fn session_error(action: &str, path: &Path, err: impl fmt::Display) -> ChatError {
    ChatError::Session(format!("failed to {action} {}: {err}", path.display()))
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> ChatResult<Option<User>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content =
            fs::read_to_string(&self.path).map_err(|err| session_error("read", &self.path, err))?;
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|err| session_error("parse", &self.path, err))
    }

    fn save(&self, user: &User) -> ChatResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|err| session_error("create", parent, err))?;
        }
        let content = serde_json::to_string_pretty(user)?;
        fs::write(&self.path, content).map_err(|err| session_error("write", &self.path, err))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = fs::Permissions::from_mode(0o600);
            fs::set_permissions(&self.path, permissions)
                .map_err(|err| session_error("protect", &self.path, err))?;
        }

        Ok(())
    }

    fn clear(&self) -> ChatResult<bool> {
        if !self.path.exists() {
            return Ok(false);
        }
        fs::remove_file(&self.path).map_err(|err| session_error("remove", &self.path, err))?;
        Ok(true)
    }
}

/// Process-local store, for tests and one-shot runs.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    user: Mutex<Option<User>>,
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> ChatResult<Option<User>> {
        Ok(self.user.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    fn save(&self, user: &User) -> ChatResult<()> {
        *self.user.lock().unwrap_or_else(PoisonError::into_inner) = Some(user.clone());
        Ok(())
    }

    fn clear(&self) -> ChatResult<bool> {
        Ok(self
            .user
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some())
    }
}

/// Signs in with an existing login and persists the user.
///
/// # Errors
/// [`ChatError::Validation`] for a blank login (no network call), an
/// application error for an unknown login, or whatever the repository or the
/// store report.
#[instrument(name = "auth.login", skip(repository, store), err)]
pub async fn login(
    repository: &dyn ChatRepository,
    store: &dyn SessionStore,
    login: &str,
) -> ChatResult<User> {
    let login = login.trim();
    if login.is_empty() {
        return Err(ChatError::validation("Please enter your login"));
    }

    let Some(user) = repository.login(login).await? else {
        warn!(login, "unknown login");
        return Err(ChatError::application("Unknown login"));
    };
    store.save(&user)?;
    info!(user = user.id, "signed in");
    Ok(user)
}

/// Creates an account and persists the new user.
///
/// # Errors
/// [`ChatError::Validation`] when a field is blank (no network call), or
/// whatever the repository or the store report.
#[instrument(name = "auth.register", skip(repository, store, payload), fields(login = %payload.login), err)]
pub async fn register(
    repository: &dyn ChatRepository,
    store: &dyn SessionStore,
    payload: RegisterPayload,
) -> ChatResult<User> {
    let payload = RegisterPayload {
        last_name: payload.last_name.trim().to_string(),
        first_names: payload.first_names.trim().to_string(),
        login: payload.login.trim().to_string(),
    };
    if payload.last_name.is_empty() || payload.first_names.is_empty() || payload.login.is_empty() {
        return Err(ChatError::validation("Please fill in every required field"));
    }

    let user = repository.register(payload).await?;
    store.save(&user)?;
    info!(user = user.id, "account created");
    Ok(user)
}

/// Forgets the signed-in user. Returns whether one was stored.
///
/// # Errors
/// Whatever the store reports.
pub fn logout(store: &dyn SessionStore) -> ChatResult<bool> {
    let cleared = store.clear()?;
    if cleared {
        info!("signed out");
    }
    Ok(cleared)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MockChatRepository;
    use tempfile::TempDir;

    fn alice() -> User {
        User {
            id: 2,
            login: "asmith".into(),
            last_name: "Smith".into(),
            first_names: "Alice".into(),
        }
    }

    #[test]
    fn test_file_store_round_trip_and_clear() {
        let dir = TempDir::new().unwrap();
        let store = FileSessionStore::new(dir.path().join("nested").join("session.json"));

        assert_eq!(store.load().unwrap(), None);
        store.save(&alice()).unwrap();
        assert_eq!(store.load().unwrap(), Some(alice()));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(store.path()).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }

        assert!(store.clear().unwrap());
        assert!(!store.clear().unwrap());
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn test_file_store_reports_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "not json").unwrap();

        let err = FileSessionStore::new(&path).load().unwrap_err();
        assert!(matches!(err, ChatError::Session(_)));
    }

    #[test]
    fn test_default_path_is_under_parlor() {
        let path = FileSessionStore::default_path();
        assert!(path.ends_with("session.json"));
    }

    #[tokio::test]
    async fn test_login_persists_user() {
        let mut repository = MockChatRepository::new();
        repository
            .expect_login()
            .withf(|login| login == "asmith")
            .times(1)
            .returning(|_| Ok(Some(alice())));
        let store = MemorySessionStore::default();

        let user = login(&repository, &store, "  asmith ").await.unwrap();

        assert_eq!(user, alice());
        assert_eq!(store.load().unwrap(), Some(alice()));
    }

    #[tokio::test]
    async fn test_blank_login_never_reaches_the_network() {
        let mut repository = MockChatRepository::new();
        repository.expect_login().never();
        let store = MemorySessionStore::default();

        let err = login(&repository, &store, "   ").await.unwrap_err();

        assert!(matches!(err, ChatError::Validation(_)));
        assert_eq!(store.load().unwrap(), None);
    }

    #[tokio::test]
    async fn test_unknown_login_is_an_application_error() {
        let mut repository = MockChatRepository::new();
        repository.expect_login().returning(|_| Ok(None));
        let store = MemorySessionStore::default();

        let err = login(&repository, &store, "ghost").await.unwrap_err();

        assert_eq!(err.user_message(), "Unknown login");
        assert_eq!(store.load().unwrap(), None);
    }

    #[tokio::test]
    async fn test_register_validates_then_persists() {
        let mut repository = MockChatRepository::new();
        repository
            .expect_register()
            .withf(|payload| payload.login == "asmith" && payload.first_names == "Alice")
            .times(1)
            .returning(|_| Ok(alice()));
        let store = MemorySessionStore::default();

        let missing = RegisterPayload {
            last_name: "Smith".into(),
            first_names: " ".into(),
            login: "asmith".into(),
        };
        assert!(matches!(
            register(&repository, &store, missing).await,
            Err(ChatError::Validation(_))
        ));

        let complete = RegisterPayload {
            last_name: "Smith".into(),
            first_names: " Alice".into(),
            login: "asmith ".into(),
        };
        assert_eq!(register(&repository, &store, complete).await.unwrap(), alice());
        assert!(logout(&store).unwrap());
        assert!(!logout(&store).unwrap());
    }
}
