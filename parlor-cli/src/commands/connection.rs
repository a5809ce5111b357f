//! Shared plumbing for commands that talk to the backend: configuration,
//! tracing, the session store, and notice output.

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result, anyhow};
use clap::Args;
use client::{
    ChatCache, ChatEvent, ChatSession, FileSessionStore, HttpGateway, SessionStore,
};
use shared::config::ClientConfig;
use tokio::sync::broadcast::{Receiver, error::TryRecvError};
use tracing::{debug, level_filters::LevelFilter};
use tracing_subscriber::EnvFilter;
use url::Url;

/// Connection options accepted by every networked command.
#[derive(Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    /// Path to the configuration file (yaml or json)
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Base URL of the chat API, overriding the configuration
    #[arg(long)]
    pub api_url: Option<Url>,

    /// Session file to use instead of the one in the platform config directory
    #[arg(long)]
    pub session_file: Option<PathBuf>,
}

impl ConnectionArgs {
    /// Resolves the configuration and starts tracing at its log level.
    pub fn load_config(&self) -> Result<ClientConfig> {
        let config = ClientConfig::load_config(self.config.clone(), self.api_url.clone())
            .map_err(|err| anyhow!("failed to load configuration: {err}"))?;
        initialize_tracing(&config.log_level);
        debug!(api_url = %config.api_url, lang = %config.lang, "configuration loaded");
        Ok(config)
    }

    /// The session store selected by the options.
    pub fn store(&self) -> FileSessionStore {
        self.session_file
            .clone()
            .map_or_else(FileSessionStore::default, FileSessionStore::new)
    }
}

/// Initializes the tracing subscriber on stderr. `RUST_LOG` wins over the
/// configured level.
pub fn initialize_tracing(level: &str) {
    let default_level = level.parse::<LevelFilter>().unwrap_or(LevelFilter::WARN);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::builder()
            .with_default_directive(default_level.into())
            .from_env_lossy()
    });

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .ok();
}

/// A signed-in session plus the receiver its notices arrive on.
pub struct Connected {
    pub session: ChatSession,
    pub events: Receiver<ChatEvent>,
}

/// Opens a chat session for the persisted user.
pub fn connect(args: &ConnectionArgs) -> Result<Connected> {
    let config = args.load_config()?;
    let store = args.store();
    let user = store
        .load()
        .context("failed to read the session")?
        .with_context(|| {
            format!(
                "no active session found at {}; run `parlor session login` first",
                store.path().display()
            )
        })?;

    let gateway = HttpGateway::new(&config).context("failed to set up the API client")?;
    gateway.set_current_user(Some(user.id));

    let cache = Arc::new(ChatCache::new());
    let events = cache.subscribe();
    let session = ChatSession::new(Arc::new(gateway), cache, user);
    Ok(Connected { session, events })
}

/// Prints the notices received so far: successes on stdout, failures on
/// stderr.
pub fn print_notices(events: &mut Receiver<ChatEvent>) {
    loop {
        match events.try_recv() {
            Ok(ChatEvent::Notice(notice)) if notice.is_error() => eprintln!("{notice}"),
            Ok(ChatEvent::Notice(notice)) => println!("{notice}"),
            Ok(_) | Err(TryRecvError::Lagged(_)) => {}
            Err(TryRecvError::Empty | TryRecvError::Closed) => return,
        }
    }
}
