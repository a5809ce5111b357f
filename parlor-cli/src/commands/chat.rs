use std::{fs, path::PathBuf};

use anyhow::{Context, Result, bail};
use chrono::Local;
use clap::{ArgGroup, Args, Subcommand};
use client::{ConversationFilter, ConversationView, ImageUpload, OutgoingMessage, TimelineEntry};
use shared::models::{ConversationId, ConversationKind, UserId};

use super::connection::{ConnectionArgs, Connected, connect, print_notices};

#[derive(Args, Debug)]
pub struct ConversationsArgs {
    /// Only list group conversations
    #[arg(long)]
    pub groups: bool,

    #[command(flatten)]
    pub connection: ConnectionArgs,
}

#[derive(Args, Debug)]
pub struct OpenArgs {
    /// Conversation identifier
    pub conversation: ConversationId,

    /// Print the day on every message instead of day separators
    #[arg(long)]
    pub flat: bool,

    #[command(flatten)]
    pub connection: ConnectionArgs,
}

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("target").required(true).args(["to", "conversation"])))]
pub struct SendArgs {
    /// Recipient of a private message
    #[arg(long)]
    pub to: Option<UserId>,

    /// Conversation to post in
    #[arg(long)]
    pub conversation: Option<ConversationId>,

    /// Image to attach
    #[arg(long)]
    pub image: Option<PathBuf>,

    /// Message text
    pub text: Option<String>,

    #[command(flatten)]
    pub connection: ConnectionArgs,
}

#[derive(Subcommand, Debug)]
pub enum GroupCommand {
    /// Create a group with the given members
    Create(CreateGroupArgs),
    /// Add a member to a group
    Add(MemberArgs),
    /// Remove a member from a group
    Remove(MemberArgs),
    /// Grant admin rights to a member
    Promote(MemberArgs),
    /// Revoke admin rights from a member
    Demote(MemberArgs),
    /// Leave a group
    Leave(GroupArgs),
    /// List the members of a conversation
    Members(GroupArgs),
}

#[derive(Args, Debug)]
pub struct CreateGroupArgs {
    /// Group name
    #[arg(long)]
    pub title: String,

    /// Member ids, comma separated
    #[arg(long, value_delimiter = ',', required = true)]
    pub members: Vec<UserId>,

    #[command(flatten)]
    pub connection: ConnectionArgs,
}

#[derive(Args, Debug)]
pub struct MemberArgs {
    /// Group identifier
    #[arg(long)]
    pub conversation: ConversationId,

    /// Member identifier
    #[arg(long)]
    pub user: UserId,

    #[command(flatten)]
    pub connection: ConnectionArgs,
}

#[derive(Args, Debug)]
pub struct GroupArgs {
    /// Conversation identifier
    #[arg(long)]
    pub conversation: ConversationId,

    #[command(flatten)]
    pub connection: ConnectionArgs,
}

#[derive(Args, Debug)]
pub struct DeleteMessageArgs {
    /// Conversation holding the message
    #[arg(long)]
    pub conversation: ConversationId,

    /// Message identifier
    #[arg(long)]
    pub message: i64,

    #[command(flatten)]
    pub connection: ConnectionArgs,
}

#[derive(Args, Debug)]
pub struct DeleteConversationArgs {
    /// Conversation identifier
    #[arg(long)]
    pub conversation: ConversationId,

    #[command(flatten)]
    pub connection: ConnectionArgs,
}

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("scope").required(true).args(["conversation", "all"])))]
pub struct ExportArgs {
    /// Export a single conversation as text
    #[arg(long)]
    pub conversation: Option<ConversationId>,

    /// Export every conversation as a zip archive
    #[arg(long)]
    pub all: bool,

    /// Directory the export is written to
    #[arg(long, default_value = ".")]
    pub output: PathBuf,

    #[command(flatten)]
    pub connection: ConnectionArgs,
}

#[derive(Args, Debug)]
pub struct UsersArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,
}

/// Connects and loads the conversation list.
async fn connect_and_refresh(connection: &ConnectionArgs) -> Result<Connected> {
    let mut connected = connect(connection)?;
    let refreshed = connected.session.refresh_conversations().await;
    print_notices(&mut connected.events);
    refreshed.context("failed to load conversations")?;
    Ok(connected)
}

pub async fn list_conversations(args: ConversationsArgs) -> Result<()> {
    let mut connected = connect(&args.connection)?;
    if args.groups {
        connected.session.cache().set_filter(ConversationFilter::GroupsOnly);
    }
    let refreshed = connected.session.refresh_conversations().await;
    print_notices(&mut connected.events);
    refreshed.context("failed to load conversations")?;

    render_conversation_list(&connected.session.conversation_views(Local::now().naive_local()));
    Ok(())
}

pub async fn open_conversation(args: OpenArgs) -> Result<()> {
    let Connected {
        session,
        mut events,
    } = connect_and_refresh(&args.connection).await?;
    let id = args.conversation;

    let loaded = session.select_conversation(id).await;
    print_notices(&mut events);
    loaded.with_context(|| format!("failed to load conversation {id}"))?;

    if let Some(conversation) = session.cache().conversation(id) {
        println!("== {} ({}) ==", conversation.title, conversation.kind);
    }
    render_timeline(&session.timeline_view(id, !args.flat, Local::now().naive_local()));
    Ok(())
}

pub async fn send(args: SendArgs) -> Result<()> {
    let Connected {
        session,
        mut events,
    } = connect_and_refresh(&args.connection).await?;

    let image = args
        .image
        .as_ref()
        .map(|path| -> Result<ImageUpload> {
            let bytes = fs::read(path)
                .with_context(|| format!("failed to read image {}", path.display()))?;
            let file_name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            Ok(ImageUpload { file_name, bytes })
        })
        .transpose()?;
    let message = OutgoingMessage {
        text: args.text,
        image,
    };

    let id = match (args.to, args.conversation) {
        (Some(recipient), _) => {
            let started = session.start_private_conversation(recipient).await;
            print_notices(&mut events);
            started
                .with_context(|| format!("failed to open a conversation with user {recipient}"))?
                .id()
        }
        (None, Some(id)) => id,
        (None, None) => bail!("either --to or --conversation is required"),
    };

    let sent = session.send_message(id, message).await;
    print_notices(&mut events);
    let target = sent.context("failed to send the message")?;
    println!("conversation {target}");
    Ok(())
}

pub async fn group(command: GroupCommand) -> Result<()> {
    match command {
        GroupCommand::Create(args) => create_group(args).await,
        GroupCommand::Add(args) => member_action(args, MemberAction::Add).await,
        GroupCommand::Remove(args) => member_action(args, MemberAction::Remove).await,
        GroupCommand::Promote(args) => member_action(args, MemberAction::Promote).await,
        GroupCommand::Demote(args) => member_action(args, MemberAction::Demote).await,
        GroupCommand::Leave(args) => leave_group(args).await,
        GroupCommand::Members(args) => list_members(args).await,
    }
}

async fn create_group(args: CreateGroupArgs) -> Result<()> {
    let Connected {
        session,
        mut events,
    } = connect_and_refresh(&args.connection).await?;

    let created = session.create_group(&args.title, &args.members).await;
    print_notices(&mut events);
    let id = created.context("failed to create the group")?;
    println!("conversation {id}");
    Ok(())
}

#[derive(Debug, Clone, Copy)]
enum MemberAction {
    Add,
    Remove,
    Promote,
    Demote,
}

impl MemberAction {
    fn describe(self) -> &'static str {
        match self {
            Self::Add => "add the member",
            Self::Remove => "remove the member",
            Self::Promote => "promote the member",
            Self::Demote => "demote the member",
        }
    }
}

async fn member_action(args: MemberArgs, action: MemberAction) -> Result<()> {
    let Connected {
        session,
        mut events,
    } = connect_and_refresh(&args.connection).await?;
    let (id, user) = (args.conversation, args.user);

    // Admin checks need the current membership.
    if let Err(err) = session.resolve_members(id).await {
        tracing::warn!(error = %err, "membership unavailable");
    }
    let done = match action {
        MemberAction::Add => session.add_member(id, user).await,
        MemberAction::Remove => session.remove_member(id, user).await,
        MemberAction::Promote => session.promote_member(id, user).await,
        MemberAction::Demote => session.demote_member(id, user).await,
    };
    print_notices(&mut events);
    done.with_context(|| format!("failed to {}", action.describe()))?;
    Ok(())
}

async fn leave_group(args: GroupArgs) -> Result<()> {
    let Connected {
        session,
        mut events,
    } = connect_and_refresh(&args.connection).await?;

    let left = session.leave_group(args.conversation).await;
    print_notices(&mut events);
    left.context("failed to leave the group")?;
    Ok(())
}

async fn list_members(args: GroupArgs) -> Result<()> {
    let Connected {
        session,
        mut events,
    } = connect_and_refresh(&args.connection).await?;
    let id = args.conversation;

    let resolved = session.resolve_members(id).await;
    print_notices(&mut events);
    resolved.with_context(|| format!("failed to load the members of {id}"))?;

    let Some(conversation) = session.cache().conversation(id) else {
        bail!("conversation {id} is not in your list");
    };
    let name = |user_id: UserId| {
        session
            .cache()
            .user(user_id)
            .map(|user| user.display_name())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| format!("user #{user_id}"))
    };

    println!("== {} ==", conversation.title);
    for member in &conversation.participant_ids {
        let role = if conversation.is_admin(*member) { " [admin]" } else { "" };
        println!("- {member:>6}  {}{role}", name(*member));
    }
    if !conversation.former_members.is_empty() {
        println!("former members:");
        for former in &conversation.former_members {
            let left = former
                .left_at
                .map(|at| format!(" (left {})", at.format("%d/%m/%Y %H:%M")))
                .unwrap_or_default();
            println!("- {:>6}  {}{left}", former.user_id, name(former.user_id));
        }
    }
    Ok(())
}

pub async fn delete_message(args: DeleteMessageArgs) -> Result<()> {
    let Connected {
        session,
        mut events,
    } = connect_and_refresh(&args.connection).await?;

    let deleted = session.delete_message(args.conversation, args.message).await;
    print_notices(&mut events);
    deleted.context("failed to delete the message")?;
    Ok(())
}

pub async fn delete_conversation(args: DeleteConversationArgs) -> Result<()> {
    let Connected {
        session,
        mut events,
    } = connect_and_refresh(&args.connection).await?;

    let deleted = session.delete_conversation(args.conversation).await;
    print_notices(&mut events);
    deleted.context("failed to delete the conversation")?;
    Ok(())
}

pub async fn export(args: ExportArgs) -> Result<()> {
    let Connected {
        session,
        mut events,
    } = connect(&args.connection)?;

    let exported = match args.conversation {
        Some(id) => session.export_conversation(id).await,
        None => session.export_all_conversations().await,
    };
    print_notices(&mut events);
    let export = exported.context("export failed")?;

    fs::create_dir_all(&args.output)
        .with_context(|| format!("failed to create {}", args.output.display()))?;
    let path = args.output.join(&export.file_name);
    fs::write(&path, &export.bytes)
        .with_context(|| format!("failed to write {}", path.display()))?;
    println!("saved {} ({} bytes)", path.display(), export.bytes.len());
    Ok(())
}

pub async fn list_users(args: UsersArgs) -> Result<()> {
    let Connected {
        session,
        mut events,
    } = connect(&args.connection)?;

    let loaded = session.load_users().await;
    print_notices(&mut events);
    let users = loaded.context("failed to load users")?;

    let me = session.user().id;
    for user in users.iter().filter(|user| user.id != me) {
        println!("- {:>6}  {}  ({})", user.id, user.display_name(), user.login);
    }
    Ok(())
}

fn render_conversation_list(views: &[ConversationView]) {
    if views.is_empty() {
        println!("No conversations yet.");
        return;
    }

    for view in views {
        let marker = match (view.kind, view.is_provisional) {
            (_, true) => '*',
            (ConversationKind::Group, _) => '#',
            (ConversationKind::Private, _) => '@',
        };
        let left = if view.has_left { " (left)" } else { "" };
        println!(
            "{marker} {:<12} {}{left}  {}",
            view.id.to_string(),
            view.title,
            view.time_label
        );
        if !view.preview.is_empty() {
            println!("  {}", view.preview);
        }
    }
}

fn render_timeline(entries: &[TimelineEntry]) {
    if entries.is_empty() {
        println!("No messages yet.");
        return;
    }

    for entry in entries {
        match entry {
            TimelineEntry::DaySeparator { label } => println!("--- {label} ---"),
            TimelineEntry::Message(view) => {
                let author = if view.is_own {
                    "you".to_string()
                } else {
                    view.sender_name.clone().unwrap_or_default()
                };
                let mut body = view.content.clone().unwrap_or_default();
                if let Some(url) = &view.image_url {
                    if !body.is_empty() {
                        body.push(' ');
                    }
                    body.push_str("[image: ");
                    body.push_str(url);
                    body.push(']');
                }
                let id = view
                    .id
                    .map_or_else(|| "pending".to_string(), |id| format!("#{id}"));
                if author.is_empty() {
                    println!("[{}] {body}  ({id})", view.time_label);
                } else {
                    println!("[{}] {author}: {body}  ({id})", view.time_label);
                }
            }
        }
    }
}
