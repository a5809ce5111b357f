//! Main entry point for the Parlor command-line client.

use anyhow::Result;
use clap::{Parser, Subcommand};
use dotenv::dotenv;

mod commands;

use commands::{
    chat::{
        ConversationsArgs, DeleteConversationArgs, DeleteMessageArgs, ExportArgs, GroupCommand,
        OpenArgs, SendArgs, UsersArgs,
    },
    session::SessionCommand,
};

/// Parlor CLI
#[derive(Parser)]
#[command(name = "parlor")]
#[command(about = "Command-line client for the Parlor chat service", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Subcommands for the Parlor CLI
#[derive(Subcommand)]
enum Commands {
    /// Sign in, create an account, or sign out
    #[command(subcommand)]
    Session(SessionCommand),

    /// List your conversations, most recent first
    Conversations(ConversationsArgs),

    /// Show the messages of a conversation
    Open(OpenArgs),

    /// Send a message to a user or a conversation
    Send(SendArgs),

    /// Create and manage group conversations
    #[command(subcommand)]
    Group(GroupCommand),

    /// Delete one of your messages
    DeleteMessage(DeleteMessageArgs),

    /// Delete a conversation from your list
    DeleteConversation(DeleteConversationArgs),

    /// Export one conversation or all of them
    Export(ExportArgs),

    /// List the user directory
    Users(UsersArgs),

    /// Generate shell completion scripts for the CLI
    Completion {
        /// The shell type for which to generate the completion script (e.g., bash, zsh, fish, powershell)
        #[arg(
            long,
            short,
            help = "The shell type for which to generate the completion script (e.g., bash, zsh, fish, powershell)"
        )]
        shell: clap_complete::Shell,
    },

    /// Generate a configuration file
    Config {
        /// Format of the configuration file to generate (yaml or json). Defaults to yaml.
        #[arg(
            long,
            short,
            help = "Format of the configuration file to generate (yaml or json). Defaults to yaml."
        )]
        format: Option<String>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Commands::Session(command) => commands::session::run(command).await?,
        Commands::Conversations(args) => commands::chat::list_conversations(args).await?,
        Commands::Open(args) => commands::chat::open_conversation(args).await?,
        Commands::Send(args) => commands::chat::send(args).await?,
        Commands::Group(command) => commands::chat::group(command).await?,
        Commands::DeleteMessage(args) => commands::chat::delete_message(args).await?,
        Commands::DeleteConversation(args) => commands::chat::delete_conversation(args).await?,
        Commands::Export(args) => commands::chat::export(args).await?,
        Commands::Users(args) => commands::chat::list_users(args).await?,
        Commands::Completion { shell } => {
            commands::completion::generate_completion(shell);
        }
        Commands::Config { format } => {
            let format = format.unwrap_or_else(|| "yaml".to_string());
            commands::config::generate_config(&format)?;
        }
    }

    Ok(())
}
