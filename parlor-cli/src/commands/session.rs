use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use client::{HttpGateway, SessionStore, auth};
use shared::models::{RegisterPayload, User};

use super::connection::ConnectionArgs;

#[derive(Subcommand, Debug)]
pub enum SessionCommand {
    /// Sign in with an existing login
    Login(LoginArgs),
    /// Create an account and sign in
    Register(RegisterArgs),
    /// Forget the signed-in user
    Logout(StoreArgs),
    /// Show the signed-in user
    Whoami(StoreArgs),
}

#[derive(Args, Debug)]
pub struct LoginArgs {
    /// Login name
    #[arg(long)]
    pub login: String,

    #[command(flatten)]
    pub connection: ConnectionArgs,
}

#[derive(Args, Debug)]
pub struct RegisterArgs {
    /// Login name
    #[arg(long)]
    pub login: String,

    /// Given names
    #[arg(long)]
    pub first_names: String,

    /// Family name
    #[arg(long)]
    pub last_name: String,

    #[command(flatten)]
    pub connection: ConnectionArgs,
}

#[derive(Args, Debug)]
pub struct StoreArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,
}

pub async fn run(command: SessionCommand) -> Result<()> {
    match command {
        SessionCommand::Login(args) => login(args).await,
        SessionCommand::Register(args) => register(args).await,
        SessionCommand::Logout(args) => logout(&args),
        SessionCommand::Whoami(args) => whoami(&args),
    }
}

fn gateway(connection: &ConnectionArgs) -> Result<Arc<HttpGateway>> {
    let config = connection.load_config()?;
    let gateway = HttpGateway::new(&config).context("failed to set up the API client")?;
    Ok(Arc::new(gateway))
}

async fn login(args: LoginArgs) -> Result<()> {
    let gateway = gateway(&args.connection)?;
    let store = args.connection.store();

    let user = auth::login(gateway.as_ref(), &store, &args.login)
        .await
        .map_err(|err| anyhow::anyhow!(err.user_message()))
        .context("login failed")?;

    println!("✔ Signed in");
    print_user(&user);
    println!("session stored at {}", store.path().display());
    Ok(())
}

async fn register(args: RegisterArgs) -> Result<()> {
    let gateway = gateway(&args.connection)?;
    let store = args.connection.store();
    let payload = RegisterPayload {
        last_name: args.last_name,
        first_names: args.first_names,
        login: args.login,
    };

    let user = auth::register(gateway.as_ref(), &store, payload)
        .await
        .map_err(|err| anyhow::anyhow!(err.user_message()))
        .context("registration failed")?;

    println!("✔ Account created");
    print_user(&user);
    println!("session stored at {}", store.path().display());
    Ok(())
}

fn logout(args: &StoreArgs) -> Result<()> {
    let store = args.connection.store();
    if auth::logout(&store).context("failed to remove the session")? {
        println!("Removed session at {}", store.path().display());
    } else {
        println!("No active session found at {}", store.path().display());
    }
    Ok(())
}

fn whoami(args: &StoreArgs) -> Result<()> {
    let store = args.connection.store();
    match store.load().context("failed to read the session")? {
        Some(user) => print_user(&user),
        None => println!("Not signed in. Run `parlor session login` first."),
    }
    Ok(())
}

fn print_user(user: &User) {
    let name = user.display_name();
    if name.is_empty() {
        println!("user #{} ({})", user.id, user.login);
    } else {
        println!("user #{} {} ({})", user.id, name, user.login);
    }
}
