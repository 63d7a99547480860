//! Social Messages CLI
//!
//! Terminal front-end for the conversation view of the social network.
//!
//! ## Commands
//!
//! - `watch <conversation> --user <id>`: open a conversation and keep it
//!   refreshed; lines typed on stdin are sent, `/delete <id>` deletes,
//!   `/attach <path> [text]` sends a file, `/open <conversation> <user>
//!   [name]` switches, `/list [query]` searches the conversations opened so
//!   far, `/quit` or Ctrl+C exits
//! - `send <conversation> <text> [--attach <path>]`
//! - `delete <message>`
//! - `status <user>`
//!
//! Server address and session come from `config.toml` and can be
//! overridden on the command line.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use social_messages::{
    AttachmentUpload, ClientError, ConversationId, ConversationPoller, CsrfToken,
    HttpMessagingApi, MessageId, MessagingApi, OutgoingMessage, UserId,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;
mod terminal;

use config::Config;
use terminal::TerminalView;

/// Social Messages - conversation client for the terminal
#[derive(Parser, Debug)]
#[command(name = "social-messages")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Server root URL (overrides the configuration file)
    #[arg(short, long)]
    server: Option<String>,

    /// Raw Cookie header of an authenticated session
    #[arg(long)]
    cookie: Option<String>,

    /// CSRF token for POST requests
    #[arg(long)]
    csrf_token: Option<String>,

    /// Saved HTML page whose form carries the CSRF token
    #[arg(long, conflicts_with = "csrf_token")]
    csrf_form: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Open a conversation and follow it
    Watch {
        conversation: String,

        /// User id of the other participant
        #[arg(short, long)]
        user: String,

        /// Name shown in the chat header
        #[arg(short, long, default_value = "")]
        name: String,
    },

    /// Send a single message
    Send {
        conversation: String,

        #[arg(default_value = "")]
        text: String,

        /// File to attach
        #[arg(short, long)]
        attach: Option<PathBuf>,
    },

    /// Delete one of your messages
    Delete { message: String },

    /// Show a user's presence
    Status { user: String },
}

/// A line typed while watching a conversation
#[derive(Debug, PartialEq, Eq)]
enum Input {
    Send(String),
    Attach(PathBuf, String),
    Delete(MessageId),
    Open {
        conversation: String,
        user: String,
        name: String,
    },
    List(String),
    Refresh,
    Quit,
    Ignore,
}

fn parse_input(line: &str) -> Input {
    let line = line.trim();
    if line.is_empty() {
        return Input::Ignore;
    }
    let Some(command) = line.strip_prefix('/') else {
        return Input::Send(line.to_string());
    };

    let (name, rest) = command.split_once(' ').unwrap_or((command, ""));
    let query = rest;
    let rest = rest.trim();
    match name {
        "quit" | "q" => Input::Quit,
        "refresh" => Input::Refresh,
        "list" => Input::List(query.to_string()),
        "open" => {
            let mut parts = rest.splitn(3, ' ');
            match (parts.next(), parts.next()) {
                (Some(conversation), Some(user)) if !conversation.is_empty() => Input::Open {
                    conversation: conversation.to_string(),
                    user: user.trim().to_string(),
                    name: parts.next().unwrap_or("").trim().to_string(),
                },
                _ => Input::Send(line.to_string()),
            }
        }
        "delete" if !rest.is_empty() => Input::Delete(MessageId::new(rest)),
        "attach" if !rest.is_empty() => {
            let (path, text) = rest.split_once(' ').unwrap_or((rest, ""));
            Input::Attach(PathBuf::from(path), text.trim().to_string())
        }
        _ => Input::Send(line.to_string()),
    }
}

/// Read the hidden `csrfmiddlewaretoken` value from a saved page
fn csrf_from_form(path: &std::path::Path) -> Result<String> {
    let html = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let token = CsrfToken::from_form_field(&html)
        .ok_or_else(|| anyhow!("No CSRF form field in {}", path.display()))?;
    Ok(token.as_str().to_string())
}

fn apply_overrides(config: &mut Config, args: &Args) {
    if let Some(server) = &args.server {
        config.server.base_url = server.clone();
    }
    if let Some(cookie) = &args.cookie {
        config.server.session_cookie = Some(cookie.clone());
    }
    if let Some(token) = &args.csrf_token {
        config.server.csrf_token = Some(token.clone());
    }
}

async fn outgoing(text: &str, attach: Option<PathBuf>) -> Result<OutgoingMessage> {
    let attachment = match attach {
        Some(path) => Some(
            AttachmentUpload::from_path(&path)
                .await
                .with_context(|| format!("Failed to read attachment {}", path.display()))?,
        ),
        None => None,
    };
    Ok(OutgoingMessage::new(text, attachment))
}

fn report(error: &ClientError) {
    if error.requires_user_action() {
        eprintln!("{}", error.user_message());
    } else {
        warn!("{}", error);
        eprintln!("{}", error.user_message());
    }
}

async fn open<A, V>(poller: &ConversationPoller<A, V>, conversation: String, user: String, name: String) -> ConversationId
where
    A: MessagingApi + 'static,
    V: social_messages::ConversationView + 'static,
{
    let id = ConversationId::new(conversation);
    let display_name = if name.is_empty() { user.clone() } else { name };
    poller
        .select_conversation(id.clone(), display_name, "", UserId::new(user))
        .await;
    id
}

async fn watch(api: Arc<HttpMessagingApi>, config: &Config, conversation: String, user: String, name: String) -> Result<()> {
    let view = Arc::new(TerminalView::new(std::io::stdout()));
    let poller = ConversationPoller::new(api, view.clone(), config.poller_config());
    let mut id = open(&poller, conversation, user, name).await;

    info!("Type a message and press Enter; /quit or Ctrl+C to stop");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("Failed to read stdin")?,
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal");
                break;
            }
        };
        // EOF
        let Some(line) = line else { break };

        match parse_input(&line) {
            Input::Send(text) => {
                if let Err(e) = poller.send_message(&id, OutgoingMessage::text(&text)).await {
                    report(&e);
                }
            }
            Input::Attach(path, text) => match outgoing(&text, Some(path)).await {
                Ok(message) => {
                    if let Err(e) = poller.send_message(&id, message).await {
                        report(&e);
                    }
                }
                Err(e) => eprintln!("{:#}", e),
            },
            Input::Delete(message) => match poller.delete_message(&message).await {
                Ok(outcome) if !outcome.success => eprintln!("Could not delete message {}", message),
                Ok(_) => {}
                Err(e) => report(&e),
            },
            Input::Open {
                conversation,
                user,
                name,
            } => {
                id = open(&poller, conversation, user, name).await;
            }
            Input::List(query) => view.print_conversations(&query),
            Input::Refresh => {
                poller.refresh_messages(&id).await;
            }
            Input::Quit => break,
            Input::Ignore => {}
        }
    }

    poller.close();
    Ok(())
}

async fn run(args: Args) -> Result<()> {
    let config_path = args.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load_from(&config_path)?;
    if let Some(form) = &args.csrf_form {
        config.server.csrf_token = Some(csrf_from_form(form)?);
    }
    apply_overrides(&mut config, &args);
    debug!("Using server {}", config.server.base_url);

    let api = HttpMessagingApi::new(config.api_config()).context("Failed to create HTTP client")?;

    match args.command {
        Command::Watch {
            conversation,
            user,
            name,
        } => watch(Arc::new(api), &config, conversation, user, name).await?,
        Command::Send {
            conversation,
            text,
            attach,
        } => {
            let message = outgoing(&text, attach).await?;
            api.send_message(&ConversationId::new(conversation), &message)
                .await
                .context("Failed to send message")?;
            println!("Sent: {}", message.preview());
        }
        Command::Delete { message } => {
            let id = MessageId::new(message);
            let outcome = api.delete_message(&id).await.context("Failed to delete message")?;
            if outcome.success {
                println!("Deleted message {}", id);
            } else {
                println!("Server did not delete message {}", id);
            }
        }
        Command::Status { user } => {
            let status = api
                .fetch_status(&UserId::new(user))
                .await
                .context("Failed to fetch status")?;
            let marker = if status.is_online { "online" } else { "offline" };
            println!("{} ({})", status.status, marker);
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .init();

    info!("Starting Social Messages {}", env!("CARGO_PKG_VERSION"));

    run(args).await
}
