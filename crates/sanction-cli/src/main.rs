use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "sanction")]
#[command(about = "Sanction - asynchronous human approvals", long_about = None)]
struct Cli {
    /// Directory holding config.toml, secret.json and (unless overridden) data
    #[arg(long, global = true, env = "SANCTION_HOME")]
    home: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Session identifiers
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },
    /// Ask a reviewer for approval via Slack
    Request {
        #[arg(long)]
        session: String,
        #[arg(long)]
        situation: String,
        #[arg(long, default_value = "")]
        context: String,
        #[arg(long, default_value = "")]
        reason: String,
        /// The action to take if approved
        #[arg(long)]
        action: String,
        /// Wait for the decision instead of returning `pending`
        #[arg(long)]
        wait: bool,
        /// Give up waiting after this many seconds (with --wait)
        #[arg(long, requires = "wait")]
        timeout_secs: Option<u64>,
    },
    /// Record a reviewer's decision for a pending approval
    Decide {
        approval_id: String,
        /// Deny instead of approve
        #[arg(long)]
        deny: bool,
        /// Free-text response (defaults to Approved/Denied)
        #[arg(long)]
        response: Option<String>,
    },
    /// Show the decided approvals of a session
    Status {
        #[arg(long)]
        session: String,
    },
    /// List journaled approval tasks that have not completed
    Pending,
    /// Evict expired records from every partition
    Sweep,
    /// Inspect callback address records
    Webhooks {
        #[command(subcommand)]
        action: WebhookAction,
    },
}

#[derive(Subcommand)]
enum SessionAction {
    /// Generate a new session id
    New,
    /// Check whether a session id is well-formed
    Validate { session: String },
}

#[derive(Subcommand)]
enum WebhookAction {
    /// List live records
    List,
    /// Delete one record, or all of them when no id is given
    Delete { approval_id: Option<String> },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let home = cli.home.as_deref();

    match cli.command {
        Commands::Session { action } => match action {
            SessionAction::New => commands::session::new_session(),
            SessionAction::Validate { session } => commands::session::validate(&session)?,
        },
        Commands::Request {
            session,
            situation,
            context,
            reason,
            action,
            wait,
            timeout_secs,
        } => {
            let request = sanction_core::approval::ApprovalRequest {
                situation,
                context,
                reason,
                requested_action: action,
            };
            commands::approval::request(home, &session, request, wait, timeout_secs).await?
        }
        Commands::Decide {
            approval_id,
            deny,
            response,
        } => commands::approval::decide(home, &approval_id, !deny, response).await?,
        Commands::Status { session } => commands::approval::status(home, &session).await?,
        Commands::Pending => commands::maintenance::pending(home).await?,
        Commands::Sweep => commands::maintenance::sweep(home).await?,
        Commands::Webhooks { action } => match action {
            WebhookAction::List => commands::webhooks::list(home).await?,
            WebhookAction::Delete { approval_id } => {
                commands::webhooks::delete(home, approval_id.as_deref()).await?
            }
        },
    }

    Ok(())
}
