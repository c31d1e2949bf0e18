//! `mailbridge` - linked Gmail and Outlook mailboxes from the command line.
//!
//! Every command prints JSON on stdout; logs go to stderr.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use mailbridge_core::{
    AccountId, AccountRepository, Config, MailService, Mailbox, OutgoingMessage, ProviderKind,
    UserId,
};
use mailbridge_mime::OutgoingAttachment;
use serde_json::json;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "mailbridge", version, about = "Unified inbox over linked Gmail and Outlook accounts")]
struct Cli {
    /// Configuration file (JSON). Defaults to the platform config dir.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// User owning the linked accounts.
    #[arg(long, global = true, default_value = "1")]
    user: i64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List linked accounts.
    Accounts,

    /// Print the consent URL for linking a mailbox.
    AuthUrl {
        /// `gmail` or `outlook`.
        provider: ProviderKind,
        /// Opaque value echoed back on the redirect.
        #[arg(long, default_value = "")]
        state: String,
    },

    /// Finish linking with the authorization code from the redirect.
    Link {
        /// `gmail` or `outlook`.
        provider: ProviderKind,
        /// Authorization code.
        code: String,
    },

    /// Unlink an account.
    Unlink {
        /// Account id.
        account: AccountId,
    },

    /// Show one inbox page, merged across accounts unless `--account` is given.
    Inbox {
        /// Restrict to one account.
        #[arg(long)]
        account: Option<AccountId>,
        /// Cursor from a previous page.
        #[arg(long)]
        page_token: Option<String>,
        #[arg(long, default_value = "50")]
        page_size: usize,
    },

    /// List a folder across every account.
    Folder {
        /// `inbox`, `sent` or `trash`.
        mailbox: Mailbox,
        #[arg(long, default_value = "50")]
        limit: usize,
        #[arg(long, default_value = "0")]
        offset: usize,
    },

    /// Send an HTML message.
    Send {
        /// Sending account id.
        #[arg(long)]
        account: AccountId,
        #[arg(long, required = true)]
        to: Vec<String>,
        #[arg(long)]
        cc: Vec<String>,
        #[arg(long)]
        bcc: Vec<String>,
        #[arg(long, default_value = "")]
        subject: String,
        /// HTML body.
        #[arg(long, default_value = "")]
        body: String,
        /// File to attach; repeatable.
        #[arg(long)]
        attach: Vec<PathBuf>,
    },

    /// Move a message to the trash.
    Trash {
        account: AccountId,
        message: String,
    },

    /// Move a trashed message back to the inbox.
    Restore {
        account: AccountId,
        message: String,
    },

    /// Delete a message for good.
    Purge {
        account: AccountId,
        message: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mailbridge=info,mailbridge_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())
        .await
        .context("failed to load configuration")?;
    let store = AccountRepository::open(&config.database_path)
        .await
        .with_context(|| format!("failed to open {}", config.database_path.display()))?;
    info!("Using account store at {:?}", config.database_path);

    let service = MailService::new(&config, store)?;
    let user = UserId::new(cli.user);

    let output = match cli.command {
        Commands::Accounts => serde_json::to_value(service.list_accounts(user).await?)?,
        Commands::AuthUrl { provider, state } => {
            json!({ "url": service.authorization_url(provider, &state)?.as_str() })
        }
        Commands::Link { provider, code } => {
            serde_json::to_value(service.link_account(user, provider, &code).await?)?
        }
        Commands::Unlink { account } => {
            json!({ "success": service.delete_account(user, account).await? })
        }
        Commands::Inbox {
            account,
            page_token,
            page_size,
        } => serde_json::to_value(
            service
                .get_inbox(user, account, page_token.as_deref(), page_size)
                .await,
        )?,
        Commands::Folder {
            mailbox,
            limit,
            offset,
        } => serde_json::to_value(service.list_folder(user, mailbox, limit, offset).await)?,
        Commands::Send {
            account,
            to,
            cc,
            bcc,
            subject,
            body,
            attach,
        } => {
            let mut attachments = Vec::with_capacity(attach.len());
            for path in &attach {
                attachments.push(read_attachment(path).await?);
            }
            let message = OutgoingMessage {
                to,
                cc,
                bcc,
                subject,
                body_html: body,
                attachments,
            };
            json!({ "success": service.send_email(user, account, &message).await? })
        }
        Commands::Trash { account, message } => {
            json!({ "success": service.trash_message(user, account, &message).await? })
        }
        Commands::Restore { account, message } => {
            json!({ "success": service.restore_message(user, account, &message).await? })
        }
        Commands::Purge { account, message } => {
            json!({ "success": service.delete_permanently(user, account, &message).await? })
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn read_attachment(path: &Path) -> Result<OutgoingAttachment> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("cannot read attachment {}", path.display()))?;
    let Some(filename) = path.file_name().and_then(|n| n.to_str()) else {
        bail!("attachment path has no file name: {}", path.display());
    };
    Ok(OutgoingAttachment::new(filename, guess_content_type(path), data))
}

fn guess_content_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match extension.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "txt" => "text/plain",
        "csv" => "text/csv",
        "html" | "htm" => "text/html",
        "zip" => "application/zip",
        _ => "application/octet-stream",
    }
}
