use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;

use wallet_report_worker::wallet_store::{
    ConfirmationState, LedgerCategory, NewLedgerEvent, ReportRequest, ReportState,
    ReportStatusStore, SqliteWalletStore, UserId, WalletStore,
};

fn parse_path(s: &str) -> Result<PathBuf> {
    let original_path = PathBuf::from(s);
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Directory holding the wallet database (wallet.db).
    #[clap(long, value_parser = parse_path)]
    pub db_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Creates a user with the given handle.
    AddUser { user_handle: String },

    /// Asks for a full wallet report for the given user.
    Request { user_handle: String },

    /// Withdraws the report request. A running export stops after its
    /// current page.
    Cancel { user_handle: String },

    /// Shows the report request and status of the given user as JSON.
    Status { user_handle: String },

    /// Records a ledger event for the given user.
    AddEvent {
        user_handle: String,

        /// One of invoice, withdrawal, stacked, spent.
        category: String,

        amount_msats: i64,

        #[clap(long, default_value_t = 0)]
        fee_msats: i64,

        /// One of confirmed, pending, failed, expired, cancelled.
        #[clap(long)]
        confirmation: Option<String>,

        /// Unix timestamp in seconds, defaults to now.
        #[clap(long)]
        time: Option<i64>,
    },
}

#[derive(Serialize)]
struct StatusOutput<'a> {
    user_id: UserId,
    user_handle: &'a str,
    #[serde(flatten)]
    state: ReportState,
}

fn require_user(store: &SqliteWalletStore, user_handle: &str) -> Result<UserId> {
    store
        .get_user_id(user_handle)?
        .with_context(|| format!("User {} not found", user_handle))
}

fn set_request(store: &SqliteWalletStore, user_handle: &str, request: ReportRequest) -> Result<()> {
    let user_id = require_user(store, user_handle)?;
    if !store.set_report_request(user_id, request)? {
        bail!("User {} disappeared while updating", user_handle);
    }
    println!("Report request for {} set to {}", user_handle, request.as_str());
    Ok(())
}

fn main() -> Result<()> {
    let cli_args = CliArgs::parse();
    let store = SqliteWalletStore::new(cli_args.db_dir.join("wallet.db"))?;

    match cli_args.command {
        Command::AddUser { user_handle } => {
            let user_id = store.create_user(&user_handle)?;
            println!("Created user {} with id {}", user_handle, user_id);
        }
        Command::Request { user_handle } => {
            set_request(&store, &user_handle, ReportRequest::FullReport)?;
        }
        Command::Cancel { user_handle } => {
            set_request(&store, &user_handle, ReportRequest::NoRequest)?;
        }
        Command::Status { user_handle } => {
            let user_id = require_user(&store, &user_handle)?;
            let state = store
                .get_report_state(user_id)?
                .with_context(|| format!("User {} not found", user_handle))?;
            let output = StatusOutput {
                user_id,
                user_handle: &user_handle,
                state,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Command::AddEvent {
            user_handle,
            category,
            amount_msats,
            fee_msats,
            confirmation,
            time,
        } => {
            let user_id = require_user(&store, &user_handle)?;
            let category = LedgerCategory::parse(&category)
                .with_context(|| format!("Unknown ledger category: {}", category))?;
            let confirmation = match confirmation {
                Some(s) => Some(
                    ConfirmationState::parse(&s)
                        .with_context(|| format!("Unknown confirmation state: {}", s))?,
                ),
                None => None,
            };
            let event_id = store.add_ledger_event(&NewLedgerEvent {
                user_id,
                created_at: time.unwrap_or_else(|| chrono::Utc::now().timestamp()),
                category,
                amount_msats,
                fee_msats,
                confirmation,
            })?;
            println!("Recorded {} event {} for {}", category.as_str(), event_id, user_handle);
        }
    }

    Ok(())
}
