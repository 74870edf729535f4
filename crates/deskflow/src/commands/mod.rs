//! Command dispatch: bridges CLI args -> sync client -> output formatting.

pub mod client;
pub mod config_cmd;
pub mod list;
pub mod route;
pub mod ticket;
pub mod watch;

use deskflow_core::SyncClient;

use crate::cli::{Command, GlobalOpts};
use crate::config::Config;
use crate::error::CliError;

/// Dispatch a data-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    client: &SyncClient,
    config: &Config,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::List(args) => list::handle(client, args, global).await,
        Command::Route(args) => route::handle(client, args, global).await,
        Command::Ticket(args) => ticket::handle(client, args, global).await,
        Command::Client(args) => client::handle(client, args, global).await,
        Command::Watch(args) => watch::handle(client, args, config, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => Ok(()),
    }
}
