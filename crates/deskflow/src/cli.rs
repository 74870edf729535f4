//! Clap derive structures for the `deskflow` CLI.
//!
//! Defines the command tree, global flags, and shared value enums.

use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

use deskflow_core::{Resource, TicketPriority, TicketStatus};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// deskflow -- inspect and drive the support dashboard's data layer
#[derive(Debug, Parser)]
#[command(
    name = "deskflow",
    version,
    about = "Support dashboard data from the command line",
    long_about = "Reads and writes helpdesk data through the same cache, mutation,\n\
        prefetch, and realtime machinery the dashboard uses.\n\n\
        Without a configured backend, --mock runs against seeded in-memory data.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Configuration profile to use
    #[arg(long, short = 'p', env = "DESKFLOW_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Backend project URL (overrides profile)
    #[arg(long, env = "DESKFLOW_URL", global = true)]
    pub url: Option<String>,

    /// Backend API key (overrides profile)
    #[arg(long, env = "DESKFLOW_API_KEY", global = true, hide_env_values = true)]
    pub api_key: Option<String>,

    /// Use seeded in-memory data instead of a backend
    #[arg(long, global = true, conflicts_with = "url")]
    pub mock: bool,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "DESKFLOW_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "DESKFLOW_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "DESKFLOW_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

/// Collections the dashboard reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ResourceArg {
    Clients,
    Tickets,
    Technicians,
    Articles,
    Categories,
}

impl From<ResourceArg> for Resource {
    fn from(arg: ResourceArg) -> Self {
        match arg {
            ResourceArg::Clients => Self::Clients,
            ResourceArg::Tickets => Self::Tickets,
            ResourceArg::Technicians => Self::Technicians,
            ResourceArg::Articles => Self::Articles,
            ResourceArg::Categories => Self::Categories,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StatusArg {
    Open,
    InProgress,
    Resolved,
    Closed,
}

impl From<StatusArg> for TicketStatus {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::Open => Self::Open,
            StatusArg::InProgress => Self::InProgress,
            StatusArg::Resolved => Self::Resolved,
            StatusArg::Closed => Self::Closed,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PriorityArg {
    Low,
    Medium,
    High,
    Urgent,
}

impl From<PriorityArg> for TicketPriority {
    fn from(arg: PriorityArg) -> Self {
        match arg {
            PriorityArg::Low => Self::Low,
            PriorityArg::Medium => Self::Medium,
            PriorityArg::High => Self::High,
            PriorityArg::Urgent => Self::Urgent,
        }
    }
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List a collection through the query cache
    #[command(alias = "ls")]
    List(ListArgs),

    /// Prefetch the collections a dashboard page needs
    Route(RouteArgs),

    /// Create and update tickets
    #[command(alias = "t")]
    Ticket(TicketArgs),

    /// Create and update clients
    Client(ClientArgs),

    /// Stream realtime notifications for a user
    Watch(WatchArgs),

    /// Manage configuration profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── List ─────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Collection to list
    pub resource: ResourceArg,

    /// Only tickets that are open or in progress
    #[arg(long)]
    pub open: bool,

    /// Only tickets assigned to this technician id
    #[arg(long)]
    pub assigned_to: Option<String>,
}

// ── Route ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct RouteArgs {
    /// Page path, e.g. /dashboard or /tickets/42
    pub path: String,
}

// ── Ticket ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct TicketArgs {
    #[command(subcommand)]
    pub command: TicketCommand,
}

#[derive(Debug, Subcommand)]
pub enum TicketCommand {
    /// Open a new ticket
    Create {
        /// Short summary
        #[arg(long)]
        title: String,

        #[arg(long)]
        description: Option<String>,

        #[arg(long, value_enum)]
        priority: Option<PriorityArg>,

        /// Client the ticket belongs to
        #[arg(long)]
        client: Option<String>,
    },

    /// Assign a ticket to a technician
    Assign {
        /// Ticket id
        id: String,
        /// Technician id
        technician: String,
    },

    /// Remove a ticket's assignee
    Unassign {
        /// Ticket id
        id: String,
    },

    /// Move a ticket through its workflow
    Status {
        /// Ticket id
        id: String,
        #[arg(value_enum)]
        status: StatusArg,
    },
}

// ── Client ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ClientArgs {
    #[command(subcommand)]
    pub command: ClientCommand,
}

#[derive(Debug, Subcommand)]
pub enum ClientCommand {
    /// Add a client
    Create {
        /// Display name
        name: String,

        #[arg(long)]
        email: Option<String>,

        #[arg(long)]
        company: Option<String>,
    },

    /// Change a client's display name
    Rename {
        /// Client id
        id: String,
        /// New display name
        name: String,
    },
}

// ── Watch ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// User whose notifications to follow (defaults to the profile's user_id)
    #[arg(long, short = 'u')]
    pub user: Option<String>,

    /// Stop after this long (e.g. "30s", "5m"); runs until Ctrl-C otherwise
    #[arg(long = "for", value_parser = humantime::parse_duration)]
    pub duration: Option<Duration>,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file location
    Path,

    /// Show the effective configuration (secrets redacted)
    Show,

    /// Create or update a profile
    Init {
        /// Backend project URL
        #[arg(long)]
        url: String,

        /// Environment variable holding the API key
        #[arg(long)]
        api_key_env: Option<String>,

        /// Default user for `watch`
        #[arg(long)]
        user_id: Option<String>,
    },

    /// Store a profile's API key in the system keyring
    SetKey {
        /// The API key
        key: String,
    },

    /// List configured profiles
    Profiles,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Target shell
    pub shell: Shell,
}
