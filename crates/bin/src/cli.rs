//! CLI argument definitions for the Sorteia binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Storage backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// SQLite database file
    Sqlite,
    /// PostgreSQL database (shared between hosts)
    Postgres,
    /// In-memory with JSON persistence (default)
    Inmemory,
}

/// Per-owner custom ordering of resource collections
#[derive(Parser, Debug)]
#[command(name = "sorteia")]
#[command(about = "Sorteia: per-owner custom ordering over resource collections")]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    pub backend_config: BackendConfig,

    /// Owner whose ordering the command reads or writes
    #[arg(short, long, global = true, env = "SORTEIA_OWNER")]
    pub owner: Option<String>,

    /// Print machine-readable JSON instead of tables
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Where ordering state is stored.
#[derive(clap::Args, Debug, Clone)]
pub struct BackendConfig {
    /// Storage backend to use
    #[arg(
        short,
        long,
        global = true,
        default_value = "inmemory",
        env = "SORTEIA_BACKEND"
    )]
    pub backend: Backend,

    /// Data directory for storage files.
    /// For SQLite: stores sorteia.db
    /// For InMemory: stores sorteia.json
    #[arg(short = 'D', long, global = true, env = "SORTEIA_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// PostgreSQL connection URL (required when backend=postgres)
    #[arg(long, global = true, env = "SORTEIA_POSTGRES_URL")]
    pub postgres_url: Option<String>,

    /// Give up on a write after this many milliseconds
    #[arg(
        long,
        global = true,
        default_value_t = 5000,
        env = "SORTEIA_WRITE_TIMEOUT_MS"
    )]
    pub write_timeout_ms: u64,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the storage and its indexes
    Init,
    /// Manage the resources that can be ordered
    #[command(subcommand)]
    Resource(ResourceCommand),
    /// Move one resource, ordering it first if needed
    Reorder(ReorderArgs),
    /// Place several resources in one atomic write
    ReorderMany(ReorderManyArgs),
    /// Show the owner's ordering of a resource type
    List(ListArgs),
    /// Show the whole collection, ordered items first
    View(ViewArgs),
    /// Drop a resource from the owner's ordering
    Delete(DeleteArgs),
}

#[derive(Subcommand, Debug)]
pub enum ResourceCommand {
    /// Add or replace a resource
    Add(ResourceAddArgs),
    /// Remove a resource from its collection
    Remove(ResourceRemoveArgs),
}

/// Arguments for `resource add`
#[derive(clap::Args, Debug)]
pub struct ResourceAddArgs {
    pub resource_type: String,
    pub resource_id: String,

    /// JSON payload stored with the resource
    #[arg(short, long)]
    pub payload: Option<String>,

    /// Creation time (RFC 3339); defaults to now
    #[arg(long)]
    pub created_at: Option<String>,
}

/// Arguments for `resource remove`
#[derive(clap::Args, Debug)]
pub struct ResourceRemoveArgs {
    pub resource_type: String,
    pub resource_id: String,
}

/// Arguments for `reorder`
#[derive(clap::Args, Debug)]
pub struct ReorderArgs {
    pub resource_type: String,
    pub resource_id: String,

    /// Zero-based target position; -1 appends
    #[arg(allow_negative_numbers = true)]
    pub position: i64,
}

/// Arguments for `reorder-many`
#[derive(clap::Args, Debug)]
pub struct ReorderManyArgs {
    pub resource_type: String,

    /// Placements as `resource_id=position`
    #[arg(required = true)]
    pub items: Vec<String>,
}

/// Arguments for `list`
#[derive(clap::Args, Debug)]
pub struct ListArgs {
    pub resource_type: String,

    /// Include each resource's payload
    #[arg(long)]
    pub whole: bool,
}

/// Arguments for `view`
#[derive(clap::Args, Debug)]
pub struct ViewArgs {
    pub resource_type: String,

    /// Only show resources whose payload field equals the value (`field=value`)
    #[arg(short, long = "filter")]
    pub filters: Vec<String>,

    /// Skip this many items of the merged view
    #[arg(long, default_value_t = 0)]
    pub offset: usize,

    /// Return at most this many items
    #[arg(long)]
    pub limit: Option<usize>,
}

/// Arguments for `delete`
#[derive(clap::Args, Debug)]
pub struct DeleteArgs {
    pub resource_type: String,
    pub resource_id: String,
}
