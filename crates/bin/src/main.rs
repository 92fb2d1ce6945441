use clap::Parser;
use tracing_subscriber::EnvFilter;

mod backend;
mod cli;
mod commands;
mod output;

use cli::{Cli, Commands, ResourceCommand};
use output::OutputFormat;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so --json output stays parseable.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sorteia=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let format = OutputFormat::from_flag(cli.json);
    let config = &cli.backend_config;
    let owner = cli.owner.as_deref();

    match &cli.command {
        Commands::Init => commands::init::run(config, format).await,
        Commands::Resource(ResourceCommand::Add(args)) => {
            commands::resource::add(config, args, format).await
        }
        Commands::Resource(ResourceCommand::Remove(args)) => {
            commands::resource::remove(config, args, format).await
        }
        Commands::Reorder(args) => commands::ordering::reorder(config, owner, args, format).await,
        Commands::ReorderMany(args) => {
            commands::ordering::reorder_many(config, owner, args, format).await
        }
        Commands::List(args) => commands::view::list(config, owner, args, format).await,
        Commands::View(args) => commands::view::view(config, owner, args, format).await,
        Commands::Delete(args) => commands::ordering::delete(config, owner, args, format).await,
    }
}
