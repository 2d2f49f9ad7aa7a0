mod commands;

use clap::{Parser, Subcommand};
use commands::{classify::ClassifyArgs, roles::RolesArgs, serve::ServeArgs};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "sqlgate", version, about = "Role-gated SQL gateway for AI agents")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the MCP server.
    Serve(ServeArgs),

    /// Print the effective privilege table.
    Roles(RolesArgs),

    /// Classify a SQL statement and show the gate decision for a role.
    Classify(ClassifyArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout belongs to the stdio transport.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.cmd {
        Command::Serve(args) => commands::serve::execute(args).await?,
        Command::Roles(args) => commands::roles::execute(args)?,
        Command::Classify(args) => {
            if !commands::classify::execute(args)? {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
