//! Marigold CLI - database migrations and admin management.
//!
//! # Usage
//!
//! ```bash
//! # Apply storefront and session-store migrations
//! marigold-cli migrate
//!
//! # Grant admin (or owner) access
//! marigold-cli admin grant -e staff@example.com
//! marigold-cli admin grant -e owner@example.com --owner
//!
//! # Revoke access and list admins
//! marigold-cli admin revoke -e staff@example.com
//! marigold-cli admin list
//! ```
//!
//! The CLI is how the first owner is created; after that owners can manage
//! admins through the API.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "marigold-cli")]
#[command(author, version, about = "Marigold CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage admin access
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
}

#[derive(Subcommand)]
enum AdminAction {
    /// Grant admin access to an email
    Grant {
        /// Email address
        #[arg(short, long)]
        email: String,

        /// Make this admin an owner
        #[arg(long)]
        owner: bool,
    },
    /// Revoke an email's admin access
    Revoke {
        /// Email address
        #[arg(short, long)]
        email: String,
    },
    /// List admins
    List,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Admin { action } => match action {
            AdminAction::Grant { email, owner } => commands::admin::grant(&email, owner).await?,
            AdminAction::Revoke { email } => commands::admin::revoke(&email).await?,
            AdminAction::List => commands::admin::list().await?,
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_grant_owner() {
        let cli = Cli::try_parse_from(["marigold-cli", "admin", "grant", "-e", "o@example.com", "--owner"])
            .map_err(|e| e.to_string());
        assert!(matches!(
            cli.map(|c| c.command),
            Ok(Commands::Admin {
                action: AdminAction::Grant { owner: true, .. }
            })
        ));
    }
}
