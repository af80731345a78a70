//! Cart Sync CLI - Database migrations and stored cart management.
//!
//! # Usage
//!
//! ```bash
//! # Create the cart document table
//! cart-cli migrate
//!
//! # Show a user's stored cart
//! cart-cli cart show --user u1
//!
//! # Empty a user's stored cart
//! cart-cli cart clear --user u1
//!
//! # Merge this device's guest cart into a user's stored cart
//! cart-cli cart merge --user u1
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `cart show|clear|merge` - Inspect and manage stored carts
//!
//! Configuration is read from the environment (see `cart_sync::config`).

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

use cart_sync::CartSyncConfig;
use cart_sync::telemetry;

mod commands;

#[derive(Parser)]
#[command(name = "cart-cli")]
#[command(author, version, about = "Cart sync CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Inspect and manage stored carts
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// Show a user's stored cart and its totals
    Show {
        /// User id owning the cart
        #[arg(short, long)]
        user: String,
    },
    /// Replace a user's stored cart with an empty one
    Clear {
        /// User id owning the cart
        #[arg(short, long)]
        user: String,
    },
    /// Merge this device's guest cart into a user's stored cart
    Merge {
        /// User id to merge into
        #[arg(short, long)]
        user: String,
    },
}

#[tokio::main]
async fn main() {
    let config = match CartSyncConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            #[allow(clippy::print_stderr)]
            {
                eprintln!("Failed to load configuration: {e}");
            }
            std::process::exit(2);
        }
    };

    // Sentry first so the tracing layer has a client
    let _sentry_guard = telemetry::init_sentry(&config);
    telemetry::init_tracing(&config);

    let cli = Cli::parse();

    if let Err(e) = run(cli, &config).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: &CartSyncConfig) -> cart_sync::Result<()> {
    match cli.command {
        Commands::Migrate => commands::migrate::run(config).await?,
        Commands::Cart { action } => match action {
            CartAction::Show { user } => commands::cart::show(config, &user.into()).await?,
            CartAction::Clear { user } => commands::cart::clear(config, &user.into()).await?,
            CartAction::Merge { user } => commands::cart::merge(config, &user.into()).await?,
        },
    }
    Ok(())
}
