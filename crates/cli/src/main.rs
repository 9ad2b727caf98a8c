//! Cartsync CLI - drive a cart from the command line.
//!
//! # Usage
//!
//! ```bash
//! # Run the reference cart API
//! cartsync serve
//!
//! # Edit the anonymous cart stored on this device
//! cartsync add 42 --quantity 2
//! cartsync show
//!
//! # Sign in (merges the device cart once) and edit the account cart
//! cartsync --user-id alice set 42 5
//! cartsync --user-id alice remove 42
//! ```
//!
//! # Commands
//!
//! - `show` - Print the cart
//! - `add` - Add units of a variant
//! - `set` - Set the quantity of a variant (0 removes it)
//! - `remove` - Remove a variant
//! - `clear` - Remove every line
//! - `serve` - Run the in-memory reference cart API

#![cfg_attr(not(test), forbid(unsafe_code))]

use cartsync_core::VariantId;
use clap::{Parser, Subcommand};

mod commands;
mod telemetry;

use commands::cart::{CartAction, SignIn};

#[derive(Parser)]
#[command(name = "cartsync")]
#[command(author, version, about = "Cartsync command-line tools")]
struct Cli {
    /// Act as this signed-in user
    #[arg(long, global = true)]
    user_id: Option<String>,

    /// Session token for --user-id (requested from the server when omitted)
    #[arg(long, global = true, requires = "user_id")]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the cart
    Show,
    /// Add units of a variant
    Add {
        /// Variant ID
        variant_id: VariantId,

        /// Units to add
        #[arg(short, long, default_value_t = 1)]
        quantity: u32,
    },
    /// Set the quantity of a variant (0 removes it)
    Set {
        /// Variant ID
        variant_id: VariantId,

        /// New quantity
        quantity: u32,
    },
    /// Remove a variant
    Remove {
        /// Variant ID
        variant_id: VariantId,
    },
    /// Remove every line
    Clear,
    /// Run the in-memory reference cart API
    Serve,
}

#[tokio::main]
#[allow(clippy::print_stderr)]
async fn main() {
    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let action = match cli.command {
        Commands::Serve => {
            commands::serve::run().await?;
            return Ok(());
        }
        Commands::Show => CartAction::Show,
        Commands::Add {
            variant_id,
            quantity,
        } => CartAction::Add {
            variant_id,
            quantity,
        },
        Commands::Set {
            variant_id,
            quantity,
        } => CartAction::Set {
            variant_id,
            quantity,
        },
        Commands::Remove { variant_id } => CartAction::Remove { variant_id },
        Commands::Clear => CartAction::Clear,
    };

    let sign_in = SignIn {
        user_id: cli.user_id,
        token: cli.token,
    };
    commands::cart::run(sign_in, action).await?;
    Ok(())
}
