//! DaniThur CLI - Support tools for the checkout.
//!
//! # Usage
//!
//! ```bash
//! # Resolve a postal code through the configured lookup service
//! dt-cli postal lookup 01310-930
//!
//! # Ask the dealership backend whether a Pix charge was paid
//! dt-cli pix status e2e-7f3a9c
//!
//! # Preview how the checkout masks raw input
//! dt-cli mask card-number "4111111111111111"
//! ```
//!
//! # Commands
//!
//! - `postal lookup` - Look up a CEP (`POSTAL_LOOKUP_URL`)
//! - `pix status` - Check a Pix charge (`DANITHUR_API_URL`, `DANITHUR_API_TOKEN`)
//! - `mask` - Apply a checkout input mask

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

use commands::mask::MaskField;

#[derive(Parser)]
#[command(name = "dt-cli")]
#[command(author, version, about = "DaniThur checkout CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Postal code lookups
    Postal {
        #[command(subcommand)]
        action: PostalAction,
    },
    /// Pix payment checks
    Pix {
        #[command(subcommand)]
        action: PixAction,
    },
    /// Apply a checkout input mask to raw text
    Mask {
        /// Field whose mask to apply
        #[arg(value_enum)]
        field: MaskField,

        /// Raw input as a buyer would type it
        raw: String,
    },
}

#[derive(Subcommand)]
enum PostalAction {
    /// Resolve a postal code into street, neighborhood, city and state
    Lookup {
        /// Postal code, with or without the dash
        code: String,
    },
}

#[derive(Subcommand)]
enum PixAction {
    /// Ask the backend whether a Pix charge has been paid
    Status {
        /// Transaction id returned when the order was placed
        transaction_id: String,
    },
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
        Commands::Postal { action } => match action {
            PostalAction::Lookup { code } => commands::postal::lookup(&code).await?,
        },
        Commands::Pix { action } => match action {
            PixAction::Status { transaction_id } => {
                commands::pix::status(&transaction_id).await?;
            }
        },
        Commands::Mask { field, raw } => commands::mask::preview(field, &raw),
    }
    Ok(())
}
