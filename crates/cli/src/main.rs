//! Cartseal CLI - migrations, key generation and token inspection.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront database migrations
//! cartseal migrate storefront
//!
//! # Generate a new identifier cipher key pair (prints .env lines)
//! cartseal keys generate
//!
//! # Encode / decode an identifier with the configured keys
//! cartseal token encode 64f1c0ffee
//! cartseal token decode '<token>'
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "cartseal")]
#[command(author, version, about = "Cartseal CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate {
        #[command(subcommand)]
        target: MigrateTarget,
    },
    /// Manage identifier cipher keys
    Keys {
        #[command(subcommand)]
        action: KeysAction,
    },
    /// Encode or decode opaque identifier tokens
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },
}

#[derive(Subcommand)]
enum MigrateTarget {
    /// Run storefront database migrations
    Storefront,
}

#[derive(Subcommand)]
enum KeysAction {
    /// Generate a new key pair and print it as environment variables
    Generate,
}

#[derive(Subcommand)]
enum TokenAction {
    /// Encode a plain identifier
    Encode {
        /// Identifier to encode
        id: String,
    },
    /// Decode a token back to its identifier
    Decode {
        /// Token as received from a client
        token: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate { target } => match target {
            MigrateTarget::Storefront => commands::migrate::storefront().await?,
        },
        Commands::Keys { action } => match action {
            KeysAction::Generate => output(&commands::keys::generate()),
        },
        Commands::Token { action } => {
            let keys = commands::token::key_pair_from_env()?;
            let text = match action {
                TokenAction::Encode { id } => commands::token::encode(&keys, &id)?,
                TokenAction::Decode { token } => commands::token::decode(&keys, &token)?,
            };
            output(&format!("{text}\n"));
        }
    }
    Ok(())
}

#[allow(clippy::print_stdout)]
fn output(text: &str) {
    print!("{text}");
}
