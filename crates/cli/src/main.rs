//! Meridian CLI - Database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! meridian migrate
//!
//! # Create an admin user (or promote an existing account)
//! meridian admin create -e admin@example.com -n "Admin Name" -p 'long passphrase'
//!
//! # Load categories, sizes and products from YAML
//! meridian seed catalog.yaml
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `admin create` - Create admin users
//! - `seed` - Upsert catalog data from a YAML file
//!
//! # Environment Variables
//!
//! - `DATABASE_URL` - `PostgreSQL` connection string (read from `.env` too)

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "meridian")]
#[command(author, version, about = "Meridian CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage admin users
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
    /// Load catalog data from a YAML file
    Seed {
        /// Path to the YAML file
        file: String,
    },
}

#[derive(Subcommand)]
enum AdminAction {
    /// Create a new admin user
    Create {
        /// Admin email address
        #[arg(short, long)]
        email: String,

        /// Admin display name
        #[arg(short, long)]
        name: String,

        /// Sign-in password (at least 12 characters)
        #[arg(short, long)]
        password: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
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
            AdminAction::Create {
                email,
                name,
                password,
            } => {
                commands::admin::create_user(&email, &name, &password).await?;
            }
        },
        Commands::Seed { file } => {
            let report = commands::seed::catalog(&file).await?;
            if !report.conflicts.is_empty() {
                return Err(format!("{} products skipped", report.conflicts.len()).into());
            }
        }
    }
    Ok(())
}
