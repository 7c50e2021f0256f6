//! Database migration commands.
//!
//! # Usage
//!
//! ```bash
//! meridian migrate
//! ```
//!
//! # Migration Files
//!
//! Migrations live in `crates/db/migrations/` and are embedded at compile
//! time through [`meridian_db::MIGRATOR`]. Storefront and admin share one
//! database, so there is a single migration set.

use super::{ConnectError, connect};

/// Errors that can occur while migrating.
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Run all pending migrations.
///
/// # Errors
///
/// Returns an error if the database is unreachable or a migration fails.
pub async fn run() -> Result<(), MigrationError> {
    let pool = connect().await?;

    let known = meridian_db::MIGRATOR.iter().count();
    tracing::info!(known, "Running migrations...");
    meridian_db::MIGRATOR.run(&pool).await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
