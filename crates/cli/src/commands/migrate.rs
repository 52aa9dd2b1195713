//! Database migration command.
//!
//! Applies `crates/server/migrations/` to the database named by
//! `QUEUEHUB_DATABASE_URL`. Already applied migrations are skipped.

/// Run pending migrations.
///
/// # Errors
///
/// Returns an error if the connection or a migration fails.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let pool = super::connect().await?;

    tracing::info!("Running migrations...");
    sqlx::migrate!("../server/migrations").run(&pool).await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
