//! Platform admin and session management commands.
//!
//! # Environment Variables
//!
//! - `QUEUEHUB_DATABASE_URL` - `PostgreSQL` connection string
//! - `QUEUEHUB_ADMIN_PASSWORD` - Password for `admin create` when `--password` is omitted

use rand::distr::{Alphanumeric, SampleString};
use thiserror::Error;

use queuehub_core::Email;
use queuehub_server::db::UserRepository;
use queuehub_server::services::AuthService;

/// Length of generated admin passwords.
const GENERATED_PASSWORD_LENGTH: usize = 24;

/// Errors specific to admin commands.
#[derive(Debug, Error)]
pub enum AdminError {
    /// Invalid email.
    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    /// No user with this email.
    #[error("No user with email: {0}")]
    UnknownUser(String),
}

/// Create a platform admin.
///
/// # Errors
///
/// Returns an error if the email is taken, the password is too weak or the
/// database is unreachable.
pub async fn create(
    email: &str,
    name: &str,
    password: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let pool = super::connect().await?;

    let (password, generated) = match password
        .or_else(|| std::env::var("QUEUEHUB_ADMIN_PASSWORD").ok())
    {
        Some(password) => (password, false),
        None => (generate_password(), true),
    };

    tracing::info!("Creating admin user: {}", email);
    let user = AuthService::new(&pool)
        .create_admin(email, name, &password)
        .await?;
    tracing::info!(user_id = %user.id, "Admin user created");

    if generated {
        #[allow(clippy::print_stdout)]
        {
            println!("Admin {email} created with password: {password}");
            println!("Change it after the first login.");
        }
    }
    Ok(())
}

/// Revoke every session of the user with `email`.
///
/// # Errors
///
/// Returns an error if no such user exists or the database is unreachable.
pub async fn revoke_sessions(email: &str) -> Result<(), Box<dyn std::error::Error>> {
    let email = Email::parse(email).map_err(|_| AdminError::InvalidEmail(email.to_owned()))?;
    let pool = super::connect().await?;

    let user = UserRepository::new(&pool)
        .get_by_email(&email)
        .await?
        .ok_or_else(|| AdminError::UnknownUser(email.to_string()))?;

    let store = queuehub_server::db::PgSessionStore::new(pool);
    let revoked = store.destroy_for_user(user.id).await?;
    tracing::info!(user_id = %user.id, revoked, "Sessions revoked");
    Ok(())
}

/// Random alphanumeric password holding at least one letter and one digit.
fn generate_password() -> String {
    let mut rng = rand::rng();
    loop {
        let password = Alphanumeric.sample_string(&mut rng, GENERATED_PASSWORD_LENGTH);
        if password.chars().any(|c| c.is_ascii_alphabetic())
            && password.chars().any(|c| c.is_ascii_digit())
        {
            return password;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_password_shape() {
        let a = generate_password();
        let b = generate_password();
        assert_eq!(a.len(), GENERATED_PASSWORD_LENGTH);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert!(a.chars().any(|c| c.is_ascii_digit()));
        assert_ne!(a, b);
    }
}
