//! Authentication service.
//!
//! Password accounts only: merchant owners sign up through the wizard,
//! staff are invited by their owner and admins are created from the CLI.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use serde::Deserialize;
use sqlx::PgPool;

use queuehub_core::{Email, MerchantId, PlanTier, Slug, UserId, UserRole};

use crate::db::RepositoryError;
use crate::db::merchants::{CreatedAccount, MerchantRepository, NewAccount};
use crate::db::users::{NewUser, UserRepository};
use crate::models::User;

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Longest accepted name or address field.
const MAX_FIELD_LENGTH: usize = 200;

/// Step 1 of the signup wizard.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountStep {
    pub email: String,
    pub password: String,
    pub name: String,
}

/// Step 2 of the signup wizard.
#[derive(Debug, Clone, Deserialize)]
pub struct BusinessStep {
    pub name: String,
    pub phone: Option<String>,
    /// Requested public URL; derived from the name when absent.
    pub slug: Option<String>,
    #[serde(default)]
    pub plan: PlanTier,
}

/// Step 3 of the signup wizard.
#[derive(Debug, Clone, Deserialize)]
pub struct BranchStep {
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub city: String,
}

/// The whole wizard, submitted once at the end.
#[derive(Debug, Clone, Deserialize)]
pub struct SignupRequest {
    pub account: AccountStep,
    pub business: BusinessStep,
    pub branch: BranchStep,
}

/// A signup that passed field validation.
#[derive(Debug)]
struct ValidatedSignup {
    email: Email,
    owner_name: String,
    business_name: String,
    /// Explicitly requested slug, which must be free.
    requested_slug: Option<Slug>,
    /// Slug derived from the business name, suffixed if taken.
    derived_slug: Slug,
    phone: Option<String>,
    branch_name: String,
}

/// Authentication service.
pub struct AuthService<'a> {
    users: UserRepository<'a>,
    merchants: MerchantRepository<'a>,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            users: UserRepository::new(pool),
            merchants: MerchantRepository::new(pool),
        }
    }

    /// Create a merchant, its owner and first branch from a completed wizard.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail`, `AuthError::WeakPassword` or
    /// `AuthError::Validation` for bad input.
    /// Returns `AuthError::UserAlreadyExists` or `AuthError::SlugTaken` on conflicts.
    pub async fn signup(&self, request: &SignupRequest) -> Result<CreatedAccount, AuthError> {
        let valid = validate_signup(request)?;

        let slug = match valid.requested_slug {
            Some(slug) => {
                if self.merchants.slug_exists(&slug).await? {
                    return Err(AuthError::SlugTaken(slug.to_string()));
                }
                slug
            }
            None => self.merchants.available_slug(&valid.derived_slug).await?,
        };

        if self.users.get_by_email(&valid.email).await?.is_some() {
            return Err(AuthError::UserAlreadyExists);
        }

        let password_hash = hash_password(&request.account.password)?;

        self.merchants
            .create_account(&NewAccount {
                business_name: &valid.business_name,
                slug: &slug,
                phone: valid.phone.as_deref(),
                plan: request.business.plan,
                owner_email: &valid.email,
                owner_name: &valid.owner_name,
                password_hash: &password_hash,
                branch_name: &valid.branch_name,
                branch_address: request.branch.address.trim(),
                branch_city: request.branch.city.trim(),
            })
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(msg) if msg.contains("email") => {
                    AuthError::UserAlreadyExists
                }
                RepositoryError::Conflict(_) => AuthError::SlugTaken(slug.to_string()),
                other => AuthError::Repository(other),
            })
    }

    /// Login with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong.
    /// Returns `AuthError::AccountSuspended` if the user's merchant is suspended.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;

        let (user, password_hash) = self
            .users
            .get_with_password_hash(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &password_hash)?;

        if let Some(merchant_id) = user.merchant_id {
            let merchant = self.merchants.get(merchant_id).await?;
            if !merchant.status.allows_login() {
                return Err(AuthError::AccountSuspended);
            }
        }

        self.users.record_login(user.id).await?;
        Ok(user)
    }

    /// Change a password after checking the current one.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if `current` is wrong.
    /// Returns `AuthError::WeakPassword` if `new` doesn't meet requirements.
    pub async fn change_password(
        &self,
        user_id: UserId,
        current: &str,
        new: &str,
    ) -> Result<(), AuthError> {
        let hash = self
            .users
            .get_password_hash(user_id)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;
        verify_password(current, &hash)?;
        validate_password(new)?;

        let new_hash = hash_password(new)?;
        self.users.update_password(user_id, &new_hash).await?;
        Ok(())
    }

    /// Create a staff account for a merchant.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserAlreadyExists` if the email is taken.
    pub async fn create_staff(
        &self,
        merchant_id: MerchantId,
        email: &str,
        name: &str,
        password: &str,
    ) -> Result<User, AuthError> {
        self.create_user(email, name, password, UserRole::Staff, Some(merchant_id))
            .await
    }

    /// Create a platform admin.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserAlreadyExists` if the email is taken.
    pub async fn create_admin(
        &self,
        email: &str,
        name: &str,
        password: &str,
    ) -> Result<User, AuthError> {
        self.create_user(email, name, password, UserRole::Admin, None)
            .await
    }

    async fn create_user(
        &self,
        email: &str,
        name: &str,
        password: &str,
        role: UserRole,
        merchant_id: Option<MerchantId>,
    ) -> Result<User, AuthError> {
        let email = Email::parse(email)?;
        let name = required_field("name", name)?;
        validate_password(password)?;
        let password_hash = hash_password(password)?;

        self.users
            .create(&NewUser {
                email: &email,
                name: &name,
                password_hash: &password_hash,
                role,
                merchant_id,
            })
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => AuthError::UserAlreadyExists,
                other => AuthError::Repository(other),
            })
    }
}

fn validate_signup(request: &SignupRequest) -> Result<ValidatedSignup, AuthError> {
    let email = Email::parse(&request.account.email)?;
    validate_password(&request.account.password)?;
    let owner_name = required_field("your name", &request.account.name)?;
    let business_name = required_field("business name", &request.business.name)?;
    let branch_name = required_field("branch name", &request.branch.name)?;

    let requested_slug = match request.business.slug.as_deref().map(str::trim) {
        Some(s) if !s.is_empty() => Some(
            Slug::parse(s).map_err(|e| AuthError::Validation(format!("business URL: {e}")))?,
        ),
        _ => None,
    };
    let derived_slug = Slug::from_name(&business_name).map_err(|_| {
        AuthError::Validation("business name must contain letters or digits".to_owned())
    })?;

    let phone = request
        .business
        .phone
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_owned);

    Ok(ValidatedSignup {
        email,
        owner_name,
        business_name,
        requested_slug,
        derived_slug,
        phone,
        branch_name,
    })
}

/// Trim a required text field and check its length.
fn required_field(label: &str, value: &str) -> Result<String, AuthError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AuthError::Validation(format!("{label} is required")));
    }
    if value.chars().count() > MAX_FIELD_LENGTH {
        return Err(AuthError::Validation(format!(
            "{label} must be at most {MAX_FIELD_LENGTH} characters"
        )));
    }
    Ok(value.to_owned())
}

fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    if !password.chars().any(char::is_alphabetic) || !password.chars().any(|c| c.is_ascii_digit())
    {
        return Err(AuthError::WeakPassword(
            "password must contain a letter and a digit".to_owned(),
        ));
    }
    Ok(())
}

/// Hash a password using Argon2id.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn request() -> SignupRequest {
        serde_json::from_value(serde_json::json!({
            "account": { "email": "Owner@Corner.Cafe", "password": "espresso42", "name": "Ana" },
            "business": { "name": "The Corner Café", "phone": "  " },
            "branch": { "name": "Main Street" }
        }))
        .unwrap()
    }

    #[test]
    fn test_validate_signup_normalises_fields() {
        let valid = validate_signup(&request()).unwrap();
        assert_eq!(valid.email.as_str(), "owner@corner.cafe");
        assert_eq!(valid.derived_slug.as_str(), "the-corner-caf");
        assert!(valid.requested_slug.is_none());
        assert!(valid.phone.is_none());
    }

    #[test]
    fn test_signup_plan_defaults_to_free() {
        assert_eq!(request().business.plan, PlanTier::Free);
    }

    #[test]
    fn test_validate_signup_rejects_bad_slug() {
        let mut req = request();
        req.business.slug = Some("Not A Slug".to_owned());
        assert!(matches!(validate_signup(&req), Err(AuthError::Validation(_))));
    }

    #[test]
    fn test_validate_signup_requires_business_name() {
        let mut req = request();
        req.business.name = "   ".to_owned();
        assert!(matches!(validate_signup(&req), Err(AuthError::Validation(_))));
    }

    #[test]
    fn test_password_rules() {
        assert!(validate_password("short1").is_err());
        assert!(validate_password("longenough").is_err());
        assert!(validate_password("12345678").is_err());
        assert!(validate_password("queue1234").is_ok());
    }

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("queue1234").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("queue1234", &hash).is_ok());
        assert!(matches!(
            verify_password("queue12345", &hash),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_verify_rejects_malformed_hash() {
        assert!(matches!(
            verify_password("anything1", "not-a-phc-string"),
            Err(AuthError::InvalidCredentials)
        ));
    }
}
