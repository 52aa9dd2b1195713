//! Authentication API.
//!
//! ```text
//! POST /api/auth/signup    - Complete the signup wizard (201)
//! POST /api/auth/login     - Password login
//! POST /api/auth/logout    - End the session (204)
//! GET  /api/auth/me        - Current user and merchant
//! POST /api/auth/password  - Change password, revoking other sessions (204)
//! ```

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_sessions::Session;
use tracing::instrument;

use crate::db::{MerchantRepository, UserRepository};
use crate::error::{AppError, Result, clear_sentry_user, set_sentry_user};
use crate::middleware::{RequireAuth, clear_current_user, set_current_user};
use crate::models::activity::actions;
use crate::models::{Branch, CurrentUser, Merchant, NewActivity, User};
use crate::routes::api::record_activity;
use crate::services::AuthService;
use crate::services::auth::SignupRequest;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(me))
        .route("/password", post(change_password))
}

/// Login request body.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Password change request body.
#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// The signed-in user and, for tenants, their merchant.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user: User,
    pub merchant: Option<Merchant>,
}

/// Result of a completed signup.
#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub user: User,
    pub merchant: Merchant,
    pub branch: Branch,
}

/// Create a merchant account and sign its owner in.
#[instrument(skip_all)]
async fn signup(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<SignupRequest>,
) -> Result<(StatusCode, Json<SignupResponse>)> {
    let account = AuthService::new(state.pool()).signup(&request).await?;

    set_current_user(&session, &CurrentUser::from(&account.owner)).await?;
    set_sentry_user(&account.owner.id, Some(account.owner.email.as_str()));

    tracing::info!(
        merchant_id = %account.merchant.id,
        slug = %account.merchant.slug,
        "Merchant signed up"
    );

    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            user: account.owner,
            merchant: account.merchant,
            branch: account.branch,
        }),
    ))
}

/// Verify credentials and start a session.
#[instrument(skip_all)]
async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<LoginRequest>,
) -> Result<Json<SessionResponse>> {
    let user = AuthService::new(state.pool())
        .login(&request.email, &request.password)
        .await?;

    set_current_user(&session, &CurrentUser::from(&user)).await?;
    set_sentry_user(&user.id, Some(user.email.as_str()));

    let mut entry = NewActivity::new(actions::LOGIN, "user", user.id.as_i32()).by(user.id);
    if let Some(merchant_id) = user.merchant_id {
        entry = entry.merchant(merchant_id);
    }
    record_activity(&state, entry).await;

    let merchant = load_merchant(&state, &user).await?;
    Ok(Json(SessionResponse { user, merchant }))
}

/// End the session.
async fn logout(session: Session) -> Result<StatusCode> {
    clear_current_user(&session).await?;
    clear_sentry_user();
    Ok(StatusCode::NO_CONTENT)
}

/// Fresh copy of the signed-in user.
#[instrument(skip_all, fields(user_id = %current.id))]
async fn me(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(current): RequireAuth,
) -> Result<Json<SessionResponse>> {
    let Some(user) = UserRepository::new(state.pool())
        .get_by_id(current.id)
        .await?
    else {
        // The account was deleted while the session was alive.
        clear_current_user(&session).await?;
        return Err(AppError::Unauthorized("authentication required".to_string()));
    };

    let merchant = load_merchant(&state, &user).await?;
    Ok(Json(SessionResponse { user, merchant }))
}

/// Change the password and sign out every other session.
#[instrument(skip_all, fields(user_id = %user.id))]
async fn change_password(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<StatusCode> {
    AuthService::new(state.pool())
        .change_password(user.id, &request.current_password, &request.new_password)
        .await?;

    let revoked = match session.id() {
        Some(id) => state.sessions().destroy_other_sessions(user.id, &id).await?,
        None => state.sessions().destroy_for_user(user.id).await?,
    };

    let mut entry = NewActivity::new(actions::PASSWORD_CHANGED, "user", user.id.as_i32())
        .by(user.id)
        .details(json!({ "sessions_revoked": revoked }));
    if let Some(merchant_id) = user.merchant_id {
        entry = entry.merchant(merchant_id);
    }
    record_activity(&state, entry).await;

    Ok(StatusCode::NO_CONTENT)
}

async fn load_merchant(state: &AppState, user: &User) -> Result<Option<Merchant>> {
    match user.merchant_id {
        Some(id) => Ok(Some(MerchantRepository::new(state.pool()).get(id).await?)),
        None => Ok(None),
    }
}
