//! Merchant dashboard API (`/api/merchant`).
//!
//! Every handler takes [`RequireMerchant`] and scopes its queries by the
//! session's merchant id, so another tenant's resources read as 404.
//! Structural changes (profile, branches, queue setup, staff) are limited
//! to the merchant owner; staff run the queues.
//!
//! ```text
//! GET    /profile                      PATCH  /profile
//! GET    /branches                     POST   /branches
//! GET    /branches/{id}                PATCH  /branches/{id}      DELETE /branches/{id}
//! GET    /queues?branch_id=            POST   /queues
//! GET    /queues/{id}                  PATCH  /queues/{id}        DELETE /queues/{id}
//! POST   /queues/{id}/status
//! GET    /queues/{id}/tickets?status=  POST   /queues/{id}/tickets (walk-in)
//! POST   /queues/{id}/call-next
//! GET    /queues/{id}/messages         POST   /queues/{id}/messages
//! GET    /tickets/{id}                 POST   /tickets/{id}/status
//! GET    /staff                        POST   /staff              DELETE /staff/{id}
//! GET    /activity
//! GET    /analytics?days=
//! ```

pub mod activity;
pub mod analytics;
pub mod branches;
pub mod messages;
pub mod profile;
pub mod queues;
pub mod staff;
pub mod tickets;

use axum::{
    Router,
    routing::{get, post},
};

use queuehub_core::PlanTier;

use crate::db::PlanLimited;
use crate::error::{AppError, Result};
use crate::middleware::RequireMerchant;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/profile", get(profile::show).patch(profile::update))
        .route("/branches", get(branches::index).post(branches::create))
        .route(
            "/branches/{id}",
            get(branches::show)
                .patch(branches::update)
                .delete(branches::destroy),
        )
        .route("/queues", get(queues::index).post(queues::create))
        .route(
            "/queues/{id}",
            get(queues::show)
                .patch(queues::update)
                .delete(queues::destroy),
        )
        .route("/queues/{id}/status", post(queues::set_status))
        .route(
            "/queues/{id}/tickets",
            get(tickets::index).post(tickets::walk_in),
        )
        .route("/queues/{id}/call-next", post(tickets::call_next))
        .route(
            "/queues/{id}/messages",
            get(messages::index).post(messages::create),
        )
        .route("/tickets/{id}", get(tickets::show))
        .route("/tickets/{id}/status", post(tickets::set_status))
        .route("/staff", get(staff::index).post(staff::create))
        .route("/staff/{id}", axum::routing::delete(staff::destroy))
        .route("/activity", get(activity::index))
        .route("/analytics", get(analytics::show))
}

/// Reject staff users.
pub(crate) fn require_owner(ctx: &RequireMerchant) -> Result<()> {
    if ctx.is_owner() {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "only the account owner can do this".to_string(),
        ))
    }
}

/// Unwrap a plan-limited insert, refusing with 403 once the plan is full.
pub(crate) fn within_plan<T>(
    outcome: PlanLimited<T>,
    label: &str,
    limit: fn(PlanTier) -> Option<i64>,
) -> Result<T> {
    match outcome {
        PlanLimited::Created(value) => Ok(value),
        PlanLimited::LimitReached { plan, existing } => Err(AppError::Forbidden(format!(
            "The {} plan allows {} {label}. Upgrade to add more.",
            plan.display_name(),
            limit(plan).unwrap_or(existing)
        ))),
    }
}

/// Trim a required name field.
pub(crate) fn required_name(label: &str, value: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::BadRequest(format!("{label} is required")));
    }
    if value.chars().count() > 200 {
        return Err(AppError::BadRequest(format!(
            "{label} must be at most 200 characters"
        )));
    }
    Ok(value.to_string())
}

/// Deserialize a field where `null` means "clear" and absence means "keep".
pub(crate) fn double_option<'de, D, T>(
    deserializer: D,
) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: serde::Deserialize<'de>,
{
    <Option<T> as serde::Deserialize>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "double_option")]
        max_size: Option<Option<i32>>,
    }

    #[test]
    fn test_double_option_distinguishes_null_from_missing() {
        let missing: Patch = serde_json::from_str("{}").unwrap();
        assert_eq!(missing.max_size, None);
        let cleared: Patch = serde_json::from_str(r#"{"max_size":null}"#).unwrap();
        assert_eq!(cleared.max_size, Some(None));
        let set: Patch = serde_json::from_str(r#"{"max_size":12}"#).unwrap();
        assert_eq!(set.max_size, Some(Some(12)));
    }

    #[test]
    fn test_within_plan_reports_limit() {
        let err = within_plan(
            PlanLimited::<()>::LimitReached {
                plan: PlanTier::Free,
                existing: 2,
            },
            "queue(s)",
            PlanTier::max_queues,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            AppError::Forbidden(msg) if msg == "The Starter plan allows 2 queue(s). Upgrade to add more."
        ));
        assert_eq!(
            within_plan(PlanLimited::Created(7), "branch(es)", PlanTier::max_branches).unwrap(),
            7
        );
    }

    #[test]
    fn test_required_name() {
        assert_eq!(required_name("name", "  Front desk ").unwrap(), "Front desk");
        assert!(required_name("name", "  ").is_err());
        assert!(required_name("name", &"x".repeat(201)).is_err());
    }
}
