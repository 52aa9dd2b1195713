//! Server-rendered marketing pages.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::instrument;

use queuehub_core::PlanTier;

use crate::filters;
use crate::middleware::{OptionalAuth, RequireAuth};
use crate::state::AppState;

/// A product feature shown on the home and features pages.
pub struct Feature {
    pub title: &'static str,
    pub summary: &'static str,
    pub points: &'static [&'static str],
}

pub const FEATURES: &[Feature] = &[
    Feature {
        title: "Join from any phone",
        summary: "Customers scan a code or open your page, enter a name and get a ticket number. No app to install.",
        points: &[
            "Public page per business at /m/your-name",
            "Live position and estimated wait",
            "Leave the queue with one tap",
        ],
    },
    Feature {
        title: "Call the next customer",
        summary: "Staff call, serve and complete tickets from the dashboard while every screen updates instantly.",
        points: &[
            "Walk-ins added at the counter",
            "Requeue customers who step away",
            "Pause a queue without losing anyone",
        ],
    },
    Feature {
        title: "Message your queue",
        summary: "Send a note to everyone waiting or to a single customer when their turn is close.",
        points: &["Broadcast delays", "Direct messages to one ticket"],
    },
    Feature {
        title: "Branches and staff",
        summary: "Run several locations with their own queues and give each operator a separate login.",
        points: &[
            "Per-branch queues",
            "Owner and staff roles",
            "Activity log of every change",
        ],
    },
    Feature {
        title: "Know your numbers",
        summary: "See tickets issued and served, average wait and service times, per queue and per day.",
        points: &["Daily trends", "No-show and cancellation rates"],
    },
];

/// One card on the pricing page.
pub struct PlanCard {
    pub key: String,
    pub name: &'static str,
    pub price: String,
    pub tagline: &'static str,
    pub features: &'static [&'static str],
    pub highlighted: bool,
}

impl From<PlanTier> for PlanCard {
    fn from(plan: PlanTier) -> Self {
        Self {
            key: plan.to_string(),
            name: plan.display_name(),
            price: plan.monthly_price().to_string(),
            tagline: plan.tagline(),
            features: plan.features(),
            highlighted: plan == PlanTier::Pro,
        }
    }
}

#[derive(Template, WebTemplate)]
#[template(path = "pages/home.html")]
pub struct HomeTemplate {
    pub features: &'static [Feature],
}

#[derive(Template, WebTemplate)]
#[template(path = "pages/features.html")]
pub struct FeaturesTemplate {
    pub features: &'static [Feature],
}

#[derive(Template, WebTemplate)]
#[template(path = "pages/pricing.html")]
pub struct PricingTemplate {
    pub plans: Vec<PlanCard>,
}

#[derive(Template, WebTemplate)]
#[template(path = "pages/login.html")]
pub struct LoginTemplate {
    pub dashboard_url: String,
}

#[derive(Template, WebTemplate)]
#[template(path = "pages/signup.html")]
pub struct SignupTemplate {
    pub dashboard_url: String,
    pub plan_name: Option<&'static str>,
    pub plan_key: Option<String>,
}

#[derive(Template, WebTemplate)]
#[template(path = "pages/not_found.html")]
pub struct NotFoundTemplate;

#[derive(Debug, Deserialize)]
pub struct SignupQuery {
    pub plan: Option<String>,
}

pub async fn home() -> impl IntoResponse {
    HomeTemplate { features: FEATURES }
}

pub async fn features() -> impl IntoResponse {
    FeaturesTemplate { features: FEATURES }
}

pub async fn pricing() -> impl IntoResponse {
    PricingTemplate {
        plans: PlanTier::ALL.into_iter().map(PlanCard::from).collect(),
    }
}

/// Hand a signed-in visitor over to the dashboard app. Anyone else is
/// redirected to `/login` by the extractor.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn dashboard(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Redirect {
    Redirect::to(&state.config().dashboard_url)
}

/// Signed-in visitors skip straight to the dashboard.
pub async fn login(State(state): State<AppState>, OptionalAuth(user): OptionalAuth) -> Response {
    if user.is_some() {
        return Redirect::to("/dashboard").into_response();
    }
    LoginTemplate {
        dashboard_url: state.config().dashboard_url.clone(),
    }
    .into_response()
}

/// Unknown `?plan=` values are ignored.
#[instrument(skip_all)]
pub async fn signup(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    Query(query): Query<SignupQuery>,
) -> Response {
    if user.is_some() {
        return Redirect::to("/dashboard").into_response();
    }
    let plan = query.plan.and_then(|p| p.parse::<PlanTier>().ok());
    SignupTemplate {
        dashboard_url: state.config().dashboard_url.clone(),
        plan_name: plan.map(PlanTier::display_name),
        plan_key: plan.map(|p| p.to_string()),
    }
    .into_response()
}

pub async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, NotFoundTemplate)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_pricing_highlights_pro() {
        let cards: Vec<PlanCard> = PlanTier::ALL.into_iter().map(PlanCard::from).collect();
        assert_eq!(cards.len(), 3);
        assert!(cards.iter().filter(|c| c.highlighted).all(|c| c.key == "pro"));
        assert_eq!(cards[0].price, "$0.00");
    }

    #[test]
    fn test_pricing_renders_signup_links() {
        let html = PricingTemplate {
            plans: PlanTier::ALL.into_iter().map(PlanCard::from).collect(),
        }
        .render()
        .unwrap();
        assert!(html.contains("/signup?plan=enterprise"));
        assert!(html.contains("$29.00"));
    }

    #[test]
    fn test_signup_mentions_chosen_plan() {
        let html = SignupTemplate {
            dashboard_url: "https://app.queuehub.app".to_owned(),
            plan_name: Some("Pro"),
            plan_key: Some("pro".to_owned()),
        }
        .render()
        .unwrap();
        assert!(html.contains("<strong>Pro</strong>"));
        assert!(html.contains("https://app.queuehub.app/signup?plan=pro"));
    }

    #[test]
    fn test_home_lists_features() {
        let html = HomeTemplate { features: FEATURES }.render().unwrap();
        for feature in FEATURES {
            assert!(html.contains(feature.title));
        }
    }
}
