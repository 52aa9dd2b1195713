//! Subscription plans shown on the pricing page and enforced on writes.

use serde::{Deserialize, Serialize};

use super::price::Price;

/// Subscription tier of a merchant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "queuehub.plan_tier", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PlanTier {
    #[default]
    Free,
    Pro,
    Enterprise,
}

impl PlanTier {
    /// Every tier, in pricing-page order.
    pub const ALL: [Self; 3] = [Self::Free, Self::Pro, Self::Enterprise];

    /// Human-readable plan name.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Free => "Starter",
            Self::Pro => "Pro",
            Self::Enterprise => "Enterprise",
        }
    }

    /// Short marketing line for the pricing card.
    #[must_use]
    pub const fn tagline(self) -> &'static str {
        match self {
            Self::Free => "For a single counter getting started with digital queues.",
            Self::Pro => "For growing businesses running several locations.",
            Self::Enterprise => "For chains that need unlimited scale and support.",
        }
    }

    /// Monthly price.
    #[must_use]
    pub fn monthly_price(self) -> Price {
        match self {
            Self::Free => Price::usd_cents(0),
            Self::Pro => Price::usd_cents(2900),
            Self::Enterprise => Price::usd_cents(19900),
        }
    }

    /// Maximum number of branches, `None` when unlimited.
    #[must_use]
    pub const fn max_branches(self) -> Option<i64> {
        match self {
            Self::Free => Some(1),
            Self::Pro => Some(5),
            Self::Enterprise => None,
        }
    }

    /// Maximum number of queues across all branches, `None` when unlimited.
    #[must_use]
    pub const fn max_queues(self) -> Option<i64> {
        match self {
            Self::Free => Some(2),
            Self::Pro => Some(25),
            Self::Enterprise => None,
        }
    }

    /// Feature bullets for the pricing card.
    #[must_use]
    pub const fn features(self) -> &'static [&'static str] {
        match self {
            Self::Free => &[
                "1 branch, 2 queues",
                "Live queue display",
                "Customer self check-in",
            ],
            Self::Pro => &[
                "Up to 5 branches, 25 queues",
                "Staff accounts",
                "Customer messaging",
                "Analytics dashboard",
            ],
            Self::Enterprise => &[
                "Unlimited branches and queues",
                "Activity audit log",
                "Priority support",
                "Dedicated onboarding",
            ],
        }
    }

    /// Whether a merchant currently holding `existing` branches may add one more.
    #[must_use]
    pub const fn allows_another_branch(self, existing: i64) -> bool {
        match self.max_branches() {
            Some(max) => existing < max,
            None => true,
        }
    }

    /// Whether a merchant currently holding `existing` queues may add one more.
    #[must_use]
    pub const fn allows_another_queue(self, existing: i64) -> bool {
        match self.max_queues() {
            Some(max) => existing < max,
            None => true,
        }
    }
}

impl std::fmt::Display for PlanTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Free => write!(f, "free"),
            Self::Pro => write!(f, "pro"),
            Self::Enterprise => write!(f, "enterprise"),
        }
    }
}

impl std::str::FromStr for PlanTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(Self::Free),
            "pro" => Ok(Self::Pro),
            "enterprise" => Ok(Self::Enterprise),
            _ => Err(format!("invalid plan: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_free_plan_limits() {
        assert!(PlanTier::Free.allows_another_branch(0));
        assert!(!PlanTier::Free.allows_another_branch(1));
        assert!(PlanTier::Free.allows_another_queue(1));
        assert!(!PlanTier::Free.allows_another_queue(2));
    }

    #[test]
    fn test_enterprise_is_unlimited() {
        assert!(PlanTier::Enterprise.allows_another_branch(10_000));
        assert!(PlanTier::Enterprise.allows_another_queue(10_000));
    }

    #[test]
    fn test_prices_increase_with_tier() {
        let prices: Vec<_> = PlanTier::ALL
            .iter()
            .map(|p| p.monthly_price().amount)
            .collect();
        assert!(prices.windows(2).all(|w| w[0] < w[1]));
        assert!(PlanTier::Free.monthly_price().is_free());
        assert_eq!(PlanTier::Pro.monthly_price().to_string(), "$29.00");
    }

    #[test]
    fn test_parse_roundtrip() {
        for plan in PlanTier::ALL {
            assert_eq!(plan.to_string().parse::<PlanTier>(), Ok(plan));
        }
    }
}
