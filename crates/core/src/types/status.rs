//! Role and status enums for QueueHub entities.

use serde::{Deserialize, Serialize};

/// Role of a signed-in user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "queuehub.user_role", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// QueueHub staff with access across all merchants.
    Admin,
    /// Owner of a merchant account.
    Merchant,
    /// Operator of a merchant's queues, invited by the owner.
    Staff,
}

impl UserRole {
    /// Whether this role is tied to a single merchant.
    #[must_use]
    pub const fn is_tenant(self) -> bool {
        matches!(self, Self::Merchant | Self::Staff)
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Admin => write!(f, "admin"),
            Self::Merchant => write!(f, "merchant"),
            Self::Staff => write!(f, "staff"),
        }
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "merchant" => Ok(Self::Merchant),
            "staff" => Ok(Self::Staff),
            _ => Err(format!("invalid user role: {s}")),
        }
    }
}

/// Lifecycle status of a merchant account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "queuehub.merchant_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum MerchantStatus {
    /// Signed up, not yet reviewed.
    Pending,
    /// In good standing.
    #[default]
    Active,
    /// Disabled by an admin; users cannot log in and queues reject joins.
    Suspended,
}

impl MerchantStatus {
    /// Whether users of this merchant may sign in.
    #[must_use]
    pub const fn allows_login(self) -> bool {
        !matches!(self, Self::Suspended)
    }

    /// Whether customers may join this merchant's queues.
    #[must_use]
    pub const fn accepts_customers(self) -> bool {
        matches!(self, Self::Active)
    }
}

impl std::fmt::Display for MerchantStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Active => write!(f, "active"),
            Self::Suspended => write!(f, "suspended"),
        }
    }
}

/// Whether a queue is taking customers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "queuehub.queue_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    /// Accepting new tickets.
    #[default]
    Open,
    /// Serving existing tickets, not accepting new ones.
    Paused,
    /// Not operating.
    Closed,
}

impl QueueStatus {
    /// Only open queues hand out new tickets.
    #[must_use]
    pub const fn accepts_tickets(self) -> bool {
        matches!(self, Self::Open)
    }
}

impl std::fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Paused => write!(f, "paused"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Status of a ticket in a queue.
///
/// ```text
/// Waiting ──> Called ──> Serving ──> Completed
///    │  ^        │  │         │
///    │  └────────┘  └─> NoShow└──> Cancelled
///    └──────────────────────────> Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "queuehub.ticket_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    #[default]
    Waiting,
    Called,
    Serving,
    Completed,
    Cancelled,
    NoShow,
}

impl TicketStatus {
    /// Whether no further transitions are possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::NoShow)
    }

    /// Whether moving from `self` to `next` is allowed.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Waiting, Self::Called | Self::Cancelled)
                | (
                    Self::Called,
                    Self::Serving | Self::Waiting | Self::NoShow | Self::Cancelled
                )
                | (Self::Serving, Self::Completed | Self::Cancelled)
        )
    }
}

impl std::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Waiting => "waiting",
            Self::Called => "called",
            Self::Serving => "serving",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::NoShow => "no_show",
        };
        f.write_str(s)
    }
}
