//! Core types for QueueHub.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod event;
pub mod id;
pub mod plan;
pub mod price;
pub mod slug;
pub mod status;

pub use email::{Email, EmailError};
pub use event::{QueueEvent, Room, RoomParseError, TicketSnapshot};
pub use id::*;
pub use plan::PlanTier;
pub use price::{CurrencyCode, Price};
pub use slug::{Slug, SlugError};
pub use status::*;
