//! QueueHub Core - Shared domain types.
//!
//! This crate provides the types used across all QueueHub components:
//! - `server` - Marketing site, REST API and live-update relay
//! - `cli` - Command-line tools for migrations and management
//!
//! # Architecture
//!
//! The core crate contains only types and traits - no I/O, no database access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, emails, slugs, prices, plans, statuses and relay events

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
