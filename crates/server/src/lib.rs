//! QueueHub server library.
//!
//! Marketing pages, the JSON API for dashboards and customer screens, and
//! the WebSocket relay that pushes queue changes live. The binary in
//! `main.rs` wires these up; integration tests build the same router
//! through [`routes::app`].

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod filters;
pub mod middleware;
pub mod models;
pub mod realtime;
pub mod routes;
pub mod services;
pub mod state;
