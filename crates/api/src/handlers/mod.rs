//! Request handlers, one module per resource.
//!
//! Handlers check the caller's rate limit, delegate to the repositories in
//! `querypilot_db` or to [`crate::engine`], and map failures via
//! [`AppError`](crate::error::AppError).

pub mod account;
pub mod auth;
pub mod chat;
pub mod chat_sessions;
pub mod connection;
pub mod health;
