//! HTTP API for QueryPilot: accounts, chat sessions, per-user database
//! connections and the confirmation gate for destructive SQL.

pub mod auth;
pub mod background;
pub mod config;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod notifications;
pub mod query;
pub mod rate_limit;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;
