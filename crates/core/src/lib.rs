//! Domain rules for QueryPilot that do not touch the network or a database.
//!
//! The API, store and target-database crates all build on these types.

pub mod chat;
pub mod confirmation;
pub mod connection;
pub mod error;
pub mod otp;
pub mod output;
pub mod preview;
pub mod sql_risk;
pub mod sql_text;
pub mod types;
