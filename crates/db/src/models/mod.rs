//! Row structs and DTOs.
//!
//! Each submodule contains a `FromRow` entity matching the table row plus
//! the create/update DTOs its repository accepts.

pub mod chat_session;
pub mod otp;
pub mod refresh_token;
pub mod user;
