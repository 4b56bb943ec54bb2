//! Credentials and tokens.
//!
//! - [`password`] hashes and verifies account passwords.
//! - [`jwt`] issues bearer access tokens and opaque refresh tokens.

pub mod jwt;
pub mod password;
