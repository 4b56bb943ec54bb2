//! Access to user-supplied target databases.
//!
//! Credentials arrive per request and are never persisted. Each user holds
//! at most one [`ActiveConnection`], tracked by the [`ConnectionRegistry`].

pub mod classify;
pub mod error;
pub mod pool;
pub mod registry;
pub mod rows;
pub mod schema;

pub use error::TargetError;
pub use pool::TargetPool;
pub use registry::{ActiveConnection, ConnectionRegistry};
pub use schema::SchemaCache;
