//! Shared response envelope types for API handlers.
//!
//! Chat-session and account responses use a `{ "data": ... }` envelope.
//! Connection, chat and confirmation endpoints answer with a
//! `{ "success": true, ... }` body instead, which clients of the chat UI
//! branch on.

use serde::Serialize;

/// Standard `{ "data": T }` response envelope.
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}

/// `{ "success": true, "message": ... }` acknowledgement.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}
