//! The question-to-result flow shared by the chat, confirmation and
//! transcript-edit handlers.

pub mod pipeline;
