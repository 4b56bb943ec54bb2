//! Outbound notifications. Currently only OTP emails.

pub mod mailer;
