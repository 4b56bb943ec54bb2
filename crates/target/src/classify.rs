//! Map `sqlx` failures onto the connection error taxonomy.

use std::io::ErrorKind;

use querypilot_core::connection::{
    classify_database_code, classify_message, host_not_found, refused, timed_out, ConnectError,
    ConnectErrorCode, ConnectionProfile,
};

/// Classify a failure raised while connecting to or administering a target.
pub fn classify_sqlx_error(err: &sqlx::Error, profile: &ConnectionProfile) -> ConnectError {
    let server = profile.engine.display_name();
    match err {
        sqlx::Error::Database(db) => db
            .code()
            .and_then(|code| classify_database_code(&code, profile))
            .unwrap_or_else(|| classify_message(db.message(), profile)),
        sqlx::Error::Io(io) => match io.kind() {
            ErrorKind::ConnectionRefused => refused(profile),
            ErrorKind::TimedOut => timed_out(server),
            ErrorKind::NotFound | ErrorKind::AddrNotAvailable => host_not_found(profile),
            ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe
            | ErrorKind::UnexpectedEof => ConnectError::new(
                ConnectErrorCode::NetworkError,
                format!("Network error while talking to the {server} server: {io}"),
            )
            .with_suggestion("Please check your network connection and try again."),
            _ => classify_message(&io.to_string(), profile),
        },
        sqlx::Error::PoolTimedOut => timed_out(server),
        sqlx::Error::Tls(e) => ConnectError::new(
            ConnectErrorCode::NetworkError,
            format!("TLS negotiation with the {server} server failed: {e}"),
        ),
        other => classify_message(&other.to_string(), profile),
    }
}

/// Message shown for a statement that failed during execution.
pub fn execution_message(err: &sqlx::Error) -> String {
    match err {
        sqlx::Error::Database(db) => format!("Error executing query: {}", db.message()),
        other => format!("Error executing query: {other}"),
    }
}
