//! Target-database connection profiles and the connection error taxonomy.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Schemas hidden from database listings.
pub const MYSQL_SYSTEM_DATABASES: &[&str] =
    &["information_schema", "mysql", "performance_schema", "sys"];
pub const POSTGRES_SYSTEM_DATABASES: &[&str] = &["postgres", "template0", "template1"];

/// Maximum database name length accepted by `create_database`.
pub const MAX_DATABASE_NAME_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DbEngine {
    Mysql,
    Postgresql,
}

impl DbEngine {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mysql => "mysql",
            Self::Postgresql => "postgresql",
        }
    }

    /// Name used in prompts and user-facing messages.
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Mysql => "MySQL",
            Self::Postgresql => "PostgreSQL",
        }
    }

    pub fn default_port(self) -> u16 {
        match self {
            Self::Mysql => 3306,
            Self::Postgresql => 5432,
        }
    }

    pub fn system_databases(self) -> &'static [&'static str] {
        match self {
            Self::Mysql => MYSQL_SYSTEM_DATABASES,
            Self::Postgresql => POSTGRES_SYSTEM_DATABASES,
        }
    }
}

impl Default for DbEngine {
    fn default() -> Self {
        Self::Mysql
    }
}

impl fmt::Display for DbEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Credentials identifying one target database server (and optionally a
/// database on it). Never persisted.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct ConnectionProfile {
    #[serde(default, alias = "db_type")]
    pub engine: DbEngine,
    pub host: String,
    pub port: u16,
    pub user: String,
    #[serde(default)]
    pub password: String,
    /// `None` when only verifying server credentials.
    #[serde(default)]
    pub database: Option<String>,
}

impl fmt::Debug for ConnectionProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionProfile")
            .field("engine", &self.engine)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .finish()
    }
}

impl ConnectionProfile {
    /// Copy of this profile pointing at `database`.
    pub fn with_database(&self, database: impl Into<String>) -> Self {
        Self {
            database: Some(database.into()),
            ..self.clone()
        }
    }

    /// Password-free summary safe to return to clients.
    pub fn summary(&self) -> ConnectionSummary {
        ConnectionSummary {
            engine: self.engine,
            host: self.host.clone(),
            port: self.port,
            user: self.user.clone(),
            database: self.database.clone(),
        }
    }

    /// Reject obviously unusable profiles before touching the network.
    pub fn validate(&self) -> Result<(), ConnectError> {
        if self.host.trim().is_empty() {
            return Err(ConnectError::new(
                ConnectErrorCode::HostNotFound,
                "Host must not be empty.",
            )
            .with_suggestion("Please provide the hostname or IP address of the server."));
        }
        if self.port == 0 {
            return Err(ConnectError::new(
                ConnectErrorCode::ConnectionRefused,
                "Port must be between 1 and 65535.",
            )
            .with_suggestion(format!(
                "The default {} port is {}.",
                self.engine.display_name(),
                self.engine.default_port()
            )));
        }
        if self.user.trim().is_empty() {
            return Err(ConnectError::new(
                ConnectErrorCode::AuthFailed,
                "User must not be empty.",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionSummary {
    pub engine: DbEngine,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub database: Option<String>,
}

/// Machine-readable connection failure codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectErrorCode {
    AuthFailed,
    ConnectionRefused,
    ConnectionTimeout,
    HostNotFound,
    NoDatabases,
    DatabaseNotFound,
    NetworkError,
    PermissionDenied,
    DatabaseExists,
    InvalidName,
    UnknownError,
}

impl ConnectErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AuthFailed => "AUTH_FAILED",
            Self::ConnectionRefused => "CONNECTION_REFUSED",
            Self::ConnectionTimeout => "CONNECTION_TIMEOUT",
            Self::HostNotFound => "HOST_NOT_FOUND",
            Self::NoDatabases => "NO_DATABASES",
            Self::DatabaseNotFound => "DATABASE_NOT_FOUND",
            Self::NetworkError => "NETWORK_ERROR",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::DatabaseExists => "DATABASE_EXISTS",
            Self::InvalidName => "INVALID_NAME",
            Self::UnknownError => "UNKNOWN_ERROR",
        }
    }

    /// Short title shown above the message.
    pub fn title(self) -> &'static str {
        match self {
            Self::AuthFailed => "Authentication Failed",
            Self::ConnectionRefused => "Connection Refused",
            Self::ConnectionTimeout => "Connection Timeout",
            Self::HostNotFound => "Host Not Found",
            Self::NoDatabases => "No Databases",
            Self::DatabaseNotFound => "Database Not Found",
            Self::NetworkError => "Network Error",
            Self::PermissionDenied => "Permission Denied",
            Self::DatabaseExists => "Database Already Exists",
            Self::InvalidName => "Invalid Database Name",
            Self::UnknownError => "Unknown Error",
        }
    }

    /// HTTP status the API answers with.
    pub fn http_status(self) -> u16 {
        match self {
            Self::AuthFailed => 401,
            Self::PermissionDenied => 403,
            Self::HostNotFound | Self::NoDatabases | Self::DatabaseNotFound => 404,
            Self::DatabaseExists => 409,
            Self::InvalidName => 400,
            Self::NetworkError => 502,
            Self::ConnectionRefused => 503,
            Self::ConnectionTimeout => 504,
            Self::UnknownError => 500,
        }
    }
}

impl fmt::Display for ConnectErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified connection or administration failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct ConnectError {
    pub code: ConnectErrorCode,
    pub message: String,
    pub suggestion: Option<String>,
}

impl ConnectError {
    pub fn new(code: ConnectErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            suggestion: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

/// Classify a driver-reported database error by its vendor code.
///
/// MySQL reports numeric codes, PostgreSQL five-character SQLSTATEs.
pub fn classify_database_code(
    code: &str,
    profile: &ConnectionProfile,
) -> Option<ConnectError> {
    let database = profile.database.as_deref().unwrap_or_default();
    let server = profile.engine.display_name();
    let err = match code {
        "1045" | "28P01" | "28000" => ConnectError::new(
            ConnectErrorCode::AuthFailed,
            format!("Invalid username or password for the {server} server."),
        )
        .with_suggestion(format!("Please verify your {server} username and password.")),
        "1049" | "3D000" => ConnectError::new(
            ConnectErrorCode::DatabaseNotFound,
            format!("The database '{database}' does not exist on the {server} server."),
        )
        .with_suggestion(match profile.engine {
            DbEngine::Mysql => format!("Please create the database first using: CREATE DATABASE `{database}`;"),
            DbEngine::Postgresql => format!("Please create the database first using: CREATE DATABASE \"{database}\";"),
        }),
        "1044" | "1142" | "42501" => ConnectError::new(
            ConnectErrorCode::PermissionDenied,
            format!("Your {server} user does not have permission for this operation."),
        )
        .with_suggestion("Ask the database administrator to grant the required privileges."),
        "1007" | "42P04" => ConnectError::new(
            ConnectErrorCode::DatabaseExists,
            format!("Database '{database}' already exists."),
        ),
        "2003" => refused(profile),
        "2013" => timed_out(server),
        _ => return None,
    };
    Some(err)
}

/// Classify a failure from its message text when no vendor code is present.
pub fn classify_message(message: &str, profile: &ConnectionProfile) -> ConnectError {
    let lower = message.to_ascii_lowercase();
    let server = profile.engine.display_name();

    if lower.contains("access denied") || lower.contains("password authentication failed") {
        return ConnectError::new(
            ConnectErrorCode::AuthFailed,
            format!("Invalid username or password for the {server} server."),
        )
        .with_suggestion(format!("Please verify your {server} username and password."));
    }
    if lower.contains("connection refused") || lower.contains("can't connect") {
        return refused(profile);
    }
    if lower.contains("timed out") || lower.contains("timeout") || lower.contains("lost connection") {
        return timed_out(server);
    }
    if lower.contains("failed to lookup address")
        || lower.contains("name or service not known")
        || lower.contains("no such host")
        || (lower.contains("host") && (lower.contains("unknown") || lower.contains("not found")))
    {
        return host_not_found(profile);
    }
    if lower.contains("network") || lower.contains("connection reset") || lower.contains("broken pipe") {
        return ConnectError::new(ConnectErrorCode::NetworkError, message.to_string())
            .with_suggestion("Please check your network connection and try again.");
    }
    ConnectError::new(ConnectErrorCode::UnknownError, message.to_string()).with_suggestion(
        "An unexpected error occurred. Please check your configuration and try again.",
    )
}

pub fn refused(profile: &ConnectionProfile) -> ConnectError {
    let server = profile.engine.display_name();
    ConnectError::new(
        ConnectErrorCode::ConnectionRefused,
        format!("Cannot connect to {server} server at {}:{}.", profile.host, profile.port),
    )
    .with_suggestion(format!(
        "Please verify the host and port are correct and the {server} server is running."
    ))
}

pub fn timed_out(server: &str) -> ConnectError {
    ConnectError::new(
        ConnectErrorCode::ConnectionTimeout,
        format!("Connection to {server} server timed out."),
    )
    .with_suggestion(format!(
        "Please check your network connection and {server} server status."
    ))
}

pub fn host_not_found(profile: &ConnectionProfile) -> ConnectError {
    ConnectError::new(
        ConnectErrorCode::HostNotFound,
        format!("Cannot resolve hostname '{}'.", profile.host),
    )
    .with_suggestion("Please verify the hostname or IP address is correct.")
}

/// Validate a name for `CREATE DATABASE`: letters, digits and `_`, at most
/// [`MAX_DATABASE_NAME_LEN`] characters.
pub fn validate_database_name(name: &str) -> Result<(), ConnectError> {
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ConnectError::new(
            ConnectErrorCode::InvalidName,
            "Database name can only contain letters, numbers, and underscores.",
        ));
    }
    if name.len() > MAX_DATABASE_NAME_LEN {
        return Err(ConnectError::new(
            ConnectErrorCode::InvalidName,
            format!("Database name must be {MAX_DATABASE_NAME_LEN} characters or less."),
        ));
    }
    Ok(())
}

/// Drop system schemas from a server's database list.
pub fn filter_user_databases(engine: DbEngine, names: Vec<String>) -> Vec<String> {
    let system = engine.system_databases();
    names
        .into_iter()
        .filter(|n| !system.contains(&n.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(engine: DbEngine) -> ConnectionProfile {
        ConnectionProfile {
            engine,
            host: "db.internal".into(),
            port: engine.default_port(),
            user: "app".into(),
            password: "hunter2".into(),
            database: Some("shop".into()),
        }
    }

    #[test]
    fn debug_output_redacts_password() {
        let debug = format!("{:?}", profile(DbEngine::Mysql));
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn profile_deserializes_db_type_alias() {
        let p: ConnectionProfile = serde_json::from_value(serde_json::json!({
            "db_type": "postgresql",
            "host": "localhost",
            "port": 5432,
            "user": "postgres",
            "database": "app"
        }))
        .unwrap();
        assert_eq!(p.engine, DbEngine::Postgresql);
        assert_eq!(p.password, "");
    }

    #[test]
    fn vendor_codes_map_to_taxonomy() {
        let mysql = profile(DbEngine::Mysql);
        let pg = profile(DbEngine::Postgresql);
        let code = |c: &str, p: &ConnectionProfile| classify_database_code(c, p).map(|e| e.code);

        assert_eq!(code("1045", &mysql), Some(ConnectErrorCode::AuthFailed));
        assert_eq!(code("28P01", &pg), Some(ConnectErrorCode::AuthFailed));
        assert_eq!(code("1049", &mysql), Some(ConnectErrorCode::DatabaseNotFound));
        assert_eq!(code("3D000", &pg), Some(ConnectErrorCode::DatabaseNotFound));
        assert_eq!(code("1044", &mysql), Some(ConnectErrorCode::PermissionDenied));
        assert_eq!(code("42P04", &pg), Some(ConnectErrorCode::DatabaseExists));
        assert_eq!(code("2003", &mysql), Some(ConnectErrorCode::ConnectionRefused));
        assert_eq!(code("2013", &mysql), Some(ConnectErrorCode::ConnectionTimeout));
        assert_eq!(code("99999", &mysql), None);
    }

    #[test]
    fn database_not_found_suggests_create_statement() {
        let err = classify_database_code("1049", &profile(DbEngine::Mysql)).unwrap();
        assert_eq!(
            err.suggestion.as_deref(),
            Some("Please create the database first using: CREATE DATABASE `shop`;")
        );
    }

    #[test]
    fn messages_map_to_taxonomy() {
        let p = profile(DbEngine::Mysql);
        let code = |m: &str| classify_message(m, &p).code;
        assert_eq!(code("Connection refused (os error 111)"), ConnectErrorCode::ConnectionRefused);
        assert_eq!(code("pool timed out while waiting"), ConnectErrorCode::ConnectionTimeout);
        assert_eq!(
            code("failed to lookup address information: Name or service not known"),
            ConnectErrorCode::HostNotFound
        );
        assert_eq!(code("connection reset by peer"), ConnectErrorCode::NetworkError);
        assert_eq!(code("something odd"), ConnectErrorCode::UnknownError);
    }

    #[test]
    fn http_statuses() {
        assert_eq!(ConnectErrorCode::AuthFailed.http_status(), 401);
        assert_eq!(ConnectErrorCode::ConnectionRefused.http_status(), 503);
        assert_eq!(ConnectErrorCode::ConnectionTimeout.http_status(), 504);
        assert_eq!(ConnectErrorCode::DatabaseNotFound.http_status(), 404);
    }

    #[test]
    fn database_name_validation() {
        assert!(validate_database_name("sales_2024").is_ok());
        assert_eq!(
            validate_database_name("drop table;").unwrap_err().code,
            ConnectErrorCode::InvalidName
        );
        assert!(validate_database_name("").is_err());
        assert!(validate_database_name(&"a".repeat(65)).is_err());
    }

    #[test]
    fn system_databases_are_filtered() {
        let names = vec!["mysql".into(), "shop".into(), "sys".into(), "crm".into()];
        assert_eq!(
            filter_user_databases(DbEngine::Mysql, names),
            vec!["shop".to_string(), "crm".to_string()]
        );
    }

    #[test]
    fn profile_validation() {
        let mut p = profile(DbEngine::Mysql);
        assert!(p.validate().is_ok());
        p.host = " ".into();
        assert_eq!(p.validate().unwrap_err().code, ConnectErrorCode::HostNotFound);
    }
}
