use querypilot_core::connection::ConnectError;

#[derive(Debug, thiserror::Error)]
pub enum TargetError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("Failed to read schema: {0}")]
    Schema(String),
}
