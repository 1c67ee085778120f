/// Error taxonomy shared by the streaming controllers.
///
/// A user-initiated stop is not an error; it is the terminal
/// status [`SessionStatus::Stopped`](crate::session::SessionStatus::Stopped).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    /// The transport could not be established or was interrupted.
    #[error("Connection failure: {0}")]
    ConnectionFailure(String),

    /// Malformed bytes or JSON. Always recovered locally.
    #[error("Decode failure: {0}")]
    DecodeFailure(String),

    /// A start request arrived while a session was already live.
    #[error("A session is already active")]
    AlreadyActive,

    #[error("Validation failed: {0}")]
    Validation(String),
}

impl CoreError {
    /// Whether the failure is worth retrying on an always-on connection.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ConnectionFailure(_))
    }
}
