use xrayops_core::CoreError;

/// Errors produced by the log tail and its HTTP source.
#[derive(Debug, thiserror::Error)]
pub enum LogTailError {
    /// `start()` or `refresh()` while a tail session is live.
    #[error("A log tail session is already active")]
    AlreadyActive,

    /// The HTTP request itself failed (network, DNS, TLS, body read).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The log endpoint returned a non-2xx status code.
    #[error("Log endpoint returned HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// The byte stream broke after it was opened.
    #[error("Stream interrupted: {0}")]
    Stream(String),

    /// The one-shot refresh endpoint answered but reported failure.
    #[error("Log refresh failed: {0}")]
    Refresh(String),
}

impl LogTailError {
    /// Transport-level failures, as opposed to rejected requests.
    pub fn is_connection_failure(&self) -> bool {
        matches!(
            self,
            Self::Request(_) | Self::HttpStatus { .. } | Self::Stream(_)
        )
    }
}

impl From<LogTailError> for CoreError {
    fn from(err: LogTailError) -> Self {
        match err {
            LogTailError::AlreadyActive => CoreError::AlreadyActive,
            LogTailError::Refresh(reason) => CoreError::DecodeFailure(reason),
            other if other.is_connection_failure() => {
                CoreError::ConnectionFailure(other.to_string())
            }
            other => CoreError::DecodeFailure(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_is_a_connection_failure() {
        let err = LogTailError::HttpStatus {
            status: 502,
            body: "bad gateway".into(),
        };
        assert!(err.is_connection_failure());
        assert_eq!(err.to_string(), "Log endpoint returned HTTP 502: bad gateway");
        assert_eq!(
            CoreError::from(err),
            CoreError::ConnectionFailure("Log endpoint returned HTTP 502: bad gateway".into())
        );
    }

    #[test]
    fn already_active_maps_to_core_taxonomy() {
        assert!(!LogTailError::AlreadyActive.is_connection_failure());
        assert_eq!(CoreError::from(LogTailError::AlreadyActive), CoreError::AlreadyActive);
    }

    #[test]
    fn broken_stream_is_transient() {
        let core = CoreError::from(LogTailError::Stream("connection reset".into()));
        assert!(core.is_transient());
        assert_eq!(
            core,
            CoreError::ConnectionFailure("Stream interrupted: connection reset".into())
        );
    }

    #[test]
    fn refresh_failure_is_not_transient() {
        let core = CoreError::from(LogTailError::Refresh("backend reported failure".into()));
        assert_eq!(core, CoreError::DecodeFailure("backend reported failure".into()));
        assert!(!core.is_transient());
    }

    #[test]
    fn request_error_display() {
        let req_err = reqwest::Client::new().get("://bad").build().unwrap_err();
        let err = LogTailError::Request(req_err);
        assert!(err.to_string().contains("HTTP request failed"));
    }
}
