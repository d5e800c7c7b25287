// Error types for ConsulClient

/// Errors that can occur during a single Consul agent call
#[derive(Debug, thiserror::Error)]
pub enum ConsulError {
    #[error("Invalid registry endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Request failed with status {status}: {body}")]
    RequestFailed { status: u16, body: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ConsulError::RequestFailed {
            status: 500,
            body: "rpc error".to_string(),
        };
        assert_eq!(err.to_string(), "Request failed with status 500: rpc error");

        let err = ConsulError::InvalidEndpoint(String::new());
        assert_eq!(err.to_string(), "Invalid registry endpoint: ");
    }
}
