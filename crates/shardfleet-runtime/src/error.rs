//! Container runtime error types.

use thiserror::Error;

/// Result type alias for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Errors that can occur while driving the container engine.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Engine unreachable or detection failed. Fatal at startup.
    #[error("container engine unavailable: {0}")]
    Unavailable(String),

    #[error("engine API error: {0}")]
    Engine(#[from] bollard::errors::Error),

    #[error("backend returned no handle for cluster {0}")]
    MissingHandle(u32),
}

/// True for engine responses that an idempotent teardown tolerates:
/// the unit is already stopped or already gone.
pub fn is_benign_teardown_error(err: &bollard::errors::Error) -> bool {
    matches!(
        err,
        bollard::errors::Error::DockerResponseServerError {
            status_code: 304 | 404 | 409,
            ..
        }
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use bollard::errors::Error;

    #[test]
    fn benign_codes_are_tolerated() {
        for code in [304, 404, 409] {
            let err = Error::DockerResponseServerError {
                status_code: code,
                message: "gone".into(),
            };
            assert!(is_benign_teardown_error(&err), "code {code}");
        }
    }

    #[test]
    fn server_errors_are_not_benign() {
        let err = Error::DockerResponseServerError {
            status_code: 500,
            message: "boom".into(),
        };
        assert!(!is_benign_teardown_error(&err));
    }
}
