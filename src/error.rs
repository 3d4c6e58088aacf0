//! Typed errors at module boundaries, matching the teacher's mixed
//! `anyhow`/`thiserror` usage: callers that need to match on error kind
//! get a `thiserror` enum, everything else propagates `anyhow::Error`.

use thiserror::Error;

/// Errors surfaced by a single device `Session`.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("frame exceeds max size ({actual} > {max} bytes)")]
    FrameTooLarge { actual: usize, max: usize },

    #[error("authentication timed out after {0:?}")]
    AuthTimeout(std::time::Duration),

    #[error("authentication rejected by device")]
    AuthRejected,

    #[error("configuration load failed: {0}")]
    ConfigLoad(#[from] anyhow::Error),

    #[error("session shutting down")]
    Shutdown,
}

/// Errors surfaced by the connection `Pool` to its Admin Hooks callers.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("device {0} not found in pool")]
    NotFound(i64),

    #[error("pool is shutting down, ignoring request for device {0}")]
    Shutdown(i64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_too_large_formats_both_sizes() {
        let err = GatewayError::FrameTooLarge {
            actual: 100,
            max: 10,
        };
        let msg = err.to_string();
        assert!(msg.contains("100"));
        assert!(msg.contains("10"));
    }

    #[test]
    fn pool_shutdown_error_carries_device_id() {
        let err = PoolError::Shutdown(42);
        assert!(err.to_string().contains("42"));
    }
}
