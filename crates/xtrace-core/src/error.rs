use thiserror::Error;

/// Invalid or unreadable tracing configuration. Fatal at startup, never retried.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("sampling rate must be within [0, 1] (got {0})")]
    InvalidSamplingRate(f64),

    #[error("invalid daemon address '{0}': expected host:port")]
    InvalidEndpoint(String),

    #[error("service name must not be blank")]
    EmptyName,

    #[error("invalid value for {var}: '{value}'")]
    InvalidEnv { var: &'static str, value: String },

    #[error("config parse error: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure while delivering a segment to the collector.
///
/// These never reach the traced application; the segment client hands them
/// to the configured [`ErrorHandler`](crate::handler::ErrorHandler).
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to encode segment: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("segment record contains a newline")]
    EmbeddedNewline,

    #[error("failed to resolve {host}:{port}: {source}")]
    Resolve {
        host: String,
        port: u16,
        source: std::io::Error,
    },

    #[error("no address found for {host}:{port}")]
    NoAddress { host: String, port: u16 },

    #[error("invalid port {0}")]
    InvalidPort(u16),

    #[error("short send ({sent} of {len} bytes)")]
    Truncated { sent: usize, len: usize },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
