//! Core of the xtrace instrumentation stack: the trace propagation header
//! codec, the sampling decision, and the fire-and-forget segment client.

pub mod client;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod handler;
pub mod header;
pub mod sampling;

pub use client::{Client, MemoryTransport, SegmentRecord, Transport, UdpTransport};
pub use config::Config;
pub use endpoint::Endpoint;
pub use error::{ClientError, ConfigError};
pub use handler::{panic_message, DefaultErrorHandler, ErrorHandler, TracingErrorHandler};
pub use header::{Trace, TRACE_HEADER_NAME};
pub use sampling::SamplingRate;
