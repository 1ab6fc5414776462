//! Request-scoped tracing on top of `xtrace-core`.
//!
//! A [`Tracer`] opens a [`Scope`] per request: it decodes (or creates) the
//! trace, opens a root [`Segment`], runs the wrapped work and sends the
//! finished segment. Failures of the work are recorded on the segment and
//! returned to the caller unchanged.

mod error;
pub mod global;
pub mod segment;
pub mod tracer;

pub use error::TraceError;
pub use segment::{Annotation, Namespace, Segment};
pub use tracer::{Scope, Tracer};
