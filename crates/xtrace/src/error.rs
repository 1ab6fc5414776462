use thiserror::Error;

#[derive(Debug, Error)]
pub enum TraceError {
    #[error("segment name is missing: pass a name or set `name` in the tracing config")]
    MissingName,

    #[error("no global tracer installed")]
    NotInstalled,
}
