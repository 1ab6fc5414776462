//! Process-wide tracer slot for production wiring. Libraries and tests should
//! prefer passing a [`Tracer`] explicitly.

use crate::error::TraceError;
use crate::tracer::{Scope, Tracer};
use std::sync::OnceLock;

static GLOBAL: OnceLock<Tracer> = OnceLock::new();

/// Install the process tracer. Fails (returning it back) if one is already set.
pub fn install(tracer: Tracer) -> Result<(), Tracer> {
    GLOBAL.set(tracer)
}

pub fn tracer() -> Option<&'static Tracer> {
    GLOBAL.get()
}

pub fn start(name: Option<&str>, header_value: Option<&str>) -> Result<Scope, TraceError> {
    tracer()
        .ok_or(TraceError::NotInstalled)?
        .start(name, header_value)
}
