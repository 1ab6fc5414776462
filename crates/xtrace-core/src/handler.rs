//! Error handler capability for failed segment deliveries.

use crate::error::ClientError;
use std::any::Any;
use std::fmt;
use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Mutex;

/// Receives transport failures reported by the segment client.
///
/// The return value only tells the client whether the handler itself failed;
/// either way the failure stays inside the client. A handler that returns
/// `Err` or panics is reported through `tracing::error!` only, so install a
/// `tracing` subscriber to see those reports.
pub trait ErrorHandler: Send + Sync {
    fn handle(&self, message: &str, error: &ClientError) -> anyhow::Result<()>;
}

impl<F> ErrorHandler for F
where
    F: Fn(&str, &ClientError) -> anyhow::Result<()> + Send + Sync,
{
    fn handle(&self, message: &str, error: &ClientError) -> anyhow::Result<()> {
        self(message, error)
    }
}

/// Writes one line per failure to a diagnostic writer (stderr by default).
pub struct DefaultErrorHandler {
    out: Mutex<Box<dyn Write + Send>>,
}

impl DefaultErrorHandler {
    pub fn new() -> Self {
        Self::with_writer(std::io::stderr())
    }

    pub fn with_writer<W: Write + Send + 'static>(writer: W) -> Self {
        Self {
            out: Mutex::new(Box::new(writer)),
        }
    }
}

impl Default for DefaultErrorHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DefaultErrorHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultErrorHandler").finish_non_exhaustive()
    }
}

impl ErrorHandler for DefaultErrorHandler {
    fn handle(&self, message: &str, error: &ClientError) -> anyhow::Result<()> {
        let mut out = self
            .out
            .lock()
            .map_err(|_| anyhow::anyhow!("diagnostic writer lock poisoned"))?;
        writeln!(out, "{message}: {error}")?;
        out.flush()?;
        Ok(())
    }
}

/// Reports failures as `tracing` warnings.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingErrorHandler;

impl ErrorHandler for TracingErrorHandler {
    fn handle(&self, message: &str, error: &ClientError) -> anyhow::Result<()> {
        tracing::warn!(error = %error, "{message}");
        Ok(())
    }
}

/// Invoke `handler`, containing both returned errors and panics.
pub(crate) fn dispatch(handler: &dyn ErrorHandler, message: &str, error: &ClientError) {
    match panic::catch_unwind(AssertUnwindSafe(|| handler.handle(message, error))) {
        Ok(Ok(())) => {}
        Ok(Err(handler_err)) => {
            tracing::error!(
                original = %error,
                "segment error handler failed: {handler_err:#}"
            );
        }
        Err(payload) => {
            tracing::error!(
                original = %error,
                "segment error handler panicked: {}",
                panic_message(payload.as_ref())
            );
        }
    }
}

/// Text of a caught panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
