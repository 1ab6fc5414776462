use crate::cli::args::PingArgs;
use crate::exit_codes::{SEND_FAILED, SUCCESS};
use anyhow::Context;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use xtrace::Tracer;
use xtrace_core::{Client, ClientError, Config, DefaultErrorHandler, ErrorHandler};

pub fn run(args: PingArgs) -> anyhow::Result<i32> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => Config::default(),
    };
    config.apply_env()?;
    config.validate()?;
    if let Some(addr) = &args.address {
        config.daemon = addr.parse()?;
    }

    let failed = Arc::new(Mutex::new(false));
    let stderr = DefaultErrorHandler::new();
    let flag = failed.clone();
    let handler = move |message: &str, error: &ClientError| -> anyhow::Result<()> {
        *flag.lock().unwrap_or_else(|e| e.into_inner()) = true;
        stderr.handle(message, error)
    };

    let endpoint = config.daemon.clone();
    let client = Client::with_endpoint(endpoint.clone()).with_error_handler(Arc::new(handler));
    let tracer = Tracer::with_client(config, client);

    let mut scope = tracer.start(Some(args.name.as_str()), args.header.as_deref())?;
    let recording = scope.is_recording();
    scope.segment_mut().annotate("probe", true);
    let header = scope.trace().to_header_value();
    let segment_id = scope.segment().id.clone();
    scope.run(|_| Ok::<_, Infallible>(()))?;

    if *failed.lock().unwrap_or_else(|e| e.into_inner()) {
        return Ok(SEND_FAILED);
    }
    if recording {
        println!("sent segment {segment_id} to {endpoint}");
    } else {
        tracing::warn!("trace is not sampled or tracing is disabled; nothing was sent");
    }
    println!("{header}");
    Ok(SUCCESS)
}
