use crate::error::TraceError;
use crate::segment::{Namespace, Segment};
use chrono::Utc;
use futures::FutureExt;
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use xtrace_core::{panic_message, Client, Config, Trace};

#[derive(Debug, Clone)]
pub struct Tracer {
    config: Arc<Config>,
    client: Arc<Client>,
}

impl Tracer {
    /// Tracer sending over UDP to `config.daemon`, failures to stderr.
    pub fn new(config: Config) -> Self {
        let client = Client::with_endpoint(config.daemon.clone());
        Self::with_client(config, client)
    }

    pub fn with_client(config: Config, client: Client) -> Self {
        Self {
            config: Arc::new(config),
            client: Arc::new(client),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Open a scope for one request.
    ///
    /// `name` falls back to the configured service name; with neither set this
    /// fails before any work runs. `header_value` is the inbound propagation
    /// header, if the caller received one.
    pub fn start(&self, name: Option<&str>, header_value: Option<&str>) -> Result<Scope, TraceError> {
        let name = name
            .or(self.config.name.as_deref())
            .filter(|n| !n.is_empty())
            .ok_or(TraceError::MissingName)?;

        let rate = self.config.sampling_rate;
        let trace = match header_value {
            Some(value) => Trace::from_header_value(value, rate),
            None => Trace::generate(Utc::now(), rate),
        };
        let segment = Segment::begin(name, &trace);
        let emit = self.config.enabled && trace.is_sampled();

        tracing::debug!(
            trace = %trace,
            segment = %segment.id,
            sampled = trace.is_sampled(),
            "trace scope opened"
        );

        Ok(Scope {
            client: Arc::clone(&self.client),
            trace,
            segment,
            emit,
        })
    }
}

/// One request's trace and root segment.
#[derive(Debug)]
pub struct Scope {
    client: Arc<Client>,
    trace: Trace,
    segment: Segment,
    emit: bool,
}

impl Scope {
    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    pub fn segment(&self) -> &Segment {
        &self.segment
    }

    pub fn segment_mut(&mut self) -> &mut Segment {
        &mut self.segment
    }

    /// Whether segments of this scope will be sent.
    pub fn is_recording(&self) -> bool {
        self.emit
    }

    /// Header value for a downstream call made directly from the root segment.
    pub fn downstream_header(&self) -> String {
        self.trace.child(self.segment.id.clone()).to_header_value()
    }

    /// Run `work`, then send the root segment. An `Err` marks the segment
    /// faulted and is returned as-is after the segment is sent; a panic is
    /// recorded the same way and then resumed.
    pub fn run<T, E, F>(self, work: F) -> Result<T, E>
    where
        E: fmt::Display,
        F: FnOnce(&mut Segment) -> Result<T, E>,
    {
        let Scope {
            client,
            segment: mut root,
            emit,
            ..
        } = self;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| work(&mut root)));
        settle(&client, emit, root, outcome)
    }

    /// Async form of [`Scope::run`]. Deadlines are the caller's: wrap `work`
    /// in `tokio::time::timeout` and the elapsed error is recorded like any
    /// other failure.
    pub async fn run_async<T, E, Fut>(self, work: Fut) -> Result<T, E>
    where
        E: fmt::Display,
        Fut: Future<Output = Result<T, E>>,
    {
        let outcome = AssertUnwindSafe(work).catch_unwind().await;
        settle(&self.client, self.emit, self.segment, outcome)
    }

    /// Trace a nested unit of work, typically a call to another service.
    /// `work` receives the subsegment and the trace to propagate downstream.
    pub fn subsegment<T, E, F>(&self, name: &str, namespace: Option<Namespace>, work: F) -> Result<T, E>
    where
        E: fmt::Display,
        F: FnOnce(&mut Segment, &Trace) -> Result<T, E>,
    {
        let mut sub = Segment::begin_subsegment(name, &self.segment, namespace);
        let downstream = self.trace.child(sub.id.clone());
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| work(&mut sub, &downstream)));
        settle(&self.client, self.emit, sub, outcome)
    }
}

fn settle<T, E: fmt::Display>(
    client: &Client,
    emit: bool,
    mut segment: Segment,
    outcome: thread::Result<Result<T, E>>,
) -> Result<T, E> {
    match outcome {
        Ok(result) => {
            if let Err(err) = &result {
                segment.record_failure(err, Some(std::any::type_name::<E>()));
            }
            complete(client, emit, segment);
            result
        }
        Err(payload) => {
            segment.record_failure(&panic_message(payload.as_ref()), Some("panic"));
            complete(client, emit, segment);
            panic::resume_unwind(payload)
        }
    }
}

fn complete(client: &Client, emit: bool, mut segment: Segment) {
    segment.finish();
    if emit {
        client.send_segment(&segment);
    } else {
        tracing::debug!(segment = %segment.id, "trace not recorded; segment dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use xtrace_core::{MemoryTransport, SamplingRate};

    fn tracer(config: Config) -> (Tracer, MemoryTransport) {
        let transport = MemoryTransport::new();
        let client =
            Client::with_endpoint(config.daemon.clone()).with_transport(Arc::new(transport.clone()));
        (Tracer::with_client(config, client), transport)
    }

    #[test]
    fn test_configured_name_is_used() {
        let (t, _) = tracer(Config::default().with_name("svc"));
        let scope = t.start(None, None).unwrap();
        assert_eq!(scope.segment().name, "svc");

        let scope = t.start(Some("explicit"), None).unwrap();
        assert_eq!(scope.segment().name, "explicit");
    }

    #[test]
    fn test_missing_name() {
        let (t, transport) = tracer(Config::default());
        assert!(matches!(t.start(None, None), Err(TraceError::MissingName)));
        assert!(matches!(t.start(Some(""), None), Err(TraceError::MissingName)));
        assert!(transport.datagrams().is_empty());
    }

    #[test]
    fn test_inbound_header_continues_trace() {
        let (t, _) = tracer(Config::default().with_name("svc"));
        let scope = t
            .start(
                None,
                Some("Root=1-5759e988-bd862e3fe1be46a994272793;Parent=53995c3f42cd8ad8;Sampled=1"),
            )
            .unwrap();
        assert_eq!(scope.segment().trace_id, "1-5759e988-bd862e3fe1be46a994272793");
        assert_eq!(scope.segment().parent_id.as_deref(), Some("53995c3f42cd8ad8"));

        let downstream = scope.downstream_header();
        assert_eq!(
            downstream,
            format!(
                "Root=1-5759e988-bd862e3fe1be46a994272793;Sampled=1;Parent={}",
                scope.segment().id
            )
        );
    }

    #[test]
    fn test_unsampled_trace_sends_nothing() {
        let mut config = Config::default().with_name("svc");
        config.sampling_rate = SamplingRate::NEVER;
        let (t, transport) = tracer(config);

        let scope = t.start(None, None).unwrap();
        assert!(!scope.is_recording());
        let out = scope.run(|_| Ok::<_, Infallible>(42)).unwrap();

        assert_eq!(out, 42);
        assert!(transport.datagrams().is_empty());
    }

    #[test]
    fn test_disabled_config_sends_nothing() {
        let mut config = Config::default().with_name("svc");
        config.enabled = false;
        let (t, transport) = tracer(config);

        t.start(None, Some("Sampled=1"))
            .unwrap()
            .run(|_| Ok::<_, Infallible>(()))
            .unwrap();
        assert!(transport.datagrams().is_empty());
    }

    #[test]
    fn test_subsegment_is_sent_separately() {
        let (t, transport) = tracer(Config::default().with_name("svc"));
        let scope = t.start(None, None).unwrap();
        let root_id = scope.segment().id.clone();

        let header = scope
            .subsegment("inventory", Some(Namespace::Remote), |sub, downstream| {
                sub.set_http_status(200);
                Ok::<_, Infallible>(downstream.to_header_value())
            })
            .unwrap();
        scope.run(|_| Ok::<_, Infallible>(())).unwrap();

        let payloads = transport.payloads();
        assert_eq!(payloads.len(), 2);
        let sub: serde_json::Value =
            serde_json::from_str(payloads[0].split('\n').nth(1).unwrap()).unwrap();
        assert_eq!(sub["type"], "subsegment");
        assert_eq!(sub["parent_id"], serde_json::json!(root_id));
        assert!(header.ends_with(&format!("Parent={}", sub["id"].as_str().unwrap())));
    }

    #[test]
    fn test_panicking_subsegment_is_sent_then_resumed() {
        let (t, transport) = tracer(Config::default().with_name("svc"));
        let scope = t.start(None, None).unwrap();

        let caught = panic::catch_unwind(AssertUnwindSafe(|| {
            scope.subsegment("inventory", None, |_, _| -> Result<(), Infallible> {
                panic!("{} items", 3)
            })
        }));
        assert!(caught.is_err());

        let payloads = transport.payloads();
        assert_eq!(payloads.len(), 1);
        let sub: serde_json::Value =
            serde_json::from_str(payloads[0].split('\n').nth(1).unwrap()).unwrap();
        assert_eq!(sub["fault"], true);
        assert_eq!(sub["cause"]["exceptions"][0]["message"], "3 items");
        assert!(sub["end_time"].is_number());
    }
}
