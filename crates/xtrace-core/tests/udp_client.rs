//! Segment client against real UDP sockets: delivery framing and the
//! failure paths that must stay invisible to the caller.

use serde_json::{json, Value};
use std::io::Write;
use std::net::UdpSocket;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::fmt::MakeWriter;
use xtrace_core::{Client, ClientError, DefaultErrorHandler, ErrorHandler};

#[derive(Clone, Default)]
struct MockWriter {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl MockWriter {
    fn contents(&self) -> String {
        String::from_utf8(self.buf.lock().unwrap().clone()).unwrap()
    }
}

impl Write for MockWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buf.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }
    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for MockWriter {
    type Writer = MockWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn build_server() -> UdpSocket {
    let s = UdpSocket::bind("127.0.0.1:0").unwrap();
    s.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    s
}

fn client_with_diagnostics(host: &str, port: u16) -> (Client, MockWriter) {
    let io = MockWriter::default();
    let client = Client::new(host, port)
        .with_error_handler(Arc::new(DefaultErrorHandler::with_writer(io.clone())));
    (client, io)
}

#[test]
fn sends_given_segment() {
    let server = build_server();
    let port = server.local_addr().unwrap().port();
    let (client, io) = client_with_diagnostics("127.0.0.1", port);

    client.send_segment(&json!({ "id": "abc" }));

    let mut buf = [0u8; 1024];
    let (n, _) = server.recv_from(&mut buf).unwrap();
    let sent = std::str::from_utf8(&buf[..n]).unwrap();
    let parts: Vec<Value> = sent
        .split('\n')
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();

    assert_eq!(parts.len(), 2);
    assert_eq!(parts[0], json!({ "format": "json", "version": 1 }));
    assert_eq!(parts[1], json!({ "id": "abc" }));
    assert!(io.contents().is_empty());
}

#[test]
fn oversized_payload_is_reported_not_raised() {
    let server = build_server();
    let port = server.local_addr().unwrap().port();
    let (client, io) = client_with_diagnostics("127.0.0.1", port);

    client.send_segment(&json!({ "data": "abc".repeat(100_000) }));

    let out = io.contents();
    assert!(out.starts_with("Failed to send a segment"), "got: {out}");
    assert_eq!(out.lines().count(), 1);
}

#[test]
fn invalid_hostname_is_reported_not_raised() {
    let (client, io) = client_with_diagnostics("xtrace-invalid-host-name.invalid", 8000);
    client.send_segment(&json!({ "id": "abc" }));
    assert!(io.contents().contains("Failed to send a segment"));
}

#[test]
fn invalid_port_is_reported_not_raised() {
    let (client, io) = client_with_diagnostics("127.0.0.1", 0);
    client.send_segment(&json!({ "id": "abc" }));
    let out = io.contents();
    assert!(out.contains("Failed to send a segment"));
    assert!(out.contains("invalid port 0"));
}

#[test]
fn failing_handler_is_logged_to_diagnostics() {
    let diag = MockWriter::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(diag.clone())
        .with_ansi(false)
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let handler = |_: &str, _: &ClientError| -> anyhow::Result<()> { anyhow::bail!("test error") };
    let client = Client::new("127.0.0.1", 0).with_error_handler(Arc::new(handler));

    client.send_segment(&json!({ "id": "abc" }));

    let out = diag.contents();
    assert!(out.contains("test error"), "got: {out}");
    assert!(out.contains("ERROR"));
}

#[test]
fn panicking_handler_is_contained() {
    struct Exploding;
    impl ErrorHandler for Exploding {
        fn handle(&self, _: &str, _: &ClientError) -> anyhow::Result<()> {
            panic!("handler exploded");
        }
    }

    let diag = MockWriter::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(diag.clone())
        .with_ansi(false)
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let client = Client::new("127.0.0.1", 0).with_error_handler(Arc::new(Exploding));
    client.send_segment(&json!({ "id": "abc" }));

    assert!(diag.contents().contains("handler exploded"));
}
