//! Segment client: frames a segment record and sends it as one datagram.
//!
//! Delivery is fire-and-forget. Every failure is turned into a
//! [`ClientError`] value and routed to the configured [`ErrorHandler`];
//! nothing is returned to, or panics in, the traced application.

use crate::endpoint::Endpoint;
use crate::error::ClientError;
use crate::handler::{self, DefaultErrorHandler, ErrorHandler};
use serde::Serialize;
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::sync::{Arc, Mutex, OnceLock};

/// First line of every datagram.
pub const FRAMING_HEADER: &str = r#"{"format":"json","version":1}"#;

/// Prefix of the message passed to the error handler.
pub const SEND_FAILURE_MESSAGE: &str = "Failed to send a segment";

const MESSAGE_PREVIEW_CHARS: usize = 1024;

/// Anything that can be encoded as a single-line JSON record.
pub trait SegmentRecord {
    fn to_record_json(&self) -> Result<String, serde_json::Error>;
}

impl<T: Serialize + ?Sized> SegmentRecord for T {
    fn to_record_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Frame a record body: header line, `\n`, body.
pub fn encode_payload(body: &str) -> Result<String, ClientError> {
    if body.contains('\n') {
        return Err(ClientError::EmbeddedNewline);
    }
    let mut payload = String::with_capacity(FRAMING_HEADER.len() + 1 + body.len());
    payload.push_str(FRAMING_HEADER);
    payload.push('\n');
    payload.push_str(body);
    Ok(payload)
}

/// Datagram sending seam of the client.
pub trait Transport: Send + Sync {
    fn send(&self, endpoint: &Endpoint, payload: &[u8]) -> Result<(), ClientError>;
}

/// Connectionless UDP transport. One non-blocking `send_to` per payload, no
/// retry. Local sockets are bound lazily, one per address family.
#[derive(Debug, Default)]
pub struct UdpTransport {
    v4: OnceLock<UdpSocket>,
    v6: OnceLock<UdpSocket>,
}

impl UdpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn socket_for(&self, target: &SocketAddr) -> Result<&UdpSocket, ClientError> {
        let (slot, local): (_, SocketAddr) = if target.is_ipv4() {
            (&self.v4, (Ipv4Addr::UNSPECIFIED, 0).into())
        } else {
            (&self.v6, (Ipv6Addr::UNSPECIFIED, 0).into())
        };
        if let Some(socket) = slot.get() {
            return Ok(socket);
        }
        let socket = UdpSocket::bind(local)?;
        socket.set_nonblocking(true)?;
        Ok(slot.get_or_init(|| socket))
    }
}

impl Transport for UdpTransport {
    fn send(&self, endpoint: &Endpoint, payload: &[u8]) -> Result<(), ClientError> {
        let target = endpoint.resolve()?;
        let sent = self.socket_for(&target)?.send_to(payload, target)?;
        if sent != payload.len() {
            return Err(ClientError::Truncated {
                sent,
                len: payload.len(),
            });
        }
        Ok(())
    }
}

/// Records payloads instead of sending them. Clones share the same buffer.
#[derive(Debug, Default, Clone)]
pub struct MemoryTransport {
    sent: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn datagrams(&self) -> Vec<Vec<u8>> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Datagrams decoded as UTF-8 (lossy).
    pub fn payloads(&self) -> Vec<String> {
        self.datagrams()
            .iter()
            .map(|d| String::from_utf8_lossy(d).into_owned())
            .collect()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

impl Transport for MemoryTransport {
    fn send(&self, _endpoint: &Endpoint, payload: &[u8]) -> Result<(), ClientError> {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(payload.to_vec());
        Ok(())
    }
}

pub struct Client {
    endpoint: Endpoint,
    transport: Arc<dyn Transport>,
    handler: Arc<dyn ErrorHandler>,
}

impl Client {
    /// Never fails: an unresolvable host or bad port surfaces at send time.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self::with_endpoint(Endpoint::new(host, port))
    }

    pub fn with_endpoint(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            transport: Arc::new(UdpTransport::new()),
            handler: Arc::new(DefaultErrorHandler::new()),
        }
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_error_handler(mut self, handler: Arc<dyn ErrorHandler>) -> Self {
        self.handler = handler;
        self
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Encode and send one segment. Failures go to the error handler.
    pub fn send_segment<S: SegmentRecord + ?Sized>(&self, segment: &S) {
        let body = match segment.to_record_json() {
            Ok(body) => body,
            Err(err) => {
                self.report(SEND_FAILURE_MESSAGE, &ClientError::Encode(err));
                return;
            }
        };

        let result = encode_payload(&body)
            .and_then(|payload| {
                self.transport
                    .send(&self.endpoint, payload.as_bytes())
                    .map(|()| payload.len())
            });

        match result {
            Ok(bytes) => {
                tracing::debug!(endpoint = %self.endpoint, bytes, "segment sent");
            }
            Err(err) => {
                let message = format!("{SEND_FAILURE_MESSAGE} '{}'", preview(&body));
                self.report(&message, &err);
            }
        }
    }

    fn report(&self, message: &str, error: &ClientError) {
        tracing::debug!(endpoint = %self.endpoint, error = %error, "segment delivery failed");
        handler::dispatch(self.handler.as_ref(), message, error);
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

fn preview(body: &str) -> std::borrow::Cow<'_, str> {
    match body.char_indices().nth(MESSAGE_PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &body[..cut]).into(),
        None => body.into(),
    }
}
