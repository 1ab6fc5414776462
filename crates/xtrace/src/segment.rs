//! Segment documents as the collector expects them.

use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use xtrace_core::Trace;

/// Collector limit on segment names.
pub const MAX_NAME_CHARS: usize = 200;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Segment {
    pub name: String,
    pub id: String,
    pub trace_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub start_time: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<f64>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<SegmentKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<Namespace>,
    #[serde(skip_serializing_if = "is_false")]
    pub fault: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub error: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub throttle: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<Cause>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http: Option<Http>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, Annotation>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, Map<String, Value>>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    Subsegment,
}

/// `remote` marks a call to another traced service.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Namespace {
    Remote,
    Aws,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum Annotation {
    String(String),
    Number(f64),
    Bool(bool),
}

impl From<&str> for Annotation {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for Annotation {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<f64> for Annotation {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<i64> for Annotation {
    fn from(v: i64) -> Self {
        Self::Number(v as f64)
    }
}

impl From<bool> for Annotation {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct Cause {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<String>,
    pub exceptions: Vec<ExceptionRecord>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ExceptionRecord {
    pub id: String,
    pub message: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "is_false")]
    pub remote: bool,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct Http {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<HttpRequest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<HttpResponse>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct HttpRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_ip: Option<String>,
    #[serde(skip_serializing_if = "is_false")]
    pub x_forwarded_for: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub traced: bool,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct HttpResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_length: Option<u64>,
}

fn is_false(v: &bool) -> bool {
    !*v
}

impl Segment {
    /// Open the root segment of `trace` for this process.
    pub fn begin(name: &str, trace: &Trace) -> Self {
        Self::begin_at(name, trace, Utc::now())
    }

    pub fn begin_at(name: &str, trace: &Trace, now: DateTime<Utc>) -> Self {
        Self::open(
            name,
            trace.root().to_string(),
            trace.parent().map(str::to_string),
            now,
        )
    }

    /// Open a subsegment under `parent`; it is sent as its own document.
    pub fn begin_subsegment(name: &str, parent: &Segment, namespace: Option<Namespace>) -> Self {
        let mut sub = Self::open(
            name,
            parent.trace_id.clone(),
            Some(parent.id.clone()),
            Utc::now(),
        );
        sub.kind = Some(SegmentKind::Subsegment);
        sub.namespace = namespace;
        sub
    }

    fn open(name: &str, trace_id: String, parent_id: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            name: sanitize_name(name),
            id: new_segment_id(),
            trace_id,
            parent_id,
            start_time: epoch_seconds(now),
            end_time: None,
            kind: None,
            namespace: None,
            fault: false,
            error: false,
            throttle: false,
            cause: None,
            http: None,
            annotations: BTreeMap::new(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn finish(&mut self) {
        self.finish_at(Utc::now());
    }

    /// Idempotent: the first end time wins.
    pub fn finish_at(&mut self, now: DateTime<Utc>) {
        if self.end_time.is_none() {
            self.end_time = Some(epoch_seconds(now));
        }
    }

    pub fn is_finished(&self) -> bool {
        self.end_time.is_some()
    }

    /// Mark the segment faulted and record the failure as an exception.
    pub fn record_failure(&mut self, failure: &dyn fmt::Display, kind: Option<&str>) {
        self.fault = true;
        let exception = ExceptionRecord {
            id: new_segment_id(),
            message: failure.to_string(),
            kind: kind.map(str::to_string),
            remote: false,
        };
        self.cause
            .get_or_insert_with(|| Cause {
                working_directory: std::env::current_dir()
                    .ok()
                    .map(|p| p.display().to_string()),
                exceptions: Vec::new(),
            })
            .exceptions
            .push(exception);
    }

    /// Record the response status. 429 throttles, other 4xx are client
    /// errors, 5xx are faults.
    pub fn set_http_status(&mut self, status: u16) {
        match status {
            429 => {
                self.throttle = true;
                self.error = true;
            }
            400..=499 => self.error = true,
            500..=599 => self.fault = true,
            _ => {}
        }
        self.http
            .get_or_insert_with(Http::default)
            .response
            .get_or_insert_with(HttpResponse::default)
            .status = Some(status);
    }

    pub fn set_http_request(&mut self, request: HttpRequest) {
        self.http.get_or_insert_with(Http::default).request = Some(request);
    }

    pub fn annotate(&mut self, key: impl Into<String>, value: impl Into<Annotation>) {
        self.annotations.insert(key.into(), value.into());
    }

    pub fn add_metadata(&mut self, namespace: &str, key: impl Into<String>, value: Value) {
        self.metadata
            .entry(namespace.to_string())
            .or_default()
            .insert(key.into(), value);
    }
}

/// 64 random bits as 16 lowercase hex characters.
pub fn new_segment_id() -> String {
    let mut bytes = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn sanitize_name(name: &str) -> String {
    name.chars().take(MAX_NAME_CHARS).collect()
}

fn epoch_seconds(at: DateTime<Utc>) -> f64 {
    at.timestamp() as f64 + f64::from(at.timestamp_subsec_micros()) / 1_000_000.0
}
