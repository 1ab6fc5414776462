//! Trace propagation header codec.
//!
//! Wire format (key names are case-sensitive):
//! `Root=<root>[;Parent=<parent>][;Sampled=<0|1|other>][;<Key>=<value>]...`
//!
//! Decoding normalizes the recognized fields to the order Root, Sampled,
//! Parent; unrecognized fields keep their relative order. Whitespace around
//! keys and values is stripped, so `Sampled= 1` is an explicit decision.
//! An empty `Root` or `Parent` counts as absent.

use crate::sampling::{self, SamplingRate};
use chrono::{DateTime, Utc};
use rand::RngCore;
use std::fmt;

/// Conventional HTTP header carrying the serialized trace.
pub const TRACE_HEADER_NAME: &str = "X-Amzn-Trace-Id";

const ROOT: &str = "Root";
const PARENT: &str = "Parent";
const SAMPLED: &str = "Sampled";

const ROOT_VERSION: &str = "1";
const EPOCH_HEX_LEN: usize = 8;
const RANDOM_HEX_LEN: usize = 24;

/// Tracing identity of one end-to-end request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trace {
    root: String,
    parent: Option<String>,
    sampled: bool,
    extra: Vec<(String, String)>,
}

impl Trace {
    /// Decode an inbound header value, resolving the sampling decision.
    ///
    /// A header without `Root` gets a freshly generated root.
    pub fn from_header_value(value: &str, rate: SamplingRate) -> Self {
        Self::from_header_value_at(value, rate, Utc::now())
    }

    /// Like [`Trace::from_header_value`], with the clock used for a missing root.
    pub fn from_header_value_at(value: &str, rate: SamplingRate, now: DateTime<Utc>) -> Self {
        let mut root = None;
        let mut parent = None;
        let mut sampled_raw = None;
        let mut extra: Vec<(String, String)> = Vec::new();

        for (key, val) in fields(value) {
            match key {
                ROOT if !val.is_empty() => root = Some(val.to_string()),
                PARENT if !val.is_empty() => parent = Some(val.to_string()),
                ROOT | PARENT => {}
                SAMPLED => sampled_raw = Some(val),
                _ => match extra.iter_mut().find(|(k, _)| k == key) {
                    Some(slot) => slot.1 = val.to_string(),
                    None => extra.push((key.to_string(), val.to_string())),
                },
            }
        }

        Self {
            root: root.unwrap_or_else(|| generate_root(now)),
            parent,
            sampled: sampling::decide(sampled_raw, rate),
            extra,
        }
    }

    /// Start a brand new trace at `now`.
    pub fn generate(now: DateTime<Utc>, rate: SamplingRate) -> Self {
        Self {
            root: generate_root(now),
            parent: None,
            sampled: sampling::decide(None, rate),
            extra: Vec::new(),
        }
    }

    /// The trace to propagate to a downstream call made from segment `parent_id`.
    pub fn child(&self, parent_id: impl Into<String>) -> Self {
        Self {
            root: self.root.clone(),
            parent: Some(parent_id.into()),
            sampled: self.sampled,
            extra: self.extra.clone(),
        }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub fn is_sampled(&self) -> bool {
        self.sampled
    }

    /// Unrecognized header fields in encounter order.
    pub fn extra_fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.extra.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn extra_field(&self, key: &str) -> Option<&str> {
        self.extra
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Roots are accepted as opaque strings on decode; this checks the
    /// `1-<8 hex>-<24 hex>` shape for callers that care.
    pub fn has_well_formed_root(&self) -> bool {
        let mut parts = self.root.split('-');
        let (Some(version), Some(epoch), Some(random), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return false;
        };
        version == ROOT_VERSION && is_hex(epoch, EPOCH_HEX_LEN) && is_hex(random, RANDOM_HEX_LEN)
    }

    /// Encode for the outbound header.
    pub fn to_header_value(&self) -> String {
        let mut out = format!(
            "{ROOT}={};{SAMPLED}={}",
            self.root,
            if self.sampled { "1" } else { "0" }
        );
        if let Some(parent) = &self.parent {
            out.push(';');
            out.push_str(PARENT);
            out.push('=');
            out.push_str(parent);
        }
        for (key, val) in &self.extra {
            out.push(';');
            out.push_str(key);
            out.push('=');
            out.push_str(val);
        }
        out
    }
}

impl fmt::Display for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_header_value())
    }
}

/// `key=value` pairs of a header value. Empty segments, segments without `=`
/// and empty keys are skipped.
fn fields(value: &str) -> impl Iterator<Item = (&str, &str)> {
    value.split(';').filter_map(|segment| {
        let (key, val) = segment.split_once('=')?;
        let key = key.trim();
        if key.is_empty() {
            return None;
        }
        Some((key, val.trim()))
    })
}

/// `1-<epoch seconds, 8 hex>-<96 random bits, 24 hex>`.
///
/// The epoch field is always 8 hex digits: instants before 1970 saturate to
/// `00000000` and instants past 2106-02-07T06:28:15Z saturate to `ffffffff`.
pub fn generate_root(now: DateTime<Utc>) -> String {
    let epoch = now.timestamp().clamp(0, i64::from(u32::MAX));
    let mut random = [0u8; RANDOM_HEX_LEN / 2];
    rand::thread_rng().fill_bytes(&mut random);
    format!(
        "{ROOT_VERSION}-{epoch:0width$x}-{}",
        hex::encode(random),
        width = EPOCH_HEX_LEN
    )
}

fn is_hex(s: &str, len: usize) -> bool {
    s.len() == len && s.bytes().all(|b| b.is_ascii_hexdigit())
}
