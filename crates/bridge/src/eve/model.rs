//! Model — wire envelope, sub-records and the normalized event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Tenant identity, threaded explicitly through parsing and fan-out.
///
/// There is no implicit default inside the core; the boundary that
/// admits a request or boots a process decides which tenant applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantId(pub u32);

impl TenantId {
    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Invalid JSON envelope: {0}")]
    InvalidJson(String),

    #[error("Non-UTF8 content")]
    NonUtf8,
}

/// Raw Suricata eve.json envelope.
///
/// Only the fields the pipeline consumes are modeled; everything else
/// in the line is ignored by serde and survives via `raw_payload` on
/// the normalized event. The wire format tolerates any combination of
/// sub-records being present; [`EveEnvelope::detail`] selects the one
/// the `event_type` tag says is active.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EveEnvelope {
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub flow_id: Option<u64>,
    #[serde(default)]
    pub in_iface: Option<String>,
    #[serde(default)]
    pub event_type: String,
    #[serde(default)]
    pub src_ip: String,
    #[serde(default)]
    pub src_port: u16,
    #[serde(default)]
    pub dest_ip: String,
    #[serde(default)]
    pub dest_port: u16,
    #[serde(default)]
    pub proto: String,

    pub alert: Option<AlertData>,
    pub ssh: Option<SshData>,
    pub http: Option<HttpData>,
    pub dns: Option<DnsData>,
    pub tls: Option<TlsData>,
    pub flow: Option<FlowData>,
}

/// The active sub-record of an envelope, selected by `event_type`.
#[derive(Debug, PartialEq)]
pub enum EventDetail<'a> {
    Alert(&'a AlertData),
    Ssh(&'a SshData),
    Http(&'a HttpData),
    Dns(&'a DnsData),
    Tls(&'a TlsData),
    Flow(&'a FlowData),
    /// Type tag unknown, or its sub-record is absent from the line.
    Other,
}

impl EveEnvelope {
    /// Select the sub-record named by the type tag.
    ///
    /// A sub-record present under a non-matching tag is ignored: the
    /// tag is authoritative.
    pub fn detail(&self) -> EventDetail<'_> {
        match self.event_type.as_str() {
            "alert" => self.alert.as_ref().map_or(EventDetail::Other, EventDetail::Alert),
            "ssh" => self.ssh.as_ref().map_or(EventDetail::Other, EventDetail::Ssh),
            "http" => self.http.as_ref().map_or(EventDetail::Other, EventDetail::Http),
            "dns" => self.dns.as_ref().map_or(EventDetail::Other, EventDetail::Dns),
            "tls" => self.tls.as_ref().map_or(EventDetail::Other, EventDetail::Tls),
            "flow" => self.flow.as_ref().map_or(EventDetail::Other, EventDetail::Flow),
            _ => EventDetail::Other,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AlertData {
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub gid: i32,
    #[serde(default)]
    pub signature_id: i32,
    #[serde(default)]
    pub rev: i32,
    #[serde(default)]
    pub signature: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub severity: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SshData {
    #[serde(default)]
    pub client: SshEndpoint,
    #[serde(default)]
    pub server: SshEndpoint,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SshEndpoint {
    #[serde(default)]
    pub proto_version: String,
    #[serde(default)]
    pub software_version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct HttpData {
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub url: String,
    #[serde(default, rename = "http_user_agent")]
    pub user_agent: String,
    #[serde(default, rename = "http_method")]
    pub method: String,
    #[serde(default)]
    pub protocol: String,
    #[serde(default)]
    pub status: i32,
    #[serde(default)]
    pub length: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DnsData {
    #[serde(default, rename = "type")]
    pub query_type: String,
    #[serde(default)]
    pub rrname: String,
    #[serde(default)]
    pub rrtype: String,
    #[serde(default)]
    pub rcode: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TlsData {
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub issuerdn: String,
    #[serde(default)]
    pub sni: String,
    #[serde(default)]
    pub version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FlowData {
    #[serde(default)]
    pub pkts_toserver: u64,
    #[serde(default)]
    pub pkts_toclient: u64,
    #[serde(default)]
    pub bytes_toserver: u64,
    #[serde(default)]
    pub bytes_toclient: u64,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub reason: String,
}

/// Normalized, enriched event — the broker wire format.
///
/// Serialized as JSON for publish; consumers deserialize back into
/// this exact shape, so a publish/consume round trip is
/// field-for-field equal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedEvent {
    pub tenant_id: u32,
    /// Event time. Never unset: falls back to ingestion wall-clock
    /// when the source timestamp is unparseable.
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub src_ip: String,
    pub src_port: u16,
    pub dest_ip: String,
    pub dest_port: u16,
    pub protocol: String,
    pub signature: String,
    pub severity: i32,
    pub category: String,
    pub action: String,
    pub country: String,
    pub city: String,
    pub latitude: f64,
    pub longitude: f64,
    /// The original eve.json line, verbatim.
    pub raw_payload: String,
    pub created_at: DateTime<Utc>,
}
