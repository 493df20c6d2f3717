//! Stream Engine Adapter: an opaque façade over the append-only stream
//! substrate. Creates/deletes per-station streams and durable consumers,
//! fetches messages by filter subject within a bound, deletes messages by
//! sequence, and reports stream/consumer pending counts.
//!
//! [`StreamEngine`] is the seam the rest of the control plane programs
//! against; [`NatsStreamEngine`] is the real `async-nats` JetStream backed
//! implementation, [`fake::FakeEngine`] is an in-memory stand-in used by
//! tests that don't want a live NATS server.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use station_domain::error::Result;

pub mod nats;
pub use nats::NatsStreamEngine;

pub mod fake;
pub use fake::FakeEngine;

/// Fixed template for a station's dead-letter stream name.
pub fn dls_stream_name(internal_station: &str) -> String {
    format!("dls_{internal_station}")
}

#[derive(Debug, Clone)]
pub struct EngineMessage {
    pub sequence: u64,
    pub subject: String,
    pub headers: HashMap<String, String>,
    pub data: Vec<u8>,
    pub time_sent: DateTime<Utc>,
}

/// The Stream Engine Adapter contract. Implementations own their own
/// connection/session lifecycle; callers hold a shared handle (typically
/// `Arc<dyn StreamEngine>`).
#[async_trait]
pub trait StreamEngine: Send + Sync {
    /// Create the main stream and DLS stream for a newly-created native
    /// station. Idempotent: creating over an existing stream updates it.
    async fn create_station_streams(&self, internal_station: &str) -> Result<()>;

    /// Delete both streams for a destroyed station.
    async fn delete_station_streams(&self, internal_station: &str) -> Result<()>;

    /// Total message count currently held by a stream.
    async fn stream_message_count(&self, stream_name: &str) -> Result<u64>;

    /// Pending (unprocessed) and in-process (delivered, unacked) message
    /// counts for a durable consumer, used to populate consumer-group views.
    async fn consumer_pending(&self, stream_name: &str, durable_name: &str) -> Result<(u64, u64)>;

    /// Publish a message with no special headers.
    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<()>;

    /// Publish with explicit headers (used for DLS resend, which stamps
    /// `$memphis_pm_id`/`$memphis_pm_sequence`).
    async fn publish_with_headers(
        &self,
        subject: &str,
        headers: HashMap<String, String>,
        payload: Vec<u8>,
    ) -> Result<()>;

    /// Fetch up to `amount` messages matching `filter_subject` on `stream_name`,
    /// non-destructively (no ack, no stream mutation). Creates an ephemeral
    /// durable consumer named `consumer_name` for the duration of the call and
    /// removes it before returning, on every exit path, bounded by `timeout`.
    /// `consumer_name` is expected to come from a process-wide unique-id
    /// source (the "nuid") so concurrent calls never collide.
    async fn fetch_by_filter(
        &self,
        stream_name: &str,
        filter_subject: &str,
        amount: usize,
        timeout: Duration,
        consumer_name: &str,
    ) -> Result<Vec<EngineMessage>>;

    /// Ensure a durable consumer exists for a consumer-group's fan-out on
    /// `stream_name`, creating it on first call and leaving an existing one
    /// untouched on subsequent calls (members of the same group share one
    /// durable cursor; the engine handles fan-out across queue-group
    /// subscribers, not the control plane).
    async fn ensure_consumer(&self, stream_name: &str, durable_name: &str) -> Result<()>;

    /// Remove a durable consumer, called when the last live member of its
    /// consumer group is destroyed.
    async fn delete_consumer(&self, stream_name: &str, durable_name: &str) -> Result<()>;

    /// Remove a single message from a stream by its sequence number. This
    /// is the engine-level effect of acking a dead-letter message.
    async fn delete_message(&self, stream_name: &str, sequence: u64) -> Result<()>;

    /// Non-destructive direct lookup of a single message by sequence,
    /// independent of subject. Used by `GetMessageDetails`/journey lookup,
    /// which already knows the exact sequence and doesn't need the
    /// synthesized fetch-by-filter protocol. Returns `Ok(None)` when the
    /// sequence doesn't exist on the stream (already consumed/expired).
    async fn get_message(&self, stream_name: &str, sequence: u64) -> Result<Option<EngineMessage>>;
}
