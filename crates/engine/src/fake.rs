//! In-memory [`StreamEngine`] used by tests that exercise Station Lifecycle
//! Service / Dead-Letter Inspector logic without a live NATS server.
//!
//! Mirrors the shape of a real JetStream deployment closely enough to drive
//! the control plane's consistency logic: streams are named maps of
//! sequence-ordered messages, "durable consumers" are tracked only far
//! enough to assert they get created and torn down, and `fetch_by_filter`
//! matches on an exact subject (no wildcard support — tests that need
//! filtering route distinct kinds to distinct subjects).

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use station_domain::error::{Error, Result};

use crate::EngineMessage;

struct FakeStream {
    messages: Vec<EngineMessage>,
}

#[derive(Default)]
struct Inner {
    streams: HashMap<String, FakeStream>,
    durable_consumers: HashMap<String, Vec<String>>,
}

/// In-memory stand-in for the append-only stream substrate.
pub struct FakeEngine {
    inner: Mutex<Inner>,
}

impl Default for FakeEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeEngine {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Test helper: seed `stream_name` with a message under `subject`,
    /// returning its assigned sequence.
    pub fn seed_message(&self, stream_name: &str, subject: &str, data: Vec<u8>) -> u64 {
        let mut inner = self.inner.lock();
        let stream = inner
            .streams
            .entry(stream_name.to_string())
            .or_insert_with(|| FakeStream { messages: Vec::new() });
        let sequence = stream.messages.len() as u64 + 1;
        stream.messages.push(EngineMessage {
            sequence,
            subject: subject.to_string(),
            headers: HashMap::new(),
            data,
            time_sent: chrono::Utc::now(),
        });
        sequence
    }

    /// Test helper: does this stream currently exist?
    pub fn stream_exists(&self, stream_name: &str) -> bool {
        self.inner.lock().streams.contains_key(stream_name)
    }

    /// Test helper: published messages captured by subject, newest last.
    pub fn published_to(&self, subject: &str) -> Vec<EngineMessage> {
        self.inner
            .lock()
            .streams
            .values()
            .flat_map(|s| s.messages.iter())
            .filter(|m| m.subject == subject)
            .cloned()
            .collect()
    }

    /// Test helper: count of currently-registered durable consumers on a
    /// stream, to assert cleanup happened.
    pub fn durable_consumer_count(&self, stream_name: &str) -> usize {
        self.inner
            .lock()
            .durable_consumers
            .get(stream_name)
            .map(|v| v.len())
            .unwrap_or(0)
    }
}

const PUBLISH_STREAM: &str = "__published__";

#[async_trait]
impl crate::StreamEngine for FakeEngine {
    async fn create_station_streams(&self, internal_station: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        inner
            .streams
            .entry(internal_station.to_string())
            .or_insert_with(|| FakeStream { messages: Vec::new() });
        inner
            .streams
            .entry(crate::dls_stream_name(internal_station))
            .or_insert_with(|| FakeStream { messages: Vec::new() });
        Ok(())
    }

    async fn delete_station_streams(&self, internal_station: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.streams.remove(internal_station);
        inner.streams.remove(&crate::dls_stream_name(internal_station));
        Ok(())
    }

    async fn stream_message_count(&self, stream_name: &str) -> Result<u64> {
        let inner = self.inner.lock();
        let stream = inner
            .streams
            .get(stream_name)
            .ok_or_else(|| Error::StreamMissing(stream_name.to_string()))?;
        Ok(stream.messages.len() as u64)
    }

    async fn consumer_pending(&self, stream_name: &str, _durable_name: &str) -> Result<(u64, u64)> {
        let inner = self.inner.lock();
        inner
            .streams
            .get(stream_name)
            .ok_or_else(|| Error::StreamMissing(stream_name.to_string()))?;
        // No live subscriber semantics in the fake: everything is pending,
        // nothing is in-flight.
        let count = inner.streams.get(stream_name).map(|s| s.messages.len()).unwrap_or(0);
        Ok((count as u64, 0))
    }

    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<()> {
        self.publish_with_headers(subject, HashMap::new(), payload).await
    }

    async fn publish_with_headers(
        &self,
        subject: &str,
        headers: HashMap<String, String>,
        payload: Vec<u8>,
    ) -> Result<()> {
        let mut inner = self.inner.lock();
        let stream = inner
            .streams
            .entry(PUBLISH_STREAM.to_string())
            .or_insert_with(|| FakeStream { messages: Vec::new() });
        let sequence = stream.messages.len() as u64 + 1;
        stream.messages.push(EngineMessage {
            sequence,
            subject: subject.to_string(),
            headers,
            data: payload,
            time_sent: chrono::Utc::now(),
        });
        Ok(())
    }

    async fn fetch_by_filter(
        &self,
        stream_name: &str,
        filter_subject: &str,
        amount: usize,
        _timeout: Duration,
        consumer_name: &str,
    ) -> Result<Vec<EngineMessage>> {
        let durable = consumer_name.to_string();
        {
            let mut inner = self.inner.lock();
            if !inner.streams.contains_key(stream_name) {
                return Err(Error::StreamMissing(stream_name.to_string()));
            }
            inner
                .durable_consumers
                .entry(stream_name.to_string())
                .or_default()
                .push(durable.clone());
        }

        let collected = {
            let inner = self.inner.lock();
            inner
                .streams
                .get(stream_name)
                .map(|s| {
                    s.messages
                        .iter()
                        .filter(|m| m.subject == filter_subject)
                        .take(amount)
                        .cloned()
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default()
        };

        // Consumer cleanup on every exit path, mirroring the real adapter.
        let mut inner = self.inner.lock();
        if let Some(list) = inner.durable_consumers.get_mut(stream_name) {
            list.retain(|d| d != &durable);
        }

        Ok(collected)
    }

    async fn ensure_consumer(&self, stream_name: &str, durable_name: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        if !inner.streams.contains_key(stream_name) {
            return Err(Error::StreamMissing(stream_name.to_string()));
        }
        let names = inner.durable_consumers.entry(stream_name.to_string()).or_default();
        if !names.iter().any(|n| n == durable_name) {
            names.push(durable_name.to_string());
        }
        Ok(())
    }

    async fn delete_consumer(&self, stream_name: &str, durable_name: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        if let Some(names) = inner.durable_consumers.get_mut(stream_name) {
            names.retain(|n| n != durable_name);
        }
        Ok(())
    }

    async fn delete_message(&self, stream_name: &str, sequence: u64) -> Result<()> {
        let mut inner = self.inner.lock();
        let stream = inner
            .streams
            .get_mut(stream_name)
            .ok_or_else(|| Error::StreamMissing(stream_name.to_string()))?;
        let before = stream.messages.len();
        stream.messages.retain(|m| m.sequence != sequence);
        if stream.messages.len() == before {
            return Err(Error::NotFound(format!("sequence {sequence} on {stream_name}")));
        }
        Ok(())
    }

    async fn get_message(&self, stream_name: &str, sequence: u64) -> Result<Option<EngineMessage>> {
        let inner = self.inner.lock();
        let stream = inner
            .streams
            .get(stream_name)
            .ok_or_else(|| Error::StreamMissing(stream_name.to_string()))?;
        Ok(stream.messages.iter().find(|m| m.sequence == sequence).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StreamEngine;

    #[tokio::test]
    async fn create_then_delete_station_streams() {
        let engine = FakeEngine::new();
        engine.create_station_streams("orders").await.unwrap();
        assert!(engine.stream_exists("orders"));
        assert!(engine.stream_exists(&crate::dls_stream_name("orders")));

        engine.delete_station_streams("orders").await.unwrap();
        assert!(!engine.stream_exists("orders"));
    }

    #[tokio::test]
    async fn fetch_by_filter_respects_amount_and_cleans_up_consumer() {
        let engine = FakeEngine::new();
        engine.create_station_streams("orders").await.unwrap();
        let dls = crate::dls_stream_name("orders");
        engine.seed_message(&dls, "dls.orders.poison", b"one".to_vec());
        engine.seed_message(&dls, "dls.orders.poison", b"two".to_vec());
        engine.seed_message(&dls, "dls.orders.poison", b"three".to_vec());

        let got = engine
            .fetch_by_filter(&dls, "dls.orders.poison", 2, Duration::from_secs(1), "dls-fetch-0-test")
            .await
            .unwrap();
        assert_eq!(got.len(), 2);
        assert_eq!(engine.durable_consumer_count(&dls), 0);
    }

    #[tokio::test]
    async fn fetch_by_filter_on_missing_stream_fails() {
        let engine = FakeEngine::new();
        let err = engine
            .fetch_by_filter("nope", "x", 1, Duration::from_millis(10), "dls-fetch-0-test")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::StreamMissing(_)));
    }

    #[tokio::test]
    async fn ensure_consumer_is_idempotent_and_delete_removes_it() {
        let engine = FakeEngine::new();
        engine.create_station_streams("orders").await.unwrap();
        engine.ensure_consumer("orders", "cg_orders_billing").await.unwrap();
        engine.ensure_consumer("orders", "cg_orders_billing").await.unwrap();
        assert_eq!(engine.durable_consumer_count("orders"), 1);

        engine.delete_consumer("orders", "cg_orders_billing").await.unwrap();
        assert_eq!(engine.durable_consumer_count("orders"), 0);
    }

    #[tokio::test]
    async fn delete_message_removes_by_sequence() {
        let engine = FakeEngine::new();
        engine.create_station_streams("orders").await.unwrap();
        let dls = crate::dls_stream_name("orders");
        let seq = engine.seed_message(&dls, "dls.orders.poison", b"one".to_vec());
        engine.delete_message(&dls, seq).await.unwrap();
        assert_eq!(engine.stream_message_count(&dls).await.unwrap(), 0);
    }
}
