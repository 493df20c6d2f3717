//! `async-nats` JetStream backed [`StreamEngine`].
//!
//! One stream per station (named by its internal name) plus one DLS stream
//! (named by [`crate::dls_stream_name`]); fetch-by-filter is synthesized on
//! top of a short-lived pull consumer, following the pattern the pack's
//! JetStream DLQ adapters use for "read everything matching a subject"
//! (ephemeral durable consumer + bounded `fetch`).

use std::collections::HashMap;
use std::time::Duration;

use async_nats::jetstream::consumer::pull::Config as PullConfig;
use async_nats::jetstream::consumer::{AckPolicy, DeliverPolicy};
use async_nats::jetstream::stream::{Config as StreamConfig, RetentionPolicy, StorageType as JsStorageType};
use async_nats::jetstream::Context as JsContext;
use async_nats::{Client, HeaderMap};
use async_trait::async_trait;
use futures::TryStreamExt;
use station_domain::error::{Error, Result};

use crate::{dls_stream_name, EngineMessage};

/// NATS "stream not found" JetStream API error code, used to distinguish
/// a genuinely missing stream from any other engine failure.
const STREAM_NOT_FOUND_CODE: u64 = 10059;

/// NATS "consumer not found" JetStream API error code.
const CONSUMER_NOT_FOUND_CODE: u64 = 10014;

pub struct NatsStreamEngine {
    client: Client,
    js: JsContext,
    replicas: usize,
    storage: JsStorageType,
}

impl NatsStreamEngine {
    pub async fn connect(url: &str, replicas: usize, storage_is_file: bool, request_timeout: Duration) -> Result<Self> {
        let client = async_nats::ConnectOptions::new()
            .request_timeout(Some(request_timeout))
            .connect(url)
            .await
            .map_err(|e| Error::Engine(format!("connecting to {url}: {e}")))?;
        let js = async_nats::jetstream::new(client.clone());
        Ok(Self {
            client,
            js,
            replicas,
            storage: if storage_is_file {
                JsStorageType::File
            } else {
                JsStorageType::Memory
            },
        })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    async fn ensure_stream(&self, name: &str, subjects: Vec<String>) -> Result<()> {
        match self.js.get_stream(name).await {
            Ok(_) => Ok(()),
            Err(e) if is_stream_missing(&e) => {
                self.js
                    .create_stream(StreamConfig {
                        name: name.to_string(),
                        subjects,
                        retention: RetentionPolicy::Limits,
                        storage: self.storage,
                        num_replicas: self.replicas,
                        ..Default::default()
                    })
                    .await
                    .map_err(|e| Error::Engine(format!("creating stream {name}: {e}")))?;
                Ok(())
            }
            Err(e) => Err(Error::Engine(format!("looking up stream {name}: {e}"))),
        }
    }
}

fn is_stream_missing<E: std::fmt::Display>(err: &E) -> bool {
    let msg = err.to_string();
    msg.contains(&STREAM_NOT_FOUND_CODE.to_string()) || msg.to_lowercase().contains("stream not found")
}

/// True for a JetStream "consumer not found" response, the error
/// `ensure_consumer`/`delete_consumer` treat as "nothing to do here yet".
fn is_consumer_missing<E: std::fmt::Display>(err: &E) -> bool {
    let msg = err.to_string();
    msg.contains(&CONSUMER_NOT_FOUND_CODE.to_string()) || msg.to_lowercase().contains("consumer not found")
}

#[async_trait]
impl crate::StreamEngine for NatsStreamEngine {
    async fn create_station_streams(&self, internal_station: &str) -> Result<()> {
        self.ensure_stream(internal_station, vec![format!("{internal_station}.>")])
            .await?;
        let dls = dls_stream_name(internal_station);
        self.ensure_stream(&dls, vec![format!("{dls}.>")]).await
    }

    async fn delete_station_streams(&self, internal_station: &str) -> Result<()> {
        let dls = dls_stream_name(internal_station);
        for name in [internal_station.to_string(), dls] {
            match self.js.delete_stream(&name).await {
                Ok(_) => {}
                Err(e) if is_stream_missing(&e) => {}
                Err(e) => return Err(Error::Engine(format!("deleting stream {name}: {e}"))),
            }
        }
        Ok(())
    }

    async fn stream_message_count(&self, stream_name: &str) -> Result<u64> {
        let mut stream = self
            .js
            .get_stream(stream_name)
            .await
            .map_err(|e| map_stream_lookup_error(stream_name, e))?;
        let info = stream
            .info()
            .await
            .map_err(|e| Error::Engine(format!("stream info for {stream_name}: {e}")))?;
        Ok(info.state.messages)
    }

    async fn consumer_pending(&self, stream_name: &str, durable_name: &str) -> Result<(u64, u64)> {
        let stream = self
            .js
            .get_stream(stream_name)
            .await
            .map_err(|e| map_stream_lookup_error(stream_name, e))?;
        let mut consumer: async_nats::jetstream::consumer::PullConsumer = stream
            .get_consumer(durable_name)
            .await
            .map_err(|e| Error::Engine(format!("consumer {durable_name} on {stream_name}: {e}")))?;
        let info = consumer
            .info()
            .await
            .map_err(|e| Error::Engine(format!("consumer info for {durable_name}: {e}")))?;
        Ok((info.num_pending, info.num_ack_pending as u64))
    }

    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<()> {
        self.client
            .publish(subject.to_string(), payload.into())
            .await
            .map_err(|e| Error::Engine(format!("publishing to {subject}: {e}")))
    }

    async fn publish_with_headers(
        &self,
        subject: &str,
        headers: HashMap<String, String>,
        payload: Vec<u8>,
    ) -> Result<()> {
        let mut header_map = HeaderMap::new();
        for (k, v) in headers {
            header_map.insert(k.as_str(), v.as_str());
        }
        self.client
            .publish_with_headers(subject.to_string(), header_map, payload.into())
            .await
            .map_err(|e| Error::Engine(format!("publishing to {subject}: {e}")))
    }

    async fn fetch_by_filter(
        &self,
        stream_name: &str,
        filter_subject: &str,
        amount: usize,
        timeout: Duration,
        consumer_name: &str,
    ) -> Result<Vec<EngineMessage>> {
        let stream = self
            .js
            .get_stream(stream_name)
            .await
            .map_err(|e| map_stream_lookup_error(stream_name, e))?;

        let durable_name = consumer_name.to_string();
        let consumer = stream
            .create_consumer(PullConfig {
                durable_name: Some(durable_name.clone()),
                deliver_policy: DeliverPolicy::All,
                ack_policy: AckPolicy::Explicit,
                filter_subject: filter_subject.to_string(),
                ..Default::default()
            })
            .await
            .map_err(|e| Error::Engine(format!("creating durable consumer on {stream_name}: {e}")));

        // Cleanup (unsubscribe/remove the durable consumer) runs on every
        // exit path below, mirroring the synthesized fetch-by-filter
        // protocol's edge policy.
        let result = async {
            let consumer = consumer?;
            let amount = amount.max(1);
            let batch = consumer
                .fetch()
                .max_messages(amount)
                .expires(timeout)
                .messages()
                .await
                .map_err(|e| Error::Engine(format!("fetch on {stream_name}: {e}")))?;
            tokio::pin!(batch);

            let mut collected = Vec::new();
            loop {
                match tokio::time::timeout(timeout, batch.try_next()).await {
                    Ok(Ok(Some(msg))) => {
                        let info = msg
                            .info()
                            .map_err(|e| Error::Engine(format!("message info: {e}")))?;
                        let sequence = info.stream_sequence;
                        let headers = msg
                            .headers
                            .as_ref()
                            .map(|h| {
                                h.iter()
                                    .map(|(k, v)| (k.to_string(), v.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(",")))
                                    .collect()
                            })
                            .unwrap_or_default();
                        let engine_msg = EngineMessage {
                            sequence,
                            subject: msg.subject.to_string(),
                            headers,
                            data: msg.payload.to_vec(),
                            time_sent: chrono::Utc::now(),
                        };
                        msg.ack().await.map_err(|e| Error::Engine(format!("ack: {e}")))?;
                        collected.push(engine_msg);
                        if collected.len() >= amount {
                            break;
                        }
                    }
                    Ok(Ok(None)) => break,
                    Ok(Err(e)) => return Err(Error::Engine(format!("fetch stream: {e}"))),
                    // Timeout is a normal termination: return what we have.
                    Err(_) => break,
                }
            }
            Ok(collected)
        }
        .await;

        stream
            .delete_consumer(&durable_name)
            .await
            .map_err(|e| Error::Engine(format!("removing durable consumer {durable_name}: {e}")))
            .ok();

        result
    }

    async fn ensure_consumer(&self, stream_name: &str, durable_name: &str) -> Result<()> {
        let stream = self
            .js
            .get_stream(stream_name)
            .await
            .map_err(|e| map_stream_lookup_error(stream_name, e))?;
        match stream
            .get_consumer::<async_nats::jetstream::consumer::PullConsumer>(durable_name)
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if is_consumer_missing(&e) => {
                stream
                    .create_consumer(PullConfig {
                        durable_name: Some(durable_name.to_string()),
                        deliver_policy: DeliverPolicy::All,
                        ack_policy: AckPolicy::Explicit,
                        ..Default::default()
                    })
                    .await
                    .map_err(|e| Error::Engine(format!("creating durable consumer {durable_name} on {stream_name}: {e}")))?;
                Ok(())
            }
            Err(e) => Err(Error::Engine(format!("looking up consumer {durable_name} on {stream_name}: {e}"))),
        }
    }

    async fn delete_consumer(&self, stream_name: &str, durable_name: &str) -> Result<()> {
        let stream = self
            .js
            .get_stream(stream_name)
            .await
            .map_err(|e| map_stream_lookup_error(stream_name, e))?;
        match stream.delete_consumer(durable_name).await {
            Ok(_) => Ok(()),
            Err(e) if is_consumer_missing(&e) => Ok(()),
            Err(e) => Err(Error::Engine(format!("deleting consumer {durable_name} on {stream_name}: {e}"))),
        }
    }

    async fn delete_message(&self, stream_name: &str, sequence: u64) -> Result<()> {
        let mut stream = self
            .js
            .get_stream(stream_name)
            .await
            .map_err(|e| map_stream_lookup_error(stream_name, e))?;
        stream
            .delete_message(sequence)
            .await
            .map_err(|e| Error::Engine(format!("deleting sequence {sequence} on {stream_name}: {e}")))?;
        Ok(())
    }

    async fn get_message(&self, stream_name: &str, sequence: u64) -> Result<Option<EngineMessage>> {
        let stream = self
            .js
            .get_stream(stream_name)
            .await
            .map_err(|e| map_stream_lookup_error(stream_name, e))?;
        match stream.direct_get(sequence).await {
            Ok(raw) => {
                let headers = raw
                    .headers
                    .as_ref()
                    .map(|h| {
                        h.iter()
                            .map(|(k, v)| (k.to_string(), v.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(",")))
                            .collect()
                    })
                    .unwrap_or_default();
                Ok(Some(EngineMessage {
                    sequence,
                    subject: raw.subject.to_string(),
                    headers,
                    data: raw.payload.to_vec(),
                    time_sent: chrono::Utc::now(),
                }))
            }
            Err(e) if is_stream_missing(&e) => Ok(None),
            Err(e) => Err(Error::Engine(format!("direct get sequence {sequence} on {stream_name}: {e}"))),
        }
    }
}

fn map_stream_lookup_error<E: std::fmt::Display>(stream_name: &str, e: E) -> Error {
    if is_stream_missing(&e) {
        Error::StreamMissing(stream_name.to_string())
    } else {
        Error::Engine(format!("looking up stream {stream_name}: {e}"))
    }
}
