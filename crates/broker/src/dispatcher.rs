//! Request Dispatcher: subscribes the eight control subjects in their
//! respective queue groups, decodes each request, routes it to the Station
//! Lifecycle Service, and replies exactly once per request — including when
//! the handler panics or the JSON payload is malformed.
//!
//! Every inbound message is handled on its own task so a slow station
//! (e.g. one waiting on the engine) never blocks the dispatcher's own
//! receive loop; the substrate's queue-group semantics guarantee only one
//! `stationd` sibling answers any given request.

use std::future::Future;
use std::panic::AssertUnwindSafe;

use async_nats::{Client, Message};
use futures::{FutureExt, StreamExt};
use serde::de::DeserializeOwned;
use station_protocol::{subjects, CreateConsumerRequest, CreateProducerRequest, CreateStationRequest, DestroyConsumerRequest, DestroyProducerRequest, DestroyStationRequest, AttachSchemaRequest, DetachSchemaRequest, ProducerCreateReply};
use station_domain::error::Result;

use crate::lifecycle;
use crate::state::AppState;

pub async fn run(state: AppState, client: Client) {
    let prefix = &state.config.broker.subject_prefix;
    spawn_subject(client.clone(), state.clone(), subjects::station_creations(prefix), subjects::STATION_CREATIONS_GROUP, handle_create_station);
    spawn_subject(client.clone(), state.clone(), subjects::station_destructions(prefix), subjects::STATION_DESTRUCTIONS_GROUP, handle_destroy_station);
    spawn_subject(client.clone(), state.clone(), subjects::producer_creations(prefix), subjects::PRODUCER_CREATIONS_GROUP, handle_create_producer);
    spawn_subject(client.clone(), state.clone(), subjects::producer_destructions(prefix), subjects::PRODUCER_DESTRUCTIONS_GROUP, handle_destroy_producer);
    spawn_subject(client.clone(), state.clone(), subjects::consumer_creations(prefix), subjects::CONSUMER_CREATIONS_GROUP, handle_create_consumer);
    spawn_subject(client.clone(), state.clone(), subjects::consumer_destructions(prefix), subjects::CONSUMER_DESTRUCTIONS_GROUP, handle_destroy_consumer);
    spawn_subject(client.clone(), state.clone(), subjects::schema_attachments(prefix), subjects::SCHEMA_ATTACHMENTS_GROUP, handle_attach_schema);
    spawn_subject(client.clone(), state.clone(), subjects::schema_detachments(prefix), subjects::SCHEMA_DETACHMENTS_GROUP, handle_detach_schema);
}

/// Join `subject` under `group` and dispatch every delivered message to
/// `handler` on its own task, for the lifetime of the subscription.
fn spawn_subject<F, Fut>(client: Client, state: AppState, subject: String, group: &'static str, handler: F)
where
    F: Fn(AppState, Message) -> Fut + Send + Sync + 'static + Copy,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut subscriber = match client.queue_subscribe(subject.clone(), group.to_string()).await {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(subject, error = %e, "failed to subscribe control subject");
                return;
            }
        };
        tracing::info!(subject, group, "listening");
        while let Some(message) = subscriber.next().await {
            let state = state.clone();
            let subject = subject.clone();
            tokio::spawn(async move {
                let reply_subject = message.reply.clone();
                let nats = state.nats.clone();
                if AssertUnwindSafe(handler(state, message)).catch_unwind().await.is_err() {
                    tracing::error!(subject, "control-plane handler panicked");
                    if let (Some(reply_subject), Some(client)) = (reply_subject, nats) {
                        let payload = station_protocol::encode_simple_reply(Err("internal error".to_string()));
                        if let Err(e) = client.publish(reply_subject, payload.into()).await {
                            tracing::warn!(error = %e, "sending panic-recovery reply");
                        }
                    }
                }
            });
        }
        tracing::warn!(subject, "subscription ended");
    });
}

fn describe_error(e: station_domain::error::Error) -> String {
    if !e.is_user_facing() {
        tracing::error!(error = %e, "internal error handling control request");
    }
    e.to_string()
}

async fn handle_create_station(state: AppState, message: Message) {
    reply_with_client(&state, &message, |state, req: CreateStationRequest| async move {
        lifecycle::create_station(&state, req).await
    })
    .await;
}

async fn handle_destroy_station(state: AppState, message: Message) {
    reply_with_client(&state, &message, |state, req: DestroyStationRequest| async move {
        lifecycle::destroy_station(&state, req).await
    })
    .await;
}

async fn handle_destroy_producer(state: AppState, message: Message) {
    reply_with_client(&state, &message, |state, req: DestroyProducerRequest| async move {
        lifecycle::destroy_producer(&state, req).await
    })
    .await;
}

async fn handle_create_consumer(state: AppState, message: Message) {
    reply_with_client(&state, &message, |state, req: CreateConsumerRequest| async move {
        lifecycle::create_consumer(&state, req).await
    })
    .await;
}

async fn handle_destroy_consumer(state: AppState, message: Message) {
    reply_with_client(&state, &message, |state, req: DestroyConsumerRequest| async move {
        lifecycle::destroy_consumer(&state, req).await
    })
    .await;
}

async fn handle_attach_schema(state: AppState, message: Message) {
    reply_with_client(&state, &message, |state, req: AttachSchemaRequest| async move {
        lifecycle::attach_schema(&state, req).await
    })
    .await;
}

async fn handle_detach_schema(state: AppState, message: Message) {
    reply_with_client(&state, &message, |state, req: DetachSchemaRequest| async move {
        lifecycle::detach_schema(&state, req).await
    })
    .await;
}

/// `CreateProducer` is the one subject whose reply shape depends on the
/// request (v0 empty-or-error vs v1+ `{schema_update, error}`), so it
/// doesn't go through [`reply_simple`].
async fn handle_create_producer(state: AppState, message: Message) {
    let req: CreateProducerRequest = match serde_json::from_slice(&message.payload) {
        Ok(r) => r,
        Err(e) => {
            reply_with_raw(&state, &message, station_protocol::encode_simple_reply(Err(format!("malformed request: {e}")))).await;
            return;
        }
    };
    let is_versioned = req.req_version.unwrap_or(0) > 0;
    match lifecycle::create_producer(&state, req).await {
        Ok(schema_update) if is_versioned => {
            let reply = ProducerCreateReply {
                schema_update,
                error: String::new(),
            };
            let payload = serde_json::to_vec(&reply).unwrap_or_default();
            reply_with_raw(&state, &message, payload).await;
        }
        Ok(_) => reply_with_raw(&state, &message, Vec::new()).await,
        Err(e) if is_versioned => {
            let reply = ProducerCreateReply {
                schema_update: None,
                error: describe_error(e),
            };
            let payload = serde_json::to_vec(&reply).unwrap_or_default();
            reply_with_raw(&state, &message, payload).await;
        }
        Err(e) => {
            reply_with_raw(&state, &message, station_protocol::encode_simple_reply(Err(describe_error(e)))).await;
        }
    }
}

/// Run `op`, reply with the simple success/error convention, using the
/// dispatcher's own NATS client (threaded through `AppState::nats`) to
/// publish the reply.
async fn reply_with_client<Req, Fut>(state: &AppState, message: &Message, op: impl FnOnce(AppState, Req) -> Fut)
where
    Req: DeserializeOwned,
    Fut: Future<Output = Result<()>>,
{
    let result: std::result::Result<(), String> = match serde_json::from_slice::<Req>(&message.payload) {
        Ok(req) => op(state.clone(), req).await.map_err(describe_error),
        Err(e) => Err(format!("malformed request: {e}")),
    };
    reply_with_raw(state, message, station_protocol::encode_simple_reply(result)).await;
}

async fn reply_with_raw(state: &AppState, message: &Message, payload: Vec<u8>) {
    let Some(reply_subject) = message.reply.clone() else {
        return;
    };
    let Some(client) = &state.nats else {
        return;
    };
    if let Err(e) = client.publish(reply_subject, payload.into()).await {
        tracing::warn!(error = %e, "sending control-plane reply");
    }
}
