//! Schema Propagation Service: best-effort broadcast of schema bind/unbind
//! events to producers already attached to a station, over
//! `$memphis_schema_updates_<internalStation>`.
//!
//! Publishing happens inline on the same call that applies the metadata
//! change, so ordering between an Init and a later Drop for one station is
//! whatever order the Station Lifecycle Service applied them in — no queue,
//! no retry. A missing [`AppState::nats`] handle (unit tests running against
//! [`station_engine::FakeEngine`] with no live substrate) makes both
//! functions silent no-ops.

use station_protocol::{subjects, SchemaUpdateInit, SchemaUpdateMessage};

use crate::state::AppState;

pub async fn publish_init(state: &AppState, internal_station: &str, schema_name: &str, version_number: u32, content: &str) {
    let message = SchemaUpdateMessage::Init {
        init: SchemaUpdateInit {
            schema_name: schema_name.to_string(),
            version_number,
            content: content.to_string(),
        },
    };
    publish(state, internal_station, &message).await;
}

pub async fn publish_drop(state: &AppState, internal_station: &str) {
    publish(state, internal_station, &SchemaUpdateMessage::Drop {}).await;
}

async fn publish(state: &AppState, internal_station: &str, message: &SchemaUpdateMessage) {
    let Some(client) = &state.nats else {
        return;
    };
    let payload = match serde_json::to_vec(message) {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!(station = %internal_station, error = %e, "encoding schema update");
            return;
        }
    };
    let subject = subjects::schema_updates(&state.config.broker.subject_prefix, internal_station);
    if let Err(e) = client.publish(subject.clone(), payload.into()).await {
        tracing::warn!(station = %internal_station, subject = %subject, error = %e, "publishing schema update");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use station_engine::FakeEngine;
    use station_store::MetadataRepository;
    use std::sync::Arc;

    fn test_state() -> AppState {
        let dir = tempfile::tempdir().unwrap();
        AppState::new(
            Arc::new(station_domain::config::Config::default()),
            Arc::new(MetadataRepository::new(dir.path()).unwrap()),
            Arc::new(FakeEngine::new()),
            None,
        )
    }

    #[tokio::test]
    async fn publish_without_a_nats_client_is_a_silent_no_op() {
        let state = test_state();
        publish_init(&state, "orders", "orderv1", 1, "{}").await;
        publish_drop(&state, "orders").await;
    }
}
