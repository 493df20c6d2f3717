//! Station Lifecycle Service: create/destroy station, attach/detach schema,
//! and the narrower producer/consumer create/destroy procedures that share
//! its consistency discipline (canonicalize, check metadata, touch the
//! engine, persist, audit).
//!
//! Every handler here is a plain async function over `&AppState` rather
//! than a method on a service struct — there is no per-station lock to own
//! (see the concurrency model: correctness rests on the store's conditional
//! updates and the engine's idempotent create/delete), so there is nothing
//! for a struct to hold beyond what `AppState` already threads through.

use station_domain::entities::{ActorKind, AuditLog, Consumer, Producer, SchemaBinding};
use station_domain::error::{Error, Result};
use station_domain::trace::TraceEvent;
use station_protocol::{
    AttachSchemaRequest, CreateConsumerRequest, CreateProducerRequest, CreateStationRequest, DestroyConsumerRequest,
    DestroyProducerRequest, DestroyStationRequest, DetachSchemaRequest, SchemaUpdateInit,
};
use station_store::UpsertOutcome;

use crate::schema_propagation;
use crate::state::AppState;
use crate::validate;

/// Audit actor used for wire-originated mutations that carry no richer
/// caller identity (the HTTP management API's auth middleware is the only
/// thing that resolves a user-role actor, and it's out of scope here — §1).
const SDK_ACTOR: &str = "sdk-client";

pub fn durable_consumer_name(internal_station: &str, consumers_group: &str) -> String {
    format!("cg_{internal_station}_{consumers_group}")
}

fn audit(state: &AppState, station_external_name: &str, message: impl Into<String>, actor: &str, actor_kind: ActorKind) {
    state.store.append_audit_log(AuditLog::new(
        station_external_name.to_string(),
        message.into(),
        actor.to_string(),
        actor_kind,
    ));
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// CreateStation / DestroyStation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// This subject is the SDK's native creation path; the "non-native,
/// foreign-client-pre-created-the-stream" path named in §4.3 is reached
/// through a different, non-wire internal API this control plane doesn't
/// expose (see DESIGN.md) — every station created here is native.
pub async fn create_station(state: &AppState, req: CreateStationRequest) -> Result<()> {
    // 1. Canonicalize.
    let canonical = station_names::canonical(&req.name)?;

    // 2. Reject if a live station already owns this name.
    if state.store.get_live_station(&canonical.external).is_some() {
        return Err(Error::NameExists(canonical.external));
    }

    // 3. Resolve the schema binding, if requested.
    let schema_binding = match req.schema_name.as_deref().filter(|s| !s.is_empty()) {
        Some(raw_name) => {
            let schema_name = raw_name.to_lowercase();
            state
                .store
                .get_schema_by_name(&schema_name)
                .ok_or_else(|| Error::SchemaMissing(schema_name.clone()))?;
            let version = state
                .store
                .get_active_version(&schema_name)
                .ok_or_else(|| Error::SchemaMissing(schema_name.clone()))?;
            Some(SchemaBinding {
                name: schema_name,
                version_number: version.version_number,
            })
        }
        None => None,
    };

    // 4. Normalize retention/storage/replicas/idempotency.
    let fields = validate::normalize_station_fields(
        req.retention_type.as_deref(),
        req.retention_value,
        req.storage_type.as_deref(),
        req.replicas,
        req.idempotency_window_in_ms,
        req.dls_configuration.clone(),
    )?;

    // 5. Build the record.
    let created_by = req.created_by.clone().unwrap_or_else(|| SDK_ACTOR.to_string());
    let mut station = station_domain::entities::Station::new(
        canonical.external.clone(),
        canonical.internal.clone(),
        fields.retention_type,
        fields.retention_value,
        fields.storage_type,
        fields.replicas,
        req.dedup_enabled.unwrap_or(false),
        req.dedup_window_in_ms.unwrap_or(0),
        fields.idempotency_window_in_ms,
        fields.dls_configuration,
        true,
        created_by.clone(),
    );
    station.schema = schema_binding;

    // 6. Create the streams before the metadata insert (ordering note in §4.3).
    state.engine.create_station_streams(&canonical.internal).await?;

    // 7. Upsert-if-absent resolves the create race.
    let created = match state.store.upsert_station_if_absent(station) {
        UpsertOutcome::Created(s) => s,
        UpsertOutcome::AlreadyExists(existing) => {
            // The stream just created is now orphaned; see Open Question §9.1.
            return Err(Error::NameExists(existing.external_name));
        }
    };

    // 8. Audit + best-effort analytics.
    audit(
        state,
        &created.external_name,
        format!("Station {} has been created", created.external_name),
        &created_by,
        ActorKind::Sdk,
    );
    TraceEvent::StationCreated {
        station: created.external_name,
        native: created.is_native,
        replicas: created.replicas,
    }
    .emit();

    Ok(())
}

pub async fn destroy_station(state: &AppState, req: DestroyStationRequest) -> Result<()> {
    let canonical = station_names::canonical(&req.station_name)?;
    let station = state
        .store
        .get_live_station(&canonical.external)
        .ok_or_else(|| Error::NotFound(format!("station {}", canonical.external)))?;

    remove_station_resources(state, &station).await;

    state.store.tombstone_station(&canonical.external);

    audit(
        state,
        &station.external_name,
        format!("Station {} has been deleted", station.external_name),
        SDK_ACTOR,
        ActorKind::Sdk,
    );
    TraceEvent::StationDestroyed {
        station: station.external_name,
    }
    .emit();

    Ok(())
}

/// `removeStationResources`: stream deletion precedes the tombstone so no
/// client can observe a station that looks live but has no backing stream.
async fn remove_station_resources(state: &AppState, station: &station_domain::entities::Station) {
    if let Err(e) = state.engine.delete_station_streams(&station.internal_name).await {
        tracing::warn!(station = %station.external_name, error = %e, "deleting station streams");
    }
    state.store.detach_station_from_tags(&station.id);
    state.store.deactivate_all_producers_for_station(&station.id);
    state.store.deactivate_all_consumers_for_station(&station.id);
    state.store.delete_audit_logs_for_station(&station.external_name);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// AttachSchema / DetachSchema
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn attach_schema(state: &AppState, req: AttachSchemaRequest) -> Result<()> {
    let canonical = station_names::canonical(&req.station_name)?;
    state
        .store
        .get_live_station(&canonical.external)
        .ok_or_else(|| Error::NotFound(format!("station {}", canonical.external)))?;

    let schema_name = req.name.to_lowercase();
    state
        .store
        .get_schema_by_name(&schema_name)
        .ok_or_else(|| Error::SchemaMissing(schema_name.clone()))?;
    let version = state
        .store
        .get_active_version(&schema_name)
        .ok_or_else(|| Error::SchemaMissing(schema_name.clone()))?;

    let updated = state
        .store
        .set_station_schema(
            &canonical.external,
            Some(SchemaBinding {
                name: schema_name.clone(),
                version_number: version.version_number,
            }),
        )
        .ok_or_else(|| Error::NotFound(format!("station {}", canonical.external)))?;

    audit(
        state,
        &updated.external_name,
        format!("Schema {schema_name} has been attached to station {}", updated.external_name),
        SDK_ACTOR,
        ActorKind::Sdk,
    );
    TraceEvent::SchemaAttached {
        station: updated.external_name.clone(),
        schema: schema_name.clone(),
        version: version.version_number,
    }
    .emit();

    schema_propagation::publish_init(state, &updated.internal_name, &schema_name, version.version_number, &version.content).await;

    Ok(())
}

pub async fn detach_schema(state: &AppState, req: DetachSchemaRequest) -> Result<()> {
    let canonical = station_names::canonical(&req.station_name)?;
    let station = state
        .store
        .get_live_station(&canonical.external)
        .ok_or_else(|| Error::NotFound(format!("station {}", canonical.external)))?;

    state.store.set_station_schema(&canonical.external, None);

    audit(
        state,
        &station.external_name,
        format!("Schema has been detached from station {}", station.external_name),
        SDK_ACTOR,
        ActorKind::Sdk,
    );
    TraceEvent::SchemaDetached {
        station: station.external_name.clone(),
    }
    .emit();

    schema_propagation::publish_drop(state, &station.internal_name).await;

    Ok(())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// CreateProducer / DestroyProducer
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Returns the producer's schema-update init payload for v1+ callers
/// (`req_version` present and nonzero); `None` for v0 callers or stations
/// with no schema bound.
pub async fn create_producer(state: &AppState, req: CreateProducerRequest) -> Result<Option<SchemaUpdateInit>> {
    let canonical = station_names::canonical(&req.station_name)?;
    let station = state
        .store
        .get_live_station(&canonical.external)
        .ok_or_else(|| Error::NotFound(format!("station {}", canonical.external)))?;
    state
        .store
        .get_connection(&req.connection_id)
        .ok_or_else(|| Error::NotFound(format!("connection {}", req.connection_id)))?;

    state.store.insert_producer(Producer::new(
        req.name.clone(),
        station.id.clone(),
        req.connection_id.clone(),
        req.producer_type.clone(),
    ));

    audit(
        state,
        &station.external_name,
        format!("Producer {} has been created", req.name),
        &req.connection_id,
        ActorKind::Sdk,
    );
    TraceEvent::ProducerCreated {
        station: station.external_name.clone(),
        producer: req.name.clone(),
    }
    .emit();

    if req.req_version.unwrap_or(0) == 0 {
        return Ok(None);
    }

    let Some(binding) = &station.schema else {
        return Ok(None);
    };
    let version = state.store.get_schema_version(&binding.name, binding.version_number);
    Ok(version.map(|v| SchemaUpdateInit {
        schema_name: binding.name.clone(),
        version_number: v.version_number,
        content: v.content,
    }))
}

pub async fn destroy_producer(state: &AppState, req: DestroyProducerRequest) -> Result<()> {
    let canonical = station_names::canonical(&req.station_name)?;
    let Some(station) = state.store.get_station(&canonical.external) else {
        return Err(Error::NotFound(format!("station {}", canonical.external)));
    };

    if !state.store.deactivate_producer(&station.id, &req.name) {
        // Destroying a producer on an already-tombstoned station is a
        // no-op success: the DestroyStation cascade already deactivated
        // it. On a live station, an absent producer is a real NotFound.
        if station.is_deleted {
            return Ok(());
        }
        return Err(Error::NotFound(format!("producer {} on station {}", req.name, station.external_name)));
    }

    audit(
        state,
        &station.external_name,
        format!("Producer {} has been deleted", req.name),
        SDK_ACTOR,
        ActorKind::Sdk,
    );
    Ok(())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// CreateConsumer / DestroyConsumer
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

const DEFAULT_MAX_ACK_TIME_MS: i64 = 30_000;
const DEFAULT_MAX_MSG_DELIVERIES: i32 = 10;

pub async fn create_consumer(state: &AppState, req: CreateConsumerRequest) -> Result<()> {
    let canonical = station_names::canonical(&req.station_name)?;
    let station = state
        .store
        .get_live_station(&canonical.external)
        .ok_or_else(|| Error::NotFound(format!("station {}", canonical.external)))?;
    state
        .store
        .get_connection(&req.connection_id)
        .ok_or_else(|| Error::NotFound(format!("connection {}", req.connection_id)))?;

    let (max_ack_time_ms, max_msg_deliveries) = validate::normalize_consumer_delivery(
        req.max_ack_time_ms,
        req.max_msg_deliveries,
        DEFAULT_MAX_ACK_TIME_MS,
        DEFAULT_MAX_MSG_DELIVERIES,
    )?;

    state.store.insert_consumer(Consumer::new(
        req.name.clone(),
        station.id.clone(),
        req.connection_id.clone(),
        req.consumer_type.clone(),
        req.consumers_group.clone(),
        max_ack_time_ms,
        max_msg_deliveries,
    ));

    let durable_name = durable_consumer_name(&station.internal_name, &req.consumers_group);
    state.engine.ensure_consumer(&station.internal_name, &durable_name).await?;

    audit(
        state,
        &station.external_name,
        format!("Consumer {} has been created", req.name),
        &req.connection_id,
        ActorKind::Sdk,
    );
    TraceEvent::ConsumerCreated {
        station: station.external_name.clone(),
        consumer: req.name.clone(),
        group: req.consumers_group.clone(),
    }
    .emit();

    Ok(())
}

pub async fn destroy_consumer(state: &AppState, req: DestroyConsumerRequest) -> Result<()> {
    let canonical = station_names::canonical(&req.station_name)?;
    let Some(station) = state.store.get_station(&canonical.external) else {
        return Err(Error::NotFound(format!("station {}", canonical.external)));
    };

    let Some(consumer) = state.store.get_active_consumer(&station.id, &req.name) else {
        // Idempotent only once the station itself is gone; on a live
        // station an absent consumer is a real NotFound.
        if station.is_deleted {
            return Ok(());
        }
        return Err(Error::NotFound(format!("consumer {} on station {}", req.name, station.external_name)));
    };
    state.store.deactivate_consumer(&station.id, &req.name);

    let remaining_in_group = state
        .store
        .list_consumers_for_station(&station.id)
        .into_iter()
        .filter(|c| c.consumers_group == consumer.consumers_group && c.is_active)
        .count();

    if remaining_in_group == 0 {
        let durable_name = durable_consumer_name(&station.internal_name, &consumer.consumers_group);
        if let Err(e) = state.engine.delete_consumer(&station.internal_name, &durable_name).await {
            tracing::warn!(station = %station.external_name, group = %consumer.consumers_group, error = %e, "deleting durable consumer");
        }
    }

    audit(
        state,
        &station.external_name,
        format!("Consumer {} has been deleted", req.name),
        SDK_ACTOR,
        ActorKind::Sdk,
    );
    Ok(())
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

    fn create_req(name: &str) -> CreateStationRequest {
        CreateStationRequest {
            name: name.to_string(),
            schema_name: None,
            retention_type: None,
            retention_value: None,
            storage_type: None,
            replicas: None,
            dedup_enabled: None,
            dedup_window_in_ms: None,
            idempotency_window_in_ms: None,
            dls_configuration: None,
            is_native: false,
            created_by: None,
        }
    }

    #[tokio::test]
    async fn create_station_persists_and_creates_streams() {
        let state = test_state();
        create_station(&state, create_req("Orders")).await.unwrap();

        let station = state.store.get_live_station("orders").unwrap();
        assert_eq!(station.retention_value, 604_800);
        assert_eq!(station.idempotency_window_in_ms, 120_000);
        assert!(station.is_native);
    }

    #[tokio::test]
    async fn duplicate_create_station_fails_name_exists() {
        let state = test_state();
        create_station(&state, create_req("Orders")).await.unwrap();
        let err = create_station(&state, create_req("Orders")).await.unwrap_err();
        assert!(matches!(err, Error::NameExists(_)));
    }

    #[tokio::test]
    async fn destroy_then_recreate_succeeds() {
        let state = test_state();
        create_station(&state, create_req("Orders")).await.unwrap();
        destroy_station(
            &state,
            DestroyStationRequest {
                station_name: "Orders".into(),
            },
        )
        .await
        .unwrap();

        create_station(&state, create_req("Orders")).await.unwrap();
        assert!(state.store.get_live_station("orders").is_some());
    }

    #[tokio::test]
    async fn destroy_station_cascades_to_producers_and_consumers() {
        let state = test_state();
        create_station(&state, create_req("Orders")).await.unwrap();
        let station = state.store.get_live_station("orders").unwrap();
        state.store.ensure_connection("conn1");
        create_producer(
            &state,
            CreateProducerRequest {
                name: "p1".into(),
                station_name: "Orders".into(),
                connection_id: "conn1".into(),
                producer_type: "application".into(),
                req_version: None,
            },
        )
        .await
        .unwrap();

        destroy_station(
            &state,
            DestroyStationRequest {
                station_name: "Orders".into(),
            },
        )
        .await
        .unwrap();

        assert!(state
            .store
            .list_producers_for_station(&station.id)
            .iter()
            .all(|p| p.is_deleted));
    }

    #[tokio::test]
    async fn attach_schema_sets_binding_and_publishes() {
        let state = test_state();
        create_station(&state, create_req("Orders")).await.unwrap();
        state.store.insert_schema(station_domain::entities::Schema {
            id: "schema1".into(),
            name: "orderv1".into(),
            latest_active_version_number: 3,
        });
        state.store.insert_schema_version(station_domain::entities::SchemaVersion {
            id: "v3".into(),
            schema_id: "schema1".into(),
            version_number: 3,
            content: "{}".into(),
            is_active: true,
            created_at: chrono::Utc::now(),
        });

        attach_schema(
            &state,
            AttachSchemaRequest {
                name: "OrderV1".into(),
                station_name: "Orders".into(),
            },
        )
        .await
        .unwrap();

        let station = state.store.get_live_station("orders").unwrap();
        let binding = station.schema.unwrap();
        assert_eq!(binding.name, "orderv1");
        assert_eq!(binding.version_number, 3);
    }

    #[tokio::test]
    async fn attach_schema_missing_schema_fails() {
        let state = test_state();
        create_station(&state, create_req("Orders")).await.unwrap();
        let err = attach_schema(
            &state,
            AttachSchemaRequest {
                name: "nope".into(),
                station_name: "Orders".into(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::SchemaMissing(_)));
    }

    #[tokio::test]
    async fn detach_schema_clears_binding() {
        let state = test_state();
        create_station(&state, create_req("Orders")).await.unwrap();
        state.store.set_station_schema(
            "orders",
            Some(SchemaBinding {
                name: "orderv1".into(),
                version_number: 1,
            }),
        );

        detach_schema(
            &state,
            DetachSchemaRequest {
                station_name: "Orders".into(),
            },
        )
        .await
        .unwrap();

        assert!(state.store.get_live_station("orders").unwrap().schema.is_none());
    }

    #[tokio::test]
    async fn create_consumer_creates_durable_consumer_once_per_group() {
        let state = test_state();
        create_station(&state, create_req("Orders")).await.unwrap();
        state.store.ensure_connection("conn1");

        let req = CreateConsumerRequest {
            name: "c1".into(),
            station_name: "Orders".into(),
            connection_id: "conn1".into(),
            consumer_type: "application".into(),
            consumers_group: "billing".into(),
            max_ack_time_ms: 30_000,
            max_msg_deliveries: 10,
        };
        create_consumer(&state, req.clone()).await.unwrap();

        let mut req2 = req.clone();
        req2.name = "c2".into();
        create_consumer(&state, req2).await.unwrap();

        let station = state.store.get_live_station("orders").unwrap();
        assert_eq!(state.store.list_consumers_for_station(&station.id).len(), 2);
    }

    #[tokio::test]
    async fn destroy_consumer_removes_durable_consumer_when_last_member_leaves() {
        let state = test_state();
        create_station(&state, create_req("Orders")).await.unwrap();
        state.store.ensure_connection("conn1");
        create_consumer(
            &state,
            CreateConsumerRequest {
                name: "c1".into(),
                station_name: "Orders".into(),
                connection_id: "conn1".into(),
                consumer_type: "application".into(),
                consumers_group: "billing".into(),
                max_ack_time_ms: 30_000,
                max_msg_deliveries: 10,
            },
        )
        .await
        .unwrap();

        destroy_consumer(
            &state,
            DestroyConsumerRequest {
                station_name: "Orders".into(),
                name: "c1".into(),
            },
        )
        .await
        .unwrap();

        let station = state.store.get_live_station("orders").unwrap();
        assert!(state
            .store
            .list_consumers_for_station(&station.id)
            .iter()
            .all(|c| c.is_deleted));
    }

    #[tokio::test]
    async fn destroy_producer_on_tombstoned_station_is_idempotent() {
        let state = test_state();
        create_station(&state, create_req("Orders")).await.unwrap();
        destroy_station(
            &state,
            DestroyStationRequest {
                station_name: "Orders".into(),
            },
        )
        .await
        .unwrap();

        destroy_producer(
            &state,
            DestroyProducerRequest {
                station_name: "Orders".into(),
                name: "ghost".into(),
            },
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn destroy_producer_on_live_station_fails_when_absent() {
        let state = test_state();
        create_station(&state, create_req("Orders")).await.unwrap();

        let err = destroy_producer(
            &state,
            DestroyProducerRequest {
                station_name: "Orders".into(),
                name: "ghost".into(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn destroy_consumer_on_live_station_fails_when_absent() {
        let state = test_state();
        create_station(&state, create_req("Orders")).await.unwrap();

        let err = destroy_consumer(
            &state,
            DestroyConsumerRequest {
                station_name: "Orders".into(),
                name: "ghost".into(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
