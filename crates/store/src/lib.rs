//! Metadata Repository: a CRUD + aggregation facade over the persisted
//! station-control-plane collections (stations, producers, consumers,
//! schemas, schema versions, tags, connections, audit logs).
//!
//! Each collection lives behind its own `RwLock<HashMap<..>>` and is
//! persisted as one JSON file per collection under the configured state
//! directory; the caller (`stationd`'s flush loop) decides when to call
//! [`MetadataRepository::flush`]. This stands in for the opaque document
//! store the control plane is specified against; the interesting behavior
//! here is the upsert-if-absent race resolution on station creation, not
//! the storage engine.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use station_domain::entities::{
    AuditLog, Connection, Consumer, ConsumerGroup, Producer, Schema, SchemaVersion, Station, Tag,
};
use station_domain::error::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Outcome types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Result of `upsert_station_if_absent`: the create-race resolution
/// primitive every CreateStation path serializes through.
pub enum UpsertOutcome {
    Created(Station),
    AlreadyExists(Station),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// MetadataRepository
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct MetadataRepository {
    state_dir: PathBuf,
    stations: RwLock<HashMap<String, Station>>,
    producers: RwLock<HashMap<String, Producer>>,
    consumers: RwLock<HashMap<String, Consumer>>,
    schemas: RwLock<HashMap<String, Schema>>,
    schema_versions: RwLock<HashMap<String, SchemaVersion>>,
    tags: RwLock<HashMap<String, Tag>>,
    connections: RwLock<HashMap<String, Connection>>,
    audit_logs: RwLock<Vec<AuditLog>>,
}

fn load_map<T: serde::de::DeserializeOwned>(path: &Path) -> HashMap<String, T>
where
    T: Clone,
{
    if !path.exists() {
        return HashMap::new();
    }
    match std::fs::read_to_string(path) {
        Ok(raw) => serde_json::from_str(&raw).unwrap_or_default(),
        Err(_) => HashMap::new(),
    }
}

fn load_vec<T: serde::de::DeserializeOwned>(path: &Path) -> Vec<T> {
    if !path.exists() {
        return Vec::new();
    }
    match std::fs::read_to_string(path) {
        Ok(raw) => serde_json::from_str(&raw).unwrap_or_default(),
        Err(_) => Vec::new(),
    }
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| Error::Store(format!("serializing {}: {e}", path.display())))?;
    std::fs::write(path, json).map_err(|e| Error::Store(format!("writing {}: {e}", path.display())))
}

impl MetadataRepository {
    /// Load or create the repository at `state_dir`, one JSON file per
    /// collection.
    pub fn new(state_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(state_dir)
            .map_err(|e| Error::Store(format!("creating state dir {}: {e}", state_dir.display())))?;

        let stations = load_map(&state_dir.join("stations.json"));
        let producers = load_map(&state_dir.join("producers.json"));
        let consumers = load_map(&state_dir.join("consumers.json"));
        let schemas = load_map(&state_dir.join("schemas.json"));
        let schema_versions = load_map(&state_dir.join("schema_versions.json"));
        let tags = load_map(&state_dir.join("tags.json"));
        let connections = load_map(&state_dir.join("connections.json"));
        let audit_logs = load_vec(&state_dir.join("audit_logs.json"));

        tracing::info!(
            stations = stations.len(),
            producers = producers.len(),
            consumers = consumers.len(),
            path = %state_dir.display(),
            "metadata repository loaded"
        );

        Ok(Self {
            state_dir: state_dir.to_path_buf(),
            stations: RwLock::new(stations),
            producers: RwLock::new(producers),
            consumers: RwLock::new(consumers),
            schemas: RwLock::new(schemas),
            schema_versions: RwLock::new(schema_versions),
            tags: RwLock::new(tags),
            connections: RwLock::new(connections),
            audit_logs: RwLock::new(audit_logs),
        })
    }

    /// Flush every collection to its JSON file.
    pub fn flush(&self) -> Result<()> {
        write_json(&self.state_dir.join("stations.json"), &*self.stations.read())?;
        write_json(&self.state_dir.join("producers.json"), &*self.producers.read())?;
        write_json(&self.state_dir.join("consumers.json"), &*self.consumers.read())?;
        write_json(&self.state_dir.join("schemas.json"), &*self.schemas.read())?;
        write_json(
            &self.state_dir.join("schema_versions.json"),
            &*self.schema_versions.read(),
        )?;
        write_json(&self.state_dir.join("tags.json"), &*self.tags.read())?;
        write_json(&self.state_dir.join("connections.json"), &*self.connections.read())?;
        write_json(&self.state_dir.join("audit_logs.json"), &*self.audit_logs.read())?;
        Ok(())
    }

    // ── Stations ─────────────────────────────────────────────────

    /// Idempotent station creation: inserts `station` keyed by its external
    /// name only if no *live* (non-deleted) station already occupies that
    /// name. A prior tombstone does not block re-creation.
    pub fn upsert_station_if_absent(&self, station: Station) -> UpsertOutcome {
        let mut stations = self.stations.write();
        if let Some(existing) = stations.get(&station.external_name) {
            if !existing.is_deleted {
                return UpsertOutcome::AlreadyExists(existing.clone());
            }
        }
        stations.insert(station.external_name.clone(), station.clone());
        UpsertOutcome::Created(station)
    }

    pub fn get_station(&self, external_name: &str) -> Option<Station> {
        self.stations.read().get(external_name).cloned()
    }

    pub fn get_live_station(&self, external_name: &str) -> Option<Station> {
        self.stations
            .read()
            .get(external_name)
            .filter(|s| !s.is_deleted)
            .cloned()
    }

    pub fn list_stations(&self) -> Vec<Station> {
        self.stations.read().values().cloned().collect()
    }

    /// Find a live station by its internal (stream-engine) name. Used by
    /// the Dead-Letter Inspector, which only has the internal name encoded
    /// in a DLS id and needs the station record for producer/consumer
    /// enrichment.
    pub fn get_live_station_by_internal_name(&self, internal_name: &str) -> Option<Station> {
        self.stations
            .read()
            .values()
            .find(|s| s.internal_name == internal_name && !s.is_deleted)
            .cloned()
    }

    /// Tombstone a live station. Returns `None` if no live station exists
    /// under that name.
    pub fn tombstone_station(&self, external_name: &str) -> Option<Station> {
        let mut stations = self.stations.write();
        let station = stations.get_mut(external_name)?;
        if station.is_deleted {
            return None;
        }
        station.is_deleted = true;
        station.updated_at = chrono::Utc::now();
        Some(station.clone())
    }

    /// Overwrite a station's DLS policy. Used by DLS bootstrap when it has
    /// to (re)create a missing DLS stream for an old station.
    pub fn set_station_dls_configuration(
        &self,
        external_name: &str,
        config: station_domain::entities::DlsConfig,
    ) -> Option<Station> {
        let mut stations = self.stations.write();
        let station = stations.get_mut(external_name)?;
        station.dls_configuration = config;
        station.updated_at = chrono::Utc::now();
        Some(station.clone())
    }

    pub fn set_station_schema(
        &self,
        external_name: &str,
        binding: Option<station_domain::entities::SchemaBinding>,
    ) -> Option<Station> {
        let mut stations = self.stations.write();
        let station = stations.get_mut(external_name)?;
        station.schema = binding;
        station.updated_at = chrono::Utc::now();
        Some(station.clone())
    }

    // ── Producers ────────────────────────────────────────────────

    pub fn insert_producer(&self, producer: Producer) {
        self.producers.write().insert(producer.id.clone(), producer);
    }

    pub fn get_active_producer(&self, station_id: &str, name: &str) -> Option<Producer> {
        self.producers
            .read()
            .values()
            .find(|p| p.station_id == station_id && p.name == name && p.is_active)
            .cloned()
    }

    pub fn deactivate_producer(&self, station_id: &str, name: &str) -> bool {
        let mut producers = self.producers.write();
        let hit = producers
            .values_mut()
            .find(|p| p.station_id == station_id && p.name == name && p.is_active);
        match hit {
            Some(p) => {
                p.is_active = false;
                p.is_deleted = true;
                true
            }
            None => false,
        }
    }

    pub fn get_producer_by_id(&self, id: &str) -> Option<Producer> {
        self.producers.read().get(id).cloned()
    }

    pub fn list_producers_for_station(&self, station_id: &str) -> Vec<Producer> {
        self.producers
            .read()
            .values()
            .filter(|p| p.station_id == station_id)
            .cloned()
            .collect()
    }

    /// Mark every producer on `station_id` inactive and deleted. Used by
    /// DestroyStation's cascade.
    pub fn deactivate_all_producers_for_station(&self, station_id: &str) -> usize {
        let mut count = 0;
        for producer in self.producers.write().values_mut() {
            if producer.station_id == station_id && !producer.is_deleted {
                producer.is_active = false;
                producer.is_deleted = true;
                count += 1;
            }
        }
        count
    }

    // ── Consumers ────────────────────────────────────────────────

    pub fn insert_consumer(&self, consumer: Consumer) {
        self.consumers.write().insert(consumer.id.clone(), consumer);
    }

    pub fn get_active_consumer(&self, station_id: &str, name: &str) -> Option<Consumer> {
        self.consumers
            .read()
            .values()
            .find(|c| c.station_id == station_id && c.name == name && c.is_active)
            .cloned()
    }

    pub fn deactivate_consumer(&self, station_id: &str, name: &str) -> bool {
        let mut consumers = self.consumers.write();
        let hit = consumers
            .values_mut()
            .find(|c| c.station_id == station_id && c.name == name && c.is_active);
        match hit {
            Some(c) => {
                c.is_active = false;
                c.is_deleted = true;
                true
            }
            None => false,
        }
    }

    pub fn list_consumers_for_station(&self, station_id: &str) -> Vec<Consumer> {
        self.consumers
            .read()
            .values()
            .filter(|c| c.station_id == station_id)
            .cloned()
            .collect()
    }

    pub fn deactivate_all_consumers_for_station(&self, station_id: &str) -> usize {
        let mut count = 0;
        for consumer in self.consumers.write().values_mut() {
            if consumer.station_id == station_id && !consumer.is_deleted {
                consumer.is_active = false;
                consumer.is_deleted = true;
                count += 1;
            }
        }
        count
    }

    /// Group a station's live consumers by `consumers_group`, enriched with
    /// engine-reported pending counts supplied by the caller (the Metadata
    /// Repository has no visibility into the stream engine).
    pub fn consumer_groups_for_station(
        &self,
        station_id: &str,
        pending_by_group: &HashMap<String, (u64, u64)>,
    ) -> Vec<ConsumerGroup> {
        let consumers = self.list_consumers_for_station(station_id);
        let mut by_group: HashMap<String, Vec<Consumer>> = HashMap::new();
        for c in consumers {
            by_group.entry(c.consumers_group.clone()).or_default().push(c);
        }
        by_group
            .into_iter()
            .filter_map(|(name, members)| {
                let (unprocessed, in_process) = pending_by_group.get(&name).copied().unwrap_or((0, 0));
                ConsumerGroup::from_members(name, members, unprocessed, in_process)
            })
            .collect()
    }

    // ── Schemas / schema versions ────────────────────────────────

    pub fn get_schema_by_name(&self, name: &str) -> Option<Schema> {
        self.schemas.read().get(name).cloned()
    }

    pub fn insert_schema(&self, schema: Schema) {
        self.schemas.write().insert(schema.name.clone(), schema);
    }

    pub fn insert_schema_version(&self, version: SchemaVersion) {
        self.schema_versions.write().insert(version.id.clone(), version);
    }

    /// Fetch the schema's currently-active version content.
    pub fn get_active_version(&self, schema_name: &str) -> Option<SchemaVersion> {
        let schema = self.get_schema_by_name(schema_name)?;
        self.schema_versions
            .read()
            .values()
            .find(|v| v.schema_id == schema.id && v.version_number == schema.latest_active_version_number)
            .cloned()
    }

    /// Fetch a specific bound version, which may no longer be the schema's
    /// active one (a station's binding is a point-in-time snapshot).
    pub fn get_schema_version(&self, schema_name: &str, version_number: u32) -> Option<SchemaVersion> {
        let schema = self.get_schema_by_name(schema_name)?;
        self.schema_versions
            .read()
            .values()
            .find(|v| v.schema_id == schema.id && v.version_number == version_number)
            .cloned()
    }

    // ── Tags ─────────────────────────────────────────────────────

    /// Remove `station_id` from every tag's station list. Used by
    /// DestroyStation's "detach tags" step.
    pub fn detach_station_from_tags(&self, station_id: &str) {
        for tag in self.tags.write().values_mut() {
            tag.station_ids.retain(|id| id != station_id);
        }
    }

    // ── Connections ──────────────────────────────────────────────

    /// Resolve a connection record, creating a minimal one if this is the
    /// first time this connection id has been referenced. The connect
    /// handshake itself is out of scope here; producer/consumer creation
    /// just needs something to resolve `connection_id` against.
    pub fn ensure_connection(&self, connection_id: &str) -> Connection {
        let mut connections = self.connections.write();
        if let Some(existing) = connections.get(connection_id) {
            return existing.clone();
        }
        let connection = Connection {
            id: connection_id.to_string(),
            client_id: connection_id.to_string(),
            created_at: chrono::Utc::now(),
        };
        connections.insert(connection_id.to_string(), connection.clone());
        connection
    }

    pub fn get_connection(&self, connection_id: &str) -> Option<Connection> {
        self.connections.read().get(connection_id).cloned()
    }

    // ── Audit log ────────────────────────────────────────────────

    pub fn append_audit_log(&self, log: AuditLog) {
        self.audit_logs.write().push(log);
    }

    pub fn list_audit_logs_for_station(&self, station_external_name: &str) -> Vec<AuditLog> {
        self.audit_logs
            .read()
            .iter()
            .filter(|l| l.station_external_name == station_external_name)
            .cloned()
            .collect()
    }

    /// Best-effort cleanup of a destroyed station's audit trail. Callers
    /// never fail the destroy operation on account of this (§7's audit-log
    /// failure policy).
    pub fn delete_audit_logs_for_station(&self, station_external_name: &str) -> usize {
        let mut logs = self.audit_logs.write();
        let before = logs.len();
        logs.retain(|l| l.station_external_name != station_external_name);
        before - logs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use station_domain::entities::{DlsConfig, RetentionType, StorageType};

    fn repo() -> MetadataRepository {
        let dir = tempfile::tempdir().unwrap();
        MetadataRepository::new(dir.path()).unwrap()
    }

    fn station(name: &str) -> Station {
        Station::new(
            name.to_string(),
            name.to_string(),
            RetentionType::MessageAgeSec,
            604_800,
            StorageType::File,
            1,
            false,
            0,
            120_000,
            DlsConfig::default(),
            true,
            "tester".into(),
        )
    }

    #[test]
    fn upsert_creates_when_absent() {
        let repo = repo();
        match repo.upsert_station_if_absent(station("orders")) {
            UpsertOutcome::Created(s) => assert_eq!(s.external_name, "orders"),
            UpsertOutcome::AlreadyExists(_) => panic!("expected Created"),
        }
    }

    #[test]
    fn upsert_reports_already_exists_for_live_station() {
        let repo = repo();
        repo.upsert_station_if_absent(station("orders"));
        match repo.upsert_station_if_absent(station("orders")) {
            UpsertOutcome::AlreadyExists(s) => assert_eq!(s.external_name, "orders"),
            UpsertOutcome::Created(_) => panic!("expected AlreadyExists"),
        }
    }

    #[test]
    fn tombstone_unblocks_recreation() {
        let repo = repo();
        repo.upsert_station_if_absent(station("orders"));
        let station_id = repo.get_station("orders").unwrap().id;
        repo.tombstone_station("orders");

        match repo.upsert_station_if_absent(station("orders")) {
            UpsertOutcome::Created(s) => assert_ne!(s.id, station_id),
            UpsertOutcome::AlreadyExists(_) => panic!("tombstone should not block recreation"),
        }
    }

    #[test]
    fn destroy_cascades_to_producers_and_consumers() {
        let repo = repo();
        let created = match repo.upsert_station_if_absent(station("orders")) {
            UpsertOutcome::Created(s) => s,
            _ => unreachable!(),
        };
        repo.insert_producer(Producer::new("p1".into(), created.id.clone(), "conn1".into(), "application".into()));
        repo.insert_consumer(Consumer::new(
            "c1".into(),
            created.id.clone(),
            "conn1".into(),
            "application".into(),
            "cg1".into(),
            30_000,
            10,
        ));

        repo.deactivate_all_producers_for_station(&created.id);
        repo.deactivate_all_consumers_for_station(&created.id);

        assert!(repo.list_producers_for_station(&created.id).iter().all(|p| p.is_deleted));
        assert!(repo.list_consumers_for_station(&created.id).iter().all(|c| c.is_deleted));
    }

    #[test]
    fn flush_and_reload_round_trips_stations() {
        let dir = tempfile::tempdir().unwrap();
        {
            let repo = MetadataRepository::new(dir.path()).unwrap();
            repo.upsert_station_if_absent(station("orders"));
            repo.flush().unwrap();
        }
        let reloaded = MetadataRepository::new(dir.path()).unwrap();
        assert!(reloaded.get_station("orders").is_some());
    }

    #[test]
    fn consumer_groups_derive_active_from_members() {
        let repo = repo();
        let created = match repo.upsert_station_if_absent(station("orders")) {
            UpsertOutcome::Created(s) => s,
            _ => unreachable!(),
        };
        repo.insert_consumer(Consumer::new(
            "c1".into(),
            created.id.clone(),
            "conn1".into(),
            "application".into(),
            "cg1".into(),
            30_000,
            10,
        ));
        let groups = repo.consumer_groups_for_station(&created.id, &HashMap::new());
        assert_eq!(groups.len(), 1);
        assert!(groups[0].is_active);
        assert!(!groups[0].is_deleted);
    }
}
