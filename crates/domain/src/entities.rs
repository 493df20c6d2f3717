//! Persisted entity types backing the Metadata Repository facade.
//!
//! Field names use `serde(rename_all = "snake_case")` so the JSON shape
//! matches the wire-exposed forms named in the external-interfaces contract
//! (`retention_type`, `storage_type`, `is_native`, `is_deleted`, ...).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Retention / storage
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetentionType {
    MessageAgeSec,
    Messages,
    Bytes,
}

impl Default for RetentionType {
    fn default() -> Self {
        Self::MessageAgeSec
    }
}

/// Default retention value (7 days in seconds) when unspecified.
pub const DEFAULT_RETENTION_VALUE: i64 = 604_800;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Retention {
    pub kind: RetentionType,
    pub value: i64,
}

impl Default for Retention {
    fn default() -> Self {
        Self {
            kind: RetentionType::MessageAgeSec,
            value: DEFAULT_RETENTION_VALUE,
        }
    }
}

/// Storage kind as persisted in the store. The presentation layer renames
/// `File` to `"disk"` on the way out only — inbound requests never accept
/// `"disk"` (see `station_domain::config::validate_storage_type`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageType {
    File,
    Memory,
}

impl Default for StorageType {
    fn default() -> Self {
        Self::File
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// DLS configuration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DlsConfig {
    #[serde(default = "d_true")]
    pub poison: bool,
    #[serde(default = "d_true")]
    pub schemaverse: bool,
}

fn d_true() -> bool {
    true
}

impl Default for DlsConfig {
    fn default() -> Self {
        Self {
            poison: true,
            schemaverse: true,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Schema / SchemaBinding
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schema {
    pub id: String,
    pub name: String,
    pub latest_active_version_number: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaVersion {
    pub id: String,
    pub schema_id: String,
    pub version_number: u32,
    pub content: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// `station→(schemaName, versionNumber)`. Absent means no binding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaBinding {
    pub name: String,
    pub version_number: u32,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Station
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Station {
    pub id: String,
    pub external_name: String,
    pub internal_name: String,
    pub retention_type: RetentionType,
    pub retention_value: i64,
    pub storage_type: StorageType,
    pub replicas: u8,
    /// Deprecated but still accepted and persisted.
    pub dedup_enabled: bool,
    /// Deprecated but still accepted and persisted.
    pub dedup_window_in_ms: i64,
    pub idempotency_window_in_ms: i64,
    pub dls_configuration: DlsConfig,
    pub schema: Option<SchemaBinding>,
    pub is_native: bool,
    pub is_deleted: bool,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Station {
    pub fn new(
        external_name: String,
        internal_name: String,
        retention_type: RetentionType,
        retention_value: i64,
        storage_type: StorageType,
        replicas: u8,
        dedup_enabled: bool,
        dedup_window_in_ms: i64,
        idempotency_window_in_ms: i64,
        dls_configuration: DlsConfig,
        is_native: bool,
        created_by: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            external_name,
            internal_name,
            retention_type,
            retention_value,
            storage_type,
            replicas,
            dedup_enabled,
            dedup_window_in_ms,
            idempotency_window_in_ms,
            dls_configuration,
            schema: None,
            is_native,
            is_deleted: false,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Producer / Consumer
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Producer {
    pub id: String,
    pub name: String,
    pub station_id: String,
    pub connection_id: String,
    pub producer_type: String,
    pub is_active: bool,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
}

impl Producer {
    pub fn new(
        name: String,
        station_id: String,
        connection_id: String,
        producer_type: String,
    ) -> Self {
        Self {
            id: new_id(),
            name,
            station_id,
            connection_id,
            producer_type,
            is_active: true,
            is_deleted: false,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Consumer {
    pub id: String,
    pub name: String,
    pub station_id: String,
    pub connection_id: String,
    pub consumer_type: String,
    pub consumers_group: String,
    pub max_ack_time_ms: i64,
    pub max_msg_deliveries: i32,
    pub is_active: bool,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
}

impl Consumer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: String,
        station_id: String,
        connection_id: String,
        consumer_type: String,
        consumers_group: String,
        max_ack_time_ms: i64,
        max_msg_deliveries: i32,
    ) -> Self {
        Self {
            id: new_id(),
            name,
            station_id,
            connection_id,
            consumer_type,
            consumers_group,
            max_ack_time_ms,
            max_msg_deliveries,
            is_active: true,
            is_deleted: false,
            created_at: Utc::now(),
        }
    }
}

/// Derived view over the live consumer records sharing a `consumers_group`
/// name, enriched with engine-reported pending counts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumerGroup {
    pub name: String,
    pub members: Vec<Consumer>,
    pub max_ack_time_ms: i64,
    pub max_msg_deliveries: i32,
    pub unprocessed: u64,
    pub in_process: u64,
    pub is_active: bool,
    pub is_deleted: bool,
}

impl ConsumerGroup {
    /// Derive active/deleted from the member set:
    /// active iff any member is active; deleted iff all members are deleted.
    pub fn from_members(name: String, members: Vec<Consumer>, unprocessed: u64, in_process: u64) -> Option<Self> {
        let first = members.first()?;
        let max_ack_time_ms = first.max_ack_time_ms;
        let max_msg_deliveries = first.max_msg_deliveries;
        let is_active = members.iter().any(|m| m.is_active);
        let is_deleted = members.iter().all(|m| m.is_deleted);
        Some(Self {
            name,
            members,
            max_ack_time_ms,
            max_msg_deliveries,
            unprocessed,
            in_process,
            is_active,
            is_deleted,
        })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Connection / Tag
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    pub id: String,
    pub client_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub id: String,
    pub name: String,
    pub station_ids: Vec<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Dead-letter-stream message
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DlsMessageKind {
    Poison,
    SchemaverseFailed,
}

impl DlsMessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Poison => "poison",
            Self::SchemaverseFailed => "schemaverse-failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "poison" => Some(Self::Poison),
            "schemaverse-failed" => Some(Self::SchemaverseFailed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagePayload {
    pub subject: String,
    pub headers: std::collections::BTreeMap<String, String>,
    /// Hex-encoded message body.
    pub data_hex: String,
    pub time_sent: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlsMessage {
    /// Format: `<internalStation><sep><kind><sep><seq>`.
    pub id: String,
    pub kind: DlsMessageKind,
    pub station_id: String,
    pub sequence: u64,
    pub payload: MessagePayload,
    pub producer_ref: Option<String>,
    pub poisoned_consumer_groups: Vec<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Audit log
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorKind {
    Application,
    Sdk,
    UserRole,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLog {
    pub id: String,
    pub station_external_name: String,
    pub message: String,
    pub actor: String,
    pub actor_kind: ActorKind,
    pub created_at: DateTime<Utc>,
}

impl AuditLog {
    pub fn new(station_external_name: String, message: String, actor: String, actor_kind: ActorKind) -> Self {
        Self {
            id: new_id(),
            station_external_name,
            message,
            actor,
            actor_kind,
            created_at: Utc::now(),
        }
    }
}
