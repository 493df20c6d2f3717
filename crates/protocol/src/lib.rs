//! Wire envelope types for the station control plane's request/reply
//! subjects, schema-update broadcast payload, and DLS resend envelope.
//!
//! JSON field names here ARE the wire contract: renaming any of them is a
//! breaking change for connected SDKs.

use serde::{Deserialize, Serialize};

pub mod subjects {
    /// Default root for the eight control subjects and the schema-update/DLS
    /// broadcast subjects, overridable via `broker.subject_prefix`.
    pub const DEFAULT_PREFIX: &str = "$memphis";

    pub const STATION_CREATIONS_GROUP: &str = "memphis_station_creations_listeners_group";
    pub const STATION_DESTRUCTIONS_GROUP: &str = "memphis_station_destructions_listeners_group";
    pub const PRODUCER_CREATIONS_GROUP: &str = "memphis_producer_creations_listeners_group";
    pub const PRODUCER_DESTRUCTIONS_GROUP: &str = "memphis_producer_destructions_listeners_group";
    pub const CONSUMER_CREATIONS_GROUP: &str = "memphis_consumer_creations_listeners_group";
    pub const CONSUMER_DESTRUCTIONS_GROUP: &str = "memphis_consumer_destructions_listeners_group";
    pub const SCHEMA_ATTACHMENTS_GROUP: &str = "memphis_schema_attachments_listeners_group";
    pub const SCHEMA_DETACHMENTS_GROUP: &str = "memphis_schema_detachments_listeners_group";

    pub fn station_creations(prefix: &str) -> String {
        format!("{prefix}_station_creations")
    }
    pub fn station_destructions(prefix: &str) -> String {
        format!("{prefix}_station_destructions")
    }
    pub fn producer_creations(prefix: &str) -> String {
        format!("{prefix}_producer_creations")
    }
    pub fn producer_destructions(prefix: &str) -> String {
        format!("{prefix}_producer_destructions")
    }
    pub fn consumer_creations(prefix: &str) -> String {
        format!("{prefix}_consumer_creations")
    }
    pub fn consumer_destructions(prefix: &str) -> String {
        format!("{prefix}_consumer_destructions")
    }
    pub fn schema_attachments(prefix: &str) -> String {
        format!("{prefix}_schema_attachments")
    }
    pub fn schema_detachments(prefix: &str) -> String {
        format!("{prefix}_schema_detachments")
    }

    /// `<prefix>_schema_updates_<internalStation>`.
    pub fn schema_updates(prefix: &str, internal_station: &str) -> String {
        format!("{prefix}_schema_updates_{internal_station}")
    }

    /// `<prefix>_dls_<internalStation>_<cgInternal>`.
    pub fn dls_resend(prefix: &str, internal_station: &str, cg_internal: &str) -> String {
        format!("{prefix}_dls_{internal_station}_{cg_internal}")
    }
}

/// Header carrying the resent message's original DLS id.
pub const HEADER_PM_ID: &str = "$memphis_pm_id";
/// Header carrying the resent message's original stream sequence.
pub const HEADER_PM_SEQUENCE: &str = "$memphis_pm_sequence";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Requests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlsConfigurationWire {
    pub poison: bool,
    pub schemaverse: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateStationRequest {
    pub name: String,
    #[serde(default)]
    pub schema_name: Option<String>,
    #[serde(default)]
    pub retention_type: Option<String>,
    #[serde(default)]
    pub retention_value: Option<i64>,
    #[serde(default)]
    pub storage_type: Option<String>,
    #[serde(default)]
    pub replicas: Option<u8>,
    #[serde(default)]
    pub dedup_enabled: Option<bool>,
    #[serde(default)]
    pub dedup_window_in_ms: Option<i64>,
    #[serde(default)]
    pub idempotency_window_in_ms: Option<i64>,
    #[serde(default)]
    pub dls_configuration: Option<DlsConfigurationWire>,
    /// Set by the broker for stations it creates for its own bookkeeping
    /// (e.g. DLS bootstrap); absent on SDK-originated requests.
    #[serde(default)]
    pub is_native: bool,
    #[serde(default)]
    pub created_by: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestroyStationRequest {
    pub station_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProducerRequest {
    pub name: String,
    pub station_name: String,
    pub connection_id: String,
    pub producer_type: String,
    /// Present on v1+ requests; absent implies v0 (no schema_update in reply).
    #[serde(default)]
    pub req_version: Option<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestroyProducerRequest {
    pub station_name: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateConsumerRequest {
    pub name: String,
    pub station_name: String,
    pub connection_id: String,
    pub consumer_type: String,
    pub consumers_group: String,
    pub max_ack_time_ms: i64,
    pub max_msg_deliveries: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestroyConsumerRequest {
    pub station_name: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachSchemaRequest {
    pub name: String,
    pub station_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetachSchemaRequest {
    pub station_name: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Replies
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Most control subjects reply with an empty byte string on success or the
/// literal error message on failure. `encode` captures that rule at the one
/// seam where a handler `Result` becomes reply bytes.
pub fn encode_simple_reply(result: Result<(), String>) -> Vec<u8> {
    match result {
        Ok(()) => Vec::new(),
        Err(message) => message.into_bytes(),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProducerCreateReply {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_update: Option<SchemaUpdateInit>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Schema update broadcast
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaUpdateInit {
    pub schema_name: String,
    pub version_number: u32,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "update_type", rename_all = "lowercase")]
pub enum SchemaUpdateMessage {
    Init { init: SchemaUpdateInit },
    Drop {},
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Dead-Letter Inspector surface (HTTP collaborator shape)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AckPoisonMessagesRequest {
    pub station_name: String,
    pub poison_message_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResendPoisonMessagesRequest {
    pub station_name: String,
    pub poison_message_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetMessageDetailsRequest {
    pub station_name: String,
    pub sequence: u64,
    #[serde(default)]
    pub is_poison: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoisonedCgView {
    pub name: String,
    pub members: Vec<String>,
    pub is_active: bool,
    pub is_deleted: bool,
    pub unprocessed: u64,
    pub in_process: u64,
    pub total_poison_messages: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageDetailsResponse {
    pub message_seq: u64,
    pub subject: String,
    /// Hex-encoded message body.
    pub data: String,
    pub headers: std::collections::BTreeMap<String, String>,
    pub size: u64,
    pub time_sent: chrono::DateTime<chrono::Utc>,
    #[serde(default)]
    pub producer_name: String,
    #[serde(default)]
    pub connection_id: String,
    pub poisoned_cgs: Vec<PoisonedCgView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoisonMessageJourneyResponse {
    pub message_seq: u64,
    pub subject: String,
    pub data: String,
    pub headers: std::collections::BTreeMap<String, String>,
    pub size: u64,
    pub time_sent: chrono::DateTime<chrono::Utc>,
    #[serde(default)]
    pub producer_name: String,
    pub poisoned_cgs: Vec<PoisonedCgView>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_updates_subject_is_templated() {
        assert_eq!(
            subjects::schema_updates(subjects::DEFAULT_PREFIX, "orders"),
            "$memphis_schema_updates_orders"
        );
    }

    #[test]
    fn dls_resend_subject_is_templated() {
        assert_eq!(
            subjects::dls_resend(subjects::DEFAULT_PREFIX, "orders", "billing_cg"),
            "$memphis_dls_orders_billing_cg"
        );
    }

    #[test]
    fn control_subjects_honor_a_custom_prefix() {
        assert_eq!(subjects::station_creations("$custom"), "$custom_station_creations");
    }

    #[test]
    fn simple_reply_success_is_empty() {
        assert!(encode_simple_reply(Ok(())).is_empty());
    }

    #[test]
    fn simple_reply_error_is_the_literal_message() {
        let bytes = encode_simple_reply(Err("station orders already exists".into()));
        assert_eq!(bytes, b"station orders already exists");
    }

    #[test]
    fn schema_update_init_serializes_with_tag() {
        let msg = SchemaUpdateMessage::Init {
            init: SchemaUpdateInit {
                schema_name: "orderv1".into(),
                version_number: 3,
                content: "{}".into(),
            },
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["update_type"], "init");
    }

    #[test]
    fn schema_update_drop_serializes_with_tag() {
        let msg = SchemaUpdateMessage::Drop {};
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["update_type"], "drop");
    }

    #[test]
    fn create_station_request_defaults_are_absent() {
        let req: CreateStationRequest = serde_json::from_str(r#"{"name":"orders"}"#).unwrap();
        assert!(req.retention_type.is_none());
        assert!(req.replicas.is_none());
        assert!(!req.is_native);
    }
}
