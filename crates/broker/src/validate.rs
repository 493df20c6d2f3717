//! Normalization and bounds-checking for the fields the wire requests leave
//! optional: retention, storage, replicas, idempotency window. Shared by
//! every `CreateStation` entry point (direct/SDK and HTTP) the way the
//! teacher centralizes request validation in one module rather than
//! scattering bound checks across handlers.

use station_domain::entities::{DlsConfig, RetentionType, StorageType, DEFAULT_RETENTION_VALUE};
use station_domain::error::{Error, Result};
use station_protocol::DlsConfigurationWire;

pub const MAX_REPLICAS: u8 = 5;
pub const MIN_IDEMPOTENCY_WINDOW_MS: i64 = 100;
pub const DEFAULT_IDEMPOTENCY_WINDOW_MS: i64 = 120_000;

/// Everything a `CreateStation` handler needs after normalization, in the
/// shape the `Station` constructor expects.
pub struct NormalizedStationFields {
    pub retention_type: RetentionType,
    pub retention_value: i64,
    pub storage_type: StorageType,
    pub replicas: u8,
    pub idempotency_window_in_ms: i64,
    pub dls_configuration: DlsConfig,
}

pub fn parse_retention_type(s: &str) -> Result<RetentionType> {
    match s {
        "message_age_sec" => Ok(RetentionType::MessageAgeSec),
        "messages" => Ok(RetentionType::Messages),
        "bytes" => Ok(RetentionType::Bytes),
        other => Err(Error::ValidationFailure(format!("unknown retention_type \"{other}\""))),
    }
}

/// Storage is persisted as `file`/`memory`; the presentation layer renames
/// `file` to `disk` on the way *out* only — `disk` is never a valid inbound
/// value (testable property §8.13).
pub fn parse_storage_type(s: &str) -> Result<StorageType> {
    match s {
        "file" => Ok(StorageType::File),
        "memory" => Ok(StorageType::Memory),
        "disk" => Err(Error::ValidationFailure(
            "\"disk\" is a presentation-layer alias for \"file\" and is not accepted on input".into(),
        )),
        other => Err(Error::ValidationFailure(format!("unknown storage_type \"{other}\""))),
    }
}

/// `0 → 1`; `replicas > MAX_REPLICAS` is a hard validation failure.
pub fn normalize_replicas(replicas: Option<u8>) -> Result<u8> {
    let replicas = replicas.unwrap_or(1);
    let replicas = if replicas == 0 { 1 } else { replicas };
    if replicas > MAX_REPLICAS {
        return Err(Error::ValidationFailure(format!(
            "replicas must be between 1 and {MAX_REPLICAS}, got {replicas}"
        )));
    }
    Ok(replicas)
}

/// `<= 0 → 120000` (the deprecated-but-accepted default); otherwise
/// clamped up to a minimum of 100ms.
pub fn normalize_idempotency_window_ms(value: Option<i64>) -> i64 {
    match value {
        None => DEFAULT_IDEMPOTENCY_WINDOW_MS,
        Some(v) if v <= 0 => DEFAULT_IDEMPOTENCY_WINDOW_MS,
        Some(v) if v < MIN_IDEMPOTENCY_WINDOW_MS => MIN_IDEMPOTENCY_WINDOW_MS,
        Some(v) => v,
    }
}

pub fn normalize_dls_configuration(wire: Option<DlsConfigurationWire>) -> DlsConfig {
    match wire {
        Some(w) => DlsConfig {
            poison: w.poison,
            schemaverse: w.schemaverse,
        },
        None => DlsConfig::default(),
    }
}

/// Normalize every optional `CreateStation` field against the defaults and
/// bounds in the data model (§3).
pub fn normalize_station_fields(
    retention_type: Option<&str>,
    retention_value: Option<i64>,
    storage_type: Option<&str>,
    replicas: Option<u8>,
    idempotency_window_in_ms: Option<i64>,
    dls_configuration: Option<DlsConfigurationWire>,
) -> Result<NormalizedStationFields> {
    let retention_type = match retention_type {
        Some(s) => parse_retention_type(s)?,
        None => RetentionType::MessageAgeSec,
    };
    let retention_value = retention_value.unwrap_or(DEFAULT_RETENTION_VALUE);
    let storage_type = match storage_type {
        Some(s) => parse_storage_type(s)?,
        None => StorageType::File,
    };
    let replicas = normalize_replicas(replicas)?;
    let idempotency_window_in_ms = normalize_idempotency_window_ms(idempotency_window_in_ms);
    let dls_configuration = normalize_dls_configuration(dls_configuration);

    Ok(NormalizedStationFields {
        retention_type,
        retention_value,
        storage_type,
        replicas,
        idempotency_window_in_ms,
        dls_configuration,
    })
}

/// `CreateConsumer` validation: ack time and delivery count must be
/// positive, defaulting to the station-configured fallbacks when the
/// request omits them.
pub fn normalize_consumer_delivery(
    max_ack_time_ms: i64,
    max_msg_deliveries: i32,
    default_max_ack_time_ms: i64,
    default_max_msg_deliveries: i32,
) -> Result<(i64, i32)> {
    let max_ack_time_ms = if max_ack_time_ms <= 0 {
        default_max_ack_time_ms
    } else {
        max_ack_time_ms
    };
    let max_msg_deliveries = if max_msg_deliveries <= 0 {
        default_max_msg_deliveries
    } else {
        max_msg_deliveries
    };
    if max_ack_time_ms <= 0 {
        return Err(Error::ValidationFailure("max_ack_time_ms must be positive".into()));
    }
    if max_msg_deliveries <= 0 {
        return Err(Error::ValidationFailure("max_msg_deliveries must be positive".into()));
    }
    Ok((max_ack_time_ms, max_msg_deliveries))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idempotency_window_normalization_matches_spec_table() {
        assert_eq!(normalize_idempotency_window_ms(Some(0)), 120_000);
        assert_eq!(normalize_idempotency_window_ms(Some(50)), 100);
        assert_eq!(normalize_idempotency_window_ms(Some(200)), 200);
        assert_eq!(normalize_idempotency_window_ms(Some(1_000_000)), 1_000_000);
        assert_eq!(normalize_idempotency_window_ms(None), 120_000);
    }

    #[test]
    fn replicas_zero_becomes_one() {
        assert_eq!(normalize_replicas(Some(0)).unwrap(), 1);
    }

    #[test]
    fn replicas_over_max_is_validation_failure() {
        assert!(matches!(normalize_replicas(Some(6)), Err(Error::ValidationFailure(_))));
    }

    #[test]
    fn replicas_default_is_one() {
        assert_eq!(normalize_replicas(None).unwrap(), 1);
    }

    #[test]
    fn retention_and_storage_default_when_unspecified() {
        let fields = normalize_station_fields(None, None, None, None, None, None).unwrap();
        assert_eq!(fields.retention_type, RetentionType::MessageAgeSec);
        assert_eq!(fields.retention_value, DEFAULT_RETENTION_VALUE);
        assert_eq!(fields.storage_type, StorageType::File);
    }

    #[test]
    fn disk_is_rejected_as_an_inbound_storage_type() {
        assert!(parse_storage_type("disk").is_err());
        assert!(parse_storage_type("file").is_ok());
    }

    #[test]
    fn consumer_delivery_defaults_apply_when_non_positive() {
        let (ack, deliveries) = normalize_consumer_delivery(0, 0, 30_000, 10).unwrap();
        assert_eq!(ack, 30_000);
        assert_eq!(deliveries, 10);
    }

    #[test]
    fn consumer_delivery_rejects_non_positive_defaults() {
        assert!(normalize_consumer_delivery(0, 0, 0, 10).is_err());
    }
}
