//! Dead-Letter Inspector: journey details, ack/resend, and message-detail
//! lookup over a station's DLS stream.
//!
//! The inspector never writes poison entries itself — the stream engine
//! deposits those on ack-timeout or schema failure — it only reads, acks
//! (deletes), and resends what's already there.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;

use station_domain::entities::{ActorKind, AuditLog, DlsMessageKind};
use station_domain::error::{Error, Result};
use station_domain::trace::TraceEvent;
use station_engine::{dls_stream_name, EngineMessage};
use station_protocol::{
    subjects, AckPoisonMessagesRequest, GetMessageDetailsRequest, MessageDetailsResponse, PoisonMessageJourneyResponse,
    PoisonedCgView, ResendPoisonMessagesRequest, HEADER_PM_ID, HEADER_PM_SEQUENCE,
};

use crate::state::AppState;

/// Separator between the three components of a DLS id. Safe to split on
/// because canonicalization never leaves a literal `.` in an internal name
/// (it's substituted for `#`).
const DLS_ID_SEP: char = '.';

/// Header carrying the comma-separated list of consumer-group names a DLS
/// message poisoned, newest first. Not part of the eight wire subjects'
/// contract — an internal convention between the stream engine and this
/// inspector for enriching journey/message-detail views.
const HEADER_POISONED_CGS: &str = "$memphis_poisoned_cgs";

struct DlsId {
    internal_station: String,
    kind: DlsMessageKind,
    sequence: u64,
}

fn format_dls_id(internal_station: &str, kind: DlsMessageKind, sequence: u64) -> String {
    format!("{internal_station}{DLS_ID_SEP}{}{DLS_ID_SEP}{sequence}", kind.as_str())
}

fn parse_dls_id(id: &str) -> Result<DlsId> {
    let mut parts = id.splitn(3, DLS_ID_SEP);
    let internal_station = parts.next().filter(|s| !s.is_empty());
    let kind_str = parts.next();
    let seq_str = parts.next();
    let (internal_station, kind_str, seq_str) = match (internal_station, kind_str, seq_str) {
        (Some(s), Some(k), Some(n)) => (s, k, n),
        _ => return Err(Error::ValidationFailure(format!("malformed DLS id \"{id}\""))),
    };
    let kind = DlsMessageKind::parse(kind_str).ok_or_else(|| Error::ValidationFailure(format!("unknown DLS kind \"{kind_str}\"")))?;
    let sequence = seq_str
        .parse::<u64>()
        .map_err(|_| Error::ValidationFailure(format!("malformed DLS sequence \"{seq_str}\"")))?;
    Ok(DlsId {
        internal_station: internal_station.to_string(),
        kind,
        sequence,
    })
}

fn filter_subject(dls_stream: &str, kind: DlsMessageKind) -> String {
    format!("{dls_stream}.{}", kind.as_str())
}

fn strip_memphis_headers(headers: &HashMap<String, String>) -> BTreeMap<String, String> {
    headers
        .iter()
        .filter(|(k, _)| !k.starts_with("$memphis"))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

fn header_size(headers: &HashMap<String, String>) -> u64 {
    headers.iter().map(|(k, v)| (k.len() + v.len()) as u64).sum()
}

/// `$memphis_connectionId`/`$memphis_producedBy`, falling back to the
/// unprefixed `connectionId`/`producedBy` for older SDKs. Native stations
/// reject a message carrying neither; a non-native station's message (the
/// producer could be any foreign client) just resolves to empty fields.
fn extract_producer_info(headers: &HashMap<String, String>, is_native: bool) -> Result<(String, String)> {
    let connection_id = headers
        .get("$memphis_connectionId")
        .or_else(|| headers.get("connectionId"));
    let produced_by = headers.get("$memphis_producedBy").or_else(|| headers.get("producedBy"));

    match (connection_id, produced_by) {
        (Some(c), Some(p)) => Ok((c.clone(), p.clone())),
        _ if is_native => Err(Error::HeadersMissing),
        _ => Ok((String::new(), String::new())),
    }
}

async fn poisoned_cgs_for(state: &AppState, station_id: &str, internal_station: &str, headers: &HashMap<String, String>) -> Vec<PoisonedCgView> {
    let Some(raw) = headers.get(HEADER_POISONED_CGS) else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut names = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if seen.insert(name.to_string()) {
            names.push(name.to_string());
        }
    }

    let mut pending_by_group = HashMap::new();
    for name in &names {
        let durable = crate::lifecycle::durable_consumer_name(internal_station, name);
        if let Ok(pending) = state.engine.consumer_pending(internal_station, &durable).await {
            pending_by_group.insert(name.clone(), pending);
        }
    }

    let mut groups = state.store.consumer_groups_for_station(station_id, &pending_by_group);
    groups.retain(|g| names.contains(&g.name));
    groups.sort_by_key(|g| names.iter().position(|n| n == &g.name).unwrap_or(usize::MAX));

    groups
        .into_iter()
        .map(|g| PoisonedCgView {
            name: g.name,
            members: g.members.into_iter().map(|m| m.name).collect(),
            is_active: g.is_active,
            is_deleted: g.is_deleted,
            unprocessed: g.unprocessed,
            in_process: g.in_process,
            total_poison_messages: g.unprocessed,
        })
        .collect()
}

pub async fn journey_details(state: &AppState, dls_id: &str) -> Result<PoisonMessageJourneyResponse> {
    let parsed = parse_dls_id(dls_id)?;
    let station = state
        .store
        .get_live_station_by_internal_name(&parsed.internal_station)
        .ok_or_else(|| Error::NotFound(format!("station for internal name {}", parsed.internal_station)))?;

    let dls_stream = dls_stream_name(&station.internal_name);
    let message = state
        .engine
        .get_message(&dls_stream, parsed.sequence)
        .await?
        .ok_or_else(|| Error::NotFound(format!("DLS message {dls_id}")))?;

    let (producer_name, _) = extract_producer_info(&message.headers, station.is_native).unwrap_or_default();
    let poisoned_cgs = poisoned_cgs_for(state, &station.id, &station.internal_name, &message.headers).await;

    Ok(PoisonMessageJourneyResponse {
        message_seq: message.sequence,
        subject: message.subject.clone(),
        data: hex::encode(&message.data),
        headers: strip_memphis_headers(&message.headers),
        size: message.subject.len() as u64 + message.data.len() as u64 + header_size(&message.headers),
        time_sent: message.time_sent,
        producer_name,
        poisoned_cgs,
    })
}

pub async fn get_message_details(state: &AppState, req: GetMessageDetailsRequest) -> Result<MessageDetailsResponse> {
    let canonical = station_names::canonical(&req.station_name)?;
    let station = state
        .store
        .get_station(&canonical.external)
        .ok_or_else(|| Error::NotFound(format!("station {}", canonical.external)))?;

    let stream_name = if req.is_poison {
        dls_stream_name(&station.internal_name)
    } else {
        station.internal_name.clone()
    };

    let message = state
        .engine
        .get_message(&stream_name, req.sequence)
        .await?
        .ok_or_else(|| Error::NotFound(format!("sequence {} on {stream_name}", req.sequence)))?;

    let (connection_id, producer_name) = extract_producer_info(&message.headers, station.is_native)?;
    let poisoned_cgs = if req.is_poison {
        poisoned_cgs_for(state, &station.id, &station.internal_name, &message.headers).await
    } else {
        Vec::new()
    };

    Ok(MessageDetailsResponse {
        message_seq: message.sequence,
        subject: message.subject.clone(),
        data: hex::encode(&message.data),
        headers: strip_memphis_headers(&message.headers),
        size: message.subject.len() as u64 + message.data.len() as u64 + header_size(&message.headers),
        time_sent: message.time_sent,
        producer_name,
        connection_id,
        poisoned_cgs,
    })
}

/// Group requested DLS ids by kind, collecting the set of sequences
/// requested for each — the fetch-by-filter call is per-kind (one filter
/// subject per kind), and the result is restricted back down to exactly
/// the sequences the caller named.
fn group_by_kind(ids: &[String], expected_internal_station: &str) -> Result<HashMap<DlsMessageKind, HashSet<u64>>> {
    let mut by_kind: HashMap<DlsMessageKind, HashSet<u64>> = HashMap::new();
    for id in ids {
        let parsed = parse_dls_id(id)?;
        if parsed.internal_station != expected_internal_station {
            return Err(Error::ValidationFailure(format!(
                "DLS id {id} does not belong to station {expected_internal_station}"
            )));
        }
        by_kind.entry(parsed.kind).or_default().insert(parsed.sequence);
    }
    Ok(by_kind)
}

/// Run the fetch-by-filter protocol once per requested kind, returning only
/// the messages whose sequence was actually requested. The fetch amount is
/// the DLS stream's total message count (§5's intentional over-request),
/// bounded by the configured `dls.fetch_timeout_ms`.
async fn collect_requested(state: &AppState, dls_stream: &str, by_kind: &HashMap<DlsMessageKind, HashSet<u64>>) -> Result<Vec<EngineMessage>> {
    let fetch_timeout = Duration::from_millis(state.config.dls.fetch_timeout_ms);
    let amount = state.engine.stream_message_count(dls_stream).await? as usize;
    let mut collected = Vec::new();
    for (kind, sequences) in by_kind {
        let consumer_name = state.nuid.next_consumer_name("dls-fetch");
        let fetched = state
            .engine
            .fetch_by_filter(dls_stream, &filter_subject(dls_stream, *kind), amount, fetch_timeout, &consumer_name)
            .await?;
        collected.extend(fetched.into_iter().filter(|m| sequences.contains(&m.sequence)));
    }
    Ok(collected)
}

pub async fn ack_poison_messages(state: &AppState, req: AckPoisonMessagesRequest) -> Result<usize> {
    let canonical = station_names::canonical(&req.station_name)?;
    let station = state
        .store
        .get_live_station(&canonical.external)
        .ok_or_else(|| Error::NotFound(format!("station {}", canonical.external)))?;

    let by_kind = group_by_kind(&req.poison_message_ids, &station.internal_name)?;
    let dls_stream = dls_stream_name(&station.internal_name);
    let matched = collect_requested(state, &dls_stream, &by_kind).await?;

    let mut deleted = 0;
    for message in &matched {
        match state.engine.delete_message(&dls_stream, message.sequence).await {
            Ok(()) => deleted += 1,
            Err(e) => tracing::warn!(station = %station.external_name, sequence = message.sequence, error = %e, "acking poison message"),
        }
    }

    audit(
        state,
        &station.external_name,
        format!("{deleted} poison message(s) acked"),
    );
    TraceEvent::PoisonMessagesAcked {
        station: station.external_name,
        count: deleted,
    }
    .emit();

    Ok(deleted)
}

pub async fn resend_poison_messages(state: &AppState, req: ResendPoisonMessagesRequest) -> Result<usize> {
    let canonical = station_names::canonical(&req.station_name)?;
    let station = state
        .store
        .get_live_station(&canonical.external)
        .ok_or_else(|| Error::NotFound(format!("station {}", canonical.external)))?;

    let by_kind = group_by_kind(&req.poison_message_ids, &station.internal_name)?;
    let dls_stream = dls_stream_name(&station.internal_name);
    let matched = collect_requested(state, &dls_stream, &by_kind).await?;

    let mut resent = 0;
    for message in &matched {
        let dls_id = format_dls_id(
            &station.internal_name,
            parse_dls_id_kind_from_subject(&message.subject).unwrap_or(DlsMessageKind::Poison),
            message.sequence,
        );
        let mut headers = message.headers.clone();
        headers.insert(HEADER_PM_ID.to_string(), dls_id);
        headers.insert(HEADER_PM_SEQUENCE.to_string(), message.sequence.to_string());

        let groups: Vec<String> = headers
            .get(HEADER_POISONED_CGS)
            .map(|raw| raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect())
            .unwrap_or_default();

        let mut published = 0;
        for cg in &groups {
            let subject = subjects::dls_resend(&state.config.broker.subject_prefix, &station.internal_name, cg);
            match state
                .engine
                .publish_with_headers(&subject, headers.clone(), message.data.clone())
                .await
            {
                Ok(()) => published += 1,
                Err(e) => tracing::warn!(station = %station.external_name, group = %cg, error = %e, "resending poison message"),
            }
        }
        if published > 0 {
            resent += 1;
        }
    }

    audit(
        state,
        &station.external_name,
        format!("{resent} poison message(s) resent"),
    );
    TraceEvent::PoisonMessagesResent {
        station: station.external_name,
        count: resent,
    }
    .emit();

    Ok(resent)
}

/// The DLS subject convention is `<stream>.<kind>`; recover the kind from a
/// fetched message's subject when resending (the message doesn't otherwise
/// carry its own kind once it's off the wire id).
fn parse_dls_id_kind_from_subject(subject: &str) -> Option<DlsMessageKind> {
    subject.rsplit('.').next().and_then(DlsMessageKind::parse)
}

fn audit(state: &AppState, station_external_name: &str, message: impl Into<String>) {
    state.store.append_audit_log(AuditLog::new(
        station_external_name.to_string(),
        message.into(),
        "sdk-client".to_string(),
        ActorKind::Sdk,
    ));
}

#[cfg(test)]
mod tests {
    use super::*;
    use station_engine::FakeEngine;
    use station_store::MetadataRepository;
    use std::sync::Arc;

    fn test_state() -> (AppState, Arc<FakeEngine>) {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(FakeEngine::new());
        let state = AppState::new(
            Arc::new(station_domain::config::Config::default()),
            Arc::new(MetadataRepository::new(dir.path()).unwrap()),
            engine.clone(),
            None,
        );
        (state, engine)
    }

    #[test]
    fn dls_id_round_trips() {
        let id = format_dls_id("orders", DlsMessageKind::Poison, 42);
        assert_eq!(id, "orders.poison.42");
        let parsed = parse_dls_id(&id).unwrap();
        assert_eq!(parsed.internal_station, "orders");
        assert_eq!(parsed.kind, DlsMessageKind::Poison);
        assert_eq!(parsed.sequence, 42);
    }

    #[test]
    fn malformed_dls_id_is_rejected() {
        assert!(parse_dls_id("orders-only").is_err());
        assert!(parse_dls_id("orders.not-a-kind.1").is_err());
        assert!(parse_dls_id("orders.poison.not-a-number").is_err());
    }

    #[tokio::test]
    async fn ack_deletes_matching_sequences_and_nothing_else() {
        let (state, engine) = test_state();
        state.store.upsert_station_if_absent(station_domain::entities::Station::new(
            "orders".into(),
            "orders".into(),
            station_domain::entities::RetentionType::MessageAgeSec,
            604_800,
            station_domain::entities::StorageType::File,
            1,
            false,
            0,
            120_000,
            station_domain::entities::DlsConfig::default(),
            true,
            "tester".into(),
        ));
        engine.create_station_streams("orders").await.unwrap();
        let dls = dls_stream_name("orders");
        let seq1 = engine.seed_message(&dls, "dls_orders.poison", b"one".to_vec());
        let seq2 = engine.seed_message(&dls, "dls_orders.poison", b"two".to_vec());
        let _unrelated = engine.seed_message(&dls, "dls_orders.poison", b"three".to_vec());

        let id1 = format_dls_id("orders", DlsMessageKind::Poison, seq1);
        let id2 = format_dls_id("orders", DlsMessageKind::Poison, seq2);

        let deleted = ack_poison_messages(
            &state,
            AckPoisonMessagesRequest {
                station_name: "Orders".into(),
                poison_message_ids: vec![id1, id2],
            },
        )
        .await
        .unwrap();

        assert_eq!(deleted, 2);
        assert_eq!(engine.stream_message_count(&dls).await.unwrap(), 1);
        assert_eq!(engine.durable_consumer_count(&dls), 0);
    }

    #[tokio::test]
    async fn get_message_details_on_non_native_station_has_empty_producer_fields() {
        let (state, engine) = test_state();
        state.store.upsert_station_if_absent(station_domain::entities::Station::new(
            "external".into(),
            "external".into(),
            station_domain::entities::RetentionType::MessageAgeSec,
            604_800,
            station_domain::entities::StorageType::File,
            1,
            false,
            0,
            120_000,
            station_domain::entities::DlsConfig::default(),
            false,
            "tester".into(),
        ));
        engine.create_station_streams("external").await.unwrap();
        let seq = engine.seed_message("external", "external.orders", b"hello".to_vec());

        let details = get_message_details(
            &state,
            GetMessageDetailsRequest {
                station_name: "external".into(),
                sequence: seq,
                is_poison: false,
            },
        )
        .await
        .unwrap();

        assert!(details.producer_name.is_empty());
        assert!(details.connection_id.is_empty());
        assert!(details.poisoned_cgs.is_empty());
        assert_eq!(details.size, "external.orders".len() as u64 + "hello".len() as u64);
    }

    #[tokio::test]
    async fn get_message_details_on_native_station_requires_producer_headers() {
        let (state, engine) = test_state();
        state.store.upsert_station_if_absent(station_domain::entities::Station::new(
            "orders".into(),
            "orders".into(),
            station_domain::entities::RetentionType::MessageAgeSec,
            604_800,
            station_domain::entities::StorageType::File,
            1,
            false,
            0,
            120_000,
            station_domain::entities::DlsConfig::default(),
            true,
            "tester".into(),
        ));
        engine.create_station_streams("orders").await.unwrap();
        let seq = engine.seed_message("orders", "orders.events", b"hello".to_vec());

        let err = get_message_details(
            &state,
            GetMessageDetailsRequest {
                station_name: "orders".into(),
                sequence: seq,
                is_poison: false,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::HeadersMissing));
    }
}
