//! `LaunchDlsForOldStations`: startup reconciliation that backfills a DLS
//! stream for any non-deleted station that predates the DLS subsystem (or
//! otherwise lost its DLS stream).

use station_domain::entities::DlsConfig;
use station_domain::error::{Error, Result};
use station_engine::dls_stream_name;

use crate::state::AppState;

pub async fn launch_dls_for_old_stations(state: &AppState) -> Result<usize> {
    let mut backfilled = 0;
    for station in state.store.list_stations() {
        if station.is_deleted {
            continue;
        }
        let dls_stream = dls_stream_name(&station.internal_name);
        match state.engine.stream_message_count(&dls_stream).await {
            Ok(_) => continue,
            Err(Error::StreamMissing(_)) => {
                state.store.set_station_dls_configuration(&station.external_name, DlsConfig::default());
                state.engine.create_station_streams(&station.internal_name).await?;
                backfilled += 1;
                tracing::info!(station = %station.external_name, "backfilled missing DLS stream");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(backfilled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use station_domain::entities::{RetentionType, Station, StorageType};
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

    #[tokio::test]
    async fn backfills_only_stations_missing_a_dls_stream() {
        let (state, engine) = test_state();
        state.store.upsert_station_if_absent(station("with-dls"));
        engine.create_station_streams("with-dls").await.unwrap();

        state.store.upsert_station_if_absent(station("without-dls"));

        let backfilled = launch_dls_for_old_stations(&state).await.unwrap();
        assert_eq!(backfilled, 1);
        assert!(engine.stream_exists(&dls_stream_name("without-dls")));
    }

    #[tokio::test]
    async fn skips_deleted_stations() {
        let (state, engine) = test_state();
        state.store.upsert_station_if_absent(station("gone"));
        state.store.tombstone_station("gone");

        let backfilled = launch_dls_for_old_stations(&state).await.unwrap();
        assert_eq!(backfilled, 0);
        assert!(!engine.stream_exists(&dls_stream_name("gone")));
    }
}
