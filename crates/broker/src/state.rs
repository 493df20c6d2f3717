//! Process-wide state threaded into every request handler.
//!
//! Grouped by concern the way `sa-gateway`'s `AppState` is: config, the two
//! sources of truth (Metadata Repository, Stream Engine Adapter), and the
//! one piece of process-wide mutable state the control plane actually
//! needs — the nuid generator for durable DLS consumer names.

use std::sync::Arc;

use station_domain::config::Config;
use station_engine::StreamEngine;
use station_store::MetadataRepository;

use crate::nuid::NuidGenerator;

#[derive(Clone)]
pub struct AppState {
    // ── Core services ────────────────────────────────────────────────
    pub config: Arc<Config>,
    pub store: Arc<MetadataRepository>,
    pub engine: Arc<dyn StreamEngine>,

    /// Raw pub/sub client for the control-plane request/reply subjects and
    /// the schema-update/DLS-resend broadcast subjects. Kept separate from
    /// the Stream Engine Adapter's JetStream context so unit tests can
    /// drive lifecycle/DLS logic against a [`station_engine::FakeEngine`]
    /// with no live substrate connection at all (`nats: None`).
    pub nats: Option<async_nats::Client>,

    // ── Process-wide generators ──────────────────────────────────────
    pub nuid: Arc<NuidGenerator>,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        store: Arc<MetadataRepository>,
        engine: Arc<dyn StreamEngine>,
        nats: Option<async_nats::Client>,
    ) -> Self {
        Self {
            config,
            store,
            engine,
            nats,
            nuid: Arc::new(NuidGenerator::new()),
        }
    }
}
