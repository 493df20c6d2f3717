use serde::Serialize;

/// Structured trace events emitted across the control plane.
///
/// Emission never returns a `Result` — by construction this is the
/// "best-effort, swallowed-on-failure" analytics mechanism: serializing and
/// logging an event cannot fail the business operation that triggered it.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    StationCreated {
        station: String,
        native: bool,
        replicas: u8,
    },
    StationDestroyed {
        station: String,
    },
    SchemaAttached {
        station: String,
        schema: String,
        version: u32,
    },
    SchemaDetached {
        station: String,
    },
    ProducerCreated {
        station: String,
        producer: String,
    },
    ConsumerCreated {
        station: String,
        consumer: String,
        group: String,
    },
    PoisonMessagesAcked {
        station: String,
        count: usize,
    },
    PoisonMessagesResent {
        station: String,
        count: usize,
    },
    /// Preserved quirk: `GetUpdatesForSchemaByStation` fires this analytics
    /// event even though the handler only reads.
    SchemaUpdatesAppliedOnStation {
        station: String,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "station_event");
    }
}
