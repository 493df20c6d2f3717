use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Metadata repository
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding the persisted collection snapshots.
    #[serde(default = "d_state_dir")]
    pub state_dir: String,
    /// Default retention value applied when a CreateStation request omits it.
    #[serde(default = "d_default_retention_value")]
    pub default_retention_value: i64,
    #[serde(default = "d_default_idempotency_window_ms")]
    pub default_idempotency_window_ms: i64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            state_dir: d_state_dir(),
            default_retention_value: d_default_retention_value(),
            default_idempotency_window_ms: d_default_idempotency_window_ms(),
        }
    }
}

fn d_state_dir() -> String {
    "./data/station-store".into()
}
fn d_default_retention_value() -> i64 {
    crate::entities::DEFAULT_RETENTION_VALUE
}
fn d_default_idempotency_window_ms() -> i64 {
    120_000
}
