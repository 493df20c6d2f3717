use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Dead-letter-stream defaults
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlsDefaultsConfig {
    #[serde(default = "d_true")]
    pub poison: bool,
    #[serde(default = "d_true")]
    pub schemaverse: bool,
    /// How long the Dead-Letter Inspector waits for more messages to arrive
    /// on a fetch-by-filter request before returning what it has.
    #[serde(default = "d_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,
}

impl Default for DlsDefaultsConfig {
    fn default() -> Self {
        Self {
            poison: true,
            schemaverse: true,
            fetch_timeout_ms: d_fetch_timeout_ms(),
        }
    }
}

fn d_true() -> bool {
    true
}
fn d_fetch_timeout_ms() -> u64 {
    1_000
}
