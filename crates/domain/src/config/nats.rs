use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Stream-engine substrate connection
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NatsConfig {
    #[serde(default = "d_url")]
    pub url: String,
    /// Request/ack timeout for engine calls, in milliseconds.
    #[serde(default = "d_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            url: d_url(),
            request_timeout_ms: d_request_timeout_ms(),
        }
    }
}

fn d_url() -> String {
    "nats://127.0.0.1:4222".into()
}
fn d_request_timeout_ms() -> u64 {
    5_000
}
