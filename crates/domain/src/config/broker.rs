use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Broker
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Queue group joined by the Request Dispatcher when subscribing to
    /// control subjects, so multiple `stationd` instances load-balance.
    #[serde(default = "d_queue_group")]
    pub queue_group: String,
    /// Subject prefix under which the eight control subjects are rooted.
    #[serde(default = "d_subject_prefix")]
    pub subject_prefix: String,
    #[serde(default = "d_default_replicas")]
    pub default_replicas: u8,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            queue_group: d_queue_group(),
            subject_prefix: d_subject_prefix(),
            default_replicas: d_default_replicas(),
        }
    }
}

fn d_queue_group() -> String {
    "station-control-plane".into()
}
fn d_subject_prefix() -> String {
    "$memphis".into()
}
fn d_default_replicas() -> u8 {
    1
}
