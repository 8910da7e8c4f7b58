use serde::{Deserialize, Serialize};

/// Key-value configuration row. The key doubles as the document id, which
/// keeps writes idempotent without a separate unique index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Setting {
    #[serde(rename = "_id")]
    pub setting_key: String,
    pub setting_value: String,
}

pub const MPESA_TILL_NUMBER: &str = "mpesa_till_number";
pub const MPESA_CONSUMER_KEY: &str = "mpesa_consumer_key";
pub const MPESA_CONSUMER_SECRET: &str = "mpesa_consumer_secret";
pub const MPESA_PASSKEY: &str = "mpesa_passkey";
pub const MPESA_SIMULATION_DELAY_SECS: &str = "mpesa_simulation_delay_secs";
