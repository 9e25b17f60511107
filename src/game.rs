//! Read-only views of contract state. Counts and prices come from the
//! contract; nothing here is authoritative.

use crate::format;
use serde::{
    Deserialize,
    Serialize,
};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoBakerType {
    pub id: u64,
    pub name: String,
    pub base_price_brownie: u64,
    pub rate_per_hour: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoBakerStack {
    pub id: String,
    pub number: u64,
    pub auto_baker_type: AutoBakerType,
    pub last_claim_timestamp_ms: u64,
    pub next_price_brownie: u64,
}

impl AutoBakerStack {
    /// Time since the last claim, as shown next to the claim button.
    pub fn since_last_claim(&self, now_ms: u64) -> String {
        format::time_human_readable(now_ms.saturating_sub(self.last_claim_timestamp_ms))
    }

    pub fn since_last_claim_now(&self) -> String {
        let now = chrono::Utc::now().timestamp_millis().max(0) as u64;
        self.since_last_claim(now)
    }

    pub fn next_price_label(&self) -> String {
        format::format_num_short(self.next_price_brownie as f64)
    }
}
