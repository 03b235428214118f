use chrono::{DateTime, Utc};

use crate::error::BeaconError;
use crate::verify::QUICKNET_PK_HEX;

pub const QUICKNET_CHAIN_HASH: &str =
    "52db9ba70e0cc0f6eaf7803dd07447a1f5477735fd3f661792ba94600c84e971";
pub const QUICKNET_GENESIS_TIME: i64 = 1692803367;
pub const QUICKNET_PERIOD_SECONDS: i64 = 3;
pub const DEFAULT_DRAND_URL: &str = "https://api.drand.sh";

/// Parameters identifying a drand network.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChainInfo {
    /// Quicknet public key, 96 bytes (G2 point)
    pub public_key: Vec<u8>,
    pub chain_hash: String,
    /// Unix seconds of round 1
    pub genesis_time: i64,
    pub period_seconds: i64,
}

impl ChainInfo {
    pub fn quicknet() -> Self {
        Self {
            public_key: hex::decode(QUICKNET_PK_HEX).unwrap_or_default(),
            chain_hash: QUICKNET_CHAIN_HASH.to_string(),
            genesis_time: QUICKNET_GENESIS_TIME,
            period_seconds: QUICKNET_PERIOD_SECONDS,
        }
    }

    /// Latest round published at or before `at`.
    pub fn round_at(&self, at: DateTime<Utc>) -> Result<u64, BeaconError> {
        let ts = at.timestamp();
        if ts < self.genesis_time {
            return Err(BeaconError::BeforeGenesis { at: ts });
        }
        Ok(((ts - self.genesis_time) / self.period_seconds) as u64 + 1)
    }

    pub fn round_time(&self, round: u64) -> i64 {
        self.genesis_time + (round.saturating_sub(1) as i64) * self.period_seconds
    }
}
