use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use crate::error::BeaconError;
use crate::source::{Randomness, RandomnessSource};
use crate::state::{ChainInfo, DEFAULT_DRAND_URL};
use crate::verify::verify_quicknet_beacon;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Body of `GET /{chain_hash}/public/{round}`.
#[derive(Deserialize, Debug)]
struct BeaconResponse {
    round: u64,
    signature: String,
}

/// Primary source: a BLS-verified drand beacon fetched over HTTP.
#[derive(Clone, Debug)]
pub struct DrandBeacon {
    http: reqwest::Client,
    base_url: String,
    chain: ChainInfo,
}

impl DrandBeacon {
    pub fn new(base_url: impl Into<String>, chain: ChainInfo) -> Result<Self, BeaconError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            chain,
        })
    }

    pub fn quicknet() -> Result<Self, BeaconError> {
        Self::new(DEFAULT_DRAND_URL, ChainInfo::quicknet())
    }

    pub fn chain(&self) -> &ChainInfo {
        &self.chain
    }

    /// Fetch and verify one round.
    pub async fn fetch_round(&self, round: u64) -> Result<Randomness, BeaconError> {
        let url = format!(
            "{}/{}/public/{}",
            self.base_url, self.chain.chain_hash, round
        );
        debug!(%url, "fetching drand beacon");

        let body: BeaconResponse = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if body.round != round {
            return Err(BeaconError::RoundMismatch {
                requested: round,
                got: body.round,
            });
        }

        let signature = hex::decode(&body.signature).map_err(|_| BeaconError::InvalidHex {
            field: "signature".to_string(),
        })?;
        let bytes = verify_quicknet_beacon(&self.chain.public_key, round, &signature)
            .map_err(|source| BeaconError::VerificationFailed { round, source })?;

        Ok(Randomness {
            bytes,
            round: Some(round),
            source: self.name().to_string(),
        })
    }
}

#[async_trait]
impl RandomnessSource for DrandBeacon {
    fn name(&self) -> &str {
        "drand_quicknet"
    }

    async fn fetch(&self, at: DateTime<Utc>) -> Result<Randomness, BeaconError> {
        let round = self.chain.round_at(at)?;
        self.fetch_round(round).await
    }
}
