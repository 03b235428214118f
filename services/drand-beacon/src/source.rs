use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::BeaconError;

/// 32 bytes of draw randomness and where they came from.
#[derive(Clone, PartialEq, Eq)]
pub struct Randomness {
    pub bytes: [u8; 32],
    /// drand round, when the bytes came from a beacon
    pub round: Option<u64>,
    pub source: String,
}

impl Randomness {
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }
}

impl fmt::Debug for Randomness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Randomness")
            .field("bytes", &self.to_hex())
            .field("round", &self.round)
            .field("source", &self.source)
            .finish()
    }
}

#[async_trait]
pub trait RandomnessSource: Send + Sync {
    fn name(&self) -> &str;

    /// Randomness for a draw held at `at`.
    async fn fetch(&self, at: DateTime<Utc>) -> Result<Randomness, BeaconError>;
}

/// Backup source: the operating system RNG.
#[derive(Clone, Copy, Debug, Default)]
pub struct OsRandomness;

#[async_trait]
impl RandomnessSource for OsRandomness {
    fn name(&self) -> &str {
        "os_rng"
    }

    async fn fetch(&self, _at: DateTime<Utc>) -> Result<Randomness, BeaconError> {
        let mut bytes = [0u8; 32];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| BeaconError::Entropy {
                reason: e.to_string(),
            })?;
        Ok(Randomness {
            bytes,
            round: None,
            source: self.name().to_string(),
        })
    }
}
