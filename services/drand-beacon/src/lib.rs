//! Draw randomness: drand quicknet beacons verified with `drand-verify`,
//! with the operating system RNG as a backup source.

pub mod client;
pub mod error;
pub mod source;
pub mod state;
pub mod verify;

pub use client::DrandBeacon;
pub use error::BeaconError;
pub use source::{OsRandomness, Randomness, RandomnessSource};
pub use state::ChainInfo;
