pub mod context;
pub mod merkle;
pub mod records;
pub mod types;
pub mod week;

pub use context::{Caller, Env};
pub use merkle::{build_merkle_proof, build_merkle_root, compute_leaf_hash, verify_merkle_proof};
pub use records::{Claim, Draw, DrawWinner, Record, Reward, Subscription, User};
pub use types::{ClaimStatus, Collection, DrawStatus, SubscriptionStatus};
pub use week::{WeekId, WeekIdError};
