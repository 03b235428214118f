use sha2::{Digest, Sha256};

pub const DEFAULT_SUBSCRIPTION_AMOUNT: u64 = 49;
pub const DEFAULT_PERIOD_DAYS: i64 = 7;
pub const MAX_PERIOD_DAYS: i64 = 3_650;
pub const CURRENCY: &str = "INR";

/// Length of a generated referral code, in hex characters.
const REFERRAL_CODE_LEN: usize = 8;

/// Subscription pricing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HubConfig {
    /// Whole rupees per period
    pub subscription_amount: u64,
    pub period_days: i64,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            subscription_amount: DEFAULT_SUBSCRIPTION_AMOUNT,
            period_days: DEFAULT_PERIOD_DAYS,
        }
    }
}

impl HubConfig {
    /// Amount sent to the gateway, in paise.
    pub fn amount_minor(&self) -> u64 {
        self.subscription_amount.saturating_mul(100)
    }
}

/// A user's own referral code: the first 8 hex chars of sha256(uid).
pub fn referral_code_for(uid: &str) -> String {
    let digest = hex::encode(Sha256::digest(uid.as_bytes()));
    digest[..REFERRAL_CODE_LEN].to_string()
}
