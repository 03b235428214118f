//! User profiles, referral links and paid subscriptions.

pub mod error;
pub mod execute;
pub mod msg;
pub mod payments;
pub mod query;
pub mod state;

pub use error::HubError;
pub use payments::{PaymentGateway, RazorpayClient};
pub use state::HubConfig;
