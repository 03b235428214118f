use std::sync::Arc;

use lucky_reward_distributor::{DrawExecutor, Notifier};
use lucky_store::Store;
use lucky_subscription_hub::{HubConfig, PaymentGateway};

/// Who counts as an admin and which identity headers are accepted.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AuthConfig {
    /// Lowercased
    pub admin_emails: Vec<String>,
    pub dev_mode: bool,
}

impl AuthConfig {
    pub fn is_admin_email(&self, email: &str) -> bool {
        let email = email.trim().to_ascii_lowercase();
        self.admin_emails.iter().any(|e| *e == email)
    }
}

pub struct AppState {
    pub store: Arc<dyn Store>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub executor: Arc<DrawExecutor>,
    pub hub: HubConfig,
    pub auth: AuthConfig,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store>,
        gateway: Arc<dyn PaymentGateway>,
        executor: Arc<DrawExecutor>,
        hub: HubConfig,
        auth: AuthConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            gateway,
            executor,
            hub,
            auth,
        })
    }

    pub fn notifier(&self) -> &dyn Notifier {
        self.executor.notifier().as_ref()
    }
}
