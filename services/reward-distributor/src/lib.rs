//! Weekly reward draws: settings, winner selection with verifiable
//! randomness, draw history, claims and the background scheduler.

pub mod error;
pub mod execute;
pub mod executor;
pub mod msg;
pub mod notify;
pub mod query;
pub mod retry;
pub mod scheduler;
pub mod selection;
pub mod state;

pub use error::DistributorError;
pub use executor::{DrawExecutor, RunTrigger};
pub use notify::{LogNotifier, MemoryNotifier, Notification, Notifier};
pub use scheduler::Scheduler;
pub use state::{DrawConfig, DrawSettings};
