//! Persistence for users, subscriptions, rewards, draws, claims and settings.
//!
//! Two backends implement [`Store`]:
//! - [`SqlStore`]: relational tables in SQLite, schema-versioned.
//! - [`DocumentStore`]: one JSON document per record laid out like a
//!   Firestore export (`<root>/<collection>/<key>.json`).
//!
//! [`sync`] copies the document store into the relational store, one
//! transaction per collection.

pub mod document;
pub mod error;
pub mod schema;
pub mod sql;
pub mod store;
pub mod sync;

pub use document::DocumentStore;
pub use error::StoreError;
pub use sql::SqlStore;
pub use store::Store;
pub use sync::{sync_all, sync_collection, SyncReport};
