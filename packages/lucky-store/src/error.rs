use lucky_common::Collection;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{collection} record {key} conflicts with an existing record")]
    Conflict { collection: Collection, key: String },

    #[error("invalid document key {key:?}")]
    InvalidKey { key: String },

    #[error("schema mismatch: database belongs to {found}, expected {expected}")]
    SchemaMismatch { expected: String, found: String },

    #[error("schema version {found} is newer than supported version {supported}")]
    SchemaTooNew { found: u32, supported: u32 },

    #[error("invalid database url {url:?}")]
    InvalidUrl { url: String },

    #[error("store lock poisoned")]
    Poisoned,
}
