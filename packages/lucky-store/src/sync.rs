use lucky_common::{Claim, Collection, Draw, Reward, Subscription, User};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{error, info};

use crate::document::DocumentStore;
use crate::error::StoreError;
use crate::sql::{SqlRecord, SqlStore};

/// Outcome of copying one collection into the relational store.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct SyncReport {
    pub collection: Collection,
    pub inserted: u64,
    pub updated: u64,
    pub unchanged: u64,
}

impl SyncReport {
    fn new(collection: Collection) -> Self {
        Self {
            collection,
            inserted: 0,
            updated: 0,
            unchanged: 0,
        }
    }

    pub fn total(&self) -> u64 {
        self.inserted + self.updated + self.unchanged
    }
}

fn sync_records<R>(source: &DocumentStore, target: &SqlStore) -> Result<SyncReport, StoreError>
where
    R: SqlRecord + DeserializeOwned + PartialEq,
{
    let documents: Vec<R> = source.list()?;
    target.with_transaction(|tx| {
        let mut report = SyncReport::new(R::COLLECTION);
        for doc in &documents {
            match R::select(tx, &doc.natural_key())? {
                Some(existing) if existing == *doc => report.unchanged += 1,
                Some(_) => {
                    doc.upsert(tx)?;
                    report.updated += 1;
                }
                None => {
                    doc.upsert(tx)?;
                    report.inserted += 1;
                }
            }
        }
        Ok(report)
    })
}

/// Copy one collection from the document store into the relational store.
/// Records are matched on their natural key; the whole collection is
/// written in a single transaction, so a failure leaves the target as it was.
pub fn sync_collection(
    source: &DocumentStore,
    target: &SqlStore,
    collection: Collection,
) -> Result<SyncReport, StoreError> {
    let result = match collection {
        Collection::Users => sync_records::<User>(source, target),
        Collection::Subscriptions => sync_records::<Subscription>(source, target),
        Collection::Rewards => sync_records::<Reward>(source, target),
        Collection::Draws => sync_records::<Draw>(source, target),
        Collection::Claims => sync_records::<Claim>(source, target),
    };
    match &result {
        Ok(report) => info!(
            %collection,
            inserted = report.inserted,
            updated = report.updated,
            unchanged = report.unchanged,
            "synced collection"
        ),
        Err(e) => error!(%collection, error = %e, "collection sync failed"),
    }
    result
}

/// Sync every collection in dependency order. A failing collection does not
/// stop the others.
pub fn sync_all(
    source: &DocumentStore,
    target: &SqlStore,
) -> Vec<(Collection, Result<SyncReport, StoreError>)> {
    Collection::ALL
        .into_iter()
        .map(|collection| (collection, sync_collection(source, target, collection)))
        .collect()
}
