use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use lucky_common::{Claim, Collection, Draw, Record, Reward, Subscription, User, WeekId};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::StoreError;
use crate::store::Store;

const SETTINGS_DIR: &str = "settings";

#[derive(Default)]
struct Documents {
    collections: BTreeMap<Collection, BTreeMap<String, Value>>,
    settings: BTreeMap<String, Value>,
}

/// Document store laid out like a Firestore export: one JSON file per
/// document under `<root>/<collection>/<key>.json`. Without a root it keeps
/// everything in memory.
pub struct DocumentStore {
    root: Option<PathBuf>,
    docs: Mutex<Documents>,
}

fn check_key(key: &str) -> Result<(), StoreError> {
    let bad = key.is_empty()
        || key.starts_with('.')
        || key.contains(['/', '\\'])
        || key.chars().any(char::is_control);
    if bad {
        return Err(StoreError::InvalidKey {
            key: key.to_string(),
        });
    }
    Ok(())
}

fn read_dir_documents(dir: &Path) -> Result<BTreeMap<String, Value>, StoreError> {
    let mut out = BTreeMap::new();
    if !dir.is_dir() {
        return Ok(out);
    }
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let Some(key) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let raw = fs::read_to_string(&path)?;
        out.insert(key.to_string(), serde_json::from_str(&raw)?);
    }
    Ok(out)
}

fn write_document(dir: &Path, key: &str, value: &Value) -> Result<(), StoreError> {
    fs::create_dir_all(dir)?;
    let tmp = dir.join(format!(".{key}.json.tmp"));
    fs::write(&tmp, serde_json::to_vec_pretty(value)?)?;
    fs::rename(&tmp, dir.join(format!("{key}.json")))?;
    Ok(())
}

impl DocumentStore {
    pub fn in_memory() -> Self {
        Self {
            root: None,
            docs: Mutex::new(Documents::default()),
        }
    }

    /// Load every collection found under `root`. Missing directories are
    /// treated as empty collections.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;

        let mut docs = Documents::default();
        for collection in Collection::ALL {
            let found = read_dir_documents(&root.join(collection.as_str()))?;
            debug!(%collection, count = found.len(), "loaded documents");
            docs.collections.insert(collection, found);
        }
        docs.settings = read_dir_documents(&root.join(SETTINGS_DIR))?;

        Ok(Self {
            root: Some(root),
            docs: Mutex::new(docs),
        })
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Documents>, StoreError> {
        self.docs.lock().map_err(|_| StoreError::Poisoned)
    }

    pub fn get<R: Record + DeserializeOwned>(&self, key: &str) -> Result<Option<R>, StoreError> {
        let docs = self.lock()?;
        docs.collections
            .get(&R::COLLECTION)
            .and_then(|c| c.get(key))
            .map(|v| serde_json::from_value(v.clone()).map_err(StoreError::from))
            .transpose()
    }

    pub fn list<R: Record + DeserializeOwned>(&self) -> Result<Vec<R>, StoreError> {
        let docs = self.lock()?;
        docs.collections
            .get(&R::COLLECTION)
            .map(|c| {
                c.values()
                    .map(|v| serde_json::from_value(v.clone()).map_err(StoreError::from))
                    .collect()
            })
            .unwrap_or_else(|| Ok(vec![]))
    }

    pub fn put<R: Record + Serialize>(&self, record: &R) -> Result<(), StoreError> {
        let mut docs = self.lock()?;
        self.put_locked(&mut docs, record)
    }

    fn put_locked<R: Record + Serialize>(
        &self,
        docs: &mut Documents,
        record: &R,
    ) -> Result<(), StoreError> {
        let key = record.natural_key();
        check_key(&key)?;
        let value = serde_json::to_value(record)?;
        if let Some(root) = &self.root {
            write_document(&root.join(R::COLLECTION.as_str()), &key, &value)?;
        }
        docs.collections
            .entry(R::COLLECTION)
            .or_default()
            .insert(key, value);
        Ok(())
    }

    /// Number of documents in a collection.
    pub fn count(&self, collection: Collection) -> Result<usize, StoreError> {
        Ok(self
            .lock()?
            .collections
            .get(&collection)
            .map_or(0, BTreeMap::len))
    }
}

impl Store for DocumentStore {
    fn get_user(&self, uid: &str) -> Result<Option<User>, StoreError> {
        self.get(uid)
    }

    fn put_user(&self, user: &User) -> Result<(), StoreError> {
        self.put(user)
    }

    fn list_users(&self) -> Result<Vec<User>, StoreError> {
        self.list()
    }

    fn get_subscription(&self, uid: &str) -> Result<Option<Subscription>, StoreError> {
        self.get(uid)
    }

    fn put_subscription(&self, subscription: &Subscription) -> Result<(), StoreError> {
        self.put(subscription)
    }

    fn list_subscriptions(&self) -> Result<Vec<Subscription>, StoreError> {
        self.list()
    }

    fn get_reward(&self, id: &str) -> Result<Option<Reward>, StoreError> {
        self.get(id)
    }

    fn put_reward(&self, reward: &Reward) -> Result<(), StoreError> {
        self.put(reward)
    }

    fn list_rewards(&self) -> Result<Vec<Reward>, StoreError> {
        let mut rewards: Vec<Reward> = self.list()?;
        rewards.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(rewards)
    }

    fn get_draw(&self, week: &WeekId) -> Result<Option<Draw>, StoreError> {
        self.get(&week.to_string())
    }

    fn put_draw(&self, draw: &Draw) -> Result<(), StoreError> {
        self.put(draw)
    }

    fn update_draw(
        &self,
        week: &WeekId,
        update: &mut dyn FnMut(&mut Draw),
    ) -> Result<Option<Draw>, StoreError> {
        let mut docs = self.lock()?;
        let Some(value) = docs
            .collections
            .get(&Collection::Draws)
            .and_then(|c| c.get(&week.to_string()))
        else {
            return Ok(None);
        };
        let mut draw: Draw = serde_json::from_value(value.clone())?;
        update(&mut draw);
        self.put_locked(&mut docs, &draw)?;
        Ok(Some(draw))
    }

    fn list_draws(&self) -> Result<Vec<Draw>, StoreError> {
        let mut draws: Vec<Draw> = self.list()?;
        draws.sort_by(|a, b| b.week.cmp(&a.week));
        Ok(draws)
    }

    fn get_claim(&self, id: &str) -> Result<Option<Claim>, StoreError> {
        self.get(id)
    }

    fn insert_claim(&self, claim: &Claim) -> Result<(), StoreError> {
        let mut docs = self.lock()?;
        let taken = match docs.collections.get(&Collection::Claims) {
            Some(claims) => {
                claims.contains_key(&claim.id)
                    || claims
                        .values()
                        .filter_map(|v| serde_json::from_value::<Claim>(v.clone()).ok())
                        .any(|c| c.uid == claim.uid && c.week == claim.week)
            }
            None => false,
        };
        if taken {
            return Err(StoreError::Conflict {
                collection: Collection::Claims,
                key: claim.id.clone(),
            });
        }
        self.put_locked(&mut docs, claim)
    }

    fn put_claim(&self, claim: &Claim) -> Result<(), StoreError> {
        self.put(claim)
    }

    fn list_claims(&self) -> Result<Vec<Claim>, StoreError> {
        let mut claims: Vec<Claim> = self.list()?;
        claims.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(claims)
    }

    fn load_setting(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.lock()?.settings.get(key).cloned())
    }

    fn save_setting(&self, key: &str, value: &Value, _now: DateTime<Utc>) -> Result<(), StoreError> {
        check_key(key)?;
        let mut docs = self.lock()?;
        if let Some(root) = &self.root {
            write_document(&root.join(SETTINGS_DIR), key, value)?;
        }
        docs.settings.insert(key.to_string(), value.clone());
        Ok(())
    }
}
