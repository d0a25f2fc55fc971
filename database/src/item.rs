use crate::{db::DB, errors::StoreError};

use super::prelude::{DbKey, DbWriter};
use parking_lot::RwLock;
use serde::{Serialize, de::DeserializeOwned};
use std::sync::Arc;

/// A single record stored under a fixed key, e.g. the snapshot info or the ledger index.
/// Clones share the cached value.
#[derive(Clone)]
pub struct CachedDbItem<T> {
    db: Arc<DB>,
    key: Vec<u8>,
    cached: Arc<RwLock<Option<T>>>,
}

impl<T> CachedDbItem<T>
where
    T: Clone,
{
    pub fn new(db: Arc<DB>, key: Vec<u8>) -> Self {
        Self { db, key, cached: Arc::new(RwLock::new(None)) }
    }

    fn load(&self) -> Result<T, StoreError>
    where
        T: DeserializeOwned,
    {
        match self.db.get_pinned(&self.key)? {
            Some(slice) => Ok(bincode::deserialize(&slice)?),
            None => Err(StoreError::KeyNotFound(DbKey::prefix_only(&self.key))),
        }
    }

    pub fn read(&self) -> Result<T, StoreError>
    where
        T: DeserializeOwned,
    {
        if let Some(item) = self.cached.read().as_ref() {
            return Ok(item.clone());
        }
        let item = self.load()?;
        *self.cached.write() = Some(item.clone());
        Ok(item)
    }

    pub fn write(&mut self, mut writer: impl DbWriter, item: &T) -> Result<(), StoreError>
    where
        T: Serialize,
    {
        writer.put(&self.key, bincode::serialize(item)?)?;
        *self.cached.write() = Some(item.clone());
        Ok(())
    }

    /// Read-modify-write under the item lock. Fails with `KeyNotFound` if the item was never written.
    pub fn update(&mut self, mut writer: impl DbWriter, op: impl FnOnce(T) -> T) -> Result<T, StoreError>
    where
        T: Serialize + DeserializeOwned,
    {
        let mut cached = self.cached.write();
        let current = match cached.take() {
            Some(item) => item,
            None => self.load()?,
        };
        let item = op(current);
        writer.put(&self.key, bincode::serialize(&item)?)?;
        *cached = Some(item.clone());
        Ok(item)
    }
}
