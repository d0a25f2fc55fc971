use crate::{cache::CachePolicy, db::DB, errors::StoreError};

use super::prelude::{Cache, DbKey, DbWriter};
use rocksdb::{IteratorMode, ReadOptions};
use serde::{Serialize, de::DeserializeOwned};
use std::{collections::hash_map::RandomState, hash::BuildHasher, sync::Arc};

/// Typed, cached access to all records stored under a single key prefix
#[derive(Clone)]
pub struct CachedDbAccess<TKey, TData, S = RandomState>
where
    TKey: Clone + std::hash::Hash + Eq + Send + Sync,
    TData: Clone + Send + Sync,
{
    db: Arc<DB>,
    cache: Cache<TKey, TData, S>,
    prefix: Vec<u8>,
}

impl<TKey, TData, S> CachedDbAccess<TKey, TData, S>
where
    TKey: Clone + std::hash::Hash + Eq + Send + Sync + AsRef<[u8]>,
    TData: Clone + Send + Sync,
    S: BuildHasher + Default,
{
    pub fn new(db: Arc<DB>, cache_policy: CachePolicy, prefix: Vec<u8>) -> Self {
        Self { db, cache: Cache::new(cache_policy), prefix }
    }

    fn db_key(&self, key: TKey) -> DbKey {
        DbKey::new(&self.prefix, key)
    }

    pub fn has(&self, key: TKey) -> Result<bool, StoreError> {
        if self.cache.contains_key(&key) {
            return Ok(true);
        }
        Ok(self.db.get_pinned(self.db_key(key))?.is_some())
    }

    pub fn read(&self, key: TKey) -> Result<TData, StoreError>
    where
        TData: DeserializeOwned,
    {
        if let Some(data) = self.cache.get(&key) {
            return Ok(data);
        }
        let db_key = self.db_key(key.clone());
        let Some(slice) = self.db.get_pinned(&db_key)? else {
            return Err(StoreError::KeyNotFound(db_key));
        };
        let data: TData = bincode::deserialize(&slice)?;
        self.cache.insert(key, data.clone());
        Ok(data)
    }

    /// Decodes every record under the prefix in key order. Keys are encoded big endian, so for numeric
    /// keys this is ascending numeric order. Reads bypass the cache.
    pub fn values(&self, ascending: bool) -> impl Iterator<Item = Result<TData, StoreError>> + '_
    where
        TData: DeserializeOwned,
    {
        let mut read_opts = ReadOptions::default();
        read_opts.set_iterate_range(rocksdb::PrefixRange(self.prefix.as_slice()));
        let mode = if ascending { IteratorMode::Start } else { IteratorMode::End };
        self.db.iterator_opt(mode, read_opts).map(|entry| {
            let (_, bytes) = entry?;
            Ok(bincode::deserialize(&bytes)?)
        })
    }

    /// The record with the largest key, if any
    pub fn last(&self) -> Result<Option<TData>, StoreError>
    where
        TData: DeserializeOwned,
    {
        self.values(false).next().transpose()
    }

    pub fn write(&self, mut writer: impl DbWriter, key: TKey, data: TData) -> Result<(), StoreError>
    where
        TData: Serialize,
    {
        writer.put(self.db_key(key.clone()), bincode::serialize(&data)?)?;
        self.cache.insert(key, data);
        Ok(())
    }

    pub fn write_many(&self, mut writer: impl DbWriter, entries: impl IntoIterator<Item = (TKey, TData)>) -> Result<(), StoreError>
    where
        TData: Serialize,
    {
        for (key, data) in entries {
            writer.put(self.db_key(key.clone()), bincode::serialize(&data)?)?;
            self.cache.insert(key, data);
        }
        Ok(())
    }

    pub fn delete(&self, mut writer: impl DbWriter, key: TKey) -> Result<(), StoreError> {
        self.cache.remove(&key);
        writer.delete(self.db_key(key))?;
        Ok(())
    }

    pub fn delete_many(&self, mut writer: impl DbWriter, keys: impl IntoIterator<Item = TKey>) -> Result<(), StoreError> {
        for key in keys {
            self.cache.remove(&key);
            writer.delete(self.db_key(key))?;
        }
        Ok(())
    }
}
