use crate::{cache::CachePolicy, db::DB, errors::StoreError};

use super::prelude::{Cache, DbKey, DbWriter};
use parking_lot::{RwLock, RwLockReadGuard};
use rocksdb::{IterateBounds, IteratorMode, ReadOptions};
use serde::{Serialize, de::DeserializeOwned};
use std::{collections::HashSet, hash::Hash, marker::PhantomData, sync::Arc};

/// Shared read-only view of a cached set
#[derive(Debug)]
pub struct ReadLock<T>(Arc<RwLock<T>>);

impl<T> ReadLock<T> {
    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        self.0.read()
    }
}

/// Stores sets of `TData` grouped into buckets by `TKey`. Each member is its own record whose key is
/// `prefix || bucket || member`, so members can be added and removed without rewriting the set.
#[derive(Clone)]
pub struct DbSetAccess<TKey, TData> {
    db: Arc<DB>,
    prefix: Vec<u8>,
    _phantom: PhantomData<(TKey, TData)>,
}

impl<TKey, TData> DbSetAccess<TKey, TData>
where
    TKey: Copy + AsRef<[u8]>,
    TData: Serialize + DeserializeOwned,
{
    pub fn new(db: Arc<DB>, prefix: Vec<u8>) -> Self {
        Self { db, prefix, _phantom: PhantomData }
    }

    fn member_key(&self, bucket: TKey, member: &TData) -> Result<DbKey, StoreError> {
        Ok(DbKey::new_with_bucket(&self.prefix, bucket, bincode::serialize(member)?))
    }

    pub fn write(&self, mut writer: impl DbWriter, bucket: TKey, member: TData) -> Result<(), StoreError> {
        writer.put(self.member_key(bucket, &member)?, [])?;
        Ok(())
    }

    pub fn delete(&self, mut writer: impl DbWriter, bucket: TKey, member: TData) -> Result<(), StoreError> {
        writer.delete(self.member_key(bucket, &member)?)?;
        Ok(())
    }

    /// Removes all members of `bucket` with a single range deletion
    pub fn delete_bucket(&self, mut writer: impl DbWriter, bucket: TKey) -> Result<(), StoreError> {
        let bucket_key = DbKey::new_with_bucket(&self.prefix, bucket, []);
        match rocksdb::PrefixRange(bucket_key.as_ref()).into_bounds() {
            (Some(from), Some(to)) => writer.delete_range(from, to)?,
            _ => return Err(StoreError::DataInconsistency(format!("bucket {bucket_key} has no upper bound"))),
        }
        Ok(())
    }

    pub fn bucket_iterator(&self, bucket: TKey) -> impl Iterator<Item = Result<TData, StoreError>> + '_ {
        let bucket_key = DbKey::new_with_bucket(&self.prefix, bucket, []);
        let mut read_opts = ReadOptions::default();
        read_opts.set_iterate_range(rocksdb::PrefixRange(bucket_key.as_ref()));

        self.db.iterator_opt(IteratorMode::Start, read_opts).map(move |entry| {
            let (key, _) = entry?;
            Ok(bincode::deserialize(&key[bucket_key.prefix_len()..])?)
        })
    }
}

/// A [`DbSetAccess`] which keeps whole buckets in memory once read. Writes and deletes update a
/// cached bucket in place and never load an uncached one.
#[derive(Clone)]
pub struct CachedDbSetAccess<TKey, TData>
where
    TKey: Clone + Hash + Eq + Send + Sync,
    TData: Send + Sync,
{
    inner: DbSetAccess<TKey, TData>,
    cache: Cache<TKey, Arc<RwLock<HashSet<TData>>>>,
}

impl<TKey, TData> CachedDbSetAccess<TKey, TData>
where
    TKey: Copy + Hash + Eq + Send + Sync + AsRef<[u8]>,
    TData: Clone + Hash + Eq + Send + Sync + Serialize + DeserializeOwned,
{
    pub fn new(db: Arc<DB>, cache_policy: CachePolicy, prefix: Vec<u8>) -> Self {
        Self { inner: DbSetAccess::new(db, prefix), cache: Cache::new(cache_policy) }
    }

    pub fn read(&self, bucket: TKey) -> Result<ReadLock<HashSet<TData>>, StoreError> {
        if let Some(set) = self.cache.get(&bucket) {
            return Ok(ReadLock(set));
        }
        let set = Arc::new(RwLock::new(self.inner.bucket_iterator(bucket).collect::<Result<HashSet<_>, _>>()?));
        self.cache.insert(bucket, set.clone());
        Ok(ReadLock(set))
    }

    pub fn write(&self, writer: impl DbWriter, bucket: TKey, member: TData) -> Result<(), StoreError> {
        self.cache.update_if_entry_exists(bucket, |set| {
            set.write().insert(member.clone());
        });
        self.inner.write(writer, bucket, member)
    }

    pub fn delete(&self, writer: impl DbWriter, bucket: TKey, member: TData) -> Result<(), StoreError> {
        self.cache.update_if_entry_exists(bucket, |set| {
            set.write().remove(&member);
        });
        self.inner.delete(writer, bucket, member)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        create_temp_db,
        prelude::{BatchDbWriter, ConnBuilder, DirectDbWriter},
    };
    use rocksdb::WriteBatch;

    #[test]
    fn test_delete_bucket() {
        let (_lifetime, db) = create_temp_db!(ConnBuilder::default().with_files_limit(10));
        let access = DbSetAccess::<[u8; 4], u64>::new(db.clone(), vec![1, 2]);

        for bucket in 0..8u32 {
            access.write(DirectDbWriter::new(&db), bucket.to_be_bytes(), bucket as u64).unwrap();
            access.write(DirectDbWriter::new(&db), bucket.to_be_bytes(), bucket as u64 + 100).unwrap();
        }
        access.delete_bucket(DirectDbWriter::new(&db), 3u32.to_be_bytes()).unwrap();
        assert_eq!(access.bucket_iterator(3u32.to_be_bytes()).count(), 0);

        let mut batch = WriteBatch::default();
        access.delete_bucket(BatchDbWriter::new(&mut batch), 6u32.to_be_bytes()).unwrap();
        assert_eq!(access.bucket_iterator(6u32.to_be_bytes()).count(), 2);
        db.write(batch).unwrap();
        assert_eq!(access.bucket_iterator(6u32.to_be_bytes()).count(), 0);

        let members = access.bucket_iterator(7u32.to_be_bytes()).collect::<Result<Vec<_>, _>>().unwrap();
        assert_eq!(members, vec![7, 107]);
    }

    #[test]
    fn test_cached_set_tracks_writes_and_deletes() {
        let (_lifetime, db) = create_temp_db!(ConnBuilder::default().with_files_limit(10));
        let access = CachedDbSetAccess::<[u8; 4], u32>::new(db.clone(), CachePolicy::Count(8), vec![5]);
        let bucket = 1u32.to_be_bytes();

        access.write(DirectDbWriter::new(&db), bucket, 10).unwrap();
        assert_eq!(access.read(bucket).unwrap().read().len(), 1);
        access.write(DirectDbWriter::new(&db), bucket, 11).unwrap();
        assert!(access.read(bucket).unwrap().read().contains(&11));
        access.delete(DirectDbWriter::new(&db), bucket, 10).unwrap();
        assert_eq!(access.read(bucket).unwrap().read().iter().copied().collect::<Vec<_>>(), vec![11]);
    }
}
