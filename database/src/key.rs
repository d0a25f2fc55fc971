use crate::registry::{DatabaseStorePrefixes, SEPARATOR};
use num_traits::FromPrimitive;
use smallvec::SmallVec;
use std::fmt::{Debug, Display};

#[derive(Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct DbKey {
    path: SmallVec<[u8; 36]>, // Optimized for the common case of { prefix byte || 32 byte id }
    prefix_len: usize,
}

impl DbKey {
    pub fn new<TKey>(prefix: &[u8], key: TKey) -> Self
    where
        TKey: Clone + AsRef<[u8]>,
    {
        Self { path: prefix.iter().chain(key.as_ref().iter()).copied().collect(), prefix_len: prefix.len() }
    }

    pub fn new_with_bucket<TKey, TBucket>(prefix: &[u8], bucket: TBucket, key: TKey) -> Self
    where
        TKey: Clone + AsRef<[u8]>,
        TBucket: Copy + AsRef<[u8]>,
    {
        let mut db_key = Self::prefix_only(prefix);
        db_key.add_bucket(bucket);
        db_key.add_key(key);
        db_key
    }

    pub fn prefix_only(prefix: &[u8]) -> Self {
        Self::new(prefix, [])
    }

    /// Adds a bucket to the DB key. A bucket extends the prefix, so it is counted in `prefix_len`
    pub fn add_bucket<TBucket>(&mut self, bucket: TBucket)
    where
        TBucket: Copy + AsRef<[u8]>,
    {
        self.path.extend(bucket.as_ref().iter().copied());
        self.prefix_len += bucket.as_ref().len();
    }

    pub fn add_key<TKey>(&mut self, key: TKey)
    where
        TKey: Clone + AsRef<[u8]>,
    {
        self.path.extend(key.as_ref().iter().copied());
    }

    pub fn prefix_len(&self) -> usize {
        self.prefix_len
    }
}

impl AsRef<[u8]> for DbKey {
    fn as_ref(&self) -> &[u8] {
        &self.path
    }
}

impl Display for DbKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut pos = 0;

        if self.prefix_len > 0 {
            if let Some(prefix) = DatabaseStorePrefixes::from_u8(self.path[0]) {
                prefix.fmt(f)?;
                pos += 1;
                if self.prefix_len > 1 && self.path[1] == SEPARATOR {
                    f.write_str("/")?;
                    pos += 1;
                }
            }
            if pos < self.prefix_len {
                f.write_str(&faster_hex::hex_string(&self.path[pos..self.prefix_len]))?;
                pos = self.prefix_len;
            }
            f.write_str("/")?;
        }

        f.write_str(&faster_hex::hex_string(&self.path[pos..]))
    }
}

impl Debug for DbKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}
