use rocksdb::WriteBatch;

use crate::prelude::DB;

/// Target of store mutations: either the DB itself or a [`WriteBatch`] committed later as one unit
pub trait DbWriter {
    fn put(&mut self, key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) -> Result<(), rocksdb::Error>;
    fn delete(&mut self, key: impl AsRef<[u8]>) -> Result<(), rocksdb::Error>;
    fn delete_range(&mut self, from: impl AsRef<[u8]>, to: impl AsRef<[u8]>) -> Result<(), rocksdb::Error>;
}

pub struct DirectDbWriter<'a> {
    db: &'a DB,
}

impl<'a> DirectDbWriter<'a> {
    pub fn new(db: &'a DB) -> Self {
        Self { db }
    }
}

impl DbWriter for DirectDbWriter<'_> {
    fn put(&mut self, key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) -> Result<(), rocksdb::Error> {
        self.db.put(key, value)
    }

    fn delete(&mut self, key: impl AsRef<[u8]>) -> Result<(), rocksdb::Error> {
        self.db.delete(key)
    }

    // rocksdb exposes range deletion on batches only
    fn delete_range(&mut self, from: impl AsRef<[u8]>, to: impl AsRef<[u8]>) -> Result<(), rocksdb::Error> {
        let mut batch = WriteBatch::default();
        batch.delete_range(from, to);
        self.db.write(batch)
    }
}

pub struct BatchDbWriter<'a> {
    batch: &'a mut WriteBatch,
}

impl<'a> BatchDbWriter<'a> {
    pub fn new(batch: &'a mut WriteBatch) -> Self {
        Self { batch }
    }
}

impl DbWriter for BatchDbWriter<'_> {
    fn put(&mut self, key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) -> Result<(), rocksdb::Error> {
        self.batch.put(key, value);
        Ok(())
    }

    fn delete(&mut self, key: impl AsRef<[u8]>) -> Result<(), rocksdb::Error> {
        self.batch.delete(key);
        Ok(())
    }

    fn delete_range(&mut self, from: impl AsRef<[u8]>, to: impl AsRef<[u8]>) -> Result<(), rocksdb::Error> {
        self.batch.delete_range(from, to);
        Ok(())
    }
}
