use crate::db::DB;
use std::{path::PathBuf, sync::Arc};

#[derive(Debug)]
pub struct Unspecified;

/// Opens a tangle or UTXO database. `build` is only available once a path was set.
#[derive(Debug)]
pub struct ConnBuilder<Path> {
    db_path: Path,
    create_if_missing: bool,
    files_limit: i32,
    mem_budget: usize,
}

impl Default for ConnBuilder<Unspecified> {
    fn default() -> Self {
        ConnBuilder { db_path: Unspecified, create_if_missing: true, files_limit: 500, mem_budget: 64 * 1024 * 1024 }
    }
}

impl<Path> ConnBuilder<Path> {
    pub fn with_db_path(self, db_path: PathBuf) -> ConnBuilder<PathBuf> {
        let ConnBuilder { create_if_missing, files_limit, mem_budget, .. } = self;
        ConnBuilder { db_path, create_if_missing, files_limit, mem_budget }
    }

    /// The pruner never creates databases, it only opens those of an existing node
    pub fn with_create_if_missing(self, create_if_missing: bool) -> Self {
        ConnBuilder { create_if_missing, ..self }
    }

    pub fn with_files_limit(self, files_limit: impl Into<i32>) -> Self {
        ConnBuilder { files_limit: files_limit.into(), ..self }
    }
}

impl ConnBuilder<PathBuf> {
    pub fn build(self) -> Result<Arc<DB>, rocksdb::Error> {
        let mut opts = rocksdb::Options::default();
        opts.optimize_level_style_compaction(self.mem_budget);
        opts.set_max_open_files(self.files_limit);
        opts.create_if_missing(self.create_if_missing);
        Ok(Arc::new(DB::open(&opts, &self.db_path)?))
    }
}
