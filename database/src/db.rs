use crate::errors::StoreResult;
use rocksdb::{DBWithThreadMode, MultiThreaded};

pub use conn_builder::ConnBuilder;

mod conn_builder;

/// The DB type used for tangle stores
pub type DB = DBWithThreadMode<MultiThreaded>;

/// Size and compaction state of a database
pub trait StorageInfo: Send + Sync {
    /// The approximate on-disk size in bytes
    fn size(&self) -> StoreResult<u64>;

    fn compaction_supported(&self) -> bool;

    fn compaction_running(&self) -> StoreResult<bool>;
}

const PROP_SST_FILES_SIZE: &str = "rocksdb.total-sst-files-size";
const PROP_MEM_TABLES_SIZE: &str = "rocksdb.size-all-mem-tables";
const PROP_RUNNING_COMPACTIONS: &str = "rocksdb.num-running-compactions";

impl StorageInfo for DB {
    fn size(&self) -> StoreResult<u64> {
        let sst = self.property_int_value(PROP_SST_FILES_SIZE)?.unwrap_or_default();
        let mem_tables = self.property_int_value(PROP_MEM_TABLES_SIZE)?.unwrap_or_default();
        Ok(sst + mem_tables)
    }

    fn compaction_supported(&self) -> bool {
        true
    }

    fn compaction_running(&self) -> StoreResult<bool> {
        Ok(self.property_int_value(PROP_RUNNING_COMPACTIONS)?.unwrap_or_default() > 0)
    }
}
