use crate::prelude::DB;
use std::sync::Weak;
use tempfile::TempDir;

pub struct DbLifetime {
    weak_db_ref: Weak<DB>,
    optional_tempdir: Option<TempDir>,
}

impl DbLifetime {
    pub fn new(tempdir: TempDir, weak_db_ref: Weak<DB>) -> Self {
        Self { optional_tempdir: Some(tempdir), weak_db_ref }
    }
}

impl Drop for DbLifetime {
    fn drop(&mut self) {
        for _ in 0..16 {
            if self.weak_db_ref.strong_count() > 0 {
                // Worker threads may still be releasing their references
                std::thread::sleep(std::time::Duration::from_millis(1000));
            } else {
                break;
            }
        }
        assert_eq!(self.weak_db_ref.strong_count(), 0, "DB is expected to have no strong references when lifetime is dropped");
        if let Some(dir) = self.optional_tempdir.take() {
            let options = rocksdb::Options::default();
            let path_buf = dir.path().to_owned();
            if let Err(err) = DB::destroy(&options, &path_buf) {
                eprintln!("failed destroying temp db at {}: {err}", path_buf.display());
            }
        }
    }
}

pub fn get_tangle_tempdir() -> TempDir {
    let global_tempdir = std::env::temp_dir();
    let tangle_tempdir = global_tempdir.join("tangle-pruner");
    std::fs::create_dir_all(tangle_tempdir.as_path()).unwrap();
    let db_tempdir = tempfile::tempdir_in(tangle_tempdir.as_path()).unwrap();
    db_tempdir
}

/// Creates a DB within a temp directory under `<OS SPECIFIC TEMP DIR>/tangle-pruner`
/// Callers must keep the `DbLifetime` guard for as long as they wish the DB to exist.
#[macro_export]
macro_rules! create_temp_db {
    ($conn_builder: expr) => {{
        let db_tempdir = $crate::utils::get_tangle_tempdir();
        let db_path = db_tempdir.path().to_owned();
        let db = $conn_builder.with_db_path(db_path).build().unwrap();
        ($crate::utils::DbLifetime::new(db_tempdir, std::sync::Arc::downgrade(&db)), db)
    }};
}
