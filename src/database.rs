use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::buffer_pool::BufferPool;
use crate::catalog::Catalog;
use crate::log_file::LogFile;

/// Process-wide handle bundling the catalog, the log and the buffer
/// pool that sits on top of them -- the same role the teacher's root
/// `database.rs` plays, merged with the generic singleton machinery of
/// `utils/unique.rs` into one `OnceCell`-backed accessor instead of the
/// teacher's `unsafe static mut` + `mem::transmute` pattern.
pub struct Database {
    catalog: Arc<Catalog>,
    buffer_pool: Arc<BufferPool>,
}

static INSTANCE: OnceCell<Database> = OnceCell::new();

impl Database {
    pub fn new(capacity_pages: usize, log: Arc<dyn LogFile>) -> Self {
        let catalog = Arc::new(Catalog::new());
        let buffer_pool = Arc::new(BufferPool::new(capacity_pages, Arc::clone(&catalog), log));
        Self {
            catalog,
            buffer_pool,
        }
    }

    /// Installs `db` as the process-wide instance. Panics if called more
    /// than once; tests that need isolated instances should hold their
    /// own `Database` value instead of going through `global()`.
    pub fn init_global(db: Database) {
        if INSTANCE.set(db).is_err() {
            panic!("Database::init_global called more than once");
        }
    }

    pub fn global() -> &'static Database {
        INSTANCE
            .get()
            .expect("Database::init_global was never called")
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn buffer_pool(&self) -> &Arc<BufferPool> {
        &self.buffer_pool
    }
}
