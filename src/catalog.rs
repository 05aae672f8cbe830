use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::db_file::DbFile;
use crate::error::BufferPoolError;
use crate::types::BufferResult;

/// Table directory: maps a table id to the `DbFile` backing it. Schema,
/// names and indexes are out of scope (§1 Non-goals) -- the buffer pool
/// only ever needs the id-to-file lookup to satisfy `getPage`.
#[derive(Default)]
pub struct Catalog {
    tables: RwLock<HashMap<i32, Arc<dyn DbFile>>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_table(&self, file: Arc<dyn DbFile>) {
        self.tables.write().unwrap().insert(file.table_id(), file);
    }

    pub fn get_db_file(&self, table_id: i32) -> BufferResult<Arc<dyn DbFile>> {
        self.tables
            .read()
            .unwrap()
            .get(&table_id)
            .cloned()
            .ok_or(BufferPoolError::NoSuchTable(table_id))
    }
}
