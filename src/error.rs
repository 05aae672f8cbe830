use std::error::Error as StdError;
use std::fmt;

use crate::transaction_id::TransactionId;

/// Every failure mode the buffer pool can surface to a caller.
///
/// None of these are swallowed internally; `transaction_complete` keeps
/// releasing locks even after hitting one (see its doc comment) but it
/// still propagates the first one it saw.
#[derive(Debug)]
pub enum BufferPoolError {
    /// Lock acquisition exceeded its sampled timeout. The caller must
    /// follow up with `transaction_complete(tid, false)`.
    TransactionAborted { tid: TransactionId },
    /// Eviction scanned every resident page and found none clean.
    CacheExhausted,
    /// A `DbFile`/`LogFile` I/O operation failed.
    IoFailure(String),
    /// `Catalog::get_db_file` was asked for a table it doesn't know.
    NoSuchTable(i32),
}

impl fmt::Display for BufferPoolError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BufferPoolError::TransactionAborted { tid } => {
                write!(f, "transaction {} aborted: lock acquisition timed out", tid)
            }
            BufferPoolError::CacheExhausted => write!(f, "no clean page to evict"),
            BufferPoolError::IoFailure(detail) => write!(f, "io failure: {}", detail),
            BufferPoolError::NoSuchTable(table_id) => write!(f, "no such table: {}", table_id),
        }
    }
}

impl StdError for BufferPoolError {}

impl From<std::io::Error> for BufferPoolError {
    fn from(e: std::io::Error) -> Self {
        BufferPoolError::IoFailure(e.to_string())
    }
}
