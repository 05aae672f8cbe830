use std::sync::Arc;
use std::sync::Once;

use small_bufferpool::{BufferPool, Catalog, HeapFile, RecordingLogFile};

static INIT: Once = Once::new();

/// Log init, run once for the whole test binary. Each test still gets
/// its own `BufferPool`/`Catalog`/`HeapFile` trio so tests never share
/// state through a single db file.
pub fn setup() {
    INIT.call_once(init_log);
}

fn init_log() {
    use std::io::Write;

    let mut builder = env_logger::Builder::from_default_env();
    builder
        .format_timestamp_millis()
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} - {}] [{}:{}] {}",
                record.level(),
                record.target(),
                record.file().unwrap_or("?"),
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .is_test(true)
        .try_init()
        .ok();
}

/// One or more tables' worth of wiring: temp-file-backed `HeapFile`s
/// registered in a shared `Catalog`, plus a `BufferPool` of the
/// requested capacity sharing a `RecordingLogFile` so tests can assert
/// on WAL ordering.
pub struct Harness {
    pub bp: BufferPool,
    pub log: Arc<RecordingLogFile>,
    pub table_id: i32,
    pub table_ids: Vec<i32>,
}

impl Harness {
    pub fn new(capacity_pages: usize, tuple_size: usize) -> Self {
        Self::with_tables(capacity_pages, tuple_size, 1)
    }

    pub fn with_tables(capacity_pages: usize, tuple_size: usize, num_tables: i32) -> Self {
        setup();
        let catalog = Arc::new(Catalog::new());
        let mut table_ids = Vec::new();
        for table_id in 1..=num_tables {
            let path = std::env::temp_dir().join(format!(
                "small-bufferpool-test-{}-{}-{}.db",
                std::process::id(),
                table_id,
                rand::random::<u64>()
            ));
            let file = HeapFile::new(&path, table_id, tuple_size).expect("create heap file");
            catalog.add_table(Arc::new(file));
            table_ids.push(table_id);
        }
        let log = Arc::new(RecordingLogFile::new());
        let bp = BufferPool::new(capacity_pages, catalog, log.clone());
        Self {
            bp,
            log,
            table_id: table_ids[0],
            table_ids,
        }
    }
}
