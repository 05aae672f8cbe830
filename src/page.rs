use crate::page_id::PageId;
use crate::transaction_id::TransactionId;

/// An opaque fixed-size block. The buffer pool never interprets `data`;
/// that's `DbFile`'s job. What the pool does own is the dirty marker and
/// the before-image used to build WAL records at flush time.
#[derive(Debug, Clone)]
pub struct Page {
    pid: PageId,
    data: Vec<u8>,
    before_image: Vec<u8>,
    dirtier: Option<TransactionId>,
}

impl Page {
    /// A freshly read (or freshly allocated) page: clean, and its
    /// before-image is its own content until some transaction dirties it.
    pub fn new(pid: PageId, data: Vec<u8>) -> Self {
        let before_image = data.clone();
        Self {
            pid,
            data,
            before_image,
            dirtier: None,
        }
    }

    pub fn pid(&self) -> PageId {
        self.pid
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Vec<u8> {
        &mut self.data
    }

    pub fn before_image(&self) -> &[u8] {
        &self.before_image
    }

    /// Capture a fresh before-image, as done at commit time so the next
    /// transaction that dirties this page gets a correct undo record.
    pub fn set_before_image(&mut self) {
        self.before_image = self.data.clone();
    }

    pub fn is_dirty(&self) -> Option<TransactionId> {
        self.dirtier
    }

    pub fn mark_dirty(&mut self, tid: TransactionId) {
        self.dirtier = Some(tid);
    }

    pub fn mark_clean(&mut self) {
        self.dirtier = None;
    }
}
