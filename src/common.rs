use std::sync::atomic::{AtomicUsize, Ordering};

pub type TableId = i32;

pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Byte length of the character payload of a string field. Together with
/// the 4-byte length prefix this fixes the serialized width of every
/// string column.
pub const STRING_MAX_SIZE: usize = 128;

static PAGE_SIZE: AtomicUsize = AtomicUsize::new(DEFAULT_PAGE_SIZE);

/// The current page size in bytes. All page layout math goes through this.
pub fn page_size() -> usize {
    PAGE_SIZE.load(Ordering::Relaxed)
}

/// Overrides the page size. Only tests should call this; pages read with a
/// different page size than they were written with are garbage.
pub fn set_page_size(size: usize) {
    PAGE_SIZE.store(size, Ordering::Relaxed);
}

/// Restores the default page size after a test overrode it.
pub fn reset_page_size() {
    PAGE_SIZE.store(DEFAULT_PAGE_SIZE, Ordering::Relaxed);
}
