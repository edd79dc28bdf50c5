//! Paged Byte Store (spec §4.A): logical pages over a byte-addressable file.
//!
//! Grounded on the teacher's `Storage` trait (`stg.rs`) for the raw
//! read/write/commit seam, and on `compact.rs`'s logical-page-over-file
//! bookkeeping for page allocation. Every buffer handed back by this module
//! is exactly one page long and has already round-tripped through the
//! configured [`PageCodec`].

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::codec::PageCodec;
use crate::error::{Error, Result};
use crate::format::FormatVersion;

/// Backing storage for a paged file. The teacher's `Storage` trait
/// generalized with `Result`-returning methods (this crate has no panic
/// boundary to preserve) and an explicit page size.
pub trait PageChannel: Send + Sync {
    /// Size of the backing storage in bytes.
    fn byte_size(&self) -> Result<u64>;

    /// Read `buf.len()` bytes starting at byte offset `off`.
    fn read_at(&mut self, off: u64, buf: &mut [u8]) -> Result<()>;

    /// Write `buf` at byte offset `off`.
    fn write_at(&mut self, off: u64, buf: &[u8]) -> Result<()>;

    /// Truncate or extend the underlying storage to exactly `size` bytes and
    /// flush any buffered writes.
    fn commit(&mut self, size: u64) -> Result<()>;
}

/// A [`PageChannel`] backed by a plain `std::fs::File`.
pub struct FileChannel {
    file: File,
}

impl FileChannel {
    /// Open (creating if absent) the file at `path` for paged read/write.
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        Ok(FileChannel { file })
    }
}

impl PageChannel for FileChannel {
    fn byte_size(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    fn read_at(&mut self, off: u64, buf: &mut [u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(off))?;
        self.file.read_exact(buf)?;
        Ok(())
    }

    fn write_at(&mut self, off: u64, buf: &[u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(off))?;
        self.file.write_all(buf)?;
        Ok(())
    }

    fn commit(&mut self, size: u64) -> Result<()> {
        self.file.flush()?;
        self.file.set_len(size)?;
        Ok(())
    }
}

/// Whether the current write region is shared (other cursors may still read
/// unrelated pages) or exclusive (the whole database is locked to this
/// writer). Mirrors spec §5's `startWrite`/`startExclusiveWrite` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteScope {
    Shared,
    Exclusive,
}

/// Logical paged store: allocates, reads and writes fixed-size pages through
/// a [`PageChannel`], running every page through a [`PageCodec`].
pub struct PagedByteStore {
    channel: Box<dyn PageChannel>,
    codec: Box<dyn PageCodec>,
    page_size: usize,
    page_count: u64,
    write_scope: Option<WriteScope>,
}

impl PagedByteStore {
    /// Open an existing or create a new paged store for `version`, backed by
    /// `channel` and transforming pages through `codec`.
    pub fn new(
        channel: Box<dyn PageChannel>,
        codec: Box<dyn PageCodec>,
        version: FormatVersion,
    ) -> Result<Self> {
        let page_size = version.page_size();
        let byte_len = channel.byte_size()?;
        let page_count = byte_len / page_size as u64;
        Ok(PagedByteStore {
            channel,
            codec,
            page_size,
            page_count,
            write_scope: None,
        })
    }

    /// The page size in bytes for this store's format version.
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Number of pages currently allocated in the file.
    pub fn page_count(&self) -> u64 {
        self.page_count
    }

    /// A zero-filled buffer of exactly `page_size()` bytes, ready to be
    /// filled and passed to [`Self::write_page`].
    pub fn create_page_buffer(&self) -> Vec<u8> {
        vec![0u8; self.page_size]
    }

    /// Wrap an existing byte vector as a page buffer, padding or truncating
    /// it to exactly `page_size()` bytes.
    pub fn wrap(&self, mut bytes: Vec<u8>) -> Vec<u8> {
        bytes.resize(self.page_size, 0);
        bytes
    }

    /// Allocate a fresh page number at the end of the file.
    ///
    /// Invariant (spec §5 Ordering): within one write region, page
    /// allocations are monotonically increasing.
    pub fn allocate_new_page(&mut self) -> Result<i64> {
        let n = self.page_count;
        self.page_count += 1;
        Ok(n as i64)
    }

    /// Read page `n` into `buf`, which must be exactly `page_size()` bytes
    /// long. Decodes the page through the configured codec before returning.
    pub fn read_page(&mut self, buf: &mut [u8], n: i64) -> Result<()> {
        debug_assert_eq!(buf.len(), self.page_size);
        let off = (n as u64) * self.page_size as u64;
        self.channel.read_at(off, buf)?;
        self.codec.decode(n, buf)?;
        log::trace!("read_page n={n} off={off}");
        Ok(())
    }

    /// Write `buf` (exactly `page_size()` bytes) to page `n`, encoding it
    /// through the configured codec first.
    pub fn write_page(&mut self, buf: &[u8], n: i64) -> Result<()> {
        debug_assert_eq!(buf.len(), self.page_size);
        if self.write_scope.is_none() {
            return Err(Error::illegal_state(
                "write_page called outside a write region",
            ));
        }
        let mut encoded = buf.to_vec();
        self.codec.encode(n, &mut encoded)?;
        let off = (n as u64) * self.page_size as u64;
        self.channel.write_at(off, &encoded)?;
        log::trace!("write_page n={n} off={off}");
        Ok(())
    }

    /// Begin a shared write region: concurrent readers of unrelated pages are
    /// still permitted (single-threaded cooperative model, spec §5).
    pub fn start_write(&mut self) -> Result<()> {
        if self.write_scope.is_some() {
            return Err(Error::illegal_state("write region already open"));
        }
        self.write_scope = Some(WriteScope::Shared);
        Ok(())
    }

    /// Begin an exclusive write region: the whole database is locked to this
    /// writer, used for schema mutation (§4.I).
    pub fn start_exclusive_write(&mut self) -> Result<()> {
        if self.write_scope.is_some() {
            return Err(Error::illegal_state("write region already open"));
        }
        self.write_scope = Some(WriteScope::Exclusive);
        Ok(())
    }

    /// End the current write region, committing the new file size.
    pub fn finish_write(&mut self) -> Result<()> {
        if self.write_scope.take().is_none() {
            return Err(Error::illegal_state("finish_write with no open region"));
        }
        let size = self.page_count * self.page_size as u64;
        self.channel.commit(size)?;
        Ok(())
    }

    /// Whether an exclusive write region is currently open.
    pub fn in_exclusive_write(&self) -> bool {
        self.write_scope == Some(WriteScope::Exclusive)
    }
}

/// Create a new, empty database file at `path`, sized for one header page.
pub fn create_new_file(path: &Path, version: FormatVersion) -> Result<()> {
    let page_size = version.page_size();
    let mut header = vec![0u8; page_size];
    header[crate::format::OFFSET_VERSION] = version.to_byte();
    fs::write(path, &header)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::PassThroughCodec;
    use tempfile::NamedTempFile;

    fn open_store(version: FormatVersion) -> (PagedByteStore, NamedTempFile) {
        let tmp = NamedTempFile::new().unwrap();
        create_new_file(tmp.path(), version).unwrap();
        let channel = Box::new(FileChannel::open(tmp.path()).unwrap());
        let store = PagedByteStore::new(channel, Box::new(PassThroughCodec), version).unwrap();
        (store, tmp)
    }

    #[test]
    fn read_page_round_trips_full_page_length() {
        let (mut store, _tmp) = open_store(FormatVersion::Jet4);
        let mut buf = store.create_page_buffer();
        store.read_page(&mut buf, 0).unwrap();
        assert_eq!(buf.len(), FormatVersion::Jet4.page_size());
    }

    #[test]
    fn write_requires_open_region() {
        let (mut store, _tmp) = open_store(FormatVersion::Jet4);
        let buf = store.create_page_buffer();
        assert!(store.write_page(&buf, 0).is_err());
    }

    #[test]
    fn page_allocation_is_monotonic_within_a_region() {
        let (mut store, _tmp) = open_store(FormatVersion::Jet4);
        store.start_write().unwrap();
        let a = store.allocate_new_page().unwrap();
        let b = store.allocate_new_page().unwrap();
        assert!(b > a);
        store.finish_write().unwrap();
    }
}
