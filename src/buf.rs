//! Buffer/Page Holders (spec §4.B).
//!
//! [`TempBufferHolder`] owns a scratch buffer under one of three cache
//! policies; [`TempPageHolder`] layers page-aware memoization on top of it so
//! a cursor that stays on one page does not re-read it on every access.
//!
//! Grounded on the teacher's `cache.rs` time-stamped invalidation idiom,
//! adapted from "evict by LRU timestamp" to the holder/`modCount` design
//! spec.md calls for.

use crate::page::PagedByteStore;
use crate::error::Result;

/// How a [`TempBufferHolder`] retains its backing buffer between calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheMode {
    /// Pin the buffer until [`TempBufferHolder::clear`] is called.
    Hard,
    /// Retain the buffer, but it may be dropped under memory pressure
    /// (modelled here as a capacity-bounded reuse — the buffer is never
    /// actually evicted by an external allocator in this single-process
    /// engine, but the mode is tracked for parity with spec.md).
    Soft,
    /// Allocate a fresh buffer on every call.
    None,
}

/// A reusable scratch buffer, reallocated on demand and stamped with a
/// monotonically increasing `modCount` each time that happens.
pub struct TempBufferHolder {
    mode: CacheMode,
    auto_rewind: bool,
    buf: Vec<u8>,
    mod_count: u64,
}

impl TempBufferHolder {
    /// A holder with the given cache mode. `auto_rewind` controls whether
    /// [`Self::get_buffer`] zero-fills a reused buffer before handing it back.
    pub fn new(mode: CacheMode, auto_rewind: bool) -> Self {
        TempBufferHolder {
            mode,
            auto_rewind,
            buf: Vec::new(),
            mod_count: 0,
        }
    }

    /// The current modification count: bumped every time the backing buffer
    /// is reallocated.
    pub fn mod_count(&self) -> u64 {
        self.mod_count
    }

    /// A buffer of at least `size` bytes, with `limit = size`. Reallocates
    /// (bumping `mod_count`) if the current capacity is insufficient, or if
    /// the cache mode is [`CacheMode::None`].
    pub fn get_buffer(&mut self, size: usize) -> &mut [u8] {
        let need_fresh = self.mode == CacheMode::None || self.buf.capacity() < size;
        if need_fresh {
            self.buf = vec![0u8; size];
            self.mod_count += 1;
        } else {
            self.buf.resize(size, 0);
            if self.auto_rewind {
                self.buf.iter_mut().for_each(|b| *b = 0);
            }
        }
        &mut self.buf[..size]
    }

    /// Release the pinned buffer (only meaningful for [`CacheMode::Hard`]).
    pub fn clear(&mut self) {
        self.buf = Vec::new();
        self.mod_count += 1;
    }
}

/// Wraps a [`TempBufferHolder`] and memoizes which page it currently holds.
///
/// `set_page` rereads the page iff the page number changed or the backing
/// buffer was reallocated since the last read; [`Self::possibly_invalidate`]
/// lets a writer on a different holder drop this holder's cached copy of a
/// page it just modified.
pub struct TempPageHolder {
    buffer: TempBufferHolder,
    cached_page: Option<(i64, u64)>,
}

impl TempPageHolder {
    /// A page holder over a freshly created buffer holder with `mode`.
    pub fn new(mode: CacheMode) -> Self {
        TempPageHolder {
            buffer: TempBufferHolder::new(mode, false),
            cached_page: None,
        }
    }

    /// Ensure this holder's buffer contains page `n`, reading through `store`
    /// only if the cache is stale. Returns the page buffer.
    pub fn set_page(&mut self, store: &mut PagedByteStore, n: i64) -> Result<&mut [u8]> {
        let page_size = store.page_size();
        let stale = match self.cached_page {
            Some((cached_n, cached_mod)) => cached_n != n || cached_mod != self.buffer.mod_count(),
            None => true,
        };
        if stale {
            let buf = self.buffer.get_buffer(page_size);
            store.read_page(buf, n)?;
            self.cached_page = Some((n, self.buffer.mod_count()));
        }
        Ok(self.buffer.get_buffer(page_size))
    }

    /// Drop the cached page if it is `n` and the caller's `modified_buffer`
    /// is a different holder's buffer (so a concurrent writer's change to
    /// page `n` is observed on this holder's next `set_page`).
    pub fn possibly_invalidate(&mut self, n: i64, modified_buffer: &TempBufferHolder) {
        if let Some((cached_n, _)) = self.cached_page {
            if cached_n == n && !std::ptr::eq(&self.buffer, modified_buffer) {
                self.cached_page = None;
            }
        }
    }

    /// The page number currently cached, if any.
    pub fn cached_page_number(&self) -> Option<i64> {
        self.cached_page.map(|(n, _)| n)
    }
}
