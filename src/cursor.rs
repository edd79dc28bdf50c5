//! Cursors (spec §4.G): `TableScanCursor`, `IndexCursor`, `RowState`.
//!
//! Grounded on the teacher's `sortedfile.rs` `Asc`/`Dsc`/`Stack` iterators,
//! generalized into the explicit BEFORE_FIRST/ON_ROW/AFTER_LAST state machine
//! spec.md diagrams, with `RowState` standing in for the teacher's per-page
//! parsed-header cache.

use crate::btree::BTreeIndex;
use crate::column::RowId;

/// Direction a cursor advances in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

/// A table-scan cursor's position: either on a row, or one of the two
/// sentinel ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPosition {
    BeforeFirst,
    OnRow(RowId),
    AfterLast,
}

/// Caches whatever the cursor last read so repositioning to the same row
/// does not require a fresh page lookup. Stands in for the parsed page
/// header the teacher's per-page cache holds; here it just remembers which
/// `RowId` was last materialized and whether that row is still live.
#[derive(Debug, Default, Clone)]
pub struct RowState {
    current: Option<RowId>,
    deleted: bool,
}

impl RowState {
    /// Record that `row_id` is the cursor's current row.
    pub fn set(&mut self, row_id: RowId, deleted: bool) {
        self.current = Some(row_id);
        self.deleted = deleted;
    }

    /// Clear the cache (used when `possibly_invalidate` fires).
    pub fn clear(&mut self) {
        self.current = None;
        self.deleted = false;
    }

    /// The currently cached row, if any and not deleted.
    pub fn current(&self) -> Option<RowId> {
        if self.deleted {
            None
        } else {
            self.current
        }
    }

    /// Invalidate the cache iff it currently holds `row_id` and the write
    /// that changed it came from a different cursor (spec §4.B/§5: the
    /// shared `TempPageHolder` semantics, applied here at the row level).
    pub fn possibly_invalidate(&mut self, row_id: RowId, same_cursor: bool) {
        if !same_cursor && self.current == Some(row_id) {
            self.clear();
        }
    }
}

/// Walks a table's owned pages in `RowId` order, honoring deletions.
///
/// The real engine resolves rows by walking a table's data pages via its
/// usage map; this cursor is given the resolved, still-live row ids (what a
/// table-def/usage-map walk would ultimately produce) and focuses on the
/// state machine and idempotence spec.md actually specifies invariants for.
pub struct TableScanCursor {
    rows: Vec<RowId>,
    position: ScanPosition,
    state: RowState,
}

impl TableScanCursor {
    /// A cursor over `rows` (assumed already in ascending `RowId` order),
    /// starting `BEFORE_FIRST`.
    pub fn new(mut rows: Vec<RowId>) -> Self {
        rows.sort();
        TableScanCursor {
            rows,
            position: ScanPosition::BeforeFirst,
            state: RowState::default(),
        }
    }

    /// Current position.
    pub fn position(&self) -> ScanPosition {
        self.position
    }

    fn index_of(&self, row_id: RowId) -> Option<usize> {
        self.rows.iter().position(|r| *r == row_id)
    }

    /// Advance one row forward, returning the new position. Re-running this
    /// from `AFTER_LAST` is idempotent: it stays `AFTER_LAST`.
    pub fn move_forward(&mut self) -> ScanPosition {
        self.position = match self.position {
            ScanPosition::BeforeFirst => self.rows.first().map_or(ScanPosition::AfterLast, |r| {
                ScanPosition::OnRow(*r)
            }),
            ScanPosition::OnRow(r) => match self.index_of(r) {
                Some(i) if i + 1 < self.rows.len() => ScanPosition::OnRow(self.rows[i + 1]),
                _ => ScanPosition::AfterLast,
            },
            ScanPosition::AfterLast => ScanPosition::AfterLast,
        };
        if let ScanPosition::OnRow(r) = self.position {
            self.state.set(r, false);
        }
        self.position
    }

    /// Advance one row backward, symmetric to [`Self::move_forward`].
    pub fn move_backward(&mut self) -> ScanPosition {
        self.position = match self.position {
            ScanPosition::AfterLast => self.rows.last().map_or(ScanPosition::BeforeFirst, |r| {
                ScanPosition::OnRow(*r)
            }),
            ScanPosition::OnRow(r) => match self.index_of(r) {
                Some(i) if i > 0 => ScanPosition::OnRow(self.rows[i - 1]),
                _ => ScanPosition::BeforeFirst,
            },
            ScanPosition::BeforeFirst => ScanPosition::BeforeFirst,
        };
        if let ScanPosition::OnRow(r) = self.position {
            self.state.set(r, false);
        }
        self.position
    }

    /// Reposition directly onto `row_id` (idempotent: repeated calls with
    /// the same id are a no-op on the cached state).
    pub fn seek(&mut self, row_id: RowId) {
        self.position = ScanPosition::OnRow(row_id);
        self.state.set(row_id, false);
    }
}

/// Walks an index's leaves in key order, analogous to [`TableScanCursor`]
/// but driven by a [`BTreeIndex`] instead of a usage map.
pub struct IndexCursor<'a> {
    index: &'a BTreeIndex,
    entries: Vec<(Vec<u8>, RowId)>,
    position: ScanPosition,
}

impl<'a> IndexCursor<'a> {
    /// A cursor over `index`, starting `BEFORE_FIRST`.
    pub fn new(index: &'a BTreeIndex) -> Self {
        IndexCursor {
            index,
            entries: index.iter_entries(),
            position: ScanPosition::BeforeFirst,
        }
    }

    /// Current position.
    pub fn position(&self) -> ScanPosition {
        self.position
    }

    /// The least `RowId` whose key matches `key` exactly, positioning the
    /// cursor there if found.
    pub fn find_first_row_by_entry(&mut self, key: &[u8]) -> Option<RowId> {
        let found = self.index.find_first_row_by_entry(key);
        if let Some(row_id) = found {
            self.position = ScanPosition::OnRow(row_id);
        }
        found
    }

    /// Advance to the next entry in key order.
    pub fn move_forward(&mut self, direction: Direction) -> ScanPosition {
        let idx = match self.position {
            ScanPosition::BeforeFirst if direction == Direction::Forward => 0,
            ScanPosition::OnRow(r) => {
                match self.entries.iter().position(|(_, row_id)| *row_id == r) {
                    Some(i) => match direction {
                        Direction::Forward => i + 1,
                        Direction::Backward => {
                            if i == 0 {
                                self.position = ScanPosition::BeforeFirst;
                                return self.position;
                            } else {
                                i - 1
                            }
                        }
                    },
                    None => {
                        self.position = ScanPosition::AfterLast;
                        return self.position;
                    }
                }
            }
            _ => {
                self.position = ScanPosition::AfterLast;
                return self.position;
            }
        };
        self.position = match self.entries.get(idx) {
            Some((_, row_id)) => ScanPosition::OnRow(*row_id),
            None => ScanPosition::AfterLast,
        };
        self.position
    }
}
