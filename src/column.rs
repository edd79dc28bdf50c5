//! Data model types (spec §3): [`RowId`], [`Column`], [`Table`], [`Index`].

use crate::format::{MAX_COLUMNS_PER_TABLE, MAX_INDEXES_PER_TABLE};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Ordering class a [`RowId`] falls into, derived from its page-number sentinel.
/// See spec §3: comparison is lexicographic over `(class, page_number, row_number)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RowIdClass {
    /// Sentinel RowId that sorts before every real row (page number `FIRST`).
    AlwaysFirst,
    /// An ordinary row.
    Normal,
    /// Sentinel RowId that sorts after every real row (page number `LAST`).
    AlwaysLast,
}

/// Reserved page number meaning "before the first row".
pub const FIRST: i64 = crate::format::PAGE_FIRST;
/// Reserved page number meaning "after the last row".
pub const LAST: i64 = crate::format::PAGE_LAST;

/// A row identifier: `(pageNumber, rowNumber)`, per spec §3.
///
/// Immutable. Comparison is lexicographic over `(class, pageNumber, rowNumber)`;
/// sentinel row numbers compare as `-1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowId {
    page_number: i64,
    row_number: i32,
}

impl RowId {
    /// The sentinel RowId that sorts before every real row.
    pub const BEFORE_FIRST: RowId = RowId {
        page_number: FIRST,
        row_number: -1,
    };

    /// The sentinel RowId that sorts after every real row.
    pub const AFTER_LAST: RowId = RowId {
        page_number: LAST,
        row_number: -1,
    };

    /// Construct a RowId from its raw components.
    pub fn new(page_number: i64, row_number: i32) -> Self {
        RowId {
            page_number,
            row_number,
        }
    }

    /// The page number component.
    pub fn page_number(&self) -> i64 {
        self.page_number
    }

    /// The row number component.
    pub fn row_number(&self) -> i32 {
        self.row_number
    }

    /// A RowId is valid iff both components are >= 0.
    pub fn is_valid(&self) -> bool {
        self.page_number >= 0 && self.row_number >= 0
    }

    /// The ordering class this RowId falls into.
    pub fn class(&self) -> RowIdClass {
        if self.page_number == FIRST {
            RowIdClass::AlwaysFirst
        } else if self.page_number == LAST {
            RowIdClass::AlwaysLast
        } else {
            RowIdClass::Normal
        }
    }

    fn sort_key(&self) -> (RowIdClass, i64, i32) {
        let row_number = if self.page_number == FIRST || self.page_number == LAST {
            -1
        } else {
            self.row_number
        };
        (self.class(), self.page_number, row_number)
    }
}

impl PartialOrd for RowId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RowId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

/// Value-domain type a column's stored bytes decode to (spec §4.D).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueDomain {
    /// 64-bit integer: BOOLEAN, BYTE, INT, LONG.
    Long,
    /// IEEE-754 double: MONEY, FLOAT, DOUBLE.
    Double,
    /// Date/time (stored as an IEEE-754 double day count).
    DateTime,
    /// Arbitrary-precision decimal: NUMERIC, BIG_INT.
    Decimal,
    /// Everything else.
    Text,
}

/// Column type tag (spec §3 "type tag").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Boolean,
    Byte,
    Int,
    Long,
    Money,
    Float,
    Double,
    ShortDateTime,
    Numeric,
    BigInt,
    Text,
    Memo,
    Binary,
    Ole,
    Guid,
}

impl ColumnType {
    /// The value domain this column type decodes to.
    pub fn value_domain(self) -> ValueDomain {
        use ColumnType::*;
        match self {
            Boolean | Byte | Int | Long => ValueDomain::Long,
            Money | Float | Double => ValueDomain::Double,
            ShortDateTime => ValueDomain::DateTime,
            Numeric | BigInt => ValueDomain::Decimal,
            Text | Memo | Binary | Ole | Guid => ValueDomain::Text,
        }
    }

    /// Fixed byte width of this type when it is stored inline, or `None` when the
    /// column is variable-length.
    pub fn fixed_width(self) -> Option<usize> {
        use ColumnType::*;
        match self {
            Boolean => Some(0), // represented entirely in the null mask bit.
            Byte => Some(1),
            Int => Some(2),
            Long => Some(4),
            Money => Some(8),
            Float => Some(4),
            Double => Some(8),
            ShortDateTime => Some(8),
            Numeric | BigInt => Some(17),
            Guid => Some(16),
            Text | Memo | Binary | Ole => None,
        }
    }

    /// Whether this type permits more than one auto-number column per table
    /// (spec §3: "at most one auto-number column per auto-number type family
    /// unless the type permits multiple").
    pub fn allows_multiple_autonumber(self) -> bool {
        matches!(self, ColumnType::Guid)
    }
}

/// Locale-sensitive text sort order, used by the index codec (spec §4.E).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum SortOrder {
    /// Original Jet3 collation.
    Legacy,
    /// Jet4/ACE general collation.
    General,
    /// ACE 2010+ "general 97" collation (single nibble stream).
    General97,
}

/// Per-column flags (spec §3).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColumnFlags {
    pub auto_number: bool,
    pub hyperlink: bool,
    pub compressed_unicode: bool,
}

/// A table column (spec §3).
#[derive(Debug, Clone)]
pub struct Column {
    /// Column name (ASCII/UCS-2 in the file; stored here as a Rust `String`).
    pub name: String,
    /// Column number, used to locate the value in a row buffer.
    pub column_number: u16,
    /// Type tag.
    pub column_type: ColumnType,
    /// Text sort order (only meaningful when `column_type.value_domain() == Text`).
    pub sort_order: Option<SortOrder>,
    /// Precision (numeric columns only).
    pub precision: u8,
    /// Scale (numeric columns only).
    pub scale: u8,
    /// Declared length in bytes (for variable length columns, the maximum; for
    /// fixed columns this equals `column_type.fixed_width()`).
    pub length: u16,
    /// Flags.
    pub flags: ColumnFlags,
}

impl Column {
    /// Whether this column is fixed-width.
    pub fn is_fixed(&self) -> bool {
        self.column_type.fixed_width().is_some()
    }

    /// Whether this column's stored bytes may be spilled to a long-variable
    /// fragment chain (memo/OLE columns only).
    pub fn is_long_variable(&self) -> bool {
        matches!(self.column_type, ColumnType::Memo | ColumnType::Ole)
    }
}

/// A column reference within an index, with ascending flag and per-column flags
/// (spec §3 "Index").
#[derive(Debug, Clone, Copy)]
pub struct ColumnDescriptor {
    /// Index into the owning table's column list.
    pub column_number: u16,
    /// Ascending (true) or descending (false).
    pub ascending: bool,
}

/// A foreign-key reference (spec §3).
#[derive(Debug, Clone)]
pub struct ForeignKeyRef {
    /// Name of the table on the "primary" (referenced) side of the relationship,
    /// when this index is the *secondary* side. `None` when this index itself is
    /// the primary side.
    pub primary_table: Option<String>,
    /// Propagate UPDATE of the primary key to referencing rows.
    pub cascade_updates: bool,
    /// Propagate DELETE of the primary key to referencing rows.
    pub cascade_deletes: bool,
}

/// An index definition (spec §3).
#[derive(Debug, Clone)]
pub struct Index {
    /// Index name, unique per table (case-insensitive).
    pub name: String,
    /// Columns making up the index key, in order.
    pub columns: Vec<ColumnDescriptor>,
    /// Whether this index is the table's primary key.
    pub primary_key: bool,
    /// Foreign-key reference, if any.
    pub foreign_key: Option<ForeignKeyRef>,
    /// Root page of the physical B-tree backing this index. Multiple logical
    /// indexes with identical columns/flags may share one `root_page` (spec
    /// §4.I "reuse existing IndexData").
    pub root_page: i64,
}

impl Index {
    /// Flags considered when deciding whether two indexes can share backing
    /// IndexData: same column set (including order and ascending flag) and same
    /// primary-key-ness. "Ignored bits" per spec §4.I are modelled by comparing
    /// only these fields rather than a raw flags word.
    pub fn shares_backing_with(&self, other: &Index) -> bool {
        self.primary_key == other.primary_key
            && self.columns.len() == other.columns.len()
            && self
                .columns
                .iter()
                .zip(other.columns.iter())
                .all(|(a, b)| a.column_number == b.column_number && a.ascending == b.ascending)
    }
}

/// A table: ordered columns, indexes, and the set of pages it owns (spec §3).
#[derive(Debug, Clone)]
pub struct Table {
    /// Table name.
    pub name: String,
    /// Ordered columns.
    pub columns: Vec<Column>,
    /// Indexes defined on this table.
    pub indexes: Vec<Index>,
    /// Root page of the table's row-data B-tree.
    pub root_page: i64,
    /// Root page of the table's usage map (owned pages).
    pub usage_map_page: i64,
}

impl Table {
    /// Construct an empty table.
    pub fn new(name: impl Into<String>, root_page: i64, usage_map_page: i64) -> Self {
        Table {
            name: name.into(),
            columns: Vec::new(),
            indexes: Vec::new(),
            root_page,
            usage_map_page,
        }
    }

    /// Number of columns.
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Find a column by case-insensitive name.
    pub fn column_named(&self, name: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Find a column's index in `self.columns` by case-insensitive name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// The table's primary-key index, if any. Spec §3 invariant: at most one.
    pub fn primary_key_index(&self) -> Option<&Index> {
        self.indexes.iter().find(|i| i.primary_key)
    }

    /// Find an index by case-insensitive name.
    pub fn index_named(&self, name: &str) -> Option<&Index> {
        self.indexes
            .iter()
            .find(|i| i.name.eq_ignore_ascii_case(name))
    }

    /// Validate that adding `name` as a new column would not violate the
    /// uniqueness/column-count/auto-number invariants of spec §3 and §4.I.
    pub fn validate_new_column(
        &self,
        name: &str,
        column_type: ColumnType,
        flags: ColumnFlags,
    ) -> crate::error::Result<()> {
        if self.column_named(name).is_some() {
            return Err(crate::error::Error::illegal_argument(format!(
                "column '{name}' already exists"
            )));
        }
        if self.columns.len() + 1 > MAX_COLUMNS_PER_TABLE {
            return Err(crate::error::Error::illegal_argument(format!(
                "table already has the maximum of {MAX_COLUMNS_PER_TABLE} columns"
            )));
        }
        if flags.auto_number && !column_type.allows_multiple_autonumber() {
            let existing = self
                .columns
                .iter()
                .any(|c| c.flags.auto_number && c.column_type == column_type);
            if existing {
                return Err(crate::error::Error::illegal_argument(format!(
                    "table already has an auto-number column of type {column_type:?}"
                )));
            }
        }
        Ok(())
    }

    /// Validate that adding `name` as a new index would not violate spec §3/§4.I.
    pub fn validate_new_index(&self, name: &str, primary_key: bool) -> crate::error::Result<()> {
        if self.index_named(name).is_some() {
            return Err(crate::error::Error::illegal_argument(format!(
                "index '{name}' already exists"
            )));
        }
        if self.indexes.len() + 1 > MAX_INDEXES_PER_TABLE {
            return Err(crate::error::Error::illegal_argument(format!(
                "table already has the maximum of {MAX_INDEXES_PER_TABLE} indexes"
            )));
        }
        if primary_key && self.primary_key_index().is_some() {
            return Err(crate::error::Error::illegal_argument(
                "table already has a primary key index",
            ));
        }
        Ok(())
    }
}

/// Registry of tables by name, used by the FK enforcer and table mutators to
/// resolve the primary side of a relationship.
#[derive(Debug, Default)]
pub struct Schema {
    pub tables: HashMap<String, Table>,
}

impl Schema {
    pub fn get(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Table> {
        self.tables.get_mut(name)
    }
}
