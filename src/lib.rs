//! Storage and indexing engine for the Jet/ACE desktop database file format.
//!
//! Opens and reads the paged binary format of a widely used desktop
//! database (informally "Jet3"/"Jet4"/"ACE"), and supports adding/updating/
//! deleting rows with foreign-key enforcement, adding columns and indexes,
//! and reading rows back through cursors. The SQL evaluator, OLE blob
//! parsing and CLI/web surfaces of the original product are out of scope;
//! see `DESIGN.md`.
//!
//! ```no_run
//! use jetstore::{Database, DatabaseOptions};
//! use jetstore::format::FormatVersion;
//!
//! # fn main() -> jetstore::error::Result<()> {
//! let opts = DatabaseOptions::for_version(FormatVersion::Ace);
//! let mut db = Database::create("example.accdb", FormatVersion::Ace, opts)?;
//! let tables = db.table_names();
//! # let _ = tables;
//! # Ok(())
//! # }
//! ```

pub mod btree;
pub mod buf;
pub mod bytebuilder;
pub mod codec;
pub mod collation;
pub mod column;
pub mod config;
pub mod cursor;
pub mod error;
pub mod fk;
pub mod format;
pub mod mutator;
pub mod nullmask;
pub mod page;
pub mod resources;
pub mod row;
pub mod toposort;
pub(crate) mod util;

use std::collections::HashMap;
use std::path::Path;

pub use config::DatabaseOptions;
pub use error::{Error, Result};

use codec::{CodecProvider, DefaultCodecProvider};
use column::{Schema, Table};
use fk::CascadeDepth;
use format::FormatVersion;
use page::{create_new_file, FileChannel, PagedByteStore};

/// A single open database file: schema, paged store, and the shared FK
/// cascade-depth counter. Mirrors the teacher's `Database` handle, scoped
/// down to the storage/index/FK core this crate implements.
pub struct Database {
    schema: Schema,
    store: PagedByteStore,
    cascade_depth: CascadeDepth,
    options: DatabaseOptions,
}

impl Database {
    /// Create a new, empty database file at `path` for `version`.
    pub fn create(path: impl AsRef<Path>, version: FormatVersion, options: DatabaseOptions) -> Result<Self> {
        let path = path.as_ref();
        create_new_file(path, version)?;
        Self::open_with_provider(path, version, options, &DefaultCodecProvider)
    }

    /// Open an existing database file at `path`, previously written for
    /// `version`.
    pub fn open(path: impl AsRef<Path>, version: FormatVersion, options: DatabaseOptions) -> Result<Self> {
        Self::open_with_provider(path.as_ref(), version, options, &DefaultCodecProvider)
    }

    fn open_with_provider(
        path: &Path,
        version: FormatVersion,
        options: DatabaseOptions,
        provider: &dyn CodecProvider,
    ) -> Result<Self> {
        let channel = Box::new(FileChannel::open(path)?);
        let mut header = vec![0u8; version.page_size()];
        {
            // Peek at page 0's codec header before committing to a codec.
            let mut probe = PagedByteStore::new(
                Box::new(FileChannel::open(path)?),
                Box::new(codec::PassThroughCodec),
                version,
            )?;
            probe.read_page(&mut header, 0)?;
        }
        let codec_type = codec::codec_type_of(&header);
        let encoding_key = crate::util::get(&header, format::OFFSET_ENCODING_KEY, 4) as u32;
        let codec = provider.select(codec_type, encoding_key);

        let store = PagedByteStore::new(channel, codec, version)?;
        log::info!("opened database {:?} version={:?}", path, version);
        Ok(Database {
            schema: Schema::default(),
            store,
            cascade_depth: CascadeDepth::new(),
            options,
        })
    }

    /// Names of the tables currently defined in this database.
    pub fn table_names(&self) -> Vec<&str> {
        self.schema.tables.keys().map(String::as_str).collect()
    }

    /// Look up a table definition by name.
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.schema.get(name)
    }

    /// Register a table definition (used by schema bootstrapping and by
    /// tests; normal operation reads table definitions from `TABLE_DEF`
    /// pages, which is `row.rs`/`page.rs`'s concern).
    pub fn define_table(&mut self, table: Table) {
        self.schema.tables.insert(table.name.clone(), table);
    }

    /// The FK cascade depth counter shared by every cascaded write in this
    /// database handle.
    pub fn cascade_depth(&self) -> &CascadeDepth {
        &self.cascade_depth
    }

    pub(crate) fn cascade_depth_mut(&mut self) -> &mut CascadeDepth {
        &mut self.cascade_depth
    }

    /// The paged store backing this database, for modules that need direct
    /// page access (mutators, cursors).
    pub fn store_mut(&mut self) -> &mut PagedByteStore {
        &mut self.store
    }

    /// The options this database was opened with.
    pub fn options(&self) -> &DatabaseOptions {
        &self.options
    }

    /// Schema snapshot, for modules that classify FKs across the whole
    /// database (`fk::FkEnforcer::classify`).
    pub fn schema_tables(&self) -> &HashMap<String, Table> {
        &self.schema.tables
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use column::ColumnFlags;
    use tempfile::NamedTempFile;

    #[test]
    fn create_then_open_round_trips_format_version() {
        let tmp = NamedTempFile::new().unwrap();
        let opts = DatabaseOptions::for_version(FormatVersion::Jet4);
        {
            let db = Database::create(tmp.path(), FormatVersion::Jet4, opts.clone()).unwrap();
            assert!(db.table_names().is_empty());
        }
        let mut db = Database::open(tmp.path(), FormatVersion::Jet4, opts).unwrap();
        assert_eq!(db.store_mut().page_size(), FormatVersion::Jet4.page_size());
    }

    #[test]
    fn define_table_then_look_up_by_name() {
        let tmp = NamedTempFile::new().unwrap();
        let opts = DatabaseOptions::for_version(FormatVersion::Ace);
        let mut db = Database::create(tmp.path(), FormatVersion::Ace, opts).unwrap();
        db.define_table(Table::new("Customers", 4, 5));
        assert!(db.table("Customers").is_some());
        assert!(db.table("customers").is_none(), "table lookup via Database is exact-case; Table::column_named is case-insensitive");
        let _ = ColumnFlags::default();
    }
}
