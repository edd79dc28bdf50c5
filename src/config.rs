//! `DatabaseOptions` (ambient stack addition, SPEC_FULL.md §B).
//!
//! A small `serde`-derived config struct, in the style the pack's other
//! plain-config crates use. Kept intentionally small: SQL/CLI configuration
//! is out of this crate's scope.

use serde::{Deserialize, Serialize};

use crate::column::SortOrder;
use crate::format::FormatVersion;

/// Options controlling how a database file is opened.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseOptions {
    /// Override the page size implied by the file's format version. `None`
    /// uses whatever `FormatVersion::page_size()` returns.
    pub page_size_override: Option<usize>,
    /// Default collation applied to new text columns that don't specify one.
    pub default_sort_order: SortOrder,
    /// Open the file read-only: `start_write`/`start_exclusive_write` always
    /// fail.
    pub read_only: bool,
}

impl DatabaseOptions {
    /// Options for opening `version` read-write with that version's default
    /// page size and `General` collation.
    pub fn for_version(version: FormatVersion) -> Self {
        DatabaseOptions {
            page_size_override: Some(version.page_size()),
            default_sort_order: SortOrder::General,
            read_only: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_use_the_format_versions_page_size() {
        let opts = DatabaseOptions::for_version(FormatVersion::Jet3);
        assert_eq!(opts.page_size_override, Some(2048));
        assert!(!opts.read_only);
    }
}
