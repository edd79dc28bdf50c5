//! Codepage resource table loader (spec §6, §4.E).
//!
//! The text-index collation tables are side data: a dense table of 256
//! entries covering the BMP low range, and a sparse mapping for the extended
//! range, both encoded as UTF-8 lines of `<prefix><hex-codes>[,<hex-codes>…]`.
//!
//! Line format (Open Question, resolved in DESIGN.md): the dense table has
//! one line per code point 0..256, implicit index = line number, of the form
//! `<kind-letter><hex-inline>[,<hex-extra>]`; the sparse table prefixes each
//! line with the code point in hex: `<hex-codepoint>:<kind-letter><hex-inline>[,<hex-extra>]`.
//! A kind letter with no hex groups at all (bare letter, e.g. `G` for IGNORED)
//! is valid. Malformed lines are a hard parse failure (`Error::Io`), per the
//! §9 Open Question: these tables are foundational to every index key this
//! crate produces, so a corrupt table must not silently degrade collation.

use std::collections::HashMap;
use std::io::BufRead;

use crate::collation::{CharEntry, HandlerKind};
use crate::error::{Error, Result};
use crate::util::parse_hex;

fn parse_kind(letter: u8) -> Result<HandlerKind> {
    Ok(match letter {
        b'S' => HandlerKind::Simple,
        b'I' => HandlerKind::International,
        b'U' => HandlerKind::Unprintable,
        b'X' => HandlerKind::UnprintableExt,
        b'J' => HandlerKind::InternationalExt,
        b'G' => HandlerKind::Significant,
        b'Y' => HandlerKind::Surrogate,
        b'N' => HandlerKind::Ignored,
        other => {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("unknown collation handler kind letter {:#04x}", other),
            )))
        }
    })
}

fn parse_entry(rest: &str) -> Result<CharEntry> {
    let bad = |msg: &str| -> Error {
        Error::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("malformed collation table line: {msg}"),
        ))
    };
    let mut bytes = rest.bytes();
    let kind_letter = bytes.next().ok_or_else(|| bad("empty line"))?;
    let kind = parse_kind(kind_letter)?;
    let hex_part = &rest[1..];
    if hex_part.is_empty() {
        return Ok(CharEntry {
            kind,
            inline: Vec::new(),
            extra: Vec::new(),
            crazy: None,
        });
    }
    let mut groups = hex_part.split(',');
    let inline_hex = groups.next().unwrap_or("");
    if !inline_hex.bytes().all(|b| b.is_ascii_hexdigit()) || inline_hex.len() % 2 != 0 {
        return Err(bad("inline hex group is not valid even-length hex"));
    }
    let inline = parse_hex(inline_hex.as_bytes());
    let extra = match groups.next() {
        Some(extra_hex) => {
            if !extra_hex.bytes().all(|b| b.is_ascii_hexdigit()) || extra_hex.len() % 2 != 0 {
                return Err(bad("extra hex group is not valid even-length hex"));
            }
            parse_hex(extra_hex.as_bytes())
        }
        None => Vec::new(),
    };
    let crazy = match groups.next() {
        Some(flag_hex) => {
            if flag_hex.len() != 2 || !flag_hex.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(bad("crazy-flag group must be exactly one hex byte"));
            }
            Some(parse_hex(flag_hex.as_bytes())[0])
        }
        None => None,
    };
    if groups.next().is_some() {
        return Err(bad("too many comma-separated hex groups"));
    }
    Ok(CharEntry {
        kind,
        inline,
        extra,
        crazy,
    })
}

/// A loaded codepage resource table: dense entries for code points `0..256`
/// and a sparse map for everything above that.
#[derive(Debug, Default, Clone)]
pub struct CollationTable {
    dense: Vec<CharEntry>,
    sparse: HashMap<u32, CharEntry>,
}

impl CollationTable {
    /// Look up the handler entry for a code point, if the table covers it.
    pub fn get(&self, code_point: u32) -> Option<&CharEntry> {
        if (code_point as usize) < self.dense.len() {
            Some(&self.dense[code_point as usize])
        } else {
            self.sparse.get(&code_point)
        }
    }

    /// Parse a dense table (`index_codes_*.txt`-shaped): one line per code
    /// point starting at 0.
    pub fn parse_dense(reader: impl BufRead) -> Result<Self> {
        let mut dense = Vec::new();
        for line in reader.lines() {
            let line = line?;
            let line = line.trim_end();
            if line.is_empty() {
                continue;
            }
            dense.push(parse_entry(line)?);
        }
        Ok(CollationTable {
            dense,
            sparse: HashMap::new(),
        })
    }

    /// Parse a sparse extended-range table
    /// (`index_mappings_ext_gen_97.txt`-shaped): each line prefixed with its
    /// code point in hex.
    pub fn parse_sparse(reader: impl BufRead) -> Result<Self> {
        let bad = |msg: &str| -> Error {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("malformed sparse collation table line: {msg}"),
            ))
        };
        let mut sparse = HashMap::new();
        for line in reader.lines() {
            let line = line?;
            let line = line.trim_end();
            if line.is_empty() {
                continue;
            }
            let (cp_hex, rest) = line.split_once(':').ok_or_else(|| bad("missing ':'"))?;
            if !cp_hex.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(bad("code point prefix is not hex"));
            }
            let cp = u32::from_str_radix(cp_hex, 16)
                .map_err(|_| bad("code point prefix does not fit u32"))?;
            sparse.insert(cp, parse_entry(rest)?);
        }
        Ok(CollationTable {
            dense: Vec::new(),
            sparse,
        })
    }

    /// Merge `other`'s entries into `self`, `other` taking priority on
    /// overlapping code points. Used to layer a sparse extended table on top
    /// of a dense base table.
    pub fn merge(mut self, other: CollationTable) -> Self {
        if other.dense.len() > self.dense.len() {
            self.dense.resize(other.dense.len(), CharEntry::default());
        }
        for (i, entry) in other.dense.into_iter().enumerate() {
            self.dense[i] = entry;
        }
        self.sparse.extend(other.sparse);
        self
    }
}
