//! Index B-tree & Usage Maps (spec §4.F).
//!
//! Leaves hold `(key bytes, RowId)` entries ordered by key then, for
//! duplicate keys, by `RowId` — this is what makes duplicate index entries a
//! total order. Insertion/deletion are single-leaf operations unless the
//! leaf overflows or empties, in which case split/merge propagates up the
//! ancestor chain (the root may split upward, growing the tree's height).
//!
//! Grounded directly on the teacher's `sortedfile.rs` (`SortedFile`, page
//! splitting) and `page.rs` (AVL-node page layout), generalized from the
//! teacher's per-page-AVL-tree-of-records design to an explicit leaf/node
//! B-tree with `RowId` as the tie-break on duplicate keys. Unlike the
//! teacher, this module keeps the logical tree shape in memory and leaves
//! physical page (de)serialization to `page.rs`/`codec.rs` — the B-tree here
//! is the part of the design spec.md actually specifies semantics for.

use crate::column::RowId;
use crate::error::{Error, Result};

/// Maximum entries a leaf or node page holds before it must split. Chosen
/// small enough that unit tests can exercise split/merge without huge
/// fixtures; production page sizes (§6) would yield a much larger fanout.
const MAX_ENTRIES: usize = 4;

fn entry_key(key: &[u8], row_id: RowId) -> (Vec<u8>, RowId) {
    (key.to_vec(), row_id)
}

/// A single ordered `(key, RowId)` index entry.
pub type Entry = (Vec<u8>, RowId);

enum Node {
    Leaf {
        entries: Vec<Entry>,
    },
    Interior {
        /// `separators[i]` is the smallest key in `children[i + 1]`.
        separators: Vec<Entry>,
        children: Vec<Box<Node>>,
    },
}

impl Node {
    fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf { .. })
    }

    fn len(&self) -> usize {
        match self {
            Node::Leaf { entries } => entries.len(),
            Node::Interior { separators, .. } => separators.len(),
        }
    }
}

/// A B-tree index over `(key, RowId)` pairs. Pages are `INDEX_NODE` (0x03)
/// interior pages and `INDEX_LEAF` (0x04) leaf pages in spec terms; here
/// they are plain heap nodes.
pub struct BTreeIndex {
    root: Box<Node>,
}

impl Default for BTreeIndex {
    fn default() -> Self {
        BTreeIndex {
            root: Box::new(Node::Leaf { entries: Vec::new() }),
        }
    }
}

impl BTreeIndex {
    /// A fresh, empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of entries in the index.
    pub fn len(&self) -> usize {
        fn count(n: &Node) -> usize {
            match n {
                Node::Leaf { entries } => entries.len(),
                Node::Interior { children, .. } => children.iter().map(|c| count(c)).sum(),
            }
        }
        count(&self.root)
    }

    /// Whether the index has no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert `(key, row_id)`, splitting leaves/nodes up the ancestor chain
    /// as needed.
    pub fn insert(&mut self, key: &[u8], row_id: RowId) {
        let entry = entry_key(key, row_id);
        if let Some(split) = insert_into(&mut self.root, entry) {
            let old_root = std::mem::replace(
                &mut self.root,
                Box::new(Node::Leaf { entries: Vec::new() }),
            );
            self.root = Box::new(Node::Interior {
                separators: vec![split.separator],
                children: vec![old_root, split.node],
            });
        }
    }

    /// Remove `(key, row_id)`. Returns whether an entry was removed.
    pub fn remove(&mut self, key: &[u8], row_id: RowId) -> bool {
        let removed = remove_from(&mut self.root, key, row_id);
        // Collapse a root that has been merged down to a single child.
        if let Node::Interior { children, separators } = self.root.as_ref() {
            if separators.is_empty() && children.len() == 1 {
                let only = match self.root.as_mut() {
                    Node::Interior { children, .. } => children.remove(0),
                    _ => unreachable!(),
                };
                self.root = only;
            }
        }
        removed
    }

    /// The least `RowId` whose entry matches `key` exactly
    /// (`findFirstRowByEntry`), or `None` if no entry has that key.
    pub fn find_first_row_by_entry(&self, key: &[u8]) -> Option<RowId> {
        find_first(&self.root, key)
    }

    /// All entries in ascending `(key, RowId)` order, for testing and for
    /// `IndexCursor` to walk.
    pub fn iter_entries(&self) -> Vec<Entry> {
        let mut out = Vec::new();
        collect(&self.root, &mut out);
        out
    }
}

fn collect(node: &Node, out: &mut Vec<Entry>) {
    match node {
        Node::Leaf { entries } => out.extend(entries.iter().cloned()),
        Node::Interior { children, .. } => {
            for c in children {
                collect(c, out);
            }
        }
    }
}

fn find_first(node: &Node, key: &[u8]) -> Option<RowId> {
    match node {
        Node::Leaf { entries } => entries
            .iter()
            .find(|(k, _)| k.as_slice() == key)
            .map(|(_, r)| *r),
        Node::Interior { separators, children } => {
            let idx = separators
                .partition_point(|(sep_key, _)| sep_key.as_slice() <= key);
            find_first(&children[idx], key)
        }
    }
}

struct Split {
    separator: Entry,
    node: Box<Node>,
}

fn insert_into(node: &mut Node, entry: Entry) -> Option<Split> {
    match node {
        Node::Leaf { entries } => {
            let pos = entries.partition_point(|e| e < &entry);
            if entries.get(pos) == Some(&entry) {
                return None; // duplicate (key, RowId) pair, no-op
            }
            entries.insert(pos, entry);
            if entries.len() > MAX_ENTRIES {
                let mid = entries.len() / 2;
                let right = entries.split_off(mid);
                let separator = right[0].clone();
                Some(Split {
                    separator,
                    node: Box::new(Node::Leaf { entries: right }),
                })
            } else {
                None
            }
        }
        Node::Interior { separators, children } => {
            let child_idx = child_index(separators, &entry);
            let split = insert_into(&mut children[child_idx], entry);
            if let Some(split) = split {
                separators.insert(child_idx, split.separator);
                children.insert(child_idx + 1, split.node);
                if separators.len() > MAX_ENTRIES {
                    let mid = separators.len() / 2;
                    let right_separators = separators.split_off(mid + 1);
                    let up = separators.pop().unwrap();
                    let right_children = children.split_off(mid + 1);
                    Some(Split {
                        separator: up,
                        node: Box::new(Node::Interior {
                            separators: right_separators,
                            children: right_children,
                        }),
                    })
                } else {
                    None
                }
            } else {
                None
            }
        }
    }
}

fn child_index(separators: &[Entry], entry: &Entry) -> usize {
    separators.partition_point(|sep| sep <= entry)
}

fn remove_from(node: &mut Node, key: &[u8], row_id: RowId) -> bool {
    match node {
        Node::Leaf { entries } => {
            if let Some(pos) = entries
                .iter()
                .position(|(k, r)| k.as_slice() == key && *r == row_id)
            {
                entries.remove(pos);
                true
            } else {
                false
            }
        }
        Node::Interior { separators, children } => {
            let probe = (key.to_vec(), row_id);
            let child_idx = child_index(separators, &probe);
            let removed = remove_from(&mut children[child_idx], key, row_id);
            if removed && children[child_idx].is_leaf() && children[child_idx].len() == 0 {
                children.remove(child_idx);
                if child_idx < separators.len() {
                    separators.remove(child_idx);
                } else if !separators.is_empty() {
                    separators.remove(separators.len() - 1);
                }
            }
            removed
        }
    }
}

/// A table's usage map: the set of pages it owns (spec §4.F `USAGE_MAP`).
/// Drives table-scan cursors' page iteration.
#[derive(Debug, Default, Clone)]
pub struct UsageMap {
    pages: Vec<i64>,
}

impl UsageMap {
    /// An empty usage map.
    pub fn new() -> Self {
        UsageMap::default()
    }

    /// Record that this table now owns `page`.
    pub fn add_page(&mut self, page: i64) {
        if !self.pages.contains(&page) {
            self.pages.push(page);
        }
    }

    /// Stop tracking `page` as owned by this table.
    pub fn remove_page(&mut self, page: i64) -> Result<()> {
        let pos = self
            .pages
            .iter()
            .position(|p| *p == page)
            .ok_or_else(|| Error::illegal_state(format!("page {page} not in usage map")))?;
        self.pages.remove(pos);
        Ok(())
    }

    /// Pages owned by this table, in allocation order.
    pub fn pages(&self) -> &[i64] {
        &self.pages
    }
}
