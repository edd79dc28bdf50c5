//! Topological Sorter (spec §4.J): generic three-colour DFS.
//!
//! Grounded in shape on the teacher's small self-contained utility modules
//! (`util.rs`'s `SmallSet`) and, for the colour-marking idiom itself, on the
//! dependency-ordering code in the example pack's `other_examples` sweep.
//! Used by `mutator.rs` to order FK-dependent table rewrites and by `fk.rs`
//! to order cascades.

use std::collections::HashMap;
use std::hash::Hash;

use crate::error::{Error, Result};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unmarked,
    Temporary,
    Permanent,
}

/// Sort direction: descendants-first (`Forward`) or ancestors-first
/// (`Reverse`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Output order has each value's descendants appear before it.
    Forward,
    /// Output order has each value's descendants appear after it.
    Reverse,
}

/// Topologically sort `values` by the relation `get_descendants` describes,
/// in `direction` order. `get_descendants(v)` returns the values `v` depends
/// on (its descendants in the dependency DAG).
///
/// Fails with [`Error::IllegalState`] if the relation contains a cycle.
pub fn sort<T, F>(values: &[T], direction: Direction, mut get_descendants: F) -> Result<Vec<T>>
where
    T: Clone + Eq + Hash,
    F: FnMut(&T) -> Vec<T>,
{
    let mut marks: HashMap<T, Mark> = HashMap::new();
    let mut out = Vec::with_capacity(values.len());

    for v in values {
        marks.entry(v.clone()).or_insert(Mark::Unmarked);
    }

    for v in values {
        visit(v, &mut marks, &mut get_descendants, &mut out)?;
    }

    if direction == Direction::Reverse {
        out.reverse();
    }
    Ok(out)
}

fn visit<T, F>(
    v: &T,
    marks: &mut HashMap<T, Mark>,
    get_descendants: &mut F,
    out: &mut Vec<T>,
) -> Result<()>
where
    T: Clone + Eq + Hash,
    F: FnMut(&T) -> Vec<T>,
{
    match marks.get(v).copied().unwrap_or(Mark::Unmarked) {
        Mark::Permanent => return Ok(()),
        Mark::Temporary => {
            return Err(Error::illegal_state("cycle detected during topological sort"))
        }
        Mark::Unmarked => {}
    }
    marks.insert(v.clone(), Mark::Temporary);
    for d in get_descendants(v) {
        visit(&d, marks, get_descendants, out)?;
    }
    marks.insert(v.clone(), Mark::Permanent);
    out.push(v.clone());
    Ok(())
}
