//! FK Enforcer (spec §4.H).
//!
//! Classifies a table's FK-bearing indexes as primary (referenced) or
//! secondary (referencing), partitions the primary side by cascade flag, and
//! drives `addRow`/`updateRow`/`deleteRow` against those classifications. A
//! cascade depth counter, owned by the database handle, prevents re-entrant
//! re-validation while a cascade is in flight.
//!
//! Grounded on the teacher's `table.rs` constraint-checking helpers and the
//! cascading call chains in its `exec.rs` statement execution.

use std::collections::HashMap;

use crate::column::{Index, Table};
use crate::error::{Error, Result};
use crate::row::{Row, Value};

/// Sentinel meaning "leave this secondary column's value unchanged" when
/// composing a cascaded update row (spec §4.H step (c)).
pub const KEEP_VALUE: Value = Value::Null;

/// One primary-cascade FK whose key changed: the primary table's own index
/// (naming, in order, which of `new`'s columns form the key) and the key's
/// new values, for the caller to apply to every secondary row matching the
/// old key via [`compose_cascaded_update_row`].
pub struct CascadedUpdate<'a> {
    pub index: &'a Index,
    pub new_key: Vec<Value>,
}

/// Compose the update row spec §4.H step (c) describes: every column named
/// by `secondary_index`'s columns (the *secondary* table's FK index, whose
/// columns correspond positionally to `cascade.new_key`) is set to the
/// matching new primary-key value; every other column of the secondary row
/// keeps [`KEEP_VALUE`], so the caller applies this row as a sparse patch
/// rather than a full overwrite.
pub fn compose_cascaded_update_row(
    secondary_index: &Index,
    cascade: &CascadedUpdate,
    secondary_column_count: usize,
) -> Row {
    let mut row = Row::new_null(secondary_column_count);
    debug_assert!(
        row.values.iter().all(|v| *v == KEEP_VALUE),
        "a fresh row starts as KEEP_VALUE in every column"
    );
    for (descriptor, value) in secondary_index.columns.iter().zip(&cascade.new_key) {
        row.set(descriptor.column_number as usize, value.clone());
    }
    row
}

/// One FK-bearing index, classified relative to the table it was found on.
pub struct ClassifiedFk<'a> {
    pub index: &'a Index,
    pub cascade_updates: bool,
    pub cascade_deletes: bool,
}

/// The four cascade-flag-partitioned lists spec §4.H names, for the primary
/// side of a table's FKs, plus the secondary-side list (always checked).
pub struct FkEnforcer<'a> {
    schema: &'a HashMap<String, Table>,
    secondary: Vec<ClassifiedFk<'a>>,
    primary_check_update: Vec<ClassifiedFk<'a>>,
    primary_cascade_update: Vec<ClassifiedFk<'a>>,
    primary_check_delete: Vec<ClassifiedFk<'a>>,
    primary_cascade_delete: Vec<ClassifiedFk<'a>>,
}

impl<'a> FkEnforcer<'a> {
    /// Classify `table`'s indexes against the full `schema`. An index with a
    /// `foreign_key.primary_table == Some(_)` is secondary (it references
    /// another table); every other FK index on `table` is primary (other
    /// tables may reference it).
    pub fn classify(table: &'a Table, schema: &'a HashMap<String, Table>) -> Self {
        let mut secondary = Vec::new();
        let mut primary_check_update = Vec::new();
        let mut primary_cascade_update = Vec::new();
        let mut primary_check_delete = Vec::new();
        let mut primary_cascade_delete = Vec::new();

        for index in &table.indexes {
            let Some(fk) = &index.foreign_key else {
                continue;
            };
            let classified = ClassifiedFk {
                index,
                cascade_updates: fk.cascade_updates,
                cascade_deletes: fk.cascade_deletes,
            };
            if fk.primary_table.is_some() {
                secondary.push(classified);
            } else {
                let classified_for_delete = ClassifiedFk {
                    index,
                    cascade_updates: fk.cascade_updates,
                    cascade_deletes: fk.cascade_deletes,
                };
                if fk.cascade_updates {
                    primary_cascade_update.push(classified);
                } else {
                    primary_check_update.push(classified);
                }
                if fk.cascade_deletes {
                    primary_cascade_delete.push(classified_for_delete);
                } else {
                    primary_check_delete.push(classified_for_delete);
                }
            }
        }

        FkEnforcer {
            schema,
            secondary,
            primary_check_update,
            primary_cascade_update,
            primary_check_delete,
            primary_cascade_delete,
        }
    }

    /// For each secondary FK, require the referenced parent row to already
    /// exist. `has_parent_row` is given the primary table name and the
    /// prospective child's key columns, and answers whether a matching
    /// parent row exists.
    pub fn add_row(
        &self,
        row: &Row,
        mut has_parent_row: impl FnMut(&str, &Index) -> bool,
    ) -> Result<()> {
        for fk in &self.secondary {
            let primary_table = fk
                .index
                .foreign_key
                .as_ref()
                .and_then(|f| f.primary_table.as_deref())
                .expect("secondary FK always names its primary table");
            if !has_parent_row(primary_table, fk.index) {
                return Err(Error::constraint_violation(
                    format!(
                        "no matching row in '{primary_table}' for foreign key '{}'",
                        fk.index.name
                    ),
                    row,
                ));
            }
        }
        Ok(())
    }

    /// Primary non-cascade FKs: require no secondary row currently
    /// references `row`'s key (spec §4.H deleteRow, non-cascade half).
    /// Primary cascade FKs are reported back to the caller as
    /// `(index, secondary_table)` pairs whose matching secondary rows must
    /// be deleted by the caller (the actual secondary delete touches pages
    /// this module does not own).
    pub fn delete_row(
        &self,
        row: &Row,
        mut has_referencing_row: impl FnMut(&Index) -> bool,
    ) -> Result<Vec<&Index>> {
        for fk in &self.primary_check_delete {
            if has_referencing_row(fk.index) {
                return Err(Error::constraint_violation(
                    format!(
                        "rows still reference '{}' via a non-cascading foreign key",
                        fk.index.name
                    ),
                    row,
                ));
            }
        }
        Ok(self.primary_cascade_delete.iter().map(|fk| fk.index).collect())
    }

    /// Whether any monitored column of this table's FKs (primary or
    /// secondary) changed between `old` and `new` — the early-exit test of
    /// spec §4.H updateRow (a).
    pub fn any_monitored_column_changed(&self, old: &Row, new: &Row, columns: &[u16]) -> bool {
        columns
            .iter()
            .any(|&c| old.values[c as usize] != new.values[c as usize])
    }

    /// Primary cascade FKs whose columns changed: the indexes whose
    /// secondary rows the caller must rewrite in place, substituting the new
    /// primary key's column values and leaving every other secondary column
    /// untouched (the `KEEP_VALUE` sentinel).
    pub fn cascade_update_targets(&self) -> impl Iterator<Item = &Index> {
        self.primary_cascade_update.iter().map(|fk| fk.index)
    }

    /// Orchestrate spec §4.H's updateRow steps (a)-(d) for this table's FKs.
    ///
    /// (a) Early-exits with no work if no `monitored_columns` entry changed.
    /// (b) At the top of the cascade stack, re-checks this table's own
    /// secondary FKs whose columns changed, via `has_parent_row_for_new`
    /// (same contract as [`Self::add_row`]'s callback).
    /// (c) Enters a cascade depth frame, then checks every primary
    /// non-cascade FK whose own columns changed (requiring no secondary row
    /// references the old key), and composes the cascade instructions for
    /// every primary cascade FK whose own columns changed — the `new_key`
    /// each of the secondary table's matching rows must be updated to via
    /// [`compose_cascaded_update_row`]. FKs on unrelated columns are left
    /// alone entirely, matching spec.md §8's "no column change, no secondary
    /// rows touched" property.
    /// (d) The depth frame pops on every exit path, including the early `?`
    /// returns above, via [`CascadeGuard`]'s `Drop` impl.
    pub fn update_row(
        &self,
        depth: &mut CascadeDepth,
        old: &Row,
        new: &Row,
        monitored_columns: &[u16],
        mut has_parent_row_for_new: impl FnMut(&str, &Index) -> bool,
        mut has_referencing_row_for_old_key: impl FnMut(&Index) -> bool,
    ) -> Result<Vec<CascadedUpdate<'a>>> {
        if !self.any_monitored_column_changed(old, new, monitored_columns) {
            return Ok(Vec::new());
        }

        if depth.is_top_level() {
            for fk in &self.secondary {
                let touches_changed_column = fk
                    .index
                    .columns
                    .iter()
                    .any(|d| monitored_columns.contains(&d.column_number));
                if !touches_changed_column {
                    continue;
                }
                let primary_table = fk
                    .index
                    .foreign_key
                    .as_ref()
                    .and_then(|f| f.primary_table.as_deref())
                    .expect("secondary FK always names its primary table");
                if !has_parent_row_for_new(primary_table, fk.index) {
                    return Err(Error::constraint_violation(
                        format!(
                            "no matching row in '{primary_table}' for foreign key '{}' after update",
                            fk.index.name
                        ),
                        new,
                    ));
                }
            }
        }

        let _guard = CascadeGuard::enter(depth);

        fn touches(fk: &ClassifiedFk<'_>, monitored_columns: &[u16]) -> bool {
            fk.index
                .columns
                .iter()
                .any(|d| monitored_columns.contains(&d.column_number))
        }

        for fk in self
            .primary_check_update
            .iter()
            .filter(|fk| touches(fk, monitored_columns))
        {
            if has_referencing_row_for_old_key(fk.index) {
                return Err(Error::constraint_violation(
                    format!(
                        "rows still reference the old key via non-cascading foreign key '{}'",
                        fk.index.name
                    ),
                    old,
                ));
            }
        }

        Ok(self
            .primary_cascade_update
            .iter()
            .filter(|fk| touches(fk, monitored_columns))
            .map(|fk| CascadedUpdate {
                index: fk.index,
                new_key: fk
                    .index
                    .columns
                    .iter()
                    .map(|d| new.values[d.column_number as usize].clone())
                    .collect(),
            })
            .collect())
    }

    /// Look up a table by name in the schema this enforcer was built
    /// against, used by callers composing cascaded rows.
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.schema.get(name)
    }
}

/// Per-database cascade nesting counter (spec §4.H "Shared state").
/// `is_top_level()` is true only at depth 0 — the frame responsible for the
/// initial re-check of secondary FKs referencing changed columns.
#[derive(Debug, Default)]
pub struct CascadeDepth(u32);

impl CascadeDepth {
    /// A depth counter starting at zero.
    pub fn new() -> Self {
        CascadeDepth(0)
    }

    /// Whether no cascade is currently in flight.
    pub fn is_top_level(&self) -> bool {
        self.0 == 0
    }

    /// Enter a nested cascade frame. Pair with [`Self::exit`], which must
    /// run even if the body fails — callers should use a guard or
    /// `finally`-style pattern, matching spec §4.H "(d) Pop depth on exit
    /// (even on error)".
    pub fn enter(&mut self) {
        self.0 += 1;
    }

    /// Leave a cascade frame entered with [`Self::enter`].
    pub fn exit(&mut self) {
        self.0 = self.0.saturating_sub(1);
    }

    /// Current nesting depth.
    pub fn depth(&self) -> u32 {
        self.0
    }
}

/// RAII guard pairing [`CascadeDepth::enter`]/[`CascadeDepth::exit`] so the
/// depth is popped on every exit path, including an early `?` return.
pub struct CascadeGuard<'a> {
    depth: &'a mut CascadeDepth,
}

impl<'a> CascadeGuard<'a> {
    /// Enter a cascade frame, returning a guard that exits it on drop.
    pub fn enter(depth: &'a mut CascadeDepth) -> Self {
        depth.enter();
        CascadeGuard { depth }
    }
}

impl Drop for CascadeGuard<'_> {
    fn drop(&mut self) {
        self.depth.exit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::{ColumnDescriptor, ForeignKeyRef};

    fn secondary_fk_index(primary_table: &str, cascade_deletes: bool) -> Index {
        Index {
            name: "fk_idx".into(),
            columns: vec![ColumnDescriptor {
                column_number: 0,
                ascending: true,
            }],
            primary_key: false,
            foreign_key: Some(ForeignKeyRef {
                primary_table: Some(primary_table.into()),
                cascade_updates: false,
                cascade_deletes,
            }),
            root_page: 10,
        }
    }

    #[test]
    fn add_row_fails_when_parent_is_missing() {
        let mut t = Table::new("child", 1, 2);
        t.indexes.push(secondary_fk_index("parent", false));
        let schema = HashMap::new();
        let enforcer = FkEnforcer::classify(&t, &schema);
        let row = Row::new_null(1);
        let result = enforcer.add_row(&row, |_table, _idx| false);
        assert!(matches!(result, Err(Error::ConstraintViolation { .. })));
    }

    #[test]
    fn add_row_succeeds_when_parent_exists() {
        let mut t = Table::new("child", 1, 2);
        t.indexes.push(secondary_fk_index("parent", false));
        let schema = HashMap::new();
        let enforcer = FkEnforcer::classify(&t, &schema);
        let row = Row::new_null(1);
        assert!(enforcer.add_row(&row, |_table, _idx| true).is_ok());
    }

    #[test]
    fn cascade_depth_tracks_top_level_and_pops_on_drop() {
        let mut depth = CascadeDepth::new();
        assert!(depth.is_top_level());
        {
            let _guard = CascadeGuard::enter(&mut depth);
        }
        assert!(depth.is_top_level(), "guard pops depth on drop");
    }

    fn primary_pk_index(cascade_updates: bool) -> Index {
        Index {
            name: "pk_parent".into(),
            columns: vec![ColumnDescriptor {
                column_number: 0,
                ascending: true,
            }],
            primary_key: true,
            foreign_key: Some(ForeignKeyRef {
                primary_table: None,
                cascade_updates,
                cascade_deletes: false,
            }),
            root_page: 10,
        }
    }

    #[test]
    fn update_row_composes_cascade_for_changed_primary_key() {
        let mut parent = Table::new("Parent", 1, 2);
        parent.columns.push(crate::column::Column {
            name: "id".into(),
            column_number: 0,
            column_type: crate::column::ColumnType::Long,
            sort_order: None,
            precision: 0,
            scale: 0,
            length: 4,
            flags: Default::default(),
        });
        parent.indexes.push(primary_pk_index(true));

        let schema = HashMap::new();
        let enforcer = FkEnforcer::classify(&parent, &schema);

        let mut old = Row::new_null(1);
        old.set(0, Value::Long(1));
        let mut new = Row::new_null(1);
        new.set(0, Value::Long(2));

        let mut depth = CascadeDepth::new();
        let cascades = enforcer
            .update_row(&mut depth, &old, &new, &[0], |_, _| true, |_| false)
            .unwrap();
        assert!(depth.is_top_level(), "guard pops depth once update_row returns");
        assert_eq!(cascades.len(), 1);
        assert_eq!(cascades[0].new_key, vec![Value::Long(2)]);

        // Child(name, pid) where pid (column 1) references Parent.id.
        let child_fk_index = secondary_fk_index("Parent", false);
        let mut child_fk_index = child_fk_index;
        child_fk_index.columns[0].column_number = 1;

        let patch = compose_cascaded_update_row(&child_fk_index, &cascades[0], 2);
        assert_eq!(patch.values[0], KEEP_VALUE, "untouched column keeps the sentinel");
        assert_eq!(patch.values[1], Value::Long(2), "fk column takes the new primary key");
    }

    #[test]
    fn update_row_is_a_no_op_when_no_monitored_column_changed() {
        let mut parent = Table::new("Parent", 1, 2);
        parent.indexes.push(primary_pk_index(true));
        let schema = HashMap::new();
        let enforcer = FkEnforcer::classify(&parent, &schema);

        let old = Row::new_null(1);
        let new = Row::new_null(1);
        let mut depth = CascadeDepth::new();
        let cascades = enforcer
            .update_row(&mut depth, &old, &new, &[0], |_, _| panic!("should not be called"), |_| panic!("should not be called"))
            .unwrap();
        assert!(cascades.is_empty());
    }

    #[test]
    fn update_row_rejects_non_cascade_fk_with_live_reference_to_old_key() {
        let mut parent = Table::new("Parent", 1, 2);
        parent.indexes.push(primary_pk_index(false));
        let schema = HashMap::new();
        let enforcer = FkEnforcer::classify(&parent, &schema);

        let mut old = Row::new_null(1);
        old.set(0, Value::Long(1));
        let mut new = Row::new_null(1);
        new.set(0, Value::Long(2));

        let mut depth = CascadeDepth::new();
        let result = enforcer.update_row(&mut depth, &old, &new, &[0], |_, _| true, |_| true);
        assert!(matches!(result, Err(Error::ConstraintViolation { .. })));
        assert!(depth.is_top_level(), "guard pops depth even on the error path");
    }

    #[test]
    fn update_row_ignores_fks_on_columns_that_did_not_change() {
        // Parent(id @0 non-cascade PK FK referenced elsewhere, name @1).
        // Only `name` (column 1) changes; `id` (column 0) never does, so the
        // FK on `id` must not be checked even though a live reference exists.
        let mut parent = Table::new("Parent", 1, 2);
        parent.indexes.push(primary_pk_index(false));

        let schema = HashMap::new();
        let enforcer = FkEnforcer::classify(&parent, &schema);

        let mut old = Row::new_null(2);
        old.set(0, Value::Long(1));
        old.set(1, Value::Text("a".into()));
        let mut new = Row::new_null(2);
        new.set(0, Value::Long(1));
        new.set(1, Value::Text("b".into()));

        let mut depth = CascadeDepth::new();
        let cascades = enforcer
            .update_row(
                &mut depth,
                &old,
                &new,
                &[1],
                |_, _| true,
                |_| panic!("id's FK must not be re-checked when id itself did not change"),
            )
            .unwrap();
        assert!(cascades.is_empty(), "id's cascade FK is unrelated to the changed column");
    }
}
