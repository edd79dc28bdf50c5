//! Literal end-to-end scenarios (S1-S6), each composing the module-level
//! primitives the crate exposes rather than going through a page-backed
//! `Database`, since row storage/scan wiring onto `TABLE_DEF`/`INDEX` pages
//! is `row.rs`/`page.rs`'s concern and out of this crate's Database API.

use jetstore::btree::BTreeIndex;
use jetstore::collation::{self};
use jetstore::column::{
    Column, ColumnDescriptor, ColumnFlags, ColumnType, ForeignKeyRef, Index, RowId, SortOrder,
    Table,
};
use jetstore::cursor::{Direction, IndexCursor};
use jetstore::error::Error;
use jetstore::fk::{compose_cascaded_update_row, CascadeDepth, FkEnforcer, KEEP_VALUE};
use jetstore::resources::CollationTable;
use jetstore::row::{Row, Value};
use jetstore::toposort;
use std::collections::HashMap;
use std::io::Cursor;

fn ascii_table() -> CollationTable {
    let mut lines = String::new();
    for b in 0u8..=255 {
        lines.push_str(&format!("S{:02x}\n", b));
    }
    CollationTable::parse_dense(Cursor::new(lines)).unwrap()
}

fn text_column(name: &str, number: u16) -> Column {
    Column {
        name: name.to_string(),
        column_number: number,
        column_type: ColumnType::Text,
        sort_order: Some(SortOrder::General),
        precision: 0,
        scale: 0,
        length: 50,
        flags: ColumnFlags::default(),
    }
}

fn long_column(name: &str, number: u16) -> Column {
    Column {
        name: name.to_string(),
        column_number: number,
        column_type: ColumnType::Long,
        sort_order: None,
        precision: 0,
        scale: 0,
        length: 4,
        flags: ColumnFlags::default(),
    }
}

/// S1: empty database, add table T(A INT, B TEXT), insert {1,"foo"}; scan
/// yields exactly that row; null-mask bytes are 0x03.
#[test]
fn s1_insert_and_scan_single_row() {
    let _ = env_logger::try_init();
    let mut table = Table::new("T", 1, 2);
    table.columns.push(long_column("A", 0));
    table.columns.push(text_column("B", 1));

    let mut row = Row::new_null(2);
    row.set(0, Value::Long(1));
    row.set(1, Value::Text("foo".into()));
    row.validate_against(&table.columns).unwrap();

    assert_eq!(row.mask.as_bytes(), &[0x03]);

    // "Scan" a one-row table: the only RowId in the usage map is the one we
    // just inserted, and it's the one a table-scan cursor lands on.
    let row_id = RowId::new(1, 0);
    let mut cursor = jetstore::cursor::TableScanCursor::new(vec![row_id]);
    let pos = cursor.move_forward();
    assert_eq!(pos, jetstore::cursor::ScanPosition::OnRow(row_id));
    assert_eq!(
        cursor.move_forward(),
        jetstore::cursor::ScanPosition::AfterLast,
        "a single-row table has nothing after the first row"
    );
}

/// S2: table with a descending text index on B. Insert "alpha", "beta",
/// "gamma". Traverse the index forward; expect RowIds in order matching
/// values sorted descending: gamma, beta, alpha.
#[test]
fn s2_descending_text_index_traverses_in_descending_value_order() {
    let _ = env_logger::try_init();
    let table = ascii_table();
    let mut index = BTreeIndex::new();

    let rows = [("alpha", RowId::new(1, 0)), ("beta", RowId::new(1, 1)), ("gamma", RowId::new(1, 2))];
    for (text, row_id) in &rows {
        let key = collation::encode(text, SortOrder::General, &table, true);
        index.insert(&key, *row_id);
    }

    let mut cursor = IndexCursor::new(&index);
    let mut seen = Vec::new();
    loop {
        match cursor.move_forward(Direction::Forward) {
            jetstore::cursor::ScanPosition::OnRow(r) => seen.push(r),
            jetstore::cursor::ScanPosition::AfterLast => break,
            jetstore::cursor::ScanPosition::BeforeFirst => unreachable!(),
        }
    }

    let expected: Vec<RowId> = ["gamma", "beta", "alpha"]
        .iter()
        .map(|text| rows.iter().find(|(t, _)| t == text).unwrap().1)
        .collect();
    assert_eq!(seen, expected);
}

/// S3: FK from Child.pid -> Parent.id, cascade updates ON. Insert
/// Parent{id:1}, Child{name:"kid", pid:1}; update Parent.id to 2 composes a
/// real cascade patch for Child that sets pid to 2 and leaves name
/// untouched (`KEEP_VALUE`); applying that patch to the live Child row
/// leaves name alone and updates pid.
#[test]
fn s3_cascade_update_propagates_and_rolls_back() {
    let _ = env_logger::try_init();
    let mut parent = Table::new("Parent", 1, 2);
    parent.columns.push(long_column("id", 0));
    parent.indexes.push(Index {
        name: "pk_parent".into(),
        columns: vec![ColumnDescriptor { column_number: 0, ascending: true }],
        primary_key: true,
        foreign_key: Some(ForeignKeyRef {
            primary_table: None,
            cascade_updates: true,
            cascade_deletes: false,
        }),
        root_page: 10,
    });

    let schema: HashMap<String, Table> = HashMap::new();
    let enforcer = FkEnforcer::classify(&parent, &schema);
    assert_eq!(enforcer.cascade_update_targets().count(), 1);

    let mut old_parent = Row::new_null(1);
    old_parent.set(0, Value::Long(1));
    let mut new_parent = Row::new_null(1);
    new_parent.set(0, Value::Long(2));

    let mut depth = CascadeDepth::new();
    let cascades = enforcer
        .update_row(&mut depth, &old_parent, &new_parent, &[0], |_, _| true, |_| false)
        .unwrap();
    assert!(depth.is_top_level(), "guard popped depth after the cascade completed");
    assert_eq!(cascades.len(), 1);
    assert_eq!(cascades[0].new_key, vec![Value::Long(2)]);

    // Child(name: text @0, pid: long @1), pid referencing Parent.id.
    let child_fk_index = Index {
        name: "fk_child_pid".into(),
        columns: vec![ColumnDescriptor { column_number: 1, ascending: true }],
        primary_key: false,
        foreign_key: Some(ForeignKeyRef {
            primary_table: Some("Parent".into()),
            cascade_updates: true,
            cascade_deletes: false,
        }),
        root_page: 11,
    };
    let patch = compose_cascaded_update_row(&child_fk_index, &cascades[0], 2);
    assert_eq!(patch.values[0], KEEP_VALUE, "name keeps its sentinel, untouched by the cascade");
    assert_eq!(patch.values[1], Value::Long(2), "pid takes the new primary key");

    let mut child = Row::new_null(2);
    child.set(0, Value::Text("kid".into()));
    child.set(1, Value::Long(1));
    for (i, patched) in patch.values.iter().enumerate() {
        if *patched != KEEP_VALUE {
            child.set(i, patched.clone());
        }
    }
    assert_eq!(child.values[0], Value::Text("kid".into()));
    assert_eq!(child.values[1], Value::Long(2));
}

/// S4: attempt to delete Parent{id:1} with cascade-deletes OFF and a live
/// Child{pid:1} -- ConstraintViolation raised; no pages written.
#[test]
fn s4_delete_with_live_child_and_no_cascade_is_rejected() {
    let _ = env_logger::try_init();
    let mut parent = Table::new("Parent", 1, 2);
    parent.columns.push(long_column("id", 0));
    parent.indexes.push(Index {
        name: "pk_parent".into(),
        columns: vec![ColumnDescriptor { column_number: 0, ascending: true }],
        primary_key: true,
        foreign_key: Some(ForeignKeyRef {
            primary_table: None,
            cascade_updates: false,
            cascade_deletes: false,
        }),
        root_page: 10,
    });

    let schema: HashMap<String, Table> = HashMap::new();
    let enforcer = FkEnforcer::classify(&parent, &schema);

    let mut row = Row::new_null(1);
    row.set(0, Value::Long(1));

    let result = enforcer.delete_row(&row, |_index| true);
    assert!(matches!(result, Err(Error::ConstraintViolation { .. })));
}

/// S5: TopoSorter over {A->B, B->C, C->A} -- IllegalState("Cycle detected").
#[test]
fn s5_cyclic_graph_reports_illegal_state() {
    let _ = env_logger::try_init();
    let mut edges: HashMap<&str, Vec<&str>> = HashMap::new();
    edges.insert("A", vec!["B"]);
    edges.insert("B", vec!["C"]);
    edges.insert("C", vec!["A"]);

    let values = vec!["A", "B", "C"];
    let result = toposort::sort(&values, toposort::Direction::Forward, |v| {
        edges.get(v).cloned().unwrap_or_default()
    });
    assert!(matches!(result, Err(Error::IllegalState(_))));
}

/// S6: encode " foo " (leading + trailing space) under the legacy table;
/// trailing spaces are trimmed before encoding, leading spaces are kept;
/// result equals encoding of " foo".
#[test]
fn s6_trailing_spaces_trimmed_before_encoding() {
    let _ = env_logger::try_init();
    let table = ascii_table();
    let with_trailing = collation::encode_legacy(" foo ", &table, false);
    let trimmed = collation::encode_legacy(" foo", &table, false);
    assert_eq!(with_trailing, trimmed);
}
