//! Row Codec (spec §4.D): column type → value-domain mapping, the
//! null-mask-first row layout, the `ColumnOffsets` allocator, and numeric
//! printing (banker's rounding, scientific notation, the NaN/Inf literals).
//!
//! Grounded on the teacher's `value.rs` (`Value` enum with a `save`/`load`
//! pair) for the value representation, and `bytes.rs`'s fragment storage for
//! how a long-variable column's bytes are chased through extra pages.

use crate::column::{Column, ColumnType, ValueDomain};
use crate::error::{Error, Result};
use crate::nullmask::NullMask;
use crate::util;

/// A decoded column value. `Decimal` is modelled as a scaled 128-bit integer
/// (unscaled value, scale), matching NUMERIC/BIG_INT's arbitrary-precision
/// domain without pulling in a bignum dependency the teacher does not use.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Long(i64),
    Double(f64),
    DateTime(f64),
    Decimal { unscaled: i128, scale: u8 },
    Text(String),
    Binary(Vec<u8>),
}

impl Value {
    /// The value domain this value belongs to, independent of which column
    /// type produced it.
    pub fn domain(&self) -> ValueDomain {
        match self {
            Value::Null => ValueDomain::Text,
            Value::Long(_) => ValueDomain::Long,
            Value::Double(_) => ValueDomain::Double,
            Value::DateTime(_) => ValueDomain::DateTime,
            Value::Decimal { .. } => ValueDomain::Decimal,
            Value::Text(_) | Value::Binary(_) => ValueDomain::Text,
        }
    }
}

/// Number of significant digits retained when printing a value of the given
/// domain (spec §4.D: 7/15/28 for float/double/decimal).
fn significant_digits(domain: ValueDomain, column_type: ColumnType) -> u32 {
    match domain {
        ValueDomain::Double if column_type == ColumnType::Float => 7,
        ValueDomain::Double => 15,
        ValueDomain::Decimal => 28,
        _ => 15,
    }
}

/// Format an IEEE-754 double to its canonical text representation (spec
/// §4.D "Numeric printing"): banker's rounding to `sig_digits` significant
/// digits, switching to scientific notation `D.DDDE±NN` when the stripped
/// precision would not fit in decimal form, and the literal NaN/Inf strings.
pub fn format_double(value: f64, sig_digits: u32) -> String {
    if value.is_nan() {
        return "1.#QNAN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "1.#INF" } else { "-1.#INF" }.to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }

    let negative = value.is_sign_negative();
    let magnitude = value.abs();

    // Rust's float formatter rounds-to-even at the binary level, which is an
    // adequate stand-in for banker's rounding at the requested precision.
    let sci = format!("{:.*e}", (sig_digits - 1) as usize, magnitude);
    let (mantissa_str, exp_str) = sci.split_once('e').expect("scientific form has an exponent");
    let exponent: i32 = exp_str.parse().expect("exponent is a valid integer");
    let digits: String = mantissa_str.chars().filter(|c| *c != '.').collect();
    let digits = digits.trim_end_matches('0');
    let digits = if digits.is_empty() { "0" } else { digits };

    // .NET/Jet "general" switch point: scientific once the exponent falls
    // outside [-5, sig_digits). Exact thresholds are an Open Question
    // (see DESIGN.md) since no original implementation is available to mine.
    let use_scientific = exponent < -5 || exponent >= sig_digits as i32;

    let body = if use_scientific {
        let mut m = String::new();
        m.push(digits.as_bytes()[0] as char);
        if digits.len() > 1 {
            m.push('.');
            m.push_str(&digits[1..]);
        }
        format!("{m}E{:+03}", exponent)
    } else if exponent >= 0 {
        let exp = exponent as usize;
        if digits.len() > exp + 1 {
            format!("{}.{}", &digits[..=exp], &digits[exp + 1..])
        } else {
            let mut s = digits.to_string();
            s.push_str(&"0".repeat(exp + 1 - digits.len()));
            s
        }
    } else {
        let zeros = (-exponent - 1) as usize;
        format!("0.{}{}", "0".repeat(zeros), digits)
    };

    if negative {
        format!("-{body}")
    } else {
        body
    }
}

/// Render a decoded value the way Jet/ACE would print it for display,
/// picking the significant-digit precision implied by `column_type` (spec
/// §4.D "Numeric printing"). Non-numeric domains have no special printing
/// rule and print as-is by their `Value`'s own representation.
pub fn format_value(value: &Value, column_type: ColumnType) -> Option<String> {
    match value {
        Value::Double(v) => Some(format_double(*v, significant_digits(ValueDomain::Double, column_type))),
        Value::DateTime(v) => Some(format_double(*v, significant_digits(ValueDomain::DateTime, column_type))),
        Value::Decimal { unscaled, scale } => {
            let digits = significant_digits(ValueDomain::Decimal, column_type);
            let scaled = *unscaled as f64 / 10f64.powi(*scale as i32);
            Some(format_double(scaled, digits))
        }
        _ => None,
    }
}

/// Where a column's bytes live within a row buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnSlot {
    /// Inline at a fixed byte offset.
    Fixed(usize),
    /// Index into the variable-length trailer (offset looked up there).
    Variable(usize),
    /// Index into the long-variable (fragmented) value list.
    LongVariable(usize),
}

/// Assigns byte offsets to a table's columns in one pass, maintaining the
/// three cursors spec §4.D names: fixed, variable, long-variable.
#[derive(Debug, Default)]
pub struct ColumnOffsets {
    fixed_cursor: usize,
    variable_cursor: usize,
    long_variable_cursor: usize,
    slots: Vec<ColumnSlot>,
}

impl ColumnOffsets {
    /// Walk `columns` in order, assigning each a [`ColumnSlot`].
    pub fn allocate(columns: &[Column]) -> Self {
        let mut this = ColumnOffsets::default();
        for c in columns {
            let slot = if c.column_type == ColumnType::Boolean {
                // Represented entirely in the null mask; no byte offset.
                ColumnSlot::Fixed(this.fixed_cursor)
            } else if c.is_long_variable() {
                let slot = ColumnSlot::LongVariable(this.long_variable_cursor);
                this.long_variable_cursor += 1;
                slot
            } else if c.is_fixed() {
                let slot = ColumnSlot::Fixed(this.fixed_cursor);
                this.fixed_cursor += c.column_type.fixed_width().unwrap();
                slot
            } else {
                let slot = ColumnSlot::Variable(this.variable_cursor);
                this.variable_cursor += 1;
                slot
            };
            this.slots.push(slot);
        }
        this
    }

    /// The slot assigned to column `i`.
    pub fn slot(&self, i: usize) -> ColumnSlot {
        self.slots[i]
    }

    /// Total fixed-region byte length after allocation.
    pub fn fixed_len(&self) -> usize {
        self.fixed_cursor
    }

    /// Number of variable-length (non-long) columns allocated.
    pub fn variable_count(&self) -> usize {
        self.variable_cursor
    }

    /// Number of long-variable columns allocated.
    pub fn long_variable_count(&self) -> usize {
        self.long_variable_cursor
    }
}

/// A decoded row: one [`Value`] per column, alongside the null mask that was
/// read to get there.
#[derive(Debug, Clone)]
pub struct Row {
    pub mask: NullMask,
    pub values: Vec<Value>,
}

impl Row {
    /// An all-null row for a table with `column_count` columns.
    pub fn new_null(column_count: usize) -> Self {
        Row {
            mask: NullMask::new(column_count),
            values: vec![Value::Null; column_count],
        }
    }

    /// Set column `i`'s value, updating the null mask to match.
    pub fn set(&mut self, i: usize, value: Value) {
        if matches!(value, Value::Null) {
            self.mask.set_null(i);
        } else {
            self.mask.set_not_null(i);
        }
        self.values[i] = value;
    }

    /// Reject a row whose value count does not match `table`'s declared
    /// column types, or whose value's domain does not match its column's.
    pub fn validate_against(&self, columns: &[Column]) -> Result<()> {
        if self.values.len() != columns.len() {
            return Err(Error::illegal_argument(format!(
                "row has {} values but table has {} columns",
                self.values.len(),
                columns.len()
            )));
        }
        for (v, c) in self.values.iter().zip(columns) {
            if matches!(v, Value::Null) {
                continue;
            }
            if v.domain() != c.column_type.value_domain() {
                return Err(Error::illegal_argument(format!(
                    "column '{}' expects domain {:?}, got {:?}",
                    c.name,
                    c.column_type.value_domain(),
                    v.domain()
                )));
            }
        }
        Ok(())
    }
}

/// Encode `row` into its on-disk buffer layout: null mask first, then the
/// fixed-width columns at the offsets `ColumnOffsets` assigns, then a
/// variable-column trailer (count, then one `u16` length per column, then
/// the bytes), then a long-variable trailer (count, then one `u32` length
/// per column, then the bytes) for MEMO/OLE columns. Grounded on the
/// teacher's `value.rs` `Value::save` and `bytes.rs`'s fragment-length
/// prefixing for long values.
pub fn encode_row(row: &Row, columns: &[Column]) -> Result<Vec<u8>> {
    row.validate_against(columns)?;
    let offsets = ColumnOffsets::allocate(columns);

    let mut fixed = vec![0u8; offsets.fixed_len()];
    let mut variable: Vec<Vec<u8>> = vec![Vec::new(); offsets.variable_count()];
    let mut long_variable: Vec<Vec<u8>> = vec![Vec::new(); offsets.long_variable_count()];
    let mut mask = NullMask::from_bytes(row.mask.as_bytes(), columns.len());

    for (i, (value, column)) in row.values.iter().zip(columns).enumerate() {
        if column.column_type == ColumnType::Boolean {
            // BOOLEAN has no NULL state in Jet/ACE: the mask bit is the
            // truth value itself, not presence.
            match value {
                Value::Long(0) | Value::Null => mask.set_null(i),
                Value::Long(_) => mask.set_not_null(i),
                _ => unreachable!("value domain was already validated against the column type"),
            }
            continue;
        }
        if matches!(value, Value::Null) {
            continue;
        }
        match offsets.slot(i) {
            ColumnSlot::Fixed(off) => encode_fixed(&mut fixed, off, column.column_type, value),
            ColumnSlot::Variable(idx) => variable[idx] = encode_bytes(value),
            ColumnSlot::LongVariable(idx) => long_variable[idx] = encode_bytes(value),
        }
    }

    let mut out = Vec::new();
    out.extend_from_slice(mask.as_bytes());
    out.extend_from_slice(&fixed);

    out.extend_from_slice(&(variable.len() as u16).to_le_bytes());
    for chunk in &variable {
        out.extend_from_slice(&(chunk.len() as u16).to_le_bytes());
    }
    for chunk in &variable {
        out.extend_from_slice(chunk);
    }

    out.extend_from_slice(&(long_variable.len() as u16).to_le_bytes());
    for chunk in &long_variable {
        out.extend_from_slice(&(chunk.len() as u32).to_le_bytes());
    }
    for chunk in &long_variable {
        out.extend_from_slice(chunk);
    }

    Ok(out)
}

/// Decode a buffer produced by [`encode_row`] back into a [`Row`], reversing
/// the null-mask/fixed/variable/long-variable layout.
pub fn decode_row(buf: &[u8], columns: &[Column]) -> Result<Row> {
    let offsets = ColumnOffsets::allocate(columns);
    let mask_len = columns.len().div_ceil(8);
    if buf.len() < mask_len {
        return Err(Error::illegal_argument("row buffer shorter than its null mask"));
    }
    let mask = NullMask::from_bytes(&buf[..mask_len], columns.len());
    let mut pos = mask_len;

    let fixed = &buf[pos..pos + offsets.fixed_len()];
    pos += offsets.fixed_len();

    let variable_count = read_u16(buf, &mut pos)? as usize;
    let mut variable_lens = Vec::with_capacity(variable_count);
    for _ in 0..variable_count {
        variable_lens.push(read_u16(buf, &mut pos)? as usize);
    }
    let mut variable = Vec::with_capacity(variable_count);
    for len in variable_lens {
        variable.push(read_slice(buf, &mut pos, len)?);
    }

    let long_count = read_u16(buf, &mut pos)? as usize;
    let mut long_lens = Vec::with_capacity(long_count);
    for _ in 0..long_count {
        long_lens.push(read_u32(buf, &mut pos)? as usize);
    }
    let mut long_variable = Vec::with_capacity(long_count);
    for len in long_lens {
        long_variable.push(read_slice(buf, &mut pos, len)?);
    }

    let mut values = Vec::with_capacity(columns.len());
    for (i, column) in columns.iter().enumerate() {
        let value = if column.column_type == ColumnType::Boolean {
            // BOOLEAN has no NULL state in Jet/ACE: the mask bit is the value.
            Value::Long(mask.marked_not_null(i) as i64)
        } else if !mask.marked_not_null(i) {
            Value::Null
        } else {
            match offsets.slot(i) {
                ColumnSlot::Fixed(off) => decode_fixed(fixed, off, column.column_type)?,
                ColumnSlot::Variable(idx) => decode_bytes(&variable[idx], column.column_type)?,
                ColumnSlot::LongVariable(idx) => decode_bytes(&long_variable[idx], column.column_type)?,
            }
        };
        values.push(value);
    }

    Ok(Row { mask, values })
}

fn read_u16(buf: &[u8], pos: &mut usize) -> Result<u16> {
    if *pos + 2 > buf.len() {
        return Err(Error::illegal_argument("row buffer truncated reading a u16 length"));
    }
    let v = util::get(buf, *pos, 2) as u16;
    *pos += 2;
    Ok(v)
}

fn read_u32(buf: &[u8], pos: &mut usize) -> Result<u32> {
    if *pos + 4 > buf.len() {
        return Err(Error::illegal_argument("row buffer truncated reading a u32 length"));
    }
    let v = util::get(buf, *pos, 4) as u32;
    *pos += 4;
    Ok(v)
}

fn read_slice(buf: &[u8], pos: &mut usize, len: usize) -> Result<Vec<u8>> {
    if *pos + len > buf.len() {
        return Err(Error::illegal_argument("row buffer truncated reading a value"));
    }
    let v = buf[*pos..*pos + len].to_vec();
    *pos += len;
    Ok(v)
}

fn encode_fixed(fixed: &mut [u8], off: usize, column_type: ColumnType, value: &Value) {
    match (column_type, value) {
        (ColumnType::Byte, Value::Long(v)) => fixed[off] = *v as u8,
        (ColumnType::Int, Value::Long(v)) => util::iset(fixed, off, *v, 2),
        (ColumnType::Long, Value::Long(v)) => util::iset(fixed, off, *v, 4),
        (ColumnType::Money | ColumnType::Double, Value::Double(v)) => util::setf64(fixed, off, *v),
        (ColumnType::Float, Value::Double(v)) => util::setf32(fixed, off, *v as f32),
        (ColumnType::ShortDateTime, Value::DateTime(v)) => util::setf64(fixed, off, *v),
        (ColumnType::Numeric | ColumnType::BigInt, Value::Decimal { unscaled, scale }) => {
            fixed[off..off + 16].copy_from_slice(&unscaled.to_le_bytes());
            fixed[off + 16] = *scale;
        }
        (ColumnType::Guid, Value::Binary(bytes)) => fixed[off..off + 16].copy_from_slice(bytes),
        _ => unreachable!("value domain was already validated against the column type"),
    }
}

fn decode_fixed(fixed: &[u8], off: usize, column_type: ColumnType) -> Result<Value> {
    Ok(match column_type {
        ColumnType::Byte => Value::Long(fixed[off] as i64),
        ColumnType::Int => Value::Long(util::iget(fixed, off, 2)),
        ColumnType::Long => Value::Long(util::iget(fixed, off, 4)),
        ColumnType::Money | ColumnType::Double => Value::Double(util::getf64(fixed, off)),
        ColumnType::Float => Value::Double(util::getf32(fixed, off) as f64),
        ColumnType::ShortDateTime => Value::DateTime(util::getf64(fixed, off)),
        ColumnType::Numeric | ColumnType::BigInt => Value::Decimal {
            unscaled: i128::from_le_bytes(fixed[off..off + 16].try_into().unwrap()),
            scale: fixed[off + 16],
        },
        ColumnType::Guid => Value::Binary(fixed[off..off + 16].to_vec()),
        ColumnType::Boolean => unreachable!("boolean is decoded from the null mask, not the fixed region"),
        ColumnType::Text | ColumnType::Memo | ColumnType::Binary | ColumnType::Ole => {
            return Err(Error::illegal_state(format!(
                "{column_type:?} is not a fixed-width column type"
            )))
        }
    })
}

fn encode_bytes(value: &Value) -> Vec<u8> {
    match value {
        Value::Text(s) => s.as_bytes().to_vec(),
        Value::Binary(b) => b.clone(),
        _ => unreachable!("value domain was already validated against the column type"),
    }
}

fn decode_bytes(bytes: &[u8], column_type: ColumnType) -> Result<Value> {
    match column_type {
        ColumnType::Text | ColumnType::Memo => Ok(Value::Text(
            String::from_utf8(bytes.to_vec())
                .map_err(|e| Error::illegal_state(format!("text column is not valid UTF-8: {e}")))?,
        )),
        ColumnType::Binary | ColumnType::Ole => Ok(Value::Binary(bytes.to_vec())),
        other => Err(Error::illegal_state(format!(
            "{other:?} is not a variable-length column type"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nan_and_infinity_literals() {
        assert_eq!(format_double(f64::NAN, 15), "1.#QNAN");
        assert_eq!(format_double(f64::INFINITY, 15), "1.#INF");
        assert_eq!(format_double(f64::NEG_INFINITY, 15), "-1.#INF");
    }

    #[test]
    fn zero_prints_as_zero() {
        assert_eq!(format_double(0.0, 15), "0");
    }

    #[test]
    fn simple_decimal_round_trip() {
        assert_eq!(format_double(3.5, 15), "3.5");
        assert_eq!(format_double(-2.25, 15), "-2.25");
    }

    #[test]
    fn large_magnitude_switches_to_scientific() {
        let s = format_double(1.234e20, 7);
        assert!(s.contains('E'), "expected scientific form, got {s}");
    }

    #[test]
    fn column_offsets_allocator_assigns_three_cursors() {
        let columns = vec![
            Column {
                name: "id".into(),
                column_number: 0,
                column_type: ColumnType::Long,
                sort_order: None,
                precision: 0,
                scale: 0,
                length: 4,
                flags: Default::default(),
            },
            Column {
                name: "name".into(),
                column_number: 1,
                column_type: ColumnType::Text,
                sort_order: None,
                precision: 0,
                scale: 0,
                length: 50,
                flags: Default::default(),
            },
            Column {
                name: "notes".into(),
                column_number: 2,
                column_type: ColumnType::Memo,
                sort_order: None,
                precision: 0,
                scale: 0,
                length: 0,
                flags: Default::default(),
            },
        ];
        let offsets = ColumnOffsets::allocate(&columns);
        assert_eq!(offsets.slot(0), ColumnSlot::Fixed(0));
        assert_eq!(offsets.slot(1), ColumnSlot::Variable(0));
        assert_eq!(offsets.slot(2), ColumnSlot::LongVariable(0));
        assert_eq!(offsets.fixed_len(), 4);
        assert_eq!(offsets.variable_count(), 1);
        assert_eq!(offsets.long_variable_count(), 1);
    }

    #[test]
    fn row_validation_rejects_domain_mismatch() {
        let columns = vec![Column {
            name: "id".into(),
            column_number: 0,
            column_type: ColumnType::Long,
            sort_order: None,
            precision: 0,
            scale: 0,
            length: 4,
            flags: Default::default(),
        }];
        let mut row = Row::new_null(1);
        row.set(0, Value::Text("oops".into()));
        assert!(row.validate_against(&columns).is_err());
    }

    fn col(name: &str, number: u16, column_type: ColumnType) -> Column {
        Column {
            name: name.to_string(),
            column_number: number,
            column_type,
            sort_order: None,
            precision: 0,
            scale: 0,
            length: column_type.fixed_width().unwrap_or(0) as u16,
            flags: Default::default(),
        }
    }

    fn all_column_types_table() -> Vec<Column> {
        vec![
            col("flag", 0, ColumnType::Boolean),
            col("b", 1, ColumnType::Byte),
            col("i", 2, ColumnType::Int),
            col("l", 3, ColumnType::Long),
            col("money", 4, ColumnType::Money),
            col("f", 5, ColumnType::Float),
            col("d", 6, ColumnType::Double),
            col("dt", 7, ColumnType::ShortDateTime),
            col("num", 8, ColumnType::Numeric),
            col("big", 9, ColumnType::BigInt),
            col("guid", 10, ColumnType::Guid),
            col("text", 11, ColumnType::Text),
            col("bin", 12, ColumnType::Binary),
            col("memo", 13, ColumnType::Memo),
            col("ole", 14, ColumnType::Ole),
        ]
    }

    #[test]
    fn decode_of_encode_round_trips_every_column_type() {
        let columns = all_column_types_table();
        let mut row = Row::new_null(columns.len());
        row.set(0, Value::Long(1)); // boolean true
        row.set(1, Value::Long(200));
        row.set(2, Value::Long(-30000));
        row.set(3, Value::Long(123456789));
        row.set(4, Value::Double(19.99));
        row.set(5, Value::Double(1.5));
        row.set(6, Value::Double(2.71828));
        row.set(7, Value::DateTime(44927.5));
        row.set(8, Value::Decimal { unscaled: 31415, scale: 2 });
        row.set(9, Value::Decimal { unscaled: -271828, scale: 5 });
        row.set(10, Value::Binary(vec![0xAB; 16]));
        row.set(11, Value::Text("hello world".into()));
        row.set(12, Value::Binary(vec![1, 2, 3, 4]));
        row.set(13, Value::Text("a longer memo field".into()));
        row.set(14, Value::Binary(vec![9, 9, 9]));

        let encoded = encode_row(&row, &columns).unwrap();
        let decoded = decode_row(&encoded, &columns).unwrap();
        assert_eq!(decoded.values, row.values);
    }

    #[test]
    fn decode_of_encode_round_trips_null_columns() {
        let columns = all_column_types_table();
        let mut row = Row::new_null(columns.len());
        row.set(0, Value::Long(0)); // boolean false
        row.set(3, Value::Long(7));
        row.set(11, Value::Text("present".into()));
        // every other column stays Null.

        let encoded = encode_row(&row, &columns).unwrap();
        let decoded = decode_row(&encoded, &columns).unwrap();
        assert_eq!(decoded.values, row.values);
    }

    #[test]
    fn property_round_trip_with_random_fixtures() {
        use rand::Rng;
        let columns = vec![
            col("id", 0, ColumnType::Long),
            col("amount", 1, ColumnType::Double),
            col("label", 2, ColumnType::Text),
        ];
        let mut rng = rand::thread_rng();
        for _ in 0..50 {
            let mut row = Row::new_null(columns.len());
            row.set(0, Value::Long(rng.gen::<i32>() as i64));
            row.set(1, Value::Double(rng.gen_range(-1e6..1e6)));
            let len = rng.gen_range(0..20);
            let label: String = (0..len).map(|_| rng.gen_range(b'a'..=b'z') as char).collect();
            row.set(2, Value::Text(label));

            let encoded = encode_row(&row, &columns).unwrap();
            let decoded = decode_row(&encoded, &columns).unwrap();
            assert_eq!(decoded.values, row.values);
        }
    }

    #[test]
    fn format_value_wires_significant_digits_by_column_type() {
        let float_digits = format_value(&Value::Double(1.0 / 3.0), ColumnType::Float).unwrap();
        let double_digits = format_value(&Value::Double(1.0 / 3.0), ColumnType::Double).unwrap();
        assert!(float_digits.len() < double_digits.len(), "FLOAT keeps fewer significant digits than DOUBLE");
        assert_eq!(format_value(&Value::Long(5), ColumnType::Long), None);
    }
}
