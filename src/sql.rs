//! SQL INSERT emission
//!
//! Turns a resolved suite into multi-row `INSERT` statements, one stream of
//! statements per schema, schemas in dependency order so every foreign key
//! points at a row that has already been inserted. Rows for one table are
//! batched into a single statement until the statement would outgrow the
//! configured byte ceiling.

use std::io::Write;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, SeedError};
use crate::record::Record;
use crate::suite::Suite;
use crate::value::Value;

fn default_max_batch_bytes() -> usize {
    128 * 1024
}

/// Emission options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqlOptions {
    /// Ceiling on the byte length of one INSERT statement. A single row
    /// larger than this still emits as its own statement.
    #[serde(default = "default_max_batch_bytes")]
    pub max_batch_bytes: usize,
}

impl Default for SqlOptions {
    fn default() -> Self {
        SqlOptions {
            max_batch_bytes: default_max_batch_bytes(),
        }
    }
}

/// Backtick-quote an identifier, doubling any embedded backtick.
fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Render one scalar as a SQL literal.
///
/// Strings use single quotes with `''` doubling; temporal values render in
/// their quoted ISO-ish forms; booleans become 1 / 0. Non-finite floats have
/// no SQL literal and are rejected.
fn render_scalar(value: &Value) -> Result<String> {
    match value {
        Value::Null => Ok("NULL".to_string()),
        Value::Bool(b) => Ok(if *b { "1" } else { "0" }.to_string()),
        Value::Int(i) => Ok(i.to_string()),
        Value::Float(x) => {
            if !x.is_finite() {
                return Err(SeedError::UnsupportedValue(format!(
                    "non-finite float {}",
                    x
                )));
            }
            Ok(format!("{:?}", x))
        }
        Value::Text(s) => Ok(format!("'{}'", s.replace('\'', "''"))),
        Value::Date(_) | Value::Time(_) | Value::DateTime(_) => Ok(format!("'{}'", value)),
    }
}

/// The column order and rendered value tuple for one record: identity fields
/// first, in identity order, then the remaining renderable fields by name.
/// Relationship fields that already copied their scalars out are skipped.
fn render_row(record: &Record) -> Result<(Vec<String>, String)> {
    let identity = record.identity_field_names();
    let mut columns = identity.clone();
    for (name, field) in record.fields() {
        if identity.contains(&name) || !field.is_renderable() {
            continue;
        }
        columns.push(name);
    }
    let mut rendered = Vec::with_capacity(columns.len());
    for column in &columns {
        rendered.push(render_scalar(&record.value(column)?)?);
    }
    Ok((columns, format!("({})", rendered.join(", "))))
}

/// Accumulates rows into multi-row INSERT statements.
///
/// A statement is closed and written out when the target table or column set
/// changes, or when the next row would push the statement past the byte
/// ceiling.
pub struct InsertBatcher<W: Write> {
    out: W,
    max_batch_bytes: usize,
    table: String,
    columns: Vec<String>,
    head: String,
    rows: Vec<String>,
    bytes: usize,
}

impl<W: Write> InsertBatcher<W> {
    pub fn new(out: W, options: &SqlOptions) -> Self {
        InsertBatcher {
            out,
            max_batch_bytes: options.max_batch_bytes,
            table: String::new(),
            columns: Vec::new(),
            head: String::new(),
            rows: Vec::new(),
            bytes: 0,
        }
    }

    /// Queue one rendered row for a table, flushing the pending statement
    /// first whenever this row cannot join it.
    pub fn push(&mut self, table: &str, columns: Vec<String>, row: String) -> Result<()> {
        let same_shape = table == self.table && columns == self.columns;
        let fits = self.bytes + row.len() + 2 <= self.max_batch_bytes;
        if !self.rows.is_empty() && !(same_shape && fits) {
            self.flush()?;
        }
        if !same_shape || self.rows.is_empty() {
            let quoted: Vec<String> = columns.iter().map(|c| quote_identifier(c)).collect();
            self.head = format!(
                "INSERT INTO {} ({}) VALUES",
                quote_identifier(table),
                quoted.join(", ")
            );
            self.table = table.to_string();
            self.columns = columns;
            self.bytes = self.head.len();
        }
        self.bytes += row.len() + 2;
        self.rows.push(row);
        Ok(())
    }

    /// Write the pending statement, if any.
    pub fn flush(&mut self) -> Result<()> {
        if self.rows.is_empty() {
            return Ok(());
        }
        debug!(table = %self.table, rows = self.rows.len(), "writing insert statement");
        writeln!(self.out, "{}", self.head)?;
        writeln!(self.out, "{};", self.rows.join(",\n"))?;
        self.rows.clear();
        self.bytes = 0;
        Ok(())
    }

    /// Flush and hand back the underlying writer.
    pub fn finish(mut self) -> Result<W> {
        self.flush()?;
        Ok(self.out)
    }
}

/// Emit every collection of a suite as INSERT statements, most-depended-upon
/// schema first, each collection ordered by its first identity field.
pub fn emit_suite<W: Write>(suite: &Suite, out: W, options: &SqlOptions) -> Result<W> {
    let mut batcher = InsertBatcher::new(out, options);
    for collection in suite {
        for record in collection.ordered() {
            let (columns, row) = render_row(&record)?;
            batcher.push(collection.schema(), columns, row)?;
        }
        batcher.flush()?;
    }
    batcher.finish()
}

/// [`emit_suite`] into a fresh string.
pub fn emit_suite_to_string(suite: &Suite, options: &SqlOptions) -> Result<String> {
    let out = emit_suite(suite, Vec::new(), options)?;
    Ok(String::from_utf8(out).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Identity;
    use crate::walker::resolve;

    fn emit_one(record: &Record) -> String {
        let suite = resolve(record).unwrap();
        emit_suite_to_string(&suite, &SqlOptions::default()).unwrap()
    }

    #[test]
    fn test_single_row_statement() {
        let r = Record::new("person", Identity::field("id"))
            .with("id", 1)
            .with("name", "O'Brien");
        assert_eq!(
            emit_one(&r),
            "INSERT INTO `person` (`id`, `name`) VALUES\n(1, 'O''Brien');\n"
        );
    }

    #[test]
    fn test_identity_fields_lead_the_column_list() {
        let r = Record::new("t", Identity::fields(["b", "a"]))
            .with("a", 1)
            .with("b", 2)
            .with("c", 3);
        let (columns, _) = render_row(&r).unwrap();
        assert_eq!(columns, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_rows_batch_into_one_statement() {
        let mut out = Vec::new();
        let mut batcher = InsertBatcher::new(&mut out, &SqlOptions::default());
        for i in 1..=3 {
            batcher
                .push("t", vec!["id".to_string()], format!("({})", i))
                .unwrap();
        }
        batcher.flush().unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "INSERT INTO `t` (`id`) VALUES\n(1),\n(2),\n(3);\n"
        );
    }

    #[test]
    fn test_byte_ceiling_splits_statements() {
        let mut out = Vec::new();
        let options = SqlOptions { max_batch_bytes: 40 };
        let mut batcher = InsertBatcher::new(&mut out, &options);
        for i in 1..=4 {
            batcher
                .push("t", vec!["id".to_string()], format!("({})", i))
                .unwrap();
        }
        batcher.flush().unwrap();
        let sql = String::from_utf8(out).unwrap();
        assert_eq!(sql.matches("INSERT INTO").count(), 2);
    }

    #[test]
    fn test_column_set_change_splits_statements() {
        let mut out = Vec::new();
        let mut batcher = InsertBatcher::new(&mut out, &SqlOptions::default());
        batcher
            .push("t", vec!["id".to_string()], "(1)".to_string())
            .unwrap();
        batcher
            .push(
                "t",
                vec!["id".to_string(), "name".to_string()],
                "(2, 'x')".to_string(),
            )
            .unwrap();
        batcher.flush().unwrap();
        let sql = String::from_utf8(out).unwrap();
        assert_eq!(sql.matches("INSERT INTO").count(), 2);
    }

    #[test]
    fn test_scalar_literals() {
        assert_eq!(render_scalar(&Value::Null).unwrap(), "NULL");
        assert_eq!(render_scalar(&Value::Bool(true)).unwrap(), "1");
        assert_eq!(render_scalar(&Value::Float(0.5)).unwrap(), "0.5");
        assert_eq!(render_scalar(&Value::Float(2.0)).unwrap(), "2.0");
        assert_eq!(
            render_scalar(&Value::Date(
                chrono::NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
            ))
            .unwrap(),
            "'2024-03-01'"
        );
        assert!(render_scalar(&Value::Float(f64::NAN)).is_err());
        assert!(render_scalar(&Value::Float(f64::INFINITY)).is_err());
    }

    #[test]
    fn test_dependency_order_across_tables() {
        let order = Record::new("order", Identity::auto("id")).with(
            "items",
            crate::field::HasMany::new([
                Record::new("line_item", Identity::auto("id")).with("qty", 2)
            ])
            .referring(["order_id"]),
        );
        let sql = emit_one(&order);
        let order_pos = sql.find("INSERT INTO `order`").unwrap();
        let item_pos = sql.find("INSERT INTO `line_item`").unwrap();
        assert!(order_pos < item_pos);
        assert!(sql.contains("(1, 2, 1)") || sql.contains("(1, 1, 2)"));
    }

    #[test]
    fn test_self_bound_reference_renders_late() {
        let team = Record::new("team", Identity::field("id")).with("id", 7);
        let player = Record::new("player", Identity::auto("id"))
            .with("team_id", crate::field::BelongsTo::to(&team));
        let sql = emit_one(&player);
        assert!(sql.contains("INSERT INTO `player` (`id`, `team_id`) VALUES\n(1, 7);"));
    }
}
