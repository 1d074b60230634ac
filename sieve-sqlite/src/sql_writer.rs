use sieve_core::{Context, SqlWriter, Statement, Value, Window};
use std::fmt::Write;

/// SQLite dialect: storage classes for column types, key recovery through `last_insert_rowid()`.
#[derive(Default, Debug, Clone, Copy)]
pub struct SqliteSqlWriter;

impl SqlWriter for SqliteSqlWriter {
    fn write_column_type(&self, _context: &mut Context, out: &mut String, value: &Value) {
        match value {
            Value::Boolean(..)
            | Value::Int8(..)
            | Value::Int16(..)
            | Value::Int32(..)
            | Value::Int64(..)
            | Value::UInt8(..)
            | Value::UInt16(..)
            | Value::UInt32(..)
            | Value::UInt64(..) => out.push_str("INTEGER"),
            Value::Float32(..) | Value::Float64(..) | Value::Decimal(..) => out.push_str("REAL"),
            Value::Varchar(..)
            | Value::Date(..)
            | Value::Time(..)
            | Value::Timestamp(..)
            | Value::TimestampWithTimezone(..)
            | Value::Uuid(..) => out.push_str("TEXT"),
            Value::Blob(..) => out.push_str("BLOB"),
            Value::Null => log::error!("Cannot declare a column of type NULL"),
        }
    }

    // OFFSET alone is not valid SQLite, a negative limit means no limit.
    fn write_limit_offset(&self, _context: &mut Context, out: &mut String, window: &Window) {
        match window.limit {
            Some(limit) => {
                let _ = write!(out, "\nLIMIT {}", limit);
            }
            None if window.offset > 0 => out.push_str("\nLIMIT -1"),
            None => {}
        }
        if window.offset > 0 {
            let _ = write!(out, "\nOFFSET {}", window.offset);
        }
    }

    fn write_last_insert_id(&self) -> Option<Statement> {
        Some(Statement::new("SELECT last_insert_rowid();"))
    }
}
