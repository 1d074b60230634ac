use sieve_core::{
    Context, FieldDef, QueryPlan, Result, SqlWriter, Value, separated_by, unscoped_join_error,
};
use std::fmt::Write;

/// Postgres dialect: numbered placeholders, serial keys handed back by `RETURNING`.
#[derive(Default, Debug, Clone, Copy)]
pub struct PostgresSqlWriter;

impl PostgresSqlWriter {
    /// Joined models listed after `keyword` (`FROM` for updates, `USING` for deletes).
    fn write_join_sources(
        &self,
        context: &mut Context,
        out: &mut String,
        plan: &QueryPlan,
        keyword: &str,
    ) {
        out.push('\n');
        out.push_str(keyword);
        out.push(' ');
        separated_by(
            out,
            &plan.joins,
            |out, step| self.write_table(context, out, &step.model),
            ", ",
        );
    }

    /// Join conditions followed by the filter, the filter must not be empty.
    fn write_join_filter(
        &self,
        context: &mut Context,
        out: &mut String,
        params: &mut Vec<Value>,
        plan: &QueryPlan,
    ) -> Result<()> {
        out.push_str("\nWHERE ");
        separated_by(
            out,
            &plan.joins,
            |out, step| self.write_join_condition(context, out, step),
            " AND ",
        );
        out.push_str(" AND (");
        if !self.write_condition(context, out, params, plan.tokens())? {
            return Err(unscoped_join_error(plan));
        }
        out.push(')');
        Ok(())
    }
}

impl SqlWriter for PostgresSqlWriter {
    fn write_placeholder(&self, context: &mut Context, out: &mut String) {
        context.counter += 1;
        let _ = write!(out, "${}", context.counter);
    }

    fn write_column_type(&self, _context: &mut Context, out: &mut String, value: &Value) {
        match value {
            Value::Boolean(..) => out.push_str("BOOLEAN"),
            Value::Int8(..) => out.push_str("SMALLINT"),
            Value::Int16(..) => out.push_str("SMALLINT"),
            Value::Int32(..) => out.push_str("INTEGER"),
            Value::Int64(..) => out.push_str("BIGINT"),
            Value::UInt8(..) => out.push_str("SMALLINT"),
            Value::UInt16(..) => out.push_str("INTEGER"),
            Value::UInt32(..) => out.push_str("BIGINT"),
            Value::UInt64(..) => out.push_str("NUMERIC(20)"),
            Value::Float32(..) => out.push_str("REAL"),
            Value::Float64(..) => out.push_str("DOUBLE PRECISION"),
            Value::Decimal(..) => out.push_str("NUMERIC"),
            Value::Varchar(..) => out.push_str("TEXT"),
            Value::Blob(..) => out.push_str("BYTEA"),
            Value::Date(..) => out.push_str("DATE"),
            Value::Time(..) => out.push_str("TIME"),
            Value::Timestamp(..) => out.push_str("TIMESTAMP"),
            Value::TimestampWithTimezone(..) => out.push_str("TIMESTAMP WITH TIME ZONE"),
            Value::Uuid(..) => out.push_str("UUID"),
            Value::Null => log::error!("Cannot declare a column of type NULL"),
        }
    }

    fn write_column_type_auto_increment(&self, context: &mut Context, out: &mut String, value: &Value) {
        match value {
            Value::Int8(..) | Value::Int16(..) | Value::UInt8(..) => out.push_str("SMALLSERIAL"),
            Value::Int32(..) | Value::UInt16(..) => out.push_str("SERIAL"),
            Value::Int64(..) | Value::UInt32(..) => out.push_str("BIGSERIAL"),
            _ => self.write_column_type(context, out, value),
        }
    }

    fn write_insert_returning(&self, context: &mut Context, out: &mut String, field: &FieldDef) {
        out.push_str(" RETURNING ");
        self.write_identifier_quoted(context, out, field.storage_name());
    }

    fn write_update_joined(
        &self,
        context: &mut Context,
        out: &mut String,
        params: &mut Vec<Value>,
        plan: &QueryPlan,
    ) -> Result<()> {
        self.write_join_sources(context, out, plan, "FROM");
        self.write_join_filter(context, out, params, plan)
    }

    fn write_delete_joined(
        &self,
        context: &mut Context,
        out: &mut String,
        params: &mut Vec<Value>,
        plan: &QueryPlan,
    ) -> Result<()> {
        self.write_join_sources(context, out, plan, "USING");
        self.write_join_filter(context, out, params, plan)
    }
}
