use crate::{
    CompareOp, Comparison, Context, ErrorKind, FieldDef, JoinStep, LogicalOp, ModelDef,
    Operand, Order, QueryPlan, Reference, Result, Statement, Token, Value, Window, separated_by,
};
use std::fmt::Write;

/// Position to come back to when a group turns out to hold nothing.
struct Frame {
    restore: usize,
    params: usize,
    counter: u32,
    /// Position of the `(` written for this frame.
    paren: Option<usize>,
    operands: usize,
    /// Span of the parentheses around the only operand so far, when it is a group.
    only_group: Option<(usize, usize)>,
    pending: Option<LogicalOp>,
}

impl Frame {
    fn new(out: &str, params: &[Value], context: &Context) -> Self {
        Self {
            restore: out.len(),
            params: params.len(),
            counter: context.counter,
            paren: None,
            operands: 0,
            only_group: None,
            pending: None,
        }
    }

    fn push_operand(&mut self, group: Option<(usize, usize)>) {
        self.only_group = if self.operands == 0 { group } else { None };
        self.operands += 1;
        self.pending = None;
    }
}

fn malformed(message: &str) -> crate::Error {
    let error = ErrorKind::MalformedPredicate(message.to_string()).into_error();
    log::error!("{:#}", error);
    error
}

/// Dialect printer turning query plans and models into parameterised SQL.
pub trait SqlWriter: Send + Sync {
    /// Escape occurrences of `search` char with `replace` while copying into buffer.
    fn write_escaped(
        &self,
        _context: &mut Context,
        out: &mut String,
        value: &str,
        search: char,
        replace: &str,
    ) {
        let mut position = 0;
        for (i, c) in value.char_indices() {
            if c == search {
                out.push_str(&value[position..i]);
                out.push_str(replace);
                position = i + c.len_utf8();
            }
        }
        out.push_str(&value[position..]);
    }

    /// Quote identifiers ("name") doubling inner quotes.
    fn write_identifier_quoted(&self, context: &mut Context, out: &mut String, value: &str) {
        out.push('"');
        self.write_escaped(context, out, value, '"', "\"\"");
        out.push('"');
    }

    fn write_table(&self, context: &mut Context, out: &mut String, model: &ModelDef) {
        self.write_identifier_quoted(context, out, model.storage_name());
    }

    /// Render a column, qualified with its table when the context asks for it.
    fn write_column(&self, context: &mut Context, out: &mut String, model: &ModelDef, field: &FieldDef) {
        if context.qualify_columns {
            self.write_table(context, out, model);
            out.push('.');
        }
        self.write_identifier_quoted(context, out, field.storage_name());
    }

    /// Positional parameter marker, `?` unless the dialect numbers them.
    fn write_placeholder(&self, context: &mut Context, out: &mut String) {
        context.counter += 1;
        out.push('?');
    }

    fn write_value_none(&self, _context: &mut Context, out: &mut String) {
        out.push_str("NULL");
    }

    /// Render the SQL type for a `Value` prototype.
    fn write_column_type(&self, _context: &mut Context, out: &mut String, value: &Value) {
        match value {
            Value::Boolean(..) => out.push_str("BOOLEAN"),
            Value::Int8(..) => out.push_str("TINYINT"),
            Value::Int16(..) => out.push_str("SMALLINT"),
            Value::Int32(..) => out.push_str("INTEGER"),
            Value::Int64(..) => out.push_str("BIGINT"),
            Value::UInt8(..) => out.push_str("UTINYINT"),
            Value::UInt16(..) => out.push_str("USMALLINT"),
            Value::UInt32(..) => out.push_str("UINTEGER"),
            Value::UInt64(..) => out.push_str("UBIGINT"),
            Value::Float32(..) => out.push_str("FLOAT"),
            Value::Float64(..) => out.push_str("DOUBLE"),
            Value::Decimal(..) => out.push_str("DECIMAL"),
            Value::Varchar(..) => out.push_str("VARCHAR"),
            Value::Blob(..) => out.push_str("BLOB"),
            Value::Date(..) => out.push_str("DATE"),
            Value::Time(..) => out.push_str("TIME"),
            Value::Timestamp(..) => out.push_str("TIMESTAMP"),
            Value::TimestampWithTimezone(..) => out.push_str("TIMESTAMPTZ"),
            Value::Uuid(..) => out.push_str("UUID"),
            Value::Null => log::error!("Cannot declare a column of type NULL"),
        }
    }

    /// Type of the single integer key generated by the database.
    fn write_column_type_auto_increment(&self, context: &mut Context, out: &mut String, value: &Value) {
        self.write_column_type(context, out, value);
    }

    fn write_compare_op(&self, _context: &mut Context, out: &mut String, op: CompareOp) {
        out.push_str(match op {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
        });
    }

    fn write_logical_op(&self, _context: &mut Context, out: &mut String, op: LogicalOp) {
        out.push_str(match op {
            LogicalOp::And => " AND ",
            LogicalOp::Or => " OR ",
        });
    }

    fn write_reference(&self, context: &mut Context, out: &mut String, value: &Reference) -> Result<()> {
        if value.is_model() {
            return Err(malformed(&format!(
                "the whole model `{}` cannot be used as a value",
                value.model
            )));
        }
        let field = value.field_def()?;
        self.write_column(context, out, &value.model, field);
        Ok(())
    }

    /// NULL inline, any other value as a placeholder with its parameter.
    fn write_literal(&self, context: &mut Context, out: &mut String, params: &mut Vec<Value>, value: &Value) {
        if value.is_null() {
            self.write_value_none(context, out);
        } else {
            self.write_placeholder(context, out);
            params.push(value.clone());
        }
    }

    fn write_operand(
        &self,
        context: &mut Context,
        out: &mut String,
        params: &mut Vec<Value>,
        value: &Operand,
    ) -> Result<()> {
        match value {
            Operand::Reference(v) => self.write_reference(context, out, v),
            Operand::Literal(v) => {
                self.write_literal(context, out, params, v);
                Ok(())
            }
        }
    }

    /// Render a comparison, equality against NULL becomes IS [NOT] NULL.
    fn write_comparison(
        &self,
        context: &mut Context,
        out: &mut String,
        params: &mut Vec<Value>,
        value: &Comparison,
    ) -> Result<()> {
        let value = value.normalized();
        if let Some(is_null) = value.null_check() {
            let operand = if value.left.is_null() {
                &value.right
            } else {
                &value.left
            };
            self.write_operand(context, out, params, operand)?;
            out.push_str(if is_null { " IS NULL" } else { " IS NOT NULL" });
            return Ok(());
        }
        self.write_operand(context, out, params, &value.left)?;
        out.push(' ');
        self.write_compare_op(context, out, value.op);
        out.push(' ');
        self.write_operand(context, out, params, &value.right)
    }

    /// Render the filter of a token stream, returns false when it filters nothing.
    ///
    /// Whole-model references are skipped, groups left empty vanish together with the operator in
    /// front of them, two operands with no operator between them are joined by AND. Parentheses are
    /// kept only around groups holding several operands and never around the whole filter.
    fn write_condition<'a>(
        &self,
        context: &mut Context,
        out: &mut String,
        params: &mut Vec<Value>,
        tokens: impl IntoIterator<Item = Token<'a>>,
    ) -> Result<bool>
    where
        Self: Sized,
    {
        let mut stack = vec![Frame::new(out, params, context)];
        for token in tokens {
            match token {
                Token::Open => {
                    let mut frame = Frame::new(out, params, context);
                    if let Some(parent) = stack.last().filter(|v| v.operands > 0) {
                        self.write_logical_op(context, out, parent.pending.unwrap_or(LogicalOp::And));
                    }
                    frame.paren = Some(out.len());
                    out.push('(');
                    stack.push(frame);
                }
                Token::Close => {
                    if stack.len() < 2 {
                        return Err(malformed("a group is closed before being opened"));
                    }
                    let Some(frame) = stack.pop() else {
                        continue;
                    };
                    let Some(paren) = frame.paren else {
                        continue;
                    };
                    let group = match frame.operands {
                        0 => {
                            out.truncate(frame.restore);
                            params.truncate(frame.params);
                            context.counter = frame.counter;
                            continue;
                        }
                        // A single operand needs no parentheses
                        1 => {
                            out.remove(paren);
                            frame.only_group.map(|(open, close)| (open - 1, close - 1))
                        }
                        _ => {
                            out.push(')');
                            Some((paren, out.len() - 1))
                        }
                    };
                    if let Some(parent) = stack.last_mut() {
                        parent.push_operand(group);
                    }
                }
                Token::Logical(op) => {
                    if let Some(frame) = stack.last_mut().filter(|v| v.operands > 0) {
                        frame.pending = Some(op);
                    }
                }
                Token::Reference(v) if v.is_model() => {}
                token => {
                    let Some(frame) = stack.last_mut() else {
                        continue;
                    };
                    if frame.operands > 0 {
                        self.write_logical_op(
                            context,
                            out,
                            frame.pending.take().unwrap_or(LogicalOp::And),
                        );
                    }
                    match token {
                        Token::Reference(v) => self.write_reference(context, out, v)?,
                        Token::Literal(v) => self.write_literal(context, out, params, v),
                        Token::Comparison(v) => self.write_comparison(context, out, params, v)?,
                        _ => {}
                    }
                    frame.push_operand(None);
                }
            }
        }
        match stack.as_slice() {
            [root] => {
                // The whole filter is one group, its parentheses are redundant
                if let (1, Some((open, close))) = (root.operands, root.only_group) {
                    out.remove(close);
                    out.remove(open);
                }
                Ok(root.operands > 0)
            }
            _ => Err(malformed("a group is opened and never closed")),
        }
    }

    /// Render `\nWHERE <filter>` of the plan, nothing when the filter is empty.
    fn write_where(
        &self,
        context: &mut Context,
        out: &mut String,
        params: &mut Vec<Value>,
        plan: &QueryPlan,
    ) -> Result<bool>
    where
        Self: Sized,
    {
        let len = out.len();
        out.push_str("\nWHERE ");
        let written = self.write_condition(context, out, params, plan.tokens())?;
        if !written {
            out.truncate(len);
        }
        Ok(written)
    }

    /// Render the equalities linking a joined model to the ones already in the query.
    fn write_join_condition(&self, context: &mut Context, out: &mut String, step: &JoinStep) {
        separated_by(
            out,
            &step.on,
            |out, (joined, entering)| {
                self.write_column(context, out, &joined.model, joined.field_def());
                out.push_str(" = ");
                self.write_column(context, out, &entering.model, entering.field_def());
            },
            " AND ",
        );
    }

    fn write_joins(&self, context: &mut Context, out: &mut String, plan: &QueryPlan) {
        for step in &plan.joins {
            out.push_str("\nINNER JOIN ");
            self.write_table(context, out, &step.model);
            out.push_str(" ON ");
            self.write_join_condition(context, out, step);
        }
    }

    fn write_order_by(&self, context: &mut Context, out: &mut String, sorting: &[Reference]) -> Result<()> {
        if sorting.is_empty() {
            return Ok(());
        }
        out.push_str("\nORDER BY ");
        for (i, reference) in sorting.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            self.write_reference(context, out, reference)?;
            out.push_str(match reference.order {
                Order::ASC => " ASC",
                Order::DESC => " DESC",
            });
        }
        Ok(())
    }

    fn write_limit_offset(&self, _context: &mut Context, out: &mut String, window: &Window) {
        if let Some(limit) = window.limit {
            let _ = write!(out, "\nLIMIT {}", limit);
        }
        if window.offset > 0 {
            let _ = write!(out, "\nOFFSET {}", window.offset);
        }
    }

    /// Emit SELECT of every column of the primary model (joins, WHERE, ORDER, LIMIT, OFFSET).
    fn write_select(&self, plan: &QueryPlan) -> Result<Statement>
    where
        Self: Sized,
    {
        let mut out = String::with_capacity(128 + plan.primary.fields().len() * 32);
        let mut params = Vec::new();
        let mut context = Context::new(true);
        out.push_str("SELECT ");
        separated_by(
            &mut out,
            plan.primary.fields(),
            |out, field| self.write_column(&mut context, out, &plan.primary, field),
            ", ",
        );
        out.push_str("\nFROM ");
        self.write_table(
            &mut context,
            &mut out,
            &plan.primary,
        );
        self.write_joins(&mut context, &mut out, plan);
        self.write_where(
            &mut context,
            &mut out,
            &mut params,
            plan,
        )?;
        self.write_order_by(&mut context, &mut out, plan.sorting())?;
        self.write_limit_offset(&mut context, &mut out, &plan.window);
        out.push(';');
        Ok(Statement { sql: out, params })
    }

    /// Emit SELECT COUNT(*), sorting and paging do not apply.
    fn write_count(&self, plan: &QueryPlan) -> Result<Statement>
    where
        Self: Sized,
    {
        let mut out = String::with_capacity(128);
        let mut params = Vec::new();
        let mut context = Context::new(true);
        out.push_str("SELECT COUNT(*)\nFROM ");
        self.write_table(&mut context, &mut out, &plan.primary);
        self.write_joins(&mut context, &mut out, plan);
        self.write_where(
            &mut context,
            &mut out,
            &mut params,
            plan,
        )?;
        out.push(';');
        Ok(Statement { sql: out, params })
    }

    /// Emit a single row INSERT, the generated key is left out while unset.
    fn write_insert(&self, model: &ModelDef, row: &[Value]) -> Result<Statement> {
        if row.len() != model.fields().len() {
            return Err(crate::Error::msg(format!(
                "Model `{}` has {} fields but the row has {} values",
                model.name(),
                model.fields().len(),
                row.len()
            )));
        }
        let auto = model.auto_increment_index().filter(|&i| row[i].is_null());
        let columns = (0..row.len()).filter(|&i| Some(i) != auto).collect::<Vec<_>>();
        let mut out = String::with_capacity(64 + columns.len() * 32);
        let mut params = Vec::with_capacity(columns.len());
        let mut context = Context::new(false);
        out.push_str("INSERT INTO ");
        self.write_table(&mut context, &mut out, model);
        if columns.is_empty() {
            out.push_str(" DEFAULT VALUES");
        } else {
            out.push_str(" (");
            separated_by(
                &mut out,
                &columns,
                |out, &i| self.write_column(&mut context, out, model, &model.fields()[i]),
                ", ",
            );
            out.push_str(") VALUES (");
            for (n, &i) in columns.iter().enumerate() {
                if n > 0 {
                    out.push_str(", ");
                }
                self.write_placeholder(&mut context, &mut out);
                params.push(row[i].clone());
            }
            out.push(')');
        }
        if let Some(i) = auto {
            self.write_insert_returning(&mut context, &mut out, &model.fields()[i]);
        }
        out.push(';');
        Ok(Statement { sql: out, params })
    }

    /// Clause handing back the generated key, for dialects having one.
    fn write_insert_returning(&self, _context: &mut Context, _out: &mut String, _field: &FieldDef) {}

    /// Query reading back the key generated by the last insert, for dialects without RETURNING.
    fn write_last_insert_id(&self) -> Option<Statement> {
        None
    }

    /// Emit UPDATE of the primary model. An empty filter updates every row, unless the plan joins
    /// other models: then it is an error.
    fn write_update(&self, plan: &QueryPlan, assignments: &[(&str, Value)]) -> Result<Statement>
    where
        Self: Sized,
    {
        if assignments.is_empty() {
            return Err(crate::Error::msg(format!(
                "Nothing to update on `{}`",
                plan.primary.name()
            )));
        }
        let mut out = String::with_capacity(128 + assignments.len() * 32);
        let mut params = Vec::with_capacity(assignments.len());
        let mut context = Context::new(true);
        out.push_str("UPDATE ");
        self.write_table(&mut context, &mut out, &plan.primary);
        out.push_str(" SET ");
        {
            let mut context = context.unqualified();
            for (i, (name, value)) in assignments.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                let field = plan.primary.expect_field(name)?;
                self.write_column(&mut context, &mut out, &plan.primary, field);
                out.push_str(" = ");
                self.write_placeholder(&mut context, &mut out);
                params.push(value.clone());
            }
        }
        if plan.is_joined() {
            self.write_update_joined(&mut context, &mut out, &mut params, plan)?;
        } else {
            self.write_where(&mut context, &mut out, &mut params, plan)?;
        }
        out.push(';');
        Ok(Statement { sql: out, params })
    }

    /// Scope of an UPDATE going through joins, by default the keys selected by a subquery.
    fn write_update_joined(
        &self,
        context: &mut Context,
        out: &mut String,
        params: &mut Vec<Value>,
        plan: &QueryPlan,
    ) -> Result<()>
    where
        Self: Sized,
    {
        self.write_key_subquery(context, out, params, plan)
    }

    /// Emit DELETE from the primary model, an empty filter follows the rules of [`SqlWriter::write_update`].
    fn write_delete(&self, plan: &QueryPlan) -> Result<Statement>
    where
        Self: Sized,
    {
        let mut out = String::with_capacity(128);
        let mut params = Vec::new();
        let mut context = Context::new(true);
        out.push_str("DELETE FROM ");
        self.write_table(&mut context, &mut out, &plan.primary);
        if plan.is_joined() {
            self.write_delete_joined(&mut context, &mut out, &mut params, plan)?;
        } else {
            self.write_where(&mut context, &mut out, &mut params, plan)?;
        }
        out.push(';');
        Ok(Statement { sql: out, params })
    }

    fn write_delete_joined(
        &self,
        context: &mut Context,
        out: &mut String,
        params: &mut Vec<Value>,
        plan: &QueryPlan,
    ) -> Result<()>
    where
        Self: Sized,
    {
        self.write_key_subquery(context, out, params, plan)
    }

    /// Render `\nWHERE (key) IN (SELECT key FROM .. JOIN .. WHERE ..)`.
    fn write_key_subquery(
        &self,
        context: &mut Context,
        out: &mut String,
        params: &mut Vec<Value>,
        plan: &QueryPlan,
    ) -> Result<()>
    where
        Self: Sized,
    {
        let key = plan.primary.primary_key().collect::<Vec<_>>();
        let write_key = |context: &mut Context, out: &mut String| {
            separated_by(
                out,
                &key,
                |out, field| self.write_column(context, out, &plan.primary, field),
                ", ",
            );
        };
        out.push_str("\nWHERE ");
        if key.len() > 1 {
            out.push('(');
        }
        write_key(context, out);
        if key.len() > 1 {
            out.push(')');
        }
        out.push_str(" IN (SELECT ");
        write_key(context, out);
        out.push_str(" FROM ");
        self.write_table(context, out, &plan.primary);
        self.write_joins(context, out, plan);
        if !self.write_where(context, out, params, plan)? {
            return Err(unscoped_join_error(plan));
        }
        out.push(')');
        Ok(())
    }

    /// Emit CREATE TABLE with columns and the primary key.
    fn write_create_table(&self, model: &ModelDef, if_not_exists: bool) -> Statement {
        let mut context = Context::new(false);
        let mut out = String::with_capacity(128 + model.fields().len() * 64);
        out.push_str("CREATE TABLE ");
        if if_not_exists {
            out.push_str("IF NOT EXISTS ");
        }
        self.write_table(&mut context, &mut out, model);
        out.push_str(" (\n");
        separated_by(
            &mut out,
            model.fields().iter().enumerate(),
            |out, (i, field)| self.write_create_table_column_fragment(&mut context, out, model, i, field),
            ",\n",
        );
        let primary_key = model.primary_key_indices();
        if primary_key.len() > 1 {
            out.push_str(",\nPRIMARY KEY (");
            separated_by(
                &mut out,
                model.primary_key(),
                |out, field| self.write_identifier_quoted(&mut context, out, field.storage_name()),
                ", ",
            );
            out.push(')');
        }
        out.push_str("\n);");
        Statement::new(out)
    }

    /// Emit single column definition fragment.
    fn write_create_table_column_fragment(
        &self,
        context: &mut Context,
        out: &mut String,
        model: &ModelDef,
        index: usize,
        field: &FieldDef,
    ) {
        let key = model.primary_key_indices();
        let single_key = key == [index];
        self.write_identifier_quoted(context, out, field.storage_name());
        out.push(' ');
        if model.auto_increment_index() == Some(index) {
            self.write_column_type_auto_increment(context, out, &field.value_type);
        } else {
            self.write_column_type(context, out, &field.value_type);
        }
        if !field.is_nullable() && !key.contains(&index) {
            out.push_str(" NOT NULL");
        }
        if single_key {
            out.push_str(" PRIMARY KEY");
        } else if field.tags.has(crate::Tag::Unique) {
            out.push_str(" UNIQUE");
        }
    }

    /// Emit DROP TABLE statement.
    fn write_drop_table(&self, model: &ModelDef, if_exists: bool) -> Statement {
        let mut context = Context::new(false);
        let mut out = String::with_capacity(32 + model.storage_name().len());
        out.push_str("DROP TABLE ");
        if if_exists {
            out.push_str("IF EXISTS ");
        }
        self.write_table(&mut context, &mut out, model);
        out.push(';');
        Statement::new(out)
    }

    fn write_transaction_begin(&self, out: &mut String) {
        out.push_str("BEGIN;");
    }

    fn write_transaction_commit(&self, out: &mut String) {
        out.push_str("COMMIT;");
    }

    fn write_transaction_rollback(&self, out: &mut String) {
        out.push_str("ROLLBACK;");
    }
}

/// Error for an update or delete through joins with nothing restricting it.
pub fn unscoped_join_error(plan: &QueryPlan) -> crate::Error {
    malformed(&format!(
        "update or delete of `{}` joins other models but has no filter",
        plan.primary.name()
    ))
}

/// Writer following the common SQL conventions, numbered placeholders excluded.
#[derive(Default, Debug, Clone, Copy)]
pub struct GenericSqlWriter;

impl GenericSqlWriter {
    pub fn new() -> Self {
        Self
    }
}

impl SqlWriter for GenericSqlWriter {}
