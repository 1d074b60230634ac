use crate::{
    Group, ModelRef, QueryPlan, QueryResult, Result, Row, RowDecode, RowLabeled, RowsAffected,
    SqlWriter, Statement, Value, Window, convert_to,
    stream::{Stream, StreamExt, TryStreamExt},
};
use std::future::Future;

/// Relational backend: a statement runner and the dialect writing its statements.
///
/// The free functions of this module implement the [`crate::Executor`] primitives on top of it.
pub trait SqlExecutor: Send {
    type Writer: SqlWriter;

    fn writer(&self) -> &Self::Writer;

    /// Sends any statement and returns every row and modify result it produces.
    fn run(&mut self, statement: Statement) -> impl Stream<Item = Result<QueryResult>> + Send;

    /// Execute the statement and return the rows.
    fn fetch_statement(
        &mut self,
        statement: Statement,
    ) -> impl Stream<Item = Result<RowLabeled>> + Send {
        self.run(statement).filter_map(|v| async move {
            match v {
                Ok(QueryResult::Row(v)) => Some(Ok(v)),
                Err(e) => Some(Err(e)),
                _ => None,
            }
        })
    }

    /// Execute the statement and return the total number of rows affected.
    fn execute(&mut self, statement: Statement) -> impl Future<Output = Result<RowsAffected>> + Send {
        self.run(statement)
            .filter_map(|v| async move {
                match v {
                    Ok(QueryResult::Affected(v)) => Some(Ok(v)),
                    Err(e) => Some(Err(e)),
                    _ => None,
                }
            })
            .try_collect()
    }
}

/// Brings every value of a fetched row to the declared type of its field.
pub fn decode_row(model: &ModelRef, row: Row) -> Result<Row> {
    row.into_vec()
        .into_iter()
        .zip(model.fields())
        .map(|(value, field)| convert_to(value, &field.value_type))
        .collect()
}

pub async fn sql_fetch_rows<X: SqlExecutor>(
    executor: &mut X,
    predicate: &Group,
    window: Window,
) -> Result<Vec<Row>> {
    let plan = QueryPlan::new(predicate)?.with_window(window);
    let statement = executor.writer().write_select(&plan)?;
    let model = plan.primary.clone();
    log::debug!("{}", statement);
    executor
        .fetch_statement(statement)
        .and_then(|row| {
            let model = model.clone();
            async move { decode_row(&model, row.values) }
        })
        .try_collect()
        .await
}

pub async fn sql_count_rows<X: SqlExecutor>(executor: &mut X, predicate: &Group) -> Result<u64> {
    let plan = QueryPlan::new(predicate)?;
    let statement = executor.writer().write_count(&plan)?;
    log::debug!("{}", statement);
    let rows = executor
        .fetch_statement(statement)
        .try_collect::<Vec<_>>()
        .await?;
    match rows.first() {
        Some(row) => row.values.decode::<u64>(0),
        None => Ok(0),
    }
}

pub async fn sql_insert_rows<X: SqlExecutor>(
    executor: &mut X,
    model: &ModelRef,
    rows: Vec<Row>,
) -> Result<Vec<Row>> {
    let mut result = Vec::with_capacity(rows.len());
    for mut row in rows {
        let statement = executor.writer().write_insert(model, &row)?;
        let generated = model.auto_increment_index().filter(|&i| row[i].is_null());
        log::debug!("{}", statement);
        let mut key = None;
        let results = executor.run(statement).try_collect::<Vec<_>>().await?;
        for item in results {
            if let QueryResult::Row(returned) = item {
                key = returned.values.into_vec().into_iter().next();
            }
        }
        if let Some(i) = generated {
            let last_insert_id = match key {
                None => executor.writer().write_last_insert_id(),
                Some(..) => None,
            };
            if let Some(statement) = last_insert_id {
                log::debug!("{}", statement);
                let rows = executor
                    .fetch_statement(statement)
                    .try_collect::<Vec<_>>()
                    .await?;
                key = rows
                    .into_iter()
                    .next()
                    .and_then(|row| row.values.into_vec().into_iter().next());
            }
            if let Some(key) = key {
                row[i] = convert_to(key, &model.fields()[i].value_type)?;
            }
        }
        result.push(row);
    }
    Ok(result)
}

pub async fn sql_update_rows<X: SqlExecutor>(
    executor: &mut X,
    predicate: &Group,
    assignments: &[(&str, Value)],
) -> Result<u64> {
    let plan = QueryPlan::new(predicate)?;
    let statement = executor.writer().write_update(&plan, assignments)?;
    log::debug!("{}", statement);
    Ok(executor.execute(statement).await?.rows_affected)
}

pub async fn sql_delete_rows<X: SqlExecutor>(executor: &mut X, predicate: &Group) -> Result<u64> {
    let plan = QueryPlan::new(predicate)?;
    let statement = executor.writer().write_delete(&plan)?;
    log::debug!("{}", statement);
    Ok(executor.execute(statement).await?.rows_affected)
}

pub async fn sql_create_models<X: SqlExecutor>(executor: &mut X, models: &[ModelRef]) -> Result<()> {
    for model in models {
        let statement = executor.writer().write_create_table(model, true);
        log::debug!("{}", statement);
        executor.execute(statement).await?;
    }
    Ok(())
}

pub async fn sql_drop_models<X: SqlExecutor>(executor: &mut X, models: &[ModelRef]) -> Result<()> {
    for model in models {
        let statement = executor.writer().write_drop_table(model, true);
        log::debug!("{}", statement);
        executor.execute(statement).await?;
    }
    Ok(())
}

/// Runs a transaction control statement (BEGIN, COMMIT, ROLLBACK) written by `write`.
pub async fn sql_transaction_statement<X: SqlExecutor>(
    executor: &mut X,
    write: impl FnOnce(&X::Writer, &mut String),
) -> Result<()> {
    let mut sql = String::new();
    write(executor.writer(), &mut sql);
    log::debug!("{}", sql);
    executor.execute(Statement::new(sql)).await?;
    Ok(())
}
