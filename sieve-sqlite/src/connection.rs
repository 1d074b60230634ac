use crate::{
    CBox, SqliteDriver, SqliteSqlWriter,
    bind::bind_all,
    error_message_from_ptr,
    extract::{extract_name, extract_value},
};
use async_stream::try_stream;
use libsqlite3_sys::{
    SQLITE_BUSY, SQLITE_DONE, SQLITE_OK, SQLITE_OPEN_CREATE, SQLITE_OPEN_FULLMUTEX,
    SQLITE_OPEN_READWRITE, SQLITE_OPEN_URI, SQLITE_ROW, sqlite3, sqlite3_busy_timeout,
    sqlite3_changes64, sqlite3_close, sqlite3_column_count, sqlite3_db_handle, sqlite3_errmsg,
    sqlite3_exec, sqlite3_finalize, sqlite3_last_insert_rowid, sqlite3_open_v2,
    sqlite3_prepare_v2, sqlite3_step, sqlite3_stmt,
};
use sieve_core::{
    Connection, Driver, Error, ErrorContext, Executor, Group, ModelRef, QueryResult, Result, Row,
    RowLabeled, RowNames, RowsAffected, SqlExecutor, SqlWriter, Statement, Value, Window,
    connect_failed, expect_scheme, sql_count_rows, sql_create_models, sql_delete_rows,
    sql_drop_models, sql_fetch_rows, sql_insert_rows, sql_transaction_statement, sql_update_rows,
    stream::Stream,
};
use std::{
    ffi::{CStr, CString, c_char, c_int},
    future::Future,
    ptr,
};
use tokio::task::{spawn_blocking, yield_now};

const BUSY_TIMEOUT_MS: c_int = 5_000;

/// Connection to a SQLite database, opened in serialized mode.
pub struct SqliteConnection {
    pub(crate) connection: CBox<*mut sqlite3>,
    writer: SqliteSqlWriter,
}

fn prepare(
    connection: CBox<*mut sqlite3>,
    sql: String,
    params: Vec<Value>,
) -> Result<CBox<*mut sqlite3_stmt>> {
    let sql = CString::new(sql).context("Could not create a CString from the query")?;
    unsafe {
        let mut statement = CBox::new(ptr::null_mut(), |p| {
            sqlite3_finalize(p);
        });
        let mut tail: *const c_char = ptr::null();
        let rc = sqlite3_prepare_v2(*connection, sql.as_ptr(), -1, &mut *statement, &mut tail);
        if rc != SQLITE_OK {
            return Err(Error::msg(
                error_message_from_ptr(sqlite3_errmsg(*connection)).to_string(),
            ));
        }
        if !tail.is_null() && !CStr::from_ptr(tail).to_string_lossy().trim().is_empty() {
            return Err(Error::msg("Cannot run more than one statement at a time"));
        }
        if !statement.is_null() {
            bind_all(*statement, &params)?;
        }
        Ok(statement)
    }
}

impl SqliteConnection {
    fn step_error(statement: *mut sqlite3_stmt) -> Error {
        unsafe {
            Error::msg(
                error_message_from_ptr(sqlite3_errmsg(sqlite3_db_handle(statement))).to_string(),
            )
        }
    }

    fn run_statement(
        &mut self,
        statement: Statement,
    ) -> impl Stream<Item = Result<QueryResult>> + Send {
        let connection = self.connection.borrowed();
        try_stream! {
            let context = format!("While running the query:\n{}", statement);
            let Statement { sql, params } = statement;
            let prepared = spawn_blocking(move || prepare(connection, sql, params))
                .await?
                .map_err(|e| {
                    let e = e.context(context.clone());
                    log::error!("{:#}", e);
                    e
                })?;
            // Null when the text holds nothing but whitespace or comments
            if !prepared.is_null() {
                let count = unsafe { sqlite3_column_count(*prepared) };
                let labels: RowNames = (0..count)
                    .map(|i| extract_name(*prepared, i))
                    .collect::<Result<_>>()?;
                loop {
                    match unsafe { sqlite3_step(*prepared) } {
                        SQLITE_BUSY => yield_now().await,
                        SQLITE_DONE => break,
                        SQLITE_ROW => {
                            let values = (0..count)
                                .map(|i| extract_value(*prepared, i))
                                .collect::<Result<Row>>()?;
                            yield QueryResult::Row(RowLabeled::new(labels.clone(), values));
                        }
                        _ => {
                            let error = Self::step_error(*prepared).context(context.clone());
                            log::error!("{:#}", error);
                            Err(error)?;
                        }
                    }
                }
                if count == 0 {
                    let (changes, last_id) = unsafe {
                        let db = sqlite3_db_handle(*prepared);
                        (sqlite3_changes64(db), sqlite3_last_insert_rowid(db))
                    };
                    yield QueryResult::Affected(RowsAffected {
                        rows_affected: changes.max(0) as u64,
                        last_affected_id: Some(last_id),
                    });
                }
            }
        }
    }
}

impl SqlExecutor for SqliteConnection {
    type Writer = SqliteSqlWriter;

    fn writer(&self) -> &Self::Writer {
        &self.writer
    }

    fn run(&mut self, statement: Statement) -> impl Stream<Item = Result<QueryResult>> + Send {
        self.run_statement(statement)
    }
}

impl Executor for SqliteConnection {
    fn fetch_rows(
        &mut self,
        predicate: &Group,
        window: Window,
    ) -> impl Future<Output = Result<Vec<Row>>> + Send {
        sql_fetch_rows(self, predicate, window)
    }

    fn count_rows(&mut self, predicate: &Group) -> impl Future<Output = Result<u64>> + Send {
        sql_count_rows(self, predicate)
    }

    fn insert_rows(
        &mut self,
        model: &ModelRef,
        rows: Vec<Row>,
    ) -> impl Future<Output = Result<Vec<Row>>> + Send {
        sql_insert_rows(self, model, rows)
    }

    fn update_rows(
        &mut self,
        predicate: &Group,
        assignments: &[(&str, Value)],
    ) -> impl Future<Output = Result<u64>> + Send {
        sql_update_rows(self, predicate, assignments)
    }

    fn delete_rows(&mut self, predicate: &Group) -> impl Future<Output = Result<u64>> + Send {
        sql_delete_rows(self, predicate)
    }

    fn create_models(&mut self, models: &[ModelRef]) -> impl Future<Output = Result<()>> + Send {
        sql_create_models(self, models)
    }

    fn drop_models(&mut self, models: &[ModelRef]) -> impl Future<Output = Result<()>> + Send {
        sql_drop_models(self, models)
    }
}

impl Connection for SqliteConnection {
    /// Opens `sqlite://<path>[?<uri parameters>]`, `sqlite://:memory:` for an in-memory database.
    ///
    /// The location is handed to SQLite as a `file:` URI, parameters like `mode=ro` apply.
    async fn connect(url: &str) -> Result<SqliteConnection> {
        expect_scheme(url, SqliteDriver::NAME)?;
        let location = &url[SqliteDriver::NAME.len() + "://".len()..];
        let uri = CString::new(format!("file:{}", location))
            .map_err(|e| connect_failed(Error::new(e), url))?;
        let connection = spawn_blocking(move || unsafe {
            let mut connection = CBox::new(ptr::null_mut(), |p| {
                sqlite3_close(p);
            });
            let rc = sqlite3_open_v2(
                uri.as_ptr(),
                &mut *connection,
                SQLITE_OPEN_READWRITE | SQLITE_OPEN_CREATE | SQLITE_OPEN_URI | SQLITE_OPEN_FULLMUTEX,
                ptr::null(),
            );
            if rc != SQLITE_OK {
                return Err(Error::msg(
                    error_message_from_ptr(sqlite3_errmsg(*connection)).to_string(),
                ));
            }
            sqlite3_busy_timeout(*connection, BUSY_TIMEOUT_MS);
            Ok(connection)
        })
        .await
        .map_err(|e| connect_failed(Error::new(e), url))?
        .map_err(|e| connect_failed(e, url))?;
        Ok(Self {
            connection,
            writer: SqliteSqlWriter,
        })
    }

    async fn begin_native(&mut self) -> Result<()> {
        sql_transaction_statement(self, |writer, out| writer.write_transaction_begin(out)).await
    }

    async fn commit_native(&mut self) -> Result<()> {
        sql_transaction_statement(self, |writer, out| writer.write_transaction_commit(out)).await
    }

    async fn rollback_native(&mut self) -> Result<()> {
        sql_transaction_statement(self, |writer, out| writer.write_transaction_rollback(out)).await
    }

    fn abandon_native(&mut self) {
        let mut sql = String::new();
        self.writer.write_transaction_rollback(&mut sql);
        let Ok(sql) = CString::new(sql) else {
            return;
        };
        unsafe {
            let rc = sqlite3_exec(
                *self.connection,
                sql.as_ptr(),
                None,
                ptr::null_mut(),
                ptr::null_mut(),
            );
            if rc != SQLITE_OK {
                log::error!(
                    "Could not roll back the abandoned transaction: {}",
                    error_message_from_ptr(sqlite3_errmsg(*self.connection))
                );
            }
        }
    }
}
