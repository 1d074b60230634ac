use crate::error_message_from_ptr;
use libsqlite3_sys::*;
use rust_decimal::prelude::ToPrimitive;
use sieve_core::{
    Error, Result, Value, date_to_text, time_to_text, timestamp_to_text,
    timestamp_with_timezone_to_text, truncate_long,
};
use std::{
    ffi::{CStr, c_int},
    os::raw::{c_char, c_void},
};

unsafe fn bind_text(statement: *mut sqlite3_stmt, index: c_int, value: &str) -> c_int {
    unsafe {
        sqlite3_bind_text(
            statement,
            index,
            value.as_ptr() as *const c_char,
            value.len() as c_int,
            SQLITE_TRANSIENT(),
        )
    }
}

fn out_of_range(value: impl std::fmt::Display) -> Error {
    let error = Error::msg(format!(
        "Cannot bind `{}` into a sqlite integer because it's out of bounds",
        value
    ));
    log::error!("{:#}", error);
    error
}

/// Binds `value` to the 1 based parameter `index` of `statement`.
pub(crate) fn bind_value(statement: *mut sqlite3_stmt, index: c_int, value: &Value) -> Result<()> {
    unsafe {
        let rc = match value {
            v if v.is_null() => sqlite3_bind_null(statement, index),
            Value::Boolean(Some(v)) => sqlite3_bind_int(statement, index, *v as c_int),
            Value::Int8(Some(v)) => sqlite3_bind_int(statement, index, *v as c_int),
            Value::Int16(Some(v)) => sqlite3_bind_int(statement, index, *v as c_int),
            Value::Int32(Some(v)) => sqlite3_bind_int(statement, index, *v as c_int),
            Value::Int64(Some(v)) => sqlite3_bind_int64(statement, index, *v),
            Value::UInt8(Some(v)) => sqlite3_bind_int(statement, index, *v as c_int),
            Value::UInt16(Some(v)) => sqlite3_bind_int(statement, index, *v as c_int),
            Value::UInt32(Some(v)) => sqlite3_bind_int64(statement, index, *v as sqlite3_int64),
            Value::UInt64(Some(v)) => {
                let v = sqlite3_int64::try_from(*v).map_err(|_| out_of_range(v))?;
                sqlite3_bind_int64(statement, index, v)
            }
            Value::Float32(Some(v)) => sqlite3_bind_double(statement, index, *v as f64),
            Value::Float64(Some(v)) => sqlite3_bind_double(statement, index, *v),
            Value::Decimal(Some(v)) => sqlite3_bind_double(
                statement,
                index,
                v.to_f64().ok_or_else(|| {
                    Error::msg(format!("Cannot convert the Decimal value `{}` to f64", v))
                })?,
            ),
            Value::Varchar(Some(v)) => bind_text(statement, index, v),
            Value::Blob(Some(v)) => sqlite3_bind_blob(
                statement,
                index,
                v.as_ptr() as *const c_void,
                v.len() as c_int,
                SQLITE_TRANSIENT(),
            ),
            Value::Date(Some(v)) => bind_text(statement, index, &date_to_text(v)?),
            Value::Time(Some(v)) => bind_text(statement, index, &time_to_text(v)?),
            Value::Timestamp(Some(v)) => bind_text(statement, index, &timestamp_to_text(v)?),
            Value::TimestampWithTimezone(Some(v)) => {
                bind_text(statement, index, &timestamp_with_timezone_to_text(v)?)
            }
            Value::Uuid(Some(v)) => bind_text(statement, index, &v.to_string()),
            _ => {
                let error = Error::msg(format!("Cannot use a {:?} as a query parameter", value));
                log::error!("{:#}", error);
                return Err(error);
            }
        };
        if rc != SQLITE_OK {
            let db = sqlite3_db_handle(statement);
            let query = sqlite3_sql(statement);
            let error = Error::msg(error_message_from_ptr(sqlite3_errmsg(db)).to_string()).context(
                format!(
                    "Cannot bind parameter {} to query:\n{}",
                    index,
                    truncate_long(&CStr::from_ptr(query).to_string_lossy())
                ),
            );
            log::error!("{:#}", error);
            return Err(error);
        }
        Ok(())
    }
}

/// Binds every parameter, in placeholder order.
pub(crate) fn bind_all(statement: *mut sqlite3_stmt, params: &[Value]) -> Result<()> {
    unsafe {
        sqlite3_clear_bindings(statement);
        let expected = sqlite3_bind_parameter_count(statement) as usize;
        if expected != params.len() {
            let error = Error::msg(format!(
                "The statement expects {} parameters but {} were given",
                expected,
                params.len()
            ));
            log::error!("{:#}", error);
            return Err(error);
        }
    }
    for (i, value) in params.iter().enumerate() {
        bind_value(statement, i as c_int + 1, value)?;
    }
    Ok(())
}
