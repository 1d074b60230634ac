use crate::{Error, Result, Value};
use rust_decimal::{
    Decimal,
    prelude::{FromPrimitive, ToPrimitive},
};
use std::{any, borrow::Cow, sync::Arc};
use time::{
    Date, OffsetDateTime, PrimitiveDateTime, Time, format_description::well_known::Rfc3339,
    macros::format_description,
};
use uuid::Uuid;

/// Conversion between native Rust types and the dynamically typed [`Value`].
///
/// `try_from_value` accepts the canonical variant for the type and, where it is lossless or range
/// checked, the representations backends hand back for it: SQLite returns every integer as `Int64`
/// and stores dates or uuids as text, documents store decimals as text.
///
/// ```rust
/// use sieve_core::{AsValue, Value};
/// let v = 42i32.as_value();
/// assert!(matches!(v, Value::Int32(Some(42))));
/// let n: i64 = AsValue::try_from_value(v).unwrap();
/// assert_eq!(n, 42);
/// ```
pub trait AsValue {
    /// The typed NULL for this type, doubles as the declared type of a field.
    fn as_empty_value() -> Value;
    fn as_value(self) -> Value;
    fn try_from_value(value: Value) -> Result<Self>
    where
        Self: Sized;
}

impl<T: AsValue> From<T> for Value {
    fn from(value: T) -> Self {
        value.as_value()
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Varchar(Some(value.into()))
    }
}

fn mismatch<T>(value: &Value) -> Error {
    Error::msg(format!(
        "Cannot convert a value of type {} (`{}`) into {}",
        value.type_name(),
        value,
        any::type_name::<T>()
    ))
}

fn integer_payload(value: &Value) -> Option<i128> {
    match *value {
        Value::Int8(Some(v)) => Some(v as i128),
        Value::Int16(Some(v)) => Some(v as i128),
        Value::Int32(Some(v)) => Some(v as i128),
        Value::Int64(Some(v)) => Some(v as i128),
        Value::UInt8(Some(v)) => Some(v as i128),
        Value::UInt16(Some(v)) => Some(v as i128),
        Value::UInt32(Some(v)) => Some(v as i128),
        Value::UInt64(Some(v)) => Some(v as i128),
        _ => None,
    }
}

macro_rules! impl_as_value_integer {
    ($($source:ty => $variant:path),+ $(,)?) => {
        $(
            impl AsValue for $source {
                fn as_empty_value() -> Value {
                    $variant(None)
                }
                fn as_value(self) -> Value {
                    $variant(Some(self))
                }
                fn try_from_value(value: Value) -> Result<Self> {
                    if let $variant(Some(v)) = value {
                        return Ok(v);
                    }
                    match integer_payload(&value) {
                        Some(v) => <$source>::try_from(v).map_err(|_| {
                            Error::msg(format!(
                                "Value {} is out of range for {}",
                                v,
                                stringify!($source)
                            ))
                        }),
                        None => Err(mismatch::<Self>(&value)),
                    }
                }
            }
        )+
    };
}

impl_as_value_integer!(
    i8 => Value::Int8,
    i16 => Value::Int16,
    i32 => Value::Int32,
    i64 => Value::Int64,
    u8 => Value::UInt8,
    u16 => Value::UInt16,
    u32 => Value::UInt32,
    u64 => Value::UInt64,
);

impl AsValue for bool {
    fn as_empty_value() -> Value {
        Value::Boolean(None)
    }
    fn as_value(self) -> Value {
        Value::Boolean(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        if let Value::Boolean(Some(v)) = value {
            return Ok(v);
        }
        integer_payload(&value)
            .map(|v| v != 0)
            .ok_or_else(|| mismatch::<Self>(&value))
    }
}

impl AsValue for f64 {
    fn as_empty_value() -> Value {
        Value::Float64(None)
    }
    fn as_value(self) -> Value {
        Value::Float64(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Float64(Some(v)) => Ok(v),
            Value::Float32(Some(v)) => Ok(v as f64),
            Value::Decimal(Some(v)) => v.to_f64().ok_or_else(|| {
                Error::msg(format!("Decimal value {} does not fit a f64", v))
            }),
            ref v => integer_payload(v)
                .map(|v| v as f64)
                .ok_or_else(|| mismatch::<Self>(v)),
        }
    }
}

impl AsValue for f32 {
    fn as_empty_value() -> Value {
        Value::Float32(None)
    }
    fn as_value(self) -> Value {
        Value::Float32(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Float32(Some(v)) => Ok(v),
            Value::Float64(Some(v)) => Ok(v as f32),
            ref v => integer_payload(v)
                .map(|v| v as f32)
                .ok_or_else(|| mismatch::<Self>(v)),
        }
    }
}

impl AsValue for Decimal {
    fn as_empty_value() -> Value {
        Value::Decimal(None)
    }
    fn as_value(self) -> Value {
        Value::Decimal(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Decimal(Some(v)) => Ok(v),
            Value::Float64(Some(v)) => Decimal::from_f64(v)
                .ok_or_else(|| Error::msg(format!("Cannot represent {} as a decimal", v))),
            Value::Float32(Some(v)) => Decimal::from_f32(v)
                .ok_or_else(|| Error::msg(format!("Cannot represent {} as a decimal", v))),
            Value::Varchar(Some(ref v)) => v
                .parse::<Decimal>()
                .map_err(|e| Error::new(e).context(format!("Cannot parse `{}` as decimal", v))),
            ref v => integer_payload(v)
                .and_then(Decimal::from_i128)
                .ok_or_else(|| mismatch::<Self>(v)),
        }
    }
}

impl AsValue for String {
    fn as_empty_value() -> Value {
        Value::Varchar(None)
    }
    fn as_value(self) -> Value {
        Value::Varchar(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Varchar(Some(v)) => Ok(v),
            v => Err(mismatch::<Self>(&v)),
        }
    }
}

impl AsValue for Cow<'static, str> {
    fn as_empty_value() -> Value {
        Value::Varchar(None)
    }
    fn as_value(self) -> Value {
        Value::Varchar(Some(self.into_owned()))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        String::try_from_value(value).map(Into::into)
    }
}

impl AsValue for Arc<str> {
    fn as_empty_value() -> Value {
        Value::Varchar(None)
    }
    fn as_value(self) -> Value {
        Value::Varchar(Some(self.to_string()))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        String::try_from_value(value).map(Into::into)
    }
}

impl AsValue for Box<[u8]> {
    fn as_empty_value() -> Value {
        Value::Blob(None)
    }
    fn as_value(self) -> Value {
        Value::Blob(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Blob(Some(v)) => Ok(v),
            v => Err(mismatch::<Self>(&v)),
        }
    }
}

impl AsValue for Vec<u8> {
    fn as_empty_value() -> Value {
        Value::Blob(None)
    }
    fn as_value(self) -> Value {
        Value::Blob(Some(self.into_boxed_slice()))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        Box::<[u8]>::try_from_value(value).map(Into::into)
    }
}

/// Textual forms used by backends that keep temporal values as text.
pub fn date_to_text(value: &Date) -> Result<String> {
    Ok(value.format(format_description!("[year]-[month]-[day]"))?)
}

pub fn time_to_text(value: &Time) -> Result<String> {
    Ok(value.format(format_description!(
        "[hour]:[minute]:[second].[subsecond]"
    ))?)
}

pub fn timestamp_to_text(value: &PrimitiveDateTime) -> Result<String> {
    Ok(value.format(format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond]"
    ))?)
}

pub fn timestamp_with_timezone_to_text(value: &OffsetDateTime) -> Result<String> {
    Ok(value.format(&Rfc3339)?)
}

impl AsValue for Date {
    fn as_empty_value() -> Value {
        Value::Date(None)
    }
    fn as_value(self) -> Value {
        Value::Date(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Date(Some(v)) => Ok(v),
            Value::Varchar(Some(ref v)) => Date::parse(v, format_description!("[year]-[month]-[day]"))
                .map_err(|e| Error::new(e).context(format!("Cannot parse `{}` as a date", v))),
            v => Err(mismatch::<Self>(&v)),
        }
    }
}

impl AsValue for Time {
    fn as_empty_value() -> Value {
        Value::Time(None)
    }
    fn as_value(self) -> Value {
        Value::Time(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Time(Some(v)) => Ok(v),
            Value::Varchar(Some(ref v)) => {
                Time::parse(v, format_description!("[hour]:[minute]:[second].[subsecond]"))
                    .or_else(|_| Time::parse(v, format_description!("[hour]:[minute]:[second]")))
                    .map_err(|e| Error::new(e).context(format!("Cannot parse `{}` as a time", v)))
            }
            v => Err(mismatch::<Self>(&v)),
        }
    }
}

impl AsValue for PrimitiveDateTime {
    fn as_empty_value() -> Value {
        Value::Timestamp(None)
    }
    fn as_value(self) -> Value {
        Value::Timestamp(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Timestamp(Some(v)) => Ok(v),
            Value::Varchar(Some(ref v)) => PrimitiveDateTime::parse(
                v,
                format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond]"),
            )
            .or_else(|_| {
                PrimitiveDateTime::parse(
                    v,
                    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
                )
            })
            .map_err(|e| Error::new(e).context(format!("Cannot parse `{}` as a timestamp", v))),
            v => Err(mismatch::<Self>(&v)),
        }
    }
}

impl AsValue for OffsetDateTime {
    fn as_empty_value() -> Value {
        Value::TimestampWithTimezone(None)
    }
    fn as_value(self) -> Value {
        Value::TimestampWithTimezone(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::TimestampWithTimezone(Some(v)) => Ok(v),
            Value::Varchar(Some(ref v)) => OffsetDateTime::parse(v, &Rfc3339).map_err(|e| {
                Error::new(e).context(format!("Cannot parse `{}` as a timestamp with time zone", v))
            }),
            v => Err(mismatch::<Self>(&v)),
        }
    }
}

impl AsValue for Uuid {
    fn as_empty_value() -> Value {
        Value::Uuid(None)
    }
    fn as_value(self) -> Value {
        Value::Uuid(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Uuid(Some(v)) => Ok(v),
            Value::Varchar(Some(ref v)) => Uuid::parse_str(v)
                .map_err(|e| Error::new(e).context(format!("Cannot parse `{}` as uuid", v))),
            Value::Blob(Some(ref v)) => Uuid::from_slice(v).map_err(Error::new),
            v => Err(mismatch::<Self>(&v)),
        }
    }
}

impl<T: AsValue> AsValue for Option<T> {
    fn as_empty_value() -> Value {
        T::as_empty_value()
    }
    fn as_value(self) -> Value {
        match self {
            Some(v) => v.as_value(),
            None => T::as_empty_value(),
        }
    }
    fn try_from_value(value: Value) -> Result<Self> {
        if value.is_null() {
            return Ok(None);
        }
        T::try_from_value(value).map(Some)
    }
}

/// Converts `value` to the variant of `prototype`, the way [`AsValue::try_from_value`] accepts it.
///
/// Backends hand values back in their storage representation (integers as `Int64`, dates as text),
/// this brings them back to the declared type of the field.
pub fn convert_to(value: Value, prototype: &Value) -> Result<Value> {
    if value.is_null() {
        return Ok(prototype.as_null());
    }
    if value.same_type(prototype) {
        return Ok(value);
    }
    Ok(match prototype {
        Value::Null => value,
        Value::Boolean(..) => bool::try_from_value(value)?.as_value(),
        Value::Int8(..) => i8::try_from_value(value)?.as_value(),
        Value::Int16(..) => i16::try_from_value(value)?.as_value(),
        Value::Int32(..) => i32::try_from_value(value)?.as_value(),
        Value::Int64(..) => i64::try_from_value(value)?.as_value(),
        Value::UInt8(..) => u8::try_from_value(value)?.as_value(),
        Value::UInt16(..) => u16::try_from_value(value)?.as_value(),
        Value::UInt32(..) => u32::try_from_value(value)?.as_value(),
        Value::UInt64(..) => u64::try_from_value(value)?.as_value(),
        Value::Float32(..) => f32::try_from_value(value)?.as_value(),
        Value::Float64(..) => f64::try_from_value(value)?.as_value(),
        Value::Decimal(..) => Decimal::try_from_value(value)?.as_value(),
        Value::Varchar(..) => String::try_from_value(value)?.as_value(),
        Value::Blob(..) => Box::<[u8]>::try_from_value(value)?.as_value(),
        Value::Date(..) => Date::try_from_value(value)?.as_value(),
        Value::Time(..) => Time::try_from_value(value)?.as_value(),
        Value::Timestamp(..) => PrimitiveDateTime::try_from_value(value)?.as_value(),
        Value::TimestampWithTimezone(..) => OffsetDateTime::try_from_value(value)?.as_value(),
        Value::Uuid(..) => Uuid::try_from_value(value)?.as_value(),
    })
}
