use bytes::BytesMut;
use postgres_types::{FromSql, IsNull, ToSql, Type, to_sql_checked};
use rust_decimal::{Decimal, prelude::FromPrimitive};
use sieve_core::{Value, convert_to};
use std::{error::Error, io::Read};
use time::{Date, OffsetDateTime, PrimitiveDateTime, Time};
use uuid::Uuid;

/// Carries a [`Value`] through the Postgres binary protocol, in both directions.
#[derive(Debug)]
pub(crate) struct ValueHolder(pub(crate) Value);

impl From<Value> for ValueHolder {
    fn from(value: Value) -> Self {
        ValueHolder(value)
    }
}

/// Prototype of the value decoded from a Postgres type, `Value::Null` when unsupported.
pub(crate) fn postgres_type_to_value(ty: &Type) -> Value {
    match *ty {
        Type::BOOL => Value::Boolean(None),
        Type::CHAR => Value::Int8(None),
        Type::INT2 => Value::Int16(None),
        Type::INT4 => Value::Int32(None),
        Type::INT8 => Value::Int64(None),
        Type::OID => Value::UInt32(None),
        Type::FLOAT4 => Value::Float32(None),
        Type::FLOAT8 => Value::Float64(None),
        Type::NUMERIC => Value::Decimal(None),
        Type::VARCHAR | Type::TEXT | Type::NAME | Type::BPCHAR | Type::JSON | Type::XML => {
            Value::Varchar(None)
        }
        Type::BYTEA => Value::Blob(None),
        Type::DATE => Value::Date(None),
        Type::TIME => Value::Time(None),
        Type::TIMESTAMP => Value::Timestamp(None),
        Type::TIMESTAMPTZ => Value::TimestampWithTimezone(None),
        Type::UUID => Value::Uuid(None),
        _ => Value::Null,
    }
}

impl<'a> FromSql<'a> for ValueHolder {
    fn from_sql(ty: &Type, raw: &'a [u8]) -> Result<Self, Box<dyn Error + Sync + Send>> {
        Self::from_sql_nullable(ty, Some(raw))
    }
    fn from_sql_null(ty: &Type) -> Result<Self, Box<dyn Error + Sync + Send>> {
        Self::from_sql_nullable(ty, None)
    }
    fn from_sql_nullable(
        ty: &Type,
        raw: Option<&'a [u8]>,
    ) -> Result<Self, Box<dyn Error + Sync + Send>> {
        macro_rules! to_value {
            ($ty_var:ident, $raw:ident, $($($ty:path)|+ => ($value:path, $source:ty),)+) => {
                match *$ty_var {
                    $($($ty)|+ => $value(match $raw {
                        Some($raw) => Some(<$source>::from_sql($ty_var, $raw)?.into()),
                        None => None,
                    }),)+
                    _ => {
                        if let Some(mut raw) = $raw {
                            let mut buf = String::new();
                            let _ = raw.read_to_string(&mut buf);
                            return Err(sieve_core::Error::msg(format!(
                                "Cannot decode sql type: `{}`, value: `{}`",
                                $ty_var, buf
                            ))
                            .into());
                        }
                        Value::Null
                    }
                }
            };
        }
        let value = to_value!(ty, raw,
            Type::BOOL => (Value::Boolean, bool),
            Type::CHAR => (Value::Int8, i8),
            Type::INT2 => (Value::Int16, i16),
            Type::INT4 => (Value::Int32, i32),
            Type::INT8 => (Value::Int64, i64),
            Type::OID => (Value::UInt32, u32),
            Type::FLOAT4 => (Value::Float32, f32),
            Type::FLOAT8 => (Value::Float64, f64),
            Type::NUMERIC => (Value::Decimal, Decimal),
            Type::VARCHAR
            | Type::TEXT
            | Type::NAME
            | Type::BPCHAR
            | Type::JSON
            | Type::XML => (Value::Varchar, String),
            Type::BYTEA => (Value::Blob, Vec<u8>),
            Type::DATE => (Value::Date, Date),
            Type::TIME => (Value::Time, Time),
            Type::TIMESTAMP => (Value::Timestamp, PrimitiveDateTime),
            Type::TIMESTAMPTZ => (Value::TimestampWithTimezone, OffsetDateTime),
            Type::UUID => (Value::Uuid, Uuid),
        );
        Ok(value.into())
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}

impl ToSql for ValueHolder {
    /// Parameter types are inferred by the server from the statement, the value is first brought
    /// to that type (an `Int32` literal compared with a `SMALLINT` column is sent as `INT2`).
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, Box<dyn Error + Sync + Send>>
    where
        Self: Sized,
    {
        let value = match postgres_type_to_value(ty) {
            Value::Null => self.0.clone(),
            prototype => convert_to(self.0.clone(), &prototype)?,
        };
        match value {
            Value::Null => None::<String>.to_sql(ty, out),
            Value::Boolean(v) => v.to_sql(ty, out),
            Value::Int8(v) => v.to_sql(ty, out),
            Value::Int16(v) => v.to_sql(ty, out),
            Value::Int32(v) => v.to_sql(ty, out),
            Value::Int64(v) => v.to_sql(ty, out),
            Value::UInt8(v) => v.map(|v| v as i16).to_sql(ty, out),
            Value::UInt16(v) => v.map(|v| v as i32).to_sql(ty, out),
            Value::UInt32(v) => v.to_sql(ty, out),
            Value::UInt64(v) => v.and_then(Decimal::from_u64).to_sql(ty, out),
            Value::Float32(v) => v.to_sql(ty, out),
            Value::Float64(v) => v.to_sql(ty, out),
            Value::Decimal(v) => v.to_sql(ty, out),
            Value::Varchar(v) => v.to_sql(ty, out),
            Value::Blob(v) => v.as_deref().to_sql(ty, out),
            Value::Date(v) => v.to_sql(ty, out),
            Value::Time(v) => v.to_sql(ty, out),
            Value::Timestamp(v) => v.to_sql(ty, out),
            Value::TimestampWithTimezone(v) => v.to_sql(ty, out),
            Value::Uuid(v) => v.to_sql(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool
    where
        Self: Sized,
    {
        true
    }

    to_sql_checked!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameters_follow_the_inferred_type() {
        let mut out = BytesMut::new();
        ValueHolder(Value::Int32(Some(7)))
            .to_sql(&Type::INT2, &mut out)
            .expect("an int fits a smallint");
        assert_eq!(&out[..], &7i16.to_be_bytes());

        let mut out = BytesMut::new();
        ValueHolder(Value::Int32(Some(3)))
            .to_sql(&Type::FLOAT8, &mut out)
            .expect("an int fits a double");
        assert_eq!(&out[..], &3f64.to_be_bytes());

        let mut out = BytesMut::new();
        assert!(
            ValueHolder(Value::Int32(Some(70_000)))
                .to_sql(&Type::INT2, &mut out)
                .is_err()
        );
    }

    #[test]
    fn nulls_and_decoding() {
        let mut out = BytesMut::new();
        let is_null = ValueHolder(Value::Varchar(None))
            .to_sql(&Type::TEXT, &mut out)
            .expect("null text");
        assert!(matches!(is_null, IsNull::Yes));

        let decoded = ValueHolder::from_sql(&Type::INT8, &42i64.to_be_bytes()).expect("int8");
        assert_eq!(decoded.0, Value::Int64(Some(42)));
        let decoded = ValueHolder::from_sql_null(&Type::UUID).expect("null uuid");
        assert_eq!(decoded.0, Value::Uuid(None));
        assert!(ValueHolder::from_sql(&Type::POINT, b"(1,2)").is_err());
    }
}
