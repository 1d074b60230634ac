use mongodb::bson::{Binary, Bson, DateTime, Document, spec::BinarySubtype};
use sieve_core::{
    ErrorContext, ModelRef, Result, Row, Value, convert_to, date_to_text, time_to_text,
};
use time::{OffsetDateTime, PrimitiveDateTime};
use uuid::Uuid;

use crate::document_field;

fn millis(at: OffsetDateTime) -> Result<i64> {
    Ok(i64::try_from(at.unix_timestamp_nanos() / 1_000_000)?)
}

/// Document form of `value`.
///
/// Dates and times are stored as sortable text, decimals and uuids as plain text and timestamps as
/// BSON dates (millisecond precision).
pub fn value_to_bson(value: &Value) -> Result<Bson> {
    Ok(match value {
        Value::Boolean(Some(v)) => Bson::Boolean(*v),
        Value::Int8(Some(v)) => Bson::Int32((*v).into()),
        Value::Int16(Some(v)) => Bson::Int32((*v).into()),
        Value::Int32(Some(v)) => Bson::Int32(*v),
        Value::Int64(Some(v)) => Bson::Int64(*v),
        Value::UInt8(Some(v)) => Bson::Int32((*v).into()),
        Value::UInt16(Some(v)) => Bson::Int32((*v).into()),
        Value::UInt32(Some(v)) => Bson::Int64((*v).into()),
        Value::UInt64(Some(v)) => Bson::Int64(
            i64::try_from(*v)
                .with_context(|| format!("{} does not fit a document integer", v))?,
        ),
        Value::Float32(Some(v)) => Bson::Double((*v).into()),
        Value::Float64(Some(v)) => Bson::Double(*v),
        Value::Decimal(Some(v)) => Bson::String(v.to_string()),
        Value::Varchar(Some(v)) => Bson::String(v.clone()),
        Value::Blob(Some(v)) => Bson::Binary(Binary {
            subtype: BinarySubtype::Generic,
            bytes: v.to_vec(),
        }),
        Value::Date(Some(v)) => Bson::String(date_to_text(v)?),
        Value::Time(Some(v)) => Bson::String(time_to_text(v)?),
        Value::Timestamp(Some(v)) => Bson::DateTime(DateTime::from_millis(millis(v.assume_utc())?)),
        Value::TimestampWithTimezone(Some(v)) => Bson::DateTime(DateTime::from_millis(millis(*v)?)),
        Value::Uuid(Some(v)) => Bson::String(v.to_string()),
        _ => Bson::Null,
    })
}

/// Reads `bson` as a value of the same type as `prototype`.
pub fn bson_to_value(bson: &Bson, prototype: &Value) -> Result<Value> {
    let value = match bson {
        Bson::Null | Bson::Undefined => return Ok(prototype.as_null()),
        Bson::Boolean(v) => Value::Boolean(Some(*v)),
        Bson::Int32(v) => Value::Int32(Some(*v)),
        Bson::Int64(v) => Value::Int64(Some(*v)),
        Bson::Double(v) => Value::Float64(Some(*v)),
        Bson::String(v) => Value::Varchar(Some(v.clone())),
        Bson::Binary(Binary {
            subtype: BinarySubtype::Uuid,
            bytes,
        }) => Value::Uuid(Some(Uuid::from_slice(bytes)?)),
        Bson::Binary(v) => Value::Blob(Some(v.bytes.clone().into_boxed_slice())),
        Bson::DateTime(v) => {
            let at = OffsetDateTime::from_unix_timestamp_nanos(
                i128::from(v.timestamp_millis()) * 1_000_000,
            )?;
            match prototype {
                Value::TimestampWithTimezone(..) => Value::TimestampWithTimezone(Some(at)),
                _ => Value::Timestamp(Some(PrimitiveDateTime::new(at.date(), at.time()))),
            }
        }
        Bson::ObjectId(v) => Value::Varchar(Some(v.to_hex())),
        other => {
            return Err(sieve_core::Error::msg(format!(
                "Cannot decode the document value `{}`",
                other
            )));
        }
    };
    convert_to(value, prototype)
}

/// Document storing `row`, a null key stored as `_id` is left for the server to generate.
pub fn row_to_document(model: &ModelRef, row: &[Value]) -> Result<Document> {
    let mut document = Document::new();
    for (index, value) in row.iter().enumerate() {
        let name = document_field(model, index);
        if name == "_id" && value.is_null() {
            continue;
        }
        document.insert(name, value_to_bson(value)?);
    }
    Ok(document)
}

/// Fields of `model` read from `document`, a missing one is null.
pub fn document_to_row(model: &ModelRef, document: &Document) -> Result<Row> {
    model
        .fields()
        .iter()
        .enumerate()
        .map(|(index, field)| match document.get(document_field(model, index)) {
            Some(bson) => bson_to_value(bson, &field.value_type).with_context(|| {
                format!("While reading `{}.{}`", model.name(), field.name)
            }),
            None => Ok(field.value_type.as_null()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use time::macros::{date, datetime};

    #[test]
    fn temporal_values_keep_their_order() {
        assert_eq!(
            value_to_bson(&Value::Date(Some(date!(2024 - 02 - 29)))).unwrap(),
            Bson::String("2024-02-29".into())
        );
        let at = datetime!(2001-09-11 08:46:00);
        let stored = value_to_bson(&Value::Timestamp(Some(at))).unwrap();
        assert!(matches!(stored, Bson::DateTime(..)));
        assert_eq!(
            bson_to_value(&stored, &Value::Timestamp(None)).unwrap(),
            Value::Timestamp(Some(at))
        );
        assert_eq!(
            bson_to_value(&Bson::String("1970-01-01".into()), &Value::Date(None)).unwrap(),
            Value::Date(Some(date!(1970 - 01 - 01)))
        );
    }

    #[test]
    fn numbers_come_back_to_the_declared_type() {
        assert_eq!(
            bson_to_value(&Bson::Int32(-12), &Value::Int16(None)).unwrap(),
            Value::Int16(Some(-12))
        );
        assert_eq!(
            bson_to_value(&Bson::String("12.34".into()), &Value::Decimal(None)).unwrap(),
            Value::Decimal(Some(Decimal::new(1234, 2)))
        );
        assert!(bson_to_value(&Bson::Int32(70_000), &Value::Int16(None)).is_err());
        assert!(value_to_bson(&Value::UInt64(Some(u64::MAX))).is_err());
    }

    #[test]
    fn nulls() {
        assert_eq!(value_to_bson(&Value::Varchar(None)).unwrap(), Bson::Null);
        assert_eq!(value_to_bson(&Value::Null).unwrap(), Bson::Null);
        assert_eq!(
            bson_to_value(&Bson::Null, &Value::Uuid(None)).unwrap(),
            Value::Uuid(None)
        );
        assert!(bson_to_value(&Bson::MinKey, &Value::Varchar(None)).is_err());
    }
}
