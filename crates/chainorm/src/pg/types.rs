//! Conversions between [`Value`] and PostgreSQL wire types.

use std::error::Error;
use std::sync::Arc;

use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use tokio_postgres::types::{FromSql, IsNull, ToSql, Type, to_sql_checked};
use uuid::Uuid;

use crate::error::{OrmError, OrmResult};
use crate::executor::Row;
use crate::value::Value;

type BoxError = Box<dyn Error + Sync + Send>;

/// Integers are narrowed or widened to the parameter's declared width so a
/// `Value::I64` can bind to an `int4` column.
fn int_to_sql(v: i64, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    match *ty {
        Type::INT2 => i16::try_from(v)?.to_sql(ty, out),
        Type::INT4 => i32::try_from(v)?.to_sql(ty, out),
        Type::INT8 => v.to_sql(ty, out),
        Type::FLOAT8 => (v as f64).to_sql(ty, out),
        _ => v.to_sql_checked(ty, out),
    }
}

impl ToSql for Value {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(v) => v.to_sql_checked(ty, out),
            Value::I16(v) => int_to_sql(i64::from(*v), ty, out),
            Value::I32(v) => int_to_sql(i64::from(*v), ty, out),
            Value::I64(v) => int_to_sql(*v, ty, out),
            Value::F32(v) if *ty == Type::FLOAT8 => f64::from(*v).to_sql(ty, out),
            Value::F32(v) => v.to_sql_checked(ty, out),
            Value::F64(v) => v.to_sql_checked(ty, out),
            Value::Text(v) => v.to_sql_checked(ty, out),
            Value::Bytes(v) => v.to_sql_checked(ty, out),
            Value::Timestamp(v) if *ty == Type::TIMESTAMP => v.naive_utc().to_sql(ty, out),
            Value::Timestamp(v) => v.to_sql_checked(ty, out),
            Value::NaiveTimestamp(v) => v.to_sql_checked(ty, out),
            Value::Date(v) => v.to_sql_checked(ty, out),
            Value::Uuid(v) => v.to_sql_checked(ty, out),
            Value::Json(v) => v.to_sql_checked(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

fn get<'a, T>(row: &'a tokio_postgres::Row, index: usize, column: &str) -> OrmResult<Option<T>>
where
    T: FromSql<'a>,
{
    row.try_get::<_, Option<T>>(index)
        .map_err(|e| OrmError::decode(column, e.to_string()))
}

fn decode_column(row: &tokio_postgres::Row, index: usize) -> OrmResult<Value> {
    let column = &row.columns()[index];
    let name = column.name();
    let ty = column.type_();

    let value = match *ty {
        Type::BOOL => get::<bool>(row, index, name)?.map(Value::Bool),
        Type::INT2 => get::<i16>(row, index, name)?.map(Value::I16),
        Type::INT4 => get::<i32>(row, index, name)?.map(Value::I32),
        Type::INT8 => get::<i64>(row, index, name)?.map(Value::I64),
        Type::FLOAT4 => get::<f32>(row, index, name)?.map(Value::F32),
        Type::FLOAT8 => get::<f64>(row, index, name)?.map(Value::F64),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => {
            get::<String>(row, index, name)?.map(Value::Text)
        }
        Type::BYTEA => get::<Vec<u8>>(row, index, name)?.map(Value::Bytes),
        Type::TIMESTAMPTZ => get::<DateTime<Utc>>(row, index, name)?.map(Value::Timestamp),
        Type::TIMESTAMP => get::<NaiveDateTime>(row, index, name)?.map(Value::NaiveTimestamp),
        Type::DATE => get::<NaiveDate>(row, index, name)?.map(Value::Date),
        Type::UUID => get::<Uuid>(row, index, name)?.map(Value::Uuid),
        Type::JSON | Type::JSONB => get::<serde_json::Value>(row, index, name)?.map(Value::Json),
        _ => {
            return Err(OrmError::decode(
                name,
                format!("unsupported column type `{ty}`"),
            ));
        }
    };
    Ok(value.unwrap_or(Value::Null))
}

/// Convert driver rows, sharing one column list across the result set.
pub(super) fn decode_rows(rows: &[tokio_postgres::Row]) -> OrmResult<Vec<Row>> {
    let Some(first) = rows.first() else {
        return Ok(Vec::new());
    };
    let columns: Arc<[String]> = first
        .columns()
        .iter()
        .map(|c| c.name().to_string())
        .collect();

    rows.iter()
        .map(|row| {
            let values = (0..row.len())
                .map(|i| decode_column(row, i))
                .collect::<OrmResult<Vec<_>>>()?;
            Ok(Row::new(Arc::clone(&columns), values))
        })
        .collect()
}
