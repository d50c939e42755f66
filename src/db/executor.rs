use std::future::Future;

use anyhow::{bail, Context, Result};
use tokio_postgres::types::{ToSql, Type};
use tokio_postgres::{Client, Statement};
use tracing::debug;

use crate::value::{Row, Value};

/// Runs rendered statements.
///
/// Implemented for a plain [`tokio_postgres::Client`] and for a
/// [`deadpool_postgres::Pool`]; tests substitute an in-memory recorder.
pub trait Executor {
    fn query_rows(
        &self,
        sql: &str,
        args: &[Value],
    ) -> impl Future<Output = Result<Vec<Row>>> + Send;
}

impl Executor for Client {
    async fn query_rows(&self, sql: &str, args: &[Value]) -> Result<Vec<Row>> {
        let statement = self
            .prepare(sql)
            .await
            .with_context(|| format!("Failed to prepare: {}", sql))?;
        run(self, &statement, args).await
    }
}

impl Executor for deadpool_postgres::Pool {
    async fn query_rows(&self, sql: &str, args: &[Value]) -> Result<Vec<Row>> {
        let client = self.get().await.context("Failed to get a pooled connection")?;
        let statement = client
            .prepare_cached(sql)
            .await
            .with_context(|| format!("Failed to prepare: {}", sql))?;
        run(&client, &statement, args).await
    }
}

async fn run(client: &Client, statement: &Statement, args: &[Value]) -> Result<Vec<Row>> {
    let types = statement.params();
    if types.len() != args.len() {
        bail!(
            "statement expects {} parameters, got {}",
            types.len(),
            args.len()
        );
    }
    let params = args
        .iter()
        .zip(types)
        .map(|(value, ty)| bind_value(value, ty))
        .collect::<Result<Vec<_>>>()?;
    let refs: Vec<&(dyn ToSql + Sync)> = params
        .iter()
        .map(|p| p.as_ref() as &(dyn ToSql + Sync))
        .collect();

    let rows = client.query(statement, &refs).await.context("Query failed")?;
    debug!(rows = rows.len(), "query returned");
    Ok(rows.iter().map(decode_row).collect())
}

/// Convert a value to the Rust type Postgres inferred for its placeholder.
fn bind_value(value: &Value, ty: &Type) -> Result<Box<dyn ToSql + Sync + Send>> {
    Ok(match value {
        Value::Null => typed_null(ty),
        Value::Bool(b) => Box::new(*b),
        Value::Int(i) => match *ty {
            Type::INT2 => Box::new(i16::try_from(*i).context("value out of range for int2")?),
            Type::INT4 => Box::new(i32::try_from(*i).context("value out of range for int4")?),
            Type::FLOAT4 => Box::new(*i as f32),
            Type::FLOAT8 => Box::new(*i as f64),
            _ => Box::new(*i),
        },
        Value::Float(f) => match *ty {
            Type::FLOAT4 => Box::new(*f as f32),
            _ => Box::new(*f),
        },
        Value::Text(s) => Box::new(s.clone()),
        other => bail!("cannot bind {:?} as {}", other, ty),
    })
}

fn typed_null(ty: &Type) -> Box<dyn ToSql + Sync + Send> {
    match *ty {
        Type::BOOL => Box::new(None::<bool>),
        Type::INT2 => Box::new(None::<i16>),
        Type::INT4 => Box::new(None::<i32>),
        Type::INT8 => Box::new(None::<i64>),
        Type::FLOAT4 => Box::new(None::<f32>),
        Type::FLOAT8 => Box::new(None::<f64>),
        _ => Box::new(None::<String>),
    }
}

fn decode_row(row: &tokio_postgres::Row) -> Row {
    row.columns()
        .iter()
        .enumerate()
        .map(|(idx, col)| decode_value(row, idx, col.type_()))
        .collect()
}

fn decode_value(row: &tokio_postgres::Row, idx: usize, pg_type: &Type) -> Value {
    match *pg_type {
        Type::BOOL => row
            .try_get::<_, Option<bool>>(idx)
            .ok()
            .flatten()
            .map(Value::Bool)
            .unwrap_or(Value::Null),
        Type::INT2 => row
            .try_get::<_, Option<i16>>(idx)
            .ok()
            .flatten()
            .map(|v| Value::Int(v.into()))
            .unwrap_or(Value::Null),
        Type::INT4 => row
            .try_get::<_, Option<i32>>(idx)
            .ok()
            .flatten()
            .map(|v| Value::Int(v.into()))
            .unwrap_or(Value::Null),
        Type::INT8 => row
            .try_get::<_, Option<i64>>(idx)
            .ok()
            .flatten()
            .map(Value::Int)
            .unwrap_or(Value::Null),
        Type::FLOAT4 => row
            .try_get::<_, Option<f32>>(idx)
            .ok()
            .flatten()
            .map(|v| Value::Float(v.into()))
            .unwrap_or(Value::Null),
        Type::FLOAT8 => row
            .try_get::<_, Option<f64>>(idx)
            .ok()
            .flatten()
            .map(Value::Float)
            .unwrap_or(Value::Null),
        _ => row
            .try_get::<_, Option<String>>(idx)
            .ok()
            .flatten()
            .map(Value::Text)
            .unwrap_or(Value::Null),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_narrows_integers() {
        assert!(bind_value(&Value::Int(7), &Type::INT4).is_ok());
        let err = bind_value(&Value::Int(i64::MAX), &Type::INT2).err().unwrap();
        assert!(err.to_string().contains("int2"));
    }

    #[test]
    fn test_bind_rejects_lists() {
        let err = bind_value(&Value::List(vec![]), &Type::TEXT).err().unwrap();
        assert!(err.to_string().contains("cannot bind"));
    }

    #[test]
    fn test_null_binds_for_any_type() {
        for ty in [Type::BOOL, Type::INT8, Type::FLOAT8, Type::TEXT, Type::UUID] {
            assert!(bind_value(&Value::Null, &ty).is_ok());
        }
    }
}
