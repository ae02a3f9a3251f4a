//! Warehouse access: pool setup, execution of compiled statements, and
//! row-to-JSON conversion keyed on the native Postgres type names.

use rust_decimal::prelude::ToPrimitive;
use serde_json::{json, Map, Value};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{Column, PgPool, Row, TypeInfo};
use tracing::{info, instrument};

use crate::config::Settings;
use crate::core::schema::ScalarValue;
use crate::core::CompiledQuery;

pub async fn init_pool(settings: &Settings) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .connect(&settings.database_url)
        .await?;
    Ok(pool)
}

/// Execute a compiled statement, binding each parameter in order, and return
/// the rows as JSON objects.
#[instrument(skip(pool, query), fields(binds = query.binds.len()))]
pub async fn fetch_all(pool: &PgPool, query: &CompiledQuery) -> Result<Vec<Value>, sqlx::Error> {
    info!(sql = %query.sql, "executing query");
    let mut stmt = sqlx::query(&query.sql);
    for value in &query.binds {
        stmt = match value {
            ScalarValue::Int(v) => stmt.bind(*v),
            ScalarValue::Float(v) => stmt.bind(*v),
            ScalarValue::Text(v) => stmt.bind(v.clone()),
        };
    }
    let rows = stmt.fetch_all(pool).await?;
    Ok(rows.iter().map(row_to_json).collect())
}

pub fn row_to_json(row: &PgRow) -> Value {
    let mut map = Map::new();
    for col in row.columns() {
        let name = col.name();
        let type_name = col.type_info().name();

        let val = match type_name {
            "INT2" | "INT4" => {
                let v: Option<i32> = row.try_get(name).unwrap_or(None);
                json!(v)
            }
            "INT8" => {
                let v: Option<i64> = row.try_get(name).unwrap_or(None);
                json!(v)
            }
            "FLOAT4" | "FLOAT8" => {
                let v: Option<f64> = row.try_get(name).unwrap_or(None);
                json!(v)
            }
            "NUMERIC" => {
                let v: Option<rust_decimal::Decimal> = row.try_get(name).unwrap_or(None);
                json!(v.and_then(|d| d.to_f64()))
            }
            "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => {
                let v: Option<String> = row.try_get(name).unwrap_or(None);
                json!(v)
            }
            "BOOL" => {
                let v: Option<bool> = row.try_get(name).unwrap_or(None);
                json!(v)
            }
            "DATE" => {
                let v: Option<chrono::NaiveDate> = row.try_get(name).unwrap_or(None);
                json!(v.map(|d| d.to_string()))
            }
            "TIMESTAMP" | "TIMESTAMPTZ" => {
                let v: Option<chrono::NaiveDateTime> = row.try_get(name).unwrap_or(None);
                json!(v.map(|dt| dt.to_string()))
            }
            "JSON" | "JSONB" => {
                let v: Option<Value> = row.try_get(name).unwrap_or(None);
                v.unwrap_or(Value::Null)
            }
            _ => {
                let v: Option<String> = row.try_get(name).unwrap_or(None);
                json!(v)
            }
        };
        map.insert(name.to_string(), val);
    }
    Value::Object(map)
}
