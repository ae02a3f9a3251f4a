//! Transaction endpoints. All of them are thin: parameters go into the
//! compiler, the compiled statement goes to the pool, rows come back as
//! JSON. No SQL is written here.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::ApiError;
use crate::core::compiler;
use crate::infra::db;
use crate::models::response::TransactionListResponse;
use crate::state::AppState;

/// GET /api/v1/transactions
///
/// The flexible listing endpoint. Every recognized key is either a filter
/// (`type`, `year`, `country`, role ids, ...) or a control key (`select`,
/// `groupBy`, `orderBy`, `limit`, `offset`). Pairs are kept in request
/// order; repeated keys are how ranges are expressed.
pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<TransactionListResponse>, ApiError> {
    let include_metadata = params
        .iter()
        .any(|(k, v)| k == "includeMetadata" && v == "true");
    let params: Vec<(String, String)> = params
        .into_iter()
        .filter(|(k, _)| k != "includeMetadata")
        .collect();

    let query = compiler::compile(&params, &state.builder)?;
    let data = db::fetch_all(&state.db, &query).await?;

    let metadata = include_metadata.then(|| {
        json!({
            "queryParams": params,
            "resultCount": data.len(),
        })
    });
    Ok(Json(TransactionListResponse {
        count: data.len(),
        data,
        metadata,
    }))
}

#[derive(Debug, Deserialize, Default)]
pub struct ByIdOptions {
    #[serde(rename = "includeRelationships", default)]
    pub include_relationships: bool,
    #[serde(rename = "includeAdvisors", default)]
    pub include_advisors: bool,
}

/// GET /api/v1/transactions/{id}
pub async fn get_transaction(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Query(opts): Query<ByIdOptions>,
) -> Result<Json<Value>, ApiError> {
    let query = compiler::compile_by_id(id, &state.builder)?;
    let rows = db::fetch_all(&state.db, &query).await?;
    let Some(mut transaction) = rows.into_iter().next() else {
        return Err(ApiError::NotFound(format!("transaction {id} not found")));
    };

    if let Some(obj) = transaction.as_object_mut() {
        if opts.include_relationships {
            let query = compiler::compile_relationships(id, &state.builder)?;
            let rels = db::fetch_all(&state.db, &query).await?;
            obj.insert("relationships".to_string(), Value::Array(rels));
        }
        if opts.include_advisors {
            let query = compiler::compile_advisors(id, &state.builder)?;
            let advisors = db::fetch_all(&state.db, &query).await?;
            obj.insert("advisors".to_string(), Value::Array(advisors));
        }
    }

    Ok(Json(transaction))
}

/// GET /api/v1/transactions/summary/{year}
///
/// Aggregate statistics for one announced year; any extra query parameters
/// are applied as listing filters.
pub async fn get_transaction_summary(
    State(state): State<Arc<AppState>>,
    Path(year): Path<i64>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<Value>, ApiError> {
    let query = compiler::compile_summary(year, &params, &state.builder)?;
    let rows = db::fetch_all(&state.db, &query).await?;
    rows.into_iter()
        .next()
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("no transaction data for year {year}")))
}

#[derive(Debug, Deserialize)]
pub struct AggregateParams {
    #[serde(rename = "groupBy")]
    pub group_by: String,
    pub measure: String,
    pub field: Option<String>,
    #[serde(rename = "type")]
    pub type_: Option<String>,
    pub year: Option<String>,
    pub country: Option<String>,
    pub industry: Option<String>,
    pub limit: Option<String>,
}

/// GET /api/v1/transactions/aggregate
///
/// Convenience shape: `groupBy` + `measure` (+ `field`) desugar into the
/// listing grammar and go through the same compiler.
pub async fn get_transaction_aggregate(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AggregateParams>,
) -> Result<Json<Vec<Value>>, ApiError> {
    let measure = params.measure.to_ascii_lowercase();
    let (select_token, alias) = if measure == "count" {
        ("count".to_string(), "count".to_string())
    } else {
        let field = params.field.unwrap_or_else(|| "size".to_string());
        (format!("{measure}:{field}"), format!("{measure}_{field}"))
    };

    let mut pairs: Vec<(String, String)> = Vec::new();
    if let Some(v) = params.type_ {
        pairs.push(("type".to_string(), v));
    }
    if let Some(v) = params.year {
        pairs.push(("year".to_string(), v));
    }
    if let Some(v) = params.country {
        pairs.push(("country".to_string(), v));
    }
    if let Some(v) = params.industry {
        pairs.push(("industry".to_string(), v));
    }
    pairs.push(("select".to_string(), select_token));
    pairs.push(("groupBy".to_string(), params.group_by));
    pairs.push(("orderBy".to_string(), format!("{alias}:desc")));
    pairs.push((
        "limit".to_string(),
        params.limit.unwrap_or_else(|| "10".to_string()),
    ));

    let query = compiler::compile(&pairs, &state.builder)?;
    let data = db::fetch_all(&state.db, &query).await?;
    Ok(Json(data))
}
