//! Query Compiler façade: normalize → detect pattern → resolve joins →
//! assemble, in that fixed order. Any stage failure aborts the whole build;
//! there is never a partially applied statement.
//!
//! The by-id, relationship, advisor and yearly-summary statements are fixed
//! filter/select shapes pushed through the same assembler, not separate
//! engines.

use tracing::debug;

use crate::core::assemble::{assemble, CompiledQuery};
use crate::core::error::QueryBuildError;
use crate::core::params::{normalize, AggFunc, FilterClause, NormalizedRequest, Operator, SelectItem};
use crate::core::pattern::Pattern;
use crate::core::schema::{FieldId, ScalarValue};

/// Request-independent compiler settings.
#[derive(Debug, Clone)]
pub struct BuilderConfig {
    /// Warehouse schema the tables live in; empty means unqualified.
    pub schema: String,
    /// Hard cap applied to the `limit` parameter.
    pub max_limit: i64,
}

/// Compile the flexible listing query from raw request parameters.
pub fn compile(
    params: &[(String, String)],
    cfg: &BuilderConfig,
) -> Result<CompiledQuery, QueryBuildError> {
    let req = normalize(params, cfg.max_limit)?;
    let pattern = Pattern::detect(&req.filters);
    debug!(?pattern, filters = req.filters.len(), "normalized request");
    let query = assemble(&req, pattern, &cfg.schema)?;
    debug!(sql = %query.sql, binds = query.binds.len(), "compiled query");
    Ok(query)
}

fn by_id_filter(id: i64) -> FilterClause {
    FilterClause {
        field: FieldId::TransactionId,
        op: Operator::Eq,
        values: vec![ScalarValue::Int(id)],
    }
}

/// Single transaction by id: all base columns plus the company and type
/// names.
pub fn compile_by_id(id: i64, cfg: &BuilderConfig) -> Result<CompiledQuery, QueryBuildError> {
    let req = NormalizedRequest {
        filters: vec![by_id_filter(id)],
        select: Some(vec![
            SelectItem::AllBase,
            SelectItem::Column {
                field: FieldId::CompanyName,
                alias: None,
            },
            SelectItem::Column {
                field: FieldId::TypeName,
                alias: None,
            },
        ]),
        ..Default::default()
    };
    assemble(&req, Pattern::Generic, &cfg.schema)
}

/// Company relationships of one transaction, one row per role link.
pub fn compile_relationships(
    id: i64,
    cfg: &BuilderConfig,
) -> Result<CompiledQuery, QueryBuildError> {
    let col = |field, alias: Option<&str>| SelectItem::Column {
        field,
        alias: alias.map(str::to_string),
    };
    let req = NormalizedRequest {
        filters: vec![by_id_filter(id)],
        select: Some(vec![
            col(FieldId::RelationTypeName, Some("relationshipType")),
            col(FieldId::RelatedCompanyId, None),
            col(FieldId::RelatedCompanyName, None),
            col(FieldId::LeadInvestor, None),
            col(FieldId::PercentAcquired, None),
        ]),
        ..Default::default()
    };
    assemble(&req, Pattern::Generic, &cfg.schema)
}

/// Advisors of one transaction.
pub fn compile_advisors(id: i64, cfg: &BuilderConfig) -> Result<CompiledQuery, QueryBuildError> {
    let col = |field| SelectItem::Column { field, alias: None };
    let req = NormalizedRequest {
        filters: vec![by_id_filter(id)],
        select: Some(vec![
            col(FieldId::AdvisorTypeName),
            col(FieldId::AdvisorId),
            col(FieldId::AdvisorName),
        ]),
        ..Default::default()
    };
    assemble(&req, Pattern::Generic, &cfg.schema)
}

/// Yearly summary: aggregate statistics over one announced year, with any
/// additional listing filters applied on top.
pub fn compile_summary(
    year: i64,
    extra: &[(String, String)],
    cfg: &BuilderConfig,
) -> Result<CompiledQuery, QueryBuildError> {
    let mut params: Vec<(String, String)> = vec![("year".to_string(), year.to_string())];
    params.extend(extra.iter().cloned());
    let mut req = normalize(&params, cfg.max_limit)?;

    let agg = |func: AggFunc, field: Option<FieldId>, alias: &str| SelectItem::Aggregate {
        func,
        field,
        alias: alias.to_string(),
    };
    req.select = Some(vec![
        SelectItem::Column {
            field: FieldId::Year,
            alias: None,
        },
        agg(AggFunc::Count, None, "totalTransactions"),
        agg(AggFunc::Sum, Some(FieldId::Size), "totalValue"),
        agg(AggFunc::Avg, Some(FieldId::Size), "averageValue"),
        agg(AggFunc::Min, Some(FieldId::Size), "minValue"),
        agg(AggFunc::Max, Some(FieldId::Size), "maxValue"),
    ]);
    req.group_by = vec![FieldId::Year];
    req.order_by.clear();

    assemble(&req, Pattern::Generic, &cfg.schema)
}
