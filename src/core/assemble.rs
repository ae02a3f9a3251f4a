//! Clause Assembler: renders the final statement from normalized parts.
//!
//! The one invariant everything here serves: no request-supplied scalar ever
//! lands in the SQL text. Values travel in `CompiledQuery::binds` and the
//! text only carries `$n` placeholders.

use crate::core::error::{BuildError, QueryBuildError};
use crate::core::params::{
    AggFunc, FilterClause, NormalizedRequest, Operator, OrderTarget, SelectItem,
};
use crate::core::pattern::Pattern;
use crate::core::schema::{FieldId, JoinSet, ScalarValue, BASE_ALIAS, BASE_TABLE};

/// The sole artifact handed to the execution layer. Immutable once produced.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub sql: String,
    pub binds: Vec<ScalarValue>,
}

/// Effective select list after defaulting: either the base table's wildcard
/// or a concrete item list.
enum Select {
    Wildcard,
    Items(Vec<SelectItem>),
}

pub fn assemble(
    req: &NormalizedRequest,
    pattern: Pattern,
    schema: &str,
) -> Result<CompiledQuery, QueryBuildError> {
    let select = effective_select(req, pattern)?;

    // Which plain fields orderBy may reference. `None` lifts the
    // restriction: with no explicit select and no aggregation the select
    // surface is the pattern default / wildcard superset.
    let order_fields: Option<Vec<FieldId>> = match (&select, req.group_by.is_empty()) {
        (_, false) => Some(req.group_by.clone()),
        (Select::Items(items), true) if req.select.is_some() => Some(
            items
                .iter()
                .filter_map(|i| match i {
                    SelectItem::Column { field, .. } => Some(*field),
                    SelectItem::Aggregate { .. } | SelectItem::AllBase => None,
                })
                .collect(),
        ),
        _ => None,
    };
    let agg_aliases: Vec<&str> = match &select {
        Select::Items(items) => items
            .iter()
            .filter_map(|i| match i {
                SelectItem::Aggregate { alias, .. } => Some(alias.as_str()),
                SelectItem::Column { .. } | SelectItem::AllBase => None,
            })
            .collect(),
        Select::Wildcard => Vec::new(),
    };

    // Join resolution in first-reference order: filters, select, groupBy,
    // orderBy, then pattern extras.
    let mut joins = JoinSet::new();
    for f in &req.filters {
        joins.require_field(f.field);
    }
    if let Select::Items(items) = &select {
        for item in items {
            match item {
                SelectItem::Column { field, .. } => joins.require_field(*field),
                SelectItem::Aggregate { field, .. } => {
                    if let Some(field) = field {
                        joins.require_field(*field);
                    }
                }
                SelectItem::AllBase => {}
            }
        }
    }
    for field in &req.group_by {
        joins.require_field(*field);
    }
    for term in &req.order_by {
        if let OrderTarget::Field(field) = &term.target {
            joins.require_field(*field);
        }
    }
    // Pattern joins are advisory defaults: they apply only when the caller
    // asked for nothing explicit, so they can never multiply the rows of an
    // explicit aggregation.
    if req.select.is_none() && req.group_by.is_empty() {
        for key in pattern.descriptor().extra_joins {
            joins.require(*key);
        }
    }

    let mut parts: Vec<String> = Vec::new();
    let mut binds: Vec<ScalarValue> = Vec::new();

    parts.push(format!("SELECT {}", render_select(&select)));
    parts.push(format!("FROM {} {}", qualify(schema, BASE_TABLE), BASE_ALIAS));
    for key in joins.iter() {
        let def = key.def();
        parts.push(format!(
            "JOIN {} {} ON {}",
            qualify(schema, def.table),
            def.alias,
            def.on
        ));
    }

    if !req.filters.is_empty() {
        let predicates: Vec<String> = req
            .filters
            .iter()
            .map(|f| render_predicate(f, &mut binds))
            .collect();
        parts.push(format!("WHERE {}", predicates.join(" AND ")));
    }

    if !req.group_by.is_empty() {
        let cols: Vec<&str> = req.group_by.iter().map(|f| f.column()).collect();
        parts.push(format!("GROUP BY {}", cols.join(", ")));
    }

    if !req.order_by.is_empty() {
        let mut terms = Vec::new();
        for term in &req.order_by {
            let expr = match &term.target {
                OrderTarget::Alias(name) => {
                    if !agg_aliases.iter().any(|a| *a == name) {
                        return Err(QueryBuildError::for_param(
                            "orderBy",
                            BuildError::UnresolvableField(name.clone()),
                        ));
                    }
                    name.as_str()
                }
                OrderTarget::Field(field) => {
                    if let Some(allowed) = &order_fields {
                        if !allowed.contains(field) {
                            return Err(QueryBuildError::for_param(
                                "orderBy",
                                BuildError::InvalidQuery(format!(
                                    "orderBy field `{}` is not selected or grouped",
                                    field.column()
                                )),
                            ));
                        }
                    }
                    field.column()
                }
            };
            terms.push(format!("{} {}", expr, term.dir.sql()));
        }
        parts.push(format!("ORDER BY {}", terms.join(", ")));
    }

    // Pagination renders literally: both values were already validated as
    // non-negative integers and the limit clamped upstream.
    if let Some(limit) = req.limit {
        parts.push(format!("LIMIT {limit}"));
    }
    if let Some(offset) = req.offset {
        parts.push(format!("OFFSET {offset}"));
    }

    Ok(CompiledQuery {
        sql: parts.join(" "),
        binds,
    })
}

/// Resolve the select list, applying pattern defaults and the
/// group/aggregate consistency rule.
fn effective_select(req: &NormalizedRequest, pattern: Pattern) -> Result<Select, QueryBuildError> {
    if !req.group_by.is_empty() {
        // Grouped query: start from the explicit select, or an implied
        // COUNT(*) when there is none, then append the group fields.
        let mut items = match &req.select {
            Some(items) => items.clone(),
            None => vec![SelectItem::Aggregate {
                func: AggFunc::Count,
                field: None,
                alias: "count".to_string(),
            }],
        };
        for item in &items {
            if let SelectItem::Column { field, .. } = item {
                if !req.group_by.contains(field) {
                    return Err(QueryBuildError::for_param(
                        "select",
                        BuildError::InvalidQuery(format!(
                            "select field `{}` is neither aggregated nor grouped",
                            field.column()
                        )),
                    ));
                }
            }
        }
        for field in &req.group_by {
            let present = items.iter().any(
                |i| matches!(i, SelectItem::Column { field: f, .. } if f == field),
            );
            if !present {
                items.push(SelectItem::Column {
                    field: *field,
                    alias: None,
                });
            }
        }
        return Ok(Select::Items(items));
    }

    match &req.select {
        Some(items) => {
            let has_agg = items
                .iter()
                .any(|i| matches!(i, SelectItem::Aggregate { .. }));
            let has_col = items
                .iter()
                .any(|i| matches!(i, SelectItem::Column { .. } | SelectItem::AllBase));
            if has_agg && has_col {
                return Err(QueryBuildError::for_param(
                    "select",
                    BuildError::InvalidQuery(
                        "non-aggregated select fields require groupBy when aggregating"
                            .to_string(),
                    ),
                ));
            }
            Ok(Select::Items(items.clone()))
        }
        None => {
            let defaults = pattern.descriptor().default_columns;
            if defaults.is_empty() {
                Ok(Select::Wildcard)
            } else {
                Ok(Select::Items(
                    defaults
                        .iter()
                        .map(|(field, alias)| SelectItem::Column {
                            field: *field,
                            alias: alias.map(str::to_string),
                        })
                        .collect(),
                ))
            }
        }
    }
}

fn render_select(select: &Select) -> String {
    match select {
        Select::Wildcard => format!("{BASE_ALIAS}.*"),
        Select::Items(items) => {
            let rendered: Vec<String> = items
                .iter()
                .map(|item| match item {
                    SelectItem::AllBase => format!("{BASE_ALIAS}.*"),
                    SelectItem::Column { field, alias: None } => field.column().to_string(),
                    SelectItem::Column {
                        field,
                        alias: Some(alias),
                    } => format!("{} AS {}", field.column(), alias),
                    SelectItem::Aggregate { func, field, alias } => {
                        let inner = field.map_or("*", |f| f.column());
                        format!("{}({}) AS {}", func.sql_name(), inner, alias)
                    }
                })
                .collect();
            rendered.join(", ")
        }
    }
}

/// Render one predicate, pushing its values onto the bind list. Placeholder
/// numbering continues across clauses.
fn render_predicate(clause: &FilterClause, binds: &mut Vec<ScalarValue>) -> String {
    let col = clause.field.column();
    let mut placeholder = |value: &ScalarValue| {
        binds.push(value.clone());
        format!("${}", binds.len())
    };
    match clause.op {
        Operator::Eq => format!("{col} = {}", placeholder(&clause.values[0])),
        Operator::Ne => format!("{col} != {}", placeholder(&clause.values[0])),
        Operator::Gt => format!("{col} > {}", placeholder(&clause.values[0])),
        Operator::Gte => format!("{col} >= {}", placeholder(&clause.values[0])),
        Operator::Lt => format!("{col} < {}", placeholder(&clause.values[0])),
        Operator::Lte => format!("{col} <= {}", placeholder(&clause.values[0])),
        Operator::Like => format!("{col} LIKE {}", placeholder(&clause.values[0])),
        Operator::In => {
            let slots: Vec<String> = clause.values.iter().map(&mut placeholder).collect();
            format!("{col} IN ({})", slots.join(", "))
        }
        Operator::Between => {
            let lo = placeholder(&clause.values[0]);
            let hi = placeholder(&clause.values[1]);
            format!("{col} BETWEEN {lo} AND {hi}")
        }
        Operator::NotNull => format!("{col} IS NOT NULL"),
    }
}

fn qualify(schema: &str, table: &str) -> String {
    if schema.is_empty() {
        table.to_string()
    } else {
        format!("{schema}.{table}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::params::normalize;

    fn build(list: &[(&str, &str)]) -> Result<CompiledQuery, QueryBuildError> {
        let params: Vec<(String, String)> = list
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let req = normalize(&params, 500)?;
        let pattern = Pattern::detect(&req.filters);
        assemble(&req, pattern, "ciq")
    }

    #[test]
    fn bare_filter_renders_wildcard_select() {
        let q = build(&[("year", "2023")]).unwrap();
        assert_eq!(
            q.sql,
            "SELECT tr.* FROM ciq.ciqTransaction tr WHERE tr.announcedYear = $1"
        );
        assert_eq!(q.binds, vec![ScalarValue::Int(2023)]);
    }

    #[test]
    fn range_filters_stay_two_predicates() {
        let q = build(&[("year", "gte:2020"), ("year", "lte:2023")]).unwrap();
        assert!(q
            .sql
            .contains("WHERE tr.announcedYear >= $1 AND tr.announcedYear <= $2"));
        assert_eq!(q.binds, vec![ScalarValue::Int(2020), ScalarValue::Int(2023)]);
    }

    #[test]
    fn aggregation_with_ungrouped_column_is_rejected() {
        let err = build(&[("select", "companyName,sum:size")]).unwrap_err();
        assert!(matches!(err.source, BuildError::InvalidQuery(_)));
        assert_eq!(err.param.as_deref(), Some("select"));
    }

    #[test]
    fn grouped_select_must_cover_plain_columns() {
        let err = build(&[
            ("select", "companyName,countryName,count"),
            ("groupBy", "companyName"),
        ])
        .unwrap_err();
        assert!(matches!(err.source, BuildError::InvalidQuery(_)));
    }

    #[test]
    fn order_by_unknown_alias_is_unresolvable() {
        let err = build(&[("year", "2023"), ("orderBy", "bogus_alias:desc")]).unwrap_err();
        assert_eq!(
            err.source,
            BuildError::UnresolvableField("bogus_alias".into())
        );
    }

    #[test]
    fn order_by_unselected_field_with_grouping_is_invalid() {
        let err = build(&[("groupBy", "companyName"), ("orderBy", "year:desc")]).unwrap_err();
        assert!(matches!(err.source, BuildError::InvalidQuery(_)));
    }

    #[test]
    fn order_by_explicitly_selected_field_is_allowed() {
        let q = build(&[("select", "companyName,year"), ("orderBy", "year:desc")]).unwrap();
        assert!(q.sql.ends_with("ORDER BY tr.announcedYear DESC"));
    }

    #[test]
    fn like_wildcards_never_reach_sql_text() {
        let q = build(&[("company", "like:%O'Brien%")]).unwrap();
        assert!(!q.sql.contains("O'Brien"));
        assert!(q.sql.contains("c.companyName LIKE $1"));
        assert_eq!(q.binds, vec![ScalarValue::Text("%O'Brien%".to_string())]);
    }

    #[test]
    fn offset_renders_after_limit() {
        let q = build(&[("year", "2023"), ("limit", "10"), ("offset", "20")]).unwrap();
        assert!(q.sql.ends_with("LIMIT 10 OFFSET 20"));
    }

    #[test]
    fn unqualified_schema_renders_bare_tables() {
        let req = normalize(&[("year".to_string(), "2023".to_string())], 500).unwrap();
        let q = assemble(&req, Pattern::Generic, "").unwrap();
        assert!(q.sql.contains("FROM ciqTransaction tr"));
    }
}
