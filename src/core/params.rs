//! Parameter Normalizer: raw query-string pairs in, typed filter clauses and
//! select/group/order/pagination specs out. Everything downstream works on
//! the types produced here; raw strings never travel further.

use crate::core::error::{BuildError, QueryBuildError};
use crate::core::schema::{FieldId, ScalarType, ScalarValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Like,
    Between,
    NotNull,
}

/// Value-prefix tokens, longest first so `gte:` wins over `gt:`.
const OPERATOR_PREFIXES: &[(&str, Operator)] = &[
    ("between:", Operator::Between),
    ("notnull:", Operator::NotNull),
    ("like:", Operator::Like),
    ("gte:", Operator::Gte),
    ("lte:", Operator::Lte),
    ("gt:", Operator::Gt),
    ("lt:", Operator::Lt),
    ("ne:", Operator::Ne),
];

/// One parameterized predicate. `values` holds the bind values in render
/// order; `NotNull` is the one operator that binds nothing.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterClause {
    pub field: FieldId,
    pub op: Operator,
    pub values: Vec<ScalarValue>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggFunc {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggFunc {
    pub fn sql_name(self) -> &'static str {
        match self {
            AggFunc::Count => "COUNT",
            AggFunc::Sum => "SUM",
            AggFunc::Avg => "AVG",
            AggFunc::Min => "MIN",
            AggFunc::Max => "MAX",
        }
    }

    fn parse(token: &str) -> Option<AggFunc> {
        match token {
            "count" => Some(AggFunc::Count),
            "sum" => Some(AggFunc::Sum),
            "avg" => Some(AggFunc::Avg),
            "min" => Some(AggFunc::Min),
            "max" => Some(AggFunc::Max),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectItem {
    Column {
        field: FieldId,
        alias: Option<String>,
    },
    /// `field: None` means `COUNT(*)`.
    Aggregate {
        func: AggFunc,
        field: Option<FieldId>,
        alias: String,
    },
    /// Every column of the base table (`tr.*`). Produced only by the
    /// fixed-shape queries in the compiler, never by the select parser.
    AllBase,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub fn sql(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OrderTarget {
    Field(FieldId),
    /// An aggregation alias such as `count` or `sum_size`; validated against
    /// the final select list by the assembler.
    Alias(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderTerm {
    pub target: OrderTarget,
    pub dir: Direction,
}

/// Fully normalized request, ready for join resolution and assembly.
#[derive(Debug, Default)]
pub struct NormalizedRequest {
    pub filters: Vec<FilterClause>,
    /// `None` means no explicit `select`; the assembler substitutes pattern
    /// defaults (or an implied aggregate select when grouping).
    pub select: Option<Vec<SelectItem>>,
    pub group_by: Vec<FieldId>,
    pub order_by: Vec<OrderTerm>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Parse raw `(key, value)` pairs in request order. Repeated filter keys are
/// legal and produce independent ANDed clauses, which is how ranges like
/// `year=gte:2020&year=lte:2023` arrive.
pub fn normalize(
    params: &[(String, String)],
    max_limit: i64,
) -> Result<NormalizedRequest, QueryBuildError> {
    let mut req = NormalizedRequest::default();

    for (key, value) in params {
        match key.as_str() {
            "select" => req.select = Some(parse_select(value)?),
            "groupBy" => req.group_by = parse_group_by(value)?,
            "orderBy" => req.order_by = parse_order_by(value)?,
            "limit" => {
                let n = parse_non_negative(key, value)?;
                req.limit = Some(n.min(max_limit));
            }
            "offset" => req.offset = Some(parse_non_negative(key, value)?),
            _ => {
                let field = FieldId::resolve(key)
                    .map_err(|e| QueryBuildError::for_param(key, e))?;
                req.filters.push(parse_filter(field, key, value)?);
            }
        }
    }

    Ok(req)
}

fn parse_filter(
    field: FieldId,
    key: &str,
    raw: &str,
) -> Result<FilterClause, QueryBuildError> {
    for (prefix, op) in OPERATOR_PREFIXES {
        let Some(rest) = raw.strip_prefix(prefix) else {
            continue;
        };
        let values = match op {
            Operator::NotNull => Vec::new(),
            Operator::Between => {
                let parts: Vec<&str> = rest.splitn(2, ',').collect();
                if parts.len() != 2 {
                    return Err(QueryBuildError::for_param(
                        key,
                        BuildError::InvalidParameter(format!(
                            "`between:` expects two comma-separated values, got `{rest}`"
                        )),
                    ));
                }
                vec![coerce(field, key, parts[0])?, coerce(field, key, parts[1])?]
            }
            // LIKE patterns stay text; wildcards are part of the bound
            // value, never the template.
            Operator::Like => vec![ScalarValue::Text(rest.to_string())],
            _ => vec![coerce(field, key, rest)?],
        };
        return Ok(FilterClause {
            field,
            op: *op,
            values,
        });
    }

    // No operator prefix: a comma implies IN, otherwise plain equality.
    if raw.contains(',') {
        let values = raw
            .split(',')
            .map(|v| coerce(field, key, v))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(FilterClause {
            field,
            op: Operator::In,
            values,
        })
    } else {
        Ok(FilterClause {
            field,
            op: Operator::Eq,
            values: vec![coerce(field, key, raw)?],
        })
    }
}

fn coerce(field: FieldId, key: &str, raw: &str) -> Result<ScalarValue, QueryBuildError> {
    let raw = raw.trim();
    let bad = || {
        QueryBuildError::for_param(
            key,
            BuildError::InvalidParameter(format!(
                "cannot coerce `{raw}` for field `{key}`"
            )),
        )
    };
    match field.scalar_type() {
        ScalarType::Int => raw.parse::<i64>().map(ScalarValue::Int).map_err(|_| bad()),
        ScalarType::Float => raw.parse::<f64>().map(ScalarValue::Float).map_err(|_| bad()),
        ScalarType::Text => Ok(ScalarValue::Text(raw.to_string())),
    }
}

fn parse_select(raw: &str) -> Result<Vec<SelectItem>, QueryBuildError> {
    let mut items = Vec::new();
    for token in raw.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        if token == "count" {
            items.push(SelectItem::Aggregate {
                func: AggFunc::Count,
                field: None,
                alias: "count".to_string(),
            });
        } else if let Some((func_tok, field_tok)) = token.split_once(':') {
            let func = AggFunc::parse(func_tok).ok_or_else(|| {
                QueryBuildError::for_param(
                    "select",
                    BuildError::InvalidParameter(format!(
                        "unknown aggregation function `{func_tok}`"
                    )),
                )
            })?;
            let field = FieldId::resolve(field_tok)
                .map_err(|e| QueryBuildError::for_param("select", e))?;
            items.push(SelectItem::Aggregate {
                func,
                field: Some(field),
                alias: format!("{func_tok}_{field_tok}"),
            });
        } else {
            let field = FieldId::resolve(token)
                .map_err(|e| QueryBuildError::for_param("select", e))?;
            items.push(SelectItem::Column { field, alias: None });
        }
    }
    if items.is_empty() {
        return Err(QueryBuildError::for_param(
            "select",
            BuildError::InvalidParameter("empty select list".to_string()),
        ));
    }
    Ok(items)
}

fn parse_group_by(raw: &str) -> Result<Vec<FieldId>, QueryBuildError> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| FieldId::resolve(t).map_err(|e| QueryBuildError::for_param("groupBy", e)))
        .collect()
}

fn parse_order_by(raw: &str) -> Result<Vec<OrderTerm>, QueryBuildError> {
    let mut terms = Vec::new();
    for token in raw.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        let (name, dir) = match token.split_once(':') {
            Some((name, dir_tok)) => {
                let dir = match dir_tok.trim().to_ascii_lowercase().as_str() {
                    "asc" => Direction::Asc,
                    "desc" => Direction::Desc,
                    other => {
                        return Err(QueryBuildError::for_param(
                            "orderBy",
                            BuildError::InvalidParameter(format!(
                                "unknown sort direction `{other}`"
                            )),
                        ))
                    }
                };
                (name.trim(), dir)
            }
            None => (token, Direction::Asc),
        };
        // Names that are not schema fields may still be aggregation aliases
        // (`count`, `sum_size`); the assembler settles that.
        let target = match FieldId::resolve(name) {
            Ok(field) => OrderTarget::Field(field),
            Err(_) => OrderTarget::Alias(name.to_string()),
        };
        terms.push(OrderTerm { target, dir });
    }
    Ok(terms)
}

fn parse_non_negative(key: &str, raw: &str) -> Result<i64, QueryBuildError> {
    let n: i64 = raw.trim().parse().map_err(|_| {
        QueryBuildError::for_param(
            key,
            BuildError::InvalidParameter(format!("`{key}` expects a non-negative integer, got `{raw}`")),
        )
    })?;
    if n < 0 {
        return Err(QueryBuildError::for_param(
            key,
            BuildError::InvalidParameter(format!("`{key}` must not be negative")),
        ));
    }
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(list: &[(&str, &str)]) -> Vec<(String, String)> {
        list.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn bare_value_is_equality() {
        let req = normalize(&pairs(&[("year", "2023")]), 500).unwrap();
        assert_eq!(
            req.filters,
            vec![FilterClause {
                field: FieldId::Year,
                op: Operator::Eq,
                values: vec![ScalarValue::Int(2023)],
            }]
        );
    }

    #[test]
    fn operator_prefixes_parse() {
        let req = normalize(
            &pairs(&[("year", "gte:2020"), ("size", "lt:100.5"), ("type", "ne:2")]),
            500,
        )
        .unwrap();
        assert_eq!(req.filters[0].op, Operator::Gte);
        assert_eq!(req.filters[0].values, vec![ScalarValue::Int(2020)]);
        assert_eq!(req.filters[1].op, Operator::Lt);
        assert_eq!(req.filters[1].values, vec![ScalarValue::Float(100.5)]);
        assert_eq!(req.filters[2].op, Operator::Ne);
    }

    #[test]
    fn comma_list_implies_in() {
        let req = normalize(&pairs(&[("industry", "32,34")]), 500).unwrap();
        assert_eq!(req.filters[0].op, Operator::In);
        assert_eq!(
            req.filters[0].values,
            vec![ScalarValue::Int(32), ScalarValue::Int(34)]
        );
    }

    #[test]
    fn repeated_key_yields_two_clauses() {
        let req = normalize(&pairs(&[("year", "gte:2020"), ("year", "lte:2023")]), 500).unwrap();
        assert_eq!(req.filters.len(), 2);
        assert_eq!(req.filters[0].op, Operator::Gte);
        assert_eq!(req.filters[1].op, Operator::Lte);
        assert_eq!(req.filters[1].field, FieldId::Year);
    }

    #[test]
    fn between_requires_two_values() {
        let req = normalize(&pairs(&[("year", "between:2020,2023")]), 500).unwrap();
        assert_eq!(req.filters[0].op, Operator::Between);
        assert_eq!(req.filters[0].values.len(), 2);

        let err = normalize(&pairs(&[("year", "between:2020")]), 500).unwrap_err();
        assert!(matches!(err.source, BuildError::InvalidParameter(_)));
        assert_eq!(err.param.as_deref(), Some("year"));
    }

    #[test]
    fn notnull_binds_nothing() {
        let req = normalize(&pairs(&[("size", "notnull:")]), 500).unwrap();
        assert_eq!(req.filters[0].op, Operator::NotNull);
        assert!(req.filters[0].values.is_empty());
    }

    #[test]
    fn like_value_stays_text_with_wildcards() {
        let req = normalize(&pairs(&[("company", "like:%Acme%")]), 500).unwrap();
        assert_eq!(req.filters[0].op, Operator::Like);
        assert_eq!(
            req.filters[0].values,
            vec![ScalarValue::Text("%Acme%".to_string())]
        );
    }

    #[test]
    fn coercion_failure_names_field_and_value() {
        let err = normalize(&pairs(&[("year", "next")]), 500).unwrap_err();
        assert_eq!(err.param.as_deref(), Some("year"));
        match err.source {
            BuildError::InvalidParameter(msg) => {
                assert!(msg.contains("next"));
                assert!(msg.contains("year"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn unknown_filter_key_is_unresolvable() {
        let err = normalize(&pairs(&[("unknownField", "5")]), 500).unwrap_err();
        assert_eq!(
            err.source,
            BuildError::UnresolvableField("unknownField".into())
        );
    }

    #[test]
    fn order_by_parses_direction_and_defaults_to_asc() {
        let req = normalize(&pairs(&[("orderBy", "year:desc,month")]), 500).unwrap();
        assert_eq!(
            req.order_by,
            vec![
                OrderTerm {
                    target: OrderTarget::Field(FieldId::Year),
                    dir: Direction::Desc,
                },
                OrderTerm {
                    target: OrderTarget::Field(FieldId::Month),
                    dir: Direction::Asc,
                },
            ]
        );
    }

    #[test]
    fn order_by_count_is_an_alias() {
        let req = normalize(&pairs(&[("orderBy", "count:desc")]), 500).unwrap();
        assert_eq!(
            req.order_by[0].target,
            OrderTarget::Alias("count".to_string())
        );
    }

    #[test]
    fn order_by_bad_direction_fails() {
        let err = normalize(&pairs(&[("orderBy", "year:down")]), 500).unwrap_err();
        assert_eq!(err.param.as_deref(), Some("orderBy"));
        assert!(matches!(err.source, BuildError::InvalidParameter(_)));
    }

    #[test]
    fn select_parses_columns_and_aggregates() {
        let req = normalize(&pairs(&[("select", "companyName,count,sum:size")]), 500).unwrap();
        let items = req.select.unwrap();
        assert_eq!(
            items[0],
            SelectItem::Column {
                field: FieldId::CompanyName,
                alias: None,
            }
        );
        assert_eq!(
            items[1],
            SelectItem::Aggregate {
                func: AggFunc::Count,
                field: None,
                alias: "count".to_string(),
            }
        );
        assert_eq!(
            items[2],
            SelectItem::Aggregate {
                func: AggFunc::Sum,
                field: Some(FieldId::Size),
                alias: "sum_size".to_string(),
            }
        );
    }

    #[test]
    fn select_rejects_unknown_function() {
        let err = normalize(&pairs(&[("select", "median:size")]), 500).unwrap_err();
        assert_eq!(err.param.as_deref(), Some("select"));
    }

    #[test]
    fn limit_is_clamped_not_rejected() {
        let req = normalize(&pairs(&[("limit", "999999999")]), 500).unwrap();
        assert_eq!(req.limit, Some(500));
    }

    #[test]
    fn negative_offset_is_rejected() {
        let err = normalize(&pairs(&[("offset", "-1")]), 500).unwrap_err();
        assert_eq!(err.param.as_deref(), Some("offset"));
    }
}
