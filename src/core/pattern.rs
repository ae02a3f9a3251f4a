//! Transaction-pattern detection. A pattern classifies the request's intent
//! from its filters and supplies default joins and columns; explicit
//! select/groupBy/filter fields always win over pattern defaults.

use crate::core::params::{FilterClause, Operator};
use crate::core::schema::{FieldId, JoinKey, ScalarValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pattern {
    MnA,
    Buyback,
    PrivatePlacement,
    Ipo,
    SecondaryOffering,
    Buyout,
    VcPe,
    SpinOff,
    Generic,
}

/// Default joins and columns a pattern contributes when the caller does not
/// ask for anything explicitly. Declarative on purpose: adding a pattern is
/// a new row here, not new branching in the assembler.
pub struct PatternDescriptor {
    pub extra_joins: &'static [JoinKey],
    /// `(field, response alias)` pairs. Empty means "all base columns".
    pub default_columns: &'static [(FieldId, Option<&'static str>)],
}

/// Transaction type ids as stored in the warehouse type table.
const TYPE_PRIVATE_PLACEMENT: i64 = 1;
const TYPE_MNA: i64 = 2;
const TYPE_IPO: i64 = 3;
const TYPE_SECONDARY_OFFERING: i64 = 4;
const TYPE_BUYOUT: i64 = 5;
const TYPE_VC_PE: i64 = 6;
const TYPE_SPIN_OFF: i64 = 7;
const TYPE_BUYBACK: i64 = 14;

impl Pattern {
    /// Pure function of the normalized filters: the `type` filter's value
    /// picks the pattern when it is a single equality; anything else falls
    /// back to `Generic`, which contributes nothing.
    pub fn detect(filters: &[FilterClause]) -> Pattern {
        let type_value = filters.iter().find_map(|f| {
            if f.field != FieldId::Type || f.op != Operator::Eq {
                return None;
            }
            match f.values.as_slice() {
                [ScalarValue::Int(v)] => Some(*v),
                _ => None,
            }
        });

        match type_value {
            Some(TYPE_PRIVATE_PLACEMENT) => Pattern::PrivatePlacement,
            Some(TYPE_MNA) => Pattern::MnA,
            Some(TYPE_IPO) => Pattern::Ipo,
            Some(TYPE_SECONDARY_OFFERING) => Pattern::SecondaryOffering,
            Some(TYPE_BUYOUT) => Pattern::Buyout,
            Some(TYPE_VC_PE) => Pattern::VcPe,
            Some(TYPE_SPIN_OFF) => Pattern::SpinOff,
            Some(TYPE_BUYBACK) => Pattern::Buyback,
            _ => Pattern::Generic,
        }
    }

    pub fn descriptor(self) -> &'static PatternDescriptor {
        use FieldId::*;
        use JoinKey as J;
        // Common single-company default column set.
        const COMPANY_DEFAULTS: &[(FieldId, Option<&str>)] = &[
            (TransactionId, None),
            (CompanyName, None),
            (Day, None),
            (Month, None),
            (Year, None),
            (Size, None),
            (Currency, None),
        ];
        match self {
            Pattern::MnA | Pattern::Buyout => &PatternDescriptor {
                extra_joins: &[J::Target, J::CompanyRel, J::RelType, J::Acquirer],
                default_columns: &[
                    (TransactionId, None),
                    (TargetName, Some("target")),
                    (AcquirerName, Some("acquirer")),
                    (Day, None),
                    (Month, None),
                    (Year, None),
                    (Size, None),
                    (Currency, None),
                ],
            },
            Pattern::VcPe => &PatternDescriptor {
                extra_joins: &[J::Company, J::CompanyRel, J::Investor],
                default_columns: &[
                    (TransactionId, None),
                    (CompanyName, None),
                    (InvestorName, Some("investor")),
                    (Year, None),
                    (Size, None),
                    (Currency, None),
                ],
            },
            Pattern::Buyback => &PatternDescriptor {
                extra_joins: &[J::TransactionType, J::Company],
                default_columns: COMPANY_DEFAULTS,
            },
            Pattern::PrivatePlacement
            | Pattern::Ipo
            | Pattern::SecondaryOffering
            | Pattern::SpinOff => &PatternDescriptor {
                extra_joins: &[J::Company],
                default_columns: COMPANY_DEFAULTS,
            },
            Pattern::Generic => &PatternDescriptor {
                extra_joins: &[],
                default_columns: &[],
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn type_filter(op: Operator, values: Vec<ScalarValue>) -> FilterClause {
        FilterClause {
            field: FieldId::Type,
            op,
            values,
        }
    }

    #[test]
    fn type_value_selects_pattern() {
        let cases = [
            (1, Pattern::PrivatePlacement),
            (2, Pattern::MnA),
            (3, Pattern::Ipo),
            (4, Pattern::SecondaryOffering),
            (5, Pattern::Buyout),
            (6, Pattern::VcPe),
            (7, Pattern::SpinOff),
            (14, Pattern::Buyback),
        ];
        for (id, expected) in cases {
            let filters = vec![type_filter(Operator::Eq, vec![ScalarValue::Int(id)])];
            assert_eq!(Pattern::detect(&filters), expected, "type id {id}");
        }
    }

    #[test]
    fn unknown_or_absent_type_is_generic() {
        assert_eq!(Pattern::detect(&[]), Pattern::Generic);
        let filters = vec![type_filter(Operator::Eq, vec![ScalarValue::Int(99)])];
        assert_eq!(Pattern::detect(&filters), Pattern::Generic);
    }

    #[test]
    fn non_equality_type_filter_is_generic() {
        let filters = vec![type_filter(
            Operator::In,
            vec![ScalarValue::Int(1), ScalarValue::Int(2)],
        )];
        assert_eq!(Pattern::detect(&filters), Pattern::Generic);
    }

    #[test]
    fn detection_is_deterministic() {
        let filters = vec![type_filter(Operator::Eq, vec![ScalarValue::Int(2)])];
        assert_eq!(Pattern::detect(&filters), Pattern::detect(&filters));
    }

    #[test]
    fn generic_contributes_nothing() {
        let d = Pattern::Generic.descriptor();
        assert!(d.extra_joins.is_empty());
        assert!(d.default_columns.is_empty());
    }
}
