//! Static warehouse schema: the closed set of queryable fields, the join
//! graph rooted at the transaction table, and the resolver that derives the
//! minimal join list for a request.
//!
//! Everything here is immutable process-wide data; concurrent reads need no
//! synchronization.

use crate::core::error::BuildError;

/// Base table and its fixed alias. Every query is rooted here.
pub const BASE_TABLE: &str = "ciqTransaction";
pub const BASE_ALIAS: &str = "tr";

/// Scalar type a field's values coerce to before binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    Int,
    Float,
    Text,
}

/// A value ready to be bound as a statement parameter. Ordered, never
/// interpolated into SQL text.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    Int(i64),
    Float(f64),
    Text(String),
}

/// Every field the API can reference, anywhere a field name may appear.
/// Unknown names fail resolution at the normalizer boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldId {
    TransactionId,
    Type,
    TypeName,
    Year,
    Month,
    Day,
    Size,
    Status,
    StatusName,
    Currency,
    CurrencyCode,
    CompanyId,
    CompanyName,
    Industry,
    IndustryName,
    Country,
    CountryName,
    AcquirerId,
    AcquirerName,
    TargetId,
    TargetName,
    SellerId,
    SellerName,
    InvestorId,
    InvestorName,
    AdvisorId,
    AdvisorName,
    AdvisorTypeName,
    RelationType,
    RelationTypeName,
    RelatedCompanyId,
    RelatedCompanyName,
    LeadInvestor,
    PercentAcquired,
}

/// Joins the resolver knows how to make. Each key renders exactly one JOIN
/// under a fixed alias; role joins against the company table get one key
/// (and one alias) per role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinKey {
    TransactionType,
    Status,
    Company,
    Industry,
    Country,
    Currency,
    CompanyRel,
    RelType,
    RelatedCompany,
    Acquirer,
    Target,
    Seller,
    Investor,
    AdvisorLink,
    AdvisorType,
    AdvisorCompany,
}

pub struct FieldDef {
    /// Alias-qualified column, e.g. `tr.announcedYear`.
    pub column: &'static str,
    pub join: Option<JoinKey>,
    pub ty: ScalarType,
}

pub struct JoinDef {
    pub table: &'static str,
    pub alias: &'static str,
    pub on: &'static str,
    pub requires: &'static [JoinKey],
}

impl FieldId {
    /// Resolve a request parameter name. This is the only entry point from
    /// untrusted input into the schema.
    pub fn resolve(name: &str) -> Result<FieldId, BuildError> {
        use FieldId::*;
        let id = match name {
            "transactionId" => TransactionId,
            "type" => Type,
            "typeName" => TypeName,
            "year" => Year,
            "month" => Month,
            "day" => Day,
            "size" => Size,
            "status" => Status,
            "statusName" => StatusName,
            "currency" => Currency,
            "currencyCode" => CurrencyCode,
            "companyId" => CompanyId,
            "company" | "companyName" => CompanyName,
            "industry" => Industry,
            "industryName" => IndustryName,
            "country" => Country,
            "countryName" => CountryName,
            "acquirerId" => AcquirerId,
            "acquirer" => AcquirerName,
            "targetId" => TargetId,
            "target" => TargetName,
            "sellerId" => SellerId,
            "seller" => SellerName,
            "investorId" => InvestorId,
            "investor" => InvestorName,
            "advisorId" => AdvisorId,
            "advisor" => AdvisorName,
            "advisorType" => AdvisorTypeName,
            "relationType" => RelationType,
            "relationTypeName" => RelationTypeName,
            "relatedCompanyId" => RelatedCompanyId,
            "relatedCompany" => RelatedCompanyName,
            "leadInvestor" => LeadInvestor,
            "percentAcquired" => PercentAcquired,
            other => return Err(BuildError::UnresolvableField(other.to_string())),
        };
        Ok(id)
    }

    pub fn def(self) -> &'static FieldDef {
        use FieldId::*;
        use JoinKey as J;
        use ScalarType::*;
        match self {
            TransactionId => &FieldDef { column: "tr.transactionId", join: None, ty: Int },
            Type => &FieldDef { column: "tr.transactionIdTypeId", join: None, ty: Int },
            TypeName => &FieldDef { column: "tt.transactionIdTypeName", join: Some(J::TransactionType), ty: Text },
            Year => &FieldDef { column: "tr.announcedYear", join: None, ty: Int },
            Month => &FieldDef { column: "tr.announcedMonth", join: None, ty: Int },
            Day => &FieldDef { column: "tr.announcedDay", join: None, ty: Int },
            Size => &FieldDef { column: "tr.transactionSize", join: None, ty: Float },
            Status => &FieldDef { column: "tr.statusId", join: None, ty: Int },
            StatusName => &FieldDef { column: "ts.statusName", join: Some(J::Status), ty: Text },
            Currency => &FieldDef { column: "tr.currencyId", join: None, ty: Int },
            CurrencyCode => &FieldDef { column: "cur.currencyCode", join: Some(J::Currency), ty: Text },
            CompanyId => &FieldDef { column: "c.companyId", join: Some(J::Company), ty: Int },
            CompanyName => &FieldDef { column: "c.companyName", join: Some(J::Company), ty: Text },
            Industry => &FieldDef { column: "si.simpleIndustryId", join: Some(J::Industry), ty: Int },
            IndustryName => &FieldDef { column: "si.simpleIndustryDescription", join: Some(J::Industry), ty: Text },
            Country => &FieldDef { column: "geo.countryId", join: Some(J::Country), ty: Int },
            CountryName => &FieldDef { column: "geo.country", join: Some(J::Country), ty: Text },
            AcquirerId => &FieldDef { column: "acquirer.companyId", join: Some(J::Acquirer), ty: Int },
            AcquirerName => &FieldDef { column: "acquirer.companyName", join: Some(J::Acquirer), ty: Text },
            TargetId => &FieldDef { column: "target.companyId", join: Some(J::Target), ty: Int },
            TargetName => &FieldDef { column: "target.companyName", join: Some(J::Target), ty: Text },
            SellerId => &FieldDef { column: "seller.companyId", join: Some(J::Seller), ty: Int },
            SellerName => &FieldDef { column: "seller.companyName", join: Some(J::Seller), ty: Text },
            InvestorId => &FieldDef { column: "investor.companyId", join: Some(J::Investor), ty: Int },
            InvestorName => &FieldDef { column: "investor.companyName", join: Some(J::Investor), ty: Text },
            AdvisorId => &FieldDef { column: "advisor.companyId", join: Some(J::AdvisorCompany), ty: Int },
            AdvisorName => &FieldDef { column: "advisor.companyName", join: Some(J::AdvisorCompany), ty: Text },
            AdvisorTypeName => &FieldDef { column: "advtype.advisorTypeName", join: Some(J::AdvisorType), ty: Text },
            RelationType => &FieldDef { column: "crt.transactionToCompRelTypeId", join: Some(J::RelType), ty: Int },
            RelationTypeName => &FieldDef { column: "crt.transactionToCompanyRelType", join: Some(J::RelType), ty: Text },
            RelatedCompanyId => &FieldDef { column: "rc.companyId", join: Some(J::RelatedCompany), ty: Int },
            RelatedCompanyName => &FieldDef { column: "rc.companyName", join: Some(J::RelatedCompany), ty: Text },
            LeadInvestor => &FieldDef { column: "tcr.leadInvestorFlag", join: Some(J::CompanyRel), ty: Int },
            PercentAcquired => &FieldDef { column: "tcr.percentAcquired", join: Some(J::CompanyRel), ty: Float },
        }
    }

    pub fn column(self) -> &'static str {
        self.def().column
    }

    pub fn scalar_type(self) -> ScalarType {
        self.def().ty
    }
}

impl JoinKey {
    pub fn def(self) -> &'static JoinDef {
        use JoinKey::*;
        match self {
            TransactionType => &JoinDef {
                table: "ciqTransactionType",
                alias: "tt",
                on: "tr.transactionIdTypeId = tt.transactionIdTypeId",
                requires: &[],
            },
            Status => &JoinDef {
                table: "ciqTransactionStatus",
                alias: "ts",
                on: "tr.statusId = ts.statusId",
                requires: &[],
            },
            Company => &JoinDef {
                table: "ciqCompany",
                alias: "c",
                on: "tr.companyId = c.companyId",
                requires: &[],
            },
            Industry => &JoinDef {
                table: "ciqSimpleIndustry",
                alias: "si",
                on: "c.simpleIndustryId = si.simpleIndustryId",
                requires: &[Company],
            },
            Country => &JoinDef {
                table: "ciqCountryGeo",
                alias: "geo",
                on: "c.countryId = geo.countryId",
                requires: &[Company],
            },
            Currency => &JoinDef {
                table: "ciqCurrency",
                alias: "cur",
                on: "tr.currencyId = cur.currencyId",
                requires: &[],
            },
            CompanyRel => &JoinDef {
                table: "ciqTransactionToCompanyRel",
                alias: "tcr",
                on: "tr.transactionId = tcr.transactionId",
                requires: &[],
            },
            RelType => &JoinDef {
                table: "ciqTransactionToCompRelType",
                alias: "crt",
                on: "tcr.transactionToCompRelTypeId = crt.transactionToCompRelTypeId",
                requires: &[CompanyRel],
            },
            RelatedCompany => &JoinDef {
                table: "ciqCompany",
                alias: "rc",
                on: "tcr.companyRelId = rc.companyId",
                requires: &[CompanyRel],
            },
            // Role joins: same company table, one alias per relationship
            // role. The relationship-type ids are schema constants, not
            // request input.
            Acquirer => &JoinDef {
                table: "ciqCompany",
                alias: "acquirer",
                on: "tcr.companyRelId = acquirer.companyId AND tcr.transactionToCompRelTypeId = 1",
                requires: &[CompanyRel],
            },
            Target => &JoinDef {
                table: "ciqCompany",
                alias: "target",
                on: "tr.companyId = target.companyId",
                requires: &[],
            },
            Seller => &JoinDef {
                table: "ciqCompany",
                alias: "seller",
                on: "tcr.companyRelId = seller.companyId AND tcr.transactionToCompRelTypeId = 3",
                requires: &[CompanyRel],
            },
            Investor => &JoinDef {
                table: "ciqCompany",
                alias: "investor",
                on: "tcr.companyRelId = investor.companyId AND tcr.transactionToCompRelTypeId = 4",
                requires: &[CompanyRel],
            },
            AdvisorLink => &JoinDef {
                table: "ciqTransactionToAdvisor",
                alias: "tadv",
                on: "tr.transactionId = tadv.transactionId",
                requires: &[],
            },
            AdvisorType => &JoinDef {
                table: "ciqAdvisorType",
                alias: "advtype",
                on: "tadv.advisorTypeId = advtype.advisorTypeId",
                requires: &[AdvisorLink],
            },
            AdvisorCompany => &JoinDef {
                table: "ciqCompany",
                alias: "advisor",
                on: "tadv.companyId = advisor.companyId",
                requires: &[AdvisorLink],
            },
        }
    }
}

/// Ordered, deduplicated join list. Insertion order is first-reference
/// order, with prerequisites placed before their dependents, so identical
/// requests always render identical FROM clauses.
#[derive(Debug, Default)]
pub struct JoinSet {
    keys: Vec<JoinKey>,
}

impl JoinSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the join a field needs, if any, prerequisites first.
    pub fn require_field(&mut self, field: FieldId) {
        if let Some(key) = field.def().join {
            self.require(key);
        }
    }

    pub fn require(&mut self, key: JoinKey) {
        if self.keys.contains(&key) {
            return;
        }
        for dep in key.def().requires {
            self.require(*dep);
        }
        // A prerequisite may have inserted it in the meantime.
        if !self.keys.contains(&key) {
            self.keys.push(key);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = JoinKey> + '_ {
        self.keys.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_field_fails_resolution() {
        let err = FieldId::resolve("unknownField").unwrap_err();
        assert_eq!(err, BuildError::UnresolvableField("unknownField".into()));
    }

    #[test]
    fn company_aliases_resolve_to_same_field() {
        assert_eq!(
            FieldId::resolve("company").unwrap(),
            FieldId::resolve("companyName").unwrap()
        );
    }

    #[test]
    fn join_set_deduplicates() {
        let mut joins = JoinSet::new();
        joins.require_field(FieldId::Industry);
        joins.require_field(FieldId::Country);
        joins.require_field(FieldId::CompanyName);
        let keys: Vec<_> = joins.iter().collect();
        assert_eq!(keys, vec![JoinKey::Company, JoinKey::Industry, JoinKey::Country]);
    }

    #[test]
    fn prerequisites_come_first() {
        let mut joins = JoinSet::new();
        joins.require_field(FieldId::AcquirerName);
        let keys: Vec<_> = joins.iter().collect();
        assert_eq!(keys, vec![JoinKey::CompanyRel, JoinKey::Acquirer]);
    }

    #[test]
    fn role_joins_use_distinct_aliases() {
        let mut joins = JoinSet::new();
        joins.require_field(FieldId::AcquirerName);
        joins.require_field(FieldId::TargetName);
        let aliases: Vec<_> = joins.iter().map(|k| k.def().alias).collect();
        assert_eq!(aliases, vec!["tcr", "acquirer", "target"]);
    }

    #[test]
    fn base_fields_need_no_join() {
        let mut joins = JoinSet::new();
        joins.require_field(FieldId::Year);
        joins.require_field(FieldId::Type);
        assert!(joins.is_empty());
    }
}
