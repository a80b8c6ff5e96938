//! The filter provider contract and schema reference keys

use async_trait::async_trait;
use policygate_core::{EvaluationContext, FilterResult, ValueType};
use policygate_expr::{ExpressionScope, Predicate};
use std::fmt;

/// Asynchronously produces a boolean predicate over the scope's current item.
///
/// Providers are built once from static configuration and resolved on every
/// evaluation request. Resolution reads the scope but must leave it exactly
/// as it found it.
#[async_trait]
pub trait FilterProvider: Send + Sync + fmt::Debug {
    async fn resolve(
        &self,
        ctx: &EvaluationContext,
        scope: &mut ExpressionScope,
    ) -> FilterResult<Predicate>;

    /// Stable key naming the filter kind in diagnostics.
    fn schema_reference_key(&self) -> &str;
}

pub type BoxedFilterProvider = Box<dyn FilterProvider>;

/// Resolve a filter tree against a fresh scope for records of `item_type`.
pub async fn build_predicate(
    filter: &dyn FilterProvider,
    ctx: &EvaluationContext,
    item_type: ValueType,
) -> FilterResult<Predicate> {
    let mut scope = ExpressionScope::for_item(item_type);
    filter.resolve(ctx, &mut scope).await
}

/// Schema reference keys, one per filter kind.
pub mod schema_keys {
    pub const AND: &str = "andCondition";
    pub const OR: &str = "orCondition";
    pub const XOR: &str = "xorCondition";
    pub const NOT: &str = "notCondition";

    pub const IS_EQUAL_TO: &str = "isEqualToCondition";
    pub const IS_NOT_EQUAL_TO: &str = "isNotEqualToCondition";
    pub const IS_GREATER_THAN: &str = "isGreaterThanCondition";
    pub const IS_GREATER_THAN_OR_EQUAL_TO: &str = "isGreaterThanOrEqualToCondition";
    pub const IS_LESS_THAN: &str = "isLessThanCondition";
    pub const IS_LESS_THAN_OR_EQUAL_TO: &str = "isLessThanOrEqualToCondition";
    pub const TEXT_STARTS_WITH: &str = "textStartsWithCondition";
    pub const TEXT_ENDS_WITH: &str = "textEndsWithCondition";
    pub const TEXT_CONTAINS: &str = "textContainsCondition";
    pub const TEXT_IS_EQUAL_TO: &str = "textIsEqualToCondition";
    pub const TEXT_MATCHES_REGEX: &str = "textMatchesRegexCondition";

    pub const DATE_COMPARISON: &str = "dateCondition";
    pub const DATE_TIME_COMPARISON: &str = "dateTimeCondition";
    pub const TIME_COMPARISON: &str = "timeCondition";

    pub const LIST_CONDITION: &str = "listCondition";
    pub const LIST_CONTAINS_VALUE: &str = "listContainsValueCondition";
    pub const OBJECT_CONTAINS_PROPERTY: &str = "objectContainsPropertyCondition";
    pub const OBJECT_PATH_LOOKUP: &str = "objectPathLookupCondition";
}
