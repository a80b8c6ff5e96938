//! Binary comparison filters

use crate::coercion::reconcile;
use crate::provider::{schema_keys, FilterProvider};
use async_trait::async_trait;
use policygate_core::{EvaluationContext, FilterError, FilterResult, ValueType};
use policygate_expr::{
    BoxedExpressionProvider, ComparisonOp, Expr, ExpressionProvider, ExpressionScope, Origin,
    Predicate,
};

/// Compares two operands with a fixed operator.
///
/// A type mismatch is reconciled by converting the first operand to the
/// second operand's type (see [`reconcile`]).
#[derive(Debug)]
pub struct BinaryComparisonFilter {
    first: BoxedExpressionProvider,
    second: BoxedExpressionProvider,
    operator: ComparisonOp,
    schema_key: &'static str,
}

impl BinaryComparisonFilter {
    pub fn new(
        operator: ComparisonOp,
        first: impl ExpressionProvider + 'static,
        second: impl ExpressionProvider + 'static,
    ) -> Self {
        Self::from_boxed(operator, Box::new(first), Box::new(second))
    }

    pub fn from_boxed(
        operator: ComparisonOp,
        first: BoxedExpressionProvider,
        second: BoxedExpressionProvider,
    ) -> Self {
        Self {
            first,
            second,
            operator,
            schema_key: schema_key_for(operator),
        }
    }

    pub fn equal(
        first: impl ExpressionProvider + 'static,
        second: impl ExpressionProvider + 'static,
    ) -> Self {
        Self::new(ComparisonOp::Equal, first, second)
    }

    pub fn not_equal(
        first: impl ExpressionProvider + 'static,
        second: impl ExpressionProvider + 'static,
    ) -> Self {
        Self::new(ComparisonOp::NotEqual, first, second)
    }

    pub fn greater_than(
        first: impl ExpressionProvider + 'static,
        second: impl ExpressionProvider + 'static,
    ) -> Self {
        Self::new(ComparisonOp::GreaterThan, first, second)
    }

    pub fn less_than(
        first: impl ExpressionProvider + 'static,
        second: impl ExpressionProvider + 'static,
    ) -> Self {
        Self::new(ComparisonOp::LessThan, first, second)
    }

    pub fn starts_with(
        first: impl ExpressionProvider + 'static,
        second: impl ExpressionProvider + 'static,
    ) -> Self {
        Self::new(ComparisonOp::StartsWith, first, second)
    }

    pub fn operator(&self) -> ComparisonOp {
        self.operator
    }
}

/// Schema reference key for a comparison operator.
pub fn schema_key_for(operator: ComparisonOp) -> &'static str {
    match operator {
        ComparisonOp::Equal => schema_keys::IS_EQUAL_TO,
        ComparisonOp::NotEqual => schema_keys::IS_NOT_EQUAL_TO,
        ComparisonOp::GreaterThan => schema_keys::IS_GREATER_THAN,
        ComparisonOp::GreaterThanOrEqual => schema_keys::IS_GREATER_THAN_OR_EQUAL_TO,
        ComparisonOp::LessThan => schema_keys::IS_LESS_THAN,
        ComparisonOp::LessThanOrEqual => schema_keys::IS_LESS_THAN_OR_EQUAL_TO,
        ComparisonOp::StartsWith => schema_keys::TEXT_STARTS_WITH,
        ComparisonOp::EndsWith => schema_keys::TEXT_ENDS_WITH,
        ComparisonOp::Contains => schema_keys::TEXT_CONTAINS,
    }
}

#[async_trait]
impl FilterProvider for BinaryComparisonFilter {
    async fn resolve(
        &self,
        ctx: &EvaluationContext,
        scope: &mut ExpressionScope,
    ) -> FilterResult<Predicate> {
        ctx.ensure_active(self.schema_key)?;
        tracing::trace!(schema_key = self.schema_key, op = self.operator.symbol(), "resolve comparison");

        let first = self.first.resolve(ctx, scope).await?;
        let second = self.second.resolve(ctx, scope).await?;
        let target = second.value_type();

        if self.operator.is_text_only()
            && !matches!(target.underlying(), ValueType::Text | ValueType::Any)
        {
            return Err(FilterError::type_invalid(
                self.schema_key,
                "second",
                format!("'{}' needs a text operand, got {}", self.operator.symbol(), target),
            ));
        }

        let first = reconcile(first, &target, self.schema_key)?;
        let body = Expr::compare(
            self.operator,
            first,
            second,
            Origin::new(self.schema_key, "second"),
        );
        Ok(Predicate::new(scope.current_parameter().clone(), body))
    }

    fn schema_reference_key(&self) -> &str {
        self.schema_key
    }
}
