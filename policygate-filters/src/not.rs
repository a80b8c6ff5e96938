//! Logical negation filter

use crate::aggregate::resolve_boolean;
use crate::provider::{schema_keys, BoxedFilterProvider, FilterProvider};
use async_trait::async_trait;
use policygate_core::{EvaluationContext, FilterResult};
use policygate_expr::{Expr, ExpressionScope, Predicate};

/// Negates exactly one child filter.
#[derive(Debug)]
pub struct NotFilter {
    child: BoxedFilterProvider,
}

impl NotFilter {
    pub fn new(child: impl FilterProvider + 'static) -> Self {
        Self {
            child: Box::new(child),
        }
    }

    pub fn from_boxed(child: BoxedFilterProvider) -> Self {
        Self { child }
    }
}

#[async_trait]
impl FilterProvider for NotFilter {
    async fn resolve(
        &self,
        ctx: &EvaluationContext,
        scope: &mut ExpressionScope,
    ) -> FilterResult<Predicate> {
        ctx.ensure_active(schema_keys::NOT)?;
        tracing::trace!(schema_key = schema_keys::NOT, child = self.child.schema_reference_key(), "resolve not");

        let child = resolve_boolean(self.child.as_ref(), ctx, scope, schema_keys::NOT).await?;
        Ok(Predicate::new(
            child.parameter.clone(),
            Expr::negate(child.into_body()),
        ))
    }

    fn schema_reference_key(&self) -> &str {
        schema_keys::NOT
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparison::BinaryComparisonFilter;
    use policygate_core::{ErrorCode, FilterError, Value, ValueType};
    use policygate_expr::{ConstantExpressionProvider, ParamRef};

    /// Produces a predicate whose body is an integer, which no real filter does.
    #[derive(Debug)]
    struct IntegerBodyFilter;

    #[async_trait]
    impl FilterProvider for IntegerBodyFilter {
        async fn resolve(
            &self,
            _ctx: &EvaluationContext,
            scope: &mut ExpressionScope,
        ) -> FilterResult<Predicate> {
            let parameter: ParamRef = scope.current_parameter().clone();
            Ok(Predicate::new(parameter, Expr::literal(3i64)))
        }

        fn schema_reference_key(&self) -> &str {
            "integerBody"
        }
    }

    #[tokio::test]
    async fn test_negates_child() {
        let ctx = EvaluationContext::new();
        let mut scope = ExpressionScope::for_item(ValueType::Object);
        let filter = NotFilter::new(BinaryComparisonFilter::equal(
            ConstantExpressionProvider::new(1i64),
            ConstantExpressionProvider::new(1i64),
        ));
        let predicate = filter.resolve(&ctx, &mut scope).await.unwrap();
        assert_eq!(predicate.to_string(), "this => !(1 == 1)");
        assert!(!predicate.evaluate(&Value::Null).unwrap());
    }

    #[tokio::test]
    async fn test_non_boolean_child_names_child_key() {
        let ctx = EvaluationContext::new();
        let mut scope = ExpressionScope::for_item(ValueType::Object);
        let err = NotFilter::new(IntegerBodyFilter)
            .resolve(&ctx, &mut scope)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ParameterValueTypeInvalid);
        assert!(matches!(
            err,
            FilterError::ParameterValueTypeInvalid { ref parameter, .. } if parameter == "integerBody"
        ));
    }
}
