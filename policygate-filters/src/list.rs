//! List quantifier and list membership filters

use crate::provider::{schema_keys, BoxedFilterProvider, FilterProvider};
use async_trait::async_trait;
use policygate_core::{AliasStrategy, EvaluationContext, FilterError, FilterResult, Value, ValueType};
use policygate_expr::{
    BoxedExpressionProvider, Expr, ExpressionProvider, ExpressionScope, Function, Origin,
    Predicate, QuantifierKind,
};

/// Applies a per-item condition across a collection (`Any`, `All` or `One`).
///
/// The condition resolves inside a nested scope where the list item is the
/// current parameter. The nested scope is popped when resolution returns,
/// on success and on failure.
#[derive(Debug)]
pub struct ListConditionFilter {
    list: BoxedExpressionProvider,
    alias: Option<BoxedExpressionProvider>,
    condition: BoxedFilterProvider,
    match_type: QuantifierKind,
}

impl ListConditionFilter {
    pub fn new(
        list: impl ExpressionProvider + 'static,
        match_type: QuantifierKind,
        condition: impl FilterProvider + 'static,
    ) -> Self {
        Self {
            list: Box::new(list),
            alias: None,
            condition: Box::new(condition),
            match_type,
        }
    }

    pub fn any(list: impl ExpressionProvider + 'static, condition: impl FilterProvider + 'static) -> Self {
        Self::new(list, QuantifierKind::Any, condition)
    }

    pub fn all(list: impl ExpressionProvider + 'static, condition: impl FilterProvider + 'static) -> Self {
        Self::new(list, QuantifierKind::All, condition)
    }

    /// Expose list items to the condition under an explicit alias.
    pub fn with_alias(mut self, alias: impl ExpressionProvider + 'static) -> Self {
        self.alias = Some(Box::new(alias));
        self
    }

    async fn resolve_alias(
        &self,
        ctx: &EvaluationContext,
        scope: &mut ExpressionScope,
    ) -> FilterResult<Option<String>> {
        let key = self.schema_reference_key();
        let Some(provider) = &self.alias else {
            return Ok(match ctx.config().alias_strategy {
                AliasStrategy::Generated => None,
                AliasStrategy::Fixed => Some(ctx.config().default_item_alias.clone()),
            });
        };
        let alias = provider.resolve(ctx, scope).await?;
        match alias.as_literal() {
            Some(Value::Text(text)) if !text.trim().is_empty() => {
                Ok(Some(text.trim().to_string()))
            }
            _ => Err(FilterError::type_invalid(
                key,
                "alias",
                format!("alias must be non-empty literal text, got {}", alias),
            )),
        }
    }
}

#[async_trait]
impl FilterProvider for ListConditionFilter {
    async fn resolve(
        &self,
        ctx: &EvaluationContext,
        scope: &mut ExpressionScope,
    ) -> FilterResult<Predicate> {
        let key = self.schema_reference_key();
        ctx.ensure_active(key)?;
        tracing::trace!(schema_key = key, match_type = self.match_type.name(), "resolve list condition");

        let collection = self.list.resolve(ctx, scope).await?;
        let collection_type = collection.value_type();
        let element_type = collection_type.element_type().ok_or_else(|| {
            FilterError::type_invalid(key, "list", format!("{} is not enumerable", collection_type))
        })?;

        let max_depth = ctx.config().max_scope_depth;
        if scope.depth() >= max_depth {
            return Err(FilterError::unsupported(
                key,
                format!("list conditions nested deeper than {}", max_depth),
            ));
        }

        let alias = self.resolve_alias(ctx, scope).await?;
        let outer = scope.current_parameter().clone();

        let (item, condition) = {
            let mut nested = match alias {
                Some(alias) => {
                    let item = scope.fresh_parameter(alias.clone(), element_type);
                    scope.push(alias, item, key)
                }
                None => scope.push_with_generated_alias(element_type, key),
            };
            let item = nested.current_parameter().clone();
            (item, self.condition.resolve(ctx, &mut nested).await?)
        };
        if !condition.is_boolean() {
            return Err(FilterError::type_invalid(
                key,
                self.condition.schema_reference_key(),
                "condition must produce a boolean predicate",
            ));
        }

        let body = Expr::Quantifier {
            kind: self.match_type,
            collection: Box::new(collection),
            parameter: item,
            predicate: Box::new(condition.into_body()),
            origin: Origin::new(key, "list"),
        };
        Ok(Predicate::new(outer, body))
    }

    fn schema_reference_key(&self) -> &str {
        schema_keys::LIST_CONDITION
    }
}

/// True when any element of a list loosely equals a value.
#[derive(Debug)]
pub struct ListContainsValueFilter {
    list: BoxedExpressionProvider,
    value: BoxedExpressionProvider,
}

impl ListContainsValueFilter {
    pub fn new(
        list: impl ExpressionProvider + 'static,
        value: impl ExpressionProvider + 'static,
    ) -> Self {
        Self {
            list: Box::new(list),
            value: Box::new(value),
        }
    }
}

#[async_trait]
impl FilterProvider for ListContainsValueFilter {
    async fn resolve(
        &self,
        ctx: &EvaluationContext,
        scope: &mut ExpressionScope,
    ) -> FilterResult<Predicate> {
        let key = self.schema_reference_key();
        ctx.ensure_active(key)?;
        tracing::trace!(schema_key = key, "resolve list contains");

        let list = self.list.resolve(ctx, scope).await?;
        let value = self.value.resolve(ctx, scope).await?;
        let list_type = list.value_type();
        if list_type.element_type().is_none() {
            return Err(FilterError::type_invalid(
                key,
                "list",
                format!("{} is not enumerable", list_type),
            ));
        }

        let body = Expr::call(
            Function::ListContains,
            vec![list, value],
            ValueType::Bool,
            Origin::new(key, "list"),
        );
        Ok(Predicate::new(scope.current_parameter().clone(), body))
    }

    fn schema_reference_key(&self) -> &str {
        schema_keys::LIST_CONTAINS_VALUE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparison::BinaryComparisonFilter;
    use policygate_core::{EngineConfig, ErrorCode};
    use policygate_expr::{
        ConstantExpressionProvider, ItemExpressionProvider, ListExpressionProvider,
        PropertyExpressionProvider, ROOT_ALIAS,
    };
    use serde_json::json;

    fn claims() -> PropertyExpressionProvider {
        PropertyExpressionProvider::new("claims", ValueType::list_of(ValueType::Object))
    }

    fn amount_over(limit: i64) -> BinaryComparisonFilter {
        BinaryComparisonFilter::greater_than(
            PropertyExpressionProvider::new("amount", ValueType::Integer),
            ConstantExpressionProvider::new(limit),
        )
    }

    #[tokio::test]
    async fn test_any_claim_over_limit() {
        let ctx = EvaluationContext::new();
        let mut scope = ExpressionScope::for_item(ValueType::Object);
        let predicate = ListConditionFilter::any(claims(), amount_over(1000))
            .resolve(&ctx, &mut scope)
            .await
            .unwrap();
        assert_eq!(
            predicate.to_string(),
            "this => this.claims.Any(object1 => (object1.amount > 1000))"
        );
        assert_eq!(scope.depth(), 0);

        let record = Value::from(json!({ "claims": [{ "amount": 200 }, { "amount": 1500 }] }));
        assert!(predicate.evaluate(&record).unwrap());
        let record = Value::from(json!({ "claims": [{ "amount": 200 }] }));
        assert!(!predicate.evaluate(&record).unwrap());
        let record = Value::from(json!({ "claims": null }));
        assert!(!predicate.evaluate(&record).unwrap());
    }

    #[tokio::test]
    async fn test_one_means_exactly_one() {
        let ctx = EvaluationContext::new();
        let mut scope = ExpressionScope::for_item(ValueType::Object);
        let predicate = ListConditionFilter::new(claims(), QuantifierKind::One, amount_over(1000))
            .resolve(&ctx, &mut scope)
            .await
            .unwrap();
        let one = Value::from(json!({ "claims": [{ "amount": 200 }, { "amount": 1500 }] }));
        let two = Value::from(json!({ "claims": [{ "amount": 2000 }, { "amount": 1500 }] }));
        let none = Value::from(json!({ "claims": [] }));
        assert!(predicate.evaluate(&one).unwrap());
        assert!(!predicate.evaluate(&two).unwrap());
        assert!(!predicate.evaluate(&none).unwrap());
    }

    #[tokio::test]
    async fn test_explicit_alias_and_outer_reference() {
        let ctx = EvaluationContext::new();
        let mut scope = ExpressionScope::for_item(ValueType::Object);
        // claim.amount > this.excess
        let condition = BinaryComparisonFilter::greater_than(
            PropertyExpressionProvider::on(
                ItemExpressionProvider::aliased("claim"),
                "amount",
                ValueType::Integer,
            ),
            PropertyExpressionProvider::on(
                ItemExpressionProvider::aliased(ROOT_ALIAS),
                "excess",
                ValueType::Integer,
            ),
        );
        let predicate = ListConditionFilter::all(claims(), condition)
            .with_alias(ConstantExpressionProvider::new("claim"))
            .resolve(&ctx, &mut scope)
            .await
            .unwrap();
        assert_eq!(
            predicate.to_string(),
            "this => this.claims.All(claim => (claim.amount > this.excess))"
        );
        let record = Value::from(json!({
            "excess": 100,
            "claims": [{ "amount": 200 }, { "amount": 300 }]
        }));
        assert!(predicate.evaluate(&record).unwrap());
    }

    #[tokio::test]
    async fn test_fixed_alias_strategy() {
        let config = EngineConfig {
            alias_strategy: AliasStrategy::Fixed,
            ..EngineConfig::default()
        };
        let ctx = EvaluationContext::new().with_config(config);
        let mut scope = ExpressionScope::for_item(ValueType::Object);
        let predicate = ListConditionFilter::any(claims(), amount_over(0))
            .resolve(&ctx, &mut scope)
            .await
            .unwrap();
        assert_eq!(predicate.parameter.alias, ROOT_ALIAS);
        assert!(predicate.to_string().contains("item => (item.amount > 0)"));
    }

    #[tokio::test]
    async fn test_non_enumerable_list_is_rejected() {
        let ctx = EvaluationContext::new();
        let mut scope = ExpressionScope::for_item(ValueType::Object);
        let err = ListConditionFilter::any(
            PropertyExpressionProvider::new("premium", ValueType::Number),
            amount_over(0),
        )
        .resolve(&ctx, &mut scope)
        .await
        .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ParameterValueTypeInvalid);
        assert_eq!(scope.depth(), 0);
    }

    #[tokio::test]
    async fn test_depth_limit() {
        let config = EngineConfig {
            max_scope_depth: 1,
            ..EngineConfig::default()
        };
        let ctx = EvaluationContext::new().with_config(config);
        let mut scope = ExpressionScope::for_item(ValueType::Object);
        let nested = ListConditionFilter::any(
            claims(),
            ListConditionFilter::any(
                PropertyExpressionProvider::new("payments", ValueType::list_of(ValueType::Object)),
                amount_over(0),
            ),
        );
        let err = nested.resolve(&ctx, &mut scope).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::UnsupportedOperation);
        assert_eq!(scope.depth(), 0);
    }

    #[tokio::test]
    async fn test_list_contains_is_type_tolerant() {
        let ctx = EvaluationContext::new();
        let mut scope = ExpressionScope::for_item(ValueType::Object);
        let predicate = ListContainsValueFilter::new(
            ListExpressionProvider::of_values(["100", "250", "500"]),
            PropertyExpressionProvider::new("excess", ValueType::Integer),
        )
        .resolve(&ctx, &mut scope)
        .await
        .unwrap();
        assert!(predicate.evaluate(&Value::from(json!({ "excess": 250 }))).unwrap());
        assert!(!predicate.evaluate(&Value::from(json!({ "excess": 300 }))).unwrap());
    }

    #[tokio::test]
    async fn test_list_contains_rejects_scalar() {
        let ctx = EvaluationContext::new();
        let mut scope = ExpressionScope::for_item(ValueType::Object);
        let err = ListContainsValueFilter::new(
            ConstantExpressionProvider::new(5i64),
            ConstantExpressionProvider::new(5i64),
        )
        .resolve(&ctx, &mut scope)
        .await
        .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ParameterValueTypeInvalid);
    }
}
