//! Logical aggregation filters

use crate::provider::{schema_keys, BoxedFilterProvider, FilterProvider};
use async_trait::async_trait;
use policygate_core::{EvaluationContext, FilterError, FilterResult};
use policygate_expr::{Expr, ExpressionScope, LogicalOp, Predicate};

/// Folds any number of child filters with an eager logical operator.
///
/// Children resolve strictly left to right and the fold starts from the
/// seed, so an empty `and` is `true` and an empty `or` is `false`.
#[derive(Debug)]
pub struct AggregateFilter {
    children: Vec<BoxedFilterProvider>,
    op: LogicalOp,
    seed: bool,
    schema_key: &'static str,
}

impl AggregateFilter {
    pub fn and(children: Vec<BoxedFilterProvider>) -> Self {
        Self {
            children,
            op: LogicalOp::And,
            seed: true,
            schema_key: schema_keys::AND,
        }
    }

    pub fn or(children: Vec<BoxedFilterProvider>) -> Self {
        Self {
            children,
            op: LogicalOp::Or,
            seed: false,
            schema_key: schema_keys::OR,
        }
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

#[async_trait]
impl FilterProvider for AggregateFilter {
    async fn resolve(
        &self,
        ctx: &EvaluationContext,
        scope: &mut ExpressionScope,
    ) -> FilterResult<Predicate> {
        ctx.ensure_active(self.schema_key)?;
        tracing::trace!(schema_key = self.schema_key, children = self.children.len(), "resolve aggregate");

        let mut body = Expr::bool(self.seed);
        for child in &self.children {
            let predicate = resolve_boolean(child.as_ref(), ctx, scope, self.schema_key).await?;
            body = Expr::logical(self.op, body, predicate.into_body());
        }
        Ok(Predicate::new(scope.current_parameter().clone(), body))
    }

    fn schema_reference_key(&self) -> &str {
        self.schema_key
    }
}

/// Exclusive-or of exactly two child filters.
#[derive(Debug)]
pub struct XorFilter {
    first: BoxedFilterProvider,
    second: BoxedFilterProvider,
}

impl XorFilter {
    pub fn new(
        first: impl FilterProvider + 'static,
        second: impl FilterProvider + 'static,
    ) -> Self {
        Self {
            first: Box::new(first),
            second: Box::new(second),
        }
    }
}

#[async_trait]
impl FilterProvider for XorFilter {
    async fn resolve(
        &self,
        ctx: &EvaluationContext,
        scope: &mut ExpressionScope,
    ) -> FilterResult<Predicate> {
        ctx.ensure_active(schema_keys::XOR)?;
        tracing::trace!(schema_key = schema_keys::XOR, "resolve xor");

        let first = resolve_boolean(self.first.as_ref(), ctx, scope, schema_keys::XOR).await?;
        let second = resolve_boolean(self.second.as_ref(), ctx, scope, schema_keys::XOR).await?;
        let body = Expr::logical(
            LogicalOp::Xor,
            Expr::logical(LogicalOp::Xor, Expr::bool(false), first.into_body()),
            second.into_body(),
        );
        Ok(Predicate::new(scope.current_parameter().clone(), body))
    }

    fn schema_reference_key(&self) -> &str {
        schema_keys::XOR
    }
}

/// Resolve a child filter and require a boolean predicate from it.
pub(crate) async fn resolve_boolean(
    child: &dyn FilterProvider,
    ctx: &EvaluationContext,
    scope: &mut ExpressionScope,
    parent_key: &str,
) -> FilterResult<Predicate> {
    let predicate = child.resolve(ctx, scope).await?;
    if !predicate.is_boolean() {
        return Err(FilterError::type_invalid(
            parent_key,
            child.schema_reference_key(),
            format!(
                "expected a boolean predicate, got {}",
                predicate.body.value_type()
            ),
        ));
    }
    Ok(predicate)
}
