//! Text equality and regex filters

use crate::coercion::to_text;
use crate::provider::{schema_keys, FilterProvider};
use async_trait::async_trait;
use policygate_core::{
    EnumValue, EvaluationContext, FilterError, FilterResult, Value, ValueType,
};
use policygate_expr::{
    BoxedExpressionProvider, CompiledRegex, ComparisonOp, Expr, ExpressionProvider,
    ExpressionScope, Function, Origin, Predicate,
};
use regex::RegexBuilder;
use std::sync::Arc;

/// Text equality that compares enum-backed operands by ordinal.
///
/// When the first operand is an enum rendered as text and the comparand is a
/// literal naming one of its members, the enum is compared against that
/// member's ordinal instead of against formatted text. Records that carry
/// the enum by member name or ordinal still match.
#[derive(Debug)]
pub struct TextEqualityFilter {
    first: BoxedExpressionProvider,
    second: BoxedExpressionProvider,
}

impl TextEqualityFilter {
    pub fn new(
        first: impl ExpressionProvider + 'static,
        second: impl ExpressionProvider + 'static,
    ) -> Self {
        Self {
            first: Box::new(first),
            second: Box::new(second),
        }
    }
}

#[async_trait]
impl FilterProvider for TextEqualityFilter {
    async fn resolve(
        &self,
        ctx: &EvaluationContext,
        scope: &mut ExpressionScope,
    ) -> FilterResult<Predicate> {
        let key = self.schema_reference_key();
        ctx.ensure_active(key)?;
        tracing::trace!(schema_key = key, "resolve text equality");

        let first = self.first.resolve(ctx, scope).await?;
        let second = self.second.resolve(ctx, scope).await?;
        let origin = Origin::new(key, "second");

        let enum_match = match (first.enum_source(), second.as_literal()) {
            (Some((inner, enum_type)), Some(Value::Text(name))) => {
                EnumValue::from_name(enum_type.clone(), name)
                    .map(|member| (inner.clone(), member))
            }
            _ => None,
        };
        let body = match enum_match {
            Some((inner, member)) => {
                tracing::trace!(
                    schema_key = key,
                    ordinal = member.ordinal,
                    "compare enum by ordinal"
                );
                Expr::compare(
                    ComparisonOp::Equal,
                    inner,
                    Expr::literal(Value::Enum(member)),
                    origin,
                )
            }
            None => Expr::compare(
                ComparisonOp::Equal,
                to_text(first, Origin::new(key, "first")),
                to_text(second, Origin::new(key, "second")),
                origin,
            ),
        };
        Ok(Predicate::new(scope.current_parameter().clone(), body))
    }

    fn schema_reference_key(&self) -> &str {
        schema_keys::TEXT_IS_EQUAL_TO
    }
}

/// Matches a text operand against a regular expression.
///
/// Literal patterns are compiled once while the predicate is built, with
/// the configured size limit.
#[derive(Debug)]
pub struct TextMatchesRegexFilter {
    text: BoxedExpressionProvider,
    pattern: BoxedExpressionProvider,
}

impl TextMatchesRegexFilter {
    pub fn new(
        text: impl ExpressionProvider + 'static,
        pattern: impl ExpressionProvider + 'static,
    ) -> Self {
        Self {
            text: Box::new(text),
            pattern: Box::new(pattern),
        }
    }
}

#[async_trait]
impl FilterProvider for TextMatchesRegexFilter {
    async fn resolve(
        &self,
        ctx: &EvaluationContext,
        scope: &mut ExpressionScope,
    ) -> FilterResult<Predicate> {
        let key = self.schema_reference_key();
        ctx.ensure_active(key)?;
        tracing::trace!(schema_key = key, "resolve regex match");

        let text = self.text.resolve(ctx, scope).await?;
        let pattern = self.pattern.resolve(ctx, scope).await?;
        for (role, operand) in [("text", &text), ("pattern", &pattern)] {
            let ty = operand.value_type();
            if !matches!(ty.underlying(), ValueType::Text | ValueType::Any) {
                return Err(FilterError::type_invalid(
                    key,
                    role,
                    format!("expected text, got {}", ty),
                ));
            }
        }

        let size_limit = ctx.config().regex_size_limit;
        let compiled = match pattern.as_literal() {
            Some(Value::Text(source)) => {
                let regex = RegexBuilder::new(source)
                    .size_limit(size_limit)
                    .build()
                    .map_err(|e| {
                        FilterError::type_invalid(
                            key,
                            "pattern",
                            format!("invalid regex '{}': {}", source, e),
                        )
                    })?;
                Some(CompiledRegex(Arc::new(regex)))
            }
            _ => None,
        };

        let body = Expr::call(
            Function::RegexIsMatch {
                compiled,
                size_limit,
            },
            vec![text, pattern],
            ValueType::Bool,
            Origin::new(key, "pattern"),
        );
        Ok(Predicate::new(scope.current_parameter().clone(), body))
    }

    fn schema_reference_key(&self) -> &str {
        schema_keys::TEXT_MATCHES_REGEX
    }
}
