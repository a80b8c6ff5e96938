//! Operand expression providers
//!
//! Filters consume operands through [`ExpressionProvider`]: given the
//! evaluation context and the active scope, produce a typed [`Expr`]. Real
//! deployments supply their own providers (data-context lookups, pipeline
//! step outputs); the ones here cover constants, scope references, field
//! access and the text/enum conversions filters rely on.

use crate::ast::{Conversion, Expr, Function, Origin};
use crate::scope::ExpressionScope;
use async_trait::async_trait;
use policygate_core::{EnumType, EvaluationContext, FilterError, FilterResult, Value, ValueType};
use std::fmt;
use std::sync::Arc;

/// Produces a typed operand expression.
///
/// Must be resolved against the currently active scope so nested variable
/// bindings are visible.
#[async_trait]
pub trait ExpressionProvider: Send + Sync + fmt::Debug {
    async fn resolve(
        &self,
        ctx: &EvaluationContext,
        scope: &mut ExpressionScope,
    ) -> FilterResult<Expr>;

    /// Stable key naming this operand kind in diagnostics.
    fn schema_reference_key(&self) -> &str;
}

pub type BoxedExpressionProvider = Box<dyn ExpressionProvider>;

// ============================================================================
// CONSTANTS
// ============================================================================

/// A fixed value.
#[derive(Debug, Clone)]
pub struct ConstantExpressionProvider {
    value: Value,
    ty: ValueType,
}

impl ConstantExpressionProvider {
    /// Constant typed by its runtime value.
    pub fn new(value: impl Into<Value>) -> Self {
        let value = value.into();
        let ty = value.value_type();
        Self { value, ty }
    }

    /// Constant with an explicit declared type (e.g. a nullable integer).
    pub fn typed(value: impl Into<Value>, ty: ValueType) -> Self {
        Self {
            value: value.into(),
            ty,
        }
    }
}

#[async_trait]
impl ExpressionProvider for ConstantExpressionProvider {
    async fn resolve(
        &self,
        ctx: &EvaluationContext,
        _scope: &mut ExpressionScope,
    ) -> FilterResult<Expr> {
        ctx.ensure_active(self.schema_reference_key())?;
        Ok(Expr::typed_literal(self.value.clone(), self.ty.clone()))
    }

    fn schema_reference_key(&self) -> &str {
        "constant"
    }
}

// ============================================================================
// SCOPE REFERENCES
// ============================================================================

/// The current item, or an outer item by alias.
#[derive(Debug, Clone, Default)]
pub struct ItemExpressionProvider {
    alias: Option<String>,
}

impl ItemExpressionProvider {
    pub fn current() -> Self {
        Self { alias: None }
    }

    pub fn aliased(alias: impl Into<String>) -> Self {
        Self {
            alias: Some(alias.into()),
        }
    }
}

#[async_trait]
impl ExpressionProvider for ItemExpressionProvider {
    async fn resolve(
        &self,
        ctx: &EvaluationContext,
        scope: &mut ExpressionScope,
    ) -> FilterResult<Expr> {
        ctx.ensure_active(self.schema_reference_key())?;
        let parameter = match &self.alias {
            None => scope.current_parameter(),
            Some(alias) => scope.lookup(alias).ok_or_else(|| {
                FilterError::unsupported(
                    self.schema_reference_key(),
                    format!("no scope binds the alias '{}'", alias),
                )
            })?,
        };
        Ok(Expr::parameter(parameter))
    }

    fn schema_reference_key(&self) -> &str {
        "item"
    }
}

/// Field access on the current item (or on another operand).
///
/// The declared type is trusted: a field reference already carries reliable
/// type information and is never silently re-parsed by coercion.
#[derive(Debug)]
pub struct PropertyExpressionProvider {
    target: Option<BoxedExpressionProvider>,
    path: String,
    ty: ValueType,
}

impl PropertyExpressionProvider {
    pub fn new(path: impl Into<String>, ty: ValueType) -> Self {
        Self {
            target: None,
            path: path.into(),
            ty,
        }
    }

    pub fn on(target: impl ExpressionProvider + 'static, path: impl Into<String>, ty: ValueType) -> Self {
        Self {
            target: Some(Box::new(target)),
            path: path.into(),
            ty,
        }
    }
}

#[async_trait]
impl ExpressionProvider for PropertyExpressionProvider {
    async fn resolve(
        &self,
        ctx: &EvaluationContext,
        scope: &mut ExpressionScope,
    ) -> FilterResult<Expr> {
        ctx.ensure_active(self.schema_reference_key())?;
        let target = match &self.target {
            Some(target) => target.resolve(ctx, scope).await?,
            None => Expr::parameter(scope.current_parameter()),
        };
        if target.value_type().is_primitive() {
            return Err(FilterError::type_invalid(
                self.schema_reference_key(),
                self.path.as_str(),
                format!("cannot read a property of {}", target.value_type()),
            ));
        }
        Ok(Expr::member(target, self.path.clone(), self.ty.clone()))
    }

    fn schema_reference_key(&self) -> &str {
        "property"
    }
}

// ============================================================================
// CONVERSIONS
// ============================================================================

/// Renders another operand as text (a computed value, not a field reference).
#[derive(Debug)]
pub struct TextExpressionProvider {
    inner: BoxedExpressionProvider,
}

impl TextExpressionProvider {
    pub fn new(inner: impl ExpressionProvider + 'static) -> Self {
        Self {
            inner: Box::new(inner),
        }
    }
}

#[async_trait]
impl ExpressionProvider for TextExpressionProvider {
    async fn resolve(
        &self,
        ctx: &EvaluationContext,
        scope: &mut ExpressionScope,
    ) -> FilterResult<Expr> {
        ctx.ensure_active(self.schema_reference_key())?;
        let inner = self.inner.resolve(ctx, scope).await?;
        Ok(Expr::convert(
            inner,
            Conversion::ToText,
            ValueType::Text,
            Origin::new(self.schema_reference_key(), "value"),
        ))
    }

    fn schema_reference_key(&self) -> &str {
        "text"
    }
}

/// Renders an enum-typed operand as its member name.
///
/// Produces an explicit [`Expr::EnumToString`] node so text equality can
/// compare by ordinal instead of by formatted name.
#[derive(Debug)]
pub struct EnumTextExpressionProvider {
    inner: BoxedExpressionProvider,
}

impl EnumTextExpressionProvider {
    pub fn new(inner: impl ExpressionProvider + 'static) -> Self {
        Self {
            inner: Box::new(inner),
        }
    }
}

#[async_trait]
impl ExpressionProvider for EnumTextExpressionProvider {
    async fn resolve(
        &self,
        ctx: &EvaluationContext,
        scope: &mut ExpressionScope,
    ) -> FilterResult<Expr> {
        ctx.ensure_active(self.schema_reference_key())?;
        let inner = self.inner.resolve(ctx, scope).await?;
        let enum_type: Arc<EnumType> = match inner.value_type().underlying() {
            ValueType::Enum(enum_type) => enum_type.clone(),
            other => {
                return Err(FilterError::type_invalid(
                    self.schema_reference_key(),
                    "value",
                    format!("expected an enum, got {}", other),
                ))
            }
        };
        Ok(Expr::EnumToString {
            inner: Box::new(inner),
            enum_type,
        })
    }

    fn schema_reference_key(&self) -> &str {
        "enumText"
    }
}

// ============================================================================
// CONTEXT VARIABLES
// ============================================================================

/// A pipeline variable read from the evaluation context at resolution time.
#[derive(Debug, Clone)]
pub struct VariableExpressionProvider {
    name: String,
    ty: Option<ValueType>,
}

impl VariableExpressionProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: None,
        }
    }

    pub fn typed(name: impl Into<String>, ty: ValueType) -> Self {
        Self {
            name: name.into(),
            ty: Some(ty),
        }
    }
}

#[async_trait]
impl ExpressionProvider for VariableExpressionProvider {
    async fn resolve(
        &self,
        ctx: &EvaluationContext,
        _scope: &mut ExpressionScope,
    ) -> FilterResult<Expr> {
        ctx.ensure_active(self.schema_reference_key())?;
        let value = ctx.variable(&self.name).cloned().ok_or_else(|| {
            FilterError::operand_failed(
                self.schema_reference_key(),
                format!("variable '{}' is not defined", self.name),
            )
        })?;
        Ok(match &self.ty {
            Some(ty) => Expr::typed_literal(value, ty.clone()),
            None => Expr::literal(value),
        })
    }

    fn schema_reference_key(&self) -> &str {
        "variable"
    }
}

// ============================================================================
// COMPOSITES
// ============================================================================

/// A list built from other operands, typed by the first element.
#[derive(Debug, Default)]
pub struct ListExpressionProvider {
    elements: Vec<BoxedExpressionProvider>,
}

impl ListExpressionProvider {
    pub fn new(elements: Vec<BoxedExpressionProvider>) -> Self {
        Self { elements }
    }

    /// List of constant values.
    pub fn of_values<V: Into<Value>>(values: impl IntoIterator<Item = V>) -> Self {
        Self::new(
            values
                .into_iter()
                .map(|value| Box::new(ConstantExpressionProvider::new(value)) as BoxedExpressionProvider)
                .collect(),
        )
    }
}

#[async_trait]
impl ExpressionProvider for ListExpressionProvider {
    async fn resolve(
        &self,
        ctx: &EvaluationContext,
        scope: &mut ExpressionScope,
    ) -> FilterResult<Expr> {
        ctx.ensure_active(self.schema_reference_key())?;
        let mut elements = Vec::with_capacity(self.elements.len());
        for element in &self.elements {
            elements.push(element.resolve(ctx, scope).await?);
        }
        // mixed element types fall back to dynamic typing
        let element_type = match elements.first().map(Expr::value_type) {
            Some(first) if elements.iter().all(|e| e.value_type() == first) => first,
            _ => ValueType::Any,
        };
        Ok(Expr::call(
            Function::ListOf,
            elements,
            ValueType::list_of(element_type),
            Origin::new(self.schema_reference_key(), "elements"),
        ))
    }

    fn schema_reference_key(&self) -> &str {
        "list"
    }
}

/// Integer remainder of two operands.
#[derive(Debug)]
pub struct RemainderExpressionProvider {
    dividend: BoxedExpressionProvider,
    divisor: BoxedExpressionProvider,
}

impl RemainderExpressionProvider {
    pub fn new(
        dividend: impl ExpressionProvider + 'static,
        divisor: impl ExpressionProvider + 'static,
    ) -> Self {
        Self {
            dividend: Box::new(dividend),
            divisor: Box::new(divisor),
        }
    }
}

#[async_trait]
impl ExpressionProvider for RemainderExpressionProvider {
    async fn resolve(
        &self,
        ctx: &EvaluationContext,
        scope: &mut ExpressionScope,
    ) -> FilterResult<Expr> {
        ctx.ensure_active(self.schema_reference_key())?;
        let dividend = self.dividend.resolve(ctx, scope).await?;
        let divisor = self.divisor.resolve(ctx, scope).await?;
        for (role, operand) in [("dividend", &dividend), ("divisor", &divisor)] {
            let ty = operand.value_type();
            if !matches!(ty.underlying(), ValueType::Integer | ValueType::Any) {
                return Err(FilterError::type_invalid(
                    self.schema_reference_key(),
                    role,
                    format!("expected an integer, got {}", ty),
                ));
            }
        }
        Ok(Expr::call(
            Function::Remainder,
            vec![dividend, divisor],
            ValueType::Integer,
            Origin::new(self.schema_reference_key(), "divisor"),
        ))
    }

    fn schema_reference_key(&self) -> &str {
        "remainder"
    }
}
