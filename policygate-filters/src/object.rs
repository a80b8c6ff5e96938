//! Object property filters

use crate::provider::{schema_keys, FilterProvider};
use async_trait::async_trait;
use policygate_core::{EvaluationContext, FilterError, FilterResult, Value, ValueType};
use policygate_expr::{
    BoxedExpressionProvider, Expr, ExpressionProvider, ExpressionScope, Function, Origin,
    Predicate,
};

/// True when an object carries a property with the given name.
#[derive(Debug)]
pub struct ObjectContainsPropertyFilter {
    object: BoxedExpressionProvider,
    property: BoxedExpressionProvider,
}

impl ObjectContainsPropertyFilter {
    pub fn new(
        object: impl ExpressionProvider + 'static,
        property: impl ExpressionProvider + 'static,
    ) -> Self {
        Self {
            object: Box::new(object),
            property: Box::new(property),
        }
    }
}

#[async_trait]
impl FilterProvider for ObjectContainsPropertyFilter {
    async fn resolve(
        &self,
        ctx: &EvaluationContext,
        scope: &mut ExpressionScope,
    ) -> FilterResult<Predicate> {
        let key = self.schema_reference_key();
        ctx.ensure_active(key)?;
        tracing::trace!(schema_key = key, "resolve object contains property");

        let object = self.object.resolve(ctx, scope).await?;
        let object_type = object.value_type();
        if object_type.is_primitive() {
            return Err(FilterError::type_invalid(
                key,
                "object",
                format!("cannot check property containment on {}", object_type),
            ));
        }
        let property = self.property.resolve(ctx, scope).await?;
        let property_type = property.value_type();
        if !matches!(property_type.underlying(), ValueType::Text | ValueType::Any) {
            return Err(FilterError::type_invalid(
                key,
                "property",
                format!("property name must be text, got {}", property_type),
            ));
        }

        let body = Expr::call(
            Function::HasProperty,
            vec![object, property],
            ValueType::Bool,
            Origin::new(key, "object"),
        );
        Ok(Predicate::new(scope.current_parameter().clone(), body))
    }

    fn schema_reference_key(&self) -> &str {
        schema_keys::OBJECT_CONTAINS_PROPERTY
    }
}

/// Boolean condition read from a dotted path inside a data object.
///
/// Missing paths take the default (null unless configured). A value that
/// is not a boolean is parsed as one, and anything unparseable is `false`.
/// This filter never fails while evaluating.
#[derive(Debug)]
pub struct ObjectPathLookupFilter {
    object: Option<BoxedExpressionProvider>,
    path: String,
    default: Option<BoxedExpressionProvider>,
}

impl ObjectPathLookupFilter {
    /// Lookup into the current item.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            object: None,
            path: path.into(),
            default: None,
        }
    }

    /// Lookup into another operand instead of the current item.
    pub fn on(mut self, object: impl ExpressionProvider + 'static) -> Self {
        self.object = Some(Box::new(object));
        self
    }

    pub fn with_default(mut self, default: impl ExpressionProvider + 'static) -> Self {
        self.default = Some(Box::new(default));
        self
    }
}

#[async_trait]
impl FilterProvider for ObjectPathLookupFilter {
    async fn resolve(
        &self,
        ctx: &EvaluationContext,
        scope: &mut ExpressionScope,
    ) -> FilterResult<Predicate> {
        let key = self.schema_reference_key();
        ctx.ensure_active(key)?;
        tracing::trace!(schema_key = key, path = %self.path, "resolve path lookup");

        let object = match &self.object {
            Some(object) => object.resolve(ctx, scope).await?,
            None => Expr::parameter(scope.current_parameter()),
        };
        let default = match &self.default {
            Some(default) => default.resolve(ctx, scope).await?,
            None => Expr::literal(Value::Null),
        };

        let origin = Origin::new(key, "path");
        let lookup = Expr::call(
            Function::PathLookup,
            vec![object, Expr::literal(self.path.as_str()), default],
            ValueType::Any,
            origin.clone(),
        );
        let body = Expr::call(Function::ParseBoolOrFalse, vec![lookup], ValueType::Bool, origin);
        Ok(Predicate::new(scope.current_parameter().clone(), body))
    }

    fn schema_reference_key(&self) -> &str {
        schema_keys::OBJECT_PATH_LOOKUP
    }
}
