//! PolicyGate Test Utilities
//!
//! Shared test infrastructure for the PolicyGate workspace:
//! - Mock operand and filter providers (failing, recording, delayed, cancelling)
//! - Proptest generators for values and filter trees
//! - Fixture records and enum types
//! - Assertions on the error taxonomy
//! - A tracing initialiser for tests

pub use policygate_core::{
    CancellationToken, EngineConfig, EnumType, ErrorCode, EvaluationContext, FilterError,
    FilterResult, Value, ValueType,
};
pub use policygate_expr::{Expr, ExpressionProvider, ExpressionScope, Predicate};
pub use policygate_filters::{build_predicate, FilterProvider};

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// TRACING
// ============================================================================

/// Install a test subscriber driven by `RUST_LOG`. Safe to call from every test.
pub fn init_test_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    // a second call finds the global subscriber already set
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

// ============================================================================
// MOCK PROVIDERS
// ============================================================================

/// Shared, ordered record of provider resolutions.
#[derive(Debug, Clone, Default)]
pub struct ResolutionLog(Arc<Mutex<Vec<String>>>);

impl ResolutionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, label: &str) {
        if let Ok(mut entries) = self.0.lock() {
            entries.push(label.to_string());
        }
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().map(|entries| entries.clone()).unwrap_or_default()
    }
}

/// Operand provider whose resolution always fails, like an unreachable data source.
#[derive(Debug, Clone, Default)]
pub struct FailingExpressionProvider {
    resolutions: Arc<AtomicUsize>,
}

impl FailingExpressionProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolutions(&self) -> usize {
        self.resolutions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExpressionProvider for FailingExpressionProvider {
    async fn resolve(
        &self,
        ctx: &EvaluationContext,
        _scope: &mut ExpressionScope,
    ) -> FilterResult<Expr> {
        ctx.ensure_active(self.schema_reference_key())?;
        self.resolutions.fetch_add(1, Ordering::SeqCst);
        Err(FilterError::operand_failed(
            self.schema_reference_key(),
            "data source unavailable",
        ))
    }

    fn schema_reference_key(&self) -> &str {
        "failingOperand"
    }
}

/// Wraps an operand provider and records its label on every resolution.
#[derive(Debug)]
pub struct RecordingExpressionProvider<P> {
    label: String,
    inner: P,
    log: ResolutionLog,
}

impl<P: ExpressionProvider> RecordingExpressionProvider<P> {
    pub fn new(label: impl Into<String>, inner: P, log: &ResolutionLog) -> Self {
        Self {
            label: label.into(),
            inner,
            log: log.clone(),
        }
    }
}

#[async_trait]
impl<P: ExpressionProvider> ExpressionProvider for RecordingExpressionProvider<P> {
    async fn resolve(
        &self,
        ctx: &EvaluationContext,
        scope: &mut ExpressionScope,
    ) -> FilterResult<Expr> {
        self.log.record(&self.label);
        self.inner.resolve(ctx, scope).await
    }

    fn schema_reference_key(&self) -> &str {
        self.inner.schema_reference_key()
    }
}

/// Wraps an operand provider behind an async delay, like a remote lookup.
#[derive(Debug)]
pub struct DelayedExpressionProvider<P> {
    inner: P,
    delay: Duration,
}

impl<P: ExpressionProvider> DelayedExpressionProvider<P> {
    pub fn new(inner: P, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

#[async_trait]
impl<P: ExpressionProvider> ExpressionProvider for DelayedExpressionProvider<P> {
    async fn resolve(
        &self,
        ctx: &EvaluationContext,
        scope: &mut ExpressionScope,
    ) -> FilterResult<Expr> {
        tokio::time::sleep(self.delay).await;
        self.inner.resolve(ctx, scope).await
    }

    fn schema_reference_key(&self) -> &str {
        self.inner.schema_reference_key()
    }
}

/// Cancels the context's token while resolving, then resolves the inner provider.
#[derive(Debug)]
pub struct CancellingExpressionProvider<P> {
    inner: P,
}

impl<P: ExpressionProvider> CancellingExpressionProvider<P> {
    pub fn new(inner: P) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<P: ExpressionProvider> ExpressionProvider for CancellingExpressionProvider<P> {
    async fn resolve(
        &self,
        ctx: &EvaluationContext,
        scope: &mut ExpressionScope,
    ) -> FilterResult<Expr> {
        let expr = self.inner.resolve(ctx, scope).await?;
        ctx.cancellation_token().cancel();
        Ok(expr)
    }

    fn schema_reference_key(&self) -> &str {
        self.inner.schema_reference_key()
    }
}

/// Filter that always resolves to a fixed boolean.
#[derive(Debug, Clone, Copy)]
pub struct ConstantFilter(pub bool);

#[async_trait]
impl FilterProvider for ConstantFilter {
    async fn resolve(
        &self,
        ctx: &EvaluationContext,
        scope: &mut ExpressionScope,
    ) -> FilterResult<Predicate> {
        ctx.ensure_active(self.schema_reference_key())?;
        Ok(Predicate::constant(scope.current_parameter().clone(), self.0))
    }

    fn schema_reference_key(&self) -> &str {
        "constantCondition"
    }
}

/// What a [`FailingFilterProvider`] saw in the scope when it failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeSnapshot {
    pub depth: usize,
    pub alias: String,
}

/// Filter that records the active scope and then fails.
#[derive(Debug, Clone, Default)]
pub struct FailingFilterProvider {
    observed: Arc<Mutex<Option<ScopeSnapshot>>>,
}

impl FailingFilterProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scope seen by the most recent resolution.
    pub fn observed(&self) -> Option<ScopeSnapshot> {
        self.observed.lock().ok().and_then(|snapshot| snapshot.clone())
    }
}

#[async_trait]
impl FilterProvider for FailingFilterProvider {
    async fn resolve(
        &self,
        ctx: &EvaluationContext,
        scope: &mut ExpressionScope,
    ) -> FilterResult<Predicate> {
        ctx.ensure_active(self.schema_reference_key())?;
        if let Ok(mut observed) = self.observed.lock() {
            *observed = Some(ScopeSnapshot {
                depth: scope.depth(),
                alias: scope.current_frame().alias.clone(),
            });
        }
        Err(FilterError::type_invalid(
            self.schema_reference_key(),
            "condition",
            "forced failure",
        ))
    }

    fn schema_reference_key(&self) -> &str {
        "failingCondition"
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for values and filter inputs.

    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use proptest::prelude::*;

    /// Scalar values of every primitive kind, plus null.
    pub fn arb_scalar() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::Integer),
            (-1.0e9..1.0e9f64).prop_map(Value::Number),
            "[a-zA-Z0-9 ]{0,20}".prop_map(Value::Text),
            arb_date_time().prop_map(Value::DateTime),
        ]
    }

    /// Timestamps between 1990 and 2060, whole seconds.
    pub fn arb_date_time() -> impl Strategy<Value = DateTime<Utc>> {
        let start = Utc.with_ymd_and_hms(1990, 1, 1, 0, 0, 0).single();
        let end = Utc.with_ymd_and_hms(2060, 1, 1, 0, 0, 0).single();
        let (start, end) = match (start, end) {
            (Some(start), Some(end)) => (start.timestamp(), end.timestamp()),
            _ => (0, 0),
        };
        (start..end).prop_filter_map("timestamp out of range", |secs| {
            DateTime::from_timestamp(secs, 0)
        })
    }

    /// Small integer lists, possibly empty.
    pub fn arb_integer_list() -> impl Strategy<Value = Vec<i64>> {
        prop::collection::vec(-1000i64..1000, 0..12)
    }

    /// Boolean leaves for aggregate filters.
    pub fn arb_bools() -> impl Strategy<Value = Vec<bool>> {
        prop::collection::vec(any::<bool>(), 0..8)
    }

    /// Configurations that pass validation.
    pub fn arb_valid_config() -> impl Strategy<Value = EngineConfig> {
        (
            "[a-z][a-zA-Z0-9_]{0,12}",
            any::<bool>(),
            1usize..(4 << 20),
            1usize..32,
        )
            .prop_map(|(alias, generated, regex_size_limit, max_scope_depth)| EngineConfig {
                default_item_alias: alias,
                alias_strategy: if generated {
                    policygate_core::AliasStrategy::Generated
                } else {
                    policygate_core::AliasStrategy::Fixed
                },
                regex_size_limit,
                max_scope_depth,
            })
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built records and types for common filter scenarios.

    use super::*;
    use serde_json::json;

    /// `PolicyStatus { Draft = 0, Active = 1, Lapsed = 2, Cancelled = 3 }`
    pub fn policy_status_type() -> Arc<EnumType> {
        Arc::new(EnumType::new(
            "PolicyStatus",
            [("Draft", 0), ("Active", 1), ("Lapsed", 2), ("Cancelled", 3)],
        ))
    }

    /// A policy record as the automation layer sees it.
    pub fn policy_record() -> Value {
        let mut record = Value::from(json!({
            "policyNumber": "POL-000123",
            "premium": 1240.5,
            "excess": 250,
            "inceptionDate": "2024-06-15T09:30:00Z",
            "holder": { "name": "Ada Lovelace", "age": 36 },
            "claims": [
                { "reference": "CLM-1", "amount": 400, "open": true },
                { "reference": "CLM-2", "amount": 1800, "open": false }
            ],
            "extensions": { "broker": "Acme", "flags": { "autoRenew": "true" } }
        }));
        if let Value::Object(map) = &mut record {
            if let Some(status) =
                policygate_core::EnumValue::from_name(policy_status_type(), "Active")
            {
                map.insert("status".to_string(), Value::Enum(status));
            }
        }
        record
    }

    /// A record with a single field.
    pub fn record_with(field: &str, value: impl Into<Value>) -> Value {
        let mut map = std::collections::BTreeMap::new();
        map.insert(field.to_string(), value.into());
        Value::Object(map)
    }

    /// Context with a fresh cancellation token.
    pub fn context() -> EvaluationContext {
        EvaluationContext::new()
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions on the error taxonomy.

    use super::*;

    #[track_caller]
    pub fn assert_code<T: std::fmt::Debug>(result: &FilterResult<T>, code: ErrorCode) {
        match result {
            Err(err) => assert_eq!(err.code(), code, "unexpected error: {}", err),
            Ok(value) => panic!("expected {} error, got Ok({:?})", code, value),
        }
    }

    #[track_caller]
    pub fn assert_type_invalid<T: std::fmt::Debug>(result: &FilterResult<T>) {
        assert_code(result, ErrorCode::ParameterValueTypeInvalid);
    }

    #[track_caller]
    pub fn assert_unsupported<T: std::fmt::Debug>(result: &FilterResult<T>) {
        assert_code(result, ErrorCode::UnsupportedOperation);
    }

    #[track_caller]
    pub fn assert_cancelled<T: std::fmt::Debug>(result: &FilterResult<T>) {
        assert_code(result, ErrorCode::Cancelled);
    }
}
