//! Resolution flow: ordering, cancellation, slow operands and nested scopes.

use policygate_core::CancellationToken;
use policygate_expr::{
    ConstantExpressionProvider, EnumTextExpressionProvider, ItemExpressionProvider,
    PropertyExpressionProvider, VariableExpressionProvider, ROOT_ALIAS,
};
use policygate_filters::{
    schema_keys, AggregateFilter, BinaryComparisonFilter, BoxedFilterProvider, DateOperator,
    ListConditionFilter, ObjectContainsPropertyFilter, ObjectPathLookupFilter,
    TemporalComparisonFilter, TextEqualityFilter,
};
use policygate_test_utils::fixtures::{context, policy_record, policy_status_type};
use policygate_test_utils::{
    assertions, build_predicate, init_test_tracing, CancellingExpressionProvider,
    DelayedExpressionProvider, EngineConfig, EvaluationContext, ExpressionScope,
    FailingExpressionProvider, FilterProvider, RecordingExpressionProvider, ResolutionLog,
    ValueType,
};
use std::sync::Arc;
use std::time::Duration;

fn claims() -> PropertyExpressionProvider {
    PropertyExpressionProvider::new("claims", ValueType::list_of(ValueType::Object))
}

#[tokio::test]
async fn test_children_resolve_left_to_right() {
    init_test_tracing();
    let log = ResolutionLog::new();
    let child = |label: &str| -> BoxedFilterProvider {
        Box::new(BinaryComparisonFilter::equal(
            RecordingExpressionProvider::new(
                format!("{}.first", label),
                ConstantExpressionProvider::new(1i64),
                &log,
            ),
            RecordingExpressionProvider::new(
                format!("{}.second", label),
                ConstantExpressionProvider::new(1i64),
                &log,
            ),
        ))
    };
    let filter = AggregateFilter::or(vec![child("a"), child("b"), child("c")]);
    build_predicate(&filter, &context(), ValueType::Object)
        .await
        .unwrap();
    assert_eq!(
        log.entries(),
        vec!["a.first", "a.second", "b.first", "b.second", "c.first", "c.second"]
    );
}

#[tokio::test]
async fn test_cancelled_before_resolution() {
    let token = CancellationToken::new();
    token.cancel();
    let ctx = EvaluationContext::new().with_cancellation(token);
    let filter = AggregateFilter::and(vec![]);
    let result = build_predicate(&filter, &ctx, ValueType::Object).await;
    assertions::assert_cancelled(&result);
    assert_eq!(result.unwrap_err().schema_key(), schema_keys::AND);
}

#[tokio::test]
async fn test_cancelled_mid_resolution_stops_siblings() {
    let ctx = context();
    let later = FailingExpressionProvider::new();
    let filter = AggregateFilter::and(vec![
        Box::new(BinaryComparisonFilter::equal(
            CancellingExpressionProvider::new(ConstantExpressionProvider::new(1i64)),
            ConstantExpressionProvider::new(1i64),
        )),
        Box::new(BinaryComparisonFilter::equal(
            later.clone(),
            ConstantExpressionProvider::new(1i64),
        )),
    ]);
    let result = build_predicate(&filter, &ctx, ValueType::Object).await;
    assertions::assert_cancelled(&result);
    assert_eq!(later.resolutions(), 0);
}

#[tokio::test]
async fn test_cancellation_inside_list_releases_scope() {
    let ctx = context();
    let mut scope = ExpressionScope::for_item(ValueType::Object);
    let filter = ListConditionFilter::any(
        claims(),
        AggregateFilter::and(vec![
            Box::new(BinaryComparisonFilter::greater_than(
                CancellingExpressionProvider::new(PropertyExpressionProvider::new(
                    "amount",
                    ValueType::Integer,
                )),
                ConstantExpressionProvider::new(0i64),
            )),
            Box::new(BinaryComparisonFilter::greater_than(
                PropertyExpressionProvider::new("amount", ValueType::Integer),
                ConstantExpressionProvider::new(10i64),
            )),
        ]),
    );
    let result = filter.resolve(&ctx, &mut scope).await;
    assertions::assert_cancelled(&result);
    assert_eq!(scope.depth(), 0);
    assert_eq!(scope.current_parameter().alias, ROOT_ALIAS);
}

#[tokio::test]
async fn test_dropped_resolution_releases_scope() {
    let ctx = context();
    let mut scope = ExpressionScope::for_item(ValueType::Object);
    let filter = ListConditionFilter::any(
        claims(),
        BinaryComparisonFilter::greater_than(
            DelayedExpressionProvider::new(
                PropertyExpressionProvider::new("amount", ValueType::Integer),
                Duration::from_secs(30),
            ),
            ConstantExpressionProvider::new(0i64),
        ),
    );
    let timed_out =
        tokio::time::timeout(Duration::from_millis(20), filter.resolve(&ctx, &mut scope)).await;
    assert!(timed_out.is_err());
    assert_eq!(scope.depth(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_resolution_runs_on_spawned_tasks() {
    let filter: Arc<dyn FilterProvider> = Arc::new(BinaryComparisonFilter::greater_than(
        DelayedExpressionProvider::new(
            PropertyExpressionProvider::new("excess", ValueType::Integer),
            Duration::from_millis(5),
        ),
        ConstantExpressionProvider::new(100i64),
    ));
    let mut handles = Vec::new();
    for _ in 0..4 {
        let filter = filter.clone();
        handles.push(tokio::spawn(async move {
            build_predicate(filter.as_ref(), &context(), ValueType::Object).await
        }));
    }
    let record = policy_record();
    for handle in handles {
        let predicate = handle.await.unwrap().unwrap();
        assert!(predicate.evaluate(&record).unwrap());
    }
}

#[tokio::test]
async fn test_missing_variable_propagates() {
    let filter = BinaryComparisonFilter::equal(
        PropertyExpressionProvider::new("excess", ValueType::Integer),
        VariableExpressionProvider::new("maxExcess"),
    );
    let result = build_predicate(&filter, &context(), ValueType::Object).await;
    assertions::assert_code(&result, policygate_core::ErrorCode::OperandResolutionFailed);

    let ctx = context().with_variable("maxExcess", 250i64);
    let predicate = build_predicate(&filter, &ctx, ValueType::Object).await.unwrap();
    assert!(predicate.evaluate(&policy_record()).unwrap());
}

#[tokio::test]
async fn test_nested_lists_see_outer_items() {
    // any claim where some payment exceeds the policy excess
    let record = policygate_core::Value::from(serde_json::json!({
        "excess": 100,
        "claims": [
            { "payments": [{ "amount": 50 }, { "amount": 80 }] },
            { "payments": [{ "amount": 120 }] }
        ]
    }));
    let payment_over_excess = BinaryComparisonFilter::greater_than(
        PropertyExpressionProvider::new("amount", ValueType::Integer),
        PropertyExpressionProvider::on(
            ItemExpressionProvider::aliased(ROOT_ALIAS),
            "excess",
            ValueType::Integer,
        ),
    );
    let filter = ListConditionFilter::any(
        claims(),
        ListConditionFilter::any(
            PropertyExpressionProvider::new("payments", ValueType::list_of(ValueType::Object)),
            payment_over_excess,
        ),
    );
    let predicate = build_predicate(&filter, &context(), ValueType::Object)
        .await
        .unwrap();
    assert_eq!(
        predicate.to_string(),
        "this => this.claims.Any(object1 => object1.payments.Any(object2 => (object2.amount > this.excess)))"
    );
    assert!(predicate.evaluate(&record).unwrap());

    let record = policygate_core::Value::from(serde_json::json!({
        "excess": 500,
        "claims": [{ "payments": [{ "amount": 120 }] }]
    }));
    assert!(!predicate.evaluate(&record).unwrap());
}

#[tokio::test]
async fn test_nesting_beyond_configured_depth_is_unsupported() {
    let config = EngineConfig {
        max_scope_depth: 1,
        ..EngineConfig::default()
    };
    let ctx = context().with_config(config);
    let small_payment = || {
        BinaryComparisonFilter::less_than(
            PropertyExpressionProvider::new("amount", ValueType::Integer),
            ConstantExpressionProvider::new(100i64),
        )
    };
    let payments =
        || PropertyExpressionProvider::new("payments", ValueType::list_of(ValueType::Object));

    let shallow = ListConditionFilter::any(payments(), small_payment());
    assert!(build_predicate(&shallow, &ctx, ValueType::Object).await.is_ok());

    let deep = ListConditionFilter::any(
        claims(),
        ListConditionFilter::any(payments(), small_payment()),
    );
    let result = build_predicate(&deep, &ctx, ValueType::Object).await;
    assertions::assert_unsupported(&result);
    assert_eq!(result.unwrap_err().schema_key(), schema_keys::LIST_CONDITION);
}

#[tokio::test]
async fn test_not_equal_against_variable() {
    let filter = BinaryComparisonFilter::not_equal(
        PropertyExpressionProvider::new("policyNumber", ValueType::Text),
        VariableExpressionProvider::new("excluded"),
    );
    let ctx = context().with_variable("excluded", "POL-000999");
    let predicate = build_predicate(&filter, &ctx, ValueType::Object).await.unwrap();
    assert!(predicate.evaluate(&policy_record()).unwrap());

    let ctx = context().with_variable("excluded", "POL-000123");
    let predicate = build_predicate(&filter, &ctx, ValueType::Object).await.unwrap();
    assert!(!predicate.evaluate(&policy_record()).unwrap());
}

#[tokio::test]
async fn test_policy_rule_end_to_end() {
    // active policies incepted after mid-June with an open claim and a broker
    let rule = AggregateFilter::and(vec![
        Box::new(TextEqualityFilter::new(
            EnumTextExpressionProvider::new(PropertyExpressionProvider::new(
                "status",
                ValueType::Enum(policy_status_type()),
            )),
            ConstantExpressionProvider::new("active"),
        )),
        Box::new(TemporalComparisonFilter::date(
            PropertyExpressionProvider::new("inceptionDate", ValueType::Any),
            DateOperator::IsAfterOrEqualTo,
            ConstantExpressionProvider::new("2024-06-15"),
        )),
        Box::new(ListConditionFilter::any(
            claims(),
            ObjectPathLookupFilter::new("open"),
        )),
        Box::new(ObjectContainsPropertyFilter::new(
            PropertyExpressionProvider::new("extensions", ValueType::Object),
            ConstantExpressionProvider::new("broker"),
        )),
    ]);
    let predicate = build_predicate(&rule, &context(), ValueType::Object)
        .await
        .unwrap();

    let matching = policy_record();
    let others = vec![matching.clone(), policygate_core::Value::from(serde_json::json!({}))];
    let selected = predicate.filter(&others).unwrap();
    assert_eq!(selected, vec![&matching]);
}
