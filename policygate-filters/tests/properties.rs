//! Behavioural guarantees of the filter engine, checked end to end:
//! build a filter tree, resolve it to a predicate, evaluate records.

use chrono::{NaiveDate, TimeZone, Utc};
use policygate_expr::{
    ConstantExpressionProvider, ItemExpressionProvider, ListExpressionProvider,
    PropertyExpressionProvider, RemainderExpressionProvider, TextExpressionProvider,
};
use policygate_filters::{
    AggregateFilter, BinaryComparisonFilter, BoxedFilterProvider, DateOperator,
    ListConditionFilter, NotFilter, ObjectPathLookupFilter, TemporalComparisonFilter, XorFilter,
};
use policygate_test_utils::fixtures::{context, record_with};
use policygate_test_utils::{
    assertions, build_predicate, init_test_tracing, ConstantFilter, ErrorCode, ExpressionScope,
    FailingFilterProvider, FilterProvider, Predicate, Value, ValueType,
};

async fn compile(filter: &dyn FilterProvider) -> Predicate {
    build_predicate(filter, &context(), ValueType::Object)
        .await
        .unwrap()
}

async fn holds(filter: &dyn FilterProvider, record: &Value) -> bool {
    compile(filter).await.evaluate(record).unwrap()
}

fn constants(values: &[bool]) -> Vec<BoxedFilterProvider> {
    values
        .iter()
        .map(|b| Box::new(ConstantFilter(*b)) as BoxedFilterProvider)
        .collect()
}

// ============================================================================
// AGGREGATES
// ============================================================================

#[tokio::test]
async fn test_aggregate_identities() {
    init_test_tracing();
    let record = Value::Null;

    assert!(holds(&AggregateFilter::and(vec![]), &record).await);
    assert!(!holds(&AggregateFilter::or(vec![]), &record).await);

    for b in [true, false] {
        assert_eq!(holds(&AggregateFilter::and(constants(&[b])), &record).await, b);
        assert_eq!(holds(&AggregateFilter::or(constants(&[b])), &record).await, b);
    }
}

#[tokio::test]
async fn test_xor_truth_table() {
    for (a, b) in [(false, false), (false, true), (true, false), (true, true)] {
        let filter = XorFilter::new(ConstantFilter(a), ConstantFilter(b));
        assert_eq!(holds(&filter, &Value::Null).await, a ^ b, "{} ^ {}", a, b);
    }
}

#[tokio::test]
async fn test_not_and_is_opposite_of_and() {
    for (a, b) in [(false, false), (false, true), (true, false), (true, true)] {
        let and = AggregateFilter::and(constants(&[a, b]));
        let not_and = NotFilter::new(AggregateFilter::and(constants(&[a, b])));
        let plain = holds(&and, &Value::Null).await;
        let negated = holds(&not_and, &Value::Null).await;
        assert_eq!(plain, a && b);
        assert_eq!(negated, !plain, "a={} b={}", a, b);
    }
}

// ============================================================================
// TEMPORAL
// ============================================================================

#[tokio::test]
async fn test_date_after_uses_end_of_comparand_day() {
    let filter = TemporalComparisonFilter::date(
        PropertyExpressionProvider::new("inception", ValueType::DateTime),
        DateOperator::IsAfter,
        ConstantExpressionProvider::new(NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()),
    );
    let predicate = compile(&filter).await;

    let last_second = Utc.with_ymd_and_hms(2024, 6, 15, 23, 59, 59).unwrap();
    let next_day = Utc.with_ymd_and_hms(2024, 6, 16, 0, 0, 0).unwrap();
    assert!(!predicate.evaluate(&record_with("inception", last_second)).unwrap());
    assert!(predicate.evaluate(&record_with("inception", next_day)).unwrap());
}

#[tokio::test]
async fn test_date_time_equality_window() {
    let comparand = Utc.with_ymd_and_hms(2024, 6, 15, 10, 0, 0).unwrap();
    let filter = TemporalComparisonFilter::date_time(
        PropertyExpressionProvider::new("submittedAt", ValueType::DateTime),
        DateOperator::IsEqualTo,
        ConstantExpressionProvider::new(comparand),
    );
    let predicate = compile(&filter).await;

    let at = |s| record_with("submittedAt", comparand + chrono::Duration::seconds(s));
    assert!(predicate.evaluate(&at(0)).unwrap());
    assert!(predicate.evaluate(&at(59)).unwrap());
    assert!(!predicate.evaluate(&at(60)).unwrap());
    assert!(!predicate.evaluate(&at(61)).unwrap());
    assert!(!predicate.evaluate(&at(-1)).unwrap());
}

// ============================================================================
// LIST QUANTIFIERS
// ============================================================================

/// `item % 2 == 1` over a constant list.
fn odd_items(values: &[i64], match_type: &str) -> ListConditionFilter {
    let is_odd = BinaryComparisonFilter::equal(
        RemainderExpressionProvider::new(
            ItemExpressionProvider::current(),
            ConstantExpressionProvider::new(2i64),
        ),
        ConstantExpressionProvider::new(1i64),
    );
    ListConditionFilter::new(
        ListExpressionProvider::of_values(values.to_vec()),
        match_type.parse().unwrap(),
        is_odd,
    )
}

#[tokio::test]
async fn test_any_and_all_over_integer_lists() {
    let cases: [(&[i64], bool, bool); 3] = [
        (&[1, 3, 5], true, true),
        (&[1, 2, 5], true, false),
        (&[], false, true),
    ];
    for (values, any, all) in cases {
        assert_eq!(holds(&odd_items(values, "Any"), &Value::Null).await, any, "Any {:?}", values);
        assert_eq!(holds(&odd_items(values, "All"), &Value::Null).await, all, "All {:?}", values);
    }
}

#[tokio::test]
async fn test_failed_condition_leaves_scope_untouched() {
    let ctx = context();
    let mut scope = ExpressionScope::for_item(ValueType::Object);
    let before = scope.current_parameter().clone();

    let failing = FailingFilterProvider::new();
    let filter = ListConditionFilter::any(
        ListExpressionProvider::of_values([1i64, 2, 3]),
        failing.clone(),
    );
    let result = filter.resolve(&ctx, &mut scope).await;

    assertions::assert_type_invalid(&result);
    let seen = failing.observed().unwrap();
    assert_eq!(seen.depth, 1);
    assert_eq!(seen.alias, "integer1");
    assert_eq!(scope.depth(), 0);
    assert_eq!(scope.current_parameter(), &before);
}

// ============================================================================
// COERCION
// ============================================================================

#[tokio::test]
async fn test_numeric_text_coerces_to_integer() {
    // a field of an externally sourced data object, typed only at runtime
    let filter = BinaryComparisonFilter::equal(
        PropertyExpressionProvider::new("code", ValueType::Any),
        ConstantExpressionProvider::new(42i64),
    );
    let predicate = compile(&filter).await;
    assert!(predicate.evaluate(&record_with("code", "42")).unwrap());
    assert!(!predicate.evaluate(&record_with("code", "41")).unwrap());

    let err = predicate.evaluate(&record_with("code", "abc")).unwrap_err();
    assert_eq!(err.code(), ErrorCode::ParameterValueTypeInvalid);
}

#[tokio::test]
async fn test_computed_text_coerces_to_integer() {
    let filter = BinaryComparisonFilter::equal(
        TextExpressionProvider::new(ConstantExpressionProvider::new("42")),
        ConstantExpressionProvider::new(42i64),
    );
    assert!(holds(&filter, &Value::Null).await);

    let filter = BinaryComparisonFilter::equal(
        TextExpressionProvider::new(ConstantExpressionProvider::new("abc")),
        ConstantExpressionProvider::new(42i64),
    );
    let predicate = compile(&filter).await;
    assert_eq!(
        predicate.evaluate(&Value::Null).unwrap_err().code(),
        ErrorCode::ParameterValueTypeInvalid
    );
}

#[tokio::test]
async fn test_typed_text_field_is_rejected_while_building() {
    let filter = BinaryComparisonFilter::equal(
        PropertyExpressionProvider::new("code", ValueType::Text),
        ConstantExpressionProvider::new(42i64),
    );
    let result = build_predicate(&filter, &context(), ValueType::Object).await;
    assertions::assert_type_invalid(&result);
}

// ============================================================================
// FAIL-OPEN LOOKUP
// ============================================================================

#[tokio::test]
async fn test_unparseable_path_value_is_false() {
    let filter = ObjectPathLookupFilter::new("flags.autoRenew");
    let record = Value::from(serde_json::json!({ "flags": { "autoRenew": "notabool" } }));
    let predicate = compile(&filter).await;
    assert_eq!(predicate.evaluate(&record), Ok(false));
}
