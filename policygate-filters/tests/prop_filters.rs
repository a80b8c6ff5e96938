//! Property tests over generated filter inputs.

use policygate_expr::{
    ConstantExpressionProvider, ItemExpressionProvider, ListExpressionProvider,
    PropertyExpressionProvider, RemainderExpressionProvider,
};
use policygate_filters::{
    AggregateFilter, BinaryComparisonFilter, BoxedFilterProvider, DateOperator,
    ListConditionFilter, ListContainsValueFilter, NotFilter, TemporalComparisonFilter,
};
use policygate_test_utils::fixtures::{context, record_with};
use policygate_test_utils::generators::{arb_bools, arb_date_time, arb_integer_list, arb_scalar};
use policygate_test_utils::{build_predicate, FilterProvider, Value, ValueType};
use proptest::prelude::*;
use tokio::runtime::Runtime;

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
}

fn evaluate(rt: &Runtime, filter: &dyn FilterProvider, record: &Value) -> bool {
    let predicate = rt
        .block_on(build_predicate(filter, &context(), ValueType::Object))
        .unwrap();
    predicate.evaluate(record).unwrap()
}

fn constants(values: &[bool]) -> Vec<BoxedFilterProvider> {
    values
        .iter()
        .map(|b| Box::new(policygate_test_utils::ConstantFilter(*b)) as BoxedFilterProvider)
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_aggregates_fold_like_iterators(values in arb_bools()) {
        let rt = runtime();
        let and = evaluate(&rt, &AggregateFilter::and(constants(&values)), &Value::Null);
        let or = evaluate(&rt, &AggregateFilter::or(constants(&values)), &Value::Null);
        prop_assert_eq!(and, values.iter().all(|b| *b));
        prop_assert_eq!(or, values.iter().any(|b| *b));
    }

    #[test]
    fn prop_not_inverts(values in arb_bools()) {
        let rt = runtime();
        let plain = evaluate(&rt, &AggregateFilter::or(constants(&values)), &Value::Null);
        let negated = evaluate(
            &rt,
            &NotFilter::new(AggregateFilter::or(constants(&values))),
            &Value::Null,
        );
        prop_assert_eq!(negated, !plain);
    }

    #[test]
    fn prop_quantifiers_match_iterators(values in arb_integer_list()) {
        let rt = runtime();
        let is_odd = || BinaryComparisonFilter::equal(
            RemainderExpressionProvider::new(
                ItemExpressionProvider::current(),
                ConstantExpressionProvider::new(2i64),
            ),
            ConstantExpressionProvider::new(1i64),
        );
        let list = || ListExpressionProvider::of_values(values.clone());
        let odd = |x: &i64| x % 2 == 1;

        let any = evaluate(&rt, &ListConditionFilter::any(list(), is_odd()), &Value::Null);
        let all = evaluate(&rt, &ListConditionFilter::all(list(), is_odd()), &Value::Null);
        let one = evaluate(
            &rt,
            &ListConditionFilter::new(list(), "One".parse().unwrap(), is_odd()),
            &Value::Null,
        );
        prop_assert_eq!(any, values.iter().any(odd));
        prop_assert_eq!(all, values.iter().all(odd));
        prop_assert_eq!(one, values.iter().filter(|x| odd(*x)).count() == 1);
    }

    #[test]
    fn prop_date_time_equality_is_one_minute_window(
        comparand in arb_date_time(),
        offset in -120i64..120,
    ) {
        let rt = runtime();
        let filter = TemporalComparisonFilter::date_time(
            PropertyExpressionProvider::new("at", ValueType::DateTime),
            DateOperator::IsEqualTo,
            ConstantExpressionProvider::new(comparand),
        );
        let value = comparand + chrono::Duration::seconds(offset);
        let equal = evaluate(&rt, &filter, &record_with("at", value));
        prop_assert_eq!(equal, (0..60).contains(&offset));
    }

    #[test]
    fn prop_date_after_matches_calendar_day(
        value in arb_date_time(),
        comparand in arb_date_time(),
    ) {
        let rt = runtime();
        let filter = TemporalComparisonFilter::date(
            PropertyExpressionProvider::new("at", ValueType::DateTime),
            DateOperator::IsAfter,
            ConstantExpressionProvider::new(comparand.date_naive()),
        );
        let after = evaluate(&rt, &filter, &record_with("at", value));
        prop_assert_eq!(after, value.date_naive() > comparand.date_naive());
    }

    #[test]
    fn prop_list_contains_finds_members(values in arb_integer_list(), needle in -1000i64..1000) {
        let rt = runtime();
        let filter = ListContainsValueFilter::new(
            ListExpressionProvider::of_values(values.clone()),
            ConstantExpressionProvider::new(needle.to_string()),
        );
        let found = evaluate(&rt, &filter, &Value::Null);
        prop_assert_eq!(found, values.contains(&needle));
    }

    #[test]
    fn prop_equality_is_reflexive_for_scalars(value in arb_scalar()) {
        let rt = runtime();
        let filter = BinaryComparisonFilter::equal(
            PropertyExpressionProvider::new("field", ValueType::Any),
            ConstantExpressionProvider::typed(value.clone(), ValueType::Any),
        );
        prop_assert!(evaluate(&rt, &filter, &record_with("field", value)));
    }
}
