//! Date, date-time and time-of-day comparison filters
//!
//! Date and date-time operands are normalized to ticks before comparing.
//! Date comparisons widen the comparand to the whole UTC day it falls on:
//!
//! ```text
//! isAfter           value >  endOfDay(comparand)
//! isAfterOrEqualTo  value >= startOfDay(comparand)
//! isBefore          value <  startOfDay(comparand)
//! isBeforeOrEqualTo value <= endOfDay(comparand)
//! isEqualTo         value >= startOfDay(comparand) & value <= endOfDay(comparand)
//! ```
//!
//! Date-time equality holds within one minute from the comparand:
//! `value >= comparand & value < comparand + 1 minute`.

use crate::provider::{schema_keys, FilterProvider};
use async_trait::async_trait;
use policygate_core::ticks::TICKS_PER_MINUTE;
use policygate_core::{EvaluationContext, FilterError, FilterResult, ValueType};
use policygate_expr::{
    BoxedExpressionProvider, ComparisonOp, Expr, ExpressionProvider, ExpressionScope, Function,
    LogicalOp, Origin, Predicate,
};
use std::str::FromStr;

/// Temporal comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DateOperator {
    IsBefore,
    IsBeforeOrEqualTo,
    IsAfter,
    IsAfterOrEqualTo,
    IsEqualTo,
}

impl DateOperator {
    pub fn name(&self) -> &'static str {
        match self {
            DateOperator::IsBefore => "isBefore",
            DateOperator::IsBeforeOrEqualTo => "isBeforeOrEqualTo",
            DateOperator::IsAfter => "isAfter",
            DateOperator::IsAfterOrEqualTo => "isAfterOrEqualTo",
            DateOperator::IsEqualTo => "isEqualTo",
        }
    }

    fn comparison(&self) -> ComparisonOp {
        match self {
            DateOperator::IsBefore => ComparisonOp::LessThan,
            DateOperator::IsBeforeOrEqualTo => ComparisonOp::LessThanOrEqual,
            DateOperator::IsAfter => ComparisonOp::GreaterThan,
            DateOperator::IsAfterOrEqualTo => ComparisonOp::GreaterThanOrEqual,
            DateOperator::IsEqualTo => ComparisonOp::Equal,
        }
    }
}

impl FromStr for DateOperator {
    type Err = FilterError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        let normalized = name.trim().to_ascii_lowercase().replace(['_', '-'], "");
        Ok(match normalized.as_str() {
            "isbefore" | "before" => DateOperator::IsBefore,
            "isbeforeorequalto" | "beforeorequal" => DateOperator::IsBeforeOrEqualTo,
            "isafter" | "after" => DateOperator::IsAfter,
            "isafterorequalto" | "afterorequal" => DateOperator::IsAfterOrEqualTo,
            "isequalto" | "equal" | "equals" => DateOperator::IsEqualTo,
            _ => {
                return Err(FilterError::unsupported(
                    "dateOperator",
                    format!("date operator '{}'", name),
                ))
            }
        })
    }
}

/// Granularity of a temporal comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemporalKind {
    /// Whole UTC days
    Date,
    /// Ticks, with a one-minute equality window
    DateTime,
    /// Time of day
    Time,
}

impl TemporalKind {
    fn schema_key(&self) -> &'static str {
        match self {
            TemporalKind::Date => schema_keys::DATE_COMPARISON,
            TemporalKind::DateTime => schema_keys::DATE_TIME_COMPARISON,
            TemporalKind::Time => schema_keys::TIME_COMPARISON,
        }
    }

    /// Operand role names used in error reports: `(value, comparand)`.
    fn roles(&self) -> (&'static str, &'static str) {
        match self {
            TemporalKind::Date => ("date", "comparisonDate"),
            TemporalKind::DateTime => ("dateTime", "comparisonDateTime"),
            TemporalKind::Time => ("time", "comparisonTime"),
        }
    }
}

/// Compares a temporal value against a comparand.
#[derive(Debug)]
pub struct TemporalComparisonFilter {
    kind: TemporalKind,
    value: BoxedExpressionProvider,
    comparand: BoxedExpressionProvider,
    operator: DateOperator,
}

impl TemporalComparisonFilter {
    pub fn new(
        kind: TemporalKind,
        value: impl ExpressionProvider + 'static,
        operator: DateOperator,
        comparand: impl ExpressionProvider + 'static,
    ) -> Self {
        Self {
            kind,
            value: Box::new(value),
            comparand: Box::new(comparand),
            operator,
        }
    }

    pub fn date(
        value: impl ExpressionProvider + 'static,
        operator: DateOperator,
        comparand: impl ExpressionProvider + 'static,
    ) -> Self {
        Self::new(TemporalKind::Date, value, operator, comparand)
    }

    pub fn date_time(
        value: impl ExpressionProvider + 'static,
        operator: DateOperator,
        comparand: impl ExpressionProvider + 'static,
    ) -> Self {
        Self::new(TemporalKind::DateTime, value, operator, comparand)
    }

    pub fn time(
        value: impl ExpressionProvider + 'static,
        operator: DateOperator,
        comparand: impl ExpressionProvider + 'static,
    ) -> Self {
        Self::new(TemporalKind::Time, value, operator, comparand)
    }

    fn date_body(&self, value: Expr, comparand: Expr, origin: &Origin) -> Expr {
        let start = |c: Expr| day_call(Function::StartOfDay, c, origin);
        let end = |c: Expr| day_call(Function::EndOfDay, c, origin);
        let cmp = |op: ComparisonOp, bound: Expr| Expr::compare(op, value.clone(), bound, origin.clone());
        match self.operator {
            DateOperator::IsAfter => cmp(ComparisonOp::GreaterThan, end(comparand)),
            DateOperator::IsAfterOrEqualTo => {
                cmp(ComparisonOp::GreaterThanOrEqual, start(comparand))
            }
            DateOperator::IsBefore => cmp(ComparisonOp::LessThan, start(comparand)),
            DateOperator::IsBeforeOrEqualTo => cmp(ComparisonOp::LessThanOrEqual, end(comparand)),
            DateOperator::IsEqualTo => Expr::logical(
                LogicalOp::And,
                cmp(ComparisonOp::GreaterThanOrEqual, start(comparand.clone())),
                cmp(ComparisonOp::LessThanOrEqual, end(comparand)),
            ),
        }
    }

    fn date_time_body(&self, value: Expr, comparand: Expr, origin: &Origin) -> Expr {
        if self.operator != DateOperator::IsEqualTo {
            return Expr::compare(self.operator.comparison(), value, comparand, origin.clone());
        }
        let window_end = Expr::call(
            Function::AddTicks(TICKS_PER_MINUTE),
            vec![comparand.clone()],
            comparand.value_type(),
            origin.clone(),
        );
        Expr::logical(
            LogicalOp::And,
            Expr::compare(
                ComparisonOp::GreaterThanOrEqual,
                value.clone(),
                comparand,
                origin.clone(),
            ),
            Expr::compare(ComparisonOp::LessThan, value, window_end, origin.clone()),
        )
    }
}

#[async_trait]
impl FilterProvider for TemporalComparisonFilter {
    async fn resolve(
        &self,
        ctx: &EvaluationContext,
        scope: &mut ExpressionScope,
    ) -> FilterResult<Predicate> {
        let key = self.kind.schema_key();
        ctx.ensure_active(key)?;
        tracing::trace!(schema_key = key, operator = self.operator.name(), "resolve temporal comparison");

        let (value_role, comparand_role) = self.kind.roles();
        let value = self.value.resolve(ctx, scope).await?;
        let comparand = self.comparand.resolve(ctx, scope).await?;

        let origin = Origin::new(key, comparand_role);
        let body = match self.kind {
            TemporalKind::Date => {
                let value = normalize_to_ticks(value, key, value_role)?;
                let comparand = normalize_to_ticks(comparand, key, comparand_role)?;
                self.date_body(value, comparand, &origin)
            }
            TemporalKind::DateTime => {
                let value = normalize_to_ticks(value, key, value_role)?;
                let comparand = normalize_to_ticks(comparand, key, comparand_role)?;
                self.date_time_body(value, comparand, &origin)
            }
            TemporalKind::Time => {
                let value = normalize_to_time(value, key, value_role)?;
                let comparand = normalize_to_time(comparand, key, comparand_role)?;
                Expr::compare(self.operator.comparison(), value, comparand, origin)
            }
        };
        Ok(Predicate::new(scope.current_parameter().clone(), body))
    }

    fn schema_reference_key(&self) -> &str {
        self.kind.schema_key()
    }
}

fn day_call(function: Function, ticks: Expr, origin: &Origin) -> Expr {
    let ty = ticks.value_type();
    Expr::call(function, vec![ticks], ty, origin.clone())
}

/// Convert a date, date-time, tick count or text operand to ticks.
fn normalize_to_ticks(expr: Expr, schema_key: &str, role: &str) -> FilterResult<Expr> {
    let ty = expr.value_type();
    match ty.underlying() {
        ValueType::Integer => Ok(expr),
        ValueType::Date | ValueType::DateTime | ValueType::Text | ValueType::Any => {
            let ticks_type = if ty.is_nullable() {
                ValueType::Integer.nullable()
            } else {
                ValueType::Integer
            };
            Ok(Expr::call(
                Function::ToTicks,
                vec![expr],
                ticks_type,
                Origin::new(schema_key, role),
            ))
        }
        other => Err(FilterError::type_invalid(
            schema_key,
            role,
            format!("expected a date, date-time or tick count, got {}", other),
        )),
    }
}

/// Convert a time, date-time, tick count or text operand to a time of day.
fn normalize_to_time(expr: Expr, schema_key: &str, role: &str) -> FilterResult<Expr> {
    let ty = expr.value_type();
    match ty.underlying() {
        ValueType::Time => Ok(expr),
        ValueType::DateTime | ValueType::Integer | ValueType::Text | ValueType::Any => {
            let time_type = if ty.is_nullable() {
                ValueType::Time.nullable()
            } else {
                ValueType::Time
            };
            Ok(Expr::call(
                Function::ToTimeOfDay,
                vec![expr],
                time_type,
                Origin::new(schema_key, role),
            ))
        }
        other => Err(FilterError::type_invalid(
            schema_key,
            role,
            format!("expected a time, date-time or tick count, got {}", other),
        )),
    }
}
