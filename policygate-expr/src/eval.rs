//! In-memory predicate evaluation
//!
//! Walks an [`Expr`] tree against concrete [`Value`]s. Guarded conversions
//! (numeric/date/time parses) fail with
//! [`FilterError::ParameterValueTypeInvalid`] attributed to the node's
//! [`Origin`], never with a raw parse error.

use crate::ast::*;
use policygate_core::{ticks, FilterError, FilterResult, Value};
use regex::RegexBuilder;
use std::cmp::Ordering;

/// Parameter bindings active while evaluating.
#[derive(Debug, Default)]
pub struct Environment {
    bindings: Vec<(ParamId, Value)>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, id: ParamId, value: Value) {
        self.bindings.push((id, value));
    }

    pub fn unbind(&mut self) {
        self.bindings.pop();
    }

    pub fn lookup(&self, id: ParamId) -> Option<&Value> {
        self.bindings
            .iter()
            .rev()
            .find(|(bound, _)| *bound == id)
            .map(|(_, value)| value)
    }
}

impl Predicate {
    /// Evaluate the predicate for one item.
    pub fn evaluate(&self, item: &Value) -> FilterResult<bool> {
        let mut env = Environment::new();
        env.bind(self.parameter.id, item.clone());
        match self.body.evaluate(&mut env)? {
            Value::Bool(b) => Ok(b),
            Value::Null => Ok(false),
            other => Err(FilterError::type_invalid(
                "predicate",
                self.parameter.alias.as_str(),
                format!("predicate produced {} instead of a boolean", other.value_type()),
            )),
        }
    }

    /// Items for which the predicate holds, in input order.
    pub fn filter<'a>(&self, items: &'a [Value]) -> FilterResult<Vec<&'a Value>> {
        let mut matched = Vec::new();
        for item in items {
            if self.evaluate(item)? {
                matched.push(item);
            }
        }
        Ok(matched)
    }
}

impl Expr {
    /// Evaluate this node under the given bindings.
    pub fn evaluate(&self, env: &mut Environment) -> FilterResult<Value> {
        match self {
            Expr::Literal { value, .. } => Ok(value.clone()),
            Expr::Parameter(parameter) => env.lookup(parameter.id).cloned().ok_or_else(|| {
                FilterError::unsupported(
                    "evaluator",
                    format!("parameter '{}' is not bound", parameter.alias),
                )
            }),
            Expr::Member { target, path, .. } => {
                let target = target.evaluate(env)?;
                Ok(target.lookup_path(path).cloned().unwrap_or(Value::Null))
            }
            Expr::Convert {
                inner,
                conversion,
                origin,
                ..
            } => {
                let value = inner.evaluate(env)?;
                apply_conversion(*conversion, value, origin)
            }
            Expr::EnumToString { inner, .. } => match inner.evaluate(env)? {
                Value::Null => Ok(Value::Null),
                Value::Enum(value) => Ok(Value::Text(value.member_name())),
                other => Ok(Value::Text(other.to_string())),
            },
            Expr::Comparison {
                op,
                left,
                right,
                origin,
            } => {
                let left = left.evaluate(env)?;
                let right = right.evaluate(env)?;
                compare(*op, &left, &right, origin).map(Value::Bool)
            }
            Expr::Logical { op, left, right } => {
                // both sides are always evaluated
                let left = expect_bool(left.evaluate(env)?, op.symbol())?;
                let right = expect_bool(right.evaluate(env)?, op.symbol())?;
                Ok(Value::Bool(op.apply(left, right)))
            }
            Expr::Not(inner) => {
                let value = expect_bool(inner.evaluate(env)?, "!")?;
                Ok(Value::Bool(!value))
            }
            Expr::Quantifier {
                kind,
                collection,
                parameter,
                predicate,
                origin,
            } => {
                let items = match collection.evaluate(env)? {
                    Value::Null => Vec::new(),
                    Value::List(items) => items,
                    other => {
                        return Err(origin.type_invalid(format!(
                            "expected a list, got {}",
                            other.value_type()
                        )))
                    }
                };
                quantify(*kind, items, parameter, predicate, env).map(Value::Bool)
            }
            Expr::Call {
                function,
                args,
                origin,
                ..
            } => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(arg.evaluate(env)?);
                }
                call(function, values, origin)
            }
        }
    }
}

fn expect_bool(value: Value, operator: &str) -> FilterResult<bool> {
    match value {
        Value::Bool(b) => Ok(b),
        Value::Null => Ok(false),
        other => Err(FilterError::type_invalid(
            "evaluator",
            operator,
            format!("logical operand is {}, not bool", other.value_type()),
        )),
    }
}

fn quantify(
    kind: QuantifierKind,
    items: Vec<Value>,
    parameter: &ParamRef,
    predicate: &Expr,
    env: &mut Environment,
) -> FilterResult<bool> {
    let mut matches = 0usize;
    for item in items {
        env.bind(parameter.id, item);
        let result = predicate.evaluate(env);
        env.unbind();
        if expect_bool(result?, kind.name())? {
            matches += 1;
            match kind {
                QuantifierKind::Any => return Ok(true),
                QuantifierKind::One if matches > 1 => return Ok(false),
                _ => {}
            }
        } else if kind == QuantifierKind::All {
            return Ok(false);
        }
    }
    Ok(match kind {
        QuantifierKind::Any => false,
        QuantifierKind::All => true,
        QuantifierKind::One => matches == 1,
    })
}

fn apply_conversion(conversion: Conversion, value: Value, origin: &Origin) -> FilterResult<Value> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    match conversion {
        Conversion::UnwrapNullable | Conversion::LiftNullable => Ok(value),
        Conversion::ToText => Ok(Value::Text(value.to_string())),
        Conversion::ParseInteger => match value {
            Value::Integer(_) => Ok(value),
            Value::Number(n) if n.fract() == 0.0 && (-I64_BOUND..I64_BOUND).contains(&n) => {
                Ok(Value::Integer(n as i64))
            }
            Value::Text(ref text) => text.trim().parse::<i64>().map(Value::Integer).map_err(|_| {
                origin.type_invalid(format!("'{}' is not a valid integer", text))
            }),
            other => Err(origin.type_invalid(format!("{} is not a valid integer", other))),
        },
        Conversion::ParseNumber => match value {
            Value::Number(_) => Ok(value),
            Value::Integer(i) => Ok(Value::Number(i as f64)),
            Value::Text(ref text) => text
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .map(Value::Number)
                .ok_or_else(|| origin.type_invalid(format!("'{}' is not a valid number", text))),
            other => Err(origin.type_invalid(format!("{} is not a valid number", other))),
        },
    }
}

/// Lifted comparison: equality treats two nulls as equal, ordering with a null is false.
fn compare(op: ComparisonOp, left: &Value, right: &Value, origin: &Origin) -> FilterResult<bool> {
    match op {
        ComparisonOp::Equal => Ok(values_equal(left, right)),
        ComparisonOp::NotEqual => Ok(!values_equal(left, right)),
        ComparisonOp::StartsWith | ComparisonOp::EndsWith | ComparisonOp::Contains => {
            match (left, right) {
                (Value::Null, _) | (_, Value::Null) => Ok(false),
                (Value::Text(l), Value::Text(r)) => Ok(match op {
                    ComparisonOp::StartsWith => l.starts_with(r.as_str()),
                    ComparisonOp::EndsWith => l.ends_with(r.as_str()),
                    _ => l.contains(r.as_str()),
                }),
                _ => Err(origin.type_invalid(format!(
                    "'{}' needs text operands, got {} and {}",
                    op.symbol(),
                    left.value_type(),
                    right.value_type()
                ))),
            }
        }
        ComparisonOp::GreaterThan
        | ComparisonOp::GreaterThanOrEqual
        | ComparisonOp::LessThan
        | ComparisonOp::LessThanOrEqual => {
            if left.is_null() || right.is_null() {
                return Ok(false);
            }
            let ordering = order_values(left, right).ok_or_else(|| {
                origin.type_invalid(format!(
                    "cannot order {} against {}",
                    left.value_type(),
                    right.value_type()
                ))
            })?;
            Ok(match op {
                ComparisonOp::GreaterThan => ordering == Ordering::Greater,
                ComparisonOp::GreaterThanOrEqual => ordering != Ordering::Less,
                ComparisonOp::LessThan => ordering == Ordering::Less,
                _ => ordering != Ordering::Greater,
            })
        }
    }
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Enum(e), Value::Integer(i)) | (Value::Integer(i), Value::Enum(e)) => {
            e.ordinal == *i
        }
        // records loaded from JSON carry enums by member name
        (Value::Enum(_), Value::Text(_)) | (Value::Text(_), Value::Enum(_)) => {
            left.loosely_equals(right)
        }
        _ => match order_values(left, right) {
            Some(ordering) => ordering == Ordering::Equal,
            None => left == right,
        },
    }
}

fn order_values(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
        (Value::Integer(_) | Value::Number(_), Value::Integer(_) | Value::Number(_)) => {
            left.as_f64()?.partial_cmp(&right.as_f64()?)
        }
        (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::DateTime(a), Value::DateTime(b)) => Some(a.cmp(b)),
        (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
        (Value::Time(a), Value::Time(b)) => Some(a.cmp(b)),
        (Value::Enum(a), Value::Enum(b)) => Some(a.ordinal.cmp(&b.ordinal)),
        _ => None,
    }
}

fn call(function: &Function, args: Vec<Value>, origin: &Origin) -> FilterResult<Value> {
    let mut args = args.into_iter();
    let mut next = || args.next().unwrap_or(Value::Null);
    match function {
        Function::RegexIsMatch {
            compiled,
            size_limit,
        } => {
            let text = match next() {
                Value::Text(text) => text,
                Value::Null => return Ok(Value::Bool(false)),
                other => {
                    return Err(origin.type_invalid(format!(
                        "regex input must be text, got {}",
                        other.value_type()
                    )))
                }
            };
            if let Some(CompiledRegex(regex)) = compiled {
                return Ok(Value::Bool(regex.is_match(&text)));
            }
            let Value::Text(pattern) = next() else {
                return Err(origin.type_invalid("regex pattern must be text"));
            };
            let regex = RegexBuilder::new(&pattern)
                .size_limit(*size_limit)
                .build()
                .map_err(|e| origin.type_invalid(format!("invalid regex '{}': {}", pattern, e)))?;
            Ok(Value::Bool(regex.is_match(&text)))
        }
        Function::ListContains => {
            let list = next();
            let needle = next();
            match list {
                Value::Null => Ok(Value::Bool(false)),
                Value::List(items) => Ok(Value::Bool(
                    items.iter().any(|item| item.loosely_equals(&needle)),
                )),
                other => Err(origin.type_invalid(format!(
                    "expected a list, got {}",
                    other.value_type()
                ))),
            }
        }
        Function::HasProperty => {
            let object = next();
            let name = next();
            let Value::Text(name) = name else {
                return Err(origin.type_invalid("property name must be text"));
            };
            match object {
                Value::Null => Ok(Value::Bool(false)),
                Value::Object(map) => Ok(Value::Bool(map.contains_key(&name))),
                other => Err(origin.type_invalid(format!(
                    "cannot check property '{}' on {}",
                    name,
                    other.value_type()
                ))),
            }
        }
        Function::PathLookup => {
            let object = next();
            let path = next();
            let default = next();
            let Value::Text(path) = path else {
                return Err(origin.type_invalid("lookup path must be text"));
            };
            Ok(object.lookup_path(&path).cloned().unwrap_or(default))
        }
        Function::ParseBoolOrFalse => Ok(Value::Bool(match next() {
            Value::Bool(b) => b,
            Value::Text(text) => text.trim().eq_ignore_ascii_case("true"),
            _ => false,
        })),
        Function::ToTicks => match next() {
            Value::Null => Ok(Value::Null),
            Value::Integer(t) => Ok(Value::Integer(t)),
            Value::DateTime(at) => ticks::to_ticks(at)
                .map(Value::Integer)
                .ok_or_else(|| origin.type_invalid(format!("{} is outside the tick range", at))),
            Value::Date(date) => ticks::start_of_day_ticks(date)
                .map(Value::Integer)
                .ok_or_else(|| origin.type_invalid(format!("{} is outside the tick range", date))),
            Value::Text(text) => {
                let at = ticks::parse_date_time(&text)
                    .ok_or_else(|| origin.type_invalid(format!("'{}' is not a valid date", text)))?;
                ticks::to_ticks(at).map(Value::Integer).ok_or_else(|| {
                    origin.type_invalid(format!("'{}' is outside the tick range", text))
                })
            }
            other => Err(origin.type_invalid(format!(
                "{} cannot be converted to ticks",
                other.value_type()
            ))),
        },
        Function::StartOfDay => day_bound(next(), origin, ticks::floor_to_day),
        Function::EndOfDay => day_bound(next(), origin, ticks::ceil_to_day_end),
        Function::AddTicks(delta) => match next() {
            Value::Null => Ok(Value::Null),
            Value::Integer(t) => t
                .checked_add(*delta)
                .map(Value::Integer)
                .ok_or_else(|| origin.type_invalid("tick offset overflows")),
            other => Err(origin.type_invalid(format!(
                "expected ticks, got {}",
                other.value_type()
            ))),
        },
        Function::Remainder => match (next(), next()) {
            (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
            (Value::Integer(_), Value::Integer(0)) => Err(origin.type_invalid("remainder by zero")),
            (Value::Integer(a), Value::Integer(b)) => Ok(Value::Integer(a.wrapping_rem(b))),
            (a, b) => Err(origin.type_invalid(format!(
                "remainder needs integers, got {} and {}",
                a.value_type(),
                b.value_type()
            ))),
        },
        Function::ListOf => Ok(Value::List(args.collect())),
        Function::ToTimeOfDay => match next() {
            Value::Null => Ok(Value::Null),
            Value::Time(time) => Ok(Value::Time(time)),
            Value::DateTime(at) => Ok(Value::Time(at.time())),
            Value::Integer(t) => ticks::time_of_day_from_ticks(t)
                .map(Value::Time)
                .ok_or_else(|| origin.type_invalid(format!("{} is not a valid tick count", t))),
            Value::Text(text) => ticks::parse_time(&text)
                .or_else(|| ticks::parse_date_time(&text).map(|at| at.time()))
                .map(Value::Time)
                .ok_or_else(|| origin.type_invalid(format!("'{}' is not a valid time", text))),
            other => Err(origin.type_invalid(format!(
                "{} cannot be converted to a time of day",
                other.value_type()
            ))),
        },
    }
}

/// 2^63, the first magnitude an `i64` cannot hold.
const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;

fn day_bound(
    value: Value,
    origin: &Origin,
    bound: fn(i64) -> Option<i64>,
) -> FilterResult<Value> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::Integer(t) => bound(t)
            .map(Value::Integer)
            .ok_or_else(|| origin.type_invalid(format!("{} has no day boundary in tick range", t))),
        other => Err(origin.type_invalid(format!(
            "expected ticks, got {}",
            other.value_type()
        ))),
    }
}

// =============================================================================
// TESTS
// =============================================================================
