//! Operand type reconciliation
//!
//! When the two operands of a comparison disagree on type, the first operand
//! is converted to the second operand's type. The rules, in order:
//!
//! | first            | second        | result                              |
//! |------------------|---------------|-------------------------------------|
//! | `T`              | `T`           | unchanged                           |
//! | any              | `any`         | unchanged, checked when evaluated   |
//! | `any`            | text          | `toText(first)`                     |
//! | `any`            | numeric       | guarded parse of first              |
//! | `T?`             | `T`           | unwrap nullable                     |
//! | `T`              | `T?`          | lift to nullable                    |
//! | numeric          | numeric       | guarded numeric conversion          |
//! | anything         | text          | `toText(first)`                     |
//! | member access    | numeric       | rejected immediately                |
//! | computed value   | numeric       | `parse(toText(first))`, guarded     |
//! | anything         | anything else | unsupported                         |

use policygate_core::{FilterError, FilterResult, ValueType};
use policygate_expr::{Conversion, Expr, Origin};

/// Operand role reported in coercion errors.
const FIRST_OPERAND: &str = "first";

/// Convert `first` so it can be compared against a value of type `target`.
pub fn reconcile(first: Expr, target: &ValueType, schema_key: &str) -> FilterResult<Expr> {
    let source = first.value_type();
    if &source == target || *target == ValueType::Any {
        return Ok(first);
    }
    let origin = Origin::new(schema_key, FIRST_OPERAND);

    if source == ValueType::Any {
        // externally sourced data: the runtime value decides
        tracing::trace!(%target, schema_key, "coerce dynamic operand");
        return match target.underlying() {
            ValueType::Text => Ok(to_text(first, origin)),
            ValueType::Integer => Ok(parse(first, Conversion::ParseInteger, target, origin)),
            ValueType::Number => Ok(parse(first, Conversion::ParseNumber, target, origin)),
            _ => Ok(first),
        };
    }

    if source.is_nullable_of(target) {
        tracing::trace!(%source, %target, schema_key, "unwrap nullable operand");
        return Ok(Expr::convert(
            first,
            Conversion::UnwrapNullable,
            target.clone(),
            origin,
        ));
    }
    if target.is_nullable_of(&source) {
        tracing::trace!(%source, %target, schema_key, "lift operand to nullable");
        return Ok(Expr::convert(
            first,
            Conversion::LiftNullable,
            target.clone(),
            origin,
        ));
    }

    if source.is_numeric() && target.is_numeric() {
        tracing::trace!(%source, %target, schema_key, "widen numeric operand");
        let conversion = match target.underlying() {
            ValueType::Integer => Conversion::ParseInteger,
            _ => Conversion::ParseNumber,
        };
        return Ok(parse(first, conversion, target, origin));
    }

    match target.underlying() {
        ValueType::Text => {
            tracing::trace!(%source, schema_key, "stringify operand");
            Ok(to_text(first, origin))
        }
        ValueType::Integer | ValueType::Number => {
            if first.is_member_access() {
                return Err(origin.type_invalid(format!(
                    "field of type {} cannot be compared with {}",
                    source, target
                )));
            }
            let conversion = if target.underlying() == &ValueType::Integer {
                Conversion::ParseInteger
            } else {
                Conversion::ParseNumber
            };
            tracing::trace!(%source, %target, schema_key, "stringify and parse operand");
            let text = to_text(first, origin.clone());
            Ok(parse(text, conversion, target, origin))
        }
        _ => Err(FilterError::unsupported(
            schema_key,
            format!("coercion from {} to {}", source, target),
        )),
    }
}

/// Render `expr` as text unless it already is.
pub fn to_text(expr: Expr, origin: Origin) -> Expr {
    if expr.value_type().underlying() == &ValueType::Text {
        return expr;
    }
    Expr::convert(expr, Conversion::ToText, ValueType::Text, origin)
}

fn parse(expr: Expr, conversion: Conversion, target: &ValueType, origin: Origin) -> Expr {
    Expr::convert(expr, conversion, target.clone(), origin)
}
