//! Predicate AST
//!
//! Filter providers compile to a tree of [`Expr`] nodes wrapped in a
//! single-parameter [`Predicate`]. Every node knows its semantic
//! [`ValueType`], which is what lets a parent comparison detect mismatched
//! operands and insert a conversion.
//!
//! ```text
//! Predicate { parameter: item, body }
//!     body = Logical(And,
//!               Comparison(>, Member(item, "age"), Literal(18)),
//!               Quantifier(Any, Member(item, "claims"), claim, ...))
//! ```

use policygate_core::{EnumType, FilterError, Value, ValueType};
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

// ============================================================================
// PARAMETERS
// ============================================================================

/// Identity of a bound variable. Unique within one [`ExpressionScope`](crate::ExpressionScope).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParamId(pub u32);

/// A bound-variable placeholder: the "current item" of some scope level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamRef {
    pub id: ParamId,
    pub alias: String,
    pub ty: ValueType,
}

// ============================================================================
// ORIGIN
// ============================================================================

/// Which filter and operand role a node was built for.
///
/// Nodes that can fail while evaluating carry their origin, so a failed
/// parse surfaces as the same error a build-time failure would.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    pub schema_key: String,
    pub parameter: String,
}

impl Origin {
    pub fn new(schema_key: impl Into<String>, parameter: impl Into<String>) -> Self {
        Self {
            schema_key: schema_key.into(),
            parameter: parameter.into(),
        }
    }

    pub fn type_invalid(&self, reason: impl Into<String>) -> FilterError {
        FilterError::type_invalid(&self.schema_key, &self.parameter, reason)
    }
}

// ============================================================================
// OPERATORS
// ============================================================================

/// Binary comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonOp {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    /// Text prefix match
    StartsWith,
    /// Text suffix match
    EndsWith,
    /// Text substring match
    Contains,
}

impl ComparisonOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            ComparisonOp::Equal => "==",
            ComparisonOp::NotEqual => "!=",
            ComparisonOp::GreaterThan => ">",
            ComparisonOp::GreaterThanOrEqual => ">=",
            ComparisonOp::LessThan => "<",
            ComparisonOp::LessThanOrEqual => "<=",
            ComparisonOp::StartsWith => "startsWith",
            ComparisonOp::EndsWith => "endsWith",
            ComparisonOp::Contains => "contains",
        }
    }

    /// Operators that only apply to text operands.
    pub fn is_text_only(&self) -> bool {
        matches!(
            self,
            ComparisonOp::StartsWith | ComparisonOp::EndsWith | ComparisonOp::Contains
        )
    }
}

impl FromStr for ComparisonOp {
    type Err = FilterError;

    /// Accepts configuration names such as `isEqualTo`, `greaterThan` or `startsWith`.
    fn from_str(name: &str) -> Result<Self, Self::Err> {
        let normalized = name.trim().to_ascii_lowercase().replace(['_', '-'], "");
        Ok(match normalized.as_str() {
            "equal" | "equals" | "isequalto" => ComparisonOp::Equal,
            "notequal" | "isnotequalto" => ComparisonOp::NotEqual,
            "greaterthan" | "isgreaterthan" => ComparisonOp::GreaterThan,
            "greaterthanorequal" | "isgreaterthanorequalto" => ComparisonOp::GreaterThanOrEqual,
            "lessthan" | "islessthan" => ComparisonOp::LessThan,
            "lessthanorequal" | "islessthanorequalto" => ComparisonOp::LessThanOrEqual,
            "startswith" => ComparisonOp::StartsWith,
            "endswith" => ComparisonOp::EndsWith,
            "contains" => ComparisonOp::Contains,
            _ => {
                return Err(FilterError::unsupported(
                    "comparison",
                    format!("comparison operator '{}'", name),
                ))
            }
        })
    }
}

/// Eager (non-short-circuiting) logical combinators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalOp {
    And,
    Or,
    Xor,
}

impl LogicalOp {
    pub fn apply(&self, left: bool, right: bool) -> bool {
        match self {
            LogicalOp::And => left & right,
            LogicalOp::Or => left | right,
            LogicalOp::Xor => left ^ right,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            LogicalOp::And => "&",
            LogicalOp::Or => "|",
            LogicalOp::Xor => "^",
        }
    }
}

/// How a per-item condition is applied across a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuantifierKind {
    /// At least one element matches
    Any,
    /// Every element matches (vacuously true when empty)
    All,
    /// Exactly one element matches
    One,
}

impl QuantifierKind {
    pub fn name(&self) -> &'static str {
        match self {
            QuantifierKind::Any => "Any",
            QuantifierKind::All => "All",
            QuantifierKind::One => "One",
        }
    }
}

impl FromStr for QuantifierKind {
    type Err = FilterError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.trim().to_ascii_lowercase().as_str() {
            "any" => Ok(QuantifierKind::Any),
            "all" => Ok(QuantifierKind::All),
            "one" => Ok(QuantifierKind::One),
            _ => Err(FilterError::unsupported(
                "listCondition",
                format!("match type '{}'", name),
            )),
        }
    }
}

/// Value conversions inserted by type coercion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Conversion {
    /// `T?` to `T`; null passes through
    UnwrapNullable,
    /// `T` to `T?`
    LiftNullable,
    /// Render the value as text
    ToText,
    /// Guarded text-to-integer parse
    ParseInteger,
    /// Guarded text-to-number parse
    ParseNumber,
}

impl Conversion {
    pub fn name(&self) -> &'static str {
        match self {
            Conversion::UnwrapNullable => "unwrap",
            Conversion::LiftNullable => "lift",
            Conversion::ToText => "toText",
            Conversion::ParseInteger => "parseInteger",
            Conversion::ParseNumber => "parseNumber",
        }
    }
}

/// A regex compiled while the predicate was built.
#[derive(Debug, Clone)]
pub struct CompiledRegex(pub Arc<Regex>);

impl PartialEq for CompiledRegex {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_str() == other.0.as_str()
    }
}

/// Built-in functions reachable through [`Expr::Call`].
#[derive(Debug, Clone, PartialEq)]
pub enum Function {
    /// `[text, pattern]`. Uses `compiled` when the pattern was a literal.
    RegexIsMatch {
        compiled: Option<CompiledRegex>,
        size_limit: usize,
    },
    /// `[list, value]` with type-tolerant element equality
    ListContains,
    /// `[object, property_name]`
    HasProperty,
    /// `[object, path, default]`
    PathLookup,
    /// `[value]`; never fails, unparseable input is `false`
    ParseBoolOrFalse,
    /// `[value]`; date/time value or text to ticks
    ToTicks,
    /// `[ticks]`
    StartOfDay,
    /// `[ticks]`
    EndOfDay,
    /// `[ticks]`
    AddTicks(i64),
    /// `[value]`; time, date-time, ticks or text to time of day
    ToTimeOfDay,
    /// `[dividend, divisor]`; integer remainder
    Remainder,
    /// `[element...]`; collects its arguments into a list
    ListOf,
}

impl Function {
    pub fn name(&self) -> &'static str {
        match self {
            Function::RegexIsMatch { .. } => "isMatch",
            Function::ListContains => "listContains",
            Function::HasProperty => "hasProperty",
            Function::PathLookup => "lookup",
            Function::ParseBoolOrFalse => "parseBoolOrFalse",
            Function::ToTicks => "toTicks",
            Function::StartOfDay => "startOfDay",
            Function::EndOfDay => "endOfDay",
            Function::AddTicks(_) => "addTicks",
            Function::ToTimeOfDay => "timeOfDay",
            Function::Remainder => "remainder",
            Function::ListOf => "list",
        }
    }
}

// ============================================================================
// EXPRESSIONS
// ============================================================================

/// A typed expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal {
        value: Value,
        ty: ValueType,
    },
    Parameter(ParamRef),
    /// Simple field access on a record. Carries the declared field type.
    Member {
        target: Box<Expr>,
        path: String,
        ty: ValueType,
    },
    Convert {
        inner: Box<Expr>,
        conversion: Conversion,
        ty: ValueType,
        origin: Origin,
    },
    /// Enum value rendered as its member name
    EnumToString {
        inner: Box<Expr>,
        enum_type: Arc<EnumType>,
    },
    Comparison {
        op: ComparisonOp,
        left: Box<Expr>,
        right: Box<Expr>,
        origin: Origin,
    },
    Logical {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Not(Box<Expr>),
    Quantifier {
        kind: QuantifierKind,
        collection: Box<Expr>,
        parameter: ParamRef,
        predicate: Box<Expr>,
        origin: Origin,
    },
    Call {
        function: Function,
        args: Vec<Expr>,
        ty: ValueType,
        origin: Origin,
    },
}

impl Expr {
    /// Literal typed by its runtime value (`Null` is `Any`).
    pub fn literal(value: impl Into<Value>) -> Self {
        let value = value.into();
        let ty = value.value_type();
        Expr::Literal { value, ty }
    }

    pub fn typed_literal(value: impl Into<Value>, ty: ValueType) -> Self {
        Expr::Literal {
            value: value.into(),
            ty,
        }
    }

    pub fn bool(value: bool) -> Self {
        Expr::Literal {
            value: Value::Bool(value),
            ty: ValueType::Bool,
        }
    }

    pub fn parameter(parameter: &ParamRef) -> Self {
        Expr::Parameter(parameter.clone())
    }

    pub fn member(target: Expr, path: impl Into<String>, ty: ValueType) -> Self {
        Expr::Member {
            target: Box::new(target),
            path: path.into(),
            ty,
        }
    }

    pub fn convert(inner: Expr, conversion: Conversion, ty: ValueType, origin: Origin) -> Self {
        Expr::Convert {
            inner: Box::new(inner),
            conversion,
            ty,
            origin,
        }
    }

    pub fn compare(op: ComparisonOp, left: Expr, right: Expr, origin: Origin) -> Self {
        Expr::Comparison {
            op,
            left: Box::new(left),
            right: Box::new(right),
            origin,
        }
    }

    pub fn logical(op: LogicalOp, left: Expr, right: Expr) -> Self {
        Expr::Logical {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn negate(inner: Expr) -> Self {
        Expr::Not(Box::new(inner))
    }

    pub fn call(function: Function, args: Vec<Expr>, ty: ValueType, origin: Origin) -> Self {
        Expr::Call {
            function,
            args,
            ty,
            origin,
        }
    }

    /// Semantic type of the value this node produces.
    pub fn value_type(&self) -> ValueType {
        match self {
            Expr::Literal { ty, .. }
            | Expr::Member { ty, .. }
            | Expr::Convert { ty, .. }
            | Expr::Call { ty, .. } => ty.clone(),
            Expr::Parameter(parameter) => parameter.ty.clone(),
            Expr::EnumToString { .. } => ValueType::Text,
            Expr::Comparison { .. }
            | Expr::Logical { .. }
            | Expr::Not(_)
            | Expr::Quantifier { .. } => ValueType::Bool,
        }
    }

    /// True for plain field references, which already carry reliable type information.
    pub fn is_member_access(&self) -> bool {
        matches!(self, Expr::Member { .. })
    }

    /// The enum-typed operand behind an [`Expr::EnumToString`] node.
    pub fn enum_source(&self) -> Option<(&Expr, &Arc<EnumType>)> {
        match self {
            Expr::EnumToString { inner, enum_type } => Some((inner, enum_type)),
            _ => None,
        }
    }

    /// Literal value, if this node is a literal.
    pub fn as_literal(&self) -> Option<&Value> {
        match self {
            Expr::Literal { value, .. } => Some(value),
            _ => None,
        }
    }
}

/// A boolean expression over a single bound parameter: `item => body`.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub parameter: ParamRef,
    pub body: Expr,
}

impl Predicate {
    pub fn new(parameter: ParamRef, body: Expr) -> Self {
        Self { parameter, body }
    }

    pub fn constant(parameter: ParamRef, value: bool) -> Self {
        Self::new(parameter, Expr::bool(value))
    }

    /// The body is boolean-typed (possibly nullable).
    pub fn is_boolean(&self) -> bool {
        self.body.value_type().is_bool()
    }

    pub fn into_body(self) -> Expr {
        self.body
    }
}

// ============================================================================
// DISPLAY
// ============================================================================

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal { value, .. } => match value {
                Value::Null => f.write_str("null"),
                Value::Text(text) => write!(f, "{:?}", text),
                Value::DateTime(_) | Value::Date(_) | Value::Time(_) => write!(f, "#{}#", value),
                Value::Enum(value) => write!(f, "{}", value.ordinal),
                other => write!(f, "{}", other),
            },
            Expr::Parameter(parameter) => f.write_str(&parameter.alias),
            Expr::Member { target, path, .. } => write!(f, "{}.{}", target, path),
            Expr::Convert {
                inner, conversion, ..
            } => write!(f, "{}({})", conversion.name(), inner),
            Expr::EnumToString { inner, .. } => write!(f, "{}.ToString()", inner),
            Expr::Comparison {
                op, left, right, ..
            } => write!(f, "({} {} {})", left, op.symbol(), right),
            Expr::Logical { op, left, right } => {
                write!(f, "({} {} {})", left, op.symbol(), right)
            }
            Expr::Not(inner) => write!(f, "!{}", inner),
            Expr::Quantifier {
                kind,
                collection,
                parameter,
                predicate,
                ..
            } => write!(
                f,
                "{}.{}({} => {})",
                collection,
                kind.name(),
                parameter.alias,
                predicate
            ),
            Expr::Call { function, args, .. } => {
                write!(f, "{}(", function.name())?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                f.write_str(")")
            }
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} => {}", self.parameter.alias, self.body)
    }
}
