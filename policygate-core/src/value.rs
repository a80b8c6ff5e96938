//! Runtime values and their semantic types

use crate::ticks;
use chrono::{DateTime, NaiveDate, NaiveTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

// ============================================================================
// ENUM TYPES
// ============================================================================

/// A single named member of an [`EnumType`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnumMember {
    pub name: String,
    pub ordinal: i64,
}

/// Declared enumeration with its members and their underlying ordinals.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnumType {
    pub name: String,
    pub members: Vec<EnumMember>,
}

impl EnumType {
    /// Build an enum type from `(name, ordinal)` pairs.
    pub fn new<N: Into<String>>(
        name: impl Into<String>,
        members: impl IntoIterator<Item = (N, i64)>,
    ) -> Self {
        Self {
            name: name.into(),
            members: members
                .into_iter()
                .map(|(name, ordinal)| EnumMember {
                    name: name.into(),
                    ordinal,
                })
                .collect(),
        }
    }

    /// Look up a member by name, ignoring ASCII case.
    pub fn parse_member(&self, text: &str) -> Option<&EnumMember> {
        let text = text.trim();
        self.members
            .iter()
            .find(|member| member.name.eq_ignore_ascii_case(text))
    }

    pub fn member_by_ordinal(&self, ordinal: i64) -> Option<&EnumMember> {
        self.members.iter().find(|member| member.ordinal == ordinal)
    }
}

/// A value of an enum type, stored by ordinal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnumValue {
    pub enum_type: Arc<EnumType>,
    pub ordinal: i64,
}

impl EnumValue {
    /// Create an enum value from a member name. `None` if the name is unknown.
    pub fn from_name(enum_type: Arc<EnumType>, name: &str) -> Option<Self> {
        let ordinal = enum_type.parse_member(name)?.ordinal;
        Some(Self { enum_type, ordinal })
    }

    /// Member name, or the ordinal as text for undeclared ordinals.
    pub fn member_name(&self) -> String {
        self.enum_type
            .member_by_ordinal(self.ordinal)
            .map(|member| member.name.clone())
            .unwrap_or_else(|| self.ordinal.to_string())
    }
}

// ============================================================================
// VALUE TYPES
// ============================================================================

/// Semantic type of an expression or value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// Only known when the expression is evaluated (externally sourced data)
    Any,
    Bool,
    Integer,
    Number,
    Text,
    DateTime,
    Date,
    Time,
    Enum(Arc<EnumType>),
    List(Box<ValueType>),
    Object,
    Nullable(Box<ValueType>),
}

impl ValueType {
    pub fn list_of(element: ValueType) -> Self {
        ValueType::List(Box::new(element))
    }

    /// Wrap in `Nullable` unless already nullable (or `Any`, which admits null).
    pub fn nullable(self) -> Self {
        match self {
            ValueType::Nullable(_) | ValueType::Any => self,
            other => ValueType::Nullable(Box::new(other)),
        }
    }

    /// Type with any `Nullable` wrapper removed.
    pub fn underlying(&self) -> &ValueType {
        match self {
            ValueType::Nullable(inner) => inner.underlying(),
            other => other,
        }
    }

    pub fn is_nullable(&self) -> bool {
        matches!(self, ValueType::Nullable(_) | ValueType::Any)
    }

    /// True when `self` is `Nullable(target)`.
    pub fn is_nullable_of(&self, target: &ValueType) -> bool {
        matches!(self, ValueType::Nullable(inner) if inner.as_ref() == target)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self.underlying(), ValueType::Integer | ValueType::Number)
    }

    pub fn is_bool(&self) -> bool {
        matches!(self.underlying(), ValueType::Bool)
    }

    /// Primitive types cannot carry properties.
    pub fn is_primitive(&self) -> bool {
        !matches!(
            self.underlying(),
            ValueType::Any | ValueType::Object | ValueType::List(_)
        )
    }

    /// Element type for enumerable types, `None` otherwise.
    ///
    /// `Any` enumerates as `Any` so dynamically typed collections can still
    /// be quantified over.
    pub fn element_type(&self) -> Option<ValueType> {
        match self.underlying() {
            ValueType::List(element) => Some(element.as_ref().clone()),
            ValueType::Any => Some(ValueType::Any),
            _ => None,
        }
    }

    /// Short lowercase identifier used when generating scope aliases.
    pub fn slug(&self) -> String {
        match self {
            ValueType::Any => "value".to_string(),
            ValueType::Bool => "bool".to_string(),
            ValueType::Integer => "integer".to_string(),
            ValueType::Number => "number".to_string(),
            ValueType::Text => "text".to_string(),
            ValueType::DateTime => "dateTime".to_string(),
            ValueType::Date => "date".to_string(),
            ValueType::Time => "time".to_string(),
            ValueType::Enum(enum_type) => {
                let mut chars = enum_type.name.chars();
                match chars.next() {
                    Some(first) => first.to_lowercase().chain(chars).collect(),
                    None => "enum".to_string(),
                }
            }
            ValueType::List(element) => format!("{}List", element.slug()),
            ValueType::Object => "object".to_string(),
            ValueType::Nullable(inner) => inner.slug(),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Any => f.write_str("any"),
            ValueType::Bool => f.write_str("bool"),
            ValueType::Integer => f.write_str("integer"),
            ValueType::Number => f.write_str("number"),
            ValueType::Text => f.write_str("text"),
            ValueType::DateTime => f.write_str("dateTime"),
            ValueType::Date => f.write_str("date"),
            ValueType::Time => f.write_str("time"),
            ValueType::Enum(enum_type) => write!(f, "enum {}", enum_type.name),
            ValueType::List(element) => write!(f, "list<{}>", element),
            ValueType::Object => f.write_str("object"),
            ValueType::Nullable(inner) => write!(f, "{}?", inner),
        }
    }
}

// ============================================================================
// VALUES
// ============================================================================

/// A runtime value flowing through predicate evaluation.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Integer(i64),
    Number(f64),
    Text(String),
    DateTime(DateTime<Utc>),
    Date(NaiveDate),
    Time(NaiveTime),
    Enum(EnumValue),
    List(Vec<Value>),
    Object(BTreeMap<String, Value>),
}

impl Value {
    pub fn text(text: impl Into<String>) -> Self {
        Value::Text(text.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Runtime type of this value. `Null` reports `Any`.
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Null => ValueType::Any,
            Value::Bool(_) => ValueType::Bool,
            Value::Integer(_) => ValueType::Integer,
            Value::Number(_) => ValueType::Number,
            Value::Text(_) => ValueType::Text,
            Value::DateTime(_) => ValueType::DateTime,
            Value::Date(_) => ValueType::Date,
            Value::Time(_) => ValueType::Time,
            Value::Enum(value) => ValueType::Enum(value.enum_type.clone()),
            Value::List(items) => {
                ValueType::list_of(items.first().map(Value::value_type).unwrap_or(ValueType::Any))
            }
            Value::Object(_) => ValueType::Object,
        }
    }

    /// Primitive values cannot carry properties. `Null` is not primitive.
    pub fn is_primitive(&self) -> bool {
        !matches!(self, Value::Null | Value::List(_) | Value::Object(_))
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Resolve a dotted path (`policy.holder.age`, `items.0.code`).
    ///
    /// Numeric segments index into lists. Returns `None` when any segment is
    /// missing or the path walks into a primitive.
    pub fn lookup_path(&self, path: &str) -> Option<&Value> {
        let path = path.trim();
        if path.is_empty() {
            return Some(self);
        }
        path.split('.').try_fold(self, |current, segment| match current {
            Value::Object(map) => map.get(segment),
            Value::List(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
    }

    /// Type-tolerant equality shared by list-membership checks.
    ///
    /// Numeric text equals the number it spells, enum members equal their
    /// name (case-insensitive) or ordinal, and integers equal numbers of the
    /// same magnitude.
    pub fn loosely_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Null, _) | (_, Value::Null) => false,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Integer(_) | Value::Number(_), Value::Integer(_) | Value::Number(_)) => {
                self.as_f64() == other.as_f64()
            }
            (Value::Text(text), Value::Integer(_) | Value::Number(_))
            | (Value::Integer(_) | Value::Number(_), Value::Text(text)) => {
                let number = if let Value::Text(_) = self { other } else { self };
                match (text.trim().parse::<f64>(), number.as_f64()) {
                    (Ok(parsed), Some(n)) => parsed == n,
                    _ => false,
                }
            }
            (Value::Text(text), Value::Bool(b)) | (Value::Bool(b), Value::Text(text)) => {
                text.trim().eq_ignore_ascii_case(if *b { "true" } else { "false" })
            }
            (Value::Enum(e), Value::Text(text)) | (Value::Text(text), Value::Enum(e)) => e
                .enum_type
                .parse_member(text)
                .map(|member| member.ordinal == e.ordinal)
                .unwrap_or(false),
            (Value::Enum(e), Value::Integer(i)) | (Value::Integer(i), Value::Enum(e)) => {
                e.ordinal == *i
            }
            (Value::DateTime(at), Value::Text(text)) | (Value::Text(text), Value::DateTime(at)) => {
                ticks::parse_date_time(text).map(|parsed| parsed == *at).unwrap_or(false)
            }
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loosely_equals(y))
            }
            _ => self == other,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Number(n) => write!(f, "{}", n),
            Value::Text(text) => f.write_str(text),
            Value::DateTime(at) => f.write_str(&at.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Value::Date(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            Value::Time(time) => write!(f, "{}", time.format("%H:%M:%S")),
            Value::Enum(value) => f.write_str(&value.member_name()),
            Value::List(_) | Value::Object(_) => {
                write!(f, "{}", serde_json::Value::from(self.clone()))
            }
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::Text(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Object(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Integer(i) => serde_json::Value::from(i),
            Value::Number(n) => serde_json::Number::from_f64(n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::List(items) => {
                serde_json::Value::Array(items.into_iter().map(serde_json::Value::from).collect())
            }
            Value::Object(map) => serde_json::Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, serde_json::Value::from(v)))
                    .collect(),
            ),
            other => serde_json::Value::String(other.to_string()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::Text(text.to_string())
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Value::Text(text)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(at: DateTime<Utc>) -> Self {
        Value::DateTime(at)
    }
}

impl From<NaiveDate> for Value {
    fn from(date: NaiveDate) -> Self {
        Value::Date(date)
    }
}

impl From<NaiveTime> for Value {
    fn from(time: NaiveTime) -> Self {
        Value::Time(time)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

// =============================================================================
// TESTS
// =============================================================================
