//! PolicyGate Filters - Composable Predicate Providers
//!
//! A filter tree is built once from configuration and resolved on every
//! evaluation request into a single [`Predicate`](policygate_expr::Predicate):
//!
//! ```text
//! AggregateFilter::and
//!   ├─ BinaryComparisonFilter      (this.age > 18)
//!   ├─ TemporalComparisonFilter    (startDate isAfter 2024-06-15)
//!   └─ ListConditionFilter::any    (this.claims.Any(claim => ...))
//!         └─ TextEqualityFilter    (claim.status == "Open")
//! ```
//!
//! Children resolve sequentially, left to right and outer to inner. List
//! conditions push a nested [`ExpressionScope`](policygate_expr::ExpressionScope)
//! frame that is released when their condition returns.

pub mod aggregate;
pub mod coercion;
pub mod comparison;
pub mod list;
pub mod not;
pub mod object;
pub mod provider;
pub mod temporal;
pub mod text;

pub use aggregate::{AggregateFilter, XorFilter};
pub use coercion::reconcile;
pub use comparison::{schema_key_for, BinaryComparisonFilter};
pub use list::{ListConditionFilter, ListContainsValueFilter};
pub use not::NotFilter;
pub use object::{ObjectContainsPropertyFilter, ObjectPathLookupFilter};
pub use provider::{build_predicate, schema_keys, BoxedFilterProvider, FilterProvider};
pub use temporal::{DateOperator, TemporalComparisonFilter, TemporalKind};
pub use text::{TextEqualityFilter, TextMatchesRegexFilter};
