//! PolicyGate Expressions - Predicate AST, Scope and Evaluator
//!
//! Architecture:
//! ```text
//! ExpressionProvider (operands)  ──┐
//!                                  ├─> Expr tree ─> Predicate ─> evaluate(record)
//! ExpressionScope (bound vars)   ──┘
//! ```
//!
//! The AST is an explicit tagged union instead of a general expression-tree
//! API. Nodes track their semantic type so filters can detect and reconcile
//! mismatched operands while building.

pub mod ast;
pub mod eval;
pub mod operand;
pub mod scope;

pub use ast::{
    CompiledRegex, ComparisonOp, Conversion, Expr, Function, LogicalOp, Origin, ParamId,
    ParamRef, Predicate, QuantifierKind,
};
pub use eval::Environment;
pub use operand::{
    BoxedExpressionProvider, ConstantExpressionProvider, EnumTextExpressionProvider,
    ExpressionProvider, ItemExpressionProvider, ListExpressionProvider,
    PropertyExpressionProvider, RemainderExpressionProvider, TextExpressionProvider,
    VariableExpressionProvider,
};
pub use scope::{ExpressionScope, ScopeFrame, ScopeGuard, ROOT_ALIAS};
