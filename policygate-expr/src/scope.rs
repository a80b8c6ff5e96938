//! Expression scope
//!
//! A stack of lexical bindings. The bottom frame binds the record being
//! filtered; list quantifiers push a frame for the per-item variable while
//! their nested condition resolves.
//!
//! Pushing returns a [`ScopeGuard`] that derefs to the scope and pops the
//! frame when dropped, so a nested binding never outlives the resolution
//! that introduced it, whether that resolution succeeds, fails or is
//! cancelled.
//!
//! Aliases may shadow outer aliases; [`ExpressionScope::lookup`] returns the
//! innermost binding. Generated aliases embed the nesting depth and never
//! collide with each other.

use crate::ast::{ParamId, ParamRef};
use policygate_core::ValueType;
use std::ops::{Deref, DerefMut};

/// Alias of the bottom frame created by [`ExpressionScope::for_item`].
pub const ROOT_ALIAS: &str = "this";

/// One level of the scope stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeFrame {
    pub alias: String,
    pub parameter: ParamRef,
    /// Schema reference key of the provider that pushed the frame
    pub owner: String,
}

/// Lexical bindings active during predicate construction.
///
/// Owned by exactly one resolution flow at a time.
#[derive(Debug)]
pub struct ExpressionScope {
    frames: Vec<ScopeFrame>,
    next_id: u32,
}

impl ExpressionScope {
    /// Scope whose current item is bound under `alias`.
    pub fn new(alias: impl Into<String>, item_type: ValueType) -> Self {
        let alias = alias.into();
        let parameter = ParamRef {
            id: ParamId(0),
            alias: alias.clone(),
            ty: item_type,
        };
        Self {
            frames: vec![ScopeFrame {
                alias,
                parameter,
                owner: "root".to_string(),
            }],
            next_id: 1,
        }
    }

    /// Scope for filtering records of the given type.
    pub fn for_item(item_type: ValueType) -> Self {
        Self::new(ROOT_ALIAS, item_type)
    }

    /// Bound variable of the innermost active scope level.
    pub fn current_parameter(&self) -> &ParamRef {
        // the root frame is never popped
        &self.frames[self.frames.len() - 1].parameter
    }

    pub fn current_frame(&self) -> &ScopeFrame {
        &self.frames[self.frames.len() - 1]
    }

    /// Number of nested frames above the root.
    pub fn depth(&self) -> usize {
        self.frames.len() - 1
    }

    /// Innermost binding for `alias`.
    pub fn lookup(&self, alias: &str) -> Option<&ParamRef> {
        self.frames
            .iter()
            .rev()
            .find(|frame| frame.alias == alias)
            .map(|frame| &frame.parameter)
    }

    /// Allocate a fresh bound variable. It is not bound until pushed.
    pub fn fresh_parameter(&mut self, alias: impl Into<String>, ty: ValueType) -> ParamRef {
        let id = ParamId(self.next_id);
        self.next_id += 1;
        ParamRef {
            id,
            alias: alias.into(),
            ty,
        }
    }

    /// Alias the next pushed frame would get from its element type.
    ///
    /// Deterministic: `integer1` for the first nested level over integers,
    /// `claim2` for a second level over `Claim` enums, and so on.
    pub fn generated_alias(&self, element_type: &ValueType) -> String {
        format!("{}{}", element_type.slug(), self.depth() + 1)
    }

    /// Make `parameter` the current item under `alias` until the guard drops.
    pub fn push(
        &mut self,
        alias: impl Into<String>,
        parameter: ParamRef,
        owner: impl Into<String>,
    ) -> ScopeGuard<'_> {
        let restore_len = self.frames.len();
        let alias = alias.into();
        tracing::debug!(alias = %alias, depth = restore_len, "push scope");
        self.frames.push(ScopeFrame {
            alias,
            parameter,
            owner: owner.into(),
        });
        ScopeGuard {
            scope: self,
            restore_len,
        }
    }

    /// Push a fresh variable of `element_type` under a generated alias.
    pub fn push_with_generated_alias(
        &mut self,
        element_type: ValueType,
        owner: impl Into<String>,
    ) -> ScopeGuard<'_> {
        let alias = self.generated_alias(&element_type);
        let parameter = self.fresh_parameter(alias.clone(), element_type);
        self.push(alias, parameter, owner)
    }
}

/// Scoped handle for a pushed frame. Dropping it restores the parent scope.
#[derive(Debug)]
pub struct ScopeGuard<'a> {
    scope: &'a mut ExpressionScope,
    restore_len: usize,
}

impl Deref for ScopeGuard<'_> {
    type Target = ExpressionScope;

    fn deref(&self) -> &Self::Target {
        self.scope
    }
}

impl DerefMut for ScopeGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.scope
    }
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        tracing::debug!(depth = self.restore_len, "pop scope");
        self.scope.frames.truncate(self.restore_len);
    }
}
