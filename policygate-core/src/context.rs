//! Evaluation context handed to every provider during resolution

use crate::config::EngineConfig;
use crate::error::{FilterError, FilterResult};
use crate::value::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Ambient data for one predicate build.
///
/// Filter providers only read the cancellation signal and the engine
/// configuration. Pipeline variables are there for operand providers.
#[derive(Debug, Clone, Default)]
pub struct EvaluationContext {
    cancellation: CancellationToken,
    config: Arc<EngineConfig>,
    variables: BTreeMap<String, Value>,
}

impl EvaluationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = Arc::new(config);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Pipeline variable by name.
    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Fail with [`FilterError::Cancelled`] once the token has fired.
    ///
    /// Called at the entry of every resolution step.
    pub fn ensure_active(&self, schema_key: &str) -> FilterResult<()> {
        if self.cancellation.is_cancelled() {
            return Err(FilterError::Cancelled {
                schema_key: schema_key.to_string(),
            });
        }
        Ok(())
    }
}
