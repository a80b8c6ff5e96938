//! PolicyGate Core - Values, Errors and Configuration
//!
//! Pure data structures shared by the expression and filter crates:
//! - Runtime values and their semantic types
//! - Tick arithmetic for temporal comparisons
//! - The domain error taxonomy
//! - Engine configuration and the evaluation context

pub mod config;
pub mod context;
pub mod error;
pub mod ticks;
pub mod value;

pub use config::{AliasStrategy, EngineConfig};
pub use context::EvaluationContext;
pub use error::{ConfigError, ErrorCode, FilterError, FilterResult};
pub use value::{EnumMember, EnumType, EnumValue, Value, ValueType};

// Re-exported so callers can build contexts without a direct tokio-util dependency
pub use tokio_util::sync::CancellationToken;
