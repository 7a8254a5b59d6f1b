//! color::traits
//!
//! The color-math collaborator consumed by the rule executor.
//!
//! # Design
//!
//! The engine never performs color science itself. Every operation that
//! reads or writes a color channel goes through [`ColorMath`], which the
//! host supplies when constructing a registry. Implementations must be
//! deterministic: the same inputs always give the same output.
//!
//! Operations that can legitimately have no answer (a missing scale
//! position, an unreachable contrast target) return `Option`; operations
//! that fail on unsupported input return `Result`.

use thiserror::Error;

use crate::core::types::{Channel, TokenName, TokenValue};

/// Errors from color-math operations.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ColorMathError {
    /// The operation does not apply to this kind of value.
    #[error("{operation} does not support value {value}")]
    Unsupported {
        /// Operation name
        operation: &'static str,
        /// Rendered input value
        value: String,
    },

    /// The operation failed.
    #[error("color math failed: {0}")]
    Failed(String),
}

impl ColorMathError {
    /// Shorthand for [`ColorMathError::Unsupported`].
    pub fn unsupported(operation: &'static str, value: &TokenValue) -> Self {
        ColorMathError::Unsupported {
            operation,
            value: value.to_string(),
        }
    }
}

/// Color science consumed by the rule executor.
pub trait ColorMath: Send + Sync {
    /// Multiply `channel` of `value` by `factor`. Clamping is up to the
    /// implementation.
    fn adjust_channel(
        &self,
        value: &TokenValue,
        channel: Channel,
        factor: f64,
    ) -> Result<TokenValue, ColorMathError>;

    /// The value at `position` in the scale generated from `base`, the
    /// current value of `family`.
    fn resolve_scale_position(
        &self,
        family: &TokenName,
        base: &TokenValue,
        position: u32,
    ) -> Option<TokenValue>;

    /// Contrast ratio between two values, in `[1, 21]`.
    fn contrast_ratio(&self, a: &TokenValue, b: &TokenValue) -> Result<f64, ColorMathError>;

    /// A value close to `value` with at least `min_ratio` contrast against
    /// `target`, or `None` if no such value exists.
    fn adjust_for_contrast(
        &self,
        value: &TokenValue,
        target: &TokenValue,
        min_ratio: f64,
    ) -> Option<TokenValue>;

    /// Perceptual inverse of `value`.
    fn invert(&self, value: &TokenValue) -> Result<TokenValue, ColorMathError>;

    /// Numeric reading of one channel, used by `calc` expressions.
    fn channel(&self, value: &TokenValue, channel: Channel) -> Result<f64, ColorMathError>;
}
