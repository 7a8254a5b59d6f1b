//! color::mock
//!
//! Mock color math for deterministic testing.
//!
//! # Design
//!
//! `MockColorMath` implements [`ColorMath`] with plain lightness
//! arithmetic instead of real color science:
//!
//! - channel adjustment multiplies the channel (lightness and alpha clamp
//!   to `[0, 1]`, hue wraps at 360)
//! - contrast is `1 + 20 * |l_a - l_b|`, so black on white is 21
//! - inversion maps lightness `l` to `1 - l`
//! - scale position `p` has lightness `1 - p / 1000` unless a value was
//!   configured for that family and position
//!
//! Failures can be injected per operation and every call is recorded
//! unless the log is switched off with
//! [`MockColorMath::without_call_log`]. The log is never trimmed, so
//! long-running use should switch it off. Clones share state, so a test
//! can keep a handle after passing the mock to a registry.
//!
//! This is a test double. Production callers supply their own
//! [`ColorMath`].
//!
//! # Example
//!
//! ```
//! use rafters_tokens::color::mock::MockColorMath;
//! use rafters_tokens::color::ColorMath;
//! use rafters_tokens::core::types::{Channel, ColorValue, TokenValue};
//!
//! let math = MockColorMath::new();
//! let primary = TokenValue::Color(ColorValue::oklch(0.6, 0.2, 220.0));
//!
//! let hover = math.adjust_channel(&primary, Channel::Lightness, 0.5).unwrap();
//! assert_eq!(hover, TokenValue::Color(ColorValue::oklch(0.3, 0.2, 220.0)));
//! assert_eq!(math.calls().len(), 1);
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::traits::{ColorMath, ColorMathError};
use crate::core::types::{Channel, ColorValue, TokenName, TokenValue};

/// Positions of the generated scale.
pub const SCALE_POSITIONS: [u32; 11] = [50, 100, 200, 300, 400, 500, 600, 700, 800, 900, 950];

/// Margin added when moving lightness to reach a contrast target, so the
/// result clears the threshold despite rounding.
const CONTRAST_MARGIN: f64 = 1e-6;

/// Mock color math for tests and examples.
#[derive(Debug, Clone, Default)]
pub struct MockColorMath {
    inner: Arc<Mutex<MockInner>>,
}

#[derive(Debug, Default)]
struct MockInner {
    /// Configured scale values keyed by family and position.
    scales: HashMap<(TokenName, u32), TokenValue>,
    /// Upper bound on any contrast ratio the mock reports.
    contrast_ceiling: Option<f64>,
    /// Operation to fail on.
    fail_on: Option<FailOn>,
    /// Recorded calls.
    calls: Vec<MockCall>,
    /// Stop appending to `calls`.
    call_log_off: bool,
}

/// Which operation should fail.
#[derive(Debug, Clone, PartialEq)]
pub enum FailOn {
    AdjustChannel(ColorMathError),
    ContrastRatio(ColorMathError),
    Invert(ColorMathError),
    Channel(ColorMathError),
    /// `resolve_scale_position` returns `None`.
    ScalePosition,
    /// `adjust_for_contrast` returns `None`.
    AdjustForContrast,
}

/// A recorded call.
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    AdjustChannel {
        value: TokenValue,
        channel: Channel,
        factor: f64,
    },
    ResolveScalePosition {
        family: TokenName,
        position: u32,
    },
    ContrastRatio {
        a: TokenValue,
        b: TokenValue,
    },
    AdjustForContrast {
        value: TokenValue,
        target: TokenValue,
        min_ratio: f64,
    },
    Invert {
        value: TokenValue,
    },
    Channel {
        value: TokenValue,
        channel: Channel,
    },
}

impl MockColorMath {
    /// Create a mock with no configured scales or failures.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockInner> {
        // A panic while holding the lock cannot leave MockInner invalid.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Configure the value at `position` of `family`'s scale.
    pub fn with_scale(self, family: TokenName, position: u32, value: TokenValue) -> Self {
        self.lock().scales.insert((family, position), value);
        self
    }

    /// Stop recording calls. [`Self::calls`] stays empty from here on.
    pub fn without_call_log(self) -> Self {
        self.lock().call_log_off = true;
        self
    }

    /// Configure the mock to fail on a specific operation.
    pub fn fail_on(self, fail_on: FailOn) -> Self {
        self.set_fail_on(Some(fail_on));
        self
    }

    /// Replace the failure configuration.
    pub fn set_fail_on(&self, fail_on: Option<FailOn>) {
        self.lock().fail_on = fail_on;
    }

    /// Cap every reported contrast ratio at `ceiling`.
    ///
    /// With a ceiling below a standard's minimum ratio, contrast rules for
    /// that standard become unsatisfiable.
    pub fn set_contrast_ceiling(&self, ceiling: Option<f64>) {
        self.lock().contrast_ceiling = ceiling;
    }

    /// All recorded calls, oldest first.
    pub fn calls(&self) -> Vec<MockCall> {
        self.lock().calls.clone()
    }

    /// Forget recorded calls.
    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    fn record(&self, call: MockCall) {
        let mut inner = self.lock();
        if !inner.call_log_off {
            inner.calls.push(call);
        }
    }

    fn fails(&self, pred: impl Fn(&FailOn) -> bool) -> bool {
        self.lock().fail_on.as_ref().is_some_and(pred)
    }

    fn injected(&self, pick: impl Fn(&FailOn) -> Option<&ColorMathError>) -> Option<ColorMathError> {
        self.lock().fail_on.as_ref().and_then(pick).cloned()
    }

    fn ratio(&self, a: &ColorValue, b: &ColorValue) -> f64 {
        let raw = 1.0 + 20.0 * (a.l - b.l).abs();
        match self.lock().contrast_ceiling {
            Some(ceiling) => raw.min(ceiling),
            None => raw,
        }
    }
}

fn color<'a>(operation: &'static str, value: &'a TokenValue) -> Result<&'a ColorValue, ColorMathError> {
    value
        .as_color()
        .ok_or_else(|| ColorMathError::unsupported(operation, value))
}

impl ColorMath for MockColorMath {
    fn adjust_channel(
        &self,
        value: &TokenValue,
        channel: Channel,
        factor: f64,
    ) -> Result<TokenValue, ColorMathError> {
        self.record(MockCall::AdjustChannel {
            value: value.clone(),
            channel,
            factor,
        });
        if let Some(err) = self.injected(|f| match f {
            FailOn::AdjustChannel(e) => Some(e),
            _ => None,
        }) {
            return Err(err);
        }

        if let TokenValue::Number(n) = value {
            return Ok(TokenValue::Number(n * factor));
        }

        let mut c = *color("adjust_channel", value)?;
        match channel {
            Channel::Lightness => c.l = (c.l * factor).clamp(0.0, 1.0),
            Channel::Chroma => c.c = (c.c * factor).max(0.0),
            Channel::Hue => c.h = (c.h * factor).rem_euclid(360.0),
            Channel::Alpha => c.alpha = (c.alpha * factor).clamp(0.0, 1.0),
        }
        Ok(TokenValue::Color(c))
    }

    fn resolve_scale_position(
        &self,
        family: &TokenName,
        base: &TokenValue,
        position: u32,
    ) -> Option<TokenValue> {
        self.record(MockCall::ResolveScalePosition {
            family: family.clone(),
            position,
        });
        if self.fails(|f| matches!(f, FailOn::ScalePosition)) {
            return None;
        }

        if let Some(value) = self.lock().scales.get(&(family.clone(), position)) {
            return Some(value.clone());
        }

        if !SCALE_POSITIONS.contains(&position) {
            return None;
        }
        let base = base.as_color()?;
        Some(TokenValue::Color(ColorValue {
            l: 1.0 - f64::from(position) / 1000.0,
            ..*base
        }))
    }

    fn contrast_ratio(&self, a: &TokenValue, b: &TokenValue) -> Result<f64, ColorMathError> {
        self.record(MockCall::ContrastRatio {
            a: a.clone(),
            b: b.clone(),
        });
        if let Some(err) = self.injected(|f| match f {
            FailOn::ContrastRatio(e) => Some(e),
            _ => None,
        }) {
            return Err(err);
        }

        let a = color("contrast_ratio", a)?;
        let b = color("contrast_ratio", b)?;
        Ok(self.ratio(a, b))
    }

    fn adjust_for_contrast(
        &self,
        value: &TokenValue,
        target: &TokenValue,
        min_ratio: f64,
    ) -> Option<TokenValue> {
        self.record(MockCall::AdjustForContrast {
            value: value.clone(),
            target: target.clone(),
            min_ratio,
        });
        if self.fails(|f| matches!(f, FailOn::AdjustForContrast)) {
            return None;
        }

        let seed = value.as_color()?;
        let target = target.as_color()?;
        if self.ratio(seed, target) >= min_ratio {
            return Some(value.clone());
        }

        // Lightness distance needed, then the closest reachable side.
        let delta = (min_ratio - 1.0) / 20.0 + CONTRAST_MARGIN;
        let candidates = [target.l - delta, target.l + delta];
        let l = candidates
            .into_iter()
            .filter(|l| (0.0..=1.0).contains(l))
            .min_by(|a, b| (a - seed.l).abs().total_cmp(&(b - seed.l).abs()))?;

        let adjusted = ColorValue { l, ..*seed };
        if self.ratio(&adjusted, target) < min_ratio {
            return None;
        }
        Some(TokenValue::Color(adjusted))
    }

    fn invert(&self, value: &TokenValue) -> Result<TokenValue, ColorMathError> {
        self.record(MockCall::Invert {
            value: value.clone(),
        });
        if let Some(err) = self.injected(|f| match f {
            FailOn::Invert(e) => Some(e),
            _ => None,
        }) {
            return Err(err);
        }

        let c = color("invert", value)?;
        Ok(TokenValue::Color(ColorValue { l: 1.0 - c.l, ..*c }))
    }

    fn channel(&self, value: &TokenValue, channel: Channel) -> Result<f64, ColorMathError> {
        self.record(MockCall::Channel {
            value: value.clone(),
            channel,
        });
        if let Some(err) = self.injected(|f| match f {
            FailOn::Channel(e) => Some(e),
            _ => None,
        }) {
            return Err(err);
        }

        let c = color("channel", value)?;
        Ok(match channel {
            Channel::Lightness => c.l,
            Channel::Chroma => c.c,
            Channel::Hue => c.h,
            Channel::Alpha => c.alpha,
        })
    }
}
