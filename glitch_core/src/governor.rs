/// Fraction of a buffer a single corruption call may touch.
pub const DEFAULT_MAX_FRACTION: f64 = 0.005;

/// Turns whatever count the UI handed over into a bounded mutation budget.
///
/// The result is always in `1..=max(1, floor(len * max_fraction))`, so a single
/// call cannot wreck more than a sliver of memory and fixed-iteration modes
/// always terminate quickly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SafetyGovernor {
    max_fraction: f64,
}

impl Default for SafetyGovernor {
    fn default() -> Self {
        Self {
            max_fraction: DEFAULT_MAX_FRACTION,
        }
    }
}

impl SafetyGovernor {
    /// `max_fraction` outside `(0, 1]` (or NaN) falls back to the default.
    pub fn new(max_fraction: f64) -> Self {
        if max_fraction > 0.0 && max_fraction <= 1.0 {
            Self { max_fraction }
        } else {
            Self::default()
        }
    }

    pub fn max_fraction(&self) -> f64 {
        self.max_fraction
    }

    /// The largest count this governor allows for a buffer of `len` bytes.
    pub fn cap(&self, len: usize) -> usize {
        ((len as f64 * self.max_fraction).floor() as usize).max(1)
    }

    /// Clamps `requested` against a buffer of `len` bytes.
    ///
    /// Non-finite or non-positive requests become 1; fractional requests are
    /// floored but never below 1.
    pub fn safe_count(&self, requested: f64, len: usize) -> usize {
        let requested = if requested.is_finite() && requested > 0.0 {
            requested.floor().max(1.0)
        } else {
            1.0
        };
        let cap = self.cap(len);
        if requested >= cap as f64 {
            cap
        } else {
            requested as usize
        }
    }
}
