//! Depth argument parsing
//!
//! MCP clients send every number as a JSON float. This is the one place that
//! turns such a value into the integer the planner works with.

use serde_json::Value;
use tracing::warn;

/// A depth read off the wire, ready for [`crate::plan`]
#[derive(Debug, Clone, PartialEq)]
pub struct DepthArg {
    /// Truncated depth, or `None` to use the mode's default
    pub value: Option<i64>,
    /// Caller-facing note when the raw value was not used as-is
    pub warning: Option<String>,
}

impl DepthArg {
    /// Parse the optional raw value of argument `field`.
    ///
    /// Missing or `null` means "use the default". Non-integral numbers are
    /// truncated toward zero. Anything that is not a number falls back to the
    /// default; both of those cases carry a warning.
    pub fn parse(field: &str, raw: Option<&Value>) -> Self {
        let Some(raw) = raw.filter(|v| !v.is_null()) else {
            return Self {
                value: None,
                warning: None,
            };
        };

        if let Some(n) = raw.as_i64() {
            return Self {
                value: Some(n),
                warning: None,
            };
        }

        if let Some(f) = raw.as_f64() {
            // `as` saturates at the i64 bounds
            let truncated = f.trunc() as i64;
            let warning = if f.fract() != 0.0 {
                let note = format!(
                    "{} received non-integer number {}, using truncated value {}",
                    field, f, truncated
                );
                warn!("{}", note);
                Some(note)
            } else {
                None
            };
            return Self {
                value: Some(truncated),
                warning,
            };
        }

        let note = format!(
            "{} argument was not a number (got {}), using the default",
            field, raw
        );
        warn!("{}", note);
        Self {
            value: None,
            warning: Some(note),
        }
    }
}
