//! Report-only invariant checks
//!
//! Checkers never repair anything. They return every violation found so the
//! operator can decide; a store error while checking is returned as `Err`.

use std::fmt;
use tracing::error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// `module/route`, e.g. `sponsorship/distribution`
    pub route: &'static str,
    pub message: String,
}

impl Violation {
    pub fn new(route: &'static str, message: impl Into<String>) -> Self {
        Self {
            route,
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.route, self.message)
    }
}

/// Log every violation at error level and hand them back.
pub fn report(violations: Vec<Violation>) -> Vec<Violation> {
    for v in &violations {
        error!(route = v.route, "invariant broken: {}", v.message);
    }
    violations
}
