//! Function and method name patterns.
//!
//! A pattern is either a glob matched against a function name (`New*`), or a
//! `ReceiverGlob.MethodGlob` pair split on the first `.` (`*Client.Do`).

use crate::error::{GocallsError, Result};
use glob::Pattern;

/// A parsed function or method pattern.
#[derive(Debug, Clone)]
pub struct FuncPattern {
    receiver: Option<Pattern>,
    name: Pattern,
}

impl FuncPattern {
    /// Parse a pattern string.
    pub fn parse(pattern: &str) -> Result<Self> {
        let compile = |glob: &str| {
            Pattern::new(glob).map_err(|e| GocallsError::Pattern {
                pattern: pattern.to_string(),
                message: e.to_string(),
            })
        };

        match pattern.split_once('.') {
            Some((receiver, name)) => Ok(FuncPattern {
                receiver: Some(compile(receiver)?),
                name: compile(name)?,
            }),
            None => Ok(FuncPattern {
                receiver: None,
                name: compile(pattern)?,
            }),
        }
    }

    /// Test a declaration against this pattern.
    ///
    /// `receiver_type` is the declared receiver type (`None` for plain
    /// functions); a leading `*` is ignored.
    pub fn matches(&self, receiver_type: Option<&str>, name: &str) -> bool {
        if let Some(receiver_glob) = &self.receiver {
            let Some(receiver_type) = receiver_type else {
                return false;
            };
            let receiver_type = receiver_type.strip_prefix('*').unwrap_or(receiver_type);
            if !receiver_glob.matches(receiver_type) {
                return false;
            }
        }
        self.name.matches(name)
    }
}
