//! Error taxonomy shared by the registry, the measure scheduler and the algorithms.
//!
//! Every failure is one [`Error`] value. Its [`ErrorClass`] decides how far it travels:
//!
//! - **Configuration** errors depend on how the process was wired. They are surfaced once to
//!   the top-level caller and never retried.
//! - **Resource** errors (out of memory, on the host or inside a decision-diagram forest) are
//!   surfaced the same way.
//! - **Cancellation** aborts the whole batch in progress.
//! - **Algorithm** failures are data-dependent: they turn the single affected measure into
//!   `undefined` and leave its siblings alone.

use std::fmt;

use thiserror::Error;

use crate::registry::CallingForm;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("duplicate {kind} `{name}`")]
    Duplicate { kind: &'static str, name: String },

    #[error("registry is finalized, cannot register {what}")]
    Finalized { what: String },

    #[error("no engine for `{category}`: {reason}")]
    NoEngine { category: String, reason: String },

    #[error("category `{category}` is called as {expected}, not as {got}")]
    CallMismatch {
        category: String,
        expected: CallingForm,
        got: CallingForm,
    },

    #[error("unknown engine category `{0}`")]
    UnknownCategory(String),

    #[error("category `{category}` has no engine named `{choice}`")]
    UnknownChoice { category: String, choice: String },

    #[error("invalid settings: {0}")]
    Settings(String),

    #[error("out of memory: {0}")]
    OutOfMemory(String),

    #[error("terminated")]
    Terminated,

    #[error("engine failed: {0}")]
    EngineFailed(String),

    #[error("assertion failure: {0}")]
    AssertionFailure(String),
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ErrorClass {
    Configuration,
    Resource,
    Cancellation,
    Algorithm,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorClass::Configuration => "configuration",
            ErrorClass::Resource => "resource",
            ErrorClass::Cancellation => "cancellation",
            ErrorClass::Algorithm => "algorithm",
        };
        f.write_str(s)
    }
}

impl Error {
    pub fn class(&self) -> ErrorClass {
        match self {
            Error::Duplicate { .. }
            | Error::Finalized { .. }
            | Error::NoEngine { .. }
            | Error::CallMismatch { .. }
            | Error::UnknownCategory(_)
            | Error::UnknownChoice { .. }
            | Error::Settings(_) => ErrorClass::Configuration,
            Error::OutOfMemory(_) => ErrorClass::Resource,
            Error::Terminated => ErrorClass::Cancellation,
            Error::EngineFailed(_) | Error::AssertionFailure(_) => ErrorClass::Algorithm,
        }
    }

    /// Whether the failure stays inside the measure that produced it.
    pub fn is_measure_local(&self) -> bool {
        self.class() == ErrorClass::Algorithm
    }

    pub(crate) fn engine(msg: impl Into<String>) -> Self {
        Error::EngineFailed(msg.into())
    }

    pub(crate) fn assertion(msg: impl Into<String>) -> Self {
        Error::AssertionFailure(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classes() {
        let dup = Error::Duplicate {
            kind: "engine",
            name: "EXPLICIT".to_string(),
        };
        assert_eq!(dup.class(), ErrorClass::Configuration);
        assert_eq!(Error::OutOfMemory("forest".into()).class(), ErrorClass::Resource);
        assert_eq!(Error::Terminated.class(), ErrorClass::Cancellation);
        assert!(Error::engine("boom").is_measure_local());
        assert!(Error::assertion("bad").is_measure_local());
        assert!(!Error::Terminated.is_measure_local());
    }

    #[test]
    fn test_messages() {
        let err = Error::CallMismatch {
            category: "ctl".to_string(),
            expected: CallingForm::FunctionCall,
            got: CallingForm::SingleMeasure,
        };
        assert_eq!(
            err.to_string(),
            "category `ctl` is called as function call, not as single measure"
        );
        assert_eq!(Error::engine("x").to_string(), "engine failed: x");
    }
}
