use std::fmt;
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::graph::StateSet;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Sign {
    Positive,
    Negative,
}

/// Result of a measure or an algorithm call.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Real(f64),
    Bool(bool),
    StateSet(StateSet),
    Distribution(Rc<[f64]>),
    Infinity(Sign),
    /// Undefined, the value of a failed measure.
    Null,
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_state_set(&self) -> Result<&StateSet> {
        match self {
            Value::StateSet(set) => Ok(set),
            other => Err(Error::assertion(format!("expected a state set, got {}", other.kind()))),
        }
    }

    pub fn into_state_set(self) -> Result<StateSet> {
        match self {
            Value::StateSet(set) => Ok(set),
            other => Err(Error::assertion(format!("expected a state set, got {}", other.kind()))),
        }
    }

    pub fn as_real(&self) -> Result<f64> {
        match *self {
            Value::Real(x) => Ok(x),
            ref other => Err(Error::assertion(format!("expected a real, got {}", other.kind()))),
        }
    }

    pub fn as_bool(&self) -> Result<bool> {
        match *self {
            Value::Bool(b) => Ok(b),
            ref other => Err(Error::assertion(format!("expected a bool, got {}", other.kind()))),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Value::Real(_) => "real",
            Value::Bool(_) => "bool",
            Value::StateSet(_) => "stateset",
            Value::Distribution(_) => "distribution",
            Value::Infinity(_) => "infinity",
            Value::Null => "null",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Real(x) => write!(f, "{}", x),
            Value::Bool(b) => write!(f, "{}", b),
            Value::StateSet(set) => write!(f, "{}", set),
            Value::Distribution(probs) => {
                write!(f, "(")?;
                for (i, p) in probs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}:{}", i, p)?;
                }
                write!(f, ")")
            }
            Value::Infinity(Sign::Positive) => write!(f, "infinity"),
            Value::Infinity(Sign::Negative) => write!(f, "-infinity"),
            Value::Null => write!(f, "undefined"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Value::Null.to_string(), "undefined");
        assert_eq!(Value::Infinity(Sign::Negative).to_string(), "-infinity");
        assert_eq!(Value::Bool(true).to_string(), "true");
        assert_eq!(Value::Distribution(Rc::from(vec![0.5, 0.5])).to_string(), "(0:0.5, 1:0.5)");
    }

    #[test]
    fn test_accessors() {
        assert_eq!(Value::Real(1.5).as_real(), Ok(1.5));
        assert!(Value::Real(1.5).as_bool().is_err());
        assert!(Value::Null.is_null());
        assert!(matches!(Value::Bool(false).into_state_set(), Err(Error::AssertionFailure(_))));
    }
}
