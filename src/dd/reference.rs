use std::fmt::{Display, Formatter};
use std::ops::Neg;

/// Edge into a [`Forest`][crate::dd::Forest], possibly complemented.
///
/// Index 1 is the terminal node: `Ref::ONE` points to it, `Ref::ZERO` is its complement.
/// Two edges are equal iff they denote the same Boolean function.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Ref(i32);

impl Ref {
    pub const ONE: Ref = Ref(1);
    pub const ZERO: Ref = Ref(-1);

    pub(crate) const fn positive(index: u32) -> Self {
        Self(index as i32)
    }

    pub const fn is_negated(self) -> bool {
        self.0 < 0
    }

    pub const fn is_terminal(self) -> bool {
        self.0 == 1 || self.0 == -1
    }

    /// Index of the node this edge points to.
    pub const fn index(self) -> usize {
        self.0.unsigned_abs() as usize
    }

    /// The same edge without the complement mark.
    pub const fn regular(self) -> Self {
        Self(self.0.abs())
    }

    pub(crate) const fn raw(self) -> i32 {
        self.0
    }
}

impl Neg for Ref {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self(-self.0)
    }
}

impl Display for Ref {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match *self {
            Ref::ONE => write!(f, "@1"),
            Ref::ZERO => write!(f, "~@1"),
            _ => write!(f, "{}@{}", if self.is_negated() { "~" } else { "" }, self.index()),
        }
    }
}
