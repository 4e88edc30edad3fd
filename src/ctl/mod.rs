//! CTL fixpoint algorithms.
//!
//! The existential operators are computed as fixpoints over an abstract set type; the
//! universal ones are derived from them by duality only:
//!
//! - `AX p = ¬EX ¬p`
//! - `AF p = ¬EG ¬p`
//! - `AG p = ¬EF ¬p`
//! - `A[p U q] = ¬(E[¬q U (¬p ∧ ¬q)] ∨ EG ¬q)`
//!
//! [`Direction::Backward`] gives the usual future operators (EX, EF, EG, EU); [`Direction::Forward`]
//! gives their past counterparts (EY, EP, EH, ES).

use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use crate::cancel::CancelFlag;
use crate::error::{Error, Result};
use crate::graph::Direction;
use crate::report::{FixpointObserver, Snapshot};

pub mod explicit;
pub mod formula;
pub mod symbolic;

pub use explicit::ExplicitCtl;
pub use formula::CtlFormula;
pub use symbolic::SymbolicCtl;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum CtlOp {
    EX,
    AX,
    EF,
    AF,
    EG,
    AG,
    EU,
    AU,
    /// Controlled reachability: `p` marks the states where one may choose the successor.
    AEF,
}

impl CtlOp {
    pub fn arity(self) -> usize {
        match self {
            CtlOp::EU | CtlOp::AU | CtlOp::AEF => 2,
            _ => 1,
        }
    }

    /// Operators whose result depends on the EG flavour.
    pub fn uses_eg(self) -> bool {
        matches!(self, CtlOp::EG | CtlOp::AF | CtlOp::AU)
    }
}

/// A CTL operator with its direction and fairness, as named in function calls.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct CtlFunction {
    pub op: CtlOp,
    pub dir: Direction,
    pub fair: bool,
}

const NAMES: [(&str, CtlOp, Direction); 17] = [
    ("EX", CtlOp::EX, Direction::Backward),
    ("EY", CtlOp::EX, Direction::Forward),
    ("AX", CtlOp::AX, Direction::Backward),
    ("AY", CtlOp::AX, Direction::Forward),
    ("EF", CtlOp::EF, Direction::Backward),
    ("EP", CtlOp::EF, Direction::Forward),
    ("AF", CtlOp::AF, Direction::Backward),
    ("AP", CtlOp::AF, Direction::Forward),
    ("EG", CtlOp::EG, Direction::Backward),
    ("EH", CtlOp::EG, Direction::Forward),
    ("AG", CtlOp::AG, Direction::Backward),
    ("AH", CtlOp::AG, Direction::Forward),
    ("EU", CtlOp::EU, Direction::Backward),
    ("ES", CtlOp::EU, Direction::Forward),
    ("AU", CtlOp::AU, Direction::Backward),
    ("AS", CtlOp::AU, Direction::Forward),
    ("AEF", CtlOp::AEF, Direction::Backward),
];

impl CtlFunction {
    pub fn new(op: CtlOp, dir: Direction) -> Self {
        Self { op, dir, fair: false }
    }

    pub fn fair(mut self) -> Self {
        self.fair = true;
        self
    }

    pub fn name(&self) -> &'static str {
        NAMES
            .iter()
            .find(|(_, op, dir)| *op == self.op && (*dir == self.dir || self.op == CtlOp::AEF))
            .map_or("?", |(name, _, _)| *name)
    }
}

impl fmt::Display for CtlFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.fair {
            write!(f, "fair ")?;
        }
        f.write_str(self.name())
    }
}

impl FromStr for CtlFunction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (fair, name) = match s.trim().strip_prefix("fair ") {
            Some(rest) => (true, rest.trim()),
            None => (false, s.trim()),
        };
        let &(_, op, dir) = NAMES
            .iter()
            .find(|(n, _, _)| *n == name)
            .ok_or_else(|| Error::engine(format!("unknown CTL function `{}`", s)))?;
        if fair && !op.uses_eg() {
            return Err(Error::engine(format!("`{}` has no fair variant", name)));
        }
        Ok(CtlFunction { op, dir, fair })
    }
}

/// Set algebra and traversal primitives of one state-set representation, with the CTL
/// operators built on top of them.
pub trait Fixpoints {
    type Set: Clone + PartialEq + fmt::Debug;

    fn empty(&self) -> Self::Set;

    fn full(&self) -> Self::Set;

    fn union(&self, a: &Self::Set, b: &Self::Set) -> Result<Self::Set>;

    fn intersection(&self, a: &Self::Set, b: &Self::Set) -> Result<Self::Set>;

    fn difference(&self, a: &Self::Set, b: &Self::Set) -> Result<Self::Set>;

    fn complement(&self, a: &Self::Set) -> Result<Self::Set>;

    fn is_empty(&self, a: &Self::Set) -> bool;

    fn step(&self, dir: Direction, a: &Self::Set) -> Result<Self::Set>;

    /// `acc ∪= add`. Returns whether `acc` grew; this is the least-fixpoint test.
    fn grow(&self, acc: &mut Self::Set, add: &Self::Set) -> Result<bool>;

    /// `acc ∩= keep`. Returns whether `acc` shrank; this is the greatest-fixpoint test.
    fn shrink(&self, acc: &mut Self::Set, keep: &Self::Set) -> Result<bool>;

    fn deadlocks(&self) -> Result<Self::Set>;

    fn initial(&self) -> Self::Set;

    /// Union of the non-trivial terminal SCCs contained in `p`.
    fn tsccs_within(&self, p: &Self::Set) -> Result<Self::Set>;

    fn cancel(&self) -> &CancelFlag;

    fn observer(&self) -> &dyn FixpointObserver;

    fn snapshot<'s>(&self, set: &'s Self::Set) -> Snapshot<'s>;

    /// Size of the representation, reported when a fixpoint completes.
    fn nodes(&self, _set: &Self::Set) -> Option<usize> {
        None
    }

    fn ex(&self, dir: Direction, p: &Self::Set) -> Result<Self::Set> {
        self.step(dir, p)
    }

    /// `E[p U q]`, or `EF q` when `p` is `None`.
    fn eu(&self, dir: Direction, p: Option<&Self::Set>, q: &Self::Set) -> Result<Self::Set> {
        let name = match (dir, p.is_some()) {
            (Direction::Backward, true) => "EU",
            (Direction::Forward, true) => "ES",
            (Direction::Backward, false) => "EF",
            (Direction::Forward, false) => "EP",
        };
        let start = Instant::now();
        let mut result = q.clone();
        let mut frontier = q.clone();
        let mut rounds = 0;
        loop {
            self.cancel().check()?;
            let mut next = self.step(dir, &frontier)?;
            if let Some(p) = p {
                next = self.intersection(&next, p)?;
            }
            let next = self.difference(&next, &result)?;
            if !self.grow(&mut result, &next)? {
                break;
            }
            rounds += 1;
            self.observer().iteration(name, rounds, self.snapshot(&result));
            frontier = next;
        }
        self.observer().finished(name, rounds, start.elapsed(), self.nodes(&result));
        Ok(result)
    }

    fn ef(&self, dir: Direction, p: &Self::Set) -> Result<Self::Set> {
        self.eu(dir, None, p)
    }

    /// Greatest fixpoint `r = p ∩ (step(r) ∪ D)`.
    ///
    /// `D` holds the states of `p` where a path may legitimately end: deadlocks going backward,
    /// initial states going forward.
    fn unfair_eg(&self, dir: Direction, p: &Self::Set) -> Result<Self::Set> {
        let name = match dir {
            Direction::Backward => "EG",
            Direction::Forward => "EH",
        };
        let start = Instant::now();
        let ends = match dir {
            Direction::Backward => self.deadlocks()?,
            Direction::Forward => self.initial(),
        };
        let ends = self.intersection(&ends, p)?;
        let ends = if self.is_empty(&ends) { None } else { Some(ends) };

        let mut result = p.clone();
        let mut rounds = 0;
        loop {
            self.cancel().check()?;
            let mut keep = self.step(dir, &result)?;
            if let Some(ends) = &ends {
                keep = self.union(&keep, ends)?;
            }
            if !self.shrink(&mut result, &keep)? {
                break;
            }
            rounds += 1;
            self.observer().iteration(name, rounds, self.snapshot(&result));
        }
        self.observer().finished(name, rounds, start.elapsed(), self.nodes(&result));
        Ok(result)
    }

    /// States with a fair path (ending in a terminal SCC) along which `p` always holds.
    fn fair_eg(&self, dir: Direction, p: &Self::Set) -> Result<Self::Set> {
        let seed = self.tsccs_within(p)?;
        self.eu(dir, Some(p), &seed)
    }

    fn eg(&self, dir: Direction, p: &Self::Set, fair: bool) -> Result<Self::Set> {
        if fair {
            self.fair_eg(dir, p)
        } else {
            self.unfair_eg(dir, p)
        }
    }

    fn ax(&self, dir: Direction, p: &Self::Set) -> Result<Self::Set> {
        let not_p = self.complement(p)?;
        self.complement(&self.ex(dir, &not_p)?)
    }

    fn af(&self, dir: Direction, p: &Self::Set, fair: bool) -> Result<Self::Set> {
        let not_p = self.complement(p)?;
        self.complement(&self.eg(dir, &not_p, fair)?)
    }

    fn ag(&self, dir: Direction, p: &Self::Set) -> Result<Self::Set> {
        let not_p = self.complement(p)?;
        self.complement(&self.ef(dir, &not_p)?)
    }

    fn au(&self, dir: Direction, p: &Self::Set, q: &Self::Set, fair: bool) -> Result<Self::Set> {
        let not_p = self.complement(p)?;
        let not_q = self.complement(q)?;
        let neither = self.intersection(&not_p, &not_q)?;
        let escape = self.eu(dir, Some(&not_q), &neither)?;
        let never = self.eg(dir, &not_q, fair)?;
        self.complement(&self.union(&escape, &never)?)
    }

    /// `AEF(p, q)` as the least fixpoint `r = q ∪ (p ∩ EX r) ∪ (¬p ∩ EX r ∩ AX r)`.
    fn aef_iterative(&self, p: &Self::Set, q: &Self::Set) -> Result<Self::Set> {
        let start = Instant::now();
        let not_p = self.complement(p)?;
        let mut result = q.clone();
        let mut rounds = 0;
        loop {
            self.cancel().check()?;
            let ex = self.ex(Direction::Backward, &result)?;
            let ax = self.ax(Direction::Backward, &result)?;
            let chosen = self.intersection(p, &ex)?;
            let forced = self.intersection(&self.intersection(&not_p, &ex)?, &ax)?;
            let add = self.union(&chosen, &forced)?;
            if !self.grow(&mut result, &add)? {
                break;
            }
            rounds += 1;
            self.observer().iteration("AEF", rounds, self.snapshot(&result));
        }
        self.observer().finished("AEF", rounds, start.elapsed(), self.nodes(&result));
        Ok(result)
    }

    /// Evaluates `function` on `args`. AEF uses the iterative algorithm.
    fn apply(&self, function: CtlFunction, args: &[Self::Set]) -> Result<Self::Set> {
        if args.len() != function.op.arity() {
            return Err(Error::engine(format!(
                "{} takes {} arguments, got {}",
                function,
                function.op.arity(),
                args.len()
            )));
        }
        let CtlFunction { op, dir, fair } = function;
        match op {
            CtlOp::EX => self.ex(dir, &args[0]),
            CtlOp::AX => self.ax(dir, &args[0]),
            CtlOp::EF => self.ef(dir, &args[0]),
            CtlOp::AF => self.af(dir, &args[0], fair),
            CtlOp::EG => self.eg(dir, &args[0], fair),
            CtlOp::AG => self.ag(dir, &args[0]),
            CtlOp::EU => self.eu(dir, Some(&args[0]), &args[1]),
            CtlOp::AU => self.au(dir, &args[0], &args[1], fair),
            CtlOp::AEF => self.aef_iterative(&args[0], &args[1]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names() {
        let f: CtlFunction = "EX".parse().unwrap();
        assert_eq!(f, CtlFunction::new(CtlOp::EX, Direction::Backward));
        let f: CtlFunction = "EP".parse().unwrap();
        assert_eq!(f, CtlFunction::new(CtlOp::EF, Direction::Forward));
        let f: CtlFunction = "fair EH".parse().unwrap();
        assert_eq!(f, CtlFunction::new(CtlOp::EG, Direction::Forward).fair());
        assert_eq!(f.to_string(), "fair EH");
        assert_eq!("AEF".parse::<CtlFunction>().unwrap().op.arity(), 2);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!("EZ".parse::<CtlFunction>(), Err(Error::EngineFailed(_))));
        assert!(matches!("fair EX".parse::<CtlFunction>(), Err(Error::EngineFailed(_))));
        assert!("fair AU".parse::<CtlFunction>().is_ok());
    }

    #[test]
    fn test_names_round_trip() {
        for (name, _, _) in NAMES {
            let f: CtlFunction = name.parse().unwrap();
            assert_eq!(f.to_string(), name);
        }
    }
}
