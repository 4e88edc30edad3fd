//! Reachability graphs and the state sets living on them.
//!
//! A [`ReachabilityGraph`] exposes only traversal primitives (one-step images, initial and
//! deadlocked states, terminal SCCs, the incoming-edge index) so that fixpoint algorithms do not
//! depend on how states are stored. Two realizations exist: [`ExplicitGraph`] (states are
//! indices, sets are bit sets) and [`SymbolicGraph`] (states are binary-encoded, sets are
//! decision-diagram edges).

use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use num_bigint::BigUint;

use crate::bitset::BitSet;
use crate::cancel::CancelFlag;
use crate::dd::Ref;
use crate::error::{Error, Result};

pub mod explicit;
pub mod symbolic;

pub use explicit::ExplicitGraph;
pub use symbolic::SymbolicGraph;

/// Process-unique identity of a graph.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct GraphId(u64);

impl GraphId {
    pub(crate) fn fresh() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        GraphId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for GraphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "G{}", self.0)
    }
}

/// Which way a step goes.
///
/// `Forward` follows edges (successors, post-image) and backs the past operators EY/EP/EH/ES.
/// `Backward` goes against edges (predecessors, pre-image) and backs EX/EF/EG/EU.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    pub fn reverse(self) -> Self {
        match self {
            Direction::Forward => Direction::Backward,
            Direction::Backward => Direction::Forward,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetRepr {
    Explicit(Rc<BitSet>),
    Symbolic(Ref),
}

/// A set of states of one particular graph.
///
/// Explicit payloads are shared; mutation goes through [`Rc::make_mut`], which copies the bits
/// only when the payload is not uniquely owned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateSet {
    graph: GraphId,
    repr: SetRepr,
}

impl StateSet {
    pub(crate) fn explicit(graph: GraphId, bits: BitSet) -> Self {
        Self {
            graph,
            repr: SetRepr::Explicit(Rc::new(bits)),
        }
    }

    pub(crate) fn symbolic(graph: GraphId, edge: Ref) -> Self {
        Self {
            graph,
            repr: SetRepr::Symbolic(edge),
        }
    }

    pub fn graph(&self) -> GraphId {
        self.graph
    }

    pub fn repr(&self) -> &SetRepr {
        &self.repr
    }

    pub fn is_explicit(&self) -> bool {
        matches!(self.repr, SetRepr::Explicit(_))
    }

    pub fn bits(&self) -> Result<&BitSet> {
        match &self.repr {
            SetRepr::Explicit(bits) => Ok(bits),
            SetRepr::Symbolic(_) => Err(Error::assertion(format!(
                "state set of {} is symbolic, expected bits",
                self.graph
            ))),
        }
    }

    /// Mutable bits, copied first if shared.
    pub(crate) fn bits_mut(&mut self) -> Result<&mut BitSet> {
        match &mut self.repr {
            SetRepr::Explicit(bits) => Ok(Rc::make_mut(bits)),
            SetRepr::Symbolic(_) => Err(Error::assertion(format!(
                "state set of {} is symbolic, expected bits",
                self.graph
            ))),
        }
    }

    pub fn edge(&self) -> Result<Ref> {
        match self.repr {
            SetRepr::Symbolic(edge) => Ok(edge),
            SetRepr::Explicit(_) => Err(Error::assertion(format!(
                "state set of {} is explicit, expected a diagram",
                self.graph
            ))),
        }
    }

    pub(crate) fn set_edge(&mut self, edge: Ref) {
        self.repr = SetRepr::Symbolic(edge);
    }
}

impl fmt::Display for StateSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.repr {
            SetRepr::Explicit(bits) => {
                write!(f, "{{")?;
                for (i, s) in bits.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", s)?;
                }
                write!(f, "}}")
            }
            SetRepr::Symbolic(edge) => write!(f, "{}[{}]", self.graph, edge),
        }
    }
}

/// Traversal primitives over a finite state space.
///
/// All binary operations require both operands to belong to `self`; a foreign set is an
/// [`Error::AssertionFailure`].
pub trait ReachabilityGraph {
    fn id(&self) -> GraphId;

    fn num_states(&self) -> usize;

    fn empty_set(&self) -> StateSet;

    fn full_set(&self) -> StateSet;

    /// Indices outside `0..num_states()` are an error.
    fn from_indices(&self, indices: &[usize]) -> Result<StateSet>;

    /// Members in increasing order.
    fn to_indices(&self, set: &StateSet) -> Result<Vec<usize>>;

    fn union(&self, a: &StateSet, b: &StateSet) -> Result<StateSet>;

    fn intersection(&self, a: &StateSet, b: &StateSet) -> Result<StateSet>;

    fn difference(&self, a: &StateSet, b: &StateSet) -> Result<StateSet>;

    fn complement(&self, a: &StateSet) -> Result<StateSet>;

    fn is_empty(&self, a: &StateSet) -> Result<bool>;

    fn is_subset(&self, a: &StateSet, b: &StateSet) -> Result<bool>;

    fn cardinality(&self, a: &StateSet) -> Result<BigUint>;

    fn contains(&self, a: &StateSet, state: usize) -> Result<bool>;

    /// Adds the successors of `from` to `into`. Returns whether `into` changed.
    fn forward(&self, from: &StateSet, into: &mut StateSet) -> Result<bool>;

    /// Adds the predecessors of `from` to `into`. Returns whether `into` changed.
    fn backward(&self, from: &StateSet, into: &mut StateSet) -> Result<bool>;

    /// One-step image of `from` in direction `dir`.
    fn step(&self, dir: Direction, from: &StateSet) -> Result<StateSet> {
        let mut into = self.empty_set();
        match dir {
            Direction::Forward => self.forward(from, &mut into)?,
            Direction::Backward => self.backward(from, &mut into)?,
        };
        Ok(into)
    }

    fn initial_states(&self) -> StateSet;

    /// Restricts `set` to its deadlocked states.
    fn find_deadlocked_states(&self, set: &mut StateSet) -> Result<()>;

    /// Replaces `set` with the union of the non-trivial terminal SCCs contained in it.
    ///
    /// A TSCC is non-trivial if it has more than one state or a self-loop; deadlocks never count.
    fn tsccs_satisfying(&self, set: &mut StateSet, cancel: &CancelFlag) -> Result<()>;

    /// Makes the incoming-edge index available. Returns false if the graph cannot provide it.
    fn require_by_cols(&self) -> bool;

    /// Out-degree of every state.
    fn outgoing_counts(&self) -> Result<Vec<usize>>;

    /// Sources of the edges entering `state`. Requires [`require_by_cols`][Self::require_by_cols].
    fn incoming_edges(&self, state: usize) -> Result<&[usize]>;

    fn check_owner(&self, set: &StateSet) -> Result<()> {
        if set.graph() == self.id() {
            Ok(())
        } else {
            Err(Error::assertion(format!(
                "state set belongs to {}, not to {}",
                set.graph(),
                self.id()
            )))
        }
    }
}
