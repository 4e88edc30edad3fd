use std::rc::Rc;

use log::debug;
use num_bigint::BigUint;

use crate::cancel::CancelFlag;
use crate::dd::{Forest, PermutationId, Ref};
use crate::error::{Error, Result};
use crate::graph::{ExplicitGraph, GraphId, ReachabilityGraph, StateSet};

/// State space encoded in a decision-diagram forest.
///
/// A state index is written in binary on `k` bits, most significant bit first. Bit `i` of the
/// present state is variable `2i + 1` and bit `i` of the next state is variable `2i + 2`, so the
/// two copies are interleaved. The transition relation is one diagram over both copies.
pub struct SymbolicGraph {
    id: GraphId,
    forest: Rc<Forest>,
    num_states: usize,
    present: Vec<u32>,
    next: Vec<u32>,
    present_cube: Ref,
    next_cube: Ref,
    to_next: PermutationId,
    to_present: PermutationId,
    relation: Ref,
    universe: Ref,
    initial: Ref,
}

impl std::fmt::Debug for SymbolicGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymbolicGraph")
            .field("id", &self.id)
            .field("num_states", &self.num_states)
            .field("bits", &self.present.len())
            .field("relation", &self.relation)
            .finish()
    }
}

impl SymbolicGraph {
    /// Encodes the edge list into a fresh relation diagram of `forest`.
    pub fn from_edges(
        forest: Rc<Forest>,
        num_states: usize,
        initial: impl IntoIterator<Item = usize>,
        edges: impl IntoIterator<Item = (usize, usize)>,
    ) -> Result<Self> {
        let bits = Self::bits_for(num_states);
        let present: Vec<u32> = (0..bits as u32).map(|i| 2 * i + 1).collect();
        let next: Vec<u32> = (0..bits as u32).map(|i| 2 * i + 2).collect();

        let present_cube = forest.cube(present.iter().copied())?;
        let next_cube = forest.cube(next.iter().copied())?;
        let to_next = forest.register_permutation(present.iter().copied().zip(next.iter().copied()));
        let to_present = forest.register_permutation(next.iter().copied().zip(present.iter().copied()));

        let universe = Self::less_than(&forest, num_states, &present)?;

        let check = |s: usize| {
            if s < num_states {
                Ok(())
            } else {
                Err(Error::assertion(format!("state {} is outside of 0..{}", s, num_states)))
            }
        };

        let mut relation = Ref::ZERO;
        let mut num_edges = 0usize;
        for (from, to) in edges {
            check(from)?;
            check(to)?;
            let literals = Self::literals(from, &present).chain(Self::literals(to, &next));
            let edge = forest.minterm(literals)?;
            relation = forest.or(relation, edge)?;
            num_edges += 1;
        }

        let mut init = Ref::ZERO;
        for s in initial {
            check(s)?;
            let state = forest.minterm(Self::literals(s, &present))?;
            init = forest.or(init, state)?;
        }

        debug!(
            "symbolic graph: {} states on {} bits, {} edges, relation has {} nodes",
            num_states,
            bits,
            num_edges,
            forest.node_count(relation)
        );

        Ok(Self {
            id: GraphId::fresh(),
            forest,
            num_states,
            present,
            next,
            present_cube,
            next_cube,
            to_next,
            to_present,
            relation,
            universe,
            initial: init,
        })
    }

    /// Encodes an explicit graph, preserving state indices.
    pub fn encode(graph: &ExplicitGraph, forest: Rc<Forest>) -> Result<Self> {
        SymbolicGraph::from_edges(
            forest,
            graph.num_states(),
            graph.initial().iter(),
            graph.edges(),
        )
    }

    fn bits_for(num_states: usize) -> usize {
        if num_states <= 2 {
            1
        } else {
            (usize::BITS - (num_states - 1).leading_zeros()) as usize
        }
    }

    fn literals(state: usize, vars: &[u32]) -> impl Iterator<Item = (u32, bool)> + '_ {
        let k = vars.len();
        vars.iter()
            .enumerate()
            .map(move |(i, &v)| (v, (state >> (k - 1 - i)) & 1 == 1))
    }

    /// Diagram of the encodings `x < n`.
    fn less_than(forest: &Forest, n: usize, vars: &[u32]) -> Result<Ref> {
        let k = vars.len();
        if n >= 1 << k {
            return Ok(Ref::ONE);
        }
        // Built from the least significant bit up: x[i..] < n[i..].
        let mut lt = Ref::ZERO;
        for i in (0..k).rev() {
            let bit = (n >> (k - 1 - i)) & 1 == 1;
            lt = if bit {
                forest.mk_node(vars[i], Ref::ONE, lt)?
            } else {
                forest.mk_node(vars[i], lt, Ref::ZERO)?
            };
        }
        Ok(lt)
    }

    pub fn forest(&self) -> &Rc<Forest> {
        &self.forest
    }

    pub fn relation(&self) -> Ref {
        self.relation
    }

    pub fn universe(&self) -> Ref {
        self.universe
    }

    pub fn initial(&self) -> Ref {
        self.initial
    }

    pub fn present_vars(&self) -> &[u32] {
        &self.present
    }

    pub fn next_vars(&self) -> &[u32] {
        &self.next
    }

    /// Diagram of a single state.
    pub fn state(&self, state: usize) -> Result<Ref> {
        if state >= self.num_states {
            return Err(Error::assertion(format!(
                "state {} is outside of 0..{}",
                state, self.num_states
            )));
        }
        self.forest.minterm(Self::literals(state, &self.present))
    }

    /// Successors of the states in `from`.
    pub fn post_image(&self, from: Ref) -> Result<Ref> {
        let image = self.forest.and_exists(from, self.relation, self.present_cube)?;
        self.forest.rename(image, self.to_present)
    }

    /// Predecessors of the states in `to`.
    pub fn pre_image(&self, to: Ref) -> Result<Ref> {
        let primed = self.forest.rename(to, self.to_next)?;
        self.forest.and_exists(self.relation, primed, self.next_cube)
    }

    /// States with no successor.
    pub fn deadlocks(&self) -> Result<Ref> {
        let has_successor = self.forest.exists(self.relation, self.next_cube)?;
        self.forest.diff(self.universe, has_successor)
    }

    fn closure(&self, seed: Ref, forward: bool, cancel: &CancelFlag) -> Result<Ref> {
        let mut reached = seed;
        loop {
            cancel.check()?;
            let image = if forward {
                self.post_image(reached)?
            } else {
                self.pre_image(reached)?
            };
            let next = self.forest.or(reached, image)?;
            if next == reached {
                return Ok(reached);
            }
            reached = next;
        }
    }

    /// Union of the non-trivial terminal SCCs contained in `within`.
    ///
    /// Picks a candidate state `s`, computes its forward closure `F` and backward closure `B`.
    /// If `F ⊆ B` then `F` is the terminal SCC of `s`. Either way no other terminal SCC meets `B`,
    /// so `B` is dropped from the candidates.
    pub fn terminal_sccs_within(&self, within: Ref, cancel: &CancelFlag) -> Result<Ref> {
        let forest = &self.forest;
        let mut remaining = forest.and(within, self.universe)?;
        let mut result = Ref::ZERO;
        let mut found = 0usize;
        while remaining != Ref::ZERO {
            cancel.check()?;
            let s = match forest.pick_minterm(remaining, &self.present)? {
                Some(s) => s,
                None => break,
            };
            let reach = self.closure(s, true, cancel)?;
            let coreach = self.closure(s, false, cancel)?;
            if forest.implies(reach, coreach)? {
                let nontrivial = forest.implies(s, self.post_image(reach)?)?;
                if nontrivial && forest.implies(reach, within)? {
                    result = forest.or(result, reach)?;
                    found += 1;
                }
            }
            remaining = forest.diff(remaining, coreach)?;
        }
        debug!("{}: {} non-trivial terminal SCCs", self.id, found);
        Ok(result)
    }

    fn wrap(&self, edge: Ref) -> StateSet {
        StateSet::symbolic(self.id, edge)
    }

    fn owned_edge(&self, set: &StateSet) -> Result<Ref> {
        self.check_owner(set)?;
        set.edge()
    }
}

impl ReachabilityGraph for SymbolicGraph {
    fn id(&self) -> GraphId {
        self.id
    }

    fn num_states(&self) -> usize {
        self.num_states
    }

    fn empty_set(&self) -> StateSet {
        self.wrap(Ref::ZERO)
    }

    fn full_set(&self) -> StateSet {
        self.wrap(self.universe)
    }

    fn from_indices(&self, indices: &[usize]) -> Result<StateSet> {
        let mut edge = Ref::ZERO;
        for &s in indices {
            edge = self.forest.or(edge, self.state(s)?)?;
        }
        Ok(self.wrap(edge))
    }

    fn to_indices(&self, set: &StateSet) -> Result<Vec<usize>> {
        let edge = self.owned_edge(set)?;
        let mut indices = Vec::new();
        self.forest
            .for_each_minterm(edge, &self.present, &CancelFlag::new(), &mut |bits| {
                let index = bits.iter().fold(0usize, |acc, &b| (acc << 1) | b as usize);
                indices.push(index);
            })?;
        Ok(indices)
    }

    fn union(&self, a: &StateSet, b: &StateSet) -> Result<StateSet> {
        let edge = self.forest.or(self.owned_edge(a)?, self.owned_edge(b)?)?;
        Ok(self.wrap(edge))
    }

    fn intersection(&self, a: &StateSet, b: &StateSet) -> Result<StateSet> {
        let edge = self.forest.and(self.owned_edge(a)?, self.owned_edge(b)?)?;
        Ok(self.wrap(edge))
    }

    fn difference(&self, a: &StateSet, b: &StateSet) -> Result<StateSet> {
        let edge = self.forest.diff(self.owned_edge(a)?, self.owned_edge(b)?)?;
        Ok(self.wrap(edge))
    }

    fn complement(&self, a: &StateSet) -> Result<StateSet> {
        let edge = self.forest.diff(self.universe, self.owned_edge(a)?)?;
        Ok(self.wrap(edge))
    }

    fn is_empty(&self, a: &StateSet) -> Result<bool> {
        Ok(self.owned_edge(a)? == Ref::ZERO)
    }

    fn is_subset(&self, a: &StateSet, b: &StateSet) -> Result<bool> {
        self.forest.implies(self.owned_edge(a)?, self.owned_edge(b)?)
    }

    fn cardinality(&self, a: &StateSet) -> Result<BigUint> {
        self.forest.sat_count_over(self.owned_edge(a)?, &self.present)
    }

    fn contains(&self, a: &StateSet, state: usize) -> Result<bool> {
        let edge = self.owned_edge(a)?;
        if state >= self.num_states {
            return Ok(false);
        }
        let k = self.present.len();
        Ok(self.forest.eval(edge, |v| {
            if v % 2 == 1 {
                let i = (v as usize - 1) / 2;
                (state >> (k - 1 - i)) & 1 == 1
            } else {
                false
            }
        }))
    }

    fn forward(&self, from: &StateSet, into: &mut StateSet) -> Result<bool> {
        let image = self.post_image(self.owned_edge(from)?)?;
        let old = self.owned_edge(into)?;
        let new = self.forest.or(old, image)?;
        into.set_edge(new);
        Ok(new != old)
    }

    fn backward(&self, from: &StateSet, into: &mut StateSet) -> Result<bool> {
        let image = self.pre_image(self.owned_edge(from)?)?;
        let old = self.owned_edge(into)?;
        let new = self.forest.or(old, image)?;
        into.set_edge(new);
        Ok(new != old)
    }

    fn initial_states(&self) -> StateSet {
        self.wrap(self.initial)
    }

    fn find_deadlocked_states(&self, set: &mut StateSet) -> Result<()> {
        let edge = self.owned_edge(set)?;
        let deadlocks = self.deadlocks()?;
        set.set_edge(self.forest.and(edge, deadlocks)?);
        Ok(())
    }

    fn tsccs_satisfying(&self, set: &mut StateSet, cancel: &CancelFlag) -> Result<()> {
        let edge = self.owned_edge(set)?;
        set.set_edge(self.terminal_sccs_within(edge, cancel)?);
        Ok(())
    }

    fn require_by_cols(&self) -> bool {
        false
    }

    fn outgoing_counts(&self) -> Result<Vec<usize>> {
        Err(Error::assertion("symbolic graphs do not provide per-state out-degrees"))
    }

    fn incoming_edges(&self, _state: usize) -> Result<&[usize]> {
        Err(Error::assertion("symbolic graphs do not provide an incoming-edge index"))
    }
}
