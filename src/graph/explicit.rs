use std::cell::OnceCell;

use log::debug;
use num_bigint::BigUint;

use crate::bitset::BitSet;
use crate::cancel::CancelFlag;
use crate::error::{Error, Result};
use crate::graph::{GraphId, ReachabilityGraph, StateSet};

/// State space with states `0..n` and adjacency lists.
#[derive(Debug)]
pub struct ExplicitGraph {
    id: GraphId,
    successors: Vec<Vec<usize>>,
    /// Incoming-edge index, built on first request.
    predecessors: OnceCell<Vec<Vec<usize>>>,
    initial: BitSet,
    num_edges: usize,
}

impl ExplicitGraph {
    /// Builds a graph from an edge list. Parallel edges are merged.
    pub fn new(
        num_states: usize,
        initial: impl IntoIterator<Item = usize>,
        edges: impl IntoIterator<Item = (usize, usize)>,
    ) -> Result<Self> {
        let mut successors = vec![Vec::new(); num_states];
        for (from, to) in edges {
            if from >= num_states || to >= num_states {
                return Err(Error::assertion(format!(
                    "edge {} -> {} is outside of 0..{}",
                    from, to, num_states
                )));
            }
            successors[from].push(to);
        }
        let mut num_edges = 0;
        for list in &mut successors {
            list.sort_unstable();
            list.dedup();
            num_edges += list.len();
        }

        let mut init = BitSet::new(num_states);
        for s in initial {
            if s >= num_states {
                return Err(Error::assertion(format!(
                    "initial state {} is outside of 0..{}",
                    s, num_states
                )));
            }
            init.insert(s);
        }

        let graph = Self {
            id: GraphId::fresh(),
            successors,
            predecessors: OnceCell::new(),
            initial: init,
            num_edges,
        };
        debug!(
            "explicit graph {}: {} states, {} edges",
            graph.id, num_states, num_edges
        );
        Ok(graph)
    }

    pub fn num_edges(&self) -> usize {
        self.num_edges
    }

    pub fn successors(&self, state: usize) -> &[usize] {
        &self.successors[state]
    }

    pub fn predecessors(&self, state: usize) -> &[usize] {
        &self.by_cols()[state]
    }

    pub fn edges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.successors
            .iter()
            .enumerate()
            .flat_map(|(from, list)| list.iter().map(move |&to| (from, to)))
    }

    pub fn initial(&self) -> &BitSet {
        &self.initial
    }

    fn by_cols(&self) -> &Vec<Vec<usize>> {
        self.predecessors.get_or_init(|| {
            debug!("building incoming-edge index for {}", self.id);
            let mut predecessors = vec![Vec::new(); self.successors.len()];
            for (from, to) in self.edges() {
                predecessors[to].push(from);
            }
            predecessors
        })
    }

    /// `into ∪= post(from)`
    pub fn post(&self, from: &BitSet, into: &mut BitSet) -> bool {
        let mut changed = false;
        for s in from {
            for &t in &self.successors[s] {
                changed |= into.insert(t);
            }
        }
        changed
    }

    /// `into ∪= pre(from)`
    pub fn pre(&self, from: &BitSet, into: &mut BitSet) -> bool {
        let mut changed = false;
        if let Some(predecessors) = self.predecessors.get() {
            for t in from {
                for &s in &predecessors[t] {
                    changed |= into.insert(s);
                }
            }
        } else {
            for (s, list) in self.successors.iter().enumerate() {
                if !into.contains(s) && list.iter().any(|&t| from.contains(t)) {
                    into.insert(s);
                    changed = true;
                }
            }
        }
        changed
    }

    pub fn deadlocks(&self) -> BitSet {
        let n = self.successors.len();
        BitSet::from_indices(n, (0..n).filter(|&s| self.successors[s].is_empty()))
    }

    /// Non-trivial terminal SCCs, found with an iterative Tarjan search.
    pub fn terminal_sccs(&self, cancel: &CancelFlag) -> Result<Vec<Vec<usize>>> {
        const UNVISITED: usize = usize::MAX;

        let n = self.successors.len();
        let mut index = vec![UNVISITED; n];
        let mut low = vec![0; n];
        let mut on_stack = vec![false; n];
        let mut component = vec![UNVISITED; n];
        let mut stack = Vec::new();
        let mut components: Vec<Vec<usize>> = Vec::new();
        let mut counter = 0;

        for root in 0..n {
            if index[root] != UNVISITED {
                continue;
            }
            cancel.check()?;

            // Frames are (state, position of the next successor to visit).
            let mut calls = vec![(root, 0)];
            index[root] = counter;
            low[root] = counter;
            counter += 1;
            stack.push(root);
            on_stack[root] = true;

            while let Some(frame) = calls.last_mut() {
                let v = frame.0;
                if frame.1 < self.successors[v].len() {
                    let w = self.successors[v][frame.1];
                    frame.1 += 1;
                    if index[w] == UNVISITED {
                        index[w] = counter;
                        low[w] = counter;
                        counter += 1;
                        stack.push(w);
                        on_stack[w] = true;
                        calls.push((w, 0));
                    } else if on_stack[w] {
                        low[v] = low[v].min(index[w]);
                    }
                    continue;
                }

                calls.pop();
                if let Some(&(u, _)) = calls.last() {
                    low[u] = low[u].min(low[v]);
                }
                if low[v] == index[v] {
                    let id = components.len();
                    let mut members = Vec::new();
                    while let Some(w) = stack.pop() {
                        on_stack[w] = false;
                        component[w] = id;
                        members.push(w);
                        if w == v {
                            break;
                        }
                    }
                    components.push(members);
                }
            }
        }

        let mut result = Vec::new();
        for (id, mut members) in components.into_iter().enumerate() {
            let terminal = members
                .iter()
                .all(|&s| self.successors[s].iter().all(|&t| component[t] == id));
            let nontrivial = members.len() > 1 || self.successors[members[0]].contains(&members[0]);
            if terminal && nontrivial {
                members.sort_unstable();
                result.push(members);
            }
        }
        debug!("{}: {} non-trivial terminal SCCs", self.id, result.len());
        Ok(result)
    }

    fn check_index(&self, state: usize) -> Result<()> {
        if state < self.successors.len() {
            Ok(())
        } else {
            Err(Error::assertion(format!(
                "state {} is outside of 0..{}",
                state,
                self.successors.len()
            )))
        }
    }

    fn wrap(&self, bits: BitSet) -> StateSet {
        StateSet::explicit(self.id, bits)
    }

    fn owned_bits<'a>(&self, set: &'a StateSet) -> Result<&'a BitSet> {
        self.check_owner(set)?;
        set.bits()
    }
}

impl ReachabilityGraph for ExplicitGraph {
    fn id(&self) -> GraphId {
        self.id
    }

    fn num_states(&self) -> usize {
        self.successors.len()
    }

    fn empty_set(&self) -> StateSet {
        self.wrap(BitSet::new(self.num_states()))
    }

    fn full_set(&self) -> StateSet {
        self.wrap(BitSet::full(self.num_states()))
    }

    fn from_indices(&self, indices: &[usize]) -> Result<StateSet> {
        let mut bits = BitSet::new(self.num_states());
        for &s in indices {
            self.check_index(s)?;
            bits.insert(s);
        }
        Ok(self.wrap(bits))
    }

    fn to_indices(&self, set: &StateSet) -> Result<Vec<usize>> {
        Ok(self.owned_bits(set)?.iter().collect())
    }

    fn union(&self, a: &StateSet, b: &StateSet) -> Result<StateSet> {
        let other = self.owned_bits(b)?;
        self.check_owner(a)?;
        let mut result = a.clone();
        result.bits_mut()?.union_with(other);
        Ok(result)
    }

    fn intersection(&self, a: &StateSet, b: &StateSet) -> Result<StateSet> {
        let other = self.owned_bits(b)?;
        self.check_owner(a)?;
        let mut result = a.clone();
        result.bits_mut()?.intersect_with(other);
        Ok(result)
    }

    fn difference(&self, a: &StateSet, b: &StateSet) -> Result<StateSet> {
        let other = self.owned_bits(b)?;
        self.check_owner(a)?;
        let mut result = a.clone();
        result.bits_mut()?.difference_with(other);
        Ok(result)
    }

    fn complement(&self, a: &StateSet) -> Result<StateSet> {
        self.check_owner(a)?;
        let mut result = a.clone();
        result.bits_mut()?.complement();
        Ok(result)
    }

    fn is_empty(&self, a: &StateSet) -> Result<bool> {
        Ok(self.owned_bits(a)?.is_empty())
    }

    fn is_subset(&self, a: &StateSet, b: &StateSet) -> Result<bool> {
        Ok(self.owned_bits(a)?.is_subset(self.owned_bits(b)?))
    }

    fn cardinality(&self, a: &StateSet) -> Result<BigUint> {
        Ok(BigUint::from(self.owned_bits(a)?.len()))
    }

    fn contains(&self, a: &StateSet, state: usize) -> Result<bool> {
        Ok(self.owned_bits(a)?.contains(state))
    }

    fn forward(&self, from: &StateSet, into: &mut StateSet) -> Result<bool> {
        let from = self.owned_bits(from)?;
        self.check_owner(into)?;
        Ok(self.post(from, into.bits_mut()?))
    }

    fn backward(&self, from: &StateSet, into: &mut StateSet) -> Result<bool> {
        let from = self.owned_bits(from)?;
        self.check_owner(into)?;
        Ok(self.pre(from, into.bits_mut()?))
    }

    fn initial_states(&self) -> StateSet {
        self.wrap(self.initial.clone())
    }

    fn find_deadlocked_states(&self, set: &mut StateSet) -> Result<()> {
        self.check_owner(set)?;
        let deadlocks = self.deadlocks();
        set.bits_mut()?.intersect_with(&deadlocks);
        Ok(())
    }

    fn tsccs_satisfying(&self, set: &mut StateSet, cancel: &CancelFlag) -> Result<()> {
        self.check_owner(set)?;
        let mut result = BitSet::new(self.num_states());
        {
            let p = set.bits()?;
            for members in self.terminal_sccs(cancel)? {
                if members.iter().all(|&s| p.contains(s)) {
                    for s in members {
                        result.insert(s);
                    }
                }
            }
        }
        *set = self.wrap(result);
        Ok(())
    }

    fn require_by_cols(&self) -> bool {
        self.by_cols();
        true
    }

    fn outgoing_counts(&self) -> Result<Vec<usize>> {
        Ok(self.successors.iter().map(Vec::len).collect())
    }

    fn incoming_edges(&self, state: usize) -> Result<&[usize]> {
        self.check_index(state)?;
        Ok(&self.by_cols()[state])
    }
}
