use std::time::Instant;

use log::debug;

use crate::bitset::BitSet;
use crate::cancel::CancelFlag;
use crate::ctl::Fixpoints;
use crate::error::{Error, Result};
use crate::graph::{Direction, ExplicitGraph, ReachabilityGraph};
use crate::report::{FixpointObserver, Snapshot};

/// CTL over bit sets of an [`ExplicitGraph`].
pub struct ExplicitCtl<'a> {
    graph: &'a ExplicitGraph,
    cancel: &'a CancelFlag,
    observer: &'a dyn FixpointObserver,
}

impl<'a> ExplicitCtl<'a> {
    pub fn new(graph: &'a ExplicitGraph, cancel: &'a CancelFlag, observer: &'a dyn FixpointObserver) -> Self {
        Self {
            graph,
            cancel,
            observer,
        }
    }

    pub fn graph(&self) -> &ExplicitGraph {
        self.graph
    }

    /// `AEF(p, q)` by backward attractor construction.
    ///
    /// Each state carries a counter: 1 for states in `p` (one good successor suffices), the
    /// out-degree otherwise (every successor must be good). Walking incoming edges from `q`
    /// decrements counters; a state joins the result when its counter reaches zero.
    pub fn aef_attractor(&self, p: &BitSet, q: &BitSet) -> Result<BitSet> {
        let start = Instant::now();
        if !self.graph.require_by_cols() {
            return Err(Error::engine("attractor needs an incoming-edge index"));
        }
        let mut counter = self.graph.outgoing_counts()?;
        for s in p {
            counter[s] = 1;
        }

        let mut result = q.clone();
        let mut worklist: Vec<usize> = q.iter().collect();
        let mut visited = 0usize;
        while let Some(t) = worklist.pop() {
            visited += 1;
            if visited % 1024 == 0 {
                self.cancel.check()?;
            }
            for &s in self.graph.incoming_edges(t)? {
                if result.contains(s) {
                    continue;
                }
                counter[s] = counter[s].saturating_sub(1);
                if counter[s] == 0 {
                    result.insert(s);
                    worklist.push(s);
                }
            }
        }
        debug!("attractor visited {} states", visited);
        self.observer.finished("AEF", 1, start.elapsed(), None);
        Ok(result)
    }
}

impl Fixpoints for ExplicitCtl<'_> {
    type Set = BitSet;

    fn empty(&self) -> BitSet {
        BitSet::new(self.graph.num_states())
    }

    fn full(&self) -> BitSet {
        BitSet::full(self.graph.num_states())
    }

    fn union(&self, a: &BitSet, b: &BitSet) -> Result<BitSet> {
        let mut r = a.clone();
        r.union_with(b);
        Ok(r)
    }

    fn intersection(&self, a: &BitSet, b: &BitSet) -> Result<BitSet> {
        let mut r = a.clone();
        r.intersect_with(b);
        Ok(r)
    }

    fn difference(&self, a: &BitSet, b: &BitSet) -> Result<BitSet> {
        let mut r = a.clone();
        r.difference_with(b);
        Ok(r)
    }

    fn complement(&self, a: &BitSet) -> Result<BitSet> {
        let mut r = a.clone();
        r.complement();
        Ok(r)
    }

    fn is_empty(&self, a: &BitSet) -> bool {
        a.is_empty()
    }

    fn step(&self, dir: Direction, a: &BitSet) -> Result<BitSet> {
        let mut r = self.empty();
        match dir {
            Direction::Forward => self.graph.post(a, &mut r),
            Direction::Backward => self.graph.pre(a, &mut r),
        };
        Ok(r)
    }

    fn grow(&self, acc: &mut BitSet, add: &BitSet) -> Result<bool> {
        let before = acc.len();
        acc.union_with(add);
        Ok(acc.len() != before)
    }

    fn shrink(&self, acc: &mut BitSet, keep: &BitSet) -> Result<bool> {
        let before = acc.len();
        acc.intersect_with(keep);
        Ok(acc.len() != before)
    }

    fn deadlocks(&self) -> Result<BitSet> {
        Ok(self.graph.deadlocks())
    }

    fn initial(&self) -> BitSet {
        self.graph.initial().clone()
    }

    fn tsccs_within(&self, p: &BitSet) -> Result<BitSet> {
        let mut result = self.empty();
        for members in self.graph.terminal_sccs(self.cancel)? {
            if members.iter().all(|&s| p.contains(s)) {
                for s in members {
                    result.insert(s);
                }
            }
        }
        Ok(result)
    }

    fn cancel(&self) -> &CancelFlag {
        self.cancel
    }

    fn observer(&self) -> &dyn FixpointObserver {
        self.observer
    }

    fn snapshot<'s>(&self, set: &'s BitSet) -> Snapshot<'s> {
        Snapshot::Explicit(set)
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::report::NullObserver;

    fn set(n: usize, xs: &[usize]) -> BitSet {
        BitSet::from_indices(n, xs.iter().copied())
    }

    fn cycle4() -> ExplicitGraph {
        ExplicitGraph::new(4, [0], [(0, 1), (1, 2), (2, 3), (3, 0)]).unwrap()
    }

    #[test]
    fn test_ex_both_directions() {
        let graph = cycle4();
        let cancel = CancelFlag::new();
        let ctl = ExplicitCtl::new(&graph, &cancel, &NullObserver);
        let p = set(4, &[0, 2]);
        assert_eq!(ctl.ex(Direction::Backward, &p).unwrap(), set(4, &[1, 3]));
        assert_eq!(ctl.ex(Direction::Forward, &p).unwrap(), set(4, &[1, 3]));
        assert_eq!(ctl.ex(Direction::Backward, &set(4, &[0])).unwrap(), set(4, &[3]));
        assert_eq!(ctl.ex(Direction::Forward, &set(4, &[0])).unwrap(), set(4, &[1]));
    }

    #[test]
    fn test_eg_on_cycle() {
        let graph = cycle4();
        let cancel = CancelFlag::new();
        let ctl = ExplicitCtl::new(&graph, &cancel, &NullObserver);
        let all = ctl.full();
        assert_eq!(ctl.unfair_eg(Direction::Backward, &all).unwrap(), all);
        assert_eq!(ctl.fair_eg(Direction::Backward, &all).unwrap(), all);
        assert!(ctl.unfair_eg(Direction::Backward, &set(4, &[0, 1, 2])).unwrap().is_empty());
    }

    #[test]
    fn test_eg_keeps_deadlock_paths() {
        // 0 -> 1 -> 2, 2 is a deadlock.
        let graph = ExplicitGraph::new(3, [0], [(0, 1), (1, 2)]).unwrap();
        let cancel = CancelFlag::new();
        let ctl = ExplicitCtl::new(&graph, &cancel, &NullObserver);
        let all = ctl.full();
        assert_eq!(ctl.unfair_eg(Direction::Backward, &all).unwrap(), all);
        assert!(ctl.fair_eg(Direction::Backward, &all).unwrap().is_empty());
        assert_eq!(ctl.unfair_eg(Direction::Backward, &set(3, &[0, 1])).unwrap(), set(3, &[]));
    }

    #[test]
    fn test_eh_keeps_initial_paths() {
        let graph = ExplicitGraph::new(3, [0], [(0, 1), (1, 2)]).unwrap();
        let cancel = CancelFlag::new();
        let ctl = ExplicitCtl::new(&graph, &cancel, &NullObserver);
        assert_eq!(ctl.unfair_eg(Direction::Forward, &ctl.full()).unwrap(), ctl.full());
        assert!(ctl.unfair_eg(Direction::Forward, &set(3, &[1, 2])).unwrap().is_empty());
    }

    #[test]
    fn test_eu_and_ef() {
        // 0 -> 1 -> 2 -> 3, 3 -> 3
        let graph = ExplicitGraph::new(4, [0], [(0, 1), (1, 2), (2, 3), (3, 3)]).unwrap();
        let cancel = CancelFlag::new();
        let ctl = ExplicitCtl::new(&graph, &cancel, &NullObserver);
        let q = set(4, &[3]);
        assert_eq!(ctl.ef(Direction::Backward, &q).unwrap(), ctl.full());
        assert_eq!(ctl.eu(Direction::Backward, Some(&set(4, &[1, 2])), &q).unwrap(), set(4, &[1, 2, 3]));
        assert_eq!(ctl.ef(Direction::Forward, &set(4, &[1])).unwrap(), set(4, &[1, 2, 3]));
    }

    #[test]
    fn test_universal_duals() {
        // 0 branches to 1 and 2; 1 loops; 2 loops.
        let graph = ExplicitGraph::new(3, [0], [(0, 1), (0, 2), (1, 1), (2, 2)]).unwrap();
        let cancel = CancelFlag::new();
        let ctl = ExplicitCtl::new(&graph, &cancel, &NullObserver);
        let p = set(3, &[1]);
        assert_eq!(ctl.ax(Direction::Backward, &p).unwrap(), set(3, &[1]));
        assert_eq!(ctl.af(Direction::Backward, &p, false).unwrap(), set(3, &[1]));
        assert_eq!(ctl.ag(Direction::Backward, &set(3, &[0, 1])).unwrap(), set(3, &[1]));
        let both = set(3, &[1, 2]);
        assert_eq!(ctl.af(Direction::Backward, &both, false).unwrap(), ctl.full());
        assert_eq!(ctl.au(Direction::Backward, &set(3, &[0]), &both, false).unwrap(), ctl.full());
    }

    #[test]
    fn test_aef_variants_agree() {
        // 0 is controlled and may pick 1 or 2. 3 is uncontrolled with successors 1 and 2.
        // 1 is the target; 2 loops.
        let graph = ExplicitGraph::new(4, [0], [(0, 1), (0, 2), (3, 1), (3, 2), (2, 2), (1, 1)]).unwrap();
        let cancel = CancelFlag::new();
        let ctl = ExplicitCtl::new(&graph, &cancel, &NullObserver);
        let p = set(4, &[0]);
        let q = set(4, &[1]);
        let expected = set(4, &[0, 1]);
        assert_eq!(ctl.aef_iterative(&p, &q).unwrap(), expected);
        assert_eq!(ctl.aef_attractor(&p, &q).unwrap(), expected);
    }

    #[test]
    fn test_cancelled_fixpoint() {
        let graph = cycle4();
        let cancel = CancelFlag::new();
        cancel.cancel();
        let ctl = ExplicitCtl::new(&graph, &cancel, &NullObserver);
        assert!(matches!(
            ctl.ef(Direction::Backward, &set(4, &[0])),
            Err(Error::Terminated)
        ));
    }
}
