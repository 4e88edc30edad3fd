use crate::cancel::CancelFlag;
use crate::ctl::Fixpoints;
use crate::dd::{Forest, Ref};
use crate::error::Result;
use crate::graph::{Direction, SymbolicGraph};
use crate::report::{FixpointObserver, Snapshot};

/// CTL over decision-diagram edges of a [`SymbolicGraph`].
///
/// Set equality is edge equality, so every fixpoint test is a constant-time comparison.
pub struct SymbolicCtl<'a> {
    graph: &'a SymbolicGraph,
    cancel: &'a CancelFlag,
    observer: &'a dyn FixpointObserver,
}

impl<'a> SymbolicCtl<'a> {
    pub fn new(graph: &'a SymbolicGraph, cancel: &'a CancelFlag, observer: &'a dyn FixpointObserver) -> Self {
        Self {
            graph,
            cancel,
            observer,
        }
    }

    fn forest(&self) -> &Forest {
        self.graph.forest()
    }
}

impl Fixpoints for SymbolicCtl<'_> {
    type Set = Ref;

    fn empty(&self) -> Ref {
        Ref::ZERO
    }

    fn full(&self) -> Ref {
        self.graph.universe()
    }

    fn union(&self, a: &Ref, b: &Ref) -> Result<Ref> {
        self.forest().or(*a, *b)
    }

    fn intersection(&self, a: &Ref, b: &Ref) -> Result<Ref> {
        self.forest().and(*a, *b)
    }

    fn difference(&self, a: &Ref, b: &Ref) -> Result<Ref> {
        self.forest().diff(*a, *b)
    }

    fn complement(&self, a: &Ref) -> Result<Ref> {
        self.forest().diff(self.graph.universe(), *a)
    }

    fn is_empty(&self, a: &Ref) -> bool {
        *a == Ref::ZERO
    }

    fn step(&self, dir: Direction, a: &Ref) -> Result<Ref> {
        match dir {
            Direction::Forward => self.graph.post_image(*a),
            Direction::Backward => self.graph.pre_image(*a),
        }
    }

    fn grow(&self, acc: &mut Ref, add: &Ref) -> Result<bool> {
        let next = self.forest().or(*acc, *add)?;
        let changed = next != *acc;
        *acc = next;
        Ok(changed)
    }

    fn shrink(&self, acc: &mut Ref, keep: &Ref) -> Result<bool> {
        let next = self.forest().and(*acc, *keep)?;
        let changed = next != *acc;
        *acc = next;
        Ok(changed)
    }

    fn deadlocks(&self) -> Result<Ref> {
        self.graph.deadlocks()
    }

    fn initial(&self) -> Ref {
        self.graph.initial()
    }

    fn tsccs_within(&self, p: &Ref) -> Result<Ref> {
        self.graph.terminal_sccs_within(*p, self.cancel)
    }

    fn cancel(&self) -> &CancelFlag {
        self.cancel
    }

    fn observer(&self) -> &dyn FixpointObserver {
        self.observer
    }

    fn snapshot<'s>(&self, set: &'s Ref) -> Snapshot<'s> {
        Snapshot::Symbolic(*set)
    }

    fn nodes(&self, set: &Ref) -> Option<usize> {
        Some(self.forest().node_count(*set))
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use test_log::test;

    use super::*;
    use crate::ctl::{CtlFunction, CtlOp};
    use crate::error::Error;
    use crate::report::NullObserver;

    fn states(graph: &SymbolicGraph, xs: &[usize]) -> Ref {
        let forest = graph.forest();
        xs.iter()
            .fold(Ref::ZERO, |acc, &s| forest.or(acc, graph.state(s).unwrap()).unwrap())
    }

    fn cycle4() -> SymbolicGraph {
        SymbolicGraph::from_edges(Rc::new(Forest::default()), 4, [0], [(0, 1), (1, 2), (2, 3), (3, 0)]).unwrap()
    }

    #[test]
    fn test_ex_on_cycle() {
        let graph = cycle4();
        let cancel = CancelFlag::new();
        let ctl = SymbolicCtl::new(&graph, &cancel, &NullObserver);
        let p = states(&graph, &[0, 2]);
        let expected = states(&graph, &[1, 3]);
        assert_eq!(ctl.ex(Direction::Backward, &p).unwrap(), expected);
        assert_eq!(ctl.ex(Direction::Forward, &p).unwrap(), expected);
    }

    #[test]
    fn test_eg_on_cycle() {
        let graph = cycle4();
        let cancel = CancelFlag::new();
        let ctl = SymbolicCtl::new(&graph, &cancel, &NullObserver);
        let all = ctl.full();
        assert_eq!(ctl.unfair_eg(Direction::Backward, &all).unwrap(), all);
        assert_eq!(ctl.fair_eg(Direction::Backward, &all).unwrap(), all);
    }

    #[test]
    fn test_partial_universe() {
        // Five states on three bits; codes 5..8 must never show up in results.
        let graph = SymbolicGraph::from_edges(
            Rc::new(Forest::default()),
            5,
            [0],
            [(0, 1), (1, 2), (2, 3), (3, 4)],
        )
        .unwrap();
        let cancel = CancelFlag::new();
        let ctl = SymbolicCtl::new(&graph, &cancel, &NullObserver);
        let q = states(&graph, &[4]);
        assert_eq!(ctl.ef(Direction::Backward, &q).unwrap(), ctl.full());
        assert_eq!(ctl.complement(&ctl.full()).unwrap(), Ref::ZERO);
        assert_eq!(ctl.deadlocks().unwrap(), q);
        // The deadlock keeps the whole chain in EG.
        assert_eq!(ctl.unfair_eg(Direction::Backward, &ctl.full()).unwrap(), ctl.full());
    }

    #[test]
    fn test_apply_arity() {
        let graph = cycle4();
        let cancel = CancelFlag::new();
        let ctl = SymbolicCtl::new(&graph, &cancel, &NullObserver);
        let f = CtlFunction::new(CtlOp::EU, Direction::Backward);
        assert!(matches!(ctl.apply(f, &[Ref::ONE]), Err(Error::EngineFailed(_))));
        let p = states(&graph, &[1]);
        let r = ctl.apply(f, &[ctl.full(), p]).unwrap();
        assert_eq!(r, ctl.full());
    }
}
