//! Explicit and symbolic fixpoints must compute the same sets.
//!
//! Random graphs of at most 50 states are checked through both representations. The symbolic
//! result is compared by edge equality against the encoding of the explicit one.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use measure_rs::bitset::BitSet;
use measure_rs::cancel::CancelFlag;
use measure_rs::ctl::{CtlFunction, ExplicitCtl, Fixpoints, SymbolicCtl};
use measure_rs::dd::{Forest, Ref};
use measure_rs::graph::{Direction, ExplicitGraph, ReachabilityGraph, SymbolicGraph};
use measure_rs::report::{FixpointObserver, NullObserver, Snapshot};
use proptest::prelude::*;

struct Pair {
    explicit: ExplicitGraph,
    symbolic: SymbolicGraph,
}

impl Pair {
    fn new(n: usize, edges: &[(usize, usize)]) -> Self {
        let explicit = ExplicitGraph::new(n, [0], edges.iter().copied()).unwrap();
        let symbolic = SymbolicGraph::encode(&explicit, Rc::new(Forest::default())).unwrap();
        Pair { explicit, symbolic }
    }

    fn bits(&self, xs: &[usize]) -> BitSet {
        BitSet::from_indices(self.explicit.num_states(), xs.iter().copied())
    }

    fn edge(&self, xs: &[usize]) -> Ref {
        self.symbolic.from_indices(xs).unwrap().edge().unwrap()
    }

    fn agree(&self, bits: &BitSet, edge: Ref) -> bool {
        let indices: Vec<usize> = bits.iter().collect();
        self.edge(&indices) == edge
    }
}

fn graphs() -> impl Strategy<Value = (usize, Vec<(usize, usize)>, Vec<usize>, Vec<usize>)> {
    (1usize..=50).prop_flat_map(|n| {
        (
            Just(n),
            prop::collection::vec((0..n, 0..n), 0..=3 * n),
            prop::collection::vec(0..n, 0..=n),
            prop::collection::vec(0..n, 0..=n),
        )
    })
}

const FUNCTIONS: [&str; 17] = [
    "EX", "EY", "AX", "AY", "EF", "EP", "AF", "fair AF", "EG", "fair EG", "EH", "AG", "AH", "EU", "ES", "AU",
    "fair AU",
];

fn is_subset<F: Fixpoints>(ctl: &F, a: &F::Set, b: &F::Set) -> bool {
    ctl.is_empty(&ctl.difference(a, b).unwrap())
}

/// The universal operators against their existential definitions.
fn check_duals<F: Fixpoints>(ctl: &F, p: &F::Set, q: &F::Set) -> Result<(), TestCaseError> {
    let not_p = ctl.complement(p).unwrap();
    let not_q = ctl.complement(q).unwrap();
    let neither = ctl.intersection(&not_p, &not_q).unwrap();
    for dir in [Direction::Backward, Direction::Forward] {
        let ag = ctl.ag(dir, p).unwrap();
        let ef = ctl.ef(dir, &not_p).unwrap();
        prop_assert_eq!(&ag, &ctl.complement(&ef).unwrap());
        prop_assert!(ctl.is_empty(&ctl.intersection(&ag, &ef).unwrap()));

        let ax = ctl.ax(dir, p).unwrap();
        prop_assert_eq!(&ax, &ctl.complement(&ctl.ex(dir, &not_p).unwrap()).unwrap());

        for fair in [false, true] {
            let af = ctl.af(dir, p, fair).unwrap();
            let eg = ctl.eg(dir, &not_p, fair).unwrap();
            prop_assert_eq!(&af, &ctl.complement(&eg).unwrap(), "AF fair={}", fair);

            let au = ctl.au(dir, p, q, fair).unwrap();
            let escape = ctl.eu(dir, Some(&not_q), &neither).unwrap();
            let never = ctl.eg(dir, &not_q, fair).unwrap();
            let expected = ctl.complement(&ctl.union(&escape, &never).unwrap()).unwrap();
            prop_assert_eq!(&au, &expected, "AU fair={}", fair);
        }
    }

    // Going backward every state starts at least one maximal path.
    let af = ctl.af(Direction::Backward, q, false).unwrap();
    prop_assert!(is_subset(ctl, q, &af));
    prop_assert!(is_subset(ctl, &af, &ctl.ef(Direction::Backward, q).unwrap()));
    let au = ctl.au(Direction::Backward, p, q, false).unwrap();
    prop_assert!(is_subset(ctl, q, &au));
    prop_assert!(is_subset(ctl, &au, &ctl.eu(Direction::Backward, Some(p), q).unwrap()));
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn explicit_and_symbolic_agree((n, edges, p, q) in graphs()) {
        let pair = Pair::new(n, &edges);
        let cancel = CancelFlag::new();
        let explicit = ExplicitCtl::new(&pair.explicit, &cancel, &NullObserver);
        let symbolic = SymbolicCtl::new(&pair.symbolic, &cancel, &NullObserver);

        for name in FUNCTIONS {
            let function: CtlFunction = name.parse().unwrap();
            let (bits, edges) = if function.op.arity() == 1 {
                (vec![pair.bits(&p)], vec![pair.edge(&p)])
            } else {
                (vec![pair.bits(&p), pair.bits(&q)], vec![pair.edge(&p), pair.edge(&q)])
            };
            let a = explicit.apply(function, &bits).unwrap();
            let b = symbolic.apply(function, &edges).unwrap();
            prop_assert!(pair.agree(&a, b), "{} disagrees", name);
        }
    }

    #[test]
    fn aef_variants_agree((n, edges, p, q) in graphs()) {
        let pair = Pair::new(n, &edges);
        let cancel = CancelFlag::new();
        let explicit = ExplicitCtl::new(&pair.explicit, &cancel, &NullObserver);
        let symbolic = SymbolicCtl::new(&pair.symbolic, &cancel, &NullObserver);

        let (bp, bq) = (pair.bits(&p), pair.bits(&q));
        let attractor = explicit.aef_attractor(&bp, &bq).unwrap();
        let iterative = explicit.aef_iterative(&bp, &bq).unwrap();
        prop_assert_eq!(&attractor, &iterative);
        let sym = symbolic.aef_iterative(&pair.edge(&p), &pair.edge(&q)).unwrap();
        prop_assert!(pair.agree(&attractor, sym));
    }

    #[test]
    fn terminal_sccs_agree((n, edges, p, _q) in graphs()) {
        let pair = Pair::new(n, &edges);
        let cancel = CancelFlag::new();
        let explicit = ExplicitCtl::new(&pair.explicit, &cancel, &NullObserver);
        let symbolic = SymbolicCtl::new(&pair.symbolic, &cancel, &NullObserver);

        let all = explicit.tsccs_within(&explicit.full()).unwrap();
        prop_assert!(pair.agree(&all, symbolic.tsccs_within(&symbolic.full()).unwrap()));
        let within = explicit.tsccs_within(&pair.bits(&p)).unwrap();
        prop_assert!(pair.agree(&within, symbolic.tsccs_within(&pair.edge(&p)).unwrap()));
        prop_assert!(within.is_subset(&all));
        // Deadlocks are never part of a terminal SCC.
        prop_assert!(all.is_disjoint(&pair.explicit.deadlocks()));
    }

    #[test]
    fn universal_operators_are_duals((n, edges, p, q) in graphs()) {
        let pair = Pair::new(n, &edges);
        let cancel = CancelFlag::new();
        let explicit = ExplicitCtl::new(&pair.explicit, &cancel, &NullObserver);
        let symbolic = SymbolicCtl::new(&pair.symbolic, &cancel, &NullObserver);
        check_duals(&explicit, &pair.bits(&p), &pair.bits(&q))?;
        check_duals(&symbolic, &pair.edge(&p), &pair.edge(&q))?;
    }
}

/// Keeps every accumulator, per representation.
#[derive(Default)]
struct Recording {
    explicit: RefCell<Vec<(String, BitSet)>>,
    symbolic: RefCell<Vec<(String, Ref)>>,
}

impl FixpointObserver for Recording {
    fn iteration(&self, op: &str, _round: usize, snapshot: Snapshot<'_>) {
        match snapshot {
            Snapshot::Explicit(set) => self.explicit.borrow_mut().push((op.to_string(), set.clone())),
            Snapshot::Symbolic(edge) => self.symbolic.borrow_mut().push((op.to_string(), edge)),
        }
    }

    fn finished(&self, _op: &str, _rounds: usize, _elapsed: Duration, _nodes: Option<usize>) {}
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn explicit_accumulators_are_monotone((n, edges, p, q) in graphs()) {
        let pair = Pair::new(n, &edges);
        let cancel = CancelFlag::new();
        let recording = Recording::default();
        let ctl = ExplicitCtl::new(&pair.explicit, &cancel, &recording);
        let (p, q) = (pair.bits(&p), pair.bits(&q));

        ctl.eu(Direction::Backward, Some(&p), &q).unwrap();
        let rounds = recording.explicit.take();
        prop_assert!(rounds.iter().all(|(op, _)| op == "EU"));
        for w in rounds.windows(2) {
            prop_assert!(w[0].1.is_subset(&w[1].1));
        }

        ctl.unfair_eg(Direction::Backward, &p).unwrap();
        let rounds = recording.explicit.take();
        for w in rounds.windows(2) {
            prop_assert!(w[1].1.is_subset(&w[0].1));
        }
        prop_assert!(rounds.iter().all(|(_, set)| set.is_subset(&p)));
    }

    #[test]
    fn symbolic_accumulators_are_monotone((n, edges, p, q) in graphs()) {
        let pair = Pair::new(n, &edges);
        let cancel = CancelFlag::new();
        let recording = Recording::default();
        let ctl = SymbolicCtl::new(&pair.symbolic, &cancel, &recording);
        let forest = pair.symbolic.forest();
        let (p, q) = (pair.edge(&p), pair.edge(&q));

        for dir in [Direction::Backward, Direction::Forward] {
            let result = ctl.eu(dir, Some(&p), &q).unwrap();
            let rounds = recording.symbolic.take();
            prop_assert!(rounds.iter().all(|(op, _)| op == "EU" || op == "ES"));
            // Each round implies the next one.
            for w in rounds.windows(2) {
                prop_assert_eq!(forest.diff(w[0].1, w[1].1).unwrap(), Ref::ZERO);
            }
            prop_assert_eq!(forest.diff(q, result).unwrap(), Ref::ZERO);

            let result = ctl.unfair_eg(dir, &p).unwrap();
            let rounds = recording.symbolic.take();
            prop_assert!(rounds.iter().all(|(op, _)| op == "EG" || op == "EH"));
            // Each round is implied by the next one.
            for w in rounds.windows(2) {
                prop_assert_eq!(forest.diff(w[1].1, w[0].1).unwrap(), Ref::ZERO);
            }
            for (_, edge) in &rounds {
                prop_assert_eq!(forest.diff(*edge, p).unwrap(), Ref::ZERO);
            }
            prop_assert_eq!(forest.diff(result, p).unwrap(), Ref::ZERO);
        }
    }
}
