//! Progress reporting for fixpoint computations.
//!
//! Reporting is write-only: observers see every accumulator but cannot influence the loop.

use std::time::Duration;

use log::{debug, info};

use crate::bitset::BitSet;
use crate::dd::Ref;

/// Accumulator of one fixpoint round.
#[derive(Debug, Copy, Clone)]
pub enum Snapshot<'a> {
    Explicit(&'a BitSet),
    Symbolic(Ref),
}

pub trait FixpointObserver {
    /// Called with the accumulator after each round of `op`.
    fn iteration(&self, op: &str, round: usize, snapshot: Snapshot<'_>);

    /// Called once when `op` reaches its fixpoint. `nodes` is the diagram size, if any.
    fn finished(&self, op: &str, rounds: usize, elapsed: Duration, nodes: Option<usize>);
}

/// Discards everything.
#[derive(Debug, Default, Copy, Clone)]
pub struct NullObserver;

impl FixpointObserver for NullObserver {
    fn iteration(&self, _op: &str, _round: usize, _snapshot: Snapshot<'_>) {}

    fn finished(&self, _op: &str, _rounds: usize, _elapsed: Duration, _nodes: Option<usize>) {}
}

/// Writes rounds at `debug` and completion lines at `info` level.
#[derive(Debug, Default, Copy, Clone)]
pub struct LogObserver;

impl FixpointObserver for LogObserver {
    fn iteration(&self, op: &str, round: usize, snapshot: Snapshot<'_>) {
        match snapshot {
            Snapshot::Explicit(set) => debug!("{} round {}: {} states", op, round, set.len()),
            Snapshot::Symbolic(edge) => debug!("{} round {}: {}", op, round, edge),
        }
    }

    fn finished(&self, op: &str, rounds: usize, elapsed: Duration, nodes: Option<usize>) {
        match nodes {
            Some(nodes) => info!(
                "{} converged after {} rounds in {:.3}s ({} nodes)",
                op,
                rounds,
                elapsed.as_secs_f64(),
                nodes
            ),
            None => info!("{} converged after {} rounds in {:.3}s", op, rounds, elapsed.as_secs_f64()),
        }
    }
}
