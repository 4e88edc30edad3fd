//! Reachability measures.

use std::cell::{Cell, RefCell};

use log::debug;

use crate::error::{Error, Result};
use crate::graph::{Direction, GraphId, ReachabilityGraph, StateSet};
use crate::registry::{Algorithm, CallingForm, CategoryId, FunctionCall, MeasureRequest, ModelType};
use crate::value::Value;

/// Right-hand side of a `reachable` measure: every state reachable from the initial ones.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct Reachable;

/// Computes [`Reachable`] as `EP initial` through the `ctl` category.
#[derive(Debug)]
pub struct ReachClosure {
    ctl: CategoryId,
}

impl ReachClosure {
    pub fn new(ctl: CategoryId) -> Self {
        Self { ctl }
    }
}

impl Algorithm for ReachClosure {
    fn applies_to(&self, _model_type: ModelType) -> bool {
        true
    }

    fn calling_form(&self) -> CallingForm {
        CallingForm::SingleMeasure
    }

    fn solve(&self, request: &MeasureRequest<'_>) -> Result<Value> {
        request.rhs::<Reachable>()?;
        let graph = request.model.primary_graph()?;
        let args = [Value::StateSet(graph.initial_states())];
        let call = FunctionCall {
            model: request.model,
            function: "EP",
            args: &args,
            ctx: request.ctx,
        };
        request.ctx.registry.run_function(self.ctl, &call)
    }
}

/// Right-hand side of a `bounded_reach` measure. The bound is the measure's time.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct BoundedReach;

#[derive(Debug)]
struct Progress {
    graph: GraphId,
    steps: usize,
    reached: StateSet,
    frontier: StateSet,
}

/// States reachable in at most `t` steps, for a batch of bounds `t`.
///
/// The exploration is kept between measures and only moves forward. A request with a bound
/// below the steps already taken restarts from the initial states, so batches should arrive in
/// non-decreasing time order.
#[derive(Debug, Default)]
pub struct IncrementalReach {
    progress: RefCell<Option<Progress>>,
    restarts: Cell<usize>,
}

impl IncrementalReach {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times the exploration had to start over.
    pub fn restarts(&self) -> usize {
        self.restarts.get()
    }

    fn bound(request: &MeasureRequest<'_>) -> Result<usize> {
        let time = request.time.unwrap_or(0.0);
        if !time.is_finite() || time < 0.0 {
            return Err(Error::engine(format!("invalid step bound {}", time)));
        }
        Ok(time.floor() as usize)
    }

    fn advance(&self, request: &MeasureRequest<'_>) -> Result<Value> {
        request.rhs::<BoundedReach>()?;
        let bound = Self::bound(request)?;
        let graph = request.model.primary_graph()?;

        let mut progress = self.progress.borrow_mut();
        let restart = match &*progress {
            Some(p) => p.graph != graph.id() || p.steps > bound,
            None => true,
        };
        if restart {
            if let Some(p) = &*progress {
                self.restarts.set(self.restarts.get() + 1);
                debug!("bounded reach restarts: bound {} after {} steps", bound, p.steps);
            }
            let initial = graph.initial_states();
            *progress = Some(Progress {
                graph: graph.id(),
                steps: 0,
                reached: initial.clone(),
                frontier: initial,
            });
        }
        let p = progress
            .as_mut()
            .ok_or_else(|| Error::assertion("bounded reach lost its progress"))?;

        while p.steps < bound && !graph.is_empty(&p.frontier)? {
            request.ctx.cancel.check()?;
            let image = graph.step(Direction::Forward, &p.frontier)?;
            let next = graph.difference(&image, &p.reached)?;
            p.reached = graph.union(&p.reached, &next)?;
            p.frontier = next;
            p.steps += 1;
        }
        Ok(Value::StateSet(p.reached.clone()))
    }
}

impl Algorithm for IncrementalReach {
    fn applies_to(&self, _model_type: ModelType) -> bool {
        true
    }

    fn calling_form(&self) -> CallingForm {
        CallingForm::GroupedMeasures
    }

    fn solve_group(&self, requests: &[MeasureRequest<'_>]) -> Result<Vec<Result<Value>>> {
        Ok(requests.iter().map(|request| self.advance(request)).collect())
    }
}
