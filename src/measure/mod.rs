//! Deferred measures and their dependency graph.
//!
//! A measure is created empty, receives its right-hand side through [`MeasureGraph::attach`],
//! waits for the measures it depends on, and is finally computed exactly once. Measures live
//! in an arena and refer to each other by [`MeasureId`]; completion is pushed to waiters, so
//! nothing is polled.
//!
//! ```text
//! Constructing ─attach─┬─> BlockedOnClassification ─hook─┐
//!                      ├─> BlockedOnSolve <──────────────┤
//!                      └─> Ready <───────────────────────┘
//!                            └─complete─> Computed
//! ```

use std::any::Any;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use log::{debug, warn};

use crate::error::{Error, Result};
use crate::model::ModelId;
use crate::registry::CategoryId;
use crate::value::Value;

pub mod scheduler;

pub use scheduler::{MeasureQueue, TimeOrderedQueue, UnorderedQueue};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct MeasureId(usize);

impl fmt::Display for MeasureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Lifecycle {
    Constructing,
    BlockedOnClassification,
    BlockedOnSolve,
    Ready,
    Computed,
}

/// Outcome of a classification hook.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Assignment {
    pub category: CategoryId,
    /// Replaces the measure's time if set.
    pub time: Option<f64>,
}

/// Receives the values of the classification dependencies, in declaration order.
pub type ClassifyHook = Box<dyn FnOnce(&[&Value]) -> Result<Assignment>>;

pub enum Classification {
    Known(CategoryId),
    Deferred { deps: Vec<MeasureId>, classify: ClassifyHook },
}

/// Everything attached to a measure once its expression is known.
pub struct MeasureDef {
    pub rhs: Rc<dyn Any>,
    pub classification: Classification,
    pub solve_deps: Vec<MeasureId>,
    pub time: Option<f64>,
}

impl MeasureDef {
    pub fn new(rhs: impl Any, category: CategoryId) -> Self {
        Self {
            rhs: Rc::new(rhs),
            classification: Classification::Known(category),
            solve_deps: Vec::new(),
            time: None,
        }
    }

    pub fn deferred(
        rhs: impl Any,
        deps: Vec<MeasureId>,
        classify: impl FnOnce(&[&Value]) -> Result<Assignment> + 'static,
    ) -> Self {
        Self {
            rhs: Rc::new(rhs),
            classification: Classification::Deferred {
                deps,
                classify: Box::new(classify),
            },
            solve_deps: Vec::new(),
            time: None,
        }
    }

    pub fn with_deps(mut self, deps: impl IntoIterator<Item = MeasureId>) -> Self {
        self.solve_deps.extend(deps);
        self
    }

    pub fn at(mut self, time: f64) -> Self {
        self.time = Some(time);
        self
    }
}

pub struct Measure {
    name: String,
    model: ModelId,
    /// `None` until classified.
    category: Option<CategoryId>,
    rhs: Option<Rc<dyn Any>>,
    time: Option<f64>,
    value: Option<Value>,
    class_deps: Vec<MeasureId>,
    solve_deps: Vec<MeasureId>,
    classify: Option<ClassifyHook>,
    waiters: Vec<MeasureId>,
    state: Lifecycle,
    diagnostic: Option<String>,
}

impl Measure {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn model(&self) -> ModelId {
        self.model
    }

    pub fn category(&self) -> Option<CategoryId> {
        self.category
    }

    pub fn rhs(&self) -> Option<&dyn Any> {
        self.rhs.as_deref()
    }

    pub fn time(&self) -> Option<f64> {
        self.time
    }

    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    pub fn state(&self) -> Lifecycle {
        self.state
    }

    pub fn classification_deps(&self) -> &[MeasureId] {
        &self.class_deps
    }

    pub fn solve_deps(&self) -> &[MeasureId] {
        &self.solve_deps
    }

    /// One line captured when the measure failed.
    pub fn diagnostic(&self) -> Option<&str> {
        self.diagnostic.as_deref()
    }
}

impl fmt::Debug for Measure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Measure")
            .field("name", &self.name)
            .field("model", &self.model)
            .field("category", &self.category)
            .field("state", &self.state)
            .field("value", &self.value)
            .finish()
    }
}

#[derive(Debug, Default)]
pub struct MeasureGraph {
    measures: Vec<Measure>,
}

impl MeasureGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.measures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.measures.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = MeasureId> {
        (0..self.measures.len()).map(MeasureId)
    }

    pub fn create(&mut self, name: impl Into<String>, model: ModelId) -> MeasureId {
        let id = MeasureId(self.measures.len());
        self.measures.push(Measure {
            name: name.into(),
            model,
            category: None,
            rhs: None,
            time: None,
            value: None,
            class_deps: Vec::new(),
            solve_deps: Vec::new(),
            classify: None,
            waiters: Vec::new(),
            state: Lifecycle::Constructing,
            diagnostic: None,
        });
        id
    }

    pub fn get(&self, id: MeasureId) -> Result<&Measure> {
        self.measures
            .get(id.0)
            .ok_or_else(|| Error::assertion(format!("unknown measure {}", id)))
    }

    fn get_mut(&mut self, id: MeasureId) -> Result<&mut Measure> {
        self.measures
            .get_mut(id.0)
            .ok_or_else(|| Error::assertion(format!("unknown measure {}", id)))
    }

    /// Lifecycle state; unknown ids read as `Constructing`.
    pub fn state(&self, id: MeasureId) -> Lifecycle {
        self.get(id).map_or(Lifecycle::Constructing, |m| m.state)
    }

    pub fn is_computed(&self, id: MeasureId) -> bool {
        self.state(id) == Lifecycle::Computed
    }

    pub fn value(&self, id: MeasureId) -> Option<&Value> {
        self.get(id).ok().and_then(|m| m.value.as_ref())
    }

    pub fn category(&self, id: MeasureId) -> Option<CategoryId> {
        self.get(id).ok().and_then(|m| m.category)
    }

    pub fn model(&self, id: MeasureId) -> Option<ModelId> {
        self.get(id).ok().map(|m| m.model)
    }

    pub fn time(&self, id: MeasureId) -> Option<f64> {
        self.get(id).ok().and_then(|m| m.time)
    }

    /// Attaches the right-hand side and dependencies of a measure under construction.
    pub fn attach(&mut self, id: MeasureId, def: MeasureDef) -> Result<()> {
        let MeasureDef {
            rhs,
            classification,
            solve_deps,
            time,
        } = def;
        let (category, class_deps, classify) = match classification {
            Classification::Known(category) => (Some(category), Vec::new(), None),
            Classification::Deferred { deps, classify } => (None, deps, Some(classify)),
        };
        for &dep in class_deps.iter().chain(&solve_deps) {
            self.get(dep)?;
        }

        let measure = self.get_mut(id)?;
        if measure.state != Lifecycle::Constructing {
            return Err(Error::assertion(format!(
                "measure `{}` already has a right-hand side",
                measure.name
            )));
        }
        measure.rhs = Some(rhs);
        measure.category = category;
        measure.time = time;
        measure.classify = classify;
        measure.class_deps = class_deps.clone();
        measure.solve_deps = solve_deps.clone();
        // Leaves Constructing; the rescan below picks the real state.
        measure.state = Lifecycle::BlockedOnSolve;

        for dep in class_deps.into_iter().chain(solve_deps) {
            let dep = self.get_mut(dep)?;
            if dep.state != Lifecycle::Computed && !dep.waiters.contains(&id) {
                dep.waiters.push(id);
            }
        }
        self.settle(VecDeque::from([id]));
        Ok(())
    }

    /// Re-evaluates `start` and everything unblocked by it, in notification order.
    fn settle(&mut self, mut pending: VecDeque<MeasureId>) {
        while let Some(id) = pending.pop_front() {
            if let Some(waiters) = self.rescan(id) {
                pending.extend(waiters);
            }
        }
    }

    /// Advances one measure as far as its dependencies allow.
    ///
    /// Returns the waiters to notify if the measure got completed on the way (a failing
    /// classification hook).
    fn rescan(&mut self, id: MeasureId) -> Option<Vec<MeasureId>> {
        let measure = &self.measures[id.0];
        match measure.state {
            Lifecycle::Constructing | Lifecycle::Computed => return None,
            _ => {}
        }

        if measure.category.is_none() {
            let classified = measure
                .class_deps
                .iter()
                .all(|d| self.measures[d.0].state == Lifecycle::Computed);
            if !classified {
                self.measures[id.0].state = Lifecycle::BlockedOnClassification;
                return None;
            }
            let classify = self.measures[id.0].classify.take();
            let measure = &self.measures[id.0];
            let values: Vec<&Value> = measure
                .class_deps
                .iter()
                .filter_map(|d| self.measures[d.0].value.as_ref())
                .collect();
            let outcome = match classify {
                Some(classify) => classify(&values),
                None => Err(Error::assertion("measure has neither a category nor a classification hook")),
            };
            match outcome {
                Ok(assignment) => {
                    let measure = &mut self.measures[id.0];
                    debug!("classified `{}` as {:?}", measure.name, assignment.category);
                    measure.category = Some(assignment.category);
                    if assignment.time.is_some() {
                        measure.time = assignment.time;
                    }
                }
                Err(err) => return Some(self.finish(id, Value::Null, Some(err))),
            }
        }

        let measure = &self.measures[id.0];
        let ready = measure.solve_deps.iter().all(|d| self.measures[d.0].state == Lifecycle::Computed);
        self.measures[id.0].state = if ready {
            Lifecycle::Ready
        } else {
            Lifecycle::BlockedOnSolve
        };
        None
    }

    fn finish(&mut self, id: MeasureId, value: Value, err: Option<Error>) -> Vec<MeasureId> {
        let measure = &mut self.measures[id.0];
        if let Some(err) = err {
            let line = format!("{}: {}", measure.name, err);
            warn!("measure {}", line);
            measure.diagnostic = Some(line);
        }
        measure.value = Some(value);
        measure.state = Lifecycle::Computed;
        measure.classify = None;
        std::mem::take(&mut measure.waiters)
    }

    /// Stores the outcome of a measure and notifies its waiters.
    ///
    /// A failure completes the measure as [`Value::Null`] with a diagnostic line. Completing a
    /// computed measure again is a no-op.
    pub fn complete(&mut self, id: MeasureId, outcome: Result<Value>) -> Result<()> {
        let measure = self.get(id)?;
        if measure.state == Lifecycle::Computed {
            return Ok(());
        }
        if measure.state == Lifecycle::Constructing {
            return Err(Error::assertion(format!("measure `{}` has no right-hand side", measure.name)));
        }
        let waiters = match outcome {
            Ok(value) => self.finish(id, value, None),
            Err(err) => self.finish(id, Value::Null, Some(err)),
        };
        self.settle(waiters.into());
        Ok(())
    }

    /// Completes a measure as failed even if it never got a right-hand side.
    pub(crate) fn fail(&mut self, id: MeasureId, err: Error) -> Result<()> {
        if self.get(id)?.state == Lifecycle::Computed {
            return Ok(());
        }
        let waiters = self.finish(id, Value::Null, Some(err));
        self.settle(waiters.into());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use test_log::test;

    use super::*;
    use crate::registry::{CallingForm, EngineRegistry};

    fn categories() -> (CategoryId, CategoryId) {
        let mut registry = EngineRegistry::new();
        let a = registry.register_category("steady", "", CallingForm::SingleMeasure).unwrap();
        let b = registry.register_category("transient", "", CallingForm::SingleMeasure).unwrap();
        (a, b)
    }

    #[test]
    fn test_known_category_without_deps_is_ready() {
        let (cat, _) = categories();
        let mut graph = MeasureGraph::new();
        let m = graph.create("m", ModelId(0));
        assert_eq!(graph.state(m), Lifecycle::Constructing);
        graph.attach(m, MeasureDef::new((), cat)).unwrap();
        assert_eq!(graph.state(m), Lifecycle::Ready);
        assert!(graph.attach(m, MeasureDef::new((), cat)).is_err());
    }

    #[test]
    fn test_solve_dependencies_unblock() {
        let (cat, _) = categories();
        let mut graph = MeasureGraph::new();
        let c = graph.create("c", ModelId(0));
        let b = graph.create("b", ModelId(0));
        let a = graph.create("a", ModelId(0));
        graph.attach(a, MeasureDef::new((), cat).with_deps([b])).unwrap();
        graph.attach(b, MeasureDef::new((), cat).with_deps([c])).unwrap();
        graph.attach(c, MeasureDef::new((), cat)).unwrap();
        assert_eq!(graph.state(a), Lifecycle::BlockedOnSolve);
        assert_eq!(graph.state(b), Lifecycle::BlockedOnSolve);
        assert_eq!(graph.state(c), Lifecycle::Ready);

        graph.complete(c, Ok(Value::Real(1.0))).unwrap();
        assert_eq!(graph.state(b), Lifecycle::Ready);
        assert_eq!(graph.state(a), Lifecycle::BlockedOnSolve);
        graph.complete(b, Ok(Value::Real(2.0))).unwrap();
        assert_eq!(graph.state(a), Lifecycle::Ready);
    }

    #[test]
    fn test_classification_fires_once() {
        let (steady, transient) = categories();
        let mut graph = MeasureGraph::new();
        let t = graph.create("t", ModelId(0));
        let m = graph.create("m", ModelId(0));
        let fired = Rc::new(Cell::new(0));
        let counter = fired.clone();
        let def = MeasureDef::deferred((), vec![t], move |values: &[&Value]| {
            counter.set(counter.get() + 1);
            let time = values[0].as_real()?;
            let category = if time.is_infinite() { steady } else { transient };
            Ok(Assignment {
                category,
                time: Some(time),
            })
        });
        graph.attach(m, def).unwrap();
        assert_eq!(graph.state(m), Lifecycle::BlockedOnClassification);
        assert_eq!(graph.category(m), None);

        graph.attach(t, MeasureDef::new((), steady)).unwrap();
        graph.complete(t, Ok(Value::Real(2.5))).unwrap();
        assert_eq!(fired.get(), 1);
        assert_eq!(graph.category(m), Some(transient));
        assert_eq!(graph.time(m), Some(2.5));
        assert_eq!(graph.state(m), Lifecycle::Ready);

        graph.complete(m, Ok(Value::Bool(true))).unwrap();
        graph.complete(m, Ok(Value::Bool(false))).unwrap();
        assert_eq!(graph.value(m), Some(&Value::Bool(true)));
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn test_failed_classification_completes_as_null() {
        let (cat, _) = categories();
        let mut graph = MeasureGraph::new();
        let t = graph.create("t", ModelId(0));
        let m = graph.create("m", ModelId(0));
        let after = graph.create("after", ModelId(0));
        graph
            .attach(m, MeasureDef::deferred((), vec![t], |_: &[&Value]| Err(Error::engine("bad time"))))
            .unwrap();
        graph.attach(after, MeasureDef::new((), cat).with_deps([m])).unwrap();
        graph.attach(t, MeasureDef::new((), cat)).unwrap();
        graph.complete(t, Ok(Value::Null)).unwrap();

        assert_eq!(graph.state(m), Lifecycle::Computed);
        assert_eq!(graph.value(m), Some(&Value::Null));
        assert_eq!(graph.get(m).unwrap().diagnostic(), Some("m: engine failed: bad time"));
        assert_eq!(graph.state(after), Lifecycle::Ready);
    }

    #[test]
    fn test_failure_unblocks_dependents() {
        let (cat, _) = categories();
        let mut graph = MeasureGraph::new();
        let b = graph.create("b", ModelId(0));
        let a = graph.create("a", ModelId(0));
        graph.attach(b, MeasureDef::new((), cat)).unwrap();
        graph.attach(a, MeasureDef::new((), cat).with_deps([b])).unwrap();
        graph.complete(b, Err(Error::engine("diverged"))).unwrap();
        assert_eq!(graph.value(b), Some(&Value::Null));
        assert_eq!(graph.state(a), Lifecycle::Ready);
    }

    #[test]
    fn test_unknown_dependency() {
        let (cat, _) = categories();
        let mut graph = MeasureGraph::new();
        let a = graph.create("a", ModelId(0));
        let res = graph.attach(a, MeasureDef::new((), cat).with_deps([MeasureId(7)]));
        assert!(matches!(res, Err(Error::AssertionFailure(_))));
        assert_eq!(graph.state(a), Lifecycle::Constructing);
        assert!(graph.complete(a, Ok(Value::Null)).is_err());
    }
}
