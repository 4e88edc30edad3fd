//! Process wiring: the finalized registry, the models and their measures.

use std::collections::BTreeSet;
use std::fmt;

use log::{debug, info, warn};

use crate::cancel::CancelFlag;
use crate::error::{Error, Result};
use crate::measure::{Lifecycle, MeasureDef, MeasureGraph, MeasureId, MeasureQueue};
use crate::model::{Model, ModelId};
use crate::registry::{CallingForm, CategoryId, EngineRegistry, FunctionCall, MeasureRequest, RunContext, Settings};
use crate::report::{FixpointObserver, LogObserver, NullObserver};
use crate::value::Value;

/// Outcome of [`Session::solve_batch`].
#[derive(Debug, Default, Clone, PartialEq)]
pub struct BatchSummary {
    /// Measures of the batch computed to a value.
    pub computed: usize,
    /// Measures of the batch that failed, with their diagnostic line.
    pub failed: Vec<(MeasureId, String)>,
    /// Configuration and resource errors met on the way, each reported once.
    pub errors: Vec<Error>,
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} computed, {} failed, {} errors",
            self.computed,
            self.failed.len(),
            self.errors.len()
        )
    }
}

pub struct Session {
    registry: EngineRegistry,
    settings: Settings,
    models: Vec<Model>,
    measures: MeasureGraph,
    cancel: CancelFlag,
    observer: Box<dyn FixpointObserver>,
}

impl Session {
    /// Finalizes `registry` with `settings` unless that already happened.
    pub fn new(mut registry: EngineRegistry, settings: Settings) -> Result<Self> {
        if !registry.is_finalized() {
            registry.finalize(&settings)?;
        }
        let observer: Box<dyn FixpointObserver> = if settings.report.fixpoints {
            Box::new(LogObserver)
        } else {
            Box::new(NullObserver)
        };
        Ok(Self {
            registry,
            settings,
            models: Vec::new(),
            measures: MeasureGraph::new(),
            cancel: CancelFlag::new(),
            observer,
        })
    }

    pub fn with_observer(mut self, observer: Box<dyn FixpointObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn registry(&self) -> &EngineRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// A handle on the cancellation flag; raising it stops the running batch.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn add_model(&mut self, model: Model) -> ModelId {
        let id = ModelId(self.models.len());
        debug!("model {} is `{}` ({})", id, model.name(), model.model_type());
        self.models.push(model);
        id
    }

    pub fn model(&self, id: ModelId) -> Result<&Model> {
        self.models
            .get(id.0)
            .ok_or_else(|| Error::assertion(format!("unknown model {}", id)))
    }

    /// Runs a whole-model algorithm, typically state-space generation.
    pub fn process_model(&mut self, id: ModelId, category: CategoryId) -> Result<()> {
        let model = self
            .models
            .get_mut(id.0)
            .ok_or_else(|| Error::assertion(format!("unknown model {}", id)))?;
        let ctx = RunContext {
            registry: &self.registry,
            settings: &self.settings,
            cancel: &self.cancel,
            observer: &*self.observer,
        };
        self.registry.run_model(category, model, &ctx)
    }

    /// Invokes a function-call algorithm directly.
    pub fn call(&self, model: ModelId, category: CategoryId, function: &str, args: &[Value]) -> Result<Value> {
        let ctx = self.context();
        let call = FunctionCall {
            model: self.model(model)?,
            function,
            args,
            ctx: &ctx,
        };
        self.registry.run_function(category, &call)
    }

    fn context(&self) -> RunContext<'_> {
        RunContext {
            registry: &self.registry,
            settings: &self.settings,
            cancel: &self.cancel,
            observer: &*self.observer,
        }
    }

    pub fn measures(&self) -> &MeasureGraph {
        &self.measures
    }

    pub fn create_measure(&mut self, name: impl Into<String>, model: ModelId) -> Result<MeasureId> {
        self.model(model)?;
        Ok(self.measures.create(name, model))
    }

    pub fn attach(&mut self, id: MeasureId, def: MeasureDef) -> Result<()> {
        self.measures.attach(id, def)
    }

    /// Creates and attaches in one step.
    pub fn define(&mut self, name: impl Into<String>, model: ModelId, def: MeasureDef) -> Result<MeasureId> {
        let id = self.create_measure(name, model)?;
        self.attach(id, def)?;
        Ok(id)
    }

    /// Solves `id` and everything it depends on. A computed measure is left alone.
    ///
    /// Algorithm failures complete the measure as `undefined` and return `Ok`. Configuration and
    /// resource errors complete it as well but are returned. Cancellation leaves it pending.
    pub fn solve(&mut self, id: MeasureId) -> Result<()> {
        let mut stack = Vec::new();
        self.solve_rec(id, &mut stack)
    }

    fn solve_rec(&mut self, id: MeasureId, stack: &mut Vec<MeasureId>) -> Result<()> {
        match self.measures.get(id)?.state() {
            Lifecycle::Computed => return Ok(()),
            Lifecycle::Constructing => {
                return self.measures.fail(id, Error::assertion("measure has no right-hand side"));
            }
            _ => {}
        }
        if stack.contains(&id) {
            let cycle = stack
                .iter()
                .chain(std::iter::once(&id))
                .map(|m| self.measures.get(*m).map_or("?", |m| m.name()))
                .collect::<Vec<_>>()
                .join(" -> ");
            return self.measures.fail(id, Error::assertion(format!("cyclic dependency {}", cycle)));
        }
        self.cancel.check()?;

        stack.push(id);
        let class_deps = self.measures.get(id)?.classification_deps().to_vec();
        for dep in class_deps {
            self.solve_rec(dep, stack)?;
        }
        // Classification may only now have taken place.
        let solve_deps = self.measures.get(id)?.solve_deps().to_vec();
        for dep in solve_deps {
            self.solve_rec(dep, stack)?;
        }
        stack.pop();

        match self.measures.state(id) {
            Lifecycle::Computed => Ok(()),
            Lifecycle::Ready => self.dispatch(&[id]),
            state => {
                let err = Error::assertion(format!("measure is {:?} after solving its dependencies", state));
                self.measures.fail(id, err)
            }
        }
    }

    /// Solves `id` and returns its value. The algorithm runs at most once per measure.
    pub fn compute(&mut self, id: MeasureId) -> Result<Value> {
        self.solve(id)?;
        self.measures
            .value(id)
            .cloned()
            .ok_or_else(|| Error::assertion(format!("measure {} has no value after solving", id)))
    }

    /// Runs the algorithm of ready measures sharing one category and model.
    fn dispatch(&mut self, group: &[MeasureId]) -> Result<()> {
        let Some(&first) = group.first() else {
            return Ok(());
        };
        let outcomes = self.run_algorithm(first, group);
        let outcomes = match outcomes {
            Ok(outcomes) => outcomes,
            Err(err) => group.iter().map(|_| Err(err.clone())).collect(),
        };

        let mut surfaced = None;
        for (&id, outcome) in group.iter().zip(outcomes) {
            match outcome {
                Err(Error::Terminated) => return Err(Error::Terminated),
                Err(err) if !err.is_measure_local() => {
                    self.measures.complete(id, Err(err.clone()))?;
                    if surfaced.is_none() {
                        surfaced = Some(err);
                    }
                }
                outcome => self.measures.complete(id, outcome)?,
            }
        }
        match surfaced {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn run_algorithm(&self, first: MeasureId, group: &[MeasureId]) -> Result<Vec<Result<Value>>> {
        let category = self
            .measures
            .category(first)
            .ok_or_else(|| Error::assertion("measure is not classified"))?;
        let form = self.registry.category(category)?.calling_form();
        let ctx = self.context();

        let mut requests = Vec::with_capacity(group.len());
        for &id in group {
            let measure = self.measures.get(id)?;
            let rhs = measure
                .rhs()
                .ok_or_else(|| Error::assertion(format!("measure `{}` has no right-hand side", measure.name())))?;
            requests.push(MeasureRequest {
                id,
                name: measure.name(),
                model: self.model(measure.model())?,
                rhs,
                time: measure.time(),
                measures: &self.measures,
                ctx: &ctx,
            });
        }

        match form {
            CallingForm::SingleMeasure => Ok(requests
                .iter()
                .map(|request| self.registry.run_measure(category, request))
                .collect()),
            CallingForm::GroupedMeasures => self.registry.run_grouped(category, &requests),
            other => Err(Error::CallMismatch {
                category: self.registry.category(category)?.name().to_string(),
                expected: other,
                got: CallingForm::SingleMeasure,
            }),
        }
    }

    /// Drains `queue`, solving every measure in it.
    ///
    /// Measures of grouped categories are handed over together with the ready measures that
    /// follow them in the queue and share their category and model. When only blocked
    /// entries remain, the first one is solved recursively. Cancellation aborts the batch.
    pub fn solve_batch(&mut self, queue: &mut dyn MeasureQueue) -> Result<BatchSummary> {
        let mut summary = BatchSummary::default();
        let mut seen = BTreeSet::new();

        loop {
            self.cancel.check()?;
            let Some(id) = queue.pop(&self.measures) else {
                match queue.blocked().first() {
                    Some(&blocked) => {
                        debug!("nothing ready, solving {} recursively", blocked);
                        seen.insert(blocked);
                        let res = self.solve(blocked);
                        Self::record(&mut summary, res)?;
                        if !self.measures.is_computed(blocked) {
                            warn!("dropping {} from the batch, it cannot be solved", blocked);
                            queue.remove(blocked);
                        }
                        continue;
                    }
                    None => break,
                }
            };
            seen.insert(id);
            if self.measures.is_computed(id) {
                continue;
            }

            let grouped = match self.measures.category(id) {
                Some(category) => self.registry.category(category)?.calling_form() == CallingForm::GroupedMeasures,
                None => false,
            };
            let res = if grouped {
                let category = self.measures.category(id);
                let model = self.measures.model(id);
                let mut group = vec![id];
                let measures = &self.measures;
                let matches = |m: MeasureId| {
                    measures.state(m) == Lifecycle::Ready
                        && measures.category(m) == category
                        && measures.model(m) == model
                };
                while let Some(next) = queue.pop_if(measures, &matches) {
                    group.push(next);
                }
                seen.extend(group[1..].iter().copied());
                debug!("dispatching a group of {} measures", group.len());
                self.dispatch(&group)
            } else {
                self.solve(id)
            };
            Self::record(&mut summary, res)?;
        }

        for id in seen {
            let Ok(measure) = self.measures.get(id) else {
                continue;
            };
            if measure.state() != Lifecycle::Computed {
                continue;
            }
            match measure.diagnostic() {
                Some(line) => summary.failed.push((id, line.to_string())),
                None => summary.computed += 1,
            }
        }
        info!("batch done: {}", summary);
        Ok(summary)
    }

    fn record(summary: &mut BatchSummary, res: Result<()>) -> Result<()> {
        match res {
            Ok(()) => Ok(()),
            Err(Error::Terminated) => Err(Error::Terminated),
            Err(err) => {
                if !summary.errors.contains(&err) {
                    summary.errors.push(err);
                }
                Ok(())
            }
        }
    }
}
