//! Solution-engine registry.
//!
//! Every kind of question (an *engine category*) can be answered by several competing
//! *engines*. An engine dispatches on the model type to one [`Algorithm`] (a "subengine").
//! Registration happens while the process is wired; [`EngineRegistry::finalize`] then fixes
//! one selected engine per category, and from that point on only dispatch is allowed.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;

use log::{debug, info};

use crate::cancel::CancelFlag;
use crate::error::{Error, Result};
use crate::measure::{MeasureGraph, MeasureId};
use crate::model::Model;
use crate::report::FixpointObserver;
use crate::value::Value;

pub mod settings;

pub use settings::Settings;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum ModelType {
    Dsde,
    Dtmc,
    Ctmc,
    PetriNet,
}

impl ModelType {
    pub const ALL: [ModelType; 4] = [ModelType::Dsde, ModelType::Dtmc, ModelType::Ctmc, ModelType::PetriNet];
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ModelType::Dsde => "DSDE",
            ModelType::Dtmc => "DTMC",
            ModelType::Ctmc => "CTMC",
            ModelType::PetriNet => "Petri net",
        };
        f.write_str(s)
    }
}

/// How the algorithms of a category are invoked.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum CallingForm {
    /// A function over values, e.g. a CTL operator.
    FunctionCall,
    /// A pass over a whole model, e.g. state-space generation.
    WholeModel,
    SingleMeasure,
    /// All ready measures of one model at once.
    GroupedMeasures,
    None,
}

impl fmt::Display for CallingForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CallingForm::FunctionCall => "function call",
            CallingForm::WholeModel => "whole model",
            CallingForm::SingleMeasure => "single measure",
            CallingForm::GroupedMeasures => "grouped measures",
            CallingForm::None => "none",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct CategoryId(usize);

/// Shared state handed to every algorithm invocation.
pub struct RunContext<'a> {
    pub registry: &'a EngineRegistry,
    pub settings: &'a Settings,
    pub cancel: &'a CancelFlag,
    pub observer: &'a dyn FixpointObserver,
}

/// Arguments of a [`CallingForm::FunctionCall`] invocation.
pub struct FunctionCall<'a> {
    pub model: &'a Model,
    pub function: &'a str,
    pub args: &'a [Value],
    pub ctx: &'a RunContext<'a>,
}

/// One measure handed to a [`CallingForm::SingleMeasure`] or [`CallingForm::GroupedMeasures`] algorithm.
pub struct MeasureRequest<'a> {
    pub id: MeasureId,
    pub name: &'a str,
    pub model: &'a Model,
    pub rhs: &'a dyn Any,
    pub time: Option<f64>,
    /// Values of already computed measures.
    pub measures: &'a MeasureGraph,
    pub ctx: &'a RunContext<'a>,
}

impl MeasureRequest<'_> {
    pub fn rhs<T: 'static>(&self) -> Result<&T> {
        self.rhs.downcast_ref::<T>().ok_or_else(|| {
            Error::assertion(format!(
                "measure `{}` has an unexpected right-hand side for this engine",
                self.name
            ))
        })
    }
}

/// A concrete implementation serving some model types.
///
/// Implementors override the entry point matching [`calling_form`][Algorithm::calling_form];
/// the registry never calls the others.
pub trait Algorithm {
    fn applies_to(&self, model_type: ModelType) -> bool;

    fn calling_form(&self) -> CallingForm;

    fn call(&self, _call: &FunctionCall<'_>) -> Result<Value> {
        Err(Error::assertion("algorithm does not take function calls"))
    }

    fn process(&self, _model: &mut Model, _ctx: &RunContext<'_>) -> Result<()> {
        Err(Error::assertion("algorithm does not process models"))
    }

    fn solve(&self, _request: &MeasureRequest<'_>) -> Result<Value> {
        Err(Error::assertion("algorithm does not solve single measures"))
    }

    /// Solves a batch; the outer error fails the whole batch, inner ones single measures.
    fn solve_group(&self, _requests: &[MeasureRequest<'_>]) -> Result<Vec<Result<Value>>> {
        Err(Error::assertion("algorithm does not solve grouped measures"))
    }
}

/// A named candidate within a category.
pub struct Engine {
    name: String,
    doc: String,
    table: BTreeMap<ModelType, Rc<dyn Algorithm>>,
}

impl Engine {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn doc(&self) -> &str {
        &self.doc
    }

    pub fn supports(&self, model_type: ModelType) -> bool {
        self.table.contains_key(&model_type)
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("name", &self.name)
            .field("model_types", &self.table.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[derive(Debug)]
pub struct EngineCategory {
    name: String,
    doc: String,
    form: CallingForm,
    engines: Vec<Engine>,
    selected: Option<usize>,
}

impl EngineCategory {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn doc(&self) -> &str {
        &self.doc
    }

    pub fn calling_form(&self) -> CallingForm {
        self.form
    }

    pub fn engines(&self) -> &[Engine] {
        &self.engines
    }

    pub fn selected(&self) -> Option<&Engine> {
        self.selected.map(|i| &self.engines[i])
    }

    fn engine_index(&self, name: &str) -> Option<usize> {
        self.engines.iter().position(|e| e.name == name)
    }
}

/// A user-facing choice between the engines of one category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOption {
    pub category: String,
    /// `(name, one-line doc)` in registration order.
    pub choices: Vec<(String, String)>,
    pub selected: String,
}

#[derive(Debug, Default)]
pub struct EngineRegistry {
    categories: Vec<EngineCategory>,
    by_name: HashMap<String, CategoryId>,
    options: Vec<EngineOption>,
    finalized: bool,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    fn ensure_open(&self, what: impl FnOnce() -> String) -> Result<()> {
        if self.finalized {
            Err(Error::Finalized { what: what() })
        } else {
            Ok(())
        }
    }

    pub fn register_category(&mut self, name: &str, doc: &str, form: CallingForm) -> Result<CategoryId> {
        self.ensure_open(|| format!("category `{}`", name))?;
        if self.by_name.contains_key(name) {
            return Err(Error::Duplicate {
                kind: "category",
                name: name.to_string(),
            });
        }
        let id = CategoryId(self.categories.len());
        self.categories.push(EngineCategory {
            name: name.to_string(),
            doc: doc.to_string(),
            form,
            engines: Vec::new(),
            selected: None,
        });
        self.by_name.insert(name.to_string(), id);
        debug!("registered category `{}` ({})", name, form);
        Ok(id)
    }

    pub fn register_engine(&mut self, category: CategoryId, name: &str, doc: &str) -> Result<()> {
        self.ensure_open(|| format!("engine `{}`", name))?;
        let cat = self.category_mut(category)?;
        if cat.engine_index(name).is_some() {
            return Err(Error::Duplicate {
                kind: "engine",
                name: format!("{}/{}", cat.name, name),
            });
        }
        cat.engines.push(Engine {
            name: name.to_string(),
            doc: doc.to_string(),
            table: BTreeMap::new(),
        });
        debug!("registered engine `{}` for `{}`", name, cat.name);
        Ok(())
    }

    /// Attaches `algorithm` to every model-type slot of `engine` it applies to.
    ///
    /// Nothing is attached if any of those slots is already taken.
    pub fn register_subengine(&mut self, category: CategoryId, engine: &str, algorithm: Rc<dyn Algorithm>) -> Result<()> {
        self.ensure_open(|| format!("a subengine of `{}`", engine))?;
        let cat = self.category_mut(category)?;
        if algorithm.calling_form() != cat.form {
            return Err(Error::CallMismatch {
                category: cat.name.clone(),
                expected: cat.form,
                got: algorithm.calling_form(),
            });
        }
        let index = cat.engine_index(engine).ok_or_else(|| Error::NoEngine {
            category: cat.name.clone(),
            reason: format!("no engine named `{}`", engine),
        })?;

        let slots: Vec<ModelType> = ModelType::ALL
            .into_iter()
            .filter(|&mt| algorithm.applies_to(mt))
            .collect();
        let target = &mut cat.engines[index];
        if let Some(taken) = slots.iter().find(|mt| target.table.contains_key(*mt)) {
            return Err(Error::Duplicate {
                kind: "subengine",
                name: format!("{}/{} for {}", cat.name, engine, taken),
            });
        }
        for mt in slots {
            target.table.insert(mt, Rc::clone(&algorithm));
        }
        Ok(())
    }

    /// Fixes the selected engine of every category. Runs once.
    pub fn finalize(&mut self, settings: &Settings) -> Result<()> {
        self.ensure_open(|| "finalize twice".to_string())?;

        // Validate the whole selection before touching anything.
        let mut choices = Vec::new();
        for (category, choice) in &settings.engines {
            let id = self.lookup(category)?;
            let index = self.categories[id.0]
                .engine_index(choice)
                .ok_or_else(|| Error::UnknownChoice {
                    category: category.clone(),
                    choice: choice.clone(),
                })?;
            choices.push((id, index));
        }

        for cat in &mut self.categories {
            cat.selected = if cat.engines.is_empty() { None } else { Some(0) };
        }
        for (id, index) in choices {
            self.categories[id.0].selected = Some(index);
        }

        for cat in &self.categories {
            match cat.selected() {
                Some(engine) if cat.engines.len() > 1 => {
                    self.options.push(EngineOption {
                        category: cat.name.clone(),
                        choices: cat.engines.iter().map(|e| (e.name.clone(), e.doc.clone())).collect(),
                        selected: engine.name.clone(),
                    });
                    info!("engine for `{}`: {}", cat.name, engine.name);
                }
                Some(engine) => debug!("engine for `{}`: {}", cat.name, engine.name),
                None => debug!("no engine for `{}`", cat.name),
            }
        }
        self.finalized = true;
        Ok(())
    }

    /// Choices exposed to the configuration layer, one per category with several engines.
    pub fn options(&self) -> &[EngineOption] {
        &self.options
    }

    pub fn category(&self, id: CategoryId) -> Result<&EngineCategory> {
        self.categories
            .get(id.0)
            .ok_or_else(|| Error::UnknownCategory(format!("#{}", id.0)))
    }

    fn category_mut(&mut self, id: CategoryId) -> Result<&mut EngineCategory> {
        self.categories
            .get_mut(id.0)
            .ok_or_else(|| Error::UnknownCategory(format!("#{}", id.0)))
    }

    pub fn lookup(&self, name: &str) -> Result<CategoryId> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| Error::UnknownCategory(name.to_string()))
    }

    pub fn selected_engine(&self, id: CategoryId) -> Result<Option<&Engine>> {
        Ok(self.category(id)?.selected())
    }

    fn resolve(&self, id: CategoryId, form: CallingForm, model_type: ModelType) -> Result<&Rc<dyn Algorithm>> {
        let cat = self.category(id)?;
        if cat.form != form {
            return Err(Error::CallMismatch {
                category: cat.name.clone(),
                expected: cat.form,
                got: form,
            });
        }
        let no_engine = |reason: String| Error::NoEngine {
            category: cat.name.clone(),
            reason,
        };
        if !self.finalized {
            return Err(no_engine("registry is not finalized".to_string()));
        }
        let engine = cat
            .selected()
            .ok_or_else(|| no_engine("no engine registered".to_string()))?;
        engine
            .table
            .get(&model_type)
            .ok_or_else(|| no_engine(format!("engine `{}` does not apply to {} models", engine.name, model_type)))
    }

    pub fn run_function(&self, id: CategoryId, call: &FunctionCall<'_>) -> Result<Value> {
        let algorithm = self.resolve(id, CallingForm::FunctionCall, call.model.model_type())?;
        algorithm.call(call)
    }

    pub fn run_model(&self, id: CategoryId, model: &mut Model, ctx: &RunContext<'_>) -> Result<()> {
        let algorithm = self.resolve(id, CallingForm::WholeModel, model.model_type())?;
        algorithm.process(model, ctx)
    }

    pub fn run_measure(&self, id: CategoryId, request: &MeasureRequest<'_>) -> Result<Value> {
        let algorithm = self.resolve(id, CallingForm::SingleMeasure, request.model.model_type())?;
        algorithm.solve(request)
    }

    /// All requests must concern models of the same type.
    pub fn run_grouped(&self, id: CategoryId, requests: &[MeasureRequest<'_>]) -> Result<Vec<Result<Value>>> {
        let Some(first) = requests.first() else {
            return Ok(Vec::new());
        };
        let model_type = first.model.model_type();
        if requests.iter().any(|r| r.model.model_type() != model_type) {
            return Err(Error::assertion("grouped measures span several model types"));
        }
        let algorithm = self.resolve(id, CallingForm::GroupedMeasures, model_type)?;
        let results = algorithm.solve_group(requests)?;
        if results.len() != requests.len() {
            return Err(Error::assertion(format!(
                "engine returned {} results for {} measures",
                results.len(),
                requests.len()
            )));
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use test_log::test;

    use super::*;
    use crate::model::Process;
    use crate::report::NullObserver;

    struct Constant {
        value: f64,
        types: &'static [ModelType],
        calls: Cell<usize>,
    }

    impl Constant {
        fn new(value: f64, types: &'static [ModelType]) -> Rc<Self> {
            Rc::new(Self {
                value,
                types,
                calls: Cell::new(0),
            })
        }
    }

    impl Algorithm for Constant {
        fn applies_to(&self, model_type: ModelType) -> bool {
            self.types.contains(&model_type)
        }

        fn calling_form(&self) -> CallingForm {
            CallingForm::FunctionCall
        }

        fn call(&self, _call: &FunctionCall<'_>) -> Result<Value> {
            self.calls.set(self.calls.get() + 1);
            Ok(Value::Real(self.value))
        }
    }

    fn invoke(registry: &EngineRegistry, id: CategoryId, model: &Model) -> Result<Value> {
        let settings = Settings::default();
        let cancel = CancelFlag::new();
        let ctx = RunContext {
            registry,
            settings: &settings,
            cancel: &cancel,
            observer: &NullObserver,
        };
        let call = FunctionCall {
            model,
            function: "f",
            args: &[],
            ctx: &ctx,
        };
        registry.run_function(id, &call)
    }

    fn dtmc() -> Model {
        Model::new("m", ModelType::Dtmc, Process::default())
    }

    #[test]
    fn test_duplicates() {
        let mut registry = EngineRegistry::new();
        let cat = registry.register_category("f", "", CallingForm::FunctionCall).unwrap();
        assert!(matches!(
            registry.register_category("f", "", CallingForm::FunctionCall),
            Err(Error::Duplicate { kind: "category", .. })
        ));
        registry.register_engine(cat, "A", "first").unwrap();
        assert!(matches!(
            registry.register_engine(cat, "A", "again"),
            Err(Error::Duplicate { kind: "engine", .. })
        ));

        registry
            .register_subengine(cat, "A", Constant::new(1.0, &[ModelType::Dtmc, ModelType::Ctmc]))
            .unwrap();
        let clash = registry.register_subengine(cat, "A", Constant::new(2.0, &[ModelType::Ctmc]));
        assert!(matches!(clash, Err(Error::Duplicate { kind: "subengine", .. })));
        // A disjoint slot is fine.
        registry
            .register_subengine(cat, "A", Constant::new(3.0, &[ModelType::PetriNet]))
            .unwrap();
    }

    #[test]
    fn test_subengine_checks() {
        let mut registry = EngineRegistry::new();
        let cat = registry.register_category("m", "", CallingForm::SingleMeasure).unwrap();
        registry.register_engine(cat, "A", "").unwrap();
        let mismatch = registry.register_subengine(cat, "A", Constant::new(1.0, &ModelType::ALL));
        assert!(matches!(mismatch, Err(Error::CallMismatch { .. })));

        let fcat = registry.register_category("f", "", CallingForm::FunctionCall).unwrap();
        let missing = registry.register_subengine(fcat, "B", Constant::new(1.0, &ModelType::ALL));
        assert!(matches!(missing, Err(Error::NoEngine { .. })));
    }

    #[test]
    fn test_finalize_selects_first() {
        let mut registry = EngineRegistry::new();
        let single = registry.register_category("single", "", CallingForm::FunctionCall).unwrap();
        let multi = registry.register_category("multi", "", CallingForm::FunctionCall).unwrap();
        let empty = registry.register_category("empty", "", CallingForm::FunctionCall).unwrap();
        registry.register_engine(single, "ONLY", "the only one").unwrap();
        registry.register_engine(multi, "FIRST", "first one").unwrap();
        registry.register_engine(multi, "SECOND", "second one").unwrap();
        registry.finalize(&Settings::default()).unwrap();

        assert_eq!(registry.selected_engine(single).unwrap().unwrap().name(), "ONLY");
        assert_eq!(registry.selected_engine(multi).unwrap().unwrap().name(), "FIRST");
        assert!(registry.selected_engine(empty).unwrap().is_none());

        assert_eq!(registry.options().len(), 1);
        let option = &registry.options()[0];
        assert_eq!(option.category, "multi");
        assert_eq!(option.selected, "FIRST");
        assert_eq!(option.choices[1], ("SECOND".to_string(), "second one".to_string()));
    }

    #[test]
    fn test_finalize_with_settings() {
        let mut registry = EngineRegistry::new();
        let cat = registry.register_category("multi", "", CallingForm::FunctionCall).unwrap();
        registry.register_engine(cat, "FIRST", "").unwrap();
        registry.register_engine(cat, "SECOND", "").unwrap();

        let bad = Settings::default().select("multi", "THIRD");
        assert!(matches!(registry.finalize(&bad), Err(Error::UnknownChoice { .. })));
        let unknown = Settings::default().select("nope", "FIRST");
        assert!(matches!(registry.finalize(&unknown), Err(Error::UnknownCategory(_))));
        assert!(!registry.is_finalized());

        registry.finalize(&Settings::default().select("multi", "SECOND")).unwrap();
        assert_eq!(registry.selected_engine(cat).unwrap().unwrap().name(), "SECOND");
        assert_eq!(registry.options()[0].selected, "SECOND");
    }

    #[test]
    fn test_registration_after_finalize() {
        let mut registry = EngineRegistry::new();
        let cat = registry.register_category("f", "", CallingForm::FunctionCall).unwrap();
        registry.finalize(&Settings::default()).unwrap();
        assert!(matches!(registry.register_engine(cat, "A", ""), Err(Error::Finalized { .. })));
        assert!(matches!(
            registry.register_category("g", "", CallingForm::FunctionCall),
            Err(Error::Finalized { .. })
        ));
        assert!(matches!(registry.finalize(&Settings::default()), Err(Error::Finalized { .. })));
    }

    #[test]
    fn test_dispatch() {
        let mut registry = EngineRegistry::new();
        let cat = registry.register_category("f", "", CallingForm::FunctionCall).unwrap();
        let none = registry.register_category("none", "", CallingForm::FunctionCall).unwrap();
        registry.register_engine(cat, "A", "").unwrap();
        let algorithm = Constant::new(4.0, &[ModelType::Dtmc]);
        registry.register_subengine(cat, "A", algorithm.clone()).unwrap();

        // Dispatch is refused before finalize.
        assert!(matches!(invoke(&registry, cat, &dtmc()), Err(Error::NoEngine { .. })));
        registry.finalize(&Settings::default()).unwrap();

        assert_eq!(invoke(&registry, cat, &dtmc()), Ok(Value::Real(4.0)));
        assert_eq!(algorithm.calls.get(), 1);

        let ctmc = Model::new("c", ModelType::Ctmc, Process::default());
        assert!(matches!(invoke(&registry, cat, &ctmc), Err(Error::NoEngine { .. })));
        assert!(matches!(invoke(&registry, none, &dtmc()), Err(Error::NoEngine { .. })));
    }

    #[test]
    fn test_wrong_overload() {
        let mut registry = EngineRegistry::new();
        let cat = registry.register_category("f", "", CallingForm::FunctionCall).unwrap();
        registry.finalize(&Settings::default()).unwrap();
        let settings = Settings::default();
        let cancel = CancelFlag::new();
        let ctx = RunContext {
            registry: &registry,
            settings: &settings,
            cancel: &cancel,
            observer: &NullObserver,
        };
        let mut model = dtmc();
        let res = registry.run_model(cat, &mut model, &ctx);
        assert_eq!(
            res,
            Err(Error::CallMismatch {
                category: "f".to_string(),
                expected: CallingForm::FunctionCall,
                got: CallingForm::WholeModel,
            })
        );
        assert!(matches!(registry.lookup("g"), Err(Error::UnknownCategory(_))));
    }
}
