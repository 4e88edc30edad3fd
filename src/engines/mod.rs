//! Built-in engine categories and their engines.
//!
//! | category        | form             | engines                 |
//! |-----------------|------------------|-------------------------|
//! | `ctl`           | function call    | `EXPLICIT`, `SYMBOLIC`  |
//! | `ctl_aef`       | function call    | `ATTRACTOR`, `ITERATIVE`|
//! | `proc_generate` | whole model      | `EXPLICIT`, `MDD`       |
//! | `ctl_check`     | single measure   | `FORMULA`               |
//! | `reachable`     | single measure   | `CLOSURE`               |
//! | `bounded_reach` | grouped measures | `INCREMENTAL`           |
//!
//! The first engine of each category is the default. Engines that need another category
//! receive its id at registration time.

use std::rc::Rc;

use crate::error::Result;
use crate::registry::{CallingForm, CategoryId, EngineRegistry, Settings};
use crate::session::Session;

pub mod check;
pub mod ctl;
pub mod procgen;
pub mod reach;

pub use check::{CtlQuery, FormulaEngine, QueryMode};
pub use ctl::{AttractorAef, ExplicitCtlEngine, IterativeAef, SymbolicCtlEngine};
pub use procgen::{ExplicitGeneration, MddGeneration};
pub use reach::{BoundedReach, IncrementalReach, ReachClosure, Reachable};

/// Ids of the built-in categories.
#[derive(Debug, Clone)]
pub struct Builtin {
    pub ctl: CategoryId,
    pub ctl_aef: CategoryId,
    pub proc_generate: CategoryId,
    pub ctl_check: CategoryId,
    pub reachable: CategoryId,
    pub bounded_reach: CategoryId,
    /// The `INCREMENTAL` engine, kept for its restart counter.
    pub incremental: Rc<IncrementalReach>,
}

pub fn register_builtin(registry: &mut EngineRegistry) -> Result<Builtin> {
    let ctl = registry.register_category("ctl", "CTL operators on state sets", CallingForm::FunctionCall)?;
    let ctl_aef = registry.register_category(
        "ctl_aef",
        "controlled reachability AEF(p, q)",
        CallingForm::FunctionCall,
    )?;
    let proc_generate = registry.register_category(
        "proc_generate",
        "state-space generation",
        CallingForm::WholeModel,
    )?;
    let ctl_check = registry.register_category("ctl_check", "CTL formula measures", CallingForm::SingleMeasure)?;
    let reachable = registry.register_category("reachable", "reachable state set", CallingForm::SingleMeasure)?;
    let bounded_reach = registry.register_category(
        "bounded_reach",
        "states reachable within a step bound",
        CallingForm::GroupedMeasures,
    )?;

    registry.register_engine(ctl, "EXPLICIT", "fixpoints over bit sets")?;
    registry.register_subengine(ctl, "EXPLICIT", Rc::new(ExplicitCtlEngine::new(ctl_aef)))?;
    registry.register_engine(ctl, "SYMBOLIC", "fixpoints over decision diagrams")?;
    registry.register_subengine(ctl, "SYMBOLIC", Rc::new(SymbolicCtlEngine::new(ctl_aef)))?;

    registry.register_engine(ctl_aef, "ATTRACTOR", "backward attractor with per-state counters")?;
    registry.register_subengine(ctl_aef, "ATTRACTOR", Rc::new(AttractorAef))?;
    registry.register_engine(ctl_aef, "ITERATIVE", "least fixpoint on either representation")?;
    registry.register_subengine(ctl_aef, "ITERATIVE", Rc::new(IterativeAef))?;

    registry.register_engine(proc_generate, "EXPLICIT", "adjacency lists")?;
    registry.register_subengine(proc_generate, "EXPLICIT", Rc::new(ExplicitGeneration))?;
    registry.register_engine(proc_generate, "MDD", "adjacency lists and a decision-diagram relation")?;
    registry.register_subengine(proc_generate, "MDD", Rc::new(MddGeneration))?;

    registry.register_engine(ctl_check, "FORMULA", "evaluates through the ctl category")?;
    registry.register_subengine(ctl_check, "FORMULA", Rc::new(FormulaEngine::new(ctl)))?;

    registry.register_engine(reachable, "CLOSURE", "EP of the initial states")?;
    registry.register_subengine(reachable, "CLOSURE", Rc::new(ReachClosure::new(ctl)))?;

    let incremental = Rc::new(IncrementalReach::new());
    registry.register_engine(bounded_reach, "INCREMENTAL", "resumes exploration across bounds")?;
    registry.register_subengine(bounded_reach, "INCREMENTAL", incremental.clone())?;

    Ok(Builtin {
        ctl,
        ctl_aef,
        proc_generate,
        ctl_check,
        reachable,
        bounded_reach,
        incremental,
    })
}

/// A session over a registry holding just the built-in engines.
pub fn builtin_session(settings: Settings) -> Result<(Session, Builtin)> {
    let mut registry = EngineRegistry::new();
    let builtin = register_builtin(&mut registry)?;
    let session = Session::new(registry, settings)?;
    Ok((session, builtin))
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::error::Error;

    #[test]
    fn test_defaults_and_options() {
        let (session, builtin) = builtin_session(Settings::default()).unwrap();
        let registry = session.registry();
        let selected = |id| registry.selected_engine(id).unwrap().unwrap().name().to_string();
        assert_eq!(selected(builtin.ctl), "EXPLICIT");
        assert_eq!(selected(builtin.ctl_aef), "ATTRACTOR");
        assert_eq!(selected(builtin.proc_generate), "EXPLICIT");
        let options: Vec<_> = registry.options().iter().map(|o| o.category.as_str()).collect();
        assert_eq!(options, vec!["ctl", "ctl_aef", "proc_generate"]);
    }

    #[test]
    fn test_selection_from_settings() {
        let settings = Settings::default().select("ctl", "SYMBOLIC").select("proc_generate", "MDD");
        let (session, builtin) = builtin_session(settings).unwrap();
        let engine = session.registry().selected_engine(builtin.ctl).unwrap().unwrap();
        assert_eq!(engine.name(), "SYMBOLIC");
    }

    #[test]
    fn test_unknown_selection() {
        let settings = Settings::default().select("ctl", "BDD");
        assert!(matches!(builtin_session(settings), Err(Error::UnknownChoice { .. })));
    }
}
