//! State-space generation.

use std::rc::Rc;

use log::info;

use crate::dd::Forest;
use crate::error::Result;
use crate::graph::{ExplicitGraph, ReachabilityGraph, SymbolicGraph};
use crate::model::Model;
use crate::registry::{Algorithm, CallingForm, ModelType, RunContext};

fn ensure_explicit(model: &mut Model) -> Result<Rc<ExplicitGraph>> {
    if let Some(graph) = model.explicit() {
        return Ok(Rc::clone(graph));
    }
    let process = model.process();
    let graph = Rc::new(ExplicitGraph::new(
        process.num_states,
        process.initial.iter().copied(),
        process.edges.iter().copied(),
    )?);
    info!(
        "generated {} states and {} edges for `{}`",
        graph.num_states(),
        graph.num_edges(),
        model.name()
    );
    model.set_explicit(Rc::clone(&graph));
    Ok(graph)
}

/// Builds the explicit graph with its incoming-edge index.
#[derive(Debug, Default)]
pub struct ExplicitGeneration;

impl Algorithm for ExplicitGeneration {
    fn applies_to(&self, _model_type: ModelType) -> bool {
        true
    }

    fn calling_form(&self) -> CallingForm {
        CallingForm::WholeModel
    }

    fn process(&self, model: &mut Model, ctx: &RunContext<'_>) -> Result<()> {
        ctx.cancel.check()?;
        let graph = ensure_explicit(model)?;
        graph.require_by_cols();
        Ok(())
    }
}

/// Builds the explicit graph and encodes it into a fresh forest sized by the settings.
#[derive(Debug, Default)]
pub struct MddGeneration;

impl Algorithm for MddGeneration {
    fn applies_to(&self, _model_type: ModelType) -> bool {
        true
    }

    fn calling_form(&self) -> CallingForm {
        CallingForm::WholeModel
    }

    fn process(&self, model: &mut Model, ctx: &RunContext<'_>) -> Result<()> {
        ctx.cancel.check()?;
        let explicit = ensure_explicit(model)?;
        if model.symbolic().is_some() {
            return Ok(());
        }
        let forest = Rc::new(Forest::new(ctx.settings.forest_config()));
        let graph = SymbolicGraph::encode(&explicit, forest)?;
        info!(
            "encoded `{}`: relation has {} nodes, {} allocated",
            model.name(),
            graph.forest().node_count(graph.relation()),
            graph.forest().allocated()
        );
        model.set_symbolic(Rc::new(graph));
        Ok(())
    }
}
