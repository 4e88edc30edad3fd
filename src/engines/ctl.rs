//! CTL function-call engines.
//!
//! Arguments are adopted into the graph the engine works on; the result is handed back on the
//! graph of the first argument.

use log::debug;

use crate::bitset::BitSet;
use crate::ctl::{CtlFunction, CtlOp, ExplicitCtl, Fixpoints, SymbolicCtl};
use crate::dd::Ref;
use crate::error::{Error, Result};
use crate::graph::{ExplicitGraph, ReachabilityGraph, StateSet, SymbolicGraph};
use crate::model::Model;
use crate::registry::{Algorithm, CallingForm, CategoryId, FunctionCall, ModelType};
use crate::value::Value;

fn explicit_args(model: &Model, graph: &ExplicitGraph, args: &[Value]) -> Result<Vec<BitSet>> {
    args.iter()
        .map(|arg| {
            let set = model.adopt(arg.as_state_set()?, graph.id())?;
            Ok(set.bits()?.clone())
        })
        .collect()
}

fn symbolic_args(model: &Model, graph: &SymbolicGraph, args: &[Value]) -> Result<Vec<Ref>> {
    args.iter()
        .map(|arg| model.adopt(arg.as_state_set()?, graph.id())?.edge())
        .collect()
}

fn hand_back(model: &Model, result: StateSet, args: &[Value]) -> Result<Value> {
    let set = match args.first() {
        Some(Value::StateSet(first)) => model.adopt(&result, first.graph())?,
        _ => result,
    };
    Ok(Value::StateSet(set))
}

fn parse(call: &FunctionCall<'_>) -> Result<CtlFunction> {
    let function: CtlFunction = call.function.parse()?;
    debug!("{} on model `{}`", function, call.model.name());
    Ok(function)
}

/// CTL on the explicit graph. AEF is forwarded to the `ctl_aef` category.
#[derive(Debug)]
pub struct ExplicitCtlEngine {
    aef: CategoryId,
}

impl ExplicitCtlEngine {
    pub fn new(aef: CategoryId) -> Self {
        Self { aef }
    }
}

impl Algorithm for ExplicitCtlEngine {
    fn applies_to(&self, _model_type: ModelType) -> bool {
        true
    }

    fn calling_form(&self) -> CallingForm {
        CallingForm::FunctionCall
    }

    fn call(&self, call: &FunctionCall<'_>) -> Result<Value> {
        let function = parse(call)?;
        if function.op == CtlOp::AEF {
            return call.ctx.registry.run_function(self.aef, call);
        }
        let graph = call.model.explicit_graph()?;
        let args = explicit_args(call.model, graph, call.args)?;
        let ctl = ExplicitCtl::new(graph, call.ctx.cancel, call.ctx.observer);
        let result = ctl.apply(function, &args)?;
        hand_back(call.model, StateSet::explicit(graph.id(), result), call.args)
    }
}

/// CTL on the symbolic graph. AEF is forwarded to the `ctl_aef` category.
#[derive(Debug)]
pub struct SymbolicCtlEngine {
    aef: CategoryId,
}

impl SymbolicCtlEngine {
    pub fn new(aef: CategoryId) -> Self {
        Self { aef }
    }
}

impl Algorithm for SymbolicCtlEngine {
    fn applies_to(&self, _model_type: ModelType) -> bool {
        true
    }

    fn calling_form(&self) -> CallingForm {
        CallingForm::FunctionCall
    }

    fn call(&self, call: &FunctionCall<'_>) -> Result<Value> {
        let function = parse(call)?;
        if function.op == CtlOp::AEF {
            return call.ctx.registry.run_function(self.aef, call);
        }
        let graph = call.model.symbolic_graph()?;
        let args = symbolic_args(call.model, graph, call.args)?;
        let ctl = SymbolicCtl::new(graph, call.ctx.cancel, call.ctx.observer);
        let result = ctl.apply(function, &args)?;
        hand_back(call.model, StateSet::symbolic(graph.id(), result), call.args)
    }
}

fn aef_operands(call: &FunctionCall<'_>) -> Result<()> {
    let function = parse(call)?;
    if function.op != CtlOp::AEF {
        return Err(Error::engine(format!("`{}` is not served by the AEF engines", function)));
    }
    if call.args.len() != 2 {
        return Err(Error::engine(format!("AEF takes 2 arguments, got {}", call.args.len())));
    }
    Ok(())
}

/// AEF by backward attractor over the explicit graph.
#[derive(Debug, Default)]
pub struct AttractorAef;

impl Algorithm for AttractorAef {
    fn applies_to(&self, _model_type: ModelType) -> bool {
        true
    }

    fn calling_form(&self) -> CallingForm {
        CallingForm::FunctionCall
    }

    fn call(&self, call: &FunctionCall<'_>) -> Result<Value> {
        aef_operands(call)?;
        let graph = call.model.explicit_graph()?;
        let args = explicit_args(call.model, graph, call.args)?;
        let ctl = ExplicitCtl::new(graph, call.ctx.cancel, call.ctx.observer);
        let result = ctl.aef_attractor(&args[0], &args[1])?;
        hand_back(call.model, StateSet::explicit(graph.id(), result), call.args)
    }
}

/// AEF by least fixpoint, on the representation of its first argument.
#[derive(Debug, Default)]
pub struct IterativeAef;

impl Algorithm for IterativeAef {
    fn applies_to(&self, _model_type: ModelType) -> bool {
        true
    }

    fn calling_form(&self) -> CallingForm {
        CallingForm::FunctionCall
    }

    fn call(&self, call: &FunctionCall<'_>) -> Result<Value> {
        aef_operands(call)?;
        let model = call.model;
        let first = call.args[0].as_state_set()?;
        let result = if first.is_explicit() {
            let graph = model.explicit_graph()?;
            let args = explicit_args(model, graph, call.args)?;
            let ctl = ExplicitCtl::new(graph, call.ctx.cancel, call.ctx.observer);
            StateSet::explicit(graph.id(), ctl.aef_iterative(&args[0], &args[1])?)
        } else {
            let graph = model.symbolic_graph()?;
            let args = symbolic_args(model, graph, call.args)?;
            let ctl = SymbolicCtl::new(graph, call.ctx.cancel, call.ctx.observer);
            StateSet::symbolic(graph.id(), ctl.aef_iterative(&args[0], &args[1])?)
        };
        hand_back(model, result, call.args)
    }
}
