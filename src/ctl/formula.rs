//! CTL formulas and their evaluation through the `ctl` engine category.
//!
//! Propositional connectives are evaluated directly on the model's primary graph. Every
//! temporal operator becomes one function call to the selected CTL engine, so a formula is
//! checked by whichever representation the process was configured with.

use std::fmt;

use crate::ctl::{CtlFunction, CtlOp};
use crate::error::{Error, Result};
use crate::graph::{Direction, ReachabilityGraph, StateSet};
use crate::measure::{MeasureGraph, MeasureId};
use crate::model::Model;
use crate::registry::{CategoryId, FunctionCall, RunContext};
use crate::value::Value;

/// CTL formula abstract syntax tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CtlFormula {
    /// Atomic proposition, a state label of the model
    Atom(String),
    /// State set computed by another measure
    Measure(MeasureId),
    True,
    False,
    Not(Box<CtlFormula>),
    And(Box<CtlFormula>, Box<CtlFormula>),
    Or(Box<CtlFormula>, Box<CtlFormula>),
    Implies(Box<CtlFormula>, Box<CtlFormula>),
    Iff(Box<CtlFormula>, Box<CtlFormula>),

    /// Exists Next: EX φ
    EX(Box<CtlFormula>),
    /// All Next: AX φ
    AX(Box<CtlFormula>),
    /// Exists Future: EF φ
    EF(Box<CtlFormula>),
    /// All Future: AF φ
    AF(Box<CtlFormula>),
    /// Exists Globally: EG φ
    EG(Box<CtlFormula>),
    /// All Globally: AG φ
    AG(Box<CtlFormula>),
    /// Exists Until: E[φ U ψ]
    EU(Box<CtlFormula>, Box<CtlFormula>),
    /// All Until: A[φ U ψ]
    AU(Box<CtlFormula>, Box<CtlFormula>),

    /// Exists Yesterday: EY φ
    EY(Box<CtlFormula>),
    /// Exists Past: EP φ
    EP(Box<CtlFormula>),
    /// Exists Historically: EH φ
    EH(Box<CtlFormula>),
    /// Exists Since: E[φ S ψ]
    ES(Box<CtlFormula>, Box<CtlFormula>),

    /// Controlled reachability of ψ, choosing successors in φ-states: AEF(φ, ψ)
    AEF(Box<CtlFormula>, Box<CtlFormula>),
}

impl CtlFormula {
    pub fn atom(s: impl Into<String>) -> Self {
        CtlFormula::Atom(s.into())
    }

    pub fn measure(id: MeasureId) -> Self {
        CtlFormula::Measure(id)
    }

    pub fn not(self) -> Self {
        CtlFormula::Not(Box::new(self))
    }

    pub fn and(self, other: Self) -> Self {
        CtlFormula::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Self) -> Self {
        CtlFormula::Or(Box::new(self), Box::new(other))
    }

    pub fn implies(self, other: Self) -> Self {
        CtlFormula::Implies(Box::new(self), Box::new(other))
    }

    pub fn iff(self, other: Self) -> Self {
        CtlFormula::Iff(Box::new(self), Box::new(other))
    }

    pub fn ex(self) -> Self {
        CtlFormula::EX(Box::new(self))
    }

    pub fn ax(self) -> Self {
        CtlFormula::AX(Box::new(self))
    }

    pub fn ef(self) -> Self {
        CtlFormula::EF(Box::new(self))
    }

    pub fn af(self) -> Self {
        CtlFormula::AF(Box::new(self))
    }

    pub fn eg(self) -> Self {
        CtlFormula::EG(Box::new(self))
    }

    pub fn ag(self) -> Self {
        CtlFormula::AG(Box::new(self))
    }

    pub fn eu(self, other: Self) -> Self {
        CtlFormula::EU(Box::new(self), Box::new(other))
    }

    pub fn au(self, other: Self) -> Self {
        CtlFormula::AU(Box::new(self), Box::new(other))
    }

    pub fn ey(self) -> Self {
        CtlFormula::EY(Box::new(self))
    }

    pub fn ep(self) -> Self {
        CtlFormula::EP(Box::new(self))
    }

    pub fn eh(self) -> Self {
        CtlFormula::EH(Box::new(self))
    }

    pub fn es(self, other: Self) -> Self {
        CtlFormula::ES(Box::new(self), Box::new(other))
    }

    pub fn aef(self, target: Self) -> Self {
        CtlFormula::AEF(Box::new(self), Box::new(target))
    }

    /// Measures this formula reads.
    pub fn measures(&self) -> Vec<MeasureId> {
        let mut out = Vec::new();
        self.collect_measures(&mut out);
        out.sort_unstable();
        out.dedup();
        out
    }

    fn collect_measures(&self, out: &mut Vec<MeasureId>) {
        match self {
            CtlFormula::Measure(id) => out.push(*id),
            CtlFormula::Atom(_) | CtlFormula::True | CtlFormula::False => {}
            CtlFormula::Not(phi)
            | CtlFormula::EX(phi)
            | CtlFormula::AX(phi)
            | CtlFormula::EF(phi)
            | CtlFormula::AF(phi)
            | CtlFormula::EG(phi)
            | CtlFormula::AG(phi)
            | CtlFormula::EY(phi)
            | CtlFormula::EP(phi)
            | CtlFormula::EH(phi) => phi.collect_measures(out),
            CtlFormula::And(phi, psi)
            | CtlFormula::Or(phi, psi)
            | CtlFormula::Implies(phi, psi)
            | CtlFormula::Iff(phi, psi)
            | CtlFormula::EU(phi, psi)
            | CtlFormula::AU(phi, psi)
            | CtlFormula::ES(phi, psi)
            | CtlFormula::AEF(phi, psi) => {
                phi.collect_measures(out);
                psi.collect_measures(out);
            }
        }
    }
}

impl fmt::Display for CtlFormula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CtlFormula::Atom(s) => write!(f, "{}", s),
            CtlFormula::Measure(id) => write!(f, "{}", id),
            CtlFormula::True => write!(f, "true"),
            CtlFormula::False => write!(f, "false"),
            CtlFormula::Not(phi) => write!(f, "¬{}", phi),
            CtlFormula::And(phi, psi) => write!(f, "({} ∧ {})", phi, psi),
            CtlFormula::Or(phi, psi) => write!(f, "({} ∨ {})", phi, psi),
            CtlFormula::Implies(phi, psi) => write!(f, "({} → {})", phi, psi),
            CtlFormula::Iff(phi, psi) => write!(f, "({} ↔ {})", phi, psi),
            CtlFormula::EX(phi) => write!(f, "EX {}", phi),
            CtlFormula::AX(phi) => write!(f, "AX {}", phi),
            CtlFormula::EF(phi) => write!(f, "EF {}", phi),
            CtlFormula::AF(phi) => write!(f, "AF {}", phi),
            CtlFormula::EG(phi) => write!(f, "EG {}", phi),
            CtlFormula::AG(phi) => write!(f, "AG {}", phi),
            CtlFormula::EU(phi, psi) => write!(f, "E[{} U {}]", phi, psi),
            CtlFormula::AU(phi, psi) => write!(f, "A[{} U {}]", phi, psi),
            CtlFormula::EY(phi) => write!(f, "EY {}", phi),
            CtlFormula::EP(phi) => write!(f, "EP {}", phi),
            CtlFormula::EH(phi) => write!(f, "EH {}", phi),
            CtlFormula::ES(phi, psi) => write!(f, "E[{} S {}]", phi, psi),
            CtlFormula::AEF(phi, psi) => write!(f, "AEF({}, {})", phi, psi),
        }
    }
}

/// Evaluates formulas on one model.
pub struct FormulaChecker<'a> {
    model: &'a Model,
    measures: &'a MeasureGraph,
    ctx: &'a RunContext<'a>,
    ctl: CategoryId,
    fair: bool,
}

impl<'a> FormulaChecker<'a> {
    pub fn new(model: &'a Model, measures: &'a MeasureGraph, ctx: &'a RunContext<'a>, ctl: CategoryId) -> Self {
        Self {
            model,
            measures,
            ctx,
            ctl,
            fair: false,
        }
    }

    /// Use the fair EG in EG, AF and AU.
    pub fn fair(mut self, fair: bool) -> Self {
        self.fair = fair;
        self
    }

    fn graph(&self) -> Result<&'a dyn ReachabilityGraph> {
        self.model.primary_graph()
    }

    /// Computes the set of states satisfying `formula`.
    pub fn check(&self, formula: &CtlFormula) -> Result<StateSet> {
        let graph = self.graph()?;
        match formula {
            CtlFormula::Atom(p) => self.model.label_set_on(p, graph),
            CtlFormula::Measure(id) => {
                let value = self
                    .measures
                    .value(*id)
                    .ok_or_else(|| Error::assertion(format!("measure {} is not computed", id)))?;
                self.model.adopt(value.as_state_set()?, graph.id())
            }
            CtlFormula::True => Ok(graph.full_set()),
            CtlFormula::False => Ok(graph.empty_set()),
            CtlFormula::Not(phi) => graph.complement(&self.check(phi)?),
            CtlFormula::And(phi, psi) => graph.intersection(&self.check(phi)?, &self.check(psi)?),
            CtlFormula::Or(phi, psi) => graph.union(&self.check(phi)?, &self.check(psi)?),
            CtlFormula::Implies(phi, psi) => {
                let not_phi = graph.complement(&self.check(phi)?)?;
                graph.union(&not_phi, &self.check(psi)?)
            }
            CtlFormula::Iff(phi, psi) => {
                let a = self.check(phi)?;
                let b = self.check(psi)?;
                let both = graph.intersection(&a, &b)?;
                let neither = graph.intersection(&graph.complement(&a)?, &graph.complement(&b)?)?;
                graph.union(&both, &neither)
            }
            CtlFormula::EX(phi) => self.temporal(CtlOp::EX, Direction::Backward, &[phi]),
            CtlFormula::AX(phi) => self.temporal(CtlOp::AX, Direction::Backward, &[phi]),
            CtlFormula::EF(phi) => self.temporal(CtlOp::EF, Direction::Backward, &[phi]),
            CtlFormula::AF(phi) => self.temporal(CtlOp::AF, Direction::Backward, &[phi]),
            CtlFormula::EG(phi) => self.temporal(CtlOp::EG, Direction::Backward, &[phi]),
            CtlFormula::AG(phi) => self.temporal(CtlOp::AG, Direction::Backward, &[phi]),
            CtlFormula::EU(phi, psi) => self.temporal(CtlOp::EU, Direction::Backward, &[phi, psi]),
            CtlFormula::AU(phi, psi) => self.temporal(CtlOp::AU, Direction::Backward, &[phi, psi]),
            CtlFormula::EY(phi) => self.temporal(CtlOp::EX, Direction::Forward, &[phi]),
            CtlFormula::EP(phi) => self.temporal(CtlOp::EF, Direction::Forward, &[phi]),
            CtlFormula::EH(phi) => self.temporal(CtlOp::EG, Direction::Forward, &[phi]),
            CtlFormula::ES(phi, psi) => self.temporal(CtlOp::EU, Direction::Forward, &[phi, psi]),
            CtlFormula::AEF(phi, psi) => self.temporal(CtlOp::AEF, Direction::Backward, &[phi, psi]),
        }
    }

    fn temporal(&self, op: CtlOp, dir: Direction, args: &[&CtlFormula]) -> Result<StateSet> {
        let mut function = CtlFunction::new(op, dir);
        if self.fair && op.uses_eg() {
            function = function.fair();
        }
        let values = args
            .iter()
            .map(|phi| self.check(phi).map(Value::StateSet))
            .collect::<Result<Vec<_>>>()?;
        let name = function.to_string();
        let call = FunctionCall {
            model: self.model,
            function: &name,
            args: &values,
            ctx: self.ctx,
        };
        self.ctx.registry.run_function(self.ctl, &call)?.into_state_set()
    }

    /// Whether `formula` holds in every initial state.
    pub fn holds_initially(&self, formula: &CtlFormula) -> Result<bool> {
        let graph = self.graph()?;
        let sat = self.check(formula)?;
        graph.is_subset(&graph.initial_states(), &sat)
    }

    /// States where `formula` is false.
    pub fn violations(&self, formula: &CtlFormula) -> Result<StateSet> {
        let graph = self.graph()?;
        graph.complement(&self.check(formula)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let f = CtlFormula::atom("p").eu(CtlFormula::atom("q").not()).ag();
        assert_eq!(f.to_string(), "AG E[p U ¬q]");
        let f = CtlFormula::atom("ctrl").aef(CtlFormula::True);
        assert_eq!(f.to_string(), "AEF(ctrl, true)");
        assert_eq!(CtlFormula::atom("init").eh().to_string(), "EH init");
    }

    #[test]
    fn test_collect_measures() {
        let mut graph = MeasureGraph::new();
        let a = graph.create("a", crate::model::ModelId(0));
        let b = graph.create("b", crate::model::ModelId(0));
        let f = CtlFormula::measure(b)
            .and(CtlFormula::measure(a).ef())
            .or(CtlFormula::measure(b).not());
        assert_eq!(f.measures(), vec![b.min(a), b.max(a)]);
    }
}
