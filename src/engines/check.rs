use crate::ctl::formula::{CtlFormula, FormulaChecker};
use crate::error::Result;
use crate::measure::MeasureDef;
use crate::registry::{Algorithm, CallingForm, CategoryId, MeasureRequest, ModelType};
use crate::value::Value;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum QueryMode {
    /// The satisfying states.
    States,
    /// Whether every initial state satisfies the formula.
    Initially,
    /// The violating states.
    Violations,
}

/// Right-hand side of a `ctl_check` measure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CtlQuery {
    pub formula: CtlFormula,
    pub fair: bool,
    pub mode: QueryMode,
}

impl CtlQuery {
    pub fn states(formula: CtlFormula) -> Self {
        Self {
            formula,
            fair: false,
            mode: QueryMode::States,
        }
    }

    pub fn initially(formula: CtlFormula) -> Self {
        Self {
            formula,
            fair: false,
            mode: QueryMode::Initially,
        }
    }

    pub fn violations(formula: CtlFormula) -> Self {
        Self {
            formula,
            fair: false,
            mode: QueryMode::Violations,
        }
    }

    pub fn fair(mut self) -> Self {
        self.fair = true;
        self
    }

    /// Measure definition solving this query, depending on every measure the formula reads.
    pub fn into_def(self, category: CategoryId) -> MeasureDef {
        let deps = self.formula.measures();
        MeasureDef::new(self, category).with_deps(deps)
    }
}

/// Checks [`CtlQuery`] measures through the `ctl` category.
#[derive(Debug)]
pub struct FormulaEngine {
    ctl: CategoryId,
}

impl FormulaEngine {
    pub fn new(ctl: CategoryId) -> Self {
        Self { ctl }
    }
}

impl Algorithm for FormulaEngine {
    fn applies_to(&self, _model_type: ModelType) -> bool {
        true
    }

    fn calling_form(&self) -> CallingForm {
        CallingForm::SingleMeasure
    }

    fn solve(&self, request: &MeasureRequest<'_>) -> Result<Value> {
        let query = request.rhs::<CtlQuery>()?;
        let checker = FormulaChecker::new(request.model, request.measures, request.ctx, self.ctl).fair(query.fair);
        Ok(match query.mode {
            QueryMode::States => Value::StateSet(checker.check(&query.formula)?),
            QueryMode::Initially => Value::Bool(checker.holds_initially(&query.formula)?),
            QueryMode::Violations => Value::StateSet(checker.violations(&query.formula)?),
        })
    }
}
