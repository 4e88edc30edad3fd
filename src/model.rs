//! Model instances: the state space of a process plus its generated graphs.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::graph::{ExplicitGraph, GraphId, ReachabilityGraph, StateSet, SymbolicGraph};
use crate::registry::ModelType;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct ModelId(pub(crate) usize);

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "M{}", self.0)
    }
}

/// Transition structure of a model, as produced by its formalism.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Process {
    pub num_states: usize,
    pub initial: Vec<usize>,
    pub edges: Vec<(usize, usize)>,
}

impl Process {
    pub fn new(
        num_states: usize,
        initial: impl IntoIterator<Item = usize>,
        edges: impl IntoIterator<Item = (usize, usize)>,
    ) -> Self {
        Self {
            num_states,
            initial: initial.into_iter().collect(),
            edges: edges.into_iter().collect(),
        }
    }
}

#[derive(Debug)]
pub struct Model {
    name: String,
    model_type: ModelType,
    process: Process,
    explicit: Option<Rc<ExplicitGraph>>,
    symbolic: Option<Rc<SymbolicGraph>>,
    labels: BTreeMap<String, Vec<usize>>,
}

impl Model {
    pub fn new(name: impl Into<String>, model_type: ModelType, process: Process) -> Self {
        Self {
            name: name.into(),
            model_type,
            process,
            explicit: None,
            symbolic: None,
            labels: BTreeMap::new(),
        }
    }

    /// Names a set of states; atoms of CTL formulas refer to labels.
    pub fn with_label(mut self, name: impl Into<String>, states: impl IntoIterator<Item = usize>) -> Self {
        let mut states: Vec<usize> = states.into_iter().collect();
        states.sort_unstable();
        states.dedup();
        self.labels.insert(name.into(), states);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn model_type(&self) -> ModelType {
        self.model_type
    }

    pub fn process(&self) -> &Process {
        &self.process
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.labels.keys().map(String::as_str)
    }

    pub fn explicit(&self) -> Option<&Rc<ExplicitGraph>> {
        self.explicit.as_ref()
    }

    pub fn symbolic(&self) -> Option<&Rc<SymbolicGraph>> {
        self.symbolic.as_ref()
    }

    pub fn set_explicit(&mut self, graph: Rc<ExplicitGraph>) {
        self.explicit = Some(graph);
    }

    pub fn set_symbolic(&mut self, graph: Rc<SymbolicGraph>) {
        self.symbolic = Some(graph);
    }

    pub fn is_generated(&self) -> bool {
        self.explicit.is_some() || self.symbolic.is_some()
    }

    /// The graph new sets are created on: the symbolic one if present.
    pub fn primary_graph(&self) -> Result<&dyn ReachabilityGraph> {
        if let Some(g) = &self.symbolic {
            return Ok(&**g);
        }
        if let Some(g) = &self.explicit {
            return Ok(&**g);
        }
        Err(Error::engine(format!("model `{}` has no generated state space", self.name)))
    }

    pub fn explicit_graph(&self) -> Result<&ExplicitGraph> {
        self.explicit
            .as_deref()
            .ok_or_else(|| Error::engine(format!("model `{}` has no explicit state space", self.name)))
    }

    pub fn symbolic_graph(&self) -> Result<&SymbolicGraph> {
        self.symbolic
            .as_deref()
            .ok_or_else(|| Error::engine(format!("model `{}` has no symbolic state space", self.name)))
    }

    /// The graph `id` if it belongs to this model.
    pub fn graph(&self, id: GraphId) -> Result<&dyn ReachabilityGraph> {
        if let Some(g) = self.explicit.as_deref().filter(|g| g.id() == id) {
            return Ok(g);
        }
        if let Some(g) = self.symbolic.as_deref().filter(|g| g.id() == id) {
            return Ok(g);
        }
        Err(Error::assertion(format!("{} does not belong to model `{}`", id, self.name)))
    }

    pub fn label_set(&self, label: &str) -> Result<StateSet> {
        self.label_set_on(label, self.primary_graph()?)
    }

    pub fn label_set_on(&self, label: &str, graph: &dyn ReachabilityGraph) -> Result<StateSet> {
        let states = self
            .labels
            .get(label)
            .ok_or_else(|| Error::assertion(format!("model `{}` has no label `{}`", self.name, label)))?;
        graph.from_indices(states)
    }

    /// Translates `set` onto the graph `target` of this model.
    pub fn adopt(&self, set: &StateSet, target: GraphId) -> Result<StateSet> {
        if set.graph() == target {
            return Ok(set.clone());
        }
        let source = self.graph(set.graph())?;
        let target = self.graph(target)?;
        target.from_indices(&source.to_indices(set)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dd::Forest;

    #[test]
    fn test_adopt_between_graphs() {
        let process = Process::new(3, [0], [(0, 1), (1, 2)]);
        let mut model = Model::new("chain", ModelType::Dtmc, process.clone()).with_label("end", [2]);
        assert!(model.primary_graph().is_err());

        let explicit = ExplicitGraph::new(3, [0], process.edges.iter().copied()).unwrap();
        let symbolic = SymbolicGraph::encode(&explicit, Rc::new(Forest::default())).unwrap();
        model.set_explicit(Rc::new(explicit));
        model.set_symbolic(Rc::new(symbolic));

        let end = model.label_set("end").unwrap();
        assert!(!end.is_explicit());
        let target = model.explicit_graph().unwrap().id();
        let adopted = model.adopt(&end, target).unwrap();
        assert_eq!(adopted.bits().unwrap().iter().collect::<Vec<_>>(), vec![2]);
        assert!(model.label_set("missing").is_err());
    }
}
