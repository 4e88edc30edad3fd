//! # measure-rs: deferred measures and CTL engines
//!
//! **`measure-rs`** is the solving core of a model-analysis tool. Models are analysed through
//! *measures*: named questions whose answer is computed by one of several competing
//! *solution engines*. Measures may depend on each other, may only learn which kind of
//! question they are once other measures are known, and are solved in batches.
//!
//! ## Key Features
//!
//! - **Engine registry**: engine categories, one selected engine per category, and dispatch on
//!   the model type. See [`registry::EngineRegistry`].
//! - **Deferred measures**: a dependency graph with push notification, one-shot
//!   classification and per-measure failure isolation. See [`measure::MeasureGraph`].
//! - **Batch scheduling**: arrival-order and time-ordered queues with grouped dispatch. See
//!   [`session::Session::solve_batch`].
//! - **CTL fixpoints**: EX, EU, EG (plain and fair), their past duals, the universal operators
//!   and controlled reachability AEF, each over explicit bit sets and over decision diagrams.
//!   See [`ctl::Fixpoints`].
//! - **Decision diagrams**: a complement-edge BDD forest with quantification, renaming and
//!   model counting. See [`dd::Forest`].
//!
//! ## Basic Usage
//!
//! ```rust
//! use measure_rs::ctl::CtlFormula;
//! use measure_rs::engines::{builtin_session, CtlQuery};
//! use measure_rs::model::{Model, Process};
//! use measure_rs::registry::{ModelType, Settings};
//! use measure_rs::value::Value;
//!
//! let (mut session, builtin) = builtin_session(Settings::default()).unwrap();
//!
//! // A 4-cycle 0 -> 1 -> 2 -> 3 -> 0, labelled "even" on 0 and 2.
//! let process = Process::new(4, [0], [(0, 1), (1, 2), (2, 3), (3, 0)]);
//! let model = session.add_model(Model::new("cycle", ModelType::Dtmc, process).with_label("even", [0, 2]));
//! session.process_model(model, builtin.proc_generate).unwrap();
//!
//! let query = CtlQuery::initially(CtlFormula::atom("even").ex().not());
//! let id = session.define("odd_next", model, query.into_def(builtin.ctl_check)).unwrap();
//! assert_eq!(session.compute(id).unwrap(), Value::Bool(true));
//! ```
//!
//! ## Core Components
//!
//! - **[`registry`]**: categories, engines, algorithms and settings.
//! - **[`measure`]**: the measure graph and the batch queues.
//! - **[`session`]**: wiring of models, measures and the finalized registry.
//! - **[`ctl`]**: fixpoint algorithms and CTL formulas.
//! - **[`graph`]**: explicit and symbolic reachability graphs.
//! - **[`engines`]**: the built-in engine categories.

pub mod bitset;
pub mod cancel;
pub mod ctl;
pub mod dd;
pub mod engines;
pub mod error;
pub mod graph;
pub mod measure;
pub mod model;
pub mod registry;
pub mod report;
pub mod session;
pub mod value;

pub use error::{Error, ErrorClass, Result};
