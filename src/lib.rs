//! Graph-grammar rewriting over labeled directed multigraphs.
//!
//! A [`rgg::RuleSet`] repeatedly picks a feasible [`rgg::Rule`], finds an
//! occurrence of its pattern in the host [`rgg::LabeledDigraph`] and splices
//! the replacement in, keeping every edge that tied the match to the rest of
//! the graph.

pub mod logger;
pub mod rgg;
