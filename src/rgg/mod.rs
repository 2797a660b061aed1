// Module for graph-grammar rewriting.
// Rules match a small pattern graph inside a host graph and splice a replacement in its place.

mod digraph;
mod error;
pub mod matcher;
pub mod node;
mod procedures;
mod rule;
mod ruleset;
mod serde;

pub use digraph::{GraphView, LabeledDigraph};
pub use error::Error;
pub use matcher::{find_embeddings, Embedding, Matcher, Search};
pub use node::{Node, NodeId, Sequence, Serial};
pub use rule::{Application, Pattern, PatternEdge, Rule};
pub use ruleset::{select_weighted, Derivation, Outcome, RuleSet};
