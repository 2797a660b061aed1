use super::{NodeId, Serial};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum Error {
    #[error("node {0} is not live in this graph")]
    InvalidReference(NodeId),
    #[error("a node named {0} already exists")]
    DuplicateNode(Serial),
    #[error("pattern edge ({from}, {to}) names a node outside 0..{len}")]
    InvalidPattern { from: usize, to: usize, len: usize },
    #[error(
        "embedding pair ({lhs}, {rhs}) does not fit a {lhs_len}-node pattern \
         and a {rhs_len}-node replacement"
    )]
    InvalidEmbedding {
        lhs: usize,
        rhs: usize,
        lhs_len: usize,
        rhs_len: usize,
    },
    #[error("rule weight {0} must be finite and non-negative")]
    InvalidWeight(f64),
}
