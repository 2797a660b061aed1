use std::fmt;

/// Handle to a node slot of a [`LabeledDigraph`](super::LabeledDigraph).
///
/// The epoch tag ties the handle to one layout of the graph. Handles survive
/// any number of insertions and removals; only
/// [`compact`](super::LabeledDigraph::compact) moves to a new epoch, after
/// which old handles are reported as invalid references.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: u32,
    epoch: u32,
}

impl NodeId {
    pub(crate) fn new(index: usize, epoch: u32) -> Self {
        Self {
            index: index as u32,
            epoch,
        }
    }

    pub fn index(&self) -> usize {
        self.index as usize
    }

    pub fn epoch(&self) -> u32 {
        self.epoch
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}@{}", self.index, self.epoch)
    }
}

/// Persistent identity of a node. Unlike [`NodeId`] it never changes once the
/// node exists, and it is what gets handed to renderers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Serial(pub u64);

impl fmt::Display for Serial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq)]
/// A live node: its persistent serial plus its label.
pub struct Node<N> {
    pub serial: Serial,
    pub label: N,
}

impl<N> Node<N> {
    pub fn new(serial: Serial, label: N) -> Self {
        Self { serial, label }
    }
}

/// Hands out serials for new nodes. Monotonic; a serial is never issued twice.
///
/// One sequence is meant to be shared by everything that creates nodes during
/// a derivation session, so that seeded nodes and rewritten nodes never clash.
#[derive(Clone, Debug, Default)]
pub struct Sequence {
    next: u64,
}

impl Sequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start issuing serials at `first`.
    pub fn starting_at(first: u64) -> Self {
        Self { next: first }
    }

    /// The serial the next call to [`Sequence::next`] will return.
    pub fn peek(&self) -> Serial {
        Serial(self.next)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Serial {
        let serial = Serial(self.next);
        self.next += 1;
        serial
    }
}
