use crate::rgg::rule::Pattern;
use crate::rgg::{Error, Node, NodeId, Sequence, Serial};
use std::collections::HashMap;

#[derive(Clone, Debug)]
struct Slot<N, E> {
    /// `None` once the node has been removed (a tombstone).
    node: Option<Node<N>>,
    /// Outgoing edges as (target, label). Only forward adjacency is stored.
    out: Vec<(NodeId, Option<E>)>,
}

/// Read-only copy of a graph handed to renderers: live nodes and live edges,
/// keyed by serial.
#[derive(Clone, Debug, PartialEq)]
pub struct GraphView<N, E> {
    pub nodes: Vec<(Serial, N)>,
    pub edges: Vec<(Serial, Serial, Option<E>)>,
}

#[derive(Clone, Debug)]
/// A directed multigraph with labeled nodes and optionally labeled edges.
///
/// Nodes live in slots. Removing a node leaves a tombstone in its slot so
/// that every other handle stays valid; [`LabeledDigraph::compact`] purges the
/// tombstones. Two edges may join the same ordered pair as long as their labels
/// differ: an edge is keyed by (source, target, label).
pub struct LabeledDigraph<N, E> {
    slots: Vec<Slot<N, E>>,
    /// Live serials and where they are stored.
    serials: HashMap<Serial, NodeId>,
    /// Bumped by every compaction that moves nodes.
    epoch: u32,
    live: usize,
    edge_count: usize,
}

impl<N, E> Default for LabeledDigraph<N, E> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            serials: HashMap::new(),
            epoch: 0,
            live: 0,
            edge_count: 0,
        }
    }
}

impl<N, E> LabeledDigraph<N, E> {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, id: NodeId) -> Result<&Slot<N, E>, Error> {
        if id.epoch() != self.epoch {
            return Err(Error::InvalidReference(id));
        }
        match self.slots.get(id.index()) {
            Some(slot) if slot.node.is_some() => Ok(slot),
            _ => Err(Error::InvalidReference(id)),
        }
    }

    fn handle(&self, index: usize) -> NodeId {
        NodeId::new(index, self.epoch)
    }

    /// Add a node under an explicit serial.
    pub fn add_node(&mut self, serial: Serial, label: N) -> Result<NodeId, Error> {
        if self.serials.contains_key(&serial) {
            return Err(Error::DuplicateNode(serial));
        }
        let id = self.handle(self.slots.len());
        self.slots.push(Slot {
            node: Some(Node::new(serial, label)),
            out: Vec::new(),
        });
        self.serials.insert(serial, id);
        self.live += 1;
        Ok(id)
    }

    /// Add a node named by the next serial of `sequence`.
    pub fn insert_node(&mut self, sequence: &mut Sequence, label: N) -> Result<NodeId, Error> {
        self.add_node(sequence.next(), label)
    }

    /// Remove a node together with every edge that starts or ends at it.
    /// The slot stays behind as a tombstone until the next compaction.
    pub fn remove_node(&mut self, id: NodeId) -> Result<Node<N>, Error> {
        self.slot(id)?;
        let slot = &mut self.slots[id.index()];
        let node = match slot.node.take() {
            Some(node) => node,
            None => return Err(Error::InvalidReference(id)),
        };
        let mut removed = slot.out.len();
        slot.out.clear();
        for other in self.slots.iter_mut() {
            let before = other.out.len();
            other.out.retain(|(target, _)| *target != id);
            removed += before - other.out.len();
        }
        // Self-loops were counted once from the node's own list and are gone
        // from it before the sweep, so nothing is counted twice.
        self.edge_count -= removed;
        self.serials.remove(&node.serial);
        self.live -= 1;
        Ok(node)
    }

    pub fn has_node(&self, id: NodeId) -> bool {
        self.slot(id).is_ok()
    }

    pub fn node(&self, id: NodeId) -> Result<&Node<N>, Error> {
        self.slot(id)?
            .node
            .as_ref()
            .ok_or(Error::InvalidReference(id))
    }

    pub fn label(&self, id: NodeId) -> Result<&N, Error> {
        Ok(&self.node(id)?.label)
    }

    pub fn serial(&self, id: NodeId) -> Result<Serial, Error> {
        Ok(self.node(id)?.serial)
    }

    /// Look a live node up by its serial.
    pub fn find(&self, serial: Serial) -> Option<NodeId> {
        self.serials.get(&serial).copied()
    }

    /// Number of live nodes.
    pub fn order(&self) -> usize {
        self.live
    }

    /// Number of edges.
    pub fn size(&self) -> usize {
        self.edge_count
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Number of dead slots waiting for [`LabeledDigraph::compact`].
    pub fn tombstones(&self) -> usize {
        self.slots.len() - self.live
    }

    /// Highest serial among the live nodes.
    pub fn max_serial(&self) -> Option<Serial> {
        self.serials.keys().max().copied()
    }

    /// Live nodes in slot order.
    pub fn nodes<'a>(&'a self) -> impl Iterator<Item = (NodeId, &'a Node<N>)> + 'a {
        self.slots
            .iter()
            .enumerate()
            .filter_map(move |(i, slot)| slot.node.as_ref().map(|node| (self.handle(i), node)))
    }

    /// Every edge as (source, target, label).
    pub fn edges<'a>(&'a self) -> impl Iterator<Item = (NodeId, NodeId, Option<&'a E>)> + 'a {
        self.slots.iter().enumerate().flat_map(move |(i, slot)| {
            let source = self.handle(i);
            slot.out
                .iter()
                .map(move |(target, label)| (source, *target, label.as_ref()))
        })
    }

    /// Outgoing edges of `id` as (target, label).
    pub fn out_edges(&self, id: NodeId) -> Result<Vec<(NodeId, Option<&E>)>, Error> {
        Ok(self
            .slot(id)?
            .out
            .iter()
            .map(|(target, label)| (*target, label.as_ref()))
            .collect())
    }

    /// Incoming edges of `id` as (source, label). Scans every adjacency list.
    pub fn in_edges(&self, id: NodeId) -> Result<Vec<(NodeId, Option<&E>)>, Error> {
        self.slot(id)?;
        Ok(self
            .edges()
            .filter(|(_, target, _)| *target == id)
            .map(|(source, _, label)| (source, label))
            .collect())
    }

    /// Distinct targets of the outgoing edges of `id`.
    pub fn children(&self, id: NodeId) -> Result<Vec<NodeId>, Error> {
        let mut children = Vec::new();
        for (target, _) in self.out_edges(id)? {
            if !children.contains(&target) {
                children.push(target);
            }
        }
        Ok(children)
    }

    /// Distinct sources of the incoming edges of `id`.
    pub fn parents(&self, id: NodeId) -> Result<Vec<NodeId>, Error> {
        let mut parents = Vec::new();
        for (source, _) in self.in_edges(id)? {
            if !parents.contains(&source) {
                parents.push(source);
            }
        }
        Ok(parents)
    }

    /// Children followed by parents. A node that is both appears twice.
    pub fn adjacencies(&self, id: NodeId) -> Result<Vec<NodeId>, Error> {
        let mut adjacent = self.children(id)?;
        adjacent.extend(self.parents(id)?);
        Ok(adjacent)
    }

    /// Labels of every edge from `a` to `b`.
    pub fn edge_labels<'a>(
        &'a self,
        a: NodeId,
        b: NodeId,
    ) -> impl Iterator<Item = Option<&'a E>> + 'a {
        self.slot(a)
            .ok()
            .into_iter()
            .flat_map(|slot| slot.out.iter())
            .filter(move |(target, _)| *target == b)
            .map(|(_, label)| label.as_ref())
    }

    /// Label of the first edge from `a` to `b`, or `None` if there is no edge.
    pub fn edge_label(&self, a: NodeId, b: NodeId) -> Option<Option<&E>> {
        self.edge_labels(a, b).next()
    }

    /// Rebuild the storage with only the live nodes, renumbered densely in
    /// their current order. Returns where every live node moved to; handles not
    /// in the map are no longer valid.
    pub fn compact(&mut self) -> HashMap<NodeId, NodeId> {
        if self.tombstones() == 0 {
            return self.nodes().map(|(id, _)| (id, id)).collect();
        }
        let epoch = self.epoch.wrapping_add(1);
        let mut remap = HashMap::with_capacity(self.live);
        let mut next = 0;
        for (i, slot) in self.slots.iter().enumerate() {
            if slot.node.is_some() {
                remap.insert(self.handle(i), NodeId::new(next, epoch));
                next += 1;
            }
        }
        let slots = std::mem::take(&mut self.slots);
        self.slots = slots
            .into_iter()
            .filter(|slot| slot.node.is_some())
            .map(|slot| Slot {
                out: slot
                    .out
                    .into_iter()
                    .map(|(target, label)| (remap[&target], label))
                    .collect(),
                node: slot.node,
            })
            .collect();
        for id in self.serials.values_mut() {
            *id = remap[&*id];
        }
        self.epoch = epoch;
        log::trace!("compacted graph to {} nodes, epoch {}", self.live, epoch);
        remap
    }
}

impl<N, E: PartialEq> LabeledDigraph<N, E> {
    /// Add an edge. Returns `false` when an edge with the same endpoints and
    /// label already exists, in which case nothing changes.
    pub fn add_edge(&mut self, src: NodeId, dst: NodeId, label: Option<E>) -> Result<bool, Error> {
        self.slot(dst)?;
        self.slot(src)?;
        let out = &mut self.slots[src.index()].out;
        if out.iter().any(|(target, l)| *target == dst && *l == label) {
            return Ok(false);
        }
        out.push((dst, label));
        self.edge_count += 1;
        Ok(true)
    }

    /// True if there is an edge from `a` to `b` carrying exactly `label`.
    /// Dead handles never have edges.
    pub fn has_edge(&self, a: NodeId, b: NodeId, label: Option<&E>) -> bool {
        self.edge_labels(a, b).any(|l| l == label)
    }
}

impl<N: Clone, E: Clone + PartialEq> LabeledDigraph<N, E> {
    /// Build a graph holding one node per pattern node, named from `sequence`.
    /// The returned handles line up with the pattern's node indices.
    pub fn from_pattern(
        pattern: &Pattern<N, E>,
        sequence: &mut Sequence,
    ) -> Result<(Self, Vec<NodeId>), Error> {
        let mut graph = Self::new();
        let ids = graph.instantiate(pattern, sequence)?;
        Ok((graph, ids))
    }

    /// Insert a fresh copy of `pattern`: its nodes, then its internal edges.
    pub fn instantiate(
        &mut self,
        pattern: &Pattern<N, E>,
        sequence: &mut Sequence,
    ) -> Result<Vec<NodeId>, Error> {
        let ids = pattern
            .labels()
            .iter()
            .map(|label| self.insert_node(sequence, label.clone()))
            .collect::<Result<Vec<_>, _>>()?;
        for edge in pattern.edges() {
            self.add_edge(ids[edge.from], ids[edge.to], edge.label.clone())?;
        }
        Ok(ids)
    }
}

impl<N: Clone, E: Clone> LabeledDigraph<N, E> {
    /// Copy out the live nodes and edges for a renderer.
    pub fn snapshot(&self) -> GraphView<N, E> {
        let nodes = self
            .nodes()
            .map(|(_, node)| (node.serial, node.label.clone()))
            .collect();
        let edges = self
            .edges()
            .filter_map(|(source, target, label)| {
                let source = self.serial(source).ok()?;
                let target = self.serial(target).ok()?;
                Some((source, target, label.cloned()))
            })
            .collect();
        GraphView { nodes, edges }
    }
}
