use crate::rgg::rule::Pattern;
use crate::rgg::{Error, LabeledDigraph, NodeId, Sequence};

/// An edge between the match and the rest of the graph, waiting to be
/// reattached to a replacement node.
#[derive(Debug, Clone, PartialEq)]
struct BoundaryEdge<E> {
    /// Replacement node index that inherits the edge.
    target: usize,
    /// The node outside the match.
    other: NodeId,
    label: Option<E>,
}

/// A rewrite in progress: the matched nodes and the boundary edges recorded
/// before they are deleted.
///
/// Edges whose other end lies inside the match are not recorded; the
/// replacement brings its own internal edges.
#[derive(Debug)]
pub struct Splice<E> {
    matched: Vec<NodeId>,
    incoming: Vec<BoundaryEdge<E>>,
    outgoing: Vec<BoundaryEdge<E>>,
}

impl<E: Clone> Splice<E> {
    /// Record the boundary of `embedding`. `embed_in` and `embed_out` pair
    /// pattern indices with the replacement indices that inherit their
    /// incoming and outgoing edges.
    pub fn capture<N>(
        graph: &LabeledDigraph<N, E>,
        embedding: &[NodeId],
        embed_in: &[(usize, usize)],
        embed_out: &[(usize, usize)],
    ) -> Result<Self, Error> {
        let outside = |id: &NodeId| !embedding.contains(id);

        let mut incoming = Vec::new();
        for (lhs, rhs) in embed_in.iter().copied() {
            for (parent, label) in graph.in_edges(embedding[lhs])? {
                if outside(&parent) {
                    incoming.push(BoundaryEdge {
                        target: rhs,
                        other: parent,
                        label: label.cloned(),
                    });
                }
            }
        }

        let mut outgoing = Vec::new();
        for (lhs, rhs) in embed_out.iter().copied() {
            for (child, label) in graph.out_edges(embedding[lhs])? {
                if outside(&child) {
                    outgoing.push(BoundaryEdge {
                        target: rhs,
                        other: child,
                        label: label.cloned(),
                    });
                }
            }
        }

        Ok(Self {
            matched: embedding.to_vec(),
            incoming,
            outgoing,
        })
    }
}

impl<E: Clone + PartialEq> Splice<E> {
    /// Delete the matched nodes, insert `replacement` and hook the recorded
    /// boundary back up. Returns the handles of the inserted nodes, in
    /// replacement order.
    pub fn perform<N: Clone>(
        self,
        graph: &mut LabeledDigraph<N, E>,
        replacement: &Pattern<N, E>,
        sequence: &mut Sequence,
    ) -> Result<Vec<NodeId>, Error> {
        for id in &self.matched {
            graph.remove_node(*id)?;
        }

        let created = graph.instantiate(replacement, sequence)?;

        for edge in self.incoming {
            graph.add_edge(edge.other, created[edge.target], edge.label)?;
        }
        for edge in self.outgoing {
            graph.add_edge(created[edge.target], edge.other, edge.label)?;
        }
        log::trace!(
            "replaced {} nodes with {:?}",
            self.matched.len(),
            created
        );
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rgg::Serial;

    /// A triangle 0 -> 1 -> 2 -> 0 plus an outside node 3 -> 1.
    fn get_simple_graph() -> (LabeledDigraph<&'static str, u8>, Vec<NodeId>) {
        let mut seq = Sequence::new();
        let mut graph = LabeledDigraph::new();
        let ids = ["a", "b", "c", "d"]
            .iter()
            .map(|l| graph.insert_node(&mut seq, *l).unwrap())
            .collect::<Vec<_>>();
        graph.add_edge(ids[0], ids[1], Some(1)).unwrap();
        graph.add_edge(ids[1], ids[2], Some(2)).unwrap();
        graph.add_edge(ids[2], ids[0], Some(3)).unwrap();
        graph.add_edge(ids[3], ids[1], Some(4)).unwrap();
        (graph, ids)
    }

    #[test]
    fn test_capture_skips_internal_edges() {
        let (graph, ids) = get_simple_graph();
        let splice = Splice::capture(&graph, &[ids[0], ids[1]], &[(0, 0), (1, 0)], &[(1, 0)])
            .unwrap();
        assert_eq!(
            splice.incoming,
            vec![
                BoundaryEdge {
                    target: 0,
                    other: ids[2],
                    label: Some(3)
                },
                BoundaryEdge {
                    target: 0,
                    other: ids[3],
                    label: Some(4)
                },
            ]
        );
        assert_eq!(
            splice.outgoing,
            vec![BoundaryEdge {
                target: 0,
                other: ids[2],
                label: Some(2)
            }]
        );
    }

    #[test]
    fn test_perform() {
        let (mut graph, ids) = get_simple_graph();
        let splice = Splice::capture(&graph, &[ids[1]], &[(0, 1)], &[(0, 0)]).unwrap();
        let replacement = Pattern::unlabeled(vec!["x", "y"], &[(1, 0)]).unwrap();
        let mut seq = Sequence::starting_at(100);
        let created = splice.perform(&mut graph, &replacement, &mut seq).unwrap();

        assert_eq!(graph.order(), 5);
        assert_eq!(graph.tombstones(), 1);
        assert_eq!(graph.serial(created[0]), Ok(Serial(100)));
        assert!(graph.has_edge(created[1], created[0], None));
        assert!(graph.has_edge(ids[0], created[1], Some(&1)));
        assert!(graph.has_edge(ids[3], created[1], Some(&4)));
        assert!(graph.has_edge(created[0], ids[2], Some(&2)));
        assert!(graph.has_edge(ids[2], ids[0], Some(&3)));
        assert_eq!(graph.size(), 5);
    }
}
