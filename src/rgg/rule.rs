use crate::rgg::matcher::{find_embeddings, MatchingState};
use crate::rgg::procedures::Splice;
use crate::rgg::ruleset::Derivation;
use crate::rgg::{Error, LabeledDigraph, NodeId};
use rand::seq::SliceRandom;
use rand::Rng;

/// An edge of a [`Pattern`], between node indices.
#[derive(Clone, Debug, PartialEq)]
pub struct PatternEdge<E> {
    pub from: usize,
    pub to: usize,
    pub label: Option<E>,
}

impl<E> PatternEdge<E> {
    pub fn new(from: usize, to: usize) -> Self {
        Self {
            from,
            to,
            label: None,
        }
    }

    pub fn labeled(from: usize, to: usize, label: E) -> Self {
        Self {
            from,
            to,
            label: Some(label),
        }
    }
}

/// A small graph given by a list of node labels and edges between list
/// indices. Serves both as the left-hand side (what to look for) and the
/// right-hand side (what to put in its place) of a [`Rule`].
#[derive(Clone, Debug, PartialEq)]
pub struct Pattern<N, E> {
    nodes: Vec<N>,
    edges: Vec<PatternEdge<E>>,
}

impl<N, E> Pattern<N, E> {
    pub fn new(nodes: Vec<N>, edges: Vec<PatternEdge<E>>) -> Result<Self, Error> {
        let len = nodes.len();
        if let Some(edge) = edges.iter().find(|e| e.from >= len || e.to >= len) {
            return Err(Error::InvalidPattern {
                from: edge.from,
                to: edge.to,
                len,
            });
        }
        Ok(Self { nodes, edges })
    }

    /// Shorthand for a pattern whose edges carry no label.
    pub fn unlabeled(nodes: Vec<N>, edges: &[(usize, usize)]) -> Result<Self, Error> {
        let edges = edges
            .iter()
            .map(|(from, to)| PatternEdge::new(*from, *to))
            .collect();
        Self::new(nodes, edges)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn label(&self, index: usize) -> Option<&N> {
        self.nodes.get(index)
    }

    pub fn labels(&self) -> &[N] {
        &self.nodes
    }

    pub fn edges(&self) -> &[PatternEdge<E>] {
        &self.edges
    }

    /// Edges leaving node `index`.
    pub fn children(&self, index: usize) -> impl Iterator<Item = &PatternEdge<E>> {
        self.edges.iter().filter(move |e| e.from == index)
    }
}

/// What a single call to [`Rule::apply`] did.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Application {
    /// How many matches were rewritten.
    pub rewrites: usize,
    /// Handles of the inserted nodes that are still live, valid for the
    /// compacted graph.
    pub created: Vec<NodeId>,
}

/// A production: find `pattern`, replace it with `replacement`.
///
/// `embed_in` and `embed_out` are (pattern index, replacement index) pairs.
/// Each incoming edge of a matched pattern node listed in `embed_in` is moved
/// onto the listed replacement node, and likewise for outgoing edges and
/// `embed_out`.
#[derive(Clone, Debug)]
pub struct Rule<N, E> {
    name: Option<String>,
    pattern: Pattern<N, E>,
    replacement: Pattern<N, E>,
    embed_in: Vec<(usize, usize)>,
    embed_out: Vec<(usize, usize)>,
    weight: f64,
    limit: Option<usize>,
    applied: usize,
}

impl<N, E> Rule<N, E> {
    /// Build a rule with weight 1, no limit, and the default embedding: parents
    /// of the first pattern node go to the first replacement node, children of
    /// the last pattern node hang off the last replacement node.
    pub fn new(pattern: Pattern<N, E>, replacement: Pattern<N, E>) -> Self {
        let (embed_in, embed_out) = if pattern.is_empty() || replacement.is_empty() {
            (vec![], vec![])
        } else {
            (
                vec![(0, 0)],
                vec![(pattern.len() - 1, replacement.len() - 1)],
            )
        };
        Self {
            name: None,
            pattern,
            replacement,
            embed_in,
            embed_out,
            weight: 1.0,
            limit: None,
            applied: 0,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_embedding(
        mut self,
        embed_in: Vec<(usize, usize)>,
        embed_out: Vec<(usize, usize)>,
    ) -> Result<Self, Error> {
        for (lhs, rhs) in embed_in.iter().chain(embed_out.iter()).copied() {
            if lhs >= self.pattern.len() || rhs >= self.replacement.len() {
                return Err(Error::InvalidEmbedding {
                    lhs,
                    rhs,
                    lhs_len: self.pattern.len(),
                    rhs_len: self.replacement.len(),
                });
            }
        }
        self.embed_in = embed_in;
        self.embed_out = embed_out;
        Ok(self)
    }

    pub fn with_weight(mut self, weight: f64) -> Result<Self, Error> {
        self.set_weight(weight)?;
        Ok(self)
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn set_weight(&mut self, weight: f64) -> Result<(), Error> {
        if !weight.is_finite() || weight < 0.0 {
            return Err(Error::InvalidWeight(weight));
        }
        self.weight = weight;
        Ok(())
    }

    pub fn set_limit(&mut self, limit: Option<usize>) {
        self.limit = limit;
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn pattern(&self) -> &Pattern<N, E> {
        &self.pattern
    }

    pub fn replacement(&self) -> &Pattern<N, E> {
        &self.replacement
    }

    pub fn embed_in(&self) -> &[(usize, usize)] {
        &self.embed_in
    }

    pub fn embed_out(&self) -> &[(usize, usize)] {
        &self.embed_out
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// How many times `apply` has been called since the last reset.
    pub fn applied(&self) -> usize {
        self.applied
    }

    /// True while the firing limit has not been reached.
    pub fn has_budget(&self) -> bool {
        self.limit.map_or(true, |limit| self.applied < limit)
    }

    pub fn reset(&mut self) {
        self.applied = 0;
    }

    fn describe(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("{}->{}", self.pattern.len(), self.replacement.len()),
        }
    }
}

impl<N: PartialEq, E: PartialEq> Rule<N, E> {
    pub fn matches<'a>(&'a self, graph: &'a LabeledDigraph<N, E>) -> MatchingState<'a, N, E> {
        MatchingState::new(graph, &self.pattern)
    }

    /// True if the rule still has firings left and its pattern occurs in
    /// `graph`.
    pub fn can_apply(&self, graph: &LabeledDigraph<N, E>) -> bool {
        self.has_budget() && self.matches(graph).next().is_some()
    }
}

impl<N: Clone + PartialEq, E: Clone + PartialEq> Rule<N, E> {
    /// Rewrite up to `count` occurrences of the pattern, one at a time. Before
    /// each rewrite the occurrences are searched afresh and one is picked
    /// uniformly at random, so no rewrite ever acts on nodes an earlier one
    /// removed. The call counts as a single firing however many rewrites it
    /// made, and the graph is compacted once at the end.
    pub fn apply<R: Rng>(
        &mut self,
        graph: &mut LabeledDigraph<N, E>,
        derivation: &mut Derivation<R>,
        count: usize,
    ) -> Result<Application, Error> {
        let mut rewrites = 0;
        let mut created = Vec::new();
        for _ in 0..count {
            let embeddings = find_embeddings(graph, &self.pattern);
            let embedding = match embeddings.choose(&mut derivation.rng) {
                Some(embedding) => embedding,
                None => break,
            };
            log::debug!(
                "rule {} rewriting one of {} matches: {:?}",
                self.describe(),
                embeddings.len(),
                embedding
            );
            let splice = Splice::capture(graph, embedding, &self.embed_in, &self.embed_out)?;
            created.extend(splice.perform(graph, &self.replacement, &mut derivation.sequence)?);
            rewrites += 1;
        }
        self.applied += 1;

        let remap = graph.compact();
        let created = created
            .into_iter()
            .filter_map(|id| remap.get(&id).copied())
            .collect();
        Ok(Application { rewrites, created })
    }
}
