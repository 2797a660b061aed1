use crate::rgg::rule::{Pattern, PatternEdge};
use crate::rgg::{LabeledDigraph, NodeId};

/// Host nodes assigned to a pattern, indexed by pattern node.
pub type Embedding = Vec<NodeId>;

/// Every embedding of `pattern` in `graph`.
pub fn find_embeddings<N: PartialEq, E: PartialEq>(
    graph: &LabeledDigraph<N, E>,
    pattern: &Pattern<N, E>,
) -> Vec<Embedding> {
    MatchingState::new(graph, pattern).collect()
}

/// Search configuration. The default searches without bound.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Matcher {
    step_budget: Option<usize>,
}

/// Result of a [`Matcher::search`].
#[derive(Clone, Debug, PartialEq)]
pub struct Search {
    pub embeddings: Vec<Embedding>,
    /// False if the step budget ran out before the search space did.
    pub complete: bool,
}

impl Matcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop after trying `budget` candidate placements.
    pub fn with_step_budget(budget: usize) -> Self {
        Self {
            step_budget: Some(budget),
        }
    }

    pub fn search<N: PartialEq, E: PartialEq>(
        &self,
        graph: &LabeledDigraph<N, E>,
        pattern: &Pattern<N, E>,
    ) -> Search {
        let mut state = MatchingState::new(graph, pattern);
        state.budget = self.step_budget;
        let embeddings = state.by_ref().collect();
        Search {
            embeddings,
            complete: !state.exhausted,
        }
    }
}

pub enum MatchingDecision {
    NoMatch,
    Continue,
    Mapped,
}

/// Backtracking search state. Pattern nodes are placed in index order; each
/// call to [`MatchingState::continue_search`] either places the next one,
/// backs up one level, or reports a complete assignment.
pub struct MatchingState<'a, N, E> {
    graph: &'a LabeledDigraph<N, E>,
    pattern: &'a Pattern<N, E>,
    /// Host nodes that may stand in for each pattern node.
    candidates: Vec<Vec<NodeId>>,
    /// Pattern edges whose later endpoint is the given pattern index; they
    /// become checkable once that index is placed.
    closing: Vec<Vec<&'a PatternEdge<E>>>,
    /// Current partial assignment.
    mapping: Vec<NodeId>,
    /// Next candidate to try for each pattern index.
    progress: Vec<usize>,
    steps: usize,
    budget: Option<usize>,
    exhausted: bool,
    finished: bool,
}

impl<'a, N: PartialEq, E: PartialEq> MatchingState<'a, N, E> {
    pub fn new(graph: &'a LabeledDigraph<N, E>, pattern: &'a Pattern<N, E>) -> Self {
        let mut closing = vec![Vec::new(); pattern.len()];
        for edge in pattern.edges() {
            closing[edge.from.max(edge.to)].push(edge);
        }

        Self {
            graph,
            pattern,
            candidates: prune(graph, pattern),
            closing,
            mapping: Vec::with_capacity(pattern.len()),
            progress: vec![0; pattern.len()],
            steps: 0,
            budget: None,
            exhausted: false,
            finished: false,
        }
    }

    /// Number of candidate placements tried so far.
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Check the edges closed by putting `candidate` at pattern index `depth`.
    fn consistent(&self, depth: usize, candidate: NodeId) -> bool {
        let place = |i: usize| if i == depth { candidate } else { self.mapping[i] };
        self.closing[depth].iter().all(|edge| {
            self.graph
                .has_edge(place(edge.from), place(edge.to), edge.label.as_ref())
        })
    }

    pub fn continue_search(&mut self) -> MatchingDecision {
        if self.finished {
            return MatchingDecision::NoMatch;
        }
        let depth = self.mapping.len();
        if depth == self.pattern.len() {
            return MatchingDecision::Mapped;
        }

        let start = self.progress[depth];
        for i in start..self.candidates[depth].len() {
            if let Some(budget) = self.budget {
                if self.steps >= budget {
                    log::warn!("Pattern search stopped after {} steps", self.steps);
                    self.exhausted = true;
                    self.finished = true;
                    return MatchingDecision::NoMatch;
                }
            }
            self.steps += 1;

            let candidate = self.candidates[depth][i];
            if self.mapping.contains(&candidate) || !self.consistent(depth, candidate) {
                continue;
            }
            log::trace!("Tentatively mapping {} -> {}", depth, candidate);
            self.progress[depth] = i + 1;
            self.mapping.push(candidate);
            return MatchingDecision::Continue;
        }

        // Out of candidates here: rewind this level and back up one.
        self.progress[depth] = 0;
        if self.mapping.pop().is_none() {
            self.finished = true;
            return MatchingDecision::NoMatch;
        }
        MatchingDecision::Continue
    }

    /// Drop the last placement so the search can move past a reported match.
    fn reset_match(&mut self) {
        if self.mapping.pop().is_none() {
            // Only the empty pattern is complete with nothing placed.
            self.finished = true;
        }
    }
}

impl<N: PartialEq, E: PartialEq> Iterator for MatchingState<'_, N, E> {
    type Item = Embedding;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.continue_search() {
                MatchingDecision::NoMatch => return None,
                MatchingDecision::Continue => {}
                MatchingDecision::Mapped => {
                    let output = self.mapping.clone();
                    self.reset_match();
                    return Some(output);
                }
            }
        }
    }
}

/// Host nodes that could play each pattern node: same label, and for every
/// outgoing pattern edge an outgoing host edge with the same label towards a
/// node with the right label. Necessary but not sufficient; the search checks
/// the actual assignment.
fn prune<N: PartialEq, E: PartialEq>(
    graph: &LabeledDigraph<N, E>,
    pattern: &Pattern<N, E>,
) -> Vec<Vec<NodeId>> {
    pattern
        .labels()
        .iter()
        .enumerate()
        .map(|(p, label)| {
            graph
                .nodes()
                .filter(|(_, node)| node.label == *label)
                .filter(|(id, _)| {
                    let out = graph.out_edges(*id).unwrap_or_default();
                    pattern.children(p).all(|edge| {
                        out.iter().any(|(target, l)| {
                            *l == edge.label.as_ref()
                                && graph.label(*target).ok() == pattern.label(edge.to)
                        })
                    })
                })
                .map(|(id, _)| id)
                .collect()
        })
        .collect()
}
