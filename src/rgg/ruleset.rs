use crate::rgg::serde::RawRule;
use crate::rgg::{Error, LabeledDigraph, Rule, Sequence};
use anyhow::Context;
use rand::Rng;
use serde::de::DeserializeOwned;

/// Everything a derivation session threads through rule applications: the
/// random source for match and rule choice, and the serial sequence for new
/// nodes.
#[derive(Debug)]
pub struct Derivation<R> {
    pub rng: R,
    pub sequence: Sequence,
}

impl<R: Rng> Derivation<R> {
    pub fn new(rng: R, sequence: Sequence) -> Self {
        Self { rng, sequence }
    }

    /// Start a session on an existing graph; new serials begin after the
    /// highest one already present.
    pub fn for_graph<N, E>(rng: R, graph: &LabeledDigraph<N, E>) -> Self {
        let first = graph.max_serial().map_or(0, |serial| serial.0 + 1);
        Self::new(rng, Sequence::starting_at(first))
    }
}

/// How a call to [`RuleSet::apply`] ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Outcome {
    /// Derivation steps performed.
    pub steps: usize,
    /// True if the run stopped early because no rule could fire.
    pub halted: bool,
}

/// Pick an index with probability proportional to its weight. Draws uniformly
/// from `[0, total)` and returns the first index whose running total reaches
/// the draw. Indices with a zero weight are never picked; `None` if every
/// weight is zero.
///
/// Weights are divided by the largest one first so that the total stays
/// finite however large the individual weights are.
pub fn select_weighted<R: Rng + ?Sized>(rng: &mut R, weights: &[f64]) -> Option<usize> {
    let usable = |w: f64| w.is_finite() && w > 0.0;
    let scale = weights
        .iter()
        .copied()
        .filter(|w| usable(*w))
        .fold(0.0, f64::max);
    if scale == 0.0 {
        return None;
    }
    let total: f64 = weights
        .iter()
        .copied()
        .filter(|w| usable(*w))
        .map(|w| w / scale)
        .sum();
    let draw = rng.gen_range(0.0..total);
    let mut running = 0.0;
    for (i, weight) in weights.iter().copied().enumerate() {
        if !usable(weight) {
            continue;
        }
        running += weight / scale;
        if running >= draw {
            return Some(i);
        }
    }
    // Rounding can leave the running total a hair short of the draw.
    weights.iter().rposition(|w| usable(*w))
}

/// An ordered collection of rules driving a derivation.
#[derive(Clone, Debug)]
pub struct RuleSet<N, E> {
    rules: Vec<Rule<N, E>>,
}

impl<N, E> Default for RuleSet<N, E> {
    fn default() -> Self {
        Self { rules: Vec::new() }
    }
}

impl<N, E> RuleSet<N, E> {
    pub fn new(rules: Vec<Rule<N, E>>) -> Self {
        Self { rules }
    }

    pub fn push(&mut self, rule: Rule<N, E>) {
        self.rules.push(rule);
    }

    pub fn rules(&self) -> &[Rule<N, E>] {
        &self.rules
    }

    pub fn rules_mut(&mut self) -> &mut [Rule<N, E>] {
        &mut self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Clear every rule's firing counter before an independent run.
    pub fn reset(&mut self) {
        self.rules.iter_mut().for_each(Rule::reset);
    }
}

impl<N: DeserializeOwned, E: DeserializeOwned> RuleSet<N, E> {
    /// Read a rule set from its YAML description.
    pub fn from_yaml(text: &str) -> anyhow::Result<Self> {
        let raw: Vec<RawRule<N, E>> =
            serde_yaml::from_str(text).context("Could not parse rule set")?;
        let rules = raw
            .into_iter()
            .enumerate()
            .map(|(i, raw)| raw.into_rule().with_context(|| format!("Invalid rule #{}", i)))
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Self::new(rules))
    }
}

impl<N: Clone + PartialEq, E: Clone + PartialEq> RuleSet<N, E> {
    /// Run up to `steps` derivation steps. Each step picks one rule that can
    /// currently fire, weighted by rule weight, and applies it once. Stops
    /// early when no rule can fire.
    pub fn apply<R: Rng>(
        &mut self,
        graph: &mut LabeledDigraph<N, E>,
        derivation: &mut Derivation<R>,
        steps: usize,
    ) -> Result<Outcome, Error> {
        for step in 0..steps {
            let feasible = self
                .rules
                .iter()
                .enumerate()
                .filter(|(_, rule)| rule.can_apply(graph))
                .map(|(i, _)| i)
                .collect::<Vec<_>>();
            let weights = feasible
                .iter()
                .map(|i| self.rules[*i].weight())
                .collect::<Vec<_>>();

            let chosen = match select_weighted(&mut derivation.rng, &weights) {
                Some(pick) => feasible[pick],
                None => {
                    log::info!("No rule can fire, derivation halted after {} steps", step);
                    return Ok(Outcome {
                        steps: step,
                        halted: true,
                    });
                }
            };
            log::debug!(
                "Step {}: rule #{} chosen from {} candidates",
                step,
                chosen,
                feasible.len()
            );
            self.rules[chosen].apply(graph, derivation, 1)?;
        }
        Ok(Outcome {
            steps,
            halted: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::start_logger;
    use crate::rgg::Pattern;
    use ntest::timeout;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use simplelog::LevelFilter;

    type Graph = LabeledDigraph<String, String>;

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn get_seed_graph(seq: &mut Sequence) -> Graph {
        let pattern =
            Pattern::unlabeled(labels(&["START", "X", "GOAL"]), &[(0, 1), (1, 2)]).unwrap();
        let mut graph = Graph::new();
        graph.instantiate(&pattern, seq).unwrap();
        graph
    }

    fn count_label(graph: &Graph, label: &str) -> usize {
        graph.nodes().filter(|(_, n)| n.label == label).count()
    }

    #[test]
    fn test_select_weighted_distribution() {
        let mut rng = StdRng::seed_from_u64(42);
        let trials = 40_000;
        let mut hits = [0usize; 2];
        for _ in 0..trials {
            hits[select_weighted(&mut rng, &[1.0, 3.0]).unwrap()] += 1;
        }
        let share = hits[1] as f64 / trials as f64;
        assert!((share - 0.75).abs() < 0.02, "share was {}", share);
    }

    #[test]
    fn test_select_weighted_skips_zero() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..100 {
            assert_eq!(select_weighted(&mut rng, &[0.0, 2.0, 0.0]), Some(1));
        }
        assert_eq!(select_weighted(&mut rng, &[0.0, 0.0]), None);
        assert_eq!(select_weighted(&mut rng, &[]), None);
    }

    #[test]
    fn test_select_weighted_huge_weights() {
        let mut rng = StdRng::seed_from_u64(8);
        let mut hits = [0usize; 3];
        for _ in 0..1000 {
            let pick = select_weighted(&mut rng, &[f64::MAX, 0.0, f64::MAX]).unwrap();
            hits[pick] += 1;
        }
        assert_eq!(hits[1], 0);
        assert!(hits[0] > 400 && hits[2] > 400, "{:?}", hits);
    }

    #[test]
    fn test_huge_weights_keep_derivation_going() {
        let mut sequence = Sequence::new();
        let mut graph = get_seed_graph(&mut sequence);
        let mut derivation = Derivation::new(StdRng::seed_from_u64(4), sequence);
        let keep = || {
            Rule::new(
                Pattern::unlabeled(labels(&["X"]), &[]).unwrap(),
                Pattern::unlabeled(labels(&["X"]), &[]).unwrap(),
            )
            .with_weight(f64::MAX)
            .unwrap()
        };
        let mut rules = RuleSet::new(vec![keep(), keep()]);
        let outcome = rules.apply(&mut graph, &mut derivation, 3).unwrap();
        assert_eq!(
            outcome,
            Outcome {
                steps: 3,
                halted: false
            }
        );
        assert_eq!(rules.rules()[0].applied() + rules.rules()[1].applied(), 3);
    }

    #[test]
    #[timeout(20000)]
    fn test_rule_choice_follows_weights() {
        let mut sequence = Sequence::new();
        let mut graph = get_seed_graph(&mut sequence);
        let mut derivation = Derivation::new(StdRng::seed_from_u64(17), sequence);
        let keep = |weight: f64| {
            Rule::new(
                Pattern::unlabeled(labels(&["X"]), &[]).unwrap(),
                Pattern::unlabeled(labels(&["X"]), &[]).unwrap(),
            )
            .with_weight(weight)
            .unwrap()
        };
        let mut rules = RuleSet::new(vec![keep(1.0), keep(3.0)]);
        let steps = 4000;
        let outcome = rules.apply(&mut graph, &mut derivation, steps).unwrap();
        assert_eq!(outcome.steps, steps);
        assert_eq!(graph.order(), 3);

        let light = rules.rules()[0].applied();
        let heavy = rules.rules()[1].applied();
        assert_eq!(light + heavy, steps);
        let share = heavy as f64 / steps as f64;
        assert!((share - 0.75).abs() < 0.03, "share was {}", share);
    }

    #[test]
    #[timeout(2000)]
    fn test_limits_stop_derivation() {
        let _ = start_logger(LevelFilter::Debug);
        let mut sequence = Sequence::new();
        let mut graph = get_seed_graph(&mut sequence);
        let mut derivation = Derivation::new(StdRng::seed_from_u64(9), sequence);
        let stretch = Rule::new(
            Pattern::unlabeled(labels(&["X"]), &[]).unwrap(),
            Pattern::unlabeled(labels(&["X", "X"]), &[(0, 1)]).unwrap(),
        )
        .with_limit(3);
        let fork = Rule::new(
            Pattern::unlabeled(labels(&["X"]), &[]).unwrap(),
            Pattern::unlabeled(
                labels(&["FORK", "X", "X", "JOIN"]),
                &[(0, 1), (0, 2), (1, 3), (2, 3)],
            )
            .unwrap(),
        )
        .with_limit(1);
        let mut rules = RuleSet::new(vec![stretch, fork]);

        let outcome = rules.apply(&mut graph, &mut derivation, 100).unwrap();
        assert_eq!(
            outcome,
            Outcome {
                steps: 4,
                halted: true
            }
        );
        assert_eq!(rules.rules()[0].applied(), 3);
        assert_eq!(rules.rules()[1].applied(), 1);
        assert_eq!(count_label(&graph, "FORK"), 1);
        assert_eq!(count_label(&graph, "X"), 5);
        assert_eq!(graph.order(), 9);

        rules.reset();
        assert!(rules.rules().iter().all(|r| r.applied() == 0));
        let outcome = rules.apply(&mut graph, &mut derivation, 2).unwrap();
        assert_eq!(
            outcome,
            Outcome {
                steps: 2,
                halted: false
            }
        );
    }

    #[test]
    fn test_stuck_without_matches() {
        let mut sequence = Sequence::new();
        let mut graph = get_seed_graph(&mut sequence);
        let mut derivation = Derivation::new(StdRng::seed_from_u64(9), sequence);
        let mut rules = RuleSet::new(vec![Rule::new(
            Pattern::unlabeled(labels(&["KEY"]), &[]).unwrap(),
            Pattern::unlabeled(labels(&["LOCK"]), &[]).unwrap(),
        )]);
        let outcome = rules.apply(&mut graph, &mut derivation, 5).unwrap();
        assert_eq!(
            outcome,
            Outcome {
                steps: 0,
                halted: true
            }
        );
        assert_eq!(graph.order(), 3);
    }

    #[test]
    fn test_reproducible() {
        let run = |seed: u64| {
            let mut sequence = Sequence::new();
            let mut graph = get_seed_graph(&mut sequence);
            let mut derivation = Derivation::new(StdRng::seed_from_u64(seed), sequence);
            let mut rules = RuleSet::new(vec![
                Rule::new(
                    Pattern::unlabeled(labels(&["X"]), &[]).unwrap(),
                    Pattern::unlabeled(labels(&["X", "X"]), &[(0, 1)]).unwrap(),
                ),
                Rule::new(
                    Pattern::unlabeled(labels(&["X"]), &[]).unwrap(),
                    Pattern::unlabeled(labels(&["X", "KEY", "X"]), &[(0, 1), (1, 2)]).unwrap(),
                )
                .with_weight(0.5)
                .unwrap(),
            ]);
            rules.apply(&mut graph, &mut derivation, 12).unwrap();
            graph.snapshot()
        };
        assert_eq!(run(5), run(5));
    }

    #[test]
    fn test_from_yaml() {
        let mut rules: RuleSet<String, String> = RuleSet::from_yaml(
            r#"
- name: stretch
  weight: 3
  limit: 2
  pattern:
    nodes: [X]
  replacement:
    nodes: [X, X]
    edges: [[0, 1]]
- name: lock
  pattern:
    nodes: [X, X]
    edges: [[0, 1]]
  replacement:
    nodes: [X, KEY, DOOR]
    edges: [[0, 1], [1, 2, locked]]
  embed_in: [[0, 0]]
  embed_out: [[1, 2]]
"#,
        )
        .unwrap();
        assert_eq!(rules.len(), 2);
        let stretch = &rules.rules()[0];
        assert_eq!(stretch.name(), Some("stretch"));
        assert_eq!(stretch.weight(), 3.0);
        assert_eq!(stretch.limit(), Some(2));
        assert_eq!(stretch.embed_out(), &[(0, 1)]);
        let lock = &rules.rules()[1];
        assert_eq!(lock.weight(), 1.0);
        assert_eq!(lock.embed_out(), &[(1, 2)]);
        assert_eq!(
            lock.replacement().edges()[1].label.as_deref(),
            Some("locked")
        );

        let mut sequence = Sequence::new();
        let mut graph = get_seed_graph(&mut sequence);
        let mut derivation = Derivation::new(StdRng::seed_from_u64(2), sequence);
        // Stretching is capped at two and every lock uses up an X -> X pair,
        // so the run always gets stuck after three or four steps.
        let outcome = rules.apply(&mut graph, &mut derivation, 10).unwrap();
        assert!(outcome.halted);
        assert!(outcome.steps == 3 || outcome.steps == 4, "{:?}", outcome);
        assert_eq!(rules.rules()[0].applied(), 2);
        assert!(count_label(&graph, "DOOR") >= 1);
        assert_eq!(count_label(&graph, "GOAL"), 1);
    }

    #[test]
    fn test_from_yaml_rejects_bad_rules() {
        let err = RuleSet::<String, String>::from_yaml(
            r#"
- pattern:
    nodes: [X]
  replacement:
    nodes: [X]
  embed_in: [[0, 4]]
"#,
        )
        .unwrap_err();
        assert!(format!("{:#}", err).contains("Invalid rule #0"));

        assert!(RuleSet::<String, String>::from_yaml("- pattern: 3").is_err());
    }
}
