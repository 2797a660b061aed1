use crate::rgg::rule::{Pattern, PatternEdge};
use crate::rgg::{Error as RuleError, Rule};
use core::fmt::Formatter;
use serde::de::{Error, IgnoredAny, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer};
use std::marker::PhantomData;

#[derive(Deserialize)]
struct RawPattern<N, E> {
    nodes: Vec<N>,
    #[serde(default = "Vec::new")]
    edges: Vec<PatternEdge<E>>,
}

impl<'de, N, E> Deserialize<'de> for Pattern<N, E>
where
    N: Deserialize<'de>,
    E: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, <D as Deserializer<'de>>::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = RawPattern::deserialize(deserializer)?;
        Pattern::new(raw.nodes, raw.edges).map_err(D::Error::custom)
    }
}

impl<'de, E> Deserialize<'de> for PatternEdge<E>
where
    E: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, <D as Deserializer<'de>>::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_seq(EdgeVisitor(PhantomData))
    }
}

struct EdgeVisitor<E>(PhantomData<E>);

impl<'de, E> Visitor<'de> for EdgeVisitor<E>
where
    E: Deserialize<'de>,
{
    type Value = PatternEdge<E>;

    fn expecting(&self, formatter: &mut Formatter) -> std::fmt::Result {
        formatter.write_str("a sequence of two node indices, optionally followed by an edge label")
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, <A as SeqAccess<'de>>::Error>
    where
        A: SeqAccess<'de>,
    {
        let from: usize = seq
            .next_element()?
            .ok_or_else(|| A::Error::invalid_length(0, &self))?;
        let to: usize = seq
            .next_element()?
            .ok_or_else(|| A::Error::invalid_length(1, &self))?;
        let label: Option<E> = seq.next_element()?;
        if seq.next_element::<IgnoredAny>()?.is_some() {
            return Err(A::Error::invalid_length(4, &self));
        }
        Ok(PatternEdge { from, to, label })
    }
}

fn default_weight() -> f64 {
    1.0
}

/// One entry of a YAML rule set, before validation.
#[derive(Deserialize)]
pub(crate) struct RawRule<N, E> {
    #[serde(default)]
    name: Option<String>,
    #[serde(default = "default_weight")]
    weight: f64,
    #[serde(default)]
    limit: Option<usize>,
    pattern: Pattern<N, E>,
    replacement: Pattern<N, E>,
    #[serde(default)]
    embed_in: Option<Vec<(usize, usize)>>,
    #[serde(default)]
    embed_out: Option<Vec<(usize, usize)>>,
}

impl<N, E> RawRule<N, E> {
    /// Build the rule, keeping the default embedding for any side left out.
    pub(crate) fn into_rule(self) -> Result<Rule<N, E>, RuleError> {
        let mut rule = Rule::new(self.pattern, self.replacement);
        let embed_in = self.embed_in.unwrap_or_else(|| rule.embed_in().to_vec());
        let embed_out = self.embed_out.unwrap_or_else(|| rule.embed_out().to_vec());
        rule = rule.with_embedding(embed_in, embed_out)?.with_weight(self.weight)?;
        if let Some(limit) = self.limit {
            rule = rule.with_limit(limit);
        }
        if let Some(name) = self.name {
            rule = rule.with_name(name);
        }
        Ok(rule)
    }
}
