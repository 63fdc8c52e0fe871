//! Labeled morph-dependency graphs and gold-graph assembly.

use std::sync::Arc;

use hashbrown::HashMap;

use crate::errors::{Result, StaccatoError};
use crate::lattice::{rooted, Lattice, LatticeSentence, Spellout};

/// A labeled directed dependency edge between morph nodes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DepArc {
    /// Head morph-node id.
    pub head: usize,
    /// Modifier morph-node id.
    pub modifier: usize,
    /// Interned relation id.
    pub relation: u32,
}

/// The disambiguation choice for one token.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Mapping {
    /// Index of the token's lattice within the sentence.
    pub token: usize,
    /// Chosen path, as morpheme indices local to the token's lattice.
    pub spellout: Spellout,
}

/// A gold morph-dependency graph: the lattices of a sentence, the gold
/// disambiguation of every token, and the gold arcs over the linearised
/// morph nodes (node 0 is the root).
pub struct MorphGraph {
    /// Sentence lattices, root at index 0.
    pub lattices: Arc<Vec<Lattice>>,
    /// Gold mapping per token, root at index 0.
    pub mappings: Vec<Mapping>,
    /// Gold arcs.
    pub arcs: Vec<DepArc>,
    heads: HashMap<usize, (usize, u32)>,
    dependents: HashMap<usize, Vec<usize>>,
}

impl MorphGraph {
    /// Assembles a graph from rooted lattices, gold mappings, and gold arcs.
    pub fn new(lattices: Arc<Vec<Lattice>>, mappings: Vec<Mapping>, arcs: Vec<DepArc>) -> Self {
        let mut heads = HashMap::with_capacity(arcs.len());
        let mut dependents: HashMap<usize, Vec<usize>> = HashMap::new();
        for arc in &arcs {
            heads.insert(arc.modifier, (arc.head, arc.relation));
            dependents.entry(arc.head).or_default().push(arc.modifier);
        }
        Self {
            lattices,
            mappings,
            arcs,
            heads,
            dependents,
        }
    }

    /// Gold head and relation of a morph node.
    #[inline(always)]
    pub fn head_of(&self, node: usize) -> Option<(usize, u32)> {
        self.heads.get(&node).copied()
    }

    /// Gold dependents of a morph node.
    #[inline(always)]
    pub fn dependents_of(&self, node: usize) -> &[usize] {
        self.dependents.get(&node).map_or(&[], Vec::as_slice)
    }

    /// Number of morph nodes covered by the gold mappings, root included.
    pub fn num_nodes(&self) -> usize {
        1 + self
            .mappings
            .iter()
            .skip(1)
            .map(|m| m.spellout.len())
            .sum::<usize>()
    }
}

/// Combines one training sentence's gold arcs, its disambiguated lattice,
/// and its ambiguous lattice into a gold morph graph.
///
/// The disambiguated lattice must offer exactly one path per token; that
/// path is located inside the ambiguous lattice to form the gold mapping.
/// Returns `None` when some token's gold path is not contained in the
/// ambiguous lattice, which marks the instance unrecoverable for training.
///
/// # Errors
///
/// [`StaccatoError`] is returned when the two lattice sentences disagree in
/// length or a disambiguated token is ambiguous.
pub fn combine_gold(
    arcs: Vec<DepArc>,
    gold_sentence: &LatticeSentence,
    ambiguous_sentence: LatticeSentence,
) -> Result<Option<MorphGraph>> {
    if gold_sentence.len() != ambiguous_sentence.len() {
        return Err(StaccatoError::invalid_argument(
            "gold_sentence",
            format!(
                "mismatched sentence lengths: {} disambiguated vs {} ambiguous tokens",
                gold_sentence.len(),
                ambiguous_sentence.len()
            ),
        ));
    }

    let lattices = rooted(ambiguous_sentence);
    let mut mappings = Vec::with_capacity(lattices.len());
    mappings.push(Mapping {
        token: 0,
        spellout: vec![0],
    });
    for (i, gold_lat) in gold_sentence.iter().enumerate() {
        if gold_lat.spellouts.len() != 1 {
            return Err(StaccatoError::lattice(format!(
                "disambiguated lattice for token '{}' has {} paths",
                gold_lat.token,
                gold_lat.spellouts.len()
            )));
        }
        let signature = gold_lat.signature(&gold_lat.spellouts[0]);
        let amb = &lattices[i + 1];
        match amb.find_spellout(&signature) {
            Some(s) => mappings.push(Mapping {
                token: i + 1,
                spellout: amb.spellouts[s].clone(),
            }),
            None => return Ok(None),
        }
    }

    Ok(Some(MorphGraph::new(lattices, mappings, arcs)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::edge;

    fn single_path_lattice(token: &str, forms: &[(&str, &str)]) -> Lattice {
        let mut lat = Lattice::new(token);
        for (i, (form, pos)) in forms.iter().enumerate() {
            lat.add_edge(edge(i, i + 1, form, pos, 1));
        }
        lat.gen_spellouts().unwrap();
        lat
    }

    #[test]
    fn test_combine_gold_found() {
        let mut amb = Lattice::new("bimba");
        amb.add_edge(edge(0, 1, "b", "DET", 1));
        amb.add_edge(edge(1, 2, "imba", "NOUN", 1));
        amb.add_edge(edge(0, 3, "bim", "NOUN", 1));
        amb.add_edge(edge(3, 2, "ba", "POS", 1));
        amb.gen_spellouts().unwrap();

        let gold = single_path_lattice("bimba", &[("b", "DET"), ("imba", "NOUN")]);
        let arcs = vec![
            DepArc { head: 2, modifier: 1, relation: 0 },
            DepArc { head: 0, modifier: 2, relation: 1 },
        ];
        let graph = combine_gold(arcs, &vec![gold], vec![amb]).unwrap().unwrap();
        assert_eq!(graph.mappings.len(), 2);
        assert_eq!(graph.mappings[1].spellout, vec![0, 1]);
        assert_eq!(graph.head_of(1), Some((2, 0)));
        assert_eq!(graph.dependents_of(2), &[1]);
        assert_eq!(graph.num_nodes(), 3);
    }

    #[test]
    fn test_combine_gold_missing_path() {
        let mut amb = Lattice::new("bimba");
        amb.add_edge(edge(0, 1, "b", "DET", 1));
        amb.add_edge(edge(1, 2, "imba", "NOUN", 1));
        amb.gen_spellouts().unwrap();

        let gold = single_path_lattice("bimba", &[("bim", "NOUN"), ("ba", "POS")]);
        let combined = combine_gold(Vec::new(), &vec![gold], vec![amb]).unwrap();
        assert!(combined.is_none());
    }
}
