//! Per-token morphological lattices and their spellouts.

use std::sync::Arc;

use hashbrown::{HashMap, HashSet};

use crate::common::ROOT_TOKEN;
use crate::errors::{Result, StaccatoError};
use crate::morpheme::Morpheme;

/// One bottom-to-top path through a lattice, as morpheme indices.
pub type Spellout = Vec<usize>;

/// An ordered sequence of per-token lattices, without the synthetic root.
pub type LatticeSentence = Vec<Lattice>;

/// A per-token directed acyclic graph whose paths enumerate candidate
/// morpheme segmentations.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Lattice {
    /// Surface token.
    pub token: String,
    /// Morpheme edges in insertion order.
    pub morphemes: Vec<Morpheme>,
    /// Adjacency: node id to outgoing morpheme indices, in insertion order.
    pub next: HashMap<usize, Vec<usize>>,
    /// Entry node.
    pub bottom_id: usize,
    /// Exit node.
    pub top_id: usize,
    /// All bottom-to-top paths; filled by [`Lattice::gen_spellouts()`].
    pub spellouts: Vec<Spellout>,
}

impl Lattice {
    /// Creates an empty lattice for a token.
    pub fn new<S>(token: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            token: token.into(),
            ..Self::default()
        }
    }

    /// Creates the synthetic root lattice.
    pub fn root() -> Self {
        Self {
            token: ROOT_TOKEN.to_string(),
            morphemes: vec![Morpheme::root()],
            next: HashMap::new(),
            bottom_id: 0,
            top_id: 0,
            spellouts: vec![vec![0]],
        }
    }

    /// Appends a morpheme edge, assigning its id.
    pub fn add_edge(&mut self, mut morpheme: Morpheme) -> usize {
        let idx = self.morphemes.len();
        morpheme.id = idx;
        self.next.entry(morpheme.from).or_default().push(idx);
        self.morphemes.push(morpheme);
        idx
    }

    /// Outgoing morpheme edges at a node.
    #[inline(always)]
    pub fn outgoing(&self, node: usize) -> &[usize] {
        self.next.get(&node).map_or(&[], Vec::as_slice)
    }

    /// Enumerates every bottom-to-top path in insertion order, deduplicating
    /// paths with identical content, and checks that every morpheme lies on
    /// at least one path.
    ///
    /// # Errors
    ///
    /// [`StaccatoError::Lattice`] is returned when the lattice has no
    /// morphemes, no bottom-to-top path, or a morpheme unreachable from any
    /// path.
    pub fn gen_spellouts(&mut self) -> Result<()> {
        if self.morphemes.is_empty() {
            return Err(StaccatoError::lattice(format!(
                "empty lattice for token '{}'",
                self.token
            )));
        }
        self.bottom_id = self.morphemes.iter().map(|m| m.from).min().unwrap();
        self.top_id = self.morphemes.iter().map(|m| m.to).max().unwrap();

        self.spellouts.clear();
        let mut seen = HashSet::new();
        let mut on_path = vec![false; self.morphemes.len()];
        let mut path = Vec::new();
        self.walk(self.bottom_id, &mut path, &mut seen, &mut on_path);

        if self.spellouts.is_empty() {
            return Err(StaccatoError::lattice(format!(
                "no bottom-to-top path in lattice for token '{}'",
                self.token
            )));
        }
        if let Some(stray) = on_path.iter().position(|&v| !v) {
            return Err(StaccatoError::lattice(format!(
                "morpheme '{}' of token '{}' lies on no bottom-to-top path",
                self.morphemes[stray].form, self.token
            )));
        }
        Ok(())
    }

    fn walk(
        &mut self,
        node: usize,
        path: &mut Vec<usize>,
        seen: &mut HashSet<Vec<(String, String, String)>>,
        on_path: &mut [bool],
    ) {
        // cycle guard for malformed inputs
        if path.len() > self.morphemes.len() {
            return;
        }
        if node == self.top_id && !path.is_empty() {
            if seen.insert(self.signature(path)) {
                for &idx in path.iter() {
                    on_path[idx] = true;
                }
                self.spellouts.push(path.clone());
            }
            return;
        }
        let out = self.next.get(&node).cloned().unwrap_or_default();
        for idx in out {
            path.push(idx);
            let to = self.morphemes[idx].to;
            self.walk(to, path, seen, on_path);
            path.pop();
        }
    }

    /// Content signature of a path, used for dedup and gold-path matching.
    pub fn signature(&self, spellout: &[usize]) -> Vec<(String, String, String)> {
        spellout
            .iter()
            .map(|&i| {
                let m = &self.morphemes[i];
                (m.form.clone(), m.pos.clone(), m.feat_str.clone())
            })
            .collect()
    }

    /// Length of the longest bottom-to-top path.
    pub fn max_path_len(&self) -> usize {
        self.spellouts.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Looks up the spellout whose content matches `signature`.
    pub fn find_spellout(&self, signature: &[(String, String, String)]) -> Option<usize> {
        self.spellouts
            .iter()
            .position(|s| self.signature(s) == signature)
    }
}

/// Prefixes a sentence with the synthetic root lattice and shares it.
pub fn rooted(sentence: LatticeSentence) -> Arc<Vec<Lattice>> {
    let mut lattices = Vec::with_capacity(sentence.len() + 1);
    lattices.push(Lattice::root());
    lattices.extend(sentence);
    Arc::new(lattices)
}
