//! The state of a parse in progress.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::graph::{DepArc, Mapping};
use crate::lattice::Lattice;
use crate::morpheme::Morpheme;

/// A materialised morph node: a morpheme addressed through its lattice.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct MorphNode {
    /// Lattice index within the sentence.
    pub lattice: usize,
    /// Morpheme index within the lattice.
    pub morpheme: usize,
}

/// A parser configuration coupling the syntactic stack/queue/arc state with
/// the morphological lattice queue.
///
/// The mutable sequences are `Arc`-backed: a [`Configuration::copy()`]
/// shares all storage with its parent, and the first mutation of a sequence
/// clones just that sequence. The `previous` back-link forms an acyclic
/// chain through which a beam item's transition sequence is reconstructed;
/// chains stay alive exactly as long as some live beam item points at them.
#[derive(Clone, Debug)]
pub struct Configuration {
    /// Sentence lattices, root at index 0; shared and read-only.
    pub lattices: Arc<Vec<Lattice>>,
    stack: Arc<Vec<usize>>,
    queue: Arc<VecDeque<usize>>,
    lattice_queue: Arc<VecDeque<usize>>,
    arcs: Arc<Vec<DepArc>>,
    morph_nodes: Arc<Vec<MorphNode>>,
    mappings: Arc<Vec<Mapping>>,
    last: u32,
    previous: Option<Arc<Configuration>>,
}

impl Configuration {
    /// Seeds the initial configuration of a sentence: the root morpheme is
    /// node 0 and sits alone on the stack, and all token lattices await
    /// disambiguation on the lattice queue.
    pub fn new(lattices: Arc<Vec<Lattice>>) -> Self {
        let max_nodes: usize = lattices.iter().map(Lattice::max_path_len).sum();
        let mut morph_nodes = Vec::with_capacity(max_nodes + 1);
        morph_nodes.push(MorphNode {
            lattice: 0,
            morpheme: 0,
        });
        let mut mappings = Vec::with_capacity(lattices.len());
        mappings.push(Mapping {
            token: 0,
            spellout: vec![0],
        });
        let lattice_queue = (1..lattices.len()).collect();
        Self {
            lattices,
            stack: Arc::new(vec![0]),
            queue: Arc::new(VecDeque::new()),
            lattice_queue: Arc::new(lattice_queue),
            arcs: Arc::new(Vec::new()),
            morph_nodes: Arc::new(morph_nodes),
            mappings: Arc::new(mappings),
            last: 0,
            previous: None,
        }
    }

    /// Seeds a configuration for pre-segmented input: every lattice must be
    /// unambiguous, and all morph nodes are materialised onto the queue up
    /// front so a purely syntactic system can run.
    pub fn new_segmented(lattices: Arc<Vec<Lattice>>) -> Self {
        let mut conf = Self::new(lattices);
        let queue = Arc::make_mut(&mut conf.queue);
        let morph_nodes = Arc::make_mut(&mut conf.morph_nodes);
        let mappings = Arc::make_mut(&mut conf.mappings);
        let lattice_queue = Arc::make_mut(&mut conf.lattice_queue);
        while let Some(l) = lattice_queue.pop_front() {
            let spellout = conf.lattices[l].spellouts[0].clone();
            for &m in &spellout {
                queue.push_back(morph_nodes.len());
                morph_nodes.push(MorphNode {
                    lattice: l,
                    morpheme: m,
                });
            }
            mappings.push(Mapping { token: l, spellout });
        }
        conf
    }

    /// Structural shallow copy; storage is shared until first mutation.
    pub fn copy(self: &Arc<Self>) -> Self {
        let mut child = Self::clone(self);
        child.previous = Some(Arc::clone(self));
        child
    }

    /// Both the lattice queue and the queue are exhausted.
    #[inline(always)]
    pub fn terminal(&self) -> bool {
        self.lattice_queue.is_empty() && self.queue.is_empty()
    }

    /// The stack, top last.
    #[inline(always)]
    pub fn stack(&self) -> &[usize] {
        &self.stack
    }

    /// The queue of materialised morph nodes, front first.
    #[inline(always)]
    pub fn queue(&self) -> &VecDeque<usize> {
        &self.queue
    }

    /// The queue of unsegmented lattice indices, front first.
    #[inline(always)]
    pub fn lattice_queue(&self) -> &VecDeque<usize> {
        &self.lattice_queue
    }

    /// The arcs built so far.
    #[inline(always)]
    pub fn arcs(&self) -> &[DepArc] {
        &self.arcs
    }

    /// The emitted morph nodes, root at index 0.
    #[inline(always)]
    pub fn morph_nodes(&self) -> &[MorphNode] {
        &self.morph_nodes
    }

    /// The per-token disambiguation choices so far, root at index 0.
    #[inline(always)]
    pub fn mappings(&self) -> &[Mapping] {
        &self.mappings
    }

    /// The last applied transition, 0 when none.
    #[inline(always)]
    pub const fn last(&self) -> u32 {
        self.last
    }

    /// The configuration this one was derived from.
    #[inline(always)]
    pub fn previous(&self) -> Option<&Arc<Configuration>> {
        self.previous.as_ref()
    }

    /// `i`-th element from the top of the stack.
    #[inline(always)]
    pub fn stack_at(&self, i: usize) -> Option<usize> {
        let len = self.stack.len();
        (i < len).then(|| self.stack[len - 1 - i])
    }

    /// `i`-th element from the front of the queue.
    #[inline(always)]
    pub fn queue_at(&self, i: usize) -> Option<usize> {
        self.queue.get(i).copied()
    }

    /// The morpheme backing a morph node.
    #[inline(always)]
    pub fn morpheme(&self, node: usize) -> &Morpheme {
        let mn = &self.morph_nodes[node];
        &self.lattices[mn.lattice].morphemes[mn.morpheme]
    }

    /// Head and relation of a node in the arcs built so far.
    pub fn head_of(&self, node: usize) -> Option<(usize, u32)> {
        self.arcs
            .iter()
            .find(|a| a.modifier == node)
            .map(|a| (a.head, a.relation))
    }

    /// Modifiers of `node` smaller than it, leftmost first.
    pub fn left_dependents(&self, node: usize) -> Vec<usize> {
        let mut deps: Vec<usize> = self
            .arcs
            .iter()
            .filter(|a| a.head == node && a.modifier < node)
            .map(|a| a.modifier)
            .collect();
        deps.sort_unstable();
        deps
    }

    /// Modifiers of `node` greater than it, rightmost first.
    pub fn right_dependents(&self, node: usize) -> Vec<usize> {
        let mut deps: Vec<usize> = self
            .arcs
            .iter()
            .filter(|a| a.head == node && a.modifier > node)
            .map(|a| a.modifier)
            .collect();
        deps.sort_unstable_by(|a, b| b.cmp(a));
        deps
    }

    /// The lattice at the front of the lattice queue together with the node
    /// its partial spellout has reached.
    pub fn lattice_position(&self) -> Option<(usize, usize)> {
        let &l = self.lattice_queue.front()?;
        let lat = &self.lattices[l];
        let mapping = self.mappings.last().unwrap();
        if mapping.token == l {
            let &m = mapping.spellout.last().unwrap();
            Some((l, lat.morphemes[m].to))
        } else {
            Some((l, lat.bottom_id))
        }
    }

    /// Walks the `previous` chain; returns the derivation oldest first,
    /// ending with this configuration.
    pub fn sequence(self: &Arc<Self>) -> Vec<Arc<Configuration>> {
        let mut chain = Vec::new();
        let mut cur = Some(Arc::clone(self));
        while let Some(conf) = cur {
            cur = conf.previous().cloned();
            chain.push(conf);
        }
        chain.reverse();
        chain
    }

    // Mutators used by the transition systems. Each works on a fresh copy,
    // so `Arc::make_mut` clones a sequence at most once per child.

    pub(crate) fn push_stack(&mut self, node: usize) {
        Arc::make_mut(&mut self.stack).push(node);
    }

    pub(crate) fn pop_stack(&mut self) -> Option<usize> {
        Arc::make_mut(&mut self.stack).pop()
    }

    pub(crate) fn pop_queue(&mut self) -> Option<usize> {
        Arc::make_mut(&mut self.queue).pop_front()
    }

    pub(crate) fn push_queue(&mut self, node: usize) {
        Arc::make_mut(&mut self.queue).push_back(node);
    }

    pub(crate) fn replace_queue_front(&mut self, node: usize) {
        let queue = Arc::make_mut(&mut self.queue);
        queue.pop_front();
        queue.push_front(node);
    }

    pub(crate) fn pop_lattice_queue(&mut self) -> Option<usize> {
        Arc::make_mut(&mut self.lattice_queue).pop_front()
    }

    pub(crate) fn add_arc(&mut self, arc: DepArc) {
        Arc::make_mut(&mut self.arcs).push(arc);
    }

    /// Materialises a morpheme as a fresh morph node, extending the open
    /// mapping of its token (or opening one).
    pub(crate) fn push_morph_node(&mut self, lattice: usize, morpheme: usize) -> usize {
        let node = self.morph_nodes.len();
        Arc::make_mut(&mut self.morph_nodes).push(MorphNode { lattice, morpheme });
        let mappings = Arc::make_mut(&mut self.mappings);
        match mappings.last_mut() {
            Some(m) if m.token == lattice => m.spellout.push(morpheme),
            _ => mappings.push(Mapping {
                token: lattice,
                spellout: vec![morpheme],
            }),
        }
        node
    }

    pub(crate) fn set_last(&mut self, transition: u32) {
        self.last = transition;
    }
}

// Deep equality over the parse state; the back-link and last transition are
// bookkeeping, not state.
impl PartialEq for Configuration {
    fn eq(&self, other: &Self) -> bool {
        self.stack == other.stack
            && self.queue == other.queue
            && self.lattice_queue == other.lattice_queue
            && self.arcs == other.arcs
            && self.morph_nodes == other.morph_nodes
            && self.mappings == other.mappings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lattice::{rooted, Lattice};
    use crate::test_utils::edge;

    fn two_token_sentence() -> Arc<Vec<Lattice>> {
        let mut the = Lattice::new("the");
        the.add_edge(edge(0, 1, "the", "DET", 1));
        the.gen_spellouts().unwrap();
        let mut dog = Lattice::new("dog");
        dog.add_edge(edge(0, 1, "dog", "NOUN", 2));
        dog.gen_spellouts().unwrap();
        rooted(vec![the, dog])
    }

    #[test]
    fn test_init() {
        let conf = Configuration::new(two_token_sentence());
        assert_eq!(conf.stack(), &[0]);
        assert!(conf.queue().is_empty());
        assert_eq!(conf.lattice_queue().iter().copied().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(conf.mappings().len(), 1);
        assert_eq!(conf.morph_nodes().len(), 1);
        assert_eq!(conf.morpheme(0).form, "ROOT");
        assert!(!conf.terminal());
    }

    #[test]
    fn test_copy_on_write_non_aliasing() {
        let parent = Arc::new(Configuration::new(two_token_sentence()));
        let mut child = parent.copy();
        child.push_stack(7);
        child.add_arc(DepArc {
            head: 0,
            modifier: 1,
            relation: 0,
        });
        assert_eq!(parent.stack(), &[0]);
        assert!(parent.arcs().is_empty());
        assert_eq!(child.stack(), &[0, 7]);
        assert_eq!(child.arcs().len(), 1);
        assert_eq!(child.previous().unwrap().stack(), &[0]);
    }

    #[test]
    fn test_lattice_position_tracks_partial_spellout() {
        let mut conf = Configuration::new(two_token_sentence());
        assert_eq!(conf.lattice_position(), Some((1, 0)));
        let node = conf.push_morph_node(1, 0);
        assert_eq!(node, 1);
        // token 1's only morpheme spans nodes 0..1, so the position advances
        assert_eq!(conf.lattice_position(), Some((1, 1)));
        conf.pop_lattice_queue();
        assert_eq!(conf.lattice_position(), Some((2, 0)));
    }

    #[test]
    fn test_sequence_reconstruction() {
        let root = Arc::new(Configuration::new(two_token_sentence()));
        let mut a = root.copy();
        a.set_last(1);
        let a = Arc::new(a);
        let mut b = a.copy();
        b.set_last(2);
        let b = Arc::new(b);
        let chain = b.sequence();
        assert_eq!(chain.len(), 3);
        assert_eq!(chain[0].last(), 0);
        assert_eq!(chain[1].last(), 1);
        assert_eq!(chain[2].last(), 2);
    }

    #[test]
    fn test_segmented_init() {
        let conf = Configuration::new_segmented(two_token_sentence());
        assert_eq!(conf.queue().len(), 2);
        assert!(conf.lattice_queue().is_empty());
        assert_eq!(conf.mappings().len(), 3);
        assert_eq!(conf.morpheme(1).form, "the");
        assert_eq!(conf.morpheme(2).form, "dog");
    }
}
