//! Arc-eager parsing extended with morpheme disambiguation.

use std::sync::Arc;

use crate::configuration::Configuration;
use crate::errors::{Result, StaccatoError};
use crate::graph::MorphGraph;
use crate::transition::arc_eager::ArcEager;
use crate::transition::{illegal, TransitionSystem, TransitionTable};

/// Arc-eager over morph nodes, with `MD` transitions materialising
/// morphemes from the lattice at the front of the lattice queue.
///
/// A morpheme is only offered once the queue has been drained, so the
/// syntactic phase of one segment finishes before the next segmentation
/// decision is made.
pub struct ArcEagerMorph {
    pub(crate) eager: ArcEager,
}

impl ArcEagerMorph {
    /// Creates the system over a transition table.
    pub const fn new(table: TransitionTable) -> Self {
        Self {
            eager: ArcEager::new(table),
        }
    }

    fn morph_disambiguate(&self, conf: &Arc<Configuration>, k: usize) -> Result<Configuration> {
        if !conf.queue().is_empty() {
            return Err(illegal("MD"));
        }
        let (l, node) = conf.lattice_position().ok_or_else(|| illegal("MD"))?;
        let lattice = &conf.lattices[l];
        let &edge = lattice.outgoing(node).get(k).ok_or_else(|| illegal("MD"))?;
        let reaches_top = lattice.morphemes[edge].to == lattice.top_id;

        let mut child = conf.copy();
        let morph_node = child.push_morph_node(l, edge);
        child.push_queue(morph_node);
        if reaches_top {
            child.pop_lattice_queue();
        }
        child.set_last(self.table().md(u32::try_from(k)?));
        Ok(child)
    }

    fn oracle_morph(&self, conf: &Configuration, gold: &MorphGraph) -> Result<u32> {
        let (l, node) = conf.lattice_position().ok_or_else(|| illegal("MD"))?;
        let gold_spellout = &gold
            .mappings
            .get(l)
            .ok_or_else(|| StaccatoError::oracle(format!("no gold mapping for token {l}")))?
            .spellout;
        let mapping = conf.mappings().last().unwrap();
        let pos = if mapping.token == l {
            mapping.spellout.len()
        } else {
            0
        };
        let &target = gold_spellout.get(pos).ok_or_else(|| {
            StaccatoError::oracle(format!("gold spellout of token {l} exhausted at {pos}"))
        })?;
        let lattice = &conf.lattices[l];
        let k = lattice
            .outgoing(node)
            .iter()
            .position(|&m| m == target)
            .ok_or_else(|| {
                let form = lattice.morphemes.get(target).map_or("?", |m| m.form.as_str());
                StaccatoError::oracle(format!(
                    "gold morpheme '{form}' not derivable at node {node} of token {l}"
                ))
            })?;
        Ok(self.table().md(u32::try_from(k)?))
    }
}

impl TransitionSystem for ArcEagerMorph {
    fn table(&self) -> &TransitionTable {
        &self.eager.table
    }

    fn legal(&self, conf: &Configuration) -> Vec<u32> {
        let mut out = Vec::new();
        if conf.queue().is_empty() {
            if let Some((l, node)) = conf.lattice_position() {
                let table = self.table();
                let degree = conf.lattices[l].outgoing(node).len();
                for k in 0..degree.min(table.num_morph as usize) {
                    out.push(table.md(k as u32));
                }
            }
        }
        self.eager.legal_syntactic(conf, &mut out);
        out
    }

    fn apply(&self, conf: &Arc<Configuration>, t: u32) -> Result<Configuration> {
        if let Some(k) = self.table().md_index(t) {
            return self.morph_disambiguate(conf, k);
        }
        self.eager.apply_syntactic(conf, t)
    }

    fn oracle(&self, conf: &Configuration, gold: &MorphGraph) -> Result<u32> {
        // Morpheme disambiguation strictly precedes syntax once the queue
        // has been drained.
        if conf.queue().is_empty() && !conf.lattice_queue().is_empty() {
            return self.oracle_morph(conf, gold);
        }
        self.eager.oracle_syntactic(conf, gold)
    }
}
