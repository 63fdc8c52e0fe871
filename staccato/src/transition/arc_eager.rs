//! The arc-eager system: shift, reduce, left-arc, right-arc, pop-root.

use std::sync::Arc;

use crate::configuration::Configuration;
use crate::errors::Result;
use crate::graph::{DepArc, MorphGraph};
use crate::transition::{illegal, TransitionSystem, TransitionTable};

/// Arc-eager dependency parsing over a pre-segmented queue.
pub struct ArcEager {
    pub(crate) table: TransitionTable,
}

impl ArcEager {
    /// Creates the system over a transition table.
    pub const fn new(table: TransitionTable) -> Self {
        Self { table }
    }

    pub(crate) fn shift(&self, conf: &Arc<Configuration>) -> Result<Configuration> {
        let mut child = conf.copy();
        let node = child.pop_queue().ok_or_else(|| illegal("SH"))?;
        child.push_stack(node);
        child.set_last(self.table.shift);
        Ok(child)
    }

    pub(crate) fn reduce(&self, conf: &Arc<Configuration>) -> Result<Configuration> {
        let s0 = conf.stack_at(0).ok_or_else(|| illegal("RE"))?;
        if conf.head_of(s0).is_none() {
            return Err(illegal("RE"));
        }
        let mut child = conf.copy();
        child.pop_stack();
        child.set_last(self.table.reduce);
        Ok(child)
    }

    pub(crate) fn left_arc(&self, conf: &Arc<Configuration>, relation: u32) -> Result<Configuration> {
        let (s0, q0) = match (conf.stack_at(0), conf.queue_at(0)) {
            (Some(s0), Some(q0)) if s0 != 0 && conf.head_of(s0).is_none() => (s0, q0),
            _ => return Err(illegal("LA")),
        };
        let mut child = conf.copy();
        child.add_arc(DepArc {
            head: q0,
            modifier: s0,
            relation,
        });
        child.pop_stack();
        child.set_last(self.table.la(relation));
        Ok(child)
    }

    pub(crate) fn right_arc(&self, conf: &Arc<Configuration>, relation: u32) -> Result<Configuration> {
        let (s0, q0) = match (conf.stack_at(0), conf.queue_at(0)) {
            (Some(s0), Some(q0)) => (s0, q0),
            _ => return Err(illegal("RA")),
        };
        let mut child = conf.copy();
        child.add_arc(DepArc {
            head: s0,
            modifier: q0,
            relation,
        });
        child.pop_queue();
        child.push_stack(q0);
        child.set_last(self.table.ra(relation));
        Ok(child)
    }

    pub(crate) fn pop_root(&self, conf: &Arc<Configuration>) -> Result<Configuration> {
        if !self.pop_root_legal(conf) {
            return Err(illegal("PR"));
        }
        let mut child = conf.copy();
        child.pop_stack();
        child.set_last(self.table.pop_root);
        Ok(child)
    }

    // Popping the root with tokens still pending would orphan them.
    pub(crate) fn pop_root_legal(&self, conf: &Configuration) -> bool {
        conf.queue().is_empty()
            && conf.lattice_queue().is_empty()
            && conf.stack().len() == 1
            && conf.stack()[0] == 0
    }

    pub(crate) fn legal_syntactic(&self, conf: &Configuration, out: &mut Vec<u32>) {
        let s0 = conf.stack_at(0);
        let q0 = conf.queue_at(0);
        if q0.is_some() {
            out.push(self.table.shift);
        }
        if let Some(s0) = s0 {
            if conf.head_of(s0).is_some() {
                out.push(self.table.reduce);
            }
            if q0.is_some() {
                if s0 != 0 && conf.head_of(s0).is_none() {
                    for rel in 0..self.table.num_relations {
                        out.push(self.table.la(rel));
                    }
                }
                for rel in 0..self.table.num_relations {
                    out.push(self.table.ra(rel));
                }
            }
        }
        if self.pop_root_legal(conf) {
            out.push(self.table.pop_root);
        }
    }

    pub(crate) fn apply_syntactic(
        &self,
        conf: &Arc<Configuration>,
        t: u32,
    ) -> Result<Configuration> {
        if t == self.table.shift {
            return self.shift(conf);
        }
        if t == self.table.reduce {
            return self.reduce(conf);
        }
        if t == self.table.pop_root {
            return self.pop_root(conf);
        }
        if let Some(rel) = self.table.la_relation(t) {
            return self.left_arc(conf, rel);
        }
        if let Some(rel) = self.table.ra_relation(t) {
            return self.right_arc(conf, rel);
        }
        Err(illegal("arc-eager transition"))
    }

    /// The canonical arc-eager oracle ordering: left-arc when the top of
    /// stack attaches to the queue front, right-arc for the converse,
    /// reduce once the top of stack is exhausted, shift otherwise.
    pub(crate) fn oracle_syntactic(&self, conf: &Configuration, gold: &MorphGraph) -> Result<u32> {
        let q0 = match conf.queue_at(0) {
            Some(q0) => q0,
            None => {
                // Queue exhausted: unwind the stack, then pop the root.
                if self.pop_root_legal(conf) {
                    return Ok(self.table.pop_root);
                }
                let s0 = conf.stack_at(0).ok_or_else(|| illegal("oracle"))?;
                if conf.head_of(s0).is_some() {
                    return Ok(self.table.reduce);
                }
                return Err(illegal("oracle: unheaded stack node at queue end"));
            }
        };
        let s0 = match conf.stack_at(0) {
            Some(s0) => s0,
            None => return Ok(self.table.shift),
        };
        if s0 != 0 && conf.head_of(s0).is_none() {
            if let Some((head, rel)) = gold.head_of(s0) {
                if head == q0 {
                    return Ok(self.table.la(rel));
                }
            }
        }
        if let Some((head, rel)) = gold.head_of(q0) {
            if head == s0 {
                return Ok(self.table.ra(rel));
            }
        }
        if conf.head_of(s0).is_some() && self.exhausted(conf, gold, s0) {
            return Ok(self.table.reduce);
        }
        Ok(self.table.shift)
    }

    // The top of stack has no gold dependent still waiting for its arc.
    fn exhausted(&self, conf: &Configuration, gold: &MorphGraph, s0: usize) -> bool {
        gold.dependents_of(s0)
            .iter()
            .all(|&d| conf.head_of(d).is_some())
    }
}

impl TransitionSystem for ArcEager {
    fn table(&self) -> &TransitionTable {
        &self.table
    }

    fn initial(&self, lattices: Arc<Vec<crate::lattice::Lattice>>) -> Configuration {
        Configuration::new_segmented(lattices)
    }

    fn legal(&self, conf: &Configuration) -> Vec<u32> {
        let mut out = Vec::new();
        self.legal_syntactic(conf, &mut out);
        out
    }

    fn apply(&self, conf: &Arc<Configuration>, t: u32) -> Result<Configuration> {
        self.apply_syntactic(conf, t)
    }

    fn oracle(&self, conf: &Configuration, gold: &MorphGraph) -> Result<u32> {
        self.oracle_syntactic(conf, gold)
    }

    fn terminal(&self, conf: &Configuration) -> bool {
        conf.lattice_queue().is_empty() && conf.queue().is_empty() && conf.stack().is_empty()
    }
}
