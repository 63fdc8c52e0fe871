//! The arc-standard system: shift, left-arc, right-arc.

use std::sync::Arc;

use crate::configuration::Configuration;
use crate::errors::Result;
use crate::graph::{DepArc, MorphGraph};
use crate::transition::{illegal, TransitionSystem, TransitionTable};

/// Arc-standard dependency parsing over a pre-segmented queue.
pub struct ArcStandard {
    pub(crate) table: TransitionTable,
}

impl ArcStandard {
    /// Creates the system over a transition table.
    pub const fn new(table: TransitionTable) -> Self {
        Self { table }
    }

    fn shift(&self, conf: &Arc<Configuration>) -> Result<Configuration> {
        let mut child = conf.copy();
        let node = child.pop_queue().ok_or_else(|| illegal("SH"))?;
        child.push_stack(node);
        child.set_last(self.table.shift);
        Ok(child)
    }

    fn left_arc(&self, conf: &Arc<Configuration>, relation: u32) -> Result<Configuration> {
        let (s0, q0) = match (conf.stack_at(0), conf.queue_at(0)) {
            (Some(s0), Some(q0)) if s0 != 0 => (s0, q0),
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

    fn right_arc(&self, conf: &Arc<Configuration>, relation: u32) -> Result<Configuration> {
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
        child.pop_stack();
        child.replace_queue_front(s0);
        child.set_last(self.table.ra(relation));
        Ok(child)
    }
}

impl TransitionSystem for ArcStandard {
    fn table(&self) -> &TransitionTable {
        &self.table
    }

    fn initial(&self, lattices: Arc<Vec<crate::lattice::Lattice>>) -> Configuration {
        Configuration::new_segmented(lattices)
    }

    fn legal(&self, conf: &Configuration) -> Vec<u32> {
        let mut out = Vec::new();
        let have_queue = !conf.queue().is_empty();
        if have_queue && conf.queue().len() + conf.stack().len() > 2 {
            out.push(self.table.shift);
        }
        if have_queue {
            if let Some(s0) = conf.stack_at(0) {
                if s0 != 0 {
                    for rel in 0..self.table.num_relations {
                        out.push(self.table.la(rel));
                    }
                }
                for rel in 0..self.table.num_relations {
                    out.push(self.table.ra(rel));
                }
            }
        }
        out
    }

    fn apply(&self, conf: &Arc<Configuration>, t: u32) -> Result<Configuration> {
        if t == self.table.shift {
            return self.shift(conf);
        }
        if let Some(rel) = self.table.la_relation(t) {
            return self.left_arc(conf, rel);
        }
        if let Some(rel) = self.table.ra_relation(t) {
            return self.right_arc(conf, rel);
        }
        Err(illegal("arc-standard transition"))
    }

    fn oracle(&self, conf: &Configuration, gold: &MorphGraph) -> Result<u32> {
        let q0 = conf.queue_at(0).ok_or_else(|| illegal("oracle"))?;
        let s0 = match conf.stack_at(0) {
            Some(s0) => s0,
            None => return Ok(self.table.shift),
        };
        if s0 != 0 {
            if let Some((head, rel)) = gold.head_of(s0) {
                if head == q0 {
                    return Ok(self.table.la(rel));
                }
            }
        }
        if let Some((head, rel)) = gold.head_of(q0) {
            if head == s0 && self.attached(conf, gold.dependents_of(q0)) {
                return Ok(self.table.ra(rel));
            }
        }
        Ok(self.table.shift)
    }

    fn terminal(&self, conf: &Configuration) -> bool {
        conf.lattice_queue().is_empty() && conf.stack().is_empty() && conf.queue().len() == 1
    }
}

impl ArcStandard {
    /// All gold dependents already have their arc in the configuration.
    fn attached(&self, conf: &Configuration, dependents: &[usize]) -> bool {
        dependents
            .iter()
            .all(|&d| conf.head_of(d).is_some())
    }
}
