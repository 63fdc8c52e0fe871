//! Terminal self-loop wrapper.

use std::sync::Arc;

use crate::configuration::Configuration;
use crate::errors::Result;
use crate::graph::MorphGraph;
use crate::transition::{illegal, TransitionSystem, TransitionTable};

/// Wraps a transition system with an `IDLE` self-loop offered exactly at
/// the inner system's terminal configurations, so shorter derivations can
/// pad out while longer ones in the same beam keep working.
pub struct Idle<S> {
    inner: S,
}

impl<S> Idle<S>
where
    S: TransitionSystem,
{
    /// Wraps an inner system.
    pub const fn new(inner: S) -> Self {
        Self { inner }
    }

    /// The wrapped system.
    pub const fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S> TransitionSystem for Idle<S>
where
    S: TransitionSystem,
{
    fn table(&self) -> &TransitionTable {
        self.inner.table()
    }

    fn initial(&self, lattices: Arc<Vec<crate::lattice::Lattice>>) -> Configuration {
        self.inner.initial(lattices)
    }

    fn legal(&self, conf: &Configuration) -> Vec<u32> {
        if self.inner.terminal(conf) {
            return vec![self.table().idle];
        }
        self.inner.legal(conf)
    }

    fn apply(&self, conf: &Arc<Configuration>, t: u32) -> Result<Configuration> {
        if t == self.table().idle {
            if !self.inner.terminal(conf) {
                return Err(illegal("IDLE"));
            }
            let mut child = conf.copy();
            child.set_last(t);
            return Ok(child);
        }
        self.inner.apply(conf, t)
    }

    fn oracle(&self, conf: &Configuration, gold: &MorphGraph) -> Result<u32> {
        if self.inner.terminal(conf) {
            return Ok(self.table().idle);
        }
        self.inner.oracle(conf, gold)
    }

    fn terminal(&self, conf: &Configuration) -> bool {
        self.inner.terminal(conf)
    }
}
