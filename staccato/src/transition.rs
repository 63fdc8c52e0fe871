//! Transition systems over parser configurations.
//!
//! The variants compose the way the parser families extend one another:
//! [`ArcStandard`] is the base syntactic system, [`ArcEager`] adds reduce
//! and root-popping, [`ArcEagerMorph`] adds morpheme disambiguation from
//! the lattice queue, and [`Idle`] wraps any of them with a terminal
//! self-loop so derivations of different lengths can pad out inside one
//! beam.

pub(crate) mod arc_eager;
pub(crate) mod arc_standard;
pub(crate) mod idle;
pub(crate) mod morph;

use std::sync::Arc;

use crate::common::MAX_MD_TRANSITIONS;
use crate::configuration::Configuration;
use crate::enumeration::Registry;
use crate::errors::{Result, StaccatoError};
use crate::graph::MorphGraph;

pub use arc_eager::ArcEager;
pub use arc_standard::ArcStandard;
pub use idle::Idle;
pub use morph::ArcEagerMorph;

/// The frozen layout of transition ids.
///
/// Ids are dense: a dummy `NO` action at 0, the four fixed transitions,
/// one `LA-*` and one `RA-*` slot per relation, and a block of `MD-*`
/// slots for morpheme selection. The layout is registered in the
/// transition enumeration and persisted with a model.
#[derive(Clone, Copy, Debug)]
pub struct TransitionTable {
    /// Dummy slot for "no transition yet".
    pub no: u32,
    /// Shift.
    pub shift: u32,
    /// Reduce.
    pub reduce: u32,
    /// Pop the root, ending the syntactic phase.
    pub pop_root: u32,
    /// Terminal self-loop.
    pub idle: u32,
    /// Base id of the left-arc block.
    pub left_arc: u32,
    /// Base id of the right-arc block.
    pub right_arc: u32,
    /// Base id of the morpheme-disambiguation block.
    pub morph: u32,
    /// Number of relations, and so the size of each arc block.
    pub num_relations: u32,
    /// Number of reserved morpheme-disambiguation slots.
    pub num_morph: u32,
}

impl TransitionTable {
    /// Lays the table out over the registry's relations and registers every
    /// transition name. Freezes both the relation and the transition
    /// enumerations.
    ///
    /// # Errors
    ///
    /// [`StaccatoError`] is returned when the registry holds no relations.
    pub fn new(registry: &mut Registry) -> Result<Self> {
        if registry.relations.is_empty() {
            return Err(StaccatoError::invalid_argument(
                "registry",
                "no relations to lay transitions over",
            ));
        }
        registry.relations.freeze();
        let relations: Vec<String> = registry.relations.iter().cloned().collect();

        let trans = &mut registry.transitions;
        let no = trans.add("NO".to_string())?;
        let shift = trans.add("SH".to_string())?;
        let reduce = trans.add("RE".to_string())?;
        let pop_root = trans.add("PR".to_string())?;
        let idle = trans.add("IDLE".to_string())?;
        let left_arc = u32::try_from(trans.len())?;
        for rel in &relations {
            trans.add(format!("LA-{rel}"))?;
        }
        let right_arc = u32::try_from(trans.len())?;
        for rel in &relations {
            trans.add(format!("RA-{rel}"))?;
        }
        let morph = u32::try_from(trans.len())?;
        for k in 0..MAX_MD_TRANSITIONS {
            trans.add(format!("MD-{k}"))?;
        }
        trans.freeze();

        Ok(Self {
            no,
            shift,
            reduce,
            pop_root,
            idle,
            left_arc,
            right_arc,
            morph,
            num_relations: u32::try_from(relations.len())?,
            num_morph: u32::try_from(MAX_MD_TRANSITIONS)?,
        })
    }

    /// Total number of transition ids.
    #[inline(always)]
    pub const fn len(&self) -> usize {
        (self.morph + self.num_morph) as usize
    }

    /// Checks if the table is empty; it never is.
    #[inline(always)]
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// The left-arc transition of a relation.
    #[inline(always)]
    pub const fn la(&self, relation: u32) -> u32 {
        self.left_arc + relation
    }

    /// The right-arc transition of a relation.
    #[inline(always)]
    pub const fn ra(&self, relation: u32) -> u32 {
        self.right_arc + relation
    }

    /// The morpheme-disambiguation transition selecting edge `k`.
    #[inline(always)]
    pub const fn md(&self, k: u32) -> u32 {
        self.morph + k
    }

    /// The relation of a left-arc transition.
    #[inline(always)]
    pub fn la_relation(&self, t: u32) -> Option<u32> {
        (t >= self.left_arc && t < self.right_arc).then(|| t - self.left_arc)
    }

    /// The relation of a right-arc transition.
    #[inline(always)]
    pub fn ra_relation(&self, t: u32) -> Option<u32> {
        (t >= self.right_arc && t < self.morph).then(|| t - self.right_arc)
    }

    /// The edge index of a morpheme-disambiguation transition.
    #[inline(always)]
    pub fn md_index(&self, t: u32) -> Option<usize> {
        (t >= self.morph).then(|| (t - self.morph) as usize)
    }
}

/// A transition system: the legal-transition predicate, the transition
/// application function, and the training-time oracle.
pub trait TransitionSystem: Send + Sync {
    /// The transition id layout the system draws from.
    fn table(&self) -> &TransitionTable;

    /// Builds the initial configuration for a rooted lattice sentence.
    fn initial(&self, lattices: Arc<Vec<crate::lattice::Lattice>>) -> Configuration {
        Configuration::new(lattices)
    }

    /// All transitions whose preconditions hold at `conf`.
    fn legal(&self, conf: &Configuration) -> Vec<u32>;

    /// Applies a transition to a configuration, yielding its successor.
    ///
    /// # Errors
    ///
    /// [`StaccatoError::Oracle`] is returned when the transition's
    /// precondition does not hold.
    fn apply(&self, conf: &Arc<Configuration>, t: u32) -> Result<Configuration>;

    /// The unique gold transition at a configuration on the oracle path.
    ///
    /// # Errors
    ///
    /// [`StaccatoError::Oracle`] is returned when no gold transition can be
    /// derived; the training instance is then unrecoverable.
    fn oracle(&self, conf: &Configuration, gold: &MorphGraph) -> Result<u32>;

    /// Whether the system considers the configuration finished.
    fn terminal(&self, conf: &Configuration) -> bool {
        conf.terminal()
    }
}

pub(crate) fn illegal(name: &str) -> StaccatoError {
    StaccatoError::oracle(format!("precondition of {name} violated"))
}
