//! Variable-length beam search over parser configurations.
//!
//! The beam is not synchronous on transition count: derivations of
//! different lengths coexist because finished items pad with `IDLE`, and a
//! generation ends only when the bounded agenda has been drained into the
//! next live set. Search stops once every live item is terminal.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::prelude::*;

use crate::configuration::Configuration;
use crate::errors::{Result, StaccatoError};
use crate::extractor::GenericExtractor;
use crate::lattice::Lattice;
use crate::model::AvgMatrixSparse;
use crate::transition::TransitionSystem;

/// A live beam entry: a configuration and its accumulated score.
#[derive(Clone)]
pub struct BeamItem {
    /// The configuration.
    pub conf: Arc<Configuration>,
    /// Sum of the model scores of the transitions that produced it.
    pub score: i64,
    gold: bool,
}

struct AgendaEntry {
    item: BeamItem,
    seq: usize,
}

impl PartialEq for AgendaEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for AgendaEntry {}

impl PartialOrd for AgendaEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for AgendaEntry {
    // Greatest = most evictable: lowest score, then latest insertion.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .item
            .score
            .cmp(&self.item.score)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

// Bounded max-heap of capacity K; insertion past capacity evicts the
// lowest-scored entry, preferring to keep earlier insertions on ties.
struct Agenda {
    capacity: usize,
    heap: BinaryHeap<AgendaEntry>,
    seq: usize,
}

impl Agenda {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            heap: BinaryHeap::with_capacity(capacity + 1),
            seq: 0,
        }
    }

    fn insert(&mut self, item: BeamItem) {
        let entry = AgendaEntry {
            item,
            seq: self.seq,
        };
        self.seq += 1;
        if self.heap.len() < self.capacity {
            self.heap.push(entry);
            return;
        }
        if let Some(worst) = self.heap.peek() {
            if entry < *worst {
                self.heap.push(entry);
                self.heap.pop();
            }
        }
    }

    // Survivors, best first.
    fn into_sorted(self) -> Vec<BeamItem> {
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|entry| entry.item)
            .collect()
    }
}

/// Outcome of a beam decode run alongside a gold derivation.
pub struct DecodeResult {
    /// The highest-scored live item when decoding stopped.
    pub best: BeamItem,
    /// Generation at which the gold prefix left the beam, if it did.
    pub updated_at: Option<usize>,
    /// Whether the best final item followed the gold derivation exactly.
    pub best_is_gold: bool,
    /// Transitions taken by every live item when decoding stopped.
    pub depth: usize,
}

/// The beam decoder.
pub struct Beam<'a> {
    system: &'a dyn TransitionSystem,
    extractor: &'a GenericExtractor,
    model: &'a AvgMatrixSparse,
    size: usize,
    concurrent: bool,
    timeout: Option<Duration>,
}

impl<'a> Beam<'a> {
    /// Creates a decoder of beam width `size`.
    pub fn new(
        system: &'a dyn TransitionSystem,
        extractor: &'a GenericExtractor,
        model: &'a AvgMatrixSparse,
        size: usize,
    ) -> Self {
        Self {
            system,
            extractor,
            model,
            size: size.max(1),
            concurrent: false,
            timeout: None,
        }
    }

    /// Expands live items on a worker pool. Scores are unaffected; the
    /// order of equal-scored candidates may differ from the
    /// single-threaded reference.
    pub fn concurrent(mut self, yes: bool) -> Self {
        self.concurrent = yes;
        self
    }

    /// Aborts any single parse exceeding this limit.
    pub fn timeout(mut self, limit: Option<Duration>) -> Self {
        self.timeout = limit;
        self
    }

    /// Parses a rooted lattice sentence, returning the best terminal
    /// configuration and its score.
    ///
    /// # Errors
    ///
    /// [`StaccatoError::Timeout`] when the time limit is exceeded;
    /// [`StaccatoError::Lattice`] when no terminal configuration is
    /// reachable.
    pub fn parse(&self, lattices: Arc<Vec<Lattice>>) -> Result<(Arc<Configuration>, i64)> {
        let result = self.run(lattices, None)?;
        Ok((result.best.conf, result.best.score))
    }

    /// Decodes alongside a gold transition sequence, stopping early at the
    /// first generation whose live set no longer contains the gold prefix.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Beam::parse()`].
    pub fn decode(
        &self,
        lattices: Arc<Vec<Lattice>>,
        gold_transitions: &[u32],
    ) -> Result<DecodeResult> {
        self.run(lattices, Some(gold_transitions))
    }

    fn run(&self, lattices: Arc<Vec<Lattice>>, gold: Option<&[u32]>) -> Result<DecodeResult> {
        let start = Instant::now();
        let idle = self.system.table().idle;
        let mut live = vec![BeamItem {
            conf: Arc::new(self.system.initial(lattices)),
            score: 0,
            gold: true,
        }];
        let mut depth = 0;

        while !live.iter().all(|item| self.system.terminal(&item.conf)) {
            if let Some(limit) = self.timeout {
                if start.elapsed() >= limit {
                    return Err(StaccatoError::Timeout);
                }
            }
            // The gold derivation pads with IDLE beyond its own end.
            let gold_next = gold.map(|g| g.get(depth).copied().unwrap_or(idle));

            let expanded: Vec<Vec<BeamItem>> = if self.concurrent {
                live.par_iter()
                    .map(|item| self.expand(item, gold_next))
                    .collect::<Result<_>>()?
            } else {
                live.iter()
                    .map(|item| self.expand(item, gold_next))
                    .collect::<Result<_>>()?
            };

            let mut agenda = Agenda::new(self.size);
            for candidates in expanded {
                for item in candidates {
                    agenda.insert(item);
                }
            }
            live = agenda.into_sorted();
            depth += 1;

            if live.is_empty() {
                return Err(StaccatoError::lattice(
                    "beam exhausted without a terminal configuration",
                ));
            }
            if gold.is_some() && !live.iter().any(|item| item.gold) {
                return Ok(DecodeResult {
                    best: live.swap_remove(0),
                    updated_at: Some(depth),
                    best_is_gold: false,
                    depth,
                });
            }
        }

        let best_is_gold = live[0].gold;
        Ok(DecodeResult {
            best: live.swap_remove(0),
            updated_at: None,
            best_is_gold: gold.is_some() && best_is_gold,
            depth,
        })
    }

    fn expand(&self, item: &BeamItem, gold_next: Option<u32>) -> Result<Vec<BeamItem>> {
        let legal = self.system.legal(&item.conf);
        if legal.is_empty() {
            // Dead ends drop out; terminal items without a self-loop carry.
            if self.system.terminal(&item.conf) {
                return Ok(vec![item.clone()]);
            }
            return Ok(Vec::new());
        }
        let feats = self.extractor.features(&item.conf);
        let scores = self.model.scores(&feats);
        legal
            .into_iter()
            .map(|t| {
                let child = self.system.apply(&item.conf, t)?;
                Ok(BeamItem {
                    conf: Arc::new(child),
                    score: item.score + scores.get(t as usize).copied().unwrap_or(0),
                    gold: item.gold && gold_next == Some(t),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(score: i64) -> BeamItem {
        BeamItem {
            conf: Arc::new(Configuration::new(Arc::new(vec![Lattice::root()]))),
            score,
            gold: false,
        }
    }

    #[test]
    fn test_agenda_keeps_top_k() {
        let mut agenda = Agenda::new(2);
        for score in [1, 5, 3, 4] {
            agenda.insert(item(score));
        }
        let live = agenda.into_sorted();
        assert_eq!(live.iter().map(|i| i.score).collect::<Vec<_>>(), vec![5, 4]);
    }

    #[test]
    fn test_agenda_ties_are_fifo() {
        let mut agenda = Agenda::new(2);
        let mut first = item(2);
        first.gold = true;
        agenda.insert(first);
        agenda.insert(item(2));
        agenda.insert(item(2));
        let live = agenda.into_sorted();
        assert_eq!(live.len(), 2);
        // the earliest equal-scored insertion survives and ranks first
        assert!(live[0].gold);
    }
}
