//! Early-update structured perceptron training over the beam decoder.

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::sync::Arc;

use crate::beam::{Beam, DecodeResult};
use crate::configuration::Configuration;
use crate::errors::{Result, StaccatoError};
use crate::extractor::GenericExtractor;
use crate::graph::MorphGraph;
use crate::model::Model;
use crate::transition::TransitionSystem;

/// One training instance: a gold graph and its oracle-derived
/// configuration chain, oldest first.
pub struct TrainingInstance {
    /// The gold morph-dependency graph.
    pub graph: MorphGraph,
    /// The gold derivation; `sequence[0]` is the initial configuration.
    pub sequence: Vec<Arc<Configuration>>,
}

/// Replays the oracle over a gold graph, producing the gold derivation.
///
/// # Errors
///
/// [`StaccatoError::Oracle`] is returned when no gold transition can be
/// derived at some configuration, or when the oracle fails to terminate.
pub fn oracle_sequence(
    system: &dyn TransitionSystem,
    graph: &MorphGraph,
) -> Result<Vec<Arc<Configuration>>> {
    let mut conf = Arc::new(system.initial(Arc::clone(&graph.lattices)));
    let mut chain = vec![Arc::clone(&conf)];
    // Any correct derivation is far shorter than this; a longer one means
    // the oracle is looping on an incoherent instance.
    let limit = 8 * graph.lattices.iter().map(|l| l.morphemes.len()).sum::<usize>() + 16;
    while !system.terminal(&conf) {
        if chain.len() > limit {
            return Err(StaccatoError::oracle(
                "oracle failed to terminate; instance is incoherent",
            ));
        }
        let t = system.oracle(&conf, graph)?;
        conf = Arc::new(system.apply(&conf, t)?);
        chain.push(Arc::clone(&conf));
    }
    Ok(chain)
}

/// Derives gold sequences for a corpus, skipping unrecoverable instances.
/// Returns the usable instances and the skip count.
pub fn gold_sequences(
    system: &dyn TransitionSystem,
    graphs: Vec<MorphGraph>,
) -> (Vec<TrainingInstance>, usize) {
    let mut instances = Vec::with_capacity(graphs.len());
    let mut skipped = 0;
    for graph in graphs {
        match oracle_sequence(system, &graph) {
            Ok(sequence) => instances.push(TrainingInstance { graph, sequence }),
            Err(_) => skipped += 1,
        }
    }
    (instances, skipped)
}

/// The averaged linear perceptron trainer.
pub struct LinearPerceptron<'a> {
    system: &'a dyn TransitionSystem,
    extractor: &'a GenericExtractor,
    model: &'a Model,
    iterations: usize,
    beam_size: usize,
    concurrent_beam: bool,
    temp_prefix: Option<PathBuf>,
    temp_every: usize,
    generation: u32,
    updates: usize,
}

impl<'a> LinearPerceptron<'a> {
    /// Creates a trainer updating `model` in place.
    pub fn new(
        system: &'a dyn TransitionSystem,
        extractor: &'a GenericExtractor,
        model: &'a Model,
    ) -> Self {
        Self {
            system,
            extractor,
            model,
            iterations: 1,
            beam_size: 4,
            concurrent_beam: false,
            temp_prefix: None,
            temp_every: 1000,
            generation: 0,
            updates: 0,
        }
    }

    /// Number of passes over the training data.
    pub fn iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations.max(1);
        self
    }

    /// Beam width used while decoding.
    pub fn beam_size(mut self, size: usize) -> Self {
        self.beam_size = size.max(1);
        self
    }

    /// Expands beam items on a worker pool.
    pub fn concurrent_beam(mut self, yes: bool) -> Self {
        self.concurrent_beam = yes;
        self
    }

    /// Writes a temporary model snapshot every `every` instances to
    /// `{prefix}.tmp`.
    pub fn temp_model(mut self, prefix: Option<PathBuf>, every: usize) -> Self {
        self.temp_prefix = prefix;
        self.temp_every = every.max(1);
        self
    }

    /// Number of perceptron updates applied so far.
    pub const fn num_updates(&self) -> usize {
        self.updates
    }

    /// Runs the training loop and realises averaged weights.
    ///
    /// # Errors
    ///
    /// Decoding and I/O errors are returned as is.
    pub fn train(&mut self, instances: &[TrainingInstance]) -> Result<()> {
        for _ in 0..self.iterations {
            for instance in instances {
                self.generation += 1;
                self.step(instance)?;
                if self.temp_prefix.is_some() && self.generation as usize % self.temp_every == 0 {
                    self.write_temp()?;
                }
            }
        }
        // Integrate one generation past the last update so the final weight
        // state participates in the average.
        self.model.matrix.integrate(self.generation + 1);
        if self.generation > 0 {
            self.model.matrix.scalar_divide(i64::from(self.generation))?;
        }
        Ok(())
    }

    fn step(&mut self, instance: &TrainingInstance) -> Result<()> {
        let gold_transitions: Vec<u32> = instance.sequence[1..]
            .iter()
            .map(|conf| conf.last())
            .collect();
        let beam = Beam::new(
            self.system,
            self.extractor,
            &self.model.matrix,
            self.beam_size,
        )
        .concurrent(self.concurrent_beam);
        let result = beam.decode(Arc::clone(&instance.graph.lattices), &gold_transitions)?;
        if result.updated_at.is_some() || !result.best_is_gold {
            self.update(instance, &result);
        }
        Ok(())
    }

    /// Adjusts weights toward the gold prefix and away from the predicted
    /// prefix, both of the beam's stopping depth.
    fn update(&mut self, instance: &TrainingInstance, result: &DecodeResult) {
        let idle = self.system.table().idle;
        let terminal_gold = instance.sequence.last().unwrap();
        for i in 0..result.depth {
            let (conf, transition) = if i + 1 < instance.sequence.len() {
                (&instance.sequence[i], instance.sequence[i + 1].last())
            } else {
                (terminal_gold, idle)
            };
            let feats = self.extractor.features(conf);
            self.model
                .matrix
                .add(self.generation, transition, &feats, 1);
        }
        let predicted = result.best.conf.sequence();
        for pair in predicted.windows(2) {
            let feats = self.extractor.features(&pair[0]);
            self.model
                .matrix
                .add(self.generation, pair[1].last(), &feats, -1);
        }
        self.updates += 1;
    }

    fn write_temp(&self) -> Result<()> {
        let prefix = self.temp_prefix.as_ref().unwrap();
        let path = prefix.with_extension("tmp");
        let wtr = BufWriter::new(File::create(path)?);
        self.model.write(wtr)?;
        Ok(())
    }
}
