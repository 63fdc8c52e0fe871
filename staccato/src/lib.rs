//! # Staccato
//!
//! Staccato is a joint morphological and syntactic parser for
//! morphologically-rich languages. A sentence arrives as a sequence of
//! per-token lattices whose paths enumerate alternative morpheme
//! segmentations; the parser picks one path per token while building a
//! labeled dependency tree over the chosen morphemes, using a
//! variable-length beam over an arc-eager transition system and an
//! averaged structured perceptron.
//!
//! ## Examples
//!
//! ```no_run
//! use std::fs::File;
//! use std::io::BufReader;
//! use std::sync::Arc;
//!
//! use staccato::beam::Beam;
//! use staccato::format::lattice_file;
//! use staccato::model::Model;
//! use staccato::transition::{ArcEagerMorph, Idle, TransitionTable};
//!
//! let mut model = Model::read(BufReader::new(File::open("morph.model").unwrap())).unwrap();
//! let extractor = model.extractor().unwrap();
//! let table = TransitionTable::new(&mut model.registry).unwrap();
//! let system = Idle::new(ArcEagerMorph::new(table));
//!
//! let sentences = {
//!     let rdr = BufReader::new(File::open("input.lattices").unwrap());
//!     lattice_file::read(rdr, &mut model.registry).unwrap()
//! };
//! let beam = Beam::new(&system, &extractor, &model.matrix, 4);
//! for sentence in sentences {
//!     let (parsed, _score) = beam.parse(staccato::lattice::rooted(sentence)).unwrap();
//!     assert!(parsed.terminal());
//! }
//! ```
#![deny(missing_docs)]

pub mod beam;
pub mod common;
pub mod configuration;
pub mod enumeration;
pub mod errors;
pub mod extractor;
pub mod format;
pub mod graph;
pub mod lattice;
pub mod model;
pub mod morpheme;
pub mod perceptron;
pub mod transition;

#[cfg(test)]
mod test_utils;
#[cfg(test)]
mod tests;

pub use beam::Beam;
pub use configuration::Configuration;
pub use enumeration::Registry;
pub use model::Model;
pub use perceptron::LinearPerceptron;
