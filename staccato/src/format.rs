//! Readers and writers for the tabular dependency, lattice, and
//! segmentation file formats.

pub mod conll;
pub mod lattice_file;
pub mod segmentation;
