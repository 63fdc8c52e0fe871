//! The averaged sparse transition-scoring model.
//!
//! Weights live in two-level stores: one [`AvgSparse`] per feature
//! template, mapping evaluated features to per-transition history cells.
//! Averaging is lazy: each cell records the generation of its last update
//! and accumulates its running total only when touched, so an update costs
//! O(1) regardless of how many generations passed.

use std::io::{Read, Write};
use std::sync::{Mutex, RwLock};

use bincode::{Decode, Encode};
use hashbrown::HashMap;

use crate::common::{bincode_config, MODEL_FORMAT_TAG};
use crate::enumeration::Registry;
use crate::errors::{Result, StaccatoError};
use crate::extractor::{FeatureValue, GenericExtractor};

/// One weight cell: the live value plus the bookkeeping needed to realise
/// the averaged value at the end of training.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct HistoryValue {
    /// Current (unaveraged) weight.
    pub value: i64,
    total: i64,
    generation: u32,
    prev_generation: u32,
}

impl HistoryValue {
    /// Creates a cell first touched at `generation`.
    pub const fn new(generation: u32, value: i64) -> Self {
        Self {
            value,
            total: 0,
            generation,
            prev_generation: 0,
        }
    }

    /// Applies a weight change at `generation`, folding the span since the
    /// previous update into the running total.
    pub fn add(&mut self, generation: u32, amount: i64) {
        if self.prev_generation < self.generation {
            self.total += i64::from(generation - self.generation) * self.value;
        }
        if self.generation < generation {
            self.prev_generation = self.generation;
            self.generation = generation;
        }
        self.value += amount;
    }

    /// Finalises the averaged weight as of `generation`.
    pub fn integrate(&mut self, generation: u32) {
        self.value = self.total + i64::from(generation - self.generation) * self.value;
    }
}

/// Per-transition history cells of one feature. The dense variant is an
/// id-indexed array; the sparse variant a map. The choice is fixed when
/// the store is built.
#[derive(Debug)]
pub enum ScoreStore {
    /// Array indexed by transition id.
    Dense(Vec<Option<HistoryValue>>),
    /// Map keyed by transition id.
    Sparse(HashMap<u32, HistoryValue>),
}

impl ScoreStore {
    /// Creates a store of the requested variant.
    pub fn new(dense: bool, capacity: usize) -> Self {
        if dense {
            Self::Dense(vec![None; capacity])
        } else {
            Self::Sparse(HashMap::with_capacity(capacity))
        }
    }

    /// Applies a weight change for one transition.
    pub fn add(&mut self, generation: u32, transition: u32, amount: i64) {
        match self {
            Self::Dense(cells) => {
                let idx = transition as usize;
                if idx >= cells.len() {
                    cells.resize(idx + 1, None);
                }
                match &mut cells[idx] {
                    Some(cell) => cell.add(generation, amount),
                    slot => *slot = Some(HistoryValue::new(generation, amount)),
                }
            }
            Self::Sparse(cells) => {
                cells
                    .entry(transition)
                    .and_modify(|cell| cell.add(generation, amount))
                    .or_insert_with(|| HistoryValue::new(generation, amount));
            }
        }
    }

    /// The cell of one transition.
    pub fn get(&self, transition: u32) -> Option<&HistoryValue> {
        match self {
            Self::Dense(cells) => cells.get(transition as usize)?.as_ref(),
            Self::Sparse(cells) => cells.get(&transition),
        }
    }

    /// Installs a cell for one transition.
    pub fn set(&mut self, transition: u32, cell: HistoryValue) {
        match self {
            Self::Dense(cells) => {
                let idx = transition as usize;
                if idx >= cells.len() {
                    cells.resize(idx + 1, None);
                }
                cells[idx] = Some(cell);
            }
            Self::Sparse(cells) => {
                cells.insert(transition, cell);
            }
        }
    }

    /// One past the largest transition id with a cell.
    pub fn len(&self) -> usize {
        match self {
            Self::Dense(cells) => cells.len(),
            Self::Sparse(cells) => cells
                .keys()
                .max()
                .map_or(0, |&max| max as usize + 1),
        }
    }

    /// Checks if the store has no cells.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Visits every cell.
    pub fn each<F>(&self, mut f: F)
    where
        F: FnMut(u32, &HistoryValue),
    {
        match self {
            Self::Dense(cells) => {
                for (i, cell) in cells.iter().enumerate() {
                    if let Some(cell) = cell {
                        f(i as u32, cell);
                    }
                }
            }
            Self::Sparse(cells) => {
                for (&i, cell) in cells {
                    f(i, cell);
                }
            }
        }
    }

    fn each_mut<F>(&mut self, mut f: F)
    where
        F: FnMut(&mut HistoryValue),
    {
        match self {
            Self::Dense(cells) => {
                for cell in cells.iter_mut().flatten() {
                    f(cell);
                }
            }
            Self::Sparse(cells) => {
                for cell in cells.values_mut() {
                    f(cell);
                }
            }
        }
    }

    /// Realises averaged weights for every cell.
    pub fn integrate(&mut self, generation: u32) {
        self.each_mut(|cell| cell.integrate(generation));
    }
}

/// Weights of one feature template: evaluated feature to transition cells.
///
/// The outer map takes a readers-writer lock — scoring only ever reads it,
/// and only the first sighting of a feature writes — while each inner
/// store carries its own lock.
pub struct AvgSparse {
    dense: bool,
    vals: RwLock<HashMap<FeatureValue, Mutex<ScoreStore>>>,
}

impl AvgSparse {
    /// Creates an empty store choosing the per-feature representation.
    pub fn new(dense: bool) -> Self {
        Self {
            dense,
            vals: RwLock::new(HashMap::new()),
        }
    }

    /// The live weight of a (feature, transition) pair.
    pub fn value(&self, transition: u32, feature: &FeatureValue) -> i64 {
        let vals = self.vals.read().unwrap();
        vals.get(feature).map_or(0, |store| {
            store
                .lock()
                .unwrap()
                .get(transition)
                .map_or(0, |cell| cell.value)
        })
    }

    /// Applies a weight change to a (feature, transition) cell, creating
    /// the cell on first sight.
    pub fn add(&self, generation: u32, transition: u32, feature: &FeatureValue, amount: i64) {
        {
            let vals = self.vals.read().unwrap();
            if let Some(store) = vals.get(feature) {
                store.lock().unwrap().add(generation, transition, amount);
                return;
            }
        }
        let mut vals = self.vals.write().unwrap();
        let store = vals
            .entry(feature.clone())
            .or_insert_with(|| Mutex::new(ScoreStore::new(self.dense, transition as usize + 1)));
        store.get_mut().unwrap().add(generation, transition, amount);
    }

    /// Accumulates this feature's per-transition weights into `scores`,
    /// growing it as needed.
    pub fn add_scores(&self, feature: &FeatureValue, scores: &mut Vec<i64>) {
        let vals = self.vals.read().unwrap();
        if let Some(store) = vals.get(feature) {
            let store = store.lock().unwrap();
            if scores.len() < store.len() {
                scores.resize(store.len(), 0);
            }
            store.each(|i, cell| scores[i as usize] += cell.value);
        }
    }

    /// Realises averaged weights in every cell.
    pub fn integrate(&self, generation: u32) {
        let mut vals = self.vals.write().unwrap();
        for store in vals.values_mut() {
            store.get_mut().unwrap().integrate(generation);
        }
    }

    /// Divides every live weight.
    ///
    /// # Errors
    ///
    /// [`StaccatoError`] is returned when `by` is zero.
    pub fn scalar_divide(&self, by: i64) -> Result<()> {
        if by == 0 {
            return Err(StaccatoError::invalid_argument("by", "division by zero"));
        }
        let mut vals = self.vals.write().unwrap();
        for store in vals.values_mut() {
            store.get_mut().unwrap().each_mut(|cell| cell.value /= by);
        }
        Ok(())
    }

    /// Number of distinct features seen.
    pub fn len(&self) -> usize {
        self.vals.read().unwrap().len()
    }

    /// Checks if no feature has been seen.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot as (feature, per-transition weights) rows, sorted by
    /// feature for stable output; slot order is the transition id order.
    pub fn snapshot(&self) -> Vec<(FeatureValue, Vec<i64>)> {
        let vals = self.vals.read().unwrap();
        let mut rows: Vec<(FeatureValue, Vec<i64>)> = vals
            .iter()
            .map(|(feature, store)| {
                let store = store.lock().unwrap();
                let mut scores = vec![0; store.len()];
                store.each(|i, cell| scores[i as usize] = cell.value);
                (feature.clone(), scores)
            })
            .collect();
        rows.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        rows
    }

    /// Rebuilds a store from snapshot rows, stamping every cell with the
    /// restoration generation.
    pub fn restore(dense: bool, rows: Vec<(FeatureValue, Vec<i64>)>, generation: u32) -> Self {
        let mut vals = HashMap::with_capacity(rows.len());
        for (feature, scores) in rows {
            let mut store = ScoreStore::new(dense, scores.len());
            for (i, value) in scores.into_iter().enumerate() {
                store.set(i as u32, HistoryValue::new(generation, value));
            }
            vals.insert(feature, Mutex::new(store));
        }
        Self {
            dense,
            vals: RwLock::new(vals),
        }
    }
}

/// The full transition model: one [`AvgSparse`] per feature template.
pub struct AvgMatrixSparse {
    dense: bool,
    mats: Vec<AvgSparse>,
}

/// Serialized form of [`AvgMatrixSparse`].
#[derive(Decode, Encode)]
pub struct MatrixData {
    dense: bool,
    mats: Vec<Vec<(FeatureValue, Vec<i64>)>>,
}

impl AvgMatrixSparse {
    /// Creates an empty matrix with one store per template.
    pub fn new(num_templates: usize, dense: bool) -> Self {
        Self {
            dense,
            mats: (0..num_templates).map(|_| AvgSparse::new(dense)).collect(),
        }
    }

    /// Number of template stores.
    pub fn len(&self) -> usize {
        self.mats.len()
    }

    /// Checks if the matrix has no template stores.
    pub fn is_empty(&self) -> bool {
        self.mats.is_empty()
    }

    /// Accumulated per-transition scores of one feature vector; index `t`
    /// holds the score contribution of transition `t`.
    pub fn scores(&self, feats: &[Option<FeatureValue>]) -> Vec<i64> {
        let mut scores = Vec::new();
        for (mat, feature) in self.mats.iter().zip(feats) {
            if let Some(feature) = feature {
                mat.add_scores(feature, &mut scores);
            }
        }
        scores
    }

    /// Applies a weight change for one (feature vector, transition) pair.
    pub fn add(
        &self,
        generation: u32,
        transition: u32,
        feats: &[Option<FeatureValue>],
        amount: i64,
    ) {
        for (mat, feature) in self.mats.iter().zip(feats) {
            if let Some(feature) = feature {
                mat.add(generation, transition, feature, amount);
            }
        }
    }

    /// Realises averaged weights across all stores.
    pub fn integrate(&self, generation: u32) {
        for mat in &self.mats {
            mat.integrate(generation);
        }
    }

    /// Divides all live weights.
    ///
    /// # Errors
    ///
    /// [`StaccatoError`] is returned when `by` is zero.
    pub fn scalar_divide(&self, by: i64) -> Result<()> {
        for mat in &self.mats {
            mat.scalar_divide(by)?;
        }
        Ok(())
    }

    /// Snapshot for serialization.
    pub fn to_data(&self) -> MatrixData {
        MatrixData {
            dense: self.dense,
            mats: self.mats.iter().map(AvgSparse::snapshot).collect(),
        }
    }

    /// Rebuilds a matrix from its serialized form at the restoration
    /// generation.
    pub fn from_data(data: MatrixData, generation: u32) -> Self {
        Self {
            dense: data.dense,
            mats: data
                .mats
                .into_iter()
                .map(|rows| AvgSparse::restore(data.dense, rows, generation))
                .collect(),
        }
    }
}

/// A trained model: the enumerations, the feature templates, and the
/// weight matrix. This is what a model file holds.
pub struct Model {
    /// The enumeration registry the model was trained with.
    pub registry: Registry,
    templates: Vec<(String, String)>,
    /// The weight matrix.
    pub matrix: AvgMatrixSparse,
}

impl Model {
    /// Bundles registry, templates, and matrix into a model.
    pub fn new(
        registry: Registry,
        templates: Vec<(String, String)>,
        matrix: AvgMatrixSparse,
    ) -> Self {
        Self {
            registry,
            templates,
            matrix,
        }
    }

    /// The (template, group) pairs, in template id order.
    pub fn templates(&self) -> &[(String, String)] {
        &self.templates
    }

    /// Builds the feature extractor matching this model's templates.
    ///
    /// # Errors
    ///
    /// [`StaccatoError`] is returned when a persisted template fails to
    /// compile.
    pub fn extractor(&self) -> Result<GenericExtractor> {
        GenericExtractor::from_templates(&self.templates)
    }

    /// Exports the model.
    ///
    /// # Errors
    ///
    /// When bincode generates an error, it will be returned as is.
    pub fn write<W>(&self, mut wtr: W) -> Result<usize>
    where
        W: Write,
    {
        let mut num_bytes =
            bincode::encode_into_std_write(MODEL_FORMAT_TAG, &mut wtr, bincode_config())?;
        num_bytes += bincode::encode_into_std_write(&self.registry, &mut wtr, bincode_config())?;
        num_bytes += bincode::encode_into_std_write(&self.templates, &mut wtr, bincode_config())?;
        num_bytes +=
            bincode::encode_into_std_write(self.matrix.to_data(), &mut wtr, bincode_config())?;
        Ok(num_bytes)
    }

    /// Creates a model from a reader.
    ///
    /// # Errors
    ///
    /// [`StaccatoError::ModelMismatch`] is returned when the leading tag
    /// does not match; bincode errors are returned as is.
    pub fn read<R>(mut rdr: R) -> Result<Self>
    where
        R: Read,
    {
        let tag: String = bincode::decode_from_std_read(&mut rdr, bincode_config())?;
        if tag != MODEL_FORMAT_TAG {
            return Err(StaccatoError::model_mismatch(format!(
                "unsupported model tag '{tag}', expected '{MODEL_FORMAT_TAG}'"
            )));
        }
        let registry: Registry = bincode::decode_from_std_read(&mut rdr, bincode_config())?;
        let templates: Vec<(String, String)> =
            bincode::decode_from_std_read(&mut rdr, bincode_config())?;
        let data: MatrixData = bincode::decode_from_std_read(&mut rdr, bincode_config())?;
        Ok(Self {
            registry,
            templates,
            matrix: AvgMatrixSparse::from_data(data, 0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_value_integrate() {
        let mut cell = HistoryValue::new(3, 2);
        cell.add(5, 1);
        cell.add(7, -4);
        cell.integrate(10);
        // 2*(5-3) + 3*(7-5) + (-1)*(10-7) = 4 + 6 - 3
        assert_eq!(cell.value, 7);
    }

    #[test]
    fn test_history_value_same_generation_updates() {
        let mut cell = HistoryValue::new(1, 1);
        cell.add(2, 1);
        cell.add(2, 1);
        cell.integrate(3);
        // 1 at generation 1, 3 at generation 2
        assert_eq!(cell.value, 1 + 3);
    }

    #[test]
    fn test_score_store_variants_agree() {
        for dense in [true, false] {
            let mut store = ScoreStore::new(dense, 0);
            store.add(1, 4, 10);
            store.add(1, 2, -3);
            assert_eq!(store.get(4).unwrap().value, 10);
            assert_eq!(store.get(2).unwrap().value, -3);
            assert_eq!(store.get(3), None);
            assert_eq!(store.len(), 5);
            let mut seen = 0;
            store.each(|_, _| seen += 1);
            assert_eq!(seen, 2);
        }
    }

    #[test]
    fn test_avg_sparse_add_and_scores() {
        let sparse = AvgSparse::new(true);
        let f = FeatureValue(vec![7]);
        sparse.add(1, 3, &f, 5);
        sparse.add(1, 1, &f, 2);
        assert_eq!(sparse.value(3, &f), 5);
        assert_eq!(sparse.value(2, &f), 0);
        let mut scores = Vec::new();
        sparse.add_scores(&f, &mut scores);
        assert_eq!(scores, vec![0, 2, 0, 5]);
    }

    #[test]
    fn test_scalar_divide() {
        let sparse = AvgSparse::new(false);
        let f = FeatureValue(vec![1]);
        sparse.add(1, 0, &f, 9);
        sparse.scalar_divide(3).unwrap();
        assert_eq!(sparse.value(0, &f), 3);
        assert!(sparse.scalar_divide(0).is_err());
    }

    #[test]
    fn test_matrix_round_trip() {
        let matrix = AvgMatrixSparse::new(2, true);
        let f0 = FeatureValue(vec![1, 2]);
        let f1 = FeatureValue(vec![9]);
        let feats = vec![Some(f0), Some(f1)];
        matrix.add(1, 3, &feats, 4);
        matrix.add(2, 0, &feats, -2);
        matrix.integrate(2);

        let mut bytes = Vec::new();
        bincode::encode_into_std_write(matrix.to_data(), &mut bytes, bincode_config()).unwrap();
        let (data, _): (MatrixData, usize) =
            bincode::decode_from_slice(&bytes, bincode_config()).unwrap();
        let restored = AvgMatrixSparse::from_data(data, 0);

        // every non-zero (feature, transition) weight survives bit-exactly
        let original = matrix.scores(&feats);
        let roundtrip = restored.scores(&feats);
        assert_eq!(original, roundtrip);
    }
}
