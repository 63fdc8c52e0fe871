//! Bijective enumeration tables for interning domain values.

use core::hash::Hash;

use bincode::{
    de::Decoder,
    enc::Encoder,
    error::{DecodeError, EncodeError},
    Decode, Encode,
};
use hashbrown::HashMap;

use crate::errors::{Result, StaccatoError};

/// A bijective mapping from values to dense non-negative integers.
///
/// Lookup is O(1) in either direction. Once [`EnumSet::freeze()`] has been
/// called, further additions are rejected; frozen sets are what get
/// persisted inside a model.
pub struct EnumSet<T> {
    values: Vec<T>,
    indices: HashMap<T, u32>,
    frozen: bool,
}

impl<T> EnumSet<T>
where
    T: Clone + Eq + Hash,
{
    /// Creates an empty set with space for `capacity` values.
    pub fn new(capacity: usize) -> Self {
        Self {
            values: Vec::with_capacity(capacity),
            indices: HashMap::with_capacity(capacity),
            frozen: false,
        }
    }

    /// Interns a value, returning its dense id.
    ///
    /// # Errors
    ///
    /// [`StaccatoError`] is returned when the set is frozen and the value
    /// has not been seen before.
    pub fn add(&mut self, value: T) -> Result<u32> {
        if let Some(&idx) = self.indices.get(&value) {
            return Ok(idx);
        }
        if self.frozen {
            return Err(StaccatoError::invalid_argument(
                "value",
                "cannot add to a frozen enumeration",
            ));
        }
        let idx = u32::try_from(self.values.len())?;
        self.values.push(value.clone());
        self.indices.insert(value, idx);
        Ok(idx)
    }

    /// Returns the id of a previously interned value.
    #[inline(always)]
    pub fn index_of(&self, value: &T) -> Option<u32> {
        self.indices.get(value).copied()
    }

    /// Returns the value interned under `idx`.
    #[inline(always)]
    pub fn value(&self, idx: u32) -> Option<&T> {
        self.values.get(idx as usize)
    }

    /// Returns the number of interned values.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Checks if the set is empty.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Forbids further additions.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    /// Checks if the set is frozen.
    #[inline(always)]
    pub const fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Iterates over the interned values in id order.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.values.iter()
    }
}

// The index map is redundant with the value vector, so only the vector is
// persisted; sets are restored frozen.
impl<T> Encode for EnumSet<T>
where
    T: Encode,
{
    fn encode<E: Encoder>(&self, encoder: &mut E) -> Result<(), EncodeError> {
        Encode::encode(&self.values, encoder)
    }
}

impl<T> Decode for EnumSet<T>
where
    T: Decode + Clone + Eq + Hash,
{
    fn decode<D: Decoder>(decoder: &mut D) -> Result<Self, DecodeError> {
        let values: Vec<T> = Decode::decode(decoder)?;
        let indices = values
            .iter()
            .enumerate()
            .map(|(i, v)| (v.clone(), i as u32))
            .collect();
        Ok(Self {
            values,
            indices,
            frozen: true,
        })
    }
}

impl<'de, T> bincode::BorrowDecode<'de> for EnumSet<T>
where
    T: Decode + Clone + Eq + Hash,
{
    fn borrow_decode<D: bincode::de::BorrowDecoder<'de>>(
        decoder: &mut D,
    ) -> Result<Self, DecodeError> {
        Decode::decode(decoder)
    }
}

// Approximate initial sizes; pre-allocating saves frequent rehashing while
// scanning a training corpus.
const APPROX_WORDS: usize = 1 << 16;
const APPROX_POS: usize = 256;
const APPROX_RELATIONS: usize = 64;

/// The process-wide enumeration tables, threaded by reference through
/// corpus conversion, training, and parsing.
#[derive(Encode, Decode)]
pub struct Registry {
    /// Word forms and lemmas.
    pub words: EnumSet<String>,
    /// Part-of-speech tags.
    pub pos: EnumSet<String>,
    /// (word id, POS id) pairs.
    pub word_pos: EnumSet<(u32, u32)>,
    /// Dependency relations; frozen after the corpus scan.
    pub relations: EnumSet<String>,
    /// Transition names; frozen once the transition table is built.
    pub transitions: EnumSet<String>,
    /// Canonical morphological feature strings excluding suffix features.
    pub m_host: EnumSet<String>,
    /// Canonical morphological feature strings of suffix features.
    pub m_suffix: EnumSet<String>,
}

impl Registry {
    /// Creates a registry with the root morpheme's attributes seeded at
    /// id 0, matching the zero ids the synthetic root carries.
    pub fn new() -> Self {
        let mut registry = Self {
            words: EnumSet::new(APPROX_WORDS),
            pos: EnumSet::new(APPROX_POS),
            word_pos: EnumSet::new(APPROX_WORDS),
            relations: EnumSet::new(APPROX_RELATIONS),
            transitions: EnumSet::new(APPROX_RELATIONS * 2 + 8),
            m_host: EnumSet::new(APPROX_POS),
            m_suffix: EnumSet::new(APPROX_POS),
        };
        registry.words.add(crate::common::ROOT_TOKEN.to_string()).unwrap();
        registry.pos.add(crate::common::ROOT_TOKEN.to_string()).unwrap();
        registry.word_pos.add((0, 0)).unwrap();
        registry.m_host.add(String::new()).unwrap();
        registry.m_suffix.add(String::new()).unwrap();
        registry
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
