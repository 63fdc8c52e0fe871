//! Common settings in Staccato.
use bincode::config::{self, Fixint, LittleEndian};

/// Gets the common bincode configuration of serialization.
pub const fn bincode_config() -> config::Configuration<LittleEndian, Fixint> {
    config::standard()
        .with_little_endian()
        .with_fixed_int_encoding()
        .write_fixed_array_length()
}

/// Leading tag string of model files.
pub const MODEL_FORMAT_TAG: &str = "staccato 1";

/// Surface form of the synthetic root token and morpheme.
pub const ROOT_TOKEN: &str = "ROOT";

/// Number of pre-allocated morpheme-disambiguation transition slots.
///
/// Bounds the out-degree of any lattice node; the transition enumeration is
/// frozen before training, so the slots must be reserved up front.
pub const MAX_MD_TRANSITIONS: usize = 100;
