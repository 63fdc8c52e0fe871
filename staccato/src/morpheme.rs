//! Morphemes and their dynamic feature bags.

use std::collections::BTreeMap;
use std::fmt;

use bincode::{Decode, Encode};

use crate::common::ROOT_TOKEN;
use crate::enumeration::Registry;
use crate::errors::Result;

const FEATURES_SEPARATOR: char = '|';
const FEATURE_SEPARATOR: char = '=';
const FEATURE_CONCAT_DELIM: &str = ",";
const SUFFIX_PREFIX: &str = "suf";

/// A morphological feature bag: a mapping from feature name to value.
///
/// Keys are kept sorted so that the canonical string form is stable under
/// hashing and serialization.
#[derive(Clone, Debug, Default, Eq, PartialEq, Decode, Encode)]
pub struct Features(BTreeMap<String, String>);

impl Features {
    /// Parses a `key=value|key=value` feature string; `_` yields the empty
    /// bag.
    ///
    /// Duplicate keys within one string concatenate their values as
    /// `value1,value2`. This mirrors the upstream data convention and is
    /// preserved as-is; whether the concatenation is meaningful is up to
    /// the consumer.
    ///
    /// # Errors
    ///
    /// Returns a message when a field is not a `key=value` pair.
    pub fn parse(s: &str) -> Result<Self, String> {
        let mut map = BTreeMap::new();
        if s == "_" || s.is_empty() {
            return Ok(Self(map));
        }
        for field in s.split(FEATURES_SEPARATOR) {
            let (name, value) = field
                .split_once(FEATURE_SEPARATOR)
                .ok_or_else(|| format!("bad feature field: {field}"))?;
            map.entry(name.to_string())
                .and_modify(|v: &mut String| {
                    v.push_str(FEATURE_CONCAT_DELIM);
                    v.push_str(value);
                })
                .or_insert_with(|| value.to_string());
        }
        Ok(Self(map))
    }

    /// Returns the value of a feature.
    #[inline(always)]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Checks if the bag is empty.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Canonical string of the features whose names do not start with the
    /// suffix prefix.
    pub fn morph_host(&self) -> String {
        self.join_filtered(|name| !name.starts_with(SUFFIX_PREFIX))
    }

    /// Canonical string of the features whose names start with the suffix
    /// prefix.
    pub fn morph_suffix(&self) -> String {
        self.join_filtered(|name| name.starts_with(SUFFIX_PREFIX))
    }

    fn join_filtered<F>(&self, keep: F) -> String
    where
        F: Fn(&str) -> bool,
    {
        let mut out = String::new();
        for (name, value) in &self.0 {
            if !keep(name) {
                continue;
            }
            if !out.is_empty() {
                out.push(FEATURES_SEPARATOR);
            }
            out.push_str(name);
            out.push(FEATURE_SEPARATOR);
            out.push_str(value);
        }
        out
    }
}

impl fmt::Display for Features {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "_");
        }
        for (i, (name, value)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "{FEATURES_SEPARATOR}")?;
            }
            write!(f, "{name}{FEATURE_SEPARATOR}{value}")?;
        }
        Ok(())
    }
}

/// A minimal meaningful unit on a lattice edge.
///
/// `id`, `from`, and `to` are node coordinates within the owning lattice;
/// `token` is the index of the source token. The `e_*` fields are interned
/// ids filled in by [`Morpheme::intern()`] during corpus conversion.
#[derive(Clone, Debug, PartialEq)]
pub struct Morpheme {
    /// Edge id within the lattice.
    pub id: usize,
    /// Incoming lattice node.
    pub from: usize,
    /// Outgoing lattice node.
    pub to: usize,
    /// Surface form.
    pub form: String,
    /// Lemma; empty when the input had none.
    pub lemma: String,
    /// Coarse part-of-speech tag.
    pub cpos: String,
    /// Fine part-of-speech tag.
    pub pos: String,
    /// Morphological features.
    pub feats: Features,
    /// Raw feature string as read from the input.
    pub feat_str: String,
    /// Index of the source token.
    pub token: usize,
    /// Interned form id.
    pub e_form: u32,
    /// Interned lemma id (falls back to the form when the lemma is empty).
    pub e_lemma: u32,
    /// Interned fine POS id.
    pub e_pos: u32,
    /// Interned (word, POS) pair id.
    pub e_word_pos: u32,
    /// Interned host-feature string id.
    pub e_mhost: u32,
    /// Interned suffix-feature string id.
    pub e_msuffix: u32,
}

impl Morpheme {
    /// Creates the synthetic root morpheme.
    pub fn root() -> Self {
        Self {
            id: 0,
            from: 0,
            to: 0,
            form: ROOT_TOKEN.to_string(),
            lemma: ROOT_TOKEN.to_string(),
            cpos: ROOT_TOKEN.to_string(),
            pos: ROOT_TOKEN.to_string(),
            feats: Features::default(),
            feat_str: String::new(),
            token: 0,
            e_form: 0,
            e_lemma: 0,
            e_pos: 0,
            e_word_pos: 0,
            e_mhost: 0,
            e_msuffix: 0,
        }
    }

    /// Fills in the interned ids from the registry.
    pub fn intern(&mut self, registry: &mut Registry) -> Result<()> {
        self.e_form = registry.words.add(self.form.clone())?;
        self.e_lemma = if self.lemma.is_empty() {
            self.e_form
        } else {
            registry.words.add(self.lemma.clone())?
        };
        self.e_pos = registry.pos.add(self.pos.clone())?;
        self.e_word_pos = registry.word_pos.add((self.e_form, self.e_pos))?;
        self.e_mhost = registry.m_host.add(self.feats.morph_host())?;
        self.e_msuffix = registry.m_suffix.add(self.feats.morph_suffix())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_features() {
        let feats = Features::parse("gen=F|num=S").unwrap();
        assert_eq!(feats.get("gen"), Some("F"));
        assert_eq!(feats.get("num"), Some("S"));
        assert_eq!(feats.get("per"), None);
        assert_eq!(feats.to_string(), "gen=F|num=S");
    }

    #[test]
    fn test_parse_features_empty() {
        let feats = Features::parse("_").unwrap();
        assert!(feats.is_empty());
        assert_eq!(feats.to_string(), "_");
    }

    #[test]
    fn test_parse_features_duplicate_keys() {
        let feats = Features::parse("gen=F|gen=M").unwrap();
        assert_eq!(feats.get("gen"), Some("F,M"));
    }

    #[test]
    fn test_parse_features_malformed() {
        assert!(Features::parse("gen").is_err());
    }

    #[test]
    fn test_canonical_order() {
        let feats = Features::parse("num=S|gen=F").unwrap();
        assert_eq!(feats.to_string(), "gen=F|num=S");
    }

    #[test]
    fn test_host_suffix_split() {
        let feats = Features::parse("suf_gen=M|gen=F|suf_num=S").unwrap();
        assert_eq!(feats.morph_host(), "gen=F");
        assert_eq!(feats.morph_suffix(), "suf_gen=M|suf_num=S");
    }
}
