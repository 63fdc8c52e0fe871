//! Template-driven feature extraction over configurations.
//!
//! A template is a `+`-separated list of elements, each element an address
//! and a `|`-separated list of properties, e.g. `S0|w|p+N0|w|p`. Templates
//! carry a group key — itself a list of elements — naming the addresses
//! that must resolve for the whole group; templates are bucketed by group
//! so one failed requirement skips every template that depends on it.

use hashbrown::HashMap;

use crate::configuration::Configuration;
use crate::enumeration::EnumSet;
use crate::errors::{Result, StaccatoError};
use crate::graph::DepArc;

/// The evaluation of one template at a configuration: the packed attribute
/// ids of its elements, in template order.
#[derive(Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[derive(bincode::Decode, bincode::Encode)]
pub struct FeatureValue(pub Vec<u64>);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Base {
    Stack,
    Queue,
    MorphTrail,
    LastArc,
}

#[derive(Clone, Copy, Debug)]
enum Step {
    Head(usize),
    Left(usize),
    Right(usize),
}

#[derive(Clone, Debug)]
struct Address {
    base: Base,
    index: usize,
    steps: Vec<Step>,
}

#[derive(Clone, Copy, Debug)]
enum Prop {
    Form,
    Pos,
    Label,
    Distance,
    ValencyLeft,
    ValencyRight,
    SetLeft,
    SetRight,
    QueueTags,
    AgrGender,
    AgrNumber,
    AgrPerson,
    AgrTense,
    AgrPolarity,
}

#[derive(Clone, Debug)]
struct Element {
    address: Address,
    props: Vec<Prop>,
}

#[derive(Clone, Debug)]
struct Template {
    elements: Vec<usize>,
}

#[derive(Clone, Debug, Default)]
struct Bucket {
    requirements: Vec<usize>,
    templates: Vec<usize>,
}

enum Target<'a> {
    Node(usize),
    Arc(&'a DepArc),
}

/// Compiles feature templates and evaluates them against configurations.
pub struct GenericExtractor {
    templates: Vec<Template>,
    template_pairs: Vec<(String, String)>,
    elements: Vec<Element>,
    element_ids: HashMap<String, usize>,
    buckets: Vec<Bucket>,
    bucket_ids: HashMap<String, usize>,
    e_features: EnumSet<String>,
}

impl GenericExtractor {
    /// Creates an empty extractor.
    pub fn new() -> Self {
        Self {
            templates: Vec::new(),
            template_pairs: Vec::new(),
            elements: Vec::new(),
            element_ids: HashMap::new(),
            buckets: Vec::new(),
            bucket_ids: HashMap::new(),
            e_features: EnumSet::new(128),
        }
    }

    /// Rebuilds an extractor from persisted (template, group) pairs.
    pub fn from_templates<S>(pairs: &[(S, S)]) -> Result<Self>
    where
        S: AsRef<str>,
    {
        let mut extractor = Self::new();
        for (template, group) in pairs {
            extractor.load_feature(template.as_ref(), group.as_ref())?;
        }
        extractor.e_features.freeze();
        Ok(extractor)
    }

    /// Compiles one template under a group key and registers it in the
    /// feature enumeration.
    ///
    /// # Errors
    ///
    /// [`StaccatoError`] is returned when the template is malformed or was
    /// already loaded.
    pub fn load_feature(&mut self, template: &str, group: &str) -> Result<()> {
        if self.e_features.index_of(&template.to_string()).is_some() {
            return Err(StaccatoError::invalid_argument(
                "template",
                format!("duplicate feature template: {template}"),
            ));
        }
        let mut element_ids = Vec::new();
        for raw in template.split('+') {
            element_ids.push(self.intern_element(raw)?);
        }
        let mut requirements = Vec::new();
        for raw in group.split(',') {
            requirements.push(self.intern_element(raw)?);
        }

        let template_id = self.templates.len();
        self.templates.push(Template {
            elements: element_ids,
        });
        self.template_pairs
            .push((template.to_string(), group.to_string()));
        self.e_features.add(template.to_string())?;

        let bucket_id = match self.bucket_ids.get(group) {
            Some(&id) => id,
            None => {
                let id = self.buckets.len();
                self.buckets.push(Bucket {
                    requirements,
                    templates: Vec::new(),
                });
                self.bucket_ids.insert(group.to_string(), id);
                id
            }
        };
        self.buckets[bucket_id].templates.push(template_id);
        Ok(())
    }

    /// The frozen feature-string enumeration.
    pub const fn e_features(&self) -> &EnumSet<String> {
        &self.e_features
    }

    /// The loaded (template, group) pairs, in id order.
    pub fn template_pairs(&self) -> &[(String, String)] {
        &self.template_pairs
    }

    /// Number of loaded templates.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Checks if no templates are loaded.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Evaluates every template at a configuration. The result is aligned
    /// with template ids; an undefined element yields `None` for its
    /// template.
    pub fn features(&self, conf: &Configuration) -> Vec<Option<FeatureValue>> {
        let mut out = vec![None; self.templates.len()];
        let mut cache: Vec<Option<Option<Vec<u64>>>> = vec![None; self.elements.len()];
        for bucket in &self.buckets {
            let satisfied = bucket
                .requirements
                .iter()
                .all(|&e| self.resolve(conf, &self.elements[e].address).is_some());
            if !satisfied {
                continue;
            }
            'template: for &tid in &bucket.templates {
                let mut values = Vec::new();
                for &eid in &self.templates[tid].elements {
                    let evaluated = cache[eid]
                        .get_or_insert_with(|| self.eval_element(conf, &self.elements[eid]));
                    match evaluated {
                        Some(vs) => values.extend_from_slice(vs),
                        None => continue 'template,
                    }
                }
                out[tid] = Some(FeatureValue(values));
            }
        }
        out
    }

    fn intern_element(&mut self, raw: &str) -> Result<usize> {
        if let Some(&id) = self.element_ids.get(raw) {
            return Ok(id);
        }
        let element = parse_element(raw)?;
        let id = self.elements.len();
        self.elements.push(element);
        self.element_ids.insert(raw.to_string(), id);
        Ok(id)
    }

    fn eval_element(&self, conf: &Configuration, element: &Element) -> Option<Vec<u64>> {
        let target = self.resolve(conf, &element.address)?;
        let mut values = Vec::with_capacity(element.props.len());
        for &prop in &element.props {
            values.push(self.value(conf, &target, prop)?);
        }
        Some(values)
    }

    fn resolve<'a>(&self, conf: &'a Configuration, address: &Address) -> Option<Target<'a>> {
        let mut node = match address.base {
            Base::Stack => conf.stack_at(address.index)?,
            Base::Queue => conf.queue_at(address.index)?,
            Base::MorphTrail => {
                let len = conf.morph_nodes().len();
                len.checked_sub(address.index + 1)?
            }
            Base::LastArc => {
                return conf.arcs().last().map(Target::Arc);
            }
        };
        for &step in &address.steps {
            match step {
                Step::Head(n) => {
                    for _ in 0..n {
                        node = conf.head_of(node)?.0;
                    }
                }
                Step::Left(k) => {
                    node = *conf.left_dependents(node).get(k - 1)?;
                }
                Step::Right(k) => {
                    node = *conf.right_dependents(node).get(k - 1)?;
                }
            }
        }
        Some(Target::Node(node))
    }

    fn value(&self, conf: &Configuration, target: &Target, prop: Prop) -> Option<u64> {
        match *target {
            Target::Node(node) => match prop {
                Prop::Form => Some(u64::from(conf.morpheme(node).e_form)),
                Prop::Pos => Some(u64::from(conf.morpheme(node).e_pos)),
                Prop::Label => conf.head_of(node).map(|(_, rel)| u64::from(rel)),
                Prop::Distance => {
                    let s0 = conf.stack_at(0)?;
                    let q0 = conf.queue_at(0)?;
                    Some(s0.abs_diff(q0) as u64)
                }
                Prop::ValencyLeft => Some(conf.left_dependents(node).len() as u64),
                Prop::ValencyRight => Some(conf.right_dependents(node).len() as u64),
                Prop::SetLeft => Some(label_set(conf, &conf.left_dependents(node))),
                Prop::SetRight => Some(label_set(conf, &conf.right_dependents(node))),
                Prop::QueueTags => {
                    let mut h = 0u64;
                    for &q in conf.queue() {
                        h = h
                            .wrapping_mul(131)
                            .wrapping_add(u64::from(conf.morpheme(q).e_pos) + 1);
                    }
                    Some(h)
                }
                _ => None,
            },
            Target::Arc(arc) => {
                let key = match prop {
                    Prop::AgrGender => "gen",
                    Prop::AgrNumber => "num",
                    Prop::AgrPerson => "per",
                    Prop::AgrTense => "tense",
                    Prop::AgrPolarity => "pol",
                    _ => return None,
                };
                let head = conf.morpheme(arc.head).feats.get(key);
                let modifier = conf.morpheme(arc.modifier).feats.get(key);
                Some(match (head, modifier) {
                    (Some(h), Some(m)) if h == m => 2,
                    (Some(_), Some(_)) => 1,
                    _ => 0,
                })
            }
        }
    }
}

impl Default for GenericExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn label_set(conf: &Configuration, dependents: &[usize]) -> u64 {
    let mut mask = 0u64;
    for &d in dependents {
        if let Some((_, rel)) = conf.head_of(d) {
            mask |= 1u64 << (rel % 64);
        }
    }
    mask
}

fn parse_element(raw: &str) -> Result<Element> {
    let mut parts = raw.split('|');
    let address_str = parts.next().unwrap_or_default();
    let address = parse_address(raw, address_str)?;
    let mut props = Vec::new();
    for p in parts {
        props.push(parse_prop(raw, address.base, p)?);
    }
    if props.is_empty() {
        return Err(bad_template(raw, "element has no properties"));
    }
    Ok(Element { address, props })
}

fn parse_address(raw: &str, s: &str) -> Result<Address> {
    let mut chars = s.chars().peekable();
    let base = match chars.next() {
        Some('S') => Base::Stack,
        Some('N') => Base::Queue,
        Some('M') => Base::MorphTrail,
        Some('A') => Base::LastArc,
        _ => return Err(bad_template(raw, "unknown address base")),
    };
    let index = match chars.next().and_then(|c| c.to_digit(10)) {
        Some(d) => d as usize,
        None => return Err(bad_template(raw, "address needs a position digit")),
    };
    let mut steps = Vec::new();
    while let Some(c) = chars.next() {
        let count = match chars.peek().and_then(|c| c.to_digit(10)) {
            Some(d) => {
                chars.next();
                d as usize
            }
            None => 1,
        };
        if count == 0 {
            return Err(bad_template(raw, "address modifier count must be positive"));
        }
        let step = match c {
            'h' => Step::Head(count),
            'l' => Step::Left(count),
            'r' => Step::Right(count),
            _ => return Err(bad_template(raw, "unknown address modifier")),
        };
        steps.push(step);
    }
    if base == Base::LastArc && (index != 0 || !steps.is_empty()) {
        return Err(bad_template(raw, "arc addresses take no modifiers"));
    }
    Ok(Address { base, index, steps })
}

fn parse_prop(raw: &str, base: Base, s: &str) -> Result<Prop> {
    let prop = match s {
        "w" => Prop::Form,
        "p" if base == Base::LastArc => Prop::AgrPerson,
        "p" => Prop::Pos,
        "l" => Prop::Label,
        "d" => Prop::Distance,
        "vl" => Prop::ValencyLeft,
        "vr" => Prop::ValencyRight,
        "sl" => Prop::SetLeft,
        "sr" => Prop::SetRight,
        "t" if base == Base::LastArc => Prop::AgrTense,
        "t" => Prop::QueueTags,
        "g" => Prop::AgrGender,
        "n" => Prop::AgrNumber,
        "o" => Prop::AgrPolarity,
        _ => return Err(bad_template(raw, format!("unknown property {s}"))),
    };
    Ok(prop)
}

fn bad_template<S>(raw: &str, msg: S) -> StaccatoError
where
    S: AsRef<str>,
{
    StaccatoError::invalid_argument("template", format!("{}: {raw}", msg.as_ref()))
}

/// The stock template set of the joint morph-syntactic parser: the rich
/// arc-eager feature set over forms, tags, labels, distance, valency, and
/// child label sets.
pub fn default_templates() -> Vec<(&'static str, &'static str)> {
    vec![
        ("S0|w", "S0|w"),
        ("S0|p", "S0|w"),
        ("S0|w|p", "S0|w"),
        ("N0|w", "N0|w"),
        ("N0|p", "N0|w"),
        ("N0|w|p", "N0|w"),
        ("N1|w", "N1|w"),
        ("N1|p", "N1|w"),
        ("N1|w|p", "N1|w"),
        ("N2|w", "N2|w"),
        ("N2|p", "N2|w"),
        ("N2|w|p", "N2|w"),
        ("S0h|w", "S0h|w"),
        ("S0h|p", "S0h|w"),
        ("S0|l", "S0h|w"),
        ("S0h2|w", "S0h2|w"),
        ("S0h2|p", "S0h2|w"),
        ("S0h|l", "S0h2|w"),
        ("S0l|w", "S0l|w"),
        ("S0l|p", "S0l|w"),
        ("S0l|l", "S0l|w"),
        ("S0r|w", "S0r|w"),
        ("S0r|p", "S0r|w"),
        ("S0r|l", "S0r|w"),
        ("S0l2|w", "S0l2|w"),
        ("S0l2|p", "S0l2|w"),
        ("S0l2|l", "S0l2|w"),
        ("S0r2|w", "S0r2|w"),
        ("S0r2|p", "S0r2|w"),
        ("S0r2|l", "S0r2|w"),
        ("N0l|w", "N0l|w"),
        ("N0l|p", "N0l|w"),
        ("N0l|l", "N0l|w"),
        ("N0l2|w", "N0l2|w"),
        ("N0l2|p", "N0l2|w"),
        ("N0l2|l", "N0l2|w"),
        ("S0|w|p+N0|w|p", "S0|w"),
        ("S0|w|p+N0|w", "S0|w"),
        ("S0|w+N0|w|p", "S0|w"),
        ("S0|w|p+N0|p", "S0|w"),
        ("S0|p+N0|w|p", "S0|w"),
        ("S0|w+N0|w", "S0|w"),
        ("S0|p+N0|p", "S0|w"),
        ("N0|p+N1|p", "S0|w,N0|w"),
        ("N0|p+N1|p+N2|p", "S0|w,N0|w"),
        ("S0|p+N0|p+N1|p", "S0|w,N0|w"),
        ("S0|p+N0|p+N0l|p", "S0|w,N0|w"),
        ("N0|p+N0l|p+N0l2|p", "S0|w,N0|w"),
        ("S0h|p+S0|p+N0|p", "S0|w"),
        ("S0h2|p+S0h|p+S0|p", "S0|w"),
        ("S0|p+S0l|p+N0|p", "S0|w"),
        ("S0|p+S0l|p+S0l2|p", "S0|w"),
        ("S0|p+S0r|p+N0|p", "S0|w"),
        ("S0|p+S0r|p+S0r2|p", "S0|w"),
        ("S0|w|d", "S0|w,N0|w"),
        ("S0|p|d", "S0|w,N0|w"),
        ("N0|w|d", "S0|w,N0|w"),
        ("N0|p|d", "S0|w,N0|w"),
        ("S0|w+N0|w|d", "S0|w,N0|w"),
        ("S0|p+N0|p|d", "S0|w,N0|w"),
        ("S0|w|vr", "S0|w"),
        ("S0|p|vr", "S0|w"),
        ("S0|w|vl", "S0|w"),
        ("S0|p|vl", "S0|w"),
        ("N0|w|vl", "N0|w"),
        ("N0|p|vl", "N0|w"),
        ("S0|w|sr", "S0|w"),
        ("S0|p|sr", "S0|w"),
        ("S0|w|sl", "S0|w"),
        ("S0|p|sl", "S0|w"),
        ("N0|w|sl", "N0|w"),
        ("N0|p|sl", "N0|w"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::configuration::Configuration;
    use crate::graph::DepArc;
    use crate::lattice::{rooted, Lattice};
    use crate::test_utils::edge_with_feats;

    fn conf_with_arc() -> Configuration {
        let mut the = Lattice::new("the");
        the.add_edge(edge_with_feats(0, 1, "the", "DET", "gen=F|num=S", 1));
        the.gen_spellouts().unwrap();
        let mut dog = Lattice::new("dog");
        dog.add_edge(edge_with_feats(0, 1, "dog", "NOUN", "gen=F|num=P", 2));
        dog.gen_spellouts().unwrap();
        let mut conf = Configuration::new_segmented(rooted(vec![the, dog]));
        // stack: [ROOT], queue: [the, dog]; attach the <- dog and shift
        conf.add_arc(DepArc {
            head: 2,
            modifier: 1,
            relation: 3,
        });
        conf.pop_queue();
        conf
    }

    #[test]
    fn test_parse_and_extract_simple() {
        let mut extractor = GenericExtractor::new();
        extractor.load_feature("S0|w|p", "S0|w").unwrap();
        extractor.load_feature("N0|w+S0|p", "N0|w").unwrap();
        let conf = conf_with_arc();
        let feats = extractor.features(&conf);
        assert_eq!(feats.len(), 2);
        // S0 is ROOT (form/POS ids 0)
        assert_eq!(feats[0], Some(FeatureValue(vec![0, 0])));
        assert!(feats[1].is_some());
    }

    #[test]
    fn test_undefined_element_suppresses_template() {
        let mut extractor = GenericExtractor::new();
        extractor.load_feature("S0h|w", "S0h|w").unwrap();
        let conf = conf_with_arc();
        // ROOT has no head
        assert_eq!(extractor.features(&conf), vec![None]);
    }

    #[test]
    fn test_group_requirement_skips_bucket() {
        let mut extractor = GenericExtractor::new();
        extractor.load_feature("S0|p", "S0|w,N1|w").unwrap();
        let conf = conf_with_arc();
        // N1 does not exist, so the S0 template is skipped wholesale
        assert_eq!(extractor.features(&conf), vec![None]);
    }

    #[test]
    fn test_left_dependent_and_label() {
        let mut extractor = GenericExtractor::new();
        extractor.load_feature("N0l|w|l", "N0l|w").unwrap();
        let conf = conf_with_arc();
        let feats = extractor.features(&conf);
        // N0 = dog, its leftmost dependent is "the" with relation 3
        let the_form = conf.morpheme(1).e_form;
        assert_eq!(
            feats[0],
            Some(FeatureValue(vec![u64::from(the_form), 3]))
        );
    }

    #[test]
    fn test_valency_and_label_set() {
        let mut extractor = GenericExtractor::new();
        extractor.load_feature("N0|p|vl", "N0|w").unwrap();
        extractor.load_feature("N0|p|sl", "N0|w").unwrap();
        let conf = conf_with_arc();
        let feats = extractor.features(&conf);
        let pos = u64::from(conf.morpheme(2).e_pos);
        assert_eq!(feats[0], Some(FeatureValue(vec![pos, 1])));
        assert_eq!(feats[1], Some(FeatureValue(vec![pos, 1 << 3])));
    }

    #[test]
    fn test_agreement_feature() {
        let mut extractor = GenericExtractor::new();
        extractor.load_feature("A0|g", "A0|g").unwrap();
        extractor.load_feature("A0|n", "A0|n").unwrap();
        extractor.load_feature("A0|t", "A0|t").unwrap();
        let conf = conf_with_arc();
        let feats = extractor.features(&conf);
        // gen matches, num differs, tense is absent
        assert_eq!(feats[0], Some(FeatureValue(vec![2])));
        assert_eq!(feats[1], Some(FeatureValue(vec![1])));
        assert_eq!(feats[2], Some(FeatureValue(vec![0])));
    }

    #[test]
    fn test_distance() {
        let mut extractor = GenericExtractor::new();
        extractor.load_feature("S0|p+N0|p|d", "S0|w,N0|w").unwrap();
        let conf = conf_with_arc();
        let feats = extractor.features(&conf);
        let s0_pos = u64::from(conf.morpheme(0).e_pos);
        let n0_pos = u64::from(conf.morpheme(2).e_pos);
        assert_eq!(feats[0], Some(FeatureValue(vec![s0_pos, n0_pos, 2])));
    }

    #[test]
    fn test_morph_trail_and_queue_tags() {
        let mut extractor = GenericExtractor::new();
        extractor.load_feature("M0|w+M1|w", "S0|w").unwrap();
        extractor.load_feature("M2|w", "S0|w").unwrap();
        extractor.load_feature("N0|t", "S0|w").unwrap();
        let conf = conf_with_arc();
        let feats = extractor.features(&conf);
        // trail: ..., M1 = "the", M0 = "dog"
        let the_form = u64::from(conf.morpheme(1).e_form);
        let dog_form = u64::from(conf.morpheme(2).e_form);
        assert_eq!(feats[0], Some(FeatureValue(vec![dog_form, the_form])));
        // M2 is the root morpheme
        assert_eq!(feats[1], Some(FeatureValue(vec![0])));
        // queue holds only "dog"
        let dog_pos = u64::from(conf.morpheme(2).e_pos);
        assert_eq!(feats[2], Some(FeatureValue(vec![dog_pos + 1])));
    }

    #[test]
    fn test_duplicate_template_rejected() {
        let mut extractor = GenericExtractor::new();
        extractor.load_feature("S0|w", "S0|w").unwrap();
        assert!(extractor.load_feature("S0|w", "S0|w").is_err());
    }

    #[test]
    fn test_malformed_templates_rejected() {
        let mut extractor = GenericExtractor::new();
        assert!(extractor.load_feature("X0|w", "X0|w").is_err());
        assert!(extractor.load_feature("S0", "S0").is_err());
        assert!(extractor.load_feature("S0|q", "S0|q").is_err());
    }

    #[test]
    fn test_default_templates_load() {
        let templates = default_templates();
        let extractor = GenericExtractor::from_templates(
            &templates
                .iter()
                .map(|&(t, g)| (t.to_string(), g.to_string()))
                .collect::<Vec<_>>(),
        )
        .unwrap();
        assert_eq!(extractor.len(), templates.len());
    }
}
