//! Ten-field tab-separated dependency records.
//!
//! Fields: id, form, lemma, coarse POS, fine POS, morphological features,
//! head, relation, extra dependencies, misc. `_` marks an empty field, a
//! blank line ends a sentence, and `#` starts a comment line.

use std::io::{BufRead, BufReader, Read, Write};

use crate::configuration::Configuration;
use crate::enumeration::Registry;
use crate::errors::{Result, StaccatoError};
use crate::graph::DepArc;
use crate::morpheme::Features;

const NUM_FIELDS: usize = 10;

/// A single parsed record.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Row {
    /// One-based node id within the sentence.
    pub id: usize,
    /// Surface form.
    pub form: String,
    /// Lemma; empty when the input had `_`.
    pub lemma: String,
    /// Coarse part-of-speech tag.
    pub cpos: String,
    /// Fine part-of-speech tag.
    pub pos: String,
    /// Parsed morphological features.
    pub feats: Features,
    /// Raw feature string.
    pub feat_str: String,
    /// Head node id; 0 is the root.
    pub head: usize,
    /// Dependency relation.
    pub deprel: String,
    /// Extra dependencies, passed through verbatim.
    pub deps: String,
    /// Miscellaneous column, passed through verbatim.
    pub misc: String,
}

/// The records of one sentence, in id order.
pub type Sentence = Vec<Row>;

fn parse_field(value: &str) -> String {
    if value == "_" {
        String::new()
    } else {
        value.to_string()
    }
}

fn fmt_field(value: &str) -> &str {
    if value.is_empty() {
        "_"
    } else {
        value
    }
}

fn parse_row(record: usize, line: &str) -> Result<Row> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() != NUM_FIELDS {
        return Err(StaccatoError::invalid_format(
            "conll",
            record,
            format!("expected {NUM_FIELDS} fields, got {}", fields.len()),
        ));
    }
    let id: usize = fields[0]
        .parse()
        .map_err(|_| StaccatoError::invalid_format("conll", record, "bad ID field"))?;
    let form = parse_field(fields[1]);
    if form.is_empty() {
        return Err(StaccatoError::invalid_format(
            "conll",
            record,
            "empty FORM field",
        ));
    }
    let head: usize = if fields[6] == "_" {
        0
    } else {
        fields[6]
            .parse()
            .map_err(|_| StaccatoError::invalid_format("conll", record, "bad HEAD field"))?
    };
    let feats = Features::parse(fields[5])
        .map_err(|e| StaccatoError::invalid_format("conll", record, e))?;
    Ok(Row {
        id,
        form,
        lemma: parse_field(fields[2]),
        cpos: parse_field(fields[3]),
        pos: parse_field(fields[4]),
        feats,
        feat_str: parse_field(fields[5]),
        head,
        deprel: parse_field(fields[7]),
        deps: parse_field(fields[8]),
        misc: parse_field(fields[9]),
    })
}

/// Reads a dependency corpus.
///
/// # Errors
///
/// [`StaccatoError::InvalidFormat`] is returned with the record index when
/// a line is malformed; I/O errors are returned as is.
pub fn read<R>(rdr: R) -> Result<Vec<Sentence>>
where
    R: Read,
{
    let buf = BufReader::new(rdr);
    let mut sentences = Vec::new();
    let mut current: Sentence = Vec::new();
    for (record, line) in buf.lines().enumerate() {
        let line = line?;
        if line.is_empty() {
            if !current.is_empty() {
                sentences.push(std::mem::take(&mut current));
            }
            continue;
        }
        if line.starts_with('#') {
            continue;
        }
        current.push(parse_row(record, &line)?);
    }
    if !current.is_empty() {
        sentences.push(current);
    }
    Ok(sentences)
}

/// Writes a dependency corpus, one blank line after each sentence.
///
/// # Errors
///
/// I/O errors are returned as is.
pub fn write<W>(mut wtr: W, sentences: &[Sentence]) -> Result<()>
where
    W: Write,
{
    for sentence in sentences {
        for row in sentence {
            writeln!(
                wtr,
                "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
                row.id,
                fmt_field(&row.form),
                fmt_field(&row.lemma),
                fmt_field(&row.cpos),
                fmt_field(&row.pos),
                fmt_field(&row.feat_str),
                row.head,
                fmt_field(&row.deprel),
                fmt_field(&row.deps),
                fmt_field(&row.misc),
            )?;
        }
        writeln!(wtr)?;
    }
    Ok(())
}

/// Interns a sentence's relations and returns its gold arcs; row ids map
/// directly onto morph-node ids.
///
/// # Errors
///
/// [`StaccatoError`] is returned when a relation cannot be interned.
pub fn to_arcs(sentence: &Sentence, registry: &mut Registry) -> Result<Vec<DepArc>> {
    let mut arcs = Vec::with_capacity(sentence.len());
    for row in sentence {
        let relation = registry.relations.add(row.deprel.clone())?;
        arcs.push(DepArc {
            head: row.head,
            modifier: row.id,
            relation,
        });
    }
    Ok(arcs)
}

/// Renders a parsed configuration as output records, reproducing the input
/// schema with the predicted head and relation. Unattached nodes emit head
/// 0 and the relation `None`.
pub fn from_configuration(conf: &Configuration, registry: &Registry) -> Sentence {
    let mut sentence = Vec::with_capacity(conf.morph_nodes().len().saturating_sub(1));
    for node in 1..conf.morph_nodes().len() {
        let morpheme = conf.morpheme(node);
        let (head, deprel) = match conf.head_of(node) {
            Some((head, relation)) => (
                head,
                registry
                    .relations
                    .value(relation)
                    .cloned()
                    .unwrap_or_default(),
            ),
            None => (0, "None".to_string()),
        };
        sentence.push(Row {
            id: node,
            form: morpheme.form.clone(),
            lemma: morpheme.lemma.clone(),
            cpos: morpheme.cpos.clone(),
            pos: morpheme.pos.clone(),
            feats: morpheme.feats.clone(),
            feat_str: morpheme.feat_str.clone(),
            head,
            deprel,
            deps: String::new(),
            misc: String::new(),
        });
    }
    sentence
}
