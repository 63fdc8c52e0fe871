//! Eight-field tab-separated lattice files.
//!
//! Each line is one morpheme edge: start node, end node, form, lemma,
//! coarse POS, fine POS, morphological features, and the one-based index
//! of the source token. Node ids run over the whole sentence; a blank
//! line ends a sentence.

use std::io::{BufRead, BufReader, Read};

use crate::enumeration::Registry;
use crate::errors::{Result, StaccatoError};
use crate::lattice::{Lattice, LatticeSentence};
use crate::morpheme::{Features, Morpheme};

const NUM_FIELDS: usize = 8;

fn parse_edge(record: usize, line: &str) -> Result<Morpheme> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() != NUM_FIELDS {
        return Err(StaccatoError::invalid_format(
            "lattice",
            record,
            format!("expected {NUM_FIELDS} fields, got {}", fields.len()),
        ));
    }
    let from: usize = fields[0]
        .parse()
        .map_err(|_| StaccatoError::invalid_format("lattice", record, "bad FROM field"))?;
    let to: usize = fields[1]
        .parse()
        .map_err(|_| StaccatoError::invalid_format("lattice", record, "bad TO field"))?;
    let token: usize = fields[7]
        .parse()
        .map_err(|_| StaccatoError::invalid_format("lattice", record, "bad TOKEN field"))?;
    if token == 0 {
        return Err(StaccatoError::invalid_format(
            "lattice",
            record,
            "token indices are one-based",
        ));
    }
    let feats = Features::parse(fields[6])
        .map_err(|e| StaccatoError::invalid_format("lattice", record, e))?;
    let lemma = if fields[3] == "_" { "" } else { fields[3] };
    Ok(Morpheme {
        id: 0,
        from,
        to,
        form: fields[2].to_string(),
        lemma: lemma.to_string(),
        cpos: fields[4].to_string(),
        pos: fields[5].to_string(),
        feats,
        feat_str: if fields[6] == "_" {
            String::new()
        } else {
            fields[6].to_string()
        },
        token,
        e_form: 0,
        e_lemma: 0,
        e_pos: 0,
        e_word_pos: 0,
        e_mhost: 0,
        e_msuffix: 0,
    })
}

fn finish_sentence(edges: Vec<Morpheme>, registry: &mut Registry) -> Result<LatticeSentence> {
    let num_tokens = edges.iter().map(|m| m.token).max().unwrap_or(0);
    let mut lattices: Vec<Lattice> = (0..num_tokens).map(|_| Lattice::default()).collect();
    for mut edge in edges {
        edge.intern(registry)?;
        lattices[edge.token - 1].add_edge(edge);
    }
    for lattice in &mut lattices {
        lattice.gen_spellouts()?;
        // The raw token is not carried by the format; reconstruct it from
        // the first listed path.
        lattice.token = lattice.spellouts[0]
            .iter()
            .map(|&m| lattice.morphemes[m].form.as_str())
            .collect();
    }
    Ok(lattices)
}

/// Reads a lattice corpus, interning morpheme attributes as it goes.
///
/// # Errors
///
/// [`StaccatoError::InvalidFormat`] with the record index for malformed
/// lines; [`StaccatoError::Lattice`] when a token's lattice is empty or
/// incoherent.
pub fn read<R>(rdr: R, registry: &mut Registry) -> Result<Vec<LatticeSentence>>
where
    R: Read,
{
    let buf = BufReader::new(rdr);
    let mut sentences = Vec::new();
    let mut edges: Vec<Morpheme> = Vec::new();
    for (record, line) in buf.lines().enumerate() {
        let line = line?;
        if line.is_empty() {
            if !edges.is_empty() {
                sentences.push(finish_sentence(std::mem::take(&mut edges), registry)?);
            }
            continue;
        }
        edges.push(parse_edge(record, &line)?);
    }
    if !edges.is_empty() {
        sentences.push(finish_sentence(edges, registry)?);
    }
    Ok(sentences)
}

#[cfg(test)]
mod tests {
    use super::*;

    const AMBIGUOUS: &str = "0\t1\tb\tb\tDET\tDET\t_\t1
1\t2\timba\timba\tNOUN\tNOUN\tgen=F\t1
0\t2\tbimba\tbimba\tNOUN\tNOUN\tgen=F\t1
2\t3\tholxa\tholxa\tVERB\tVERB\t_\t2

0\t1\tdogs\tdog\tNOUN\tNOUN\tnum=P\t1
";

    #[test]
    fn test_read() {
        let mut registry = Registry::new();
        let sentences = read(AMBIGUOUS.as_bytes(), &mut registry).unwrap();
        assert_eq!(sentences.len(), 2);
        let first = &sentences[0];
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].spellouts, vec![vec![0, 1], vec![2]]);
        assert_eq!(first[0].token, "bimba");
        assert_eq!(first[1].token, "holxa");
        assert_eq!(sentences[1][0].morphemes[0].lemma, "dog");
        // interning covered ROOT-free ids only; words were all added
        assert!(registry.words.index_of(&"imba".to_string()).is_some());
    }

    #[test]
    fn test_read_missing_token_lattice() {
        // token 1 is absent while token 2 exists
        let text = "0\t1\tx\tx\tX\tX\t_\t2\n";
        let mut registry = Registry::new();
        assert!(read(text.as_bytes(), &mut registry).is_err());
    }

    #[test]
    fn test_read_malformed() {
        let mut registry = Registry::new();
        assert!(read("0\t1\tonly".as_bytes(), &mut registry).is_err());
        assert!(read("x\t1\ta\ta\tA\tA\t_\t1".as_bytes(), &mut registry).is_err());
    }
}
