use std::sync::Arc;
use std::time::Duration;

use crate::beam::Beam;
use crate::errors::StaccatoError;
use crate::extractor::{default_templates, GenericExtractor};
use crate::format::conll;
use crate::model::AvgMatrixSparse;
use crate::tests::{setup, TWO_TOKEN_CONLL, TWO_TOKEN_LATTICE};
use crate::transition::{ArcEagerMorph, Idle};

fn extractor() -> GenericExtractor {
    let pairs: Vec<(String, String)> = default_templates()
        .into_iter()
        .map(|(t, g)| (t.to_string(), g.to_string()))
        .collect();
    GenericExtractor::from_templates(&pairs).unwrap()
}

#[test]
fn test_parse_unweighted_terminates() {
    let (_, table, graphs, _) = setup(TWO_TOKEN_CONLL, TWO_TOKEN_LATTICE, TWO_TOKEN_LATTICE);
    let system = Idle::new(ArcEagerMorph::new(table));
    let extractor = extractor();
    let model = AvgMatrixSparse::new(extractor.len(), true);
    let beam = Beam::new(&system, &extractor, &model, 4);

    let (parsed, score) = beam.parse(Arc::clone(&graphs[0].lattices)).unwrap();
    assert!(parsed.terminal());
    assert_eq!(score, 0);
    // every token got a valid spellout
    assert_eq!(parsed.mappings().len(), parsed.lattices.len());
    for mapping in &parsed.mappings()[1..] {
        let lattice = &parsed.lattices[mapping.token];
        assert!(lattice.spellouts.contains(&mapping.spellout));
    }
}

#[test]
fn test_parse_beam_of_one_terminates() {
    let (_, table, graphs, _) = setup(TWO_TOKEN_CONLL, TWO_TOKEN_LATTICE, TWO_TOKEN_LATTICE);
    let system = Idle::new(ArcEagerMorph::new(table));
    let extractor = extractor();
    let model = AvgMatrixSparse::new(extractor.len(), true);
    let beam = Beam::new(&system, &extractor, &model, 1);
    let (parsed, _) = beam.parse(Arc::clone(&graphs[0].lattices)).unwrap();
    assert!(parsed.terminal());
}

#[test]
fn test_single_threaded_and_concurrent_agree() {
    let (registry, table, graphs, _) =
        setup(TWO_TOKEN_CONLL, TWO_TOKEN_LATTICE, TWO_TOKEN_LATTICE);
    let system = Idle::new(ArcEagerMorph::new(table));
    let extractor = extractor();
    let model = AvgMatrixSparse::new(extractor.len(), true);

    let sequential = Beam::new(&system, &extractor, &model, 4);
    let concurrent = Beam::new(&system, &extractor, &model, 4).concurrent(true);
    let (a, score_a) = sequential.parse(Arc::clone(&graphs[0].lattices)).unwrap();
    let (b, score_b) = concurrent.parse(Arc::clone(&graphs[0].lattices)).unwrap();

    assert_eq!(score_a, score_b);
    assert_eq!(*a, *b);

    // byte-identical tabular output across modes
    let mut out_a = Vec::new();
    let mut out_b = Vec::new();
    conll::write(&mut out_a, &[conll::from_configuration(&a, &registry)]).unwrap();
    conll::write(&mut out_b, &[conll::from_configuration(&b, &registry)]).unwrap();
    assert_eq!(out_a, out_b);
}

#[test]
fn test_parse_repeated_runs_identical() {
    let (registry, table, graphs, _) =
        setup(TWO_TOKEN_CONLL, TWO_TOKEN_LATTICE, TWO_TOKEN_LATTICE);
    let system = Idle::new(ArcEagerMorph::new(table));
    let extractor = extractor();
    let model = AvgMatrixSparse::new(extractor.len(), true);
    let beam = Beam::new(&system, &extractor, &model, 4);

    let mut outputs = Vec::new();
    for _ in 0..2 {
        let (parsed, _) = beam.parse(Arc::clone(&graphs[0].lattices)).unwrap();
        let mut out = Vec::new();
        conll::write(&mut out, &[conll::from_configuration(&parsed, &registry)]).unwrap();
        outputs.push(out);
    }
    assert_eq!(outputs[0], outputs[1]);
}

#[test]
fn test_parse_timeout() {
    let (_, table, graphs, _) = setup(TWO_TOKEN_CONLL, TWO_TOKEN_LATTICE, TWO_TOKEN_LATTICE);
    let system = Idle::new(ArcEagerMorph::new(table));
    let extractor = extractor();
    let model = AvgMatrixSparse::new(extractor.len(), true);
    let beam = Beam::new(&system, &extractor, &model, 4).timeout(Some(Duration::ZERO));
    match beam.parse(Arc::clone(&graphs[0].lattices)) {
        Err(StaccatoError::Timeout) => {}
        other => panic!("expected a timeout, got {:?}", other.map(|(_, s)| s)),
    }
}
