use std::sync::Arc;

use crate::beam::Beam;
use crate::extractor::{default_templates, GenericExtractor};
use crate::graph::DepArc;
use crate::model::{AvgMatrixSparse, Model};
use crate::perceptron::{gold_sequences, LinearPerceptron};
use crate::tests::{
    setup, BIMBA_AMB_LATTICE, BIMBA_CONLL, BIMBA_DIS_LATTICE, TWO_TOKEN_CONLL, TWO_TOKEN_LATTICE,
};
use crate::transition::{ArcEagerMorph, Idle, TransitionSystem, TransitionTable};

fn template_pairs() -> Vec<(String, String)> {
    default_templates()
        .into_iter()
        .map(|(t, g)| (t.to_string(), g.to_string()))
        .collect()
}

fn train_model(
    conll_text: &str,
    dis_text: &str,
    amb_text: &str,
    iterations: usize,
    beam_size: usize,
) -> (Model, TransitionTable, Idle<ArcEagerMorph>, usize) {
    let (registry, table, graphs, _) = setup(conll_text, dis_text, amb_text);
    let system = Idle::new(ArcEagerMorph::new(table));
    let (instances, skipped) = gold_sequences(&system, graphs);
    assert_eq!(skipped, 0);

    let pairs = template_pairs();
    let extractor = GenericExtractor::from_templates(&pairs).unwrap();
    let matrix = AvgMatrixSparse::new(extractor.len(), true);
    let model = Model::new(registry, pairs, matrix);

    let mut trainer = LinearPerceptron::new(&system, &extractor, &model)
        .iterations(iterations)
        .beam_size(beam_size);
    trainer.train(&instances).unwrap();
    let updates = trainer.num_updates();
    (model, table, system, updates)
}

#[test]
fn test_ambiguity_training_biases_gold_path() {
    let (model, table, system, updates) =
        train_model(BIMBA_CONLL, BIMBA_DIS_LATTICE, BIMBA_AMB_LATTICE, 1, 2);
    assert!(updates >= 1);

    let extractor = model.extractor().unwrap();
    let (_, _, graphs, _) = setup(BIMBA_CONLL, BIMBA_DIS_LATTICE, BIMBA_AMB_LATTICE);
    let init = system.initial(Arc::clone(&graphs[0].lattices));
    let feats = extractor.features(&init);
    let scores = model.matrix.scores(&feats);
    let score = |t: u32| scores.get(t as usize).copied().unwrap_or(0);
    // MD-1 enters the gold path (b+imba), MD-0 the wrong one (bim+ba)
    assert!(score(table.md(1)) > score(table.md(0)));
}

#[test]
fn test_early_update_fires_on_divergence() {
    let (_, table, graphs, _) = setup(BIMBA_CONLL, BIMBA_DIS_LATTICE, BIMBA_AMB_LATTICE);
    let system = Idle::new(ArcEagerMorph::new(table));
    let (instances, _) = gold_sequences(&system, graphs);

    let extractor = GenericExtractor::from_templates(&template_pairs()).unwrap();
    let matrix = AvgMatrixSparse::new(extractor.len(), true);
    let gold_transitions: Vec<u32> = instances[0].sequence[1..]
        .iter()
        .map(|conf| conf.last())
        .collect();
    let beam = Beam::new(&system, &extractor, &matrix, 2);
    let result = beam
        .decode(Arc::clone(&instances[0].graph.lattices), &gold_transitions)
        .unwrap();
    // with zero weights the wrong first-listed path floods the beam, so the
    // gold prefix is gone two generations in
    assert_eq!(result.updated_at, Some(2));
    assert!(!result.best_is_gold);
    assert_eq!(result.best.conf.sequence().len(), 3);
}

#[test]
fn test_training_recovers_gold_tree() {
    let (model, _, system, _) =
        train_model(TWO_TOKEN_CONLL, TWO_TOKEN_LATTICE, TWO_TOKEN_LATTICE, 3, 4);
    let extractor = model.extractor().unwrap();
    let (_, _, graphs, _) = setup(TWO_TOKEN_CONLL, TWO_TOKEN_LATTICE, TWO_TOKEN_LATTICE);
    let beam = Beam::new(&system, &extractor, &model.matrix, 4);
    let (parsed, _) = beam.parse(Arc::clone(&graphs[0].lattices)).unwrap();

    let det = model.registry.relations.index_of(&"det".to_string()).unwrap();
    let subj = model.registry.relations.index_of(&"subj".to_string()).unwrap();
    let mut arcs = parsed.arcs().to_vec();
    arcs.sort_unstable_by_key(|a| a.modifier);
    assert_eq!(
        arcs,
        vec![
            DepArc {
                head: 2,
                modifier: 1,
                relation: det,
            },
            DepArc {
                head: 0,
                modifier: 2,
                relation: subj,
            },
        ]
    );
}

#[test]
fn test_trained_model_disambiguates() {
    let (model, _, system, _) =
        train_model(BIMBA_CONLL, BIMBA_DIS_LATTICE, BIMBA_AMB_LATTICE, 3, 2);
    let extractor = model.extractor().unwrap();
    let (_, _, graphs, _) = setup(BIMBA_CONLL, BIMBA_DIS_LATTICE, BIMBA_AMB_LATTICE);
    let beam = Beam::new(&system, &extractor, &model.matrix, 2);
    let (parsed, _) = beam.parse(Arc::clone(&graphs[0].lattices)).unwrap();
    let forms: Vec<&str> = (1..parsed.morph_nodes().len())
        .map(|n| parsed.morpheme(n).form.as_str())
        .collect();
    assert_eq!(forms, vec!["b", "imba"]);
}

#[test]
fn test_model_file_round_trip() {
    let (model, _, system, _) =
        train_model(BIMBA_CONLL, BIMBA_DIS_LATTICE, BIMBA_AMB_LATTICE, 1, 2);

    let mut bytes = Vec::new();
    model.write(&mut bytes).unwrap();
    let restored = Model::read(bytes.as_slice()).unwrap();

    assert_eq!(restored.templates(), model.templates());
    assert_eq!(
        restored.registry.transitions.len(),
        model.registry.transitions.len()
    );

    // the score function is identical on every state of a parse
    let extractor = model.extractor().unwrap();
    let (_, _, graphs, _) = setup(BIMBA_CONLL, BIMBA_DIS_LATTICE, BIMBA_AMB_LATTICE);
    let beam = Beam::new(&system, &extractor, &model.matrix, 2);
    let (parsed, _) = beam.parse(Arc::clone(&graphs[0].lattices)).unwrap();
    for conf in parsed.sequence() {
        let feats = extractor.features(&conf);
        assert_eq!(model.matrix.scores(&feats), restored.matrix.scores(&feats));
    }
}

#[test]
fn test_model_tag_mismatch() {
    let mut bytes = Vec::new();
    bincode::encode_into_std_write("who knows", &mut bytes, crate::common::bincode_config())
        .unwrap();
    assert!(matches!(
        Model::read(bytes.as_slice()),
        Err(crate::errors::StaccatoError::ModelMismatch(_))
    ));
}
