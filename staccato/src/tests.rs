mod decoding;
mod training;

use std::sync::Arc;

use crate::configuration::Configuration;
use crate::enumeration::Registry;
use crate::format::{conll, lattice_file};
use crate::graph::{combine_gold, MorphGraph};
use crate::transition::TransitionTable;

pub(crate) const ONE_TOKEN_CONLL: &str = "1\tdogs\tdog\tNOUN\tNOUN\tnum=P\t0\tsubj\t_\t_\n\n";
pub(crate) const ONE_TOKEN_LATTICE: &str = "0\t1\tdogs\tdog\tNOUN\tNOUN\tnum=P\t1\n\n";

pub(crate) const TWO_TOKEN_CONLL: &str = "\
1\tthe\tthe\tDET\tDET\t_\t2\tdet\t_\t_
2\tdog\tdog\tNOUN\tNOUN\t_\t0\tsubj\t_\t_

";
pub(crate) const TWO_TOKEN_LATTICE: &str = "\
0\t1\tthe\tthe\tDET\tDET\t_\t1
1\t2\tdog\tdog\tNOUN\tNOUN\t_\t2

";

// "bimba" segments as either bim+ba or b+imba; the ambiguous lattice lists
// the wrong path first, the gold path is b+imba.
pub(crate) const BIMBA_CONLL: &str = "\
1\tb\tb\tDET\tDET\t_\t2\tdet\t_\t_
2\timba\timba\tNOUN\tNOUN\t_\t0\tsubj\t_\t_

";
pub(crate) const BIMBA_DIS_LATTICE: &str = "\
0\t1\tb\tb\tDET\tDET\t_\t1
1\t2\timba\timba\tNOUN\tNOUN\t_\t1

";
pub(crate) const BIMBA_AMB_LATTICE: &str = "\
0\t1\tbim\tbim\tNOUN\tNOUN\t_\t1
1\t3\tba\tba\tPOS\tPOS\t_\t1
0\t2\tb\tb\tDET\tDET\t_\t1
2\t3\timba\timba\tNOUN\tNOUN\t_\t1

";

/// Reads a tiny corpus and combines it into gold graphs; returns the
/// registry, the transition table, the graphs, and the number of instances
/// whose gold path was missing from the ambiguous lattice.
pub(crate) fn setup(
    conll_text: &str,
    dis_text: &str,
    amb_text: &str,
) -> (Registry, TransitionTable, Vec<MorphGraph>, usize) {
    let mut registry = Registry::new();
    let sentences = conll::read(conll_text.as_bytes()).unwrap();
    let mut arc_sets = Vec::new();
    for sentence in &sentences {
        arc_sets.push(conll::to_arcs(sentence, &mut registry).unwrap());
    }
    let table = TransitionTable::new(&mut registry).unwrap();
    let dis = lattice_file::read(dis_text.as_bytes(), &mut registry).unwrap();
    let amb = lattice_file::read(amb_text.as_bytes(), &mut registry).unwrap();
    assert_eq!(arc_sets.len(), dis.len());
    assert_eq!(arc_sets.len(), amb.len());

    let mut graphs = Vec::new();
    let mut missing = 0;
    for ((arcs, gold_lat), amb_lat) in arc_sets.into_iter().zip(&dis).zip(amb) {
        match combine_gold(arcs, gold_lat, amb_lat).unwrap() {
            Some(graph) => graphs.push(graph),
            None => missing += 1,
        }
    }
    (registry, table, graphs, missing)
}

pub(crate) fn transition_names(registry: &Registry, chain: &[Arc<Configuration>]) -> Vec<String> {
    chain[1..]
        .iter()
        .map(|conf| {
            registry
                .transitions
                .value(conf.last())
                .cloned()
                .unwrap_or_else(|| format!("?{}", conf.last()))
        })
        .collect()
}
