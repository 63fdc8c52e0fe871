use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use staccato::beam::Beam;
use staccato::extractor::{default_templates, GenericExtractor};
use staccato::format::{conll, lattice_file, segmentation};
use staccato::graph::combine_gold;
use staccato::lattice::rooted;
use staccato::model::{AvgMatrixSparse, Model};
use staccato::perceptron::{gold_sequences, LinearPerceptron};
use staccato::transition::{ArcEagerMorph, Idle, TransitionTable};
use staccato::Registry;

#[derive(Parser, Debug)]
#[clap(name = "morph", about = "Morpho-syntactic training and parsing")]
struct Args {
    /// Training dependency file.
    #[clap(long = "tc")]
    train_conll: PathBuf,

    /// Training disambiguated lattices file.
    #[clap(long = "td")]
    train_dis_lattices: PathBuf,

    /// Training ambiguous lattices file.
    #[clap(long = "tl")]
    train_amb_lattices: PathBuf,

    /// Test ambiguous lattices file.
    #[clap(long = "in")]
    input: PathBuf,

    /// Output dependency file.
    #[clap(long = "oc")]
    out_conll: PathBuf,

    /// Output segmentation file.
    #[clap(long = "os")]
    out_seg: PathBuf,

    /// Output training-gold segmentation file.
    #[clap(long = "ots")]
    out_train_seg: PathBuf,

    /// Number of perceptron iterations.
    #[clap(long = "it", default_value = "1")]
    iterations: usize,

    /// Beam size.
    #[clap(short = 'b', long, default_value = "4")]
    beam_size: usize,

    /// Expand beam items concurrently.
    #[clap(long = "bconc")]
    concurrent_beam: bool,

    /// Prefix for the model file ({m}.b{b}.i{i}.model).
    #[clap(short = 'm', long, default_value = "model")]
    model_prefix: String,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let out_model = format!(
        "{}.b{}.i{}.model",
        args.model_prefix, args.beam_size, args.iterations
    );
    eprintln!("Transition system: IDLE + Morph + ArcEager");
    eprintln!("Iterations: {}", args.iterations);
    eprintln!("Beam size: {}", args.beam_size);
    eprintln!("Concurrent beam: {}", args.concurrent_beam);
    eprintln!("Model file: {}", &out_model);

    let mut registry = Registry::new();

    eprintln!("Reading training dependency sentences...");
    let train_sents = {
        let rdr = File::open(&args.train_conll)
            .with_context(|| format!("opening {}", args.train_conll.display()))?;
        conll::read(BufReader::new(rdr))?
    };
    eprintln!("Read {} sentences", train_sents.len());
    let mut arc_sets = Vec::with_capacity(train_sents.len());
    for sentence in &train_sents {
        arc_sets.push(conll::to_arcs(sentence, &mut registry)?);
    }

    let table = TransitionTable::new(&mut registry)?;
    let system = Idle::new(ArcEagerMorph::new(table));

    eprintln!("Reading training disambiguated lattices...");
    let dis = {
        let rdr = File::open(&args.train_dis_lattices)
            .with_context(|| format!("opening {}", args.train_dis_lattices.display()))?;
        lattice_file::read(BufReader::new(rdr), &mut registry)?
    };
    eprintln!("Reading training ambiguous lattices...");
    let amb = {
        let rdr = File::open(&args.train_amb_lattices)
            .with_context(|| format!("opening {}", args.train_amb_lattices.display()))?;
        lattice_file::read(BufReader::new(rdr), &mut registry)?
    };
    anyhow::ensure!(
        train_sents.len() == dis.len() && dis.len() == amb.len(),
        "mismatched training corpus sizes: {} sentences, {} disambiguated, {} ambiguous",
        train_sents.len(),
        dis.len(),
        amb.len(),
    );

    eprintln!("Reading test ambiguous lattices...");
    let test = {
        let rdr = File::open(&args.input)
            .with_context(|| format!("opening {}", args.input.display()))?;
        lattice_file::read(BufReader::new(rdr), &mut registry)?
    };
    eprintln!("Read {} test lattice sentences", test.len());

    eprintln!("Combining training inputs into gold morph graphs...");
    let mut graphs = Vec::with_capacity(arc_sets.len());
    let mut missing_gold = 0;
    for ((arcs, gold_lat), amb_lat) in arc_sets.into_iter().zip(&dis).zip(amb) {
        match combine_gold(arcs, gold_lat, amb_lat)? {
            Some(graph) => graphs.push(graph),
            None => missing_gold += 1,
        }
    }
    eprintln!(
        "Combined {} graphs, {} missing a gold path in the lattice",
        graphs.len(),
        missing_gold
    );

    eprintln!("Generating gold transition sequences...");
    let (instances, unrecoverable) = gold_sequences(&system, graphs);
    eprintln!(
        "Generated {} training sequences, skipped {}",
        instances.len(),
        unrecoverable
    );

    let templates: Vec<(String, String)> = default_templates()
        .into_iter()
        .map(|(t, g)| (t.to_string(), g.to_string()))
        .collect();
    let extractor = GenericExtractor::from_templates(&templates)?;
    let matrix = AvgMatrixSparse::new(extractor.len(), true);
    let model = Model::new(registry, templates, matrix);

    eprintln!("Training {} iteration(s)...", args.iterations);
    let mut trainer = LinearPerceptron::new(&system, &extractor, &model)
        .iterations(args.iterations)
        .beam_size(args.beam_size)
        .concurrent_beam(args.concurrent_beam)
        .temp_model(Some(PathBuf::from(&args.model_prefix)), 1000);
    trainer.train(&instances)?;
    eprintln!("Done training, {} updates", trainer.num_updates());

    eprintln!("Writing model to {}...", &out_model);
    let num_bytes = model.write(BufWriter::new(File::create(&out_model)?))?;
    eprintln!("{} MiB", num_bytes as f64 / (1024. * 1024.));

    eprintln!("Writing gold training segmentation to {}...", args.out_train_seg.display());
    {
        let mut wtr = BufWriter::new(File::create(&args.out_train_seg)?);
        for instance in &instances {
            segmentation::write_sentence(
                &mut wtr,
                &instance.graph.mappings,
                &instance.graph.lattices,
            )?;
        }
    }

    eprintln!("Parsing {} test sentences...", test.len());
    let beam = Beam::new(&system, &extractor, &model.matrix, args.beam_size)
        .concurrent(args.concurrent_beam);
    let mut parsed_sentences = Vec::with_capacity(test.len());
    let mut seg_wtr = BufWriter::new(File::create(&args.out_seg)?);
    for (i, sentence) in test.into_iter().enumerate() {
        if i % 100 == 0 {
            eprintln!("At sentence {i}");
        }
        let (parsed, _score) = beam.parse(rooted(sentence))?;
        segmentation::write_sentence(&mut seg_wtr, parsed.mappings(), &parsed.lattices)?;
        parsed_sentences.push(conll::from_configuration(&parsed, &model.registry));
    }

    eprintln!("Writing dependency output to {}...", args.out_conll.display());
    conll::write(
        BufWriter::new(File::create(&args.out_conll)?),
        &parsed_sentences,
    )?;
    eprintln!(
        "Wrote {} sentences in tabular format",
        parsed_sentences.len()
    );
    Ok(())
}
