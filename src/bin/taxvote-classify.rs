#[macro_use]
extern crate log;

extern crate clap;

extern crate taxvote;

use clap::{App, Arg};

use taxvote::binner;
use taxvote::classify::{ClassifyParams, ReportMode};
use taxvote::util;

fn main() {
    let args = App::new("taxvote")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Seed-voting metagenomic read classifier.")
        .arg(Arg::with_name("FASTA")
            .short("fa")
            .long("fasta")
            .help("Path to FASTA reads.")
            .takes_value(true)
            .required_unless("FASTQ")
            .conflicts_with("FASTQ"))
        .arg(Arg::with_name("FASTQ")
            .short("fq")
            .long("fastq")
            .help("Path to FASTQ reads.")
            .takes_value(true)
            .required_unless("FASTA")
            .conflicts_with("FASTA"))
        .arg(Arg::with_name("MATES")
            .long("mates")
            .help("Path to the second-mate file (same format) for paired reads.")
            .takes_value(true))
        .arg(Arg::with_name("INDEX")
            .short("i")
            .long("index")
            .help("Path to taxvote index file.")
            .takes_value(true)
            .required(true))
        .arg(Arg::with_name("VERBOSE")
            .short("v")
            .help("Include this flag to trigger debug-level logging."))
        .arg(Arg::with_name("RESULTS_PATH")
            .short("m")
            .long("results")
            .takes_value(true)
            .help("Path to write results file."))
        .arg(Arg::with_name("NUM_THREADS")
            .short("t")
            .long("threads")
            .takes_value(true)
            .help("Number of worker threads to spawn.")
            .default_value("4"))
        .arg(Arg::with_name("MIN_HIT_LEN")
            .long("min-hit-len")
            .takes_value(true)
            .help("Minimum seed length allowed to contribute to classification.")
            .default_value("22"))
        .arg(Arg::with_name("KHITS")
            .short("k")
            .long("khits")
            .takes_value(true)
            .help("Cap on reference coordinates materialized per read (or pair).")
            .default_value("40"))
        .arg(Arg::with_name("SEED")
            .long("seed")
            .takes_value(true)
            .help("Seed for the subsampling PRNG; fixing it makes runs reproducible.")
            .default_value("42"))
        .arg(Arg::with_name("REPORT_MODE")
            .long("report-mode")
            .takes_value(true)
            .possible_values(&["per-species", "top-genus"])
            .help("Report every voted (genus, species), or only the top-scoring genera.")
            .default_value("per-species"))
        .get_matches();

    // setup logger
    util::init_logging(if args.is_present("VERBOSE") {
        log::LogLevelFilter::Debug
    } else {
        log::LogLevelFilter::Info
    });

    let exit_code = {
        let results_path = args.value_of("RESULTS_PATH");
        let fastq_path = args.value_of("FASTQ");
        let fasta_path = args.value_of("FASTA");
        let mate_path = args.value_of("MATES");
        let index_path = args.value_of("INDEX").unwrap();

        let input_path;
        let input_type;

        if !fasta_path.is_none() {
            input_path = fasta_path.unwrap();
            input_type = "FASTA";
        } else {
            input_path = fastq_path.unwrap();
            input_type = "FASTQ";
        }

        let num_threads = match args.value_of("NUM_THREADS") {
            Some(s) => s
                .parse::<usize>()
                .expect("Invalid number entered for number of threads!"),
            None => unreachable!(),
        };

        let min_hit_len = match args.value_of("MIN_HIT_LEN") {
            Some(s) => {
                let min_hit_len = s.parse::<usize>().expect("Invalid minimum hit length entered!");
                info!("Minimum hit length: {}", min_hit_len);
                if min_hit_len < 16 {
                    warn!("Minimum hit length may be small enough that spurious matches vote.");
                } else if min_hit_len > 30 {
                    warn!("Minimum hit length may be large enough that significant results are ignored.");
                }

                min_hit_len
            },
            None => panic!("Missing parameter: min-hit-len"),
        };

        let khits = match args.value_of("KHITS") {
            Some(s) => {
                let khits = s.parse::<usize>().expect("Invalid cutoff for khits!");
                info!("Coordinate budget: {}", khits);
                if khits < 1 {
                    panic!("khits must be at least 1");
                }
                if khits > 10000 {
                    warn!("khits may be large enough to cause performance issues.");
                }

                khits
            },
            None => panic!("Missing parameter: khits"),
        };

        let seed = match args.value_of("SEED") {
            Some(s) => s.parse::<u64>().expect("Invalid seed entered!"),
            None => unreachable!(),
        };

        let report = match args.value_of("REPORT_MODE") {
            Some("top-genus") => ReportMode::TopGenus,
            Some("per-species") => ReportMode::PerSpecies,
            _ => ReportMode::PerSpecies,
        };

        let params = ClassifyParams {
            min_hit_len: min_hit_len,
            max_genome_hits: khits,
            report: report,
        };

        match results_path {
            None => {
                error!("No results path provided!");
                3
            },
            Some(results_path) => {
                match binner::classify_fastx_and_write(input_path,
                                                       mate_path,
                                                       input_type,
                                                       index_path,
                                                       results_path,
                                                       num_threads,
                                                       params,
                                                       seed) {
                    Ok(_) => 0,
                    Err(why) => {
                        error!("Error running query: {}", why);
                        2
                    },
                }
            },
        }
    };

    std::process::exit(exit_code);
}
