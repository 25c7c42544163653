use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use std::{env, process};

use giraf::{formats, stream, utils};
use giraf::{ReferenceGraph, SequenceGraph};

use gbwt::GBZ;

use simple_sds::serialize;

use getopts::Options;

use log::info;

//-----------------------------------------------------------------------------

fn main() -> Result<(), String> {
    let start_time = Instant::now();

    // Parse arguments.
    let config = Config::new();
    init_log(config.verbosity)?;

    // Load the graph and convert the records.
    let count = if is_gbz(&config.graph_file) {
        info!("Loading GBZ graph {}", config.graph_file.display());
        let graph: GBZ = serialize::load_from(&config.graph_file).map_err(|x| x.to_string())?;
        convert(&config, &graph)?
    } else {
        info!("Loading GFA segments from {}", config.graph_file.display());
        let graph = SequenceGraph::load_gfa(&config.graph_file).map_err(|x| x.to_string())?;
        info!("The graph contains {} nodes", graph.nodes());
        convert(&config, &graph)?
    };

    // Statistics.
    info!("Decoded {} records", count);
    let end_time = Instant::now();
    let seconds = end_time.duration_since(start_time).as_secs_f64();
    info!("Used {:.3} seconds", seconds);

    Ok(())
}

fn is_gbz(filename: &Path) -> bool {
    filename.extension().map_or(false, |ext| ext == "gbz")
}

fn convert<G: ReferenceGraph>(config: &Config, graph: &G) -> Result<usize, String> {
    info!("Reading binary records from {}", config.input_file.display());
    let mut reader = stream::open_record_file(&config.input_file).map_err(|x| x.to_string())?;
    let mut output: Box<dyn Write> = match &config.output_file {
        Some(filename) => {
            let file = File::create(filename).map_err(|x| x.to_string())?;
            Box::new(BufWriter::new(file))
        },
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };

    let mut count = 0;
    while let Some(record) = reader.next_record(graph).map_err(|x| format!("Record {}: {}", count + 1, x))? {
        formats::write_text_record(&record, &mut output).map_err(|x| x.to_string())?;
        count += 1;
    }
    output.flush().map_err(|x| x.to_string())?;

    if let Some(filename) = &config.output_file {
        let size = utils::file_size(filename).unwrap_or(String::from("unknown"));
        info!("Output file size: {}", size);
    }
    Ok(count)
}

fn init_log(verbosity: usize) -> Result<(), String> {
    stderrlog::new()
        .module(module_path!())
        .module("giraf")
        .quiet(false)
        .verbosity(verbosity)
        .timestamp(stderrlog::Timestamp::Off)
        .init()
        .map_err(|x| x.to_string())
}

//-----------------------------------------------------------------------------

struct Config {
    pub input_file: PathBuf,
    pub graph_file: PathBuf,
    pub output_file: Option<PathBuf>,
    pub verbosity: usize,
}

impl Config {
    pub fn new() -> Config {
        let args: Vec<String> = env::args().collect();
        let program = args[0].clone();
        let header = format!("Usage: {} [options] -g graph.gfa records.bgiraf", program);

        let mut opts = Options::new();
        opts.optflag("h", "help", "print this help");
        opts.optopt("g", "graph", "reference graph in GFA (possibly gzipped) or GBZ format (required)", "FILE");
        opts.optopt("o", "output", "output file name (default: stdout)", "FILE");
        opts.optflagmulti("v", "verbose", "increase verbosity (may be repeated)");
        let matches = match opts.parse(&args[1..]) {
            Ok(m) => m,
            Err(f) => {
                eprintln!("{}", f);
                process::exit(1);
            }
        };

        if matches.opt_present("h") {
            eprint!("{}", opts.usage(&header));
            process::exit(0);
        }
        let graph_file = if let Some(s) = matches.opt_str("g") {
            PathBuf::from(s)
        } else {
            eprint!("{}", opts.usage(&header));
            process::exit(1);
        };
        let output_file = matches.opt_str("o").map(PathBuf::from);
        let input_file = if let Some(s) = matches.free.first() {
            PathBuf::from(s)
        } else {
            eprint!("{}", opts.usage(&header));
            process::exit(1);
        };

        let verbosity = 2 + matches.opt_count("v");

        Config {
            input_file, graph_file, output_file,
            verbosity,
        }
    }
}

//-----------------------------------------------------------------------------
