use std::path::PathBuf;
use std::time::Instant;
use std::{env, process};

use giraf::{formats, record, stream, utils};
use giraf::{BgzfParams, EncoderParams, QueryCursor};

use getopts::Options;

use log::{info, warn};

//-----------------------------------------------------------------------------

fn main() -> Result<(), String> {
    let start_time = Instant::now();

    // Parse arguments.
    let config = Config::new();
    init_log(config.verbosity)?;

    if utils::file_exists(&config.output_file) && !config.overwrite {
        return Err(format!("Output file {} already exists", config.output_file.display()));
    }

    // Convert the records.
    info!("Reading text records from {}", config.input_file.display());
    let reader = utils::open_file(&config.input_file).map_err(|x| x.to_string())?;
    let mut writer = stream::create_record_file(
        &config.output_file, config.encoder.clone(), config.bgzf.clone(), config.overwrite
    ).map_err(|x| x.to_string())?;

    let mut records = formats::read_text_records(reader);
    let mut divergent = 0;
    for result in records.by_ref() {
        let record = result.map_err(|x| x.to_string())?;
        if config.encoder.cursor == QueryCursor::Legacy && record::legacy_cursor_diverges(&record.cigar) {
            divergent += 1;
        }
        writer.write(&record).map_err(|x| format!("Read {}: {}", record.name, x))?;
    }
    let count = writer.records();
    let bytes = writer.bytes();
    let bgzf = writer.into_inner();
    let blocks = bgzf.blocks();
    bgzf.finish().map_err(|x| x.to_string())?;

    // Statistics.
    info!("Converted {} records from {} lines", count, records.lines());
    info!("Encoded size {} in {} compressed blocks", utils::human_readable_size(bytes), blocks);
    if divergent > 0 {
        warn!(
            "{} records have a deletion or similar operation before an explicit base; use --strict-cursor to encode them faithfully",
            divergent
        );
    }
    let size = utils::file_size(&config.output_file).unwrap_or(String::from("unknown"));
    info!("Output file size: {}", size);

    let end_time = Instant::now();
    let seconds = end_time.duration_since(start_time).as_secs_f64();
    info!("Used {:.3} seconds", seconds);

    Ok(())
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
    pub output_file: PathBuf,
    pub overwrite: bool,
    pub verbosity: usize,
    pub encoder: EncoderParams,
    pub bgzf: BgzfParams,
}

impl Config {
    pub fn new() -> Config {
        let mut encoder = EncoderParams::default();
        let mut bgzf = BgzfParams::default();

        let args: Vec<String> = env::args().collect();
        let program = args[0].clone();
        let header = format!("Usage: {} [options] records.giraf[.gz]", program);

        let mut opts = Options::new();
        opts.optflag("h", "help", "print this help");
        opts.optopt("o", "output", "output file name (default: <input>.bgiraf)", "FILE");
        let threads_desc = format!("number of compression threads (default: {})", bgzf.threads);
        opts.optopt("t", "threads", &threads_desc, "INT");
        let level_desc = format!("compression level from 0 to {} (default: {})", BgzfParams::MAX_LEVEL, bgzf.level);
        opts.optopt("l", "level", &level_desc, "INT");
        opts.optflag("", "strict-cursor", "select explicit bases using only read-consuming CIGAR operations");
        opts.optflag("", "overwrite", "overwrite the output file if it exists");
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
        let input_file = if let Some(s) = matches.free.first() {
            PathBuf::from(s)
        } else {
            eprint!("{}", opts.usage(&header));
            process::exit(1);
        };
        let output_file = if let Some(s) = matches.opt_str("o") {
            PathBuf::from(s)
        } else {
            let mut name = input_file.clone().into_os_string();
            name.push(".bgiraf");
            PathBuf::from(name)
        };

        // Parameters.
        if let Some(s) = matches.opt_str("t") {
            match s.parse::<usize>() {
                Ok(threads) if threads > 0 => bgzf.threads = threads,
                _ => {
                    eprintln!("Invalid number of threads: {}", s);
                    process::exit(1);
                }
            }
        }
        if let Some(s) = matches.opt_str("l") {
            match s.parse::<u32>() {
                Ok(level) if level <= BgzfParams::MAX_LEVEL => bgzf.level = level,
                _ => {
                    eprintln!("Invalid compression level: {}", s);
                    process::exit(1);
                }
            }
        }
        if matches.opt_present("strict-cursor") {
            encoder.cursor = QueryCursor::Strict;
        }

        let overwrite = matches.opt_present("overwrite");
        let verbosity = 2 + matches.opt_count("v");

        Config {
            input_file, output_file,
            overwrite, verbosity,
            encoder, bgzf,
        }
    }
}

//-----------------------------------------------------------------------------
