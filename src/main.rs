use std::path::Path;
use std::process;

use bytesize::ByteSize;
use clap::ArgEnum;
use env_logger;
use log;

use bigsort::arena::round_up_to_value_size;
use bigsort::Sorter;

fn main() {
    let arg_parser = build_arg_parser();

    let log_level: LogLevel = arg_parser.value_of_t_or_exit("log_level");
    init_logger(log_level);

    let input = arg_parser.value_of("input").expect("value is required");
    let output = arg_parser.value_of("output").expect("value is required");

    let run_size = arg_parser.value_of("run_size").expect("value has a default");
    let run_size = run_size.parse::<ByteSize>().expect("value is pre-validated").as_u64() as usize;
    // The arena holds whole values only, so the requested size rounds up to
    // a multiple of 4.
    let run_size = round_up_to_value_size(run_size);

    let open_file_limit: usize = arg_parser.value_of_t_or_exit("max_open_files");

    log::info!(
        "sorting {} into {} (run size: {} bytes, open file limit: {})",
        input,
        output,
        run_size,
        open_file_limit
    );

    let sorter = Sorter::new()
        .with_run_size(run_size)
        .with_open_file_limit(open_file_limit);

    match sorter.sort(Path::new(input), Path::new(output)) {
        Ok(summary) => {
            log::info!(
                "completed successfully: {} runs merged in {} generations",
                summary.runs,
                summary.generations
            );
        }
        Err(err) => {
            log::error!("sorting failed: {}", err);
            process::exit(1);
        }
    }
}

#[derive(Copy, Clone, clap::ArgEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn possible_values() -> impl Iterator<Item = clap::PossibleValue<'static>> {
        Self::value_variants().iter().filter_map(|v| v.to_possible_value())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <LogLevel as clap::ArgEnum>::from_str(s, false)
    }
}

fn build_arg_parser() -> clap::ArgMatches {
    clap::App::new("bigsort")
        .about("sort a huge file of unsigned 32-bit integers using bounded memory")
        .arg(
            clap::Arg::new("input")
                .short('i')
                .long("input")
                .help("file to be sorted")
                .required(true)
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("output")
                .short('o')
                .long("output")
                .help("result file")
                .required(true)
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("run_size")
                .short('r')
                .long("run-size")
                .help("size of the initial runs, which also determines memory usage")
                .takes_value(true)
                .default_value("1MiB")
                .validator(|v| match v.parse::<ByteSize>() {
                    Ok(_) => Ok(()),
                    Err(err) => Err(format!("run size format incorrect: {}", err)),
                }),
        )
        .arg(
            clap::Arg::new("max_open_files")
                .short('f')
                .long("max-open-files")
                .help("limit on simultaneously open run files while merging")
                .takes_value(true)
                .default_value("16")
                .validator(|v| match v.parse::<usize>() {
                    Ok(n) if n >= 2 => Ok(()),
                    Ok(n) => Err(format!("at least 2 open files are required, got {}", n)),
                    Err(err) => Err(format!("open file limit incorrect: {}", err)),
                }),
        )
        .arg(
            clap::Arg::new("log_level")
                .short('l')
                .long("loglevel")
                .help("logging level")
                .takes_value(true)
                .default_value("info")
                .possible_values(LogLevel::possible_values()),
        )
        .get_matches()
}

fn init_logger(log_level: LogLevel) {
    env_logger::Builder::new()
        .filter_level(match log_level {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        })
        .format_timestamp_millis()
        .init();
}
