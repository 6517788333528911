use std::{
    env,
    error::Error,
    fs,
    io::Write,
    path::PathBuf,
    sync::{Arc, atomic::Ordering},
};

use boolmatch::{BoolMatcher, Circuit, FoundMatch, MatchConfig};
use clap::Parser;
use env_logger::{Builder, Target, fmt};
use log::{Level, LevelFilter, Record, error, info};

#[derive(Debug, Parser)]
#[command(name = "boolmatch", version)]
#[command(about = "Enumerate the input permutations making two single-output AIGs equivalent")]
struct Args {
    /// Source circuit (.aag or .aig).
    src: PathBuf,

    /// Target circuit (.aag or .aig), with as many inputs as the source.
    trg: PathBuf,

    /// Read parameters from a TOML configuration file.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// A single configuration option, e.g. `-C allow_neg_map=true`. Applied after the
    /// configuration file, in order.
    #[arg(short = 'C', long = "config-option", value_name = "OPTION>=<VALUE")]
    config_options: Vec<String>,

    /// Wall-clock limit in seconds, 0 for none. Overrides the configuration.
    #[arg(long)]
    timeout: Option<u64>,

    /// Only print the final report.
    #[arg(short, long)]
    quiet: bool,
}

fn main() {
    let exit_code = match main_with_err() {
        Err(err) => {
            error!("{err}");
            1
        }
        Ok(exit_code) => exit_code,
    };
    std::process::exit(exit_code);
}

fn init_logging() {
    let format = |buf: &mut fmt::Formatter, record: &Record| {
        if record.level() == Level::Info {
            writeln!(buf, "c {}", record.args())
        } else {
            writeln!(buf, "c {}: {}", record.level(), record.args())
        }
    };

    let mut builder = Builder::new();
    builder
        .target(Target::Stderr)
        .format(format)
        .filter(None, LevelFilter::Info);

    if let Ok(ref env_var) = env::var("BOOLMATCH_LOG") {
        builder.parse_filters(env_var);
    }

    builder.init();
}

fn load_config(args: &Args) -> Result<MatchConfig, Box<dyn Error>> {
    let base = match &args.config {
        Some(path) => {
            info!("Reading configuration '{}'", path.display());
            fs::read_to_string(path)?
        }
        None => String::new(),
    };
    let mut config = MatchConfig::from_toml_with_overrides(&base, &args.config_options)?;
    if let Some(timeout) = args.timeout {
        config.timeout_secs = timeout;
    }
    if args.quiet {
        config.print_matches = false;
    }
    Ok(config)
}

fn main_with_err() -> Result<i32, Box<dyn Error>> {
    let args = Args::parse();
    init_logging();

    let config = load_config(&args)?;
    info!("Reading source '{}'", args.src.display());
    let src = Circuit::from_file(&args.src)?;
    info!("Reading target '{}'", args.trg.display());
    let trg = Circuit::from_file(&args.trg)?;

    let mut matcher = BoolMatcher::new(&src, &trg, &config)?;
    let cancel = matcher.cancel_flag();
    {
        let cancel = Arc::clone(&cancel);
        ctrlc::set_handler(move || {
            cancel.store(true, Ordering::Relaxed);
        })?;
    }

    let print_matches = config.print_matches;
    let mut sink = |found: &FoundMatch| {
        if print_matches {
            println!("m {found}");
        }
    };
    let report = matcher.run(&mut sink)?;

    for line in report.to_string().lines() {
        println!("s {line}");
    }
    Ok(if report.is_partial() { 2 } else { 0 })
}
