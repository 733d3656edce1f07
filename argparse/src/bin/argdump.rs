// Test runner: parses its own argv against a profiler-style option table and
// dumps what the table ended up holding.

use std::fs::File;
use std::io::{self, Write};
use std::process::ExitCode;

use argparse::{Opt, OptionTable};
use tracing::{debug, info};
use tracing_subscriber::{fmt, EnvFilter};

const USAGE: &str = r#"Usage: argdump [INPUT] [OPTION]...
Parse the command line and print the resulting option values.

  -h, --help             This help.
  -l, --log              Also print the dump to stdout when --output is given.
  -o, --output=FILE      Write the dump to FILE instead of stdout.
  -v, --value=KIND       Value to record: current, voltage or power.
  -r, --rail=NAME        Rail to record.
  -i, --interval=MS      Sampling interval in milliseconds.  Default is 100.
  -s, --scale=FACTOR     Scale applied to recorded values.  Default is 1.0.

Positional arguments must come before any option.  Option values are only
accepted inline: --output=out.csv, not --output out.csv.
"#;

#[derive(Debug, thiserror::Error)]
enum DumpError {
    #[error("{0}")]
    Args(#[from] argparse::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Everything the rest of the program needs, read once from the parsed table.
#[derive(Debug)]
struct DumpConfig {
    input: Option<String>,
    log: bool,
    output: Option<String>,
    value: Option<String>,
    rail: Option<String>,
    interval: i32,
    scale: f32,
}

impl DumpConfig {
    fn from_table(table: &OptionTable) -> argparse::Result<Self> {
        Ok(DumpConfig {
            input: table.positional().map(str::to_string),
            log: table.get::<bool>("log")?.unwrap_or(false),
            output: table.get("output")?,
            value: table.get("value")?,
            rail: table.get("rail")?,
            interval: table.get_or_default("interval")?.unwrap_or(100),
            scale: table.get_or_default("scale")?.unwrap_or(1.0),
        })
    }
}

fn option_table() -> OptionTable {
    OptionTable::new()
        .option(Opt::boolean("help").short('h').description("This help."))
        .option(Opt::boolean("log").short('l').description("Echo the dump to stdout."))
        .option(Opt::string("output").short('o').description("Dump file."))
        .option(Opt::string("value").short('v').description("Value to record."))
        .option(Opt::string("rail").short('r').description("Rail to record."))
        .option(
            Opt::integer("interval")
                .short('i')
                .default_val(100)
                .description("Sampling interval in milliseconds."),
        )
        .option(
            Opt::float("scale")
                .short('s')
                .default_val(1.0f32)
                .description("Scale applied to recorded values."),
        )
}

fn write_dump<W: Write>(out: &mut W, table: &OptionTable, config: &DumpConfig) -> io::Result<()> {
    for opt in table.options() {
        match opt.value() {
            Some(v) => writeln!(out, "{}={}", opt.long_name(), v)?,
            None => writeln!(out, "{}=<unset>", opt.long_name())?,
        }
    }
    writeln!(
        out,
        "positional={}",
        config.input.as_deref().unwrap_or("<unset>")
    )?;
    writeln!(out, "effective.interval={}", config.interval)?;
    writeln!(out, "effective.scale={}", config.scale)?;
    Ok(())
}

fn run(table: &OptionTable) -> Result<(), DumpError> {
    let config = DumpConfig::from_table(table)?;
    debug!(?config, "configuration");

    match config.output.as_deref() {
        Some(path) => {
            let mut file = File::create(path)?;
            write_dump(&mut file, table, &config)?;
            file.flush()?;
            info!(path, "dump written");
            if config.log {
                write_dump(&mut io::stdout().lock(), table, &config)?;
            }
        }
        None => write_dump(&mut io::stdout().lock(), table, &config)?,
    }

    if let (Some(value), Some(rail)) = (&config.value, &config.rail) {
        info!(value = %value, rail = %rail, "recording selection");
    }
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .compact()
        .init();
}

fn main() -> ExitCode {
    init_tracing();

    let mut table = option_table();
    if let Err(e) = table.parse_env() {
        eprintln!("argdump: {}", e);
        eprint!("{}", USAGE);
        return ExitCode::FAILURE;
    }

    if table.is_set("help") {
        print!("{}", USAGE);
        table.clear();
        return ExitCode::SUCCESS;
    }

    let status = match run(&table) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("argdump: {}", e);
            ExitCode::FAILURE
        }
    };
    table.clear();
    status
}
