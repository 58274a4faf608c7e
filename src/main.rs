//! Entity Export CLI
//!
//! Extracts entities from submission XML and exports entities as CSV.
//!
//! # Usage
//!
//! ```bash
//! # One JSON entity record per submission
//! entity-export parse fields.json submission1.xml submission2.xml > entities.jsonl
//!
//! # CSV from JSON lines of entity rows (stdin when no file is given)
//! entity-export export properties.json entities.jsonl > entities.csv
//!
//! # Submissions straight to CSV, columns taken from the field descriptors
//! entity-export rows fields.json submission1.xml submission2.xml > entities.csv
//! ```
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Set to `debug` or `trace` to control logging verbosity

use entity_export::config::{load_fields, load_properties, properties_from_fields};
use entity_export::{parse_entity, read_entity_rows, write_entity_csv, EntityError, Result};
use log::debug;
use std::env;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process;

const USAGE: &str = "Usage: entity-export parse <fields.json> <submission.xml>...\n       \
                     entity-export export <properties.json> [<entities.jsonl>]\n       \
                     entity-export rows <fields.json> <submission.xml>...";

/// A parsed command line.
enum Command {
    Parse {
        fields: PathBuf,
        submissions: Vec<PathBuf>,
    },
    Export {
        properties: PathBuf,
        input: Option<PathBuf>,
    },
    Rows {
        fields: PathBuf,
        submissions: Vec<PathBuf>,
    },
}

impl Command {
    fn from_args(args: &[String]) -> Result<Self> {
        let (name, rest) = args
            .split_first()
            .ok_or_else(|| usage("Missing command"))?;
        let (config, inputs) = rest
            .split_first()
            .ok_or_else(|| usage("Missing configuration file argument"))?;
        let config = PathBuf::from(config);
        let inputs: Vec<PathBuf> = inputs.iter().map(PathBuf::from).collect();

        match name.as_str() {
            "parse" | "rows" if inputs.is_empty() => {
                Err(usage("Missing submission file argument"))
            }
            "parse" => Ok(Command::Parse {
                fields: config,
                submissions: inputs,
            }),
            "rows" => Ok(Command::Rows {
                fields: config,
                submissions: inputs,
            }),
            "export" if inputs.len() > 1 => Err(usage("Too many input files")),
            "export" => Ok(Command::Export {
                properties: config,
                input: inputs.into_iter().next(),
            }),
            other => Err(usage(&format!("Unknown command '{}'", other))),
        }
    }
}

fn usage(message: &str) -> EntityError {
    EntityError::Usage(format!("{}.\n{}", message, USAGE))
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    let command = Command::from_args(&args)?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    match command {
        Command::Parse {
            fields,
            submissions,
        } => {
            let fields = load_fields(&fields)?;
            for path in &submissions {
                let entity = parse_entity(&fields, open(path)?)?;
                serde_json::to_writer(&mut out, &entity)?;
                writeln!(out)?;
            }
            debug!("Parsed {} submissions", submissions.len());
        }
        Command::Export { properties, input } => {
            let properties = load_properties(&properties)?;
            match input {
                Some(path) => {
                    write_entity_csv(&properties, read_entity_rows(open(&path)?), &mut out)?;
                }
                None => {
                    let stdin = io::stdin();
                    write_entity_csv(&properties, read_entity_rows(stdin.lock()), &mut out)?;
                }
            }
        }
        Command::Rows {
            fields,
            submissions,
        } => {
            let fields = load_fields(&fields)?;
            let properties = properties_from_fields(&fields);
            let rows = submissions
                .iter()
                .map(|path| parse_entity(&fields, open(path)?)?.into_row());
            write_entity_csv(&properties, rows, &mut out)?;
        }
    }

    out.flush()?;
    Ok(())
}

fn open(path: &Path) -> Result<BufReader<File>> {
    Ok(BufReader::new(File::open(path)?))
}
