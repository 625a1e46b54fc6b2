use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::Parser;
use cuefix::export;
use cuefix::export::ExportMode;
use cuefix::BatchSummary;
use cuefix::Detect;
use cuefix::EncodingSelection;
use cuefix::ExportError;
use cuefix::FixOptions;
use cuefix::FixStatus;
use cuefix::FixedRecord;
use cuefix::Fixer;
use cuefix::NormalizeError;
use cuefix::RawDocument;
use cuefix::CANDIDATES;
use log::error;
use log::info;
use log::warn;
use serde::Serialize;
use thiserror::Error;
use walkdir::WalkDir;

/// Repair mis-decoded CUE sheets and re-emit them as UTF-8 with a BOM.
#[derive(Parser, Debug)]
#[command(name = "cuefix", version, about)]
struct Cli {
    /// CUE/TXT files or folders to scan recursively.
    inputs: Vec<PathBuf>,

    /// `auto` or one of the candidate labels (see --list-encodings).
    #[arg(long, short, env = "CUEFIX_ENCODING", default_value = "auto")]
    encoding: EncodingSelection,

    /// Convert Traditional Chinese to Simplified.
    #[arg(long, env = "CUEFIX_SIMPLIFY")]
    simplify: bool,

    #[arg(long, short, default_value = "fixed")]
    out_dir: PathBuf,

    /// Always pack output into one zip archive.
    #[arg(long, conflicts_with = "tree")]
    archive: bool,

    /// Write files under their original relative paths instead of zipping.
    #[arg(long)]
    tree: bool,

    /// Write a JSON report of every record to this path.
    #[arg(long)]
    report: Option<PathBuf>,

    #[arg(long)]
    list_encodings: bool,

    /// Ask a remote model for the encoding before local trials.
    #[cfg(feature = "remote")]
    #[arg(long, requires = "api_key")]
    remote: bool,

    #[cfg(feature = "remote")]
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    #[cfg(feature = "remote")]
    #[arg(long, default_value = cuefix::remote::DEFAULT_MODEL)]
    model: String,
}

#[derive(Debug, Error)]
enum CliError {
    #[error("no input files given")]
    NoInputs,
    #[cfg(not(feature = "opencc"))]
    #[error("--simplify needs the `opencc` feature")]
    SimplifyUnavailable,
    #[error(transparent)]
    Normalize(#[from] NormalizeError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error("failed to write report: {0}")]
    Report(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[cfg(feature = "remote")]
    #[error(transparent)]
    Remote(#[from] cuefix::RemoteError),
}

#[derive(Serialize)]
struct Report<'a> {
    options: &'a FixOptions,
    summary: BatchSummary,
    records: &'a [FixedRecord],
}

fn collect(inputs: &[PathBuf]) -> Vec<FixedRecord> {
    let mut records = Vec::new();
    for input in inputs {
        let (root, paths): (&Path, Vec<PathBuf>) = if input.is_dir() {
            let paths = WalkDir::new(input)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|entry| match entry {
                    Ok(entry) => Some(entry),
                    Err(e) => {
                        warn!("{}", e);
                        None
                    }
                })
                .filter(|entry| entry.file_type().is_file() && cuefix::is_index_file(entry.path()))
                .map(|entry| entry.into_path())
                .collect();
            // Relative paths start at the folder's own name.
            let root = match input.file_name() {
                Some(_) => input.parent().unwrap_or_else(|| input.as_path()),
                None => input.as_path(),
            };
            (root, paths)
        } else {
            (input.parent().unwrap_or_else(|| Path::new("")), vec![input.clone()])
        };
        for path in paths {
            match RawDocument::read(root, &path) {
                Ok(raw) => records.push(FixedRecord::ingest(Arc::new(raw))),
                Err(e) => error!("{}: {}", path.display(), e),
            }
        }
    }
    records
}

fn fix<D: Detect + Sync>(
    fixer: &Fixer<D>,
    records: &mut [FixedRecord],
    selection: EncodingSelection,
) -> BatchSummary {
    if selection == EncodingSelection::Auto {
        return fixer.fix_all(records);
    }
    let mut summary = BatchSummary::default();
    for record in records.iter_mut() {
        match fixer.fix(record, selection) {
            Ok(()) => {
                summary.fixed += 1;
                if record.possibly_garbled() {
                    summary.flagged += 1;
                }
            }
            Err(e) => {
                error!("{}: {}", record.raw().relative_path().display(), e);
                summary.failed += 1;
            }
        }
    }
    summary
}

fn run(cli: Cli) -> Result<(), CliError> {
    if cli.list_encodings {
        for candidate in CANDIDATES.iter() {
            println!("{:<14}{}", candidate.label, candidate.display_name);
        }
        return Ok(());
    }
    if cli.inputs.is_empty() {
        return Err(CliError::NoInputs);
    }

    let mut records = collect(&cli.inputs);
    if records.is_empty() {
        return Err(CliError::NoInputs);
    }
    info!("{} files ready", records.len());
    let options = FixOptions {
        encoding: cli.encoding,
        simplify: cli.simplify,
    };

    #[cfg(feature = "remote")]
    let summary = if cli.remote {
        let mut config = cuefix::remote::RemoteConfig::new(cli.api_key.clone().unwrap_or_default());
        config.model = cli.model.clone();
        let detector = cuefix::remote::GeminiDetector::new(config)?;
        fix(&with_normalizer(Fixer::with_detector(detector), options.simplify)?, &mut records, options.encoding)
    } else {
        fix(&with_normalizer(Fixer::new(), options.simplify)?, &mut records, options.encoding)
    };
    #[cfg(not(feature = "remote"))]
    let summary = fix(&with_normalizer(Fixer::new(), options.simplify)?, &mut records, options.encoding);

    for record in records.iter() {
        let path = record.raw().relative_path().display();
        match record.status() {
            FixStatus::Fixed if record.possibly_garbled() => warn!(
                "{}: possibly still garbled as {}, retry with --encoding <label>",
                path,
                record.detection().map_or("?", |d| d.encoding)
            ),
            FixStatus::Fixed => {
                info!("{}: {} -> utf-8", path, record.detection().map_or("?", |d| d.encoding))
            }
            FixStatus::Error => error!("{}: {}", path, record.error().unwrap_or("unknown error")),
            FixStatus::Pending | FixStatus::Processing => {}
        }
    }

    let mode = if cli.archive {
        ExportMode::Archive
    } else if cli.tree {
        ExportMode::Tree
    } else {
        ExportMode::Auto
    };
    let exported = export::export(&records, &cli.out_dir, mode)?;
    info!("{:?}", exported);

    if let Some(path) = cli.report {
        let file = fs::File::create(path)?;
        serde_json::to_writer_pretty(
            file,
            &Report {
                options: &options,
                summary,
                records: &records,
            },
        )?;
    }
    Ok(())
}

#[cfg(feature = "opencc")]
fn with_normalizer<D: Detect>(fixer: Fixer<D>, simplify: bool) -> Result<Fixer<D>, CliError> {
    if simplify {
        Ok(fixer.normalizer(Box::new(cuefix::normalize::Simplifier::load()?)))
    } else {
        Ok(fixer)
    }
}

#[cfg(not(feature = "opencc"))]
fn with_normalizer<D: Detect>(fixer: Fixer<D>, simplify: bool) -> Result<Fixer<D>, CliError> {
    if simplify {
        Err(CliError::SimplifyUnavailable)
    } else {
        Ok(fixer)
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Err(e) = run(Cli::parse()) {
        error!("{}", e);
        process::exit(1);
    }
}
