// src/main.rs
use clap::Parser;
use marker_relay::pipeline::split_lines;
use marker_relay::utils::{self, AppError};
use marker_relay::{Converter, Passthrough, Pipeline, RuleSet, StorageManager};
use std::io::Write;
use std::path::PathBuf;

/// Convert a document while keeping its custom markers in place
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Source document containing marker lines
    #[arg(short, long)]
    input: PathBuf,

    /// YAML rule file describing sections, collectors and removals
    #[arg(short, long)]
    rules: PathBuf,

    /// Where to write the converted document (stdout if omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Record store path (overrides meta.database from the rules)
    #[arg(long)]
    store: Option<PathBuf>,

    /// Skip the configured converter
    #[arg(long)]
    passthrough: bool,

    /// Reject lines matched by more than one marker pattern
    #[arg(long)]
    strict: bool,

    /// Debug mode - verbose logging and converter snapshots
    #[arg(short, long)]
    debug: bool,
}

impl Args {
    /// Snapshots go next to the output file, or the working directory.
    fn debug_dir(&self) -> PathBuf {
        self.output
            .as_ref()
            .and_then(|p| p.parent())
            .filter(|p| !p.as_os_str().is_empty())
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
            .join("debug")
    }
}

fn main() -> Result<(), AppError> {
    let args = Args::parse();

    // 1. Setup Logging (reads RUST_LOG env var)
    utils::logging::setup_logging(args.debug);
    tracing::info!("Starting processing for args: {:?}", args);

    // 2. Rules, registry and converter
    let rules = RuleSet::load(&args.rules)?;
    let registry = rules.build_registry(args.strict)?;
    let converter: Box<dyn Converter> = if args.passthrough {
        Box::new(Passthrough)
    } else {
        rules.converter()
    };

    // 3. Run the pipeline
    let source = std::fs::read_to_string(&args.input)?;
    let snapshot_dir = args.debug.then(|| args.debug_dir());
    let mut doc = Pipeline::new(&registry)
        .with_snapshot_dir(snapshot_dir)
        .run(split_lines(&source), converter.as_ref())?;

    // 4. Sections, collectors and removal regions
    let report = rules.postprocess(&mut doc);

    // 5. Write the finished document
    let text = doc.text();
    match &args.output {
        Some(path) => {
            std::fs::write(path, &text)?;
            tracing::info!("Wrote {} lines to {}", doc.line_count(), path.display());
        }
        None => std::io::stdout().write_all(text.as_bytes())?,
    }

    // 6. Replace the stored records with every identity that came through cleanly
    if let Some(path) = args.store.clone().or_else(|| rules.meta.database.clone()) {
        let storage = StorageManager::new(&path)?;
        let stored = storage.session(|store| -> Result<usize, AppError> {
            let dropped = store.clear();
            if dropped > 0 {
                tracing::debug!("Dropped {} records from the previous run", dropped);
            }
            let mut count = 0;
            for m in report.persistable(&doc) {
                store.insert(m);
                count += 1;
            }
            Ok(count)
        })?;
        tracing::info!("Stored {} records in {}", stored, path.display());
    }

    tracing::info!(
        "Processing finished. Markers: {}, failed identities: {}",
        doc.matches.len(),
        report.failures.len()
    );

    if !report.is_success() {
        let names: Vec<&str> = report.failures.iter().map(|f| f.identity.as_str()).collect();
        return Err(AppError::Processing(format!(
            "Postprocessing failed for: {}",
            names.join(", ")
        )));
    }

    Ok(())
}
