use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use chartdoc::{
    FsStore, MemorySurface, Panel, PanelConfig, PanelSource, StoreDocument,
};
use clap::{Parser, Subcommand};
use eyre::{Result, WrapErr};
use futures::executor::block_on;
use serde_json::{json, Value};

#[derive(Parser, Debug)]
#[clap(name = "chartdoc", about, version)]
struct Args {
    /// Increase output logging verbosity.
    #[clap(short, long)]
    verbose: bool,

    /// Panel configuration file (JSON or YAML).
    #[clap(short, long)]
    config: Option<PathBuf>,

    /// Host of the runtime serving the documents. References to any other
    /// host are left for the rendering surface to fetch.
    #[clap(long)]
    host: Option<String>,

    /// Root directory of the document store.
    #[clap(short, long, default_value = ".")]
    root: PathBuf,

    /// Override a rendering surface option. Values are parsed as JSON and
    /// fall back to plain strings.
    #[clap(long = "set", value_name = "KEY=VALUE", parse(try_from_str = parse_override))]
    overrides: Vec<(String, Value)>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the data and specification the rendering surface would receive
    /// for each document matching the given patterns.
    Resolve { patterns: Vec<String> },
    /// Load a chart document and save it back in canonical form.
    Save { document: PathBuf },
    /// Export a document as a new chart document next to it.
    Export { document: PathBuf, name: String },
    /// Print a notebook cell that recreates the chart.
    Copy { document: PathBuf },
}

fn main() {
    let args = Args::parse();
    simple_logger::init_with_level(if args.verbose {
        log::Level::Debug
    } else {
        log::Level::Info
    })
    .unwrap();

    match run(&args) {
        Ok(_) => log::info!("Success!"),
        Err(e) => log::error!("Failed: {:?}", e),
    }
}

fn run(args: &Args) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => PanelConfig::load_from_file(path)?,
        None => PanelConfig::default(),
    };
    if let Some(host) = &args.host {
        config = config.with_host(host);
    }
    for (key, value) in &args.overrides {
        if let Some(prev) = config.surface.set(key, value)? {
            log::debug!("Overriding surface option {} (was {})", key, prev);
        }
    }
    let store = Arc::new(FsStore::new(&args.root));

    match &args.command {
        Command::Resolve { patterns } => {
            let patterns = if patterns.is_empty() {
                vec!["*.vl.json".to_string()]
            } else {
                patterns.clone()
            };
            for document in find_documents(&args.root, &patterns)? {
                resolve(store.clone(), &config, &document)?;
            }
        }
        Command::Save { document } => {
            let panel = open(store, &config, document)?;
            block_on(panel.save())?;
        }
        Command::Export { document, name } => {
            let panel = open(store, &config, document)?;
            let path = block_on(panel.export(name))?;
            println!("{}", path.display());
        }
        Command::Copy { document } => {
            let panel = open(store, &config, document)?;
            let payload = panel.copy_cell()?;
            println!("{}", serde_json::to_string_pretty(&payload.to_value()?)?);
        }
    }
    Ok(())
}

fn open(store: Arc<FsStore>, config: &PanelConfig, document: &Path) -> Result<Panel> {
    let doc = StoreDocument::new(store.clone(), document);
    let mut panel = Panel::new(
        PanelSource::Document(Arc::new(doc)),
        store,
        Arc::new(MemorySurface::default()),
        config.clone(),
    );
    block_on(panel.open()).wrap_err_with(|| format!("failed to open {}", document.display()))?;
    Ok(panel)
}

fn resolve(store: Arc<FsStore>, config: &PanelConfig, document: &Path) -> Result<()> {
    let panel = open(store, config, document)?;
    let output = json!({
        "document": document.display().to_string(),
        "data": panel.data().map(|d| d.to_value()),
        "spec": panel.spec(),
        "surface": Value::from(panel.config().surface.clone()),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn parse_override(s: &str) -> Result<(String, Value), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got \"{}\"", s))?;
    if key.is_empty() {
        return Err(format!("missing option name in \"{}\"", s));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

// Returns the store-relative paths of all files under `root` matching the
// given patterns.
fn find_documents(root: &Path, patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut documents = Vec::new();
    for pattern in patterns {
        let full_pattern = root.join(pattern);
        let full_pattern = full_pattern.to_string_lossy();
        for entry_result in glob::glob(&full_pattern)
            .wrap_err_with(|| format!("invalid document pattern \"{}\"", pattern))?
        {
            let entry = entry_result?;
            if entry.is_file() {
                let relative = entry.strip_prefix(root).unwrap_or(&entry).to_path_buf();
                documents.push(relative);
            }
        }
    }
    if documents.is_empty() {
        log::warn!("No documents matched {:?}", patterns);
    }
    Ok(documents)
}
