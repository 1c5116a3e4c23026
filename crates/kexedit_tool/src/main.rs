// SPDX-License-Identifier: MIT OR Apache-2.0
//! `kexd-tool`: inspect, validate, compare and migrate KexEdit documents.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context as _};
use clap::{Parser, Subcommand};
use kexedit_graph::NodeType;
use kexedit_persistence::legacy::decode_legacy;
use kexedit_persistence::{
    compare, decode, encode, is_kexd, load_document, migrate, override_report, save_document, validate, Decoded,
    FlatDocument, PersistenceConfig,
};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "kexd-tool", version, about)]
struct Cli {
    /// Settings file (RON). Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the structure of a document.
    Analyze {
        /// KEXD or legacy file.
        path: PathBuf,
    },
    /// Check document integrity. Exits 1 on errors.
    Validate {
        /// KEXD or legacy file.
        path: PathBuf,

        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Compare two documents. Exits 1 if they differ.
    Parity {
        /// Reference document.
        left: PathBuf,

        /// Document under test.
        right: PathBuf,

        /// Largest scalar difference still treated as equal.
        #[arg(long)]
        tolerance: Option<f32>,
    },
    /// Convert a legacy file to KEXD.
    Migrate {
        /// Legacy input file.
        legacy: PathBuf,

        /// KEXD output file.
        out: PathBuf,
    },
    /// Print override flags next to the keyframes they guard.
    Overrides {
        /// KEXD or legacy file.
        path: PathBuf,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "kexedit=debug" } else { "kexedit=info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match &cli.config {
        Some(path) => PersistenceConfig::load(path).with_context(|| format!("load config '{}'", path.display()))?,
        None => PersistenceConfig::default(),
    };

    let ok = match cli.cmd {
        Command::Analyze { path } => cmd_analyze(&path, &config)?,
        Command::Validate { path, json } => cmd_validate(&path, json, &config)?,
        Command::Parity {
            left,
            right,
            tolerance,
        } => cmd_parity(&left, &right, tolerance, &config)?,
        Command::Migrate { legacy, out } => cmd_migrate(&legacy, &out, &config)?,
        Command::Overrides { path } => cmd_overrides(&path, &config)?,
    };

    if !ok {
        std::process::exit(1);
    }
    Ok(())
}

fn load(path: &Path, config: &PersistenceConfig) -> anyhow::Result<Decoded> {
    load_document(path, &config.migration).with_context(|| format!("read document '{}'", path.display()))
}

fn print_diagnostics(decoded: &Decoded) {
    for diagnostic in &decoded.diagnostics {
        eprintln!("{diagnostic}");
    }
}

fn cmd_analyze(path: &Path, config: &PersistenceConfig) -> anyhow::Result<bool> {
    let decoded = load(path, config)?;
    print_diagnostics(&decoded);
    let doc = &decoded.document;
    let counts = FlatDocument::from_document(doc).counts();

    println!("{}", path.display());
    println!(
        "  {} nodes, {} ports, {} edges ({} orphan)",
        counts.nodes,
        counts.ports,
        counts.edges,
        doc.graph.orphan_edges().count()
    );
    println!(
        "  {} scalars, {} vectors, {} flags, {} keyframes in {} curves",
        counts.scalars, counts.vectors, counts.flags, counts.keyframes, counts.ranges
    );
    println!(
        "  next ids: node {}, port {}, edge {}",
        counts.next_node_id, counts.next_port_id, counts.next_edge_id
    );

    for node in doc.graph.nodes() {
        let kind = node
            .node_type()
            .map_or_else(|| format!("<type {}>", node.type_code), |t: NodeType| t.to_string());
        let curves = doc.keyframes.keys_for_node(node.id).count();
        println!(
            "  node {:>4} {:<12} in {} out {} curves {} priority {}{}",
            node.id,
            kind,
            doc.graph.inputs(node.id).count(),
            doc.graph.outputs(node.id).count(),
            curves,
            doc.priority(node.id),
            if doc.is_hidden(node.id) { " hidden" } else { "" }
        );
    }

    let order: Vec<String> = doc.build_order().iter().map(ToString::to_string).collect();
    println!("  build order: {}", order.join(" "));
    Ok(true)
}

fn cmd_validate(path: &Path, json: bool, config: &PersistenceConfig) -> anyhow::Result<bool> {
    let decoded = load(path, config)?;
    let report = validate(&decoded.document, &config.validation);

    if json {
        let out = serde_json::json!({
            "path": path.display().to_string(),
            "diagnostics": decoded.diagnostics,
            "findings": report.findings,
            "errors": report.errors().count(),
            "warnings": report.warnings().count(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        print_diagnostics(&decoded);
        println!("{}: {report}", path.display());
    }
    Ok(!report.has_errors())
}

fn cmd_parity(left: &Path, right: &Path, tolerance: Option<f32>, config: &PersistenceConfig) -> anyhow::Result<bool> {
    let tolerance = tolerance.unwrap_or(config.validation.parity_tolerance);
    let left_doc = load(left, config)?;
    let right_doc = load(right, config)?;

    let report = compare(&left_doc.document, &right_doc.document, tolerance);
    println!("{} vs {}: {report}", left.display(), right.display());
    Ok(report.is_equivalent())
}

fn cmd_migrate(legacy: &Path, out: &Path, config: &PersistenceConfig) -> anyhow::Result<bool> {
    let bytes = std::fs::read(legacy).with_context(|| format!("read '{}'", legacy.display()))?;
    if is_kexd(&bytes) {
        bail!("'{}' is already a KEXD file", legacy.display());
    }

    let file = decode_legacy(&bytes).with_context(|| format!("parse legacy file '{}'", legacy.display()))?;
    let version = file.version.number();
    let migrated = migrate(file, &config.migration);
    print_diagnostics(&migrated);

    save_document(out, &migrated.document).with_context(|| format!("write '{}'", out.display()))?;

    // Check the written file against the migrated document
    let reloaded = decode(&encode(&migrated.document)?)?;
    let parity = compare(&migrated.document, &reloaded.document, config.validation.parity_tolerance);
    let report = validate(&reloaded.document, &config.validation);

    println!(
        "{} (legacy v{version}) -> {}: {} anomalies, {report}",
        legacy.display(),
        out.display(),
        migrated.diagnostics.len()
    );
    if !parity.is_equivalent() {
        println!("{parity}");
    }
    Ok(parity.is_equivalent())
}

fn cmd_overrides(path: &Path, config: &PersistenceConfig) -> anyhow::Result<bool> {
    let decoded = load(path, config)?;
    let entries = override_report(&decoded.document);
    if entries.is_empty() {
        println!("{}: no overrides or guarded keyframes", path.display());
        return Ok(true);
    }

    println!("{}", path.display());
    for entry in &entries {
        let kind = entry.node_type.map_or_else(|| "?".to_string(), |t| t.to_string());
        println!(
            "  node {:>4} {:<12} {:<16} {:<5} {:>4} keyframes{}",
            entry.node,
            kind,
            format!("{:?}", entry.property),
            if entry.enabled { "on" } else { "off" },
            entry.keyframes,
            if entry.is_mismatch() { "  MISMATCH" } else { "" }
        );
    }
    Ok(true)
}
