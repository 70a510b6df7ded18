//! `srm` command-line front end.
//!
//! # Responsibility
//! - Map subcommands onto `SrmSession` operations over the local snapshot.
//! - Ask for confirmation on stdin before cross-revision imports.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use log::warn;
use srm_core::db::open_db;
use srm_core::{
    init_logging, source_for_location, CatalogLoader, CatalogStatus, EntryPatch, ImportOutcome,
    ReportSink, Responsibility, Revision, RevisionMismatch, SqliteSnapshotRepository, SrmConfig,
    SrmSession, TextReportSink,
};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "srm", version, about = "NIST SP 800-171 shared responsibility matrix")]
struct Cli {
    /// Directory holding the snapshot database and logs.
    #[arg(long, default_value = ".srm")]
    data_dir: PathBuf,
    /// Catalog directory or http(s) base URL; defaults to `<data-dir>/catalog`.
    #[arg(long)]
    catalog: Option<String>,
    #[arg(long)]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the active revision, or switch to another one.
    Revision { revision: Option<Revision> },
    /// Print the effective entry of an objective.
    Get { objective_id: String },
    /// Update responsibility and/or implementation of an objective.
    Set {
        objective_id: String,
        #[arg(long)]
        responsibility: Option<Responsibility>,
        #[arg(long)]
        implementation: Option<String>,
    },
    /// Clear every entry; the revision is kept.
    Reset,
    /// Per-family responsibility percentages.
    Stats {
        /// Only show one family (e.g. `03.01`).
        #[arg(long)]
        family: Option<String>,
    },
    /// Tabular report of every objective.
    Report {
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long, conflicts_with = "no_implementation")]
        implementation: bool,
        #[arg(long)]
        no_implementation: bool,
    },
    /// Write the export document.
    Export {
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Replace all entries from an export or legacy file.
    Import {
        path: PathBuf,
        /// Accept a revision switch without asking.
        #[arg(long)]
        yes: bool,
    },
    /// Implementation tips for a control label (e.g. `AC.L2-3.1.1`).
    Tips { control_label: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = build_config(&cli)?;

    init_logging(&config.log_level, config.log_dir()).map_err(anyhow::Error::msg)?;

    let mut conn = open_db(config.db_path())
        .with_context(|| format!("opening {}", config.db_path().display()))?;
    let store = srm_core::AnnotationStore::open(SqliteSnapshotRepository::new(&mut conn))?;
    let source = source_for_location(&config.catalog_location)?;
    let loader = Arc::new(CatalogLoader::from_shared(Arc::from(source)));
    let mut session = SrmSession::new(store, loader);

    match cli.command {
        Command::Revision { revision: None } => {
            println!("revision={}", session.revision());
        }
        Command::Revision {
            revision: Some(revision),
        } => {
            let loaded = session.switch_revision(revision).await?;
            println!(
                "revision={} objectives={}",
                loaded.revision,
                loaded.catalog.objective_count()
            );
        }
        Command::Get { objective_id } => {
            let entry = session.get_entry(&objective_id);
            println!("objective={objective_id}");
            println!("responsibility={}", entry.responsibility);
            println!("implementation={}", entry.implementation);
        }
        Command::Set {
            objective_id,
            responsibility,
            implementation,
        } => {
            let patch = EntryPatch {
                responsibility,
                implementation,
            };
            if patch.is_empty() {
                bail!("nothing to set; pass --responsibility and/or --implementation");
            }
            session.set_entry(&objective_id, patch)?;
            println!(
                "updated objective={} responsibility={}",
                objective_id,
                session.get_entry(&objective_id).responsibility
            );
        }
        Command::Reset => {
            session.reset()?;
            println!("reset revision={}", session.revision());
        }
        Command::Stats { family } => {
            session.start().await?;
            if let Some(id) = &family {
                let catalog = session
                    .active_catalog()
                    .context("catalog not loaded")?;
                let found = catalog
                    .family(id)
                    .with_context(|| format!("no family `{id}` in {}", session.revision()))?;
                println!("{} {}", found.id, found.title);
            }
            let graph = session.graph()?;
            println!("NIST SP 800-171 {}", graph.revision_label);
            let columns: Vec<String> = Responsibility::ALL
                .iter()
                .map(|responsibility| format!("{responsibility}%"))
                .collect();
            println!("family\t{}\ttotal", columns.join("\t"));
            for stat in graph
                .stats
                .iter()
                .filter(|stat| family.as_deref().map_or(true, |id| stat.id == id))
            {
                let cells: Vec<String> = Responsibility::ALL
                    .iter()
                    .map(|responsibility| format!("{:.1}", stat.pct(*responsibility)))
                    .collect();
                println!("{}\t{}\t{}", stat.short_id(), cells.join("\t"), stat.total);
            }
        }
        Command::Report {
            out,
            implementation,
            no_implementation,
        } => {
            if implementation || no_implementation {
                session.set_include_implementation(implementation)?;
            }
            session.start().await?;
            let report = session.report(None)?;
            match out {
                Some(path) => {
                    let file = std::fs::File::create(&path)
                        .with_context(|| format!("creating {}", path.display()))?;
                    TextReportSink::new(io::BufWriter::new(file)).write_report(&report)?;
                    println!("wrote {} rows to {}", report.rows.len(), path.display());
                }
                None => TextReportSink::new(io::stdout().lock()).write_report(&report)?,
            }
        }
        Command::Export { out } => {
            session.start().await?;
            let document = session.export(Utc::now())?;
            let path = out.unwrap_or_else(|| PathBuf::from(document.file_name()));
            std::fs::write(&path, document.to_json_pretty()?)
                .with_context(|| format!("writing {}", path.display()))?;
            println!(
                "exported {} entries to {}",
                document.entries.len(),
                path.display()
            );
        }
        Command::Import { path, yes } => {
            let bytes =
                std::fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
            let outcome = session
                .import(&bytes, |mismatch| yes || confirm_on_stdin(mismatch))
                .await?;
            match outcome {
                ImportOutcome::Applied {
                    revision,
                    entry_count,
                    ..
                } => {
                    println!("imported {entry_count} entries revision={revision}");
                    if let CatalogStatus::LoadFailed { reason, .. } = session.catalog_status() {
                        println!("catalog reload failed: {reason}");
                    }
                }
                ImportOutcome::Declined(_) => println!("import cancelled"),
            }
        }
        Command::Tips { control_label } => {
            if let Err(err) = session.start().await {
                warn!(
                    "event=cli_tips module=cli status=degraded error={}",
                    err
                );
            }
            match session.tips_for(&control_label) {
                Some(tips) => {
                    if !tips.implementation_tips.trim().is_empty() {
                        println!("{}", tips.implementation_tips);
                    }
                    for artifact in &tips.evidence_artifacts {
                        println!("- {artifact}");
                    }
                }
                None => println!("no tips for {control_label}"),
            }
        }
    }

    Ok(())
}

fn build_config(cli: &Cli) -> Result<SrmConfig> {
    let mut config = SrmConfig::new(absolute(&cli.data_dir)?);
    std::fs::create_dir_all(config.data_dir())
        .with_context(|| format!("creating data dir {}", config.data_dir().display()))?;

    if let Some(location) = &cli.catalog {
        config = config.with_catalog_location(location.clone());
    }
    if let Some(level) = &cli.log_level {
        config = config.with_log_level(level.clone());
    }
    Ok(config)
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Ok(std::env::current_dir()?.join(path))
}

fn confirm_on_stdin(mismatch: &RevisionMismatch) -> bool {
    print!("{} [y/N] ", mismatch.prompt());
    if io::stdout().flush().is_err() {
        return false;
    }
    let mut answer = String::new();
    if io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
