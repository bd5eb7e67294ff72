//! # biodb
//!
//! Management commands for the biomedical sample database: bulk ingestion,
//! derived view maintenance, QC annotation, blob pruning and export.
//!
//! ```bash
//! biodb ingest --meta meta.xlsx --measurements spectra.csv --center "Test Center"
//! biodb update-view full_patient --check --limit 10
//! biodb export --sql "select * from full_patient" --out export.tar.gz --include-data
//! ```

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

use biodb::config::{IndexColumn, Settings};
use biodb::db::{open_database, repository};
use biodb::pipeline::export::export_query;
use biodb::pipeline::import::{ingest, upload_column_names, verify_measurement, FsBlobStore, Upload};
use biodb::pipeline::prune::prune_orphan_blobs;
use biodb::pipeline::qc::{annotate_all, QcRegistry};
use biodb::views::{drop_view, query_view, update_view, UpdateOptions, ViewKind};

/// biodb - biomedical sample and spectral data management
#[derive(Parser)]
#[command(name = "biodb")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Settings file (TOML); defaults to $BIODB_CONFIG, then built-in defaults
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum IndexArg {
    PatientId,
    PatientCid,
}

impl From<IndexArg> for IndexColumn {
    fn from(arg: IndexArg) -> Self {
        match arg {
            IndexArg::PatientId => IndexColumn::PatientId,
            IndexArg::PatientCid => IndexColumn::PatientCid,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a meta-data table and its measurement table
    Ingest {
        #[arg(long, value_name = "FILE")]
        meta: PathBuf,

        #[arg(long, value_name = "FILE")]
        measurements: PathBuf,

        /// Centre id or name
        #[arg(long)]
        center: String,

        /// Validate and stage everything, then roll back
        #[arg(long)]
        dry_run: bool,

        /// Column keying both tables (overrides settings)
        #[arg(long, value_enum)]
        index_column: Option<IndexArg>,

        /// Skip default QC annotators
        #[arg(long)]
        no_annotate: bool,

        /// Link each new visit to the subject's latest visit
        #[arg(long)]
        auto_previous_visit: bool,
    },

    /// Rebuild a view and its dependencies
    UpdateView {
        name: String,

        /// Read the rebuilt view back and fail on error
        #[arg(long)]
        check: bool,

        /// Row bound for the check read
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Drop a view
    DropView {
        name: String,

        #[arg(long)]
        drop_dependencies: bool,
    },

    /// Print a view's rows as JSON
    QueryView {
        name: String,

        #[arg(long)]
        limit: Option<usize>,
    },

    /// Delete blobs no measurement references
    PruneFiles {
        #[arg(long)]
        dry_run: bool,
    },

    /// Run default QC annotators over every measurement
    Annotate {
        /// Re-run annotators that already have a value
        #[arg(long)]
        force: bool,
    },

    /// Check every stored blob against its checksum and point count
    Verify,

    /// List the column names accepted by bulk upload
    Columns {
        /// Only include observables visible to this centre (id or name)
        #[arg(long)]
        center: Option<String>,
    },

    /// Export a read query as CSV, or as .tar.gz with referenced blobs
    Export {
        #[arg(long)]
        sql: String,

        #[arg(long, value_name = "FILE")]
        out: PathBuf,

        #[arg(long)]
        include_data: bool,
    },
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    biodb::init_tracing();

    let settings = Settings::resolve(cli.config.as_deref()).context("Failed to load settings")?;
    let conn = open_database(&settings.database_path).with_context(|| {
        format!("Failed to open database {}", settings.database_path.display())
    })?;
    let store = FsBlobStore::new(&settings.blob_dir);

    match cli.command {
        Commands::Ingest {
            meta,
            measurements,
            center,
            dry_run,
            index_column,
            no_annotate,
            auto_previous_visit,
        } => {
            let Some(center) = repository::find_center(&conn, &center)? else {
                bail!("Center '{center}' does not exist");
            };
            let mut config = settings.ingest.clone();
            if let Some(index) = index_column {
                config.index_column = index.into();
            }
            config.auto_annotate &= !no_annotate;
            config.auto_find_previous_visit |= auto_previous_visit;

            let meta = Upload::from_path(&meta)?;
            let measurements = Upload::from_path(&measurements)?;
            let result = ingest(&conn, &store, &meta, &measurements, &center, &config, dry_run)?;
            print_json(&result)?;
        }

        Commands::UpdateView { name, check, limit } => {
            let kind: ViewKind = name.parse()?;
            let options = UpdateOptions {
                check,
                limit,
                exclusions: settings.view_exclusions.clone(),
            };
            if let Some(rows) = update_view(&conn, kind, &options)? {
                print_json(&rows.records())?;
            }
        }

        Commands::DropView { name, drop_dependencies } => {
            drop_view(&conn, name.parse()?, drop_dependencies)?;
        }

        Commands::QueryView { name, limit } => {
            let rows = query_view(&conn, name.parse()?, limit)?;
            print_json(&rows.records())?;
        }

        Commands::PruneFiles { dry_run } => {
            print_json(&prune_orphan_blobs(&conn, &store, dry_run)?)?;
        }

        Commands::Annotate { force } => {
            let summary = annotate_all(&conn, &store, &QcRegistry::with_builtins(), force)?;
            print_json(&summary)?;
        }

        Commands::Verify => {
            let mut failures = 0;
            for data in repository::list_array_data(&conn)? {
                if let Err(e) = verify_measurement(&store, &data) {
                    failures += 1;
                    println!("{}: {e}", data.data);
                }
            }
            if failures > 0 {
                bail!("{failures} measurement(s) failed verification");
            }
        }

        Commands::Columns { center } => {
            let observables = match center {
                Some(key) => {
                    let Some(center) = repository::find_center(&conn, &key)? else {
                        bail!("Center '{key}' does not exist");
                    };
                    repository::visible_observables(&conn, &center.id)?
                }
                None => repository::list_observables(&conn)?,
            };
            for name in upload_column_names(settings.ingest.index_column.as_str(), &observables) {
                println!("{name}");
            }
        }

        Commands::Export { sql, out, include_data } => {
            print_json(&export_query(&conn, &store, &sql, &out, include_data)?)?;
        }
    }

    Ok(())
}
