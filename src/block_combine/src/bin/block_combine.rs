use std::path::PathBuf;

use anyhow::Result;
use block_combine::catalog::ReloadOptions;
use block_combine::combine::CancelToken;
use block_combine::config::Settings;
use block_combine::{BlockCombine, Outcome};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about = "Block catalog and triplet overlap engine")]
struct Cli {
    /// Settings file (TOML). Environment variables override it.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Catalog reload and membership edits.
    Catalog(CatalogCmd),
    /// List blocks with member counts.
    Blocks,
    /// Working-set edits.
    WorkingSet(WorkingSetCmd),
    /// Compute the best block triplets and store them.
    Compute {
        #[arg(long)]
        top_n: Option<usize>,
    },
    /// Print the stored results.
    Results,
    /// Write stored results as custom-block files.
    Export {
        #[arg(long, value_name = "DIR")]
        dir: Option<PathBuf>,
    },
    /// Counts and last computation state.
    Status,
}

#[derive(Args)]
struct CatalogCmd {
    #[command(subcommand)]
    sub: CatalogSub,
}

#[derive(Subcommand)]
enum CatalogSub {
    /// Replace the catalog from a TOML or JSON file.
    Reload {
        #[arg(long, value_name = "FILE")]
        file: PathBuf,
        /// Merge into the existing catalog instead of replacing it.
        #[arg(long)]
        no_clear: bool,
    },
    /// Add stocks (`<region><code>` per line) to an existing block.
    Extend {
        code: String,
        #[arg(long, value_name = "FILE")]
        file: PathBuf,
    },
}

#[derive(Args)]
struct WorkingSetCmd {
    #[command(subcommand)]
    sub: WorkingSetSub,
}

#[derive(Subcommand)]
enum WorkingSetSub {
    /// Replace the working set with the block codes in a file.
    Import {
        #[arg(long, value_name = "FILE")]
        file: PathBuf,
    },
    /// Add or refresh one block code.
    Add { code: String },
    /// Remove one block code.
    Remove { code: String },
    /// Remove every block code.
    Clear,
    /// List the working set.
    List,
}

/// Render an operation result as a JSON [`Outcome`]. Returns whether it succeeded.
fn print<T: Serialize>(result: block_combine::Result<T>) -> Result<bool> {
    let outcome = Outcome::from(result);
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(outcome.status.is_ok())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;
    let svc = BlockCombine::open(settings)?;

    let ok = match cli.cmd {
        Cmd::Catalog(CatalogCmd {
            sub: CatalogSub::Reload { file, no_clear },
        }) => print(svc.reload_catalog_file(&file, ReloadOptions { clear: !no_clear }))?,
        Cmd::Catalog(CatalogCmd {
            sub: CatalogSub::Extend { code, file },
        }) => print(svc.extend_block_file(&code, &file))?,
        Cmd::Blocks => print(svc.list_blocks())?,
        Cmd::WorkingSet(WorkingSetCmd { sub }) => match sub {
            WorkingSetSub::Import { file } => print(svc.import_working_set_file(&file))?,
            WorkingSetSub::Add { code } => print(svc.insert_working_set_item(&code))?,
            WorkingSetSub::Remove { code } => print(svc.remove_working_set_item(&code))?,
            WorkingSetSub::Clear => print(svc.clear_working_set())?,
            WorkingSetSub::List => print(svc.list_working_set())?,
        },
        Cmd::Compute { top_n } => print(svc.compute_top_combinations(top_n, &CancelToken::new()))?,
        Cmd::Results => print(svc.load_results())?,
        Cmd::Export { dir } => print(svc.export_results(dir.as_deref()))?,
        Cmd::Status => print(svc.get_status())?,
    };

    if !ok {
        std::process::exit(1);
    }
    Ok(())
}
