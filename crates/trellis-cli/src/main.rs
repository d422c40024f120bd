//! Trellis CLI - Command-line interface for Trellis
//!
//! This is the entry point for operators running the ingestion pipeline.
//! It provides commands for building the merged graph from parser
//! fragments, loading it into the store, replaying a snapshot, migrating
//! the store schema, and running scoped ad hoc queries.

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "trellis")]
#[command(author = "Trellis Contributors")]
#[command(version)]
#[command(about = "Code-graph ingestion for shared graph stores", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Graph store connection parameters.
#[derive(Args, Clone)]
struct StoreArgs {
    /// Store connection URI
    #[arg(long, env = "NEO4J_URI", default_value = "bolt://localhost:7687")]
    uri: String,

    /// Store user
    #[arg(long, env = "NEO4J_USER", default_value = "neo4j")]
    user: String,

    /// Store password
    #[arg(long, env = "NEO4J_PASSWORD")]
    password: String,

    /// Named database (server default when omitted)
    #[arg(long, env = "NEO4J_DATABASE")]
    database: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the merged graph and load it into the store
    Load {
        /// Fragment JSON file, or a directory of fragment files
        fragments: PathBuf,

        /// Codebase id the run belongs to
        #[arg(short, long)]
        codebase: String,

        /// Directory for the snapshot checkpoint
        #[arg(short, long)]
        output: PathBuf,

        /// Entities per import batch
        #[arg(long, default_value_t = trellis_store::DEFAULT_BATCH_SIZE)]
        batch_size: usize,

        /// Skip the soft referential validation gate
        #[arg(long)]
        skip_soft_validation: bool,

        /// Treat dangling references as fatal
        #[arg(long)]
        strict_references: bool,

        /// Project root used to probe import targets on disk
        #[arg(long)]
        project_root: Option<PathBuf>,

        /// Run pending schema migrations before importing
        #[arg(long)]
        auto_migrate: bool,

        /// Export a backup before migrating
        #[arg(long)]
        backup: bool,

        #[command(flatten)]
        store: StoreArgs,
    },

    /// Build the merged graph and write the snapshot only
    Build {
        /// Fragment JSON file, or a directory of fragment files
        fragments: PathBuf,

        /// Codebase id the run belongs to
        #[arg(short, long)]
        codebase: String,

        /// Directory for the snapshot checkpoint
        #[arg(short, long)]
        output: PathBuf,

        /// Skip the soft referential validation gate
        #[arg(long)]
        skip_soft_validation: bool,

        /// Treat dangling references as fatal
        #[arg(long)]
        strict_references: bool,

        /// Project root used to probe import targets on disk
        #[arg(long)]
        project_root: Option<PathBuf>,
    },

    /// Re-run the persistence stage from a snapshot checkpoint
    Replay {
        /// Directory holding nodes.json and relationships.json
        #[arg(short, long)]
        output: PathBuf,

        /// Codebase id the snapshot belongs to
        #[arg(short, long)]
        codebase: String,

        /// Entities per import batch
        #[arg(long, default_value_t = trellis_store::DEFAULT_BATCH_SIZE)]
        batch_size: usize,

        /// Run pending schema migrations before importing
        #[arg(long)]
        auto_migrate: bool,

        /// Export a backup before migrating
        #[arg(long)]
        backup: bool,

        #[command(flatten)]
        store: StoreArgs,
    },

    /// Migrate stale schema versions in the store
    Migrate {
        /// Export a backup before migrating
        #[arg(long)]
        backup: bool,

        /// Directory for the backup export
        #[arg(long, default_value = "trellis-backup")]
        backup_dir: PathBuf,

        #[command(flatten)]
        store: StoreArgs,
    },

    /// Run an ad hoc query scoped to one codebase
    Query {
        /// The query to run
        query: String,

        /// Codebase id to scope to
        #[arg(short, long)]
        codebase: String,

        /// Bypass scoping and query every codebase (privileged)
        #[arg(long)]
        cross_codebase: bool,

        #[command(flatten)]
        store: StoreArgs,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(tracing_subscriber::EnvFilter::new(filter))
        .init();

    let result = match cli.command {
        Commands::Load {
            fragments,
            codebase,
            output,
            batch_size,
            skip_soft_validation,
            strict_references,
            project_root,
            auto_migrate,
            backup,
            store,
        } => {
            commands::load(commands::LoadParams {
                fragments,
                codebase,
                output,
                batch_size,
                skip_soft_validation,
                strict_references,
                project_root,
                auto_migrate,
                backup,
                store: store.into(),
            })
            .await
        }
        Commands::Build {
            fragments,
            codebase,
            output,
            skip_soft_validation,
            strict_references,
            project_root,
        } => commands::build(
            &fragments,
            &codebase,
            &output,
            skip_soft_validation,
            strict_references,
            project_root,
        )
        .map(|_| ()),
        Commands::Replay {
            output,
            codebase,
            batch_size,
            auto_migrate,
            backup,
            store,
        } => {
            commands::replay(
                &output,
                &codebase,
                batch_size,
                auto_migrate,
                backup,
                store.into(),
            )
            .await
        }
        Commands::Migrate {
            backup,
            backup_dir,
            store,
        } => commands::migrate(backup, &backup_dir, store.into()).await,
        Commands::Query {
            query,
            codebase,
            cross_codebase,
            store,
        } => commands::query(&query, &codebase, cross_codebase, store.into()).await,
    };

    if let Err(e) = result {
        eprintln!("{} {}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}

impl From<StoreArgs> for trellis_store::StoreConfig {
    fn from(args: StoreArgs) -> Self {
        let mut config = trellis_store::StoreConfig::new(args.uri, args.user, args.password);
        if let Some(database) = args.database {
            config = config.with_database(database);
        }
        config
    }
}
