use anyhow::{Context as AnyhowContext, Result};
use clap::{Args, Parser, Subcommand};
use devagent_code_chunker::ChunkType;
use devagent_indexer::{ContextEngine, DevAgentConfig};
use std::path::PathBuf;

mod render;

#[derive(Parser)]
#[command(name = "devagent")]
#[command(about = "Index a codebase and retrieve relevant context for it", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(long, global = true)]
    quiet: bool,

    /// Project directory (defaults to current directory)
    #[arg(short, long, global = true, default_value = ".")]
    project: PathBuf,

    /// Config file (defaults to <project>/.devagent/config.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print machine-readable JSON on stdout (implies --quiet)
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Index every source file of the project
    Index(IndexArgs),

    /// Re-index changed files (all detected changes, or only the given files)
    Update(UpdateArgs),

    /// Search indexed chunks for a query
    Query(QueryArgs),

    /// Chunks around a named function in one file
    Function(FunctionArgs),

    /// Functions related to a named function
    Related(RelatedArgs),

    /// Existing tests to use as style examples
    Tests(LimitArgs),

    /// Every indexed chunk of one file
    File(FileArgs),

    /// List indexed files
    Files,

    /// Show index statistics
    Stats,
}

#[derive(Args)]
struct IndexArgs {
    /// Discard the existing index and manifest first
    #[arg(long)]
    force: bool,
}

#[derive(Args)]
struct UpdateArgs {
    /// Files to re-index (absolute or project-relative)
    files: Vec<PathBuf>,
}

#[derive(Args)]
struct QueryArgs {
    /// Free-text query
    query: String,

    /// Number of results (defaults to performance.retrieval_top_k)
    #[arg(short = 'k', long)]
    limit: Option<usize>,

    /// Only chunks of this file
    #[arg(long)]
    file: Option<PathBuf>,

    /// Only chunks of this type (function, class, file, text)
    #[arg(long = "type")]
    chunk_type: Option<ChunkType>,

    /// Embed the query through the index instead of the engine
    #[arg(long, conflicts_with_all = ["file", "chunk_type"])]
    raw: bool,
}

#[derive(Args)]
struct FunctionArgs {
    file: PathBuf,
    name: String,

    #[arg(short = 'k', long)]
    limit: Option<usize>,
}

#[derive(Args)]
struct RelatedArgs {
    name: String,

    #[arg(short = 'k', long)]
    limit: Option<usize>,
}

#[derive(Args)]
struct LimitArgs {
    #[arg(short = 'k', long)]
    limit: Option<usize>,
}

#[derive(Args)]
struct FileArgs {
    path: PathBuf,
}

fn main() -> Result<()> {
    let mut cli = Cli::parse();

    // Keep stdout clean for JSON parsing
    if cli.json {
        cli.quiet = true;
    }

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    let mut engine = open_engine(&cli)?;
    let top_k = engine.config().performance.retrieval_top_k;

    match cli.command {
        Commands::Index(args) => {
            let report = engine
                .index_codebase(args.force)
                .context("Indexing failed")?;
            render::report(&report, cli.json)
        }
        Commands::Update(args) => {
            let files = (!args.files.is_empty()).then_some(args.files.as_slice());
            let report = engine.update_index(files).context("Update failed")?;
            render::report(&report, cli.json)
        }
        Commands::Query(args) => {
            let k = args.limit.unwrap_or(top_k);
            let hits = if args.raw {
                engine.search_by_text(&args.query, k)
            } else {
                engine.get_relevant_context(&args.query, k, args.file.as_deref(), args.chunk_type)
            };
            render::hits(hits.context("Search failed")?, cli.json)
        }
        Commands::Function(args) => {
            let hits = engine
                .get_function_context(&args.file, &args.name, args.limit.unwrap_or(top_k))
                .with_context(|| format!("Failed to get context for {}", args.name))?;
            render::hits(hits, cli.json)
        }
        Commands::Related(args) => {
            let hits = engine
                .get_related_functions(&args.name, args.limit.unwrap_or(top_k))
                .context("Search failed")?;
            render::hits(hits, cli.json)
        }
        Commands::Tests(args) => {
            let hits = engine
                .get_test_patterns(args.limit.unwrap_or(top_k))
                .context("Search failed")?;
            render::hits(hits, cli.json)
        }
        Commands::File(args) => {
            let chunks = engine
                .get_file_context(&args.path)
                .with_context(|| format!("Failed to read chunks of {}", args.path.display()))?;
            render::chunks(chunks, cli.json)
        }
        Commands::Files => render::files(&engine.list_files(), cli.json),
        Commands::Stats => render::stats(&engine.stats(), cli.json),
    }
}

fn open_engine(cli: &Cli) -> Result<ContextEngine> {
    let root = cli
        .project
        .canonicalize()
        .with_context(|| format!("Invalid project path {}", cli.project.display()))?;
    let config = DevAgentConfig::load(&root, cli.config.as_deref())
        .context("Failed to load configuration")?;
    let embedder = config
        .embedding
        .build_provider()
        .context("Failed to create embedding provider")?;
    ContextEngine::new(&root, config, embedder).context("Failed to open the context index")
}
