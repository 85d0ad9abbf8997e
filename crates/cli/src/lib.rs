use anyhow::{Context as AnyhowContext, Result};
use clap::{Args, Parser, Subcommand};
use concord_canon::{
    build_canonicalizer, compact_form, normalize, ConcordConfig, JsonExtractor, ListingPipeline,
    RegistryHandle,
};
use concord_engine::{InMemoryListingStore, MatchService, MatchingEngine};
use concord_protocol::{Listing, RawListing};
use serde::Serialize;
use serde_json::json;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

mod envelope;

pub use envelope::classify_error;

fn print_stdout(text: &str) -> Result<()> {
    use std::io::Write;

    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout
        .write_all(text.as_bytes())
        .and_then(|_| stdout.write_all(b"\n"))
        .and_then(|_| stdout.flush())
    {
        if err.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(err.into());
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    print_stdout(&text)
}

#[derive(Parser)]
#[command(name = "concord")]
#[command(
    about = "Canonicalize marketplace listings and match them semantically",
    long_about = None
)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors (stdout is reserved for JSON)
    #[arg(long, global = true)]
    quiet: bool,

    /// Configuration file (overrides CONCORD_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show how a raw term is cleaned before lookup
    Normalize(NormalizeArgs),

    /// Resolve one term to its canonical concept
    Resolve(ResolveArgs),

    /// Validate and canonicalize a listing draft (JSON text, or '-' for stdin)
    Ingest(IngestArgs),

    /// Evaluate one listing against another
    Match(MatchArgs),

    /// Find every candidate listing the requester is satisfied by
    Find(FindArgs),

    /// Inspect the synonym registry
    #[command(subcommand)]
    Registry(RegistryCommands),

    /// Print the JSON schema of a listing
    Schema,
}

#[derive(Args)]
struct NormalizeArgs {
    term: String,

    /// Attribute the term was given for (e.g. condition, origin)
    #[arg(long)]
    key: Option<String>,
}

#[derive(Args)]
struct ResolveArgs {
    term: String,

    /// Attribute the term was given for
    #[arg(long, default_value = "type")]
    key: String,

    /// Context words steering disambiguation
    #[arg(long, value_delimiter = ',', num_args = 1..)]
    context: Vec<String>,
}

#[derive(Args)]
struct IngestArgs {
    query: String,
}

#[derive(Args)]
struct MatchArgs {
    /// Requester listing draft (path, or '-' for stdin)
    requester: PathBuf,

    /// Candidate listing draft
    candidate: PathBuf,

    /// Print the full gate report instead of the verdict alone
    #[arg(long)]
    explain: bool,
}

#[derive(Args)]
struct FindArgs {
    /// Requester listing draft
    requester: PathBuf,

    /// Candidate listing drafts; ids default to the file stem
    #[arg(required = true)]
    candidates: Vec<PathBuf>,
}

#[derive(Subcommand)]
enum RegistryCommands {
    /// Dump every alias binding and recorded concept
    Show,

    /// Look up the concept an alias is bound to
    Lookup { alias: String },
}

/// Everything a command needs once configuration is loaded.
struct Runtime {
    config: ConcordConfig,
    registry: RegistryHandle,
    pipeline: ListingPipeline,
}

impl Runtime {
    async fn start(config_path: Option<&Path>) -> Result<Self> {
        let config = ConcordConfig::discover(config_path).await?;
        let registry = RegistryHandle::open(&config.registry).await?;
        let canonicalizer = build_canonicalizer(&config, registry.registry()).await?;
        let pipeline = ListingPipeline::new(Arc::new(JsonExtractor), Arc::new(canonicalizer));
        Ok(Self {
            config,
            registry,
            pipeline,
        })
    }

    fn engine(&self) -> MatchingEngine {
        MatchingEngine::new(self.registry.registry(), &self.config.matching)
    }

    async fn listing_from(&self, path: &Path) -> Result<Listing> {
        let text = read_input(path)?;
        let value: serde_json::Value = serde_json::from_str(&text)
            .with_context(|| format!("{} is not valid JSON", path.display()))?;
        let mut listing = self.pipeline.prepare(RawListing(value)).await?;
        if listing.id.is_none() {
            listing.id = path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .filter(|stem| !stem.is_empty() && stem != "-");
        }
        Ok(listing)
    }

    async fn shutdown(&self) -> Result<()> {
        self.registry.flush().await?;
        Ok(())
    }
}

fn read_input(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read stdin")?;
        return Ok(buf);
    }
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn init_logging(cli: &Cli) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();
}

pub async fn main_entry() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    let pretty = cli.pretty;
    if let Err(err) = run(cli).await {
        log::debug!("Command failed: {err:?}");
        print_json(&classify_error(&err), pretty)?;
        std::process::exit(1);
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let pretty = cli.pretty;
    match cli.command {
        Commands::Normalize(args) => run_normalize(&args, pretty),
        Commands::Schema => print_json(&schemars::schema_for!(Listing), pretty),
        command => {
            let runtime = Runtime::start(cli.config.as_deref()).await?;
            let outcome = match command {
                Commands::Resolve(args) => run_resolve(&runtime, args, pretty).await,
                Commands::Ingest(args) => run_ingest(&runtime, &args, pretty).await,
                Commands::Match(args) => run_match(&runtime, &args, pretty).await,
                Commands::Find(args) => run_find(&runtime, &args, pretty).await,
                Commands::Registry(sub) => run_registry(&runtime, &sub, pretty),
                Commands::Normalize(_) | Commands::Schema => Ok(()),
            };
            // Bindings made before a failure are still worth keeping.
            runtime.shutdown().await?;
            outcome
        }
    }
}

fn run_normalize(args: &NormalizeArgs, pretty: bool) -> Result<()> {
    let normalized = normalize(&args.term, args.key.as_deref());
    print_json(
        &json!({
            "input": args.term,
            "normalized": normalized,
            "compact": compact_form(&normalized),
        }),
        pretty,
    )
}

async fn run_resolve(runtime: &Runtime, args: ResolveArgs, pretty: bool) -> Result<()> {
    let node = runtime
        .pipeline
        .canonicalizer()
        .resolve(&args.term, &args.key, &args.context)
        .await;
    print_json(&node, pretty)
}

async fn run_ingest(runtime: &Runtime, args: &IngestArgs, pretty: bool) -> Result<()> {
    let query = if args.query == "-" {
        read_input(Path::new("-"))?
    } else {
        args.query.clone()
    };
    let listing = runtime.pipeline.ingest(&query).await?;
    print_json(&listing, pretty)
}

async fn run_match(runtime: &Runtime, args: &MatchArgs, pretty: bool) -> Result<()> {
    let requester = runtime.listing_from(&args.requester).await?;
    let candidate = runtime.listing_from(&args.candidate).await?;
    let report = runtime.engine().evaluate(&requester, &candidate);
    if args.explain {
        print_json(&report, pretty)
    } else {
        print_json(&json!({ "matched": report.matched }), pretty)
    }
}

async fn run_find(runtime: &Runtime, args: &FindArgs, pretty: bool) -> Result<()> {
    let requester = runtime.listing_from(&args.requester).await?;
    let store = Arc::new(InMemoryListingStore::new());
    for path in &args.candidates {
        let candidate = runtime.listing_from(path).await?;
        store.insert(candidate)?;
    }
    log::info!("Evaluating {} candidate listings", store.len());

    let service = MatchService::new(Arc::new(runtime.engine()), store.clone(), store);
    let matches = service.find_matches(&requester).await;
    print_json(&json!({ "matches": matches }), pretty)
}

fn run_registry(runtime: &Runtime, command: &RegistryCommands, pretty: bool) -> Result<()> {
    let registry = runtime.registry.registry();
    match command {
        RegistryCommands::Show => print_json(&registry.snapshot(), pretty),
        RegistryCommands::Lookup { alias } => {
            let concept_id = registry.lookup(alias)?;
            let (label, path) = match &concept_id {
                Some(id) => (registry.label_of(id)?, registry.concept_path(id)?),
                None => (None, None),
            };
            print_json(
                &json!({
                    "alias": alias,
                    "concept_id": concept_id,
                    "label": label,
                    "path": path,
                }),
                pretty,
            )
        }
    }
}
