use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use easysearch::config::parse_nodes;
use easysearch::{Config, IndexCoord, SearchHelper};
use std::path::PathBuf;

mod commands;

#[derive(Parser, Debug)]
#[command(name = "easysearch")]
#[command(about = "Query, aggregate and manage an Elasticsearch 1.x cluster")]
#[command(version)]
struct Cli {
    /// Path to a TOML config file
    #[arg(short, long, global = true, env = "EASYSEARCH_CONFIG")]
    config: Option<PathBuf>,

    /// Comma-separated host:port list, overriding the config file
    #[arg(long, global = true, env = "EASYSEARCH_NODES")]
    nodes: Option<String>,

    /// Cluster name, overriding the config file
    #[arg(long, global = true, env = "EASYSEARCH_CLUSTER")]
    cluster_name: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Index and type addressing a mapping type
#[derive(Args, Debug)]
struct Target {
    /// Index name
    index: String,

    /// Type name
    #[arg(value_name = "TYPE")]
    doc_type: String,
}

impl Target {
    fn coord(&self) -> IndexCoord {
        IndexCoord::new(&self.index, &self.doc_type)
    }
}

/// Text and filter options shared by query and aggregate
#[derive(Args, Debug)]
pub(crate) struct FilterArgs {
    /// Query text; empty matches everything
    #[arg(short, long)]
    q: Option<String>,

    /// Comma-separated fields searched by the text
    #[arg(short, long)]
    fields: Option<String>,

    /// Term filter `field=v1,v2` (repeatable)
    #[arg(short, long = "term")]
    terms: Vec<String>,

    /// Range filter `field:op=bound` with op in gt/gte/lt/lte (repeatable)
    #[arg(short, long = "range")]
    ranges: Vec<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check that the nodes answer and belong to the configured cluster
    Ping,

    /// Paged full-text query
    Query {
        #[command(flatten)]
        target: Target,

        #[command(flatten)]
        filters: FilterArgs,

        #[arg(long, default_value = "1")]
        pageno: u32,

        #[arg(long, default_value = "10")]
        pagesize: u32,
    },

    /// Grouped search returning representative documents
    Aggregate {
        #[command(flatten)]
        target: Target,

        #[command(flatten)]
        filters: FilterArgs,

        /// Comma-separated grouping fields
        #[arg(short, long)]
        group_by: String,

        /// One representative per group instead of full hit lists
        #[arg(long)]
        top_only: bool,
    },

    /// Conjunction of match queries, newest first
    Match {
        #[command(flatten)]
        target: Target,

        /// Match parameter `field=text` (repeatable)
        #[arg(short, long = "param")]
        params: Vec<String>,

        #[arg(long, default_value = "1")]
        pageno: u32,

        #[arg(long, default_value = "10")]
        pagesize: u32,
    },

    /// Mapping operations
    #[command(subcommand)]
    Mapping(MappingCommand),

    /// Index operations
    #[command(subcommand)]
    Index(IndexCommand),

    /// Index a file with one JSON document per line
    Bulk {
        #[command(flatten)]
        target: Target,

        /// Input file
        file: PathBuf,
    },

    /// Fetch a document by id
    Get {
        #[command(flatten)]
        target: Target,

        id: String,
    },

    /// Index one document
    Put {
        #[command(flatten)]
        target: Target,

        id: String,

        /// Document source as a JSON object
        source: String,
    },
}

#[derive(Subcommand, Debug)]
enum MappingCommand {
    /// Show the properties of a type
    Get {
        #[command(flatten)]
        target: Target,

        /// Print parsed field descriptors instead of raw properties
        #[arg(long)]
        descriptors: bool,
    },

    /// Show the properties of every index and type
    All,

    /// Create a mapping from a JSON file of field name -> descriptor
    Create {
        #[command(flatten)]
        target: Target,

        file: PathBuf,
    },

    /// Delete a mapping type
    Delete {
        #[command(flatten)]
        target: Target,
    },
}

#[derive(Subcommand, Debug)]
pub(crate) enum IndexCommand {
    /// Create an empty index
    Create { index: String },
    /// Report whether an index exists
    Exists { index: String },
    /// Delete an index with all its documents and mappings
    Drop { index: String },
    /// Delete every document, keeping mappings
    Clear { index: String },
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("cannot load config from {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(nodes) = &cli.nodes {
        config.nodes = parse_nodes(nodes);
    }
    if let Some(cluster_name) = &cli.cluster_name {
        config.cluster_name = cluster_name.clone();
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    easysearch::logging::init(&config.logging);

    let helper = SearchHelper::new(config).context("cannot set up cluster connection")?;

    match cli.command {
        Commands::Ping => commands::run_ping(&helper).await?,
        Commands::Query {
            target,
            filters,
            pageno,
            pagesize,
        } => {
            let request =
                commands::build_query(target.coord(), &filters)?.with_page(pageno, pagesize);
            commands::run_query(&helper, &request).await?;
        }
        Commands::Aggregate {
            target,
            filters,
            group_by,
            top_only,
        } => {
            let query = commands::build_query(target.coord(), &filters)?;
            commands::run_aggregate(&helper, query, &group_by, top_only).await?;
        }
        Commands::Match {
            target,
            params,
            pageno,
            pagesize,
        } => commands::run_match(&helper, &target.coord(), &params, pageno, pagesize).await?,
        Commands::Mapping(cmd) => match cmd {
            MappingCommand::Get {
                target,
                descriptors,
            } => commands::run_mapping_get(&helper, &target.coord(), descriptors).await?,
            MappingCommand::All => commands::run_mapping_all(&helper).await?,
            MappingCommand::Create { target, file } => {
                commands::run_mapping_create(&helper, &target.coord(), &file).await?
            }
            MappingCommand::Delete { target } => {
                helper.delete_mapping(&target.coord()).await?;
                tracing::info!("Deleted mapping {}/{}", target.index, target.doc_type);
            }
        },
        Commands::Index(cmd) => commands::run_index(&helper, cmd).await?,
        Commands::Bulk { target, file } => {
            commands::run_bulk(&helper, &target.coord(), &file).await?
        }
        Commands::Get { target, id } => commands::run_get(&helper, &target.coord(), &id).await?,
        Commands::Put { target, id, source } => {
            commands::run_put(&helper, &target.coord(), &id, &source).await?
        }
    }

    Ok(())
}
