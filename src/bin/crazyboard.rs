//! Crazyboard CLI: drive the board and artifact session against a local store.
//!
//! Usage:
//!   crazyboard graph [--db path] [--artifacts dir]
//!   crazyboard <create|connect|disconnect|move|delete|open|write|search> ...

use clap::{Parser, Subcommand};
use crazyboard::{
    ArtifactSession, Config, EditorMode, FocusCoordinator, FocusOutcome, Gateway, GraphStore,
    NodeId, NodeType, SaveOutcome, SearchDebouncer, SearchMode, SearchOutcome, SqliteGateway,
};
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::Level;

#[derive(Parser)]
#[command(
    name = "crazyboard",
    version,
    about = "Knowledge board with optimistic graph sync"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// YAML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Path to SQLite database file
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Directory holding artifact markdown files
    #[arg(long, global = true)]
    artifacts: Option<PathBuf>,
    /// Log more (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Print every node and edge
    Graph,
    /// Create a node
    Create {
        title: String,
        /// document, source, concept or image
        #[arg(long = "type", default_value = "document")]
        node_type: NodeType,
    },
    /// Connect two nodes
    Connect {
        source: String,
        target: String,
        #[arg(long)]
        label: Option<String>,
    },
    /// Remove every edge from source to target
    Disconnect { source: String, target: String },
    /// Persist a node's position
    Move { id: String, x: f64, y: f64 },
    /// Delete a node and its edges
    Delete { id: String },
    /// Print an artifact's content
    Open {
        id: String,
        /// Render markdown to HTML
        #[arg(long)]
        preview: bool,
    },
    /// Replace an artifact's content (reads stdin without --content)
    Write {
        id: String,
        #[arg(long)]
        content: Option<String>,
    },
    /// Search node titles and content
    Search {
        query: String,
        #[arg(long)]
        mode: Option<SearchMode>,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<Config, String> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path).map_err(|e| format!("Failed to load config: {}", e))?,
        None => Config::default(),
    };
    if let Some(db) = &cli.db {
        config.storage.db_path = Some(db.clone());
    }
    if let Some(dir) = &cli.artifacts {
        config.storage.artifacts_dir = Some(dir.clone());
    }
    Ok(config)
}

fn open_gateway(config: &Config) -> Result<Arc<dyn Gateway>, String> {
    let gateway = SqliteGateway::open(config.db_path(), config.artifacts_dir())
        .map_err(|e| format!("Failed to open database: {}", e))?;
    Ok(Arc::new(gateway))
}

/// A board loaded from the gateway, or the load error
async fn open_board(gateway: Arc<dyn Gateway>, config: &Config) -> Result<Arc<GraphStore>, String> {
    let store = Arc::new(GraphStore::with_config(gateway, config));
    store.load_graph().await;
    match store.error() {
        Some(e) => Err(e),
        None => Ok(store),
    }
}

/// Wait for background calls and report the first failure
async fn settle(store: &GraphStore) -> i32 {
    store.flush().await;
    match store.error() {
        Some(e) => {
            eprintln!("Error: {}", e);
            1
        }
        None => 0,
    }
}

fn cmd_graph(store: &GraphStore) -> i32 {
    let state = store.snapshot();
    if state.nodes.is_empty() {
        println!("Board is empty.");
        return 0;
    }
    println!("{:<36}  {:<9}  {:<24}  {:>14}", "ID", "TYPE", "TITLE", "POSITION");
    println!("{}", "-".repeat(90));
    for n in &state.nodes {
        println!(
            "{:<36}  {:<9}  {:<24}  {:>6.0},{:>7.0}",
            n.node.id.as_str(), n.node.node_type.as_str(), n.node.title, n.position.x, n.position.y
        );
    }
    if !state.edges.is_empty() {
        println!();
        for e in &state.edges {
            println!(
                "{} -[{}]-> {}",
                e.edge.source,
                e.edge.label.as_deref().unwrap_or(""),
                e.edge.target
            );
        }
    }
    0
}

async fn cmd_create(store: &GraphStore, title: &str, node_type: NodeType) -> i32 {
    match store.create_node(title, node_type).await {
        Some(id) => {
            println!("Created {} '{}' ({})", node_type, title, id);
            0
        }
        None => settle(store).await.max(1),
    }
}

async fn cmd_connect(store: &GraphStore, source: &str, target: &str, label: Option<&str>) -> i32 {
    if let Err(e) = store.connect(&NodeId::from(source), &NodeId::from(target), label) {
        eprintln!("Error: {}", e);
        return 1;
    }
    let code = settle(store).await;
    if code == 0 {
        println!("Connected {} -> {}", source, target);
    }
    code
}

async fn cmd_disconnect(store: &GraphStore, source: &str, target: &str) -> i32 {
    match store.disconnect(&NodeId::from(source), &NodeId::from(target)) {
        Ok(removed) => {
            let code = settle(store).await;
            if code == 0 {
                println!("Removed {} edge(s)", removed.len());
            }
            code
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

async fn cmd_move(store: &GraphStore, id: &str, x: f64, y: f64) -> i32 {
    if let Err(e) = store.commit_position(&NodeId::from(id), x, y) {
        eprintln!("Error: {}", e);
        return 1;
    }
    settle(store).await
}

async fn cmd_delete(focus: &FocusCoordinator, id: &str) -> i32 {
    if let Err(e) = focus.delete_node(&NodeId::from(id)) {
        eprintln!("Error: {}", e);
        return 1;
    }
    let code = settle(focus.graph()).await;
    if code == 0 {
        println!("Deleted {}", id);
    }
    code
}

async fn cmd_open(focus: &FocusCoordinator, id: &str, preview: bool) -> i32 {
    match focus.focus(&NodeId::from(id)).await {
        FocusOutcome::Opened | FocusOutcome::AlreadyFocused => {}
        FocusOutcome::Failed(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
        other => {
            eprintln!("Error: could not open {}: {:?}", id, other);
            return 1;
        }
    }
    let session = focus.session();
    if preview {
        session.set_mode(EditorMode::Preview);
        print!("{}", session.preview_html());
    } else {
        print!("{}", session.content());
    }
    0
}

async fn cmd_write(focus: &FocusCoordinator, id: &str, content: Option<String>) -> i32 {
    let content = match content {
        Some(c) => c,
        None => {
            let mut buf = String::new();
            if let Err(e) = std::io::stdin().read_to_string(&mut buf) {
                eprintln!("Error: cannot read stdin: {}", e);
                return 1;
            }
            buf
        }
    };

    if let FocusOutcome::Failed(e) = focus.focus(&NodeId::from(id)).await {
        eprintln!("Error: {}", e);
        return 1;
    }
    let session = focus.session();
    session.set_content(content);
    match session.save_content().await {
        SaveOutcome::Saved => {
            println!("Saved {}", id);
            0
        }
        SaveOutcome::NoActiveArtifact => {
            eprintln!("Error: {} is not open", id);
            1
        }
        SaveOutcome::Failed(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

async fn cmd_search(search: &SearchDebouncer, query: &str, mode: Option<SearchMode>) -> i32 {
    let mode = mode.unwrap_or(search.mode());
    match search.search_with_mode(query, mode).await {
        SearchOutcome::Results(hits) if hits.is_empty() => {
            println!("No matches.");
            0
        }
        SearchOutcome::Results(hits) => {
            for hit in hits {
                println!("{:>5.2}  {}  {}", hit.score, hit.id, hit.title);
                if !hit.snippet.is_empty() {
                    println!("       {}", hit.snippet.replace('\n', " "));
                }
            }
            0
        }
        SearchOutcome::Superseded => 0,
        SearchOutcome::Failed(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match load_config(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    let gateway = match open_gateway(&config) {
        Ok(g) => g,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    if let Commands::Search { query, mode } = &cli.command {
        let search = SearchDebouncer::with_config(gateway, &config).with_window(Duration::ZERO);
        std::process::exit(cmd_search(&search, query, *mode).await);
    }

    let store = match open_board(gateway.clone(), &config).await {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    let session = Arc::new(ArtifactSession::with_config(gateway, &config));
    let focus = FocusCoordinator::with_config(store.clone(), session, &config);

    let code = match cli.command {
        Commands::Graph => cmd_graph(&store),
        Commands::Create { title, node_type } => cmd_create(&store, &title, node_type).await,
        Commands::Connect {
            source,
            target,
            label,
        } => cmd_connect(&store, &source, &target, label.as_deref()).await,
        Commands::Disconnect { source, target } => cmd_disconnect(&store, &source, &target).await,
        Commands::Move { id, x, y } => cmd_move(&store, &id, x, y).await,
        Commands::Delete { id } => cmd_delete(&focus, &id).await,
        Commands::Open { id, preview } => cmd_open(&focus, &id, preview).await,
        Commands::Write { id, content } => cmd_write(&focus, &id, content).await,
        Commands::Search { .. } => 0,
    };
    std::process::exit(code);
}
