//! mptree command-line tool.
//!
//! Provides the `mptree` binary: a thin front end over a SQLite-backed
//! materialized-path tree. Mutations print the affected node as JSON,
//! `check` and `fix` run the reconciler out of band, and `dump`/`load`
//! move whole subtrees in and out as nested JSON records.
//!
//! Configuration comes from flags and the environment:
//! - `MPTREE_DB_PATH`: SQLite database file path (default: "mptree.db")
//! - `--config`: JSON file holding a `TreeConfig`, overridden field by field
//!   by `--steplen`, `--alphabet`, `--max-depth` and `--order-by`
//!
//! Logs go to stderr so stdout stays machine-readable.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

use mptree_core::{MovePosition, NewNode, NodeId, SiblingPosition, TreeConfig, TreeNode};
use mptree_engine::{DumpedNode, Tree, TreeError};
use mptree_storage::{SqliteRepository, StorageError};

/// Materialized-path tree maintenance.
#[derive(Parser)]
#[command(name = "mptree", about = "Materialized-path tree maintenance")]
struct Cli {
    #[command(flatten)]
    tree: TreeArgs,

    /// Log debug events to stderr.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Which database to open and how its paths are encoded.
#[derive(Args)]
struct TreeArgs {
    /// Path to the tree database file.
    #[arg(long, env = "MPTREE_DB_PATH", default_value = "mptree.db")]
    db: String,

    /// JSON file with the tree configuration.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Characters per path segment.
    #[arg(long)]
    steplen: Option<usize>,

    /// Ordered symbols used in path segments.
    #[arg(long)]
    alphabet: Option<String>,

    /// Maximum number of path segments.
    #[arg(long)]
    max_depth: Option<usize>,

    /// Payload fields that keep siblings sorted (comma separated).
    #[arg(long, value_delimiter = ',')]
    order_by: Vec<String>,
}

/// Payload and optional id of a node to create.
#[derive(Args)]
struct NodeInput {
    /// Node payload as JSON.
    #[arg(long, default_value = "{}")]
    data: String,

    /// Explicit id for the new node.
    #[arg(long)]
    id: Option<i64>,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Append a new root node.
    AddRoot {
        #[command(flatten)]
        input: NodeInput,
    },

    /// Append a child under a node.
    AddChild {
        /// Parent node id.
        parent: i64,

        #[command(flatten)]
        input: NodeInput,
    },

    /// Insert a node next to another one.
    AddSibling {
        /// Reference node id.
        node: i64,

        /// first-sibling, left, right, last-sibling or sorted-sibling.
        #[arg(short, long)]
        position: Option<SiblingPosition>,

        #[command(flatten)]
        input: NodeInput,
    },

    /// Move a node and its subtree.
    Move {
        /// Node to move.
        node: i64,

        /// Node the position is relative to.
        target: i64,

        /// Any sibling position, or first-child, last-child, sorted-child.
        #[arg(short, long)]
        position: Option<MovePosition>,
    },

    /// Delete nodes and their subtrees.
    Delete {
        /// Ids of the nodes to delete.
        #[arg(required = true)]
        nodes: Vec<i64>,
    },

    /// List the tree (or one subtree) in pre-order.
    Show {
        /// Only list this node and its descendants.
        #[arg(long)]
        parent: Option<i64>,

        /// Deepest level to include.
        #[arg(long)]
        depth: Option<u32>,

        /// Indented text instead of JSON.
        #[arg(long)]
        text: bool,
    },

    /// Report integrity problems; exits with 1 when any are found.
    Check,

    /// Recompute depth and numchild, optionally renumbering paths.
    Fix {
        /// Also close sibling holes and restore sort order.
        #[arg(long)]
        paths: bool,
    },

    /// Export nodes as nested JSON records.
    Dump {
        /// Only export this node and its descendants.
        #[arg(long)]
        parent: Option<i64>,

        /// Include node ids in the records.
        #[arg(long)]
        keep_ids: bool,
    },

    /// Import nested JSON records produced by `dump`.
    Load {
        /// Records file, or "-" for stdin.
        file: PathBuf,

        /// Load the records as children of this node.
        #[arg(long)]
        parent: Option<i64>,

        /// Reuse the ids stored in the records.
        #[arg(long)]
        keep_ids: bool,
    },
}

/// Failures reported by the CLI.
#[derive(Debug, Error)]
enum CliError {
    #[error("failed to read '{path}': {source}")]
    Io { path: String, source: io::Error },

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Tree(#[from] TreeError),
}

impl CliError {
    /// 2 = the tree rejected the operation, 3 = I/O, storage or input error.
    fn exit_code(&self) -> i32 {
        match self {
            CliError::Tree(TreeError::Storage(_)) | CliError::Tree(TreeError::Core(_)) => 3,
            CliError::Tree(_) => 2,
            CliError::Io { .. } | CliError::Json(_) | CliError::Storage(_) => 3,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let exit_code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err}");
            err.exit_code()
        }
    };
    process::exit(exit_code);
}

fn init_tracing(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();
}

/// Execute one subcommand against the configured database.
///
/// Returns exit code: 0 = success, 1 = `check` found problems.
fn run(cli: Cli) -> Result<i32, CliError> {
    let config = cli.tree.load_config()?;
    let repo = SqliteRepository::new(&cli.tree.db)?;
    let mut tree = Tree::new(repo, &config)?;
    tracing::debug!(db = %cli.tree.db, steplen = config.steplen, "opened tree");

    match cli.command {
        Commands::AddRoot { input } => {
            print_json(&tree.add_root(input.parse()?)?)?;
        }
        Commands::AddChild { parent, input } => {
            let parent = fetch(&tree, parent)?;
            print_json(&tree.add_child(&parent, input.parse()?)?)?;
        }
        Commands::AddSibling {
            node,
            position,
            input,
        } => {
            let node = fetch(&tree, node)?;
            print_json(&tree.add_sibling(&node, position, input.parse()?)?)?;
        }
        Commands::Move {
            node,
            target,
            position,
        } => {
            let node = fetch(&tree, node)?;
            let target = fetch(&tree, target)?;
            print_json(&tree.move_node(&node, &target, position)?)?;
        }
        Commands::Delete { nodes } => {
            let nodes = nodes
                .into_iter()
                .map(|id| fetch(&tree, id))
                .collect::<Result<Vec<_>, _>>()?;
            let deleted = tree.delete_many(&nodes)?;
            print_json(&json!({ "deleted": deleted }))?;
        }
        Commands::Show {
            parent,
            depth,
            text,
        } => {
            let parent = parent.map(|id| fetch(&tree, id)).transpose()?;
            let listing = tree.view().annotated_list(parent.as_ref(), depth)?;
            if text {
                for entry in &listing {
                    println!(
                        "{}{} [{}] {}",
                        "  ".repeat(entry.level),
                        entry.node.path,
                        entry.node.id,
                        entry.node.data
                    );
                }
            } else {
                print_json(&listing)?;
            }
        }
        Commands::Check => {
            let problems = tree.find_problems()?;
            print_json(&problems)?;
            if !problems.is_clean() {
                return Ok(1);
            }
        }
        Commands::Fix { paths } => {
            print_json(&tree.fix_tree(paths)?)?;
        }
        Commands::Dump { parent, keep_ids } => {
            let parent = parent.map(|id| fetch(&tree, id)).transpose()?;
            print_json(&tree.dump_bulk(parent.as_ref(), keep_ids)?)?;
        }
        Commands::Load {
            file,
            parent,
            keep_ids,
        } => {
            let records: Vec<DumpedNode> = serde_json::from_str(&read_input(&file)?)?;
            let parent = parent.map(|id| fetch(&tree, id)).transpose()?;
            let ids = tree.load_bulk(&records, parent.as_ref(), keep_ids)?;
            print_json(&json!({ "loaded": ids }))?;
        }
    }
    Ok(0)
}

impl TreeArgs {
    /// Config file (or defaults) with the command-line overrides applied.
    fn load_config(&self) -> Result<TreeConfig, CliError> {
        let mut config = match &self.config {
            Some(path) => serde_json::from_str(&read_input(path)?)?,
            None => TreeConfig::default(),
        };
        if let Some(steplen) = self.steplen {
            config.steplen = steplen;
        }
        if let Some(alphabet) = &self.alphabet {
            config.alphabet = alphabet.clone();
        }
        if let Some(max_depth) = self.max_depth {
            config.max_depth = max_depth;
        }
        if !self.order_by.is_empty() {
            config.node_order_by = self.order_by.clone();
        }
        Ok(config)
    }
}

impl NodeInput {
    fn parse(&self) -> Result<NewNode, CliError> {
        let data: Value = serde_json::from_str(&self.data)?;
        let node = NewNode::new(data);
        Ok(match self.id {
            Some(id) => node.with_id(NodeId(id)),
            None => node,
        })
    }
}

fn fetch(tree: &Tree<SqliteRepository>, id: i64) -> Result<TreeNode, CliError> {
    let id = NodeId(id);
    tree.get(id)?.ok_or(CliError::Tree(TreeError::NodeNotFound(id)))
}

fn read_input(path: &Path) -> Result<String, CliError> {
    let result = if path == Path::new("-") {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf).map(|_| buf)
    } else {
        fs::read_to_string(path)
    };
    result.map_err(|source| CliError::Io {
        path: path.display().to_string(),
        source,
    })
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
