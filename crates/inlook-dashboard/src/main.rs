use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use inlook_dashboard::client::{ApiClient, RootAction};
use inlook_dashboard::config::{self, ConfigDoc, DashboardConfig};
use inlook_dashboard::instance::InstanceNode;
use inlook_dashboard::registry::{RegistrySource, StaticRegistry};
use inlook_dashboard::tree_view::{NodeKey, TreeSession};
use inlook_dashboard::{Error, Result, logging, output};
use tracing::warn;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Dashboard config TOML (defaults to ./inlook.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Render the plugin instance tree once and print it
    Tree {
        /// Show the configuration form of every node
        #[arg(long)]
        expand_all: bool,
        /// Show the configuration form of one node (instance id, id:<instance id>, or /0/1 path)
        #[arg(long, value_name = "NODE")]
        expand: Vec<String>,
        /// Print HTML instead of text
        #[arg(long)]
        html: bool,
        /// Read the tree from a JSON file instead of the backend
        #[arg(long)]
        file: Option<PathBuf>,
        /// Serve registry lookups from a JSON file ({"<createFunc>": [..]})
        #[arg(long)]
        registry_file: Option<PathBuf>,
        /// How long to wait for registry lookups before printing
        #[arg(long, default_value_t = 10_000)]
        wait_ms: u64,
    },
    /// Print the implementations registered for a create function
    Registry { create_func: String },
    /// Print the known plugin create functions
    Plugins,
    /// Print the fully-resolved config (after extends)
    Resolve,
    /// Terminal dashboard with live refresh
    Tui,
    /// Instantiate every plugin below the root
    Instantiate,
    /// Execute the workflow from the root
    Execute,
    /// Reset all plugin instances
    Reset,
    /// Print the workflow files the backend can run
    Workflows,
    /// Make a workflow file the active one
    SetWorkflow { workflow: String },
    /// Stop the backend
    Shutdown,
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    let doc = match args.config.as_deref() {
        Some(path) => config::load(path)?,
        None => config::load_optional(Path::new(config::DEFAULT_CONFIG_PATH))?,
    };
    let cfg = doc.dashboard()?;

    // The dashboard owns the screen, so it logs to a file instead.
    match args.cmd {
        Command::Tui => logging::init_file(Path::new(&cfg.log.file), cfg.log.filter.as_deref())?,
        _ => logging::init_stderr(cfg.log.filter.as_deref()),
    }
    run_command(args.cmd, &doc, &cfg)
}

fn run_command(cmd: Command, doc: &ConfigDoc, cfg: &DashboardConfig) -> Result<()> {
    match cmd {
        Command::Tree {
            expand_all,
            expand,
            html,
            file,
            registry_file,
            wait_ms,
        } => cmd_tree(
            cfg,
            TreeArgs {
                expand_all,
                expand,
                html,
                file,
                registry_file,
                wait: Duration::from_millis(wait_ms),
            },
        ),
        Command::Registry { create_func } => {
            let client = ApiClient::from_config(&cfg.server)?;
            print_lines(client.fetch_registry_implements(&create_func)?);
            Ok(())
        }
        Command::Plugins => {
            let client = ApiClient::from_config(&cfg.server)?;
            print_lines(client.fetch_plugin_names()?);
            Ok(())
        }
        Command::Resolve => cmd_resolve(doc),
        Command::Instantiate => cmd_action(cfg, RootAction::Instantiate),
        Command::Execute => cmd_action(cfg, RootAction::Execute),
        Command::Reset => cmd_action(cfg, RootAction::Reset),
        Command::Shutdown => cmd_action(cfg, RootAction::Shutdown),
        Command::Workflows => {
            let client = ApiClient::from_config(&cfg.server)?;
            print_lines(client.fetch_workflows()?);
            Ok(())
        }
        Command::SetWorkflow { workflow } => {
            let client = ApiClient::from_config(&cfg.server)?;
            client.set_workflow(&workflow)?;
            println!("workflow set to {}", workflow.trim());
            Ok(())
        }
        Command::Tui => inlook_dashboard::ui::run_tui(cfg),
    }
}

fn print_lines(lines: Vec<String>) {
    for line in lines {
        println!("{line}");
    }
}

struct TreeArgs {
    expand_all: bool,
    expand: Vec<String>,
    html: bool,
    file: Option<PathBuf>,
    registry_file: Option<PathBuf>,
    wait: Duration,
}

fn cmd_tree(cfg: &DashboardConfig, args: TreeArgs) -> Result<()> {
    let tree = match &args.file {
        Some(path) => InstanceNode::from_json(&read_file(path)?)?,
        None => ApiClient::from_config(&cfg.server)?.fetch_instance_tree()?,
    };

    let source: Arc<dyn RegistrySource> = match &args.registry_file {
        Some(path) => Arc::new(StaticRegistry::from_json(&read_file(path)?)?),
        None => Arc::new(ApiClient::from_config(&cfg.server)?),
    };

    let mut session = TreeSession::new(source);
    if args.expand_all {
        session.set_all(&tree, true);
    }
    for raw in &args.expand {
        session.set_expanded(NodeKey::parse(raw), true);
    }

    // First pass starts registry lookups; the second picks up their results.
    session.render(&tree);
    if !session.registry_mut().wait_idle(args.wait) {
        warn!(
            pending = session.registry().pending(),
            "registry lookups still pending; printing without them"
        );
    }
    let view = session.render(&tree);

    if args.html {
        println!("{}", output::tree_to_html(&view));
    } else {
        print!("{}", output::tree_to_text(&view));
    }
    Ok(())
}

fn cmd_resolve(doc: &ConfigDoc) -> Result<()> {
    let s = toml::to_string_pretty(&doc.value)
        .map_err(|e| Error::msg(format!("failed to print config: {e}")))?;
    print!("{s}");
    Ok(())
}

fn cmd_action(cfg: &DashboardConfig, action: RootAction) -> Result<()> {
    let client = ApiClient::from_config(&cfg.server)?;
    client.run_action(action)?;
    println!("{} requested", action.label());
    Ok(())
}

fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .map_err(|e| Error::msg(format!("failed to read {}: {e}", path.display())))
}
