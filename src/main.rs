use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use weft_engine::{Engine, ExecutionOptions};
use weft_registry::{NodeRegistry, NodeScope};
use weft_scheduler::CronScheduler;
use weft_server::{ServerConfig, SessionManager};
use weft_store::MemoryStore;
use weft_validator::Validator;
use weft_workflow::WorkflowDocument;

/// Exit codes of the CLI: 0 success, 2 validation failure, 3 runtime
/// failure, 4 configuration error.
const EXIT_VALIDATION: u8 = 2;
const EXIT_RUNTIME: u8 = 3;
const EXIT_CONFIG: u8 = 4;

/// weft - an edge-routed JSON workflow engine
#[derive(Parser)]
#[command(name = "weft")]
#[command(version, about, long_about = None)]
struct Cli {
  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Run a workflow or a single node
  Run {
    #[command(subcommand)]
    target: RunTarget,
  },

  /// Validate a workflow document without executing it
  Validate {
    /// Path to the workflow file, or `-` for stdin
    workflow_file: PathBuf,
  },

  /// List the nodes registered for the server host
  Nodes,

  /// Start the server host: WebSocket endpoint plus cron scheduler
  Serve {
    /// Address to bind, e.g. 127.0.0.1:8787
    #[arg(long, default_value = "127.0.0.1:8787")]
    bind: String,
  },
}

#[derive(Subcommand)]
enum RunTarget {
  /// Run an entire workflow
  Workflow {
    /// Path to the workflow file (JSON), or `-` for stdin
    workflow_file: PathBuf,

    /// Skip static validation before execution
    #[arg(long)]
    no_validate: bool,

    /// Per-execution timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,
  },

  /// Run a single node against a supplied config
  Node {
    /// The node id to execute
    node_id: String,

    /// Node config as inline JSON
    #[arg(long, default_value = "{}")]
    config: String,

    /// Initial state as inline JSON (`path -> value` map)
    #[arg(long)]
    state: Option<String>,
  },
}

fn main() -> ExitCode {
  tracing_subscriber::fmt()
    .with_env_filter(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
    )
    .with_writer(io::stderr)
    .init();

  let cli = Cli::parse();

  let rt = match tokio::runtime::Runtime::new() {
    Ok(rt) => rt,
    Err(e) => {
      eprintln!("failed to start runtime: {e}");
      return ExitCode::from(EXIT_CONFIG);
    }
  };

  rt.block_on(async {
    match cli.command {
      Commands::Run { target } => match target {
        RunTarget::Workflow {
          workflow_file,
          no_validate,
          timeout_ms,
        } => run_workflow(workflow_file, no_validate, timeout_ms).await,
        RunTarget::Node {
          node_id,
          config,
          state,
        } => run_node(node_id, config, state).await,
      },
      Commands::Validate { workflow_file } => validate(workflow_file).await,
      Commands::Nodes => list_nodes(),
      Commands::Serve { bind } => serve(bind).await,
    }
  })
}

fn server_registry() -> Arc<NodeRegistry> {
  let registry = Arc::new(NodeRegistry::new());
  // Discovery on a fresh registry cannot collide.
  let _ = weft_nodes::register_universal_nodes(&registry);
  let _ = weft_nodes::register_server_nodes(&registry);
  registry
}

fn read_document(path: &PathBuf) -> Result<WorkflowDocument> {
  let text = if path.as_os_str() == "-" {
    let mut buffer = String::new();
    io::stdin()
      .read_to_string(&mut buffer)
      .context("failed to read workflow from stdin")?;
    buffer
  } else {
    std::fs::read_to_string(path)
      .with_context(|| format!("failed to read workflow file: {}", path.display()))?
  };
  WorkflowDocument::from_json(&text).context("failed to parse workflow document")
}

async fn run_workflow(
  workflow_file: PathBuf,
  no_validate: bool,
  timeout_ms: Option<u64>,
) -> ExitCode {
  let document = match read_document(&workflow_file) {
    Ok(document) => document,
    Err(e) => {
      eprintln!("{e:#}");
      return ExitCode::from(EXIT_VALIDATION);
    }
  };

  let registry = server_registry();
  if !no_validate {
    let report = Validator::new(Arc::clone(&registry), NodeScope::Server).validate(&document);
    if !report.valid {
      eprintln!(
        "{}",
        serde_json::to_string_pretty(&report).unwrap_or_default()
      );
      return ExitCode::from(EXIT_VALIDATION);
    }
  }

  let engine = Engine::new(registry, NodeScope::Server);
  let options = ExecutionOptions {
    timeout: timeout_ms.map(Duration::from_millis),
    ..ExecutionOptions::default()
  };

  match engine.execute(&document, options).await {
    Ok(outcome) => {
      println!(
        "{}",
        serde_json::to_string_pretty(&outcome).unwrap_or_default()
      );
      ExitCode::SUCCESS
    }
    Err(e) => {
      eprintln!("execution failed: {e}");
      ExitCode::from(EXIT_RUNTIME)
    }
  }
}

async fn run_node(node_id: String, config: String, state: Option<String>) -> ExitCode {
  let config: serde_json::Value = match serde_json::from_str(&config) {
    Ok(config) => config,
    Err(e) => {
      eprintln!("bad --config JSON: {e}");
      return ExitCode::from(EXIT_CONFIG);
    }
  };
  let initial_state = match state {
    None => None,
    Some(text) => match serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(&text) {
      Ok(map) => Some(map),
      Err(e) => {
        eprintln!("bad --state JSON: {e}");
        return ExitCode::from(EXIT_CONFIG);
      }
    },
  };

  let engine = Engine::new(server_registry(), NodeScope::Server);
  match engine
    .execute_node(
      &node_id,
      &config,
      initial_state.as_ref(),
      CancellationToken::new(),
    )
    .await
  {
    Ok(run) => {
      let success = run.edge != "error";
      println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
          "success": success,
          "edge": run.edge,
          "result": run.data,
          "state": run.state,
          "metadata": { "duration": run.duration_ms }
        }))
        .unwrap_or_default()
      );
      if success {
        ExitCode::SUCCESS
      } else {
        ExitCode::from(EXIT_RUNTIME)
      }
    }
    Err(e) => {
      eprintln!("node execution failed: {e}");
      ExitCode::from(EXIT_RUNTIME)
    }
  }
}

async fn validate(workflow_file: PathBuf) -> ExitCode {
  let document = match read_document(&workflow_file) {
    Ok(document) => document,
    Err(e) => {
      eprintln!("{e:#}");
      return ExitCode::from(EXIT_VALIDATION);
    }
  };

  let report = Validator::new(server_registry(), NodeScope::Server).validate(&document);
  println!(
    "{}",
    serde_json::to_string_pretty(&report).unwrap_or_default()
  );
  if report.valid {
    ExitCode::SUCCESS
  } else {
    ExitCode::from(EXIT_VALIDATION)
  }
}

fn list_nodes() -> ExitCode {
  let registry = server_registry();
  let nodes = registry.list(NodeScope::Server);
  println!(
    "{}",
    serde_json::to_string_pretty(&serde_json::json!({ "nodes": nodes })).unwrap_or_default()
  );
  ExitCode::SUCCESS
}

async fn serve(bind: String) -> ExitCode {
  let bind_addr = match bind.parse() {
    Ok(addr) => addr,
    Err(e) => {
      eprintln!("bad --bind address '{bind}': {e}");
      return ExitCode::from(EXIT_CONFIG);
    }
  };

  let registry = server_registry();
  let store = Arc::new(MemoryStore::new());
  let scheduler = CronScheduler::new(Arc::clone(&store), Arc::clone(&registry));
  if let Err(e) = scheduler.start().await {
    eprintln!("failed to start scheduler: {e}");
    return ExitCode::from(EXIT_RUNTIME);
  }

  let manager = Arc::new(SessionManager::new(registry, NodeScope::Server));
  let shutdown = CancellationToken::new();
  {
    let shutdown = shutdown.clone();
    tokio::spawn(async move {
      if tokio::signal::ctrl_c().await.is_ok() {
        shutdown.cancel();
      }
    });
  }

  let result = weft_server::serve(ServerConfig { bind_addr }, manager, shutdown).await;
  scheduler.shutdown(Duration::from_secs(10)).await;

  match result {
    Ok(()) => ExitCode::SUCCESS,
    Err(e) => {
      eprintln!("server failed: {e}");
      ExitCode::from(EXIT_RUNTIME)
    }
  }
}
