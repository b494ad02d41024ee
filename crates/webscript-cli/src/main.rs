use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use argh::FromArgs;
use serde_json::Value as JsonValue;

use webscript_core::{execute, full_path, InvokeArgs, RequestArguments, ScriptEnvironment};
use webscript_server::config::SCRIPT_ROOT_ENV;
use webscript_server::{debug_from_env, script_root_from_env, ServerConfig, WebscriptServer};

#[derive(FromArgs, Debug)]
/// Serve script units over HTTP, or invoke one directly.
struct Cli {
    #[argh(subcommand)]
    command: Commands,
}

#[derive(FromArgs, Debug)]
#[argh(subcommand)]
enum Commands {
    Serve(ServeCommand),
    Invoke(InvokeCommand),
}

#[derive(FromArgs, Debug)]
#[argh(subcommand, name = "serve")]
/// Run the HTTP server.
struct ServeCommand {
    /// script root directory (defaults to WEBSCRIPT_SCRIPT_ROOT)
    #[argh(option, short = 'r')]
    root: Option<String>,

    /// address to bind
    #[argh(option, short = 'b', default = "\"127.0.0.1:8600\".to_string()")]
    bind: String,

    /// allow anonymous requests
    #[argh(switch)]
    debug: bool,
}

#[derive(FromArgs, Debug)]
#[argh(subcommand, name = "invoke")]
/// Invoke one function and print its result as JSON.
struct InvokeCommand {
    /// wire path, e.g. billing/reports.summary
    #[argh(positional)]
    path: String,

    /// script root directory (defaults to WEBSCRIPT_SCRIPT_ROOT)
    #[argh(option, short = 'r')]
    root: Option<String>,

    /// arguments as a JSON object (named) or array (positional)
    #[argh(option, short = 'a', default = "\"{}\".to_string()")]
    args: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli: Cli = argh::from_env();

    // invoke prints a bare JSON result; keep log lines off its stdout
    if matches!(cli.command, Commands::Serve(_)) {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    }

    match cli.command {
        Commands::Serve(cmd) => run_serve(cmd).await,
        Commands::Invoke(cmd) => run_invoke(cmd),
    }
}

async fn run_serve(cmd: ServeCommand) -> anyhow::Result<()> {
    let root = resolve_root(cmd.root.as_deref())?;
    let debug = cmd.debug || debug_from_env();
    let addr: SocketAddr = cmd
        .bind
        .parse()
        .with_context(|| format!("invalid bind address '{}'", cmd.bind))?;

    if debug {
        tracing::warn!("debug mode: anonymous requests are allowed");
    }
    tracing::info!(root = %root.display(), %addr, "starting server");

    let config = ServerConfig::new(root).with_debug(debug);
    WebscriptServer::new(config).run(addr).await?;
    Ok(())
}

fn run_invoke(cmd: InvokeCommand) -> anyhow::Result<()> {
    let root = resolve_root(cmd.root.as_deref())?;
    let parsed: JsonValue = serde_json::from_str(&cmd.args)
        .with_context(|| format!("arguments are not valid JSON: '{}'", cmd.args))?;
    let args = match parsed {
        JsonValue::Object(map) => InvokeArgs::Named(RequestArguments::from(map)),
        JsonValue::Array(values) => InvokeArgs::Positional(values),
        _ => anyhow::bail!("arguments must be a JSON object or array"),
    };

    let environment = Arc::new(ScriptEnvironment::new());
    let value = execute(&environment, &root, &cmd.path, &args)?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

fn resolve_root(flag: Option<&str>) -> anyhow::Result<PathBuf> {
    if let Some(root) = flag {
        return Ok(full_path(root, None));
    }
    script_root_from_env()
        .ok_or_else(|| anyhow::anyhow!("no script root: pass --root or set {SCRIPT_ROOT_ENV}"))
}
