use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::hot_reload::watch_routes;
use crate::logging::{init_logging_with_config, LogConfig};
use crate::router::{Request, Router};
use crate::runtime_config::RuntimeConfig;

/// Command-line interface for routeforge
#[derive(Debug, Parser)]
#[command(name = "routeforge")]
#[command(about = "Compile route files, match requests and generate URLs", long_about = None)]
#[command(version)]
pub struct Cli {
    /// YAML route file (defaults to ROUTEFORGE_ROUTES)
    #[arg(short, long, global = true)]
    pub file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Print the compiled routing table
    Routes,
    /// Match a request and print the result as JSON
    ///
    /// Without --path, `METHOD PATH` lines are read from stdin; the route
    /// file is reloaded on change when ROUTEFORGE_WATCH is true.
    Match {
        /// Request path
        #[arg(long)]
        path: Option<String>,

        #[command(flatten)]
        request: RequestArgs,
    },
    /// Print the URL of a named route
    Generate {
        /// Route name
        #[arg(short, long)]
        name: String,

        /// Placeholder or query value (repeatable)
        #[arg(short, long = "param", value_parser = parse_key_val)]
        params: Vec<(String, String)>,
    },
    /// Match `METHOD PATH` lines from stdin, reloading the route file on change
    Watch {
        #[command(flatten)]
        request: RequestArgs,
    },
}

/// Request fields shared by the matching commands.
#[derive(Debug, Clone, Args)]
pub struct RequestArgs {
    /// HTTP method
    #[arg(short, long, default_value = "get")]
    pub method: String,

    /// Host the request was sent to
    #[arg(long, default_value = "")]
    pub host: String,

    /// Protocol prefix
    #[arg(long, default_value = "http://")]
    pub protocol: String,

    /// Extra request field such as user_agent=Gecko (repeatable)
    #[arg(long = "field", value_parser = parse_key_val)]
    pub fields: Vec<(String, String)>,
}

impl RequestArgs {
    fn request(&self, path: &str, method: &str) -> Request {
        self.fields.iter().fold(
            Request::new(path)
                .method(method)
                .host(self.host.as_str())
                .protocol(self.protocol.as_str()),
            |request, (name, value)| request.field(name.as_str(), value.as_str()),
        )
    }
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected key=value, got '{s}'"))
}

/// Parse arguments, set up logging and run the selected command.
pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    init_logging_with_config(&LogConfig::from_env())?;
    let config = RuntimeConfig::from_env();
    let stdin = io::stdin();
    let stdout = io::stdout();
    execute(&cli, &config, &mut stdin.lock(), &mut stdout.lock())
}

/// Run `cli` reading request lines from `input` and writing results to `out`.
pub fn execute(
    cli: &Cli,
    config: &RuntimeConfig,
    input: &mut dyn BufRead,
    out: &mut dyn Write,
) -> Result<()> {
    let file = cli
        .file
        .clone()
        .or_else(|| config.routes_file.clone())
        .ok_or_else(|| anyhow!("no route file given: pass --file or set ROUTEFORGE_ROUTES"))?;
    let router = Arc::new(Router::new().with_slow_match_threshold(config.slow_match));
    router.load_file(&file)?;

    match &cli.command {
        Commands::Routes => print_routes(&router, out),
        Commands::Match {
            path: Some(path),
            request,
        } => {
            let result = match_json(&router, &request.request(path, &request.method));
            writeln!(out, "{}", serde_json::to_string_pretty(&result)?)?;
            Ok(())
        }
        Commands::Match {
            path: None,
            request,
        } => serve_lines(&router, &file, config.watch, request, input, out),
        Commands::Generate { name, params } => {
            let params: BTreeMap<String, String> = params.iter().cloned().collect();
            let url = router
                .url(name, &params)
                .with_context(|| format!("Failed to generate URL for '{name}'"))?;
            writeln!(out, "{url}")?;
            Ok(())
        }
        Commands::Watch { request } => serve_lines(&router, &file, true, request, input, out),
    }
}

fn print_routes(router: &Router, out: &mut dyn Write) -> Result<()> {
    writeln!(out, "[routes] count={}", router.len())?;
    for line in router.route_summaries() {
        writeln!(out, "{line}")?;
    }
    for name in router.route_names() {
        let template = router
            .named_route(&name)
            .and_then(|route| route.template())
            .unwrap_or_default();
        writeln!(out, "[named] {name} => {template}")?;
    }
    Ok(())
}

fn match_json(router: &Router, request: &Request) -> serde_json::Value {
    let found = router.match_request(request);
    let name = found
        .index
        .and_then(|index| router.route_at(index))
        .and_then(|route| route.name().map(str::to_string));
    json!({
        "index": found.index,
        "name": name,
        "params": found.params,
    })
}

fn serve_lines(
    router: &Arc<Router>,
    file: &Path,
    reload: bool,
    request: &RequestArgs,
    input: &mut dyn BufRead,
    out: &mut dyn Write,
) -> Result<()> {
    let _watcher = if reload {
        Some(
            watch_routes(file, Arc::clone(router), |r| {
                debug!(routes_count = r.len(), "routes reloaded");
            })
            .with_context(|| format!("Failed to watch {}", file.display()))?,
        )
    } else {
        None
    };

    for line in input.lines() {
        let line = line.context("Failed to read request line")?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (method, path) = match line.split_once(char::is_whitespace) {
            Some((method, path)) => (method, path.trim()),
            None => (request.method.as_str(), line),
        };
        let result = match_json(router, &request.request(path, method));
        writeln!(out, "{}", serde_json::to_string(&result)?)?;
        out.flush()?;
    }
    Ok(())
}
